use chrono::{DateTime, Utc};
use diesel::prelude::{Insertable, Queryable, QueryableByName, Selectable};
use serde::Serialize;

use crate::attachment::{self, Attachment, form::Upload};
use crate::conversation::{self, Scope, model::LastMessage};
use crate::user;

use super::{Id, Status};

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Reaction {
    emoji: String,
    by: user::Id,
}

impl Reaction {
    pub fn new(emoji: impl Into<String>, by: user::Id) -> Self {
        Self {
            emoji: emoji.into(),
            by,
        }
    }

    pub fn emoji(&self) -> &str {
        &self.emoji
    }

    pub const fn by(&self) -> &user::Id {
        &self.by
    }
}

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    id: Id,
    conversation_id: conversation::Id,
    sender: user::Id,
    receiver: user::Id,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    attachments: Vec<Attachment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_to: Option<Id>,
    status: Status,
    read: bool,
    read_at: Option<DateTime<Utc>>,
    is_edited: bool,
    edited_at: Option<DateTime<Utc>>,
    deleted_by: Vec<user::Id>,
    reactions: Vec<Reaction>,
    created_at: DateTime<Utc>,
}

fn non_blank(text: Option<String>) -> Option<String> {
    text.filter(|t| !t.trim().is_empty())
}

impl Message {
    /// Fails with `Empty` unless there is text or at least one attachment.
    pub fn new(
        conversation_id: conversation::Id,
        sender: user::Id,
        receiver: user::Id,
        text: Option<String>,
        attachments: Vec<Attachment>,
        reply_to: Option<Id>,
        status: Status,
    ) -> super::Result<Self> {
        let text = non_blank(text);
        if text.is_none() && attachments.is_empty() {
            return Err(super::Error::Empty);
        }

        Ok(Self {
            id: Id::random(),
            conversation_id,
            sender,
            receiver,
            text,
            attachments,
            reply_to,
            status,
            read: false,
            read_at: None,
            is_edited: false,
            edited_at: None,
            deleted_by: Vec::new(),
            reactions: Vec::new(),
            created_at: Utc::now(),
        })
    }

    pub const fn id(&self) -> &Id {
        &self.id
    }

    pub const fn conversation_id(&self) -> &conversation::Id {
        &self.conversation_id
    }

    pub const fn sender(&self) -> &user::Id {
        &self.sender
    }

    pub const fn receiver(&self) -> &user::Id {
        &self.receiver
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    pub const fn reply_to(&self) -> Option<&Id> {
        self.reply_to.as_ref()
    }

    pub const fn status(&self) -> &Status {
        &self.status
    }

    pub const fn is_read(&self) -> bool {
        self.read
    }

    pub const fn read_at(&self) -> Option<&DateTime<Utc>> {
        self.read_at.as_ref()
    }

    pub const fn is_edited(&self) -> bool {
        self.is_edited
    }

    pub const fn edited_at(&self) -> Option<&DateTime<Utc>> {
        self.edited_at.as_ref()
    }

    pub fn reactions(&self) -> &[Reaction] {
        &self.reactions
    }

    pub fn deleted_by(&self) -> &[user::Id] {
        &self.deleted_by
    }

    pub const fn created_at(&self) -> &DateTime<Utc> {
        &self.created_at
    }

    pub fn is_participant(&self, u: &user::Id) -> bool {
        self.sender.eq(u) || self.receiver.eq(u)
    }

    pub fn is_visible_to(&self, u: &user::Id) -> bool {
        !self.deleted_by.contains(u)
    }

    /// Preview stored on the conversation.
    pub fn snapshot(&self) -> LastMessage {
        let text = match (&self.text, self.attachments.first()) {
            (Some(text), _) => text.clone(),
            (None, Some(a)) => format!("📎 {}", a.file_name()),
            (None, None) => String::new(),
        };
        LastMessage::new(text, self.sender, self.created_at)
    }

    /// Sender-only edit. Replaces the text when given, drops attachments whose
    /// URL is listed and appends the new ones. Returns the dropped attachments.
    pub fn apply_edit(
        &mut self,
        editor: &user::Id,
        text: Option<String>,
        remove_urls: &[String],
        add: Vec<Attachment>,
    ) -> super::Result<Vec<Attachment>> {
        if !self.sender.eq(editor) {
            return Err(super::Error::NotSender);
        }

        let text = match text {
            Some(t) => non_blank(Some(t)),
            None => self.text.clone(),
        };
        let (removed, mut kept): (Vec<_>, Vec<_>) = self
            .attachments
            .iter()
            .cloned()
            .partition(|a| remove_urls.iter().any(|u| u == a.url()));
        kept.extend(add);

        if text.is_none() && kept.is_empty() {
            return Err(super::Error::Empty);
        }

        self.text = text;
        self.attachments = kept;
        self.is_edited = true;
        self.edited_at = Some(Utc::now());
        Ok(removed)
    }

    /// Moves the status forward, never back.
    pub fn advance(&mut self, status: Status) {
        self.status = self.status.max(status);
    }

    /// Returns `false` when the message was already read.
    pub fn mark_read(&mut self, at: DateTime<Utc>) -> bool {
        if self.read {
            return false;
        }

        self.read = true;
        self.read_at = Some(at);
        self.advance(Status::Seen);
        true
    }

    /// Returns `false` when the user had already deleted the message.
    pub fn delete_for(&mut self, u: &user::Id) -> bool {
        if self.deleted_by.contains(u) {
            return false;
        }
        self.deleted_by.push(*u);
        true
    }

    /// Removes the `(emoji, user)` pair if present, else appends it.
    pub fn toggle_reaction(&mut self, u: &user::Id, emoji: &str) {
        match self
            .reactions
            .iter()
            .position(|r| r.by.eq(u) && r.emoji == emoji)
        {
            Some(pos) => {
                self.reactions.remove(pos);
            }
            None => self.reactions.push(Reaction::new(emoji, *u)),
        }
    }
}

/// Payload of a send. Either the conversation or the receiver addresses it.
#[derive(Default, Debug)]
pub struct SendMessage {
    pub conversation_id: Option<conversation::Id>,
    pub receiver_id: Option<user::Id>,
    pub text: Option<String>,
    pub reply_to: Option<Id>,
    pub scope: Scope,
    pub uploads: Vec<Upload>,
}

impl SendMessage {
    pub fn is_empty(&self) -> bool {
        self.uploads.is_empty() && non_blank(self.text.clone()).is_none()
    }
}

#[derive(Default, Debug)]
pub struct EditMessage {
    pub text: Option<String>,
    pub remove_attachments: Vec<String>,
    pub uploads: Vec<Upload>,
}

#[derive(Queryable, QueryableByName, Selectable, Insertable, Clone, Debug)]
#[diesel(table_name = crate::schema::messages)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct MessageRow {
    id: Id,
    conversation_id: conversation::Id,
    sender: user::Id,
    receiver: user::Id,
    text: Option<String>,
    reply_to: Option<Id>,
    status: Status,
    read: bool,
    read_at: Option<DateTime<Utc>>,
    is_edited: bool,
    edited_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl MessageRow {
    pub const fn id(&self) -> &Id {
        &self.id
    }
}

#[derive(Queryable, Selectable, Insertable, Clone, Debug)]
#[diesel(table_name = crate::schema::message_attachments)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct AttachmentRow {
    message_id: Id,
    position: i32,
    kind: attachment::Kind,
    url: String,
    file_name: String,
    file_size: i64,
    mime_type: String,
}

impl AttachmentRow {
    pub const fn message_id(&self) -> &Id {
        &self.message_id
    }

    pub const fn position(&self) -> i32 {
        self.position
    }
}

impl From<AttachmentRow> for Attachment {
    fn from(r: AttachmentRow) -> Self {
        Attachment::from_parts(r.kind, r.url, r.file_name, r.file_size, r.mime_type)
    }
}

#[derive(Queryable, Selectable, Insertable, Clone, Debug)]
#[diesel(table_name = crate::schema::message_reactions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ReactionRow {
    message_id: Id,
    user_id: user::Id,
    emoji: String,
    created_at: DateTime<Utc>,
}

impl ReactionRow {
    pub fn new(message_id: Id, user_id: user::Id, emoji: impl Into<String>) -> Self {
        Self {
            message_id,
            user_id,
            emoji: emoji.into(),
            created_at: Utc::now(),
        }
    }

    pub const fn message_id(&self) -> &Id {
        &self.message_id
    }
}

impl From<ReactionRow> for Reaction {
    fn from(r: ReactionRow) -> Self {
        Reaction::new(r.emoji, r.user_id)
    }
}

#[derive(Queryable, Selectable, Insertable, Clone, Debug)]
#[diesel(table_name = crate::schema::message_deletions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DeletionRow {
    message_id: Id,
    user_id: user::Id,
}

impl DeletionRow {
    pub const fn new(message_id: Id, user_id: user::Id) -> Self {
        Self {
            message_id,
            user_id,
        }
    }

    pub const fn message_id(&self) -> &Id {
        &self.message_id
    }

    pub const fn user_id(&self) -> &user::Id {
        &self.user_id
    }
}

impl Message {
    pub fn assemble(
        row: MessageRow,
        attachments: Vec<Attachment>,
        reactions: Vec<Reaction>,
        deleted_by: Vec<user::Id>,
    ) -> Self {
        Self {
            id: row.id,
            conversation_id: row.conversation_id,
            sender: row.sender,
            receiver: row.receiver,
            text: row.text,
            attachments,
            reply_to: row.reply_to,
            status: row.status,
            read: row.read,
            read_at: row.read_at,
            is_edited: row.is_edited,
            edited_at: row.edited_at,
            deleted_by,
            reactions,
            created_at: row.created_at,
        }
    }

    pub fn to_row(&self) -> MessageRow {
        MessageRow {
            id: self.id,
            conversation_id: self.conversation_id,
            sender: self.sender,
            receiver: self.receiver,
            text: self.text.clone(),
            reply_to: self.reply_to,
            status: self.status,
            read: self.read,
            read_at: self.read_at,
            is_edited: self.is_edited,
            edited_at: self.edited_at,
            created_at: self.created_at,
        }
    }

    pub fn attachment_rows(&self) -> Vec<AttachmentRow> {
        self.attachments
            .iter()
            .enumerate()
            .map(|(i, a)| AttachmentRow {
                message_id: self.id,
                position: i as i32,
                kind: *a.kind(),
                url: a.url().to_owned(),
                file_name: a.file_name().to_owned(),
                file_size: a.file_size(),
                mime_type: a.mime_type().to_owned(),
            })
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn message(text: Option<&str>, attachments: Vec<Attachment>) -> super::super::Result<Message> {
        Message::new(
            conversation::Id::random(),
            user::Id::random(),
            user::Id::random(),
            text.map(String::from),
            attachments,
            None,
            Status::Sent,
        )
    }

    fn png() -> Attachment {
        Attachment::new("/uploads/1-cat.png", "cat.png", 42, "image/png")
    }

    #[test]
    fn should_require_text_or_attachment() {
        assert!(matches!(message(None, vec![]), Err(super::super::Error::Empty)));
        assert!(matches!(message(Some("   "), vec![]), Err(super::super::Error::Empty)));
        assert!(message(Some("hello"), vec![]).is_ok());
        assert!(message(None, vec![png()]).is_ok());
    }

    #[test]
    fn should_preview_attachment_only_message() {
        let m = message(None, vec![png()]).unwrap();
        assert_eq!(m.snapshot().text(), "📎 cat.png");
    }

    #[test]
    fn should_forbid_edit_by_non_sender() {
        let mut m = message(Some("hello"), vec![]).unwrap();
        let before = m.clone();
        let receiver = m.receiver;

        let res = m.apply_edit(&receiver, Some("hacked".into()), &[], vec![]);

        assert!(matches!(res, Err(super::super::Error::NotSender)));
        assert_eq!(m, before);
    }

    #[test]
    fn should_edit_text_and_attachments() {
        let mut m = message(Some("hello"), vec![png()]).unwrap();
        let sender = m.sender;
        let pdf = Attachment::new("/uploads/2-cv.pdf", "cv.pdf", 7, "application/pdf");

        let removed = m
            .apply_edit(
                &sender,
                Some("hello again".into()),
                &["/uploads/1-cat.png".into()],
                vec![pdf.clone()],
            )
            .unwrap();

        assert_eq!(removed, vec![png()]);
        assert_eq!(m.text(), Some("hello again"));
        assert_eq!(m.attachments(), &[pdf]);
        assert!(m.is_edited());
    }

    #[test]
    fn should_not_edit_into_empty_message() {
        let mut m = message(Some("hello"), vec![]).unwrap();
        let sender = m.sender;

        let res = m.apply_edit(&sender, Some(String::new()), &[], vec![]);

        assert!(matches!(res, Err(super::super::Error::Empty)));
        assert_eq!(m.text(), Some("hello"));
        assert!(!m.is_edited());
    }

    #[test]
    fn should_keep_read_monotonic() {
        let mut m = message(Some("hello"), vec![]).unwrap();
        let first = Utc::now();

        assert!(m.mark_read(first));
        assert!(!m.mark_read(Utc::now()));
        assert!(m.is_read());
        assert_eq!(m.read_at(), Some(&first));
        assert_eq!(m.status(), &Status::Seen);

        m.advance(Status::Delivered);
        assert_eq!(m.status(), &Status::Seen);
    }

    #[test]
    fn should_toggle_reaction_pair() {
        let mut m = message(Some("hello"), vec![]).unwrap();
        let (a, b) = (m.sender, m.receiver);

        m.toggle_reaction(&a, "👍");
        m.toggle_reaction(&b, "👍");
        assert_eq!(m.reactions().len(), 2);

        m.toggle_reaction(&a, "👍");
        assert_eq!(m.reactions(), &[Reaction::new("👍", b)]);
    }

    #[test]
    fn should_soft_delete_per_user() {
        let mut m = message(Some("hello"), vec![]).unwrap();
        let sender = m.sender;

        assert!(m.delete_for(&sender));
        assert!(!m.delete_for(&sender));
        assert!(!m.is_visible_to(&sender));
        assert!(m.is_visible_to(&m.receiver));
    }
}
