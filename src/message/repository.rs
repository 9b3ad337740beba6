use std::collections::HashMap;

use chrono::{DateTime, Utc};
use diesel::Connection;
use diesel::ExpressionMethods;
use diesel::OptionalExtension;
use diesel::PgConnection;
use diesel::QueryDsl;
use diesel::QueryResult;
use diesel::RunQueryDsl;
use diesel::SelectableHelper;
use diesel::sql_types;

use crate::attachment::Attachment;
use crate::integration::db::Pool;
use crate::paging::Page;
use crate::schema::{message_attachments, message_deletions, message_reactions, messages};
use crate::{conversation, user};

use super::model::{AttachmentRow, DeletionRow, Message, MessageRow, Reaction, ReactionRow};
use super::{Id, Status};

pub trait MessageRepository {
    fn insert(&self, m: &Message) -> super::Result<()>;

    fn find_by_id(&self, id: &Id) -> super::Result<Option<Message>>;

    /// A page of the conversation as seen by `viewer`, oldest first.
    fn find_by_conversation(
        &self,
        conversation_id: &conversation::Id,
        viewer: &user::Id,
        page: &Page,
    ) -> super::Result<Vec<Message>>;

    /// Marks every unread message addressed to `receiver` as read and
    /// returns how many changed.
    fn mark_many_as_read(
        &self,
        conversation_id: &conversation::Id,
        receiver: &user::Id,
        at: DateTime<Utc>,
    ) -> super::Result<usize>;

    /// Fails with `NotFound` when the message is absent or not addressed to
    /// `receiver`. The flag tells whether the message changed.
    fn mark_one_as_read(
        &self,
        id: &Id,
        receiver: &user::Id,
        at: DateTime<Utc>,
    ) -> super::Result<(Message, bool)>;

    /// Persists text, attachments and the edit marker.
    fn update_content(&self, m: &Message) -> super::Result<()>;

    fn delete_for(&self, id: &Id, user: &user::Id) -> super::Result<()>;

    fn toggle_reaction(&self, id: &Id, user: &user::Id, emoji: &str)
    -> super::Result<Vec<Reaction>>;

    fn search(&self, user: &user::Id, query: &str, page: &Page) -> super::Result<Vec<Message>>;

    fn count_unread(&self, user: &user::Id) -> super::Result<i64>;

    fn count_unread_in_conversation(
        &self,
        conversation_id: &conversation::Id,
        user: &user::Id,
    ) -> super::Result<i64>;
}

pub struct PgMessageRepository {
    pool: Pool,
}

impl PgMessageRepository {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

/// Loads attachments, reactions and deletions for the rows, keeping row order.
fn hydrate(conn: &mut PgConnection, rows: Vec<MessageRow>) -> QueryResult<Vec<Message>> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<Id> = rows.iter().map(|r| *r.id()).collect();

    let mut attachments: HashMap<Id, Vec<Attachment>> = HashMap::new();
    for row in message_attachments::table
        .filter(message_attachments::message_id.eq_any(&ids))
        .order((
            message_attachments::message_id,
            message_attachments::position,
        ))
        .select(AttachmentRow::as_select())
        .load(conn)?
    {
        attachments
            .entry(*row.message_id())
            .or_default()
            .push(row.into());
    }

    let mut reactions: HashMap<Id, Vec<Reaction>> = HashMap::new();
    for row in message_reactions::table
        .filter(message_reactions::message_id.eq_any(&ids))
        .order(message_reactions::created_at)
        .select(ReactionRow::as_select())
        .load(conn)?
    {
        reactions.entry(*row.message_id()).or_default().push(row.into());
    }

    let mut deletions: HashMap<Id, Vec<user::Id>> = HashMap::new();
    for row in message_deletions::table
        .filter(message_deletions::message_id.eq_any(&ids))
        .select(DeletionRow::as_select())
        .load(conn)?
    {
        deletions
            .entry(*row.message_id())
            .or_default()
            .push(*row.user_id());
    }

    let messages = rows
        .into_iter()
        .map(|row| {
            let id = *row.id();
            Message::assemble(
                row,
                attachments.remove(&id).unwrap_or_default(),
                reactions.remove(&id).unwrap_or_default(),
                deletions.remove(&id).unwrap_or_default(),
            )
        })
        .collect();

    Ok(messages)
}

fn load_one(conn: &mut PgConnection, id: &Id) -> QueryResult<Option<Message>> {
    let row = messages::table
        .find(id)
        .select(MessageRow::as_select())
        .first(conn)
        .optional()?;

    match row {
        Some(row) => Ok(hydrate(conn, vec![row])?.pop()),
        None => Ok(None),
    }
}

impl MessageRepository for PgMessageRepository {
    fn insert(&self, m: &Message) -> super::Result<()> {
        let mut conn = self.pool.get()?;

        conn.transaction(|conn| {
            diesel::insert_into(messages::table)
                .values(m.to_row())
                .execute(conn)?;

            let attachments = m.attachment_rows();
            if !attachments.is_empty() {
                diesel::insert_into(message_attachments::table)
                    .values(&attachments)
                    .execute(conn)?;
            }
            QueryResult::Ok(())
        })?;

        Ok(())
    }

    fn find_by_id(&self, id: &Id) -> super::Result<Option<Message>> {
        let mut conn = self.pool.get()?;
        Ok(load_one(&mut conn, id)?)
    }

    fn find_by_conversation(
        &self,
        conversation_id: &conversation::Id,
        viewer: &user::Id,
        page: &Page,
    ) -> super::Result<Vec<Message>> {
        let mut conn = self.pool.get()?;

        let mut rows = messages::table
            .filter(messages::conversation_id.eq(conversation_id))
            .filter(
                messages::id.ne_all(
                    message_deletions::table
                        .filter(message_deletions::user_id.eq(viewer))
                        .select(message_deletions::message_id),
                ),
            )
            .order((messages::created_at.desc(), messages::id.desc()))
            .limit(page.limit())
            .offset(page.offset())
            .select(MessageRow::as_select())
            .load(&mut conn)?;
        rows.reverse();

        Ok(hydrate(&mut conn, rows)?)
    }

    fn mark_many_as_read(
        &self,
        conversation_id: &conversation::Id,
        receiver: &user::Id,
        at: DateTime<Utc>,
    ) -> super::Result<usize> {
        let mut conn = self.pool.get()?;

        let updated = diesel::update(
            messages::table
                .filter(messages::conversation_id.eq(conversation_id))
                .filter(messages::receiver.eq(receiver))
                .filter(messages::read.eq(false)),
        )
        .set((
            messages::read.eq(true),
            messages::read_at.eq(at),
            messages::status.eq(Status::Seen),
        ))
        .execute(&mut conn)?;

        Ok(updated)
    }

    fn mark_one_as_read(
        &self,
        id: &Id,
        receiver: &user::Id,
        at: DateTime<Utc>,
    ) -> super::Result<(Message, bool)> {
        let mut conn = self.pool.get()?;

        let updated = diesel::update(
            messages::table
                .find(id)
                .filter(messages::receiver.eq(receiver))
                .filter(messages::read.eq(false)),
        )
        .set((
            messages::read.eq(true),
            messages::read_at.eq(at),
            messages::status.eq(Status::Seen),
        ))
        .execute(&mut conn)?;

        match load_one(&mut conn, id)? {
            Some(m) if m.receiver() == receiver => Ok((m, updated > 0)),
            _ => Err(super::Error::NotFound(*id)),
        }
    }

    fn update_content(&self, m: &Message) -> super::Result<()> {
        let mut conn = self.pool.get()?;

        conn.transaction(|conn| {
            diesel::update(messages::table.find(m.id()))
                .set((
                    messages::text.eq(m.text().map(str::to_owned)),
                    messages::is_edited.eq(m.is_edited()),
                    messages::edited_at.eq(m.edited_at().copied()),
                ))
                .execute(conn)?;

            diesel::delete(
                message_attachments::table.filter(message_attachments::message_id.eq(m.id())),
            )
            .execute(conn)?;

            let attachments = m.attachment_rows();
            if !attachments.is_empty() {
                diesel::insert_into(message_attachments::table)
                    .values(&attachments)
                    .execute(conn)?;
            }
            QueryResult::Ok(())
        })?;

        Ok(())
    }

    fn delete_for(&self, id: &Id, user: &user::Id) -> super::Result<()> {
        let mut conn = self.pool.get()?;

        diesel::insert_into(message_deletions::table)
            .values(DeletionRow::new(*id, *user))
            .on_conflict_do_nothing()
            .execute(&mut conn)?;

        Ok(())
    }

    fn toggle_reaction(
        &self,
        id: &Id,
        user: &user::Id,
        emoji: &str,
    ) -> super::Result<Vec<Reaction>> {
        let mut conn = self.pool.get()?;

        let reactions = conn.transaction(|conn| {
            let removed = diesel::delete(
                message_reactions::table
                    .filter(message_reactions::message_id.eq(id))
                    .filter(message_reactions::user_id.eq(user))
                    .filter(message_reactions::emoji.eq(emoji)),
            )
            .execute(conn)?;

            if removed == 0 {
                diesel::insert_into(message_reactions::table)
                    .values(ReactionRow::new(*id, *user, emoji))
                    .on_conflict_do_nothing()
                    .execute(conn)?;
            }

            message_reactions::table
                .filter(message_reactions::message_id.eq(id))
                .order(message_reactions::created_at)
                .select(ReactionRow::as_select())
                .load(conn)
        })?;

        Ok(reactions.into_iter().map(Reaction::from).collect())
    }

    fn search(&self, user: &user::Id, query: &str, page: &Page) -> super::Result<Vec<Message>> {
        let mut conn = self.pool.get()?;

        let rows = diesel::sql_query(
            "SELECT m.* FROM messages m \
             WHERE (m.sender = $1 OR m.receiver = $1) \
               AND to_tsvector('simple', coalesce(m.text, '')) @@ plainto_tsquery('simple', $2) \
               AND NOT EXISTS ( \
                 SELECT 1 FROM message_deletions d WHERE d.message_id = m.id AND d.user_id = $1) \
             ORDER BY ts_rank(to_tsvector('simple', coalesce(m.text, '')), \
                              plainto_tsquery('simple', $2)) DESC, \
                      m.created_at DESC \
             OFFSET $3 LIMIT $4",
        )
        .bind::<sql_types::Uuid, _>(user)
        .bind::<sql_types::Text, _>(query)
        .bind::<sql_types::BigInt, _>(page.offset())
        .bind::<sql_types::BigInt, _>(page.limit())
        .load::<MessageRow>(&mut conn)?;

        Ok(hydrate(&mut conn, rows)?)
    }

    fn count_unread(&self, user: &user::Id) -> super::Result<i64> {
        let mut conn = self.pool.get()?;

        let count = messages::table
            .filter(messages::receiver.eq(user))
            .filter(messages::read.eq(false))
            .count()
            .get_result(&mut conn)?;

        Ok(count)
    }

    fn count_unread_in_conversation(
        &self,
        conversation_id: &conversation::Id,
        user: &user::Id,
    ) -> super::Result<i64> {
        let mut conn = self.pool.get()?;

        let count = messages::table
            .filter(messages::conversation_id.eq(conversation_id))
            .filter(messages::receiver.eq(user))
            .filter(messages::read.eq(false))
            .count()
            .get_result(&mut conn)?;

        Ok(count)
    }
}
