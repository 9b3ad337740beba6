use chrono::{DateTime, Utc};
use diesel::prelude::{Insertable, Queryable, Selectable};

use crate::{conversation, user};

use super::Id;

const NEW_MESSAGE: &str = "new_message";

/// In-app notification row shown in the marketplace notification centre.
#[derive(Queryable, Selectable, Insertable, Clone, Debug, PartialEq)]
#[diesel(table_name = crate::schema::notifications)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Notification {
    id: Id,
    user_id: user::Id,
    kind: String,
    title: String,
    link: Option<String>,
    read: bool,
    created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new_message(receiver: user::Id, sender_name: &str, conversation_id: &conversation::Id) -> Self {
        Self {
            id: Id::random(),
            user_id: receiver,
            kind: NEW_MESSAGE.to_owned(),
            title: format!("New message from {sender_name}"),
            link: Some(format!("/messages?conversation={conversation_id}")),
            read: false,
            created_at: Utc::now(),
        }
    }

    pub const fn user_id(&self) -> &user::Id {
        &self.user_id
    }

    pub fn title(&self) -> &str {
        &self.title
    }
}
