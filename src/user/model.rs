use diesel::prelude::{Insertable, Queryable, Selectable};
use serde::Serialize;

use super::{Id, Role};

#[derive(Queryable, Selectable, Insertable, Clone, Debug, PartialEq)]
#[diesel(table_name = crate::schema::users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct User {
    id: Id,
    name: String,
    email: String,
    role: Role,
    picture: Option<String>,
}

impl User {
    pub fn new(
        id: Id,
        name: impl Into<String>,
        email: impl Into<String>,
        role: Role,
        picture: Option<String>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            email: email.into(),
            role,
            picture,
        }
    }

    pub const fn id(&self) -> &Id {
        &self.id
    }
}

/// Public display fields of a user, safe to hand to the other participant.
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserDto {
    id: Id,
    name: String,
    role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    picture: Option<String>,
}

impl UserDto {
    pub const fn id(&self) -> &Id {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl From<User> for UserDto {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            name: u.name,
            role: u.role,
            picture: u.picture,
        }
    }
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Presence {
    user_id: Id,
    online: bool,
}

impl Presence {
    pub const fn new(user_id: Id, online: bool) -> Self {
        Self { user_id, online }
    }

    pub const fn online(&self) -> bool {
        self.online
    }
}
