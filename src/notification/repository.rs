use diesel::RunQueryDsl;

use crate::integration::db::Pool;
use crate::schema::notifications;

use super::model::Notification;

pub trait NotificationRepository {
    fn insert(&self, n: &Notification) -> super::Result<()>;
}

pub struct PgNotificationRepository {
    pool: Pool,
}

impl PgNotificationRepository {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

impl NotificationRepository for PgNotificationRepository {
    fn insert(&self, n: &Notification) -> super::Result<()> {
        let mut conn = self.pool.get()?;

        diesel::insert_into(notifications::table)
            .values(n)
            .execute(&mut conn)?;

        Ok(())
    }
}
