use diesel::ExpressionMethods;
use diesel::OptionalExtension;
use diesel::QueryDsl;
use diesel::RunQueryDsl;
use diesel::SelectableHelper;

use crate::integration::db::Pool;
use crate::schema::users;

use super::Id;
use super::model::User;

pub trait UserRepository {
    fn find_by_id(&self, id: &Id) -> super::Result<Option<User>>;

    fn exists(&self, id: &Id) -> super::Result<bool>;
}

pub struct PgUserRepository {
    pool: Pool,
}

impl PgUserRepository {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

impl UserRepository for PgUserRepository {
    fn find_by_id(&self, id: &Id) -> super::Result<Option<User>> {
        let mut conn = self.pool.get()?;

        let u = users::table
            .find(id)
            .select(User::as_select())
            .first(&mut conn)
            .optional()?;

        Ok(u)
    }

    fn exists(&self, id: &Id) -> super::Result<bool> {
        let mut conn = self.pool.get()?;

        let exists = diesel::select(diesel::dsl::exists(users::table.filter(users::id.eq(id))))
            .get_result::<bool>(&mut conn)?;

        Ok(exists)
    }
}
