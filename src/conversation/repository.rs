use diesel::BoolExpressionMethods;
use diesel::ExpressionMethods;
use diesel::OptionalExtension;
use diesel::PgSortExpressionMethods;
use diesel::QueryDsl;
use diesel::RunQueryDsl;
use diesel::SelectableHelper;
use diesel::sql_types;

use crate::integration::db::Pool;
use crate::paging::Page;
use crate::schema::conversations;
use crate::user;

use super::model::{Conversation, LastMessage, NewConversation};
use super::{Flag, Id, Scope};

pub trait ConversationRepository {
    fn find_by_id(&self, id: &Id) -> super::Result<Option<Conversation>>;

    /// Looks a conversation up by its unordered participant pair and scope.
    fn find_by_members(
        &self,
        members: &[user::Id; 2],
        scope: &Scope,
    ) -> super::Result<Option<Conversation>>;

    /// Returns `false` when a conversation with the same dedup key exists.
    fn insert(&self, c: &NewConversation) -> super::Result<bool>;

    fn find_by_member(&self, member: &user::Id, page: &Page) -> super::Result<Vec<Conversation>>;

    /// Stores the snapshot unless a newer one is already present.
    fn update_last_message(&self, id: &Id, last: &LastMessage) -> super::Result<bool>;

    fn toggle_flag(&self, id: &Id, flag: Flag, member: &user::Id)
    -> super::Result<Option<Conversation>>;

    /// Returns the existing conversation for the pair or creates it.
    /// The flag is `true` only for the caller whose insert won.
    fn find_or_create(&self, c: &NewConversation) -> super::Result<(Conversation, bool)> {
        let members = c.members();
        let scope = c.scope();

        if let Some(existing) = self.find_by_members(&members, &scope)? {
            return Ok((existing, false));
        }

        if self.insert(c)? {
            return Ok((Conversation::from(c), true));
        }

        // lost the race against a concurrent insert
        self.find_by_members(&members, &scope)?
            .map(|existing| (existing, false))
            .ok_or(super::Error::Conflict)
    }
}

pub struct PgConversationRepository {
    pool: Pool,
}

impl PgConversationRepository {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

impl ConversationRepository for PgConversationRepository {
    fn find_by_id(&self, id: &Id) -> super::Result<Option<Conversation>> {
        let mut conn = self.pool.get()?;

        let c = conversations::table
            .find(id)
            .select(Conversation::as_select())
            .first(&mut conn)
            .optional()?;

        Ok(c)
    }

    fn find_by_members(
        &self,
        members: &[user::Id; 2],
        scope: &Scope,
    ) -> super::Result<Option<Conversation>> {
        let mut conn = self.pool.get()?;
        let [a, b] = members;

        let mut query = conversations::table
            .filter(
                conversations::initiator
                    .eq(a)
                    .and(conversations::recipient.eq(b))
                    .or(conversations::initiator
                        .eq(b)
                        .and(conversations::recipient.eq(a))),
            )
            .select(Conversation::as_select())
            .into_boxed();

        query = match scope.task_id() {
            Some(task_id) => query.filter(conversations::task_id.eq(*task_id)),
            None => query.filter(conversations::task_id.is_null()),
        };
        query = match scope.proposal_id() {
            Some(proposal_id) => query.filter(conversations::proposal_id.eq(*proposal_id)),
            None => query.filter(conversations::proposal_id.is_null()),
        };

        let c = query.first(&mut conn).optional()?;
        Ok(c)
    }

    fn insert(&self, c: &NewConversation) -> super::Result<bool> {
        let mut conn = self.pool.get()?;

        let inserted = diesel::insert_into(conversations::table)
            .values(c)
            .on_conflict_do_nothing()
            .execute(&mut conn)?;

        Ok(inserted > 0)
    }

    fn find_by_member(&self, member: &user::Id, page: &Page) -> super::Result<Vec<Conversation>> {
        let mut conn = self.pool.get()?;

        let list = conversations::table
            .filter(
                conversations::initiator
                    .eq(member)
                    .or(conversations::recipient.eq(member)),
            )
            .order((
                conversations::last_message_at.desc().nulls_last(),
                conversations::updated_at.desc(),
            ))
            .limit(page.limit())
            .offset(page.offset())
            .select(Conversation::as_select())
            .load(&mut conn)?;

        Ok(list)
    }

    fn update_last_message(&self, id: &Id, last: &LastMessage) -> super::Result<bool> {
        let mut conn = self.pool.get()?;

        let updated = diesel::update(
            conversations::table.find(id).filter(
                conversations::last_message_at
                    .is_null()
                    .or(conversations::last_message_at.le(last.created_at())),
            ),
        )
        .set((
            conversations::last_message_text.eq(last.text()),
            conversations::last_message_sender.eq(last.sender()),
            conversations::last_message_at.eq(last.created_at()),
            conversations::updated_at.eq(chrono::Utc::now()),
        ))
        .execute(&mut conn)?;

        Ok(updated > 0)
    }

    fn toggle_flag(
        &self,
        id: &Id,
        flag: Flag,
        member: &user::Id,
    ) -> super::Result<Option<Conversation>> {
        let mut conn = self.pool.get()?;

        let column = match flag {
            Flag::Pinned => "pinned_for",
            Flag::Muted => "muted_for",
        };

        let c = diesel::sql_query(format!(
            "UPDATE conversations SET {column} = CASE \
                WHEN $2 = ANY({column}) THEN array_remove({column}, $2) \
                ELSE array_append({column}, $2) END \
             WHERE id = $1 RETURNING *"
        ))
        .bind::<sql_types::Uuid, _>(id)
        .bind::<sql_types::Uuid, _>(member)
        .get_result::<Conversation>(&mut conn)
        .optional()?;

        Ok(c)
    }
}
