pub(super) mod api {
    use axum::{
        Extension, Json,
        extract::{Query, State},
    };

    use crate::auth;
    use crate::inbox::{self, model::InboxEntry};
    use crate::paging::Page;

    pub async fn find_inbox(
        Extension(auth_user): Extension<auth::User>,
        inbox_service: State<inbox::Service>,
        Query(page): Query<Page>,
    ) -> crate::Result<Json<Vec<InboxEntry>>> {
        let inbox = inbox_service.find(auth_user.id(), &page).await?;
        Ok(Json(inbox))
    }
}
