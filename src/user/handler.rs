pub(super) mod api {
    use axum::{
        Json,
        extract::{Path, State},
    };

    use crate::user::{self, model::Presence};

    pub async fn presence(
        user_service: State<user::Service>,
        Path(id): Path<user::Id>,
    ) -> crate::Result<Json<Presence>> {
        let presence = user_service.presence(&id).await?;
        Ok(Json(presence))
    }
}
