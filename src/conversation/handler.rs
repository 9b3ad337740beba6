pub(super) mod api {
    use axum::{
        Extension, Json,
        extract::{Path, Query, State},
    };
    use serde::{Deserialize, Serialize};

    use crate::conversation::{self, Scope, model::ConversationDto};
    use crate::message::{self, model::Message};
    use crate::paging::Page;
    use crate::{auth, user};

    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct StartParams {
        to_user_id: user::Id,
        #[serde(flatten)]
        scope: Scope,
    }

    pub async fn start(
        Extension(auth_user): Extension<auth::User>,
        conversation_service: State<conversation::Service>,
        Json(params): Json<StartParams>,
    ) -> crate::Result<Json<ConversationDto>> {
        let conversation = conversation_service
            .start(auth_user.id(), &params.to_user_id, params.scope)
            .await?;

        Ok(Json(conversation))
    }

    pub async fn find_all(
        Extension(auth_user): Extension<auth::User>,
        conversation_service: State<conversation::Service>,
        Query(page): Query<Page>,
    ) -> crate::Result<Json<Vec<ConversationDto>>> {
        let conversations = conversation_service.find_all(auth_user.id(), &page).await?;
        Ok(Json(conversations))
    }

    pub async fn find_one(
        Extension(auth_user): Extension<auth::User>,
        conversation_service: State<conversation::Service>,
        Path(id): Path<conversation::Id>,
    ) -> crate::Result<Json<ConversationDto>> {
        let conversation = conversation_service.find_one(&id, auth_user.id()).await?;
        Ok(Json(conversation))
    }

    pub async fn messages(
        Extension(auth_user): Extension<auth::User>,
        message_service: State<message::Service>,
        Path(id): Path<conversation::Id>,
        Query(page): Query<Page>,
    ) -> crate::Result<Json<Vec<Message>>> {
        let messages = message_service.fetch(auth_user.id(), &id, &page).await?;
        Ok(Json(messages))
    }

    #[derive(Serialize)]
    pub struct MarkedAsRead {
        updated: usize,
    }

    pub async fn mark_as_read(
        Extension(auth_user): Extension<auth::User>,
        message_service: State<message::Service>,
        Path(id): Path<conversation::Id>,
    ) -> crate::Result<Json<MarkedAsRead>> {
        let updated = message_service
            .mark_conversation_as_read(auth_user.id(), &id)
            .await?;

        Ok(Json(MarkedAsRead { updated }))
    }

    pub async fn toggle_pin(
        Extension(auth_user): Extension<auth::User>,
        conversation_service: State<conversation::Service>,
        Path(id): Path<conversation::Id>,
    ) -> crate::Result<Json<ConversationDto>> {
        let conversation = conversation_service.toggle_pin(&id, auth_user.id()).await?;
        Ok(Json(conversation))
    }

    pub async fn toggle_mute(
        Extension(auth_user): Extension<auth::User>,
        conversation_service: State<conversation::Service>,
        Path(id): Path<conversation::Id>,
    ) -> crate::Result<Json<ConversationDto>> {
        let conversation = conversation_service.toggle_mute(&id, auth_user.id()).await?;
        Ok(Json(conversation))
    }
}
