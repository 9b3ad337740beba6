pub(super) mod api {
    use axum::{
        Extension, Json,
        extract::{Multipart, Path, Query, State},
    };
    use serde::{Deserialize, Serialize};

    use crate::attachment::{self, Limits};
    use crate::conversation::{self, ProposalId, Scope, TaskId};
    use crate::message::{
        self,
        model::{EditMessage, Message, Reaction, SendMessage},
    };
    use crate::paging::Page;
    use crate::{auth, user};

    pub async fn send(
        Extension(auth_user): Extension<auth::User>,
        message_service: State<message::Service>,
        State(limits): State<Limits>,
        multipart: Multipart,
    ) -> crate::Result<Json<Message>> {
        let form = attachment::form::read(multipart, &limits).await?;

        let msg = SendMessage {
            conversation_id: form.parse::<conversation::Id>("conversationId")?,
            receiver_id: form.parse::<user::Id>("receiverId")?,
            text: form.text("text").map(str::to_owned),
            reply_to: form.parse::<message::Id>("replyTo")?,
            scope: Scope::new(
                form.parse::<TaskId>("taskId")?,
                form.parse::<ProposalId>("proposalId")?,
            ),
            uploads: form.into_uploads(),
        };

        let message = message_service.send(auth_user.id(), msg).await?;
        Ok(Json(message))
    }

    pub async fn edit(
        Extension(auth_user): Extension<auth::User>,
        message_service: State<message::Service>,
        State(limits): State<Limits>,
        Path(id): Path<message::Id>,
        multipart: Multipart,
    ) -> crate::Result<Json<Message>> {
        let form = attachment::form::read(multipart, &limits).await?;

        let edit = EditMessage {
            text: form.text("text").map(str::to_owned),
            remove_attachments: form.texts("removeAttachments"),
            uploads: form.into_uploads(),
        };

        let message = message_service.edit(auth_user.id(), &id, edit).await?;
        Ok(Json(message))
    }

    #[derive(Serialize)]
    pub struct Deleted {
        deleted: bool,
    }

    pub async fn delete(
        Extension(auth_user): Extension<auth::User>,
        message_service: State<message::Service>,
        Path(id): Path<message::Id>,
    ) -> crate::Result<Json<Deleted>> {
        message_service.delete(auth_user.id(), &id).await?;
        Ok(Json(Deleted { deleted: true }))
    }

    pub async fn mark_as_read(
        Extension(auth_user): Extension<auth::User>,
        message_service: State<message::Service>,
        Path(id): Path<message::Id>,
    ) -> crate::Result<Json<Message>> {
        let message = message_service.mark_as_read(auth_user.id(), &id).await?;
        Ok(Json(message))
    }

    #[derive(Deserialize)]
    pub struct ReactParams {
        emoji: String,
    }

    pub async fn react(
        Extension(auth_user): Extension<auth::User>,
        message_service: State<message::Service>,
        Path(id): Path<message::Id>,
        Json(params): Json<ReactParams>,
    ) -> crate::Result<Json<Vec<Reaction>>> {
        let reactions = message_service
            .toggle_reaction(auth_user.id(), &id, &params.emoji)
            .await?;

        Ok(Json(reactions))
    }

    #[derive(Deserialize)]
    pub struct SearchParams {
        q: Option<String>,
    }

    pub async fn search(
        Extension(auth_user): Extension<auth::User>,
        message_service: State<message::Service>,
        Query(params): Query<SearchParams>,
        Query(page): Query<Page>,
    ) -> crate::Result<Json<Vec<Message>>> {
        let q = params
            .q
            .filter(|q| !q.trim().is_empty())
            .ok_or(crate::Error::QueryParamRequired("q".into()))?;

        let messages = message_service.search(auth_user.id(), &q, &page).await?;
        Ok(Json(messages))
    }

    #[derive(Serialize)]
    pub struct UnreadCount {
        count: i64,
    }

    pub async fn count_unread(
        Extension(auth_user): Extension<auth::User>,
        message_service: State<message::Service>,
    ) -> crate::Result<Json<UnreadCount>> {
        let count = message_service.count_unread(auth_user.id()).await?;
        Ok(Json(UnreadCount { count }))
    }
}
