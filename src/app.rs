use crate::error::NotifyError;
use crate::ports;
use crate::state::AppState;

use axum::Router;
use axum::middleware;
use axum::routing::{any, get, post};
use serde::de::DeserializeOwned;

mod cors;
mod devices;
mod groups;
mod notify;
mod push;

pub fn app<St, C, Tr>(state: AppState<St, C, Tr>) -> Router
where
    St: ports::SubscriberStore,
    C: ports::CredentialProvider,
    Tr: ports::PushTransport,
{
    Router::new()
        .route(
            "/send-notification",
            any(notify::send_notification::<St, C, Tr>),
        )
        .route("/groups/{name}", get(groups::group_by_name::<St, C, Tr>))
        .route(
            "/groups/{name}/members",
            post(groups::join_group::<St, C, Tr>),
        )
        .route("/devices", post(devices::register_device::<St, C, Tr>))
        .route(
            "/api/push/public-key",
            get(push::push_public_key::<St, C, Tr>),
        )
        .route("/health", get(health))
        .with_state(state)
        .layer(middleware::from_fn(cors::cors_middleware))
}

pub(crate) async fn health() -> &'static str {
    "ok"
}

/// Decodes a request body, reporting every failure as a `{"error"}` 400.
pub(crate) fn parse_json_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, NotifyError> {
    serde_json::from_slice(body)
        .map_err(|err| NotifyError::Validation(format!("Invalid JSON body: {err}")))
}
