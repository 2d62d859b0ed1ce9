use crate::error::ErrorResponse;
use crate::ports;
use crate::state::AppState;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::Serialize;

#[derive(Serialize)]
pub(crate) struct PublicKeyResponse {
    #[serde(rename = "publicKey")]
    pub(crate) public_key: String,
}

/// Application server key browsers need for `pushManager.subscribe`.
pub(crate) async fn push_public_key<St, C, Tr>(
    State(state): State<AppState<St, C, Tr>>,
) -> Result<Json<PublicKeyResponse>, (StatusCode, Json<ErrorResponse>)>
where
    St: ports::SubscriberStore,
    C: ports::CredentialProvider,
    Tr: ports::PushTransport,
{
    let Some(public_key) = state.config.vapid_public_key() else {
        return Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResponse {
                error: "Web push is not configured.".to_string(),
            }),
        ));
    };

    Ok(Json(PublicKeyResponse {
        public_key: public_key.to_string(),
    }))
}
