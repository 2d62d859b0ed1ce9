use crate::app::parse_json_body;
use crate::error::NotifyError;
use crate::ports;
use crate::state::AppState;
use crate::types::device::DeviceEndpoint;
use crate::types::group::UserId;

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub(crate) struct RegisterDeviceRequest {
    #[serde(alias = "userId")]
    pub(crate) user_id: UserId,
    /// Browser `PushSubscription.toJSON()` or `{"token": ...}` for managed push.
    pub(crate) subscription: serde_json::Value,
}

#[derive(Debug, Serialize)]
pub(crate) struct RegisterDeviceResponse {
    pub(crate) user_id: UserId,
    pub(crate) endpoint: String,
}

pub(crate) async fn register_device<St, C, Tr>(
    State(state): State<AppState<St, C, Tr>>,
    body: Bytes,
) -> Result<Json<RegisterDeviceResponse>, NotifyError>
where
    St: ports::SubscriberStore,
    C: ports::CredentialProvider,
    Tr: ports::PushTransport,
{
    let request: RegisterDeviceRequest = parse_json_body(&body)?;
    if request.user_id.as_str().trim().is_empty() {
        return Err(NotifyError::Validation("user_id must not be empty".to_string()));
    }
    let endpoint = DeviceEndpoint::from_value(request.subscription)
        .map_err(|err| NotifyError::Validation(format!("invalid subscription: {err}")))?;

    state
        .store
        .upsert_device(&request.user_id, &endpoint)
        .await?;
    tracing::info!(
        user_id = %request.user_id,
        endpoint = %endpoint.identity(),
        "device registered"
    );

    Ok(Json(RegisterDeviceResponse {
        user_id: request.user_id,
        endpoint: endpoint.identity(),
    }))
}
