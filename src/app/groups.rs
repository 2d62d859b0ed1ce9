use crate::app::parse_json_body;
use crate::error::NotifyError;
use crate::ports;
use crate::state::AppState;
use crate::types::group::{Group, GroupId, UserId};

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub(crate) struct JoinGroupRequest {
    #[serde(alias = "userId")]
    pub(crate) user_id: UserId,
}

#[derive(Debug, Serialize)]
pub(crate) struct MembershipResponse {
    pub(crate) group_id: GroupId,
    pub(crate) user_id: UserId,
}

pub(crate) async fn group_by_name<St, C, Tr>(
    State(state): State<AppState<St, C, Tr>>,
    Path(name): Path<String>,
) -> Result<Json<Group>, NotifyError>
where
    St: ports::SubscriberStore,
    C: ports::CredentialProvider,
    Tr: ports::PushTransport,
{
    state
        .store
        .find_group_by_name(&name)
        .await?
        .map(Json)
        .ok_or_else(|| NotifyError::NotFound(format!("group {name} not found")))
}

/// Adds a user to the named group, creating the group on first use.
pub(crate) async fn join_group<St, C, Tr>(
    State(state): State<AppState<St, C, Tr>>,
    Path(name): Path<String>,
    body: Bytes,
) -> Result<Json<MembershipResponse>, NotifyError>
where
    St: ports::SubscriberStore,
    C: ports::CredentialProvider,
    Tr: ports::PushTransport,
{
    let request: JoinGroupRequest = parse_json_body(&body)?;
    if name.trim().is_empty() {
        return Err(NotifyError::Validation("group name must not be empty".to_string()));
    }
    if request.user_id.as_str().trim().is_empty() {
        return Err(NotifyError::Validation("user_id must not be empty".to_string()));
    }

    let group = match state.store.find_group_by_name(&name).await? {
        Some(group) => group,
        None => {
            tracing::info!(group = %name, "creating group");
            state.store.create_group(&name).await?
        }
    };
    state
        .store
        .upsert_membership(&group.id, &request.user_id)
        .await?;

    Ok(Json(MembershipResponse {
        group_id: group.id,
        user_id: request.user_id,
    }))
}
