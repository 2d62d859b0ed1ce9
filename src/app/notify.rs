use crate::app::parse_json_body;
use crate::error::{ErrorResponse, NotifyError};
use crate::ports;
use crate::push::{NO_DEVICES_MESSAGE, NotifyOutcome};
use crate::state::AppState;
use crate::types::group::GroupId;
use crate::types::push::DispatchReport;

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub(crate) struct SendNotificationRequest {
    pub(crate) message: Option<String>,
    #[serde(alias = "groupId")]
    pub(crate) group_id: Option<GroupId>,
}

#[derive(Serialize)]
pub(crate) struct SentResponse {
    pub(crate) success: bool,
    pub(crate) report: ReportSummary,
}

#[derive(Serialize)]
pub(crate) struct ReportSummary {
    pub(crate) attempted: usize,
    pub(crate) succeeded: usize,
    pub(crate) failed: usize,
    pub(crate) skipped: usize,
}

impl From<&DispatchReport> for ReportSummary {
    fn from(report: &DispatchReport) -> Self {
        Self {
            attempted: report.attempted,
            succeeded: report.succeeded,
            failed: report.failed,
            skipped: report.skipped,
        }
    }
}

#[derive(Serialize)]
pub(crate) struct NoDevicesResponse {
    pub(crate) message: &'static str,
}

pub(crate) async fn send_notification<St, C, Tr>(
    State(state): State<AppState<St, C, Tr>>,
    method: Method,
    body: Bytes,
) -> Response
where
    St: ports::SubscriberStore,
    C: ports::CredentialProvider,
    Tr: ports::PushTransport,
{
    if method != Method::POST {
        return (
            StatusCode::METHOD_NOT_ALLOWED,
            Json(ErrorResponse {
                error: "Method Not Allowed".to_string(),
            }),
        )
            .into_response();
    }

    let (group_id, message) = match validate(&body) {
        Ok(valid) => valid,
        Err(err) => return err.into_response(),
    };

    match state.notifier.notify_group(&group_id, &message).await {
        Ok(NotifyOutcome::NoDevices) => Json(NoDevicesResponse {
            message: NO_DEVICES_MESSAGE,
        })
        .into_response(),
        Ok(NotifyOutcome::Dispatched(report)) => {
            tracing::info!(
                %group_id,
                attempted = report.attempted,
                succeeded = report.succeeded,
                failed = report.failed,
                skipped = report.skipped,
                "group notification dispatched"
            );
            Json(SentResponse {
                success: true,
                report: ReportSummary::from(&report),
            })
            .into_response()
        }
        Err(err) => err.into_response(),
    }
}

fn validate(body: &[u8]) -> Result<(GroupId, String), NotifyError> {
    let request: SendNotificationRequest = parse_json_body(body)?;

    let message = request
        .message
        .filter(|message| !message.trim().is_empty())
        .ok_or_else(|| NotifyError::Validation("message must not be empty".to_string()))?;
    let group_id = request
        .group_id
        .filter(|group_id| !group_id.as_str().trim().is_empty())
        .ok_or_else(|| NotifyError::Validation("group_id is required".to_string()))?;

    Ok((group_id, message))
}
