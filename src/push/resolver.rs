use crate::error::LookupError;
use crate::ports;
use crate::types::device::{DeviceEndpoint, EndpointParseError};
use crate::types::group::{GroupId, UserId};

/// A device of a group member. Records that fail to parse are kept so the
/// dispatcher can report them instead of aborting the whole resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDevice {
    pub user_id: UserId,
    pub endpoint: Result<DeviceEndpoint, EndpointParseError>,
}

impl ResolvedDevice {
    pub fn identity(&self) -> String {
        match &self.endpoint {
            Ok(endpoint) => endpoint.identity(),
            Err(_) => format!("user:{}", self.user_id),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SubscriberResolver<St> {
    store: St,
}

impl<St: ports::SubscriberStore> SubscriberResolver<St> {
    pub fn new(store: St) -> Self {
        Self { store }
    }

    pub async fn resolve(&self, group_id: &GroupId) -> Result<Vec<ResolvedDevice>, LookupError> {
        let user_ids = self.store.list_member_user_ids(group_id).await?;
        if user_ids.is_empty() {
            tracing::debug!(%group_id, "group has no members");
            return Ok(Vec::new());
        }

        let records = self.store.list_device_records(&user_ids).await?;
        tracing::debug!(
            %group_id,
            members = user_ids.len(),
            devices = records.len(),
            "resolved group devices"
        );
        Ok(records
            .into_iter()
            .map(|record| ResolvedDevice {
                endpoint: DeviceEndpoint::parse(&record.push_token),
                user_id: record.user_id,
            })
            .collect())
    }
}
