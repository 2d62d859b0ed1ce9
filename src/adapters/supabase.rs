use reqwest::header::{HeaderMap, HeaderValue};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;

use crate::error::LookupError;
use crate::ports::SubscriberStore;
use crate::ports::store::StoreFuture;
use crate::types::device::{DeviceEndpoint, DeviceRecord};
use crate::types::group::{Group, GroupId, UserId};

const GROUPS: &str = "groups";
const GROUP_MEMBERS: &str = "group_members";
const USER_DEVICES: &str = "user_devices";

/// Store backed by a Supabase project's PostgREST API, authenticated with the
/// service-role key.
///
/// Expected tables: `groups(id, name)`, `group_members(group_id, user_id)`
/// unique on both columns, and `user_devices(user_id, endpoint_key,
/// push_token)` unique on `(user_id, endpoint_key)`.
#[derive(Clone)]
pub struct SupabaseStore {
    http: reqwest::Client,
    rest_url: String,
}

#[derive(Deserialize)]
struct MemberRow {
    user_id: UserId,
}

impl SupabaseStore {
    pub fn new(url: &str, service_role_key: &str) -> Result<Self, LookupError> {
        let key = HeaderValue::from_str(service_role_key)
            .map_err(|_| LookupError::Transport("service role key is not a valid header".to_string()))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {service_role_key}"))
            .map_err(|_| LookupError::Transport("service role key is not a valid header".to_string()))?;
        let mut headers = HeaderMap::new();
        headers.insert("apikey", key);
        headers.insert(reqwest::header::AUTHORIZATION, bearer);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|err| LookupError::Transport(err.to_string()))?;

        Ok(Self {
            http,
            rest_url: rest_url(url),
        })
    }

    fn table(&self, table: &str) -> String {
        format!("{}/{table}", self.rest_url)
    }

    async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>, LookupError> {
        let response = self
            .http
            .get(self.table(table))
            .query(query)
            .send()
            .await
            .map_err(|err| LookupError::Transport(err.to_string()))?;
        read_json(response).await
    }

    async fn upsert(
        &self,
        table: &str,
        on_conflict: &str,
        row: serde_json::Value,
    ) -> Result<(), LookupError> {
        let response = self
            .http
            .post(self.table(table))
            .query(&[("on_conflict", on_conflict)])
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(&row)
            .send()
            .await
            .map_err(|err| LookupError::Transport(err.to_string()))?;
        ensure_success(response).await.map(|_| ())
    }
}

impl SubscriberStore for SupabaseStore {
    fn find_group_by_name<'a>(&'a self, name: &'a str) -> StoreFuture<'a, Option<Group>> {
        Box::pin(async move {
            let groups: Vec<Group> = self
                .select(
                    GROUPS,
                    &[
                        ("select", "id,name".to_string()),
                        ("name", format!("eq.{name}")),
                        ("order", "id.asc".to_string()),
                        ("limit", "1".to_string()),
                    ],
                )
                .await?;
            Ok(groups.into_iter().next())
        })
    }

    fn create_group<'a>(&'a self, name: &'a str) -> StoreFuture<'a, Group> {
        Box::pin(async move {
            let response = self
                .http
                .post(self.table(GROUPS))
                .query(&[("select", "id,name")])
                .header("Prefer", "return=representation")
                .json(&json!({ "name": name }))
                .send()
                .await
                .map_err(|err| LookupError::Transport(err.to_string()))?;
            let groups: Vec<Group> = read_json(response).await?;
            groups
                .into_iter()
                .next()
                .ok_or_else(|| LookupError::Decode("insert returned no group".to_string()))
        })
    }

    fn list_member_user_ids<'a>(&'a self, group_id: &'a GroupId) -> StoreFuture<'a, Vec<UserId>> {
        Box::pin(async move {
            let rows: Vec<MemberRow> = self
                .select(
                    GROUP_MEMBERS,
                    &[
                        ("select", "user_id".to_string()),
                        ("group_id", format!("eq.{group_id}")),
                    ],
                )
                .await?;
            Ok(rows.into_iter().map(|row| row.user_id).collect())
        })
    }

    fn upsert_membership<'a>(
        &'a self,
        group_id: &'a GroupId,
        user_id: &'a UserId,
    ) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            self.upsert(
                GROUP_MEMBERS,
                "group_id,user_id",
                json!({ "group_id": group_id, "user_id": user_id }),
            )
            .await
        })
    }

    fn list_device_records<'a>(
        &'a self,
        user_ids: &'a [UserId],
    ) -> StoreFuture<'a, Vec<DeviceRecord>> {
        Box::pin(async move {
            if user_ids.is_empty() {
                return Ok(Vec::new());
            }
            self.select(
                USER_DEVICES,
                &[
                    ("select", "user_id,push_token".to_string()),
                    ("user_id", in_filter(user_ids)),
                ],
            )
            .await
        })
    }

    fn upsert_device<'a>(
        &'a self,
        user_id: &'a UserId,
        endpoint: &'a DeviceEndpoint,
    ) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            self.upsert(
                USER_DEVICES,
                "user_id,endpoint_key",
                json!({
                    "user_id": user_id,
                    "endpoint_key": endpoint.dedup_key(),
                    "push_token": endpoint.to_push_token(),
                }),
            )
            .await
        })
    }
}

fn rest_url(project_url: &str) -> String {
    format!("{}/rest/v1", project_url.trim_end_matches('/'))
}

/// PostgREST `in.(...)` filter with every value double-quoted.
fn in_filter(user_ids: &[UserId]) -> String {
    let values: Vec<String> = user_ids
        .iter()
        .map(|id| format!("\"{}\"", id.as_str().replace('\\', "\\\\").replace('"', "\\\"")))
        .collect();
    format!("in.({})", values.join(","))
}

async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, LookupError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(LookupError::Status {
        status: status.as_u16(),
        message,
    })
}

async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, LookupError> {
    ensure_success(response)
        .await?
        .json()
        .await
        .map_err(|err| LookupError::Decode(err.to_string()))
}
