use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::types::group::UserId;

/// A device subscription as it sits in the store: the endpoint descriptor is
/// kept serialized in `push_token`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub user_id: UserId,
    pub push_token: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebPushSubscription {
    pub endpoint: String,
    pub p256dh: String,
    pub auth: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceEndpoint {
    WebPush(WebPushSubscription),
    ManagedPush { token: String },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EndpointParseError {
    #[error("push token is not valid JSON: {0}")]
    InvalidJson(String),
    #[error("push token has no recognised endpoint shape")]
    UnknownShape,
    #[error("push token field '{0}' is empty")]
    EmptyField(&'static str),
}

#[derive(Deserialize)]
struct StoredKeys {
    p256dh: String,
    auth: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StoredEndpoint {
    WebPush {
        endpoint: String,
        keys: StoredKeys,
    },
    ManagedPush {
        #[serde(alias = "fcmToken")]
        token: String,
    },
}

impl DeviceEndpoint {
    pub fn parse(raw: &str) -> Result<Self, EndpointParseError> {
        let value: serde_json::Value = serde_json::from_str(raw)
            .map_err(|err| EndpointParseError::InvalidJson(err.to_string()))?;
        Self::from_value(value)
    }

    pub fn from_value(value: serde_json::Value) -> Result<Self, EndpointParseError> {
        let stored: StoredEndpoint =
            serde_json::from_value(value).map_err(|_| EndpointParseError::UnknownShape)?;
        match stored {
            StoredEndpoint::WebPush { endpoint, keys } => {
                non_empty("endpoint", &endpoint)?;
                non_empty("p256dh", &keys.p256dh)?;
                non_empty("auth", &keys.auth)?;
                Ok(DeviceEndpoint::WebPush(WebPushSubscription {
                    endpoint,
                    p256dh: keys.p256dh,
                    auth: keys.auth,
                }))
            }
            StoredEndpoint::ManagedPush { token } => {
                non_empty("fcmToken", &token)?;
                Ok(DeviceEndpoint::ManagedPush { token })
            }
        }
    }

    /// Serialized form written back to the store. Mirrors what browsers and
    /// the managed-push SDK hand to the client.
    pub fn to_push_token(&self) -> String {
        match self {
            DeviceEndpoint::WebPush(subscription) => json!({
                "endpoint": subscription.endpoint,
                "keys": {
                    "p256dh": subscription.p256dh,
                    "auth": subscription.auth,
                },
            })
            .to_string(),
            DeviceEndpoint::ManagedPush { token } => json!({ "fcmToken": token }).to_string(),
        }
    }

    /// Identity safe to put in logs and failure reports.
    pub fn identity(&self) -> String {
        match self {
            DeviceEndpoint::WebPush(subscription) => subscription.endpoint.clone(),
            DeviceEndpoint::ManagedPush { token } => {
                let prefix: String = token.chars().take(12).collect();
                format!("fcm:{prefix}...")
            }
        }
    }

    /// Key a store uses to decide whether a registration replaces an
    /// existing device of the same user.
    pub fn dedup_key(&self) -> &str {
        match self {
            DeviceEndpoint::WebPush(subscription) => &subscription.endpoint,
            DeviceEndpoint::ManagedPush { token } => token,
        }
    }
}

fn non_empty(field: &'static str, value: &str) -> Result<(), EndpointParseError> {
    if value.trim().is_empty() {
        return Err(EndpointParseError::EmptyField(field));
    }
    Ok(())
}

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use super::*;

    #[test]
    fn parse__should_read_browser_subscription_json() {
        // Given
        let raw = r#"{"endpoint":"https://push.example/abc","expirationTime":null,"keys":{"p256dh":"BNc","auth":"tBH"}}"#;

        // When
        let endpoint = DeviceEndpoint::parse(raw).expect("parse endpoint");

        // Then
        assert_eq!(
            endpoint,
            DeviceEndpoint::WebPush(WebPushSubscription {
                endpoint: "https://push.example/abc".to_string(),
                p256dh: "BNc".to_string(),
                auth: "tBH".to_string(),
            })
        );
    }

    #[test]
    fn parse__should_read_managed_push_token() {
        let endpoint = DeviceEndpoint::parse(r#"{"fcmToken":"dQw4w9WgXcQ:APA91b"}"#)
            .expect("parse endpoint");

        assert_eq!(
            endpoint,
            DeviceEndpoint::ManagedPush {
                token: "dQw4w9WgXcQ:APA91b".to_string()
            }
        );
    }

    #[test]
    fn parse__should_reject_malformed_records() {
        assert!(matches!(
            DeviceEndpoint::parse("not json"),
            Err(EndpointParseError::InvalidJson(_))
        ));
        assert_eq!(
            DeviceEndpoint::parse(r#"{"endpoint":"https://push.example/abc"}"#),
            Err(EndpointParseError::UnknownShape)
        );
        assert_eq!(
            DeviceEndpoint::parse(r#"{"fcmToken":"  "}"#),
            Err(EndpointParseError::EmptyField("fcmToken"))
        );
        assert_eq!(
            DeviceEndpoint::parse(r#"{"endpoint":"","keys":{"p256dh":"a","auth":"b"}}"#),
            Err(EndpointParseError::EmptyField("endpoint"))
        );
    }

    #[test]
    fn to_push_token__should_parse_back_to_the_same_endpoint() {
        // Given
        let endpoint = DeviceEndpoint::WebPush(WebPushSubscription {
            endpoint: "https://push.example/abc".to_string(),
            p256dh: "BNc".to_string(),
            auth: "tBH".to_string(),
        });

        // When
        let parsed = DeviceEndpoint::parse(&endpoint.to_push_token()).expect("parse back");

        // Then
        assert_eq!(parsed, endpoint);
    }

    #[test]
    fn identity__should_not_expose_full_managed_token() {
        let endpoint = DeviceEndpoint::ManagedPush {
            token: "abcdefghijklmnopqrstuvwxyz".to_string(),
        };

        assert_eq!(endpoint.identity(), "fcm:abcdefghijkl...");
    }
}
