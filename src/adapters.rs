use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use serde::Deserialize;
use serde_json::json;
use time::OffsetDateTime;

use crate::error::{CredentialError, DeliveryError};
use crate::ports;
use crate::push::{ServiceAccountProvider, StaticKeyProvider};
use crate::types::device::{DeviceEndpoint, WebPushSubscription};
use crate::types::push::{AccessToken, Credential, NotificationPayload, VapidConfig};

pub mod memory;
pub mod supabase;

pub const DEFAULT_FCM_BASE_URL: &str = "https://fcm.googleapis.com";

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const DEFAULT_TOKEN_LIFETIME_SECS: u64 = 3600;

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioTimeProvider;

impl ports::TimeProvider for TokioTimeProvider {
    type Sleep<'a>
        = tokio::time::Sleep
    where
        Self: 'a;

    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }

    fn sleep<'a>(&'a self, duration: Duration) -> Self::Sleep<'a> {
        tokio::time::sleep(duration)
    }
}

/// Where managed-push messages go: `{base_url}/v1/projects/{project_id}/messages:send`.
#[derive(Debug, Clone)]
pub struct FcmTarget {
    pub base_url: String,
    pub project_id: String,
}

impl FcmTarget {
    fn send_url(&self) -> String {
        format!(
            "{}/v1/projects/{}/messages:send",
            self.base_url.trim_end_matches('/'),
            self.project_id
        )
    }
}

/// Delivers to both endpoint kinds: browser subscriptions through the web
/// push protocol, registration tokens through the managed-push HTTP API.
#[derive(Clone)]
pub struct HttpPushTransport {
    http: reqwest::Client,
    web_push: Arc<web_push::WebPushClient>,
    fcm_send_url: Option<String>,
}

impl HttpPushTransport {
    pub fn new(fcm: Option<FcmTarget>) -> Result<Self, web_push::WebPushError> {
        let web_push = web_push::WebPushClient::new()?;
        Ok(Self {
            http: reqwest::Client::new(),
            web_push: Arc::new(web_push),
            fcm_send_url: fcm.as_ref().map(FcmTarget::send_url),
        })
    }

    async fn send_web_push(
        &self,
        subscription: &WebPushSubscription,
        payload: &NotificationPayload,
        vapid: &VapidConfig,
    ) -> Result<(), DeliveryError> {
        let subscription_info = web_push::SubscriptionInfo::new(
            subscription.endpoint.clone(),
            subscription.p256dh.clone(),
            subscription.auth.clone(),
        );
        let body = payload.to_json_bytes();
        let mut builder = web_push::WebPushMessageBuilder::new(&subscription_info)
            .map_err(|err| DeliveryError::Transport(err.to_string()))?;
        builder.set_payload(web_push::ContentEncoding::Aes128Gcm, &body);
        let mut signature_builder = web_push::VapidSignatureBuilder::from_base64(
            &vapid.private_key,
            web_push::URL_SAFE_NO_PAD,
            &subscription_info,
        )
        .map_err(|err| DeliveryError::Transport(err.to_string()))?;
        signature_builder.add_claim("sub", vapid.subject.as_str());
        let signature = signature_builder
            .build()
            .map_err(|err| DeliveryError::Transport(err.to_string()))?;
        builder.set_vapid_signature(signature);
        let message = builder
            .build()
            .map_err(|err| DeliveryError::Transport(err.to_string()))?;
        self.web_push
            .send(message)
            .await
            .map_err(|err| DeliveryError::Transport(err.to_string()))
    }

    async fn send_managed_push(
        &self,
        token: &str,
        payload: &NotificationPayload,
        access_token: &AccessToken,
    ) -> Result<(), DeliveryError> {
        let url = self
            .fcm_send_url
            .as_deref()
            .ok_or(DeliveryError::Unconfigured)?;
        let body = json!({
            "message": {
                "token": token,
                "notification": {
                    "title": payload.title,
                    "body": payload.body,
                },
                "data": {
                    "url": payload.url,
                },
            },
        });
        let response = self
            .http
            .post(url)
            .bearer_auth(&access_token.token)
            .json(&body)
            .send()
            .await
            .map_err(|err| DeliveryError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DeliveryError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

impl ports::PushTransport for HttpPushTransport {
    type Fut<'a>
        = Pin<Box<dyn Future<Output = Result<(), DeliveryError>> + Send + 'a>>
    where
        Self: 'a;

    fn send<'a>(
        &'a self,
        endpoint: &'a DeviceEndpoint,
        payload: &'a NotificationPayload,
        credential: &'a Credential,
    ) -> Self::Fut<'a> {
        Box::pin(async move {
            match (endpoint, credential) {
                (DeviceEndpoint::WebPush(subscription), Credential::Vapid(vapid)) => {
                    self.send_web_push(subscription, payload, vapid).await
                }
                (DeviceEndpoint::ManagedPush { token }, Credential::Bearer(access_token)) => {
                    self.send_managed_push(token, payload, access_token).await
                }
                (DeviceEndpoint::WebPush(_), _) => Err(DeliveryError::CredentialMismatch("web push")),
                (DeviceEndpoint::ManagedPush { .. }, _) => {
                    Err(DeliveryError::CredentialMismatch("managed push"))
                }
            }
        })
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<u64>,
}

/// OAuth 2.0 JWT-bearer grant against a token endpoint.
#[derive(Clone)]
pub struct OAuthTokenExchanger {
    http: reqwest::Client,
}

impl OAuthTokenExchanger {
    pub fn new() -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self { http })
    }
}

impl ports::TokenExchanger for OAuthTokenExchanger {
    type Fut<'a>
        = BoxFuture<'a, Result<ports::TokenGrant, CredentialError>>
    where
        Self: 'a;

    fn exchange<'a>(&'a self, token_uri: &'a str, assertion: &'a str) -> Self::Fut<'a> {
        Box::pin(async move {
            let response = self
                .http
                .post(token_uri)
                .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion)])
                .send()
                .await
                .map_err(|err| CredentialError::Exchange(err.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                return Err(CredentialError::Exchange(format!(
                    "token endpoint returned status {status}"
                )));
            }

            let token: TokenResponse = response
                .json()
                .await
                .map_err(|err| CredentialError::Exchange(err.to_string()))?;
            Ok(ports::TokenGrant {
                access_token: token.access_token,
                expires_in: token.expires_in.unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS),
            })
        })
    }
}

/// The credential variant active in this deployment.
#[derive(Clone)]
pub enum DeliveryCredentials {
    StaticKey(StaticKeyProvider),
    ServiceAccount(ServiceAccountProvider<TokioTimeProvider, OAuthTokenExchanger>),
    Missing,
}

impl ports::CredentialProvider for DeliveryCredentials {
    type Fut<'a>
        = BoxFuture<'a, Result<Credential, CredentialError>>
    where
        Self: 'a;

    fn credential<'a>(&'a self) -> Self::Fut<'a> {
        Box::pin(async move {
            match self {
                DeliveryCredentials::StaticKey(provider) => provider.credential().await,
                DeliveryCredentials::ServiceAccount(provider) => provider.credential().await,
                DeliveryCredentials::Missing => Err(CredentialError::Missing),
            }
        })
    }
}

#[cfg(test)]
#[allow(non_snake_case)]
pub(crate) mod tests {
    use super::*;
    use jwt_simple::algorithms::ECDSAP256PublicKeyLike;
    use crate::ports::{PushTransport, TokenExchanger};
    use crate::push::payload::build_payload;
    use crate::push::{Dispatcher, ResolvedDevice};
    use axum::Router;
    use axum::extract::{Form, Json as JsonBody, Path, State};
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use std::collections::HashMap;
    use std::sync::Mutex;

    type Captured = Arc<Mutex<Vec<(Option<String>, serde_json::Value)>>>;

    pub(crate) async fn spawn_server(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test listener");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            axum::serve(listener, router).await.expect("test server");
        });
        format!("http://{addr}")
    }

    async fn capture_message(
        State(captured): State<Captured>,
        headers: HeaderMap,
        JsonBody(body): JsonBody<serde_json::Value>,
    ) -> StatusCode {
        let authorization = headers
            .get("authorization")
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let unregistered = body["message"]["token"] == "stale-token";
        captured
            .lock()
            .expect("captured lock")
            .push((authorization, body));
        if unregistered {
            StatusCode::NOT_FOUND
        } else {
            StatusCode::OK
        }
    }

    fn bearer(token: &str) -> Credential {
        Credential::Bearer(AccessToken {
            token: token.to_string(),
            expires_at: OffsetDateTime::now_utc() + time::Duration::hours(1),
        })
    }

    #[tokio::test]
    async fn http_push_transport__should_post_managed_push_message_with_bearer() {
        // Given
        let captured: Captured = Arc::default();
        let router = Router::new()
            .route(
                "/v1/projects/famiglia-test/messages:send",
                post(capture_message),
            )
            .with_state(Arc::clone(&captured));
        let base_url = spawn_server(router).await;
        let transport = HttpPushTransport::new(Some(FcmTarget {
            base_url,
            project_id: "famiglia-test".to_string(),
        }))
        .expect("transport");
        let endpoint = DeviceEndpoint::ManagedPush {
            token: "device-token".to_string(),
        };

        // When
        let result = transport
            .send(&endpoint, &build_payload("Ciao famiglia"), &bearer("ya29.test"))
            .await;

        // Then
        assert!(result.is_ok());
        let captured = captured.lock().expect("captured lock");
        assert_eq!(captured[0].0.as_deref(), Some("Bearer ya29.test"));
        assert_eq!(
            captured[0].1,
            json!({
                "message": {
                    "token": "device-token",
                    "notification": {
                        "title": "Nuova Notifica di Gruppo",
                        "body": "Ciao famiglia",
                    },
                    "data": { "url": "/" },
                },
            })
        );
    }

    #[tokio::test]
    async fn http_push_transport__should_report_rejected_tokens() {
        // Given
        let captured: Captured = Arc::default();
        let router = Router::new()
            .route(
                "/v1/projects/famiglia-test/messages:send",
                post(capture_message),
            )
            .with_state(captured);
        let base_url = spawn_server(router).await;
        let transport = HttpPushTransport::new(Some(FcmTarget {
            base_url,
            project_id: "famiglia-test".to_string(),
        }))
        .expect("transport");
        let endpoint = DeviceEndpoint::ManagedPush {
            token: "stale-token".to_string(),
        };

        // When
        let result = transport
            .send(&endpoint, &build_payload("Ciao"), &bearer("ya29.test"))
            .await;

        // Then
        assert!(matches!(
            result,
            Err(DeliveryError::Rejected { status: 404, .. })
        ));
    }

    type PushLog = Arc<Mutex<Vec<(String, HeaderMap, usize)>>>;

    /// Push service stand-in: `/push/gone` answers 410 like an expired
    /// subscription, every other endpoint accepts the message.
    async fn push_service(
        State(log): State<PushLog>,
        Path(id): Path<String>,
        headers: HeaderMap,
        body: axum::body::Bytes,
    ) -> StatusCode {
        let gone = id == "gone";
        log.lock()
            .expect("push log lock")
            .push((id, headers, body.len()));
        if gone {
            StatusCode::GONE
        } else {
            StatusCode::CREATED
        }
    }

    async fn spawn_push_service() -> (String, PushLog) {
        let log: PushLog = Arc::default();
        let router = Router::new()
            .route("/push/{id}", post(push_service))
            .with_state(Arc::clone(&log));
        (spawn_server(router).await, log)
    }

    fn browser_subscription(endpoint: String) -> WebPushSubscription {
        let browser_key = jwt_simple::prelude::ES256KeyPair::generate();
        let p256dh = browser_key.public_key().public_key().to_bytes_uncompressed();
        WebPushSubscription {
            endpoint,
            p256dh: base64::encode_config(p256dh, base64::URL_SAFE_NO_PAD),
            auth: base64::encode_config([7u8; 16], base64::URL_SAFE_NO_PAD),
        }
    }

    fn vapid_credential() -> Credential {
        let credentials = crate::push::vapid::generate_vapid_credentials().expect("vapid keys");
        Credential::Vapid(VapidConfig {
            private_key: credentials.private_key,
            public_key: credentials.public_key,
            subject: "mailto:famiglia@example.com".to_string(),
        })
    }

    #[tokio::test]
    async fn http_push_transport__should_deliver_encrypted_web_push_with_vapid() {
        // Given
        let (base_url, log) = spawn_push_service().await;
        let transport = HttpPushTransport::new(None).expect("transport");
        let endpoint =
            DeviceEndpoint::WebPush(browser_subscription(format!("{base_url}/push/anna")));

        // When
        let result = transport
            .send(&endpoint, &build_payload("Ciao famiglia"), &vapid_credential())
            .await;

        // Then
        assert!(result.is_ok(), "{result:?}");
        let log = log.lock().expect("push log lock");
        let (id, headers, body_len) = &log[0];
        assert_eq!(id, "anna");
        let authorization = headers
            .get("authorization")
            .and_then(|value| value.to_str().ok())
            .expect("authorization header");
        assert!(authorization.starts_with("vapid t="), "{authorization}");
        assert!(authorization.contains(", k="), "{authorization}");
        assert_eq!(headers["content-encoding"], "aes128gcm");
        assert!(*body_len > "Ciao famiglia".len());
    }

    #[tokio::test]
    async fn dispatcher__should_record_expired_web_push_subscription() {
        // Given
        let (base_url, log) = spawn_push_service().await;
        let transport = HttpPushTransport::new(None).expect("transport");
        let devices: Vec<ResolvedDevice> = ["anna", "gone"]
            .into_iter()
            .map(|id| ResolvedDevice {
                user_id: crate::types::group::UserId::from(id),
                endpoint: Ok(DeviceEndpoint::WebPush(browser_subscription(format!(
                    "{base_url}/push/{id}"
                )))),
            })
            .collect();
        let dispatcher = Dispatcher::new(transport, TokioTimeProvider, Duration::from_secs(5));

        // When
        let report = dispatcher
            .dispatch(&devices, &build_payload("Ciao"), &vapid_credential())
            .await;

        // Then
        assert_eq!(report.attempted, 2);
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.failures[0].endpoint, format!("{base_url}/push/gone"));
        assert_eq!(log.lock().expect("push log lock").len(), 2);
    }

    #[tokio::test]
    async fn http_push_transport__should_reject_mismatched_credentials() {
        // Given
        let transport = HttpPushTransport::new(None).expect("transport");
        let endpoint = DeviceEndpoint::WebPush(WebPushSubscription {
            endpoint: "https://push.example/1".to_string(),
            p256dh: "p256".to_string(),
            auth: "auth".to_string(),
        });

        // When
        let result = transport
            .send(&endpoint, &build_payload("Ciao"), &bearer("ya29.test"))
            .await;

        // Then
        assert!(matches!(
            result,
            Err(DeliveryError::CredentialMismatch("web push"))
        ));
    }

    #[tokio::test]
    async fn oauth_token_exchanger__should_post_jwt_bearer_grant() {
        // Given
        let forms: Arc<Mutex<Vec<HashMap<String, String>>>> = Arc::default();
        let router = Router::new()
            .route(
                "/token",
                post(
                    |State(forms): State<Arc<Mutex<Vec<HashMap<String, String>>>>>,
                     Form(form): Form<HashMap<String, String>>| async move {
                        forms.lock().expect("forms lock").push(form);
                        axum::Json(json!({
                            "access_token": "ya29.fresh",
                            "expires_in": 3599,
                            "token_type": "Bearer",
                        }))
                    },
                ),
            )
            .with_state(Arc::clone(&forms));
        let base_url = spawn_server(router).await;
        let exchanger = OAuthTokenExchanger::new().expect("exchanger");

        // When
        let grant = exchanger
            .exchange(&format!("{base_url}/token"), "signed.assertion.jwt")
            .await
            .expect("grant");

        // Then
        assert_eq!(grant.access_token, "ya29.fresh");
        assert_eq!(grant.expires_in, 3599);
        let forms = forms.lock().expect("forms lock");
        assert_eq!(forms[0]["grant_type"], JWT_BEARER_GRANT);
        assert_eq!(forms[0]["assertion"], "signed.assertion.jwt");
    }

    #[tokio::test]
    async fn oauth_token_exchanger__should_fail_on_error_status() {
        // Given
        let router = Router::new().route(
            "/token",
            post(|| async { (StatusCode::BAD_REQUEST, "invalid_grant") }),
        );
        let base_url = spawn_server(router).await;
        let exchanger = OAuthTokenExchanger::new().expect("exchanger");

        // When
        let result = exchanger
            .exchange(&format!("{base_url}/token"), "signed.assertion.jwt")
            .await;

        // Then
        assert!(matches!(result, Err(CredentialError::Exchange(_))));
    }

    #[tokio::test]
    async fn delivery_credentials__should_fail_when_missing() {
        use crate::ports::CredentialProvider;

        let result = DeliveryCredentials::Missing.credential().await;

        assert!(matches!(result, Err(CredentialError::Missing)));
    }
}
