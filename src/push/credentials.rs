use jwt_simple::algorithms::RSAKeyPairLike;
use jwt_simple::prelude::{Claims, Duration as JwtDuration, RS256KeyPair};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use std::sync::{Arc, RwLock};

use crate::error::CredentialError;
use crate::ports;
use crate::push::vapid;
use crate::types::push::{AccessToken, Credential, VapidConfig};

pub const FCM_SCOPE: &str = "https://www.googleapis.com/auth/firebase.messaging";
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

const ASSERTION_TTL_SECS: u64 = 3600;
const MAX_TOKEN_LIFETIME_SECS: u64 = 86_400;

pub fn default_refresh_margin() -> Duration {
    Duration::minutes(5)
}

/// Signs every push request directly with a static VAPID key pair.
#[derive(Debug, Clone)]
pub struct StaticKeyProvider {
    vapid: VapidConfig,
}

impl StaticKeyProvider {
    pub fn new(vapid: VapidConfig) -> Self {
        Self { vapid }
    }

    pub fn public_key(&self) -> &str {
        &self.vapid.public_key
    }

    fn validated(&self) -> Result<Credential, CredentialError> {
        vapid::check_private_key(&self.vapid.private_key)
            .map_err(|err| CredentialError::MalformedKey(format!("private key: {err}")))?;
        vapid::check_public_key(&self.vapid.public_key)
            .map_err(|err| CredentialError::MalformedKey(format!("public key: {err}")))?;
        if self.vapid.subject.trim().is_empty() {
            return Err(CredentialError::MalformedKey(
                "subject must not be empty".to_string(),
            ));
        }
        Ok(Credential::Vapid(self.vapid.clone()))
    }
}

impl ports::CredentialProvider for StaticKeyProvider {
    type Fut<'a>
        = std::future::Ready<Result<Credential, CredentialError>>
    where
        Self: 'a;

    fn credential<'a>(&'a self) -> Self::Fut<'a> {
        std::future::ready(self.validated())
    }
}

#[derive(Deserialize)]
struct ServiceAccountDocument {
    client_email: String,
    private_key: String,
    project_id: Option<String>,
    private_key_id: Option<String>,
    token_uri: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct ScopeClaims {
    scope: String,
}

/// Parsed service-account document with its signing key loaded.
#[derive(Clone)]
pub struct ServiceAccount {
    pub client_email: String,
    pub project_id: Option<String>,
    pub token_uri: String,
    key_pair: Arc<RS256KeyPair>,
}

impl std::fmt::Debug for ServiceAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccount")
            .field("client_email", &self.client_email)
            .field("project_id", &self.project_id)
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}

impl ServiceAccount {
    pub fn from_json(raw: &str) -> Result<Self, CredentialError> {
        let document: ServiceAccountDocument = serde_json::from_str(raw)
            .map_err(|err| CredentialError::MalformedServiceAccount(err.to_string()))?;
        if document.client_email.trim().is_empty() {
            return Err(CredentialError::MalformedServiceAccount(
                "client_email is empty".to_string(),
            ));
        }

        // Keys pasted into env files often carry literal "\n" sequences.
        let pem = document.private_key.replace("\\n", "\n");
        let mut key_pair = RS256KeyPair::from_pem(&pem)
            .map_err(|err| CredentialError::MalformedKey(err.to_string()))?;
        if let Some(key_id) = document.private_key_id.as_deref() {
            key_pair = key_pair.with_key_id(key_id);
        }

        Ok(Self {
            client_email: document.client_email,
            project_id: document.project_id,
            token_uri: document
                .token_uri
                .unwrap_or_else(|| DEFAULT_TOKEN_URI.to_string()),
            key_pair: Arc::new(key_pair),
        })
    }

    pub(crate) fn sign_assertion(&self) -> Result<String, CredentialError> {
        let claims = Claims::with_custom_claims(
            ScopeClaims {
                scope: FCM_SCOPE.to_string(),
            },
            JwtDuration::from_secs(ASSERTION_TTL_SECS),
        )
        .with_issuer(&self.client_email)
        .with_audience(&self.token_uri);
        self.key_pair
            .sign(claims)
            .map_err(|err| CredentialError::Signing(err.to_string()))
    }
}

/// Exchanges a signed service-account assertion for a bearer token and keeps
/// it until it is within `refresh_margin` of expiring. Clones share the cache.
#[derive(Clone)]
pub struct ServiceAccountProvider<T, X> {
    account: ServiceAccount,
    time: T,
    exchanger: X,
    refresh_margin: Duration,
    cache: Arc<RwLock<Option<AccessToken>>>,
}

impl<T, X> ServiceAccountProvider<T, X>
where
    T: ports::TimeProvider,
    X: ports::TokenExchanger,
{
    pub fn new(account: ServiceAccount, time: T, exchanger: X, refresh_margin: Duration) -> Self {
        Self {
            account,
            time,
            exchanger,
            refresh_margin,
            cache: Arc::new(RwLock::new(None)),
        }
    }

    pub fn account(&self) -> &ServiceAccount {
        &self.account
    }

    pub async fn access_token(&self) -> Result<AccessToken, CredentialError> {
        let now = self.time.now();
        if let Some(token) = self.cached(now) {
            return Ok(token);
        }

        let assertion = self.account.sign_assertion()?;
        let grant = self
            .exchanger
            .exchange(&self.account.token_uri, &assertion)
            .await
            .inspect_err(|err| tracing::error!(error = %err, "access token exchange failed"))?;
        if grant.access_token.trim().is_empty() {
            return Err(CredentialError::Exchange(
                "token endpoint returned an empty access token".to_string(),
            ));
        }

        let lifetime = grant.expires_in.min(MAX_TOKEN_LIFETIME_SECS) as i64;
        let token = AccessToken {
            token: grant.access_token,
            expires_at: now + Duration::seconds(lifetime),
        };
        // Only a complete token ever lands in the cache.
        *self.cache.write().expect("credential cache lock") = Some(token.clone());
        tracing::info!(expires_at = %token.expires_at, "refreshed push access token");
        Ok(token)
    }

    fn cached(&self, now: OffsetDateTime) -> Option<AccessToken> {
        let guard = self.cache.read().expect("credential cache lock");
        guard
            .as_ref()
            .filter(|token| {
                token
                    .expires_at
                    .checked_sub(self.refresh_margin)
                    .is_some_and(|refresh_at| refresh_at > now)
            })
            .cloned()
    }
}

impl<T, X> ports::CredentialProvider for ServiceAccountProvider<T, X>
where
    T: ports::TimeProvider,
    X: ports::TokenExchanger,
{
    type Fut<'a>
        = futures_util::future::BoxFuture<'a, Result<Credential, CredentialError>>
    where
        Self: 'a;

    fn credential<'a>(&'a self) -> Self::Fut<'a> {
        Box::pin(async move { self.access_token().await.map(Credential::Bearer) })
    }
}
