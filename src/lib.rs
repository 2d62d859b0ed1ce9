//! Push notifications for family groups: resolve a group's member devices,
//! authorize with the configured delivery credential and fan the message out.

pub mod adapters;
pub mod app;
pub mod config;
pub mod error;
pub mod ports;
pub mod push;
pub mod state;
pub mod types;

pub use push::vapid::{
    VapidCredentials, VapidKeyError, check_private_key, check_public_key,
    generate_vapid_credentials,
};

use adapters::memory::MemoryStore;
use adapters::supabase::SupabaseStore;
use adapters::{
    DeliveryCredentials, FcmTarget, HttpPushTransport, OAuthTokenExchanger, TokioTimeProvider,
};
use config::{AppConfig, DeliveryConfig, StoreConfig};
use error::{CredentialError, LookupError};
use push::{
    Dispatcher, NotificationService, ServiceAccount, ServiceAccountProvider, StaticKeyProvider,
    SubscriberResolver,
};
use state::AppState;

#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    #[error("invalid store configuration: {0}")]
    Store(#[from] LookupError),
    #[error("invalid delivery credentials: {0}")]
    Credentials(#[from] CredentialError),
    #[error("invalid VAPID {which} key: {source}")]
    VapidKey {
        which: &'static str,
        source: VapidKeyError,
    },
    #[error("failed to build push client: {0}")]
    Client(String),
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        source: std::io::Error,
    },
    #[error("server error: {0}")]
    Server(std::io::Error),
}

pub async fn serve(config: AppConfig) -> Result<(), ServeError> {
    match config.store.clone() {
        StoreConfig::Memory => {
            tracing::warn!("using in-memory store; groups and devices are lost on restart");
            run(config, MemoryStore::default()).await
        }
        StoreConfig::Supabase {
            url,
            service_role_key,
        } => {
            let store = SupabaseStore::new(&url, &service_role_key)?;
            tracing::info!(%url, "using supabase store");
            run(config, store).await
        }
    }
}

async fn run<St: ports::SubscriberStore>(config: AppConfig, store: St) -> Result<(), ServeError> {
    let (credentials, fcm) = delivery_credentials(&config)?;
    let transport =
        HttpPushTransport::new(fcm).map_err(|err| ServeError::Client(err.to_string()))?;
    let dispatcher = Dispatcher::new(transport, TokioTimeProvider, config.send_timeout);
    let notifier = NotificationService::new(
        SubscriberResolver::new(store.clone()),
        credentials,
        dispatcher,
    );

    let addr = config.bind;
    let state = AppState {
        config,
        store,
        notifier,
    };
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| ServeError::Bind { addr, source })?;
    tracing::info!("listening on http://{addr}");
    axum::serve(listener, app::app(state))
        .await
        .map_err(ServeError::Server)
}

fn delivery_credentials(
    config: &AppConfig,
) -> Result<(DeliveryCredentials, Option<FcmTarget>), ServeError> {
    match &config.delivery {
        DeliveryConfig::Vapid(vapid) => {
            check_public_key(&vapid.public_key).map_err(|source| ServeError::VapidKey {
                which: "public",
                source,
            })?;
            check_private_key(&vapid.private_key).map_err(|source| ServeError::VapidKey {
                which: "private",
                source,
            })?;
            tracing::info!(subject = %vapid.subject, "delivering with VAPID key pair");
            Ok((
                DeliveryCredentials::StaticKey(StaticKeyProvider::new(vapid.clone())),
                None,
            ))
        }
        DeliveryConfig::ServiceAccount(raw) => {
            let account = ServiceAccount::from_json(raw)?;
            let fcm = match account.project_id.clone() {
                Some(project_id) => Some(FcmTarget {
                    base_url: config.fcm_base_url.clone(),
                    project_id,
                }),
                None => {
                    tracing::warn!(
                        "service account has no project_id; managed-push devices cannot be reached"
                    );
                    None
                }
            };
            tracing::info!(
                client_email = %account.client_email,
                "delivering with service account"
            );
            let exchanger =
                OAuthTokenExchanger::new().map_err(|err| ServeError::Client(err.to_string()))?;
            let provider = ServiceAccountProvider::new(
                account,
                TokioTimeProvider,
                exchanger,
                config.credential_refresh_margin,
            );
            Ok((DeliveryCredentials::ServiceAccount(provider), fcm))
        }
        DeliveryConfig::Missing => {
            tracing::warn!("no push delivery credentials configured; notifications will fail");
            Ok((DeliveryCredentials::Missing, None))
        }
    }
}
