use std::net::SocketAddr;
use std::time::Duration;

use crate::types::push::VapidConfig;

#[derive(Clone)]
pub struct AppConfig {
    pub bind: SocketAddr,
    pub store: StoreConfig,
    pub delivery: DeliveryConfig,
    pub fcm_base_url: String,
    pub send_timeout: Duration,
    pub credential_refresh_margin: time::Duration,
}

#[derive(Clone)]
pub enum StoreConfig {
    Memory,
    Supabase {
        url: String,
        service_role_key: String,
    },
}

/// Exactly one credential variant is active per deployment.
#[derive(Clone)]
pub enum DeliveryConfig {
    Vapid(VapidConfig),
    /// Raw service-account JSON document.
    ServiceAccount(String),
    Missing,
}

impl AppConfig {
    pub fn vapid_public_key(&self) -> Option<&str> {
        match &self.delivery {
            DeliveryConfig::Vapid(vapid) => Some(vapid.public_key.as_str()),
            DeliveryConfig::ServiceAccount(_) | DeliveryConfig::Missing => None,
        }
    }
}

#[cfg(test)]
impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 3000)),
            store: StoreConfig::Memory,
            delivery: DeliveryConfig::Missing,
            fcm_base_url: crate::adapters::DEFAULT_FCM_BASE_URL.to_string(),
            send_timeout: crate::push::dispatcher::DEFAULT_SEND_TIMEOUT,
            credential_refresh_margin: crate::push::credentials::default_refresh_margin(),
        }
    }
}
