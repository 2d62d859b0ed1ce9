use crate::error::NotifyError;
use crate::ports;
use crate::types::group::GroupId;
use crate::types::push::DispatchReport;

use futures_util::future::BoxFuture;

pub mod credentials;
pub mod dispatcher;
pub mod payload;
pub mod resolver;
pub mod vapid;

pub use credentials::{ServiceAccount, ServiceAccountProvider, StaticKeyProvider};
pub use dispatcher::Dispatcher;
pub use resolver::{ResolvedDevice, SubscriberResolver};

pub const NO_DEVICES_MESSAGE: &str = "Nessun dispositivo trovato.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyOutcome {
    NoDevices,
    Dispatched(DispatchReport),
}

/// Resolves a group, authorizes, and fans a message out to every device.
///
/// Lookup and credential failures end the request; delivery failures only
/// show up in the returned report.
#[derive(Debug, Clone)]
pub struct NotificationService<St, C, Tr, T> {
    resolver: SubscriberResolver<St>,
    credentials: C,
    dispatcher: Dispatcher<Tr, T>,
}

impl<St, C, Tr, T> NotificationService<St, C, Tr, T>
where
    St: ports::SubscriberStore,
    C: ports::CredentialProvider,
    Tr: ports::PushTransport,
    T: ports::TimeProvider,
{
    pub fn new(
        resolver: SubscriberResolver<St>,
        credentials: C,
        dispatcher: Dispatcher<Tr, T>,
    ) -> Self {
        Self {
            resolver,
            credentials,
            dispatcher,
        }
    }

    pub fn notify_group<'a>(
        &'a self,
        group_id: &'a GroupId,
        message: &'a str,
    ) -> BoxFuture<'a, Result<NotifyOutcome, NotifyError>> {
        Box::pin(async move {
            let devices = self.resolver.resolve(group_id).await?;
            if devices.is_empty() {
                tracing::info!(%group_id, "no devices registered for group");
                return Ok(NotifyOutcome::NoDevices);
            }

            let credential = self.credentials.credential().await?;
            let payload = payload::build_payload(message);
            let report = self.dispatcher.dispatch(&devices, &payload, &credential).await;
            Ok(NotifyOutcome::Dispatched(report))
        })
    }
}

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use super::*;
    use crate::adapters::memory::MemoryStore;
    use crate::error::CredentialError;
    use crate::ports::SubscriberStore;
    use crate::push::dispatcher::tests::{TestTime, TestTransport, vapid_credential};
    use crate::types::device::{DeviceEndpoint, WebPushSubscription};
    use crate::types::group::UserId;
    use crate::types::push::Credential;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Clone)]
    struct CountingCredentials {
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    impl ports::CredentialProvider for CountingCredentials {
        type Fut<'a>
            = std::future::Ready<Result<Credential, CredentialError>>
        where
            Self: 'a;

        fn credential<'a>(&'a self) -> Self::Fut<'a> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return std::future::ready(Err(CredentialError::Missing));
            }
            std::future::ready(Ok(vapid_credential()))
        }
    }

    fn service(
        store: MemoryStore,
        transport: TestTransport,
        fail_credentials: bool,
    ) -> (
        NotificationService<MemoryStore, CountingCredentials, TestTransport, TestTime>,
        Arc<AtomicUsize>,
    ) {
        let calls = Arc::new(AtomicUsize::new(0));
        let credentials = CountingCredentials {
            calls: Arc::clone(&calls),
            fail: fail_credentials,
        };
        let dispatcher = Dispatcher::new(
            transport,
            TestTime {
                timeouts_fire: false,
            },
            dispatcher::DEFAULT_SEND_TIMEOUT,
        );
        (
            NotificationService::new(SubscriberResolver::new(store), credentials, dispatcher),
            calls,
        )
    }

    async fn group_with_device(store: &MemoryStore) -> GroupId {
        let group = store.create_group("famiglia").await.expect("group");
        let anna = UserId::from("anna");
        store.upsert_membership(&group.id, &anna).await.expect("member");
        store
            .upsert_device(
                &anna,
                &DeviceEndpoint::WebPush(WebPushSubscription {
                    endpoint: "https://push.example/anna".to_string(),
                    p256dh: "p256".to_string(),
                    auth: "auth".to_string(),
                }),
            )
            .await
            .expect("device");
        group.id
    }

    #[tokio::test]
    async fn notify_group__should_skip_credentials_when_no_devices() {
        // Given
        let store = MemoryStore::default();
        let group = store.create_group("famiglia").await.expect("group");
        let (service, calls) = service(store, TestTransport::default(), false);

        // When
        let outcome = service
            .notify_group(&group.id, "Ciao")
            .await
            .expect("notify");

        // Then
        assert_eq!(outcome, NotifyOutcome::NoDevices);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn notify_group__should_dispatch_to_resolved_devices() {
        // Given
        let store = MemoryStore::default();
        let group_id = group_with_device(&store).await;
        let transport = TestTransport::default();
        let (service, calls) = service(store, transport.clone(), false);

        // When
        let outcome = service
            .notify_group(&group_id, "Ciao famiglia")
            .await
            .expect("notify");

        // Then
        let NotifyOutcome::Dispatched(report) = outcome else {
            panic!("expected dispatch");
        };
        assert_eq!(report.succeeded, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(transport.sent_endpoints(), vec!["https://push.example/anna"]);
    }

    #[tokio::test]
    async fn notify_group__should_stop_on_credential_failure() {
        // Given
        let store = MemoryStore::default();
        let group_id = group_with_device(&store).await;
        let transport = TestTransport::default();
        let (service, _) = service(store, transport.clone(), true);

        // When
        let result = service.notify_group(&group_id, "Ciao").await;

        // Then
        assert!(matches!(result, Err(NotifyError::Credential(_))));
        assert!(transport.sent_endpoints().is_empty());
    }
}
