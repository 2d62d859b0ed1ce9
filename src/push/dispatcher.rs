use futures_util::future::{BoxFuture, join_all};

use std::time::Duration;

use crate::error::DeliveryError;
use crate::ports;
use crate::push::resolver::ResolvedDevice;
use crate::types::device::DeviceEndpoint;
use crate::types::push::{Credential, DeliveryFailure, DispatchReport, NotificationPayload};

pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(5);

/// Sends one payload to many devices. Every send runs concurrently, is bounded
/// by `send_timeout`, and is joined only after all of them have settled.
#[derive(Debug, Clone)]
pub struct Dispatcher<Tr, T> {
    transport: Tr,
    time: T,
    send_timeout: Duration,
}

impl<Tr, T> Dispatcher<Tr, T>
where
    Tr: ports::PushTransport,
    T: ports::TimeProvider,
{
    pub fn new(transport: Tr, time: T, send_timeout: Duration) -> Self {
        Self {
            transport,
            time,
            send_timeout,
        }
    }

    pub async fn dispatch(
        &self,
        devices: &[ResolvedDevice],
        payload: &NotificationPayload,
        credential: &Credential,
    ) -> DispatchReport {
        let mut report = DispatchReport::default();
        let mut sends: Vec<BoxFuture<'_, (String, Result<(), DeliveryError>)>> = Vec::new();

        for device in devices {
            match &device.endpoint {
                Ok(endpoint) => sends.push(Box::pin(self.send_one(endpoint, payload, credential))),
                Err(err) => {
                    tracing::warn!(
                        user_id = %device.user_id,
                        error = %err,
                        "skipping malformed device record"
                    );
                    report.skipped += 1;
                    report.failures.push(DeliveryFailure {
                        endpoint: device.identity(),
                        cause: DeliveryError::Malformed(err.clone()).to_string(),
                    });
                }
            }
        }

        report.attempted = sends.len();
        for (endpoint, outcome) in join_all(sends).await {
            match outcome {
                Ok(()) => report.succeeded += 1,
                Err(err) => {
                    tracing::warn!(%endpoint, error = %err, "push delivery failed");
                    report.failed += 1;
                    report.failures.push(DeliveryFailure {
                        endpoint,
                        cause: err.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            attempted = report.attempted,
            succeeded = report.succeeded,
            failed = report.failed,
            skipped = report.skipped,
            "dispatch finished"
        );
        report
    }

    async fn send_one(
        &self,
        endpoint: &DeviceEndpoint,
        payload: &NotificationPayload,
        credential: &Credential,
    ) -> (String, Result<(), DeliveryError>) {
        let identity = endpoint.identity();
        let outcome = tokio::select! {
            biased;
            result = self.transport.send(endpoint, payload, credential) => result,
            _ = self.time.sleep(self.send_timeout) => Err(DeliveryError::TimedOut),
        };
        (identity, outcome)
    }
}
