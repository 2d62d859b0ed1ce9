use crate::error::DeliveryError;
use crate::types::device::DeviceEndpoint;
use crate::types::push::{Credential, NotificationPayload};

pub trait PushTransport: Clone + Send + Sync + 'static {
    type Fut<'a>: Future<Output = Result<(), DeliveryError>> + Send + 'a
    where
        Self: 'a;

    fn send<'a>(
        &'a self,
        endpoint: &'a DeviceEndpoint,
        payload: &'a NotificationPayload,
        credential: &'a Credential,
    ) -> Self::Fut<'a>;
}
