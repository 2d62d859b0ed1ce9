use std::time::Duration;

use time::OffsetDateTime;

/// Clock used for credential expiry and per-send timeouts.
pub trait TimeProvider: Clone + Send + Sync + 'static {
    type Sleep<'a>: Future<Output = ()> + Send + 'a
    where
        Self: 'a;

    fn now(&self) -> OffsetDateTime;

    /// Resolves once `duration` has elapsed. Used as the losing side of a
    /// race against a push send.
    fn sleep<'a>(&'a self, duration: Duration) -> Self::Sleep<'a>;
}
