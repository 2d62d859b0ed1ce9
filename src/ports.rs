pub mod credentials;
pub mod push;
pub mod store;
pub mod time;

pub use credentials::{CredentialProvider, TokenExchanger, TokenGrant};
pub use push::PushTransport;
pub use store::SubscriberStore;
pub use time::TimeProvider;
