use crate::error::CredentialError;
use crate::types::push::Credential;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenGrant {
    pub access_token: String,
    pub expires_in: u64,
}

/// Trades a signed assertion for a short-lived bearer token.
pub trait TokenExchanger: Clone + Send + Sync + 'static {
    type Fut<'a>: Future<Output = Result<TokenGrant, CredentialError>> + Send + 'a
    where
        Self: 'a;

    fn exchange<'a>(&'a self, token_uri: &'a str, assertion: &'a str) -> Self::Fut<'a>;
}

pub trait CredentialProvider: Clone + Send + Sync + 'static {
    type Fut<'a>: Future<Output = Result<Credential, CredentialError>> + Send + 'a
    where
        Self: 'a;

    fn credential<'a>(&'a self) -> Self::Fut<'a>;
}
