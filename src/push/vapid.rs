use base64::{URL_SAFE_NO_PAD, decode_config, encode_config};
use jwt_simple::prelude::ES256KeyPair;
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};

use crate::types::push::VapidConfig;

const PUBLIC_KEY_LEN: usize = 65;
const PRIVATE_KEY_LEN: usize = 32;

#[derive(Debug, Clone)]
pub struct VapidCredentials {
    pub private_key: String,
    pub public_key: String,
}

#[derive(Debug, Clone)]
pub enum VapidConfigStatus {
    Missing,
    Incomplete,
    Ready(VapidConfig),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VapidKeyError {
    #[error("key is not URL-safe base64")]
    Encoding,
    #[error("key decodes to {actual} bytes, expected {expected}")]
    Length { expected: usize, actual: usize },
    #[error("public key is not an uncompressed P-256 point")]
    NotUncompressed,
}

pub fn load_vapid_config(
    private_key: Option<&str>,
    public_key: Option<&str>,
    subject: Option<&str>,
) -> VapidConfigStatus {
    let has_any = private_key.is_some() || public_key.is_some() || subject.is_some();

    match (private_key, public_key, subject) {
        (Some(private_key), Some(public_key), Some(subject)) => {
            VapidConfigStatus::Ready(VapidConfig {
                private_key: private_key.trim().to_string(),
                public_key: public_key.trim().to_string(),
                subject: subject.trim().to_string(),
            })
        }
        _ if has_any => VapidConfigStatus::Incomplete,
        _ => VapidConfigStatus::Missing,
    }
}

/// Browsers reject a subscription unless the application server key is a
/// 65-byte uncompressed point. Padded keys are accepted.
pub fn check_public_key(key: &str) -> Result<(), VapidKeyError> {
    let bytes = decode_key(key)?;
    if bytes.len() != PUBLIC_KEY_LEN {
        return Err(VapidKeyError::Length {
            expected: PUBLIC_KEY_LEN,
            actual: bytes.len(),
        });
    }
    if bytes[0] != 0x04 {
        return Err(VapidKeyError::NotUncompressed);
    }
    Ok(())
}

pub fn check_private_key(key: &str) -> Result<(), VapidKeyError> {
    let bytes = decode_key(key)?;
    if bytes.len() != PRIVATE_KEY_LEN {
        return Err(VapidKeyError::Length {
            expected: PRIVATE_KEY_LEN,
            actual: bytes.len(),
        });
    }
    Ok(())
}

fn decode_key(key: &str) -> Result<Vec<u8>, VapidKeyError> {
    let trimmed = key.trim().trim_end_matches('=');
    decode_config(trimmed, URL_SAFE_NO_PAD).map_err(|_| VapidKeyError::Encoding)
}

pub fn generate_vapid_credentials() -> Result<VapidCredentials, web_push::WebPushError> {
    let mut rng = OsRng;
    generate_vapid_credentials_with_rng(&mut rng)
}

pub(crate) fn generate_vapid_credentials_with_rng<R: RngCore + CryptoRng>(
    rng: &mut R,
) -> Result<VapidCredentials, web_push::WebPushError> {
    let key_pair = generate_es256_keypair_with_rng(rng);
    let private_key = encode_config(key_pair.to_bytes(), URL_SAFE_NO_PAD);
    let public_key =
        web_push::VapidSignatureBuilder::from_base64_no_sub(&private_key, URL_SAFE_NO_PAD)?
            .get_public_key();
    let public_key = encode_config(public_key, URL_SAFE_NO_PAD);

    Ok(VapidCredentials {
        private_key,
        public_key,
    })
}

fn generate_es256_keypair_with_rng<R: RngCore + CryptoRng>(rng: &mut R) -> ES256KeyPair {
    let mut key_bytes = [0u8; 32];
    loop {
        rng.fill_bytes(&mut key_bytes);
        if let Ok(key_pair) = ES256KeyPair::from_bytes(&key_bytes) {
            return key_pair;
        }
    }
}
