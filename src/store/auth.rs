//! # Master-Key Request Signing
//!
//! Every request to the remote store carries an `authorization` header with
//! an HMAC-SHA256 signature over the verb, resource type, resource link and
//! request date.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

/// API version sent with every request
pub const API_VERSION: &str = "2018-12-31";

/// Account key that cannot sign requests
#[derive(Debug, Clone, Error)]
pub enum InvalidMasterKey {
    #[error("master key is not valid base64: {0}")]
    Encoding(#[from] base64::DecodeError),
    #[error("master key cannot key an hmac: {0}")]
    Length(#[from] hmac::digest::InvalidLength),
}

/// Decoded account key, ready to sign
#[derive(Clone)]
pub struct MasterKey {
    mac: Hmac<Sha256>,
}

impl MasterKey {
    pub fn from_base64(encoded: &str) -> Result<Self, InvalidMasterKey> {
        let key = STANDARD.decode(encoded.trim())?;
        let mac = Hmac::<Sha256>::new_from_slice(&key)?;
        Ok(Self { mac })
    }

    /// Builds the URL-encoded `authorization` header value.
    ///
    /// `date` must be the exact `x-ms-date` header sent with the request.
    pub fn authorization(
        &self,
        verb: &str,
        resource_type: &str,
        resource_link: &str,
        date: &str,
    ) -> String {
        let payload = format!(
            "{}\n{}\n{}\n{}\n\n",
            verb.to_lowercase(),
            resource_type.to_lowercase(),
            resource_link,
            date.to_lowercase()
        );
        let signature = STANDARD.encode(self.sign(payload.as_bytes()));
        let token = format!("type=master&ver=1.0&sig={}", signature);
        url::form_urlencoded::byte_serialize(token.as_bytes()).collect()
    }

    fn sign(&self, payload: &[u8]) -> Vec<u8> {
        let mut mac = self.mac.clone();
        mac.update(payload);
        mac.finalize().into_bytes().to_vec()
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MasterKey").field("key", &"<redacted>").finish()
    }
}
