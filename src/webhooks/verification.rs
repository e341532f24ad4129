use crate::error::SignatureError;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha1 = Hmac<Sha1>;
type HmacSha256 = Hmac<Sha256>;

/// Keyed digest used to sign webhook bodies.
///
/// The variant name doubles as the tag in the signature header, so a
/// SHA-1 signature is sent as `sha1=<hex digest>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignatureAlgorithm {
    Sha1,
    Sha256,
}

impl SignatureAlgorithm {
    /// Tag preceding the digest in the header value
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Sha1 => "sha1",
            Self::Sha256 => "sha256",
        }
    }

    /// Digest length in bytes
    pub fn digest_len(&self) -> usize {
        match self {
            Self::Sha1 => 20,
            Self::Sha256 => 32,
        }
    }

    /// Compute the HMAC of `payload` keyed with `secret`
    pub fn compute(&self, secret: &[u8], payload: &[u8]) -> Vec<u8> {
        match self {
            Self::Sha1 => {
                let mut mac =
                    HmacSha1::new_from_slice(secret).expect("HMAC can take key of any size");
                mac.update(payload);
                mac.finalize().into_bytes().to_vec()
            }
            Self::Sha256 => {
                let mut mac =
                    HmacSha256::new_from_slice(secret).expect("HMAC can take key of any size");
                mac.update(payload);
                mac.finalize().into_bytes().to_vec()
            }
        }
    }
}

/// Verifies `<tag>=<hex digest>` signature headers against the raw body.
///
/// Verification always runs on the exact bytes received. Decoding the body
/// first would normalize it and break the digest.
///
/// # Example
///
/// ```rust
/// use secrecy::SecretString;
/// use tidehook::webhooks::{SignatureAlgorithm, SignatureVerifier};
///
/// let verifier = SignatureVerifier::new(SignatureAlgorithm::Sha1, "X-Hub-Signature");
/// let secret = SecretString::from("s3cr3t_16_bytes!");
/// let body = br#"{"action":"added"}"#;
///
/// let header = verifier.sign(b"s3cr3t_16_bytes!", body);
/// assert!(verifier.verify(&secret, body, &header).is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct SignatureVerifier {
    algorithm: SignatureAlgorithm,
    header: String,
}

impl SignatureVerifier {
    /// Create a verifier for signatures carried in `header`
    pub fn new(algorithm: SignatureAlgorithm, header: impl Into<String>) -> Self {
        Self {
            algorithm,
            header: header.into(),
        }
    }

    pub fn algorithm(&self) -> SignatureAlgorithm {
        self.algorithm
    }

    /// Name of the header the signature is read from
    pub fn header(&self) -> &str {
        &self.header
    }

    /// Split the header value into tag and digest and decode the digest.
    ///
    /// Surrounding whitespace and empty segments are ignored, and the tag is
    /// matched case-insensitively.
    pub fn parse_header(&self, value: &str) -> Result<Vec<u8>, SignatureError> {
        let tag = self.algorithm.tag();
        let mut parts = value.split('=').map(str::trim).filter(|part| !part.is_empty());

        let (found_tag, digest) = match (parts.next(), parts.next(), parts.next()) {
            (Some(found_tag), Some(digest), None) => (found_tag, digest),
            _ => return Err(SignatureError::bad_header_format(&self.header, tag)),
        };

        if !found_tag.eq_ignore_ascii_case(tag) {
            return Err(SignatureError::bad_header_format(&self.header, tag));
        }

        hex::decode(digest).map_err(|_| SignatureError::bad_header_encoding(&self.header))
    }

    /// Verify that `header_value` carries the HMAC of `payload` under `secret`
    pub fn verify(
        &self,
        secret: &SecretString,
        payload: &[u8],
        header_value: &str,
    ) -> Result<(), SignatureError> {
        let provided = self.parse_header(header_value)?;
        let expected = self
            .algorithm
            .compute(secret.expose_secret().as_bytes(), payload);

        if !constant_time_compare(&expected, &provided) {
            tracing::debug!(
                target: "tidehook::webhooks::verification",
                header = %self.header,
                "Webhook signature verification failed"
            );
            return Err(SignatureError::mismatch(&self.header));
        }

        Ok(())
    }

    /// Produce the header value a sender would attach to `payload`
    pub fn sign(&self, secret: &[u8], payload: &[u8]) -> String {
        format!(
            "{}={}",
            self.algorithm.tag(),
            hex::encode(self.algorithm.compute(secret, payload))
        )
    }
}

/// Constant-time comparison to prevent timing attacks
///
/// Only the length check may return early; digest lengths are public.
fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    a.ct_eq(b).into()
}
