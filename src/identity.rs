use std::{fmt, str::FromStr};

use sha1::Sha1;
use sha2::{Digest, Sha256, Sha512};

use crate::error::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HashAlgorithm {
    Sha1,
    #[default]
    Sha256,
    Sha512,
}

impl FromStr for HashAlgorithm {
    type Err = ConfigError;

    /// Accepts the `MessageDigest` style names used in existing configs
    /// (`SHA-256`) as well as `sha256`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| !matches!(c, '-' | '_'))
            .collect::<String>()
            .to_ascii_uppercase();
        match normalized.as_str() {
            "SHA1" => Ok(HashAlgorithm::Sha1),
            "SHA256" => Ok(HashAlgorithm::Sha256),
            "SHA512" => Ok(HashAlgorithm::Sha512),
            _ => Err(ConfigError::UnsupportedHashAlgorithm(s.to_string())),
        }
    }
}

/// Turns an email address into the opaque member id used in invitation links.
#[derive(Clone)]
pub struct IdentityHasher {
    algorithm: HashAlgorithm,
    secret: String,
}

impl IdentityHasher {
    pub fn new(algorithm: HashAlgorithm, secret: impl Into<String>) -> Self {
        Self {
            algorithm,
            secret: secret.into(),
        }
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    pub fn member_id(&self, email: &str) -> String {
        let input = format!("{}{}", self.secret, email);
        let digest = match self.algorithm {
            HashAlgorithm::Sha1 => Sha1::digest(input.as_bytes()).to_vec(),
            HashAlgorithm::Sha256 => Sha256::digest(input.as_bytes()).to_vec(),
            HashAlgorithm::Sha512 => Sha512::digest(input.as_bytes()).to_vec(),
        };
        compact_hex(&digest)
    }
}

impl fmt::Debug for IdentityHasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityHasher")
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

/// Lowercase hex without per-byte zero padding. Member ids already mailed out
/// and persisted use this form, so it must not change.
fn compact_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:x}")).collect()
}
