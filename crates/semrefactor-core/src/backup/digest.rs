//! Content checksums recorded in backup manifests.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};

use super::{BackupError, BackupResult};

const HEX_LEN: usize = 64;

/// SHA-256 of one backed-up file, held as the lowercase hex the manifest stores.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentDigest(String);

impl ContentDigest {
    pub fn of_bytes(data: &[u8]) -> Self {
        Self(hex::encode(Sha256::digest(data)))
    }

    pub fn as_hex(&self) -> &str {
        &self.0
    }

    /// Confirm that `data`, the stored copy of `file`, still hashes to this digest.
    pub fn check(&self, file: &str, data: &[u8]) -> BackupResult<()> {
        let actual = Self::of_bytes(data);
        if actual == *self {
            return Ok(());
        }
        Err(BackupError::DigestMismatch {
            file: file.to_string(),
            expected: self.0.clone(),
            actual: actual.0,
        })
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ContentDigest {
    type Error = BackupError;

    /// Accepts either case.
    fn try_from(text: String) -> Result<Self, Self::Error> {
        let well_formed = text.len() == HEX_LEN && text.bytes().all(|b| b.is_ascii_hexdigit());
        if !well_formed {
            return Err(BackupError::InvalidDigest(text));
        }
        Ok(Self(text.to_ascii_lowercase()))
    }
}

impl From<ContentDigest> for String {
    fn from(digest: ContentDigest) -> Self {
        digest.0
    }
}
