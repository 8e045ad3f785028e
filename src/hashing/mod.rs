//! Content digests and the hash-function seams.
//!
//! Result snapshots are addressed by a 32-byte digest of their canonical text form.
//! The function producing it is injectable through [`ContentHasher`]; the default is
//! BLAKE3. Password hashing goes through [`PasswordHasher`] so the algorithm can be
//! swapped without touching the preferences store.

use std::fmt;
use std::str::FromStr;

use blake3::Hasher;
use serde::{Deserialize, Serialize};

use crate::constants::{DIGEST_LEN, SALT_LEN};
use crate::format::FormatError;

/// Fixed-length content digest. Displayed and persisted as lowercase hex.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Digest([u8; DIGEST_LEN]);

impl Digest {
    #[inline]
    pub const fn from_bytes(bytes: [u8; DIGEST_LEN]) -> Self {
        Self(bytes)
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.0
    }

    #[inline]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parses exactly `2 * DIGEST_LEN` hex characters.
    pub fn from_hex(value: &str) -> Result<Self, FormatError> {
        let mut bytes = [0u8; DIGEST_LEN];
        hex::decode_to_slice(value, &mut bytes).map_err(|_| FormatError::InvalidDigest {
            value: value.to_string(),
        })?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", &self.to_hex()[..12])
    }
}

impl FromStr for Digest {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl From<Digest> for String {
    fn from(digest: Digest) -> Self {
        digest.to_hex()
    }
}

impl TryFrom<String> for Digest {
    type Error = FormatError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(&value)
    }
}

/// Produces the digest that addresses a stored result snapshot.
pub trait ContentHasher: Send + Sync {
    fn digest(&self, data: &[u8]) -> Digest;
}

/// BLAKE3 over the raw bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct Blake3Hasher;

impl ContentHasher for Blake3Hasher {
    #[inline]
    fn digest(&self, data: &[u8]) -> Digest {
        hash_content(data)
    }
}

/// BLAKE3 digest of `data`.
#[inline]
pub fn hash_content(data: &[u8]) -> Digest {
    Digest(*blake3::hash(data).as_bytes())
}

/// Random salt mixed into a stored password hash.
pub type Salt = [u8; SALT_LEN];

/// Derives a password verifier from a salt and the clear-text password.
pub trait PasswordHasher: Send + Sync {
    fn hash_password(&self, salt: &Salt, password: &str) -> Vec<u8>;
}

/// BLAKE3 in key-derivation mode, salt then password.
///
/// Fast by construction, which is fine for a single shared admin password but not
/// for a user database; plug in a slow KDF through [`PasswordHasher`] for that.
#[derive(Debug, Clone, Copy, Default)]
pub struct Blake3PasswordHasher;

impl Blake3PasswordHasher {
    const CONTEXT: &'static str = "sxs 2024 admin password";
}

impl PasswordHasher for Blake3PasswordHasher {
    fn hash_password(&self, salt: &Salt, password: &str) -> Vec<u8> {
        let mut hasher = Hasher::new_derive_key(Self::CONTEXT);
        hasher.update(salt);
        hasher.update(password.as_bytes());
        hasher.finalize().as_bytes().to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_hash_content_determinism() {
        let data = b"results=1\ntitle=Rust\n";

        assert_eq!(hash_content(data), hash_content(data));
        assert_eq!(Blake3Hasher.digest(data), hash_content(data));
    }

    #[test]
    fn test_hash_content_uniqueness() {
        let inputs = [
            b"results=0\n".as_slice(),
            b"results=1\n".as_slice(),
            b"Results=0\n".as_slice(),
            b"results=0\n ".as_slice(),
        ];

        let digests: HashSet<_> = inputs.iter().map(|i| hash_content(i)).collect();
        assert_eq!(digests.len(), inputs.len());
    }

    #[test]
    fn test_digest_hex_roundtrip() {
        let digest = hash_content(b"snapshot");
        let hex = digest.to_hex();

        assert_eq!(hex.len(), DIGEST_LEN * 2);
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_eq!(Digest::from_hex(&hex).unwrap(), digest);
        assert_eq!(hex.parse::<Digest>().unwrap(), digest);
    }

    #[test]
    fn test_digest_rejects_bad_length() {
        let hex = hash_content(b"x").to_hex();

        assert!(matches!(
            Digest::from_hex(&hex[..10]),
            Err(FormatError::InvalidDigest { .. })
        ));
        assert!(Digest::from_hex(&format!("{hex}00")).is_err());
    }

    #[test]
    fn test_digest_rejects_non_hex() {
        let bad = "z".repeat(DIGEST_LEN * 2);
        assert!(Digest::from_hex(&bad).is_err());
    }

    #[test]
    fn test_digest_debug_is_abbreviated() {
        let digest = hash_content(b"x");
        let debug = format!("{:?}", digest);
        assert!(debug.starts_with("Digest("));
        assert!(debug.len() < 30);
    }

    #[test]
    fn test_password_hash_depends_on_salt() {
        let hasher = Blake3PasswordHasher;
        let a = hasher.hash_password(&[1u8; SALT_LEN], "secret");
        let b = hasher.hash_password(&[2u8; SALT_LEN], "secret");
        let c = hasher.hash_password(&[1u8; SALT_LEN], "secret");

        assert_ne!(a, b);
        assert_eq!(a, c);
        assert_eq!(a.len(), 32);
    }

    #[test]
    fn test_password_hash_differs_from_content_hash() {
        let salt = [0u8; SALT_LEN];
        let mut plain = salt.to_vec();
        plain.extend_from_slice(b"secret");

        let derived = Blake3PasswordHasher.hash_password(&salt, "secret");
        assert_ne!(derived.as_slice(), hash_content(&plain).as_bytes());
    }
}
