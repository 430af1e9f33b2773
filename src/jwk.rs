//! Decoding of individual [JSON Web Keys](https://tools.ietf.org/html/rfc7517.html) (JWK)
//! published in a key set.
//!
//! Only RSA keys meant for signature verification are turned into [`Key`]s; other entries
//! are reported as [`Unsupported`](JwkError::Unsupported) so that the key set can skip them.

use rsa::{BigUint, RsaPublicKey};
use serde::{Deserialize, Serialize};

use core::fmt;

use crate::alg::{Algorithm, ModulusBits, Rs256};

/// Type of a JWK (the `kty` field).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum KeyType {
    /// RSA key. Maps to the `RSA` value of the `kty` field.
    Rsa,
}

impl fmt::Display for KeyType {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(match self {
            Self::Rsa => "RSA",
        })
    }
}

/// Intended use of a JWK (the `use` field).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyUse {
    /// Signature verification.
    #[serde(rename = "sig")]
    Signature,
    /// Encryption.
    #[serde(rename = "enc")]
    Encryption,
}

/// Errors that can occur when decoding a JWK into a [`Key`].
#[derive(Debug)]
#[non_exhaustive]
pub enum JwkError {
    /// Entry is well-formed, but cannot be used for `RS256` verification.
    Unsupported(String),
    /// Required field is absent from JWK.
    NoField(&'static str),
    /// JWK field is not valid base64url.
    Base64(&'static str),
    /// RSA modulus is shorter than 2048 bits.
    WeakKey {
        /// Actual modulus length in bits.
        bits: usize,
    },
    /// Key parameters were rejected by the crypto backend.
    Rsa(rsa::Error),
}

impl fmt::Display for JwkError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unsupported(reason) => write!(formatter, "unsupported key: {reason}"),
            Self::NoField(field) => write!(formatter, "field `{field}` is absent from JWK"),
            Self::Base64(field) => write!(formatter, "field `{field}` is not base64url-encoded"),
            Self::WeakKey { bits } => write!(
                formatter,
                "RSA modulus has {bits} bits; at least {} are required",
                ModulusBits::MIN.bits()
            ),
            Self::Rsa(err) => write!(formatter, "invalid RSA public key: {err}"),
        }
    }
}

impl std::error::Error for JwkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Rsa(err) => Some(err),
            _ => None,
        }
    }
}

/// Raw key set entry. All fields are optional, so that unsupported entries
/// can be recognized and skipped rather than failing the whole document.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct RawJwk {
    #[serde(default)]
    pub kty: Option<String>,
    #[serde(default)]
    pub kid: Option<String>,
    #[serde(rename = "use", default)]
    pub key_use: Option<String>,
    #[serde(default)]
    pub alg: Option<String>,
    #[serde(default)]
    pub n: Option<String>,
    #[serde(default)]
    pub e: Option<String>,
}

/// Public signing key from a key set.
#[derive(Clone, PartialEq)]
pub struct Key {
    key_id: String,
    key_type: KeyType,
    algorithm: Option<String>,
    key_use: Option<KeyUse>,
    public_key: RsaPublicKey,
}

impl fmt::Debug for Key {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Key")
            .field("key_id", &self.key_id)
            .field("key_type", &self.key_type)
            .field("algorithm", &self.algorithm)
            .field("key_use", &self.key_use)
            .finish_non_exhaustive()
    }
}

impl Key {
    /// Creates an RSA signing key with the specified identifier.
    pub fn rsa(key_id: impl Into<String>, public_key: RsaPublicKey) -> Self {
        Self {
            key_id: key_id.into(),
            key_type: KeyType::Rsa,
            algorithm: Some(Rs256.name().to_owned()),
            key_use: Some(KeyUse::Signature),
            public_key,
        }
    }

    /// Overrides the declared algorithm (`alg`). `None` means the key does not restrict
    /// the algorithm.
    #[must_use]
    pub fn with_algorithm(mut self, algorithm: Option<String>) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Overrides the declared key use (`use`).
    #[must_use]
    pub fn with_key_use(mut self, key_use: Option<KeyUse>) -> Self {
        self.key_use = key_use;
        self
    }

    /// Gets the key identifier (`kid`).
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Gets the key type (`kty`).
    pub fn key_type(&self) -> KeyType {
        self.key_type
    }

    /// Gets the algorithm declared for this key (`alg`), if any.
    pub fn algorithm(&self) -> Option<&str> {
        self.algorithm.as_deref()
    }

    /// Gets the declared key use (`use`), if any.
    pub fn key_use(&self) -> Option<KeyUse> {
        self.key_use
    }

    /// Gets the RSA public key.
    pub fn public_key(&self) -> &RsaPublicKey {
        &self.public_key
    }

    /// Decodes a key from a key set entry. `Ok(None)` means the entry is a usable
    /// RSA signing key that lacks a `kid`.
    pub(crate) fn from_raw(raw: RawJwk) -> Result<Option<Self>, JwkError> {
        let key_type = match raw.kty.as_deref() {
            Some("RSA") => KeyType::Rsa,
            Some(other) => return Err(JwkError::Unsupported(format!("key type `{other}`"))),
            None => return Err(JwkError::NoField("kty")),
        };
        let key_use = match raw.key_use.as_deref() {
            None => None,
            Some("sig") => Some(KeyUse::Signature),
            Some(other) => return Err(JwkError::Unsupported(format!("key use `{other}`"))),
        };
        if let Some(alg) = raw.alg.as_deref() {
            if alg != Rs256.name() {
                return Err(JwkError::Unsupported(format!("algorithm `{alg}`")));
            }
        }

        let modulus = decode_uint("n", raw.n.as_deref())?;
        let public_exponent = decode_uint("e", raw.e.as_deref())?;
        let public_key = RsaPublicKey::new(modulus, public_exponent).map_err(JwkError::Rsa)?;
        if !ModulusBits::MIN.is_satisfied_by(&public_key) {
            return Err(JwkError::WeakKey {
                bits: rsa::traits::PublicKeyParts::n(&public_key).bits(),
            });
        }

        Ok(raw.kid.map(|key_id| Self {
            key_id,
            key_type,
            algorithm: raw.alg,
            key_use,
            public_key,
        }))
    }
}

fn decode_uint(field: &'static str, value: Option<&str>) -> Result<BigUint, JwkError> {
    let value = value.ok_or(JwkError::NoField(field))?;
    let bytes = base64url::decode(value).ok_or(JwkError::Base64(field))?;
    Ok(BigUint::from_bytes_be(&bytes))
}

pub(crate) mod base64url {
    use base64ct::{Base64UrlUnpadded, Encoding};

    /// Decodes unpadded base64url. Trailing padding is tolerated since some issuers emit it.
    pub fn decode(value: &str) -> Option<Vec<u8>> {
        Base64UrlUnpadded::decode_vec(value.trim_end_matches('=')).ok()
    }
}
