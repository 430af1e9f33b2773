//! Signature algorithms supported by the verifier.

use rsa::{traits::PublicKeyParts, Pkcs1v15Sign, RsaPublicKey};
use sha2::{Digest, Sha256};

use core::{fmt, str::FromStr};

/// JWT signing algorithm able to check token integrity.
pub trait Algorithm {
    /// Key used when verifying tokens.
    type VerifyingKey;

    /// Returns the name of this algorithm, as mentioned in the `alg` field of the JWT header.
    fn name(&self) -> &'static str;

    /// Returns the byte length of signatures produced with `verifying_key`.
    fn signature_len(&self, verifying_key: &Self::VerifyingKey) -> usize;

    /// Verifies the `message` against the `signature` and `verifying_key`.
    fn verify_signature(
        &self,
        signature: &[u8],
        verifying_key: &Self::VerifyingKey,
        message: &[u8],
    ) -> bool;
}

/// `RS256` integrity algorithm: [RSA] digital signatures with PKCS#1 v1.5 padding
/// over a SHA-256 digest, as per [RFC 7518].
///
/// [RSA]: https://en.wikipedia.org/wiki/RSA_(cryptosystem)
/// [RFC 7518]: https://www.rfc-editor.org/rfc/rfc7518.html#section-3.3
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rs256;

impl Algorithm for Rs256 {
    type VerifyingKey = RsaPublicKey;

    fn name(&self) -> &'static str {
        "RS256"
    }

    fn signature_len(&self, verifying_key: &RsaPublicKey) -> usize {
        verifying_key.size()
    }

    fn verify_signature(
        &self,
        signature: &[u8],
        verifying_key: &RsaPublicKey,
        message: &[u8],
    ) -> bool {
        let digest = Sha256::digest(message);
        verifying_key
            .verify(Pkcs1v15Sign::new::<Sha256>(), &digest, signature)
            .is_ok()
    }
}

impl fmt::Display for Rs256 {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.name())
    }
}

/// Error returned when parsing an unsupported algorithm name.
#[derive(Debug)]
pub struct UnsupportedAlgorithm(pub String);

impl fmt::Display for UnsupportedAlgorithm {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "Unsupported algorithm: {}", self.0)
    }
}

impl std::error::Error for UnsupportedAlgorithm {}

impl FromStr for Rs256 {
    type Err = UnsupportedAlgorithm;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // `alg` values are case-sensitive.
        if s == Rs256.name() {
            Ok(Self)
        } else {
            Err(UnsupportedAlgorithm(s.to_owned()))
        }
    }
}

/// Bit length of an RSA key modulus (aka RSA key length).
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[non_exhaustive]
pub enum ModulusBits {
    /// 2048 bits. This is the minimum recommended key length as of 2020.
    TwoKibibytes,
    /// 3072 bits.
    ThreeKibibytes,
    /// 4096 bits.
    FourKibibytes,
}

impl ModulusBits {
    /// Minimum accepted key length as per RFC 7518.
    pub const MIN: Self = Self::TwoKibibytes;

    /// Converts this length to the numeric value.
    pub fn bits(self) -> usize {
        match self {
            Self::TwoKibibytes => 2_048,
            Self::ThreeKibibytes => 3_072,
            Self::FourKibibytes => 4_096,
        }
    }

    /// Checks whether `key` is at least as long as this length.
    pub fn is_satisfied_by(self, key: &RsaPublicKey) -> bool {
        key.n().bits() >= self.bits()
    }
}
