//! `UntrustedToken`, `VerifiedToken` and the token header.

use base64ct::{Base64UrlUnpadded, Encoding};
use serde::{Deserialize, Serialize};
use smallvec::{smallvec, SmallVec};

use crate::{ClaimSet, ParseError, Segment};

/// Maximum "reasonable" signature size in bytes; corresponds to a 4096-bit RSA key.
const SIGNATURE_SIZE: usize = 512;

/// JWT header.
///
/// See [RFC 7515](https://tools.ietf.org/html/rfc7515#section-4.1) for the description
/// of the fields. All fields are provided by the token bearer, so they only select
/// the verifying key and are not trusted by themselves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct Header {
    /// Signature algorithm. This field is renamed to [`alg`] for serialization.
    ///
    /// [`alg`]: https://www.rfc-editor.org/rfc/rfc7515.html#section-4.1.1
    #[serde(rename = "alg")]
    pub algorithm: String,

    /// Identifier of the key that has signed the token. This field is renamed to [`kid`]
    /// for serialization.
    ///
    /// [`kid`]: https://www.rfc-editor.org/rfc/rfc7515.html#section-4.1.4
    #[serde(rename = "kid", default, skip_serializing_if = "Option::is_none")]
    pub key_id: Option<String>,

    /// Application-specific [token type]. This field is renamed to `typ` for serialization.
    ///
    /// [token type]: https://tools.ietf.org/html/rfc7519#section-5.1
    #[serde(rename = "typ", default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
}

impl Header {
    /// Creates a header with the specified algorithm and no other fields.
    pub fn new(algorithm: impl Into<String>) -> Self {
        Self {
            algorithm: algorithm.into(),
            key_id: None,
            token_type: None,
        }
    }

    /// Sets the `key_id` field for this header.
    #[must_use]
    pub fn with_key_id(mut self, key_id: impl Into<String>) -> Self {
        self.key_id = Some(key_id.into());
        self
    }

    /// Sets the `token_type` field for this header.
    #[must_use]
    pub fn with_token_type(mut self, token_type: impl Into<String>) -> Self {
        self.token_type = Some(token_type.into());
        self
    }
}

/// Parsed, but unverified token.
///
/// Claims are decoded during parsing so that malformed tokens are rejected early,
/// but they cannot be accessed until the token passes signature verification
/// and becomes a [`VerifiedToken`].
#[derive(Debug, Clone)]
pub struct UntrustedToken<'a> {
    pub(crate) signed_data: &'a [u8],
    header: Header,
    claims: ClaimSet,
    signature: SmallVec<[u8; SIGNATURE_SIZE]>,
}

impl<'a> TryFrom<&'a str> for UntrustedToken<'a> {
    type Error = ParseError;

    fn try_from(s: &'a str) -> Result<Self, Self::Error> {
        let token_parts: Vec<_> = s.splitn(4, '.').collect();
        match &token_parts[..] {
            [header_str, claims_str, signature] => {
                let decoded_header = Base64UrlUnpadded::decode_vec(header_str)
                    .map_err(|_| ParseError::Base64(Segment::Header))?;
                let decoded_claims = Base64UrlUnpadded::decode_vec(claims_str)
                    .map_err(|_| ParseError::Base64(Segment::Claims))?;
                let mut decoded_signature: SmallVec<[u8; SIGNATURE_SIZE]> =
                    smallvec![0; 3 * (signature.len() + 3) / 4];
                let signature_len = Base64UrlUnpadded::decode(signature, &mut decoded_signature)
                    .map_err(|_| ParseError::Base64(Segment::Signature))?
                    .len();
                decoded_signature.truncate(signature_len);

                let header: Header = serde_json::from_slice(&decoded_header)
                    .map_err(ParseError::MalformedHeader)?;
                if let Some(token_type) = &header.token_type {
                    if !token_type.eq_ignore_ascii_case("JWT") {
                        return Err(ParseError::UnsupportedTokenType(token_type.clone()));
                    }
                }
                let claims: ClaimSet = serde_json::from_slice(&decoded_claims)
                    .map_err(ParseError::MalformedClaims)?;

                // Signing input is the original text `header.claims`, not a re-encoding.
                let signed_len = header_str.len() + 1 + claims_str.len();
                Ok(Self {
                    signed_data: &s.as_bytes()[..signed_len],
                    header,
                    claims,
                    signature: decoded_signature,
                })
            }
            _ => Err(ParseError::InvalidTokenStructure),
        }
    }
}

impl<'a> UntrustedToken<'a> {
    /// Creates an untrusted token from a string. This is a shortcut for calling the [`TryFrom`]
    /// conversion.
    pub fn new<S: AsRef<str> + ?Sized>(s: &'a S) -> Result<Self, ParseError> {
        Self::try_from(s.as_ref())
    }

    /// Gets the token header.
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Gets the signature algorithm declared in the header.
    pub fn algorithm(&self) -> &str {
        &self.header.algorithm
    }

    /// Returns signature bytes from the token. These bytes are **not** guaranteed to form a valid
    /// signature.
    pub fn signature_bytes(&self) -> &[u8] {
        &self.signature
    }

    pub(crate) fn into_verified(self) -> VerifiedToken {
        VerifiedToken {
            header: self.header,
            claims: self.claims,
        }
    }
}

/// Token with verified integrity.
///
/// This is the only way to get hold of token claims. Claims can be validated with
/// [`ClaimValidator`](crate::ClaimValidator) and rendered with [`report()`](crate::report()).
#[derive(Debug, Clone)]
pub struct VerifiedToken {
    header: Header,
    claims: ClaimSet,
}

impl VerifiedToken {
    /// Gets token header.
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Gets token claims.
    pub fn claims(&self) -> &ClaimSet {
        &self.claims
    }

    /// Converts this token into its claims.
    pub fn into_claims(self) -> ClaimSet {
        self.claims
    }
}
