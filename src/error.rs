//! Error handling.

use core::fmt;

use crate::jwk::JwkError;

/// Errors that may occur while collecting the run configuration.
#[derive(Debug)]
#[non_exhaustive]
pub enum ConfigError {
    /// Required input is not set.
    Missing(String),
    /// Required input is set, but empty.
    Empty(String),
    /// Server URL is not an absolute `http(s)` URL.
    InvalidServerUrl(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing(name) => write!(formatter, "the {name} environment variable must be set"),
            Self::Empty(name) => write!(formatter, "the {name} environment variable is empty"),
            Self::InvalidServerUrl(url) => {
                write!(formatter, "server URL `{url}` is not an absolute http(s) URL")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Errors that may occur while retrieving and decoding the key set.
#[derive(Debug)]
#[non_exhaustive]
pub enum KeySetError {
    /// Transport call has failed.
    Fetch {
        /// URL of the key set document.
        url: String,
        /// Underlying transport error.
        source: anyhow::Error,
    },
    /// Server responded with a non-success status.
    HttpStatus {
        /// URL of the key set document.
        url: String,
        /// HTTP status code.
        status: u16,
    },
    /// Response body is larger than allowed.
    ResponseTooLarge {
        /// URL of the key set document.
        url: String,
        /// Maximum allowed body size in bytes.
        limit: usize,
    },
    /// Document is not a JSON object with a `keys` array.
    Parse(serde_json::Error),
    /// An RSA signing key in the document is malformed.
    InvalidKey {
        /// Identifier of the malformed key.
        key_id: String,
        /// Decoding error.
        source: JwkError,
    },
    /// Two usable keys share the same identifier.
    DuplicateKeyId(String),
    /// No usable key remains after decoding.
    Empty,
}

impl fmt::Display for KeySetError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fetch { url, source } => {
                write!(formatter, "failed to fetch key set from {url}: {source}")
            }
            Self::HttpStatus { url, status } => {
                write!(formatter, "{url} responded with HTTP status {status}")
            }
            Self::ResponseTooLarge { url, limit } => {
                write!(formatter, "{url} returned a body larger than {limit} bytes")
            }
            Self::Parse(e) => write!(formatter, "Malformed key set document: {e}"),
            Self::InvalidKey { key_id, source } => {
                write!(formatter, "Malformed key `{key_id}` in key set: {source}")
            }
            Self::DuplicateKeyId(key_id) => {
                write!(formatter, "key set contains several keys with id `{key_id}`")
            }
            Self::Empty => formatter.write_str("key set did not return any usable key"),
        }
    }
}

impl std::error::Error for KeySetError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Fetch { source, .. } => Some(source.as_ref()),
            Self::Parse(e) => Some(e),
            Self::InvalidKey { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Segment of a compact token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment {
    /// First segment.
    Header,
    /// Second segment.
    Claims,
    /// Third segment.
    Signature,
}

impl fmt::Display for Segment {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(match self {
            Self::Header => "header",
            Self::Claims => "claims",
            Self::Signature => "signature",
        })
    }
}

/// Errors that may occur during token parsing.
#[derive(Debug)]
#[non_exhaustive]
pub enum ParseError {
    /// Token has invalid structure.
    ///
    /// Valid tokens must consist of 3 base64url-encoded parts (header, claims, and signature)
    /// separated by periods.
    InvalidTokenStructure,
    /// Cannot decode base64url in the specified segment.
    Base64(Segment),
    /// Token header cannot be parsed.
    MalformedHeader(serde_json::Error),
    /// Token claims cannot be parsed.
    MalformedClaims(serde_json::Error),
    /// [Token type][typ] mentioned in the token header is not `JWT`.
    ///
    /// [typ]: https://tools.ietf.org/html/rfc7519#section-5.1
    UnsupportedTokenType(String),
}

impl fmt::Display for ParseError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidTokenStructure => formatter.write_str("Invalid token structure"),
            Self::Base64(segment) => {
                write!(formatter, "base64url decoding error in token {segment}")
            }
            Self::MalformedHeader(e) => write!(formatter, "Malformed token header: {e}"),
            Self::MalformedClaims(e) => write!(formatter, "Malformed token claims: {e}"),
            Self::UnsupportedTokenType(ty) => write!(formatter, "Unsupported token type: {ty}"),
        }
    }
}

impl std::error::Error for ParseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::MalformedHeader(e) | Self::MalformedClaims(e) => Some(e),
            _ => None,
        }
    }
}

/// Errors that can occur during token verification and claim validation.
#[derive(Debug)]
#[non_exhaustive]
pub enum ValidationError {
    /// Key named in the token header is not in the key set.
    UnknownKey {
        /// `kid` from the token header, if any.
        key_id: Option<String>,
    },
    /// Algorithm mentioned in the token header is not supported.
    UnsupportedAlgorithm(String),
    /// Algorithm declared by the resolved key differs from the token algorithm.
    AlgorithmMismatch {
        /// Algorithm declared by the key.
        expected: String,
        /// Actual algorithm in the token.
        actual: String,
    },
    /// Resolved key is not meant for signature verification.
    KeyUseMismatch,
    /// Token signature has invalid byte length.
    InvalidSignatureLen {
        /// Expected signature length.
        expected: usize,
        /// Actual signature length.
        actual: usize,
    },
    /// Token signature has failed verification.
    InvalidSignature,
    /// `iss` claim differs from the expected issuer.
    IssuerMismatch {
        /// Expected issuer.
        expected: String,
        /// Actual issuer in the token.
        actual: Option<String>,
    },
    /// Claim requested during validation is not present in the token.
    NoClaim(Claim),
    /// Token is not yet valid as per `nbf` claim.
    NotMature,
    /// Token has expired.
    Expired,
}

/// Identifier of a claim in `ClaimSet`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Claim {
    /// `exp` claim (expiration time).
    Expiration,
    /// `nbf` claim (valid not before).
    NotBefore,
}

impl fmt::Display for Claim {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(match self {
            Self::Expiration => "exp",
            Self::NotBefore => "nbf",
        })
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownKey { key_id: Some(key_id) } => {
                write!(formatter, "Key `{key_id}` is not in the key set")
            }
            Self::UnknownKey { key_id: None } => {
                formatter.write_str("Token header does not name a signing key")
            }
            Self::UnsupportedAlgorithm(alg) => write!(formatter, "Unsupported algorithm: {alg}"),
            Self::AlgorithmMismatch { expected, actual } => write!(
                formatter,
                "Token algorithm ({actual}) differs from the key algorithm ({expected})"
            ),
            Self::KeyUseMismatch => formatter.write_str("Key is not meant for signatures"),
            Self::InvalidSignatureLen { expected, actual } => write!(
                formatter,
                "Invalid signature length: expected {expected} bytes, got {actual} bytes"
            ),
            Self::InvalidSignature => formatter.write_str("Signature has failed verification"),
            Self::IssuerMismatch {
                expected,
                actual: Some(actual),
            } => write!(
                formatter,
                "Token issuer `{actual}` differs from expected `{expected}`"
            ),
            Self::IssuerMismatch {
                expected,
                actual: None,
            } => write!(formatter, "Token has no issuer; expected `{expected}`"),
            Self::NoClaim(claim) => write!(
                formatter,
                "Claim `{claim}` requested during validation is not present in the token"
            ),
            Self::NotMature => formatter.write_str("Token is not yet ready"),
            Self::Expired => formatter.write_str("Token has expired"),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Any error that aborts a validation run.
#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    /// Configuration is incomplete.
    Config(ConfigError),
    /// Key set cannot be retrieved.
    KeySet(KeySetError),
    /// Token is structurally invalid.
    Parse(ParseError),
    /// Token is not authentic, or its claims are not acceptable.
    Validation(ValidationError),
}

impl fmt::Display for Error {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(formatter, "configuration error: {e}"),
            Self::KeySet(e) => write!(formatter, "failed to load the key set: {e}"),
            Self::Parse(e) => write!(formatter, "failed to parse the jwt: {e}"),
            Self::Validation(e) => write!(formatter, "failed to validate the jwt: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Config(e) => Some(e),
            Self::KeySet(e) => Some(e),
            Self::Parse(e) => Some(e),
            Self::Validation(e) => Some(e),
        }
    }
}

impl From<ConfigError> for Error {
    fn from(error: ConfigError) -> Self {
        Self::Config(error)
    }
}

impl From<KeySetError> for Error {
    fn from(error: KeySetError) -> Self {
        Self::KeySet(error)
    }
}

impl From<ParseError> for Error {
    fn from(error: ParseError) -> Self {
        Self::Parse(error)
    }
}

impl From<ValidationError> for Error {
    fn from(error: ValidationError) -> Self {
        Self::Validation(error)
    }
}
