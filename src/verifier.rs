//! Signature verification against a [`KeySet`].

use crate::{
    alg::{Algorithm, Rs256},
    jwk::KeyUse,
    KeySet, UntrustedToken, ValidationError, VerifiedToken,
};

/// Verifies token signatures with keys from a [`KeySet`].
///
/// The algorithm is read from the token header, but it must be `RS256`, and it must agree
/// with the algorithm and use declared by the key the header points to. This rules out
/// attacks that pair a key with an algorithm it was not published for.
#[derive(Debug, Clone, Copy)]
pub struct SignatureVerifier<'a> {
    key_set: &'a KeySet,
}

impl<'a> SignatureVerifier<'a> {
    /// Creates a verifier over the specified key set.
    pub fn new(key_set: &'a KeySet) -> Self {
        Self { key_set }
    }

    /// Verifies the token signature. On success, the token claims become accessible
    /// via the returned [`VerifiedToken`].
    pub fn verify(self, token: UntrustedToken<'_>) -> Result<VerifiedToken, ValidationError> {
        let key_id = token.header().key_id.as_deref();
        let key = key_id
            .and_then(|key_id| self.key_set.get(key_id))
            .ok_or_else(|| ValidationError::UnknownKey {
                key_id: key_id.map(str::to_owned),
            })?;

        let algorithm = token
            .algorithm()
            .parse::<Rs256>()
            .map_err(|err| ValidationError::UnsupportedAlgorithm(err.0))?;
        if let Some(key_algorithm) = key.algorithm() {
            if key_algorithm != algorithm.name() {
                return Err(ValidationError::AlgorithmMismatch {
                    expected: key_algorithm.to_owned(),
                    actual: token.algorithm().to_owned(),
                });
            }
        }
        if matches!(key.key_use(), Some(key_use) if key_use != KeyUse::Signature) {
            return Err(ValidationError::KeyUseMismatch);
        }

        let signature = token.signature_bytes();
        let expected_len = algorithm.signature_len(key.public_key());
        if signature.len() != expected_len {
            return Err(ValidationError::InvalidSignatureLen {
                expected: expected_len,
                actual: signature.len(),
            });
        }

        if !algorithm.verify_signature(signature, key.public_key(), token.signed_data) {
            return Err(ValidationError::InvalidSignature);
        }
        tracing::debug!(key_id = key.key_id(), "token signature is valid");
        Ok(token.into_verified())
    }
}
