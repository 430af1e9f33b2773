//! Immutable set of public signing keys decoded from a JWKS document.

use serde::Deserialize;

use crate::{
    jwk::{JwkError, Key, RawJwk},
    KeySetError,
};

#[derive(Debug, Deserialize)]
struct RawKeySet {
    keys: Vec<serde_json::Value>,
}

/// Collection of public signing keys addressable by key identifier (`kid`).
///
/// A `KeySet` is never empty and never contains two keys with the same identifier.
#[derive(Debug, Clone)]
pub struct KeySet {
    keys: Vec<Key>,
}

impl KeySet {
    /// Creates a key set from already decoded keys.
    pub fn new(keys: impl IntoIterator<Item = Key>) -> Result<Self, KeySetError> {
        let mut set = Vec::<Key>::new();
        for key in keys {
            if set.iter().any(|known| known.key_id() == key.key_id()) {
                return Err(KeySetError::DuplicateKeyId(key.key_id().to_owned()));
            }
            set.push(key);
        }

        if set.is_empty() {
            Err(KeySetError::Empty)
        } else {
            Ok(Self { keys: set })
        }
    }

    /// Decodes a JWKS document shaped as `{"keys": [...]}`.
    ///
    /// Entries that are not RSA signature keys, or that do not carry a `kid`, are skipped.
    /// A malformed RSA signature key fails the whole document.
    pub fn from_slice(document: &[u8]) -> Result<Self, KeySetError> {
        let raw: RawKeySet = serde_json::from_slice(document).map_err(KeySetError::Parse)?;

        let mut keys = Vec::with_capacity(raw.keys.len());
        for (index, entry) in raw.keys.into_iter().enumerate() {
            let entry: RawJwk = serde_json::from_value(entry).map_err(KeySetError::Parse)?;
            let key_id = entry.kid.clone();
            match Key::from_raw(entry) {
                Ok(Some(key)) => keys.push(key),
                Ok(None) => {
                    tracing::warn!(index, "skipping RSA signing key without `kid`");
                }
                Err(JwkError::Unsupported(reason)) => {
                    tracing::debug!(index, ?key_id, %reason, "skipping key set entry");
                }
                Err(source) => {
                    return Err(KeySetError::InvalidKey {
                        key_id: key_id.unwrap_or_else(|| format!("#{index}")),
                        source,
                    });
                }
            }
        }
        Self::new(keys)
    }

    /// Looks up a key by its identifier.
    pub fn get(&self, key_id: &str) -> Option<&Key> {
        self.keys.iter().find(|key| key.key_id() == key_id)
    }

    /// Returns the number of keys in this set.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Always returns `false`; key sets are never empty.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Iterates over keys in document order.
    pub fn iter(&self) -> impl Iterator<Item = &Key> + '_ {
        self.keys.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    const MODULUS: &str = "nzyis1ZjfNB0bBgKFMSvvkTtwlvBsaJq7S5wA-kzeVOVpVWwkWdVha4s38XM_pa_\
        yr47av7-z3VTmvDRyAHcaT92whREFpLv9cj5lTeJSibyr_Mrm_YtjCZVWgaOYIhwrXwKLqPr_11inWsAkfIy\
        tvHWTxZYEcXLgAXFuUuaS3uF9gEiNQwzGTU1v0FqkqTBr4B8nW3HCN47XUu0t8Y0e-lf4s4OxQawWD79J9_5\
        d3Ry0vbV3Am1FtGJiJvOwRsIfVChDpYStTcHTCMqtvWbV6L11BWkpzGXSW4Hv43qa-GSYOD2QU68Mb59oSk2\
        OB-BtOLpJofmbGEGgvmwyCI9Mw";

    fn rsa_entry(kid: &str) -> serde_json::Value {
        json!({ "kty": "RSA", "kid": kid, "use": "sig", "alg": "RS256", "n": MODULUS, "e": "AQAB" })
    }

    fn decode(document: &serde_json::Value) -> Result<KeySet, KeySetError> {
        KeySet::from_slice(&serde_json::to_vec(document).unwrap())
    }

    #[test]
    fn decoding_key_set() {
        let document = json!({ "keys": [rsa_entry("K1"), rsa_entry("K2")] });
        let key_set = decode(&document).unwrap();
        assert_eq!(key_set.len(), 2);
        assert_eq!(key_set.get("K2").unwrap().key_id(), "K2");
        assert!(key_set.get("K3").is_none());
        let ids: Vec<_> = key_set.iter().map(Key::key_id).collect();
        assert_eq!(ids, ["K1", "K2"]);
    }

    #[test]
    fn unsupported_entries_are_skipped() {
        let document = json!({
            "keys": [
                { "kty": "EC", "kid": "ec", "crv": "P-256", "x": "AA", "y": "AA" },
                { "kty": "oct", "k": "c2VjcmV0" },
                { "kty": "RSA", "kid": "enc", "use": "enc", "n": MODULUS, "e": "AQAB" },
                { "kty": "RSA", "n": MODULUS, "e": "AQAB" },
                rsa_entry("K1"),
            ]
        });
        let key_set = decode(&document).unwrap();
        assert_eq!(key_set.len(), 1);
        assert!(key_set.get("K1").is_some());
        assert!(key_set.get("enc").is_none());
    }

    #[test]
    fn empty_key_set() {
        assert_matches!(decode(&json!({ "keys": [] })).unwrap_err(), KeySetError::Empty);

        let only_unsupported = json!({ "keys": [{ "kty": "oct", "k": "c2VjcmV0" }] });
        assert_matches!(decode(&only_unsupported).unwrap_err(), KeySetError::Empty);
    }

    #[test]
    fn malformed_documents() {
        let documents = [
            json!([]),
            json!({}),
            json!({ "keys": {} }),
            json!({ "keys": ["RSA"] }),
            json!({ "keys": [{ "kty": 5 }] }),
        ];
        for document in &documents {
            assert_matches!(
                decode(document).unwrap_err(),
                KeySetError::Parse(_),
                "Failing document: {document}"
            );
        }

        assert_matches!(
            KeySet::from_slice(b"<html>").unwrap_err(),
            KeySetError::Parse(_)
        );
    }

    #[test]
    fn malformed_rsa_key() {
        let document = json!({
            "keys": [{ "kty": "RSA", "kid": "K1", "n": "!!", "e": "AQAB" }]
        });
        assert_matches!(
            decode(&document).unwrap_err(),
            KeySetError::InvalidKey { key_id, source: JwkError::Base64("n") } if key_id == "K1"
        );
    }

    #[test]
    fn duplicate_key_ids_are_rejected() {
        let document = json!({ "keys": [rsa_entry("K1"), rsa_entry("K1")] });
        assert_matches!(
            decode(&document).unwrap_err(),
            KeySetError::DuplicateKeyId(key_id) if key_id == "K1"
        );
    }
}
