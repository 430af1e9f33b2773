//! Rendering of verified claims as sorted `name=value` lines.

use chrono::{DateTime, Utc};

use crate::ClaimSet;

/// Format of `iat`, `nbf` and `exp` values, e.g. `2023-02-23T21:42:27+0000`.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%z";

/// Renders every claim as a `name=value` line.
///
/// Registered claims (`jti`, `iss`, `iat`, `nbf`, `exp`, `sub`, `aud`) are always present;
/// those absent from the token get an empty value. Audience values are comma-joined.
/// Lines are sorted by their full text, so the output does not depend on claim order
/// in the token. Nothing is redacted.
pub fn report(claims: &ClaimSet) -> Vec<String> {
    let mut lines = Vec::with_capacity(claims.private.len() + 7);
    lines.extend([
        format!("jti={}", claims.jwt_id.as_deref().unwrap_or_default()),
        format!("iss={}", claims.issuer.as_deref().unwrap_or_default()),
        format!("iat={}", format_timestamp(claims.issued_at)),
        format!("nbf={}", format_timestamp(claims.not_before)),
        format!("exp={}", format_timestamp(claims.expiration)),
        format!("sub={}", claims.subject.as_deref().unwrap_or_default()),
        format!("aud={}", claims.audience.join(",")),
    ]);
    lines.extend(
        claims
            .private
            .iter()
            .map(|(name, value)| format!("{name}={value}")),
    );
    lines.sort_unstable();
    lines
}

fn format_timestamp(timestamp: Option<DateTime<Utc>>) -> String {
    timestamp.map_or_else(String::new, |timestamp| {
        timestamp.format(TIMESTAMP_FORMAT).to_string()
    })
}
