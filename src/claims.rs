use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use core::fmt;
use std::collections::BTreeMap;

use crate::{Claim, ValidationError, VerifiedToken};

/// Time-related validation options.
#[derive(Debug, Clone, Copy)]
#[non_exhaustive]
pub struct TimeOptions<F = fn() -> DateTime<Utc>> {
    /// Leeway to use during validation.
    pub leeway: Duration,
    /// Source of the current timestamps.
    pub clock_fn: F,
}

impl<F: Fn() -> DateTime<Utc>> TimeOptions<F> {
    /// Creates options based on the specified time leeway and clock function.
    pub fn new(leeway: Duration, clock_fn: F) -> Self {
        Self { leeway, clock_fn }
    }
}

impl TimeOptions {
    /// Creates options based on the specified time leeway. The clock source is [`Utc::now()`].
    pub fn from_leeway(leeway: Duration) -> Self {
        Self {
            leeway,
            clock_fn: Utc::now,
        }
    }
}

/// Strict options: no leeway, the clock source is [`Utc::now()`].
impl Default for TimeOptions {
    fn default() -> Self {
        Self::from_leeway(Duration::zero())
    }
}

/// Value of a private claim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClaimValue {
    /// String value.
    String(String),
    /// Integer value.
    Integer(i64),
    /// Boolean value.
    Boolean(bool),
    /// List of strings.
    StringList(Vec<String>),
    /// Explicit `null`.
    Null,
    /// Any other JSON value (e.g., a float or a nested object).
    Other(serde_json::Value),
}

impl fmt::Display for ClaimValue {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => formatter.write_str(s),
            Self::Integer(i) => write!(formatter, "{i}"),
            Self::Boolean(b) => write!(formatter, "{b}"),
            Self::StringList(items) => formatter.write_str(&items.join(",")),
            Self::Null => formatter.write_str("null"),
            Self::Other(value) => write!(formatter, "{value}"),
        }
    }
}

/// Claims encoded in a token.
///
/// Registered claims as per [JWT spec] get dedicated fields; all other claims are kept
/// verbatim in [`Self::private`]. A `ClaimSet` obtained from a token is only reachable
/// through a [`VerifiedToken`], i.e., after the token signature has been checked.
///
/// [JWT spec]: https://tools.ietf.org/html/rfc7519#section-4.1
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct ClaimSet {
    /// Token issuer.
    #[serde(rename = "iss", default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,

    /// Token subject.
    #[serde(rename = "sub", default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,

    /// Token audience. Serialized as a string if there is a single recipient.
    #[serde(
        rename = "aud",
        default,
        skip_serializing_if = "Vec::is_empty",
        with = "self::serde_audience"
    )]
    pub audience: Vec<String>,

    /// Date of token issuance.
    #[serde(
        rename = "iat",
        default,
        skip_serializing_if = "Option::is_none",
        with = "self::serde_timestamp"
    )]
    pub issued_at: Option<DateTime<Utc>>,

    /// Minimum date at which token is valid.
    #[serde(
        rename = "nbf",
        default,
        skip_serializing_if = "Option::is_none",
        with = "self::serde_timestamp"
    )]
    pub not_before: Option<DateTime<Utc>>,

    /// Expiration date of the token.
    #[serde(
        rename = "exp",
        default,
        skip_serializing_if = "Option::is_none",
        with = "self::serde_timestamp"
    )]
    pub expiration: Option<DateTime<Utc>>,

    /// Token identifier.
    #[serde(rename = "jti", default, skip_serializing_if = "Option::is_none")]
    pub jwt_id: Option<String>,

    /// Private claims.
    #[serde(flatten)]
    pub private: BTreeMap<String, ClaimValue>,
}

impl ClaimSet {
    /// Creates an empty claim set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the `iss` claim.
    #[must_use]
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    /// Sets the `sub` claim.
    #[must_use]
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Sets the `nbf` claim.
    #[must_use]
    pub fn with_not_before(mut self, moment: DateTime<Utc>) -> Self {
        self.not_before = Some(moment);
        self
    }

    /// Sets the `exp` claim.
    #[must_use]
    pub fn with_expiration(mut self, moment: DateTime<Utc>) -> Self {
        self.expiration = Some(moment);
        self
    }

    /// Adds a private claim.
    #[must_use]
    pub fn with_private(mut self, name: impl Into<String>, value: ClaimValue) -> Self {
        self.private.insert(name.into(), value);
        self
    }

    /// Validates the `iss` claim, which must match `expected` exactly.
    pub fn validate_issuer(&self, expected: &str) -> Result<&Self, ValidationError> {
        if self.issuer.as_deref() == Some(expected) {
            Ok(self)
        } else {
            Err(ValidationError::IssuerMismatch {
                expected: expected.to_owned(),
                actual: self.issuer.clone(),
            })
        }
    }

    /// Validates the expiration claim.
    ///
    /// This method will return an error if the claims do not feature an expiration date,
    /// or if it is not in the future (subject to the provided `options`).
    pub fn validate_expiration<F>(&self, options: &TimeOptions<F>) -> Result<&Self, ValidationError>
    where
        F: Fn() -> DateTime<Utc>,
    {
        self.expiration.map_or(
            Err(ValidationError::NoClaim(Claim::Expiration)),
            |expiration| {
                if (options.clock_fn)() >= expiration + options.leeway {
                    Err(ValidationError::Expired)
                } else {
                    Ok(self)
                }
            },
        )
    }

    /// Validates the maturity date (`nbf` claim).
    ///
    /// This method will return an error if the claims do not feature a maturity date,
    /// or if it is in the future (subject to the provided `options`).
    pub fn validate_maturity<F>(&self, options: &TimeOptions<F>) -> Result<&Self, ValidationError>
    where
        F: Fn() -> DateTime<Utc>,
    {
        self.not_before.map_or(
            Err(ValidationError::NoClaim(Claim::NotBefore)),
            |not_before| {
                if (options.clock_fn)() < not_before - options.leeway {
                    Err(ValidationError::NotMature)
                } else {
                    Ok(self)
                }
            },
        )
    }
}

/// Checks the issuer binding and the validity period of a [`VerifiedToken`].
#[derive(Debug, Clone)]
pub struct ClaimValidator<F = fn() -> DateTime<Utc>> {
    expected_issuer: String,
    time_options: TimeOptions<F>,
}

impl ClaimValidator {
    /// Creates a validator with strict [`TimeOptions`].
    pub fn new(expected_issuer: impl Into<String>) -> Self {
        Self::with_time_options(expected_issuer, TimeOptions::default())
    }
}

impl<F: Fn() -> DateTime<Utc>> ClaimValidator<F> {
    /// Creates a validator with the specified time options.
    pub fn with_time_options(expected_issuer: impl Into<String>, options: TimeOptions<F>) -> Self {
        Self {
            expected_issuer: expected_issuer.into(),
            time_options: options,
        }
    }

    /// Validates claims of `token`. Any failed check rejects the token as a whole.
    pub fn validate(&self, token: &VerifiedToken) -> Result<(), ValidationError> {
        token
            .claims()
            .validate_issuer(&self.expected_issuer)?
            .validate_maturity(&self.time_options)?
            .validate_expiration(&self.time_options)?;
        Ok(())
    }
}

mod serde_timestamp {
    use chrono::{DateTime, Utc};
    use serde::{
        de::{Error as DeError, Unexpected, Visitor},
        Deserializer, Serializer,
    };

    use core::fmt;

    struct TimestampVisitor;

    impl<'de> Visitor<'de> for TimestampVisitor {
        type Value = DateTime<Utc>;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("UTC timestamp")
        }

        fn visit_i64<E: DeError>(self, value: i64) -> Result<Self::Value, E> {
            DateTime::from_timestamp(value, 0)
                .ok_or_else(|| E::invalid_value(Unexpected::Signed(value), &self))
        }

        fn visit_u64<E: DeError>(self, value: u64) -> Result<Self::Value, E> {
            let secs = i64::try_from(value)
                .map_err(|_| E::invalid_value(Unexpected::Unsigned(value), &self))?;
            self.visit_i64(secs)
        }

        #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)] // bounds are checked
        fn visit_f64<E: DeError>(self, value: f64) -> Result<Self::Value, E> {
            let invalid = || E::invalid_value(Unexpected::Float(value), &self);
            if !value.is_finite() || value.abs() > i64::MAX as f64 {
                return Err(invalid());
            }
            DateTime::from_timestamp(value.trunc() as i64, 0).ok_or_else(invalid)
        }
    }

    pub fn serialize<S: Serializer>(
        time: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match time {
            Some(time) => serializer.serialize_i64(time.timestamp()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        deserializer.deserialize_any(TimestampVisitor).map(Some)
    }
}

mod serde_audience {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    pub fn serialize<S: Serializer>(audience: &[String], serializer: S) -> Result<S::Ok, S::Error> {
        match audience {
            [single] => single.serialize(serializer),
            _ => audience.serialize(serializer),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
        Ok(match OneOrMany::deserialize(deserializer)? {
            OneOrMany::One(single) => vec![single],
            OneOrMany::Many(audience) => audience,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::TimeZone;
    use serde_json::json;

    fn at(timestamp: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(timestamp, 0).single().unwrap()
    }

    fn fixed_clock(timestamp: i64) -> TimeOptions<impl Fn() -> DateTime<Utc>> {
        TimeOptions::new(Duration::zero(), move || at(timestamp))
    }

    #[test]
    fn deserializing_gitlab_claims() {
        let claims = json!({
            "namespace_id": "10",
            "project_path": "example/gitlab-ci-validate-jwt",
            "ref_protected": "true",
            "jti": "46b04b9b-a8f1-431f-8826-c6917ca6771f",
            "iss": "gitlab.example.com",
            "iat": 1_677_188_547,
            "nbf": 1_677_188_542,
            "exp": 1_677_192_147,
            "sub": "project_path:example/gitlab-ci-validate-jwt:ref_type:branch:ref:master",
            "aud": "https://example.com",
        });
        let claims: ClaimSet = serde_json::from_value(claims).unwrap();

        assert_eq!(claims.issuer.as_deref(), Some("gitlab.example.com"));
        assert_eq!(claims.audience, ["https://example.com"]);
        assert_eq!(claims.issued_at, Some(at(1_677_188_547)));
        assert_eq!(claims.not_before, Some(at(1_677_188_542)));
        assert_eq!(claims.expiration, Some(at(1_677_192_147)));
        assert_eq!(claims.private.len(), 3);
        assert_eq!(
            claims.private["project_path"],
            ClaimValue::String("example/gitlab-ci-validate-jwt".to_owned())
        );
        assert!(!claims.private.contains_key("iss"));
    }

    #[test]
    fn private_claim_values() {
        let claims = json!({
            "count": 5,
            "admin": true,
            "groups": ["a", "b"],
            "nothing": null,
            "ratio": 0.5,
            "nested": { "x": 1 },
        });
        let claims: ClaimSet = serde_json::from_value(claims).unwrap();

        assert_eq!(claims.private["count"], ClaimValue::Integer(5));
        assert_eq!(claims.private["admin"], ClaimValue::Boolean(true));
        assert_eq!(
            claims.private["groups"],
            ClaimValue::StringList(vec!["a".to_owned(), "b".to_owned()])
        );
        assert_eq!(claims.private["nothing"], ClaimValue::Null);
        assert_eq!(claims.private["ratio"], ClaimValue::Other(json!(0.5)));
        assert_eq!(claims.private["nested"].to_string(), r#"{"x":1}"#);
        assert_eq!(claims.private["groups"].to_string(), "a,b");
    }

    #[test]
    fn audience_forms() {
        let claims: ClaimSet = serde_json::from_value(json!({ "aud": ["a", "b"] })).unwrap();
        assert_eq!(claims.audience, ["a", "b"]);
        assert_eq!(serde_json::to_value(&claims).unwrap(), json!({ "aud": ["a", "b"] }));

        let claims: ClaimSet = serde_json::from_value(json!({ "aud": "a" })).unwrap();
        assert_eq!(serde_json::to_value(&claims).unwrap(), json!({ "aud": "a" }));

        let err = serde_json::from_value::<ClaimSet>(json!({ "aud": 5 })).unwrap_err();
        assert!(err.to_string().contains("OneOrMany"), "{err}");
    }

    #[test]
    fn fractional_and_malformed_timestamps() {
        let claims: ClaimSet = serde_json::from_value(json!({ "exp": 1_500_000_000.75 })).unwrap();
        assert_eq!(claims.expiration, Some(at(1_500_000_000)));

        for malformed in [json!("1500000000"), json!(false), json!(1e300)] {
            let claims = json!({ "exp": malformed });
            assert!(serde_json::from_value::<ClaimSet>(claims).is_err());
        }
    }

    #[test]
    fn issuer_binding() {
        let claims = ClaimSet::new().with_issuer("gitlab.example.com");
        assert!(claims.validate_issuer("gitlab.example.com").is_ok());
        assert_matches!(
            claims.validate_issuer("https://gitlab.example.com").unwrap_err(),
            ValidationError::IssuerMismatch { actual: Some(ref actual), .. }
                if actual == "gitlab.example.com"
        );
        assert_matches!(
            ClaimSet::new().validate_issuer("gitlab.example.com").unwrap_err(),
            ValidationError::IssuerMismatch { actual: None, .. }
        );
    }

    #[test]
    fn expired_claim() {
        let mut claims = ClaimSet::new();
        assert_matches!(
            claims.validate_expiration(&fixed_clock(100)).unwrap_err(),
            ValidationError::NoClaim(Claim::Expiration)
        );

        claims.expiration = Some(at(100));
        assert!(claims.validate_expiration(&fixed_clock(99)).is_ok());
        assert_matches!(
            claims.validate_expiration(&fixed_clock(100)).unwrap_err(),
            ValidationError::Expired
        );
        assert_matches!(
            claims.validate_expiration(&fixed_clock(101)).unwrap_err(),
            ValidationError::Expired
        );

        // Leeway extends the validity period.
        let lenient = TimeOptions::new(Duration::seconds(5), || at(104));
        assert!(claims.validate_expiration(&lenient).is_ok());
    }

    #[test]
    fn immature_claim() {
        let mut claims = ClaimSet::new();
        assert_matches!(
            claims.validate_maturity(&fixed_clock(100)).unwrap_err(),
            ValidationError::NoClaim(Claim::NotBefore)
        );

        claims.not_before = Some(at(100));
        assert!(claims.validate_maturity(&fixed_clock(100)).is_ok());
        assert!(claims.validate_maturity(&fixed_clock(101)).is_ok());
        assert_matches!(
            claims.validate_maturity(&fixed_clock(99)).unwrap_err(),
            ValidationError::NotMature
        );

        let lenient = TimeOptions::new(Duration::seconds(5), || at(95));
        assert!(claims.validate_maturity(&lenient).is_ok());
    }

    #[test]
    fn default_time_options_are_strict() {
        assert_eq!(TimeOptions::default().leeway, Duration::zero());
    }
}
