//! Verification of [GitLab CI job tokens][id-tokens] against the key set published
//! by the GitLab instance.
//!
//! A job token is a [JSON web token (JWT)][JWT] signed with `RS256`. Verifying it
//! involves these steps:
//!
//! 1. Retrieve the [JWK set] from `<server URL>/oauth/discovery/keys` ([`KeyResolver`]).
//! 2. Split the compact token into its header, claims and signature ([`UntrustedToken`]).
//! 3. Check the signature with the key named by the `kid` header field ([`SignatureVerifier`]).
//!    Only after this step the claims become accessible ([`VerifiedToken`]).
//! 4. Check the `iss`, `nbf` and `exp` claims ([`ClaimValidator`]).
//! 5. Render all claims as sorted `name=value` lines ([`report()`]).
//!
//! Each step fails with a dedicated error type; the first failure aborts the run.
//! [`run()`] chains all steps and logs progress with [`tracing`].
//!
//! # Design choices
//!
//! - The algorithm is read from the token header, but it must be `RS256` and must agree
//!   with the algorithm and use declared by the selected key. This eliminates the possibility
//!   of [algorithm switching attacks][switching].
//! - Signatures are checked over the original `header.claims` text of the token,
//!   never over re-encoded data.
//! - Time checks are strict by default; leeway must be opted into via [`TimeOptions`].
//!
//! [id-tokens]: https://docs.gitlab.com/ee/ci/secrets/id_token_authentication.html
//! [JWT]: https://jwt.io/
//! [JWK set]: https://tools.ietf.org/html/rfc7517#section-5
//! [switching]: https://auth0.com/blog/critical-vulnerabilities-in-json-web-token-libraries/
//!
//! # Examples
//!
//! ```no_run
//! use gitlab_ci_validate_jwt::{run, Config, HttpSource};
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = Config::from_env("CI_JOB_JWT_V2", |name| std::env::var(name).ok())?;
//! let source = HttpSource::new(config.timeout())?;
//! for line in run(&config, source)? {
//!     println!("{line}");
//! }
//! # Ok(())
//! # }
//! ```

#![doc(html_root_url = "https://docs.rs/gitlab-ci-validate-jwt/0.1.0")]
#![warn(missing_debug_implementations, missing_docs, bare_trait_objects)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::missing_errors_doc,
    clippy::must_use_candidate,
    clippy::module_name_repetitions
)]

use chrono::{DateTime, Utc};

pub mod alg;
mod claims;
mod config;
mod error;
mod jwk;
mod key_set;
mod report;
mod resolver;
mod token;
mod verifier;

pub use crate::{
    claims::{ClaimSet, ClaimValidator, ClaimValue, TimeOptions},
    config::{Config, DISCOVERY_PATH, SERVER_HOST_VAR, SERVER_URL_VAR},
    error::{Claim, ConfigError, Error, KeySetError, ParseError, Segment, ValidationError},
    jwk::{JwkError, Key, KeyType, KeyUse},
    key_set::KeySet,
    report::{report, TIMESTAMP_FORMAT},
    resolver::{HttpSource, KeyResolver, KeySetSource, DEFAULT_TIMEOUT, MAX_DOCUMENT_SIZE},
    token::{Header, UntrustedToken, VerifiedToken},
    verifier::SignatureVerifier,
};

/// Claim naming the project that the job belongs to.
const PROJECT_PATH_CLAIM: &str = "project_path";

/// Runs the complete validation for `config`, reading the key set from `source`.
///
/// Returns the sorted claim lines, each of which is also logged.
pub fn run<S: KeySetSource>(config: &Config, source: S) -> Result<Vec<String>, Error> {
    run_with_clock(config, source, Utc::now)
}

/// Same as [`run()`], but with a custom source of the current time.
pub fn run_with_clock<S, F>(config: &Config, source: S, clock_fn: F) -> Result<Vec<String>, Error>
where
    S: KeySetSource,
    F: Fn() -> DateTime<Utc>,
{
    let key_set_url = config.key_set_url();
    tracing::info!("Getting the GitLab JWT public key set from the jwks endpoint at {key_set_url}...");
    let key_set = KeyResolver::new(source).fetch(&key_set_url)?;

    tracing::info!("Validating GitLab CI job JWT...");
    let token = UntrustedToken::new(config.token())?;
    let token = SignatureVerifier::new(&key_set).verify(token)?;
    let time_options = TimeOptions::new(config.leeway(), clock_fn);
    ClaimValidator::with_time_options(config.expected_issuer(), time_options).validate(&token)?;

    let claims = token.claims();
    let project = claims.private.get(PROJECT_PATH_CLAIM).map_or_else(
        || claims.subject.clone().unwrap_or_default(),
        ToString::to_string,
    );
    tracing::info!("jwt is valid for project {project}");

    let lines = report(claims);
    for line in &lines {
        tracing::info!("jwt claim: {line}");
    }
    Ok(lines)
}
