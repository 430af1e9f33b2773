//! Validates a GitLab CI job token passed via an environment variable.

use std::{process::ExitCode, time::Duration};

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use gitlab_ci_validate_jwt::{run, Config, Error, HttpSource, SERVER_HOST_VAR, SERVER_URL_VAR};

/// Validates a GitLab CI job JWT against the key set of the GitLab instance and dumps its claims
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Name of the environment variable holding the job token (e.g. CI_JOB_JWT_V2)
    #[arg(value_name = "TOKEN_VAR")]
    token_var: String,

    /// Base URL of the GitLab instance
    #[arg(long, env = "CI_SERVER_URL")]
    server_url: Option<String>,

    /// Expected token issuer
    #[arg(long, env = "CI_SERVER_HOST")]
    issuer: Option<String>,

    /// Timeout for the key set request in seconds
    #[arg(long, default_value_t = 10)]
    timeout: u64,

    /// Tolerated clock skew for the nbf and exp claims in seconds
    #[arg(long, default_value_t = 0)]
    leeway: u32,
}

impl Cli {
    fn config(&self) -> Result<Config, Error> {
        let lookup = |name: &str| match name {
            SERVER_URL_VAR => self.server_url.clone(),
            SERVER_HOST_VAR => self.issuer.clone(),
            _ => std::env::var(name).ok(),
        };
        let config = Config::from_env(&self.token_var, lookup)?
            .with_timeout(Duration::from_secs(self.timeout))
            .with_leeway(chrono::Duration::seconds(i64::from(self.leeway)));
        Ok(config)
    }
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let outcome = cli.config().and_then(|config| {
        let source = HttpSource::new(config.timeout())?;
        run(&config, source)
    });

    match outcome {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{err}");
            ExitCode::FAILURE
        }
    }
}
