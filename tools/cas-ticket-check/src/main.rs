#![allow(clippy::print_stdout)]

#[macro_use]
extern crate tracing;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context as _;
use cas_ticket_validator::{CasServerUrl, ValidatorConf};
use clap::{ArgGroup, Parser};
use tracing_subscriber::EnvFilter;
use url::Url;

const EXIT_NOT_AUTHENTICATED: u8 = 1;
const EXIT_FAILURE: u8 = 2;

/// Validates a CAS service ticket and prints the outcome as JSON
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
#[command(group(ArgGroup::new("server").required(true).args(["conf", "cas_url"])))]
struct Cli {
    /// JSON configuration file (CasUrl, UserAgent, TimeoutSecs, Proxy)
    #[arg(long, value_name = "FILE")]
    conf: Option<PathBuf>,

    /// Base URL of the CAS server, e.g. https://cas.example.org/cas
    #[arg(long, value_name = "URL")]
    cas_url: Option<CasServerUrl>,

    /// Service URL the ticket was issued for
    #[arg(long, value_name = "URL")]
    service: Url,

    /// Service ticket received from the login redirect
    #[arg(long)]
    ticket: String,

    /// Overrides the User-Agent header
    #[arg(long, value_name = "UA")]
    user_agent: Option<String>,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Print the validation URLs and exit without contacting the server
    #[arg(long)]
    print_urls: bool,

    /// Enable debug logs (RUST_LOG takes precedence)
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn conf(&self) -> anyhow::Result<ValidatorConf> {
        let mut conf = match (&self.conf, &self.cas_url) {
            (Some(path), _) => ValidatorConf::load(path)?,
            (None, Some(cas_url)) => ValidatorConf::new(cas_url.clone()),
            (None, None) => anyhow::bail!("either --conf or --cas-url must be specified"),
        };

        if let Some(user_agent) = &self.user_agent {
            conf.user_agent = Some(user_agent.clone());
        }

        if let Some(timeout) = self.timeout {
            conf.timeout_secs = Some(timeout);
        }

        Ok(conf)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    match run(cli).await {
        Ok(code) => code,
        Err(error) => {
            error!(error = format!("{error:#}"), "Ticket validation failed");
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

fn init_logging(verbose: bool) {
    let default_directives = if verbose {
        "info,cas_ticket_validator=debug,cas_ticket_check=debug"
    } else {
        "info"
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let conf = cli.conf()?;

    if cli.print_urls {
        println!("{}", conf.cas_url.service_validate_url(&cli.service, &cli.ticket));
        println!("{}", conf.cas_url.validate_url(&cli.service, &cli.ticket));
        return Ok(ExitCode::SUCCESS);
    }

    let validator = conf.build_validator()?;
    debug!(?validator, "Validator ready");

    let validation = validator.validate_ticket(&cli.service, &cli.ticket).await?;

    let json = serde_json::to_string_pretty(&validation).context("failed to serialize the validation result")?;
    println!("{json}");

    if validation.is_authenticated() {
        info!(user = validation.user().unwrap_or_default(), "Ticket accepted");
        Ok(ExitCode::SUCCESS)
    } else {
        info!("Ticket not accepted");
        Ok(ExitCode::from(EXIT_NOT_AUTHENTICATED))
    }
}
