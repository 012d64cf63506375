//! sysgate binary entrypoint.

use std::io;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use sysgate_secrets::{HostIdentity, SecretCodec};
use tracing::error;
use tracing_subscriber::EnvFilter;

use sysgate_server::cli::{Cli, Commands, write_encrypted_secret, write_generated_key, write_password_hash};
use sysgate_server::config::ConfigError;
use sysgate_server::error::ServerError;
use sysgate_server::server;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %format!("{e:#}"), "sysgate failed");
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Serve { config } => {
            match server::run(&config, server::shutdown_signal()).await {
                Err(ServerError::Config(ConfigError::NotFound { path })) => {
                    anyhow::bail!(
                        "no configuration at {}; create it or point --config / SYSGATE_CONFIG elsewhere",
                        path.display()
                    )
                }
                other => other?,
            }
        }
        Commands::HashPassword { password } => write_password_hash(&password, &mut io::stdout().lock())?,
        Commands::EncryptSecret { plaintext } => {
            let codec = SecretCodec::from_provider(&HostIdentity::new())
                .context("failed to derive host key")?;
            write_encrypted_secret(&codec, &plaintext, &mut io::stdout().lock())?;
        }
        Commands::GenerateKey { name } => write_generated_key(&name, &mut io::stdout().lock())?,
    }
    Ok(())
}
