use std::io::{self, BufRead};

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use tracing_subscriber::EnvFilter;
use zeroize::Zeroizing;

use sharded_custody::cli::{Cli, Commands};
use sharded_custody::commands;

/// Read one secret line from stdin (hidden input when TTY available)
fn read_secret(prompt: &str) -> Result<Zeroizing<String>> {
    if atty::is(atty::Stream::Stdin) {
        eprintln!("{prompt}:");
        let secret = rpassword::read_password().context("Failed to read secret from stdin")?;
        Ok(Zeroizing::new(secret.trim().to_string()))
    } else {
        // Non-interactive mode (piped input) - one secret per line
        let stdin = io::stdin();
        let mut handle = stdin.lock();
        let mut line = Zeroizing::new(String::new());
        handle
            .read_line(&mut line)
            .context("Failed to read secret from stdin")?;
        Ok(Zeroizing::new(line.trim().to_string()))
    }
}

fn read_required(prompt: &str) -> Result<Zeroizing<String>> {
    let secret = read_secret(prompt)?;
    if secret.is_empty() {
        anyhow::bail!("Nothing read from stdin");
    }
    Ok(secret)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to encode output")?;
    println!("{json}");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout stays machine-readable
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.custody_config()?;
    let custodian = commands::open_custodian(&cli.store, config);

    match cli.command {
        Commands::NewAccount => {
            print_json(&commands::new_account(&custodian).await?)?;
        }
        Commands::Enroll => {
            let private_key = read_required("Enter private key (hex)")?;
            print_json(&commands::enroll(&custodian, &private_key).await?)?;
        }
        Commands::Address => {
            let private_key = read_required("Enter private key (hex)")?;
            print_json(&commands::address(&private_key)?)?;
        }
        Commands::Sign { address, payload } => {
            let share = read_required("Enter share")?;
            print_json(&commands::sign(&custodian, &address, &share, &payload).await?)?;
        }
        Commands::Rekey { address } => {
            let share = read_required("Enter share")?;
            print_json(&commands::rekey(&custodian, &address, &share).await?)?;
        }
        Commands::SealShare {
            generate_code,
            code_length,
        } => {
            let share = read_required("Enter share")?;
            let passphrase = if generate_code {
                None
            } else {
                Some(read_required("Enter passphrase")?)
            };
            let output = commands::seal_share(&share, passphrase.as_deref().map(String::as_str), code_length)?;
            print_json(&output)?;
        }
        Commands::UnsealShare { input } => {
            let sealed = tokio::fs::read_to_string(&input)
                .await
                .with_context(|| format!("Failed to read {}", input.display()))?;
            let passphrase = read_required("Enter passphrase")?;
            let share = commands::unseal_share(&sealed, &passphrase)?;
            println!("{}", share.as_str());
        }
    }

    Ok(())
}
