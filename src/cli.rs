use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};

use crate::domain::{CustodyConfig, ShareCount};

/// Validates the share count: the server keeps one, at least one goes out
fn validate_share_count(s: &str) -> Result<ShareCount, String> {
    let value: u8 = s
        .parse()
        .map_err(|_| format!("'{s}' is not a valid number"))?;

    let count = ShareCount::new(value).map_err(|e| e.to_string())?;
    if *count < 2 {
        return Err("Share count must be at least 2 (one server share plus one holder share)".into());
    }
    Ok(count)
}

fn validate_timeout(s: &str) -> Result<u64, String> {
    let value: u64 = s
        .parse()
        .map_err(|_| format!("'{s}' is not a valid number"))?;
    if value == 0 {
        return Err("Timeout must be greater than zero".into());
    }
    Ok(value)
}

#[derive(Parser)]
#[command(name = "custody")]
#[command(about = "Threshold custody of account keys: one share on the server, the rest with holders")]
pub struct Cli {
    /// JSON file holding custody records
    #[arg(long, env = "CUSTODY_STORE", default_value = "custody.json", global = true)]
    pub store: PathBuf,

    /// Shares produced per account, including the one the server keeps
    #[arg(
        long,
        env = "CUSTODY_SHARES",
        default_value = "4",
        value_parser = validate_share_count,
        global = true
    )]
    pub shares: ShareCount,

    /// Deadline for a single record store call, in milliseconds
    #[arg(
        long,
        env = "CUSTODY_STORE_TIMEOUT_MS",
        default_value = "5000",
        value_parser = validate_timeout,
        global = true
    )]
    pub timeout_ms: u64,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Custody settings from the global flags
    ///
    /// # Errors
    /// Returns an error if the flags do not form a valid configuration
    pub fn custody_config(&self) -> crate::error::Result<CustodyConfig> {
        CustodyConfig::new(self.shares, Duration::from_millis(self.timeout_ms))
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a new account key and take custody of it
    NewAccount,
    /// Take custody of an existing private key (read from stdin)
    Enroll,
    /// Print the address a private key (read from stdin) controls
    Address,
    /// Sign a payload with an account key, unlocked by a holder share (read from stdin)
    Sign {
        /// Account address
        #[arg(short, long)]
        address: String,

        /// Payload to sign: 0x-prefixed hex, otherwise taken as UTF-8 text
        #[arg(short, long)]
        payload: String,
    },
    /// Replace an account's shares, unlocked by a holder share (read from stdin)
    Rekey {
        /// Account address
        #[arg(short, long)]
        address: String,
    },
    /// Seal a holder share (read from stdin) under a passphrase
    SealShare {
        /// Generate a random reset code and use it as the passphrase
        #[arg(long)]
        generate_code: bool,

        /// Length of the generated reset code
        #[arg(long, default_value_t = 12, requires = "generate_code")]
        code_length: usize,
    },
    /// Recover a sealed share
    UnsealShare {
        /// JSON file written by seal-share
        #[arg(short, long)]
        input: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["custody", "new-account"]).unwrap();
        assert_eq!(*cli.shares, 4);
        assert_eq!(cli.timeout_ms, 5000);
        assert_eq!(cli.custody_config().unwrap(), CustodyConfig::default());
    }

    #[test]
    fn test_single_share_rejected() {
        assert!(Cli::try_parse_from(["custody", "--shares", "1", "new-account"]).is_err());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        assert!(Cli::try_parse_from(["custody", "--timeout-ms", "0", "enroll"]).is_err());
    }

    #[test]
    fn test_sign_arguments() {
        let cli = Cli::try_parse_from([
            "custody",
            "sign",
            "--address",
            "0x2c7536e3605d9c16a7a3d7b1898e529396a65c23",
            "--payload",
            "hello",
        ])
        .unwrap();
        assert!(matches!(cli.command, Commands::Sign { .. }));
    }

    #[test]
    fn test_code_length_requires_generate_code() {
        assert!(Cli::try_parse_from(["custody", "seal-share", "--code-length", "8"]).is_err());
    }
}
