//! Server configuration
//!
//! Everything comes from the command line; the only file the server reads
//! at startup is the token verification key.

use std::fs;
use std::path::PathBuf;

use clap::Parser;

use tearoom_net::{Result, TokenVerifier, DEFAULT_PORT};

/// Command-line arguments for the server.
#[derive(Parser, Debug)]
#[command(name = "tearoom-server")]
#[command(about = "Tearoom chat server", long_about = None)]
pub struct CliArgs {
    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Path to the RSA public key (PEM) used to verify identity tokens.
    #[arg(long, default_value = "jwt.public.pem")]
    pub public_key: PathBuf,

    /// Path to a shared-secret file; switches verification to HS256.
    #[arg(long, conflicts_with = "public_key")]
    pub secret_file: Option<PathBuf>,
}

impl CliArgs {
    /// Build the token verifier from whichever key source was given.
    pub fn verifier(&self) -> Result<TokenVerifier> {
        match &self.secret_file {
            Some(path) => {
                let secret = fs::read(path)?;
                Ok(TokenVerifier::hs256_from_secret(&secret))
            }
            None => {
                let pem = fs::read(&self.public_key)?;
                TokenVerifier::rs256_from_pem(&pem)
            }
        }
    }
}
