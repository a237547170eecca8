mod chunk;
mod commands;
mod config;
mod crypto;
mod scheme;
mod serialization;
mod shamir;
mod storage;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::commands::{RecoverOptions, SplitOptions};
use crate::crypto::Kdf;
use crate::scheme::SchemeKind;

#[derive(Parser)]
#[command(name = "shardfile")]
#[command(about = "Split a file into threshold fragments using Shamir's Secret Sharing", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize shardfile configuration
    Init,

    /// Split a file into share files
    Split {
        /// The file to split
        file: PathBuf,

        /// Shares needed to recover the file
        #[arg(short, long)]
        threshold: Option<usize>,

        /// Number of shares to create
        #[arg(short = 'n', long)]
        shares: Option<usize>,

        /// hybrid or pure-shamir
        #[arg(long)]
        scheme: Option<SchemeKind>,

        /// Protect the file with this password
        #[arg(long, conflicts_with = "ask_password")]
        password: Option<String>,

        /// Prompt for a password
        #[arg(long)]
        ask_password: bool,

        /// Password KDF: pbkdf2 or argon2id
        #[arg(long)]
        kdf: Option<Kdf>,

        /// Directory for the share files
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// Recover a file from share files
    Recover {
        /// Share files to combine
        #[arg(required = true)]
        shares: Vec<PathBuf>,

        /// Encrypted file for the hybrid scheme (defaults to <name>.enc next to the first share)
        #[arg(long)]
        ciphertext: Option<PathBuf>,

        /// Password the file was protected with
        #[arg(long, conflicts_with = "ask_password")]
        password: Option<String>,

        /// Prompt for a password
        #[arg(long)]
        ask_password: bool,

        /// Where to write the recovered file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Fail if the recovered SHA-256 does not match the original
        #[arg(long)]
        strict: bool,

        /// Overwrite the output file if it exists
        #[arg(long)]
        force: bool,
    },

    /// Show the scheme and metadata of a share file
    Inspect {
        /// The share file to inspect
        file: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = match cli.config {
        Some(path) => path,
        None => config::Config::config_path()?,
    };

    // Load config for all commands except init
    let config = match cli.command {
        Commands::Init => config::Config::default(),
        _ => config::Config::load(&config_path).context("Failed to load configuration")?,
    };

    // Execute the appropriate command
    match cli.command {
        Commands::Init => commands::init(&config_path)?,
        Commands::Split {
            file,
            threshold,
            shares,
            scheme,
            password,
            ask_password,
            kdf,
            output_dir,
        } => commands::split(
            &config,
            SplitOptions {
                file,
                threshold,
                shares,
                scheme,
                password,
                ask_password,
                kdf,
                output_dir,
            },
        )?,
        Commands::Recover {
            shares,
            ciphertext,
            password,
            ask_password,
            output,
            strict,
            force,
        } => commands::recover(
            &config,
            RecoverOptions {
                shares,
                ciphertext,
                password,
                ask_password,
                output,
                strict,
                force,
            },
        )?,
        Commands::Inspect { file } => commands::inspect(&file)?,
    }

    Ok(())
}
