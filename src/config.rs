use anyhow::{anyhow, Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::crypto::Kdf;
use crate::scheme::SchemeKind;
use crate::shamir::SecretSharingConfig;

/// Configuration for the shardfile tool
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Directory where share files are written
    pub output_dir: PathBuf,
    /// Number of shares to create (default: 5)
    pub default_shares: usize,
    /// Threshold required to recover a file (default: 3)
    pub default_threshold: usize,
    /// Scheme used when `--scheme` is not given
    pub default_scheme: SchemeKind,
    /// KDF for password-protected splits
    pub kdf: Kdf,
    /// Fail recovery when the recovered SHA-256 does not match
    pub strict_integrity: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            default_shares: 5,
            default_threshold: 3,
            default_scheme: SchemeKind::Hybrid,
            kdf: Kdf::Pbkdf2,
            strict_integrity: false,
        }
    }
}

impl Config {
    /// Get config file path
    pub fn config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("com", "shardfile", "shardfile")
            .context("Failed to determine configuration directory")?;

        Ok(proj_dirs.config_dir().join("config.json"))
    }

    /// Load configuration from `path`, falling back to defaults when missing
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let config: Config = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        config.sharing().validate().map_err(|e| {
            anyhow!("Invalid defaults in {}: {}", path.display(), e)
        })?;

        Ok(config)
    }

    /// Save configuration to `path`
    pub fn save(&self, path: &Path) -> Result<()> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = serde_json::to_string_pretty(self)
            .context("Failed to serialize config")?;

        fs::write(path, contents)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Default threshold parameters
    pub fn sharing(&self) -> SecretSharingConfig {
        SecretSharingConfig::new(self.default_threshold, self.default_shares)
    }

    /// Initialize configuration with user input
    pub fn initialize(path: &Path) -> Result<Self> {
        use console::style;
        use dialoguer::{Confirm, Input, Select};

        println!("{}", style("Welcome to shardfile - threshold file sharing").bold().green());
        println!("Let's set up your configuration...");

        let defaults = Config::default();

        let output_dir: String = Input::new()
            .with_prompt("Directory for share files")
            .default(defaults.output_dir.display().to_string())
            .interact_text()?;

        let default_shares: usize = Input::new()
            .with_prompt("Number of shares to create")
            .default(defaults.default_shares)
            .validate_with(|input: &usize| {
                if *input >= 2 {
                    Ok(())
                } else {
                    Err("At least 2 shares are needed")
                }
            })
            .interact_text()?;

        let default_threshold: usize = Input::new()
            .with_prompt("Shares needed to recover")
            .default(defaults.default_threshold.min(default_shares))
            .validate_with(|input: &usize| {
                if *input >= 2 && *input <= default_shares {
                    Ok(())
                } else {
                    Err("Threshold must be between 2 and the number of shares")
                }
            })
            .interact_text()?;

        let schemes = &[
            "hybrid (encrypt the file, share the key)",
            "pure-shamir (share the file bytes directly)",
        ];
        let default_scheme = match Select::new()
            .with_prompt("Default scheme")
            .default(0)
            .items(schemes)
            .interact()?
        {
            0 => SchemeKind::Hybrid,
            _ => SchemeKind::PureShamir,
        };

        let kdf = if Confirm::new()
            .with_prompt("Use Argon2id instead of PBKDF2 for passwords?")
            .default(false)
            .interact()?
        {
            Kdf::Argon2id
        } else {
            Kdf::Pbkdf2
        };

        let strict_integrity = Confirm::new()
            .with_prompt("Fail recovery when the SHA-256 does not match?")
            .default(false)
            .interact()?;

        let config = Config {
            output_dir: PathBuf::from(output_dir),
            default_shares,
            default_threshold,
            default_scheme,
            kdf,
            strict_integrity,
        };

        // Save configuration
        config.save(path)?;

        println!("{}", style("\nConfiguration saved successfully!").green());

        Ok(config)
    }
}
