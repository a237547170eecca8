use anyhow::{anyhow, Context, Result};
use console::style;
use dialoguer::Password;
use indicatif::{ProgressBar, ProgressStyle};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::Config;
use crate::crypto::{Kdf, SecretString};
use crate::scheme::{FileInput, FileMetadata, SchemeKind, ShareEngine, ShareSet};
use crate::serialization;
use crate::shamir::SecretSharingConfig;
use crate::storage::{self, Storage};

/// Options for the split command
pub struct SplitOptions {
    pub file: PathBuf,
    pub threshold: Option<usize>,
    pub shares: Option<usize>,
    pub scheme: Option<SchemeKind>,
    pub password: Option<String>,
    pub ask_password: bool,
    pub kdf: Option<Kdf>,
    pub output_dir: Option<PathBuf>,
}

/// Options for the recover command
pub struct RecoverOptions {
    pub shares: Vec<PathBuf>,
    pub ciphertext: Option<PathBuf>,
    pub password: Option<String>,
    pub ask_password: bool,
    pub output: Option<PathBuf>,
    pub strict: bool,
    pub force: bool,
}

fn spinner(message: &'static str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.enable_steady_tick(Duration::from_millis(100));
    if let Ok(spinner_style) = ProgressStyle::with_template("{spinner:.green} {msg}") {
        pb.set_style(
            spinner_style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
    }
    pb.set_message(message);
    pb
}

fn prompt_password(confirm: bool) -> Result<SecretString> {
    let mut prompt = Password::new().with_prompt("Enter password");
    if confirm {
        prompt = prompt.with_confirmation("Confirm password", "Passwords do not match");
    }
    Ok(SecretString::new(prompt.interact()?))
}

/// Execute the init command
pub fn init(config_path: &Path) -> Result<()> {
    Config::initialize(config_path)?;
    Ok(())
}

/// Execute the split command
pub fn split(config: &Config, options: SplitOptions) -> Result<()> {
    let (name, data) = storage::read_input(&options.file)?;

    let sharing = SecretSharingConfig::new(
        options.threshold.unwrap_or(config.default_threshold),
        options.shares.unwrap_or(config.default_shares),
    );
    sharing.validate()?;

    let scheme = options.scheme.unwrap_or(config.default_scheme);
    let kdf = options.kdf.unwrap_or(config.kdf);

    let password = match options.password {
        Some(password) => Some(SecretString::new(password)),
        None if options.ask_password => Some(prompt_password(true)?),
        None => None,
    };

    println!("{}", style("Split File").bold().green());
    println!("File: {} ({} bytes)", style(&name).bold(), data.len());
    println!(
        "Scheme: {}, {} of {} shares needed",
        scheme, sharing.threshold, sharing.total_shares
    );

    let pb = spinner("Splitting file...");

    let engine = ShareEngine::default().with_kdf(kdf);
    let file = FileInput {
        name: &name,
        data: &data,
    };
    let output = engine.split(
        scheme,
        &file,
        &sharing,
        password.as_ref(),
        &mut ChaCha20Rng::from_entropy(),
    )?;

    let output_dir = options
        .output_dir
        .unwrap_or_else(|| config.output_dir.clone());
    let written = Storage::new(output_dir).write_split(&name, &output)?;

    pb.finish_and_clear();

    let metadata = output.metadata();
    println!("\n{}", style("File split successfully!").green().bold());
    println!("{}", style("─".repeat(50)).dim());
    println!("SHA-256: {}", metadata.common().original_sha256);
    for path in &written.share_paths {
        println!("Share: {}", path.display());
    }
    if let Some(path) = &written.ciphertext_path {
        println!("Encrypted file: {}", path.display());
    }
    println!("{}", style("─".repeat(50)).dim());

    println!("\n{}", style("IMPORTANT:").yellow().bold());
    println!(
        " • Give each holder one share file; any {} of them recover the file",
        sharing.threshold
    );
    if let FileMetadata::Hybrid(hybrid) = &metadata {
        println!(" • The encrypted file must be kept next to the shares");
        if hybrid.common.use_password {
            println!(" • The password alone also decrypts the encrypted file");
        }
    }

    Ok(())
}

/// Execute the recover command
pub fn recover(config: &Config, options: RecoverOptions) -> Result<()> {
    let files = storage::read_share_files(&options.shares)?;
    let set = ShareSet::from_files(files)?;
    let common = set.common().clone();

    println!("{}", style("Recover File").bold().green());
    println!("File: {}", style(&common.filename).bold());
    println!(
        "Scheme: {}, {} of {} shares needed",
        set.scheme(),
        common.threshold,
        common.total_shares
    );

    let password = match options.password {
        Some(password) => Some(SecretString::new(password)),
        None if options.ask_password || common.use_password => Some(prompt_password(false)?),
        None => None,
    };

    let ciphertext = match set.scheme() {
        SchemeKind::Hybrid => {
            let path = match options.ciphertext {
                Some(path) => path,
                None => default_ciphertext_path(&options.shares[0], &common.filename),
            };
            Some(fs::read(&path).with_context(|| {
                format!("Failed to read encrypted file {} (use --ciphertext)", path.display())
            })?)
        }
        SchemeKind::PureShamir => None,
    };

    let pb = spinner("Recovering file...");
    let result = ShareEngine::default().recover(&set, ciphertext.as_deref(), password.as_ref());
    pb.finish_and_clear();
    let result = result?;

    let verified = result.integrity_ok(&common);
    if !verified && (options.strict || config.strict_integrity) {
        return Err(anyhow!(
            "SHA-256 mismatch: expected {}, recovered {}",
            common.original_sha256,
            result.recovered_sha256
        ));
    }

    let output = match options.output {
        Some(path) => path,
        None => config.output_dir.join(safe_file_name(&result.filename)?),
    };
    storage::write_output(&output, &result.data, options.force)?;

    println!("\n{}", style("🔓 File Recovered Successfully").green().bold());
    println!("{}", style("─".repeat(50)).dim());
    println!("Output: {}", output.display());
    println!("Recovered SHA-256: {}", result.recovered_sha256);
    println!("Original SHA-256:  {}", common.original_sha256);
    if verified {
        println!("{}", style("Integrity check passed").green());
    } else {
        println!(
            "{}",
            style("WARNING: SHA-256 does not match the original file").yellow().bold()
        );
    }

    Ok(())
}

/// Execute the inspect command
pub fn inspect(path: &Path) -> Result<()> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    println!("Detected scheme: {}", style(serialization::detect_scheme(&text)).bold());

    let file = serialization::from_json(&text)
        .with_context(|| format!("Failed to parse share file {}", path.display()))?;
    let metadata = file.metadata();
    let common = metadata.common();

    println!("{}", style("─".repeat(50)).dim());
    println!("Share ID: {}", file.id());
    println!("Scheme: {}", metadata.scheme());
    println!("File: {} ({} bytes)", common.filename, common.original_size);
    println!("Shares: {} (need {} to recover)", common.total_shares, common.threshold);
    if common.use_password {
        println!("Password: {} ({})", style("required").yellow(), common.kdf);
    } else {
        println!("Password: not used");
    }
    if let FileMetadata::PureShamir(pure) = &metadata {
        println!(
            "Chunks: {} x {} bytes ({} bytes shared)",
            pure.total_chunks, pure.chunk_size, pure.processed_size
        );
    }
    println!("SHA-256: {}", common.original_sha256);
    if let Some(created) = &common.created_at {
        println!("Created: {}", created.split('T').next().unwrap_or(created.as_str()));
    }
    println!("{}", style("─".repeat(50)).dim());

    Ok(())
}

/// `<dir of first share>/<original name>.enc`, matching what split writes
fn default_ciphertext_path(first_share: &Path, filename: &str) -> PathBuf {
    let dir = first_share.parent().unwrap_or_else(|| Path::new(""));
    dir.join(format!("{}.enc", filename))
}

/// Strip any directory components from a name taken out of share metadata
fn safe_file_name(name: &str) -> Result<&str> {
    Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow!("Share metadata has an unusable file name '{}'", name))
}
