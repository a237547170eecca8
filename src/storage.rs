// src/storage.rs

use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::scheme::SplitOutput;
use crate::serialization::{self, ShareFile};

/// Paths produced by writing out a split
#[derive(Debug, Clone)]
pub struct WrittenSplit {
    /// One JSON file per share holder
    pub share_paths: Vec<PathBuf>,
    /// Encrypted file (hybrid only)
    pub ciphertext_path: Option<PathBuf>,
}

/// Reads and writes fragment files on disk
pub struct Storage {
    output_dir: PathBuf,
}

impl Storage {
    /// Create a new storage manager
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Get the share file path for a holder
    pub fn share_path(&self, stem: &str, id: u32) -> PathBuf {
        self.output_dir.join(format!("{}.share-{}.json", stem, id))
    }

    /// Get the ciphertext path for a hybrid split
    pub fn ciphertext_path(&self, stem: &str) -> PathBuf {
        self.output_dir.join(format!("{}.enc", stem))
    }

    /// Write every share file, plus the ciphertext for hybrid splits.
    ///
    /// Nothing is written if any target path already exists.
    pub fn write_split(&self, stem: &str, output: &SplitOutput) -> Result<WrittenSplit> {
        let files = output.share_files();
        let share_paths: Vec<PathBuf> = files
            .iter()
            .map(|file| self.share_path(stem, file.id()))
            .collect();
        let ciphertext_path = output.ciphertext().map(|_| self.ciphertext_path(stem));

        if let Some(existing) = share_paths
            .iter()
            .chain(ciphertext_path.iter())
            .find(|path| path.exists())
        {
            return Err(anyhow!(
                "Refusing to overwrite existing file {}",
                existing.display()
            ));
        }

        fs::create_dir_all(&self.output_dir).with_context(|| {
            format!("Failed to create output directory {}", self.output_dir.display())
        })?;

        for (file, path) in files.iter().zip(&share_paths) {
            let json = serialization::to_json(file)?;
            fs::write(path, json)
                .with_context(|| format!("Failed to write share file {}", path.display()))?;
        }

        if let (Some(ciphertext), Some(path)) = (output.ciphertext(), &ciphertext_path) {
            fs::write(path, ciphertext)
                .with_context(|| format!("Failed to write encrypted file {}", path.display()))?;
        }

        Ok(WrittenSplit {
            share_paths,
            ciphertext_path,
        })
    }
}

/// Read a whole input file, returning its display name and contents
pub fn read_input(path: &Path) -> Result<(String, Vec<u8>)> {
    let data = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| anyhow!("{} has no file name", path.display()))?;
    Ok((name, data))
}

/// Parse one share file from disk
pub fn read_share_file(path: &Path) -> Result<ShareFile> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read share file {}", path.display()))?;
    serialization::from_json(&text)
        .with_context(|| format!("Failed to parse share file {}", path.display()))
}

/// Parse several share files, in the given order
pub fn read_share_files(paths: &[PathBuf]) -> Result<Vec<ShareFile>> {
    paths.iter().map(|p| read_share_file(p)).collect()
}

/// Write recovered bytes without clobbering an existing file unless asked
pub fn write_output(path: &Path, data: &[u8], overwrite: bool) -> Result<()> {
    if path.exists() && !overwrite {
        return Err(anyhow!(
            "{} already exists (use --force to overwrite)",
            path.display()
        ));
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).context("Failed to create output directory")?;
    }
    fs::write(path, data).with_context(|| format!("Failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::SecretString;
    use crate::scheme::{FileInput, SchemeKind, ShareEngine, ShareSet};
    use crate::shamir::SecretSharingConfig;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;
    use tempfile::tempdir;

    fn split(scheme: SchemeKind, password: Option<&SecretString>) -> SplitOutput {
        let data = b"abandon ability able about above absent absorb abstract".to_vec();
        let file = FileInput {
            name: "words.txt",
            data: &data,
        };
        ShareEngine::default()
            .split(
                scheme,
                &file,
                &SecretSharingConfig::new(2, 3),
                password,
                &mut ChaCha20Rng::from_seed([1u8; 32]),
            )
            .unwrap()
    }

    #[test]
    fn test_write_and_read_hybrid() {
        let dir = tempdir().unwrap();
        let storage = Storage::new(dir.path());
        let output = split(SchemeKind::Hybrid, None);

        let written = storage.write_split("words", &output).unwrap();
        assert_eq!(written.share_paths.len(), 3);
        assert_eq!(written.share_paths[1], dir.path().join("words.share-2.json"));
        let ciphertext_path = written.ciphertext_path.unwrap();
        assert_eq!(fs::read(&ciphertext_path).unwrap(), output.ciphertext().unwrap());

        let files = read_share_files(&written.share_paths[1..]).unwrap();
        let set = ShareSet::from_files(files).unwrap();
        let ciphertext = fs::read(ciphertext_path).unwrap();
        let result = ShareEngine::default()
            .recover(&set, Some(&ciphertext), None)
            .unwrap();
        assert!(result.data.starts_with(b"abandon"));
    }

    #[test]
    fn test_write_and_read_pure_with_password() {
        let dir = tempdir().unwrap();
        let storage = Storage::new(dir.path().join("out"));
        let password = SecretString::from("pw");
        let output = split(SchemeKind::PureShamir, Some(&password));

        let written = storage.write_split("words", &output).unwrap();
        assert!(written.ciphertext_path.is_none());

        let files = read_share_files(&[
            written.share_paths[2].clone(),
            written.share_paths[0].clone(),
        ])
        .unwrap();
        let set = ShareSet::from_files(files).unwrap();
        let result = ShareEngine::default()
            .recover(&set, None, Some(&password))
            .unwrap();
        assert_eq!(result.filename, "words.txt");
        assert!(result.data.ends_with(b"abstract"));
    }

    #[test]
    fn test_refuses_to_overwrite_shares() {
        let dir = tempdir().unwrap();
        let storage = Storage::new(dir.path());
        let output = split(SchemeKind::Hybrid, None);

        storage.write_split("words", &output).unwrap();
        assert!(storage.write_split("words", &output).is_err());
    }

    #[test]
    fn test_existing_share_file_blocks_whole_split() {
        let dir = tempdir().unwrap();
        let storage = Storage::new(dir.path());
        let output = split(SchemeKind::Hybrid, None);
        fs::write(dir.path().join("w.share-3.json"), "stray").unwrap();

        let err = storage.write_split("w", &output).unwrap_err();
        assert!(err.to_string().contains("w.share-3.json"));
        assert!(!dir.path().join("w.share-1.json").exists());
        assert!(!dir.path().join("w.share-2.json").exists());
        assert!(!dir.path().join("w.enc").exists());
        assert_eq!(fs::read(dir.path().join("w.share-3.json")).unwrap(), b"stray");
    }

    #[test]
    fn test_existing_ciphertext_is_not_overwritten() {
        let dir = tempdir().unwrap();
        let storage = Storage::new(dir.path());
        let output = split(SchemeKind::Hybrid, None);
        fs::write(dir.path().join("w.enc"), "OLD CIPHERTEXT").unwrap();

        let err = storage.write_split("w", &output).unwrap_err();
        assert!(err.to_string().contains("w.enc"));
        assert_eq!(fs::read(dir.path().join("w.enc")).unwrap(), b"OLD CIPHERTEXT");
        for id in 1..=3 {
            assert!(!dir.path().join(format!("w.share-{}.json", id)).exists());
        }
    }

    #[test]
    fn test_write_output_respects_force() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("recovered.bin");

        write_output(&path, b"one", false).unwrap();
        assert!(write_output(&path, b"two", false).is_err());
        write_output(&path, b"two", true).unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"two");
    }

    #[test]
    fn test_unparseable_share_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("junk.json");
        fs::write(&path, "not json").unwrap();

        let err = read_share_file(&path).unwrap_err();
        assert!(err.to_string().contains("junk.json"));
    }
}
