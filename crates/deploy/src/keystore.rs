//! Encrypted credential provisioning.
//!
//! A raw secret key is encrypted with a user-chosen password into the standard
//! Web3 Secret Storage JSON format, so that scripts can sign without keeping the
//! plaintext key on disk.

use std::io::{BufRead, IsTerminal, Write};
use std::path::{Path, PathBuf};

use alloy_core::primitives::Address;
use anyhow::{Context, Result};
use k256::elliptic_curve::rand_core::OsRng;

use crate::Wallet;

/// Where the credential is written when no other path is given.
pub const DEFAULT_CREDENTIAL_PATH: &str = "./.encryptedKey.json";

/// Default number of password/confirmation rounds before giving up.
pub const DEFAULT_MAX_ATTEMPTS: usize = 3;

/// Source of secret user input.
pub trait SecretPrompt {
    /// Show `label` and return the entered value, without the trailing newline.
    fn ask(&mut self, label: &str) -> Result<String>;
}

/// Reads secrets from the terminal without echoing them.
#[derive(Debug, Default)]
pub struct TerminalPrompt;

impl SecretPrompt for TerminalPrompt {
    fn ask(&mut self, label: &str) -> Result<String> {
        if std::io::stdin().is_terminal() {
            return rpassword::prompt_password(label).context("Failed to read from terminal");
        }
        read_piped(label, &mut std::io::stdin().lock(), &mut std::io::stdout())
    }
}

/// Piped input: show the label, read one line, never write the value back.
fn read_piped(label: &str, input: &mut impl BufRead, out: &mut impl Write) -> Result<String> {
    write!(out, "{}", label).context("Failed to write prompt")?;
    out.flush().context("Failed to flush prompt")?;
    rpassword::read_password_from_bufread(input).context("Failed to read secret")
}

/// Result of a provisioning run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisionOutcome {
    /// The credential file was written.
    Written { path: PathBuf, address: Address },
    /// The password was never confirmed; nothing was written.
    GaveUp { attempts: usize },
}

/// Turns a raw secret key into an encrypted credential file.
#[derive(Debug, Clone)]
pub struct KeyProvisioner {
    pub output: PathBuf,
    pub max_attempts: usize,
}

impl Default for KeyProvisioner {
    fn default() -> Self {
        Self {
            output: PathBuf::from(DEFAULT_CREDENTIAL_PATH),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl KeyProvisioner {
    pub fn new(output: impl Into<PathBuf>) -> Self {
        Self {
            output: output.into(),
            ..Default::default()
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Ask for a confirmed password and a secret key, then write the credential.
    pub fn provision(&self, prompt: &mut impl SecretPrompt) -> Result<ProvisionOutcome> {
        let Some(password) = self.confirmed_password(prompt)? else {
            tracing::warn!(
                attempts = self.max_attempts,
                "Passwords never matched, no credential written"
            );
            return Ok(ProvisionOutcome::GaveUp {
                attempts: self.max_attempts,
            });
        };

        let secret = prompt.ask("Enter private key: ")?;
        let wallet = Wallet::from_hex(&secret).context("Invalid private key")?;

        let path = write_credential(&self.output, &wallet, &password)?;
        tracing::info!(
            path = %path.display(),
            address = %wallet.address(),
            "Encrypted credential written"
        );

        Ok(ProvisionOutcome::Written {
            path,
            address: wallet.address(),
        })
    }

    fn confirmed_password(&self, prompt: &mut impl SecretPrompt) -> Result<Option<String>> {
        for attempt in 1..=self.max_attempts {
            let first = prompt.ask("Enter password: ")?;
            let second = prompt.ask("Re-enter password: ")?;
            if first == second {
                return Ok(Some(first));
            }
            tracing::warn!(attempt, max = self.max_attempts, "Passwords do not match");
        }
        Ok(None)
    }
}

/// Encrypt `wallet` with `password` and write it to `path`.
pub fn write_credential(path: &Path, wallet: &Wallet, password: &str) -> Result<PathBuf> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("Invalid credential path: {}", path.display()))?;

    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create directory {}", dir.display()))?;

    eth_keystore::encrypt_key(&dir, &mut OsRng, wallet.secret_bytes(), password, Some(name))
        .with_context(|| format!("Failed to encrypt credential to {}", path.display()))?;

    Ok(dir.join(name))
}

/// Decrypt a credential file previously written by [`KeyProvisioner`].
pub fn load_credential(path: &Path, password: &str) -> Result<Wallet> {
    let secret = eth_keystore::decrypt_key(path, password)
        .with_context(|| format!("Failed to decrypt credential {}", path.display()))?;
    Wallet::from_bytes(&secret)
}
