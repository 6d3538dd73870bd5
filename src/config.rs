//! Configuration management for vaultkit
//!
//! Stores settings in ~/.config/vaultkit/config.json; the OpenRouter API key
//! lives in the system keychain.

use keyring::Entry;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::PathBuf;

pub const DEFAULT_MODEL: &str = "openai/gpt-4o-mini";
pub const DEFAULT_WORKERS: usize = 4;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Legacy plaintext key; migrated to the keychain on first use.
    pub openrouter_api_key: Option<String>,
    /// Stable anonymous id sent as OpenRouter's `user` field for routing
    /// stickiness; generated on first use.
    #[serde(default)]
    pub openrouter_user_id: Option<String>,
    /// OpenRouter model slug used for review calls.
    #[serde(default = "default_model")]
    pub model: String,
    /// Concurrent review calls per batch.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Write .md.bak backups before rewriting notes.
    #[serde(default = "default_backup")]
    pub backup: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            openrouter_api_key: None,
            openrouter_user_id: None,
            model: default_model(),
            workers: default_workers(),
            backup: default_backup(),
        }
    }
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_workers() -> usize {
    DEFAULT_WORKERS
}

fn default_backup() -> bool {
    true
}

const KEYRING_SERVICE: &str = "vaultkit";
const KEYRING_USERNAME: &str = "openrouter_api_key";

fn keyring_entry() -> Result<Entry, keyring::Error> {
    Entry::new(KEYRING_SERVICE, KEYRING_USERNAME)
}

fn read_keyring_key() -> Result<Option<String>, keyring::Error> {
    let entry = keyring_entry()?;
    match entry.get_password() {
        Ok(key) => Ok(Some(key)),
        Err(keyring::Error::NoEntry) => Ok(None),
        Err(err) => Err(err),
    }
}

fn write_keyring_key(key: &str) -> Result<(), keyring::Error> {
    let entry = keyring_entry()?;
    entry.set_password(key)
}

impl Config {
    fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("vaultkit"))
    }

    fn config_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join("config.json"))
    }

    /// Load config from disk, or return default
    pub fn load() -> Self {
        if let Some(path) = Self::config_path() {
            if let Ok(content) = fs::read_to_string(&path) {
                match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(err) => {
                        preserve_corrupt_config(&path, &content);
                        eprintln!(
                            "  Warning: Config file was corrupted ({}). A backup was saved and defaults were loaded.",
                            err
                        );
                    }
                }
            }
        }
        Self::default()
    }

    /// Save config to disk
    pub fn save(&self) -> Result<(), String> {
        let dir = Self::config_dir()
            .ok_or_else(|| "Could not determine config directory".to_string())?;

        fs::create_dir_all(&dir)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Err(e) = fs::set_permissions(&dir, fs::Permissions::from_mode(0o700)) {
                eprintln!("  Warning: Failed to set config directory permissions: {}", e);
            }
        }

        let path = dir.join("config.json");
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize config: {}", e))?;

        #[cfg(unix)]
        {
            write_config_atomic(&path, &content)
                .map_err(|e| format!("Failed to write config: {}", e))?;
        }

        #[cfg(not(unix))]
        {
            fs::write(&path, content)
                .map_err(|e| format!("Failed to write config: {}", e))?;
        }

        Ok(())
    }

    /// Get the OpenRouter API key (from environment or keychain)
    pub fn get_api_key(&mut self) -> Option<String> {
        // Environment variable takes precedence
        if let Ok(key) = std::env::var("OPENROUTER_API_KEY") {
            return Some(key);
        }

        match read_keyring_key() {
            Ok(Some(key)) => return Some(key),
            Ok(None) => {}
            Err(err) => {
                eprintln!(
                    "  Warning: Failed to read API key from system keychain: {}",
                    err
                );
                eprintln!("  Tip: Set the OPENROUTER_API_KEY environment variable as a workaround.");
            }
        }

        // Legacy migration of plaintext API keys to the system keychain. Once
        // migrated, the plaintext key is removed from config.json.
        if let Some(key) = self.openrouter_api_key.clone() {
            eprintln!("  Migrating API key from config file to system keychain...");
            match write_keyring_key(&key) {
                Ok(()) => {
                    if let Ok(Some(stored)) = read_keyring_key() {
                        if stored == key {
                            self.openrouter_api_key = None;
                            let _ = self.save();
                            eprintln!("  + API key migrated successfully.");
                        }
                    }
                }
                Err(err) => {
                    eprintln!("  Warning: Failed to migrate API key to keychain: {}", err);
                }
            }
            return Some(key);
        }

        None
    }

    /// Set and save the API key
    pub fn set_api_key(&mut self, key: &str) -> Result<(), String> {
        if let Err(write_err) = write_keyring_key(key) {
            return Err(format!(
                "Failed to store API key in system keychain: {}. \
                 You can set the OPENROUTER_API_KEY environment variable instead.",
                write_err
            ));
        }

        // Verify the write succeeded by reading it back
        match read_keyring_key() {
            Ok(Some(stored_key)) if stored_key == key => {
                self.openrouter_api_key = None;
                self.save()
            }
            Ok(Some(_)) => Err(
                "API key verification failed: stored key doesn't match. \
                 You can set the OPENROUTER_API_KEY environment variable instead."
                    .to_string(),
            ),
            Ok(None) => Err(
                "API key verification failed: key was not persisted to keychain. \
                 You can set the OPENROUTER_API_KEY environment variable instead."
                    .to_string(),
            ),
            Err(read_err) => Err(format!(
                "API key verification failed: couldn't read back from keychain ({}). \
                 You can set the OPENROUTER_API_KEY environment variable instead.",
                read_err
            )),
        }
    }

    /// Check if API key is configured
    pub fn has_api_key(&self) -> bool {
        if std::env::var("OPENROUTER_API_KEY").is_ok() {
            return true;
        }
        match read_keyring_key() {
            Ok(Some(_)) => return true,
            Ok(None) => {}
            Err(err) => {
                eprintln!(
                    "  Warning: Failed to check system keychain for API key: {}",
                    err
                );
            }
        }
        self.openrouter_api_key.is_some()
    }

    /// Validate API key format (should start with sk-)
    pub fn validate_api_key_format(key: &str) -> bool {
        key.starts_with("sk-")
    }

    /// Get the config file location for display
    pub fn config_location() -> String {
        Self::config_path()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "~/.config/vaultkit/config.json".to_string())
    }
}

/// Interactive prompt to set up API key
pub fn setup_api_key_interactive() -> Result<String, String> {
    use std::io::{self, Write};

    println!();
    println!("  vaultkit uses OpenRouter for LLM-assisted note review.");
    println!();
    println!("  1. Get an API key at: https://openrouter.ai/keys");
    println!("  2. Paste it below (saved in your system keychain when available)");
    println!();
    print!("  API Key: ");
    io::stdout().flush().map_err(|e| e.to_string())?;

    let mut key = String::new();
    io::stdin().read_line(&mut key).map_err(|e| e.to_string())?;
    let key = key.trim().to_string();

    if key.is_empty() {
        return Err("No API key provided".to_string());
    }

    if !Config::validate_api_key_format(&key) {
        println!();
        println!("  Warning: Key doesn't look like an OpenRouter key (should start with sk-)");
        println!("     Saving anyway...");
    }

    let mut config = Config::load();
    config.set_api_key(&key)?;

    println!();
    println!("  + API key saved to {}", Config::config_location());
    println!();

    Ok(key)
}

fn preserve_corrupt_config(path: &std::path::Path, content: &str) {
    let corrupt_path = path.with_extension("json.corrupt");
    if fs::rename(path, &corrupt_path).is_err() {
        let _ = fs::write(&corrupt_path, content);
    }
}

#[cfg(unix)]
fn write_config_atomic(path: &std::path::Path, content: &str) -> Result<(), String> {
    use std::fs::OpenOptions;
    use std::os::unix::fs::PermissionsExt;

    let tmp_path = path.with_extension("tmp");
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&tmp_path)
        .map_err(|e| e.to_string())?;

    if let Err(e) = file.set_permissions(fs::Permissions::from_mode(0o600)) {
        eprintln!("  Warning: Failed to set temp config file permissions: {}", e);
    }

    file.write_all(content.as_bytes())
        .map_err(|e| e.to_string())?;

    if let Err(err) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(err.to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert!(config.openrouter_api_key.is_none());
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.workers, DEFAULT_WORKERS);
        assert!(config.backup);
    }

    #[test]
    fn test_api_key_format() {
        assert!(Config::validate_api_key_format("sk-or-v1-abc"));
        assert!(!Config::validate_api_key_format("hunter2"));
    }
}
