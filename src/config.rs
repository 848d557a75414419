//! User configuration: default output format and persistence.
//!
//! Settings are stored as a simple key-value text file at
//! `$XDG_CONFIG_HOME/item-time/config.toml` (default `~/.config/item-time/config.toml`).
//! Command-line flags always override what is stored here.

use std::path::{Path, PathBuf};

use crate::core::format::{DateFormat, Mode};

/// Persisted defaults.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AppConfig {
    pub format: DateFormat,
    /// Use the filesystem modification time when a file has no item date.
    pub fallback_to_modified: bool,
}

impl AppConfig {
    /// Load config from the default location, falling back to defaults.
    pub fn load() -> Self {
        Self::load_from(&config_path())
    }

    /// Load config from `path`, falling back to defaults when the file is
    /// missing or unreadable.
    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => Self::parse_config(&contents),
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!("ignoring config {}: {e}", path.display());
                }
                Self::default()
            }
        }
    }

    /// Persist current config to the default location.
    pub fn save(&self) -> anyhow::Result<PathBuf> {
        let path = config_path();
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.serialise())?;
        Ok(())
    }

    fn parse_config(s: &str) -> Self {
        let mut config = Self::default();

        for line in s.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with('[') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim();
            let value = unquote(value.trim());

            match key {
                "date_separator" => config.format.date_separator = value,
                "time_separator" => config.format.time_separator = value,
                "datetime_separator" => config.format.datetime_separator = value,
                "mode" => match Mode::from_config_key(&value) {
                    Some(mode) => config.format.mode = mode,
                    None => tracing::warn!("unknown mode {value:?} in config"),
                },
                "fallback_to_modified" => config.fallback_to_modified = value == "true",
                _ => tracing::debug!("unknown config key {key:?}"),
            }
        }

        config
    }

    fn serialise(&self) -> String {
        let lines = [
            "# item-time configuration".to_string(),
            String::new(),
            "# Separators may be empty; quote them to keep spaces.".to_string(),
            format!("date_separator = {}", quote(&self.format.date_separator)),
            format!("time_separator = {}", quote(&self.format.time_separator)),
            format!("datetime_separator = {}", quote(&self.format.datetime_separator)),
            String::new(),
            "# both | date | time | none".to_string(),
            format!("mode = {}", self.format.mode.config_key()),
            format!("fallback_to_modified = {}", self.fallback_to_modified),
            String::new(),
        ];
        lines.join("\n")
    }
}

fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Strip one pair of surrounding double quotes and undo `quote`'s escapes.
fn unquote(s: &str) -> String {
    let Some(inner) = s.strip_prefix('"').and_then(|r| r.strip_suffix('"')) else {
        return s.to_string();
    };
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            out.extend(chars.next());
        } else {
            out.push(c);
        }
    }
    out
}

/// Return the config file path (`$XDG_CONFIG_HOME/item-time/config.toml`).
pub fn config_path() -> PathBuf {
    let config_dir = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".into());
            PathBuf::from(home).join(".config")
        });
    config_dir.join("item-time").join("config.toml")
}
