//! Settings file and saved connection profiles.
//!
//! Both live under `<config_dir>/sqlbridge/`. Settings are read once at
//! startup; nothing here is watched or reloaded.

use crate::db::{ConnectionParams, Timeouts};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub query_timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            query_timeout_secs: 30,
            connect_timeout_secs: 10,
        }
    }
}

impl Settings {
    pub fn path() -> PathBuf {
        config_dir().join("config.toml")
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::path())
    }

    /// A missing file yields the defaults; a malformed one is an error.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let settings: Settings = toml::from_str(&content)
            .with_context(|| format!("parsing {}", path.display()))?;
        if settings.query_timeout_secs == 0 || settings.connect_timeout_secs == 0 {
            bail!("{}: timeouts must be at least one second", path.display());
        }
        Ok(settings)
    }

    pub fn timeouts(&self) -> Timeouts {
        Timeouts {
            connect: Duration::from_secs(self.connect_timeout_secs),
            query: Duration::from_secs(self.query_timeout_secs),
        }
    }
}

/// A named connection profile. The password is never written to disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedConnection {
    pub name: String,
    #[serde(flatten)]
    pub params: ConnectionParams,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SavedConnections {
    #[serde(default)]
    connections: Vec<SavedConnection>,
}

pub fn profiles_path() -> PathBuf {
    config_dir().join("connections.toml")
}

pub fn load_profiles() -> Result<Vec<SavedConnection>> {
    load_profiles_from(&profiles_path())
}

pub fn load_profiles_from(path: &Path) -> Result<Vec<SavedConnection>> {
    if !path.exists() {
        return Ok(vec![]);
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let saved: SavedConnections = toml::from_str(&content)
        .with_context(|| format!("parsing {}", path.display()))?;
    Ok(saved.connections)
}

pub fn save_profiles(profiles: &[SavedConnection]) -> Result<()> {
    save_profiles_to(&profiles_path(), profiles)
}

pub fn save_profiles_to(path: &Path, profiles: &[SavedConnection]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let saved = SavedConnections {
        connections: profiles.to_vec(),
    };
    let content = toml::to_string_pretty(&saved)?;
    std::fs::write(path, content).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

/// Add `profile`, replacing any saved one with the same name.
pub fn upsert_profile(profiles: &mut Vec<SavedConnection>, profile: SavedConnection) {
    match profiles
        .iter_mut()
        .find(|p| p.name.eq_ignore_ascii_case(&profile.name))
    {
        Some(existing) => *existing = profile,
        None => profiles.push(profile),
    }
}

/// Case-insensitive lookup by profile name.
pub fn find_profile<'a>(profiles: &'a [SavedConnection], name: &str) -> Option<&'a SavedConnection> {
    profiles.iter().find(|p| p.name.eq_ignore_ascii_case(name))
}

fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("sqlbridge")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{EngineOptions, PgSslMode};

    #[test]
    fn test_missing_settings_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load_from(&dir.path().join("config.toml")).unwrap();
        assert_eq!(settings, Settings::default());
        let timeouts = settings.timeouts();
        assert_eq!(timeouts.query, Duration::from_secs(30));
        assert_eq!(timeouts.connect, Duration::from_secs(10));
    }

    #[test]
    fn test_partial_settings_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "query_timeout_secs = 120\n").unwrap();
        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings.query_timeout_secs, 120);
        assert_eq!(settings.connect_timeout_secs, 10);
    }

    #[test]
    fn test_malformed_settings_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "query_timeout_secs = \"soon\"\n").unwrap();
        assert!(Settings::load_from(&path).is_err());

        std::fs::write(&path, "connect_timeout_secs = 0\n").unwrap();
        assert!(Settings::load_from(&path).is_err());
    }

    #[test]
    fn test_profiles_round_trip_without_password() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("connections.toml");

        let mut pg = ConnectionParams::postgres("db.internal", "app", Some("orders"));
        pg.password = "hunter2".to_string();
        if let EngineOptions::Postgres(opts) = &mut pg.options {
            opts.ssl_mode = PgSslMode::Require;
        }
        let profiles = vec![
            SavedConnection {
                name: "Orders".to_string(),
                params: pg,
            },
            SavedConnection {
                name: "legacy".to_string(),
                params: ConnectionParams::mysql("10.0.0.7", "root", None),
            },
        ];
        save_profiles_to(&path, &profiles).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(!written.contains("hunter2"));

        let loaded = load_profiles_from(&path).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].params.password, "");
        assert_eq!(loaded[0].params.database.as_deref(), Some("orders"));
        assert_eq!(loaded[0].params.options, profiles[0].params.options);
        assert_eq!(loaded[1].params, profiles[1].params);

        assert_eq!(find_profile(&loaded, "orders").unwrap().name, "Orders");
        assert!(find_profile(&loaded, "missing").is_none());
    }

    #[test]
    fn test_missing_profiles_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_profiles_from(&dir.path().join("connections.toml"))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_upsert_profile_replaces_by_name() {
        let mut profiles = vec![SavedConnection {
            name: "Shop".to_string(),
            params: ConnectionParams::mysql("old.host", "root", None),
        }];
        upsert_profile(
            &mut profiles,
            SavedConnection {
                name: "shop".to_string(),
                params: ConnectionParams::mysql("new.host", "root", Some("shop")),
            },
        );
        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles[0].params.host, "new.host");

        upsert_profile(
            &mut profiles,
            SavedConnection {
                name: "reports".to_string(),
                params: ConnectionParams::postgres("pg.host", "analyst", None),
            },
        );
        assert_eq!(profiles.len(), 2);
    }
}
