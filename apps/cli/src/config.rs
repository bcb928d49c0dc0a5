//! # Configuration
//!
//! Where the store lives, resolved once at startup.
//!
//! ## Sources (Priority Order)
//! 1. `--db <PATH>` flag
//! 2. `CELLAR_DB_PATH` environment variable
//! 3. Platform data directory (`cellar.db`)
//!
//! Everything else the store needs (currency, default scan quantity,
//! low-stock threshold, backup path) is kept in the store's own settings
//! row, not here.

use directories::ProjectDirs;
use std::path::{Path, PathBuf};

use crate::error::CliError;

pub const DB_PATH_ENV: &str = "CELLAR_DB_PATH";

const DB_FILE_NAME: &str = "cellar.db";

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// SQLite database file.
    pub database_path: PathBuf,

    /// Fallback directory for `cellar backup` without `--to`.
    pub backup_dir: PathBuf,
}

impl AppConfig {
    /// Resolves the configuration from the flag, the environment, or the
    /// platform data directory.
    ///
    /// ## Platform-Specific Paths
    /// - **macOS**: `~/Library/Application Support/com.cellar.pos/cellar.db`
    /// - **Windows**: `%APPDATA%\cellar\pos\data\cellar.db`
    /// - **Linux**: `~/.local/share/cellar-pos/cellar.db`
    pub fn resolve(flag: Option<PathBuf>) -> Result<Self, CliError> {
        let env = std::env::var_os(DB_PATH_ENV).map(PathBuf::from);
        Self::resolve_with(flag, env)
    }

    fn resolve_with(flag: Option<PathBuf>, env: Option<PathBuf>) -> Result<Self, CliError> {
        let database_path = match flag.or(env) {
            Some(path) => path,
            None => {
                let dirs = ProjectDirs::from("com", "cellar", "pos").ok_or_else(|| {
                    CliError::config("Could not determine app data directory; pass --db")
                })?;
                dirs.data_dir().join(DB_FILE_NAME)
            }
        };
        Ok(Self::for_database(database_path))
    }

    /// Configuration for an explicit database file.
    pub fn for_database(database_path: PathBuf) -> Self {
        let backup_dir = database_path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
            .join("backups");
        AppConfig {
            database_path,
            backup_dir,
        }
    }

    /// Creates the database's parent directory if it is missing.
    pub fn ensure_dirs(&self) -> Result<(), CliError> {
        if let Some(parent) = self.database_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    CliError::config(format!("Cannot create {}: {e}", parent.display()))
                })?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_wins_over_env() {
        let config = AppConfig::resolve_with(
            Some(PathBuf::from("/data/flag.db")),
            Some(PathBuf::from("/data/env.db")),
        )
        .unwrap();
        assert_eq!(config.database_path, PathBuf::from("/data/flag.db"));
        assert_eq!(config.backup_dir, PathBuf::from("/data/backups"));
    }

    #[test]
    fn test_env_used_without_flag() {
        let config = AppConfig::resolve_with(None, Some(PathBuf::from("/srv/env.db"))).unwrap();
        assert_eq!(config.database_path, PathBuf::from("/srv/env.db"));
    }

    #[test]
    fn test_bare_file_name_backs_up_beside_it() {
        let config = AppConfig::for_database(PathBuf::from("cellar.db"));
        assert_eq!(config.backup_dir, PathBuf::from("./backups"));
    }

    #[test]
    fn test_ensure_dirs_creates_parent() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::for_database(dir.path().join("nested/deeper/cellar.db"));
        config.ensure_dirs().unwrap();
        assert!(dir.path().join("nested/deeper").is_dir());
    }
}
