//! Open options and the `logdb.toml` configuration file
//!
//! `OpenOptions` is the programmatic form. `LogDbConfig` is the same choice
//! expressed in TOML, for applications that keep settings next to the log:
//!
//! ```toml
//! # Create the log if it does not exist (default: true)
//! create_if_missing = true
//!
//! # Durability mode: "always" (default) or "nosync"
//! durability = "always"
//! ```

use crate::connection::Connection;
use logdb_core::{Error, Result};
use logdb_durability::DurabilityMode;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Conventional config file name.
pub const CONFIG_FILE_NAME: &str = "logdb.toml";

/// How `open` treats a missing file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OpenMode {
    /// The log must already exist
    Existing,
    /// Create the log if it does not exist
    #[default]
    Create,
}

/// Builder for opening a `Connection`.
///
/// ```ignore
/// let conn = OpenOptions::new()
///     .mode(OpenMode::Create)
///     .no_sync(true)
///     .open("/data/app.log")?;
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OpenOptions {
    pub(crate) mode: OpenMode,
    pub(crate) no_sync: bool,
    pub(crate) truncate: bool,
}

impl OpenOptions {
    /// Defaults: create if missing, fsync every commit, keep contents
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the open mode
    pub fn mode(mut self, mode: OpenMode) -> Self {
        self.mode = mode;
        self
    }

    /// Skip the fsync on commit
    pub fn no_sync(mut self, no_sync: bool) -> Self {
        self.no_sync = no_sync;
        self
    }

    /// Start from an empty log once the file is locked. The old file is
    /// replaced, not rewritten, so iterators still reading it are unaffected.
    pub fn truncate(mut self, truncate: bool) -> Self {
        self.truncate = truncate;
        self
    }

    /// Durability mode these options select
    pub fn durability_mode(&self) -> DurabilityMode {
        if self.no_sync {
            DurabilityMode::NoSync
        } else {
            DurabilityMode::Always
        }
    }

    /// Open the log at `path`
    pub fn open(&self, path: impl AsRef<Path>) -> Result<Connection> {
        Connection::open_with(path.as_ref(), self)
    }
}

/// Configuration loaded from TOML.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogDbConfig {
    /// Create the log if it does not exist
    #[serde(default = "default_create_if_missing")]
    pub create_if_missing: bool,
    /// Durability mode: `"always"` or `"nosync"`
    #[serde(default = "default_durability_str")]
    pub durability: String,
}

fn default_create_if_missing() -> bool {
    true
}

fn default_durability_str() -> String {
    "always".to_string()
}

impl Default for LogDbConfig {
    fn default() -> Self {
        LogDbConfig {
            create_if_missing: default_create_if_missing(),
            durability: default_durability_str(),
        }
    }
}

impl LogDbConfig {
    /// Parse the durability string into a `DurabilityMode`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the string is not `"always"` or `"nosync"`.
    pub fn durability_mode(&self) -> Result<DurabilityMode> {
        match self.durability.as_str() {
            "always" => Ok(DurabilityMode::Always),
            "nosync" => Ok(DurabilityMode::NoSync),
            other => Err(Error::Config(format!(
                "invalid durability mode '{}', expected \"always\" or \"nosync\"",
                other
            ))),
        }
    }

    /// Parse and validate TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: LogDbConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;
        config.durability_mode()?;
        Ok(config)
    }

    /// Read and validate a config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }

    /// Serialize to TOML
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("failed to serialize config: {}", e)))
    }

    /// Default config file content with comments
    pub fn default_toml() -> &'static str {
        r#"# LogDB configuration
#
# Create the log file if it does not exist (default: true)
create_if_missing = true

# Durability mode: "always" (default) or "nosync"
#   "always" = fsync every commit, zero data loss
#   "nosync" = no fsync on commit, recent commits may be lost on crash
durability = "always"
"#
    }

    /// Equivalent `OpenOptions`
    pub fn open_options(&self) -> Result<OpenOptions> {
        let mode = if self.create_if_missing {
            OpenMode::Create
        } else {
            OpenMode::Existing
        };
        let durability = self.durability_mode()?;
        Ok(OpenOptions::new()
            .mode(mode)
            .no_sync(durability == DurabilityMode::NoSync))
    }
}
