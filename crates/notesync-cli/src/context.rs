//! Shared state for every command: the loaded configuration, the output
//! format, and constructors for the adapters the commands need.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::{debug, info};

use notesync_core::config::Config;
use notesync_core::domain::SyncPath;
use notesync_remote::NotionClient;
use notesync_store::{DatabasePool, SqliteMetadataStore};

use crate::output::{get_formatter, OutputFormat, OutputFormatter};

pub struct AppContext {
    pub config: Config,
    pub config_path: PathBuf,
    pub format: OutputFormat,
    pub quiet: bool,
}

impl AppContext {
    /// Load the configuration from `explicit` or the default location
    ///
    /// An explicitly named file must exist and parse; the default file falls
    /// back to built-in defaults.
    pub fn load(explicit: Option<&Path>, format: OutputFormat, quiet: bool) -> Result<Self> {
        let (config, config_path) = match explicit {
            Some(path) => {
                let config = Config::load(path).with_context(|| {
                    format!("Failed to load configuration from {}", path.display())
                })?;
                (config, path.to_path_buf())
            }
            None => {
                let path = Config::default_path();
                (Config::load_or_default(&path), path)
            }
        };

        Ok(Self {
            config,
            config_path,
            format,
            quiet,
        })
    }

    pub fn formatter(&self) -> Box<dyn OutputFormatter> {
        get_formatter(self.format, self.quiet)
    }

    pub fn is_json(&self) -> bool {
        matches!(self.format, OutputFormat::Json)
    }

    /// Open (creating if needed) the metadata database
    pub async fn open_store(&self) -> Result<Arc<SqliteMetadataStore>> {
        let db_path = &self.config.database.path;
        let pool = DatabasePool::new(db_path)
            .await
            .context("Failed to open database")?;
        debug!(db_path = %db_path.display(), "Database opened");
        Ok(Arc::new(SqliteMetadataStore::new(pool.pool().clone())))
    }

    /// Build the HTTP client from the token in the configured environment
    /// variable
    pub fn remote_client(&self) -> Result<NotionClient> {
        let var = &self.config.remote.token_env;
        let token = match std::env::var(var) {
            Ok(token) if !token.trim().is_empty() => token,
            _ => bail!("No integration token found. Set the {var} environment variable."),
        };

        let client = NotionClient::new(&self.config.remote, token)
            .context("Failed to create remote client")?;
        info!(base_url = %client.base_url(), "Remote client ready");
        Ok(client)
    }
}

/// Resolve a user-supplied path against the working directory
pub fn resolve_path(path: &Path) -> Result<SyncPath> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .context("Failed to read the current directory")?
            .join(path)
    };
    SyncPath::new(absolute).context("Invalid local path")
}
