use crate::constants::{
    DEFAULT_DATA_DIR, DEFAULT_HOST, DEFAULT_HOSTS_FILE, DEFAULT_PORT, REGISTRY_TYPE_DATABASE,
    REGISTRY_TYPE_FILESYSTEM,
};
use anyhow::{anyhow, bail, Context, Result};
use clap::{Arg, Command};
use registry::RegistryBackend;
use std::ffi::OsString;
use std::path::PathBuf;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host registry backend type
    pub registry_type: RegistryType,
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Object store root
    pub data_dir: PathBuf,
    /// Hosts file for the filesystem registry
    pub hosts_file: PathBuf,
    /// Database URL for the database registry
    pub database_url: Option<String>,
    /// Base URL written into rewritten download actions
    pub public_url: Option<String>,
    /// Worker count, defaults to the number of CPUs
    pub workers: Option<usize>,
}

/// Host registry backend type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryType {
    Filesystem,
    Database,
}

fn command() -> Command {
    Command::new("server")
        .about("Caching proxy for Git LFS")
        .arg(
            Arg::new("data-dir")
                .long("data-dir")
                .value_name("DIR")
                .help("Object store root (default: proxy_data, or LFS_DATA_DIR env var)"),
        )
        .arg(
            Arg::new("registry")
                .long("registry")
                .value_name("TYPE")
                .help("Host registry type: 'fs' for a hosts file or 'db' for database (or LFS_REGISTRY env var)"),
        )
        .arg(
            Arg::new("hosts-file")
                .long("hosts-file")
                .value_name("FILE")
                .help("JSON hosts file for the 'fs' registry (default: hosts.json, or LFS_HOSTS_FILE env var)"),
        )
        .arg(
            Arg::new("database-url")
                .long("database-url")
                .value_name("URL")
                .help("Database URL for the 'db' registry (can also use DATABASE_URL env var)"),
        )
        .arg(
            Arg::new("port")
                .long("port")
                .value_name("PORT")
                .help("Server port (default: 8080, or SERVER_PORT env var)"),
        )
        .arg(
            Arg::new("host")
                .long("host")
                .value_name("HOST")
                .help("Server host (default: 0.0.0.0, or SERVER_HOST env var)"),
        )
        .arg(
            Arg::new("public-url")
                .long("public-url")
                .value_name("URL")
                .help("Public base URL used in download actions (or LFS_PUBLIC_URL env var)"),
        )
        .arg(
            Arg::new("workers")
                .long("workers")
                .value_name("N")
                .help("Number of worker threads (or SERVER_WORKERS env var)"),
        )
}

impl ServerConfig {
    pub fn load() -> Result<Self> {
        Self::load_from(std::env::args_os())
    }

    /// Priority: command-line args > environment variables > defaults
    pub fn load_from<I, T>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let matches = command().try_get_matches_from(args)?;
        let setting = |arg: &str, env: &str| -> Option<String> {
            matches
                .get_one::<String>(arg)
                .cloned()
                .or_else(|| std::env::var(env).ok())
                .filter(|value| !value.is_empty())
        };

        let registry_type_str =
            setting("registry", "LFS_REGISTRY").unwrap_or_else(|| REGISTRY_TYPE_FILESYSTEM.to_string());
        let registry_type = match registry_type_str.as_str() {
            REGISTRY_TYPE_DATABASE => RegistryType::Database,
            REGISTRY_TYPE_FILESYSTEM => RegistryType::Filesystem,
            other => bail!(
                "Invalid registry type: {}. Must be '{}' or '{}'",
                other,
                REGISTRY_TYPE_FILESYSTEM,
                REGISTRY_TYPE_DATABASE
            ),
        };

        let database_url = setting("database-url", "DATABASE_URL");
        if registry_type == RegistryType::Database && database_url.is_none() {
            bail!("Database URL required when using the database registry. Set --database-url or DATABASE_URL env var");
        }

        let port_str = setting("port", "SERVER_PORT").unwrap_or_else(|| DEFAULT_PORT.to_string());
        let port = port_str
            .parse()
            .with_context(|| format!("Invalid port number: {}", port_str))?;

        let workers = setting("workers", "SERVER_WORKERS")
            .map(|w| {
                w.parse::<usize>()
                    .ok()
                    .filter(|n| *n > 0)
                    .ok_or_else(|| anyhow!("Invalid worker count: {}", w))
            })
            .transpose()?;

        Ok(ServerConfig {
            registry_type,
            host: setting("host", "SERVER_HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port,
            data_dir: PathBuf::from(
                setting("data-dir", "LFS_DATA_DIR").unwrap_or_else(|| DEFAULT_DATA_DIR.to_string()),
            ),
            hosts_file: PathBuf::from(
                setting("hosts-file", "LFS_HOSTS_FILE")
                    .unwrap_or_else(|| DEFAULT_HOSTS_FILE.to_string()),
            ),
            database_url,
            public_url: setting("public-url", "LFS_PUBLIC_URL")
                .map(|url| url.trim_end_matches('/').to_string()),
            workers,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Registry backend selected by this configuration
    pub fn registry_backend(&self) -> RegistryBackend {
        match (&self.registry_type, &self.database_url) {
            (RegistryType::Database, Some(url)) => RegistryBackend::Database(url.clone()),
            _ => RegistryBackend::Filesystem(self.hosts_file.to_string_lossy().into_owned()),
        }
    }
}
