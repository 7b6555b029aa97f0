use std::path::Path;

use facet::Facet;

use crate::cli::Cli;
use crate::error::CapiError;

pub const DEFAULT_LISTEN: &str = ":8080";
pub const DEFAULT_CBSD: &str = "/usr/local/bin/cbsd";

/// Optional on-disk configuration. Every key may be omitted.
#[derive(Debug, Clone, Default, Facet)]
#[facet(default)]
pub struct FileConfig {
    pub listen: Option<String>,
    pub cbsd: Option<String>,
    pub initial_sync: Option<bool>,
}

/// Effective settings after merging flags, file and defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Normalized `host:port`, ready for `TcpListener::bind`.
    pub listen: String,
    pub cbsd: String,
    pub initial_sync: bool,
}

pub fn load_file(path: &Path) -> Result<FileConfig, CapiError> {
    let contents = std::fs::read_to_string(path).map_err(|source| CapiError::ConfigLoad {
        path: path.display().to_string(),
        source,
    })?;

    facet_toml::from_str(&contents).map_err(|e| CapiError::ConfigParse {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

/// Flags win over the file, the file wins over defaults.
pub fn resolve(cli: &Cli) -> Result<Settings, CapiError> {
    let file = match &cli.config {
        Some(path) => load_file(path)?,
        None => FileConfig::default(),
    };
    merge(cli, file)
}

fn merge(cli: &Cli, file: FileConfig) -> Result<Settings, CapiError> {
    let listen = cli
        .listen
        .clone()
        .or(file.listen)
        .unwrap_or_else(|| DEFAULT_LISTEN.to_string());

    let cbsd = cli
        .cbsd
        .clone()
        .or(file.cbsd)
        .unwrap_or_else(|| DEFAULT_CBSD.to_string());
    if cbsd.trim().is_empty() {
        return Err(CapiError::Validation {
            message: "cbsd path must not be empty".into(),
        });
    }

    let initial_sync = !cli.no_initial_sync && file.initial_sync.unwrap_or(true);

    Ok(Settings {
        listen: normalize_listen(&listen)?,
        cbsd,
        initial_sync,
    })
}

/// Accepts `host:port`, `[v6]:port` and the bare `:port` shorthand, which
/// binds every IPv4 interface.
pub fn normalize_listen(addr: &str) -> Result<String, CapiError> {
    let addr = addr.trim();
    let addr = if addr.starts_with(':') {
        format!("0.0.0.0{addr}")
    } else {
        addr.to_string()
    };

    let Some((host, port)) = addr.rsplit_once(':') else {
        return Err(CapiError::Validation {
            message: format!("listen address '{addr}' has no port"),
        });
    };
    if host.is_empty() {
        return Err(CapiError::Validation {
            message: format!("listen address '{addr}' has no host"),
        });
    }
    port.parse::<u16>().map_err(|_| CapiError::Validation {
        message: format!("invalid port in listen address '{addr}'"),
    })?;

    Ok(addr)
}
