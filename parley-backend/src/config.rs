use std::env;
use std::path::{Path, PathBuf};

/// Environment variable names - single source of truth
pub mod env_vars {
    pub const PORT: &str = "PORT";
    pub const DATA_DIR: &str = "PARLEY_DATA_DIR";
}

/// Default values
pub mod defaults {
    pub const PORT: u16 = 4242;
    pub const DATA_DIR: &str = "data";
    pub const PUBLIC_DIR: &str = "public";
    pub const CONFIG_DIR: &str = "config";
}

/// Returns the absolute path to the parley-backend directory.
/// Uses CARGO_MANIFEST_DIR at compile time, so it always resolves
/// to parley-backend/ regardless of the working directory at runtime.
pub fn backend_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
}

/// Get the conversation data directory
pub fn data_dir() -> PathBuf {
    match env::var(env_vars::DATA_DIR) {
        Ok(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => backend_dir().join(defaults::DATA_DIR),
    }
}

/// Get the static UI directory (served at `/` when it exists)
pub fn public_dir() -> PathBuf {
    backend_dir().join(defaults::PUBLIC_DIR)
}

/// Get the config directory (marker table overrides, etc.)
/// Check ./config first, then the backend dir (for running from the repo root).
pub fn config_dir() -> PathBuf {
    let local = Path::new(defaults::CONFIG_DIR);
    if local.exists() {
        local.to_path_buf()
    } else {
        backend_dir().join(defaults::CONFIG_DIR)
    }
}

#[derive(Clone)]
pub struct Config {
    pub port: u16,
    pub data_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            port: env::var(env_vars::PORT)
                .unwrap_or_else(|_| defaults::PORT.to_string())
                .parse()
                .expect("PORT must be a valid number"),
            data_dir: data_dir(),
        }
    }
}

/// Initialize the data and public directories.
/// This should be called at startup before the store is constructed.
pub fn initialize_workspace() -> std::io::Result<()> {
    let data = data_dir();
    std::fs::create_dir_all(&data)?;
    std::fs::create_dir_all(data.join("notes"))?;

    let public = public_dir();
    if !public.exists() {
        log::debug!("Public dir {:?} not present - static serving disabled", public);
    }

    Ok(())
}
