//! CLI configuration utilities

use anyhow::Result;
use bidtun_http::GatewayConfig;
use std::path::{Path, PathBuf};

/// Name of the config file looked up in the state directory
pub const DEFAULT_CONFIG_FILE: &str = "config.toml";

/// State directory: explicit flag, then `BIDTUN_STATE_DIR`, then the system data dir
pub fn resolve_state_dir(data_dir: Option<PathBuf>) -> PathBuf {
    data_dir.unwrap_or_else(|| {
        if let Ok(state_dir) = std::env::var("BIDTUN_STATE_DIR") {
            PathBuf::from(state_dir)
        } else {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("bidtun")
        }
    })
}

/// Load gateway configuration: defaults, then the config file, then `BIDTUN_*`
/// environment variables (`__` separates nested keys, e.g. `BIDTUN_REFRESH__PATH`)
///
/// Without an explicit file, `<state dir>/config.toml` is used when present.
pub fn load_gateway_config(file: Option<&Path>, state_dir: &Path) -> Result<GatewayConfig> {
    let mut builder = config::Config::builder();

    if let Some(path) = file {
        builder = builder.add_source(config::File::from(path));
    } else {
        let default_file = state_dir.join(DEFAULT_CONFIG_FILE);
        if default_file.exists() {
            builder = builder.add_source(config::File::from(default_file));
        }
    }

    let settings = builder
        .add_source(
            config::Environment::with_prefix("BIDTUN")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    Ok(settings.try_deserialize()?)
}

/// Save gateway configuration as TOML
pub fn save_gateway_config<P: AsRef<Path>>(config: &GatewayConfig, path: P) -> Result<()> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}

/// Generate a default configuration file
pub fn generate_default_config<P: AsRef<Path>>(path: P) -> Result<()> {
    save_gateway_config(&GatewayConfig::default(), path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bidtun_http::RefreshTransport;
    use tempfile::TempDir;

    #[test]
    fn test_explicit_data_dir_wins() {
        let dir = resolve_state_dir(Some(PathBuf::from("/tmp/bidtun-state")));
        assert_eq!(dir, PathBuf::from("/tmp/bidtun-state"));
    }

    #[test]
    fn test_generated_config_loads_back() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("gateway.toml");

        generate_default_config(&path).unwrap();
        let loaded = load_gateway_config(Some(&path), temp_dir.path()).unwrap();

        assert_eq!(loaded, GatewayConfig::default());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(DEFAULT_CONFIG_FILE);
        std::fs::write(
            &path,
            "base_url = \"https://api.bidtun.com\"\n\n[refresh]\ntransport = \"header\"\n",
        )
        .unwrap();

        let loaded = load_gateway_config(None, temp_dir.path()).unwrap();

        assert_eq!(loaded.base_url, "https://api.bidtun.com");
        assert_eq!(loaded.refresh.transport, RefreshTransport::Header);
        assert_eq!(loaded.refresh.path, "/auth/refresh/");
        assert_eq!(loaded.timeout_secs, 30);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nope.toml");

        assert!(load_gateway_config(Some(&path), temp_dir.path()).is_err());
    }
}
