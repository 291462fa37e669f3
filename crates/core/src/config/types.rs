use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;

use crate::download::DownloaderConfig;
use crate::extract::ExtractorConfig;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub download: DownloaderConfig,
    #[serde(default)]
    pub extract: ExtractorConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    8080
}

/// Where installs and in-flight downloads live
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// One directory per artifact id is created under this root.
    #[serde(default = "default_install_root")]
    pub install_root: PathBuf,
    /// Partial downloads are written here.
    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            install_root: default_install_root(),
            temp_dir: default_temp_dir(),
        }
    }
}

fn default_install_root() -> PathBuf {
    PathBuf::from("./runtimes")
}

fn default_temp_dir() -> PathBuf {
    std::env::temp_dir().join("cellar")
}

/// Catalog feed configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CatalogConfig {
    /// JSON file listing the available artifacts. Without it the catalog
    /// starts empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}
