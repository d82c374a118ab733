//! Command-line interface for the cash server

use crate::config::Config;
use crate::persistence::SyncPolicy;
use clap::Parser;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

/// Port used when the configured listen address cannot be parsed
const DEFAULT_PORT: u16 = 6400;

/// In-memory key-value cache server.
///
/// Settings come from a TOML file (`--config`) or from `CASH_*` environment
/// variables; flags given here override both.
#[derive(Parser, Debug)]
#[command(name = "cash", version, about, long_about = None)]
pub struct Cli {
    /// TOML configuration file
    #[arg(short, long, value_name = "FILE", env = "CASH_CONFIG")]
    pub config: Option<String>,

    /// IP address to listen on
    #[arg(long)]
    pub host: Option<IpAddr>,

    /// Port to listen on
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Command log to persist data to
    #[arg(short, long, value_name = "PATH")]
    pub file: Option<PathBuf>,

    /// Run without a command log
    #[arg(long, conflicts_with = "file")]
    pub no_persist: bool,

    /// When to fsync the command log: never, every_second or always
    #[arg(long, value_name = "POLICY")]
    pub sync_policy: Option<SyncPolicy>,
}

impl Cli {
    /// Load the base configuration this invocation points at
    pub fn load_config(&self) -> crate::Result<Config> {
        match &self.config {
            Some(path) => Config::from_file(path),
            None => Ok(Config::from_env()),
        }
    }

    /// Override configuration values with the flags that were given
    pub fn apply(&self, config: &mut Config) {
        if self.host.is_some() || self.port.is_some() {
            let current: SocketAddr = config
                .server
                .listen_addr
                .parse()
                .unwrap_or_else(|_| SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), DEFAULT_PORT));
            let ip = self.host.unwrap_or(current.ip());
            let port = self.port.unwrap_or(current.port());
            config.server.listen_addr = SocketAddr::new(ip, port).to_string();
        }

        if let Some(file) = &self.file {
            config.engine.log_path = Some(file.clone());
        }

        if self.no_persist {
            config.engine.log_path = None;
        }

        if let Some(policy) = self.sync_policy {
            config.engine.sync_policy = policy;
        }
    }
}
