// CLI module for adforge
// Author: kelexine (https://github.com/kelexine)

use crate::config::AppConfig;
use clap::Parser;

/// adforge - cached, cost-tracked AI ad copy and voice generation service
#[derive(Parser, Debug, Default)]
#[command(name = "adforge", version, about, long_about = None)]
pub struct Args {
    /// Config file to load instead of ~/.adforge/config.toml
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<String>,

    /// Override the listen address
    #[arg(long)]
    pub host: Option<String>,

    /// Override the listen port
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Print the effective configuration (secrets redacted) and exit
    #[arg(long)]
    pub print_config: bool,
}

impl Args {
    /// Apply command-line overrides, the highest-precedence config layer.
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
    }
}
