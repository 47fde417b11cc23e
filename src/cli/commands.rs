//! CLI command definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "msb-client")]
#[command(about = "Demo service for the MSB message bus", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Service UUID (random if not given)
    #[arg(long, env = "MSB_UUID", global = true)]
    pub uuid: Option<String>,

    /// Service token
    #[arg(long, env = "MSB_TOKEN", global = true, default_value = "msb-client-demo")]
    pub token: String,

    /// Service name
    #[arg(long, env = "MSB_NAME", global = true, default_value = "msb-client demo")]
    pub name: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the self-description of the demo service
    Describe,

    /// Connect, register and publish until interrupted
    ///
    /// Examples:
    ///   msb-client run --url ws://localhost:8085
    ///   msb-client run --url https://msb.example.com --sockjs --origin https://msb.example.com
    Run {
        /// Broker URL
        #[arg(long, env = "MSB_URL", default_value = "ws://localhost:8085")]
        url: String,

        /// Initial heartbeat interval in seconds (configurable from the broker)
        #[arg(long, default_value_t = 5)]
        interval: i32,

        /// Use a generated SockJS path and SockJS framing
        #[arg(long)]
        sockjs: bool,

        /// Origin header of the websocket handshake
        #[arg(long, env = "MSB_ORIGIN")]
        origin: Option<String>,

        /// Client certificate (PEM)
        #[arg(long, env = "MSB_CERT", requires = "key")]
        cert: Option<PathBuf>,

        /// Client private key (PEM)
        #[arg(long, env = "MSB_KEY", requires = "cert")]
        key: Option<PathBuf>,

        /// CA certificates to trust instead of the system roots (PEM)
        #[arg(long, env = "MSB_CA", requires = "cert")]
        ca: Option<PathBuf>,

        /// Accept broker certificates issued for another host name
        #[arg(long)]
        insecure: bool,

        /// Forward client debug lines to stderr
        #[arg(long)]
        debug: bool,
    },
}
