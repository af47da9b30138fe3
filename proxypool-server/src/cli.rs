//! CLI bootstrap, shaped after the teacher's `cli.rs`: a single `serve`
//! command (the default when no subcommand is given), with every flag
//! readable from the environment variables named in spec.md §6.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "proxypool-server",
    about = "Multi-market rotating HTTP-proxy pool service",
    version = env!("CARGO_PKG_VERSION"),
    author,
    propagate_version = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Start the HTTP server (default if no command specified)")]
    Serve {
        #[arg(long, env = "ENVIRONMENT", default_value = "development")]
        environment: String,

        #[arg(long, env = "MARKETS", default_value = "CN")]
        markets: String,

        #[arg(long, env = "HOST")]
        host: Option<String>,

        #[arg(long, env = "PORT")]
        port: Option<u16>,

        #[arg(long, env = "LOG_LEVEL", default_value = "info")]
        log_level: String,

        #[arg(long, env = "DATABASE_URL")]
        database_url: Option<String>,
    },
}
