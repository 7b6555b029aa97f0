use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "capi", about = "HTTP gateway for CBSD bhyve VM lifecycle operations")]
pub struct Cli {
    /// Address to listen on (host:port, or :port for all interfaces)
    #[arg(short, long)]
    pub listen: Option<String>,

    /// Path to an optional TOML config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Path to the cbsd executable
    #[arg(long)]
    pub cbsd: Option<String>,

    /// Skip the inventory sync at startup
    #[arg(long)]
    pub no_initial_sync: bool,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}
