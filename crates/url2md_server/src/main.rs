use std::path::PathBuf;

use clap::Parser;
use url2md_server::logging::{self, LogDestination};
use url2md_server::{ServerConfig, Transport};

/// Converts web pages to markdown over a JSON API and the Model Context Protocol.
#[derive(Parser, Debug)]
#[command(name = "url2md", version)]
struct Args {
    /// RON config file; missing fields keep their defaults
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Host to bind to
    #[arg(short = 'H', long)]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Speak MCP over stdin/stdout instead of serving HTTP
    #[arg(long)]
    stdio: bool,

    /// Also write logs to this file
    #[arg(long)]
    log_file: Option<PathBuf>,

    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig::default(),
    };
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if args.log_file.is_some() {
        config.log_file = args.log_file;
    }
    config.verbose |= args.verbose;

    logging::initialize(
        LogDestination::from_log_file(config.log_file.as_deref()),
        config.verbose,
    );

    let transport = if args.stdio {
        Transport::Stdio
    } else {
        Transport::Http
    };
    url2md_server::run(config, transport).await
}
