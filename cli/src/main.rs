//! Command-line utility: build a client from the flags and run the smoke test.
//!
//! ```text
//! fielddb-client -R http -H 127.0.0.1 -P 5984 -u admin -p none
//! ```

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use fielddb_cli::Tester;
use fielddb_core::{AuthMode, ConnectionConfig, FieldDbClient, Scheme, SessionOptions};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "fielddb-client")]
#[command(about = "Connect to FieldDB web services and run the client smoke test", long_about = None)]
struct Opts {
    /// protocol: one of 'https' or 'http'
    #[arg(short = 'R', long, default_value = "https")]
    protocol: Scheme,

    /// hostname where the FieldDB application can be accessed
    #[arg(short = 'H', long, default_value = "localhost")]
    host: String,

    /// port of the FieldDB application
    #[arg(short = 'P', long, default_value = "3183")]
    port: String,

    /// username of the FieldDB researcher
    #[arg(short = 'u', long, default_value = "username")]
    username: String,

    /// password of the FieldDB researcher
    #[arg(short = 'p', long, default_value = "password")]
    password: String,

    /// which requests carry credentials: 'always' or 'mutations-only'
    #[arg(long, default_value = "always")]
    auth_mode: AuthMode,

    /// verify TLS certificates (off by default for self-signed deployments)
    #[arg(long)]
    verify_tls: bool,

    /// per-request timeout in seconds
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// file holding the source of the `add_syntactic_category` map function
    #[arg(long, default_value = "map1.js")]
    map_file: PathBuf,

    /// name of the scratch database
    #[arg(long, default_value = "fruits")]
    database: String,

    /// name of the replication target
    #[arg(long, default_value = "fruits_clone")]
    clone: String,

    /// log every HTTP request and response
    #[arg(short, long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "fielddb_core=debug,fielddb_cli=debug,fielddb_client=debug"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn main() -> Result<()> {
    let opts = Opts::parse();
    init_tracing(opts.verbose);

    let config = ConnectionConfig::new(opts.protocol, &opts.host, &opts.port)
        .with_credentials(&opts.username, &opts.password)
        .with_auth_mode(opts.auth_mode);
    let options = SessionOptions {
        verify_tls: opts.verify_tls,
        timeout: opts.timeout_secs.map(Duration::from_secs),
        trace_http: opts.verbose,
    };
    let client = FieldDbClient::new(config, options)?;
    info!(url = %client.base_url(), "connecting");

    Tester::new(&client)
        .with_databases(&opts.database, &opts.clone)
        .with_map_file(opts.map_file)
        .run()
}
