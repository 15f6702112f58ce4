use anyhow::Result;
use clap::{Arg, Command};
use flatdb::{
    config::SchemaConfig,
    engine::Catalog,
    server::{run_session, serve},
};
use std::sync::Arc;
use tokio::io::BufReader;
use tracing_subscriber::{fmt, EnvFilter};

/// Entry point for the flatdb engine.
///
/// 1. Parses command-line arguments
/// 2. Initializes structured logging with tracing
/// 3. Loads the schema (an unreadable schema yields an empty catalog)
/// 4. Opens the catalog under the data directory
/// 5. Serves TCP clients when `--listen` is given, otherwise reads statements
///    from stdin until `exit`
#[tokio::main]
async fn main() -> Result<()> {
    let matches = Command::new("flatdb")
        .about("Segmented flat-file relational engine with a tiny SQL surface")
        .arg(
            Arg::new("schema")
                .long("schema")
                .value_name("FILE")
                .default_value("schema.json")
                .help("JSON schema file describing tables and row limits"),
        )
        .arg(
            Arg::new("data")
                .long("data")
                .value_name("DIR")
                .default_value(".")
                .help("Directory the schema directory is created in"),
        )
        .arg(
            Arg::new("listen")
                .long("listen")
                .value_name("ADDR")
                .help("Serve sessions over TCP instead of stdin"),
        )
        .get_matches();

    let schema_path = matches
        .get_one::<String>("schema")
        .cloned()
        .unwrap_or_default();
    let data_dir = matches
        .get_one::<String>("data")
        .cloned()
        .unwrap_or_else(|| ".".to_string());
    let listen = matches.get_one::<String>("listen").cloned();

    // Logs go to stderr so stdout carries only session output
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let schema = SchemaConfig::load_or_empty(&schema_path);
    let catalog = Arc::new(Catalog::open(data_dir, &schema)?);

    match listen {
        Some(addr) => serve(catalog, &addr).await,
        None => {
            let stdin = BufReader::new(tokio::io::stdin());
            run_session(catalog, stdin, tokio::io::stdout()).await
        }
    }
}
