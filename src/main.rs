use std::fs;
use std::path::PathBuf;
use std::process;

use clap::Parser as ClapParser;
use rql::backend::{Compiler, Target};
use rql::config::{BindStyle, CompilerConfig};
use rql::metadata::{northwind, Catalog};
use rql::query::Query;
use tracing::Level;

#[derive(ClapParser)]
#[command(name = "rqlc")]
#[command(about = "Compile an RQL query string to SQL, a document query or a key-value request")]
#[command(version)]
struct Cli {
    /// The RQL query string, e.g. "sw(shipCountry,Franc)&limit=10"
    query: String,

    /// Collection to query
    #[arg(short, long)]
    collection: String,

    /// postgres, mysql, sqlite, sqlserver, h2, document or keyvalue
    #[arg(short, long, default_value = "postgres")]
    target: Target,

    /// Catalog JSON file (the Northwind sample when omitted)
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Compiler configuration JSON file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Use numbered placeholders where the dialect has them
    #[arg(long)]
    numbered: bool,

    /// Print the output on one line
    #[arg(long)]
    compact: bool,

    /// Log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    if let Err(message) = run(&cli) {
        eprintln!("{}", message);
        process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<(), String> {
    let catalog = match &cli.catalog {
        Some(path) => read_json::<Catalog>(path)?,
        None => northwind::catalog(),
    };
    let mut config = match &cli.config {
        Some(path) => read_json::<CompilerConfig>(path)?,
        None => CompilerConfig::default(),
    };
    if cli.numbered {
        config = config.with_bind_style(BindStyle::Numbered);
    }

    let collection = catalog.require(&cli.collection).map_err(|e| e.to_string())?;
    let compiled = Query::from_query_string(collection, &cli.query)
        .and_then(|query| Compiler::new(config).compile(cli.target, &query, &catalog))
        .map_err(|e| format!("error {}: {}", e.status().code(), e))?;

    let json = if cli.compact {
        serde_json::to_string(&compiled)
    } else {
        serde_json::to_string_pretty(&compiled)
    }
    .map_err(|e| e.to_string())?;
    println!("{}", json);
    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &PathBuf) -> Result<T, String> {
    let text = fs::read_to_string(path).map_err(|e| format!("{}: {}", path.display(), e))?;
    serde_json::from_str(&text).map_err(|e| format!("{}: {}", path.display(), e))
}
