//! GridStats CLI: query the motorsport statistics pipeline.
//!
//! Commands:
//! - `query`: resolve one request (from flags or a JSON file) and print the result
//! - `endpoints`: list the known endpoint identifiers and their path templates

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use gridstats_core::data::EndpointCatalog;
use gridstats_core::{ParamValue, Requirements, Scalar};
use gridstats_runner::{Pipeline, PipelineConfig, PipelineResponse, ResponseData};
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "gridstats",
    about = "GridStats CLI: historical, career and comparison queries over motorsport data"
)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace). RUST_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve one request and print the response.
    Query {
        /// Endpoint identifier, e.g. RESULTS.race. Overrides the request file.
        #[arg(long)]
        endpoint: Option<String>,

        /// Parameter as key=value. Commas make a list: driver=alonso,hamilton.
        #[arg(long = "param", value_name = "KEY=VALUE")]
        params: Vec<String>,

        /// JSON request file: {"endpoint": "...", "params": {...}}.
        #[arg(long)]
        request: Option<PathBuf>,

        /// Pipeline config (TOML). Defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Print the response envelope as JSON instead of tables.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// List the known endpoint identifiers.
    Endpoints,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Query {
            endpoint,
            params,
            request,
            config,
            json,
        } => run_query(endpoint, params, request, config, json),
        Commands::Endpoints => {
            run_endpoints();
            Ok(())
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbose >= 2)
        .with_writer(std::io::stderr)
        .init();
}

fn run_query(
    endpoint: Option<String>,
    params: Vec<String>,
    request_path: Option<PathBuf>,
    config_path: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    let requirements = build_requirements(endpoint, &params, request_path.as_deref())?;
    let config = match config_path {
        Some(path) => PipelineConfig::from_file(&path)?,
        None => PipelineConfig::default(),
    };
    debug!(?requirements, "parsed request");

    let pipeline = Pipeline::ergast(&config)?;
    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    let response = runtime.block_on(pipeline.process(&requirements));

    if json {
        print_json(&response)?;
    } else {
        print_response(&response)?;
    }

    if !response.success {
        std::process::exit(1);
    }
    Ok(())
}

fn build_requirements(
    endpoint: Option<String>,
    params: &[String],
    request_path: Option<&Path>,
) -> Result<Requirements> {
    let mut requirements = match request_path {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let value: serde_json::Value = serde_json::from_str(&content)
                .with_context(|| format!("{} is not valid JSON", path.display()))?;
            Requirements::from_json(value)?
        }
        None => match &endpoint {
            Some(id) => Requirements::new(id.as_str()),
            None => bail!("one of --endpoint or --request is required"),
        },
    };

    if let Some(id) = endpoint {
        requirements.endpoint = id;
    }
    for raw in params {
        let (key, value) = parse_param(raw)?;
        requirements.params.insert(key, value);
    }
    Ok(requirements)
}

/// Parse `key=value`. A value with commas becomes a list; integers stay integers.
fn parse_param(raw: &str) -> Result<(String, ParamValue)> {
    let Some((key, value)) = raw.split_once('=') else {
        bail!("parameter '{raw}' is not key=value");
    };
    let key = key.trim();
    if key.is_empty() {
        bail!("parameter '{raw}' has an empty key");
    }

    let value = if value.contains(',') {
        ParamValue::List(value.split(',').map(parse_scalar).collect())
    } else {
        ParamValue::Scalar(parse_scalar(value))
    };
    Ok((key.to_string(), value))
}

fn parse_scalar(raw: &str) -> Scalar {
    match raw.trim().parse::<i64>() {
        Ok(n) => Scalar::Int(n),
        Err(_) => Scalar::Text(raw.to_string()),
    }
}

fn print_json(response: &PipelineResponse) -> Result<()> {
    let envelope = serde_json::json!({
        "success": response.success,
        "error": response.error,
        "metadata": response.metadata,
        "rows": row_counts(response),
    });
    println!("{}", serde_json::to_string_pretty(&envelope)?);
    Ok(())
}

fn row_counts(response: &PipelineResponse) -> serde_json::Value {
    match &response.data {
        None => serde_json::Value::Null,
        Some(ResponseData::Rows(df)) => df.height().into(),
        Some(ResponseData::Keyed(map)) => map
            .iter()
            .map(|(key, df)| (key.clone(), serde_json::Value::from(df.height())))
            .collect::<serde_json::Map<_, _>>()
            .into(),
    }
}

fn print_response(response: &PipelineResponse) -> Result<()> {
    let status = if response.success { "ok" } else { "failed" };
    println!("Status: {status}");
    if let Some(error) = &response.error {
        println!("Error:  {error}");
    }
    println!("{}", serde_json::to_string_pretty(&response.metadata)?);

    match &response.data {
        None => println!("(no data)"),
        Some(ResponseData::Rows(df)) => println!("{df}"),
        Some(ResponseData::Keyed(map)) => {
            for (key, df) in map {
                println!("\n== {key} ({} rows) ==", df.height());
                println!("{df}");
            }
        }
    }
    Ok(())
}

fn run_endpoints() {
    println!("{:<30} {:<28} REQUIRED", "ENDPOINT", "RESOURCE");
    for spec in EndpointCatalog.entries() {
        println!(
            "{:<30} {:<28} {}",
            spec.id,
            spec.resource,
            spec.required.join(", ")
        );
    }
}
