//! Command-line client for a running clinical notes query server.
//!
//! Each subcommand maps to one HTTP endpoint and prints the JSON reply.
use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use serde_json::{Value, json};

#[derive(Parser)]
#[command(
    name = "clinical-rag-ask",
    about = "Ask questions of a running clinical notes query server"
)]
struct Cli {
    /// Base URL of the server.
    #[arg(long, default_value = "http://127.0.0.1:8000")]
    url: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Free-text question routed by intent.
    Query { question: String },
    /// Patients whose notes match a diagnosis term.
    WhichPatients { diagnosis: String },
    /// Most frequently prescribed treatment.
    Treatment,
    /// Every distinct patient in the index.
    Patients,
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let base = cli.url.trim_end_matches('/');
    let client = reqwest::Client::new();

    let request = match &cli.command {
        Command::Query { question } => client
            .post(format!("{base}/query"))
            .json(&json!({ "q": question })),
        Command::WhichPatients { diagnosis } => client
            .get(format!("{base}/which_patients"))
            .query(&[("diagnosis", diagnosis)]),
        Command::Treatment => client.get(format!("{base}/most_common_treatment")),
        Command::Patients => client.get(format!("{base}/debug/patients")),
    };

    let response = request
        .send()
        .await
        .with_context(|| format!("failed to reach server at {base}"))?;
    let status = response.status();
    let body: Value = response
        .json()
        .await
        .context("server returned a non-JSON body")?;

    println!("{}", serde_json::to_string_pretty(&body)?);
    if !status.is_success() {
        bail!("server answered with status {status}");
    }
    Ok(())
}
