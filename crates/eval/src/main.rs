//! Evaluation CLI for testing collection/institution lookup.
//!
//! Usage:
//!     eval lookup --institution-code NHMUK --collection-code Mamm
//!     eval lookup --snapshot fixtures/registry.json --institution-code K --verbose
//!     eval batch --queries queries.json --snapshot fixtures/registry.json
//!     eval health

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use scicoll_explain::summarize;
use scicoll_model::{CandidateEntity, LookupQuery, Match};
use scicoll_resolve::lookup;
use scicoll_snapshot::{
    load_snapshot_file, RegistryClient, RegistryConfig, RegistrySnapshot, SnapshotSource,
};
use std::collections::BTreeMap;
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "eval")]
#[command(about = "Evaluate collection/institution lookup quality")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Registry URL
    #[arg(long, default_value = "http://127.0.0.1:8080")]
    registry_url: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a single lookup query
    Lookup {
        #[arg(long)]
        institution_code: Option<String>,

        #[arg(long)]
        institution_id: Option<String>,

        #[arg(long)]
        collection_code: Option<String>,

        #[arg(long)]
        collection_id: Option<String>,

        #[arg(long)]
        owner_institution_code: Option<String>,

        /// ISO country code
        #[arg(long)]
        country: Option<String>,

        /// Source dataset key (enables explicit mappings)
        #[arg(long)]
        dataset_key: Option<Uuid>,

        /// Include ranked alternative matches
        #[arg(short, long)]
        verbose: bool,

        /// Read the snapshot from a JSON file instead of the registry
        #[arg(long)]
        snapshot: Option<PathBuf>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Check registry health
    Health,

    /// Run a JSON file of queries and tally the outcomes
    Batch {
        /// Path to a JSON array of lookup queries
        #[arg(short, long)]
        queries: PathBuf,

        /// Read the snapshot from a JSON file instead of the registry
        #[arg(long)]
        snapshot: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("scicoll=debug".parse()?),
        )
        .init();

    let cli = Cli::parse();

    let config = RegistryConfig {
        base_url: cli.registry_url,
        ..Default::default()
    };
    let client = RegistryClient::new(config);

    match cli.command {
        Commands::Lookup {
            institution_code,
            institution_id,
            collection_code,
            collection_id,
            owner_institution_code,
            country,
            dataset_key,
            verbose,
            snapshot,
            format,
        } => {
            let query = LookupQuery {
                institution_code,
                institution_id,
                collection_code,
                collection_id,
                owner_institution_code,
                country,
                dataset_key,
                verbose,
            };
            let snapshot = obtain_snapshot(&client, snapshot.as_deref()).await?;
            run_lookup(&snapshot, &query, &format)?;
        }
        Commands::Health => {
            run_health(&client).await?;
        }
        Commands::Batch { queries, snapshot } => {
            let snapshot = obtain_snapshot(&client, snapshot.as_deref()).await?;
            run_batch(&snapshot, &queries)?;
        }
    }

    Ok(())
}

async fn obtain_snapshot(
    client: &RegistryClient,
    file: Option<&std::path::Path>,
) -> Result<RegistrySnapshot> {
    match file {
        Some(path) => load_snapshot_file(path)
            .with_context(|| format!("Failed to load snapshot from {}", path.display())),
        None => client
            .fetch_snapshot()
            .await
            .context("Failed to fetch snapshot from registry"),
    }
}

fn run_lookup(snapshot: &RegistrySnapshot, query: &LookupQuery, format: &str) -> Result<()> {
    let result = lookup(snapshot, query);

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    print_match("Institution", &result.institution_match);
    print_match("Collection", &result.collection_match);

    if let Some(alternatives) = &result.alternative_matches {
        println!("---");
        println!(
            "Alternatives: {} institution(s), {} collection(s)",
            alternatives.institution_matches.len(),
            alternatives.collection_matches.len()
        );
        for alt in &alternatives.institution_matches {
            if let Some(entity) = &alt.entity_matched {
                println!("  ~ {} ({}) {}", entity.code, entity.name, summarize(alt));
            }
        }
        for alt in &alternatives.collection_matches {
            if let Some(entity) = &alt.entity_matched {
                println!("  ~ {} ({}) {}", entity.code, entity.name, summarize(alt));
            }
        }
    }

    Ok(())
}

fn print_match<T: CandidateEntity>(label: &str, m: &Match<T>) {
    match &m.entity_matched {
        Some(entity) => println!(
            "{}: {} ({}) | {}",
            label,
            entity.code(),
            entity.name(),
            summarize(m)
        ),
        None => println!("{}: {}", label, summarize(m)),
    }
}

async fn run_health(client: &RegistryClient) -> Result<()> {
    print!("Checking {} source... ", client.name());

    match client.health_check().await {
        Ok(()) => {
            println!("OK");
            Ok(())
        }
        Err(e) => {
            println!("FAILED: {}", e);
            std::process::exit(1);
        }
    }
}

fn run_batch(snapshot: &RegistrySnapshot, queries_path: &PathBuf) -> Result<()> {
    let raw = std::fs::read_to_string(queries_path)
        .with_context(|| format!("Failed to read {}", queries_path.display()))?;
    let queries: Vec<LookupQuery> = serde_json::from_str(&raw)?;

    let mut institution_tally: BTreeMap<String, usize> = BTreeMap::new();
    let mut collection_tally: BTreeMap<String, usize> = BTreeMap::new();

    for query in &queries {
        let result = lookup(snapshot, query);
        *institution_tally
            .entry(format!("{:?}", result.institution_match.match_type))
            .or_default() += 1;
        *collection_tally
            .entry(format!("{:?}", result.collection_match.match_type))
            .or_default() += 1;
    }

    println!("Ran {} queries", queries.len());
    println!("Institution outcomes:");
    for (match_type, count) in &institution_tally {
        println!("  {:16} {}", match_type, count);
    }
    println!("Collection outcomes:");
    for (match_type, count) in &collection_tally {
        println!("  {:16} {}", match_type, count);
    }

    Ok(())
}
