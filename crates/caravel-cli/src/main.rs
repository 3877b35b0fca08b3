//! Caravel - dependency/deployment plan inspection
//!
//! Usage:
//!   caravel validate --stack stack.toml
//!   caravel graph --stack stack.toml [--select manifest:unit,...]

mod stackfile;

use std::collections::HashSet;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use petgraph::graph::NodeIndex;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use caravel_core::prelude::{Dag, descriptors_for_manifests};

#[derive(Parser)]
#[command(name = "caravel")]
#[command(about = "Dependency/deployment orchestrator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the dependency graph and report its shape or any construction
    /// error
    Validate {
        /// Stack file declaring manifests and installables
        #[arg(long)]
        stack: PathBuf,
    },

    /// Print the execution plan as waves of nodes that may run concurrently
    Graph {
        /// Stack file declaring manifests and installables
        #[arg(long)]
        stack: PathBuf,

        /// Only act on these units (ancestors ride along for their outputs)
        #[arg(long, value_delimiter = ',')]
        select: Vec<String>,
    },
}

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "caravel=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { stack } => {
            let dag = build_dag(&stack)?;
            println!("ok: {} nodes, {} edges", dag.len(), dag.edge_count());
        }
        Commands::Graph { stack, select } => {
            let mut dag = build_dag(&stack)?;
            if !select.is_empty() {
                dag = dag.extract_subgraph(&select)?;
            }
            for (i, wave) in execution_waves(&dag).iter().enumerate() {
                println!("wave {}:", i + 1);
                for name in wave {
                    println!("  {name}");
                }
            }
        }
    }

    Ok(())
}

fn build_dag(stack: &PathBuf) -> Result<Dag> {
    let manifests = stackfile::load_stack(stack)?;
    tracing::debug!(manifests = manifests.len(), "loaded stack file");
    let descriptors = descriptors_for_manifests(&manifests);
    Ok(Dag::build(&descriptors)?)
}

/// Group nodes into waves: every node in a wave only depends on nodes from
/// earlier waves, so a wave could run concurrently.
fn execution_waves(dag: &Dag) -> Vec<Vec<String>> {
    let mut finished: HashSet<NodeIndex> = HashSet::new();
    let mut waves = Vec::new();
    while finished.len() < dag.len() {
        let wave: Vec<NodeIndex> = dag
            .node_indices()
            .filter(|idx| !finished.contains(idx))
            .filter(|&idx| dag.parents(idx).all(|p| finished.contains(&p)))
            .collect();
        if wave.is_empty() {
            // Unreachable for a graph that passed construction.
            break;
        }
        let mut names: Vec<String> = wave
            .iter()
            .map(|&idx| {
                let node = dag.node(idx);
                if node.is_marked() {
                    node.name().to_string()
                } else {
                    format!("{} (outputs only)", node.name())
                }
            })
            .collect();
        names.sort();
        finished.extend(wave);
        waves.push(names);
    }
    waves
}
