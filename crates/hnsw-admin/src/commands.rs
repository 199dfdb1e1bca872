//! Command implementations for hnsw-admin.
//!
//! Every command opens the store, does its work and closes the store again.
//! Results go to stdout; logs go to stderr.

use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};
use hnsw_graph::{GraphError, HnswIndex};
use hnsw_types::Settings;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::cli::{Cli, Commands};

/// One line of a bulk load file
#[derive(Debug, Deserialize)]
struct LoadRecord {
    id: String,
    vector: Vec<f32>,
}

/// One line of `search --scores` output
#[derive(Debug, Serialize)]
struct ScoredLine<'a> {
    id: u64,
    name: &'a str,
    distance: f32,
}

/// Totals reported by a bulk load
#[derive(Debug, Default, PartialEq, Eq)]
pub struct LoadSummary {
    pub inserted: usize,
    pub skipped: usize,
}

/// Parse "0.1,0.2,0.3" into components.
pub fn parse_vector(text: &str) -> Result<Vec<f32>> {
    text.split(',')
        .map(|part| {
            part.trim()
                .parse::<f32>()
                .with_context(|| format!("Invalid vector component: {:?}", part))
        })
        .collect()
}

/// Load settings, apply CLI overrides, install logging and run the command.
pub fn run(cli: Cli) -> Result<()> {
    let mut settings =
        Settings::load(cli.config.as_deref()).context("Failed to load configuration")?;

    if let Some(db_path) = cli.db_path {
        settings.db_path = db_path;
    }
    if let Some(log_level) = cli.log_level {
        settings.log_level = log_level;
    }

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&settings.log_level)),
        )
        .with_writer(io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    let db_path = settings.expanded_db_path();
    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent).context("Failed to create database directory")?;
    }
    let index = HnswIndex::open(&db_path)
        .with_context(|| format!("Failed to open index at {:?}", db_path))?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let result = execute(&index, &settings, cli.command, &mut out);

    index.close().context("Failed to close index")?;
    result
}

/// Run one command against an open index, writing results to `out`.
pub fn execute(
    index: &HnswIndex,
    settings: &Settings,
    command: Commands,
    out: &mut impl Write,
) -> Result<()> {
    match command {
        Commands::CreateGraph {
            name,
            dim,
            m,
            ef_construction,
        } => {
            let graph = index
                .create_graph(
                    &name,
                    dim.unwrap_or(settings.graph.dim),
                    m.unwrap_or(settings.graph.m),
                    ef_construction.unwrap_or(settings.graph.ef_construction),
                )
                .with_context(|| format!("Failed to create graph {}", name))?;
            writeln!(
                out,
                "Created graph {} (id {}, dim {}, m {}, ef_construction {})",
                graph.name(),
                graph.id(),
                graph.params().dim,
                graph.params().m,
                graph.params().ef_construction
            )?;
        }
        Commands::Graphs => {
            for info in index.list_graphs()? {
                writeln!(out, "{}", serde_json::to_string(&info)?)?;
            }
        }
        Commands::Insert { graph, id, vector } => {
            let handle = index.open_graph(&graph)?;
            let vector = parse_vector(&vector)?;
            handle
                .insert(id.as_bytes(), &vector)
                .with_context(|| format!("Failed to insert {}", id))?;
            writeln!(out, "Inserted {}", id)?;
        }
        Commands::Load { graph, file } => {
            let handle = index.open_graph(&graph)?;
            let summary = if file == Path::new("-") {
                load_lines(&handle, io::stdin().lock())?
            } else {
                let reader = File::open(&file)
                    .with_context(|| format!("Failed to open {:?}", file))?;
                load_lines(&handle, BufReader::new(reader))?
            };
            writeln!(
                out,
                "Loaded {} vectors ({} skipped)",
                summary.inserted, summary.skipped
            )?;
        }
        Commands::Search {
            graph,
            vector,
            k,
            ef,
            scores,
        } => {
            let handle = index.open_graph(&graph)?;
            let query = parse_vector(&vector)?;
            let hits = handle.search_scored(
                &query,
                k.unwrap_or(settings.search.k),
                ef.unwrap_or(settings.search.ef),
            )?;
            for hit in &hits {
                let name = String::from_utf8_lossy(&hit.name);
                if scores {
                    let line = ScoredLine {
                        id: hit.id,
                        name: &name,
                        distance: hit.distance,
                    };
                    writeln!(out, "{}", serde_json::to_string(&line)?)?;
                } else {
                    writeln!(out, "{}", name)?;
                }
            }
        }
        Commands::Layer {
            graph,
            layer,
            limit,
        } => {
            let handle = index.open_graph(&graph)?;
            let edges = handle.list_layer(layer)?;
            for edge in edges.take(limit.unwrap_or(usize::MAX)) {
                writeln!(out, "{}", serde_json::to_string(&edge?)?)?;
            }
        }
        Commands::Stats { graph } => {
            let handle = index.open_graph(&graph)?;
            let stats = handle.stats()?;
            writeln!(out, "{}", serde_json::to_string_pretty(&stats)?)?;
        }
    }
    Ok(())
}

/// Insert every JSON line of `reader` into `graph`.
///
/// Names already present are skipped with a warning; any other failure stops
/// the load.
pub fn load_lines(graph: &hnsw_graph::Graph, reader: impl BufRead) -> Result<LoadSummary> {
    let mut summary = LoadSummary::default();
    for (lineno, line) in reader.lines().enumerate() {
        let line = line.context("Failed to read input")?;
        if line.trim().is_empty() {
            continue;
        }
        let record: LoadRecord = serde_json::from_str(&line)
            .with_context(|| format!("Invalid record on line {}", lineno + 1))?;

        match graph.insert(record.id.as_bytes(), &record.vector) {
            Ok(()) => summary.inserted += 1,
            Err(GraphError::AlreadyExists(name)) => {
                warn!(line = lineno + 1, name = %name, "Skipping duplicate name");
                summary.skipped += 1;
            }
            Err(e) => bail!("Line {}: {}", lineno + 1, e),
        }
    }
    info!(
        graph = graph.name(),
        inserted = summary.inserted,
        skipped = summary.skipped,
        "Load complete"
    );
    Ok(summary)
}
