//! astg: inspect nested tree documents through the AST graph

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use ast_graph::{project, Ast, AstConfig};

/// AST graph inspector
#[derive(Parser, Debug)]
#[command(name = "astg")]
#[command(version = "0.1.0")]
#[command(about = "Inspect, query and round-trip nested AST documents as graphs")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// JSON config file (partial configs are filled with defaults)
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Node, edge and root counts plus the most common node types
    Stats {
        input: PathBuf,

        /// How many node types to list
        #[arg(long, default_value = "10")]
        top: usize,
    },
    /// Ingest and rebuild a document; exits with 1 if they differ
    Roundtrip {
        input: PathBuf,

        /// Print the rebuilt document
        #[arg(long)]
        print: bool,
    },
    /// List ids of nodes of one type
    Query {
        input: PathBuf,

        #[arg(long, value_name = "TYPE")]
        node_type: String,
    },
    /// Wrap several documents into one project and list its files
    Files {
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Project directory (defaults to the inputs' common directory)
        #[arg(long)]
        project: Option<PathBuf>,
    },
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(2);
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<i32> {
    let config = match &cli.config {
        Some(path) => AstConfig::from_path(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => AstConfig::default(),
    };

    match &cli.command {
        Commands::Stats { input, top } => {
            let (ast, _) = ingest(input, config)?;
            print_stats(&ast, *top);
            Ok(0)
        }
        Commands::Roundtrip { input, print } => {
            let document = read_document(input)?;
            let (ast, _) = Ast::ingest_with_config(&document, config)
                .with_context(|| format!("ingesting {}", input.display()))?;
            let rebuilt = ast.to_document()?;
            if *print {
                println!("{}", serde_json::to_string_pretty(&rebuilt)?);
            }
            if rebuilt == document {
                println!("[✓] {} round-trips ({} nodes)", input.display(), ast.node_count());
                Ok(0)
            } else {
                println!("[✗] {} differs after reconstruction", input.display());
                Ok(1)
            }
        }
        Commands::Query { input, node_type } => {
            let (ast, _) = ingest(input, config)?;
            for node in ast.nodes_of_type(node_type) {
                match node.start_line() {
                    Some(line) => println!("{}\tline {}", node.id(), line),
                    None => println!("{}", node.id()),
                }
            }
            Ok(0)
        }
        Commands::Files { inputs, project: project_dir } => {
            let mut documents = Vec::with_capacity(inputs.len());
            for input in inputs {
                documents.push((input.clone(), read_document(input)?));
            }
            let ast = project::wrap_many(&documents, project_dir.as_deref(), config)
                .context("building project")?;
            for file in ast.files() {
                let path = file.get("path").and_then(Value::as_str).unwrap_or_default();
                let stmts = ast.field_edges(file.id(), &ast.config().statement_field)?.len();
                println!("{}\t{}\t{} statement(s)", file.id(), path, stmts);
            }
            Ok(0)
        }
    }
}

fn read_document(path: &Path) -> anyhow::Result<Value> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("decoding {}", path.display()))
}

fn ingest(path: &Path, config: AstConfig) -> anyhow::Result<(Ast, Vec<String>)> {
    let document = read_document(path)?;
    Ast::ingest_with_config(&document, config).with_context(|| format!("ingesting {}", path.display()))
}

fn print_stats(ast: &Ast, top: usize) {
    let mut by_type: BTreeMap<&str, usize> = BTreeMap::new();
    for node in ast.nodes() {
        *by_type.entry(node.node_type().unwrap_or("?")).or_default() += 1;
    }
    let mut ranked: Vec<_> = by_type.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));

    println!("nodes:  {}", ast.node_count());
    println!("edges:  {}", ast.edge_count());
    println!("roots:  {}", ast.root_ids().len());
    let with_attributes = ast
        .nodes()
        .filter(|n| ast.attribute_keys(n.id()).map_or(false, |keys| !keys.is_empty()))
        .count();
    println!("nodes with attributes: {}", with_attributes);
    for (node_type, count) in ranked.into_iter().take(top) {
        println!("  {:<32} {}", node_type, count);
    }
}
