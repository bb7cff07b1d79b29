#![allow(clippy::print_stderr, clippy::print_stdout)]
mod scenario;

use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};
use common::ContractArtifact;
use scenario::Scenario;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Parser)]
#[command(version, about, long_about = None)]
pub struct Options {
    /// Log every transaction and state access.
    #[arg(short, long, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Run a privacy group scenario and print each step's result as JSON.
    Run {
        /// Path to the scenario TOML file.
        scenario: Utf8PathBuf,
    },
    /// Summarize a contract artifact.
    Inspect {
        /// Path to the artifact JSON file.
        artifact: Utf8PathBuf,
    },
}

fn main() {
    let opts = Options::parse();
    init_logging(opts.verbose);
    run(&opts);
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

pub fn run(opts: &Options) {
    match &opts.command {
        Command::Run { scenario } => {
            let records = match Scenario::load(scenario).and_then(|scenario| scenario.run()) {
                Ok(records) => records,
                Err(err) => {
                    eprintln!("Error: {err}");
                    std::process::exit(1);
                }
            };
            for record in records {
                println!("{record}");
            }
        }
        Command::Inspect { artifact } => match ContractArtifact::load(artifact) {
            Ok(artifact) => print_artifact(&artifact),
            Err(err) => {
                eprintln!("Error: {err}");
                std::process::exit(1);
            }
        },
    }
}

fn print_artifact(artifact: &ContractArtifact) {
    let size = match artifact.bytecode_bytes() {
        Ok(bytes) => bytes.len(),
        Err(err) => {
            eprintln!("Error: {err}");
            std::process::exit(1);
        }
    };
    println!(
        "name: {}",
        artifact.contract_name.as_deref().unwrap_or("<unnamed>")
    );
    println!("bytecode: {size} bytes");
    println!("abi entries: {}", artifact.abi.len());
    for entry in &artifact.abi {
        let kind = entry["type"].as_str().unwrap_or("function");
        match entry["name"].as_str() {
            Some(name) => println!("  {kind} {name}"),
            None => println!("  {kind}"),
        }
    }
}
