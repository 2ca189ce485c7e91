//! Operator CLI for the edge-cloud workload orchestrator.

use clap::{Arg, Command};
use orchestrator_common::types::Dag;
use orchestrator_common::Config;
use orchestrator_core::cluster::ClusterDriver;
use orchestrator_core::dag::DagModel;
use orchestrator_core::distributor::Distributor;
use orchestrator_engine::{InMemoryClusterDriver, PetgraphDagModel};
use orchestrator_store::SqliteDistributor;
use std::process::ExitCode;
use std::time::Duration;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::from(err.exit_code() as u8)
        }
    }
}

async fn run() -> orchestrator_common::error::Result<()> {
    let app = Command::new("orchestrator-cli")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Edge-cloud workload orchestrator operator CLI")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path"),
        )
        .subcommand(
            Command::new("dag")
                .about("DAG operations")
                .subcommand(
                    Command::new("validate")
                        .about("Validate a DAG definition file (acyclic, reachable, chain-shaped)")
                        .arg(Arg::new("file").required(true).help("Path to a JSON-encoded Dag")),
                ),
        )
        .subcommand(
            Command::new("install")
                .about("Install a workload onto the cluster")
                .arg(Arg::new("workload").required(true)),
        )
        .subcommand(
            Command::new("uninstall")
                .about("Tear down a previously installed workload")
                .arg(Arg::new("workload").required(true)),
        )
        .subcommand(
            Command::new("query")
                .about("Poll the distributor for results since a cursor")
                .arg(Arg::new("cursor").long("cursor").default_value("0"))
                .arg(Arg::new("limit").long("limit").default_value("50")),
        );

    let matches = app.get_matches();
    let _config = Config::load().map_err(|e| orchestrator_common::Error::Config(e.to_string()))?;

    match matches.subcommand() {
        Some(("dag", dag_matches)) => match dag_matches.subcommand() {
            Some(("validate", validate_matches)) => {
                let path = validate_matches.get_one::<String>("file").expect("required");
                validate_dag(path)?;
            }
            _ => println!("Use 'dag validate <file>'"),
        },
        Some(("install", install_matches)) => {
            let workload = install_matches.get_one::<String>("workload").expect("required");
            let driver = InMemoryClusterDriver::new(Duration::from_millis(50));
            driver.install(workload, Duration::from_secs(60)).await?;
            println!("installed workload: {workload}");
        }
        Some(("uninstall", uninstall_matches)) => {
            let workload = uninstall_matches.get_one::<String>("workload").expect("required");
            let driver = InMemoryClusterDriver::new(Duration::from_millis(50));
            driver.uninstall(workload, Duration::from_secs(120)).await?;
            println!("uninstalled workload: {workload}");
        }
        Some(("query", query_matches)) => {
            let cursor: f64 = query_matches
                .get_one::<String>("cursor")
                .and_then(|s| s.parse().ok())
                .unwrap_or(0.0);
            let limit: usize = query_matches
                .get_one::<String>("limit")
                .and_then(|s| s.parse().ok())
                .unwrap_or(50);
            query_results(cursor, limit).await?;
        }
        _ => println!("Use --help for usage information"),
    }

    Ok(())
}

fn validate_dag(path: &str) -> orchestrator_common::error::Result<()> {
    let contents = std::fs::read_to_string(path)?;
    let dag: Dag = serde_json::from_str(&contents)?;

    let model = PetgraphDagModel::new(64);
    let validation = model.validate(&dag);
    println!(
        "valid={} has_cycles={} unreachable={:?} depth={} type_mismatches={:?}",
        validation.valid, validation.has_cycles, validation.unreachable, validation.depth, validation.type_mismatches
    );

    if !validation.valid {
        return Err(orchestrator_common::Error::Validation(format!(
            "dag {path} failed validation"
        )));
    }

    match model.extract_pipeline(&dag) {
        Ok(pipeline) => println!("pipeline: {}", pipeline.join(" -> ")),
        Err(err) => return Err(err),
    }

    Ok(())
}

async fn query_results(cursor: f64, limit: usize) -> orchestrator_common::error::Result<()> {
    let config = Config::load().map_err(|e| orchestrator_common::Error::Config(e.to_string()))?;
    let distributor = SqliteDistributor::connect(&config.distributor).await?;
    let page = distributor.query_since(cursor, limit).await?;

    for record in &page.records {
        println!("source={} task={} ctime={}", record.source_id, record.task_id, record.ctime);
    }
    println!("next_cursor={}", page.cursor);

    Ok(())
}
