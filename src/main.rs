use affinity_graph::cli::{Cli, OutputFormat};
use affinity_graph::graph::SnapshotEdge;
use affinity_graph::stats::StatsSnapshot;
use affinity_graph::workload::Workload;
use affinity_graph::AffinityGraphBuilder;
use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber for debug output
fn init_tracing(debug: bool) {
    if debug {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::from_default_env().add_directive(tracing::Level::TRACE.into()),
            )
            .with_writer(std::io::stderr)
            .init();
    }
}

#[derive(Debug, Serialize)]
struct Report {
    seed: u64,
    tasks: usize,
    ticks: u64,
    expired_ticks: u64,
    cohesion: f64,
    stats: StatsSnapshot,
    heaviest_edges: Vec<SnapshotEdge>,
}

/// Feed the workload through the builder, ticking the pruner by hand
fn simulate(cli: &Cli) -> Result<Report> {
    let config = cli
        .affinity_config()
        .context("Invalid builder configuration")?;
    let mut workload =
        Workload::new(cli.workload_config(), cli.seed).context("Invalid workload parameters")?;
    let builder = AffinityGraphBuilder::new(config).context("Failed to start graph builder")?;

    let tasks_per_tick = cli.tasks_per_tick.max(1);
    let mut ticks = 0;
    let mut expired_ticks = 0;
    for n in 1..=cli.tasks {
        let task = workload.next_task();
        builder.update_graph(&task.owner, &task.objects)?;
        if let Some((object, node)) = workload.next_conflict(&task.objects) {
            builder.note_conflict_detected(Some(object), node, false)?;
        }

        if n % tasks_per_tick == 0 {
            let outcome = builder.prune_now()?;
            ticks += 1;
            if outcome.expired() {
                expired_ticks += 1;
            }
        }
    }

    let graph = builder.affinity_graph();
    let report = Report {
        seed: cli.seed,
        tasks: cli.tasks,
        ticks,
        expired_ticks,
        cohesion: workload.cohesion(&graph),
        stats: builder.stats(),
        heaviest_edges: graph.heaviest_edges(cli.top),
    };
    builder.shutdown();
    Ok(report)
}

fn print_text(report: &Report) {
    println!("=== Affinity Graph Simulation ===");
    println!(
        "seed {}, {} tasks, {} prune ticks ({} expired a period)",
        report.seed, report.tasks, report.ticks, report.expired_ticks
    );
    println!("community cohesion: {:.3}", report.cohesion);
    println!();
    report.stats.print_summary();

    if !report.heaviest_edges.is_empty() {
        println!();
        println!("Heaviest edges:");
        println!("─────────────────────────────────────────");
        for edge in &report.heaviest_edges {
            println!("{:>8}  {} <-> {}", edge.weight, edge.a, edge.b);
        }
    }
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.debug);

    let report = simulate(&args)?;
    match args.format {
        OutputFormat::Text => print_text(&report),
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&report)
                .context("Failed to serialize simulation report")?;
            println!("{}", json);
        }
    }
    Ok(())
}
