//! Run a perturbation sweep on a local GraphML file and print the JSON result.

use clap::Parser;
use netsweep::graph::Graph;
use netsweep::sweep::{sweep, SweepParams};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "netsweep-cli", about = "ASP degradation under node removal")]
struct Args {
    /// GraphML file to analyze
    graphml: PathBuf,

    /// Largest fraction of nodes to remove, in (0, 1]
    #[arg(long, default_value_t = 1.0)]
    remove_max: f64,

    /// Trials per removal count (ignored for outdegree)
    #[arg(long, default_value_t = 1)]
    repeats: usize,

    /// Step between removal counts
    #[arg(long, default_value_t = 1)]
    granularity: usize,

    /// Selection method: random or outdegree
    #[arg(long, default_value = "random")]
    method: String,

    /// Seed for random selection
    #[arg(long)]
    seed: Option<u64>,

    /// Pretty-print the JSON output
    #[arg(long)]
    pretty: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    if !(args.remove_max > 0.0 && args.remove_max <= 1.0) {
        return Err("--remove-max must be in (0, 1]".into());
    }

    let text = std::fs::read_to_string(&args.graphml)?;
    let graph = Graph::parse_graphml(&text)?;

    let mut params = SweepParams::new(args.remove_max, args.repeats, args.granularity, &args.method)?;
    if let Some(seed) = args.seed {
        params = params.with_seed(seed);
    }

    let result = sweep(&graph, &params)?;
    let json = if args.pretty {
        serde_json::to_string_pretty(&result)?
    } else {
        serde_json::to_string(&result)?
    };
    println!("{}", json);

    Ok(())
}
