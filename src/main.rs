//! CLI harness (§6): `<prog> <cores> <time_ms> [<test_index>]`.
//!
//! Runs a fixed-duration search against one of the deterministic fixture
//! boards in [`nana_mcts::fixtures`] and prints the stats the reference
//! benchmark prints: node count, throughput, and tree depth.

use std::time::Duration;

use anyhow::{bail, Context, Result};

use nana_mcts::fixtures::ShimGame;
use nana_mcts::{Controller, SearchStyle};

struct Args {
    cores: usize,
    time_ms: u64,
    test_index: usize,
    print_strength: bool,
}

fn parse_args() -> Result<Args> {
    let argv: Vec<String> = std::env::args().collect();

    if argv.len() < 3 {
        bail!("Usage: {} <cores> <time_ms> [<test_index>]", argv.first().map(String::as_str).unwrap_or("nana-mcts"));
    }

    let cores: usize = argv[1].parse().context("<cores> must be a positive integer")?;
    let time_ms: u64 = argv[2].parse().context("<time_ms> must be a non-negative integer")?;
    if cores == 0 {
        bail!("<cores> must be at least 1");
    }

    let test_index: usize = match argv.get(3) {
        Some(s) => s.parse().context("<test_index> must be an integer")?,
        None => 0,
    };

    Ok(Args { cores, time_ms, test_index, print_strength: true })
}

fn run(args: Args) -> Result<()> {
    let root = ShimGame::test_case(args.test_index);

    let available = num_cpus::get();
    if args.cores > available {
        log::warn!("requested {} cores but only {} are available; oversubscribing", args.cores, available);
    }

    let mut controller: Controller<ShimGame> = Controller::new(SearchStyle::Nana);

    log::info!("starting search: cores={} time_ms={} test_index={}", args.cores, args.time_ms, args.test_index);
    controller.start_search(root, args.cores);

    std::thread::sleep(Duration::from_millis(args.time_ms));

    controller.end_search();
    log::info!("search ended");

    let stats = controller.statistics();
    println!("nodes: {}", stats.nodes);
    println!("nodes / second: {:.2}", stats.nodes_per_sec);
    println!("backprops / second: {:.2}", stats.backprops_per_sec);
    println!("tree depth: {}", stats.max_depth);

    if args.print_strength {
        println!("{:.4}", controller.best_reward());
    }

    Ok(())
}

fn main() {
    env_logger::init();

    let args = match parse_args() {
        Ok(args) => args,
        Err(err) => {
            eprintln!("{err:#}");
            std::process::exit(1);
        }
    };

    if let Err(err) = run(args) {
        eprintln!("{err:#}");
        std::process::exit(1);
    }
}
