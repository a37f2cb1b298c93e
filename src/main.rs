//! Minimal demonstration binary for `gracore`'s `launch` harness.
//!
//! A graph-algorithm CLI, timing/benchmark reporting, and DOT/file I/O
//! are explicitly out of scope for this crate (spec.md §1); this binary
//! exists only to give `launch` a real entry point, the way the teacher
//! wires `tracing_subscriber` in a binary crate even though its library
//! crate does not. It runs a single self-contained demo — incrementing
//! every element of an array in parallel (spec.md §8's S1 scenario) —
//! under whatever policy `--policy` names.

use std::env;
use std::process;
use std::sync::atomic::{AtomicI64, Ordering};

use gracore::policy::Policy;
use gracore::{launch, parallel_for};

const DEMO_LEN: usize = 1_000_000;

fn print_usage() {
    eprintln!("gracore demo");
    eprintln!();
    eprintln!("USAGE:");
    eprintln!("    gracore [proc=N] [kappa_usec=N] [estimator_init=N] [--sequential_baseline] [--sequential_elision] [--policy NAME]");
    eprintln!();
    eprintln!("    NAME is one of: by_force_parallel, by_force_sequential,");
    eprintln!("    by_cutoff_without_reporting, by_cutoff_with_reporting, by_prediction");
    eprintln!("    (default: by_prediction).");
}

fn main() {
    tracing_subscriber::fmt::init();

    let mut args: Vec<String> = env::args().skip(1).collect();
    if args.iter().any(|a| a == "-h" || a == "--help") {
        print_usage();
        return;
    }

    let mut policy_name = "by_prediction".to_string();
    if let Some(idx) = args.iter().position(|a| a == "--policy") {
        let Some(name) = args.get(idx + 1).cloned() else {
            eprintln!("gracore: --policy requires a value");
            print_usage();
            process::exit(1);
        };
        policy_name = name;
        args.drain(idx..=idx + 1);
    }

    let policy = Policy::by_cmdline("demo");
    if let Policy::ByCmdline(ref by_cmdline) = policy {
        if let Err(err) = by_cmdline.set(&policy_name) {
            gracore::error::fatal_config(&err);
        }
    }

    launch(
        &args,
        || {
            if let Some(init_cst) = gracore::config::estimator_init_seed() {
                policy.initialize(init_cst);
            }
            vec![AtomicI64::new(0); DEMO_LEN]
        },
        |data, _sequential_flag| {
            parallel_for(&policy, 0, DEMO_LEN as i64, |i| {
                data[i as usize].fetch_add(1, Ordering::Relaxed);
            });
        },
        |data| {
            let first = data[0].load(Ordering::Relaxed);
            let uniform = data.iter().all(|c| c.load(Ordering::Relaxed) == first);
            println!(
                "gracore demo: {DEMO_LEN} elements, every element incremented the same number of times ({first}): {uniform}"
            );
        },
        |_data| {},
    );
}
