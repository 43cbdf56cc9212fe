//! region-runner: headless region classification and metrics run.
//!
//! Usage:
//!   region-runner --db sites.db --data-dir ./data
//!   region-runner --db sites.db --as-of 2024-06-30 --skip-assign
//!   region-runner --db sites.db --reassign --json

use anyhow::{Context, Result};
use chrono::NaiveDate;
use regionscope_core::{
    config::RegionConfig,
    engine::{RegionEngine, RunOptions, RunReport},
    store::RegionStore,
};
use std::env;

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let db = arg_value(&args, "--db").unwrap_or(":memory:");
    let data_dir = arg_value(&args, "--data-dir").unwrap_or("./data");
    let as_of = match arg_value(&args, "--as-of") {
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .with_context(|| format!("--as-of expects YYYY-MM-DD, got '{raw}'"))?,
        None => chrono::Local::now().date_naive(),
    };
    let options = RunOptions {
        assign:   !has_flag(&args, "--skip-assign"),
        metrics:  !has_flag(&args, "--skip-metrics"),
        reassign: has_flag(&args, "--reassign"),
    };
    let json = has_flag(&args, "--json");

    if !json {
        println!("region-runner");
        println!("  db:        {db}");
        println!("  data_dir:  {data_dir}");
        println!("  as_of:     {as_of}");
        println!();
    }

    let config = RegionConfig::load(data_dir)?;
    let store = RegionStore::open(db)
        .with_context(|| format!("Cannot open database {db}"))?
        .with_row_ceiling(config.store.max_rows_per_request);
    store.migrate()?;

    let run_id = format!("run-{}-{}", as_of.format("%Y%m%d"), unix_secs());
    let engine = RegionEngine::build(run_id.clone(), config, store)?;
    let report = engine.run(as_of, options)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report.metrics)?);
    } else {
        print_summary(&run_id, &report);
    }

    if report.has_failures() {
        for (region, reason) in &report.failed {
            log::error!("region={region} failed: {reason}");
        }
        std::process::exit(1);
    }
    Ok(())
}

fn print_summary(run_id: &str, report: &RunReport) {
    println!("=== RUN SUMMARY ===");
    println!("  run_id:  {run_id}");
    for c in &report.classifications {
        let methods: Vec<String> = c.by_method.iter().map(|(m, n)| format!("{m}={n}")).collect();
        println!(
            "  {:<6} considered {:>6} | assigned {:>6} | unassigned {:>6} | {}",
            c.kind.as_str(),
            c.considered,
            c.assigned,
            c.unassigned,
            methods.join(" ")
        );
    }

    if !report.metrics.is_empty() {
        println!();
        println!("=== REGION METRICS ===");
        for m in &report.metrics {
            let mut flags = Vec::new();
            if m.unclassifiable {
                flags.push("unclassifiable");
            }
            if m.truncation_suspect {
                flags.push("truncation?");
            }
            println!(
                "  {:<28} clubs {:>5} | events {:>5} | active {:>6} | ratio {:>5.2} | pop {:>10} {}",
                m.region_name,
                m.entity_count,
                m.recent_event_count,
                m.active_participant_count,
                m.activity_ratio,
                m.estimated_population,
                flags.join(" ")
            );
        }
    }

    if !report.failed.is_empty() {
        println!();
        println!("=== FAILED REGIONS ===");
        for (region, reason) in &report.failed {
            println!("  {region}: {reason}");
        }
    }
}

fn arg_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

fn unix_secs() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
