use std::collections::BTreeSet;
use std::process::ExitCode;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use fpl_stats::config::AppConfig;
use fpl_stats::fpl_feed::fetch_fpl_players;
use fpl_stats::match_stats::StatCategory;
use fpl_stats::reconcile::reconcile;
use fpl_stats::store::MergeStore;

fn main() -> Result<ExitCode> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let mut cfg = AppConfig::from_env();
    if let Some(season) = parse_value_arg("--season") {
        cfg.season = Some(season);
    }
    cfg.accept_fuzzy = std::env::args().skip(1).any(|arg| arg == "--accept-fuzzy");

    let players = fetch_fpl_players()?;
    let store = MergeStore::open(&cfg.players_dir())?;
    let fbref_names: Vec<String> = store
        .rows(StatCategory::Summary)
        .iter()
        .filter_map(|r| r.field("player"))
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let report = reconcile(&cfg, &players, &fbref_names)?;

    let pct = |count: usize| {
        if report.total == 0 {
            0.0
        } else {
            count as f64 / report.total as f64 * 100.0
        }
    };
    println!("Total players: {}", report.total);
    println!(
        "Already mapped: {}; {:.1}%",
        report.already_mapped,
        pct(report.already_mapped)
    );
    println!("Exact matches: {}; {:.1}%", report.exact, pct(report.exact));
    println!("Manual matches: {}; {:.1}%", report.manual, pct(report.manual));
    println!("Fuzzy matches: {}; {:.1}%", report.fuzzy, pct(report.fuzzy));
    if report.fully_resolved() {
        println!("Resolved table: {}", cfg.fpl_players_file().display());
        return Ok(ExitCode::SUCCESS);
    }

    println!(
        "Missing matches: {}; {:.1}%; {:?}",
        report.unresolved.len(),
        pct(report.unresolved.len()),
        report.unresolved
    );
    println!(
        "Review candidates in {} and rerun with --accept-fuzzy or add manual overrides.",
        cfg.review_file().display()
    );
    Ok(ExitCode::FAILURE)
}

fn parse_value_arg(flag: &str) -> Option<String> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let prefix = format!("{flag}=");
    for (idx, arg) in args.iter().enumerate() {
        if let Some(value) = arg.strip_prefix(&prefix) {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
        if arg == flag
            && let Some(next) = args.get(idx + 1)
            && !next.trim().is_empty()
        {
            return Some(next.trim().to_string());
        }
    }
    None
}
