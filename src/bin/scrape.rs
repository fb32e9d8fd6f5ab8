use anyhow::{Result, anyhow};
use tracing_subscriber::EnvFilter;

use fpl_stats::config::{AppConfig, LEAGUES, PlayedPolicy};
use fpl_stats::ingest::run_ingest;
use fpl_stats::page::HttpPageFetch;

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let mut cfg = AppConfig::from_env();
    if let Some(season) = parse_value_arg("--season") {
        cfg.season = Some(season);
    }
    if let Some(raw) = parse_value_arg("--policy") {
        cfg.played_policy = PlayedPolicy::parse(&raw)
            .ok_or_else(|| anyhow!("unknown played policy: {raw} (expected link or score)"))?;
    }
    let league = parse_value_arg("--league").unwrap_or_else(|| "Premier League".to_string());
    if !LEAGUES.iter().any(|(name, _, _)| *name == league) {
        let known = LEAGUES
            .iter()
            .map(|(name, _, _)| *name)
            .collect::<Vec<_>>()
            .join(", ");
        return Err(anyhow!("unknown league: {league} (known: {known})"));
    }

    let fetch = HttpPageFetch;
    let summary = run_ingest(&fetch, &cfg, &league)?;

    println!("Scrape complete: {league}");
    println!("Fixtures: {} ({} played)", summary.fixtures_total, summary.played);
    println!(
        "New games: {} (processed {}, rows added {})",
        summary.new_games, summary.games_processed, summary.rows_added
    );
    if !summary.errors.is_empty() {
        println!("Errors: {}", summary.errors.len());
        for err in summary.errors.iter().take(6) {
            println!(" - {err}");
        }
    }
    Ok(())
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
