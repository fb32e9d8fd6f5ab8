use anyhow::{Result, anyhow};
use tracing_subscriber::EnvFilter;

use fpl_stats::config::AppConfig;
use fpl_stats::dataset::DatasetCache;
use fpl_stats::fpl_feed::Position;
use fpl_stats::metrics::{Metric, QuerySpec, top_players, top_teams_xg_against};

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .init();

    let mut cfg = AppConfig::from_env();
    if let Some(season) = parse_value_arg("--season") {
        cfg.season = Some(season);
    }
    let spec = build_spec()?;
    let entity = parse_value_arg("--entity").unwrap_or_else(|| "players".to_string());

    let mut cache = DatasetCache::new();
    let dataset = cache.load(&cfg)?;
    if dataset.is_empty() {
        println!("No data yet. Run `scrape` and `fpl_players` first.");
        return Ok(());
    }

    match entity.as_str() {
        "players" => {
            let result = top_players(&dataset.players, &spec);
            print_result(&result, spec.metric.label(), true);
        }
        "teams" => {
            let result = top_teams_xg_against(&dataset.teams, &spec);
            print_result(&result, "xG conceded", false);
        }
        other => return Err(anyhow!("unknown entity: {other} (expected players or teams)")),
    }
    Ok(())
}

fn build_spec() -> Result<QuerySpec> {
    let metric = match parse_value_arg("--metric") {
        Some(raw) => Metric::parse(&raw).ok_or_else(|| {
            let known = Metric::ALL
                .iter()
                .map(|m| m.token())
                .collect::<Vec<_>>()
                .join(", ");
            anyhow!("unknown metric: {raw} (known: {known})")
        })?,
        None => Metric::default(),
    };
    let position = match parse_value_arg("--position") {
        Some(raw) => Some(
            Position::parse(&raw)
                .ok_or_else(|| anyhow!("unknown position: {raw} (expected GK/DEF/MID/FWD)"))?,
        ),
        None => None,
    };
    Ok(QuerySpec {
        metric,
        top_n: parse_value_arg("--top")
            .and_then(|v| v.parse().ok())
            .unwrap_or(10),
        last_n_weeks: parse_value_arg("--weeks").and_then(|v| v.parse().ok()),
        position,
        max_price: parse_value_arg("--max-price").and_then(|v| v.parse().ok()),
        team: parse_value_arg("--team"),
    })
}

fn print_result(result: &fpl_stats::metrics::QueryResult, label: &str, with_per90: bool) {
    if result.entries.is_empty() {
        println!("No rows matched the query.");
        return;
    }
    if let Some(start) = result.window_start {
        println!("{label}, from gameweek {start}:");
    } else {
        println!("{label}, full season:");
    }
    for (rank, entry) in result.entries.iter().enumerate() {
        let per90 = match (with_per90, entry.per90) {
            (true, Some(rate)) => format!("  per90 {rate:.2}"),
            (true, None) => "  per90 n/a".to_string(),
            (false, _) => String::new(),
        };
        println!(
            "{:>2}. {:<24} total {:>6.2}  mean {:>5.2}  best {:>5.2}{per90}",
            rank + 1,
            entry.name,
            entry.total,
            entry.mean,
            entry.best,
        );
        let series = entry
            .series
            .iter()
            .map(|p| format!("gw{} {:.2} (cum {:.2})", p.gameweek, p.value, p.cumulative))
            .collect::<Vec<_>>()
            .join(", ");
        println!("    {series}");
    }
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
