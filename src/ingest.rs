use std::thread;
use std::time::Duration;

use anyhow::{Result, anyhow};
use rand::Rng;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::fixtures::{Fixture, fetch_fixtures, save_fixtures};
use crate::match_stats::extract_match_stats;
use crate::page::PageFetch;
use crate::store::MergeStore;

#[derive(Debug, Clone, Default)]
pub struct IngestSummary {
    pub fixtures_total: usize,
    pub played: usize,
    pub new_games: usize,
    pub games_processed: usize,
    pub rows_added: usize,
    pub errors: Vec<String>,
}

/// Full pipeline run: refresh the fixture table (wholesale replace), then
/// ingest player stats for played fixtures not yet in the store. A schedule
/// page that yields no fixtures (anti-bot interstitial, markup change) skips
/// the replace so the durable fixture table survives the bad page.
pub fn run_ingest(
    fetch: &dyn PageFetch,
    cfg: &AppConfig,
    league_name: &str,
) -> Result<IngestSummary> {
    let url = cfg
        .schedule_url(league_name)
        .ok_or_else(|| anyhow!("unknown league: {league_name}"))?;
    let fixtures = fetch_fixtures(fetch, cfg, &url)?;
    if fixtures.is_empty() {
        warn!(url, "schedule page yielded no fixtures, keeping existing fixture table");
        return Ok(IngestSummary {
            errors: vec![format!("no fixtures parsed from {url}")],
            ..IngestSummary::default()
        });
    }
    save_fixtures(&cfg.fixture_file(), &fixtures)?;
    ingest_player_stats(fetch, cfg, &fixtures)
}

/// Merge newly played fixtures into the durable per-category tables.
/// An empty work list is a normal no-op. A single fixture's failure is
/// logged and skipped; the loop continues.
pub fn ingest_player_stats(
    fetch: &dyn PageFetch,
    cfg: &AppConfig,
    fixtures: &[Fixture],
) -> Result<IngestSummary> {
    let mut store = MergeStore::open(&cfg.players_dir())?;
    let existing = store.ingested_game_ids();

    let played: Vec<&Fixture> = fixtures.iter().filter(|f| f.game_played).collect();
    let work: Vec<&Fixture> = played
        .iter()
        .copied()
        .filter(|f| !existing.contains(&f.game_id))
        .collect();

    let mut summary = IngestSummary {
        fixtures_total: fixtures.len(),
        played: played.len(),
        new_games: work.len(),
        ..IngestSummary::default()
    };

    if work.is_empty() {
        info!("no new games to process");
        return Ok(summary);
    }
    info!(new_games = work.len(), "found new games to process");

    for (count, fixture) in work.iter().enumerate() {
        pace(cfg);
        let Some(link) = fixture.match_report_link.as_deref() else {
            warn!(game_id = %fixture.game_id, "played fixture has no match report link");
            summary
                .errors
                .push(format!("{}: missing match report link", fixture.game_id));
            continue;
        };
        info!(
            game_id = %fixture.game_id,
            progress = format!("{}/{}", count + 1, work.len()),
            link,
            "processing match"
        );

        let tables = match fetch.fetch_tables(link) {
            Ok(tables) => tables,
            Err(err) => {
                warn!(game_id = %fixture.game_id, %err, "match fetch failed, skipping");
                summary.errors.push(format!("{}: {err}", fixture.game_id));
                continue;
            }
        };

        let mut added_for_fixture = 0usize;
        for (category, rows) in extract_match_stats(&tables, &fixture.game_id) {
            let (removed, added) = store.replace_fixture(category, &fixture.game_id, rows);
            if removed > 0 {
                info!(
                    game_id = %fixture.game_id,
                    category = category.as_str(),
                    removed,
                    "replaced stale rows"
                );
            }
            added_for_fixture += added;
        }

        // Fixture-granularity checkpoint: a crash loses only the fixture in
        // flight.
        store.persist()?;
        summary.games_processed += 1;
        summary.rows_added += added_for_fixture;
    }

    Ok(summary)
}

/// Bounded uniform random sleep between fetches, a deliberate throttle
/// against upstream rate limiting. Disabled when the configured maximum is
/// zero.
fn pace(cfg: &AppConfig) {
    if cfg.max_delay_secs <= 0.0 {
        return;
    }
    let min = cfg.min_delay_secs.clamp(0.0, cfg.max_delay_secs);
    let secs = rand::thread_rng().gen_range(min..=cfg.max_delay_secs);
    thread::sleep(Duration::from_secs_f64(secs));
}
