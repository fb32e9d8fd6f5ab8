use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::SystemTime;

use anyhow::{Context, Result};
use tracing::info;

use crate::config::AppConfig;
use crate::fixtures::{Fixture, load_fixtures};
use crate::fpl_feed::Position;
use crate::match_stats::{StatCategory, StatRow};
use crate::reconcile::{ResolvedPlayer, load_fpl_players};
use crate::store::MergeStore;

/// One priced player's line in one match, the unit every query runs over.
/// Joined from the summary stat table, the fixture table and the resolved
/// player table; players without a price mapping are excluded.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerMatchRow {
    pub player: String,
    pub game_id: String,
    pub team: String,
    pub opponent: String,
    pub gameweek: u32,
    pub home: bool,
    pub position: Position,
    pub fpl_cost: f64,
    pub minutes: f64,
    pub goals: f64,
    pub assists: f64,
    pub shots: f64,
    pub shots_on_target: f64,
    pub xg: f64,
    pub xg_assist: f64,
    pub sca: f64,
    pub gca: f64,
    pub tackles: f64,
    pub interceptions: f64,
    pub blocks: f64,
}

/// One team's attacking and conceded xG in one match, unpivoted so each
/// fixture yields a home-perspective and an away-perspective row.
#[derive(Debug, Clone, PartialEq)]
pub struct TeamMatchRow {
    pub team: String,
    pub gameweek: u32,
    pub xg: f64,
    pub xg_against: f64,
}

pub fn build_player_rows(
    summary: &[StatRow],
    fixtures: &[Fixture],
    players: &[ResolvedPlayer],
) -> Vec<PlayerMatchRow> {
    let fixtures_by_id: HashMap<&str, &Fixture> =
        fixtures.iter().map(|f| (f.game_id.as_str(), f)).collect();
    let players_by_name: HashMap<&str, &ResolvedPlayer> = players
        .iter()
        .map(|p| (p.fbref_name.as_str(), p))
        .collect();

    let mut out = Vec::new();
    for row in summary {
        let Some(player_name) = row.field("player") else {
            continue;
        };
        let Some(player) = players_by_name.get(player_name) else {
            continue;
        };
        let Some(fixture) = fixtures_by_id.get(row.game_id.as_str()) else {
            continue;
        };
        let (team, opponent) = if row.home {
            (fixture.home_team.clone(), fixture.away_team.clone())
        } else {
            (fixture.away_team.clone(), fixture.home_team.clone())
        };
        out.push(PlayerMatchRow {
            player: player_name.to_string(),
            game_id: row.game_id.clone(),
            team,
            opponent,
            gameweek: fixture.gameweek,
            home: row.home,
            position: player.position,
            fpl_cost: player.fpl_cost,
            minutes: num(row, "minutes"),
            goals: num(row, "goals"),
            assists: num(row, "assists"),
            shots: num(row, "shots"),
            shots_on_target: num(row, "shots_on_target"),
            xg: num(row, "xg"),
            xg_assist: num(row, "xg_assist"),
            sca: num(row, "sca"),
            gca: num(row, "gca"),
            tackles: num(row, "tackles"),
            interceptions: num(row, "interceptions"),
            blocks: num(row, "blocks"),
        });
    }
    out
}

pub fn build_team_rows(fixtures: &[Fixture]) -> Vec<TeamMatchRow> {
    let mut out = Vec::new();
    for fixture in fixtures.iter().filter(|f| f.game_played) {
        let (Some(home_xg), Some(away_xg)) = (fixture.home_xg, fixture.away_xg) else {
            continue;
        };
        out.push(TeamMatchRow {
            team: fixture.home_team.clone(),
            gameweek: fixture.gameweek,
            xg: home_xg,
            xg_against: away_xg,
        });
        out.push(TeamMatchRow {
            team: fixture.away_team.clone(),
            gameweek: fixture.gameweek,
            xg: away_xg,
            xg_against: home_xg,
        });
    }
    out
}

/// Column sets drift between source versions, so numeric stats read by name
/// with a zero default.
fn num(row: &StatRow, name: &str) -> f64 {
    row.field(name)
        .and_then(|v| v.trim().parse::<f64>().ok())
        .unwrap_or(0.0)
}

#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub players: Vec<PlayerMatchRow>,
    pub teams: Vec<TeamMatchRow>,
}

impl Dataset {
    pub fn is_empty(&self) -> bool {
        self.players.is_empty() && self.teams.is_empty()
    }
}

/// Identity of the three input files. Two signatures compare equal exactly
/// when none of the files changed size or mtime in between.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSignature(Vec<(u64, Option<SystemTime>)>);

pub fn data_signature(cfg: &AppConfig) -> DataSignature {
    let files = [
        cfg.category_file(StatCategory::Summary),
        cfg.fixture_file(),
        cfg.fpl_players_file(),
    ];
    DataSignature(files.iter().map(|p| file_stamp(p)).collect())
}

fn file_stamp(path: &Path) -> (u64, Option<SystemTime>) {
    match fs::metadata(path) {
        Ok(meta) => (meta.len(), meta.modified().ok()),
        Err(_) => (0, None),
    }
}

pub fn load_dataset(cfg: &AppConfig) -> Result<Dataset> {
    let fixtures = load_fixtures(&cfg.fixture_file()).context("load fixture table")?;
    let players = load_fpl_players(&cfg.fpl_players_file()).context("load resolved players")?;
    let store = MergeStore::open(&cfg.players_dir()).context("open stat store")?;
    let dataset = Dataset {
        players: build_player_rows(store.rows(StatCategory::Summary), &fixtures, &players),
        teams: build_team_rows(&fixtures),
    };
    info!(
        player_rows = dataset.players.len(),
        team_rows = dataset.teams.len(),
        "built joined dataset"
    );
    Ok(dataset)
}

/// Memoized dataset with explicit invalidation: reloaded whenever the input
/// files' signature changes, never on a timer.
#[derive(Debug, Default)]
pub struct DatasetCache {
    cached: Option<(DataSignature, Dataset)>,
}

impl DatasetCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(&mut self, cfg: &AppConfig) -> Result<&Dataset> {
        let signature = data_signature(cfg);
        let stale = match &self.cached {
            Some((held, _)) => *held != signature,
            None => true,
        };
        if stale {
            let dataset = load_dataset(cfg)?;
            self.cached = Some((signature, dataset));
        }
        Ok(&self.cached.as_ref().expect("populated above").1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn fixture(game_id: &str, gameweek: u32, home: &str, away: &str) -> Fixture {
        Fixture {
            game_id: game_id.to_string(),
            gameweek,
            date: "2024-08-17".to_string(),
            home_team: home.to_string(),
            away_team: away.to_string(),
            home_xg: Some(1.5),
            away_xg: Some(0.8),
            score: Some("2-0".to_string()),
            game_played: true,
            match_report_link: None,
        }
    }

    fn summary_row(game_id: &str, home: bool, player: &str, stats: &[(&str, &str)]) -> StatRow {
        let mut fields: BTreeMap<String, String> = stats
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        fields.insert("player".to_string(), player.to_string());
        StatRow {
            game_id: game_id.to_string(),
            home,
            fields,
        }
    }

    fn resolved(name: &str, cost: f64) -> ResolvedPlayer {
        ResolvedPlayer {
            player_code: 1,
            fbref_name: name.to_string(),
            position: Position::Mid,
            fpl_cost: cost,
            fpl_form: None,
            season_ppg: None,
            total_points: 10,
        }
    }

    #[test]
    fn join_resolves_team_and_opponent_from_home_flag() {
        let fixtures = vec![fixture("Ars_Eve_20240817", 1, "Arsenal", "Everton")];
        let players = vec![resolved("Jo Doe", 6.5), resolved("Al Roe", 5.0)];
        let summary = vec![
            summary_row("Ars_Eve_20240817", true, "Jo Doe", &[("goals", "1"), ("minutes", "90")]),
            summary_row("Ars_Eve_20240817", false, "Al Roe", &[("goals", "0")]),
        ];
        let rows = build_player_rows(&summary, &fixtures, &players);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].team, "Arsenal");
        assert_eq!(rows[0].opponent, "Everton");
        assert_eq!(rows[1].team, "Everton");
        assert_eq!(rows[1].opponent, "Arsenal");
        assert_eq!(rows[0].goals, 1.0);
        assert_eq!(rows[0].minutes, 90.0);
        // Column absent from this source version reads as zero.
        assert_eq!(rows[0].sca, 0.0);
    }

    #[test]
    fn join_is_inner_on_priced_players() {
        let fixtures = vec![fixture("Ars_Eve_20240817", 1, "Arsenal", "Everton")];
        let players = vec![resolved("Jo Doe", 6.5)];
        let summary = vec![
            summary_row("Ars_Eve_20240817", true, "Jo Doe", &[]),
            summary_row("Ars_Eve_20240817", true, "Unpriced Youth", &[]),
        ];
        let rows = build_player_rows(&summary, &fixtures, &players);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].player, "Jo Doe");
    }

    #[test]
    fn team_rows_unpivot_both_perspectives() {
        let mut unplayed = fixture("A_B_2", 2, "A", "B");
        unplayed.game_played = false;
        let fixtures = vec![fixture("Ars_Eve_20240817", 1, "Arsenal", "Everton"), unplayed];
        let rows = build_team_rows(&fixtures);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].team, "Arsenal");
        assert_eq!(rows[0].xg, 1.5);
        assert_eq!(rows[0].xg_against, 0.8);
        assert_eq!(rows[1].team, "Everton");
        assert_eq!(rows[1].xg, 0.8);
        assert_eq!(rows[1].xg_against, 1.5);
    }

    #[test]
    fn signature_tracks_file_changes() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = AppConfig {
            data_dir: dir.path().to_path_buf(),
            ..AppConfig::default()
        };
        let before = data_signature(&cfg);
        assert_eq!(before, data_signature(&cfg));

        fs::create_dir_all(cfg.players_dir()).unwrap();
        fs::write(cfg.category_file(StatCategory::Summary), "game_id,home\n").unwrap();
        let after = data_signature(&cfg);
        assert_ne!(before, after);
    }
}
