use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::{AppConfig, PlayedPolicy};
use crate::page::{PageFetch, RawRow, RawTable};

/// One scheduled or played match, normalized from a schedule-page row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Fixture {
    pub game_id: String,
    pub gameweek: u32,
    pub date: String,
    pub home_team: String,
    pub away_team: String,
    pub home_xg: Option<f64>,
    pub away_xg: Option<f64>,
    pub score: Option<String>,
    pub game_played: bool,
    pub match_report_link: Option<String>,
}

/// Deterministic identifier for a physical match: whitespace-stripped team
/// names joined with the dash-stripped date. Stable across repeated scrapes.
pub fn fixture_game_id(home: &str, away: &str, date: &str) -> String {
    format!(
        "{}_{}_{}",
        home.replace(' ', ""),
        away.replace(' ', ""),
        date.replace('-', "")
    )
}

/// Convert raw schedule rows into canonical fixtures. Rows without a numeric
/// gameweek are header/footer noise and are dropped.
pub fn normalize_fixtures(rows: &[RawRow], base_url: &str, policy: PlayedPolicy) -> Vec<Fixture> {
    let mut out = Vec::new();
    for row in rows {
        let Some(gameweek) = row.get("gameweek").and_then(|v| v.trim().parse::<u32>().ok())
        else {
            continue;
        };
        let home_team = row.get("home_team").unwrap_or_default().trim().to_string();
        let away_team = row.get("away_team").unwrap_or_default().trim().to_string();
        let date = row.get("date").unwrap_or_default().trim().to_string();
        if home_team.is_empty() || away_team.is_empty() {
            continue;
        }

        let match_report_link = row
            .link("match_report")
            .map(|href| absolute_url(base_url, href));
        let score = row
            .get("score")
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        let game_played = match policy {
            PlayedPolicy::MatchReportLink => match_report_link
                .as_deref()
                .is_some_and(|link| is_match_report_url(base_url, link)),
            PlayedPolicy::ScorePresent => score.is_some(),
        };

        out.push(Fixture {
            game_id: fixture_game_id(&home_team, &away_team, &date),
            gameweek,
            home_xg: parse_f64(row.get("home_xg")),
            away_xg: parse_f64(row.get("away_xg")),
            score,
            game_played,
            match_report_link,
            date,
            home_team,
            away_team,
        });
    }
    out
}

/// Fetch and normalize the fixture list. A failed fetch is an error (nothing
/// downstream can proceed without it); a missing or unidentifiable schedule
/// table is logged and yields an empty list. Only a table whose id marks it
/// as the schedule is accepted, never a guess.
pub fn fetch_fixtures(fetch: &dyn PageFetch, cfg: &AppConfig, url: &str) -> Result<Vec<Fixture>> {
    info!(url, "fetching fixture list");
    let tables = fetch.fetch_tables(url)?;
    let Some(table) = schedule_table(&tables) else {
        warn!(url, "no schedule table found on fixtures page");
        return Ok(Vec::new());
    };
    let fixtures = normalize_fixtures(&table.rows, &cfg.base_url, cfg.played_policy);
    info!(count = fixtures.len(), "normalized fixtures");
    Ok(fixtures)
}

fn schedule_table<'a>(tables: &'a [RawTable]) -> Option<&'a RawTable> {
    tables.iter().find(|t| t.id.contains("sched"))
}

/// The fixture table is replaced wholesale on every scrape.
pub fn save_fixtures(path: &Path, fixtures: &[Fixture]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create data dir {}", parent.display()))?;
    }
    let mut writer = csv::Writer::from_writer(Vec::new());
    for fixture in fixtures {
        writer.serialize(fixture).context("serialize fixture row")?;
    }
    let bytes = writer.into_inner().context("flush fixture csv")?;
    let tmp = path.with_extension("csv.tmp");
    fs::write(&tmp, bytes).context("write fixture csv")?;
    fs::rename(&tmp, path).context("swap fixture csv")?;
    Ok(())
}

/// Absent file reads as "no data yet", not an error.
pub fn load_fixtures(path: &Path) -> Result<Vec<Fixture>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("open fixture csv {}", path.display()))?;
    let mut out = Vec::new();
    for row in reader.deserialize::<Fixture>() {
        out.push(row.context("decode fixture row")?);
    }
    Ok(out)
}

fn absolute_url(base_url: &str, href: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        href.to_string()
    } else {
        format!("{base_url}{href}")
    }
}

fn is_match_report_url(base_url: &str, link: &str) -> bool {
    link.starts_with(&format!("{base_url}/en/matches/"))
}

fn parse_f64(raw: Option<&str>) -> Option<f64> {
    raw.and_then(|v| v.trim().parse::<f64>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::RawCell;

    fn cell(field: &str, text: &str) -> RawCell {
        RawCell {
            field: field.to_string(),
            text: text.to_string(),
            link: None,
        }
    }

    fn schedule_row(gameweek: &str, home: &str, away: &str, score: &str, link: Option<&str>) -> RawRow {
        let mut cells = vec![
            cell("gameweek", gameweek),
            cell("date", "2024-08-17"),
            cell("home_team", home),
            cell("away_team", away),
            cell("score", score),
            cell("home_xg", "1.4"),
            cell("away_xg", "0.9"),
        ];
        cells.push(RawCell {
            field: "match_report".to_string(),
            text: if link.is_some() {
                "Match Report".to_string()
            } else {
                String::new()
            },
            link: link.map(str::to_string),
        });
        RawRow { cells }
    }

    #[test]
    fn game_id_is_deterministic_and_distinct() {
        let a = fixture_game_id("Aston Villa", "West Ham", "2024-08-17");
        let b = fixture_game_id("Aston Villa", "West Ham", "2024-08-17");
        let c = fixture_game_id("West Ham", "Aston Villa", "2024-08-17");
        assert_eq!(a, "AstonVilla_WestHam_20240817");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn drops_rows_without_numeric_gameweek() {
        let rows = vec![
            schedule_row("Wk", "Arsenal", "Everton", "", None),
            schedule_row("3", "Arsenal", "Everton", "2-0", Some("/en/matches/abc/x")),
        ];
        let fixtures = normalize_fixtures(&rows, "https://fbref.com", PlayedPolicy::MatchReportLink);
        assert_eq!(fixtures.len(), 1);
        assert_eq!(fixtures[0].gameweek, 3);
        assert_eq!(fixtures[0].home_xg, Some(1.4));
    }

    #[test]
    fn played_policies_disagree_on_score_without_report() {
        // Score text present but no match-report page yet.
        let rows = vec![schedule_row("5", "Fulham", "Brentford", "1-1", None)];
        let by_link = normalize_fixtures(&rows, "https://fbref.com", PlayedPolicy::MatchReportLink);
        let by_score = normalize_fixtures(&rows, "https://fbref.com", PlayedPolicy::ScorePresent);
        assert!(!by_link[0].game_played);
        assert!(by_score[0].game_played);
    }

    #[test]
    fn report_link_must_point_at_a_match_page() {
        let rows = vec![schedule_row("5", "Fulham", "Brentford", "", Some("/en/stathead/x"))];
        let fixtures = normalize_fixtures(&rows, "https://fbref.com", PlayedPolicy::MatchReportLink);
        assert!(!fixtures[0].game_played);
        assert_eq!(
            fixtures[0].match_report_link.as_deref(),
            Some("https://fbref.com/en/stathead/x")
        );
    }

    #[test]
    fn fixture_csv_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fixture_data.csv");
        let rows = vec![schedule_row("3", "Arsenal", "Everton", "2-0", Some("/en/matches/abc/x"))];
        let fixtures = normalize_fixtures(&rows, "https://fbref.com", PlayedPolicy::MatchReportLink);
        save_fixtures(&path, &fixtures).unwrap();
        let loaded = load_fixtures(&path).unwrap();
        assert_eq!(loaded, fixtures);
        // Wholesale replace, not append.
        save_fixtures(&path, &fixtures).unwrap();
        assert_eq!(load_fixtures(&path).unwrap().len(), 1);
    }

    #[test]
    fn missing_fixture_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_fixtures(&dir.path().join("nope.csv")).unwrap().is_empty());
    }
}
