use std::collections::HashMap;

use crate::dataset::{PlayerMatchRow, TeamMatchRow};
use crate::fpl_feed::Position;

/// The queryable per-match metrics. Compound ones are derived on read, never
/// stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Goals,
    Assists,
    Xg,
    XgAssist,
    Xgi,
    Shots,
    ShotsOnTarget,
    Sca,
    Gca,
    DefensiveContributions,
}

impl Metric {
    pub const ALL: [Metric; 10] = [
        Metric::Goals,
        Metric::Assists,
        Metric::Xg,
        Metric::XgAssist,
        Metric::Xgi,
        Metric::Shots,
        Metric::ShotsOnTarget,
        Metric::Sca,
        Metric::Gca,
        Metric::DefensiveContributions,
    ];

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "goals" | "gls" => Some(Metric::Goals),
            "assists" | "ast" => Some(Metric::Assists),
            "xg" => Some(Metric::Xg),
            "xag" | "xg_assist" => Some(Metric::XgAssist),
            "xgi" => Some(Metric::Xgi),
            "shots" | "sh" => Some(Metric::Shots),
            "sot" | "shots_on_target" => Some(Metric::ShotsOnTarget),
            "sca" => Some(Metric::Sca),
            "gca" => Some(Metric::Gca),
            "dc" | "defcon" | "defensive_contributions" => Some(Metric::DefensiveContributions),
            _ => None,
        }
    }

    /// Canonical command-line token, always accepted by [`Metric::parse`].
    pub fn token(self) -> &'static str {
        match self {
            Metric::Goals => "goals",
            Metric::Assists => "assists",
            Metric::Xg => "xg",
            Metric::XgAssist => "xag",
            Metric::Xgi => "xgi",
            Metric::Shots => "shots",
            Metric::ShotsOnTarget => "sot",
            Metric::Sca => "sca",
            Metric::Gca => "gca",
            Metric::DefensiveContributions => "dc",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Metric::Goals => "Gls",
            Metric::Assists => "Ast",
            Metric::Xg => "xG",
            Metric::XgAssist => "xAG",
            Metric::Xgi => "xGI",
            Metric::Shots => "Sh",
            Metric::ShotsOnTarget => "SoT",
            Metric::Sca => "SCA",
            Metric::Gca => "GCA",
            Metric::DefensiveContributions => "Defensive Contributions",
        }
    }

    pub fn value(self, row: &PlayerMatchRow) -> f64 {
        match self {
            Metric::Goals => row.goals,
            Metric::Assists => row.assists,
            Metric::Xg => row.xg,
            Metric::XgAssist => row.xg_assist,
            Metric::Xgi => row.xg + row.xg_assist,
            Metric::Shots => row.shots,
            Metric::ShotsOnTarget => row.shots_on_target,
            Metric::Sca => row.sca,
            Metric::Gca => row.gca,
            Metric::DefensiveContributions => row.tackles + row.interceptions + row.blocks,
        }
    }
}

/// Per-90 rate. Undefined without minutes on the pitch.
pub fn per90(total: f64, minutes: f64) -> Option<f64> {
    if minutes <= 0.0 {
        return None;
    }
    Some(total / minutes * 90.0)
}

pub fn goal_involvement(goals: f64, assists: f64) -> f64 {
    goals + assists
}

/// Positive means finishing above the chance quality, negative below it.
pub fn xg_overperformance(goals: f64, xg: f64) -> f64 {
    goals - xg
}

/// Goals per shot as a percentage, one decimal. Undefined without shots.
pub fn shot_conversion(goals: f64, shots: f64) -> Option<f64> {
    if shots <= 0.0 {
        return None;
    }
    Some((goals / shots * 1000.0).round() / 10.0)
}

impl Default for Metric {
    fn default() -> Self {
        Metric::Xgi
    }
}

#[derive(Debug, Clone, Default)]
pub struct QuerySpec {
    pub metric: Metric,
    pub top_n: usize,
    /// Restrict to the most recent n gameweeks; None means the whole season.
    pub last_n_weeks: Option<u32>,
    pub position: Option<Position>,
    pub max_price: Option<f64>,
    pub team: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SeriesPoint {
    pub gameweek: u32,
    pub value: f64,
    /// Running sum restarting from zero at the window start.
    pub cumulative: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EntitySummary {
    pub name: String,
    pub total: f64,
    pub mean: f64,
    pub best: f64,
    pub per90: Option<f64>,
    pub series: Vec<SeriesPoint>,
}

#[derive(Debug, Clone)]
pub struct QueryResult {
    pub metric: Metric,
    /// First gameweek inside the window, when any rows matched.
    pub window_start: Option<u32>,
    pub entries: Vec<EntitySummary>,
}

/// Rank players by the windowed metric sum. The window keeps gameweeks
/// strictly above `max_gw - n`. Ranking sort is stable, so equal totals keep
/// first-encountered order and top-n cuts are deterministic.
pub fn top_players(rows: &[PlayerMatchRow], spec: &QuerySpec) -> QueryResult {
    let filtered: Vec<&PlayerMatchRow> = rows
        .iter()
        .filter(|r| spec.position.is_none_or(|p| r.position == p))
        .filter(|r| spec.max_price.is_none_or(|max| r.fpl_cost <= max))
        .filter(|r| spec.team.as_deref().is_none_or(|t| r.team == t))
        .collect();

    let windowed = window(&filtered, spec.last_n_weeks, |r| r.gameweek);
    let window_start = windowed.iter().map(|r| r.gameweek).min();

    let mut order: Vec<String> = Vec::new();
    let mut per_player: HashMap<String, Vec<(u32, f64)>> = HashMap::new();
    let mut minutes: HashMap<String, f64> = HashMap::new();
    for row in &windowed {
        let value = spec.metric.value(row);
        if !per_player.contains_key(&row.player) {
            order.push(row.player.clone());
        }
        per_player
            .entry(row.player.clone())
            .or_default()
            .push((row.gameweek, value));
        *minutes.entry(row.player.clone()).or_default() += row.minutes;
    }

    let entries = rank(order, per_player, spec.top_n, |name, total| {
        per90(total, minutes.get(name).copied().unwrap_or(0.0))
    });
    QueryResult {
        metric: spec.metric,
        window_start,
        entries,
    }
}

/// Same ranking shape over xG conceded per team. Per-90 is meaningless for a
/// team view and stays empty.
pub fn top_teams_xg_against(rows: &[TeamMatchRow], spec: &QuerySpec) -> QueryResult {
    let refs: Vec<&TeamMatchRow> = rows.iter().collect();
    let windowed = window(&refs, spec.last_n_weeks, |r| r.gameweek);
    let window_start = windowed.iter().map(|r| r.gameweek).min();

    let mut order: Vec<String> = Vec::new();
    let mut per_team: HashMap<String, Vec<(u32, f64)>> = HashMap::new();
    for row in &windowed {
        if !per_team.contains_key(&row.team) {
            order.push(row.team.clone());
        }
        per_team
            .entry(row.team.clone())
            .or_default()
            .push((row.gameweek, row.xg_against));
    }

    let entries = rank(order, per_team, spec.top_n, |_, _| None);
    QueryResult {
        metric: spec.metric,
        window_start,
        entries,
    }
}

fn window<'a, T>(rows: &[&'a T], last_n_weeks: Option<u32>, gameweek: impl Fn(&T) -> u32) -> Vec<&'a T> {
    let Some(n) = last_n_weeks else {
        return rows.to_vec();
    };
    let Some(max_gw) = rows.iter().map(|r| gameweek(*r)).max() else {
        return Vec::new();
    };
    let cutoff = max_gw.saturating_sub(n);
    rows.iter()
        .copied()
        .filter(|r| gameweek(*r) > cutoff)
        .collect()
}

fn rank(
    order: Vec<String>,
    per_entity: HashMap<String, Vec<(u32, f64)>>,
    top_n: usize,
    per90_of: impl Fn(&str, f64) -> Option<f64>,
) -> Vec<EntitySummary> {
    let mut entries: Vec<EntitySummary> = order
        .into_iter()
        .map(|name| {
            let values = &per_entity[&name];
            let total: f64 = values.iter().map(|(_, v)| v).sum();
            let best = values.iter().map(|(_, v)| *v).fold(0.0, f64::max);
            let mean = total / values.len() as f64;
            let per90 = per90_of(&name, total);
            let series = cumulative_series(values);
            EntitySummary {
                name,
                total,
                mean,
                best,
                per90,
                series,
            }
        })
        .collect();
    entries.sort_by(|a, b| {
        b.total
            .partial_cmp(&a.total)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    entries.truncate(top_n);
    entries
}

fn cumulative_series(values: &[(u32, f64)]) -> Vec<SeriesPoint> {
    let mut per_week: Vec<(u32, f64)> = Vec::new();
    for (gameweek, value) in values {
        match per_week.iter_mut().find(|(gw, _)| gw == gameweek) {
            Some((_, held)) => *held += value,
            None => per_week.push((*gameweek, *value)),
        }
    }
    per_week.sort_by_key(|(gw, _)| *gw);
    let mut running = 0.0;
    per_week
        .into_iter()
        .map(|(gameweek, value)| {
            running += value;
            SeriesPoint {
                gameweek,
                value,
                cumulative: running,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(player: &str, gameweek: u32, goals: f64, minutes: f64) -> PlayerMatchRow {
        PlayerMatchRow {
            player: player.to_string(),
            game_id: format!("g{gameweek}"),
            team: "Arsenal".to_string(),
            opponent: "Everton".to_string(),
            gameweek,
            home: true,
            position: Position::Mid,
            fpl_cost: 6.0,
            minutes,
            goals,
            assists: 0.0,
            shots: 0.0,
            shots_on_target: 0.0,
            xg: 0.0,
            xg_assist: 0.0,
            sca: 0.0,
            gca: 0.0,
            tackles: 1.0,
            interceptions: 1.0,
            blocks: 1.0,
        }
    }

    #[test]
    fn per90_guards_zero_minutes() {
        assert_eq!(per90(3.0, 0.0), None);
        assert_eq!(per90(2.0, 180.0), Some(1.0));
    }

    #[test]
    fn shot_conversion_guards_zero_shots_and_rounds() {
        assert_eq!(shot_conversion(2.0, 0.0), None);
        assert_eq!(shot_conversion(1.0, 3.0), Some(33.3));
    }

    #[test]
    fn involvement_and_overperformance_are_plain_sums() {
        assert_eq!(goal_involvement(2.0, 1.0), 3.0);
        assert!((xg_overperformance(3.0, 1.8) - 1.2).abs() < 1e-9);
        assert!(xg_overperformance(0.0, 0.6) < 0.0);
    }

    #[test]
    fn every_metric_token_parses_back() {
        for metric in Metric::ALL {
            assert_eq!(Metric::parse(metric.token()), Some(metric));
        }
    }

    #[test]
    fn defensive_contributions_sum_three_columns() {
        let r = row("A", 1, 0.0, 90.0);
        assert_eq!(Metric::DefensiveContributions.value(&r), 3.0);
    }

    #[test]
    fn top_n_ties_keep_first_encountered_order() {
        let rows = vec![
            row("A", 1, 10.0, 90.0),
            row("B", 1, 10.0, 90.0),
            row("C", 1, 7.0, 90.0),
        ];
        let spec = QuerySpec {
            metric: Metric::Goals,
            top_n: 2,
            ..QuerySpec::default()
        };
        let result = top_players(&rows, &spec);
        let names: Vec<&str> = result.entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["A", "B"]);
    }

    #[test]
    fn window_keeps_strictly_recent_gameweeks() {
        let rows = vec![
            row("A", 1, 5.0, 90.0),
            row("A", 2, 1.0, 90.0),
            row("A", 3, 2.0, 90.0),
        ];
        let spec = QuerySpec {
            metric: Metric::Goals,
            top_n: 5,
            last_n_weeks: Some(2),
            ..QuerySpec::default()
        };
        let result = top_players(&rows, &spec);
        // max_gw 3, n 2: keeps gameweeks 2 and 3 only.
        assert_eq!(result.window_start, Some(2));
        assert_eq!(result.entries[0].total, 3.0);
    }

    #[test]
    fn cumulative_series_restarts_at_window_start() {
        let rows = vec![
            row("A", 1, 4.0, 90.0),
            row("A", 2, 1.0, 90.0),
            row("A", 3, 2.0, 90.0),
        ];
        let spec = QuerySpec {
            metric: Metric::Goals,
            top_n: 1,
            last_n_weeks: Some(2),
            ..QuerySpec::default()
        };
        let result = top_players(&rows, &spec);
        let series = &result.entries[0].series;
        assert_eq!(series.len(), 2);
        assert_eq!(series[0], SeriesPoint { gameweek: 2, value: 1.0, cumulative: 1.0 });
        assert_eq!(series[1], SeriesPoint { gameweek: 3, value: 2.0, cumulative: 3.0 });
    }

    #[test]
    fn filters_apply_before_ranking() {
        let mut cheap = row("Cheap", 1, 1.0, 90.0);
        cheap.fpl_cost = 4.5;
        let mut pricey = row("Pricey", 1, 9.0, 90.0);
        pricey.fpl_cost = 12.0;
        let rows = vec![cheap, pricey];
        let spec = QuerySpec {
            metric: Metric::Goals,
            top_n: 5,
            max_price: Some(5.0),
            ..QuerySpec::default()
        };
        let result = top_players(&rows, &spec);
        assert_eq!(result.entries.len(), 1);
        assert_eq!(result.entries[0].name, "Cheap");
    }

    #[test]
    fn summary_stats_cover_total_mean_best_per90() {
        let rows = vec![row("A", 1, 2.0, 90.0), row("A", 2, 0.0, 90.0)];
        let spec = QuerySpec {
            metric: Metric::Goals,
            top_n: 1,
            ..QuerySpec::default()
        };
        let result = top_players(&rows, &spec);
        let entry = &result.entries[0];
        assert_eq!(entry.total, 2.0);
        assert_eq!(entry.mean, 1.0);
        assert_eq!(entry.best, 2.0);
        assert_eq!(entry.per90, Some(1.0));
    }

    #[test]
    fn team_ranking_orders_by_conceded_xg() {
        let teams = vec![
            TeamMatchRow { team: "Solid".to_string(), gameweek: 1, xg: 2.0, xg_against: 0.4 },
            TeamMatchRow { team: "Leaky".to_string(), gameweek: 1, xg: 0.4, xg_against: 2.0 },
        ];
        let spec = QuerySpec { metric: Metric::Xg, top_n: 1, ..QuerySpec::default() };
        let result = top_teams_xg_against(&teams, &spec);
        assert_eq!(result.entries[0].name, "Leaky");
        assert!(result.entries[0].per90.is_none());
    }
}
