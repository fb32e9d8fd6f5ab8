use std::path::PathBuf;

use crate::match_stats::StatCategory;

pub const LEAGUES: &[(&str, &str, &str)] = &[
    ("Premier League", "Premier-League", "9"),
    ("La Liga", "La-Liga", "12"),
    ("Serie A", "Serie-A", "11"),
    ("Ligue 1", "Ligue-1", "13"),
    ("Bundesliga", "Bundesliga", "20"),
];

/// How a fixture's `played` flag is derived. The two scraper generations of
/// the upstream source disagreed: one trusted score presence, the other the
/// match-report link. The link is authoritative by default because score text
/// can appear before a match page exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayedPolicy {
    #[default]
    MatchReportLink,
    ScorePresent,
}

impl PlayedPolicy {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "link" | "match-report-link" | "report" => Some(Self::MatchReportLink),
            "score" | "score-present" => Some(Self::ScorePresent),
            _ => None,
        }
    }
}

/// Explicit configuration passed by reference into each component.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub base_url: String,
    pub data_dir: PathBuf,
    pub season: Option<String>,
    pub min_delay_secs: f64,
    pub max_delay_secs: f64,
    /// Fuzzy score a candidate needs before it may be promoted to resolved.
    pub fuzzy_threshold: f64,
    /// Lower bound for recording a candidate in the review file at all.
    pub retry_threshold: f64,
    pub played_policy: PlayedPolicy,
    /// Promote fuzzy candidates above `fuzzy_threshold` into the durable
    /// reference table. Off by default: candidates await human review.
    pub accept_fuzzy: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_url: "https://fbref.com".to_string(),
            data_dir: PathBuf::from("data"),
            season: None,
            min_delay_secs: 6.0,
            max_delay_secs: 10.0,
            fuzzy_threshold: 80.0,
            retry_threshold: 30.0,
            played_policy: PlayedPolicy::default(),
            accept_fuzzy: false,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let min_delay_secs = env_f64("SCRAPE_MIN_DELAY_SECS").unwrap_or(defaults.min_delay_secs);
        Self {
            base_url: std::env::var("FBREF_BASE_URL")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.base_url),
            data_dir: std::env::var("DATA_DIR")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            season: std::env::var("SEASON").ok().filter(|v| !v.trim().is_empty()),
            min_delay_secs,
            max_delay_secs: env_f64("SCRAPE_MAX_DELAY_SECS")
                .unwrap_or(defaults.max_delay_secs)
                .max(min_delay_secs),
            fuzzy_threshold: env_f64("FUZZY_THRESHOLD").unwrap_or(defaults.fuzzy_threshold),
            retry_threshold: env_f64("FUZZY_RETRY_THRESHOLD").unwrap_or(defaults.retry_threshold),
            played_policy: std::env::var("PLAYED_POLICY")
                .ok()
                .and_then(|v| PlayedPolicy::parse(&v))
                .unwrap_or_default(),
            accept_fuzzy: false,
        }
    }

    pub fn schedule_url(&self, league_name: &str) -> Option<String> {
        let (_, slug, id) = LEAGUES.iter().find(|(name, _, _)| *name == league_name)?;
        let url = match &self.season {
            Some(season) => format!(
                "{}/en/comps/{id}/{season}/schedule/{season}-{slug}-Scores-and-Fixtures",
                self.base_url
            ),
            None => format!(
                "{}/en/comps/{id}/schedule/{slug}-Scores-and-Fixtures",
                self.base_url
            ),
        };
        Some(url)
    }

    pub fn season_dir(&self) -> PathBuf {
        match &self.season {
            Some(season) => self.data_dir.join(season),
            None => self.data_dir.clone(),
        }
    }

    pub fn fixture_file(&self) -> PathBuf {
        self.season_dir().join("fixture_data.csv")
    }

    pub fn players_dir(&self) -> PathBuf {
        self.season_dir().join("players")
    }

    pub fn category_file(&self, category: StatCategory) -> PathBuf {
        self.players_dir()
            .join(format!("players_{}.csv", category.as_str()))
    }

    pub fn fpl_dir(&self) -> PathBuf {
        self.season_dir().join("fpl")
    }

    pub fn reference_file(&self) -> PathBuf {
        self.fpl_dir().join("reference_player_names.csv")
    }

    pub fn overrides_file(&self) -> PathBuf {
        self.fpl_dir().join("manual_overrides.csv")
    }

    pub fn review_file(&self) -> PathBuf {
        self.fpl_dir().join("fuzzy_matches.csv")
    }

    pub fn fpl_players_file(&self) -> PathBuf {
        self.fpl_dir().join("fpl_players.csv")
    }
}

fn env_f64(key: &str) -> Option<f64> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}
