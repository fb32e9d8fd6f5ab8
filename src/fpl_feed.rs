use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::http_client::http_client;

pub const BOOTSTRAP_URL: &str = "https://fantasy.premierleague.com/api/bootstrap-static/";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Position {
    Gk,
    Def,
    Mid,
    Fwd,
}

impl Position {
    pub fn from_element_type(element_type: u8) -> Option<Self> {
        match element_type {
            1 => Some(Position::Gk),
            2 => Some(Position::Def),
            3 => Some(Position::Mid),
            4 => Some(Position::Fwd),
            _ => None,
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "GK" => Some(Position::Gk),
            "DEF" => Some(Position::Def),
            "MID" => Some(Position::Mid),
            "FWD" => Some(Position::Fwd),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Position::Gk => "GK",
            Position::Def => "DEF",
            Position::Mid => "MID",
            Position::Fwd => "FWD",
        }
    }
}

/// One priced player from the fantasy feed. `player_code` is the stable
/// cross-season identifier the identity mapping is keyed by.
#[derive(Debug, Clone, PartialEq)]
pub struct FplPlayer {
    pub player_code: u64,
    pub position: Position,
    pub first_name: String,
    pub last_name: String,
    pub fpl_cost: f64,
    pub fpl_form: Option<f64>,
    pub season_ppg: Option<f64>,
    pub total_points: i64,
}

impl FplPlayer {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Deserialize)]
struct BootstrapStatic {
    elements: Vec<Element>,
}

#[derive(Debug, Deserialize)]
struct Element {
    code: u64,
    element_type: u8,
    first_name: String,
    second_name: String,
    now_cost: f64,
    form: Option<String>,
    points_per_game: Option<String>,
    total_points: i64,
}

/// Parse the bootstrap payload into priced players. Entries without points
/// this season are dropped, as are non-player element types.
pub fn parse_bootstrap_json(raw: &str) -> Result<Vec<FplPlayer>> {
    let payload: BootstrapStatic =
        serde_json::from_str(raw).context("invalid bootstrap-static json")?;
    let mut out = Vec::new();
    for element in payload.elements {
        if element.total_points <= 0 {
            continue;
        }
        let Some(position) = Position::from_element_type(element.element_type) else {
            continue;
        };
        out.push(FplPlayer {
            player_code: element.code,
            position,
            first_name: element.first_name,
            last_name: element.second_name,
            // The feed prices in tenths of a million.
            fpl_cost: element.now_cost / 10.0,
            fpl_form: element.form.as_deref().and_then(parse_f64),
            season_ppg: element.points_per_game.as_deref().and_then(parse_f64),
            total_points: element.total_points,
        });
    }
    Ok(out)
}

pub fn fetch_fpl_players() -> Result<Vec<FplPlayer>> {
    let client = http_client()?;
    info!(url = BOOTSTRAP_URL, "fetching fantasy pricing feed");
    let resp = client
        .get(BOOTSTRAP_URL)
        .send()
        .context("fantasy feed request failed")?;
    let status = resp.status();
    let body = resp.text().context("failed reading fantasy feed body")?;
    if !status.is_success() {
        return Err(anyhow!("fantasy feed http {status}"));
    }
    let players = parse_bootstrap_json(&body)?;
    info!(players = players.len(), "parsed fantasy pricing feed");
    Ok(players)
}

fn parse_f64(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok()
}
