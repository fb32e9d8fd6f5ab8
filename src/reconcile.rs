use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::fpl_feed::FplPlayer;

/// Name pairs the fuzzy matcher gets wrong, keyed by the fantasy-feed full
/// name. Mostly Brazilian and Spanish players registered under a long legal
/// name but listed by nickname on the stats site.
pub const DEFAULT_OVERRIDES: &[(&str, &str)] = &[
    ("Yéremy Pino Santos", "Yeremi Pino"),
    ("Endo Wataru", "Wataru Endo"),
    ("Carlos Henrique Casimiro", "Casimiro"),
    ("Mitoma Kaoru", "Kaoru Mitoma"),
    ("Kevin Santos Lopes de Macedo", "Kevin"),
    ("Rodrigo 'Rodri' Hernandez Cascante", "Rodri"),
    ("Igor Thiago Nascimento Rodrigues", "Thiago"),
    ("Lucas Tolentino Coelho de Lima", "Lucas Paquetá"),
    ("Murillo Costa dos Santos", "Murillo"),
    ("Felipe Rodrigues da Silva", "Morato"),
    ("André Trindade da Costa Neto", "André"),
    ("Igor Julio dos Santos de Paulo", "Igor"),
    ("Sávio Moreira de Oliveira", "Sávio"),
    ("Norberto Bercique Gomes Betuncal", "Beto"),
    ("João Pedro Ferreira da Silva", "Jota Silva"),
];

/// One confirmed identity mapping. The reference table is append-only: once
/// a player code is mapped it is never re-resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceEntry {
    pub player_code: u64,
    pub fbref_name: String,
    pub fpl_name: String,
}

/// One row of the human-review artifact, sorted best-first on write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewCandidate {
    pub fpl_name: String,
    pub fbref_name: Option<String>,
    pub score: f64,
    pub manual_override: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ReconcileReport {
    pub total: usize,
    pub already_mapped: usize,
    pub exact: usize,
    pub manual: usize,
    pub fuzzy: usize,
    pub unresolved: Vec<String>,
}

impl ReconcileReport {
    pub fn fully_resolved(&self) -> bool {
        self.unresolved.is_empty()
    }
}

/// Absent file reads as "no mappings yet".
pub fn load_reference(path: &Path) -> Result<Vec<ReferenceEntry>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("open reference table {}", path.display()))?;
    let mut out = Vec::new();
    for row in reader.deserialize::<ReferenceEntry>() {
        out.push(row.context("decode reference row")?);
    }
    Ok(out)
}

pub fn save_reference(path: &Path, entries: &[ReferenceEntry]) -> Result<()> {
    write_csv(path, entries).context("persist reference table")
}

pub fn save_review(path: &Path, candidates: &[ReviewCandidate]) -> Result<()> {
    let mut sorted = candidates.to_vec();
    sorted.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.fpl_name.cmp(&b.fpl_name))
    });
    write_csv(path, &sorted).context("persist review file")
}

/// Manual override table: the built-in pairs, plus an optional
/// operator-maintained file that wins on conflicting names.
pub fn load_overrides(path: &Path) -> Result<BTreeMap<String, String>> {
    let mut overrides: BTreeMap<String, String> = DEFAULT_OVERRIDES
        .iter()
        .map(|(fpl, fbref)| (fpl.to_string(), fbref.to_string()))
        .collect();
    if !path.exists() {
        return Ok(overrides);
    }
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("open overrides file {}", path.display()))?;

    #[derive(Deserialize)]
    struct OverrideRow {
        fpl_name: String,
        fbref_name: String,
    }

    for row in reader.deserialize::<OverrideRow>() {
        let row = row.context("decode override row")?;
        overrides.insert(row.fpl_name, row.fbref_name);
    }
    Ok(overrides)
}

/// Best candidate by normalized Levenshtein similarity on a 0..=100 scale.
/// Ties break to the lexicographically smaller candidate so reruns are
/// deterministic.
pub fn best_fuzzy_match<'a>(name: &str, candidates: &'a [String]) -> Option<(&'a str, f64)> {
    let mut best: Option<(&str, f64)> = None;
    for candidate in candidates {
        let score = strsim::normalized_levenshtein(name, candidate) * 100.0;
        let better = match best {
            None => true,
            Some((held, held_score)) => {
                score > held_score || (score == held_score && candidate.as_str() < held)
            }
        };
        if better {
            best = Some((candidate, score));
        }
    }
    best
}

/// Resolve every priced player to a stats-site name. Resolution order per
/// player: existing reference entry, exact name, manual override, fuzzy
/// candidate (only when promotion is enabled and the score clears the
/// threshold). Everything resolved is appended to the reference table and
/// persisted even when some players stay unresolved, so a partial run never
/// loses confirmed work. The output table is written only on full
/// resolution.
pub fn reconcile(
    cfg: &AppConfig,
    fpl_players: &[FplPlayer],
    fbref_names: &[String],
) -> Result<ReconcileReport> {
    let mut reference = load_reference(&cfg.reference_file())?;
    let mapped: HashSet<u64> = reference.iter().map(|e| e.player_code).collect();
    let overrides = load_overrides(&cfg.overrides_file())?;
    let exact_names: HashSet<&str> = fbref_names.iter().map(String::as_str).collect();

    let mut report = ReconcileReport {
        total: fpl_players.len(),
        ..ReconcileReport::default()
    };
    let mut review = Vec::new();
    let mut resolved = Vec::new();

    for player in fpl_players {
        if mapped.contains(&player.player_code) {
            report.already_mapped += 1;
            continue;
        }
        let full_name = player.full_name();

        if exact_names.contains(full_name.as_str()) {
            report.exact += 1;
            resolved.push(ReferenceEntry {
                player_code: player.player_code,
                fbref_name: full_name.clone(),
                fpl_name: full_name,
            });
            continue;
        }

        let manual = overrides.get(&full_name).cloned();
        let candidate = best_fuzzy_match(&full_name, fbref_names)
            .filter(|(_, score)| *score >= cfg.retry_threshold);
        review.push(ReviewCandidate {
            fpl_name: full_name.clone(),
            fbref_name: candidate.map(|(name, _)| name.to_string()),
            score: candidate.map(|(_, score)| score).unwrap_or(0.0),
            manual_override: manual.clone(),
        });

        if let Some(fbref_name) = manual {
            report.manual += 1;
            resolved.push(ReferenceEntry {
                player_code: player.player_code,
                fbref_name,
                fpl_name: full_name,
            });
            continue;
        }

        match candidate {
            Some((name, score)) if cfg.accept_fuzzy && score >= cfg.fuzzy_threshold => {
                report.fuzzy += 1;
                resolved.push(ReferenceEntry {
                    player_code: player.player_code,
                    fbref_name: name.to_string(),
                    fpl_name: full_name,
                });
            }
            _ => report.unresolved.push(full_name),
        }
    }

    save_review(&cfg.review_file(), &review)?;

    if !resolved.is_empty() {
        reference.extend(resolved);
        save_reference(&cfg.reference_file(), &reference)?;
    }

    if report.fully_resolved() {
        save_fpl_players(cfg, fpl_players, &reference)?;
        info!(
            total = report.total,
            exact = report.exact,
            manual = report.manual,
            fuzzy = report.fuzzy,
            "all players resolved"
        );
    } else {
        warn!(
            unresolved = report.unresolved.len(),
            review = %cfg.review_file().display(),
            "players left unresolved, review the fuzzy candidates"
        );
    }
    Ok(report)
}

/// The priced-player table downstream joins consume, keyed by the resolved
/// stats-site name.
#[derive(Debug, Serialize, Deserialize)]
pub struct ResolvedPlayer {
    pub player_code: u64,
    pub fbref_name: String,
    pub position: crate::fpl_feed::Position,
    pub fpl_cost: f64,
    pub fpl_form: Option<f64>,
    pub season_ppg: Option<f64>,
    pub total_points: i64,
}

fn save_fpl_players(
    cfg: &AppConfig,
    fpl_players: &[FplPlayer],
    reference: &[ReferenceEntry],
) -> Result<()> {
    let by_code: HashMap<u64, &str> = reference
        .iter()
        .map(|e| (e.player_code, e.fbref_name.as_str()))
        .collect();
    let mut rows = Vec::with_capacity(fpl_players.len());
    for player in fpl_players {
        let Some(fbref_name) = by_code.get(&player.player_code) else {
            continue;
        };
        rows.push(ResolvedPlayer {
            player_code: player.player_code,
            fbref_name: fbref_name.to_string(),
            position: player.position,
            fpl_cost: player.fpl_cost,
            fpl_form: player.fpl_form,
            season_ppg: player.season_ppg,
            total_points: player.total_points,
        });
    }
    write_csv(&cfg.fpl_players_file(), &rows).context("persist resolved player table")
}

pub fn load_fpl_players(path: &Path) -> Result<Vec<ResolvedPlayer>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("open resolved players {}", path.display()))?;
    let mut out = Vec::new();
    for row in reader.deserialize::<ResolvedPlayer>() {
        out.push(row.context("decode resolved player row")?);
    }
    Ok(out)
}

fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create dir {}", parent.display()))?;
    }
    let mut writer = csv::Writer::from_writer(Vec::new());
    for row in rows {
        writer.serialize(row).context("serialize csv row")?;
    }
    let bytes = writer.into_inner().context("flush csv")?;
    let tmp = path.with_extension("csv.tmp");
    fs::write(&tmp, bytes).with_context(|| format!("write {}", path.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("swap {}", path.display()))?;
    Ok(())
}
