use std::collections::BTreeMap;

use tracing::warn;

use crate::page::{RawRow, RawTable};

/// The seven per-player stat tables published on a match page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StatCategory {
    Summary,
    Passing,
    PassingTypes,
    Defense,
    Possession,
    Misc,
    Keeper,
}

impl StatCategory {
    pub const ALL: [StatCategory; 7] = [
        StatCategory::Summary,
        StatCategory::Passing,
        StatCategory::PassingTypes,
        StatCategory::Defense,
        StatCategory::Possession,
        StatCategory::Misc,
        StatCategory::Keeper,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StatCategory::Summary => "summary",
            StatCategory::Passing => "passing",
            StatCategory::PassingTypes => "passing_types",
            StatCategory::Defense => "defense",
            StatCategory::Possession => "possession",
            StatCategory::Misc => "misc",
            StatCategory::Keeper => "keeper",
        }
    }
}

/// One player's line in one stat table of one match. Column sets differ per
/// category and evolve between source versions, so fields stay a name-keyed
/// map rather than a fixed struct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatRow {
    pub game_id: String,
    pub home: bool,
    pub fields: BTreeMap<String, String>,
}

impl StatRow {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

/// Tables for a category, in document order: home side first, away second.
/// Six categories match on the exact id suffix after the team hash; the
/// keeper tables use a different id shape upstream and match on substring.
pub fn category_tables<'a>(tables: &'a [RawTable], category: StatCategory) -> Vec<&'a RawTable> {
    let keyword = category.as_str();
    tables
        .iter()
        .filter(|t| match category {
            StatCategory::Keeper => t.id.contains(keyword),
            _ => t.id.splitn(3, '_').last() == Some(keyword),
        })
        .collect()
}

/// Extract every category's player rows for one fixture. A category whose
/// tables are absent or malformed yields an empty set, never an error.
pub fn extract_match_stats(
    tables: &[RawTable],
    game_id: &str,
) -> BTreeMap<StatCategory, Vec<StatRow>> {
    let mut out = BTreeMap::new();
    for category in StatCategory::ALL {
        let found = category_tables(tables, category);
        if found.is_empty() {
            warn!(game_id, category = category.as_str(), "no stat tables found");
        }
        let mut rows = Vec::new();
        for (index, table) in found.iter().enumerate() {
            let home = index % 2 == 0;
            for raw in &table.rows {
                if let Some(row) = player_row(raw, game_id, home) {
                    rows.push(row);
                }
            }
        }
        out.insert(category, rows);
    }
    out
}

/// Subtotal and spacer rows carry no nationality; real player rows always do.
fn player_row(raw: &RawRow, game_id: &str, home: bool) -> Option<StatRow> {
    let nationality = raw.get("nationality")?;
    if nationality.trim().is_empty() {
        return None;
    }
    let fields: BTreeMap<String, String> = raw
        .cells
        .iter()
        .map(|c| (c.field.clone(), c.text.clone()))
        .collect();
    Some(StatRow {
        game_id: game_id.to_string(),
        home,
        fields,
    })
}
