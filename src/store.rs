use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::info;

use crate::match_stats::{StatCategory, StatRow};

/// One durable per-category table. Columns are the union of every field seen
/// so far, in first-seen order; rows missing a column are null-filled on
/// write so home/away column drift never drops data.
#[derive(Debug, Clone, Default)]
pub struct CategoryTable {
    pub columns: Vec<String>,
    pub rows: Vec<StatRow>,
}

impl CategoryTable {
    fn absorb_columns(&mut self, rows: &[StatRow]) {
        for row in rows {
            for field in row.fields.keys() {
                if !self.columns.iter().any(|c| c == field) {
                    self.columns.push(field.clone());
                }
            }
        }
    }
}

/// Append/dedupe layer over the per-category stat tables. Owns the files
/// under the players directory exclusively.
#[derive(Debug)]
pub struct MergeStore {
    dir: PathBuf,
    tables: HashMap<StatCategory, CategoryTable>,
}

impl MergeStore {
    /// Load existing durable tables, or start empty where files are absent.
    pub fn open(dir: &Path) -> Result<Self> {
        let mut tables = HashMap::new();
        for category in StatCategory::ALL {
            let path = category_path(dir, category);
            let table = if path.exists() {
                load_table(&path)
                    .with_context(|| format!("load {} table", category.as_str()))?
            } else {
                CategoryTable::default()
            };
            tables.insert(category, table);
        }
        Ok(Self {
            dir: dir.to_path_buf(),
            tables,
        })
    }

    /// Fixture identifiers already ingested, taken from the primary
    /// (summary) table.
    pub fn ingested_game_ids(&self) -> HashSet<String> {
        self.tables[&StatCategory::Summary]
            .rows
            .iter()
            .map(|r| r.game_id.clone())
            .collect()
    }

    pub fn rows(&self, category: StatCategory) -> &[StatRow] {
        &self.tables[&category].rows
    }

    /// Replace any prior records for this fixture in this category, then
    /// append the fresh ones. Returns (removed, added).
    pub fn replace_fixture(
        &mut self,
        category: StatCategory,
        game_id: &str,
        rows: Vec<StatRow>,
    ) -> (usize, usize) {
        let table = self
            .tables
            .get_mut(&category)
            .expect("all categories initialized in open");
        let before = table.rows.len();
        table.rows.retain(|r| r.game_id != game_id);
        let removed = before - table.rows.len();
        let added = rows.len();
        table.absorb_columns(&rows);
        table.rows.extend(rows);
        (removed, added)
    }

    /// Write every category table to disk. Called after each fixture so a
    /// crash loses at most the in-flight fixture.
    pub fn persist(&self) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("create players dir {}", self.dir.display()))?;
        for category in StatCategory::ALL {
            let table = &self.tables[&category];
            let path = category_path(&self.dir, category);
            save_table(&path, table)
                .with_context(|| format!("persist {} table", category.as_str()))?;
        }
        Ok(())
    }
}

fn category_path(dir: &Path, category: StatCategory) -> PathBuf {
    dir.join(format!("players_{}.csv", category.as_str()))
}

fn save_table(path: &Path, table: &CategoryTable) -> Result<()> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    let mut header = vec!["game_id".to_string(), "home".to_string()];
    header.extend(table.columns.iter().cloned());
    writer.write_record(&header).context("write header")?;
    for row in &table.rows {
        let mut record = Vec::with_capacity(header.len());
        record.push(row.game_id.clone());
        record.push(row.home.to_string());
        for column in &table.columns {
            record.push(row.fields.get(column).cloned().unwrap_or_default());
        }
        writer.write_record(&record).context("write row")?;
    }
    let bytes = writer.into_inner().context("flush table csv")?;
    let tmp = path.with_extension("csv.tmp");
    fs::write(&tmp, bytes).context("write table csv")?;
    fs::rename(&tmp, path).context("swap table csv")?;
    Ok(())
}

fn load_table(path: &Path) -> Result<CategoryTable> {
    let mut reader =
        csv::Reader::from_path(path).with_context(|| format!("open {}", path.display()))?;
    let headers = reader.headers().context("read header")?.clone();
    let columns: Vec<String> = headers
        .iter()
        .filter(|h| *h != "game_id" && *h != "home")
        .map(str::to_string)
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.context("read row")?;
        let mut game_id = String::new();
        let mut home = false;
        let mut fields = BTreeMap::new();
        for (header, value) in headers.iter().zip(record.iter()) {
            match header {
                "game_id" => game_id = value.to_string(),
                "home" => home = value == "true",
                _ if !value.is_empty() => {
                    fields.insert(header.to_string(), value.to_string());
                }
                _ => {}
            }
        }
        rows.push(StatRow {
            game_id,
            home,
            fields,
        });
    }
    info!(
        path = %path.display(),
        rows = rows.len(),
        "loaded existing stat table"
    );
    Ok(CategoryTable { columns, rows })
}
