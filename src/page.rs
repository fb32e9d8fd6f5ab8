use anyhow::{Context, Result, anyhow};
use scraper::{ElementRef, Html, Selector};

use crate::http_client::http_client;

/// One labelled cell from a source table. `field` is the source-defined
/// field name (`data-stat`), `link` the first anchor target inside the cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCell {
    pub field: String,
    pub text: String,
    pub link: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRow {
    pub cells: Vec<RawCell>,
}

impl RawRow {
    pub fn get(&self, field: &str) -> Option<&str> {
        self.cells
            .iter()
            .find(|c| c.field == field)
            .map(|c| c.text.as_str())
    }

    pub fn link(&self, field: &str) -> Option<&str> {
        self.cells
            .iter()
            .find(|c| c.field == field)
            .and_then(|c| c.link.as_deref())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTable {
    pub id: String,
    pub rows: Vec<RawRow>,
}

/// The page-fetch collaborator: everything upstream of "a set of labelled
/// tables" (browser automation, anti-bot handling) hides behind this.
pub trait PageFetch {
    fn fetch_tables(&self, url: &str) -> Result<Vec<RawTable>>;
}

/// Plain blocking-HTTP implementation of the fetch contract.
pub struct HttpPageFetch;

impl PageFetch for HttpPageFetch {
    fn fetch_tables(&self, url: &str) -> Result<Vec<RawTable>> {
        let client = http_client()?;
        let resp = client
            .get(url)
            .send()
            .with_context(|| format!("request failed: {url}"))?;
        let status = resp.status();
        let body = resp.text().context("failed reading body")?;
        if !status.is_success() {
            return Err(anyhow!("http {status} fetching {url}"));
        }
        parse_tables(&body)
    }
}

/// Extract every table on the page into labelled rows. Cells are keyed by
/// their `data-stat` attribute; header and summary rows survive here and are
/// filtered downstream by field presence.
pub fn parse_tables(html: &str) -> Result<Vec<RawTable>> {
    let table_sel = selector("table")?;
    let body_row_sel = selector("tbody > tr")?;
    let cell_sel = selector("th, td")?;
    let anchor_sel = selector("a")?;

    let document = Html::parse_document(html);
    let mut out = Vec::new();
    for table in document.select(&table_sel) {
        let id = table.value().attr("id").unwrap_or_default().to_string();
        let mut rows = Vec::new();
        for tr in table.select(&body_row_sel) {
            let mut cells = Vec::new();
            for cell in tr.select(&cell_sel) {
                let Some(field) = cell.value().attr("data-stat") else {
                    continue;
                };
                cells.push(RawCell {
                    field: field.to_string(),
                    text: element_text(&cell),
                    link: cell
                        .select(&anchor_sel)
                        .next()
                        .and_then(|a| a.value().attr("href"))
                        .map(|href| href.to_string()),
                });
            }
            if !cells.is_empty() {
                rows.push(RawRow { cells });
            }
        }
        out.push(RawTable { id, rows });
    }
    Ok(out)
}

fn element_text(el: &ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|err| anyhow!("invalid selector {css}: {err}"))
}
