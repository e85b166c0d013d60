//! PDF extraction: a chain of strategies over the text layer, the best
//! confidence wins. Strategies degrade to zero confidence instead of
//! erroring; image-only documents produce empty pages (OCR is a hook for a
//! later stage, not part of the contract).

use chrono::Utc;
use lopdf::Document;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

/// Parsers may bound page count themselves; extraction stops here.
const MAX_PAGES: u32 = 120;

/// Minimum consecutive aligned rows before a run of lines counts as a table.
const MIN_TABLE_ROWS: usize = 2;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TableData {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl TableData {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedTable {
    pub page: u32,
    pub table_index: usize,
    pub data: TableData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionPage {
    pub page_number: u32,
    pub text: String,
    pub tables: Vec<TableData>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Extraction {
    pub extractor_name: String,
    pub pages: Vec<ExtractionPage>,
    pub tables: Vec<ExtractedTable>,
    pub confidence: f64,
    pub extraction_date: String,
    pub file_size: u64,
}

impl Extraction {
    pub fn empty(extractor_name: &str) -> Self {
        Self {
            extractor_name: extractor_name.to_string(),
            pages: Vec::new(),
            tables: Vec::new(),
            confidence: 0.0,
            extraction_date: Utc::now().to_rfc3339(),
            file_size: 0,
        }
    }

    pub fn has_text(&self) -> bool {
        self.pages.iter().any(|p| !p.text.trim().is_empty())
    }
}

#[derive(Debug, Clone, Default)]
pub struct Extractor;

impl Extractor {
    pub fn new() -> Self {
        Self
    }

    /// Run every strategy and keep the highest-confidence result.
    pub fn extract_with_fallback(&self, path: &Path) -> Extraction {
        let file_size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);

        let page_texts = match read_page_texts(path) {
            Ok(texts) => texts,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "pdf text extraction failed");
                let mut failed = Extraction::empty("none");
                failed.file_size = file_size;
                return failed;
            }
        };

        let candidates = [
            text_layout_strategy(&page_texts),
            lattice_strategy(&page_texts),
            tabular_guess_strategy(&page_texts),
        ];

        let mut best = Extraction::empty("none");
        for candidate in candidates {
            if candidate.confidence > best.confidence {
                best = candidate;
            }
        }
        best.file_size = file_size;

        debug!(
            path = %path.display(),
            extractor = %best.extractor_name,
            pages = best.pages.len(),
            tables = best.tables.len(),
            confidence = best.confidence,
            "extraction complete"
        );
        best
    }
}

fn read_page_texts(path: &Path) -> Result<Vec<(u32, String)>, lopdf::Error> {
    let doc = Document::load(path)?;
    let pages = doc.get_pages();
    let mut texts = Vec::new();

    for (&page_number, _) in pages.iter().take(MAX_PAGES as usize) {
        let text = doc.extract_text(&[page_number]).unwrap_or_default();
        texts.push((page_number, text));
    }

    Ok(texts)
}

/// Best-effort page text plus light table detection.
fn text_layout_strategy(page_texts: &[(u32, String)]) -> Extraction {
    let mut extraction = Extraction::empty("text_layout");

    for (page_number, text) in page_texts {
        let tables = detect_tables(text, MIN_TABLE_ROWS);
        register_page(&mut extraction, *page_number, text.clone(), tables);
    }

    if extraction.has_text() || !extraction.tables.is_empty() {
        extraction.confidence = 0.7;
    }
    extraction
}

/// Table-only extraction scoring each table by how consistently its rows
/// match the header arity; aggregate confidence is the mean accuracy.
fn lattice_strategy(page_texts: &[(u32, String)]) -> Extraction {
    let mut extraction = Extraction::empty("lattice");
    let mut accuracies = Vec::new();

    for (page_number, text) in page_texts {
        let blocks = aligned_blocks(text);
        let mut tables = Vec::new();
        for block in blocks {
            let arity = block[0].len();
            let matching = block.iter().filter(|row| row.len() == arity).count();
            let accuracy = matching as f64 / block.len() as f64;
            if accuracy < 0.5 {
                continue;
            }
            accuracies.push(accuracy);
            tables.push(TableData {
                headers: block[0].clone(),
                rows: block[1..]
                    .iter()
                    .filter(|row| row.len() == arity)
                    .cloned()
                    .collect(),
            });
        }
        register_page(&mut extraction, *page_number, String::new(), tables);
    }

    if !accuracies.is_empty() {
        extraction.confidence =
            (accuracies.iter().sum::<f64>() / accuracies.len() as f64) * 0.8;
    }
    extraction
}

/// Naive whitespace-split tables; last resort.
fn tabular_guess_strategy(page_texts: &[(u32, String)]) -> Extraction {
    let mut extraction = Extraction::empty("tabular_guess");

    for (page_number, text) in page_texts {
        let tables = detect_tables(text, 3);
        register_page(&mut extraction, *page_number, String::new(), tables);
    }

    if !extraction.tables.is_empty() {
        extraction.confidence = 0.6;
    }
    extraction
}

fn register_page(
    extraction: &mut Extraction,
    page_number: u32,
    text: String,
    tables: Vec<TableData>,
) {
    for data in &tables {
        extraction.tables.push(ExtractedTable {
            page: page_number,
            table_index: extraction.tables.len(),
            data: data.clone(),
        });
    }
    extraction.pages.push(ExtractionPage {
        page_number,
        text,
        tables,
    });
}

/// Split a line into cells on runs of two or more spaces or tabs.
fn split_columns(line: &str) -> Vec<String> {
    let mut cells = Vec::new();
    let mut current = String::new();
    let mut space_run = 0;

    for c in line.chars() {
        if c == '\t' {
            if !current.trim().is_empty() {
                cells.push(current.trim().to_string());
            }
            current.clear();
            space_run = 0;
        } else if c == ' ' {
            space_run += 1;
            current.push(c);
        } else {
            if space_run >= 2 && !current.trim().is_empty() {
                cells.push(current.trim().to_string());
                current.clear();
            }
            space_run = 0;
            current.push(c);
        }
    }
    if !current.trim().is_empty() {
        cells.push(current.trim().to_string());
    }
    cells
}

/// Consecutive multi-column lines grouped into blocks.
fn aligned_blocks(text: &str) -> Vec<Vec<Vec<String>>> {
    let mut blocks = Vec::new();
    let mut current: Vec<Vec<String>> = Vec::new();

    for line in text.lines() {
        let cells = split_columns(line);
        if cells.len() >= 2 {
            current.push(cells);
        } else {
            if current.len() > MIN_TABLE_ROWS {
                blocks.push(std::mem::take(&mut current));
            }
            current.clear();
        }
    }
    if current.len() > MIN_TABLE_ROWS {
        blocks.push(current);
    }
    blocks
}

fn detect_tables(text: &str, min_rows: usize) -> Vec<TableData> {
    aligned_blocks(text)
        .into_iter()
        .filter(|block| block.len() > min_rows)
        .map(|block| TableData {
            headers: block[0].clone(),
            rows: block[1..].to_vec(),
        })
        .collect()
}
