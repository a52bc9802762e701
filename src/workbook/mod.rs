// src/workbook/mod.rs
use anyhow::{Context, Result};
use calamine::{open_workbook, Data, Reader, Xlsx};
use std::{
    collections::HashMap,
    path::PathBuf,
};
use tracing::debug;

pub mod styles;
pub mod utils;

/// A single cell as the pipelines see it.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    #[default]
    Empty,
    Number(f64),
    Text(String),
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            CellValue::Number(_) => false,
        }
    }

    /// Trimmed text form; numbers print without a trailing `.0` when integral.
    pub fn as_label(&self) -> Option<String> {
        match self {
            CellValue::Empty => None,
            CellValue::Text(s) => {
                let s = utils::clean_str(s);
                (!s.is_empty()).then_some(s)
            }
            CellValue::Number(n) => Some(utils::format_number(*n)),
        }
    }

    /// Numeric reading of the cell; numeric text is accepted, anything else is `None`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            CellValue::Text(s) => utils::parse_number(s),
            CellValue::Empty => None,
        }
    }
}

impl From<&Data> for CellValue {
    fn from(data: &Data) -> Self {
        match data {
            Data::Int(i) => CellValue::Number(*i as f64),
            Data::Float(f) => CellValue::Number(*f),
            Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => {
                CellValue::Text(s.clone())
            }
            Data::Bool(b) => CellValue::Text(b.to_string().to_uppercase()),
            Data::DateTime(dt) => CellValue::Number(dt.as_f64()),
            Data::Error(_) | Data::Empty => CellValue::Empty,
        }
    }
}

/// A cell value plus the formatting the pipelines care about.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Cell {
    pub value: CellValue,
    /// Alignment indent level from the cell's style (0 when unstyled).
    pub indent: u8,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SheetRow {
    /// 1-based worksheet row number.
    pub number: u32,
    /// Cells by 0-based column; column A is index 0.
    pub cells: Vec<Cell>,
}

impl SheetRow {
    pub fn value(&self, col: usize) -> &CellValue {
        static EMPTY: CellValue = CellValue::Empty;
        self.cells.get(col).map_or(&EMPTY, |c| &c.value)
    }

    pub fn indent(&self, col: usize) -> u8 {
        self.cells.get(col).map_or(0, |c| c.indent)
    }

    /// Label text of `col`, if any.
    pub fn text(&self, col: usize) -> Option<String> {
        self.value(col).as_label()
    }
}

/// Anything that can hand back the rows of a named sheet.
pub trait WorkbookSource {
    fn read_sheet(&self, sheet: &str) -> Result<Vec<SheetRow>>;
}

/// `.xlsx` workbook on disk.
#[derive(Debug, Clone)]
pub struct XlsxWorkbook {
    path: PathBuf,
}

impl XlsxWorkbook {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl WorkbookSource for XlsxWorkbook {
    #[tracing::instrument(level = "info", skip(self), fields(path = %self.path.display()))]
    fn read_sheet(&self, sheet: &str) -> Result<Vec<SheetRow>> {
        let mut workbook: Xlsx<_> = open_workbook(&self.path)
            .with_context(|| format!("Failed to open workbook {:?}", self.path))?;
        let range = workbook
            .worksheet_range(sheet)
            .with_context(|| format!("Failed to read sheet '{}' in {:?}", sheet, self.path))?;
        // calamine holds the file open; release it before reopening for styles
        drop(workbook);

        let indents: HashMap<(u32, u32), u8> = styles::load_cell_indents(&self.path, sheet)
            .with_context(|| format!("Failed to read cell styles of sheet '{}'", sheet))?;

        let (first_row, first_col) = range.start().unwrap_or((0, 0));
        let mut rows = Vec::with_capacity(range.height());
        for (r, data_row) in range.rows().enumerate() {
            let row_idx = first_row + r as u32;
            let mut cells = vec![Cell::default(); first_col as usize];
            for (c, data) in data_row.iter().enumerate() {
                let col_idx = first_col + c as u32;
                cells.push(Cell {
                    value: CellValue::from(data),
                    indent: indents.get(&(row_idx, col_idx)).copied().unwrap_or(0),
                });
            }
            rows.push(SheetRow {
                number: row_idx + 1,
                cells,
            });
        }

        debug!(sheet, rows = rows.len(), styled = indents.len(), "sheet loaded");
        Ok(rows)
    }
}

/// In-memory rows keyed by sheet name, for pipeline tests.
#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub struct MemoryWorkbook {
    sheets: HashMap<String, Vec<SheetRow>>,
}

#[cfg(test)]
impl MemoryWorkbook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sheet(mut self, name: &str, rows: Vec<SheetRow>) -> Self {
        self.sheets.insert(name.to_string(), rows);
        self
    }
}

#[cfg(test)]
impl WorkbookSource for MemoryWorkbook {
    fn read_sheet(&self, sheet: &str) -> Result<Vec<SheetRow>> {
        self.sheets
            .get(sheet)
            .cloned()
            .with_context(|| format!("Sheet '{}' not found", sheet))
    }
}
