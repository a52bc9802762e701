// src/config.rs
//
// Fixed run settings for both pipelines. Nothing here is read from the command line or
// the environment; a run is fully described by these constants and the source workbook.

use std::path::PathBuf;

/// First year column of the indented `Value` sheet.
pub const FIRST_YEAR: u16 = 2021;
/// Last year column of the indented `Value` sheet.
pub const LAST_YEAR: u16 = 2033;

/// Seed for derived volume multipliers; fixed so reruns write identical files.
pub const VOLUME_SEED: u64 = 42;

pub const VALUE_JSON: &str = "value.json";
pub const VOLUME_JSON: &str = "volume.json";
pub const SEGMENTATION_JSON: &str = "segmentation_analysis.json";

/// Year labels `"2021"..="2033"`, in column order.
pub fn year_labels(first: u16, last: u16) -> Vec<String> {
    (first..=last).map(|y| y.to_string()).collect()
}

/// Settings for the indentation-driven pipeline.
#[derive(Debug, Clone)]
pub struct IndentedConfig {
    pub workbook: PathBuf,
    pub sheet: String,
    /// Year label per data column, starting at column B.
    pub years: Vec<String>,
    pub output_dir: PathBuf,
    pub seed: u64,
}

impl Default for IndentedConfig {
    fn default() -> Self {
        Self {
            workbook: PathBuf::from(
                "Copy of Dataset-Global MedTech  Biopharma Device CMOCDMO Market.xlsx",
            ),
            sheet: "Value".to_string(),
            years: year_labels(FIRST_YEAR, LAST_YEAR),
            output_dir: PathBuf::from("public/data"),
            seed: VOLUME_SEED,
        }
    }
}

impl IndentedConfig {
    pub fn value_path(&self) -> PathBuf {
        self.output_dir.join(VALUE_JSON)
    }

    pub fn volume_path(&self) -> PathBuf {
        self.output_dir.join(VOLUME_JSON)
    }
}

/// Settings for the column-driven pipeline.
#[derive(Debug, Clone)]
pub struct ColumnarConfig {
    pub workbook: PathBuf,
    pub sheet: String,
    pub output_dir: PathBuf,
}

impl Default for ColumnarConfig {
    fn default() -> Self {
        Self {
            workbook: PathBuf::from("Solar-sheet-og.xlsx"),
            sheet: "Sheet1".to_string(),
            output_dir: PathBuf::from("public/data"),
        }
    }
}

impl ColumnarConfig {
    pub fn value_path(&self) -> PathBuf {
        self.output_dir.join(VALUE_JSON)
    }

    pub fn volume_path(&self) -> PathBuf {
        self.output_dir.join(VOLUME_JSON)
    }

    pub fn segmentation_path(&self) -> PathBuf {
        self.output_dir.join(SEGMENTATION_JSON)
    }
}
