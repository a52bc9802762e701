pub mod columns;
pub mod config;
pub mod indent;
pub mod output;
pub mod pipeline;
pub mod report;
pub mod taxonomy;
pub mod tree;
pub mod volume;
pub mod workbook;
