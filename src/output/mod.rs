// src/output/mod.rs
use anyhow::{Context, Result};
use std::{
    fs,
    io::{BufWriter, ErrorKind, Write},
    path::Path,
};
use tracing::{info, warn};

use crate::tree::{GeoTree, Precision};

/// Serialize `tree` at `precision` and write it to `path`.
///
/// - parent directories are created
/// - output is pretty-printed with a trailing newline
/// - the file is written to a sibling `.tmp` and renamed over `path`, so readers never
///   see a partial document
pub fn write_json(path: &Path, tree: &GeoTree, precision: Precision) -> Result<()> {
    // 1) make sure the directory exists
    let dir = path.parent().filter(|d| !d.as_os_str().is_empty());
    if let Some(dir) = dir {
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }

    // 2) write to tmp, then rename over the target; the tmp file never outlives a failure
    let file_name = path
        .file_name()
        .with_context(|| format!("{} has no file name", path.display()))?
        .to_string_lossy();
    let tmp_path = path.with_file_name(format!(".{file_name}.tmp"));
    let written = write_tmp(&tmp_path, tree, precision).and_then(|()| {
        fs::rename(&tmp_path, path)
            .with_context(|| format!("renaming {} -> {}", tmp_path.display(), path.display()))
    });
    if let Err(err) = written {
        match fs::remove_file(&tmp_path) {
            Err(e) if e.kind() != ErrorKind::NotFound => {
                warn!(path = %tmp_path.display(), error = %e, "failed to remove tmp file")
            }
            _ => {}
        }
        return Err(err);
    }

    info!(path = %path.display(), ?precision, "wrote json");
    Ok(())
}

fn write_tmp(tmp_path: &Path, tree: &GeoTree, precision: Precision) -> Result<()> {
    let file = fs::File::create(tmp_path)
        .with_context(|| format!("creating {}", tmp_path.display()))?;
    let mut out = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut out, &tree.rounded(precision))
        .with_context(|| format!("serializing {}", tmp_path.display()))?;
    out.write_all(b"\n")
        .with_context(|| format!("writing {}", tmp_path.display()))?;
    out.flush()
        .with_context(|| format!("flushing {}", tmp_path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{Node, YearValues};
    use tempfile::tempdir;

    fn tree() -> GeoTree {
        let mut tree = GeoTree::new();
        let values: YearValues = [("2021".to_string(), 12.34), ("2022".to_string(), 1.0)]
            .into_iter()
            .collect();
        tree.geography_or_insert("Global")
            .child_or_insert("By Product")
            .insert_child("Pens", Node::leaf(values));
        tree
    }

    #[test]
    fn test_write_json_creates_dirs_and_trailing_newline() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("public").join("data").join("value.json");
        write_json(&path, &tree(), Precision::Tenths).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.ends_with("}\n"));
        let json: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(json["Global"]["By Product"]["Pens"]["2021"], serde_json::json!(12.3));

        // no tmp file left behind
        let names: Vec<_> = fs::read_dir(path.parent().unwrap())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["value.json"]);
    }

    #[test]
    fn test_write_json_units_are_integers() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("volume.json");
        write_json(&path, &tree(), Precision::Units).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"2021\": 12,"), "{text}");
        assert!(!text.contains("12.0"));
    }

    #[test]
    fn test_write_json_failure_leaves_no_tmp_file() {
        let dir = tempdir().unwrap();
        // a directory in the way makes the final rename fail
        let path = dir.path().join("value.json");
        fs::create_dir(&path).unwrap();
        fs::write(path.join("keep"), "x").unwrap();

        let err = write_json(&path, &tree(), Precision::Tenths).unwrap_err();
        assert!(format!("{err:#}").contains("renaming"));
        assert!(!dir.path().join(".value.json.tmp").exists());
        assert!(path.is_dir());
    }

    #[test]
    fn test_write_json_overwrites() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("value.json");
        fs::write(&path, "stale").unwrap();
        write_json(&path, &GeoTree::new(), Precision::Tenths).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "{}\n");
    }
}
