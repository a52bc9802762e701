//! Cell indentation straight from the `.xlsx` package.
//!
//! calamine hands back values only, so the alignment indent of each cell is resolved
//! here from the raw parts:
//!   `xl/workbook.xml` + its rels → worksheet part for the sheet name,
//!   `xl/styles.xml` `<cellXfs>`   → indent per style index,
//!   worksheet `<c r=".." s="..">` → style index per cell.

use anyhow::{Context, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader as XmlReader;
use std::{collections::HashMap, fs::File, io::Read, path::Path};
use tracing::debug;
use zip::ZipArchive;

use super::utils::parse_cell_ref;

/// Map of 0-based `(row, col)` → indent level, for every cell whose style indents it.
pub fn load_cell_indents(path: &Path, sheet: &str) -> Result<HashMap<(u32, u32), u8>> {
    let file =
        File::open(path).with_context(|| format!("Failed to open workbook file: {:?}", path))?;
    let mut archive = ZipArchive::new(file)
        .with_context(|| format!("Failed to read workbook package: {:?}", path))?;

    let workbook_xml = read_zip_file(&mut archive, "xl/workbook.xml")?;
    let rels_xml = read_zip_file(&mut archive, "xl/_rels/workbook.xml.rels")?;
    let sheet_path = resolve_sheet_path(&workbook_xml, &rels_xml, sheet)
        .with_context(|| format!("Sheet '{}' has no worksheet part in {:?}", sheet, path))?;

    // a workbook without a styles part has no indentation at all
    let xf_indents = match read_zip_file(&mut archive, "xl/styles.xml") {
        Ok(xml) => parse_xf_indents(&xml),
        Err(_) => Vec::new(),
    };
    if xf_indents.iter().all(|&indent| indent == 0) {
        debug!(sheet, "no indented cell styles");
        return Ok(HashMap::new());
    }

    let sheet_xml = read_zip_file(&mut archive, &sheet_path)?;
    Ok(parse_sheet_indents(&sheet_xml, &xf_indents))
}

fn read_zip_file(archive: &mut ZipArchive<File>, path: &str) -> Result<String> {
    let mut entry = archive
        .by_name(path)
        .with_context(|| format!("Missing package part {}", path))?;
    let mut content = String::with_capacity(entry.size() as usize);
    entry
        .read_to_string(&mut content)
        .with_context(|| format!("Failed to read package part {}", path))?;
    Ok(content)
}

fn attr(e: &BytesStart, name: &[u8]) -> Option<String> {
    e.attributes()
        .filter_map(std::result::Result::ok)
        .find(|a| a.key.local_name().as_ref() == name)
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

/// Find the package path of `sheet` via its relationship id.
pub fn resolve_sheet_path(workbook_xml: &str, rels_xml: &str, sheet: &str) -> Option<String> {
    let rel_id = find_element_attr(workbook_xml, b"sheet", |e| {
        (attr(e, b"name").as_deref() == Some(sheet)).then(|| attr(e, b"id"))?
    })?;
    let target = find_element_attr(rels_xml, b"Relationship", |e| {
        (attr(e, b"Id").as_deref() == Some(rel_id.as_str())).then(|| attr(e, b"Target"))?
    })?;

    Some(match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("xl/{}", target),
    })
}

/// First `Some` produced by `pick` over elements named `element`.
fn find_element_attr<F>(xml: &str, element: &[u8], mut pick: F) -> Option<String>
where
    F: FnMut(&BytesStart) -> Option<String>,
{
    let mut reader = XmlReader::from_str(xml);
    reader.trim_text(true);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e) | Event::Empty(e)) if e.local_name().as_ref() == element => {
                if let Some(found) = pick(&e) {
                    return Some(found);
                }
            }
            Ok(Event::Eof) | Err(_) => return None,
            _ => {}
        }
        buf.clear();
    }
}

/// Indent level of every `<xf>` in `<cellXfs>`, indexed by style id.
pub fn parse_xf_indents(styles_xml: &str) -> Vec<u8> {
    let mut reader = XmlReader::from_str(styles_xml);
    reader.trim_text(true);
    let mut buf = Vec::new();
    let mut in_cell_xfs = false;
    let mut indents = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"cellXfs" => in_cell_xfs = true,
            Ok(Event::End(e)) if e.local_name().as_ref() == b"cellXfs" => in_cell_xfs = false,
            Ok(Event::Start(e) | Event::Empty(e)) if in_cell_xfs => {
                match e.local_name().as_ref() {
                    b"xf" => indents.push(0),
                    b"alignment" => {
                        let level = attr(&e, b"indent")
                            .and_then(|v| v.trim().parse::<u32>().ok())
                            .unwrap_or(0)
                            .min(u8::MAX as u32) as u8;
                        if let Some(last) = indents.last_mut() {
                            *last = level;
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    indents
}

/// Walk `<row>`/`<c>` elements and keep every cell whose style carries an indent.
pub fn parse_sheet_indents(sheet_xml: &str, xf_indents: &[u8]) -> HashMap<(u32, u32), u8> {
    let mut reader = XmlReader::from_str(sheet_xml);
    reader.trim_text(true);
    let mut buf = Vec::new();
    let mut out = HashMap::new();

    // cells and rows may omit `r`; fall back to document position
    let mut current_row: Option<u32> = None;
    let mut next_col: u32 = 0;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e) | Event::Empty(e)) => match e.local_name().as_ref() {
                b"row" => {
                    let row = attr(&e, b"r")
                        .and_then(|r| r.trim().parse::<u32>().ok())
                        .and_then(|r| r.checked_sub(1))
                        .unwrap_or_else(|| current_row.map_or(0, |r| r + 1));
                    current_row = Some(row);
                    next_col = 0;
                }
                b"c" => {
                    let (row, col) = attr(&e, b"r")
                        .and_then(|r| parse_cell_ref(&r))
                        .unwrap_or((current_row.unwrap_or(0), next_col));
                    next_col = col + 1;

                    let style = attr(&e, b"s")
                        .and_then(|s| s.trim().parse::<usize>().ok())
                        .unwrap_or(0);
                    let indent = xf_indents.get(style).copied().unwrap_or(0);
                    if indent > 0 {
                        out.insert((row, col), indent);
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use rust_xlsxwriter::{Format, Workbook};
    use tempfile::tempdir;

    const STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
  <cellStyleXfs count="1"><xf numFmtId="0" fontId="0"><alignment indent="7"/></xf></cellStyleXfs>
  <cellXfs count="4">
    <xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/>
    <xf numFmtId="0" fontId="0" applyAlignment="1"><alignment horizontal="left" indent="1"/></xf>
    <xf numFmtId="0" fontId="0" applyAlignment="1"><alignment horizontal="left" indent="2"/></xf>
    <xf numFmtId="0" fontId="0" applyAlignment="1"><alignment wrapText="1"/></xf>
  </cellXfs>
</styleSheet>"#;

    #[test]
    fn test_parse_xf_indents_ignores_cell_style_xfs() {
        assert_eq!(parse_xf_indents(STYLES), vec![0, 1, 2, 0]);
    }

    #[test]
    fn test_parse_sheet_indents() {
        let sheet = r#"<worksheet><sheetData>
            <row r="2"><c r="A2" t="s"><v>0</v></c><c r="B2"><v>1</v></c></row>
            <row r="3"><c r="A3" s="1" t="s"><v>1</v></c></row>
            <row><c s="2" t="s"><v>2</v></c><c s="3"><v>5</v></c></row>
        </sheetData></worksheet>"#;
        let indents = parse_sheet_indents(sheet, &parse_xf_indents(STYLES));
        assert_eq!(indents.len(), 2);
        assert_eq!(indents.get(&(2, 0)), Some(&1));
        assert_eq!(indents.get(&(3, 0)), Some(&2));
    }

    #[test]
    fn test_resolve_sheet_path() {
        let workbook = r#"<workbook xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
            <sheets>
              <sheet name="Summary" sheetId="1" r:id="rId1"/>
              <sheet name="Value" sheetId="2" r:id="rId2"/>
            </sheets></workbook>"#;
        let rels = r#"<Relationships>
            <Relationship Id="rId1" Type="worksheet" Target="worksheets/sheet1.xml"/>
            <Relationship Id="rId2" Type="worksheet" Target="/xl/worksheets/sheet2.xml"/>
            </Relationships>"#;
        assert_eq!(
            resolve_sheet_path(workbook, rels, "Summary").as_deref(),
            Some("xl/worksheets/sheet1.xml")
        );
        assert_eq!(
            resolve_sheet_path(workbook, rels, "Value").as_deref(),
            Some("xl/worksheets/sheet2.xml")
        );
        assert_eq!(resolve_sheet_path(workbook, rels, "Volume"), None);
    }

    #[test]
    fn test_load_cell_indents_from_written_workbook() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("indents.xlsx");

        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        worksheet.set_name("Value")?;
        worksheet.write_string(0, 0, "Segment")?;
        worksheet.write_string(1, 0, "Global")?;
        worksheet.write_string_with_format(2, 0, "By Product", &Format::new().set_indent(1))?;
        worksheet.write_string_with_format(3, 0, "Combo", &Format::new().set_indent(2))?;
        worksheet.write_number(3, 1, 100.0)?;
        workbook.save(&path)?;

        let indents = load_cell_indents(&path, "Value")?;
        assert_eq!(indents.get(&(1, 0)), None);
        assert_eq!(indents.get(&(2, 0)), Some(&1));
        assert_eq!(indents.get(&(3, 0)), Some(&2));
        assert_eq!(indents.get(&(3, 1)), None);

        assert!(load_cell_indents(&path, "Missing").is_err());
        Ok(())
    }
}
