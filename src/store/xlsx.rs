//! Single-sheet xlsx encoding and decoding.
//!
//! Writing produces a minimal Office Open XML package: content types,
//! package and workbook relationships, the workbook, one worksheet and a
//! stylesheet. Strings are written as inline strings so no shared-string
//! table is needed; numbers are plain numeric cells; empty cells are omitted.
//! Integers of magnitude 2^53 and above do not survive as spreadsheet
//! numbers and are written as inline strings of their digits.
//!
//! Reading goes through calamine, which handles workbooks saved by Excel or
//! LibreOffice as well as our own.

use crate::coerce::{float_cell, MAX_EXACT_F64_INT};
use crate::error::{BtbError, Result};
use crate::table::Cell;
use calamine::{Data, Reader, Xlsx};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

const SPREADSHEET_NS: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const RELATIONSHIPS_NS: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/><Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/></Types>"#;

const PACKAGE_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#;

const WORKBOOK_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/></Relationships>"#;

const STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><fonts count="1"><font><sz val="11"/><name val="Calibri"/></font></fonts><fills count="2"><fill><patternFill patternType="none"/></fill><fill><patternFill patternType="gray125"/></fill></fills><borders count="1"><border><left/><right/><top/><bottom/><diagonal/></border></borders><cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs><cellXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/></cellXfs><cellStyles count="1"><cellStyle name="Normal" xfId="0" builtinId="0"/></cellStyles></styleSheet>"#;

/// Encode `rows` as a workbook holding one sheet named `sheet_name`.
///
/// The first row is written like any other; callers put their header there.
pub fn write_workbook(sheet_name: &str, rows: &[Vec<Cell>]) -> Result<Vec<u8>> {
    let workbook = workbook_xml(sheet_name).map_err(|e| BtbError::workbook(sheet_name, e))?;
    let sheet = sheet_xml(rows).map_err(|e| BtbError::workbook(sheet_name, e))?;

    let parts: [(&str, &[u8]); 6] = [
        ("[Content_Types].xml", CONTENT_TYPES.as_bytes()),
        ("_rels/.rels", PACKAGE_RELS.as_bytes()),
        ("xl/workbook.xml", workbook.as_slice()),
        ("xl/_rels/workbook.xml.rels", WORKBOOK_RELS.as_bytes()),
        ("xl/worksheets/sheet1.xml", sheet.as_slice()),
        ("xl/styles.xml", STYLES.as_bytes()),
    ];

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    for (name, data) in parts {
        zip.start_file(name, options)
            .map_err(|e| BtbError::workbook(sheet_name, e))?;
        zip.write_all(data)
            .map_err(|e| BtbError::workbook(sheet_name, e))?;
    }
    let cursor = zip.finish().map_err(|e| BtbError::workbook(sheet_name, e))?;
    Ok(cursor.into_inner())
}

/// Read every row of sheet `sheet_name`.
///
/// Returns `Ok(None)` when the workbook has no sheet of that name. Rows are
/// padded so that column `0` of the result is column `A` of the sheet; blank
/// rows above the first used row are skipped.
pub fn read_sheet(bytes: &[u8], source_name: &str, sheet_name: &str) -> Result<Option<Vec<Vec<Cell>>>> {
    let mut workbook =
        Xlsx::new(Cursor::new(bytes)).map_err(|e| BtbError::workbook(source_name, e))?;

    if !workbook.sheet_names().iter().any(|s| s == sheet_name) {
        return Ok(None);
    }
    let range = workbook
        .worksheet_range(sheet_name)
        .map_err(|e| BtbError::workbook(source_name, e))?;

    // The range starts at the first used cell, not necessarily at A1.
    let col_offset = range.start().map_or(0, |(_, c)| c as usize);

    let rows = range
        .rows()
        .map(|row| {
            let mut cells = vec![Cell::Empty; col_offset];
            cells.extend(row.iter().map(cell_from_data));
            cells
        })
        .collect();
    Ok(Some(rows))
}

fn cell_from_data(data: &Data) -> Cell {
    match data {
        Data::Empty => Cell::Empty,
        Data::Int(i) => Cell::Integer(*i),
        Data::Float(f) => float_cell(*f),
        Data::String(s) => Cell::Text(s.clone()),
        Data::Bool(b) => Cell::Text(if *b { "TRUE" } else { "FALSE" }.to_string()),
        Data::DateTime(dt) => float_cell(dt.as_f64()),
        other => Cell::Text(other.to_string()),
    }
}

// ── XML parts ────────────────────────────────────────────────────────────

fn workbook_xml(sheet_name: &str) -> std::result::Result<Vec<u8>, quick_xml::Error> {
    let mut w = Writer::new(Vec::new());
    w.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))?;
    w.write_event(Event::Start(
        BytesStart::new("workbook")
            .with_attributes([("xmlns", SPREADSHEET_NS), ("xmlns:r", RELATIONSHIPS_NS)]),
    ))?;
    w.write_event(Event::Start(BytesStart::new("sheets")))?;
    w.write_event(Event::Empty(BytesStart::new("sheet").with_attributes([
        ("name", sheet_name),
        ("sheetId", "1"),
        ("r:id", "rId1"),
    ])))?;
    w.write_event(Event::End(BytesEnd::new("sheets")))?;
    w.write_event(Event::End(BytesEnd::new("workbook")))?;
    Ok(w.into_inner())
}

fn sheet_xml(rows: &[Vec<Cell>]) -> std::result::Result<Vec<u8>, quick_xml::Error> {
    let width = rows.iter().map(Vec::len).max().unwrap_or(0);

    let mut w = Writer::new(Vec::new());
    w.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))?;
    w.write_event(Event::Start(
        BytesStart::new("worksheet").with_attributes([("xmlns", SPREADSHEET_NS)]),
    ))?;
    if width > 0 && !rows.is_empty() {
        let dimension = format!("A1:{}{}", column_name(width - 1), rows.len());
        w.write_event(Event::Empty(
            BytesStart::new("dimension").with_attributes([("ref", dimension.as_str())]),
        ))?;
    }
    w.write_event(Event::Start(BytesStart::new("sheetData")))?;

    for (r, row) in rows.iter().enumerate() {
        let row_num = (r + 1).to_string();
        w.write_event(Event::Start(
            BytesStart::new("row").with_attributes([("r", row_num.as_str())]),
        ))?;
        for (c, cell) in row.iter().enumerate() {
            let reference = format!("{}{}", column_name(c), row_num);
            match cell {
                Cell::Empty => {}
                Cell::Text(s) if s.is_empty() => {}
                // Spreadsheet numbers are doubles; keep wider integers exact as text.
                Cell::Integer(i) if (*i as f64).abs() >= MAX_EXACT_F64_INT => {
                    write_inline_string(&mut w, &reference, &i.to_string())?
                }
                Cell::Integer(i) => write_number(&mut w, &reference, &i.to_string())?,
                Cell::Number(n) => write_number(&mut w, &reference, &n.to_string())?,
                Cell::Text(s) => write_inline_string(&mut w, &reference, s)?,
            }
        }
        w.write_event(Event::End(BytesEnd::new("row")))?;
    }

    w.write_event(Event::End(BytesEnd::new("sheetData")))?;
    w.write_event(Event::End(BytesEnd::new("worksheet")))?;
    Ok(w.into_inner())
}

fn write_number(
    w: &mut Writer<Vec<u8>>,
    reference: &str,
    value: &str,
) -> std::result::Result<(), quick_xml::Error> {
    w.write_event(Event::Start(
        BytesStart::new("c").with_attributes([("r", reference)]),
    ))?;
    w.write_event(Event::Start(BytesStart::new("v")))?;
    w.write_event(Event::Text(BytesText::new(value)))?;
    w.write_event(Event::End(BytesEnd::new("v")))?;
    w.write_event(Event::End(BytesEnd::new("c")))?;
    Ok(())
}

fn write_inline_string(
    w: &mut Writer<Vec<u8>>,
    reference: &str,
    value: &str,
) -> std::result::Result<(), quick_xml::Error> {
    let value = xml_safe(value);
    w.write_event(Event::Start(
        BytesStart::new("c").with_attributes([("r", reference), ("t", "inlineStr")]),
    ))?;
    w.write_event(Event::Start(BytesStart::new("is")))?;
    w.write_event(Event::Start(
        BytesStart::new("t").with_attributes([("xml:space", "preserve")]),
    ))?;
    w.write_event(Event::Text(BytesText::new(&value)))?;
    w.write_event(Event::End(BytesEnd::new("t")))?;
    w.write_event(Event::End(BytesEnd::new("is")))?;
    w.write_event(Event::End(BytesEnd::new("c")))?;
    Ok(())
}

/// Drop characters XML 1.0 cannot carry.
fn xml_safe(s: &str) -> String {
    s.chars()
        .filter(|&c| matches!(c, '\t' | '\n' | '\r') || (c >= ' ' && c != '\u{FFFE}' && c != '\u{FFFF}'))
        .collect()
}

/// Spreadsheet column letters for a 0-based index: `0 → A`, `26 → AA`.
pub(crate) fn column_name(index: usize) -> String {
    let mut n = index + 1;
    let mut name = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        name.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    name.reverse();
    String::from_utf8(name).unwrap_or_default()
}
