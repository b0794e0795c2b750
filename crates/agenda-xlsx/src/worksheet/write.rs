use std::fmt::Write as _;

use agenda_model::{Cell, CellValue, DocumentGrid, MergedRegion, Row};
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use super::{needs_space_preserve, prefixed_tag};
use crate::XlsxError;

fn insert_before_tag(name: &[u8]) -> bool {
    matches!(
        name,
        // Elements that come after <mergeCells> in the SpreadsheetML schema.
        b"phoneticPr"
            | b"conditionalFormatting"
            | b"dataValidations"
            | b"hyperlinks"
            | b"printOptions"
            | b"pageMargins"
            | b"pageSetup"
            | b"headerFooter"
            | b"rowBreaks"
            | b"colBreaks"
            | b"customProperties"
            | b"cellWatches"
            | b"ignoredErrors"
            | b"smartTags"
            | b"drawing"
            | b"legacyDrawing"
            | b"legacyDrawingHF"
            | b"drawingHF"
            | b"picture"
            | b"oleObjects"
            | b"controls"
            | b"webPublishItems"
            | b"tableParts"
            | b"extLst"
    )
}

/// Render a standalone `<mergeCells>` block (used by the fixture writer).
#[must_use]
pub fn write_merge_cells_section(merges: &[MergedRegion]) -> String {
    if merges.is_empty() {
        return String::new();
    }

    let mut out = String::new();
    let _ = writeln!(out, r#"<mergeCells count="{}">"#, merges.len());
    for merge in merges {
        let _ = writeln!(out, r#"  <mergeCell ref="{}"/>"#, merge.to_range());
    }
    out.push_str("</mergeCells>\n");
    out
}

/// Rewrite a worksheet part so its cell data and merges match `grid`.
///
/// `<sheetData>` and `<mergeCells>` are regenerated and `<dimension>` is updated; every
/// other element (views, columns, page setup, drawings, extensions, ...) is copied
/// through unchanged. A missing `<mergeCells>` is inserted before the first element
/// the schema requires to follow it.
pub fn update_worksheet_xml(sheet_xml: &str, grid: &DocumentGrid) -> Result<String, XlsxError> {
    let mut reader = Reader::from_str(sheet_xml);
    reader.config_mut().trim_text(false);

    let mut writer = Writer::new(Vec::new());
    let mut buf = Vec::new();

    let merges: Vec<MergedRegion> = grid.merges().iter().copied().collect();
    let dimension = grid
        .used_range()
        .map(|r| r.to_string())
        .unwrap_or_else(|| "A1".to_string());

    let mut prefix: Option<String> = None;
    let mut skip_depth: usize = 0;
    let mut merges_written = false;

    loop {
        let event = reader.read_event_into(&mut buf)?;
        match event {
            Event::Eof => break,
            _ if skip_depth > 0 => match event {
                Event::Start(_) => skip_depth += 1,
                Event::End(_) => skip_depth -= 1,
                _ => {}
            },
            Event::Start(ref e) if e.local_name().as_ref() == b"worksheet" => {
                prefix = element_prefix(e)?;
                writer.write_event(event.borrow())?;
            }
            Event::Start(ref e) if e.local_name().as_ref() == b"sheetData" => {
                write_sheet_data(&mut writer, grid, prefix.as_deref())?;
                skip_depth = 1;
            }
            Event::Empty(ref e) if e.local_name().as_ref() == b"sheetData" => {
                write_sheet_data(&mut writer, grid, prefix.as_deref())?;
            }
            Event::Empty(ref e) if e.local_name().as_ref() == b"dimension" => {
                let mut dim = BytesStart::new(prefixed_tag(prefix.as_deref(), "dimension"));
                dim.push_attribute(("ref", dimension.as_str()));
                writer.write_event(Event::Empty(dim))?;
            }
            Event::Start(ref e) if e.local_name().as_ref() == b"mergeCells" => {
                merges_written = true;
                write_merge_cells_block(&mut writer, &merges, prefix.as_deref())?;
                skip_depth = 1;
            }
            Event::Empty(ref e) if e.local_name().as_ref() == b"mergeCells" => {
                merges_written = true;
                write_merge_cells_block(&mut writer, &merges, prefix.as_deref())?;
            }
            Event::Start(ref e) | Event::Empty(ref e)
                if !merges_written && insert_before_tag(e.local_name().as_ref()) =>
            {
                merges_written = true;
                write_merge_cells_block(&mut writer, &merges, prefix.as_deref())?;
                writer.write_event(event.borrow())?;
            }
            Event::End(ref e) if e.local_name().as_ref() == b"worksheet" => {
                if !merges_written {
                    merges_written = true;
                    write_merge_cells_block(&mut writer, &merges, prefix.as_deref())?;
                }
                writer.write_event(event.borrow())?;
            }
            _ => writer.write_event(event.borrow())?,
        }
        buf.clear();
    }

    Ok(String::from_utf8(writer.into_inner())?)
}

fn element_prefix(e: &BytesStart<'_>) -> Result<Option<String>, XlsxError> {
    let name = std::str::from_utf8(e.name().into_inner())?;
    Ok(name.split_once(':').map(|(p, _)| p.to_string()))
}

fn write_merge_cells_block<W: std::io::Write>(
    writer: &mut Writer<W>,
    merges: &[MergedRegion],
    prefix: Option<&str>,
) -> Result<(), XlsxError> {
    if merges.is_empty() {
        return Ok(());
    }
    let merge_cells_tag = prefixed_tag(prefix, "mergeCells");
    let merge_cell_tag = prefixed_tag(prefix, "mergeCell");
    let count = merges.len().to_string();
    let mut start = BytesStart::new(merge_cells_tag.as_str());
    start.push_attribute(("count", count.as_str()));
    writer.write_event(Event::Start(start))?;

    for merge in merges {
        let range = merge.to_range().to_string();
        let mut elem = BytesStart::new(merge_cell_tag.as_str());
        elem.push_attribute(("ref", range.as_str()));
        writer.write_event(Event::Empty(elem))?;
    }

    writer.write_event(Event::End(BytesEnd::new(merge_cells_tag.as_str())))?;
    Ok(())
}

fn write_sheet_data<W: std::io::Write>(
    writer: &mut Writer<W>,
    grid: &DocumentGrid,
    prefix: Option<&str>,
) -> Result<(), XlsxError> {
    let sheet_data_tag = prefixed_tag(prefix, "sheetData");
    if grid.row_count() == 0 {
        writer.write_event(Event::Empty(BytesStart::new(sheet_data_tag.as_str())))?;
        return Ok(());
    }

    writer.write_event(Event::Start(BytesStart::new(sheet_data_tag.as_str())))?;
    for (row_num, row) in grid.rows() {
        write_row(writer, row_num, row, prefix)?;
    }
    writer.write_event(Event::End(BytesEnd::new(sheet_data_tag.as_str())))?;
    Ok(())
}

fn write_row<W: std::io::Write>(
    writer: &mut Writer<W>,
    row_num: u32,
    row: &Row,
    prefix: Option<&str>,
) -> Result<(), XlsxError> {
    let row_tag = prefixed_tag(prefix, "row");
    let props = &row.props;

    let mut start = BytesStart::new(row_tag.as_str());
    start.push_attribute(("r", row_num.to_string().as_str()));
    if let Some(style) = props.style_id {
        start.push_attribute(("s", style.to_string().as_str()));
    }
    if props.custom_format {
        start.push_attribute(("customFormat", "1"));
    }
    if let Some(height) = props.height {
        start.push_attribute(("ht", height.to_string().as_str()));
    }
    if props.hidden {
        start.push_attribute(("hidden", "1"));
    }
    if props.custom_height {
        start.push_attribute(("customHeight", "1"));
    }
    for (key, value) in &props.extra_attrs {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    if row.cells.is_empty() {
        writer.write_event(Event::Empty(start))?;
        return Ok(());
    }

    writer.write_event(Event::Start(start))?;
    for (col, cell) in &row.cells {
        write_cell(writer, row_num, *col, cell, prefix)?;
    }
    writer.write_event(Event::End(BytesEnd::new(row_tag.as_str())))?;
    Ok(())
}

fn write_cell<W: std::io::Write>(
    writer: &mut Writer<W>,
    row: u32,
    col: u32,
    cell: &Cell,
    prefix: Option<&str>,
) -> Result<(), XlsxError> {
    let c_tag = prefixed_tag(prefix, "c");
    let reference = agenda_model::CellRef::new(row, col).to_a1();

    let (cell_type, cached): (Option<&str>, Option<String>) = match (&cell.value, cell.shared_string) {
        (CellValue::Text(_), Some(idx)) => (Some("s"), Some(idx.to_string())),
        (CellValue::Text(text), None) if cell.formula.is_some() => (Some("str"), Some(text.clone())),
        (CellValue::Text(_), None) => (Some("inlineStr"), None),
        (CellValue::Number(n), _) => (None, Some(n.to_string())),
        (CellValue::Boolean(b), _) => (Some("b"), Some(if *b { "1" } else { "0" }.to_string())),
        (CellValue::Error(e), _) => (Some("e"), Some(e.clone())),
        (CellValue::Empty, _) => (None, None),
    };

    let mut start = BytesStart::new(c_tag.as_str());
    start.push_attribute(("r", reference.as_str()));
    if let Some(style) = cell.style_id {
        start.push_attribute(("s", style.to_string().as_str()));
    }
    if let Some(t) = cell_type {
        start.push_attribute(("t", t));
    }

    let inline = match (&cell.value, cell_type) {
        (CellValue::Text(text), Some("inlineStr")) => Some(text.as_str()),
        _ => None,
    };
    if cell.formula.is_none() && cached.is_none() && inline.is_none() {
        writer.write_event(Event::Empty(start))?;
        return Ok(());
    }

    writer.write_event(Event::Start(start))?;
    if let Some(formula) = &cell.formula {
        let f_tag = prefixed_tag(prefix, "f");
        let mut f = BytesStart::new(f_tag.as_str());
        for (key, value) in &formula.attrs {
            f.push_attribute((key.as_str(), value.as_str()));
        }
        if formula.text.is_empty() {
            writer.write_event(Event::Empty(f))?;
        } else {
            writer.write_event(Event::Start(f))?;
            writer.write_event(Event::Text(BytesText::new(&formula.text)))?;
            writer.write_event(Event::End(BytesEnd::new(f_tag.as_str())))?;
        }
    }
    if let Some(text) = inline {
        let is_tag = prefixed_tag(prefix, "is");
        let t_tag = prefixed_tag(prefix, "t");
        writer.write_event(Event::Start(BytesStart::new(is_tag.as_str())))?;
        let mut t = BytesStart::new(t_tag.as_str());
        if needs_space_preserve(text) {
            t.push_attribute(("xml:space", "preserve"));
        }
        writer.write_event(Event::Start(t))?;
        writer.write_event(Event::Text(BytesText::new(text)))?;
        writer.write_event(Event::End(BytesEnd::new(t_tag.as_str())))?;
        writer.write_event(Event::End(BytesEnd::new(is_tag.as_str())))?;
    }
    if let Some(v) = cached {
        let v_tag = prefixed_tag(prefix, "v");
        writer.write_event(Event::Start(BytesStart::new(v_tag.as_str())))?;
        writer.write_event(Event::Text(BytesText::new(&v)))?;
        writer.write_event(Event::End(BytesEnd::new(v_tag.as_str())))?;
    }
    writer.write_event(Event::End(BytesEnd::new(c_tag.as_str())))?;
    Ok(())
}
