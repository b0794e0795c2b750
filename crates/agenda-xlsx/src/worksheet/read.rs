use agenda_model::{
    Cell, CellRef, CellValue, DocumentGrid, Formula, MergedRegion, Range, RowProperties,
};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::parse_xml_bool;
use crate::shared_strings::read_text;
use crate::XlsxError;

/// Load a worksheet's `<sheetData>` and `<mergeCells>` into a [`DocumentGrid`].
///
/// `shared_strings` resolves `t="s"` cells; the shared index is remembered on the cell
/// so unchanged cells can be written back by reference.
pub fn read_worksheet_grid(xml: &str, shared_strings: &[String]) -> Result<DocumentGrid, XlsxError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);

    let mut grid = DocumentGrid::new();
    let mut buf = Vec::new();
    let mut current_row: u32 = 0;
    let mut next_col: u32 = 1;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"row" => {
                let (row, props) = parse_row_attrs(&e, current_row + 1)?;
                current_row = row;
                next_col = 1;
                grid.row_mut(row).props = props;
            }
            Event::Start(e) if e.local_name().as_ref() == b"c" => {
                let (at, cell) = parse_cell(&mut reader, &e, current_row, next_col, shared_strings, true)?;
                next_col = at.col + 1;
                grid.set_cell(at, cell);
            }
            Event::Empty(e) if e.local_name().as_ref() == b"c" => {
                let (at, cell) = parse_cell(&mut reader, &e, current_row, next_col, shared_strings, false)?;
                next_col = at.col + 1;
                grid.set_cell(at, cell);
            }
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"mergeCell" => {
                if let Some(reference) = attr(&e, b"ref")? {
                    let range = Range::from_a1(&reference)
                        .map_err(|_| XlsxError::Invalid(format!("invalid merge cell reference: {reference}")))?;
                    grid.add_merge(MergedRegion::from(range));
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(grid)
}

fn attr(e: &BytesStart<'_>, key: &[u8]) -> Result<Option<String>, XlsxError> {
    for a in e.attributes() {
        let a = a?;
        if a.key.as_ref() == key {
            return Ok(Some(a.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

fn parse_row_attrs(e: &BytesStart<'_>, implicit_row: u32) -> Result<(u32, RowProperties), XlsxError> {
    let mut row = implicit_row;
    let mut props = RowProperties::default();

    for a in e.attributes() {
        let a = a?;
        let value = a.unescape_value()?;
        match a.key.as_ref() {
            b"r" => {
                row = value
                    .trim()
                    .parse()
                    .map_err(|_| XlsxError::Invalid(format!("invalid row number: {value}")))?
            }
            b"ht" => props.height = value.trim().parse().ok(),
            b"customHeight" => props.custom_height = parse_xml_bool(&value),
            b"hidden" => props.hidden = parse_xml_bool(&value),
            b"s" => props.style_id = value.trim().parse().ok(),
            b"customFormat" => props.custom_format = parse_xml_bool(&value),
            // Column span hints go stale as soon as cells are added.
            b"spans" => {}
            key => props
                .extra_attrs
                .push((String::from_utf8_lossy(key).into_owned(), value.into_owned())),
        }
    }

    if row == 0 {
        return Err(XlsxError::Invalid("row number 0".to_string()));
    }
    Ok((row, props))
}

fn parse_cell(
    reader: &mut Reader<&[u8]>,
    e: &BytesStart<'_>,
    current_row: u32,
    next_col: u32,
    shared_strings: &[String],
    has_children: bool,
) -> Result<(CellRef, Cell), XlsxError> {
    let mut at = CellRef::new(current_row.max(1), next_col);
    let mut style_id = None;
    let mut cell_type = None;

    for a in e.attributes() {
        let a = a?;
        let value = a.unescape_value()?;
        match a.key.as_ref() {
            b"r" => {
                at = CellRef::from_a1(&value)
                    .map_err(|err| XlsxError::Invalid(format!("invalid cell reference {value}: {err}")))?
            }
            b"s" => style_id = value.trim().parse().ok(),
            b"t" => cell_type = Some(value.into_owned()),
            _ => {}
        }
    }

    let mut raw_value: Option<String> = None;
    let mut inline_text: Option<String> = None;
    let mut formula: Option<Formula> = None;

    if has_children {
        let mut buf = Vec::new();
        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(child) if child.local_name().as_ref() == b"v" => {
                    raw_value = Some(read_text(reader, child.name())?);
                }
                Event::Start(child) if child.local_name().as_ref() == b"f" => {
                    let attrs = formula_attrs(&child)?;
                    let text = read_text(reader, child.name())?;
                    formula = Some(Formula { text, attrs });
                }
                Event::Empty(child) if child.local_name().as_ref() == b"f" => {
                    formula = Some(Formula {
                        text: String::new(),
                        attrs: formula_attrs(&child)?,
                    });
                }
                Event::Start(child) if child.local_name().as_ref() == b"is" => {
                    inline_text = Some(read_inline_string(reader)?);
                }
                Event::Start(child) => {
                    reader.read_to_end_into(child.name(), &mut Vec::new())?;
                }
                Event::End(end) if end.local_name().as_ref() == b"c" => break,
                Event::Eof => return Err(XlsxError::Invalid("unexpected eof in <c>".to_string())),
                _ => {}
            }
            buf.clear();
        }
    }

    let mut shared_string = None;
    let value = match cell_type.as_deref() {
        Some("s") => match raw_value {
            Some(raw) => {
                let idx: u32 = raw
                    .trim()
                    .parse()
                    .map_err(|_| XlsxError::Invalid(format!("invalid shared string index: {raw}")))?;
                let text = shared_strings.get(idx as usize).ok_or_else(|| {
                    XlsxError::Invalid(format!("shared string index {idx} out of range"))
                })?;
                shared_string = Some(idx);
                CellValue::Text(text.clone())
            }
            None => CellValue::Empty,
        },
        Some("inlineStr") => inline_text.map(CellValue::Text).unwrap_or_default(),
        Some("str") | Some("d") => raw_value.map(CellValue::Text).unwrap_or_default(),
        Some("b") => raw_value
            .map(|v| CellValue::Boolean(parse_xml_bool(&v)))
            .unwrap_or_default(),
        Some("e") => raw_value.map(CellValue::Error).unwrap_or_default(),
        _ => raw_value
            .and_then(|v| v.trim().parse::<f64>().ok())
            .map(CellValue::Number)
            .unwrap_or_default(),
    };

    Ok((
        at,
        Cell {
            value,
            style_id,
            formula,
            shared_string,
        },
    ))
}

fn formula_attrs(e: &BytesStart<'_>) -> Result<Vec<(String, String)>, XlsxError> {
    let mut attrs = Vec::new();
    for a in e.attributes() {
        let a = a?;
        attrs.push((
            String::from_utf8_lossy(a.key.as_ref()).into_owned(),
            a.unescape_value()?.into_owned(),
        ));
    }
    Ok(attrs)
}

/// Visible text of an `<is>` element: direct `<t>` and `<r><t>` runs, no phonetics.
fn read_inline_string(reader: &mut Reader<&[u8]>) -> Result<String, XlsxError> {
    let mut buf = Vec::new();
    let mut text = String::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if e.local_name().as_ref() == b"t" => {
                text.push_str(&read_text(reader, e.name())?);
            }
            Event::Start(e) if e.local_name().as_ref() == b"r" => {}
            Event::Start(e) => {
                reader.read_to_end_into(e.name(), &mut Vec::new())?;
            }
            Event::End(e) if e.local_name().as_ref() == b"is" => break,
            Event::Eof => return Err(XlsxError::Invalid("unexpected eof in <is>".to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(text)
}
