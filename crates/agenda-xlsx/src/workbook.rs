use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::XlsxError;

/// A `<sheet>` entry from `xl/workbook.xml`, in tab order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkbookSheet {
    pub name: String,
    pub sheet_id: Option<u32>,
    /// `r:id` of the worksheet relationship in `xl/_rels/workbook.xml.rels`.
    pub rel_id: Option<String>,
}

pub fn parse_workbook_sheets(workbook_xml: &str) -> Result<Vec<WorkbookSheet>, XlsxError> {
    let mut reader = Reader::from_str(workbook_xml);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut sheets = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Eof => break,
            Event::Empty(e) | Event::Start(e) if e.local_name().as_ref() == b"sheet" => {
                sheets.push(parse_sheet_element(&e)?);
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(sheets)
}

fn parse_sheet_element(e: &BytesStart<'_>) -> Result<WorkbookSheet, XlsxError> {
    let mut name = None;
    let mut sheet_id = None;
    let mut rel_id = None;

    for attr in e.attributes() {
        let attr = attr?;
        match attr.key.as_ref() {
            b"name" => name = Some(attr.unescape_value()?.into_owned()),
            b"sheetId" => sheet_id = attr.unescape_value()?.trim().parse::<u32>().ok(),
            key if key.ends_with(b":id") || key == b"id" => {
                rel_id = Some(attr.unescape_value()?.into_owned())
            }
            _ => {}
        }
    }

    Ok(WorkbookSheet {
        name: name.ok_or(XlsxError::MissingAttr("name"))?,
        sheet_id,
        rel_id,
    })
}
