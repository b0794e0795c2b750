use agenda_model::DocumentGrid;
use quick_xml::events::{BytesStart, Event};
use quick_xml::{Reader, Writer};

use crate::relationships::{parse_relationships, rels_for_part, resolve_target};
use crate::shared_strings::parse_shared_strings_xml;
use crate::workbook::parse_workbook_sheets;
use crate::worksheet::{read_worksheet_grid, update_worksheet_xml};
use crate::{XlsxError, XlsxPackage, XlsxPackageLimits};

const REL_TYPE_OFFICE_DOCUMENT: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";
const DEFAULT_WORKBOOK_PART: &str = "xl/workbook.xml";
const DEFAULT_WORKSHEET_PART: &str = "xl/worksheets/sheet1.xml";
const CONTENT_TYPES_PART: &str = "[Content_Types].xml";

/// An agenda template opened for filling: the whole package plus the first worksheet
/// parsed into a grid.
#[derive(Debug, Clone)]
pub struct TemplateWorkbook {
    package: XlsxPackage,
    workbook_part: String,
    sheet_name: String,
    sheet_part: String,
    grid: DocumentGrid,
}

impl TemplateWorkbook {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, XlsxError> {
        Self::from_bytes_limited(bytes, XlsxPackageLimits::default())
    }

    pub fn from_bytes_limited(bytes: &[u8], limits: XlsxPackageLimits) -> Result<Self, XlsxError> {
        let package = XlsxPackage::from_bytes_limited(bytes, limits)?;
        let workbook_part = find_workbook_part(&package)?;
        let workbook_rels = match package.part(&rels_for_part(&workbook_part)) {
            Some(bytes) => parse_relationships(bytes)?,
            None => Vec::new(),
        };

        let sheets = parse_workbook_sheets(package.part_str(&workbook_part)?)?;
        let first = sheets
            .first()
            .ok_or_else(|| XlsxError::Invalid("workbook has no sheets".to_string()))?;
        let sheet_part = first
            .rel_id
            .as_deref()
            .and_then(|id| workbook_rels.iter().find(|rel| rel.id == id))
            .filter(|rel| !rel.is_external())
            .map(|rel| resolve_target(&workbook_part, &rel.target))
            .filter(|part| package.part(part).is_some())
            .unwrap_or_else(|| DEFAULT_WORKSHEET_PART.to_string());

        let shared_strings_part = workbook_rels
            .iter()
            .find(|rel| rel.type_uri.ends_with("/sharedStrings"))
            .map(|rel| resolve_target(&workbook_part, &rel.target))
            .unwrap_or_else(|| "xl/sharedStrings.xml".to_string());
        let shared_strings = match package.part(&shared_strings_part) {
            Some(bytes) => parse_shared_strings_xml(std::str::from_utf8(bytes)?)?,
            None => Vec::new(),
        };

        let grid = read_worksheet_grid(package.part_str(&sheet_part)?, &shared_strings)?;
        log::debug!(
            "loaded template sheet {:?} from {sheet_part}: {} rows, {} merges",
            first.name,
            grid.row_count(),
            grid.merges().len()
        );

        Ok(Self {
            sheet_name: first.name.clone(),
            package,
            workbook_part,
            sheet_part,
            grid,
        })
    }

    pub fn sheet_name(&self) -> &str {
        &self.sheet_name
    }

    pub fn sheet_part(&self) -> &str {
        &self.sheet_part
    }

    pub fn grid(&self) -> &DocumentGrid {
        &self.grid
    }

    pub fn grid_mut(&mut self) -> &mut DocumentGrid {
        &mut self.grid
    }

    pub fn package(&self) -> &XlsxPackage {
        &self.package
    }

    /// Serialize the filled workbook.
    ///
    /// The calculation chain is dropped: it indexes formula cells by position, and
    /// both replaced formula cells and inserted rows invalidate it. Excel rebuilds it
    /// on open.
    pub fn to_bytes(&self) -> Result<Vec<u8>, XlsxError> {
        let mut package = self.package.clone();
        let sheet_xml = update_worksheet_xml(package.part_str(&self.sheet_part)?, &self.grid)?;
        package.set_part(&self.sheet_part, sheet_xml.into_bytes());
        drop_calc_chain(&mut package, &self.workbook_part)?;
        package.write_to_bytes()
    }
}

fn find_workbook_part(package: &XlsxPackage) -> Result<String, XlsxError> {
    if let Some(bytes) = package.part("_rels/.rels") {
        let office_document = parse_relationships(bytes)?
            .into_iter()
            .find(|rel| rel.type_uri == REL_TYPE_OFFICE_DOCUMENT)
            .map(|rel| resolve_target("", &rel.target));
        if let Some(part) = office_document.filter(|part| package.part(part).is_some()) {
            return Ok(part);
        }
    }
    if package.part(DEFAULT_WORKBOOK_PART).is_some() {
        return Ok(DEFAULT_WORKBOOK_PART.to_string());
    }
    Err(XlsxError::MissingPart(DEFAULT_WORKBOOK_PART.to_string()))
}

fn drop_calc_chain(package: &mut XlsxPackage, workbook_part: &str) -> Result<(), XlsxError> {
    let rels_part = rels_for_part(workbook_part);
    let Some(rels_bytes) = package.part(&rels_part) else {
        return Ok(());
    };
    let Some(calc_chain) = parse_relationships(rels_bytes)?
        .into_iter()
        .find(|rel| rel.type_uri.ends_with("/calcChain"))
    else {
        return Ok(());
    };

    let calc_chain_part = resolve_target(workbook_part, &calc_chain.target);
    package.remove_part(&calc_chain_part);

    let rels_xml = remove_elements(package.part_str(&rels_part)?, b"Relationship", |e| {
        attr_equals(e, b"Id", &calc_chain.id)
    })?;
    package.set_part(&rels_part, rels_xml.into_bytes());

    if package.part(CONTENT_TYPES_PART).is_some() {
        let override_name = format!("/{calc_chain_part}");
        let content_types =
            remove_elements(package.part_str(CONTENT_TYPES_PART)?, b"Override", |e| {
                attr_equals(e, b"PartName", &override_name)
            })?;
        package.set_part(CONTENT_TYPES_PART, content_types.into_bytes());
    }

    log::debug!("dropped {calc_chain_part}");
    Ok(())
}

fn attr_equals(e: &BytesStart<'_>, key: &[u8], expected: &str) -> bool {
    e.attributes()
        .flatten()
        .any(|a| a.key.as_ref() == key && a.unescape_value().is_ok_and(|v| v == expected))
}

/// Copy `xml`, dropping every empty element named `local_name` that matches `remove`.
fn remove_elements(
    xml: &str,
    local_name: &[u8],
    remove: impl Fn(&BytesStart<'_>) -> bool,
) -> Result<String, XlsxError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);
    let mut writer = Writer::new(Vec::new());
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Eof => break,
            Event::Empty(e) if e.local_name().as_ref() == local_name && remove(&e) => {}
            event => writer.write_event(event)?,
        }
        buf.clear();
    }

    Ok(String::from_utf8(writer.into_inner())?)
}
