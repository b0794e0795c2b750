//! A tiny XLSX writer for building template fixtures in tests.
//!
//! Produces a single-sheet workbook with text/number cells, row heights, hidden rows,
//! merges, optional shared strings, and an optional calculation chain.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::io::{Cursor, Write};

use agenda_model::{CellRef, MergedRegion, Range};
use thiserror::Error;
use zip::write::FileOptions;

use crate::worksheet::{needs_space_preserve, write_merge_cells_section};

#[derive(Debug, Error)]
pub enum MinimalXlsxError {
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid cell reference: {0}")]
    InvalidRef(String),
}

#[derive(Debug, Clone)]
enum FixtureValue {
    Text(String),
    Number(f64),
    Formula {
        formula: String,
        cached: f64,
        shared: Option<SharedFormula>,
    },
}

/// `t="shared"` group membership: the master carries the `ref` range.
#[derive(Debug, Clone)]
struct SharedFormula {
    si: u32,
    range: Option<String>,
}

#[derive(Debug, Clone)]
struct FixtureCell {
    value: FixtureValue,
    style: Option<u32>,
}

#[derive(Debug, Clone, Default)]
struct FixtureRow {
    height: Option<f64>,
    hidden: bool,
}

#[derive(Debug, Clone)]
pub struct MinimalWorkbook {
    sheet_name: String,
    cells: Vec<(String, FixtureCell)>,
    rows: BTreeMap<u32, FixtureRow>,
    merges: Vec<String>,
    use_shared_strings: bool,
    extra_sheets: Vec<String>,
}

impl MinimalWorkbook {
    pub fn new(sheet_name: &str) -> Self {
        Self {
            sheet_name: sheet_name.to_string(),
            cells: Vec::new(),
            rows: BTreeMap::new(),
            merges: Vec::new(),
            use_shared_strings: false,
            extra_sheets: Vec::new(),
        }
    }

    pub fn text(mut self, a1: &str, text: &str) -> Self {
        self.push(a1, FixtureValue::Text(text.to_string()), None);
        self
    }

    pub fn styled_text(mut self, a1: &str, text: &str, style: u32) -> Self {
        self.push(a1, FixtureValue::Text(text.to_string()), Some(style));
        self
    }

    pub fn number(mut self, a1: &str, value: f64) -> Self {
        self.push(a1, FixtureValue::Number(value), None);
        self
    }

    /// A blank cell that only carries a style.
    pub fn blank(mut self, a1: &str, style: u32) -> Self {
        self.push(a1, FixtureValue::Text(String::new()), Some(style));
        self
    }

    /// A formula cell; adds `xl/calcChain.xml` to the package.
    pub fn formula(mut self, a1: &str, formula: &str, cached: f64) -> Self {
        self.push(
            a1,
            FixtureValue::Formula {
                formula: formula.to_string(),
                cached,
                shared: None,
            },
            None,
        );
        self
    }

    /// The master cell of shared formula group `si`, covering `range`.
    pub fn shared_formula(mut self, a1: &str, formula: &str, range: &str, si: u32, cached: f64) -> Self {
        self.push(
            a1,
            FixtureValue::Formula {
                formula: formula.to_string(),
                cached,
                shared: Some(SharedFormula {
                    si,
                    range: Some(range.to_string()),
                }),
            },
            None,
        );
        self
    }

    /// A cell that reuses the master formula of shared group `si`.
    pub fn shared_formula_dependent(mut self, a1: &str, si: u32, cached: f64) -> Self {
        self.push(
            a1,
            FixtureValue::Formula {
                formula: String::new(),
                cached,
                shared: Some(SharedFormula { si, range: None }),
            },
            None,
        );
        self
    }

    pub fn row_height(mut self, row: u32, height: f64) -> Self {
        self.rows.entry(row).or_default().height = Some(height);
        self
    }

    pub fn hidden_row(mut self, row: u32) -> Self {
        self.rows.entry(row).or_default().hidden = true;
        self
    }

    pub fn merge(mut self, range: &str) -> Self {
        self.merges.push(range.to_string());
        self
    }

    /// Store text through `xl/sharedStrings.xml` instead of inline strings.
    pub fn shared_strings(mut self) -> Self {
        self.use_shared_strings = true;
        self
    }

    /// Add a trailing, empty worksheet.
    pub fn extra_sheet(mut self, name: &str) -> Self {
        self.extra_sheets.push(name.to_string());
        self
    }

    fn push(&mut self, a1: &str, value: FixtureValue, style: Option<u32>) {
        self.cells.push((a1.to_string(), FixtureCell { value, style }));
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, MinimalXlsxError> {
        let mut cells: BTreeMap<CellRef, &FixtureCell> = BTreeMap::new();
        for (a1, cell) in &self.cells {
            let at = CellRef::from_a1(a1).map_err(|_| MinimalXlsxError::InvalidRef(a1.clone()))?;
            cells.insert(at, cell);
        }
        let merges = self
            .merges
            .iter()
            .map(|r| {
                Range::from_a1(r)
                    .map(MergedRegion::from)
                    .map_err(|_| MinimalXlsxError::InvalidRef(r.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut shared: Vec<String> = Vec::new();
        let sheet_xml = self.worksheet_xml(&cells, &merges, &mut shared);
        let formulas: Vec<CellRef> = cells
            .iter()
            .filter(|(_, c)| matches!(c.value, FixtureValue::Formula { .. }))
            .map(|(at, _)| *at)
            .collect();
        let max_style = cells.values().filter_map(|c| c.style).max().unwrap_or(0);

        let mut parts: Vec<(String, String)> = vec![
            ("[Content_Types].xml".into(), self.content_types_xml(!shared.is_empty(), !formulas.is_empty())),
            ("_rels/.rels".into(), ROOT_RELS.to_string()),
            ("xl/workbook.xml".into(), self.workbook_xml()),
            ("xl/_rels/workbook.xml.rels".into(), self.workbook_rels_xml(!shared.is_empty(), !formulas.is_empty())),
            ("xl/styles.xml".into(), styles_xml(max_style)),
            ("xl/worksheets/sheet1.xml".into(), sheet_xml),
        ];
        for idx in 0..self.extra_sheets.len() {
            parts.push((
                format!("xl/worksheets/sheet{}.xml", idx + 2),
                format!(r#"{XML_DECL}<worksheet xmlns="{MAIN_NS}"><sheetData/></worksheet>"#),
            ));
        }
        if !shared.is_empty() {
            parts.push(("xl/sharedStrings.xml".into(), shared_strings_xml(&shared)));
        }
        if !formulas.is_empty() {
            parts.push(("xl/calcChain.xml".into(), calc_chain_xml(&formulas)));
        }

        let mut buffer = Cursor::new(Vec::new());
        {
            let mut zip = zip::ZipWriter::new(&mut buffer);
            let options =
                FileOptions::<()>::default().compression_method(zip::CompressionMethod::Deflated);
            for (name, xml) in &parts {
                zip.start_file(name.as_str(), options)?;
                zip.write_all(xml.as_bytes())?;
            }
            zip.finish()?;
        }
        Ok(buffer.into_inner())
    }

    fn content_types_xml(&self, shared: bool, calc_chain: bool) -> String {
        let mut out = format!(
            r#"{XML_DECL}<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/>"#
        );
        for idx in 0..=self.extra_sheets.len() {
            let _ = write!(
                out,
                r#"<Override PartName="/xl/worksheets/sheet{}.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#,
                idx + 1
            );
        }
        if shared {
            out.push_str(r#"<Override PartName="/xl/sharedStrings.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sharedStrings+xml"/>"#);
        }
        if calc_chain {
            out.push_str(r#"<Override PartName="/xl/calcChain.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.calcChain+xml"/>"#);
        }
        out.push_str("</Types>");
        out
    }

    fn workbook_xml(&self) -> String {
        let mut out = format!(
            r#"{XML_DECL}<workbook xmlns="{MAIN_NS}" xmlns:r="{REL_NS}"><sheets>"#
        );
        let names = std::iter::once(&self.sheet_name).chain(self.extra_sheets.iter());
        for (idx, name) in names.enumerate() {
            let _ = write!(
                out,
                r#"<sheet name="{}" sheetId="{}" r:id="rId{}"/>"#,
                escape_xml(name),
                idx + 1,
                idx + 10
            );
        }
        out.push_str("</sheets></workbook>");
        out
    }

    fn workbook_rels_xml(&self, shared: bool, calc_chain: bool) -> String {
        let mut out = format!(
            r#"{XML_DECL}<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="{REL_NS}/styles" Target="styles.xml"/>"#
        );
        for idx in 0..=self.extra_sheets.len() {
            let _ = write!(
                out,
                r#"<Relationship Id="rId{}" Type="{REL_NS}/worksheet" Target="worksheets/sheet{}.xml"/>"#,
                idx + 10,
                idx + 1
            );
        }
        if shared {
            let _ = write!(out, r#"<Relationship Id="rId2" Type="{REL_NS}/sharedStrings" Target="sharedStrings.xml"/>"#);
        }
        if calc_chain {
            let _ = write!(out, r#"<Relationship Id="rId3" Type="{REL_NS}/calcChain" Target="calcChain.xml"/>"#);
        }
        out.push_str("</Relationships>");
        out
    }

    fn worksheet_xml(
        &self,
        cells: &BTreeMap<CellRef, &FixtureCell>,
        merges: &[MergedRegion],
        shared: &mut Vec<String>,
    ) -> String {
        let mut by_row: BTreeMap<u32, Vec<(CellRef, &FixtureCell)>> = BTreeMap::new();
        for (at, cell) in cells {
            by_row.entry(at.row).or_default().push((*at, cell));
        }
        for row in self.rows.keys() {
            by_row.entry(*row).or_default();
        }

        let mut out = format!(r#"{XML_DECL}<worksheet xmlns="{MAIN_NS}"><dimension ref="A1"/><sheetData>"#);
        for (row, row_cells) in &by_row {
            let props = self.rows.get(row).cloned().unwrap_or_default();
            let _ = write!(out, r#"<row r="{row}""#);
            if let Some(height) = props.height {
                let _ = write!(out, r#" ht="{height}" customHeight="1""#);
            }
            if props.hidden {
                out.push_str(r#" hidden="1""#);
            }
            out.push('>');
            for (at, cell) in row_cells {
                let style = cell.style.map(|s| format!(r#" s="{s}""#)).unwrap_or_default();
                match &cell.value {
                    FixtureValue::Text(text) if text.is_empty() => {
                        let _ = write!(out, r#"<c r="{at}"{style}/>"#);
                    }
                    FixtureValue::Text(text) if self.use_shared_strings => {
                        let existing = shared.iter().position(|s| s == text);
                        let idx = match existing {
                            Some(idx) => idx,
                            None => {
                                shared.push(text.clone());
                                shared.len() - 1
                            }
                        };
                        let _ = write!(out, r#"<c r="{at}"{style} t="s"><v>{idx}</v></c>"#);
                    }
                    FixtureValue::Text(text) => {
                        let space = if needs_space_preserve(text) { r#" xml:space="preserve""# } else { "" };
                        let _ = write!(
                            out,
                            r#"<c r="{at}"{style} t="inlineStr"><is><t{space}>{}</t></is></c>"#,
                            escape_xml(text)
                        );
                    }
                    FixtureValue::Number(n) => {
                        let _ = write!(out, r#"<c r="{at}"{style}><v>{n}</v></c>"#);
                    }
                    FixtureValue::Formula { formula, cached, shared } => {
                        let attrs = match shared {
                            Some(SharedFormula { si, range: Some(range) }) => {
                                format!(r#" t="shared" ref="{range}" si="{si}""#)
                            }
                            Some(SharedFormula { si, range: None }) => format!(r#" t="shared" si="{si}""#),
                            None => String::new(),
                        };
                        let f = if formula.is_empty() {
                            format!("<f{attrs}/>")
                        } else {
                            format!("<f{attrs}>{}</f>", escape_xml(formula))
                        };
                        let _ = write!(out, r#"<c r="{at}"{style}>{f}<v>{cached}</v></c>"#);
                    }
                }
            }
            out.push_str("</row>");
        }
        out.push_str("</sheetData>");
        out.push_str(&write_merge_cells_section(merges).replace('\n', ""));
        out.push_str(r#"<pageMargins left="0.7" right="0.7" top="0.75" bottom="0.75" header="0.3" footer="0.3"/>"#);
        out.push_str("</worksheet>");
        out
    }
}

const XML_DECL: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;
const MAIN_NS: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const REL_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#;

fn styles_xml(max_style: u32) -> String {
    let mut out = format!(
        r#"{XML_DECL}<styleSheet xmlns="{MAIN_NS}"><fonts count="2"><font><sz val="11"/><name val="Calibri"/></font><font><b/><sz val="11"/><name val="Calibri"/></font></fonts><fills count="1"><fill><patternFill patternType="none"/></fill></fills><borders count="1"><border><left/><right/><top/><bottom/><diagonal/></border></borders><cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs>"#
    );
    let _ = write!(out, r#"<cellXfs count="{}">"#, max_style + 1);
    for idx in 0..=max_style {
        // Odd style ids are bold so tests can tell styles apart.
        let font = idx % 2;
        let _ = write!(
            out,
            r#"<xf numFmtId="0" fontId="{font}" fillId="0" borderId="0" xfId="0"/>"#
        );
    }
    out.push_str(r#"</cellXfs><cellStyles count="1"><cellStyle name="Normal" xfId="0" builtinId="0"/></cellStyles></styleSheet>"#);
    out
}

fn shared_strings_xml(items: &[String]) -> String {
    let mut out = format!(
        r#"{XML_DECL}<sst xmlns="{MAIN_NS}" count="{0}" uniqueCount="{0}">"#,
        items.len()
    );
    for item in items {
        let _ = write!(out, "<si><t>{}</t></si>", escape_xml(item));
    }
    out.push_str("</sst>");
    out
}

fn calc_chain_xml(cells: &[CellRef]) -> String {
    let mut out = format!(r#"{XML_DECL}<calcChain xmlns="{MAIN_NS}">"#);
    for (idx, at) in cells.iter().enumerate() {
        if idx == 0 {
            let _ = write!(out, r#"<c r="{at}" i="1"/>"#);
        } else {
            let _ = write!(out, r#"<c r="{at}"/>"#);
        }
    }
    out.push_str("</calcChain>");
    out
}

fn escape_xml(text: &str) -> String {
    quick_xml::escape::escape(text).into_owned()
}
