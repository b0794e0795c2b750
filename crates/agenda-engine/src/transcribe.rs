//! Plain-text rendering of a template's first sheet for the analysis service.
//!
//! ```text
//! === Sheet: Agenda ===
//! Format: [Row,Column] Content
//!
//! [R1,C1] {{CLUB_NAME}}
//! [R5,C1] Timer
//! ```

use std::fmt::Write as _;

use agenda_model::{CellValue, DocumentGrid};
use agenda_xlsx::{TemplateWorkbook, XlsxError};

/// Transcribe every non-empty cell of `grid`, row-major, 1-indexed.
pub fn transcribe_grid(sheet_name: &str, grid: &DocumentGrid) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== Sheet: {sheet_name} ===");
    out.push_str("Format: [Row,Column] Content\n\n");

    for (row, r) in grid.rows() {
        for (col, cell) in &r.cells {
            let text = match &cell.value {
                CellValue::Text(s) => s.trim().to_string(),
                CellValue::Number(_) | CellValue::Boolean(_) => cell.value.to_string(),
                CellValue::Empty | CellValue::Error(_) => continue,
            };
            if !text.is_empty() {
                let _ = writeln!(out, "[R{row},C{col}] {text}");
            }
        }
    }
    out.push('\n');
    out
}

/// Open an XLSX template and transcribe its first sheet.
pub fn transcribe_template(bytes: &[u8]) -> Result<String, XlsxError> {
    let workbook = TemplateWorkbook::from_bytes(bytes)?;
    Ok(transcribe_grid(workbook.sheet_name(), workbook.grid()))
}
