use serde::{Deserialize, Serialize};

use crate::rewrite::shift_formula_rows;
use crate::CellValue;

/// Excel-compatible maximum rows per worksheet (1,048,576).
pub const EXCEL_MAX_ROWS: u32 = 1_048_576;

/// Excel-compatible maximum columns per worksheet (16,384).
pub const EXCEL_MAX_COLS: u32 = 16_384;

/// A cell formula as stored in the worksheet (`<f>` element).
///
/// Formulas are never evaluated. Row insertion rewrites their row references (see
/// [`Formula::shift_rows`]); otherwise the text and attributes are written back as loaded.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Formula {
    pub text: String,
    /// Raw `<f>` attributes (`t`, `ref`, `si`, ...), in document order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attrs: Vec<(String, String)>,
}

impl Formula {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.iter().find(|(key, _)| key == name).map(|(_, value)| value.as_str())
    }

    /// Moves row references at or below `at` down by `count`, in the formula text and in
    /// the shared/array `ref` range.
    pub fn shift_rows(&mut self, at: u32, count: u32) {
        if !self.text.is_empty() {
            self.text = shift_formula_rows(&self.text, at, count);
        }
        for (key, value) in &mut self.attrs {
            if key == "ref" {
                *value = shift_formula_rows(value, at, count);
            }
        }
    }
}

/// A single worksheet cell.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    #[serde(default)]
    pub value: CellValue,
    /// Index into the workbook's `cellXfs` table.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style_id: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula: Option<Formula>,
    /// Shared string index this value was loaded from.
    ///
    /// Kept while the value is untouched so unchanged cells serialize back to the same
    /// `sharedStrings.xml` entry. Cleared whenever the value is replaced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shared_string: Option<u32>,
}

impl Cell {
    pub fn new(value: CellValue) -> Self {
        Self {
            value,
            ..Self::default()
        }
    }

    /// A value-less cell that only carries formatting.
    pub fn styled(style_id: Option<u32>) -> Self {
        Self {
            style_id,
            ..Self::default()
        }
    }

    /// Returns true if the cell has no value, formula, or style.
    pub fn is_truly_empty(&self) -> bool {
        self.value.is_empty() && self.formula.is_none() && self.style_id.is_none()
    }

    pub fn text(&self) -> Option<&str> {
        self.value.as_text()
    }
}
