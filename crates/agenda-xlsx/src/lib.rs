//! XLSX package handling for agenda templates.
//!
//! A template is loaded as a map of raw OPC parts. Only the first worksheet is parsed
//! into an [`agenda_model::DocumentGrid`]; on save that worksheet's `<sheetData>`,
//! `<mergeCells>` and `<dimension>` are regenerated while every other element and
//! every other part is written back byte-for-byte.

pub mod minimal;
mod package;
mod relationships;
mod shared_strings;
mod template;
mod workbook;
pub mod worksheet;
mod zip_util;

pub use package::{XlsxError, XlsxPackage, XlsxPackageLimits};
pub use relationships::{parse_relationships, rels_for_part, resolve_target, Relationship};
pub use shared_strings::parse_shared_strings_xml;
pub use template::TemplateWorkbook;
pub use workbook::{parse_workbook_sheets, WorkbookSheet};

/// MIME type of a `.xlsx` workbook.
pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
