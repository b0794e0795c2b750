//! Worksheet part (`xl/worksheets/sheetN.xml`) read and rewrite.

mod read;
mod write;

pub use read::read_worksheet_grid;
pub use write::{update_worksheet_xml, write_merge_cells_section};

/// Excel writes `<t xml:space="preserve">` whenever text would otherwise lose
/// leading/trailing whitespace or line breaks.
pub(crate) fn needs_space_preserve(text: &str) -> bool {
    text.starts_with(char::is_whitespace)
        || text.ends_with(char::is_whitespace)
        || text.contains('\n')
}

pub(crate) fn prefixed_tag(prefix: Option<&str>, local: &str) -> String {
    match prefix {
        Some(p) => format!("{p}:{local}"),
        None => local.to_string(),
    }
}

fn parse_xml_bool(value: &str) -> bool {
    matches!(value.trim(), "1" | "true")
}
