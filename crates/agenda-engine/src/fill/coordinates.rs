use agenda_model::DocumentGrid;

use super::FillReport;
use crate::data::AgendaData;
use crate::roles::{data_key_for_role, normalize_token};
use crate::structure::{RoleMapping, TemplateStructure};

/// Data key for `role`: the canonical key when the data has it, otherwise a literal
/// `<TOKEN>_NAME` key for custom roles the canonicalizer does not know.
fn resolve_key(role: &str, data: &AgendaData) -> Option<String> {
    if let Some(key) = data_key_for_role(role).filter(|key| data.contains_key(key)) {
        return Some(key);
    }
    let literal = format!("{}_NAME", normalize_token(role));
    data.contains_key(&literal).then_some(literal)
}

fn fill_one(grid: &mut DocumentGrid, mapping: &RoleMapping, data: &AgendaData) -> bool {
    if mapping.is_inert() {
        log::debug!(
            "skipping inert mapping {} at ({}, {})",
            mapping.role,
            mapping.row,
            mapping.col
        );
        return false;
    }
    let Some(target) = mapping.cell() else {
        log::warn!(
            "skipping mapping {}: ({}, {}) is outside the worksheet",
            mapping.role,
            mapping.row,
            mapping.col
        );
        return false;
    };
    let Some(key) = resolve_key(&mapping.role, data) else {
        log::debug!("no agenda data for role {}", mapping.role);
        return false;
    };
    let Some(value) = data.text(&key).filter(|v| !v.is_empty()) else {
        return false;
    };

    let anchor = grid.anchor_of(target);
    if grid.unhide_row(anchor.row) {
        log::debug!("unhid row {} for {}", anchor.row, mapping.role);
    }
    grid.set_text_preserving_style(anchor, value);
    log::debug!("{} -> {} = {value:?}", mapping.role, anchor.to_a1());
    true
}

/// Write every mapped role's value at its coordinate, in mapping order.
///
/// Writes inside a merged region land on the region's anchor; hidden target rows are
/// made visible; the previous cell style is kept. When two mappings hit the same cell
/// the later one wins.
pub fn fill_by_coordinates(
    grid: &mut DocumentGrid,
    structure: &TemplateStructure,
    data: &AgendaData,
) -> FillReport {
    let mut report = FillReport::default();
    for mapping in structure.iter() {
        if fill_one(grid, mapping, data) {
            report.written += 1;
        } else {
            report.skipped += 1;
        }
    }
    report
}
