use std::sync::OnceLock;

use agenda_model::{CellRef, DocumentGrid, EXCEL_MAX_COLS};
use regex::{Captures, Regex};

use super::FillReport;
use crate::data::AgendaData;
use crate::roles::normalize_token;

/// A role label as it appears in agenda templates.
struct RoleLabel {
    label: &'static str,
    /// Data keys to try, in order.
    keys: &'static [&'static str],
    /// Short abbreviations only match as a whole word (`GE` must not hit `MANAGER`).
    whole_word: bool,
}

const fn phrase(label: &'static str, keys: &'static [&'static str]) -> RoleLabel {
    RoleLabel {
        label,
        keys,
        whole_word: false,
    }
}

const fn abbreviation(label: &'static str, keys: &'static [&'static str]) -> RoleLabel {
    RoleLabel {
        label,
        keys,
        whole_word: true,
    }
}

// First match wins per cell, so longer labels come before the abbreviations.
const ROLE_LABELS: &[RoleLabel] = &[
    phrase("Toastmaster of the Evening", &["TME_NAME"]),
    phrase("Toastmaster of the Day", &["TME_NAME"]),
    phrase("Timer", &["TIMER_NAME"]),
    phrase("計時", &["TIMER_NAME"]),
    phrase("Ah Counter", &["AH_COUNTER_NAME"]),
    phrase("Ah-Counter", &["AH_COUNTER_NAME"]),
    phrase("贅語", &["AH_COUNTER_NAME"]),
    phrase("Vote Counter", &["VOTE_COUNTER_NAME"]),
    phrase("Ballot Counter", &["VOTE_COUNTER_NAME"]),
    phrase("計票", &["VOTE_COUNTER_NAME"]),
    phrase("Grammarian", &["GRAMMARIAN_NAME"]),
    phrase("文法", &["GRAMMARIAN_NAME"]),
    phrase("General Evaluator", &["GE_NAME"]),
    phrase("總講評", &["GE_NAME"]),
    phrase("Language Evaluator", &["LE_NAME"]),
    phrase("語言講評", &["LE_NAME"]),
    phrase("Variety Session", &["VARIETY_SESSION_MASTER_NAME", "SESSION_MASTER_NAME"]),
    phrase("Session Master", &["SESSION_MASTER_NAME", "VARIETY_SESSION_MASTER_NAME"]),
    phrase("Table Topics Master", &["TABLE_TOPICS_MASTER_NAME"]),
    phrase("即席問答", &["TABLE_TOPICS_MASTER_NAME"]),
    phrase("Photographer", &["PHOTOGRAPHER_NAME"]),
    phrase("攝影", &["PHOTOGRAPHER_NAME"]),
    phrase("Sergeant at Arms", &["SAA_NAME"]),
    phrase("事務長", &["SAA_NAME"]),
    phrase("President", &["PRESIDENT_NAME"]),
    phrase("會長", &["PRESIDENT_NAME"]),
    abbreviation("TME", &["TME_NAME"]),
    abbreviation("GE", &["GE_NAME"]),
    abbreviation("LE", &["LE_NAME"]),
    abbreviation("SAA", &["SAA_NAME"]),
];

fn speaker_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)(?:speaker|講者)\s*([1-3])(?:[^0-9]|$)").expect("valid regex"))
}

fn evaluator_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(?:evaluator\s*|講評[^0-9]*?)([1-3])(?:[^0-9]|$)").expect("valid regex")
    })
}

fn placeholder_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{([^{}]*)\}\}").expect("valid regex"))
}

impl RoleLabel {
    fn matches(&self, lowercase_text: &str) -> bool {
        let needle = self.label.to_lowercase();
        if !self.whole_word {
            return lowercase_text.contains(&needle);
        }
        lowercase_text.match_indices(&needle).any(|(start, m)| {
            let before = lowercase_text[..start].chars().next_back();
            let after = lowercase_text[start + m.len()..].chars().next();
            !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
        })
    }

    fn value<'a>(&self, data: &'a AgendaData) -> Option<&'a str> {
        self.keys
            .iter()
            .find_map(|key| data.text(key).filter(|v| !v.is_empty()))
    }
}

/// Replace every `{{KEY}}` with its scalar value; unknown keys become empty.
pub fn substitute_placeholders(text: &str, data: &AgendaData) -> String {
    placeholder_pattern()
        .replace_all(text, |caps: &Captures<'_>| {
            let key = caps[1].trim();
            data.text(key)
                .or_else(|| data.text(&normalize_token(key)))
                .unwrap_or_default()
                .to_string()
        })
        .into_owned()
}

fn indexed_name<'a>(pattern: &Regex, prefix: &str, text: &str, data: &'a AgendaData) -> Option<&'a str> {
    let index = pattern.captures(text)?.get(1)?.as_str();
    data.text(&format!("{prefix}_{index}_NAME"))
        .filter(|v| !v.is_empty())
}

/// Write `value` in the cell right of the label at `label`, if that cell is blank.
///
/// "Right of" means past the label's merged region; a merged target is redirected to
/// its anchor. Cells holding a formula are never blank.
fn write_right_if_blank(grid: &mut DocumentGrid, label: CellRef, value: &str) -> bool {
    let (row, last_col) = match grid.merges().containing(label.row, label.col) {
        Some(region) => (region.first_row, region.last_col),
        None => (label.row, label.col),
    };
    let Some(col) = last_col.checked_add(1).filter(|c| *c <= EXCEL_MAX_COLS) else {
        return false;
    };
    let target = grid.anchor_of(CellRef::new(row, col));
    let blank = grid
        .cell(target)
        .map_or(true, |c| c.formula.is_none() && c.value.is_blank());
    if !blank {
        return false;
    }
    grid.set_text_preserving_style(target, value);
    true
}

/// Fallback fill for templates without a role mapping.
///
/// Scans the text cells present before the scan (values written here are never
/// re-scanned). A recognized role label fills the blank cell to its right;
/// `Speaker n` / `Evaluator n` labels fill from the indexed keys; `{{KEY}}`
/// placeholders are substituted and unknown ones stripped. Non-blank cells are never
/// overwritten by label hits, so the scan is idempotent.
pub fn fill_by_labels(grid: &mut DocumentGrid, data: &AgendaData) -> FillReport {
    let mut report = FillReport::default();
    let mut record = |written: bool| {
        if written {
            report.written += 1;
        } else {
            report.skipped += 1;
        }
    };

    for (at, text) in grid.text_cells() {
        // Labels are matched on the visible text, not on placeholder names.
        let label_text = placeholder_pattern().replace_all(text.trim(), "");
        let lowercase = label_text.to_lowercase();

        if let Some(entry) = ROLE_LABELS.iter().find(|entry| entry.matches(&lowercase)) {
            if let Some(value) = entry.value(data) {
                log::debug!("label {:?} at {} -> {value:?}", entry.label, at.to_a1());
                record(write_right_if_blank(grid, at, value));
            }
        }
        if let Some(name) = indexed_name(speaker_pattern(), "SPEAKER", &label_text, data) {
            record(write_right_if_blank(grid, at, name));
        }
        if let Some(name) = indexed_name(evaluator_pattern(), "EVALUATOR", &label_text, data) {
            record(write_right_if_blank(grid, at, name));
        }

        if text.contains("{{") {
            let replaced = substitute_placeholders(&text, data);
            if replaced != text {
                grid.set_text_preserving_style(at, replaced);
                record(true);
            }
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;

    use agenda_model::{Cell, CellValue, Formula, MergedRegion};
    use pretty_assertions::assert_eq;

    fn text(grid: &DocumentGrid, a1: &str) -> Option<String> {
        grid.value(CellRef::from_a1(a1).unwrap())
            .and_then(CellValue::as_text)
            .map(str::to_string)
    }

    fn put(grid: &mut DocumentGrid, a1: &str, value: &str) {
        grid.set_cell(CellRef::from_a1(a1).unwrap(), Cell::new(CellValue::from(value)));
    }

    fn data() -> AgendaData {
        let mut data = AgendaData::new();
        data.set_text("TIMER_NAME", "Alice");
        data.set_text("GE_NAME", "Gina");
        data.set_text("SAA_NAME", "Sam");
        data.set_text("SESSION_MASTER_NAME", "Vic");
        data.set_text("SPEAKER_2_NAME", "Bob");
        data.set_text("EVALUATOR_1_NAME", "Eve");
        data.set_text("THEME", "Growth");
        data.set_text("GRAMMARIAN_NAME", "");
        data
    }

    #[test]
    fn timer_label_fills_the_blank_cell_to_its_right() {
        let mut grid = DocumentGrid::new();
        put(&mut grid, "A5", "Timer");
        grid.set_cell(CellRef::from_a1("B5").unwrap(), Cell::styled(Some(3)));

        let report = fill_by_labels(&mut grid, &data());

        assert_eq!(report, FillReport { written: 1, skipped: 0 });
        assert_eq!(text(&grid, "B5").as_deref(), Some("Alice"));
        assert_eq!(grid.cell(CellRef::from_a1("B5").unwrap()).unwrap().style_id, Some(3));
    }

    #[test]
    fn never_overwrites_and_is_idempotent() {
        let mut grid = DocumentGrid::new();
        put(&mut grid, "A1", "計時 Timer");
        put(&mut grid, "B1", "Someone");
        put(&mut grid, "A2", "General Evaluator");
        put(&mut grid, "B2", "   ");
        put(&mut grid, "A3", "SAA");
        grid.set_cell(
            CellRef::from_a1("B3").unwrap(),
            Cell {
                formula: Some(Formula {
                    text: "\"\"".to_string(),
                    attrs: Vec::new(),
                }),
                ..Cell::new(CellValue::from(""))
            },
        );

        let report = fill_by_labels(&mut grid, &data());
        assert_eq!(report, FillReport { written: 1, skipped: 2 });
        assert_eq!(text(&grid, "B1").as_deref(), Some("Someone"));
        assert_eq!(text(&grid, "B2").as_deref(), Some("Gina"));
        assert_eq!(text(&grid, "B3").as_deref(), Some(""));

        let once = grid.clone();
        fill_by_labels(&mut grid, &data());
        assert_eq!(grid, once);
    }

    #[test]
    fn abbreviations_match_whole_words_only() {
        let mut grid = DocumentGrid::new();
        put(&mut grid, "A1", "Manager");
        put(&mut grid, "A2", "Saab");
        put(&mut grid, "A3", "GE:");

        fill_by_labels(&mut grid, &data());

        assert_eq!(text(&grid, "B1"), None);
        assert_eq!(text(&grid, "B2"), None);
        assert_eq!(text(&grid, "B3").as_deref(), Some("Gina"));
    }

    #[test]
    fn merged_labels_fill_past_their_region() {
        let mut grid = DocumentGrid::new();
        put(&mut grid, "A4", "Variety Session Master");
        grid.add_merge(MergedRegion::new(4, 5, 1, 2));
        grid.add_merge(MergedRegion::new(4, 4, 3, 5));

        fill_by_labels(&mut grid, &data());

        assert_eq!(text(&grid, "C4").as_deref(), Some("Vic"));
        assert_eq!(text(&grid, "B4"), None);
    }

    #[test]
    fn numbered_speaker_and_evaluator_labels() {
        let mut grid = DocumentGrid::new();
        put(&mut grid, "A1", "Speaker 2");
        put(&mut grid, "A2", "講評員 1");
        put(&mut grid, "A3", "Speaker 1");
        put(&mut grid, "A4", "Speaker 12");

        fill_by_labels(&mut grid, &data());

        assert_eq!(text(&grid, "B1").as_deref(), Some("Bob"));
        assert_eq!(text(&grid, "B2").as_deref(), Some("Eve"));
        assert_eq!(text(&grid, "B3"), None);
        assert_eq!(text(&grid, "B4"), None);
    }

    #[test]
    fn placeholders_are_substituted_or_stripped() {
        let mut grid = DocumentGrid::new();
        put(&mut grid, "A1", "Theme: {{THEME}} {{ UNKNOWN_KEY }}!");
        put(&mut grid, "A2", "{{theme}}");

        fill_by_labels(&mut grid, &data());

        assert_eq!(text(&grid, "A1").as_deref(), Some("Theme: Growth !"));
        assert_eq!(text(&grid, "A2").as_deref(), Some("Growth"));

        let mut empty = AgendaData::new();
        empty.set_text("OTHER", "x");
        assert_eq!(substitute_placeholders("[{{THEME}}]", &empty), "[]");
    }

    #[test]
    fn written_values_are_not_rescanned() {
        let mut grid = DocumentGrid::new();
        put(&mut grid, "A1", "Timer");
        let mut data = data();
        data.set_text("TIMER_NAME", "Grammarian Gary");
        data.set_text("GRAMMARIAN_NAME", "Greta");

        fill_by_labels(&mut grid, &data);

        assert_eq!(text(&grid, "B1").as_deref(), Some("Grammarian Gary"));
        assert_eq!(text(&grid, "C1"), None);
    }

    #[test]
    fn placeholder_names_are_not_labels() {
        let mut grid = DocumentGrid::new();
        put(&mut grid, "A1", "{{TIMER_NAME}}");

        fill_by_labels(&mut grid, &data());

        assert_eq!(text(&grid, "A1").as_deref(), Some("Alice"));
        assert_eq!(text(&grid, "B1"), None);
    }
}
