//! Growing repeating agenda blocks when the roster outgrows the template.
//!
//! A template declares a fixed number of speaker rows (`SPEAKER_1` .. `SPEAKER_N`). When
//! a meeting has `M > N` speakers, `M - N` rows are inserted right after the row of
//! `SPEAKER_N`, styled like it, and the mapping is extended in two passes:
//!
//! 1. synthesize mappings for the new indices from the `SPEAKER_N` reference mappings;
//! 2. shift every pre-existing mapping below the anchor row down by `M - N`.
//!
//! Synthesized mappings are never shifted, and no pre-existing mapping moves twice.

use std::fmt;

use agenda_model::DocumentGrid;

use crate::data::{AgendaData, AgendaRecord};
use crate::roles::{parse_role_token, BaseRole, RoleField, RoleKey};
use crate::structure::{RoleMapping, TemplateStructure};

/// A role family whose cardinality varies per meeting.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RepeatingFamily {
    Speakers,
    Evaluators,
}

impl RepeatingFamily {
    pub const fn base(self) -> BaseRole {
        match self {
            RepeatingFamily::Speakers => BaseRole::Speaker,
            RepeatingFamily::Evaluators => BaseRole::Evaluator,
        }
    }

    const fn fields(self) -> &'static [RoleField] {
        match self {
            RepeatingFamily::Speakers => &[RoleField::Name, RoleField::Title, RoleField::Project],
            RepeatingFamily::Evaluators => &[RoleField::Name],
        }
    }

    pub fn records(self, data: &AgendaData) -> &[AgendaRecord] {
        match self {
            RepeatingFamily::Speakers => data.speakers(),
            RepeatingFamily::Evaluators => data.evaluators(),
        }
    }

    fn role_token(self, index: u32, field: RoleField) -> String {
        let base = self.base();
        match field {
            RoleField::Name => format!("{base}_{index}"),
            RoleField::Title => format!("{base}_{index}_TITLE"),
            RoleField::Project => format!("{base}_{index}_PROJECT"),
        }
    }

    fn populate(self, data: &mut AgendaData, index: u32, record: &AgendaRecord) {
        match self {
            RepeatingFamily::Speakers => {
                data.set_text(format!("SPEAKER_{index}_NAME"), record.name.as_str());
                data.set_text(format!("SPEAKER_NAME_{index}"), record.name.as_str());
                data.set_text(format!("SPEECH_TITLE_{index}"), record.title.as_str());
                data.set_text(format!("SPEECH_PROJECT_{index}"), record.project.as_str());
            }
            RepeatingFamily::Evaluators => {
                data.set_text(format!("EVALUATOR_{index}_NAME"), record.name.as_str());
                data.set_text(format!("EVALUATOR_NAME_{index}"), record.name.as_str());
                data.set_text(format!("INDIVIDUAL_EVALUATOR_{index}_NAME"), record.name.as_str());
            }
        }
    }
}

impl fmt::Display for RepeatingFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RepeatingFamily::Speakers => "speaker",
            RepeatingFamily::Evaluators => "evaluator",
        })
    }
}

/// What an expansion would do, before touching the grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExpansionPlan {
    /// Highest explicitly indexed name mapping in the template.
    pub max_template_index: u32,
    /// Row of that mapping; new rows go directly below it.
    pub anchor_row: u32,
    /// Rows to insert.
    pub extra: u32,
}

/// Result of [`expand`]: the (possibly extended) structure and the rows inserted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Expansion {
    pub structure: TemplateStructure,
    pub inserted_rows: u32,
}

impl Expansion {
    fn unchanged(structure: TemplateStructure) -> Self {
        Self {
            structure,
            inserted_rows: 0,
        }
    }
}

fn name_key(mapping: &RoleMapping, base: BaseRole) -> Option<u32> {
    match parse_role_token(&mapping.role)? {
        RoleKey {
            base: b,
            index: Some(index),
            field: RoleField::Name,
        } if b == base => Some(index),
        _ => None,
    }
}

/// Decide whether `actual` entries of `family` overflow the template.
///
/// The first mapping to reach the highest index is the reference. If it is inert
/// (or off the sheet) there is no anchor and nothing is planned.
pub fn plan(family: RepeatingFamily, structure: &TemplateStructure, actual: usize) -> Option<ExpansionPlan> {
    let base = family.base();
    let mut max_template_index = 0;
    let mut anchor_row = None;
    for mapping in structure.iter() {
        let Some(index) = name_key(mapping, base) else {
            continue;
        };
        if index > max_template_index {
            max_template_index = index;
            anchor_row = mapping.cell().map(|cell| cell.row);
        }
    }

    let anchor_row = anchor_row?;
    let actual = u32::try_from(actual).ok()?;
    if max_template_index == 0 || actual <= max_template_index {
        return None;
    }
    Some(ExpansionPlan {
        max_template_index,
        anchor_row,
        extra: actual - max_template_index,
    })
}

/// Expand `family` in `grid`, `structure` and `data` when the data outgrows the template.
///
/// On a row insertion failure the expansion is skipped and all three are left as they
/// were.
pub fn expand(
    family: RepeatingFamily,
    structure: TemplateStructure,
    grid: &mut DocumentGrid,
    data: &mut AgendaData,
) -> Expansion {
    let records = family.records(data);
    let Some(plan) = plan(family, &structure, records.len()) else {
        return Expansion::unchanged(structure);
    };
    let ExpansionPlan {
        max_template_index: max,
        anchor_row,
        extra,
    } = plan;
    let new_records: Vec<AgendaRecord> = records[max as usize..].to_vec();

    if let Err(err) = grid.insert_rows(anchor_row + 1, extra, anchor_row) {
        log::warn!("skipping {family} row expansion after row {anchor_row}: {err}");
        return Expansion::unchanged(structure);
    }

    // Pass 1: new mappings, offset from the reference mappings of the last declared index.
    let references: Vec<(RoleField, &RoleMapping)> = family
        .fields()
        .iter()
        .filter_map(|field| {
            structure
                .iter()
                .find(|m| {
                    parse_role_token(&m.role)
                        == Some(RoleKey {
                            base: family.base(),
                            index: Some(max),
                            field: *field,
                        })
                })
                .map(|m| (*field, m))
        })
        .collect();
    let mut synthesized = Vec::with_capacity(references.len() * extra as usize);
    for offset in 1..=extra {
        for (field, reference) in &references {
            synthesized.push(RoleMapping::new(
                family.role_token(max + offset, *field),
                reference.row + i64::from(offset),
                reference.col,
            ));
        }
    }

    // Pass 2: everything that sat below the anchor moves past the inserted block, once.
    let mut mappings = structure.into_mappings();
    for mapping in &mut mappings {
        if !mapping.is_inert() && mapping.row > i64::from(anchor_row) {
            mapping.row += i64::from(extra);
        }
    }
    mappings.extend(synthesized);

    for (offset, record) in (1..).zip(&new_records) {
        family.populate(data, max + offset, record);
    }

    log::info!(
        "inserted {extra} {family} row(s) after row {anchor_row} ({max} declared, {} needed)",
        max + extra
    );
    Expansion {
        structure: TemplateStructure::new(mappings),
        inserted_rows: extra,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use agenda_model::{Cell, CellRef, CellValue, EXCEL_MAX_ROWS};
    use pretty_assertions::assert_eq;

    fn speakers(data: &mut AgendaData, names: &[&str]) {
        data.set_records(
            crate::data::SPEAKERS_KEY,
            names
                .iter()
                .map(|name| AgendaRecord {
                    name: name.to_string(),
                    title: format!("{name}'s talk"),
                    project: String::new(),
                })
                .collect(),
        );
    }

    fn scenario_a() -> TemplateStructure {
        TemplateStructure::new(vec![
            RoleMapping::new("TIMER", 3, 2),
            RoleMapping::new("SPEAKER_1", 10, 2),
            RoleMapping::new("SPEAKER_1_TITLE", 10, 3),
            RoleMapping::new("SPEAKER_2", 11, 2),
            RoleMapping::new("SPEAKER_2_TITLE", 11, 3),
            RoleMapping::new("SPEAKER_2_PROJECT", 11, 4),
            RoleMapping::new("GE", 12, 2),
            RoleMapping::new("LE", 15, 2),
        ])
    }

    #[test]
    fn scenario_a_inserts_two_rows_and_shifts_once() {
        let mut grid = DocumentGrid::new();
        grid.set_cell(CellRef::new(11, 1), Cell::styled(Some(4)));
        grid.set_cell(CellRef::new(12, 1), Cell::new(CellValue::from("General Evaluator")));
        let mut data = AgendaData::new();
        speakers(&mut data, &["A", "B", "C", "D"]);

        let expansion = expand(RepeatingFamily::Speakers, scenario_a(), &mut grid, &mut data);

        assert_eq!(expansion.inserted_rows, 2);
        assert_eq!(
            expansion.structure.mappings(),
            &[
                RoleMapping::new("TIMER", 3, 2),
                RoleMapping::new("SPEAKER_1", 10, 2),
                RoleMapping::new("SPEAKER_1_TITLE", 10, 3),
                RoleMapping::new("SPEAKER_2", 11, 2),
                RoleMapping::new("SPEAKER_2_TITLE", 11, 3),
                RoleMapping::new("SPEAKER_2_PROJECT", 11, 4),
                RoleMapping::new("GE", 14, 2),
                RoleMapping::new("LE", 17, 2),
                RoleMapping::new("SPEAKER_3", 12, 2),
                RoleMapping::new("SPEAKER_3_TITLE", 12, 3),
                RoleMapping::new("SPEAKER_3_PROJECT", 12, 4),
                RoleMapping::new("SPEAKER_4", 13, 2),
                RoleMapping::new("SPEAKER_4_TITLE", 13, 3),
                RoleMapping::new("SPEAKER_4_PROJECT", 13, 4),
            ]
        );
        assert_eq!(
            grid.value(CellRef::new(14, 1)),
            Some(&CellValue::from("General Evaluator"))
        );
        assert_eq!(grid.cell(CellRef::new(13, 1)), Some(&Cell::styled(Some(4))));
        assert_eq!(data.text("SPEAKER_3_NAME"), Some("C"));
        assert_eq!(data.text("SPEAKER_NAME_4"), Some("D"));
        assert_eq!(data.text("SPEECH_TITLE_4"), Some("D's talk"));
        assert_eq!(data.text("SPEECH_PROJECT_3"), Some(""));
    }

    #[test]
    fn no_expansion_when_template_has_room() {
        let mut grid = DocumentGrid::new();
        grid.set_cell(CellRef::new(12, 1), Cell::new(CellValue::from("x")));
        let before = grid.clone();
        let mut data = AgendaData::new();
        speakers(&mut data, &["A", "B"]);

        let expansion = expand(RepeatingFamily::Speakers, scenario_a(), &mut grid, &mut data);

        assert_eq!(expansion, Expansion::unchanged(scenario_a()));
        assert_eq!(grid, before);
        assert_eq!(data.text("SPEAKER_3_NAME"), None);
    }

    #[test]
    fn plan_ignores_titles_and_needs_an_anchor() {
        let structure = TemplateStructure::new(vec![
            RoleMapping::new("SPEAKER_1", 4, 2),
            RoleMapping::new("SPEAKER_3_TITLE", 9, 3),
        ]);
        assert_eq!(
            plan(RepeatingFamily::Speakers, &structure, 3),
            Some(ExpansionPlan {
                max_template_index: 1,
                anchor_row: 4,
                extra: 2
            })
        );

        let inert = TemplateStructure::new(vec![
            RoleMapping::new("SPEAKER_1", 4, 2),
            RoleMapping::new("SPEAKER_2", 0, 2),
        ]);
        assert_eq!(plan(RepeatingFamily::Speakers, &inert, 5), None);

        // An unindexed token is not a declared slot.
        let unindexed = TemplateStructure::new(vec![RoleMapping::new("SPEAKER", 4, 2)]);
        assert_eq!(plan(RepeatingFamily::Speakers, &unindexed, 5), None);
    }

    #[test]
    fn insertion_failure_leaves_everything_untouched() {
        let mut grid = DocumentGrid::new();
        grid.set_cell(CellRef::new(EXCEL_MAX_ROWS, 1), Cell::new(CellValue::from("end")));
        let before = grid.clone();
        let structure = TemplateStructure::new(vec![
            RoleMapping::new("SPEAKER_1", 5, 2),
            RoleMapping::new("GE", 6, 2),
        ]);
        let mut data = AgendaData::new();
        speakers(&mut data, &["A", "B"]);
        let data_before = data.clone();

        let expansion = expand(RepeatingFamily::Speakers, structure.clone(), &mut grid, &mut data);

        assert_eq!(expansion, Expansion::unchanged(structure));
        assert_eq!(grid, before);
        assert_eq!(data, data_before);
    }

    #[test]
    fn evaluators_expand_by_name_only() {
        let structure = TemplateStructure::new(vec![
            RoleMapping::new("EVALUATOR_1", 20, 2),
            RoleMapping::new("INDIVIDUAL_EVALUATOR_1", 20, 5),
            RoleMapping::new("TIMER", 21, 2),
        ]);
        let mut grid = DocumentGrid::new();
        let mut data = AgendaData::new();
        data.set_records(
            crate::data::EVALUATORS_KEY,
            vec![
                AgendaRecord::default(),
                AgendaRecord {
                    name: "Eve".to_string(),
                    ..AgendaRecord::default()
                },
            ],
        );

        let expansion = expand(RepeatingFamily::Evaluators, structure, &mut grid, &mut data);

        assert_eq!(expansion.inserted_rows, 1);
        assert_eq!(
            expansion.structure.mappings(),
            &[
                RoleMapping::new("EVALUATOR_1", 20, 2),
                RoleMapping::new("INDIVIDUAL_EVALUATOR_1", 20, 5),
                RoleMapping::new("TIMER", 22, 2),
                RoleMapping::new("EVALUATOR_2", 21, 2),
            ]
        );
        assert_eq!(data.text("EVALUATOR_2_NAME"), Some("Eve"));
        assert_eq!(data.text("INDIVIDUAL_EVALUATOR_2_NAME"), Some("Eve"));
    }
}
