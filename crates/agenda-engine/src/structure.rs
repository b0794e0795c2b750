//! The role → cell mapping produced by the template analysis service.

use agenda_model::CellRef;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StructureError {
    #[error("invalid template structure json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("template structure must be a json object")]
    NotAnObject,
}

/// One role token placed at a 1-indexed cell.
///
/// Coordinates are kept signed: the analysis service occasionally emits `0` or
/// negative positions, and such mappings must stay inert rather than fail parsing.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct RoleMapping {
    pub role: String,
    pub row: i64,
    pub col: i64,
}

impl RoleMapping {
    pub fn new(role: impl Into<String>, row: i64, col: i64) -> Self {
        Self {
            role: role.into(),
            row,
            col,
        }
    }

    /// `row < 1` or `col < 1`: ignored at fill time and never used as an anchor.
    pub fn is_inert(&self) -> bool {
        self.row < 1 || self.col < 1
    }

    /// The target cell, or `None` if inert or past the worksheet bounds.
    pub fn cell(&self) -> Option<CellRef> {
        CellRef::checked(self.row, self.col)
    }
}

/// Ordered role mappings for one template version.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TemplateStructure {
    mappings: Vec<RoleMapping>,
}

impl TemplateStructure {
    pub fn new(mappings: Vec<RoleMapping>) -> Self {
        Self { mappings }
    }

    /// Parse `{"variable_mappings": [{"role": .., "value_position": {"row": .., "col": ..}}]}`.
    ///
    /// Malformed entries are dropped individually; a missing or non-array
    /// `variable_mappings` yields an empty structure. Only invalid JSON and non-object
    /// documents are errors.
    pub fn parse(json: &str) -> Result<Self, StructureError> {
        let root: Value = serde_json::from_str(json)?;
        let Value::Object(root) = root else {
            return Err(StructureError::NotAnObject);
        };
        let Some(Value::Array(entries)) = root.get("variable_mappings") else {
            return Ok(Self::default());
        };

        let mappings = entries.iter().filter_map(parse_mapping).collect();
        Ok(Self { mappings })
    }

    pub fn mappings(&self) -> &[RoleMapping] {
        &self.mappings
    }

    pub fn iter(&self) -> impl Iterator<Item = &RoleMapping> {
        self.mappings.iter()
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    pub fn into_mappings(self) -> Vec<RoleMapping> {
        self.mappings
    }

    /// Render back to the `variable_mappings` wire form.
    pub fn to_json(&self) -> Value {
        let entries = self
            .mappings
            .iter()
            .map(|m| {
                serde_json::json!({
                    "role": m.role,
                    "value_position": {"row": m.row, "col": m.col},
                })
            })
            .collect();
        serde_json::json!({ "variable_mappings": Value::Array(entries) })
    }
}

impl FromIterator<RoleMapping> for TemplateStructure {
    fn from_iter<T: IntoIterator<Item = RoleMapping>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

fn parse_mapping(entry: &Value) -> Option<RoleMapping> {
    let role = entry.get("role")?.as_str()?;
    let position = entry.get("value_position")?;
    let row = coordinate(position.get("row")?)?;
    let col = coordinate(position.get("col")?)?;
    Some(RoleMapping::new(role, row, col))
}

/// Integer coordinate; fractional numbers are truncated toward zero.
fn coordinate(value: &Value) -> Option<i64> {
    value.as_i64().or_else(|| {
        value
            .as_f64()
            .filter(|f| f.is_finite())
            .map(|f| f.trunc() as i64)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    #[test]
    fn parses_variable_mappings_in_order() {
        let structure = TemplateStructure::parse(
            r#"{
                "variable_mappings": [
                    {"role": "TIMER", "label_position": {"row": 5, "col": 1}, "value_position": {"row": 5, "col": 2}},
                    {"role": "SPEAKER_1", "value_position": {"row": 10.7, "col": 3}},
                    {"role": "THEME", "value_position": {"row": 0, "col": 2}}
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(
            structure.mappings(),
            &[
                RoleMapping::new("TIMER", 5, 2),
                RoleMapping::new("SPEAKER_1", 10, 3),
                RoleMapping::new("THEME", 0, 2),
            ]
        );
        assert!(structure.mappings()[2].is_inert());
        assert_eq!(structure.mappings()[2].cell(), None);
    }

    #[test]
    fn drops_incomplete_entries() {
        let structure = TemplateStructure::parse(
            r#"{"variable_mappings": [
                {"role": "TIMER"},
                {"value_position": {"row": 1, "col": 1}},
                {"role": 7, "value_position": {"row": 1, "col": 1}},
                {"role": "GE", "value_position": {"row": "3", "col": 1}},
                {"role": "LE", "value_position": {"row": 3, "col": 4}}
            ]}"#,
        )
        .unwrap();
        assert_eq!(structure.mappings(), &[RoleMapping::new("LE", 3, 4)]);
    }

    #[test]
    fn missing_mappings_is_empty_but_bad_json_is_an_error() {
        assert!(TemplateStructure::parse(r#"{"title": "x"}"#).unwrap().is_empty());
        assert!(TemplateStructure::parse(r#"{"variable_mappings": {}}"#)
            .unwrap()
            .is_empty());
        assert!(matches!(
            TemplateStructure::parse("{not json"),
            Err(StructureError::Json(_))
        ));
        assert!(matches!(
            TemplateStructure::parse("[1, 2]"),
            Err(StructureError::NotAnObject)
        ));
    }

    #[test]
    fn to_json_round_trips() {
        let structure: TemplateStructure = [RoleMapping::new("SPEAKER_2", 11, 3)].into_iter().collect();
        let reparsed = TemplateStructure::parse(&structure.to_json().to_string()).unwrap();
        assert_eq!(reparsed, structure);
    }
}
