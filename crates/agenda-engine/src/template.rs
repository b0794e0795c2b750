use serde::{Deserialize, Serialize};

use crate::data::Meeting;

/// A club's uploaded agenda template, as persisted by the application.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateRecord {
    pub id: u64,
    pub club_id: u64,
    #[serde(default)]
    pub name: String,
    /// `scheme://bucket/object` of the uploaded workbook.
    #[serde(default)]
    pub storage_path: Option<String>,
    /// Raw JSON from the analysis service, if the template has been analyzed.
    #[serde(default)]
    pub parsed_structure: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl TemplateRecord {
    /// Active and backed by an uploaded file.
    pub fn is_usable(&self) -> bool {
        self.is_active
            && self
                .storage_path
                .as_deref()
                .is_some_and(|p| !p.trim().is_empty())
    }
}

/// Pick the template for `meeting`: an explicit id, else the meeting's pinned
/// template, else the club's first usable (active, with a storage path) one.
///
/// An explicit or pinned id that does not resolve to a usable template yields `None`
/// rather than falling through to the club default.
pub fn select_template<'a>(
    templates: &'a [TemplateRecord],
    explicit_id: Option<u64>,
    meeting: &Meeting,
) -> Option<&'a TemplateRecord> {
    let by_id = |id: u64| templates.iter().find(|t| t.id == id);
    match explicit_id.or(meeting.template_id) {
        Some(id) => by_id(id).filter(|t| t.is_usable()),
        None => templates
            .iter()
            .find(|t| t.is_usable() && meeting.club_id.map_or(true, |club| t.club_id == club)),
    }
}
