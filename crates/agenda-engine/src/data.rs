//! Flattening a meeting into the keyed value set that templates are filled from.

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::roles::{canonicalize, normalize_token, BaseRole};

pub const SPEAKERS_KEY: &str = "SPEAKERS";
pub const EVALUATORS_KEY: &str = "EVALUATORS";

/// A scheduled meeting and its role sign-ups.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Meeting {
    pub date: NaiveDate,
    #[serde(default)]
    pub meeting_number: Option<u32>,
    #[serde(default)]
    pub theme: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    pub club_name: String,
    #[serde(default)]
    pub club_id: Option<u64>,
    #[serde(default, with = "hh_mm")]
    pub start_time: Option<NaiveTime>,
    #[serde(default, with = "hh_mm")]
    pub end_time: Option<NaiveTime>,
    /// Template pinned to this meeting, if any.
    #[serde(default)]
    pub template_id: Option<u64>,
    #[serde(default)]
    pub role_slots: Vec<RoleSlot>,
}

impl Meeting {
    pub fn new(date: NaiveDate, club_name: impl Into<String>) -> Self {
        Self {
            date,
            meeting_number: None,
            theme: None,
            location: None,
            club_name: club_name.into(),
            club_id: None,
            start_time: None,
            end_time: None,
            template_id: None,
            role_slots: Vec::new(),
        }
    }
}

/// One duty on the meeting roster.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleSlot {
    pub role_name: String,
    #[serde(default)]
    pub slot_index: Option<i32>,
    /// Display name of the assigned member.
    #[serde(default)]
    pub assigned_member: Option<String>,
    #[serde(default)]
    pub speech_title: Option<String>,
    #[serde(default)]
    pub project_name: Option<String>,
}

impl RoleSlot {
    pub fn new(role_name: impl Into<String>) -> Self {
        Self {
            role_name: role_name.into(),
            ..Self::default()
        }
    }

    pub fn indexed(role_name: impl Into<String>, slot_index: i32) -> Self {
        Self {
            slot_index: Some(slot_index),
            ..Self::new(role_name)
        }
    }

    pub fn assigned(mut self, member: impl Into<String>) -> Self {
        self.assigned_member = Some(member.into());
        self
    }

    pub fn speech(mut self, title: impl Into<String>, project: impl Into<String>) -> Self {
        self.speech_title = Some(title.into());
        self.project_name = Some(project.into());
        self
    }

    fn member_name(&self) -> &str {
        self.assigned_member.as_deref().unwrap_or("")
    }
}

/// One entry of the `SPEAKERS` / `EVALUATORS` lists.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgendaRecord {
    pub name: String,
    pub title: String,
    pub project: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AgendaValue {
    Text(String),
    Records(Vec<AgendaRecord>),
}

/// Canonical data key → value. Ordered so previews and fills are deterministic.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgendaData {
    values: BTreeMap<String, AgendaValue>,
}

impl AgendaData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&AgendaValue> {
        self.values.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Scalar value for `key`, if present.
    pub fn text(&self, key: &str) -> Option<&str> {
        match self.values.get(key)? {
            AgendaValue::Text(s) => Some(s),
            AgendaValue::Records(_) => None,
        }
    }

    pub fn set_text(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), AgendaValue::Text(value.into()));
    }

    /// Record list for `key`; empty when absent or scalar.
    pub fn records(&self, key: &str) -> &[AgendaRecord] {
        match self.values.get(key) {
            Some(AgendaValue::Records(records)) => records,
            _ => &[],
        }
    }

    pub fn set_records(&mut self, key: impl Into<String>, records: Vec<AgendaRecord>) {
        self.values.insert(key.into(), AgendaValue::Records(records));
    }

    pub fn speakers(&self) -> &[AgendaRecord] {
        self.records(SPEAKERS_KEY)
    }

    pub fn evaluators(&self) -> &[AgendaRecord] {
        self.records(EVALUATORS_KEY)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AgendaValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Fill `key` only when it is missing or blank.
    fn set_text_if_blank(&mut self, key: String, value: &str) {
        if self.text(&key).map_or(true, |existing| existing.trim().is_empty()) {
            self.set_text(key, value);
        }
    }
}

/// Build the agenda data set for `meeting`.
///
/// Every metadata key is present (empty when unknown). Speakers and evaluators are
/// keyed by slot index in two spellings each; every other role is keyed by its
/// normalized name, its bare name, and its canonical base role when that differs.
pub fn assemble(meeting: &Meeting) -> AgendaData {
    let mut data = AgendaData::new();

    data.set_text("MEETING_DATE", meeting.date.format("%A, %b %-d, %Y").to_string());
    data.set_text(
        "MEETING_NUMBER",
        meeting
            .meeting_number
            .map(|n| format!("#{n}"))
            .unwrap_or_default(),
    );
    data.set_text("THEME", meeting.theme.clone().unwrap_or_default());
    data.set_text("LOCATION", meeting.location.clone().unwrap_or_default());
    data.set_text("CLUB_NAME", meeting.club_name.clone());
    data.set_text("START_TIME", format_time(meeting.start_time));
    data.set_text("END_TIME", format_time(meeting.end_time));

    let mut speakers: Vec<(i32, AgendaRecord)> = Vec::new();
    let mut evaluators: Vec<(i32, AgendaRecord)> = Vec::new();

    for slot in &meeting.role_slots {
        let role = normalize_token(&slot.role_name);
        let base = canonicalize(&role).map(|(base, _)| base);
        let name = slot.member_name();
        let index = slot.slot_index.unwrap_or(0);

        match base {
            Some(BaseRole::Speaker) if index > 0 => {
                data.set_text(format!("SPEAKER_{index}_NAME"), name);
                data.set_text(format!("SPEAKER_NAME_{index}"), name);
                data.set_text(
                    format!("SPEECH_TITLE_{index}"),
                    slot.speech_title.clone().unwrap_or_default(),
                );
                data.set_text(
                    format!("SPEECH_PROJECT_{index}"),
                    slot.project_name.clone().unwrap_or_default(),
                );
            }
            Some(BaseRole::Evaluator) if index > 0 => {
                data.set_text(format!("EVALUATOR_{index}_NAME"), name);
                data.set_text(format!("EVALUATOR_NAME_{index}"), name);
                data.set_text(format!("INDIVIDUAL_EVALUATOR_{index}_NAME"), name);
            }
            _ => {
                data.set_text(format!("{role}_NAME"), name);
                data.set_text(role.clone(), name);
                if role == "TT_MASTER" {
                    data.set_text("TABLE_TOPICS_MASTER_NAME", name);
                } else if let Some(base) = base.filter(|b| b.as_str() != role) {
                    data.set_text_if_blank(format!("{base}_NAME"), name);
                }
            }
        }

        let record = AgendaRecord {
            name: name.to_string(),
            title: slot.speech_title.clone().unwrap_or_default(),
            project: slot.project_name.clone().unwrap_or_default(),
        };
        match base {
            Some(BaseRole::Speaker) => speakers.push((index, record)),
            Some(BaseRole::Evaluator) => evaluators.push((
                index,
                AgendaRecord {
                    name: record.name,
                    ..AgendaRecord::default()
                },
            )),
            _ => {}
        }
    }

    data.set_records(SPEAKERS_KEY, sorted_by_index(speakers));
    data.set_records(EVALUATORS_KEY, sorted_by_index(evaluators));
    data
}

fn sorted_by_index(mut records: Vec<(i32, AgendaRecord)>) -> Vec<AgendaRecord> {
    // Stable: slots sharing an index keep roster order.
    records.sort_by_key(|(index, _)| *index);
    records.into_iter().map(|(_, record)| record).collect()
}

fn format_time(time: Option<NaiveTime>) -> String {
    time.map(|t| t.format("%H:%M").to_string())
        .unwrap_or_default()
}

/// `Option<NaiveTime>` as `"HH:MM"` (seconds accepted on input).
mod hh_mm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &Option<NaiveTime>, s: S) -> Result<S::Ok, S::Error> {
        match time {
            Some(t) => s.serialize_str(&t.format("%H:%M").to_string()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveTime>, D::Error> {
        let Some(raw) = Option::<String>::deserialize(d)? else {
            return Ok(None);
        };
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(None);
        }
        NaiveTime::parse_from_str(raw, "%H:%M:%S")
            .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
            .map(Some)
            .map_err(serde::de::Error::custom)
    }
}
