//! Role token canonicalization.
//!
//! Role tokens come from two places: the template analysis service (`SPEAKER_2`,
//! `AhCounter`, `General Evaluator`, ...) and meeting role slots. Both are folded onto a
//! closed set of [`BaseRole`]s so the data assembler and the coordinate filler agree
//! on data keys.

use std::fmt;

/// Meeting duties known to the agenda engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BaseRole {
    Tme,
    Timer,
    AhCounter,
    VoteCounter,
    Grammarian,
    Ge,
    Le,
    Photographer,
    Saa,
    SessionMaster,
    TableTopicsMaster,
    President,
    Speaker,
    Evaluator,
}

impl BaseRole {
    pub const fn as_str(self) -> &'static str {
        match self {
            BaseRole::Tme => "TME",
            BaseRole::Timer => "TIMER",
            BaseRole::AhCounter => "AH_COUNTER",
            BaseRole::VoteCounter => "VOTE_COUNTER",
            BaseRole::Grammarian => "GRAMMARIAN",
            BaseRole::Ge => "GE",
            BaseRole::Le => "LE",
            BaseRole::Photographer => "PHOTOGRAPHER",
            BaseRole::Saa => "SAA",
            BaseRole::SessionMaster => "SESSION_MASTER",
            BaseRole::TableTopicsMaster => "TABLE_TOPICS_MASTER",
            BaseRole::President => "PRESIDENT",
            BaseRole::Speaker => "SPEAKER",
            BaseRole::Evaluator => "EVALUATOR",
        }
    }

    /// Roles that repeat within one meeting and carry a slot index.
    pub const fn is_indexed(self) -> bool {
        matches!(self, BaseRole::Speaker | BaseRole::Evaluator)
    }
}

impl fmt::Display for BaseRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized spelling → base role. Lookups happen after [`normalize_token`].
const SYNONYMS: &[(&str, BaseRole)] = &[
    ("TME", BaseRole::Tme),
    ("TOASTMASTER", BaseRole::Tme),
    ("TOASTMASTER_OF_THE_EVENING", BaseRole::Tme),
    ("TOASTMASTER_OF_THE_DAY", BaseRole::Tme),
    ("TIMER", BaseRole::Timer),
    ("AH_COUNTER", BaseRole::AhCounter),
    ("AHCOUNTER", BaseRole::AhCounter),
    ("VOTE_COUNTER", BaseRole::VoteCounter),
    ("VOTECOUNTER", BaseRole::VoteCounter),
    ("BALLOT_COUNTER", BaseRole::VoteCounter),
    ("GRAMMARIAN", BaseRole::Grammarian),
    ("GE", BaseRole::Ge),
    ("GENERAL_EVALUATOR", BaseRole::Ge),
    ("LE", BaseRole::Le),
    ("LANGUAGE_EVALUATOR", BaseRole::Le),
    ("PHOTOGRAPHER", BaseRole::Photographer),
    ("SAA", BaseRole::Saa),
    ("SERGEANT_AT_ARMS", BaseRole::Saa),
    ("SESSION_MASTER", BaseRole::SessionMaster),
    ("VARIETY_SESSION_MASTER", BaseRole::SessionMaster),
    ("VARIETY_MASTER", BaseRole::SessionMaster),
    ("TABLE_TOPICS_MASTER", BaseRole::TableTopicsMaster),
    ("TABLE_TOPIC_MASTER", BaseRole::TableTopicsMaster),
    ("TT_MASTER", BaseRole::TableTopicsMaster),
    ("TTM", BaseRole::TableTopicsMaster),
    ("PRESIDENT", BaseRole::President),
    ("SPEAKER", BaseRole::Speaker),
    ("EVALUATOR", BaseRole::Evaluator),
    ("INDIVIDUAL_EVALUATOR", BaseRole::Evaluator),
    ("IE", BaseRole::Evaluator),
];

/// Meeting-level tokens and the data key each one reads.
const METADATA_KEYS: &[(&str, &str)] = &[
    ("THEME", "THEME"),
    ("MEETING_DATE", "MEETING_DATE"),
    ("MEETING_INFO", "MEETING_DATE"),
    ("MEETING_NUMBER", "MEETING_NUMBER"),
    ("CLUB_NAME", "CLUB_NAME"),
    ("LOCATION", "LOCATION"),
    ("START_TIME", "START_TIME"),
    ("END_TIME", "END_TIME"),
];

/// Which piece of a role a token refers to. Only speakers have titles and projects.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RoleField {
    Name,
    Title,
    Project,
}

/// A fully parsed role token.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RoleKey {
    pub base: BaseRole,
    /// Explicit `_<n>` index, if the token carried one.
    pub index: Option<u32>,
    pub field: RoleField,
}

impl RoleKey {
    pub fn index_or_default(&self) -> u32 {
        self.index.unwrap_or(1)
    }
}

/// Trim, upper-case, and fold spaces and hyphens to `_`.
pub fn normalize_token(raw: &str) -> String {
    raw.trim()
        .chars()
        .map(|c| match c {
            ' ' | '-' => '_',
            c => c.to_ascii_uppercase(),
        })
        .collect()
}

/// Look up a normalized base spelling (no index) in the synonym table.
pub fn base_role(normalized: &str) -> Option<BaseRole> {
    SYNONYMS
        .iter()
        .find(|(spelling, _)| *spelling == normalized)
        .map(|(_, role)| *role)
}

/// Data key for a meeting-level token (`MEETING_INFO` → `MEETING_DATE`).
pub fn metadata_key(normalized: &str) -> Option<&'static str> {
    METADATA_KEYS
        .iter()
        .find(|(token, _)| *token == normalized)
        .map(|(_, key)| *key)
}

/// Split a trailing `_<digits>` index off a normalized token.
pub fn split_index(token: &str) -> (&str, Option<u32>) {
    if let Some((head, digits)) = token.rsplit_once('_') {
        if !head.is_empty() && !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(index) = digits.parse() {
                return (head, Some(index));
            }
        }
    }
    (token, None)
}

/// Parse any role token, including title/project variants and `_NAME` spellings
/// (`SPEAKER_2_TITLE`, `SPEECH_PROJECT_3`, `SPEAKER_NAME_1`, `TIMER_NAME`).
///
/// Returns `None` for meeting metadata and unknown roles.
pub fn parse_role_token(raw: &str) -> Option<RoleKey> {
    let token = normalize_token(raw);
    if token.is_empty() || metadata_key(&token).is_some() {
        return None;
    }

    for (prefix, field) in [("SPEECH_TITLE_", RoleField::Title), ("SPEECH_PROJECT_", RoleField::Project)] {
        if let Some(index) = token.strip_prefix(prefix).and_then(|rest| rest.parse().ok()) {
            return Some(RoleKey {
                base: BaseRole::Speaker,
                index: Some(index),
                field,
            });
        }
    }

    let (rest, field) = if let Some(rest) = token.strip_suffix("_TITLE") {
        (rest, RoleField::Title)
    } else if let Some(rest) = token.strip_suffix("_PROJECT") {
        (rest, RoleField::Project)
    } else {
        (token.as_str(), RoleField::Name)
    };

    let (rest, mut index) = split_index(rest);
    let rest = rest.strip_suffix("_NAME").unwrap_or(rest);
    let rest = if index.is_none() {
        let (head, trailing) = split_index(rest);
        index = trailing;
        head
    } else {
        rest
    };

    let base = base_role(rest)?;
    if field != RoleField::Name && base != BaseRole::Speaker {
        return None;
    }
    Some(RoleKey { base, index, field })
}

/// Map a raw role token to its base role and slot index (1 when absent).
///
/// Title/project tokens and meeting metadata are handled elsewhere and yield `None`,
/// as do unknown roles.
pub fn canonicalize(raw: &str) -> Option<(BaseRole, u32)> {
    let key = parse_role_token(raw)?;
    (key.field == RoleField::Name).then(|| (key.base, key.index_or_default()))
}

/// The agenda data key a mapped role token reads from.
pub fn data_key_for_role(raw: &str) -> Option<String> {
    let token = normalize_token(raw);
    if let Some(key) = metadata_key(&token) {
        return Some(key.to_string());
    }

    let key = parse_role_token(&token)?;
    let index = key.index_or_default();
    Some(match (key.base, key.field) {
        (BaseRole::Speaker, RoleField::Title) => format!("SPEECH_TITLE_{index}"),
        (BaseRole::Speaker, RoleField::Project) => format!("SPEECH_PROJECT_{index}"),
        (BaseRole::Speaker, RoleField::Name) => format!("SPEAKER_{index}_NAME"),
        (BaseRole::Evaluator, _) => format!("EVALUATOR_{index}_NAME"),
        (base, _) => format!("{base}_NAME"),
    })
}
