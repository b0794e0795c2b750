//! End-to-end agenda generation.
//!
//! ```text
//! Start -> TemplateSelected | NoTemplate -> CoordinateFill | LabelScanFill -> Serialized -> Done
//! ```
//!
//! Any step may end in `Failed`, surfaced as a single [`GenerationError`]. Partial
//! documents are never returned.

use std::fmt;

use agenda_xlsx::{TemplateWorkbook, XLSX_CONTENT_TYPE};
use serde::Serialize;

use crate::config::GeneratorConfig;
use crate::data::{assemble, AgendaData, Meeting};
use crate::error::GenerationError;
use crate::expand::{expand, RepeatingFamily};
use crate::fill::{fill_by_coordinates, fill_by_labels, FillReport};
use crate::storage::{BlobStore, StoragePath};
use crate::structure::TemplateStructure;
use crate::template::TemplateRecord;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Start,
    TemplateSelected,
    NoTemplate,
    CoordinateFill,
    LabelScanFill,
    Serialized,
    Done,
    Failed,
}

/// How values were placed into the template.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Driven by the template's role → cell mapping.
    Coordinates,
    /// Heuristic label and placeholder scan.
    LabelScan,
}

impl Strategy {
    pub const fn stage(self) -> Stage {
        match self {
            Strategy::Coordinates => Stage::CoordinateFill,
            Strategy::LabelScan => Stage::LabelScanFill,
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Strategy::Coordinates => "coordinate",
            Strategy::LabelScan => "label-scan",
        })
    }
}

/// A filled agenda, ready to be sent as a download.
#[derive(Clone, Debug)]
pub struct GeneratedAgenda {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub content_type: &'static str,
    pub strategy: Strategy,
    pub inserted_rows: u32,
    pub report: FillReport,
}

impl GeneratedAgenda {
    /// `Content-Disposition` header value for the download.
    pub fn content_disposition(&self) -> String {
        format!("attachment; filename=\"{}\"", self.filename)
    }
}

/// `Agenda_<club>_<YYYY-MM-DD>.xlsx`, with every club-name character outside
/// `[A-Za-z0-9]` replaced by `_`.
pub fn agenda_filename(meeting: &Meeting) -> String {
    let club: String = meeting
        .club_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!("Agenda_{club}_{}.xlsx", meeting.date.format("%Y-%m-%d"))
}

fn enter(stage: Stage) {
    log::debug!("agenda generation: {stage:?}");
}

fn failed(err: GenerationError) -> GenerationError {
    log::warn!("agenda generation failed after {:?}: {err}", err.stage());
    enter(Stage::Failed);
    err
}

/// Absent, blank, or malformed structures all mean "no mapping".
fn load_structure(raw: Option<&str>) -> TemplateStructure {
    let Some(json) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        log::debug!("template has no parsed structure");
        return TemplateStructure::default();
    };
    TemplateStructure::parse(json).unwrap_or_else(|err| {
        log::warn!("ignoring malformed template structure: {err}");
        TemplateStructure::default()
    })
}

/// Fills agenda templates for meetings.
///
/// Holds only configuration and a blob store; every call builds its own grid and data,
/// so one generator can serve concurrent requests.
pub struct AgendaGenerator {
    config: GeneratorConfig,
    store: Box<dyn BlobStore>,
}

impl fmt::Debug for AgendaGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgendaGenerator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl AgendaGenerator {
    pub fn new(config: GeneratorConfig, store: impl BlobStore + 'static) -> Self {
        Self::with_boxed_store(config, Box::new(store))
    }

    pub fn with_boxed_store(config: GeneratorConfig, store: Box<dyn BlobStore>) -> Self {
        Self { config, store }
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// The data a generation would fill in, without touching any template.
    pub fn preview(&self, meeting: &Meeting) -> AgendaData {
        assemble(meeting)
    }

    /// Generate from a selected template record (see [`crate::select_template`]).
    pub fn generate(
        &self,
        meeting: &Meeting,
        template: Option<&TemplateRecord>,
    ) -> Result<GeneratedAgenda, GenerationError> {
        enter(Stage::Start);
        let Some((template, path)) = template
            .filter(|t| t.is_usable())
            .and_then(|t| Some((t, t.storage_path.as_deref()?)))
        else {
            enter(Stage::NoTemplate);
            return Err(failed(GenerationError::TemplateUnavailable));
        };
        log::debug!("using template {} ({:?}) at {path}", template.id, template.name);
        self.generate_from_path(meeting, path, template.parsed_structure.as_deref())
    }

    /// Generate from a template stored at `storage_path`.
    pub fn generate_from_path(
        &self,
        meeting: &Meeting,
        storage_path: &str,
        parsed_structure: Option<&str>,
    ) -> Result<GeneratedAgenda, GenerationError> {
        let path: StoragePath = storage_path.parse().map_err(|err| {
            enter(Stage::NoTemplate);
            failed(GenerationError::InvalidStoragePath(err))
        })?;
        enter(Stage::TemplateSelected);
        let bytes = self
            .store
            .fetch(&path)
            .map_err(|err| failed(GenerationError::BlobFetch(err)))?;
        self.render(meeting, &bytes, parsed_structure)
    }

    /// Generate from template bytes already in hand.
    pub fn generate_from_bytes(
        &self,
        meeting: &Meeting,
        template_bytes: &[u8],
        parsed_structure: Option<&str>,
    ) -> Result<GeneratedAgenda, GenerationError> {
        enter(Stage::Start);
        enter(Stage::TemplateSelected);
        self.render(meeting, template_bytes, parsed_structure)
    }

    fn render(
        &self,
        meeting: &Meeting,
        template_bytes: &[u8],
        parsed_structure: Option<&str>,
    ) -> Result<GeneratedAgenda, GenerationError> {
        let mut workbook = TemplateWorkbook::from_bytes_limited(template_bytes, self.config.package_limits())
            .map_err(|err| failed(GenerationError::InvalidTemplate(err)))?;
        let mut data = assemble(meeting);
        let structure = load_structure(parsed_structure);

        let strategy = if structure.is_empty() {
            Strategy::LabelScan
        } else {
            Strategy::Coordinates
        };
        enter(strategy.stage());

        let grid = workbook.grid_mut();
        let (inserted_rows, report) = match strategy {
            Strategy::LabelScan => (0, fill_by_labels(grid, &data)),
            Strategy::Coordinates => {
                let speakers = expand(RepeatingFamily::Speakers, structure, grid, &mut data);
                let mut inserted_rows = speakers.inserted_rows;
                let mut structure = speakers.structure;
                if self.config.expand_evaluators {
                    let evaluators = expand(RepeatingFamily::Evaluators, structure, grid, &mut data);
                    inserted_rows += evaluators.inserted_rows;
                    structure = evaluators.structure;
                }
                (inserted_rows, fill_by_coordinates(grid, &structure, &data))
            }
        };

        let bytes = workbook
            .to_bytes()
            .map_err(|source| failed(GenerationError::Serialization { strategy, source }))?;
        enter(Stage::Serialized);

        let filename = agenda_filename(meeting);
        log::info!(
            "generated {filename} ({strategy} fill): {} written, {} skipped, {inserted_rows} row(s) inserted",
            report.written,
            report.skipped
        );
        enter(Stage::Done);

        Ok(GeneratedAgenda {
            bytes,
            filename,
            content_type: XLSX_CONTENT_TYPE,
            strategy,
            inserted_rows,
            report,
        })
    }
}
