//! `agenda-engine` turns a meeting's role assignments and an uploaded spreadsheet
//! template into a filled agenda workbook.
//!
//! A generation request runs in one of two modes:
//! - **coordinate fill**, when the template has been analyzed into a role → cell
//!   mapping ([`TemplateStructure`]). Speaker (and optionally evaluator) blocks grow
//!   when the meeting has more entries than the template has rows.
//! - **label-scan fill**, when no usable mapping exists. Known role labels get the
//!   assigned name written beside them and `{{KEY}}` placeholders are substituted.
//!
//! Every request owns its grid and data; [`AgendaGenerator`] itself is immutable and
//! can be shared between threads.

pub mod config;
pub mod data;
mod error;
pub mod expand;
pub mod fill;
mod generate;
pub mod roles;
pub mod storage;
pub mod structure;
mod template;
pub mod transcribe;

pub use config::{ConfigError, GeneratorConfig, StorageConfig};
pub use data::{assemble, AgendaData, AgendaRecord, AgendaValue, Meeting, RoleSlot};
pub use error::GenerationError;
pub use expand::{expand, Expansion, RepeatingFamily};
pub use fill::{fill_by_coordinates, fill_by_labels, substitute_placeholders, FillReport};
pub use generate::{agenda_filename, AgendaGenerator, GeneratedAgenda, Stage, Strategy};
pub use roles::{canonicalize, data_key_for_role, BaseRole};
pub use storage::{BlobStore, BlobStoreError, DirectoryBlobStore, MemoryBlobStore, StoragePath};
#[cfg(feature = "http")]
pub use storage::HttpBlobStore;
pub use structure::{RoleMapping, StructureError, TemplateStructure};
pub use template::{select_template, TemplateRecord};
pub use transcribe::{transcribe_grid, transcribe_template};
