use agenda_xlsx::XlsxError;
use thiserror::Error;

use crate::generate::{Stage, Strategy};
use crate::storage::{BlobStoreError, StoragePathError};

/// A generation request that could not produce a document.
///
/// `Display` is the message shown to the requesting user.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("No template available for this meeting")]
    TemplateUnavailable,
    #[error("Template storage path is invalid: {0}")]
    InvalidStoragePath(#[from] StoragePathError),
    #[error("Failed to download template: {0}")]
    BlobFetch(#[from] BlobStoreError),
    #[error("Template is not a readable spreadsheet: {0}")]
    InvalidTemplate(#[source] XlsxError),
    #[error("Failed to generate agenda: {source}")]
    Serialization {
        strategy: Strategy,
        #[source]
        source: XlsxError,
    },
}

impl GenerationError {
    /// The last stage reached before the request moved to [`Stage::Failed`].
    pub fn stage(&self) -> Stage {
        match self {
            GenerationError::TemplateUnavailable | GenerationError::InvalidStoragePath(_) => {
                Stage::NoTemplate
            }
            GenerationError::BlobFetch(_) | GenerationError::InvalidTemplate(_) => {
                Stage::TemplateSelected
            }
            GenerationError::Serialization { strategy, .. } => strategy.stage(),
        }
    }
}
