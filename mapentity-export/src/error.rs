//! Export errors and their client-facing representation.

use std::io;

use mapentity_core::{EntityId, GeometryKind, ModelIdentity, ReprojectError, Srid, ViewCapability};
use serde::Serialize;
use thiserror::Error;

/// Errors raised while exporting rows.
///
/// Client errors ([`ExportError::status`] in the 4xx range) carry a
/// message safe to show; internal errors are reported generically by
/// [`ExportError::to_response`].
#[derive(Debug, Error)]
pub enum ExportError {
    /// The requested `format` value is unknown or not offered by the view.
    #[error("unsupported format `{format}` for {capability}")]
    UnsupportedFormat {
        /// Value received.
        format: String,
        /// Capability being exported.
        capability: ViewCapability,
    },
    /// Rows cannot share one output layer.
    #[error("row {pk} has a {found} geometry but the export already holds {expected} geometries")]
    FormatIncompatible {
        /// Family fixed by the first exported row.
        expected: GeometryKind,
        /// Family of the offending row.
        found: GeometryKind,
        /// Offending row.
        pk: EntityId,
    },
    /// The capability is rendered outside the export layer.
    #[error("{capability} views are not rendered by the exporter")]
    UnsupportedCapability {
        /// Capability requested.
        capability: ViewCapability,
    },
    /// A single-row export was requested without a primary key.
    #[error("{capability} export needs a primary key")]
    MissingPrimaryKey {
        /// Capability requested.
        capability: ViewCapability,
    },
    /// The requested row is not in the queryset.
    #[error("{model} {pk} does not exist")]
    RowNotFound {
        /// Model queried.
        model: ModelIdentity,
        /// Key requested.
        pk: EntityId,
    },
    /// No document template matched the model or the generic fallback.
    #[error("no document template found for `{name}`")]
    TemplateMissing {
        /// Most specific template name searched.
        name: String,
    },
    /// A collaborator-provided artefact is not available yet.
    #[error("{artefact} for {model} {pk} is not ready")]
    DependencyNotReady {
        /// Missing artefact, e.g. `map image`.
        artefact: &'static str,
        /// Model of the row.
        model: ModelIdentity,
        /// Row concerned.
        pk: EntityId,
    },
    /// No projection definition is known for the output SRID.
    #[error("no projection definition for {srid}")]
    UnknownProjection {
        /// SRID without a definition.
        srid: Srid,
    },
    /// Coordinates could not be moved to the output SRID.
    #[error(transparent)]
    Reproject(#[from] ReprojectError),
    /// Writing to the sink or scratch files failed.
    #[error("export I/O failed")]
    Io(#[from] io::Error),
    /// CSV encoding failed.
    #[error("CSV encoding failed")]
    Csv(#[from] csv::Error),
    /// JSON encoding failed.
    #[error("JSON encoding failed")]
    Json(#[from] serde_json::Error),
    /// Zip archive handling failed.
    #[error("zip archive handling failed")]
    Zip(#[source] Box<zip::result::ZipError>),
    /// Shapefile encoding failed.
    #[error("shapefile encoding failed")]
    Shapefile(#[source] Box<shapefile::Error>),
    /// A shapefile attribute name was rejected.
    #[error("invalid shapefile field `{name}`: {reason}")]
    ShapefileField {
        /// Field name.
        name: String,
        /// Why it was rejected.
        reason: String,
    },
    /// XML encoding failed.
    #[error("XML encoding failed")]
    Xml(#[source] Box<quick_xml::Error>),
    /// Document template rendering failed.
    #[error("document template rendering failed")]
    Template(#[source] Box<tera::Error>),
}

impl From<zip::result::ZipError> for ExportError {
    fn from(err: zip::result::ZipError) -> Self {
        Self::Zip(Box::new(err))
    }
}

impl From<shapefile::Error> for ExportError {
    fn from(err: shapefile::Error) -> Self {
        Self::Shapefile(Box::new(err))
    }
}

impl From<quick_xml::Error> for ExportError {
    fn from(err: quick_xml::Error) -> Self {
        Self::Xml(Box::new(err))
    }
}

impl From<tera::Error> for ExportError {
    fn from(err: tera::Error) -> Self {
        Self::Template(Box::new(err))
    }
}

/// Structured error body returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorResponse {
    /// HTTP-equivalent status code.
    pub status: u16,
    /// Stable machine-readable code.
    pub code: &'static str,
    /// Human readable message.
    pub message: String,
}

impl ExportError {
    /// HTTP-equivalent status of the error.
    #[must_use]
    pub const fn status(&self) -> u16 {
        match self {
            Self::UnsupportedFormat { .. }
            | Self::FormatIncompatible { .. }
            | Self::UnsupportedCapability { .. }
            | Self::MissingPrimaryKey { .. } => 400,
            Self::RowNotFound { .. } | Self::TemplateMissing { .. } => 404,
            Self::DependencyNotReady { .. } => 409,
            _ => 500,
        }
    }

    /// Stable code identifying the error kind.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::UnsupportedFormat { .. } => "unsupported_format",
            Self::FormatIncompatible { .. } => "format_incompatible",
            Self::UnsupportedCapability { .. } => "unsupported_capability",
            Self::MissingPrimaryKey { .. } => "missing_primary_key",
            Self::RowNotFound { .. } => "not_found",
            Self::TemplateMissing { .. } => "template_missing",
            Self::DependencyNotReady { .. } => "dependency_not_ready",
            _ => "internal_error",
        }
    }

    /// Whether the caller caused the error.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(self.status(), 400..=499)
    }

    /// Body to return to the caller.
    ///
    /// Internal failures keep their details in logs; the response only
    /// says that the export failed.
    #[must_use]
    pub fn to_response(&self) -> ErrorResponse {
        let message = match self {
            _ if self.status() == 500 => "the export could not be produced".to_owned(),
            _ => self.to_string(),
        };
        ErrorResponse {
            status: self.status(),
            code: self.code(),
            message,
        }
    }
}
