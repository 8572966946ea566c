//! Startup configuration errors.

use thiserror::Error;

use crate::{ModelIdentity, ViewCapability};

/// Errors detected while building the registry.
///
/// They are fatal: the process must not start with an incomplete registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    /// The collaborator module declaring the model's views is not known.
    #[error("no views module `{module}` is declared for model `{model}`")]
    MissingViewsModule {
        /// Model being registered.
        model: ModelIdentity,
        /// Module name derived from the model.
        module: String,
    },
    /// Two views of the same model declare the same capability.
    #[error("views `{first}` and `{second}` both declare `{capability}` for model `{model}`")]
    DuplicateCapability {
        /// Model being registered.
        model: ModelIdentity,
        /// Capability declared twice.
        capability: ViewCapability,
        /// View declared first.
        first: String,
        /// View declared second.
        second: String,
    },
    /// The process-wide registry slot was already filled.
    #[error("the entity registry has already been initialised")]
    AlreadyInitialised,
}
