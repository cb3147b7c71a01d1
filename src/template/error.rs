//! Registry and resolution errors

use thiserror::Error;

/// Errors raised while registering or looking up raw templates
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// A root or copy template with this id is already registered
    #[error("duplicate template definition: {id}")]
    DuplicateId { id: String },

    /// No template with this id is registered
    #[error("template not found: {id}")]
    NotFound { id: String },

    /// Templates must be named
    #[error("template id must not be empty")]
    EmptyId,

    /// An in-place patch is filed under its target, so both must match
    #[error("in-place template '{id}' cannot extend '{target}'")]
    InPlaceTargetMismatch { id: String, target: String },
}

/// Structural errors raised while compiling a template
///
/// They depend only on registry contents, so a compiled outcome caches
/// them and hands the same value to every caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    /// No template is registered under the compiled id
    #[error("template not found: {id}")]
    NotFound { id: String },

    /// `extend` (or an include) names an unregistered template
    #[error("template '{template}' references unknown template '{target}'")]
    MissingExtendTarget { template: String, target: String },

    /// The extend graph loops back on itself
    #[error("circular template extension: {}", chain.join(" -> "))]
    Cycle { chain: Vec<String> },

    /// A path matched several nodes where one was required
    #[error("path '{path}' in template '{template}' matches {count} nodes, expected exactly one")]
    AmbiguousTarget {
        template: String,
        path: String,
        count: usize,
    },

    /// A path matched nothing
    #[error("path '{path}' in template '{template}' matches no node")]
    TargetNotFound { template: String, path: String },

    /// The payload does not fit the action
    #[error("invalid {action} directive in template '{template}': {reason}")]
    InvalidAction {
        template: String,
        action: String,
        reason: String,
    },
}

impl ResolutionError {
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    pub fn missing_target(template: impl Into<String>, target: impl Into<String>) -> Self {
        Self::MissingExtendTarget {
            template: template.into(),
            target: target.into(),
        }
    }

    pub fn cycle(chain: Vec<String>) -> Self {
        Self::Cycle { chain }
    }

    pub fn invalid_action(
        template: impl Into<String>,
        action: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidAction {
            template: template.into(),
            action: action.into(),
            reason: reason.into(),
        }
    }
}
