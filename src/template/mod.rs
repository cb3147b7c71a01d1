//! Template system: registration, extension and compilation
//!
//! Templates are named markup fragments. A root template holds literal
//! markup; a patch template extends another one and edits it through
//! path-addressed directives, either in place or as a new template.
//!
//! # Example
//!
//! ```text
//! <templates>
//!     <template id="card"><div class="card"><h2/></div></template>
//!
//!     <!-- new template "alert", card is left untouched -->
//!     <template id="alert" extend="card">
//!         <patch path="div" action="setAttributes"><attribute class="card alert"/></patch>
//!     </template>
//!
//!     <!-- edits card itself, and therefore alert too -->
//!     <template extend="card">
//!         <patch path="div/h2" action="insertInside">Title</patch>
//!     </template>
//! </templates>
//! ```

mod cache;
mod definition;
mod error;
mod patch;
mod query;
mod registry;
mod resolver;

pub use cache::{CacheStats, CompiledTemplate, Contributor, Outcome, TemplateCache};
pub use definition::{
    Action, Extend, ExtendMode, Origin, PatchDirective, Template, TemplateBody,
    INCLUDE_ATTRIBUTE, INCLUDE_TAG,
};
pub use error::{RegistryError, ResolutionError};
pub use patch::{apply_directive, apply_patch, expand_includes, ATTRIBUTE_TAG};
pub use query::select;
pub use registry::{RegistrySnapshot, TemplateHandle, TemplateRegistry};
pub use resolver::ExtendGraph;
