//! Template Graft - composition and resolution engine for markup templates
//!
//! Independently written modules ship named markup fragments. Any module can
//! extend another one's template, either in place or as a copy, and edit it
//! through path-addressed patch directives without copying its markup. The
//! engine resolves the extension graph, applies the patches and caches the
//! compiled trees for concurrent readers.
//!
//! # Example
//!
//! ```rust
//! use template_graft::render;
//!
//! let html = render(r#"
//!     <templates>
//!         <template id="base"><ul><li>one</li></ul></template>
//!         <template id="more" extend="base">
//!             <patch path="ul" action="insertInside"><li>two</li></patch>
//!         </template>
//!     </templates>
//! "#, "more").unwrap();
//!
//! assert_eq!(html, "<ul><li>one</li><li>two</li></ul>");
//! ```

pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod parser;
pub mod template;
pub mod tree;

pub use catalog::{translatable_strings, CatalogEntry};
pub use config::{ConfigError, EngineConfig};
pub use engine::TemplateEngine;
pub use error::ParseError;
pub use parser::{parse_path, parse_source};
pub use template::{
    CompiledTemplate, RegistryError, ResolutionError, Template, TemplateHandle, TemplateRegistry,
};
pub use tree::{Element, Node};

use thiserror::Error;

/// Errors that can occur while loading a template source
#[derive(Debug, Error)]
pub enum LoadError {
    /// The source could not be parsed
    #[error("parse errors: {}", format_parse_errors(.0))]
    Parse(Vec<ParseError>),

    /// The parsed templates could not be registered
    #[error("registration error: {0}")]
    Registry(#[from] RegistryError),
}

impl From<Vec<ParseError>> for LoadError {
    fn from(errors: Vec<ParseError>) -> Self {
        LoadError::Parse(errors)
    }
}

impl LoadError {
    /// Render parse errors as diagnostics against `source`
    pub fn format(&self, source: &str, filename: &str) -> String {
        match self {
            LoadError::Parse(errors) => errors
                .iter()
                .map(|e| e.format(source, filename))
                .collect::<Vec<_>>()
                .join("\n"),
            LoadError::Registry(err) => format!("{}: {}", filename, err),
        }
    }
}

fn format_parse_errors(errors: &[ParseError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors that can occur in [`render`]
#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("resolution error: {0}")]
    Resolution(#[from] ResolutionError),
}

/// Load `source` into a fresh engine and return template `id` as markup
pub fn render(source: &str, id: &str) -> Result<String, RenderError> {
    render_with_config(source, id, EngineConfig::default())
}

/// Like [`render`], with a custom configuration
pub fn render_with_config(
    source: &str,
    id: &str,
    config: EngineConfig,
) -> Result<String, RenderError> {
    let engine = TemplateEngine::with_config(config);
    engine.register_template_source(source)?;
    Ok(engine.compile(id)?.to_markup())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_root_template() {
        let html = render(r#"<template id="a"><p>Hi</p></template>"#, "a").unwrap();
        assert_eq!(html, "<p>Hi</p>");
    }

    #[test]
    fn test_render_errors() {
        assert!(matches!(
            render("<template id=\"a\"><p></template>", "a"),
            Err(RenderError::Load(LoadError::Parse(_)))
        ));
        assert!(matches!(
            render(r#"<template id="a"><p/></template>"#, "b"),
            Err(RenderError::Resolution(ResolutionError::NotFound { .. }))
        ));
    }

    #[test]
    fn test_render_keeps_whitespace_without_minify() {
        let config = EngineConfig::new().with_minify_text(false);
        let html = render_with_config(r#"<template id="a"><p> x </p></template>"#, "a", config)
            .unwrap();
        assert_eq!(html, "<p> x </p>");
    }
}
