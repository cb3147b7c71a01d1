//! Translatable string enumeration
//!
//! Walks markup and yields the literals a translation catalog needs, each
//! with a context naming where it was found:
//!
//! ```text
//! template:<id>                       text content
//! template:<id>:<tag>:<attribute>     translatable attribute value
//! ```
//!
//! Text that is an expression for the downstream evaluator is skipped.

use regex::RegexSet;

use crate::config::{ConfigError, EngineConfig};
use crate::template::{Template, TemplateBody};
use crate::tree::{Element, Node};

/// One literal offered for translation
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CatalogEntry {
    pub context: String,
    pub message: String,
}

impl CatalogEntry {
    pub fn new(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            context: context.into(),
            message: message.into(),
        }
    }
}

/// Collects catalog entries using one configuration
#[derive(Debug, Clone)]
pub struct CatalogCollector<'a> {
    config: &'a EngineConfig,
    expressions: RegexSet,
}

impl<'a> CatalogCollector<'a> {
    /// Fails when an expression pattern is not a valid regex
    pub fn new(config: &'a EngineConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            config,
            expressions: config.expression_matcher()?,
        })
    }

    /// Entries for a node list belonging to template `id`, in document order
    pub fn collect(&self, id: &str, nodes: &[Node]) -> Vec<CatalogEntry> {
        let context = format!("{}:{}", self.config.context_prefix, id);
        let mut entries = Vec::new();
        self.visit(&context, nodes, &mut entries);
        entries
    }

    /// Entries for a raw template: its content or its patch payloads
    pub fn collect_template(&self, template: &Template) -> Vec<CatalogEntry> {
        match &template.body {
            TemplateBody::Markup(nodes) => self.collect(&template.id, nodes),
            TemplateBody::Patch { directives, .. } => directives
                .iter()
                .flat_map(|d| self.collect(&template.id, &d.payload))
                .collect(),
        }
    }

    fn visit(&self, context: &str, nodes: &[Node], entries: &mut Vec<CatalogEntry>) {
        for node in nodes {
            match node {
                Node::Text(text) => {
                    if let Some(message) = self.message(text) {
                        entries.push(CatalogEntry::new(context, message));
                    }
                }
                Node::Element(element) => {
                    self.visit_attributes(context, element, entries);
                    self.visit(context, &element.children, entries);
                }
            }
        }
    }

    fn visit_attributes(&self, context: &str, element: &Element, entries: &mut Vec<CatalogEntry>) {
        for (key, value) in element.attributes.iter() {
            if !self.config.is_translatable_attribute(key) {
                continue;
            }
            if let Some(message) = self.message(value) {
                entries.push(CatalogEntry::new(
                    format!("{}:{}:{}", context, element.tag, key),
                    message,
                ));
            }
        }
    }

    /// Normalized literal, or `None` when empty or an expression
    fn message(&self, text: &str) -> Option<String> {
        let text = text.replace('\n', "");
        let text = text.trim();
        if text.is_empty() || self.expressions.is_match(text) {
            return None;
        }
        Some(text.to_string())
    }
}

/// Entries for `nodes` of template `id` with the given configuration
pub fn translatable_strings(
    id: &str,
    nodes: &[Node],
    config: &EngineConfig,
) -> Result<Vec<CatalogEntry>, ConfigError> {
    Ok(CatalogCollector::new(config)?.collect(id, nodes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_source;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_text_and_attributes_in_document_order() {
        let nodes: Vec<Node> = vec![Element::new("form")
            .with_attr("label", "Sign up")
            .with_child(Element::new("p").with_text("  Hello\n world "))
            .with_child(
                Element::new("button")
                    .with_attr("hx-confirm", "Sure?")
                    .with_attr("class", "big")
                    .with_text("Send"),
            )
            .into()];
        let entries = translatable_strings("signup", &nodes, &EngineConfig::default()).unwrap();
        assert_eq!(
            entries,
            vec![
                CatalogEntry::new("template:signup:form:label", "Sign up"),
                CatalogEntry::new("template:signup", "Hello world"),
                CatalogEntry::new("template:signup:button:hx-confirm", "Sure?"),
                CatalogEntry::new("template:signup", "Send"),
            ]
        );
    }

    #[test]
    fn test_expressions_and_blank_text_skipped() {
        let nodes: Vec<Node> = vec![Element::new("p")
            .with_text("{{ user.name }}")
            .with_text("   ")
            .with_child(Element::new("span").with_text("{% if admin %}"))
            .with_text("Welcome")
            .into()];
        let entries = translatable_strings("home", &nodes, &EngineConfig::default()).unwrap();
        assert_eq!(entries, vec![CatalogEntry::new("template:home", "Welcome")]);
    }

    #[test]
    fn test_configured_prefix_and_attributes() {
        let config = EngineConfig::new()
            .with_context_prefix("ui")
            .with_translatable_attributes(["placeholder"]);
        let nodes: Vec<Node> = vec![Element::new("input")
            .with_attr("placeholder", "Name")
            .with_attr("label", "ignored")
            .into()];
        assert_eq!(
            translatable_strings("f", &nodes, &config).unwrap(),
            vec![CatalogEntry::new("ui:f:input:placeholder", "Name")]
        );
    }

    #[test]
    fn test_patch_payloads_are_collected() {
        let templates = parse_source(
            r#"<template id="child" extend="base">
                <patch path="div" action="insertInside"><b>Extra</b></patch>
                <patch path="div" action="setAttributes"><attribute label="Box"/></patch>
            </template>"#,
        )
        .unwrap();
        let config = EngineConfig::default();
        let collector = CatalogCollector::new(&config).unwrap();
        assert_eq!(
            collector.collect_template(&templates[0]),
            vec![
                CatalogEntry::new("template:child", "Extra"),
                CatalogEntry::new("template:child:attribute:label", "Box"),
            ]
        );
    }

    #[test]
    fn test_invalid_expression_pattern_is_an_error() {
        let config = EngineConfig::new().with_expression_pattern("{{(");
        assert!(matches!(
            CatalogCollector::new(&config),
            Err(ConfigError::InvalidPattern(_))
        ));
        let nodes: Vec<Node> = vec![Element::new("p").with_text("{{ name }}").into()];
        assert!(translatable_strings("t", &nodes, &config).is_err());
    }
}
