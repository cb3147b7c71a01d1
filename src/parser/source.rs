//! Source loader: template markup into [`Template`] records
//!
//! ```text
//! <templates>
//!     <template id="layout">
//!         <div class="page"><main/></div>
//!     </template>
//!     <template id="home" extend="layout">
//!         <patch path="//main" action="insertInside"><h1>Home</h1></patch>
//!     </template>
//!     <template extend="layout" priority="10">
//!         <patch path="div" action="setAttributes"><attribute lang="en"/></patch>
//!     </template>
//! </templates>
//! ```
//!
//! A unit is all-or-nothing: any error means no template from it is returned.
//!
//! Template bodies are HTML: void elements such as `<br>` or `<input>` need
//! no closing tag and HTML5 named entities like `&nbsp;` are resolved.

use std::sync::Arc;

use quick_xml::escape::{resolve_html5_entity, resolve_xml_entity};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::config::EngineConfig;
use crate::error::{ParseError, Span};
use crate::parser::grammar::parse_path;
use crate::template::{
    Extend, ExtendMode, Origin, PatchDirective, Template, TemplateBody, INCLUDE_ATTRIBUTE,
    INCLUDE_TAG,
};
use crate::tree::{Attributes, Element, Node};

const TEMPLATES_TAG: &str = "templates";
const TEMPLATE_TAG: &str = "template";
const PATCH_TAG: &str = "patch";

/// HTML elements that never have content or a closing tag
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

fn is_void(tag: &str) -> bool {
    VOID_ELEMENTS.iter().any(|v| v.eq_ignore_ascii_case(tag))
}

fn resolve_entity(entity: &str) -> Option<&'static str> {
    resolve_xml_entity(entity).or_else(|| resolve_html5_entity(entity))
}

/// Element as read from the source, with its span
#[derive(Debug)]
struct SourceElement {
    tag: String,
    attributes: Attributes,
    children: Vec<SourceNode>,
    span: Span,
}

#[derive(Debug)]
enum SourceNode {
    Element(SourceElement),
    Text(String, Span),
}

/// Parse a template source with the default configuration
pub fn parse_source(input: &str) -> Result<Vec<Template>, Vec<ParseError>> {
    parse_named_source("<memory>", input, &EngineConfig::default())
}

/// Parse a template source, recording `name` as the origin of every template
pub fn parse_named_source(
    name: &str,
    input: &str,
    config: &EngineConfig,
) -> Result<Vec<Template>, Vec<ParseError>> {
    let roots = read_markup(input, config.minify_text).map_err(|e| vec![e])?;
    let declarations = declarations(roots).map_err(|e| vec![e])?;

    let source: Arc<str> = Arc::from(name);
    let mut templates = Vec::new();
    let mut errors = Vec::new();
    for declaration in declarations {
        match build_template(declaration, &source) {
            Ok(template) => templates.push(template),
            Err(err) => errors.push(err),
        }
    }

    if errors.is_empty() {
        Ok(templates)
    } else {
        Err(errors)
    }
}

fn read_markup(input: &str, minify: bool) -> Result<Vec<SourceNode>, ParseError> {
    let mut reader = Reader::from_str(input);
    reader.config_mut().trim_text(false);
    // Void elements are never closed, so end tags are matched on our own stack
    reader.config_mut().check_end_names = false;

    let mut stack: Vec<SourceElement> = Vec::new();
    let mut roots: Vec<SourceNode> = Vec::new();

    loop {
        let start = reader.buffer_position() as usize;
        let event = reader.read_event().map_err(|err| {
            let at = reader.error_position() as usize;
            ParseError::markup(at..at + 1, err.to_string())
        })?;
        let end = reader.buffer_position() as usize;

        match event {
            Event::Start(e) => {
                let element = open_element(&e, start..end)?;
                if is_void(&element.tag) {
                    append(&mut stack, &mut roots, SourceNode::Element(element));
                } else {
                    stack.push(element);
                }
            }
            Event::Empty(e) => {
                let element = open_element(&e, start..end)?;
                append(&mut stack, &mut roots, SourceNode::Element(element));
            }
            Event::End(e) => {
                let tag = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                // `</br>` and friends close nothing
                if is_void(&tag) {
                    continue;
                }
                let mut element = stack
                    .pop()
                    .ok_or_else(|| ParseError::markup(start..end, "unexpected closing tag"))?;
                if element.tag != tag {
                    return Err(ParseError::markup(
                        start..end,
                        format!("expected </{}>, found </{}>", element.tag, tag),
                    ));
                }
                element.span.end = end;
                append(&mut stack, &mut roots, SourceNode::Element(element));
            }
            Event::Text(t) => {
                let text = t
                    .unescape_with(resolve_entity)
                    .map_err(|err| ParseError::markup(start..end, err.to_string()))?;
                push_text(&mut stack, &mut roots, &text, start..end, minify);
            }
            Event::CData(c) => {
                let text = String::from_utf8_lossy(&c.into_inner()).into_owned();
                push_text(&mut stack, &mut roots, &text, start..end, minify);
            }
            Event::Comment(_) | Event::Decl(_) | Event::PI(_) | Event::DocType(_) => {}
            Event::Eof => break,
        }
    }

    if let Some(open) = stack.last() {
        return Err(ParseError::markup(
            open.span.clone(),
            format!("unclosed element <{}>", open.tag),
        ));
    }

    Ok(roots)
}

fn open_element(e: &BytesStart<'_>, span: Span) -> Result<SourceElement, ParseError> {
    let tag = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    let mut attributes = Attributes::new();

    for attr in e.html_attributes().with_checks(false) {
        let attr = attr.map_err(|err| ParseError::markup(span.clone(), err.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        if attributes.contains(&key) {
            return Err(ParseError::DuplicateAttribute { name: key, span });
        }
        let value = attr
            .unescape_value_with(resolve_entity)
            .map_err(|err| ParseError::markup(span.clone(), err.to_string()))?;
        attributes.set(key, value.into_owned());
    }

    Ok(SourceElement {
        tag,
        attributes,
        children: Vec::new(),
        span,
    })
}

fn append(stack: &mut [SourceElement], roots: &mut Vec<SourceNode>, node: SourceNode) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None => roots.push(node),
    }
}

fn push_text(
    stack: &mut [SourceElement],
    roots: &mut Vec<SourceNode>,
    text: &str,
    span: Span,
    minify: bool,
) {
    let text = if minify { text.trim() } else { text };
    if text.is_empty() {
        return;
    }
    append(stack, roots, SourceNode::Text(text.to_string(), span));
}

/// Elements of a structural list, rejecting stray text
fn structural_elements(nodes: Vec<SourceNode>, context: &str) -> Result<Vec<SourceElement>, ParseError> {
    let mut elements = Vec::new();
    for node in nodes {
        match node {
            SourceNode::Element(element) => elements.push(element),
            SourceNode::Text(text, _) if text.trim().is_empty() => {}
            SourceNode::Text(_, span) => {
                return Err(ParseError::invalid(
                    span,
                    format!("text is not allowed {}", context),
                ))
            }
        }
    }
    Ok(elements)
}

/// The `<template>` declarations of a source unit
fn declarations(roots: Vec<SourceNode>) -> Result<Vec<SourceElement>, ParseError> {
    let mut elements = structural_elements(roots, "outside of a template")?;
    if elements.is_empty() {
        return Ok(Vec::new());
    }
    if elements.len() > 1 {
        return Err(ParseError::invalid(
            elements[1].span.clone(),
            "a source must have a single root element",
        ));
    }

    let root = elements.remove(0);
    let tag = root.tag.clone();
    match tag.as_str() {
        TEMPLATE_TAG => Ok(vec![root]),
        TEMPLATES_TAG => {
            let children = structural_elements(root.children, "between templates")?;
            for child in &children {
                if child.tag != TEMPLATE_TAG {
                    return Err(ParseError::invalid(
                        child.span.clone(),
                        format!("only <template> can be loaded, not <{}>", child.tag),
                    ));
                }
            }
            Ok(children)
        }
        other => Err(ParseError::invalid(
            root.span,
            format!(
                "only <template> or <templates> can be loaded, not <{}>",
                other
            ),
        )),
    }
}

fn build_template(declaration: SourceElement, source: &Arc<str>) -> Result<Template, ParseError> {
    let span = declaration.span.clone();
    let origin = Origin::new(source.clone(), span.clone());
    let attrs = &declaration.attributes;

    let id = attrs.get("id").map(str::to_string);
    if matches!(&id, Some(id) if id.trim().is_empty()) {
        return Err(ParseError::MissingId { span });
    }

    let mode = attrs
        .get("mode")
        .map(str::parse::<ExtendMode>)
        .transpose()
        .map_err(|msg| ParseError::invalid(span.clone(), msg))?;

    let priority = attrs
        .get("priority")
        .map(|p| {
            p.trim().parse::<i32>().map_err(|_| {
                ParseError::invalid(span.clone(), format!("priority '{}' is not an integer", p))
            })
        })
        .transpose()?;

    let target = match attrs.get("extend") {
        None => None,
        Some(t) if t.trim().is_empty() => {
            return Err(ParseError::invalid(span, "extend must name a template"))
        }
        Some(t) => Some(t.to_string()),
    };

    let Some(target) = target else {
        if mode.is_some() {
            return Err(ParseError::invalid(span, "mode requires extend"));
        }
        if priority.is_some() {
            return Err(ParseError::invalid(
                span,
                "priority only applies to in-place patches",
            ));
        }
        let id = id.ok_or(ParseError::MissingId { span })?;
        let content = into_nodes(declaration.children)?;
        return Ok(Template {
            id,
            body: TemplateBody::Markup(content),
            origin,
        });
    };

    let (mode, id) = extend_mode(id, &target, mode, &span)?;
    if mode == ExtendMode::Copy && priority.is_some() {
        return Err(ParseError::invalid(
            span,
            "priority only applies to in-place patches",
        ));
    }

    let directives = structural_elements(declaration.children, "between patch directives")?
        .into_iter()
        .map(build_directive)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Template {
        id,
        body: TemplateBody::Patch {
            extend: Extend {
                target,
                mode,
                priority: priority.unwrap_or(0),
            },
            directives,
        },
        origin,
    })
}

/// Decide the extension mode, checking a declared mode against the ids
fn extend_mode(
    id: Option<String>,
    target: &str,
    declared: Option<ExtendMode>,
    span: &Span,
) -> Result<(ExtendMode, String), ParseError> {
    let distinct = id.as_deref().filter(|id| *id != target);
    match (distinct, declared) {
        (None, None | Some(ExtendMode::InPlace)) => Ok((ExtendMode::InPlace, target.to_string())),
        (None, Some(ExtendMode::Copy)) => Err(ParseError::invalid(
            span.clone(),
            "copy mode requires an id distinct from extend",
        )),
        (Some(id), None | Some(ExtendMode::Copy)) => Ok((ExtendMode::Copy, id.to_string())),
        (Some(id), Some(ExtendMode::InPlace)) => Err(ParseError::invalid(
            span.clone(),
            format!(
                "in-place mode cannot declare id '{}' distinct from extend '{}'",
                id, target
            ),
        )),
    }
}

fn build_directive(element: SourceElement) -> Result<PatchDirective, ParseError> {
    let span = element.span.clone();
    if element.tag != PATCH_TAG {
        return Err(ParseError::invalid(
            span,
            format!("expected <{}>, found <{}>", PATCH_TAG, element.tag),
        ));
    }

    let raw_path = element
        .attributes
        .get("path")
        .ok_or_else(|| ParseError::invalid(span.clone(), "patch directive requires a path"))?;
    let path = parse_path(raw_path).map_err(|errs| ParseError::InvalidPath {
        path: raw_path.to_string(),
        span: span.clone(),
        message: errs
            .first()
            .map(|e| e.message())
            .unwrap_or_else(|| "invalid path".to_string()),
    })?;

    let action = element
        .attributes
        .get("action")
        .ok_or_else(|| ParseError::invalid(span.clone(), "patch directive requires an action"))?
        .parse()
        .map_err(|msg: String| ParseError::invalid(span.clone(), msg))?;

    let multiple = match element.attributes.get("mult") {
        None => false,
        Some(flag) => parse_flag(flag)
            .ok_or_else(|| ParseError::invalid(span.clone(), format!("mult '{}' is not a boolean", flag)))?,
    };

    Ok(PatchDirective {
        path,
        action,
        payload: into_nodes(element.children)?,
        multiple,
        span,
    })
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim() {
        "true" | "True" | "1" => Some(true),
        "false" | "False" | "0" => Some(false),
        _ => None,
    }
}

fn into_nodes(children: Vec<SourceNode>) -> Result<Vec<Node>, ParseError> {
    children.into_iter().map(into_node).collect()
}

fn into_node(node: SourceNode) -> Result<Node, ParseError> {
    match node {
        SourceNode::Text(text, _) => Ok(Node::Text(text)),
        SourceNode::Element(element) => {
            if element.tag == INCLUDE_TAG {
                if element.attributes.get(INCLUDE_ATTRIBUTE).is_none() {
                    return Err(ParseError::invalid(
                        element.span,
                        "include requires a template attribute",
                    ));
                }
                if !element.children.is_empty() {
                    return Err(ParseError::invalid(
                        element.span,
                        "include cannot have content",
                    ));
                }
            }
            Ok(Element {
                tag: element.tag,
                attributes: element.attributes,
                children: into_nodes(element.children)?,
            }
            .into())
        }
    }
}
