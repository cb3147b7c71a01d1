//! Raw template records as produced by the source loader

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::Span;
use crate::parser::PathExpr;
use crate::tree::Node;

/// Where a template was declared
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    /// Name of the source unit (file name or caller-supplied label)
    pub source: Arc<str>,
    /// Byte range of the `<template>` element in that source
    pub span: Span,
}

impl Origin {
    pub fn new(source: impl Into<Arc<str>>, span: Span) -> Self {
        Self {
            source: source.into(),
            span,
        }
    }

    /// Origin for templates built in code rather than parsed
    pub fn inline() -> Self {
        Self::new("<inline>", 0..0)
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}..{}", self.source, self.span.start, self.span.end)
    }
}

/// How a patch template relates to the template it extends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtendMode {
    /// Patches the target's own compiled output, sharing its id
    InPlace,
    /// Produces a new template under a distinct id, leaving the target intact
    Copy,
}

impl ExtendMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtendMode::InPlace => "in-place",
            ExtendMode::Copy => "copy",
        }
    }
}

impl FromStr for ExtendMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in-place" => Ok(ExtendMode::InPlace),
            "copy" => Ok(ExtendMode::Copy),
            other => Err(format!(
                "unknown mode '{}' (expected 'in-place' or 'copy')",
                other
            )),
        }
    }
}

/// The `extend` pointer of a patch template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extend {
    pub target: String,
    pub mode: ExtendMode,
    /// Ordering among in-place layers on the same target; lower applies first
    pub priority: i32,
}

/// Structural edit performed by a patch directive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    InsertInside,
    InsertBefore,
    InsertAfter,
    Replace,
    Remove,
    SetAttributes,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::InsertInside => "insertInside",
            Action::InsertBefore => "insertBefore",
            Action::InsertAfter => "insertAfter",
            Action::Replace => "replace",
            Action::Remove => "remove",
            Action::SetAttributes => "setAttributes",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "insertInside" => Ok(Action::InsertInside),
            "insertBefore" => Ok(Action::InsertBefore),
            "insertAfter" => Ok(Action::InsertAfter),
            "replace" => Ok(Action::Replace),
            "remove" => Ok(Action::Remove),
            "setAttributes" => Ok(Action::SetAttributes),
            other => Err(format!("unknown action '{}'", other)),
        }
    }
}

/// One structural edit: where, what, and with which content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchDirective {
    pub path: PathExpr,
    pub action: Action,
    /// Nodes to insert, or `<attribute>` elements for `setAttributes`
    pub payload: Vec<Node>,
    /// Apply to every match instead of requiring exactly one
    pub multiple: bool,
    pub span: Span,
}

impl PatchDirective {
    pub fn new(path: PathExpr, action: Action, payload: Vec<Node>) -> Self {
        Self {
            path,
            action,
            payload,
            multiple: false,
            span: 0..0,
        }
    }

    pub fn with_multiple(mut self, multiple: bool) -> Self {
        self.multiple = multiple;
        self
    }
}

/// Content of a template: literal markup or a patch over another template
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateBody {
    Markup(Vec<Node>),
    Patch {
        extend: Extend,
        directives: Vec<PatchDirective>,
    },
}

/// A named template fragment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    /// Template id; for in-place patches this is the target id
    pub id: String,
    pub body: TemplateBody,
    pub origin: Origin,
}

impl Template {
    /// A root template with literal content
    pub fn root(id: impl Into<String>, content: Vec<Node>) -> Self {
        Self {
            id: id.into(),
            body: TemplateBody::Markup(content),
            origin: Origin::inline(),
        }
    }

    /// A patch producing a new template `id` from `target`
    pub fn copy_of(
        id: impl Into<String>,
        target: impl Into<String>,
        directives: Vec<PatchDirective>,
    ) -> Self {
        Self {
            id: id.into(),
            body: TemplateBody::Patch {
                extend: Extend {
                    target: target.into(),
                    mode: ExtendMode::Copy,
                    priority: 0,
                },
                directives,
            },
            origin: Origin::inline(),
        }
    }

    /// A patch layered onto `target` itself
    pub fn in_place(target: impl Into<String>, priority: i32, directives: Vec<PatchDirective>) -> Self {
        let target = target.into();
        Self {
            id: target.clone(),
            body: TemplateBody::Patch {
                extend: Extend {
                    target,
                    mode: ExtendMode::InPlace,
                    priority,
                },
                directives,
            },
            origin: Origin::inline(),
        }
    }

    pub fn with_origin(mut self, origin: Origin) -> Self {
        self.origin = origin;
        self
    }

    pub fn extend(&self) -> Option<&Extend> {
        match &self.body {
            TemplateBody::Markup(_) => None,
            TemplateBody::Patch { extend, .. } => Some(extend),
        }
    }

    pub fn is_root(&self) -> bool {
        matches!(self.body, TemplateBody::Markup(_))
    }

    /// Whether this record is an in-place layer rather than a definition
    pub fn is_layer(&self) -> bool {
        self.extend()
            .map(|e| e.mode == ExtendMode::InPlace)
            .unwrap_or(false)
    }

    /// Ids referenced through `<include template="..."/>`, in document order
    pub fn includes(&self) -> Vec<String> {
        let mut found = Vec::new();
        match &self.body {
            TemplateBody::Markup(nodes) => collect_includes(nodes, &mut found),
            TemplateBody::Patch { directives, .. } => {
                for directive in directives {
                    collect_includes(&directive.payload, &mut found);
                }
            }
        }
        found
    }
}

/// Tag of the element replaced by another template's compiled content
pub const INCLUDE_TAG: &str = "include";

/// Attribute of [`INCLUDE_TAG`] naming the included template
pub const INCLUDE_ATTRIBUTE: &str = "template";

fn collect_includes(nodes: &[Node], found: &mut Vec<String>) {
    for node in nodes {
        if let Some(element) = node.as_element() {
            if element.tag == INCLUDE_TAG {
                if let Some(target) = element.attributes.get(INCLUDE_ATTRIBUTE) {
                    found.push(target.to_string());
                }
            }
            collect_includes(&element.children, found);
        }
    }
}
