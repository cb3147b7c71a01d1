//! Path expression AST
//!
//! A path locates elements by tag name and attribute predicates. It is
//! evaluated against the top-level node list of a template, which acts as
//! a virtual root:
//!
//! ```text
//! a/b              top-level <a> elements, then their <b> children
//! //li[@class="x"] every <li class="x"> at any depth
//! .//*[@name]      every element carrying a name attribute
//! ```

use std::fmt;

/// How a step relates to its context node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Child,
    Descendant,
}

/// Tag test of a step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeTest {
    Any,
    Tag(String),
}

impl NodeTest {
    pub fn matches(&self, tag: &str) -> bool {
        match self {
            NodeTest::Any => true,
            NodeTest::Tag(name) => name == tag,
        }
    }
}

/// Attribute predicate of a step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// `[@name]`
    HasAttribute(String),
    /// `[@name="value"]`
    AttributeEquals { name: String, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub axis: Axis,
    pub test: NodeTest,
    pub predicates: Vec<Predicate>,
}

/// A parsed path expression, keeping its source text for diagnostics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathExpr {
    pub source: String,
    pub steps: Vec<Step>,
}

impl fmt::Display for PathExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}
