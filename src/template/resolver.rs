//! Extension graph - dependency edges between templates
//!
//! A template depends on the target of a copy `extend` and on every
//! template it includes, either in its own content or in the payload of
//! one of its in-place layers. Layers share their target's node, so a
//! template and its layers resolve as one unit.

use std::collections::{HashMap, HashSet};

use super::definition::ExtendMode;
use super::error::ResolutionError;
use super::registry::RegistrySnapshot;

/// Dependency graph over every id in a registry snapshot
#[derive(Debug, Clone, Default)]
pub struct ExtendGraph {
    /// id -> ids it depends on, in declaration order
    edges: HashMap<String, Vec<String>>,
    /// ids with a root or copy definition
    defined: HashSet<String>,
    /// ids targeted only by layers
    layered: HashSet<String>,
    /// Every id in registration order
    order: Vec<String>,
}

/// A DFS frame: node plus the index of the next edge to follow
struct Frame<'a> {
    id: &'a str,
    next: usize,
}

impl ExtendGraph {
    /// Build the graph from registry contents
    pub fn build(snapshot: &RegistrySnapshot) -> Self {
        let mut graph = Self {
            order: snapshot.list_ids().to_vec(),
            ..Self::default()
        };

        for template in snapshot.templates() {
            let deps = graph.edges.entry(template.id.clone()).or_default();
            if let Some(extend) = template.extend() {
                if extend.mode == ExtendMode::Copy {
                    deps.push(extend.target.clone());
                }
            }
            deps.extend(template.includes());

            if template.is_layer() {
                graph.layered.insert(template.id.clone());
            } else {
                graph.defined.insert(template.id.clone());
            }
        }

        for deps in graph.edges.values_mut() {
            let mut seen = HashSet::new();
            deps.retain(|dep| seen.insert(dep.clone()));
        }
        graph
    }

    /// Direct dependencies of an id
    pub fn dependencies(&self, id: &str) -> &[String] {
        self.edges.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_defined(&self, id: &str) -> bool {
        self.defined.contains(id)
    }

    /// Verify everything reachable from `id` exists and is acyclic
    ///
    /// Depth first, with an explicit stack. The first missing target or
    /// back edge found aborts the walk.
    pub fn check_from(&self, id: &str) -> Result<(), ResolutionError> {
        if !self.is_defined(id) {
            return Err(if self.layered.contains(id) {
                ResolutionError::missing_target(id, id)
            } else {
                ResolutionError::not_found(id)
            });
        }

        let mut finished: HashSet<&str> = HashSet::new();
        let mut stack = vec![Frame { id, next: 0 }];

        while let Some(frame) = stack.last_mut() {
            let current = frame.id;
            let Some(target) = self.dependencies(current).get(frame.next) else {
                finished.insert(current);
                stack.pop();
                continue;
            };
            frame.next += 1;

            if !self.is_defined(target) {
                return Err(ResolutionError::missing_target(current, target.as_str()));
            }
            if let Some(start) = stack.iter().position(|f| f.id == target) {
                return Err(cycle_chain(&stack[start..], target));
            }
            if !finished.contains(target.as_str()) {
                stack.push(Frame { id: target, next: 0 });
            }
        }
        Ok(())
    }

    /// Every id ordered so that dependencies precede their dependents
    ///
    /// Ties follow registration order. Edges to undefined ids are skipped
    /// here and reported when that id is compiled.
    pub fn compile_order(&self) -> Result<Vec<String>, ResolutionError> {
        let mut order = Vec::with_capacity(self.order.len());
        let mut finished: HashSet<&str> = HashSet::new();

        for root in &self.order {
            if finished.contains(root.as_str()) {
                continue;
            }
            let mut stack = vec![Frame { id: root, next: 0 }];
            while let Some(frame) = stack.last_mut() {
                let current = frame.id;
                let Some(target) = self.dependencies(current).get(frame.next) else {
                    finished.insert(current);
                    order.push(current.to_string());
                    stack.pop();
                    continue;
                };
                frame.next += 1;

                if !self.is_defined(target) || finished.contains(target.as_str()) {
                    continue;
                }
                if let Some(start) = stack.iter().position(|f| f.id == target) {
                    return Err(cycle_chain(&stack[start..], target));
                }
                stack.push(Frame { id: target, next: 0 });
            }
        }
        Ok(order)
    }
}

fn cycle_chain(frames: &[Frame<'_>], closing: &str) -> ResolutionError {
    let mut chain: Vec<String> = frames.iter().map(|f| f.id.to_string()).collect();
    chain.push(closing.to_string());
    ResolutionError::cycle(chain)
}
