//! Path evaluation over markup trees
//!
//! Matches are returned as index paths (see [`crate::tree::node_at`]) in
//! document order, without duplicates.

use crate::parser::{Axis, PathExpr, Predicate, Step};
use crate::tree::{Element, Node};

/// Index path of every element matching `path`
pub fn select(nodes: &[Node], path: &PathExpr) -> Vec<Vec<usize>> {
    // The empty path stands for the virtual root above `nodes`
    let mut context: Vec<Vec<usize>> = vec![Vec::new()];

    for step in &path.steps {
        let mut next = Vec::new();
        for base in &context {
            let Some(children) = children_at(nodes, base) else {
                continue;
            };
            match step.axis {
                Axis::Child => collect_children(children, base, step, &mut next),
                Axis::Descendant => collect_descendants(children, base, step, &mut next),
            }
        }
        next.sort();
        next.dedup();
        context = next;
    }

    context.retain(|p| !p.is_empty());
    context
}

/// Children of the node at `path`, or the top-level list for the root
fn children_at<'a>(nodes: &'a [Node], path: &[usize]) -> Option<&'a [Node]> {
    if path.is_empty() {
        return Some(nodes);
    }
    crate::tree::node_at(nodes, path)?
        .as_element()
        .map(|e| e.children.as_slice())
}

fn collect_children(children: &[Node], base: &[usize], step: &Step, out: &mut Vec<Vec<usize>>) {
    for (index, child) in children.iter().enumerate() {
        if let Some(element) = child.as_element() {
            if step_matches(step, element) {
                out.push(extend_path(base, index));
            }
        }
    }
}

fn collect_descendants(
    children: &[Node],
    base: &[usize],
    step: &Step,
    out: &mut Vec<Vec<usize>>,
) {
    let mut pending: Vec<(Vec<usize>, &[Node])> = vec![(base.to_vec(), children)];
    while let Some((parent, children)) = pending.pop() {
        for (index, child) in children.iter().enumerate() {
            let Some(element) = child.as_element() else {
                continue;
            };
            let path = extend_path(&parent, index);
            if step_matches(step, element) {
                out.push(path.clone());
            }
            if !element.children.is_empty() {
                pending.push((path, &element.children));
            }
        }
    }
}

fn extend_path(base: &[usize], index: usize) -> Vec<usize> {
    let mut path = Vec::with_capacity(base.len() + 1);
    path.extend_from_slice(base);
    path.push(index);
    path
}

fn step_matches(step: &Step, element: &Element) -> bool {
    step.test.matches(&element.tag)
        && step.predicates.iter().all(|p| match p {
            Predicate::HasAttribute(name) => element.attributes.contains(name),
            Predicate::AttributeEquals { name, value } => {
                element.attributes.get(name) == Some(value.as_str())
            }
        })
}
