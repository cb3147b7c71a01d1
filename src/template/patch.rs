//! Patch executor - applies path-addressed edits to a markup tree
//!
//! The base tree is never mutated. The working copy starts as a shallow
//! clone of the top-level list and each edit copies only the elements on
//! the way down to the node it touches, so every untouched branch stays
//! shared with the base.

use crate::tree::{siblings_mut, Attributes, Node};

use super::definition::{Action, PatchDirective, INCLUDE_ATTRIBUTE, INCLUDE_TAG};
use super::error::ResolutionError;
use super::query::select;

/// Tag of the payload elements carrying a `setAttributes` mapping
pub const ATTRIBUTE_TAG: &str = "attribute";

/// Apply `directives` in order to a copy of `base`
///
/// `template_id` names the patch template in errors.
pub fn apply_patch(
    base: &[Node],
    directives: &[PatchDirective],
    template_id: &str,
) -> Result<Vec<Node>, ResolutionError> {
    let mut tree = base.to_vec();
    for directive in directives {
        apply_directive(&mut tree, directive, template_id)?;
    }
    Ok(tree)
}

/// Apply a single directive to `tree` in place
pub fn apply_directive(
    tree: &mut Vec<Node>,
    directive: &PatchDirective,
    template_id: &str,
) -> Result<(), ResolutionError> {
    let attributes = check_payload(directive, template_id)?;

    let matches = select(tree, &directive.path);
    if matches.is_empty() {
        return Err(ResolutionError::TargetNotFound {
            template: template_id.to_string(),
            path: directive.path.to_string(),
        });
    }
    if matches.len() > 1 && !directive.multiple {
        return Err(ResolutionError::AmbiguousTarget {
            template: template_id.to_string(),
            path: directive.path.to_string(),
            count: matches.len(),
        });
    }

    // Later matches first: an edit only shifts nodes after it in document order
    for path in matches.iter().rev() {
        edit(tree, path, directive, &attributes).ok_or_else(|| {
            ResolutionError::TargetNotFound {
                template: template_id.to_string(),
                path: directive.path.to_string(),
            }
        })?;
    }
    Ok(())
}

fn edit(
    tree: &mut Vec<Node>,
    path: &[usize],
    directive: &PatchDirective,
    attributes: &Attributes,
) -> Option<()> {
    let index = *path.last()?;
    let siblings = siblings_mut(tree, path)?;
    let payload = directive.payload.iter().cloned();

    match directive.action {
        Action::InsertInside => {
            siblings.get_mut(index)?.element_mut()?.children.extend(payload);
        }
        Action::InsertBefore => {
            siblings.splice(index..index, payload);
        }
        Action::InsertAfter => {
            siblings.splice(index + 1..index + 1, payload);
        }
        Action::Replace => {
            siblings.splice(index..=index, payload);
        }
        Action::Remove => {
            siblings.remove(index);
        }
        Action::SetAttributes => {
            siblings
                .get_mut(index)?
                .element_mut()?
                .attributes
                .merge(attributes);
        }
    }
    Some(())
}

fn is_blank(node: &Node) -> bool {
    matches!(node, Node::Text(text) if text.trim().is_empty())
}

/// Check the payload fits the action; returns the `setAttributes` mapping
fn check_payload(
    directive: &PatchDirective,
    template_id: &str,
) -> Result<Attributes, ResolutionError> {
    let action = directive.action;
    let invalid = |reason: &str| ResolutionError::invalid_action(template_id, action.as_str(), reason);
    let has_content = directive.payload.iter().any(|n| !is_blank(n));

    match action {
        Action::Remove if has_content => Err(invalid("remove takes no payload")),
        Action::Remove => Ok(Attributes::new()),
        Action::InsertInside | Action::InsertBefore | Action::InsertAfter | Action::Replace
            if !has_content =>
        {
            Err(invalid("payload must not be empty"))
        }
        Action::InsertInside | Action::InsertBefore | Action::InsertAfter | Action::Replace => {
            Ok(Attributes::new())
        }
        Action::SetAttributes => {
            let mut mapping = Attributes::new();
            for node in directive.payload.iter().filter(|n| !is_blank(n)) {
                match node.as_element() {
                    Some(element) if element.tag == ATTRIBUTE_TAG && element.children.is_empty() => {
                        mapping.merge(&element.attributes);
                    }
                    _ => return Err(invalid("payload may only contain empty <attribute/> elements")),
                }
            }
            if mapping.is_empty() {
                return Err(invalid("no attributes to set"));
            }
            Ok(mapping)
        }
    }
}

/// Replace every `<include template="..."/>` in `nodes` with the nodes
/// returned by `resolve` for that id
///
/// Only branches containing an include are copied.
pub fn expand_includes<F>(nodes: &mut Vec<Node>, resolve: &mut F) -> Result<(), ResolutionError>
where
    F: FnMut(&str) -> Result<Vec<Node>, ResolutionError>,
{
    let mut index = 0;
    while index < nodes.len() {
        let Some(element) = nodes[index].as_element() else {
            index += 1;
            continue;
        };

        if element.tag == INCLUDE_TAG {
            if let Some(target) = element.attributes.get(INCLUDE_ATTRIBUTE) {
                let content = resolve(target)?;
                let len = content.len();
                nodes.splice(index..=index, content);
                index += len;
                continue;
            }
        } else if contains_include(&element.children) {
            if let Some(element) = nodes[index].element_mut() {
                expand_includes(&mut element.children, resolve)?;
            }
        }
        index += 1;
    }
    Ok(())
}

/// Whether any element below `nodes` is an include
pub fn contains_include(nodes: &[Node]) -> bool {
    nodes.iter().any(|node| match node.as_element() {
        Some(element) => element.tag == INCLUDE_TAG || contains_include(&element.children),
        None => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_path;
    use crate::tree::{node_at, to_markup, Element};
    use pretty_assertions::assert_eq;

    fn base() -> Vec<Node> {
        vec![Element::new("div")
            .with_attr("class", "box")
            .with_child(Element::new("a").with_text("1"))
            .with_child(Element::new("b").with_text("2"))
            .with_child(Element::new("c").with_text("3"))
            .into()]
    }

    fn directive(path: &str, action: Action, payload: Vec<Node>) -> PatchDirective {
        PatchDirective::new(parse_path(path).expect("valid path"), action, payload)
    }

    fn apply(action: Action, path: &str, payload: Vec<Node>) -> Result<String, ResolutionError> {
        apply_patch(&base(), &[directive(path, action, payload)], "patch").map(|t| to_markup(&t))
    }

    #[test]
    fn test_replace_preserves_sibling_order() {
        let out = apply(Action::Replace, "div/b", vec![Element::new("x").into()]).unwrap();
        assert_eq!(out, r#"<div class="box"><a>1</a><x/><c>3</c></div>"#);
    }

    #[test]
    fn test_replace_with_several_nodes() {
        let payload = vec![Element::new("x").into(), Node::text("t"), Element::new("y").into()];
        let out = apply(Action::Replace, "div/a", payload).unwrap();
        assert_eq!(out, r#"<div class="box"><x/>t<y/><b>2</b><c>3</c></div>"#);
    }

    #[test]
    fn test_insert_positions() {
        let x = || vec![Element::new("x").into()];
        assert_eq!(
            apply(Action::InsertBefore, "div/b", x()).unwrap(),
            r#"<div class="box"><a>1</a><x/><b>2</b><c>3</c></div>"#
        );
        assert_eq!(
            apply(Action::InsertAfter, "div/b", x()).unwrap(),
            r#"<div class="box"><a>1</a><b>2</b><x/><c>3</c></div>"#
        );
        assert_eq!(
            apply(Action::InsertInside, "div/b", x()).unwrap(),
            r#"<div class="box"><a>1</a><b>2<x/></b><c>3</c></div>"#
        );
        assert_eq!(
            apply(Action::InsertAfter, "div", x()).unwrap(),
            r#"<div class="box"><a>1</a><b>2</b><c>3</c></div><x/>"#
        );
    }

    #[test]
    fn test_remove() {
        assert_eq!(
            apply(Action::Remove, "div/a", vec![]).unwrap(),
            r#"<div class="box"><b>2</b><c>3</c></div>"#
        );
        assert_eq!(apply(Action::Remove, "div", vec![]).unwrap(), "");
    }

    #[test]
    fn test_set_attributes_merges() {
        let payload = vec![
            Element::new("attribute").with_attr("class", "wide").into(),
            Element::new("attribute").with_attr("title", "t").into(),
        ];
        let tree = vec![Element::new("div")
            .with_attr("id", "main")
            .with_attr("class", "box")
            .into()];
        let out = apply_patch(
            &tree,
            &[directive("div", Action::SetAttributes, payload)],
            "patch",
        )
        .unwrap();
        assert_eq!(to_markup(&out), r#"<div id="main" class="wide" title="t"/>"#);
    }

    #[test]
    fn test_base_is_untouched_and_shared() {
        let base = base();
        let out = apply_patch(
            &base,
            &[directive("div/b", Action::InsertInside, vec![Node::text("!")])],
            "patch",
        )
        .unwrap();

        assert_eq!(to_markup(&base), r#"<div class="box"><a>1</a><b>2</b><c>3</c></div>"#);
        assert!(!out[0].shares_with(&base[0]));
        let unchanged = |tree: &[Node]| node_at(tree, &[0, 0]).cloned().unwrap();
        assert!(unchanged(&out).shares_with(&unchanged(&base)));
    }

    fn valid_payload(action: Action) -> Vec<Node> {
        match action {
            Action::Remove => vec![],
            Action::SetAttributes => vec![Element::new(ATTRIBUTE_TAG).with_attr("x", "1").into()],
            _ => vec![Element::new("x").into()],
        }
    }

    #[test]
    fn test_match_count_errors() {
        let tree = base();
        for action in [
            Action::InsertInside,
            Action::InsertBefore,
            Action::InsertAfter,
            Action::Replace,
            Action::Remove,
            Action::SetAttributes,
        ] {
            assert_eq!(
                apply_patch(&tree, &[directive("div/z", action, valid_payload(action))], "p"),
                Err(ResolutionError::TargetNotFound {
                    template: "p".into(),
                    path: "div/z".into(),
                }),
                "{} with no match",
                action.as_str()
            );
            assert_eq!(
                apply_patch(&tree, &[directive("div/*", action, valid_payload(action))], "p"),
                Err(ResolutionError::AmbiguousTarget {
                    template: "p".into(),
                    path: "div/*".into(),
                    count: 3,
                }),
                "{} with several matches",
                action.as_str()
            );
        }
    }

    #[test]
    fn test_insert_inside_appends_after_text() {
        let tree: Vec<Node> = vec![Element::new("div").with_text("Hello").into()];
        let payload = vec![Element::new("span").with_text("!").into()];
        let out = apply_patch(&tree, &[directive("div", Action::InsertInside, payload)], "p").unwrap();
        assert_eq!(to_markup(&out), "<div>Hello<span>!</span></div>");
    }

    #[test]
    fn test_multiple_matches_when_allowed() {
        let d = directive("div/*", Action::InsertAfter, vec![Node::text("|")]).with_multiple(true);
        let out = apply_patch(&base(), &[d], "p").unwrap();
        assert_eq!(
            to_markup(&out),
            r#"<div class="box"><a>1</a>|<b>2</b>|<c>3</c>|</div>"#
        );
    }

    #[test]
    fn test_multiple_nested_matches() {
        let tree: Vec<Node> = vec![Element::new("ul")
            .with_child(Element::new("li").with_child(Element::new("li")))
            .into()];
        let d = directive("//li", Action::SetAttributes, vec![Element::new("attribute")
            .with_attr("x", "1")
            .into()])
        .with_multiple(true);
        let out = apply_patch(&tree, &[d], "p").unwrap();
        assert_eq!(to_markup(&out), r#"<ul><li x="1"><li x="1"/></li></ul>"#);
    }

    #[test]
    fn test_directives_see_earlier_edits() {
        let out = apply_patch(
            &base(),
            &[
                directive("div/a", Action::Replace, vec![Element::new("x").into()]),
                directive("div/x", Action::InsertInside, vec![Node::text("new")]),
            ],
            "p",
        )
        .unwrap();
        assert_eq!(
            to_markup(&out),
            r#"<div class="box"><x>new</x><b>2</b><c>3</c></div>"#
        );
    }

    #[test]
    fn test_invalid_payloads() {
        let bad = |action, payload| {
            matches!(
                apply(action, "div/a", payload),
                Err(ResolutionError::InvalidAction { .. })
            )
        };
        assert!(bad(Action::Remove, vec![Node::text("x")]));
        assert!(bad(Action::InsertInside, vec![]));
        assert!(bad(Action::Replace, vec![Node::text("  ")]));
        assert!(bad(Action::SetAttributes, vec![Element::new("span").into()]));
        assert!(bad(Action::SetAttributes, vec![]));
        assert!(!bad(Action::Remove, vec![Node::text("\n  ")]));
    }

    #[test]
    fn test_expand_includes() {
        let mut tree: Vec<Node> = vec![Element::new("div")
            .with_child(Element::new("p"))
            .with_child(Element::new("include").with_attr("template", "part"))
            .into()];
        let untouched = node_at(&tree, &[0, 0]).cloned().unwrap();

        let mut calls = Vec::new();
        expand_includes(&mut tree, &mut |id: &str| {
            calls.push(id.to_string());
            Ok(vec![Element::new("i").into(), Element::new("j").into()])
        })
        .unwrap();

        assert_eq!(calls, vec!["part"]);
        assert_eq!(to_markup(&tree), "<div><p/><i/><j/></div>");
        assert!(node_at(&tree, &[0, 0]).unwrap().shares_with(&untouched));
        assert!(!contains_include(&tree));
    }

    #[test]
    fn test_expand_includes_propagates_error() {
        let mut tree: Vec<Node> = vec![Element::new("include").with_attr("template", "x").into()];
        let result = expand_includes(&mut tree, &mut |id: &str| {
            Err(ResolutionError::not_found(id))
        });
        assert_eq!(result, Err(ResolutionError::not_found("x")));
    }
}
