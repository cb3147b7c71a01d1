//! Integration tests for loading, extending and compiling templates

use std::sync::Arc;

use insta::assert_snapshot;
use pretty_assertions::assert_eq;

use template_graft::template::{Action, ExtendMode, PatchDirective};
use template_graft::{
    parse_path, render, Element, EngineConfig, LoadError, Node, RegistryError, ResolutionError,
    Template, TemplateEngine,
};

fn engine(source: &str) -> TemplateEngine {
    let engine = TemplateEngine::new();
    engine
        .register_template_source(source)
        .expect("Should load");
    engine
}

fn first_child(tree: &[Node]) -> Node {
    tree[0].as_element().unwrap().children[0].clone()
}

fn markup(engine: &TemplateEngine, id: &str) -> String {
    engine.compile(id).expect("Should compile").to_markup()
}

#[test]
fn test_root_template_compiles_to_its_content() {
    let engine = engine(
        r#"<template id="card">
            <div class="card">
                <h2>Title</h2>
                <p>Body &amp; more</p>
            </div>
        </template>"#,
    );
    assert_snapshot!(markup(&engine, "card"), @r#"<div class="card"><h2>Title</h2><p>Body &amp; more</p></div>"#);
}

#[test]
fn test_extend_cycle_names_both_ids() {
    let engine = engine(
        r#"<templates>
            <template id="a" extend="b"><patch path="div" action="remove"/></template>
            <template id="b" extend="a"><patch path="div" action="remove"/></template>
        </templates>"#,
    );
    let err = engine.compile("a").unwrap_err();
    let ResolutionError::Cycle { chain } = &err else {
        panic!("expected cycle, got {:?}", err);
    };
    assert!(chain.contains(&"a".to_string()));
    assert!(chain.contains(&"b".to_string()));
    assert_snapshot!(err.to_string(), @"circular template extension: a -> b -> a");
}

#[test]
fn test_missing_extend_target() {
    let engine = engine(
        r#"<template id="child" extend="ghost"><patch path="div" action="remove"/></template>"#,
    );
    assert_eq!(
        engine.compile("child").unwrap_err(),
        ResolutionError::missing_target("child", "ghost")
    );
}

#[test]
fn test_duplicate_id_leaves_registry_unchanged() {
    let engine = engine(r#"<template id="a"><p>first</p></template>"#);
    let before = engine.registry().snapshot();

    let err = engine
        .register_template_source(
            r#"<templates><template id="b"><p/></template><template id="a"><p>second</p></template></templates>"#,
        )
        .unwrap_err();
    assert!(matches!(
        err,
        LoadError::Registry(RegistryError::DuplicateId { ref id }) if id == "a"
    ));

    let after = engine.registry().snapshot();
    assert!(Arc::ptr_eq(&before, &after));
    assert_eq!(engine.list_ids(), vec!["a"]);
    assert_eq!(markup(&engine, "a"), "<p>first</p>");
}

#[test]
fn test_replace_preserves_sibling_order() {
    let engine = engine(
        r#"<templates>
            <template id="list"><ol><li>1</li><li id="two">2</li><li>3</li></ol></template>
            <template id="list2" extend="list">
                <patch path="ol/li[@id='two']" action="replace"><li>two</li></patch>
            </template>
        </templates>"#,
    );
    assert_snapshot!(markup(&engine, "list2"), @"<ol><li>1</li><li>two</li><li>3</li></ol>");
}

#[test]
fn test_set_attributes_merges_non_destructively() {
    let engine = engine(
        r#"<templates>
            <template id="btn"><button type="submit" class="btn">Go</button></template>
            <template id="danger" extend="btn">
                <patch path="button" action="setAttributes">
                    <attribute class="btn danger" hx-confirm="Really?"/>
                </patch>
            </template>
        </templates>"#,
    );
    assert_snapshot!(markup(&engine, "danger"), @r#"<button type="submit" class="btn danger" hx-confirm="Really?">Go</button>"#);
}

#[test]
fn test_insert_inside_copy_leaves_base_intact() {
    let engine = engine(
        r#"<templates>
            <template id="page"><div><header/><main/></div></template>
            <template id="home" extend="page" mode="copy">
                <patch path="div/main" action="insertInside"><h1>Home</h1></patch>
            </template>
        </templates>"#,
    );
    let base = engine.compile("page").unwrap();
    let home = engine.compile("home").unwrap();

    assert_snapshot!(home.to_markup(), @"<div><header/><main><h1>Home</h1></main></div>");
    assert_snapshot!(base.to_markup(), @"<div><header/><main/></div>");

    // The untouched <header/> branch is shared between both trees
    assert!(first_child(&home.tree).shares_with(&first_child(&base.tree)));
}

#[test]
fn test_match_count_errors() {
    let engine = engine(
        r#"<templates>
            <template id="form"><form><input name="a"/><input name="b"/></form></template>
            <template id="none" extend="form">
                <patch path="form/select" action="remove"/>
            </template>
            <template id="many" extend="form">
                <patch path="form/input" action="remove"/>
            </template>
            <template id="all" extend="form">
                <patch path="form/input" action="remove" mult="true"/>
            </template>
        </templates>"#,
    );
    assert_eq!(
        engine.compile("none").unwrap_err(),
        ResolutionError::TargetNotFound {
            template: "none".into(),
            path: "form/select".into(),
        }
    );
    assert_eq!(
        engine.compile("many").unwrap_err(),
        ResolutionError::AmbiguousTarget {
            template: "many".into(),
            path: "form/input".into(),
            count: 2,
        }
    );
    assert_eq!(markup(&engine, "all"), "<form/>");
}

#[test]
fn test_in_place_layers_across_sources() {
    let engine = engine(r#"<template id="nav"><nav><a href="/">Home</a></nav></template>"#);
    engine
        .register_named_source(
            "blog.xml",
            r#"<template extend="nav">
                <patch path="nav" action="insertInside"><a href="/blog">Blog</a></patch>
            </template>"#,
        )
        .unwrap();
    engine
        .register_named_source(
            "shop.xml",
            r#"<template extend="nav" priority="-1">
                <patch path="nav/a" action="insertAfter"><a href="/shop">Shop</a></patch>
            </template>"#,
        )
        .unwrap();

    let compiled = engine.compile("nav").unwrap();
    assert_snapshot!(compiled.to_markup(), @r#"<nav><a href="/">Home</a><a href="/shop">Shop</a><a href="/blog">Blog</a></nav>"#);

    let sources: Vec<_> = compiled
        .contributors
        .iter()
        .map(|c| (c.origin.source.to_string(), c.mode))
        .collect();
    assert_eq!(
        sources,
        vec![
            ("<memory>".to_string(), None),
            ("shop.xml".to_string(), Some(ExtendMode::InPlace)),
            ("blog.xml".to_string(), Some(ExtendMode::InPlace)),
        ]
    );
}

#[test]
fn test_layer_errors_surface_on_target() {
    let engine = engine(
        r#"<templates>
            <template id="t"><p/></template>
            <template extend="t"><patch path="q" action="remove"/></template>
            <template id="copy" extend="t"><patch path="p" action="remove"/></template>
        </templates>"#,
    );
    let expected = ResolutionError::TargetNotFound {
        template: "t".into(),
        path: "q".into(),
    };
    assert_eq!(engine.compile("t").unwrap_err(), expected);
    assert_eq!(engine.compile("copy").unwrap_err(), expected);
}

#[test]
fn test_chained_copies_and_includes() {
    let engine = engine(
        r#"<templates>
            <template id="field"><label>Name<input/></label></template>
            <template id="form"><form><include template="field"/></form></template>
            <template id="signup" extend="form">
                <patch path="form" action="insertInside"><button>Sign up</button></patch>
            </template>
            <template id="signup-wide" extend="signup">
                <patch path="form" action="setAttributes"><attribute class="wide"/></patch>
            </template>
        </templates>"#,
    );
    assert_snapshot!(markup(&engine, "signup-wide"), @r#"<form class="wide"><label>Name<input/></label><button>Sign up</button></form>"#);
    let ids: Vec<_> = engine
        .compile("signup-wide")
        .unwrap()
        .contributors
        .iter()
        .map(|c| c.id.clone())
        .collect();
    assert_eq!(ids, vec!["form", "signup", "signup-wide"]);
}

#[test]
fn test_templates_built_in_code() {
    let engine = TemplateEngine::new();
    engine
        .register(Template::root(
            "box",
            vec![Element::new("div").with_child(Element::new("span")).into()],
        ))
        .unwrap();
    engine
        .register(Template::copy_of(
            "boxes",
            "box",
            vec![PatchDirective::new(
                parse_path("div/span").unwrap(),
                Action::InsertBefore,
                vec![Element::new("b").into()],
            )],
        ))
        .unwrap();
    assert_eq!(markup(&engine, "boxes"), "<div><b/><span/></div>");
}

#[test]
fn test_parse_error_diagnostic() {
    let source = r#"<template id="t" extend="base"><patch path="div[" action="remove"/></template>"#;
    let err = TemplateEngine::new()
        .register_named_source("bad.xml", source)
        .unwrap_err();
    assert!(matches!(err, LoadError::Parse(_)));
    let report = err.format(source, "bad.xml");
    assert!(report.contains("bad.xml"));
    assert!(report.contains("div["));
}

#[test]
fn test_config_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("graft.toml");
    std::fs::write(
        &path,
        r#"
        minify_text = false
        context_prefix = "ui"
        "#,
    )
    .unwrap();

    let config = EngineConfig::from_file(&path).unwrap();
    assert!(!config.minify_text);
    assert_eq!(config.context_prefix, "ui");

    let engine = TemplateEngine::with_config(config);
    engine
        .register_template_source(r#"<template id="t"><p> Hi </p></template>"#)
        .unwrap();
    assert_eq!(markup(&engine, "t"), "<p> Hi </p>");
    assert_eq!(engine.export_catalog().unwrap()[0].context, "ui:t");
}

#[test]
fn test_render_one_shot() {
    let html = render(
        r#"<templates>
            <template id="a"><p>x</p></template>
            <template extend="a"><patch path="p" action="insertInside"><b>y</b></patch></template>
        </templates>"#,
        "a",
    )
    .unwrap();
    assert_eq!(html, "<p>x<b>y</b></p>");
}

#[test]
fn test_html_void_elements_and_entities() {
    let engine = engine(
        r#"<templates>
            <template id="f"><form><label>Name</label><input name="a"><br></form></template>
            <template id="p"><p>a&nbsp;b</p></template>
        </templates>"#,
    );
    assert_snapshot!(markup(&engine, "f"), @r#"<form><label>Name</label><input name="a"/><br/></form>"#);
    assert_eq!(markup(&engine, "p"), "<p>a\u{a0}b</p>");
}
