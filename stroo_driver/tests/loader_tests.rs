#![allow(missing_docs)]
#![allow(clippy::missing_docs_in_private_items)]

use std::collections::BTreeMap;
use std::fs;
use std::sync::{Arc, OnceLock};

use rstest::{fixture, rstest};
use stroo_common::symbols::{PackageRef, SymbolTable};
use stroo_driver::{
    Checked, Frontend, FrontendError, ImportError, Listing, LoadConfig, LoadError, Loader,
    Resolver, SourceFrontend, UnitId, UnitMeta,
};
use tempfile::tempdir;

fn init_test_logger() {
    static INIT: OnceLock<()> = OnceLock::new();
    let _ = INIT.get_or_init(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

fn patterns(items: &[&str]) -> Vec<String> {
    items.iter().map(ToString::to_string).collect()
}

fn tolerant<F: Frontend>(frontend: F) -> Loader<F> {
    Loader::new(frontend).with_config(LoadConfig::new().with_tolerate_errors(true))
}

#[fixture]
fn shop() -> SourceFrontend {
    SourceFrontend::in_memory()
        .with_file(
            "shop",
            "cart.go",
            "package shop\nimport \"shop/model\"\ntype Cart struct { Items []model.Item }\n",
        )
        .with_file(
            "shop/api",
            "api.go",
            "package api\nimport \"shop/model\"\ntype Reply struct { Item model.Item }\n",
        )
        .with_file(
            "shop/model",
            "item.go",
            "package model\nimport \"time\"\ntype Item struct { At time.Time }\n",
        )
}

#[rstest]
fn loads_units_and_shares_imports(shop: SourceFrontend) {
    init_test_logger();
    let loader = Loader::new(shop);
    let roots = loader
        .load(&patterns(&["shop", "shop/api"]))
        .expect("clean load");
    assert_eq!(roots.len(), 2);
    assert_eq!(roots[0].import_path(), "shop");
    assert_eq!(roots[1].name(), "api");

    let from_shop = &roots[0].imports()["shop/model"];
    let from_api = &roots[1].imports()["shop/model"];
    assert!(Arc::ptr_eq(from_shop, from_api));
    assert!(!roots[0].is_ill_typed());
    assert!(roots[0].symbols().lookup("Cart").is_some());

    let time = &from_shop.imports()["time"];
    assert!(time.symbols().is_opaque());
    assert!(time.files().is_empty());
}

#[rstest]
fn repeated_loads_reuse_the_registry(shop: SourceFrontend) {
    init_test_logger();
    let loader = Loader::new(shop);
    let first = loader.load(&patterns(&["shop"])).expect("clean load");
    let second = loader.clone().load(&patterns(&["shop"])).expect("clean load");
    assert!(Arc::ptr_eq(&first[0], &second[0]));
    assert_eq!(
        loader.get(&UnitId::new("shop/model")).map(|u| u.name().to_string()),
        Some("model".to_string())
    );
    let ids: Vec<String> = loader.units().iter().map(|u| u.id().to_string()).collect();
    assert_eq!(ids, ["shop", "shop/model", "time"]);
}

#[rstest]
fn visit_walks_imports_in_post_order(shop: SourceFrontend) {
    let loader = Loader::new(shop);
    let roots = loader.load(&patterns(&["shop"])).expect("clean load");
    let mut order = Vec::new();
    roots[0].visit(&mut |unit| order.push(unit.import_path().to_string()));
    assert_eq!(order, ["time", "shop/model", "shop"]);
}

#[test]
fn import_cycles_are_reported_on_the_importer() {
    init_test_logger();
    let frontend = SourceFrontend::in_memory()
        .with_file("a", "a.go", "package a\nimport \"b\"\n")
        .with_file("b", "b.go", "package b\nimport \"a\"\n");

    let err = Loader::new(frontend)
        .load(&patterns(&["a"]))
        .expect_err("cycle must fail");
    assert_eq!(
        err.to_string(),
        "error during loading: b/b.go:2:8: could not import a (import cycle: a -> b -> a)"
    );
}

#[test]
fn cycles_still_load_when_errors_are_tolerated() {
    let frontend = SourceFrontend::in_memory()
        .with_file("a", "a.go", "package a\nimport \"b\"\ntype A struct{}\n")
        .with_file("b", "b.go", "package b\nimport \"a\"\ntype B struct{}\n");

    let roots = tolerant(frontend)
        .load(&patterns(&["a"]))
        .expect("tolerated");
    let a = &roots[0];
    let b = &a.imports()["b"];
    assert!(a.errors().is_empty());
    assert_eq!(b.errors().len(), 1);
    assert!(b.imports().is_empty());
    assert!(a.is_ill_typed());
    assert!(b.is_ill_typed());
}

#[test]
fn ill_typed_propagates_to_importers() {
    let frontend = SourceFrontend::in_memory()
        .with_file("top", "top.go", "package top\nimport \"mid\"\ntype T mid.M\n")
        .with_file("mid", "mid.go", "package mid\nimport \"low\"\ntype M low.L\n")
        .with_file("low", "low.go", "package low\ntype L Missing\n");

    let roots = tolerant(frontend)
        .load(&patterns(&["top"]))
        .expect("tolerated");
    let top = &roots[0];
    let mid = &top.imports()["mid"];
    let low = &mid.imports()["low"];
    assert_eq!(low.errors()[0].msg, "undefined: Missing");
    assert!(top.errors().is_empty());
    assert!(mid.errors().is_empty());
    assert!(top.is_ill_typed() && mid.is_ill_typed() && low.is_ill_typed());
}

#[test]
fn missing_imports_are_errors_with_strict_imports() {
    let frontend = SourceFrontend::in_memory()
        .with_strict_imports(true)
        .with_file("app", "app.go", "package app\nimport \"gone\"\n");

    let err = Loader::new(frontend)
        .load(&patterns(&["app"]))
        .expect_err("missing import");
    let LoadError::Single(unit_error) = err else {
        panic!("expected a single error, got {err}");
    };
    assert_eq!(
        unit_error.msg,
        "could not import gone (missing package: \"gone\")"
    );
}

#[test]
fn several_errors_are_counted() {
    let frontend = SourceFrontend::in_memory()
        .with_file("app", "app.go", "package app\ntype A X\ntype B Y\n");
    let err = Loader::new(frontend)
        .load(&patterns(&["app"]))
        .expect_err("two errors");
    assert!(matches!(err, LoadError::Aggregate(2)));
    assert_eq!(err.to_string(), "2 errors during loading");
}

#[test]
fn syntax_errors_stay_on_their_unit() {
    let frontend = SourceFrontend::in_memory()
        .with_file("app", "ok.go", "package app\ntype A struct{}\n")
        .with_file("app", "bad.go", "package app\ntype B struct {\n");
    let roots = tolerant(frontend)
        .load(&patterns(&["app"]))
        .expect("tolerated");
    let app = &roots[0];
    assert_eq!(app.errors().len(), 1);
    assert_eq!(app.errors()[0].kind, stroo_common::ErrorKind::Parse);
    assert!(app.symbols().lookup("A").is_some());
}

#[rstest]
#[case::nothing(&["nowhere"])]
#[case::empty_subtree(&["nowhere/..."])]
fn unmatched_patterns_are_rejected(#[case] items: &[&str]) {
    let err = Loader::new(SourceFrontend::in_memory())
        .load(&patterns(items))
        .expect_err("no match");
    assert!(matches!(err, LoadError::NoMatch(_)));
    assert_eq!(err.to_string(), format!("{} matched no units", items.join(" ")));
}

#[test]
fn loads_a_directory_tree() {
    init_test_logger();
    let tmp = tempdir().expect("tempdir");
    let model = tmp.path().join("model");
    let app = tmp.path().join("app");
    fs::create_dir_all(&model).expect("mkdir");
    fs::create_dir_all(&app).expect("mkdir");
    fs::write(model.join("item.go"), "package model\ntype Item struct{ Name string }\n")
        .expect("write");
    fs::write(model.join("item_test.go"), "package model\nthis does not parse\n")
        .expect("write");
    fs::write(
        app.join("main.go"),
        "package main\nimport \"model\"\nvar items []model.Item\n",
    )
    .expect("write");

    let frontend = SourceFrontend::new(tmp.path()).expect("root");
    let roots = Loader::new(frontend)
        .load(&patterns(&["./..."]))
        .expect("clean load");
    let paths: Vec<&str> = roots.iter().map(|u| u.import_path()).collect();
    assert_eq!(paths, ["app", "model"]);
    assert_eq!(roots[1].files(), ["model/item.go"]);
    assert!(Arc::ptr_eq(&roots[0].imports()["model"], &roots[1]));
    assert_eq!(
        roots[0].symbols().lookup("items").and_then(|o| o.type_string()),
        Some("[]model.Item")
    );
}

/// Front-end whose dependency reports types it never produced.
struct Inconsistent;

impl Frontend for Inconsistent {
    fn list(&self, _patterns: &[String]) -> Result<Listing, FrontendError> {
        let meta = |path: &str, imports: &[&str]| UnitMeta {
            id: UnitId::new(path),
            name: path.to_string(),
            import_path: path.to_string(),
            files: vec![format!("{path}/{path}.go")],
            imports: imports
                .iter()
                .map(|i| ((*i).to_string(), UnitId::new(*i)))
                .collect::<BTreeMap<_, _>>(),
            external: false,
        };
        Ok(Listing {
            roots: vec![UnitId::new("top")],
            units: vec![meta("top", &["dep"]), meta("dep", &[])],
        })
    }

    fn typecheck(
        &self,
        meta: &UnitMeta,
        resolver: &Resolver<'_>,
    ) -> Result<Checked, FrontendError> {
        if meta.import_path == "dep" {
            // an incomplete table
            return Ok(Checked {
                syntax: Vec::new(),
                symbols: SymbolTable::new(PackageRef::new("dep", "dep")),
                errors: Vec::new(),
            });
        }
        let table = resolver("dep")?;
        Ok(Checked {
            syntax: Vec::new(),
            symbols: (*table).clone(),
            errors: Vec::new(),
        })
    }
}

#[test]
fn incomplete_dependencies_are_internal_faults() {
    let err = tolerant(Inconsistent)
        .load(&patterns(&["top"]))
        .expect_err("internal fault");
    let LoadError::Internal(msg) = err else {
        panic!("expected an internal fault, got {err}");
    };
    assert_eq!(
        msg,
        ImportError::Internal {
            path: "dep".into(),
            importer: "top".into()
        }
        .to_string()
    );
}
