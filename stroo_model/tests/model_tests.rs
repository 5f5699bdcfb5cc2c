#![allow(missing_docs)]
#![allow(clippy::missing_docs_in_private_items)]

use std::sync::{Arc, OnceLock};

use rstest::{fixture, rstest};
use serde_json::json;
use stroo_analysis::{AnalyzerRegistry, Scheduler};
use stroo_driver::{CompilationUnit, LoadConfig, Loader, SourceFrontend};
use stroo_model::{
    Expander, Field, Import, Kinded, MODEL_ANALYZER, ModelError, PackageModel, build,
    model_analyzer,
};

fn init_test_logger() {
    static INIT: OnceLock<()> = OnceLock::new();
    let _ = INIT.get_or_init(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

const SHOP: &str = r#"package shop

import "time"

func (i Item) Price() int { return 0 }

// Cart holds what a customer buys.
type Cart struct {
	ID    string `json:"id,omitempty" yaml:"id"`
	Items []*Item
	Owner *Customer
	Meta  map[string]string
	Done  chan bool
	OnPay func(amount int) error
	At    time.Time
	Lines Lines
	error
	*Base
	A, B int // pair
}

type Item struct {
	Name string
}

type Lines []Item

type Customer struct{ Name string }

type Base struct{}

type Node struct {
	Next *Node
}

type Handler func(w int) error

type Alias = Customer

type Reader interface {
	Read(p []byte) (int, error)
}

func (c *Cart) Total() int { return 0 }

func (l Lines) Len() int { return len(l) }

func helper() {}

const Max = 10

var started time.Time
"#;

fn load_one(import_path: &str, src: &str) -> Arc<CompilationUnit> {
    init_test_logger();
    let frontend = SourceFrontend::in_memory().with_file(import_path, "src.go", src);
    let mut roots = Loader::new(frontend)
        .with_config(LoadConfig::new().with_tolerate_errors(true))
        .load(&[import_path.to_string()])
        .expect("unit loads");
    roots.remove(0)
}

#[fixture]
fn shop() -> PackageModel {
    build(&load_one("shop", SHOP)).expect("model builds")
}

fn field<'m>(model: &'m PackageModel, decl: &str, name: &str) -> &'m Field {
    model
        .declaration(decl)
        .and_then(|d| d.field(name))
        .unwrap_or_else(|| panic!("{decl}.{name} exists"))
}

#[rstest]
fn package_metadata(shop: PackageModel) {
    assert_eq!(shop.name, "shop");
    assert_eq!(shop.path, "shop");
    assert_eq!(
        shop.imports,
        [Import {
            name: "time".into(),
            path: "time".into()
        }]
    );
    let names: Vec<&str> = shop.declarations.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(
        names,
        ["Cart", "Item", "Lines", "Customer", "Base", "Node", "Handler", "Alias", "Reader"]
    );
    assert!(shop.problems.is_empty(), "{:?}", shop.problems);
}

#[rstest]
fn struct_fields_are_classified(shop: PackageModel) {
    let cart = shop.declaration("Cart").expect("Cart");
    assert!(cart.is_struct);
    assert_eq!(cart.comment.as_deref(), Some("Cart holds what a customer buys."));
    assert_eq!(cart.fields.len(), 12);

    let id = field(&shop, "Cart", "ID");
    assert!(id.is_basic && id.is_string() && id.is_exported);
    assert_eq!(id.tags.get("json").map(|t| t.value()), Ok("id,omitempty".to_string()));
    assert_eq!(id.tags_by_key("json"), ["omitempty"]);
    assert!(id.tags_by_key("yaml").is_empty());

    let owner = field(&shop, "Cart", "Owner");
    assert!(owner.is_pointer && owner.is_struct);
    assert_eq!(owner.real_kind(), "*Customer");
    assert_eq!(owner.reference.as_deref(), Some("Customer"));

    let meta = field(&shop, "Cart", "Meta");
    assert!(meta.is_map);
    assert_eq!(meta.kind, "map[string]string");
    assert!(field(&shop, "Cart", "Done").is_chan);
    let on_pay = field(&shop, "Cart", "OnPay");
    assert!(on_pay.is_func);
    assert_eq!(on_pay.kind, "func(amount int) error");

    let at = field(&shop, "Cart", "At");
    assert!(at.is_imported);
    assert_eq!(at.package_and_kind(), "time.Time");
    assert_eq!(at.reference, None);

    let pair: Vec<(&str, Option<&str>)> = ["A", "B"]
        .iter()
        .map(|n| {
            let f = field(&shop, "Cart", n);
            assert!(f.is_basic && f.is_int());
            (f.name.as_str(), f.comment.as_deref())
        })
        .collect();
    assert_eq!(pair, [("A", Some("pair")), ("B", Some("pair"))]);
}

#[rstest]
fn slices_of_pointers_reference_their_element(shop: PackageModel) {
    let items = field(&shop, "Cart", "Items");
    assert!(items.is_array && items.is_pointer);
    assert_eq!(items.kind, "Item");
    let item = shop.resolve(items.reference.as_deref()).expect("Item resolves");
    assert_eq!(item.fields.len(), 1);
    let name = &item.fields[0];
    assert_eq!(name.name, "Name");
    assert_eq!(name.kind, "string");
    assert!(name.is_basic && name.is_exported);
}

#[rstest]
fn named_arrays_are_referenced_through_to_their_element(shop: PackageModel) {
    let lines = shop.declaration("Lines").expect("Lines");
    assert!(lines.is_array && !lines.is_pointer);
    assert_eq!(lines.kind, "Item");
    assert_eq!(lines.reference.as_deref(), Some("Item"));

    let field = field(&shop, "Cart", "Lines");
    assert!(field.is_array);
    assert_eq!(field.reference.as_deref(), Some("Item"));
}

#[rstest]
fn embedded_fields(shop: PackageModel) {
    let error = field(&shop, "Cart", "error");
    assert!(error.is_embedded && error.is_interface && error.is_exported);
    assert_eq!(error.reference, None);

    let base = field(&shop, "Cart", "Base");
    assert!(base.is_embedded && base.is_pointer && base.is_struct);
    assert_eq!(base.reference.as_deref(), Some("Base"));
}

#[rstest]
fn methods_attach_to_receivers_declared_later(shop: PackageModel) {
    let methods = |name: &str| -> Vec<String> {
        shop.declaration(name)
            .map(|d| d.methods.iter().map(|m| m.name.clone()).collect())
            .unwrap_or_default()
    };
    assert_eq!(methods("Item"), ["Price"]);
    assert_eq!(methods("Cart"), ["Total"]);
    assert_eq!(methods("Lines"), ["Len"]);

    let total = &shop.declaration("Cart").expect("Cart").methods[0];
    assert_eq!(total.receiver_name, "c");
    assert_eq!(total.receiver_type, "Cart");
    assert!(total.is_method_receiver);
    assert_eq!(total.signature, "func() int");

    let free: Vec<&str> = shop.functions.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(free, ["helper"]);
}

#[rstest]
fn other_declarations(shop: PackageModel) {
    let handler = shop.declaration("Handler").expect("Handler");
    assert!(handler.is_func);
    assert_eq!(handler.kind, "func(w int) error");

    let alias = shop.declaration("Alias").expect("Alias");
    assert!(alias.is_alias);
    assert_eq!(alias.kind, "Customer");
    assert_eq!(alias.reference.as_deref(), Some("Customer"));

    let reader = shop.declaration("Reader").expect("Reader");
    assert!(reader.is_interface);
    assert_eq!(shop.interface("Reader").map(|i| i.methods.clone()), Some(vec!["Read".into()]));

    let vars: Vec<(&str, &str, bool)> = shop
        .variables
        .iter()
        .map(|v| (v.name.as_str(), v.ty.as_str(), v.is_const))
        .collect();
    assert_eq!(vars, [("Max", "untyped int", true), ("started", "time.Time", false)]);
}

#[rstest]
fn extract_finds_by_name_then_kind(shop: PackageModel) {
    assert_eq!(shop.extract("Item").map(|d| d.name.as_str()), Some("Item"));
    assert_eq!(shop.extract("Lines").map(|d| d.name.as_str()), Some("Lines"));
    assert_eq!(shop.extract("Customer").map(|d| d.name.as_str()), Some("Customer"));
    assert!(shop.extract("Nothing").is_none());
    assert!(shop.declaration("Cart").is_some_and(|d| d.has_field_kind("Item")));
}

const ORDER: &str = r#"package order

type Items []Item

type Buyer = Person

type Item struct{ Name string }

type Person struct{ Name string }

type Cart struct {
	List Items
	One  Item
}
"#;

#[test]
fn extract_prefers_the_declaration_named_over_those_referring_to_it() {
    let order = build(&load_one("order", ORDER)).expect("model builds");
    let items = order.declaration("Items").expect("Items");
    assert_eq!(items.kind, "Item");

    let item = order.extract("Item").expect("Item");
    assert_eq!(item.name, "Item");
    assert!(item.is_struct && !item.is_array);

    let person = order.extract("Person").expect("Person");
    assert_eq!(person.name, "Person");
    assert!(!person.is_alias);

    assert_eq!(order.extract("Items").map(|d| d.name.as_str()), Some("Items"));
    assert_eq!(order.extract("Buyer").map(|d| d.name.as_str()), Some("Buyer"));
}

#[rstest]
fn self_references_serialize_once(shop: PackageModel) {
    let node = shop.declaration("Node").expect("Node");
    let value = Expander::new(&shop).expand(node).expect("expands");
    assert_eq!(value["fields"][0]["name"], "Next");
    assert_eq!(value["fields"][0]["reference"], json!({ "ref": "Node" }));

    let cart = Expander::new(&shop)
        .expand(shop.declaration("Cart").expect("Cart"))
        .expect("expands");
    assert_eq!(cart["fields"][1]["reference"]["fields"][0]["name"], "Name");
}

#[rstest]
fn sorting_orders_everything_by_name(shop: PackageModel) {
    let mut sorted = shop;
    sorted.sort();
    let names: Vec<&str> = sorted.declarations.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(
        names,
        ["Alias", "Base", "Cart", "Customer", "Handler", "Item", "Lines", "Node", "Reader"]
    );
    let cart = sorted.declaration("Cart").expect("Cart");
    assert_eq!(cart.fields[0].name, "A");
}

#[rstest]
#[case::nested_slices("type Grid [][]int", "ArrayType found on \"Grid\" (not implemented)")]
#[case::slice_of_maps("type M []map[string]int", "MapType found on \"M\" (not implemented)")]
#[case::pointer_to_map("type P []*map[string]int", "PointerType found on \"P\" (not implemented)")]
#[case::slice_of_structs("type S []struct{}", "StructType found on \"S\" (not implemented)")]
#[case::slice_of_chans("type C []chan int", "ChanType found on \"C\" (not implemented)")]
#[case::anonymous_struct_field(
    "type S struct { Inner struct{ X int } }",
    "StructType found on \"S\" (not implemented)"
)]
#[case::basic_named_field(
    "type Status int\ntype S struct { St Status }",
    "Basic found on \"S\" (not implemented)"
)]
fn unsupported_shapes(#[case] decls: &str, #[case] expected: &str) {
    let unit = load_one("p", &format!("package p\n{decls}\n"));
    let err = build(&unit).expect_err("unsupported");
    assert!(matches!(err, ModelError::NotImplemented { .. }));
    assert_eq!(err.to_string(), expected);
}

#[test]
fn malformed_tags_name_the_field() {
    let unit = load_one("p", "package p\ntype S struct {\n\tX int `json:x`\n}\n");
    let err = build(&unit).expect_err("bad tag");
    assert_eq!(
        err.to_string(),
        "error parsing tags : bad syntax for struct tag value of field named \"X\" input = `json:x`"
    );
}

#[test]
fn unresolved_references_are_reported_not_fatal() {
    let unit = load_one("p", "package p\ntype S struct {\n\tM *Missing\n\tOk string\n}\n");
    assert!(unit.is_ill_typed());
    let model = build(&unit).expect("model builds anyway");
    assert_eq!(model.problems, ["S.M: unresolved reference to Missing"]);
    assert_eq!(model.declaration("S").map(|d| d.fields.len()), Some(2));
}

#[test]
fn model_analyzer_runs_despite_errors() {
    let unit = load_one("p", "package p\ntype S struct{ M Missing }\n");
    let mut registry = AnalyzerRegistry::new();
    registry.register(model_analyzer()).expect("unique");
    let scheduler = Scheduler::new(registry).expect("valid");
    let actions = scheduler.analyze(&[unit], &[MODEL_ANALYZER]).expect("planned");
    let (results, code) = actions.gather_results();
    assert_eq!(code, 0);
    let model = results[0].clone().downcast::<PackageModel>().expect("a model");
    assert_eq!(model.name, "p");
    assert_eq!(model.problems.len(), 1);
}

#[test]
fn model_analyzer_reports_unsupported_shapes() {
    let unit = load_one("p", "package p\ntype Grid [][]int\n");
    let mut registry = AnalyzerRegistry::new();
    registry.register(model_analyzer()).expect("unique");
    let actions = Scheduler::new(registry)
        .expect("valid")
        .analyze(&[unit], &[MODEL_ANALYZER])
        .expect("planned");
    let outcome = actions.roots()[0].exec();
    assert_eq!(
        outcome.as_ref().err().map(ToString::to_string).as_deref(),
        Some("ArrayType found on \"Grid\" (not implemented)")
    );
}
