#![allow(missing_docs)]
#![allow(clippy::missing_docs_in_private_items)]

use std::sync::{Arc, OnceLock};

use rstest::{fixture, rstest};
use stroo_common::GenConfig;
use stroo_driver::{Loader, SourceFrontend};
use stroo_gen::{GenError, Generator, Output, TemplateSet};
use stroo_model::{PackageModel, build};

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

type Cart struct {
	ID    string `json:"id,omitempty" yaml:"ident"`
	Items []*Item
	Owner *Customer
	At    time.Time
}

type Item struct {
	Name  string
	Maker *Customer
}

type Customer struct {
	Name string
	Best *Cart
}

type Node struct {
	Next *Node
}
"#;

const STRINGER: &str = r#"package {{ package.name }}
{{ declare("Stringer") }}
{%- for field in main.fields %}{% set done = generate_and_store(field.kind) %}{% endfor %}
func (v {{ main.name }}) String() string { return "{{ main.name }}" }
{% for code in list_stored() %}
{{ code }}
{% endfor %}
{#- define "Stringer" -#}
func (v {{ decl.name }}) String() string { return "{{ decl.name }}" }
{%- for field in decl.fields %}{% set done = generate_and_store(field.kind) %}{% endfor %}
{#- end -#}
"#;

#[fixture]
fn shop() -> Arc<PackageModel> {
    init_test_logger();
    let frontend = SourceFrontend::in_memory().with_file("shop", "shop.go", SHOP);
    let units = Loader::new(frontend)
        .load(&["shop".to_string()])
        .expect("shop loads");
    Arc::new(build(&units[0]).expect("model builds"))
}

fn dry_run(selected: &str) -> GenConfig {
    GenConfig::new()
        .with_selected_type(selected)
        .with_template_file("stringer.tmpl")
        .with_test_mode(true)
}

fn generator(model: Arc<PackageModel>, selected: &str, source: &str) -> Generator {
    let templates = TemplateSet::parse("main.tmpl", source).expect("template parses");
    Generator::new(model, dry_run(selected), &templates).expect("generator")
}

fn render(model: Arc<PackageModel>, selected: &str, source: &str) -> String {
    generator(model, selected, source).render().expect("renders")
}

#[rstest]
fn every_referenced_declaration_is_generated_once(shop: Arc<PackageModel>) {
    let out = render(shop, "Cart", STRINGER);
    assert!(out.starts_with("package shop"), "{out}");
    assert_eq!(out.matches("String() string").count(), 3, "{out}");
    for name in ["Cart", "Item", "Customer"] {
        assert_eq!(out.matches(&format!("func (v {name})")).count(), 1, "{out}");
    }
    // Customer is reached through Item, after Item's own sentinel
    let item = out.find("func (v Item)").expect("Item");
    let customer = out.find("func (v Customer)").expect("Customer");
    assert!(item < customer);
}

#[rstest]
fn self_references_do_not_render_again(shop: Arc<PackageModel>) {
    let out = render(shop, "Node", STRINGER);
    assert_eq!(out.matches("String() string").count(), 1, "{out}");
}

#[rstest]
fn failed_sections_become_comments(shop: Arc<PackageModel>) {
    let source = r#"{{ declare("Broken") }}
{%- for field in main.fields %}{% set done = generate_and_store(field.kind) %}{% endfor %}
{{ list_stored() | join("\n") }}
{#- define "Broken" -#}
{{ retrieve("never stored") }}
{#- end -#}
"#;
    let out = render(shop, "Cart", source);
    assert!(out.contains("/* error generating Item: "), "{out}");
    assert!(out.contains("/* error generating Customer: "), "{out}");
    assert!(out.contains("attempt to retrieve \"never stored\" - was not found"), "{out}");
}

#[rstest]
fn main_template_failures_report_partial_output(shop: Arc<PackageModel>) {
    let err = generator(shop, "Cart", "hello\n{{ retrieve(\"nope\") }}\n")
        .render()
        .expect_err("fails");
    match err {
        GenError::Render {
            template, partial, ..
        } => {
            assert_eq!(template, "main.tmpl");
            assert_eq!(partial, "hello\n".len());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[rstest]
fn recurse_generate_refuses_a_second_render(shop: Arc<PackageModel>) {
    let source = r#"{{ declare("S") }}{{ recurse_generate("shop", "Item") }}/{{ recurse_generate("other", "Customer") }}
{#- define "S" -#}
{{ decl.name }}
{#- end -#}
"#;
    assert!(render(Arc::clone(&shop), "Cart", source).starts_with("true/false"));

    let twice = r#"{{ declare("S") }}{{ recurse_generate("shop", "Item") }}{{ recurse_generate("shop", "Item") }}
{#- define "S" -#}
{{ decl.name }}
{#- end -#}
"#;
    let err = generator(shop, "Cart", twice).render().expect_err("fails");
    assert!(err.to_string().contains("`Item` already stored"), "{err}");
}

#[rstest]
fn declare_needs_a_name(shop: Arc<PackageModel>) {
    let err = generator(shop, "Cart", "{{ declare(\"\") }}")
        .render()
        .expect_err("fails");
    assert!(err.to_string().contains("cannot declare empty template name"), "{err}");
}

#[rstest]
fn store_and_imports(shop: Arc<PackageModel>) {
    let source = r#"{{ store("k", 1) }} {{ store("k", 2) }} {{ retrieve("k") }} {{ has_in_store("k") }} {{ has_in_store("x") }}
{{ add_to_imports("fmt") }}{{ add_to_imports("time") }}{{ imports() | join(",") }}"#;
    let out = render(shop, "Cart", source);
    assert_eq!(out, "false true 2 true false\ntime,fmt");
}

#[rstest]
fn field_helpers(shop: Arc<PackageModel>) {
    let source = r#"{% for f in sort_by_name(main.fields) %}{{ f.name }}:{{ real_kind(f) }}:{{ tag(f, "json") }}:{{ tags_by_key(f, "json") | join("|") }}
{% endfor %}"#;
    let out = render(shop, "Cart", source);
    assert_eq!(
        out,
        "At:Time::\nID:string:id,omitempty:omitempty\nItems:*Item::\nOwner:*Customer::\n"
    );
}

#[rstest]
#[case::contains_args(r#"{{ contains("b", "a", "b") }}"#, "true")]
#[case::contains_list(r#"{{ contains("z", ["a", "b"]) }}"#, "false")]
#[case::empty(r#"{{ empty("") }} {{ empty(main.fields) }}"#, "true false")]
#[case::text(
    r#"{{ lower_initial("Cart") }} {{ capitalize("cart") }} {{ concat("a", "b") }} [{{ trim("  x ") }}] {{ has_prefix("Cart", "Ca") }}"#,
    "cart Cart ab [x] true"
)]
#[case::quote(r#"{{ quote_multiline("a\nb\n") }}"#, "`a\nb`")]
#[case::config(
    r#"{{ config.selected_type }} {{ config.test_mode }} {{ package.path }}"#,
    "Cart true shop"
)]
fn text_helpers(shop: Arc<PackageModel>, #[case] source: &str, #[case] expected: &str) {
    assert_eq!(render(shop, "Cart", source), expected);
}

#[rstest]
fn dump_is_cycle_safe(shop: Arc<PackageModel>) {
    let out = render(shop, "Node", "{{ dump(main) }}");
    let value: serde_json::Value = serde_json::from_str(&out).expect("json");
    assert_eq!(value["name"], "Node");
    assert_eq!(value["fields"][0]["reference"]["ref"], "Node");
}

#[rstest]
fn unknown_selected_type(shop: Arc<PackageModel>) {
    let templates = TemplateSet::parse("t", "").expect("parses");
    let err = Generator::new(shop, dry_run("Ghost"), &templates).err().expect("unknown");
    assert_eq!(err.to_string(), "error looking for \"Ghost\" into types");
}

#[rstest]
fn dry_run_returns_the_text_with_banner(shop: Arc<PackageModel>) {
    let output = generator(shop, "Cart", STRINGER).generate().expect("generates");
    let Output::DryRun(text) = output else {
        panic!("expected a dry run");
    };
    assert!(text.starts_with("// Generated on "), "{text}");
    assert!(text.contains("by stroo\n// Do NOT bother with altering it by hand : use the tool\n"));
    assert!(text.contains("//\t-debug=false -output= -root= -target= -template=stringer.tmpl -testmode=true -type=Cart\npackage shop"));
}

#[rstest]
fn output_is_written_with_parent_directories(shop: Arc<PackageModel>) {
    let dir = tempfile::tempdir().expect("tempdir");
    let target = dir.path().join("gen").join("nested").join("cart_string.go");
    let template = dir.path().join("stringer.tmpl");
    std::fs::write(&template, STRINGER).expect("template written");

    let config = GenConfig::new()
        .with_selected_type("Cart")
        .with_template_file(&template)
        .with_output_file(&target);
    let output = Generator::from_config(shop, config)
        .expect("generator")
        .generate()
        .expect("generates");
    assert_eq!(output, Output::Written(target.clone()));

    let written = std::fs::read_to_string(&target).expect("written");
    assert!(written.starts_with("// Generated on "));
    assert!(written.contains("func (v Customer) String()"));
}

#[rstest]
fn output_file_is_required_outside_test_mode(shop: Arc<PackageModel>) {
    let templates = TemplateSet::parse("t", "x").expect("parses");
    let config = GenConfig::new().with_selected_type("Cart");
    let err = Generator::new(shop, config, &templates)
        .expect("generator")
        .generate()
        .expect_err("no output");
    assert!(matches!(err, GenError::NoOutput));
}

const ORDER: &str = r#"package order

type Items []Item

type Item struct{ Name string }

type Cart struct {
	List Items
	One  Item
}
"#;

#[fixture]
fn order() -> Arc<PackageModel> {
    init_test_logger();
    let frontend = SourceFrontend::in_memory().with_file("order", "order.go", ORDER);
    let units = Loader::new(frontend)
        .load(&["order".to_string()])
        .expect("order loads");
    Arc::new(build(&units[0]).expect("model builds"))
}

#[rstest]
fn element_kinds_select_the_struct_not_the_array_declared_first(order: Arc<PackageModel>) {
    let source = r#"{{ declare("S") }}
{%- for field in main.fields %}{% set done = generate_and_store(field.kind) %}{% endfor -%}
{{ list_stored() | join("") }}
{#- define "S" -#}
[{{ decl.name }} struct={{ decl.is_struct }}]
{#- end -#}
"#;
    let out = render(Arc::clone(&order), "Cart", source);
    assert_eq!(out, "[Items struct=false][Item struct=true]");

    let item = generator(order, "Item", "{{ main.name }} {{ main.is_struct }}");
    assert_eq!(item.render().expect("renders"), "Item true");
    let session = item.session().lock();
    assert_eq!(session.main().map(|decl| decl.name.as_str()), Some("Item"));
}
