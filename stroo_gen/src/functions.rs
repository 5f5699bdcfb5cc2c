//! The functions templates call.
//!
//! Session functions go through the run's [`SharedSession`]; the rest are
//! plain text and model helpers.

use minijinja::value::{Rest, ValueKind};
use minijinja::{Environment, Error, State, Value, context};
use stroo_model::{Expander, Field, Kinded, Tag, sort_by_name};

use crate::{GenError, Job, SharedSession};

/// Adds every template function to `env`.
pub fn register(env: &mut Environment<'static>, session: &SharedSession) {
    let shared = session.clone();
    env.add_function("declare", move |name: String| -> Result<String, Error> {
        shared.lock().declare(&name).map_err(GenError::into_engine)?;
        Ok(String::new())
    });
    let shared = session.clone();
    env.add_function("generate_and_store", move |state: &State, kind: String| {
        shared.generate_and_store(&kind, |job| render_section(state, job))
    });
    let shared = session.clone();
    env.add_function(
        "recurse_generate",
        move |state: &State, package: String, kind: String| -> Result<bool, Error> {
            shared
                .recurse_generate(&package, &kind, |job| render_section(state, job))
                .map_err(GenError::into_engine)
        },
    );
    let shared = session.clone();
    env.add_function("list_stored", move || shared.lock().list_stored());
    let shared = session.clone();
    env.add_function("store", move |key: String, value: Value| {
        shared.lock().store(&key, value)
    });
    let shared = session.clone();
    env.add_function("retrieve", move |key: String| -> Result<Value, Error> {
        shared.lock().retrieve(&key).map_err(GenError::into_engine)
    });
    let shared = session.clone();
    env.add_function("has_in_store", move |key: String| {
        shared.lock().has_in_store(&key)
    });
    let shared = session.clone();
    env.add_function("add_to_imports", move |path: String| {
        shared.lock().add_to_imports(&path);
        String::new()
    });
    let shared = session.clone();
    env.add_function("imports", move || shared.lock().imports().to_vec());
    let shared = session.clone();
    env.add_function("dump", move |value: Option<Value>| -> Result<String, Error> {
        let json = match value {
            Some(value) => serde_json::to_value(&value).map_err(GenError::from),
            None => {
                let model = shared.lock().model().clone();
                Expander::new(&model).expand_model().map_err(GenError::from)
            }
        };
        json.and_then(|json| serde_json::to_string_pretty(&json).map_err(GenError::from))
            .map_err(GenError::into_engine)
    });

    env.add_function("contains", contains);
    env.add_function("empty", empty);
    env.add_function("lower_initial", |text: String| lower_initial(&text));
    env.add_function("capitalize", |text: String| capitalize(&text));
    env.add_function("quote_multiline", |text: String| quote_multiline(&text));
    env.add_function("concat", |a: String, b: String| a + &b);
    env.add_function("trim", |text: String| text.trim().to_string());
    env.add_function("has_prefix", |text: String, prefix: String| {
        text.starts_with(&prefix)
    });
    env.add_function("sort_by_name", sort_values_by_name);
    env.add_function("real_kind", |field: Value| real_kind(&field));
    env.add_function("tag", |field: Value, key: String| -> Result<String, Error> {
        Ok(tag_of(&field, &key)?.map(|tag| tag.value()).unwrap_or_default())
    });
    env.add_function("tags_by_key", |field: Value, key: String| -> Result<Vec<String>, Error> {
        Ok(tag_of(&field, &key)?.map(|tag| tag.options).unwrap_or_default())
    });
}

/// Renders the job's section against its declaration, with the lock
/// released.
fn render_section(state: &State, job: &Job) -> Result<String, Error> {
    state
        .env()
        .get_template(&job.template)?
        .render(context! { decl => Value::from_serialize(&job.decl) })
}

/// `contains(x, a, b, c)` or `contains(x, [a, b, c])`.
fn contains(needle: Value, rest: Rest<Value>) -> Result<bool, Error> {
    match rest.as_slice() {
        [list] if list.kind() == ValueKind::Seq => Ok(list.try_iter()?.any(|item| item == needle)),
        items => Ok(items.iter().any(|item| *item == needle)),
    }
}

/// Undefined, none, and empty strings or collections.
fn empty(value: Value) -> bool {
    value.is_undefined() || value.is_none() || value.len() == Some(0)
}

/// Lower-cases the first letter.
pub fn lower_initial(text: &str) -> String {
    let mut chars = text.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_lowercase().chain(chars).collect()
    })
}

/// Upper-cases the first letter.
pub fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

/// Turns text into a string literal of the generated language.
///
/// Text without backquotes becomes one raw literal. Otherwise every line is
/// quoted on its own and the pieces are concatenated with `+`.
pub fn quote_multiline(text: &str) -> String {
    let text = text.strip_suffix('\n').unwrap_or(text);
    if !text.contains('`') {
        return format!("`{text}`");
    }
    text.split('\n')
        .map(|line| quote(&format!("{line}\n")))
        .collect::<Vec<_>>()
        .join(" + \n")
}

/// Double-quoted literal with escapes.
fn quote(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => out.push_str(&format!("\\x{:02x}", u32::from(c))),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn text_attr(value: &Value, attr: &str) -> String {
    value
        .get_attr(attr)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default()
}

/// Stable sort of fields, declarations or functions by name, kind as
/// fallback.
fn sort_values_by_name(list: Value) -> Result<Value, Error> {
    let mut keyed: Vec<(String, String, Value)> = list
        .try_iter()?
        .map(|item| (text_attr(&item, "name"), text_attr(&item, "kind"), item))
        .collect();
    sort_by_name(&mut keyed, |(name, kind, _)| (name.as_str(), kind.as_str()));
    Ok(Value::from(
        keyed.into_iter().map(|(_, _, item)| item).collect::<Vec<_>>(),
    ))
}

fn real_kind(field: &Value) -> String {
    let field = Field {
        kind: text_attr(field, "kind"),
        is_pointer: field.get_attr("is_pointer").is_ok_and(|v| v.is_true()),
        ..Field::default()
    };
    field.real_kind()
}

/// The tag of `field` with this key, rebuilt from its serialized form.
fn tag_of(field: &Value, key: &str) -> Result<Option<Tag>, Error> {
    let tags = field.get_attr("tags")?;
    if tags.is_undefined() || tags.is_none() {
        return Ok(None);
    }
    for tag in tags.try_iter()? {
        if text_attr(&tag, "key") != key {
            continue;
        }
        let options = tag
            .get_attr("options")?
            .try_iter()?
            .filter_map(|option| option.as_str().map(str::to_string))
            .collect();
        return Ok(Some(Tag {
            key: key.to_string(),
            name: text_attr(&tag, "name"),
            options,
        }));
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("Name", "name")]
    #[case("URL", "uRL")]
    #[case("Één", "één")]
    #[case("", "")]
    fn lower_initial_changes_only_the_first_letter(#[case] text: &str, #[case] expected: &str) {
        assert_eq!(lower_initial(text), expected);
    }

    #[rstest]
    #[case("name", "Name")]
    #[case("élan", "Élan")]
    #[case("", "")]
    fn capitalize_changes_only_the_first_letter(#[case] text: &str, #[case] expected: &str) {
        assert_eq!(capitalize(text), expected);
    }

    #[test]
    fn quote_multiline_prefers_raw_literals() {
        assert_eq!(quote_multiline("a\nb\n"), "`a\nb`");
        assert_eq!(
            quote_multiline("say `hi`\n\t\"ok\""),
            "\"say `hi`\\n\" + \n\"\\t\\\"ok\\\"\\n\""
        );
    }

    #[test]
    fn contains_accepts_arguments_or_a_list() {
        let needle = Value::from("b");
        let rest = |items: Vec<Value>| Rest(items);
        assert!(contains(needle.clone(), rest(vec!["a".into(), "b".into()])).expect("compares"));
        assert!(
            contains(needle.clone(), rest(vec![Value::from(vec!["a", "b"])])).expect("compares")
        );
        assert!(!contains(needle, rest(vec![Value::from("abc")])).expect("compares"));
    }

    #[test]
    fn empty_values() {
        assert!(empty(Value::UNDEFINED));
        assert!(empty(Value::from(())));
        assert!(empty(Value::from("")));
        assert!(empty(Value::from(Vec::<Value>::new())));
        assert!(!empty(Value::from("x")));
        assert!(!empty(Value::from(0)));
    }

    fn field_value() -> Value {
        let mut field = Field {
            name: "ID".into(),
            kind: "Key".into(),
            is_pointer: true,
            ..Field::default()
        };
        field.tags = stroo_model::Tags::parse("`json:\"id,omitempty\" yaml:\"ident\"`")
            .expect("valid tags");
        Value::from_serialize(&field)
    }

    #[test]
    fn field_helpers_read_serialized_fields() {
        let field = field_value();
        assert_eq!(real_kind(&field), "*Key");
        let json = tag_of(&field, "json").expect("readable").expect("present");
        assert_eq!(json.value(), "id,omitempty");
        assert_eq!(json.options, ["omitempty"]);
        assert_eq!(tag_of(&field, "yaml").expect("readable").map(|t| t.name), Some("ident".into()));
        assert!(tag_of(&field, "xml").expect("readable").is_none());
    }

    #[test]
    fn sorting_serialized_lists() {
        let items = Value::from_serialize(&[
            Field {
                name: "Zeta".into(),
                kind: "int".into(),
                ..Field::default()
            },
            Field {
                name: "Alpha".into(),
                kind: "string".into(),
                ..Field::default()
            },
        ]);
        let sorted = sort_values_by_name(items).expect("sortable");
        let names: Vec<String> = sorted
            .try_iter()
            .expect("a list")
            .map(|item| text_attr(&item, "name"))
            .collect();
        assert_eq!(names, ["Alpha", "Zeta"]);
    }

    mod property_tests {
        use super::super::*;
        use quickcheck::quickcheck;

        quickcheck! {
            fn prop_lower_initial_keeps_the_tail(text: String) -> bool {
                let lowered = lower_initial(&text);
                let tail: String = text.chars().skip(1).collect();
                lowered.ends_with(&tail)
            }

            fn prop_raw_literals_have_no_escapes(text: String) -> bool {
                let quoted = quote_multiline(&text);
                text.contains('`') || quoted == format!("`{}`", text.strip_suffix('\n').unwrap_or(&text))
            }
        }
    }
}
