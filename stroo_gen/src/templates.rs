use std::path::Path;

use indexmap::IndexMap;
use minijinja::Environment;
use tracing::debug;

use crate::GenError;

/// One template file split into its main body and its named sections.
///
/// A section is delimited by engine comment lines, so the file stays a
/// valid template as a whole:
///
/// ```text
/// {#- define "Stringer" -#}
/// func (v {{ decl.name }}) String() string { ... }
/// {#- end -#}
/// ```
///
/// Sections are what a template `declare`s and renders per declaration
/// kind; everything outside them is the main body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateSet {
    name: String,
    main: String,
    sections: IndexMap<String, String>,
}

enum Directive<'a> {
    Define(&'a str),
    End,
}

impl TemplateSet {
    /// # Errors
    ///
    /// Fails on nested, unterminated, unnamed or duplicate sections and on a
    /// stray `end`.
    pub fn parse(name: &str, source: &str) -> Result<Self, GenError> {
        let mut main = String::new();
        let mut sections = IndexMap::new();
        let mut open: Option<(String, usize, String)> = None;

        for (index, line) in source.split_inclusive('\n').enumerate() {
            let number = index + 1;
            match directive(line).transpose().map_err(|msg| GenError::syntax(name, number, msg))? {
                Some(Directive::Define(section)) => {
                    if let Some((outer, _, _)) = &open {
                        return Err(GenError::syntax(
                            name,
                            number,
                            format!("define {section:?} inside {outer:?}"),
                        ));
                    }
                    if section == name || sections.contains_key(section) {
                        return Err(GenError::syntax(
                            name,
                            number,
                            format!("duplicate template {section:?}"),
                        ));
                    }
                    open = Some((section.to_string(), number, String::new()));
                }
                Some(Directive::End) => {
                    let Some((section, _, body)) = open.take() else {
                        return Err(GenError::syntax(name, number, "end without define"));
                    };
                    sections.insert(section, body);
                }
                None => match &mut open {
                    Some((_, _, body)) => body.push_str(line),
                    None => main.push_str(line),
                },
            }
        }

        if let Some((section, line, _)) = open {
            return Err(GenError::syntax(
                name,
                line,
                format!("{section:?} is never ended"),
            ));
        }
        debug!("Template {} has {} sections", name, sections.len());
        Ok(Self {
            name: name.to_string(),
            main,
            sections,
        })
    }

    /// Reads and parses a template file, named after the file.
    ///
    /// # Errors
    ///
    /// See [`parse`](Self::parse); also fails when the file cannot be read.
    pub fn from_file(path: &Path) -> Result<Self, GenError> {
        let source = std::fs::read_to_string(path).map_err(|err| GenError::io(path, err))?;
        let name = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |name| name.to_string_lossy().into_owned());
        Self::parse(&name, &source)
    }

    /// Name of the main template.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The main body.
    pub fn main(&self) -> &str {
        &self.main
    }

    /// The body of section `name`.
    pub fn section(&self, name: &str) -> Option<&str> {
        self.sections.get(name).map(String::as_str)
    }

    /// Section names in file order.
    pub fn section_names(&self) -> impl Iterator<Item = &str> {
        self.sections.keys().map(String::as_str)
    }

    /// Adds the main body and every section to `env`.
    ///
    /// # Errors
    ///
    /// Fails on the engine's own syntax errors.
    pub fn install(&self, env: &mut Environment<'static>) -> Result<(), GenError> {
        env.add_template_owned(self.name.clone(), self.main.clone())?;
        for (name, body) in &self.sections {
            env.add_template_owned(name.clone(), body.clone())?;
        }
        Ok(())
    }
}

/// Recognizes `{#- define "Name" -#}` and `{#- end -#}` lines.
fn directive(line: &str) -> Option<Result<Directive<'_>, String>> {
    let inner = line
        .trim()
        .strip_prefix("{#")?
        .strip_suffix("#}")?
        .trim_matches('-')
        .trim();
    if inner == "end" {
        return Some(Ok(Directive::End));
    }
    let rest = inner.strip_prefix("define")?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let name = rest
        .trim()
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .filter(|name| !name.is_empty() && !name.contains('"'));
    Some(name.map(Directive::Define).ok_or_else(|| format!("malformed define: {}", line.trim())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const SOURCE: &str = "\
package {{ package.name }}
{#- define \"Stringer\" -#}
func (v {{ decl.name }}) String() string {
{#- end -#}
{# a plain comment #}
{{ list_stored() | join(\"\\n\") }}
{#- define \"Empty\" -#}
{#- end -#}
";

    #[test]
    fn sections_are_split_from_the_main_body() {
        let set = TemplateSet::parse("stringer.tmpl", SOURCE).expect("parses");
        assert_eq!(set.name(), "stringer.tmpl");
        assert_eq!(
            set.main(),
            "package {{ package.name }}\n{# a plain comment #}\n{{ list_stored() | join(\"\\n\") }}\n"
        );
        assert_eq!(
            set.section("Stringer"),
            Some("func (v {{ decl.name }}) String() string {\n")
        );
        assert_eq!(set.section("Empty"), Some(""));
        assert_eq!(set.section_names().collect::<Vec<_>>(), ["Stringer", "Empty"]);
    }

    #[test]
    fn sections_install_as_templates() {
        let set = TemplateSet::parse("main", SOURCE).expect("parses");
        let mut env = Environment::new();
        set.install(&mut env).expect("installs");
        assert!(env.get_template("main").is_ok());
        assert!(env.get_template("Stringer").is_ok());
    }

    #[rstest]
    #[case::nested(
        "{# define \"A\" #}\n{# define \"B\" #}\n",
        "t:2: define \"B\" inside \"A\""
    )]
    #[case::unterminated("x\n{#- define \"A\" -#}\nbody\n", "t:2: \"A\" is never ended")]
    #[case::stray_end("{#- end -#}\n", "t:1: end without define")]
    #[case::duplicate(
        "{# define \"A\" #}\n{# end #}\n{# define \"A\" #}\n{# end #}\n",
        "t:3: duplicate template \"A\""
    )]
    #[case::main_name("{# define \"t\" #}\n{# end #}\n", "t:1: duplicate template \"t\"")]
    #[case::unquoted("{#- define A -#}\n", "t:1: malformed define: {#- define A -#}")]
    fn malformed_sections(#[case] source: &str, #[case] expected: &str) {
        let err = TemplateSet::parse("t", source).expect_err("malformed");
        assert_eq!(err.to_string(), expected);
    }

    #[test]
    fn comments_that_only_start_like_directives_are_kept() {
        let set = TemplateSet::parse("t", "{# defined elsewhere #}\n{# ending #}\n").expect("parses");
        assert_eq!(set.main(), "{# defined elsewhere #}\n{# ending #}\n");
    }
}
