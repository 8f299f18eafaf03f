//! Renders a collector's stored data through its template reference.
//!
//! Only value interpolation is supported: every `<%= @data[:key] %>` tag
//! (or the short `<%= key %>`) is replaced with the HTML-escaped value
//! stored under `key`. Strings are written verbatim, `null` and missing
//! keys render empty, anything else is written as compact JSON.

use std::path::{Path, PathBuf};

use askama_escape::{escape, Html};

use crate::collector::{CollectorDefinition, CollectorOutcome, ResultBag, Template};
use crate::error::{ProfilerError, Result};

const OPEN_TAG: &str = "<%=";
const CLOSE_TAG: &str = "%>";

#[derive(Debug, Clone)]
pub struct Renderer {
    templates_root: PathBuf,
}

impl Renderer {
    pub fn new(templates_root: impl Into<PathBuf>) -> Self {
        Self {
            templates_root: templates_root.into(),
        }
    }

    pub fn templates_root(&self) -> &Path {
        &self.templates_root
    }

    /// Render `data` with the definition's template.
    ///
    /// FILE templates are resolved against the templates root on every
    /// call; a missing file is reported here, never at registration.
    pub fn render(&self, definition: &CollectorDefinition, data: &ResultBag) -> Result<String> {
        match definition.template() {
            Template::Data(content) => interpolate(content, data),
            Template::File(path) => {
                let content = self.load(path)?;
                interpolate(&content, data)
            }
        }
    }

    /// Render a stored outcome, turning every failure into an inline notice.
    pub fn render_outcome(&self, definition: &CollectorDefinition, outcome: &CollectorOutcome) -> String {
        let result = match outcome {
            CollectorOutcome::Collected { data } => self.render(definition, data),
            CollectorOutcome::Failed { error } => {
                return notice(&format!("Collection failed: {error}"));
            }
        };

        result.unwrap_or_else(|e| {
            tracing::warn!(collector = %definition.name(), error = %e, "Collector render failed");
            notice(&e.to_string())
        })
    }

    fn load(&self, path: &Path) -> Result<String> {
        let full = self.templates_root.join(path);
        match std::fs::read_to_string(&full) {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ProfilerError::TemplateNotFound { path: full })
            }
            Err(e) => Err(ProfilerError::Template(format!(
                "cannot read {}: {e}",
                full.display()
            ))),
        }
    }
}

fn notice(message: &str) -> String {
    format!(r#"<p class="wp-error">{}</p>"#, escape(message, Html))
}

fn interpolate(template: &str, data: &ResultBag) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find(OPEN_TAG) {
        out.push_str(&rest[..start]);
        let after_open = &rest[start + OPEN_TAG.len()..];
        let end = after_open.find(CLOSE_TAG).ok_or_else(|| {
            ProfilerError::Template(format!(
                "unterminated tag at byte {}",
                template.len() - rest.len() + start
            ))
        })?;

        let key = tag_key(after_open[..end].trim());
        if let Some(value) = data.get(key) {
            out.push_str(&escape(&display_value(value), Html).to_string());
        }
        rest = &after_open[end + CLOSE_TAG.len()..];
    }

    out.push_str(rest);
    Ok(out)
}

/// `@data[:key]`, `@data["key"]` and `key` all name `key`.
fn tag_key(expr: &str) -> &str {
    let Some(inner) = expr
        .strip_prefix("@data[")
        .and_then(|s| s.strip_suffix(']'))
    else {
        return expr;
    };
    let inner = inner.trim();
    inner
        .strip_prefix(':')
        .or_else(|| {
            inner
                .strip_prefix('"')
                .and_then(|s| s.strip_suffix('"'))
        })
        .unwrap_or(inner)
}

fn display_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::{Collector, CollectorSpec};

    struct FileBacked;

    impl Collector for FileBacked {
        fn spec() -> CollectorSpec {
            CollectorSpec::new()
                .name("file_backed")
                .collect(|_, _, _| Ok(()))
                .template(Template::file("collectors/file_backed.html"))
        }
    }

    struct Inline;

    impl Collector for Inline {
        fn spec() -> CollectorSpec {
            CollectorSpec::new()
                .name("inline")
                .collect(|_, _, _| Ok(()))
                .template(Template::data(
                    "<b><%= @data[:name] %></b> <%= count %> <%= @data[\"missing\"] %>",
                ))
        }
    }

    fn bag(pairs: &[(&str, serde_json::Value)]) -> ResultBag {
        let mut bag = ResultBag::new();
        for (k, v) in pairs {
            bag.store(*k, v).unwrap();
        }
        bag
    }

    #[test]
    fn data_template_interpolates_and_escapes() {
        let def = CollectorDefinition::of::<Inline>().unwrap();
        let data = bag(&[
            ("name", serde_json::json!("<script>")),
            ("count", serde_json::json!(3)),
        ]);
        let html = Renderer::new("unused").render(&def, &data).unwrap();
        assert_eq!(html, "<b>&lt;script&gt;</b> 3 ");
    }

    #[test]
    fn file_template_is_resolved_lazily() {
        let dir = tempfile::tempdir().unwrap();
        let def = CollectorDefinition::of::<FileBacked>().unwrap();
        let renderer = Renderer::new(dir.path());
        let data = bag(&[("runtime", serde_json::json!(42))]);

        // Registration succeeded without the file; rendering reports it.
        match renderer.render(&def, &data) {
            Err(ProfilerError::TemplateNotFound { path }) => {
                assert!(path.ends_with("collectors/file_backed.html"))
            }
            other => panic!("expected TemplateNotFound, got {other:?}"),
        }

        std::fs::create_dir_all(dir.path().join("collectors")).unwrap();
        std::fs::write(
            dir.path().join("collectors/file_backed.html"),
            "runtime=<%= @data[:runtime] %>",
        )
        .unwrap();
        assert_eq!(renderer.render(&def, &data).unwrap(), "runtime=42");
    }

    #[test]
    fn unterminated_tag_is_an_error() {
        let err = interpolate("a <%= @data[:x]", &ResultBag::new()).unwrap_err();
        assert!(matches!(err, ProfilerError::Template(_)));
    }

    #[test]
    fn failed_outcome_renders_notice() {
        let def = CollectorDefinition::of::<Inline>().unwrap();
        let html = Renderer::new("unused").render_outcome(
            &def,
            &CollectorOutcome::Failed {
                error: "boom".into(),
            },
        );
        assert_eq!(html, r#"<p class="wp-error">Collection failed: boom</p>"#);
    }

    #[test]
    fn missing_file_template_renders_notice() {
        let dir = tempfile::tempdir().unwrap();
        let def = CollectorDefinition::of::<FileBacked>().unwrap();
        let outcome = CollectorOutcome::Collected {
            data: bag(&[("runtime", serde_json::json!(42))]),
        };

        let html = Renderer::new(dir.path()).render_outcome(&def, &outcome);
        assert!(html.starts_with(r#"<p class="wp-error">template not found: "#));
        assert!(html.contains("file_backed.html"));
    }

    #[test]
    fn structured_values_render_as_compact_json() {
        let def = CollectorDefinition::of::<Inline>().unwrap();
        let data = bag(&[
            ("name", serde_json::json!({ "a": 1, "b": [true, null] })),
            ("count", serde_json::json!([1, 2])),
        ]);
        let html = Renderer::new("unused").render(&def, &data).unwrap();
        assert_eq!(
            html,
            "<b>{&quot;a&quot;:1,&quot;b&quot;:[true,null]}</b> [1,2] "
        );
    }

    #[test]
    fn tag_key_forms() {
        assert_eq!(tag_key("@data[:runtime]"), "runtime");
        assert_eq!(tag_key("@data[\"runtime\"]"), "runtime");
        assert_eq!(tag_key("runtime"), "runtime");
    }
}
