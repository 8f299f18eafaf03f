use std::sync::Arc;

use super::{CollectFn, CollectorDefinition, CollectorKey, ResultBag, Template};
use crate::error::{ProfilerError, Result};
use crate::exchange::{ProfiledRequest, ProfiledResponse};

/// Declarative description of a collector, filled in by its author.
///
/// Nothing is checked while the spec is being built; [`CollectorSpec::build`]
/// validates it as a whole and turns it into a [`CollectorDefinition`].
#[derive(Clone, Default)]
pub struct CollectorSpec {
    name: Option<String>,
    position: i32,
    icon: Option<String>,
    collect: Option<CollectFn>,
    template: Option<Template>,
}

impl CollectorSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry key. Stored lowercase.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sort key for processing and display order. Defaults to 0.
    pub fn position(mut self, position: i32) -> Self {
        self.position = position;
        self
    }

    /// Icon shown next to the collector's tab (a data URI or an emoji).
    pub fn icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    pub fn collect<F>(mut self, routine: F) -> Self
    where
        F: Fn(&ProfiledRequest, &ProfiledResponse, &mut ResultBag) -> anyhow::Result<()>
            + Send
            + Sync
            + 'static,
    {
        self.collect = Some(Arc::new(routine));
        self
    }

    pub fn template(mut self, template: Template) -> Self {
        self.template = Some(template);
        self
    }

    /// Validate the spec and wrap it into an immutable definition.
    pub fn build(self, key: CollectorKey) -> Result<CollectorDefinition> {
        let invalid = |missing| ProfilerError::InvalidCollector {
            collector: key.short_name().to_owned(),
            missing,
        };

        let name = self
            .name
            .map(|n| n.trim().to_lowercase())
            .filter(|n| !n.is_empty())
            .ok_or_else(|| invalid("name"))?;
        let collect = self.collect.ok_or_else(|| invalid("collect routine"))?;
        let template = self.template.ok_or_else(|| invalid("template"))?;

        Ok(CollectorDefinition {
            key,
            name,
            position: self.position,
            icon: self.icon,
            template,
            collect,
        })
    }
}

impl std::fmt::Debug for CollectorSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectorSpec")
            .field("name", &self.name)
            .field("position", &self.position)
            .field("icon", &self.icon)
            .field("collect", &self.collect.is_some())
            .field("template", &self.template)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::{Collector, TemplateType};

    struct Probe;

    impl Collector for Probe {
        fn spec() -> CollectorSpec {
            CollectorSpec::new()
        }
    }

    fn key() -> CollectorKey {
        CollectorKey::of::<Probe>()
    }

    fn complete() -> CollectorSpec {
        CollectorSpec::new()
            .name("  Time ")
            .position(3)
            .collect(|_, _, _| Ok(()))
            .template(Template::data("<%= @data[:runtime] %>"))
    }

    fn missing_of(result: Result<CollectorDefinition>) -> &'static str {
        match result {
            Err(ProfilerError::InvalidCollector { missing, .. }) => missing,
            other => panic!("expected InvalidCollector, got {other:?}"),
        }
    }

    #[test]
    fn complete_spec_builds_definition() {
        let def = complete().icon("⏱").build(key()).unwrap();
        assert_eq!(def.name(), "time");
        assert_eq!(def.position(), 3);
        assert_eq!(def.icon(), Some("⏱"));
        assert_eq!(def.template_type(), TemplateType::Data);
        assert!(def.wraps::<Probe>());
    }

    #[test]
    fn empty_spec_reports_name_first() {
        assert_eq!(missing_of(CollectorSpec::new().build(key())), "name");
    }

    #[test]
    fn blank_name_is_rejected() {
        assert_eq!(missing_of(complete().name("   ").build(key())), "name");
    }

    #[test]
    fn missing_collect_routine_is_rejected() {
        let spec = CollectorSpec::new()
            .name("time")
            .template(Template::data("x"));
        assert_eq!(missing_of(spec.build(key())), "collect routine");
    }

    #[test]
    fn missing_template_is_rejected() {
        let spec = CollectorSpec::new().name("time").collect(|_, _, _| Ok(()));
        assert_eq!(missing_of(spec.build(key())), "template");
    }

    #[test]
    fn error_names_the_collector_type() {
        let err = CollectorSpec::new().build(key()).unwrap_err();
        assert_eq!(err.to_string(), "invalid collector `Probe`: missing name");
    }
}
