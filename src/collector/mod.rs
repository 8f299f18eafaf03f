//! Collector plugin contract and the value types flowing through it.
//!
//! A collector is any type implementing [`Collector`]. Its [`CollectorSpec`]
//! is validated once, at registration, into an immutable
//! [`CollectorDefinition`] owned by the [`CollectorRegistry`].

pub mod builtin;
pub mod dsl;
pub mod registry;

use std::any::{type_name, TypeId};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::exchange::{ProfiledRequest, ProfiledResponse};

pub use dsl::CollectorSpec;
pub use registry::CollectorRegistry;

/// Signature of a collection routine.
pub type CollectFn = Arc<
    dyn Fn(&ProfiledRequest, &ProfiledResponse, &mut ResultBag) -> anyhow::Result<()>
        + Send
        + Sync,
>;

// ─── Plugin contract ─────────────────────────────────────────────

/// A pluggable source of per-request diagnostic data.
///
/// Implementors are usually unit structs; all behaviour lives in the
/// returned spec.
///
/// The collect routine runs inline with request handling, once per
/// profiled request, possibly on many requests at the same time. It must
/// be fast and must not block: no network or disk I/O, no waiting on
/// locks held across requests. An error or a panic is contained to this
/// collector's slot.
///
/// ```rust,ignore
/// struct RuntimeCollector;
///
/// impl Collector for RuntimeCollector {
///     fn spec() -> CollectorSpec {
///         CollectorSpec::new()
///             .name("runtime")
///             .position(3)
///             .collect(|req, _res, bag| {
///                 bag.store("runtime", req.runtime().as_millis() as u64)?;
///                 Ok(())
///             })
///             .template(Template::data("<%= @data[:runtime] %> ms"))
///     }
/// }
/// ```
pub trait Collector: Send + Sync + 'static {
    fn spec() -> CollectorSpec;
}

/// Identity of a collector implementation type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CollectorKey {
    type_id: TypeId,
    type_name: &'static str,
}

impl CollectorKey {
    pub fn of<C: Collector>() -> Self {
        Self {
            type_id: TypeId::of::<C>(),
            type_name: type_name::<C>(),
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Fully qualified Rust type name.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Last path segment of the type name, for messages.
    pub fn short_name(&self) -> &'static str {
        self.type_name
            .rsplit("::")
            .next()
            .unwrap_or(self.type_name)
    }
}

impl fmt::Display for CollectorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name)
    }
}

// ─── Templates ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TemplateType {
    /// Template content embedded at registration time.
    Data,
    /// Template loaded from a path under the templates root, at render time.
    File,
}

/// Markup used to render one collector's stored data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Template {
    Data(String),
    File(PathBuf),
}

impl Template {
    pub fn data(content: impl Into<String>) -> Self {
        Self::Data(content.into())
    }

    pub fn file(path: impl AsRef<Path>) -> Self {
        Self::File(path.as_ref().to_path_buf())
    }

    pub fn template_type(&self) -> TemplateType {
        match self {
            Self::Data(_) => TemplateType::Data,
            Self::File(_) => TemplateType::File,
        }
    }
}

// ─── Result bag ──────────────────────────────────────────────────

/// Named values stored by one collector for one request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultBag(BTreeMap<String, serde_json::Value>);

impl ResultBag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` under `key`, replacing any previous value.
    pub fn store<V: Serialize>(
        &mut self,
        key: impl Into<String>,
        value: V,
    ) -> Result<(), serde_json::Error> {
        let value = serde_json::to_value(value)?;
        self.0.insert(key.into(), value);
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &serde_json::Value)> {
        self.0.iter()
    }
}

/// What one collector produced for one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CollectorOutcome {
    Collected { data: ResultBag },
    Failed { error: String },
}

impl CollectorOutcome {
    pub fn data(&self) -> Option<&ResultBag> {
        match self {
            Self::Collected { data } => Some(data),
            Self::Failed { .. } => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Per-request results keyed by collector name.
pub type Collection = BTreeMap<String, CollectorOutcome>;

// ─── Definition ──────────────────────────────────────────────────

/// Validated, immutable registry entry for one collector.
#[derive(Clone)]
pub struct CollectorDefinition {
    pub(crate) key: CollectorKey,
    pub(crate) name: String,
    pub(crate) position: i32,
    pub(crate) icon: Option<String>,
    pub(crate) template: Template,
    pub(crate) collect: CollectFn,
}

impl CollectorDefinition {
    /// Build the definition for `C` from its spec.
    pub fn of<C: Collector>() -> crate::Result<Self> {
        C::spec().build(CollectorKey::of::<C>())
    }

    pub fn key(&self) -> CollectorKey {
        self.key
    }

    /// True when this definition wraps the collector type `C`.
    pub fn wraps<C: Collector>(&self) -> bool {
        self.key.type_id == TypeId::of::<C>()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn position(&self) -> i32 {
        self.position
    }

    pub fn icon(&self) -> Option<&str> {
        self.icon.as_deref()
    }

    pub fn template(&self) -> &Template {
        &self.template
    }

    pub fn template_type(&self) -> TemplateType {
        self.template.template_type()
    }

    /// Run the collection routine once.
    pub fn collect(
        &self,
        request: &ProfiledRequest,
        response: &ProfiledResponse,
        bag: &mut ResultBag,
    ) -> anyhow::Result<()> {
        (self.collect)(request, response, bag)
    }
}

impl fmt::Debug for CollectorDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectorDefinition")
            .field("name", &self.name)
            .field("collector", &self.key.type_name)
            .field("position", &self.position)
            .field("icon", &self.icon)
            .field("template", &self.template)
            .finish_non_exhaustive()
    }
}
