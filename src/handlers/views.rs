//! Panel pages. Collector tabs are pre-rendered by the [`Renderer`] and
//! embedded as trusted markup; everything else is escaped by askama.

use std::sync::Arc;

use askama::Template;
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};

use crate::collector::CollectorDefinition;
use crate::metrics::StatsSnapshot;
use crate::render::Renderer;
use crate::storage::CollectionRecord;

/// One line of the history table.
pub struct RecordRow {
    pub token: String,
    pub method: String,
    pub url: String,
    pub status: u16,
    pub duration_ms: String,
    pub date: String,
}

impl From<&CollectionRecord> for RecordRow {
    fn from(r: &CollectionRecord) -> Self {
        Self {
            token: r.token.clone(),
            method: r.method.clone(),
            url: r.url.clone(),
            status: r.status,
            duration_ms: format_ms(r.duration_us),
            date: r.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}

pub struct CollectorTab {
    pub name: String,
    pub icon: String,
    /// Rendered collector markup.
    pub body: String,
}

pub struct ToolbarLink {
    pub name: String,
    pub icon: String,
    pub failed: bool,
}

#[derive(Template)]
#[template(path = "panel/index.html")]
pub struct IndexTemplate {
    pub prefix: String,
    pub records: Vec<RecordRow>,
    pub stats: StatsSnapshot,
}

impl IndexTemplate {
    pub fn new(prefix: &str, records: &[CollectionRecord], stats: StatsSnapshot) -> Self {
        Self {
            prefix: prefix.to_owned(),
            records: records.iter().map(RecordRow::from).collect(),
            stats,
        }
    }
}

#[derive(Template)]
#[template(path = "panel/show.html")]
pub struct ShowTemplate {
    pub prefix: String,
    pub token: String,
    pub method: String,
    pub url: String,
    pub status: u16,
    pub tabs: Vec<CollectorTab>,
}

impl ShowTemplate {
    /// One tab per registered collector, in registry order.
    pub fn new(
        prefix: &str,
        record: &CollectionRecord,
        definitions: &[Arc<CollectorDefinition>],
        renderer: &Renderer,
    ) -> Self {
        let tabs = definitions
            .iter()
            .map(|def| CollectorTab {
                name: def.name().to_owned(),
                icon: def.icon().unwrap_or_default().to_owned(),
                body: match record.results.get(def.name()) {
                    Some(outcome) => renderer.render_outcome(def, outcome),
                    None => "<p>No data collected for this request.</p>".to_owned(),
                },
            })
            .collect();

        Self {
            prefix: prefix.to_owned(),
            token: record.token.clone(),
            method: record.method.clone(),
            url: record.url.clone(),
            status: record.status,
            tabs,
        }
    }
}

#[derive(Template)]
#[template(path = "panel/toolbar.html")]
pub struct ToolbarTemplate {
    pub prefix: String,
    pub token: String,
    pub status: u16,
    pub duration_ms: String,
    pub links: Vec<ToolbarLink>,
}

impl ToolbarTemplate {
    pub fn new(prefix: &str, record: &CollectionRecord, definitions: &[Arc<CollectorDefinition>]) -> Self {
        let links = definitions
            .iter()
            .map(|def| ToolbarLink {
                name: def.name().to_owned(),
                icon: def.icon().unwrap_or_default().to_owned(),
                failed: record
                    .results
                    .get(def.name())
                    .is_some_and(|o| o.is_failed()),
            })
            .collect();

        Self {
            prefix: prefix.to_owned(),
            token: record.token.clone(),
            status: record.status,
            duration_ms: format_ms(record.duration_us),
            links,
        }
    }
}

#[derive(Template)]
#[template(path = "panel/404.html")]
pub struct NotFoundTemplate {
    pub prefix: String,
    pub token: String,
}

/// Wrapper to render Askama templates as Axum responses.
pub struct HtmlTemplate<T>(pub T);

impl<T> IntoResponse for HtmlTemplate<T>
where
    T: Template,
{
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(rendered) => Html(rendered).into_response(),
            Err(err) => {
                tracing::error!(error = %err, "Template render failed");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}

fn format_ms(duration_us: u64) -> String {
    format!("{:.2}", duration_us as f64 / 1000.0)
}
