use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::collector::{Collection, CollectorOutcome, CollectorRegistry, ResultBag};
use crate::exchange::{ProfiledRequest, ProfiledResponse};

/// Runs every registered collector against one request/response pair.
pub struct CollectionPipeline;

impl CollectionPipeline {
    /// Collect from every registered collector, in position order.
    ///
    /// A collector that returns an error or panics gets a
    /// [`CollectorOutcome::Failed`] slot; the others still run. The
    /// registry lock is released before any collector is invoked.
    pub fn run(
        registry: &CollectorRegistry,
        request: &ProfiledRequest,
        response: &ProfiledResponse,
    ) -> Collection {
        let definitions = registry.all();
        let mut collection = Collection::new();

        for definition in definitions {
            let mut bag = ResultBag::new();
            let result = catch_unwind(AssertUnwindSafe(|| {
                definition.collect(request, response, &mut bag)
            }));

            let outcome = match result {
                Ok(Ok(())) => CollectorOutcome::Collected { data: bag },
                Ok(Err(e)) => {
                    tracing::warn!(collector = %definition.name(), error = %e, "Collector failed");
                    CollectorOutcome::Failed {
                        error: format!("{e:#}"),
                    }
                }
                Err(panic) => {
                    let message = panic_message(panic.as_ref());
                    tracing::error!(collector = %definition.name(), panic = %message, "Collector panicked");
                    CollectorOutcome::Failed {
                        error: format!("collector panicked: {message}"),
                    }
                }
            };

            collection.insert(definition.name().to_owned(), outcome);
        }

        collection
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_owned()
    }
}
