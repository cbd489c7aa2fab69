//! Execution Guard
//!
//! Runs a synthesized statement after one deterministic rewrite (the symbolic
//! `CURRENT_DATE` token becomes the store's native expression — generation
//! models are unreliable at portable current-date syntax). A malformed
//! generated statement is an expected, frequent outcome: malformed-statement
//! and data-coercion failures collapse into an empty result set instead of
//! propagating. Everything else is fatal.

use crate::error::Result;
use crate::store::{QueryBackend, StoreErrorKind};
use crate::synthesizer::SynthesizedQuery;
use crate::value::ResultSet;
use std::sync::Arc;
use tracing::{info, warn};

const CURRENT_DATE_TOKEN: &str = "CURRENT_DATE";

pub struct ExecutionGuard {
    backend: Arc<dyn QueryBackend>,
}

impl ExecutionGuard {
    pub fn new(backend: Arc<dyn QueryBackend>) -> Self {
        Self { backend }
    }

    pub async fn execute(&self, query: &SynthesizedQuery) -> Result<ResultSet> {
        let statement = query
            .statement
            .replace(CURRENT_DATE_TOKEN, self.backend.current_date_expr());

        match self.backend.run(&statement).await {
            Ok(rows) => {
                info!(rows = rows.len(), "statement executed");
                Ok(rows)
            }
            Err(err)
                if matches!(
                    err.kind,
                    StoreErrorKind::MalformedStatement | StoreErrorKind::DataCoercion
                ) =>
            {
                warn!(%err, "recoverable execution failure, returning empty result");
                Ok(ResultSet::empty())
            }
            Err(err) => Err(err.into()),
        }
    }
}
