//! Pipeline Orchestrator
//!
//! Sequences routing → synthesis → execution, short-circuits the expected
//! "nothing to answer" outcomes, and fans out summary and chart generation
//! concurrently over the same read-only result set. The final answer carries
//! the chart ahead of the text.

use crate::catalog::{Catalog, SchemaSource};
use crate::chart::{ChartArtifact, ChartPipeline};
use crate::config::{Config, TableConfig};
use crate::error::Result;
use crate::executor::ExecutionGuard;
use crate::llm::CompletionBackend;
use crate::router::TableRouter;
use crate::store::QueryBackend;
use crate::summarizer::ResponseSynthesizer;
use crate::synthesizer::QuerySynthesizer;
use std::sync::Arc;
use tracing::{info, warn};

/// Canned reply when no catalog table matches the question.
pub const NO_RELEVANT_DATA_REPLY: &str =
    "I could not find relevant data for that question.";
/// Canned reply when no query could be synthesized.
pub const NOT_UNDERSTOOD_REPLY: &str =
    "I'm not sure I understand. Can you give more details or rephrase?";
/// Canned reply when the query ran but matched nothing the user may see.
pub const NO_RESULTS_REPLY: &str =
    "No results found, or you don't have access to this data.";

/// Final composed answer. Delivery order is fixed: chart first, text second.
#[derive(Debug)]
pub struct Answer {
    pub chart: Option<ChartArtifact>,
    pub text: String,
}

impl Answer {
    fn text_only(text: impl Into<String>) -> Self {
        Self {
            chart: None,
            text: text.into(),
        }
    }
}

pub struct Pipeline {
    schema: Arc<dyn SchemaSource>,
    tables: Vec<TableConfig>,
    sample_rows: usize,
    router: TableRouter,
    synthesizer: QuerySynthesizer,
    guard: ExecutionGuard,
    summarizer: ResponseSynthesizer,
    chart: ChartPipeline,
}

impl Pipeline {
    pub fn new(
        config: &Config,
        llm: Arc<dyn CompletionBackend>,
        schema: Arc<dyn SchemaSource>,
        store: Arc<dyn QueryBackend>,
    ) -> Self {
        Self {
            schema,
            tables: config.tables.clone(),
            sample_rows: config.sample_rows,
            router: TableRouter::new(Arc::clone(&llm), config.llm.router.clone()),
            synthesizer: QuerySynthesizer::new(
                Arc::clone(&llm),
                config.llm.synthesizer.clone(),
                config.identity_column.clone(),
            ),
            guard: ExecutionGuard::new(store),
            summarizer: ResponseSynthesizer::new(Arc::clone(&llm), config.llm.summarizer.clone()),
            chart: ChartPipeline::new(
                llm,
                config.llm.chart.clone(),
                config.chart_max_attempts,
                config.chart_op_budget,
            ),
        }
    }

    /// Answer one question for one user. Always returns a bounded, composed
    /// answer or a fatal error — never generated code or raw exception text.
    pub async fn answer(&self, question: &str, user: &str) -> Result<Answer> {
        let catalog = Catalog::build(self.schema.as_ref(), &self.tables, self.sample_rows).await?;

        let decision = self.router.route(question, &catalog).await?;
        if decision.is_empty() {
            info!("no table routed, short-circuiting");
            return Ok(Answer::text_only(NO_RELEVANT_DATA_REPLY));
        }

        let query = match self
            .synthesizer
            .synthesize(question, &decision, &catalog, user)
            .await?
        {
            Some(query) => query,
            None => {
                info!("no query synthesized, short-circuiting");
                return Ok(Answer::text_only(NOT_UNDERSTOOD_REPLY));
            }
        };

        let rows = self.guard.execute(&query).await?;
        if rows.is_empty() {
            info!("empty result set, short-circuiting");
            return Ok(Answer::text_only(NO_RESULTS_REPLY));
        }

        // Both network-bound branches overlap; both must settle before the
        // answer is composed.
        let (summary, chart) = tokio::join!(
            self.summarizer.summarize(&rows, question),
            self.chart.render(question, &rows),
        );
        let summary = summary?;
        let chart = chart.unwrap_or_else(|err| {
            warn!(%err, "chart branch failed, delivering text alone");
            None
        });

        info!(rows = rows.len(), chart = chart.is_some(), "✅ answer composed");
        Ok(Answer {
            chart,
            text: format!("{}\n\n**Summary**:\n{}", rows.to_markdown(), summary),
        })
    }
}
