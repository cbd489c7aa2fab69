//! Query Synthesizer
//!
//! Turns a question plus the routed tables' schema context into a single
//! executable SQL statement. The prompt embeds live columns, types and sample
//! data so the system adapts to schema drift without a query-template
//! library; correctness is probabilistic and checked downstream by the
//! execution guard, never assumed here.

use crate::catalog::Catalog;
use crate::error::Result;
use crate::fence::{self, CodeBlock};
use crate::llm::{ChatMessage, CompletionBackend, GenerationSettings};
use crate::router::RoutingDecision;
use std::sync::Arc;
use tracing::{debug, info};

/// One executable statement tied to the requesting user. Immutable, executed
/// at most once.
#[derive(Debug, Clone)]
pub struct SynthesizedQuery {
    pub statement: String,
    pub user: String,
}

pub struct QuerySynthesizer {
    llm: Arc<dyn CompletionBackend>,
    settings: GenerationSettings,
    identity_column: String,
}

impl QuerySynthesizer {
    pub fn new(
        llm: Arc<dyn CompletionBackend>,
        settings: GenerationSettings,
        identity_column: String,
    ) -> Self {
        Self {
            llm,
            settings,
            identity_column,
        }
    }

    /// `None` means the model produced no SQL block — an expected outcome for
    /// an ambiguous question, not an error.
    pub async fn synthesize(
        &self,
        question: &str,
        decision: &RoutingDecision,
        catalog: &Catalog,
        user: &str,
    ) -> Result<Option<SynthesizedQuery>> {
        let system = self.build_system_prompt(decision, catalog, user);
        let response = self
            .llm
            .complete(&system, &[ChatMessage::user(question)], &self.settings)
            .await?;
        debug!(%response, "synthesizer response");

        match fence::extract(&response, Some("sql")) {
            CodeBlock::Found(statement) => {
                info!(%statement, "synthesized query");
                Ok(Some(SynthesizedQuery {
                    statement,
                    user: user.to_string(),
                }))
            }
            CodeBlock::NotFound => {
                info!("no SQL block in synthesizer response");
                Ok(None)
            }
        }
    }

    fn build_system_prompt(
        &self,
        decision: &RoutingDecision,
        catalog: &Catalog,
        user: &str,
    ) -> String {
        let tables: Vec<String> = decision
            .iter()
            .filter_map(|name| catalog.get(name))
            .map(|t| t.render())
            .collect();

        format!(
            "Given the following table(s):\n{}\n\
             Convert the natural language question into one SQL query, returned in a \
             ```sql fenced code block.\n\
             Rules:\n\
             - Use the declared column types exactly; format values for date-typed \
             columns to match the sample data.\n\
             - If the question abbreviates month names (e.g. 'Jan, Feb, Mar'), use the \
             full month names ('January, February, March') in the query.\n\
             - Use LIKE for partial matches on free-text columns.\n\
             - Add a row-limit clause only when the question asks for a top N.\n\
             - Select only the columns the question asks about; no extra columns.\n\
             - The query must be precise and must not error when executed.\n\
             - Always include a filter so that {} = '{}'.",
            tables.join("\n"),
            self.identity_column,
            user
        )
    }
}
