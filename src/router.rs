//! Table Router
//!
//! Asks the generation model which catalog table(s) a question concerns and
//! intersects the answer with the real table names, so hallucinated names are
//! silently dropped. An empty decision is a valid outcome meaning "route to
//! nothing"; upstream call failures propagate without local retry.

use crate::catalog::Catalog;
use crate::error::Result;
use crate::llm::{ChatMessage, CompletionBackend, GenerationSettings};
use itertools::Itertools;
use std::sync::Arc;
use tracing::{debug, info};

const ROUTER_SYSTEM: &str = "Given the following table descriptions, select the most \
appropriate table(s) for the given natural language question. Reply with the table \
name(s) only, comma-separated, and nothing else.";

/// Ordered, deduplicated set of routed table names.
pub type RoutingDecision = Vec<String>;

pub struct TableRouter {
    llm: Arc<dyn CompletionBackend>,
    settings: GenerationSettings,
}

impl TableRouter {
    pub fn new(llm: Arc<dyn CompletionBackend>, settings: GenerationSettings) -> Self {
        Self { llm, settings }
    }

    pub async fn route(&self, question: &str, catalog: &Catalog) -> Result<RoutingDecision> {
        let prompt = format!(
            "Table descriptions:\n{}\nQuestion: {}",
            catalog.render(),
            question
        );
        let response = self
            .llm
            .complete(ROUTER_SYSTEM, &[ChatMessage::user(prompt)], &self.settings)
            .await?;
        debug!(%response, "router response");

        let decision = parse_table_list(&response, catalog);
        info!(?decision, "routing decision");
        Ok(decision)
    }
}

/// Trim, strip an optional `label:` prefix, split on commas, and keep only
/// names that exist in the catalog, preserving response order.
fn parse_table_list(response: &str, catalog: &Catalog) -> RoutingDecision {
    let content = response.trim();
    let content = match content.split_once(':') {
        Some((_, rest)) => rest,
        None => content,
    };

    content
        .split(',')
        .map(|candidate| candidate.trim().trim_matches(|c| c == '"' || c == '\''))
        .filter(|name| !name.is_empty() && catalog.contains(name))
        .map(str::to_string)
        .unique()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::TableDescriptor;
    use crate::value::ResultSet;

    fn catalog() -> Catalog {
        let table = |name: &str| TableDescriptor {
            name: name.to_string(),
            columns: vec![("a".into(), "text".into())],
            description: None,
            sample_rows: ResultSet::empty(),
        };
        Catalog {
            tables: vec![table("primary_sales"), table("secondary_sales")],
        }
    }

    #[test]
    fn plain_name_routes() {
        assert_eq!(
            parse_table_list("primary_sales", &catalog()),
            vec!["primary_sales"]
        );
    }

    #[test]
    fn label_prefix_is_stripped() {
        assert_eq!(
            parse_table_list("Table: primary_sales", &catalog()),
            vec!["primary_sales"]
        );
    }

    #[test]
    fn hallucinated_names_are_dropped() {
        assert_eq!(
            parse_table_list("primary_sales, tertiary_sales", &catalog()),
            vec!["primary_sales"]
        );
    }

    #[test]
    fn unknown_only_response_routes_to_nothing() {
        assert!(parse_table_list("orders, customers", &catalog()).is_empty());
    }

    #[test]
    fn duplicates_collapse_preserving_order() {
        assert_eq!(
            parse_table_list(
                "secondary_sales, primary_sales, secondary_sales",
                &catalog()
            ),
            vec!["secondary_sales", "primary_sales"]
        );
    }
}
