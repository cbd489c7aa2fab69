//! Chart Pipeline — generate/execute/repair loop
//!
//! Asks the model for plotting code, validates it, runs it in the sandbox and
//! renders the resulting figure. An "undefined name" evaluation failure is
//! treated as a transient generation defect and retried with a fresh attempt;
//! every other failure abandons the chart. Absence of an artifact is always a
//! valid, silent outcome — the text answer ships without it.

pub mod figure;
pub mod sandbox;

use crate::error::Result;
use crate::fence;
use crate::llm::{ChatMessage, CompletionBackend, GenerationSettings};
use crate::value::ResultSet;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use figure::Figure;
use std::sync::Arc;
use tracing::{debug, info, warn};

const CHART_SYSTEM: &str = "You are a chart writer. Plot the data that answers the \
question as a chart, using a script in the Rhai language returned inside a ```rhai \
fenced code block. Only these functions exist: bar(labels, values), line(xs, ys), \
scatter(xs, ys), title(text), x_label(text), y_label(text). Define every variable \
you use. Do not write files and do not call any display function. If an axis is not \
numeric, map its values to a numeric encoding instead of refusing.";

const CHART_WIDTH: u32 = 640;
const CHART_HEIGHT: u32 = 480;

/// An encoded raster chart. Produced at most once per question.
#[derive(Debug, Clone)]
pub struct ChartArtifact {
    pub png: Vec<u8>,
    pub base64: String,
}

impl ChartArtifact {
    fn new(png: Vec<u8>) -> Self {
        let base64 = BASE64.encode(&png);
        Self { png, base64 }
    }
}

/// Outcome of one generation attempt.
#[derive(Debug)]
pub enum AttemptOutcome {
    Rendered(Figure),
    Retryable(String),
    Fatal(String),
    NoCode,
}

/// One request/response cycle with the model inside the retry loop.
#[derive(Debug)]
pub struct GenerationAttempt {
    pub ordinal: u8,
    pub response: String,
    pub outcome: AttemptOutcome,
}

pub struct ChartPipeline {
    llm: Arc<dyn CompletionBackend>,
    settings: GenerationSettings,
    max_attempts: u8,
    op_budget: u64,
}

impl ChartPipeline {
    pub fn new(
        llm: Arc<dyn CompletionBackend>,
        settings: GenerationSettings,
        max_attempts: u8,
        op_budget: u64,
    ) -> Self {
        Self {
            llm,
            settings,
            max_attempts,
            op_budget,
        }
    }

    /// Never fails the request: every failure path degrades to `None`.
    pub async fn render(
        &self,
        question: &str,
        result: &ResultSet,
    ) -> Result<Option<ChartArtifact>> {
        let turns = [
            ChatMessage::user(question),
            ChatMessage::assistant(serde_json::to_string(&result.to_prompt_json())?),
        ];

        for ordinal in 1..=self.max_attempts {
            let response = match self
                .llm
                .complete(CHART_SYSTEM, &turns, &self.settings)
                .await
            {
                Ok(text) => text,
                Err(err) => {
                    warn!(%err, "chart generation call failed, abandoning chart");
                    return Ok(None);
                }
            };
            debug!(ordinal, %response, "chart generation response");

            let attempt = self.evaluate_attempt(ordinal, response);
            match attempt.outcome {
                AttemptOutcome::Rendered(figure) => {
                    let png = figure.to_png(CHART_WIDTH, CHART_HEIGHT)?;
                    info!(ordinal, bytes = png.len(), "chart rendered");
                    return Ok(Some(ChartArtifact::new(png)));
                }
                AttemptOutcome::NoCode => {
                    info!(ordinal, "no usable plotting code, abandoning chart");
                    return Ok(None);
                }
                AttemptOutcome::Retryable(message) => {
                    info!(ordinal, %message, "retryable chart defect, regenerating");
                    continue;
                }
                AttemptOutcome::Fatal(message) => {
                    info!(ordinal, %message, "fatal chart defect, abandoning chart");
                    return Ok(None);
                }
            }
        }

        info!(
            attempts = self.max_attempts,
            "chart attempts exhausted, abandoning chart"
        );
        Ok(None)
    }

    fn evaluate_attempt(&self, ordinal: u8, response: String) -> GenerationAttempt {
        // A response without a single digit is a strong signal the model
        // declined to produce a chart.
        if !response.chars().any(|c| c.is_ascii_digit()) {
            return GenerationAttempt {
                ordinal,
                response,
                outcome: AttemptOutcome::NoCode,
            };
        }

        let block = fence::extract(&response, Some("rhai"))
            .into_option()
            .or_else(|| fence::extract(&response, None).into_option());
        let code = match block {
            Some(code) => code,
            None => {
                return GenerationAttempt {
                    ordinal,
                    response,
                    outcome: AttemptOutcome::NoCode,
                }
            }
        };

        let outcome = match sandbox::execute(&code, self.op_budget) {
            Ok(figure) if figure.is_empty() => {
                AttemptOutcome::Fatal("script drew nothing".to_string())
            }
            Ok(figure) => AttemptOutcome::Rendered(figure),
            Err(failure) if failure.retryable => AttemptOutcome::Retryable(failure.message),
            Err(failure) => AttemptOutcome::Fatal(failure.message),
        };
        GenerationAttempt {
            ordinal,
            response,
            outcome,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result as AskResult;
    use crate::value::CellValue;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU8, Ordering};

    struct ScriptedBackend {
        reply: String,
        calls: AtomicU8,
    }

    impl ScriptedBackend {
        fn new(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: reply.to_string(),
                calls: AtomicU8::new(0),
            })
        }
    }

    #[async_trait]
    impl CompletionBackend for ScriptedBackend {
        async fn complete(
            &self,
            _system: &str,
            _turns: &[ChatMessage],
            _settings: &GenerationSettings,
        ) -> AskResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.reply.clone())
        }
    }

    fn rows() -> ResultSet {
        let mut rs = ResultSet::new(vec!["Month".into(), "Value".into()]);
        rs.push(vec![CellValue::Text("January".into()), CellValue::Int(10)]);
        rs
    }

    fn pipeline(backend: Arc<ScriptedBackend>) -> ChartPipeline {
        ChartPipeline::new(backend, GenerationSettings::deterministic(), 3, 100_000)
    }

    #[tokio::test]
    async fn good_script_renders_an_artifact() {
        let backend = ScriptedBackend::new(
            "```rhai\nlet m = [\"Jan\"]; let v = [10.0]; bar(m, v);\n```",
        );
        let chart = pipeline(backend.clone()).render("q", &rows()).await.unwrap();
        let artifact = chart.expect("artifact");
        assert!(!artifact.png.is_empty());
        assert!(!artifact.base64.is_empty());
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn undefined_name_retries_to_the_cap_then_yields_nothing() {
        let backend =
            ScriptedBackend::new("```rhai\nlet v = [1.0, 2.0]; bar(months, v);\n```");
        let chart = pipeline(backend.clone()).render("q", &rows()).await.unwrap();
        assert!(chart.is_none());
        assert_eq!(backend.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn type_error_is_not_retried() {
        let backend = ScriptedBackend::new("```rhai\nbar(\"Jan\", 10);\n```");
        let chart = pipeline(backend.clone()).render("q", &rows()).await.unwrap();
        assert!(chart.is_none());
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn script_that_draws_nothing_is_terminal() {
        let backend = ScriptedBackend::new("```rhai\ntitle(\"Q1 sales\");\n```");
        let chart = pipeline(backend.clone()).render("q", &rows()).await.unwrap();
        assert!(chart.is_none());
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn digitless_response_is_terminal() {
        let backend = ScriptedBackend::new("Sorry, this data cannot be charted.");
        let chart = pipeline(backend.clone()).render("q", &rows()).await.unwrap();
        assert!(chart.is_none());
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn response_without_code_block_is_terminal() {
        let backend = ScriptedBackend::new("There are 3 rows but I cannot plot them.");
        let chart = pipeline(backend.clone()).render("q", &rows()).await.unwrap();
        assert!(chart.is_none());
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }
}
