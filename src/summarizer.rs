//! Response Synthesizer
//!
//! Turns structured result rows back into a reader-facing natural-language
//! summary. No retry here: an upstream failure propagates, since the raw
//! table is delivered separately anyway.

use crate::error::Result;
use crate::llm::{ChatMessage, CompletionBackend, GenerationSettings};
use crate::value::ResultSet;
use std::sync::Arc;

const SUMMARIZER_SYSTEM: &str = "Given the following SQL query results, generate a \
natural language response summarizing the data in a human-readable format. Consider \
the context of the original question. Do not include any currency signs in the response.";

pub struct ResponseSynthesizer {
    llm: Arc<dyn CompletionBackend>,
    settings: GenerationSettings,
}

impl ResponseSynthesizer {
    pub fn new(llm: Arc<dyn CompletionBackend>, settings: GenerationSettings) -> Self {
        Self { llm, settings }
    }

    pub async fn summarize(&self, result: &ResultSet, question: &str) -> Result<String> {
        let turn = format!(
            "Question: {}\nAnswer:\n{}",
            question,
            serde_json::to_string(&result.to_prompt_json())?
        );
        let summary = self
            .llm
            .complete(
                SUMMARIZER_SYSTEM,
                &[ChatMessage::user(turn)],
                &self.settings,
            )
            .await?;
        Ok(summary.trim().to_string())
    }
}
