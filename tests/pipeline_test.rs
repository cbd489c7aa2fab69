//! End-to-end pipeline scenarios over stub backends.

use askdata::catalog::SchemaSource;
use askdata::config::{Config, LlmConfig, TableConfig};
use askdata::error::Result;
use askdata::llm::{ChatMessage, CompletionBackend, GenerationSettings};
use askdata::pipeline::{
    Pipeline, NOT_UNDERSTOOD_REPLY, NO_RELEVANT_DATA_REPLY, NO_RESULTS_REPLY,
};
use askdata::store::{QueryBackend, StoreError};
use askdata::value::{CellValue, ResultSet};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Completion stub that answers by pipeline stage, recognized from each
/// stage's system instruction, and counts calls per stage.
#[derive(Default)]
struct StageLlm {
    router_reply: String,
    synth_reply: String,
    summary_reply: String,
    chart_reply: String,
    router_calls: AtomicUsize,
    synth_calls: AtomicUsize,
    summary_calls: AtomicUsize,
    chart_calls: AtomicUsize,
}

#[async_trait]
impl CompletionBackend for StageLlm {
    async fn complete(
        &self,
        system: &str,
        _turns: &[ChatMessage],
        _settings: &GenerationSettings,
    ) -> Result<String> {
        if system.contains("select the most appropriate") {
            self.router_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.router_reply.clone())
        } else if system.contains("Convert the natural language question") {
            self.synth_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.synth_reply.clone())
        } else if system.contains("summarizing the data") {
            self.summary_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.summary_reply.clone())
        } else if system.contains("chart writer") {
            self.chart_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.chart_reply.clone())
        } else {
            panic!("unexpected system prompt: {}", system);
        }
    }
}

struct StubSchema;

#[async_trait]
impl SchemaSource for StubSchema {
    async fn columns(&self, _table: &str) -> Result<Vec<(String, String)>> {
        Ok(vec![
            ("CalendarMonth".to_string(), "text".to_string()),
            ("Value".to_string(), "numeric".to_string()),
            ("UserEmail".to_string(), "text".to_string()),
        ])
    }

    async fn sample_rows(&self, _table: &str, _limit: usize) -> Result<ResultSet> {
        let mut rows = ResultSet::new(vec!["CalendarMonth".into(), "Value".into()]);
        rows.push(vec![
            CellValue::Text("January".into()),
            CellValue::Decimal(Decimal::from_str("100.25").unwrap()),
        ]);
        Ok(rows)
    }
}

struct StubStore {
    rows: ResultSet,
    calls: AtomicUsize,
    seen: Mutex<Vec<String>>,
}

impl StubStore {
    fn new(rows: ResultSet) -> Arc<Self> {
        Arc::new(Self {
            rows,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl QueryBackend for StubStore {
    fn current_date_expr(&self) -> &str {
        "CURRENT_DATE"
    }

    async fn run(&self, statement: &str) -> std::result::Result<ResultSet, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(statement.to_string());
        Ok(self.rows.clone())
    }
}

fn test_config() -> Config {
    Config {
        database_url: "postgres://unused".to_string(),
        llm: LlmConfig {
            endpoint: "http://unused".to_string(),
            api_key: "unused".to_string(),
            model: "test".to_string(),
            router: GenerationSettings::default(),
            synthesizer: GenerationSettings::default(),
            summarizer: GenerationSettings::default(),
            chart: GenerationSettings::deterministic(),
        },
        tables: vec![
            TableConfig {
                name: "primary_sales".to_string(),
                description: Some("Sales postings per customer and month".to_string()),
            },
            TableConfig {
                name: "secondary_sales".to_string(),
                description: Some("Dealer-to-customer sales".to_string()),
            },
        ],
        identity_column: "UserEmail".to_string(),
        sample_rows: 3,
        chart_max_attempts: 3,
        chart_op_budget: 100_000,
    }
}

fn january_rows() -> ResultSet {
    let mut rows = ResultSet::new(vec!["CalendarMonth".into(), "Value".into()]);
    for value in ["100.25", "220.00", "75.50"] {
        rows.push(vec![
            CellValue::Text("January".into()),
            CellValue::Decimal(Decimal::from_str(value).unwrap()),
        ]);
    }
    rows
}

#[tokio::test]
async fn scenario_a_full_answer_with_chart() {
    let llm = Arc::new(StageLlm {
        router_reply: "primary_sales".to_string(),
        synth_reply: "```sql\nSELECT CalendarMonth, Value FROM primary_sales \
                      WHERE CalendarMonth = 'January' AND UserEmail = 'u@example.com'\n```"
            .to_string(),
        summary_reply: "Sales in January totalled 395.75 across 3 postings.".to_string(),
        chart_reply: "```rhai\nlet m = [\"Jan\"]; let v = [395.75]; bar(m, v);\n```".to_string(),
        ..Default::default()
    });
    let store = StubStore::new(january_rows());
    let pipeline = Pipeline::new(&test_config(), llm.clone(), Arc::new(StubSchema), store.clone());

    let answer = pipeline
        .answer("show me sales for January", "u@example.com")
        .await
        .unwrap();

    // Chart is delivered ahead of the text.
    assert!(answer.chart.is_some());
    assert!(!answer.chart.as_ref().unwrap().base64.is_empty());

    // The table lists the 3 raw rows and the summary mentions January.
    let table_rows = answer
        .text
        .lines()
        .filter(|l| l.contains("| January |"))
        .count();
    assert_eq!(table_rows, 3);
    assert!(answer.text.contains("**Summary**"));
    assert!(answer.text.contains("January"));

    // The executed statement carried the month filter and the user identity.
    let statements = store.seen.lock().unwrap();
    assert!(statements[0].contains("CalendarMonth = 'January'"));
    assert!(statements[0].contains("UserEmail = 'u@example.com'"));

    // Both post-processing branches ran exactly once.
    assert_eq!(llm.summary_calls.load(Ordering::SeqCst), 1);
    assert_eq!(llm.chart_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn scenario_c_nothing_routed_short_circuits_everything() {
    let llm = Arc::new(StageLlm {
        router_reply: "none of the tables are relevant".to_string(),
        ..Default::default()
    });
    let store = StubStore::new(january_rows());
    let pipeline = Pipeline::new(&test_config(), llm.clone(), Arc::new(StubSchema), store.clone());

    let answer = pipeline.answer("hello there", "u@example.com").await.unwrap();

    assert_eq!(answer.text, NO_RELEVANT_DATA_REPLY);
    assert!(answer.chart.is_none());
    assert_eq!(llm.router_calls.load(Ordering::SeqCst), 1);
    assert_eq!(llm.synth_calls.load(Ordering::SeqCst), 0);
    assert_eq!(llm.summary_calls.load(Ordering::SeqCst), 0);
    assert_eq!(llm.chart_calls.load(Ordering::SeqCst), 0);
    assert_eq!(store.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn no_query_synthesized_yields_not_understood() {
    let llm = Arc::new(StageLlm {
        router_reply: "primary_sales".to_string(),
        synth_reply: "Could you clarify which period you mean?".to_string(),
        ..Default::default()
    });
    let store = StubStore::new(january_rows());
    let pipeline = Pipeline::new(&test_config(), llm.clone(), Arc::new(StubSchema), store.clone());

    let answer = pipeline
        .answer("numbers please", "u@example.com")
        .await
        .unwrap();

    assert_eq!(answer.text, NOT_UNDERSTOOD_REPLY);
    assert_eq!(store.calls.load(Ordering::SeqCst), 0);
    assert_eq!(llm.summary_calls.load(Ordering::SeqCst), 0);
    assert_eq!(llm.chart_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn empty_result_set_yields_no_results_reply() {
    let llm = Arc::new(StageLlm {
        router_reply: "primary_sales".to_string(),
        synth_reply: "```sql\nSELECT Value FROM primary_sales \
                      WHERE UserEmail = 'u@example.com'\n```"
            .to_string(),
        ..Default::default()
    });
    let store = StubStore::new(ResultSet::empty());
    let pipeline = Pipeline::new(&test_config(), llm.clone(), Arc::new(StubSchema), store.clone());

    let answer = pipeline
        .answer("show me sales", "u@example.com")
        .await
        .unwrap();

    assert_eq!(answer.text, NO_RESULTS_REPLY);
    assert_eq!(store.calls.load(Ordering::SeqCst), 1);
    assert_eq!(llm.summary_calls.load(Ordering::SeqCst), 0);
    assert_eq!(llm.chart_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn chart_exhaustion_still_delivers_the_text_answer() {
    let llm = Arc::new(StageLlm {
        router_reply: "primary_sales".to_string(),
        synth_reply: "```sql\nSELECT Value FROM primary_sales \
                      WHERE UserEmail = 'u@example.com'\n```"
            .to_string(),
        summary_reply: "Here are your numbers.".to_string(),
        // References a name it never defines; retryable on every attempt.
        chart_reply: "```rhai\nlet v = [1.0, 2.0, 3.0]; bar(months, v);\n```".to_string(),
        ..Default::default()
    });
    let store = StubStore::new(january_rows());
    let pipeline = Pipeline::new(&test_config(), llm.clone(), Arc::new(StubSchema), store);

    let answer = pipeline
        .answer("show me sales", "u@example.com")
        .await
        .unwrap();

    assert!(answer.chart.is_none());
    assert!(answer.text.contains("Here are your numbers."));
    assert_eq!(llm.chart_calls.load(Ordering::SeqCst), 3);
}
