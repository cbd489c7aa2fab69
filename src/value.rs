//! Result values and transport representation
//!
//! Every cell value the pipeline touches must round-trip through a textual
//! transport form without loss: decimals keep their exact text, dates and
//! timestamps use ISO-8601, binary values travel base64-encoded.

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A single cell value in a result row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t", content = "v")]
pub enum CellValue {
    #[serde(rename = "null")]
    Null,
    #[serde(rename = "text")]
    Text(String),
    #[serde(rename = "int")]
    Int(i64),
    #[serde(rename = "dec")]
    Decimal(Decimal),
    #[serde(rename = "date")]
    Date(NaiveDate),
    #[serde(rename = "ts")]
    Timestamp(NaiveDateTime),
    #[serde(rename = "bin", with = "base64_bytes")]
    Bytes(Vec<u8>),
}

impl CellValue {
    /// Plain JSON value used when rows are embedded in a model prompt.
    /// Decimals stay exact strings so no precision is lost on the way out.
    pub fn to_prompt_value(&self) -> serde_json::Value {
        match self {
            CellValue::Null => serde_json::Value::Null,
            CellValue::Text(s) => serde_json::Value::String(s.clone()),
            CellValue::Int(i) => serde_json::Value::Number((*i).into()),
            CellValue::Decimal(d) => serde_json::Value::String(d.to_string()),
            CellValue::Date(d) => serde_json::Value::String(d.format("%Y-%m-%d").to_string()),
            CellValue::Timestamp(ts) => {
                serde_json::Value::String(ts.format("%Y-%m-%d %H:%M:%S").to_string())
            }
            CellValue::Bytes(b) => serde_json::Value::String(base64_bytes::encode(b)),
        }
    }

    /// Display text for Markdown table cells.
    pub fn display_text(&self) -> String {
        match self {
            CellValue::Null => String::new(),
            CellValue::Text(s) => s.clone(),
            other => match other.to_prompt_value() {
                serde_json::Value::String(s) => s,
                v => v.to_string(),
            },
        }
    }
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn encode(bytes: &[u8]) -> String {
        STANDARD.encode(bytes)
    }

    pub fn serialize<S: Serializer>(bytes: &Vec<u8>, ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(de)?;
        STANDARD
            .decode(text.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

/// One result row, values aligned with the owning [`ResultSet`]'s columns.
pub type Row = Vec<CellValue>;

/// Ordered rows with a stable column order. An empty set is a valid result,
/// distinct from an execution failure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl ResultSet {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn push(&mut self, row: Row) {
        debug_assert_eq!(row.len(), self.columns.len());
        self.rows.push(row);
    }

    /// Rows as an array of plain JSON objects for model prompts.
    pub fn to_prompt_json(&self) -> serde_json::Value {
        let rows: Vec<serde_json::Value> = self
            .rows
            .iter()
            .map(|row| {
                let obj: serde_json::Map<String, serde_json::Value> = self
                    .columns
                    .iter()
                    .zip(row.iter())
                    .map(|(name, value)| (name.clone(), value.to_prompt_value()))
                    .collect();
                serde_json::Value::Object(obj)
            })
            .collect();
        serde_json::Value::Array(rows)
    }

    /// Render the raw rows as a Markdown table.
    pub fn to_markdown(&self) -> String {
        if self.rows.is_empty() {
            return "No results found.".to_string();
        }

        let header = format!("| {} |", self.columns.join(" | "));
        let separator = format!(
            "| {} |",
            self.columns
                .iter()
                .map(|_| "---")
                .collect::<Vec<_>>()
                .join(" | ")
        );
        let mut lines = vec![header, separator];
        for row in &self.rows {
            let cells: Vec<String> = row.iter().map(CellValue::display_text).collect();
            lines.push(format!("| {} |", cells.join(" | ")));
        }
        lines.join("\n")
    }
}
