use std::time::Duration;

use serde_json::{json, Value};
use tracing::warn;

use crate::error::AppError;
use crate::models::{Transaction, CATEGORIES};

const MODEL_ENDPOINT: &str =
  "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:generateContent";

/// Gemini-backed helpers for category suggestion and spending reports. Works
/// without a key; every call then degrades to its fallback output.
pub struct InsightsClient {
  api_key: Option<String>,
  client: reqwest::blocking::Client,
}

impl InsightsClient {
  pub fn new(api_key: Option<String>) -> Result<Self, AppError> {
    let client = reqwest::blocking::Client::builder()
      .timeout(Duration::from_secs(60))
      .build()?;
    Ok(Self { api_key, client })
  }

  /// Best-effort category pick for a description. Any failure falls back to
  /// `Miscellaneous` so data entry never blocks on the model.
  pub fn suggest_category(&self, description: &str) -> Option<String> {
    if self.api_key.is_none() || description.trim().is_empty() {
      return None;
    }
    let list = CATEGORIES.join(", ");
    let body = json!({
      "contents": [{
        "parts": [{
          "text": format!(
            "Suggest the most fitting category for this petty cash transaction description: \"{description}\". Choose strictly from this list: {list}."
          )
        }]
      }],
      "generationConfig": {
        "responseMimeType": "application/json",
        "responseSchema": {
          "type": "OBJECT",
          "properties": { "category": { "type": "STRING" } }
        }
      }
    });
    match self.generate(&body) {
      Ok(Some(text)) => serde_json::from_str::<Value>(&text)
        .ok()
        .and_then(|parsed| parsed["category"].as_str().map(str::to_string))
        .filter(|category| !category.is_empty()),
      Ok(None) => None,
      Err(err) => {
        warn!("Category suggestion failed: {err}");
        None
      }
    }
  }

  pub fn generate_report(&self, transactions: &[Transaction]) -> String {
    if self.api_key.is_none() {
      return "Unable to generate report. API key missing.".to_string();
    }
    let history = transactions
      .iter()
      .map(|tx| {
        let day = tx.date.split('T').next().unwrap_or(&tx.date);
        format!(
          "{day}: {} - {} - ${} ({})",
          tx.tx_type.as_str(),
          tx.category,
          tx.amount,
          tx.description
        )
      })
      .collect::<Vec<_>>()
      .join("\n");
    let body = json!({
      "contents": [{
        "parts": [{
          "text": format!(
            "Analyze the following petty cash transaction history and provide a concise financial summary. Point out top spending categories and any unusual activity. Keep it short and professional.\n\n{history}"
          )
        }]
      }]
    });
    match self.generate(&body) {
      Ok(Some(text)) => text,
      Ok(None) => "No analysis generated.".to_string(),
      Err(err) => {
        warn!("Report generation failed: {err}");
        "Failed to generate report due to an error.".to_string()
      }
    }
  }

  fn generate(&self, body: &Value) -> Result<Option<String>, AppError> {
    let Some(key) = self.api_key.as_deref() else {
      return Ok(None);
    };
    let response = self
      .client
      .post(format!("{MODEL_ENDPOINT}?key={key}"))
      .json(body)
      .send()?;
    if !response.status().is_success() {
      let status = response.status();
      return Err(AppError::new("AI", format!("Model request failed with {status}")));
    }
    let payload: Value = response.json()?;
    let text = payload["candidates"][0]["content"]["parts"][0]["text"]
      .as_str()
      .map(str::to_string);
    Ok(text)
  }
}
