use chrono::Utc;
use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};

pub const DEFAULT_BOOK_ID: &str = "default-book";
pub const DEFAULT_BOOK_NAME: &str = "Main Cashbook";

/// Suggested categories. The data model keeps `category` as free text; this list
/// only feeds the CLI hints and the AI prompt.
pub const CATEGORIES: [&str; 10] = [
  "Office Supplies",
  "Food & Beverages",
  "Transport",
  "Maintenance",
  "Entertainment",
  "Utilities",
  "Miscellaneous",
  "Sales",
  "Refund",
  "Top-up",
];

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
  Income,
  Expense,
}

impl TransactionType {
  pub fn as_str(&self) -> &'static str {
    match self {
      TransactionType::Income => "INCOME",
      TransactionType::Expense => "EXPENSE",
    }
  }
}

/// A named ledger partition grouping a subset of transactions.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Book {
  pub id: String,
  pub name: String,
  #[serde(rename = "createdAt")]
  pub created_at: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Transaction {
  pub id: String,
  #[serde(rename = "bookId")]
  pub book_id: String,
  pub date: String,
  #[serde(default)]
  pub description: String,
  pub amount: f64,
  #[serde(rename = "type")]
  pub tx_type: TransactionType,
  pub category: String,
  /// Inline data URIs or object-storage URLs.
  #[serde(default)]
  pub attachments: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct SpendingSummary {
  #[serde(rename = "totalIncome")]
  pub total_income: f64,
  #[serde(rename = "totalExpense")]
  pub total_expense: f64,
  pub balance: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CategoryTotal {
  pub category: String,
  pub total: f64,
}

pub fn default_book() -> Book {
  Book {
    id: DEFAULT_BOOK_ID.to_string(),
    name: DEFAULT_BOOK_NAME.to_string(),
    created_at: Utc::now().to_rfc3339(),
  }
}

/// Client-generated id, reused verbatim as the remote primary key so no
/// remapping step is ever needed.
pub fn new_entity_id() -> String {
  format!("{}{}", base36(Utc::now().timestamp_millis() as u64), random_suffix(7))
}

pub(crate) fn random_suffix(length: usize) -> String {
  rand::thread_rng()
    .sample_iter(&Alphanumeric)
    .take(length)
    .map(char::from)
    .collect::<String>()
    .to_lowercase()
}

fn base36(mut value: u64) -> String {
  const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
  if value == 0 {
    return "0".to_string();
  }
  let mut out = Vec::new();
  while value > 0 {
    out.push(DIGITS[(value % 36) as usize]);
    value /= 36;
  }
  out.reverse();
  String::from_utf8_lossy(&out).into_owned()
}
