use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::error::AppError;
use crate::models::{random_suffix, Book, Transaction, TransactionType};
use crate::session::Identity;

pub const ATTACHMENT_BUCKET: &str = "receipts";
const STORAGE_MARKER: &str = "/storage/v1/object/";
const USER_AGENT: &str = concat!("cashbook/", env!("CARGO_PKG_VERSION"));

/// Remote store behind the sync layer. All operations are scoped by the
/// caller's identity; implementations never see unauthenticated traffic.
pub trait RemoteLedger: Send + Sync {
  fn fetch_books(&self, identity: &Identity) -> Result<Vec<Book>, AppError>;
  fn upsert_book(&self, identity: &Identity, book: &Book) -> Result<(), AppError>;
  fn delete_book(&self, identity: &Identity, book_id: &str) -> Result<(), AppError>;
  fn fetch_transactions(&self, identity: &Identity, book_id: &str) -> Result<Vec<Transaction>, AppError>;
  fn upsert_transaction(&self, identity: &Identity, tx: &Transaction) -> Result<(), AppError>;
  fn delete_transaction(&self, identity: &Identity, tx_id: &str) -> Result<(), AppError>;
  fn upload_attachment(&self, identity: &Identity, image: &[u8]) -> Result<String, AppError>;
  fn delete_attachment(&self, identity: &Identity, url: &str) -> Result<(), AppError>;
}

/// Object-storage URLs need a remote delete on removal; inline data URIs die
/// with the record.
pub fn is_remote_attachment(reference: &str) -> bool {
  reference.contains(STORAGE_MARKER)
}

pub fn encode_inline_attachment(image: &[u8]) -> String {
  use base64::Engine;
  format!(
    "data:image/jpeg;base64,{}",
    base64::engine::general_purpose::STANDARD.encode(image)
  )
}

#[derive(Serialize, Deserialize)]
struct BookRow {
  id: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  user_id: Option<String>,
  name: String,
  #[serde(alias = "createdAt")]
  created_at: String,
}

impl BookRow {
  fn from_book(book: &Book, user_id: &str) -> Self {
    Self {
      id: book.id.clone(),
      user_id: Some(user_id.to_string()),
      name: book.name.clone(),
      created_at: book.created_at.clone(),
    }
  }

  fn into_book(self) -> Book {
    Book { id: self.id, name: self.name, created_at: self.created_at }
  }
}

#[derive(Serialize, Deserialize)]
struct TransactionRow {
  id: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  user_id: Option<String>,
  book_id: String,
  date: String,
  description: Option<String>,
  #[serde(deserialize_with = "decimal_from_wire")]
  amount: f64,
  #[serde(rename = "type")]
  tx_type: TransactionType,
  category: Option<String>,
  #[serde(default, deserialize_with = "null_to_vec")]
  attachments: Vec<String>,
}

impl TransactionRow {
  fn from_transaction(tx: &Transaction, user_id: &str) -> Self {
    Self {
      id: tx.id.clone(),
      user_id: Some(user_id.to_string()),
      book_id: tx.book_id.clone(),
      date: tx.date.clone(),
      description: Some(tx.description.clone()),
      amount: tx.amount,
      tx_type: tx.tx_type,
      category: Some(tx.category.clone()),
      attachments: tx.attachments.clone(),
    }
  }

  fn into_transaction(self) -> Transaction {
    Transaction {
      id: self.id,
      book_id: self.book_id,
      date: self.date,
      description: self.description.unwrap_or_default(),
      amount: self.amount,
      tx_type: self.tx_type,
      category: self.category.unwrap_or_else(|| "Miscellaneous".to_string()),
      attachments: self.attachments,
    }
  }
}

// Postgres numeric columns arrive as JSON numbers or as strings depending on
// the gateway configuration.
fn decimal_from_wire<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
  use serde::de::Error;
  match Value::deserialize(deserializer)? {
    Value::Number(number) => number
      .as_f64()
      .ok_or_else(|| D::Error::custom("amount out of range")),
    Value::String(raw) => raw
      .trim()
      .parse::<f64>()
      .map_err(|err| D::Error::custom(format!("invalid amount: {err}"))),
    other => Err(D::Error::custom(format!("unexpected amount value: {other}"))),
  }
}

fn null_to_vec<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
  Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

/// PostgREST-style store: row tables under `/rest/v1`, attachment objects
/// under `/storage/v1`.
pub struct SupabaseLedger {
  base_url: String,
  api_key: String,
  client: reqwest::blocking::Client,
}

impl SupabaseLedger {
  pub fn new(base_url: &str, api_key: &str) -> Result<Self, AppError> {
    let client = reqwest::blocking::Client::builder()
      .timeout(Duration::from_secs(15))
      .user_agent(USER_AGENT)
      .build()?;
    Ok(Self {
      base_url: base_url.trim_end_matches('/').to_string(),
      api_key: api_key.to_string(),
      client,
    })
  }

  fn table_url(&self, table: &str) -> String {
    format!("{}/rest/v1/{table}", self.base_url)
  }

  fn object_url(&self, path: &str) -> String {
    format!("{}{STORAGE_MARKER}{ATTACHMENT_BUCKET}/{path}", self.base_url)
  }

  fn authorize(
    &self,
    request: reqwest::blocking::RequestBuilder,
    identity: &Identity,
  ) -> reqwest::blocking::RequestBuilder {
    let bearer = identity.access_token.as_deref().unwrap_or(&self.api_key);
    request.header("apikey", &self.api_key).bearer_auth(bearer)
  }

  fn check(response: reqwest::blocking::Response) -> Result<reqwest::blocking::Response, AppError> {
    if response.status().is_success() {
      return Ok(response);
    }
    let status = response.status();
    let body = response.text().unwrap_or_default();
    Err(AppError::new(
      "REMOTE",
      format!("Remote request failed with {status}: {body}"),
    ))
  }
}

impl RemoteLedger for SupabaseLedger {
  fn fetch_books(&self, identity: &Identity) -> Result<Vec<Book>, AppError> {
    let request = self
      .client
      .get(self.table_url("books"))
      .query(&[("select", "*")]);
    let rows: Vec<BookRow> = Self::check(self.authorize(request, identity).send()?)?.json()?;
    Ok(rows.into_iter().map(BookRow::into_book).collect())
  }

  fn upsert_book(&self, identity: &Identity, book: &Book) -> Result<(), AppError> {
    let request = self
      .client
      .post(self.table_url("books"))
      .header("Prefer", "resolution=merge-duplicates")
      .json(&BookRow::from_book(book, &identity.user_id));
    Self::check(self.authorize(request, identity).send()?)?;
    Ok(())
  }

  fn delete_book(&self, identity: &Identity, book_id: &str) -> Result<(), AppError> {
    let request = self
      .client
      .delete(self.table_url("books"))
      .query(&[("id", format!("eq.{book_id}"))]);
    Self::check(self.authorize(request, identity).send()?)?;
    Ok(())
  }

  fn fetch_transactions(&self, identity: &Identity, book_id: &str) -> Result<Vec<Transaction>, AppError> {
    let request = self
      .client
      .get(self.table_url("transactions"))
      .query(&[("select", "*".to_string()), ("book_id", format!("eq.{book_id}"))]);
    let rows: Vec<TransactionRow> = Self::check(self.authorize(request, identity).send()?)?.json()?;
    Ok(rows.into_iter().map(TransactionRow::into_transaction).collect())
  }

  fn upsert_transaction(&self, identity: &Identity, tx: &Transaction) -> Result<(), AppError> {
    let request = self
      .client
      .post(self.table_url("transactions"))
      .header("Prefer", "resolution=merge-duplicates")
      .json(&TransactionRow::from_transaction(tx, &identity.user_id));
    Self::check(self.authorize(request, identity).send()?)?;
    Ok(())
  }

  fn delete_transaction(&self, identity: &Identity, tx_id: &str) -> Result<(), AppError> {
    let request = self
      .client
      .delete(self.table_url("transactions"))
      .query(&[("id", format!("eq.{tx_id}"))]);
    Self::check(self.authorize(request, identity).send()?)?;
    Ok(())
  }

  fn upload_attachment(&self, identity: &Identity, image: &[u8]) -> Result<String, AppError> {
    let path = format!(
      "{}/{}-{}.jpeg",
      identity.user_id,
      Utc::now().timestamp_millis(),
      random_suffix(7)
    );
    let request = self
      .client
      .post(self.object_url(&path))
      .header("Content-Type", "image/jpeg")
      .header("Cache-Control", "3600")
      .body(image.to_vec());
    Self::check(self.authorize(request, identity).send()?)?;
    Ok(format!(
      "{}/storage/v1/object/public/{ATTACHMENT_BUCKET}/{path}",
      self.base_url
    ))
  }

  fn delete_attachment(&self, identity: &Identity, url: &str) -> Result<(), AppError> {
    let marker = format!("{ATTACHMENT_BUCKET}/");
    let Some((_, path)) = url.split_once(marker.as_str()) else {
      warn!("Attachment URL has no bucket path, skipping delete: {url}");
      return Ok(());
    };
    let request = self.client.delete(self.object_url(path));
    Self::check(self.authorize(request, identity).send()?)?;
    Ok(())
  }
}
