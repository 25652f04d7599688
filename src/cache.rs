use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use tracing::warn;

use crate::error::AppError;
use crate::models::{default_book, Book, Transaction};

const KEY_TRANSACTIONS: &str = "petty_cash_transactions";
const KEY_BOOKS: &str = "petty_cash_books";
const KEY_CURRENT_BOOK: &str = "petty_cash_current_book_id";

pub fn resolve_app_dir() -> Result<PathBuf, AppError> {
  let base = dirs_next::data_local_dir()
    .ok_or_else(|| AppError::new("CONFIG", "Local data directory not found"))?;
  Ok(base.join("Cashbook"))
}

/// Whole-collection snapshot store over a SQLite key/value table. Reads fall
/// back to empty collections and writes are logged and swallowed: local
/// persistence is best effort and never fatal to the caller.
pub struct LocalCache {
  conn: Mutex<Connection>,
}

impl LocalCache {
  pub fn open(app_dir: &Path) -> Result<Self, AppError> {
    fs::create_dir_all(app_dir)?;
    Self::init(Connection::open(app_dir.join("cashbook.sqlite"))?)
  }

  pub fn open_in_memory() -> Result<Self, AppError> {
    Self::init(Connection::open_in_memory()?)
  }

  fn init(conn: Connection) -> Result<Self, AppError> {
    conn.execute_batch("PRAGMA foreign_keys = ON; PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL;")?;
    conn.busy_timeout(Duration::from_secs(5))?;
    conn.execute_batch("CREATE TABLE IF NOT EXISTS cache (key TEXT PRIMARY KEY, value TEXT NOT NULL)")?;
    Ok(Self { conn: Mutex::new(conn) })
  }

  fn read_value(&self, key: &str) -> Result<Option<String>, AppError> {
    let conn = self.conn.lock()?;
    let value = conn
      .query_row("SELECT value FROM cache WHERE key = ?1", params![key], |row| row.get(0))
      .optional()?;
    Ok(value)
  }

  fn write_value(&self, key: &str, value: &str) -> Result<(), AppError> {
    let conn = self.conn.lock()?;
    conn.execute(
      "INSERT OR REPLACE INTO cache (key, value) VALUES (?1, ?2)",
      params![key, value],
    )?;
    Ok(())
  }

  fn persist<T: serde::Serialize>(&self, key: &str, value: &T) {
    match serde_json::to_string(value) {
      Ok(raw) => {
        if let Err(err) = self.write_value(key, &raw) {
          warn!("Failed to persist {key}: {err}");
        }
      }
      Err(err) => warn!("Failed to serialize {key}: {err}"),
    }
  }

  /// Loads the transaction snapshot, applying the one-time migration of legacy
  /// records that carried a single `attachment` field. A migrated snapshot is
  /// written back so the legacy form disappears after the first load.
  pub fn load_transactions(&self) -> Vec<Transaction> {
    let raw = match self.read_value(KEY_TRANSACTIONS) {
      Ok(Some(raw)) => raw,
      Ok(None) => return Vec::new(),
      Err(err) => {
        warn!("Failed to read transaction cache: {err}");
        return Vec::new();
      }
    };
    let records: Vec<Value> = match serde_json::from_str(&raw) {
      Ok(records) => records,
      Err(err) => {
        warn!("Transaction cache is not valid JSON: {err}");
        return Vec::new();
      }
    };
    let (records, migrated) = migrate_legacy_attachments(records);
    let transactions: Vec<Transaction> = records
      .into_iter()
      .filter_map(|record| match serde_json::from_value(record) {
        Ok(tx) => Some(tx),
        Err(err) => {
          warn!("Skipping malformed cached transaction: {err}");
          None
        }
      })
      .collect();
    if migrated {
      self.save_transactions(&transactions);
    }
    transactions
  }

  pub fn save_transactions(&self, transactions: &[Transaction]) {
    self.persist(KEY_TRANSACTIONS, &transactions);
  }

  /// Guaranteed non-empty on a readable store: an empty collection synthesizes
  /// and persists the default book.
  pub fn load_books(&self) -> Vec<Book> {
    let books: Vec<Book> = match self.read_value(KEY_BOOKS) {
      Ok(Some(raw)) => match serde_json::from_str(&raw) {
        Ok(books) => books,
        Err(err) => {
          warn!("Book cache is not valid JSON: {err}");
          return Vec::new();
        }
      },
      Ok(None) => Vec::new(),
      Err(err) => {
        warn!("Failed to read book cache: {err}");
        return Vec::new();
      }
    };
    if books.is_empty() {
      let fallback = vec![default_book()];
      self.save_books(&fallback);
      return fallback;
    }
    books
  }

  pub fn save_books(&self, books: &[Book]) {
    self.persist(KEY_BOOKS, &books);
  }

  pub fn load_selected_book_id(&self) -> Option<String> {
    match self.read_value(KEY_CURRENT_BOOK) {
      Ok(value) => value,
      Err(err) => {
        warn!("Failed to read selected book id: {err}");
        None
      }
    }
  }

  pub fn save_selected_book_id(&self, id: &str) {
    if let Err(err) = self.write_value(KEY_CURRENT_BOOK, id) {
      warn!("Failed to persist selected book id: {err}");
    }
  }

  /// Logout wipe. The next `load_books` resynthesizes the default book.
  pub fn clear(&self) {
    match self.conn.lock() {
      Ok(conn) => {
        if let Err(err) = conn.execute("DELETE FROM cache", []) {
          warn!("Failed to clear cache: {err}");
        }
      }
      Err(_) => warn!("Cache lock poisoned during clear"),
    }
  }
}

fn migrate_legacy_attachments(mut records: Vec<Value>) -> (Vec<Value>, bool) {
  let mut migrated = false;
  for record in records.iter_mut() {
    let Some(fields) = record.as_object_mut() else { continue };
    let Some(legacy) = fields.remove("attachment") else { continue };
    migrated = true;
    let has_list = fields
      .get("attachments")
      .and_then(Value::as_array)
      .map(|list| !list.is_empty())
      .unwrap_or(false);
    if !has_list && !legacy.is_null() {
      fields.insert("attachments".to_string(), Value::Array(vec![legacy]));
    }
  }
  (records, migrated)
}
