use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};

use crate::models::TransactionType;

#[derive(Parser)]
#[command(name = "cashbook", version, about = "Petty cash ledger with local cache and cloud sync")]
pub struct Cli {
  #[command(subcommand)]
  pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
  /// Manage cash books
  Book {
    #[command(subcommand)]
    action: BookAction,
  },
  /// Manage transactions in the current book
  Tx {
    #[command(subcommand)]
    action: TxAction,
  },
  /// Income, expense and balance of the current book
  Summary,
  /// Expense totals per category, highest first
  Breakdown,
  /// AI spending report for the current book
  Report,
  /// AI category suggestion for a description
  Suggest { description: String },
  /// Pull the current book from the remote store
  Sync,
  /// Sign out and wipe the local cache
  Logout,
}

#[derive(Subcommand)]
pub enum BookAction {
  List,
  Create { name: String },
  Rename { id: String, name: String },
  Delete { id: String },
  /// Switch the current book
  Use { id: String },
}

#[derive(Subcommand)]
pub enum TxAction {
  List,
  Add {
    #[arg(long)]
    amount: f64,
    #[arg(long = "type", value_enum, default_value = "expense")]
    kind: TxKind,
    #[arg(long)]
    category: Option<String>,
    #[arg(long, default_value = "")]
    description: String,
    /// RFC 3339 timestamp, defaults to now
    #[arg(long)]
    date: Option<String>,
    /// Image file to attach, repeatable
    #[arg(long = "attach")]
    attachments: Vec<PathBuf>,
  },
  Edit {
    id: String,
    #[arg(long)]
    amount: Option<f64>,
    #[arg(long = "type", value_enum)]
    kind: Option<TxKind>,
    #[arg(long)]
    category: Option<String>,
    #[arg(long)]
    description: Option<String>,
    #[arg(long)]
    date: Option<String>,
  },
  Delete { id: String },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum TxKind {
  Income,
  Expense,
}

impl From<TxKind> for TransactionType {
  fn from(kind: TxKind) -> Self {
    match kind {
      TxKind::Income => TransactionType::Income,
      TxKind::Expense => TransactionType::Expense,
    }
  }
}

pub fn pretty_table(headers: &[&str], rows: Vec<Vec<String>>) -> Table {
  let mut table = Table::new();
  table
    .load_preset(UTF8_FULL)
    .set_content_arrangement(ContentArrangement::Dynamic)
    .set_header(headers.iter().map(|h| Cell::new(h)).collect::<Vec<_>>());
  for row in rows {
    table.add_row(row);
  }
  table
}
