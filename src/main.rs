use std::fs;
use std::process::exit;
use std::sync::Arc;

use chrono::Utc;
use clap::Parser;
use dotenvy::dotenv;
use tracing_subscriber::EnvFilter;

use cashbook::ai::InsightsClient;
use cashbook::app::App;
use cashbook::cache::{resolve_app_dir, LocalCache};
use cashbook::cli::{pretty_table, BookAction, Cli, Command, TxAction};
use cashbook::config::Config;
use cashbook::error::AppError;
use cashbook::models::{new_entity_id, Book, Transaction};
use cashbook::remote::{RemoteLedger, SupabaseLedger};
use cashbook::session::SessionGate;

fn main() {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();
  dotenv().ok();

  let cli = Cli::parse();
  if let Err(err) = run(cli) {
    eprintln!("{err}");
    exit(1);
  }
}

fn run(cli: Cli) -> Result<(), AppError> {
  let config = Config::from_env();
  let cache = LocalCache::open(&resolve_app_dir()?)?;

  let remote: Option<Arc<dyn RemoteLedger>> = match config.remote_credentials() {
    Some((url, key)) => Some(Arc::new(SupabaseLedger::new(&url, &key)?)),
    None => None,
  };
  let session = SessionGate::new();
  if let Some(identity) = config.identity() {
    session.sign_in(identity);
  }

  let app = App::new(cache, remote, session);
  app.startup()?;
  let insights = InsightsClient::new(config.gemini_api_key.clone())?;

  match cli.command {
    Command::Book { action } => run_book(&app, action)?,
    Command::Tx { action } => run_tx(&app, &insights, action)?,
    Command::Summary => {
      let summary = app.summary()?;
      println!("Income:  {:.2}", summary.total_income);
      println!("Expense: {:.2}", summary.total_expense);
      println!("Balance: {:.2}", summary.balance);
    }
    Command::Breakdown => {
      let rows = app
        .breakdown()?
        .into_iter()
        .map(|entry| vec![entry.category, format!("{:.2}", entry.total)])
        .collect();
      println!("{}", pretty_table(&["Category", "Total"], rows));
    }
    Command::Report => {
      let report = insights.generate_report(&app.current_transactions()?);
      println!("{report}");
    }
    Command::Suggest { description } => {
      let category = insights
        .suggest_category(&description)
        .unwrap_or_else(|| "Miscellaneous".to_string());
      println!("{category}");
    }
    Command::Sync => {
      let snapshot = app.snapshot()?;
      if let Some(book_id) = &snapshot.current_book_id {
        app.sync_transactions(book_id)?;
      }
      let snapshot = app.snapshot()?;
      println!(
        "{} book(s), {} transaction(s) cached",
        snapshot.books.len(),
        snapshot.transactions.len()
      );
    }
    Command::Logout => {
      app.logout()?;
      println!("Signed out, local cache cleared");
    }
  }

  app.flush_remote()
}

fn run_book(app: &App, action: BookAction) -> Result<(), AppError> {
  match action {
    BookAction::List => {
      let snapshot = app.snapshot()?;
      let current = snapshot.current_book_id.clone().unwrap_or_default();
      let rows = snapshot
        .books
        .into_iter()
        .map(|book| {
          let marker = if book.id == current { "*" } else { "" };
          vec![marker.to_string(), book.id, book.name, book.created_at]
        })
        .collect();
      println!("{}", pretty_table(&["", "Id", "Name", "Created"], rows));
    }
    BookAction::Create { name } => {
      let book = Book {
        id: new_entity_id(),
        name,
        created_at: Utc::now().to_rfc3339(),
      };
      let id = book.id.clone();
      app.save_book(book)?;
      println!("Created book {id}");
    }
    BookAction::Rename { id, name } => {
      let snapshot = app.snapshot()?;
      let Some(book) = snapshot.books.into_iter().find(|book| book.id == id) else {
        return Err(AppError::new("NOT_FOUND", format!("Book {id} not found")));
      };
      app.save_book(Book { name, ..book })?;
      println!("Renamed book {id}");
    }
    BookAction::Delete { id } => {
      app.delete_book(&id)?;
      println!("Deleted book {id}");
    }
    BookAction::Use { id } => {
      app.select_book(&id)?;
      println!("Now using book {id}");
    }
  }
  Ok(())
}

fn run_tx(app: &App, insights: &InsightsClient, action: TxAction) -> Result<(), AppError> {
  match action {
    TxAction::List => {
      let rows = app
        .current_transactions()?
        .into_iter()
        .map(|tx| {
          vec![
            tx.id,
            tx.date,
            tx.tx_type.as_str().to_string(),
            tx.category,
            format!("{:.2}", tx.amount),
            tx.description,
            tx.attachments.len().to_string(),
          ]
        })
        .collect();
      println!(
        "{}",
        pretty_table(&["Id", "Date", "Type", "Category", "Amount", "Description", "Files"], rows)
      );
    }
    TxAction::Add { amount, kind, category, description, date, attachments } => {
      let book_id = app
        .snapshot()?
        .current_book_id
        .ok_or_else(|| AppError::new("VALIDATION", "No book selected"))?;
      let category = category
        .or_else(|| insights.suggest_category(&description))
        .unwrap_or_else(|| "Miscellaneous".to_string());
      let mut stored = Vec::new();
      for path in &attachments {
        let image = fs::read(path)?;
        stored.push(app.store_attachment(&image)?);
      }
      let tx = Transaction {
        id: new_entity_id(),
        book_id,
        date: date.unwrap_or_else(|| Utc::now().to_rfc3339()),
        description,
        amount,
        tx_type: kind.into(),
        category,
        attachments: stored,
      };
      let id = tx.id.clone();
      app.save_transaction(tx)?;
      println!("Added transaction {id}");
    }
    TxAction::Edit { id, amount, kind, category, description, date } => {
      let snapshot = app.snapshot()?;
      let Some(mut tx) = snapshot.transactions.into_iter().find(|tx| tx.id == id) else {
        return Err(AppError::new("NOT_FOUND", format!("Transaction {id} not found")));
      };
      if let Some(amount) = amount {
        tx.amount = amount;
      }
      if let Some(kind) = kind {
        tx.tx_type = kind.into();
      }
      if let Some(category) = category {
        tx.category = category;
      }
      if let Some(description) = description {
        tx.description = description;
      }
      if let Some(date) = date {
        tx.date = date;
      }
      app.save_transaction(tx)?;
      println!("Updated transaction {id}");
    }
    TxAction::Delete { id } => {
      app.delete_transaction(&id)?;
      println!("Deleted transaction {id}");
    }
  }
  Ok(())
}
