use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use tracing::{info, warn};

use crate::cache::LocalCache;
use crate::error::AppError;
use crate::merge;
use crate::models::{Book, CategoryTotal, SpendingSummary, Transaction};
use crate::remote::{encode_inline_attachment, is_remote_attachment, RemoteLedger};
use crate::session::{Identity, SessionGate};
use crate::summary;

#[derive(Debug, Clone, Default)]
pub struct AppData {
  pub books: Vec<Book>,
  pub transactions: Vec<Transaction>,
  pub current_book_id: Option<String>,
}

/// Application core. Every mutation lands in memory and the cache first; the
/// matching remote write runs on a detached thread and failures there only log.
/// Reads never touch the network.
pub struct App {
  cache: LocalCache,
  remote: Option<Arc<dyn RemoteLedger>>,
  session: SessionGate,
  state: Mutex<AppData>,
  pending: Mutex<Vec<JoinHandle<()>>>,
}

impl App {
  pub fn new(cache: LocalCache, remote: Option<Arc<dyn RemoteLedger>>, session: SessionGate) -> Self {
    Self {
      cache,
      remote,
      session,
      state: Mutex::new(AppData::default()),
      pending: Mutex::new(Vec::new()),
    }
  }

  pub fn session(&self) -> &SessionGate {
    &self.session
  }

  /// Load the cached state, then reconcile with the remote when signed in.
  /// The cached snapshot stays authoritative whenever the remote is
  /// unreachable.
  pub fn startup(&self) -> Result<(), AppError> {
    self.load_local()?;
    self.sync_books()?;
    let current = self.state.lock()?.current_book_id.clone();
    if let Some(book_id) = current {
      self.sync_transactions(&book_id)?;
    }
    Ok(())
  }

  fn load_local(&self) -> Result<(), AppError> {
    let books = self.cache.load_books();
    let transactions = self.cache.load_transactions();
    let saved = self.cache.load_selected_book_id();
    let current_book_id = saved
      .filter(|id| books.iter().any(|book| &book.id == id))
      .or_else(|| books.first().map(|book| book.id.clone()));
    let mut state = self.state.lock()?;
    *state = AppData { books, transactions, current_book_id };
    Ok(())
  }

  fn remote_identity(&self) -> Option<(Arc<dyn RemoteLedger>, Identity)> {
    let remote = self.remote.clone()?;
    let identity = self.session.current()?;
    Some((remote, identity))
  }

  /// Remote book list wins when it has content. An empty remote account is
  /// seeded with the local books instead, so a fresh sign-in keeps its data.
  fn sync_books(&self) -> Result<(), AppError> {
    if let Some((remote, identity)) = self.remote_identity() {
      match remote.fetch_books(&identity) {
        Ok(fetched) if !fetched.is_empty() => {
          let mut state = self.state.lock()?;
          state.books = fetched;
          self.cache.save_books(&state.books);
        }
        Ok(_) => {
          let books = self.state.lock()?.books.clone();
          info!("Remote account has no books, uploading {} local book(s)", books.len());
          for book in &books {
            if let Err(err) = remote.upsert_book(&identity, book) {
              warn!("Failed to upload book {}: {err}", book.id);
            }
          }
        }
        Err(err) => warn!("Book sync failed, keeping cached books: {err}"),
      }
    }
    self.revalidate_selection()
  }

  fn revalidate_selection(&self) -> Result<(), AppError> {
    let mut state = self.state.lock()?;
    let valid = state
      .current_book_id
      .as_ref()
      .map(|id| state.books.iter().any(|book| &book.id == id))
      .unwrap_or(false);
    if !valid {
      state.current_book_id = state.books.first().map(|book| book.id.clone());
      if let Some(id) = &state.current_book_id {
        self.cache.save_selected_book_id(id);
      }
    }
    Ok(())
  }

  /// Fetch-then-replace for one book. Entries of other books are untouched.
  pub fn sync_transactions(&self, book_id: &str) -> Result<(), AppError> {
    let Some((remote, identity)) = self.remote_identity() else {
      return Ok(());
    };
    match remote.fetch_transactions(&identity, book_id) {
      Ok(fetched) => {
        let mut state = self.state.lock()?;
        let local = std::mem::take(&mut state.transactions);
        state.transactions = merge::replace_book_transactions(local, fetched, book_id);
        self.cache.save_transactions(&state.transactions);
      }
      Err(err) => warn!("Transaction sync failed for book {book_id}: {err}"),
    }
    Ok(())
  }

  pub fn select_book(&self, book_id: &str) -> Result<(), AppError> {
    {
      let mut state = self.state.lock()?;
      if !state.books.iter().any(|book| book.id == book_id) {
        return Err(AppError::new("NOT_FOUND", format!("Book {book_id} not found")));
      }
      state.current_book_id = Some(book_id.to_string());
      self.cache.save_selected_book_id(book_id);
    }
    self.sync_transactions(book_id)
  }

  pub fn save_transaction(&self, tx: Transaction) -> Result<(), AppError> {
    if !tx.amount.is_finite() || tx.amount < 0.0 {
      return Err(AppError::new("VALIDATION", "Amount must be a non-negative number"));
    }
    {
      let state = self.state.lock()?;
      if !state.books.iter().any(|book| book.id == tx.book_id) {
        return Err(AppError::new("VALIDATION", format!("Unknown book {}", tx.book_id)));
      }
    }
    let mut state = self.state.lock()?;
    let local = std::mem::take(&mut state.transactions);
    state.transactions = merge::upsert_transaction(local, tx.clone());
    self.cache.save_transactions(&state.transactions);
    drop(state);

    if let Some((remote, identity)) = self.remote_identity() {
      self.spawn_remote(move || {
        if let Err(err) = remote.upsert_transaction(&identity, &tx) {
          warn!("Failed to push transaction {}: {err}", tx.id);
        }
      })?;
    }
    Ok(())
  }

  pub fn delete_transaction(&self, tx_id: &str) -> Result<(), AppError> {
    let removed = {
      let mut state = self.state.lock()?;
      let Some(tx) = state.transactions.iter().find(|tx| tx.id == tx_id).cloned() else {
        return Err(AppError::new("NOT_FOUND", format!("Transaction {tx_id} not found")));
      };
      let local = std::mem::take(&mut state.transactions);
      state.transactions = merge::remove_transaction(local, tx_id);
      self.cache.save_transactions(&state.transactions);
      tx
    };

    if let Some((remote, identity)) = self.remote_identity() {
      self.spawn_remote(move || {
        for reference in removed.attachments.iter().filter(|r| is_remote_attachment(r)) {
          if let Err(err) = remote.delete_attachment(&identity, reference) {
            warn!("Failed to delete attachment for {}: {err}", removed.id);
          }
        }
        if let Err(err) = remote.delete_transaction(&identity, &removed.id) {
          warn!("Failed to delete transaction {}: {err}", removed.id);
        }
      })?;
    }
    Ok(())
  }

  /// Create or rename. A newly created book becomes the current selection;
  /// its transactions start empty and are pulled on the next explicit sync.
  pub fn save_book(&self, book: Book) -> Result<(), AppError> {
    if book.name.trim().is_empty() {
      return Err(AppError::new("VALIDATION", "Book name must not be empty"));
    }
    {
      let mut state = self.state.lock()?;
      let is_new = !state.books.iter().any(|existing| existing.id == book.id);
      let books = std::mem::take(&mut state.books);
      state.books = merge::upsert_book(books, book.clone());
      self.cache.save_books(&state.books);
      if is_new {
        state.current_book_id = Some(book.id.clone());
        self.cache.save_selected_book_id(&book.id);
      }
    }

    if let Some((remote, identity)) = self.remote_identity() {
      self.spawn_remote(move || {
        if let Err(err) = remote.upsert_book(&identity, &book) {
          warn!("Failed to push book {}: {err}", book.id);
        }
      })?;
    }
    Ok(())
  }

  pub fn delete_book(&self, book_id: &str) -> Result<(), AppError> {
    {
      let mut state = self.state.lock()?;
      if !state.books.iter().any(|book| book.id == book_id) {
        return Err(AppError::new("NOT_FOUND", format!("Book {book_id} not found")));
      }
      if state.books.len() <= 1 {
        return Err(AppError::new("LAST_BOOK", "You cannot delete the last book"));
      }
      let books = std::mem::take(&mut state.books);
      state.books = merge::remove_book(books, book_id);
      let transactions = std::mem::take(&mut state.transactions);
      state.transactions = merge::remove_book_transactions(transactions, book_id);
      self.cache.save_books(&state.books);
      self.cache.save_transactions(&state.transactions);
      if state.current_book_id.as_deref() == Some(book_id) {
        state.current_book_id = state.books.first().map(|book| book.id.clone());
        if let Some(id) = &state.current_book_id {
          self.cache.save_selected_book_id(id);
        }
      }
    }

    if let Some((remote, identity)) = self.remote_identity() {
      let book_id = book_id.to_string();
      self.spawn_remote(move || {
        if let Err(err) = remote.delete_book(&identity, &book_id) {
          warn!("Failed to delete remote book {book_id}: {err}");
        }
      })?;
    }
    Ok(())
  }

  /// Signed in, the image goes to object storage and the public URL comes
  /// back; signed out it is inlined as a data URI. Upload failures are
  /// surfaced so a record never references an object that was not stored.
  pub fn store_attachment(&self, image: &[u8]) -> Result<String, AppError> {
    if let Some((remote, identity)) = self.remote_identity() {
      return remote.upload_attachment(&identity, image);
    }
    Ok(encode_inline_attachment(image))
  }

  pub fn logout(&self) -> Result<(), AppError> {
    self.session.sign_out();
    self.cache.clear();
    let mut state = self.state.lock()?;
    *state = AppData::default();
    Ok(())
  }

  pub fn snapshot(&self) -> Result<AppData, AppError> {
    Ok(self.state.lock()?.clone())
  }

  pub fn current_transactions(&self) -> Result<Vec<Transaction>, AppError> {
    let state = self.state.lock()?;
    let Some(book_id) = state.current_book_id.clone() else {
      return Ok(Vec::new());
    };
    Ok(state
      .transactions
      .iter()
      .filter(|tx| tx.book_id == book_id)
      .cloned()
      .collect())
  }

  pub fn summary(&self) -> Result<SpendingSummary, AppError> {
    Ok(summary::compute_summary(&self.current_transactions()?))
  }

  pub fn breakdown(&self) -> Result<Vec<CategoryTotal>, AppError> {
    Ok(summary::category_breakdown(&self.current_transactions()?))
  }

  fn spawn_remote(&self, job: impl FnOnce() + Send + 'static) -> Result<(), AppError> {
    let handle = std::thread::spawn(job);
    self.pending.lock()?.push(handle);
    Ok(())
  }

  /// Wait for every detached remote write. Called before process exit and by
  /// tests that assert on remote effects.
  pub fn flush_remote(&self) -> Result<(), AppError> {
    let handles: Vec<JoinHandle<()>> = {
      let mut pending = self.pending.lock()?;
      pending.drain(..).collect()
    };
    for handle in handles {
      if handle.join().is_err() {
        warn!("A background remote write panicked");
      }
    }
    Ok(())
  }
}
