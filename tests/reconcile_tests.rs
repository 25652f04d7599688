use std::sync::{Arc, Mutex};

use cashbook::app::App;
use cashbook::cache::LocalCache;
use cashbook::error::AppError;
use cashbook::models::{Book, Transaction, TransactionType, DEFAULT_BOOK_ID};
use cashbook::remote::RemoteLedger;
use cashbook::session::{Identity, SessionGate};

#[derive(Default)]
struct MockRemote {
  books: Mutex<Vec<Book>>,
  transactions: Mutex<Vec<Transaction>>,
  calls: Mutex<Vec<String>>,
}

impl MockRemote {
  fn record(&self, call: String) {
    self.calls.lock().unwrap().push(call);
  }

  fn calls(&self) -> Vec<String> {
    self.calls.lock().unwrap().clone()
  }
}

impl RemoteLedger for MockRemote {
  fn fetch_books(&self, _identity: &Identity) -> Result<Vec<Book>, AppError> {
    self.record("fetch_books".to_string());
    Ok(self.books.lock().unwrap().clone())
  }

  fn upsert_book(&self, _identity: &Identity, book: &Book) -> Result<(), AppError> {
    self.record(format!("upsert_book:{}", book.id));
    let mut books = self.books.lock().unwrap();
    match books.iter().position(|existing| existing.id == book.id) {
      Some(index) => books[index] = book.clone(),
      None => books.push(book.clone()),
    }
    Ok(())
  }

  fn delete_book(&self, _identity: &Identity, book_id: &str) -> Result<(), AppError> {
    self.record(format!("delete_book:{book_id}"));
    self.books.lock().unwrap().retain(|book| book.id != book_id);
    Ok(())
  }

  fn fetch_transactions(&self, _identity: &Identity, book_id: &str) -> Result<Vec<Transaction>, AppError> {
    self.record(format!("fetch_transactions:{book_id}"));
    Ok(
      self
        .transactions
        .lock()
        .unwrap()
        .iter()
        .filter(|tx| tx.book_id == book_id)
        .cloned()
        .collect(),
    )
  }

  fn upsert_transaction(&self, _identity: &Identity, tx: &Transaction) -> Result<(), AppError> {
    self.record(format!("upsert_transaction:{}", tx.id));
    let mut transactions = self.transactions.lock().unwrap();
    match transactions.iter().position(|existing| existing.id == tx.id) {
      Some(index) => transactions[index] = tx.clone(),
      None => transactions.push(tx.clone()),
    }
    Ok(())
  }

  fn delete_transaction(&self, _identity: &Identity, tx_id: &str) -> Result<(), AppError> {
    self.record(format!("delete_transaction:{tx_id}"));
    self.transactions.lock().unwrap().retain(|tx| tx.id != tx_id);
    Ok(())
  }

  fn upload_attachment(&self, identity: &Identity, _image: &[u8]) -> Result<String, AppError> {
    self.record("upload_attachment".to_string());
    Ok(format!(
      "https://remote.test/storage/v1/object/public/receipts/{}/1-abc.jpeg",
      identity.user_id
    ))
  }

  fn delete_attachment(&self, _identity: &Identity, url: &str) -> Result<(), AppError> {
    self.record(format!("delete_attachment:{url}"));
    Ok(())
  }
}

fn identity() -> Identity {
  Identity { user_id: "user-1".to_string(), access_token: None }
}

fn book(id: &str, name: &str) -> Book {
  Book {
    id: id.to_string(),
    name: name.to_string(),
    created_at: "2026-01-01T00:00:00Z".to_string(),
  }
}

fn tx(id: &str, book_id: &str, amount: f64) -> Transaction {
  Transaction {
    id: id.to_string(),
    book_id: book_id.to_string(),
    date: "2026-02-01T10:00:00Z".to_string(),
    description: "Lunch".to_string(),
    amount,
    tx_type: TransactionType::Expense,
    category: "Food & Beverages".to_string(),
    attachments: vec![],
  }
}

fn signed_in_app(remote: &Arc<MockRemote>) -> App {
  App::new(
    LocalCache::open_in_memory().unwrap(),
    Some(remote.clone() as Arc<dyn RemoteLedger>),
    SessionGate::with_identity(identity()),
  )
}

#[test]
fn signed_out_saves_stay_local() {
  let remote = Arc::new(MockRemote::default());
  let app = App::new(
    LocalCache::open_in_memory().unwrap(),
    Some(remote.clone() as Arc<dyn RemoteLedger>),
    SessionGate::new(),
  );
  app.startup().unwrap();

  app.save_transaction(tx("t1", DEFAULT_BOOK_ID, 9.0)).unwrap();
  app.flush_remote().unwrap();

  assert_eq!(app.snapshot().unwrap().transactions.len(), 1);
  assert!(remote.calls().is_empty());
}

#[test]
fn fresh_remote_account_is_seeded_with_local_books() {
  let remote = Arc::new(MockRemote::default());
  let app = signed_in_app(&remote);
  app.startup().unwrap();

  let snapshot = app.snapshot().unwrap();
  assert_eq!(snapshot.books.len(), 1);
  assert_eq!(snapshot.books[0].id, DEFAULT_BOOK_ID);
  assert!(remote.calls().contains(&format!("upsert_book:{DEFAULT_BOOK_ID}")));
  assert_eq!(remote.books.lock().unwrap().len(), 1);
}

#[test]
fn remote_books_replace_the_local_list_and_fix_selection() {
  let remote = Arc::new(MockRemote::default());
  remote.books.lock().unwrap().push(book("b2", "Travel"));
  remote.transactions.lock().unwrap().push(tx("r1", "b2", 40.0));

  let app = signed_in_app(&remote);
  app.startup().unwrap();

  let snapshot = app.snapshot().unwrap();
  assert_eq!(snapshot.books.len(), 1);
  assert_eq!(snapshot.books[0].id, "b2");
  // the cached default-book selection is invalid now, so it moves to b2
  assert_eq!(snapshot.current_book_id.as_deref(), Some("b2"));
  assert_eq!(snapshot.transactions, vec![tx("r1", "b2", 40.0)]);
}

#[test]
fn selecting_a_book_pulls_only_that_book() {
  let remote = Arc::new(MockRemote::default());
  remote.books.lock().unwrap().extend([book("a", "A"), book("b", "B")]);
  remote.transactions.lock().unwrap().extend([tx("ta", "a", 1.0), tx("tb", "b", 2.0)]);

  let app = signed_in_app(&remote);
  app.startup().unwrap();
  assert_eq!(app.snapshot().unwrap().current_book_id.as_deref(), Some("a"));

  // a local edit in book a that the remote does not know about
  app.save_transaction(tx("ta2", "a", 5.0)).unwrap();

  app.select_book("b").unwrap();
  let snapshot = app.snapshot().unwrap();
  assert_eq!(snapshot.current_book_id.as_deref(), Some("b"));
  let a_ids: Vec<&str> = snapshot
    .transactions
    .iter()
    .filter(|t| t.book_id == "a")
    .map(|t| t.id.as_str())
    .collect();
  assert!(a_ids.contains(&"ta2"));
  let b_ids: Vec<&str> = snapshot
    .transactions
    .iter()
    .filter(|t| t.book_id == "b")
    .map(|t| t.id.as_str())
    .collect();
  assert_eq!(b_ids, vec!["tb"]);
}

#[test]
fn the_last_book_cannot_be_deleted() {
  let remote = Arc::new(MockRemote::default());
  let app = signed_in_app(&remote);
  app.startup().unwrap();

  let err = app.delete_book(DEFAULT_BOOK_ID).unwrap_err();
  assert_eq!(err.code, "LAST_BOOK");
  assert_eq!(app.snapshot().unwrap().books.len(), 1);
}

#[test]
fn deleting_a_book_cascades_locally_and_remotely() {
  let remote = Arc::new(MockRemote::default());
  remote.books.lock().unwrap().extend([book("a", "A"), book("b", "B")]);
  remote.transactions.lock().unwrap().extend([tx("ta", "a", 1.0), tx("tb", "b", 2.0)]);

  let app = signed_in_app(&remote);
  app.startup().unwrap();
  app.select_book("b").unwrap();

  app.delete_book("b").unwrap();
  app.flush_remote().unwrap();

  let snapshot = app.snapshot().unwrap();
  assert_eq!(snapshot.books.len(), 1);
  assert_eq!(snapshot.books[0].id, "a");
  assert!(snapshot.transactions.iter().all(|t| t.book_id != "b"));
  assert_eq!(snapshot.current_book_id.as_deref(), Some("a"));
  assert!(remote.calls().contains(&"delete_book:b".to_string()));
}

#[test]
fn deleting_a_transaction_removes_only_remote_attachments() {
  let remote = Arc::new(MockRemote::default());
  let app = signed_in_app(&remote);
  app.startup().unwrap();

  let stored = "https://remote.test/storage/v1/object/public/receipts/user-1/1-abc.jpeg";
  let mut victim = tx("t1", DEFAULT_BOOK_ID, 3.0);
  victim.attachments = vec![stored.to_string(), "data:image/jpeg;base64,abc".to_string()];
  app.save_transaction(victim).unwrap();

  app.delete_transaction("t1").unwrap();
  app.flush_remote().unwrap();

  let calls = remote.calls();
  assert!(calls.contains(&format!("delete_attachment:{stored}")));
  assert_eq!(calls.iter().filter(|c| c.starts_with("delete_attachment:")).count(), 1);
  assert!(calls.contains(&"delete_transaction:t1".to_string()));
  assert!(app.snapshot().unwrap().transactions.is_empty());
}

#[test]
fn saving_replaces_in_place_but_prepends_new_entries() {
  let remote = Arc::new(MockRemote::default());
  let app = signed_in_app(&remote);
  app.startup().unwrap();

  app.save_transaction(tx("t1", DEFAULT_BOOK_ID, 1.0)).unwrap();
  app.save_transaction(tx("t2", DEFAULT_BOOK_ID, 2.0)).unwrap();
  let snapshot = app.snapshot().unwrap();
  assert_eq!(snapshot.transactions[0].id, "t2");

  app.save_transaction(tx("t1", DEFAULT_BOOK_ID, 9.0)).unwrap();
  app.flush_remote().unwrap();
  let snapshot = app.snapshot().unwrap();
  assert_eq!(snapshot.transactions.len(), 2);
  assert_eq!(snapshot.transactions[1].id, "t1");
  assert_eq!(snapshot.transactions[1].amount, 9.0);
  assert_eq!(remote.transactions.lock().unwrap().len(), 2);
}

#[test]
fn invalid_amounts_and_unknown_books_are_rejected() {
  let remote = Arc::new(MockRemote::default());
  let app = signed_in_app(&remote);
  app.startup().unwrap();

  let err = app.save_transaction(tx("t1", DEFAULT_BOOK_ID, -5.0)).unwrap_err();
  assert_eq!(err.code, "VALIDATION");
  let err = app.save_transaction(tx("t1", "ghost", 5.0)).unwrap_err();
  assert_eq!(err.code, "VALIDATION");
  assert!(app.snapshot().unwrap().transactions.is_empty());
}

#[test]
fn new_books_become_the_current_selection() {
  let remote = Arc::new(MockRemote::default());
  let app = signed_in_app(&remote);
  app.startup().unwrap();

  app.save_book(book("b2", "Side")).unwrap();
  app.flush_remote().unwrap();

  let snapshot = app.snapshot().unwrap();
  assert_eq!(snapshot.books.len(), 2);
  assert_eq!(snapshot.current_book_id.as_deref(), Some("b2"));
  assert!(remote.calls().contains(&"upsert_book:b2".to_string()));

  // renaming keeps the selection where it is
  app.save_book(book("b2", "Renamed")).unwrap();
  let snapshot = app.snapshot().unwrap();
  assert_eq!(snapshot.books.len(), 2);
  assert_eq!(snapshot.books[1].name, "Renamed");
}

#[test]
fn attachment_storage_depends_on_the_session() {
  let remote = Arc::new(MockRemote::default());
  let app = signed_in_app(&remote);
  let url = app.store_attachment(b"img").unwrap();
  assert!(url.contains("/storage/v1/object/public/receipts/user-1/"));

  app.session().sign_out();
  let inline = app.store_attachment(b"img").unwrap();
  assert!(inline.starts_with("data:image/jpeg;base64,"));
}

#[test]
fn logout_wipes_state_and_cache() {
  let remote = Arc::new(MockRemote::default());
  let app = signed_in_app(&remote);
  app.startup().unwrap();
  app.save_transaction(tx("t1", DEFAULT_BOOK_ID, 2.0)).unwrap();
  app.flush_remote().unwrap();

  app.logout().unwrap();

  assert!(!app.session().is_signed_in());
  let snapshot = app.snapshot().unwrap();
  assert!(snapshot.books.is_empty());
  assert!(snapshot.transactions.is_empty());
  assert_eq!(snapshot.current_book_id, None);
}
