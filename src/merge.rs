//! Pure transitions over the in-memory collections. The reconciliation layer
//! applies one of these, persists the result, and only then touches the remote.

use crate::models::{Book, Transaction};

/// Replace-or-insert by id. New transactions go to the front, keeping the
/// cached collection newest first.
pub fn upsert_transaction(mut transactions: Vec<Transaction>, tx: Transaction) -> Vec<Transaction> {
  match transactions.iter().position(|existing| existing.id == tx.id) {
    Some(index) => transactions[index] = tx,
    None => transactions.insert(0, tx),
  }
  transactions
}

pub fn remove_transaction(transactions: Vec<Transaction>, tx_id: &str) -> Vec<Transaction> {
  transactions.into_iter().filter(|tx| tx.id != tx_id).collect()
}

pub fn remove_book_transactions(transactions: Vec<Transaction>, book_id: &str) -> Vec<Transaction> {
  transactions.into_iter().filter(|tx| tx.book_id != book_id).collect()
}

/// The sync merge: the fetched set overwrites exactly the slice of the local
/// collection scoped to `book_id`; entries of other books are kept untouched.
pub fn replace_book_transactions(
  local: Vec<Transaction>,
  fetched: Vec<Transaction>,
  book_id: &str,
) -> Vec<Transaction> {
  let mut merged = remove_book_transactions(local, book_id);
  merged.extend(fetched);
  merged
}

pub fn upsert_book(mut books: Vec<Book>, book: Book) -> Vec<Book> {
  match books.iter().position(|existing| existing.id == book.id) {
    Some(index) => books[index] = book,
    None => books.push(book),
  }
  books
}

pub fn remove_book(books: Vec<Book>, book_id: &str) -> Vec<Book> {
  books.into_iter().filter(|book| book.id != book_id).collect()
}
