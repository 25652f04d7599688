//! Derived figures over an in-memory transaction set. Pure and stateless;
//! callers recompute whenever the input changes.

use crate::models::{CategoryTotal, SpendingSummary, Transaction, TransactionType};

pub fn compute_summary(transactions: &[Transaction]) -> SpendingSummary {
  let mut total_income = 0.0;
  let mut total_expense = 0.0;
  for tx in transactions {
    match tx.tx_type {
      TransactionType::Income => total_income += tx.amount,
      TransactionType::Expense => total_expense += tx.amount,
    }
  }
  SpendingSummary {
    total_income,
    total_expense,
    balance: total_income - total_expense,
  }
}

/// Expense totals grouped by category, highest first. Ties keep first-seen
/// order.
pub fn category_breakdown(transactions: &[Transaction]) -> Vec<CategoryTotal> {
  let mut totals: Vec<CategoryTotal> = Vec::new();
  for tx in transactions.iter().filter(|tx| tx.tx_type == TransactionType::Expense) {
    match totals.iter().position(|entry| entry.category == tx.category) {
      Some(index) => totals[index].total += tx.amount,
      None => totals.push(CategoryTotal {
        category: tx.category.clone(),
        total: tx.amount,
      }),
    }
  }
  totals.sort_by(|a, b| b.total.partial_cmp(&a.total).unwrap_or(std::cmp::Ordering::Equal));
  totals
}

#[cfg(test)]
mod tests {
  use super::*;

  fn tx(tx_type: TransactionType, category: &str, amount: f64) -> Transaction {
    Transaction {
      id: crate::models::new_entity_id(),
      book_id: "b1".to_string(),
      date: "2026-01-01T00:00:00Z".to_string(),
      description: String::new(),
      amount,
      tx_type,
      category: category.to_string(),
      attachments: vec![],
    }
  }

  #[test]
  fn balance_is_income_minus_expense() {
    let set = vec![
      tx(TransactionType::Income, "Sales", 1000.0),
      tx(TransactionType::Income, "Top-up", 250.0),
      tx(TransactionType::Expense, "Transport", 75.5),
      tx(TransactionType::Expense, "Utilities", 120.0),
    ];
    let summary = compute_summary(&set);
    assert_eq!(summary.total_income, 1250.0);
    assert_eq!(summary.total_expense, 195.5);
    assert_eq!(summary.balance, summary.total_income - summary.total_expense);
  }

  #[test]
  fn empty_set_sums_to_zero() {
    let summary = compute_summary(&[]);
    assert_eq!(summary.total_income, 0.0);
    assert_eq!(summary.total_expense, 0.0);
    assert_eq!(summary.balance, 0.0);
  }

  #[test]
  fn breakdown_is_expense_only_and_descending() {
    let set = vec![
      tx(TransactionType::Expense, "Transport", 30.0),
      tx(TransactionType::Income, "Sales", 500.0),
      tx(TransactionType::Expense, "Utilities", 120.0),
      tx(TransactionType::Expense, "Transport", 45.0),
    ];
    let breakdown = category_breakdown(&set);
    assert_eq!(breakdown.len(), 2);
    assert_eq!(breakdown[0].category, "Utilities");
    assert_eq!(breakdown[0].total, 120.0);
    assert_eq!(breakdown[1].category, "Transport");
    assert_eq!(breakdown[1].total, 75.0);

    let expense_total: f64 = breakdown.iter().map(|entry| entry.total).sum();
    assert_eq!(expense_total, compute_summary(&set).total_expense);
  }
}
