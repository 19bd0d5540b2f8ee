//! Expense snapshot seeding.
//!
//! Resolves the expense line items of a new closure: explicit selections
//! (registry references or manual lines) plus every recurring active registry
//! expense not already selected. The resulting drafts copy name, description,
//! and amount, so the snapshot is independent of the live registry from the
//! moment it is persisted.

use std::collections::BTreeSet;

use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use super::types::{ExpenseDraft, ExpenseSelection, RegistryExpense};

/// Errors raised while resolving expense selections.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExpenseSeedError {
    /// Selection references a registry expense that does not exist (or is
    /// inactive) for this user.
    #[error("Expense not found in registry: {0}")]
    UnknownExpense(Uuid),

    /// The same registry expense was selected more than once.
    #[error("Expense selected more than once: {0}")]
    DuplicateSelection(Uuid),

    /// Expense amounts cannot be negative.
    #[error("Expense amount cannot be negative")]
    NegativeAmount,

    /// Manual expense lines need a name.
    #[error("Expense name cannot be empty")]
    EmptyName,
}

/// Resolves expense selections into snapshot drafts for a new closure.
///
/// `registry` is the user's active expense registry. Explicit selections come
/// first, in the order given; recurring registry expenses not already selected
/// are appended in registry order.
///
/// # Errors
///
/// Returns an error for unknown or duplicated registry references, negative
/// amounts, or empty manual names. No drafts are produced on error.
pub fn resolve_expense_seeds(
    selections: &[ExpenseSelection],
    registry: &[RegistryExpense],
) -> Result<Vec<ExpenseDraft>, ExpenseSeedError> {
    let mut selected_ids = BTreeSet::new();
    let mut drafts = Vec::with_capacity(selections.len());

    for selection in selections {
        match selection {
            ExpenseSelection::Registry { expense_id, amount } => {
                let entry = registry
                    .iter()
                    .find(|e| e.id == *expense_id)
                    .ok_or(ExpenseSeedError::UnknownExpense(*expense_id))?;

                if !selected_ids.insert(entry.id) {
                    return Err(ExpenseSeedError::DuplicateSelection(entry.id));
                }

                let amount = amount.unwrap_or(entry.amount);
                if amount < Decimal::ZERO {
                    return Err(ExpenseSeedError::NegativeAmount);
                }

                drafts.push(ExpenseDraft {
                    expense_id: Some(entry.id),
                    name: entry.name.clone(),
                    description: entry.description.clone(),
                    amount,
                });
            }
            ExpenseSelection::Manual {
                name,
                description,
                amount,
            } => {
                if name.trim().is_empty() {
                    return Err(ExpenseSeedError::EmptyName);
                }
                if *amount < Decimal::ZERO {
                    return Err(ExpenseSeedError::NegativeAmount);
                }

                drafts.push(ExpenseDraft {
                    expense_id: None,
                    name: name.clone(),
                    description: description.clone(),
                    amount: *amount,
                });
            }
        }
    }

    // Recurring expenses are auto-proposed for every new closure unless the
    // caller already selected them.
    for entry in registry {
        if entry.is_recurring && !selected_ids.contains(&entry.id) {
            drafts.push(ExpenseDraft {
                expense_id: Some(entry.id),
                name: entry.name.clone(),
                description: entry.description.clone(),
                amount: entry.amount,
            });
        }
    }

    Ok(drafts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn registry_entry(id: u128, name: &str, amount: Decimal, recurring: bool) -> RegistryExpense {
        RegistryExpense {
            id: Uuid::from_u128(id),
            name: name.to_string(),
            description: Some(format!("{name} description")),
            amount,
            is_recurring: recurring,
        }
    }

    #[test]
    fn test_recurring_auto_seeded() {
        let registry = vec![
            registry_entry(1, "Accounting", dec!(150.00), true),
            registry_entry(2, "Conference", dec!(500.00), false),
        ];

        let drafts = resolve_expense_seeds(&[], &registry).unwrap();

        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].expense_id, Some(Uuid::from_u128(1)));
        assert_eq!(drafts[0].name, "Accounting");
        assert_eq!(drafts[0].amount, dec!(150.00));
    }

    #[test]
    fn test_one_off_must_be_selected() {
        let registry = vec![registry_entry(2, "Conference", dec!(500.00), false)];
        let selections = vec![ExpenseSelection::Registry {
            expense_id: Uuid::from_u128(2),
            amount: None,
        }];

        let drafts = resolve_expense_seeds(&selections, &registry).unwrap();

        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].amount, dec!(500.00));
    }

    #[test]
    fn test_selected_recurring_not_duplicated() {
        let registry = vec![registry_entry(1, "Accounting", dec!(150.00), true)];
        let selections = vec![ExpenseSelection::Registry {
            expense_id: Uuid::from_u128(1),
            amount: Some(dec!(175.00)),
        }];

        let drafts = resolve_expense_seeds(&selections, &registry).unwrap();

        // The explicit selection wins; auto-seeding must not add it again.
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].amount, dec!(175.00));
    }

    #[test]
    fn test_manual_line() {
        let selections = vec![ExpenseSelection::Manual {
            name: "Coworking day pass".to_string(),
            description: None,
            amount: dec!(35.00),
        }];

        let drafts = resolve_expense_seeds(&selections, &[]).unwrap();

        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].expense_id, None);
        assert_eq!(drafts[0].name, "Coworking day pass");
    }

    #[test]
    fn test_unknown_registry_reference() {
        let selections = vec![ExpenseSelection::Registry {
            expense_id: Uuid::from_u128(99),
            amount: None,
        }];

        let result = resolve_expense_seeds(&selections, &[]);

        assert_eq!(
            result,
            Err(ExpenseSeedError::UnknownExpense(Uuid::from_u128(99)))
        );
    }

    #[test]
    fn test_duplicate_selection_rejected() {
        let registry = vec![registry_entry(1, "Accounting", dec!(150.00), true)];
        let selections = vec![
            ExpenseSelection::Registry {
                expense_id: Uuid::from_u128(1),
                amount: None,
            },
            ExpenseSelection::Registry {
                expense_id: Uuid::from_u128(1),
                amount: Some(dec!(10.00)),
            },
        ];

        let result = resolve_expense_seeds(&selections, &registry);

        assert_eq!(
            result,
            Err(ExpenseSeedError::DuplicateSelection(Uuid::from_u128(1)))
        );
    }

    #[test]
    fn test_negative_amount_rejected() {
        let selections = vec![ExpenseSelection::Manual {
            name: "Refund".to_string(),
            description: None,
            amount: dec!(-10.00),
        }];

        assert_eq!(
            resolve_expense_seeds(&selections, &[]),
            Err(ExpenseSeedError::NegativeAmount)
        );
    }

    #[test]
    fn test_negative_override_rejected() {
        let registry = vec![registry_entry(1, "Accounting", dec!(150.00), true)];
        let selections = vec![ExpenseSelection::Registry {
            expense_id: Uuid::from_u128(1),
            amount: Some(dec!(-1.00)),
        }];

        assert_eq!(
            resolve_expense_seeds(&selections, &registry),
            Err(ExpenseSeedError::NegativeAmount)
        );
    }

    #[test]
    fn test_empty_manual_name_rejected() {
        let selections = vec![ExpenseSelection::Manual {
            name: "   ".to_string(),
            description: None,
            amount: dec!(5.00),
        }];

        assert_eq!(
            resolve_expense_seeds(&selections, &[]),
            Err(ExpenseSeedError::EmptyName)
        );
    }

    #[test]
    fn test_zero_amount_allowed() {
        let selections = vec![ExpenseSelection::Manual {
            name: "Waived fee".to_string(),
            description: None,
            amount: dec!(0),
        }];

        assert!(resolve_expense_seeds(&selections, &[]).is_ok());
    }

    #[test]
    fn test_selection_order_then_registry_order() {
        let registry = vec![
            registry_entry(1, "Accounting", dec!(150.00), true),
            registry_entry(2, "Hosting", dec!(20.00), true),
        ];
        let selections = vec![ExpenseSelection::Manual {
            name: "Coworking".to_string(),
            description: None,
            amount: dec!(35.00),
        }];

        let drafts = resolve_expense_seeds(&selections, &registry).unwrap();

        let names: Vec<&str> = drafts.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["Coworking", "Accounting", "Hosting"]);
    }
}
