//! Monthly closure engine.
//!
//! A closure snapshots one billing period (user, month, year) into frozen
//! per-client and per-expense rows. This module holds the pure parts: the
//! decimal arithmetic, the period aggregation over task records, and the
//! resolution of expense selections into snapshot drafts. Persistence and the
//! open/closed state machine live in the repository layer.

pub mod aggregate;
pub mod amounts;
pub mod expenses;
pub mod period;
pub mod types;

pub use aggregate::aggregate_period;
pub use amounts::{BilledAmounts, bill, round_half_up_2, totals};
pub use expenses::{ExpenseSeedError, resolve_expense_seeds};
pub use period::{MAX_YEAR, MIN_YEAR, period_bounds, period_label};
pub use types::{
    ClientSubtotal, ClosureTotals, ExpenseDraft, ExpenseSelection, PeriodBreakdown, PeriodFlags,
    RegistryExpense, TaskRecord, TaskStatus,
};
