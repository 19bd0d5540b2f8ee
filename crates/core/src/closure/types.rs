//! Closure domain types.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Status of a task within a billing period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Work is not finished yet; the period cannot be closed around it.
    Pending,
    /// Work is done.
    Completed,
}

/// A task as seen by the period aggregator.
///
/// The aggregator never mutates tasks; this is the narrow read interface to
/// the external task store.
#[derive(Debug, Clone)]
pub struct TaskRecord {
    /// Client the task was worked for.
    pub client_id: Uuid,
    /// Task status.
    pub status: TaskStatus,
    /// Accumulated hours spent, derived externally from hour records.
    pub hours_spent: Decimal,
}

/// Per-client billing subtotal for a period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientSubtotal {
    /// Client ID.
    pub client_id: Uuid,
    /// Sum of hours spent across the client's tasks in the period.
    pub total_hours: Decimal,
    /// `total_hours` × hourly rate, rounded to 2 decimal places.
    pub gross_amount: Decimal,
    /// Gross × tax percentage / 100, rounded to 2 decimal places.
    pub tax_amount: Decimal,
    /// Gross − tax.
    pub net_amount: Decimal,
}

/// Period-wide task flags consumed by the close gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct PeriodFlags {
    /// Whether any task in the period is still pending.
    pub has_pending_tasks: bool,
    /// Number of pending tasks in the period.
    pub pending_tasks_count: u64,
    /// Whether any task in the period has zero hours spent, regardless of
    /// status.
    pub has_tasks_without_hours: bool,
    /// Number of zero-hours tasks in the period.
    pub tasks_without_hours_count: u64,
}

/// Full output of the period aggregator.
#[derive(Debug, Clone)]
pub struct PeriodBreakdown {
    /// Per-client subtotals, ordered by client ID. Clients whose period tasks
    /// sum to zero hours are omitted.
    pub clients: Vec<ClientSubtotal>,
    /// Period-wide flags.
    pub flags: PeriodFlags,
}

/// An expense registry entry as seen by snapshot seeding.
#[derive(Debug, Clone)]
pub struct RegistryExpense {
    /// Registry ID.
    pub id: Uuid,
    /// Expense name.
    pub name: String,
    /// Optional description.
    pub description: Option<String>,
    /// Current registry amount.
    pub amount: Decimal,
    /// Whether this expense is auto-proposed for every new closure.
    pub is_recurring: bool,
}

/// Selection of an expense line for a new closure.
///
/// Modeled as a sum type so "by registry reference" and "manually entered"
/// cannot be confused in one loosely-typed shape.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ExpenseSelection {
    /// Copy an entry from the registry, optionally overriding its amount.
    Registry {
        /// Registry expense ID.
        expense_id: Uuid,
        /// Amount override; the registry amount is copied when absent.
        amount: Option<Decimal>,
    },
    /// A manually entered line with no registry reference.
    Manual {
        /// Line name.
        name: String,
        /// Optional description.
        description: Option<String>,
        /// Line amount.
        amount: Decimal,
    },
}

/// A resolved expense line ready to be persisted as a snapshot row.
///
/// Independent of the live registry from this point on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpenseDraft {
    /// Registry reference, `None` for manually entered lines.
    pub expense_id: Option<Uuid>,
    /// Name copied at resolution time.
    pub name: String,
    /// Description copied at resolution time.
    pub description: Option<String>,
    /// Amount fixed at resolution time.
    pub amount: Decimal,
}

/// Read-time aggregates over a closure's snapshot rows.
///
/// Always derived from current rows, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClosureTotals {
    /// Σ client total hours.
    pub total_hours: Decimal,
    /// Σ client gross amounts.
    pub gross_amount: Decimal,
    /// Σ client tax amounts.
    pub tax_amount: Decimal,
    /// Σ client net amounts.
    pub net_amount: Decimal,
    /// Σ expense snapshot amounts.
    pub total_expenses: Decimal,
    /// Net minus total expenses.
    pub final_amount: Decimal,
}
