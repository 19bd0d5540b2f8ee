//! Monthly closure repository.
//!
//! Owns the closure lifecycle: transactional creation (period aggregation +
//! snapshot materialization + expense seeding), the open/closed state machine
//! with its guards, the expense snapshot sub-operations, and the read surface
//! that derives totals from snapshot rows at read time.

use std::collections::HashMap;

use chrono::{DateTime, FixedOffset, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, QueryOrder, Set, SqlErr, TransactionTrait, sea_query::Expr,
};
use uuid::Uuid;

use worklog_core::closure as billing;
use worklog_core::closure::{
    ClosureTotals, ExpenseDraft, ExpenseSeedError, ExpenseSelection, PeriodFlags, RegistryExpense,
    TaskRecord,
};

use crate::entities::{
    clients, expenses, monthly_closure_clients, monthly_closure_expenses, monthly_closures,
    sea_orm_active_enums::{ClosureStatus, TaskStatus},
    tasks,
};

/// Error types for closure operations.
#[derive(Debug, thiserror::Error)]
pub enum ClosureError {
    /// Month must be between 1 and 12.
    #[error("Month out of range: {0}")]
    InvalidMonth(u32),

    /// Year outside the supported bounds.
    #[error("Year out of range: {0}")]
    InvalidYear(i32),

    /// Hourly rate must be strictly positive.
    #[error("Hourly rate must be positive")]
    NonPositiveHourlyRate,

    /// Tax percentage must lie in 0..=100.
    #[error("Tax percentage must be between 0 and 100")]
    TaxPercentageOutOfRange,

    /// Expense amounts cannot be negative.
    #[error("Expense amount cannot be negative")]
    NegativeExpenseAmount,

    /// Expense lines need a name.
    #[error("Expense name cannot be empty")]
    EmptyExpenseName,

    /// A closure already exists for this user and period.
    #[error("A closure already exists for {month}/{year}")]
    DuplicateClosure {
        /// Requested month.
        month: u32,
        /// Requested year.
        year: i32,
    },

    /// The registry expense is already attached to this closure.
    #[error("Expense is already attached to this closure: {0}")]
    DuplicateExpense(Uuid),

    /// Registry expense not found for this user.
    #[error("Expense not found: {0}")]
    ExpenseNotFound(Uuid),

    /// Mutation attempted on a closed closure.
    #[error("Closure is closed and cannot be modified")]
    ClosureClosed,

    /// Reopen attempted on a closure that is already open.
    #[error("Closure is already open")]
    AlreadyOpen,

    /// Close attempted while the period still has unresolved tasks.
    #[error(
        "Cannot close: {pending_tasks} pending task(s), {tasks_without_hours} task(s) without hours"
    )]
    CloseBlocked {
        /// Number of pending tasks in the period.
        pending_tasks: u64,
        /// Number of zero-hours tasks in the period.
        tasks_without_hours: u64,
    },

    /// Closure not found for this user.
    #[error("Closure not found: {0}")]
    NotFound(Uuid),

    /// Expense snapshot line not found on this closure.
    #[error("Expense line not found: {0}")]
    ExpenseLineNotFound(Uuid),

    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

impl From<ExpenseSeedError> for ClosureError {
    fn from(err: ExpenseSeedError) -> Self {
        match err {
            ExpenseSeedError::UnknownExpense(id) => Self::ExpenseNotFound(id),
            ExpenseSeedError::DuplicateSelection(id) => Self::DuplicateExpense(id),
            ExpenseSeedError::NegativeAmount => Self::NegativeExpenseAmount,
            ExpenseSeedError::EmptyName => Self::EmptyExpenseName,
        }
    }
}

/// Input for creating a closure.
#[derive(Debug, Clone)]
pub struct CreateClosureInput {
    /// Owning user.
    pub user_id: Uuid,
    /// Billing month (1-12).
    pub month: u32,
    /// Billing year.
    pub year: i32,
    /// Tax percentage withheld from gross amounts.
    pub tax_percentage: Decimal,
    /// Hourly rate applied uniformly to all clients for the period.
    pub hourly_rate: Decimal,
    /// Free-text notes.
    pub notes: Option<String>,
    /// Explicit expense selections; recurring active expenses are seeded on
    /// top of these.
    pub expense_selections: Vec<ExpenseSelection>,
}

/// Input for updating an open closure's metadata.
///
/// Changing the rate or tax percentage does not recompute existing per-client
/// snapshot rows; the new values only apply to future materialization.
#[derive(Debug, Clone, Default)]
pub struct UpdateClosureInput {
    /// New tax percentage.
    pub tax_percentage: Option<Decimal>,
    /// New hourly rate.
    pub hourly_rate: Option<Decimal>,
    /// New notes.
    pub notes: Option<String>,
}

/// Input for updating an expense snapshot line.
#[derive(Debug, Clone)]
pub struct UpdateExpenseInput {
    /// Replacement amount (>= 0).
    pub amount: Decimal,
    /// Optional replacement name.
    pub name: Option<String>,
    /// Optional replacement description.
    pub description: Option<String>,
}

/// Filters for listing closures.
#[derive(Debug, Clone, Default)]
pub struct ClosureFilter {
    /// Restrict to one year.
    pub year: Option<i32>,
    /// Restrict to one status.
    pub status: Option<ClosureStatus>,
}

/// A per-client snapshot row joined with its client name.
#[derive(Debug, Clone)]
pub struct ClientLine {
    /// The snapshot row.
    pub row: monthly_closure_clients::Model,
    /// Client display name at read time.
    pub client_name: String,
}

/// A closure with its snapshot rows and read-time aggregates.
#[derive(Debug, Clone)]
pub struct ClosureWithTotals {
    /// The closure record.
    pub closure: monthly_closures::Model,
    /// Per-client snapshot rows.
    pub clients: Vec<ClientLine>,
    /// Per-expense snapshot rows.
    pub expenses: Vec<monthly_closure_expenses::Model>,
    /// Aggregates derived from the snapshot rows at read time.
    pub totals: ClosureTotals,
    /// Period flags recomputed fresh from current task data.
    pub flags: PeriodFlags,
}

/// Validates the billing terms of a closure.
fn validate_billing_terms(
    month: u32,
    year: i32,
    hourly_rate: Decimal,
    tax_percentage: Decimal,
) -> Result<(), ClosureError> {
    if !(1..=12).contains(&month) {
        return Err(ClosureError::InvalidMonth(month));
    }
    if !(billing::MIN_YEAR..=billing::MAX_YEAR).contains(&year) {
        return Err(ClosureError::InvalidYear(year));
    }
    if hourly_rate <= Decimal::ZERO {
        return Err(ClosureError::NonPositiveHourlyRate);
    }
    if tax_percentage < Decimal::ZERO || tax_percentage > Decimal::ONE_HUNDRED {
        return Err(ClosureError::TaxPercentageOutOfRange);
    }
    Ok(())
}

/// Rejects mutations on a closed closure.
fn ensure_open(closure: &monthly_closures::Model) -> Result<(), ClosureError> {
    if closure.status == ClosureStatus::Closed {
        return Err(ClosureError::ClosureClosed);
    }
    Ok(())
}

/// The close gate: a period closes only when nothing in it is unresolved.
fn close_gate(flags: &PeriodFlags) -> Result<(), ClosureError> {
    if flags.has_pending_tasks || flags.has_tasks_without_hours {
        return Err(ClosureError::CloseBlocked {
            pending_tasks: flags.pending_tasks_count,
            tasks_without_hours: flags.tasks_without_hours_count,
        });
    }
    Ok(())
}

/// Loads a closure scoped to its owning user. Cross-user access is
/// indistinguishable from not-found.
async fn find_scoped<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
    id: Uuid,
) -> Result<Option<monthly_closures::Model>, DbErr> {
    monthly_closures::Entity::find_by_id(id)
        .filter(monthly_closures::Column::UserId.eq(user_id))
        .one(conn)
        .await
}

/// Loads the task records of one billing period: the single bounded query
/// behind both aggregation and the close gate.
async fn load_period_tasks<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
    month: u32,
    year: i32,
) -> Result<Vec<TaskRecord>, ClosureError> {
    let Some((start, next_start)) = billing::period_bounds(month, year) else {
        return Err(ClosureError::InvalidMonth(month));
    };

    let rows = tasks::Entity::find()
        .filter(tasks::Column::UserId.eq(user_id))
        .filter(tasks::Column::CreatedOn.gte(start))
        .filter(tasks::Column::CreatedOn.lt(next_start))
        .all(conn)
        .await?;

    Ok(rows
        .into_iter()
        .map(|task| TaskRecord {
            client_id: task.client_id,
            status: match task.status {
                TaskStatus::Pending => billing::TaskStatus::Pending,
                TaskStatus::Completed => billing::TaskStatus::Completed,
            },
            hours_spent: task.hours_spent,
        })
        .collect())
}

/// Loads client display names for a set of client ids.
async fn load_client_names<C: ConnectionTrait>(
    conn: &C,
    client_ids: &[Uuid],
) -> Result<HashMap<Uuid, String>, DbErr> {
    if client_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let rows = clients::Entity::find()
        .filter(clients::Column::Id.is_in(client_ids.to_vec()))
        .all(conn)
        .await?;

    Ok(rows.into_iter().map(|c| (c.id, c.name)).collect())
}

/// Monthly closure repository.
#[derive(Debug, Clone)]
pub struct ClosureRepository {
    db: DatabaseConnection,
}

impl ClosureRepository {
    /// Creates a new closure repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Creates a closure for (user, month, year) in the `open` state.
    ///
    /// Runs the period aggregator once to materialize per-client snapshot
    /// rows and seeds expense snapshots from the explicit selections plus
    /// recurring active registry expenses. Everything happens in a single
    /// transaction; the unique (user, month, year) index backs the duplicate
    /// pre-check against concurrent creates.
    ///
    /// # Errors
    ///
    /// Returns an error if the billing terms are invalid, a closure already
    /// exists for the period, an expense selection cannot be resolved, or a
    /// database operation fails.
    pub async fn create(&self, input: CreateClosureInput) -> Result<ClosureWithTotals, ClosureError> {
        validate_billing_terms(
            input.month,
            input.year,
            input.hourly_rate,
            input.tax_percentage,
        )?;
        let month_db =
            i16::try_from(input.month).map_err(|_| ClosureError::InvalidMonth(input.month))?;

        let txn = self.db.begin().await?;

        let existing = monthly_closures::Entity::find()
            .filter(monthly_closures::Column::UserId.eq(input.user_id))
            .filter(monthly_closures::Column::Month.eq(month_db))
            .filter(monthly_closures::Column::Year.eq(input.year))
            .one(&txn)
            .await?;
        if existing.is_some() {
            return Err(ClosureError::DuplicateClosure {
                month: input.month,
                year: input.year,
            });
        }

        let records = load_period_tasks(&txn, input.user_id, input.month, input.year).await?;
        let breakdown = billing::aggregate_period(&records, input.hourly_rate, input.tax_percentage);

        let registry_rows = expenses::Entity::find()
            .filter(expenses::Column::UserId.eq(input.user_id))
            .filter(expenses::Column::IsActive.eq(true))
            .order_by_asc(expenses::Column::CreatedAt)
            .all(&txn)
            .await?;
        let registry: Vec<RegistryExpense> = registry_rows
            .into_iter()
            .map(|e| RegistryExpense {
                id: e.id,
                name: e.name,
                description: e.description,
                amount: e.amount,
                is_recurring: e.is_recurring,
            })
            .collect();
        let drafts = billing::resolve_expense_seeds(&input.expense_selections, &registry)?;

        let now: DateTime<FixedOffset> = Utc::now().into();
        let closure = monthly_closures::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(input.user_id),
            month: Set(month_db),
            year: Set(input.year),
            tax_percentage: Set(input.tax_percentage),
            hourly_rate: Set(input.hourly_rate),
            notes: Set(input.notes),
            status: Set(ClosureStatus::Open),
            closed_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let closure = match closure.insert(&txn).await {
            Ok(model) => model,
            // Backstop for a concurrent create racing past the pre-check.
            Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                return Err(ClosureError::DuplicateClosure {
                    month: input.month,
                    year: input.year,
                });
            }
            Err(e) => return Err(e.into()),
        };

        let client_ids: Vec<Uuid> = breakdown.clients.iter().map(|c| c.client_id).collect();
        let names = load_client_names(&txn, &client_ids).await?;

        let mut client_lines = Vec::with_capacity(breakdown.clients.len());
        for subtotal in &breakdown.clients {
            let row = monthly_closure_clients::ActiveModel {
                id: Set(Uuid::new_v4()),
                closure_id: Set(closure.id),
                client_id: Set(subtotal.client_id),
                total_hours: Set(subtotal.total_hours),
                gross_amount: Set(subtotal.gross_amount),
                tax_amount: Set(subtotal.tax_amount),
                net_amount: Set(subtotal.net_amount),
                created_at: Set(now),
            }
            .insert(&txn)
            .await?;

            client_lines.push(ClientLine {
                client_name: names.get(&subtotal.client_id).cloned().unwrap_or_default(),
                row,
            });
        }

        let mut expense_rows = Vec::with_capacity(drafts.len());
        for draft in drafts {
            let row = monthly_closure_expenses::ActiveModel {
                id: Set(Uuid::new_v4()),
                closure_id: Set(closure.id),
                expense_id: Set(draft.expense_id),
                name: Set(draft.name),
                description: Set(draft.description),
                amount: Set(draft.amount),
                created_at: Set(now),
                updated_at: Set(now),
            }
            .insert(&txn)
            .await?;
            expense_rows.push(row);
        }

        txn.commit().await?;

        let expense_amounts: Vec<Decimal> = expense_rows.iter().map(|e| e.amount).collect();
        let totals = billing::totals(&breakdown.clients, &expense_amounts);

        Ok(ClosureWithTotals {
            closure,
            clients: client_lines,
            expenses: expense_rows,
            totals,
            flags: breakdown.flags,
        })
    }

    /// Loads a closure with snapshot rows, read-time totals, and fresh flags.
    ///
    /// Totals are always derived from the current snapshot rows, never read
    /// from a stored aggregate. Flags are recomputed against current task
    /// data for display; once a closure is closed they no longer gate
    /// anything.
    ///
    /// # Errors
    ///
    /// Returns an error if a database operation fails.
    pub async fn find_with_totals(
        &self,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<Option<ClosureWithTotals>, ClosureError> {
        let Some(closure) = find_scoped(&self.db, user_id, id).await? else {
            return Ok(None);
        };

        let client_rows = monthly_closure_clients::Entity::find()
            .filter(monthly_closure_clients::Column::ClosureId.eq(id))
            .order_by_asc(monthly_closure_clients::Column::ClientId)
            .all(&self.db)
            .await?;

        let expense_rows = monthly_closure_expenses::Entity::find()
            .filter(monthly_closure_expenses::Column::ClosureId.eq(id))
            .order_by_asc(monthly_closure_expenses::Column::CreatedAt)
            .order_by_asc(monthly_closure_expenses::Column::Id)
            .all(&self.db)
            .await?;

        let client_ids: Vec<Uuid> = client_rows.iter().map(|r| r.client_id).collect();
        let names = load_client_names(&self.db, &client_ids).await?;

        let month = u32::try_from(closure.month).unwrap_or(0);
        let records = load_period_tasks(&self.db, user_id, month, closure.year).await?;
        let flags =
            billing::aggregate_period(&records, closure.hourly_rate, closure.tax_percentage).flags;

        let subtotals: Vec<billing::ClientSubtotal> = client_rows
            .iter()
            .map(|r| billing::ClientSubtotal {
                client_id: r.client_id,
                total_hours: r.total_hours,
                gross_amount: r.gross_amount,
                tax_amount: r.tax_amount,
                net_amount: r.net_amount,
            })
            .collect();
        let expense_amounts: Vec<Decimal> = expense_rows.iter().map(|e| e.amount).collect();
        let totals = billing::totals(&subtotals, &expense_amounts);

        let clients = client_rows
            .into_iter()
            .map(|row| ClientLine {
                client_name: names.get(&row.client_id).cloned().unwrap_or_default(),
                row,
            })
            .collect();

        Ok(Some(ClosureWithTotals {
            closure,
            clients,
            expenses: expense_rows,
            totals,
            flags,
        }))
    }

    /// Lists a user's closures, newest period first. No totals are
    /// materialized; this feeds table views.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list(
        &self,
        user_id: Uuid,
        filter: ClosureFilter,
    ) -> Result<Vec<monthly_closures::Model>, ClosureError> {
        let mut query =
            monthly_closures::Entity::find().filter(monthly_closures::Column::UserId.eq(user_id));

        if let Some(year) = filter.year {
            query = query.filter(monthly_closures::Column::Year.eq(year));
        }
        if let Some(status) = filter.status {
            query = query.filter(monthly_closures::Column::Status.eq(status));
        }

        let rows = query
            .order_by_desc(monthly_closures::Column::Year)
            .order_by_desc(monthly_closures::Column::Month)
            .all(&self.db)
            .await?;
        Ok(rows)
    }

    /// Updates an open closure's metadata (tax percentage, hourly rate,
    /// notes).
    ///
    /// Existing per-client snapshot rows are deliberately left untouched.
    ///
    /// # Errors
    ///
    /// Returns an error if the closure is missing or closed, the new values
    /// are out of bounds, or a database operation fails.
    pub async fn update_metadata(
        &self,
        user_id: Uuid,
        id: Uuid,
        input: UpdateClosureInput,
    ) -> Result<monthly_closures::Model, ClosureError> {
        let txn = self.db.begin().await?;

        let closure = find_scoped(&txn, user_id, id)
            .await?
            .ok_or(ClosureError::NotFound(id))?;
        ensure_open(&closure)?;

        if let Some(rate) = input.hourly_rate {
            if rate <= Decimal::ZERO {
                return Err(ClosureError::NonPositiveHourlyRate);
            }
        }
        if let Some(tax) = input.tax_percentage {
            if tax < Decimal::ZERO || tax > Decimal::ONE_HUNDRED {
                return Err(ClosureError::TaxPercentageOutOfRange);
            }
        }

        let mut active: monthly_closures::ActiveModel = closure.into();
        if let Some(tax) = input.tax_percentage {
            active.tax_percentage = Set(tax);
        }
        if let Some(rate) = input.hourly_rate {
            active.hourly_rate = Set(rate);
        }
        if let Some(notes) = input.notes {
            active.notes = Set(Some(notes));
        }
        active.updated_at = Set(Utc::now().into());

        let updated = active.update(&txn).await?;
        txn.commit().await?;
        Ok(updated)
    }

    /// Closes an open closure.
    ///
    /// The gate re-consults live task data: closing is allowed only when the
    /// period has no pending tasks and no zero-hours tasks. This is the one
    /// place task data is re-read after creation, and it never mutates the
    /// frozen snapshot rows. The state write is guarded on the current
    /// status, so two concurrent closes produce exactly one winner.
    ///
    /// # Errors
    ///
    /// Returns `CloseBlocked` with the offending counts when the gate fails,
    /// `ClosureClosed` when the closure is not open, `NotFound` when it does
    /// not exist for this user.
    pub async fn close(
        &self,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<monthly_closures::Model, ClosureError> {
        let txn = self.db.begin().await?;

        let closure = find_scoped(&txn, user_id, id)
            .await?
            .ok_or(ClosureError::NotFound(id))?;
        if closure.status == ClosureStatus::Closed {
            return Err(ClosureError::ClosureClosed);
        }

        let month = u32::try_from(closure.month).unwrap_or(0);
        let records = load_period_tasks(&txn, user_id, month, closure.year).await?;
        let flags =
            billing::aggregate_period(&records, closure.hourly_rate, closure.tax_percentage).flags;
        close_gate(&flags)?;

        let now: DateTime<FixedOffset> = Utc::now().into();
        let result = monthly_closures::Entity::update_many()
            .col_expr(
                monthly_closures::Column::Status,
                Expr::value(ClosureStatus::Closed),
            )
            .col_expr(monthly_closures::Column::ClosedAt, Expr::value(Some(now)))
            .col_expr(monthly_closures::Column::UpdatedAt, Expr::value(now))
            .filter(monthly_closures::Column::Id.eq(id))
            .filter(monthly_closures::Column::Status.eq(ClosureStatus::Open))
            .exec(&txn)
            .await?;
        if result.rows_affected == 0 {
            // Lost the race to a concurrent close.
            return Err(ClosureError::ClosureClosed);
        }

        let updated = find_scoped(&txn, user_id, id)
            .await?
            .ok_or(ClosureError::NotFound(id))?;
        txn.commit().await?;
        Ok(updated)
    }

    /// Reopens a closed closure.
    ///
    /// Snapshot rows are not recomputed; the record simply becomes mutable
    /// again and `closed_at` is cleared.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyOpen` when the closure is not closed, `NotFound` when
    /// it does not exist for this user.
    pub async fn reopen(
        &self,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<monthly_closures::Model, ClosureError> {
        let txn = self.db.begin().await?;

        let closure = find_scoped(&txn, user_id, id)
            .await?
            .ok_or(ClosureError::NotFound(id))?;
        if closure.status == ClosureStatus::Open {
            return Err(ClosureError::AlreadyOpen);
        }

        let now: DateTime<FixedOffset> = Utc::now().into();
        let result = monthly_closures::Entity::update_many()
            .col_expr(
                monthly_closures::Column::Status,
                Expr::value(ClosureStatus::Open),
            )
            .col_expr(
                monthly_closures::Column::ClosedAt,
                Expr::value(Option::<DateTime<FixedOffset>>::None),
            )
            .col_expr(monthly_closures::Column::UpdatedAt, Expr::value(now))
            .filter(monthly_closures::Column::Id.eq(id))
            .filter(monthly_closures::Column::Status.eq(ClosureStatus::Closed))
            .exec(&txn)
            .await?;
        if result.rows_affected == 0 {
            return Err(ClosureError::AlreadyOpen);
        }

        let updated = find_scoped(&txn, user_id, id)
            .await?
            .ok_or(ClosureError::NotFound(id))?;
        txn.commit().await?;
        Ok(updated)
    }

    /// Deletes a closure and all its snapshot rows.
    ///
    /// Allowed in either state: closures are financial records a user may
    /// legitimately purge, and nothing references them once gone. The child
    /// rows are removed in the same transaction (the schema also cascades).
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when the closure does not exist for this user.
    pub async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<(), ClosureError> {
        let txn = self.db.begin().await?;

        let closure = find_scoped(&txn, user_id, id)
            .await?
            .ok_or(ClosureError::NotFound(id))?;

        monthly_closure_expenses::Entity::delete_many()
            .filter(monthly_closure_expenses::Column::ClosureId.eq(closure.id))
            .exec(&txn)
            .await?;
        monthly_closure_clients::Entity::delete_many()
            .filter(monthly_closure_clients::Column::ClosureId.eq(closure.id))
            .exec(&txn)
            .await?;
        monthly_closures::Entity::delete_by_id(closure.id)
            .exec(&txn)
            .await?;

        txn.commit().await?;
        Ok(())
    }

    /// Attaches an expense line to an open closure.
    ///
    /// A registry selection copies the registry's current name, description,
    /// and amount at add time; later registry edits do not propagate. The
    /// same registry expense cannot be attached twice.
    ///
    /// # Errors
    ///
    /// Returns `ClosureClosed` when the closure is not open,
    /// `DuplicateExpense` when the registry expense is already attached, and
    /// validation errors for bad amounts or names.
    pub async fn add_expense(
        &self,
        user_id: Uuid,
        closure_id: Uuid,
        selection: ExpenseSelection,
    ) -> Result<monthly_closure_expenses::Model, ClosureError> {
        let txn = self.db.begin().await?;

        let closure = find_scoped(&txn, user_id, closure_id)
            .await?
            .ok_or(ClosureError::NotFound(closure_id))?;
        ensure_open(&closure)?;

        let draft = match selection {
            ExpenseSelection::Registry { expense_id, amount } => {
                let entry = expenses::Entity::find_by_id(expense_id)
                    .filter(expenses::Column::UserId.eq(user_id))
                    .one(&txn)
                    .await?
                    .ok_or(ClosureError::ExpenseNotFound(expense_id))?;

                let already_attached = monthly_closure_expenses::Entity::find()
                    .filter(monthly_closure_expenses::Column::ClosureId.eq(closure.id))
                    .filter(monthly_closure_expenses::Column::ExpenseId.eq(expense_id))
                    .one(&txn)
                    .await?;
                if already_attached.is_some() {
                    return Err(ClosureError::DuplicateExpense(expense_id));
                }

                let amount = amount.unwrap_or(entry.amount);
                if amount < Decimal::ZERO {
                    return Err(ClosureError::NegativeExpenseAmount);
                }

                ExpenseDraft {
                    expense_id: Some(entry.id),
                    name: entry.name,
                    description: entry.description,
                    amount,
                }
            }
            ExpenseSelection::Manual {
                name,
                description,
                amount,
            } => {
                if name.trim().is_empty() {
                    return Err(ClosureError::EmptyExpenseName);
                }
                if amount < Decimal::ZERO {
                    return Err(ClosureError::NegativeExpenseAmount);
                }

                ExpenseDraft {
                    expense_id: None,
                    name,
                    description,
                    amount,
                }
            }
        };

        let now: DateTime<FixedOffset> = Utc::now().into();
        let row = monthly_closure_expenses::ActiveModel {
            id: Set(Uuid::new_v4()),
            closure_id: Set(closure.id),
            expense_id: Set(draft.expense_id),
            name: Set(draft.name),
            description: Set(draft.description),
            amount: Set(draft.amount),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;
        Ok(row)
    }

    /// Replaces an expense line's amount (and optionally name/description)
    /// on an open closure.
    ///
    /// # Errors
    ///
    /// Returns `ClosureClosed` when the closure is not open,
    /// `ExpenseLineNotFound` when the line is not attached to it, and
    /// validation errors for bad amounts or names.
    pub async fn update_expense(
        &self,
        user_id: Uuid,
        closure_id: Uuid,
        line_id: Uuid,
        input: UpdateExpenseInput,
    ) -> Result<monthly_closure_expenses::Model, ClosureError> {
        let txn = self.db.begin().await?;

        let closure = find_scoped(&txn, user_id, closure_id)
            .await?
            .ok_or(ClosureError::NotFound(closure_id))?;
        ensure_open(&closure)?;

        let line = monthly_closure_expenses::Entity::find_by_id(line_id)
            .filter(monthly_closure_expenses::Column::ClosureId.eq(closure.id))
            .one(&txn)
            .await?
            .ok_or(ClosureError::ExpenseLineNotFound(line_id))?;

        if input.amount < Decimal::ZERO {
            return Err(ClosureError::NegativeExpenseAmount);
        }
        if let Some(name) = &input.name {
            if name.trim().is_empty() {
                return Err(ClosureError::EmptyExpenseName);
            }
        }

        let mut active: monthly_closure_expenses::ActiveModel = line.into();
        active.amount = Set(input.amount);
        if let Some(name) = input.name {
            active.name = Set(name);
        }
        if let Some(description) = input.description {
            active.description = Set(Some(description));
        }
        active.updated_at = Set(Utc::now().into());

        let updated = active.update(&txn).await?;
        txn.commit().await?;
        Ok(updated)
    }

    /// Removes an expense line from an open closure.
    ///
    /// This is the only way an attached snapshot disappears; registry
    /// deletions never touch it.
    ///
    /// # Errors
    ///
    /// Returns `ClosureClosed` when the closure is not open,
    /// `ExpenseLineNotFound` when the line is not attached to it.
    pub async fn remove_expense(
        &self,
        user_id: Uuid,
        closure_id: Uuid,
        line_id: Uuid,
    ) -> Result<(), ClosureError> {
        let txn = self.db.begin().await?;

        let closure = find_scoped(&txn, user_id, closure_id)
            .await?
            .ok_or(ClosureError::NotFound(closure_id))?;
        ensure_open(&closure)?;

        let result = monthly_closure_expenses::Entity::delete_many()
            .filter(monthly_closure_expenses::Column::Id.eq(line_id))
            .filter(monthly_closure_expenses::Column::ClosureId.eq(closure.id))
            .exec(&txn)
            .await?;
        if result.rows_affected == 0 {
            return Err(ClosureError::ExpenseLineNotFound(line_id));
        }

        txn.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn open_closure() -> monthly_closures::Model {
        let now: DateTime<FixedOffset> = Utc::now().into();
        monthly_closures::Model {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            month: 5,
            year: 2024,
            tax_percentage: dec!(10),
            hourly_rate: dec!(100),
            notes: None,
            status: ClosureStatus::Open,
            closed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_validate_billing_terms_accepts_bounds() {
        assert!(validate_billing_terms(1, 2024, dec!(0.01), dec!(0)).is_ok());
        assert!(validate_billing_terms(12, 2024, dec!(100), dec!(100)).is_ok());
    }

    #[test]
    fn test_validate_billing_terms_month() {
        assert!(matches!(
            validate_billing_terms(0, 2024, dec!(100), dec!(10)),
            Err(ClosureError::InvalidMonth(0))
        ));
        assert!(matches!(
            validate_billing_terms(13, 2024, dec!(100), dec!(10)),
            Err(ClosureError::InvalidMonth(13))
        ));
    }

    #[test]
    fn test_validate_billing_terms_year() {
        assert!(matches!(
            validate_billing_terms(5, 1999, dec!(100), dec!(10)),
            Err(ClosureError::InvalidYear(1999))
        ));
        assert!(matches!(
            validate_billing_terms(5, 2101, dec!(100), dec!(10)),
            Err(ClosureError::InvalidYear(2101))
        ));
    }

    #[test]
    fn test_validate_billing_terms_rate() {
        assert!(matches!(
            validate_billing_terms(5, 2024, dec!(0), dec!(10)),
            Err(ClosureError::NonPositiveHourlyRate)
        ));
        assert!(matches!(
            validate_billing_terms(5, 2024, dec!(-1), dec!(10)),
            Err(ClosureError::NonPositiveHourlyRate)
        ));
    }

    #[test]
    fn test_validate_billing_terms_tax() {
        assert!(matches!(
            validate_billing_terms(5, 2024, dec!(100), dec!(-0.01)),
            Err(ClosureError::TaxPercentageOutOfRange)
        ));
        assert!(matches!(
            validate_billing_terms(5, 2024, dec!(100), dec!(100.01)),
            Err(ClosureError::TaxPercentageOutOfRange)
        ));
    }

    #[test]
    fn test_ensure_open() {
        let mut closure = open_closure();
        assert!(ensure_open(&closure).is_ok());

        closure.status = ClosureStatus::Closed;
        assert!(matches!(
            ensure_open(&closure),
            Err(ClosureError::ClosureClosed)
        ));
    }

    #[test]
    fn test_close_gate_passes_clean_period() {
        assert!(close_gate(&PeriodFlags::default()).is_ok());
    }

    #[test]
    fn test_close_gate_reports_counts() {
        let flags = PeriodFlags {
            has_pending_tasks: true,
            pending_tasks_count: 2,
            has_tasks_without_hours: true,
            tasks_without_hours_count: 3,
        };

        match close_gate(&flags) {
            Err(ClosureError::CloseBlocked {
                pending_tasks,
                tasks_without_hours,
            }) => {
                assert_eq!(pending_tasks, 2);
                assert_eq!(tasks_without_hours, 3);
            }
            other => panic!("expected CloseBlocked, got {other:?}"),
        }
    }

    #[test]
    fn test_seed_error_mapping() {
        let id = Uuid::new_v4();
        assert!(matches!(
            ClosureError::from(ExpenseSeedError::UnknownExpense(id)),
            ClosureError::ExpenseNotFound(e) if e == id
        ));
        assert!(matches!(
            ClosureError::from(ExpenseSeedError::DuplicateSelection(id)),
            ClosureError::DuplicateExpense(e) if e == id
        ));
        assert!(matches!(
            ClosureError::from(ExpenseSeedError::NegativeAmount),
            ClosureError::NegativeExpenseAmount
        ));
    }
}
