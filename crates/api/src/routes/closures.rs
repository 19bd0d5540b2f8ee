//! Monthly closure routes.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::{DateTime, FixedOffset};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info};
use uuid::Uuid;

use crate::{AppState, middleware::AuthUser};
use worklog_core::closure::{ExpenseSelection, period_label};
use worklog_db::entities::{
    monthly_closure_expenses, monthly_closures, sea_orm_active_enums::ClosureStatus,
};
use worklog_db::repositories::{
    ClosureError, ClosureFilter, ClosureRepository, ClosureWithTotals, CreateClosureInput,
    UpdateClosureInput, UpdateExpenseInput,
};

/// Creates the closure routes (requires auth middleware to be applied
/// externally).
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/closures", get(list_closures).post(create_closure))
        .route(
            "/closures/{id}",
            get(get_closure).patch(update_closure).delete(delete_closure),
        )
        .route("/closures/{id}/close", post(close_closure))
        .route("/closures/{id}/reopen", post(reopen_closure))
        .route("/closures/{id}/expenses", post(add_expense))
        .route(
            "/closures/{id}/expenses/{line_id}",
            axum::routing::patch(update_expense).delete(remove_expense),
        )
}

/// Request body for creating a closure.
#[derive(Debug, Deserialize)]
pub struct CreateClosureRequest {
    /// Billing month (1-12).
    pub month: u32,
    /// Billing year.
    pub year: i32,
    /// Tax percentage withheld from gross amounts.
    pub tax_percentage: Decimal,
    /// Hourly rate for the period.
    pub hourly_rate: Decimal,
    /// Free-text notes.
    pub notes: Option<String>,
    /// Explicit expense selections (by registry reference or manual fields).
    #[serde(default)]
    pub expenses: Vec<ExpenseSelection>,
}

/// Request body for updating closure metadata.
#[derive(Debug, Deserialize)]
pub struct UpdateClosureRequest {
    /// New tax percentage.
    pub tax_percentage: Option<Decimal>,
    /// New hourly rate.
    pub hourly_rate: Option<Decimal>,
    /// New notes.
    pub notes: Option<String>,
}

/// Request body for updating an expense line.
#[derive(Debug, Deserialize)]
pub struct UpdateExpenseRequest {
    /// Replacement amount.
    pub amount: Decimal,
    /// Optional replacement name.
    pub name: Option<String>,
    /// Optional replacement description.
    pub description: Option<String>,
}

/// Query parameters for listing closures.
#[derive(Debug, Deserialize)]
pub struct ListClosuresQuery {
    /// Restrict to one year.
    pub year: Option<i32>,
    /// Restrict to one status: "open" or "closed".
    pub status: Option<String>,
}

/// Response for a per-client snapshot line.
#[derive(Debug, Serialize)]
pub struct ClientLineResponse {
    /// Snapshot row ID.
    pub id: Uuid,
    /// The billed client.
    pub client: ClientRefResponse,
    /// Hours billed.
    pub total_hours: Decimal,
    /// Gross amount.
    pub gross_amount: Decimal,
    /// Tax amount.
    pub tax_amount: Decimal,
    /// Net amount.
    pub net_amount: Decimal,
}

/// Client reference within a snapshot line.
#[derive(Debug, Serialize)]
pub struct ClientRefResponse {
    /// Client ID.
    pub id: Uuid,
    /// Client name.
    pub name: String,
}

/// Response for an expense snapshot line.
#[derive(Debug, Serialize)]
pub struct ExpenseLineResponse {
    /// Snapshot row ID.
    pub id: Uuid,
    /// Registry reference, null for manual lines.
    pub expense_id: Option<Uuid>,
    /// Line name.
    pub name: String,
    /// Line description.
    pub description: Option<String>,
    /// Line amount.
    pub amount: Decimal,
}

/// Read-time totals over the snapshot rows.
#[derive(Debug, Serialize)]
pub struct TotalsResponse {
    /// Σ hours.
    pub total_hours: Decimal,
    /// Σ gross.
    pub gross_amount: Decimal,
    /// Σ tax.
    pub tax_amount: Decimal,
    /// Σ net.
    pub net_amount: Decimal,
    /// Σ expenses.
    pub total_expenses: Decimal,
    /// Net minus expenses.
    pub final_amount: Decimal,
}

/// Full closure response with snapshot rows, totals, and fresh flags.
#[derive(Debug, Serialize)]
pub struct ClosureResponse {
    /// Closure ID.
    pub id: Uuid,
    /// Billing month.
    pub month: i16,
    /// Billing year.
    pub year: i32,
    /// Display label, e.g. "May 2024".
    pub period: String,
    /// Tax percentage.
    pub tax_percentage: Decimal,
    /// Hourly rate.
    pub hourly_rate: Decimal,
    /// Notes.
    pub notes: Option<String>,
    /// Status: open or closed.
    pub status: String,
    /// When the closure was closed, null while open.
    pub closed_at: Option<DateTime<FixedOffset>>,
    /// Per-client snapshot lines.
    pub clients: Vec<ClientLineResponse>,
    /// Per-expense snapshot lines.
    pub expenses: Vec<ExpenseLineResponse>,
    /// Read-time totals.
    pub totals: TotalsResponse,
    /// Whether the period currently has pending tasks.
    pub has_pending_tasks: bool,
    /// Number of pending tasks in the period.
    pub pending_tasks_count: u64,
    /// Whether the period currently has zero-hours tasks.
    pub has_tasks_without_hours: bool,
    /// Number of zero-hours tasks in the period.
    pub tasks_without_hours_count: u64,
}

/// Summary response for list views (no totals materialized).
#[derive(Debug, Serialize)]
pub struct ClosureSummaryResponse {
    /// Closure ID.
    pub id: Uuid,
    /// Billing month.
    pub month: i16,
    /// Billing year.
    pub year: i32,
    /// Display label, e.g. "May 2024".
    pub period: String,
    /// Status: open or closed.
    pub status: String,
    /// When the closure was closed.
    pub closed_at: Option<DateTime<FixedOffset>>,
    /// Notes.
    pub notes: Option<String>,
}

fn status_to_string(status: &ClosureStatus) -> String {
    match status {
        ClosureStatus::Open => "open".to_string(),
        ClosureStatus::Closed => "closed".to_string(),
    }
}

fn string_to_status(s: &str) -> Option<ClosureStatus> {
    match s.to_lowercase().as_str() {
        "open" => Some(ClosureStatus::Open),
        "closed" => Some(ClosureStatus::Closed),
        _ => None,
    }
}

fn label_for(month: i16, year: i32) -> String {
    period_label(u32::try_from(month).unwrap_or(0), year)
}

fn expense_line_response(row: monthly_closure_expenses::Model) -> ExpenseLineResponse {
    ExpenseLineResponse {
        id: row.id,
        expense_id: row.expense_id,
        name: row.name,
        description: row.description,
        amount: row.amount,
    }
}

fn summary_response(closure: monthly_closures::Model) -> ClosureSummaryResponse {
    ClosureSummaryResponse {
        id: closure.id,
        period: label_for(closure.month, closure.year),
        month: closure.month,
        year: closure.year,
        status: status_to_string(&closure.status),
        closed_at: closure.closed_at,
        notes: closure.notes,
    }
}

fn closure_response(detail: ClosureWithTotals) -> ClosureResponse {
    let ClosureWithTotals {
        closure,
        clients,
        expenses,
        totals,
        flags,
    } = detail;

    ClosureResponse {
        id: closure.id,
        period: label_for(closure.month, closure.year),
        month: closure.month,
        year: closure.year,
        tax_percentage: closure.tax_percentage,
        hourly_rate: closure.hourly_rate,
        notes: closure.notes,
        status: status_to_string(&closure.status),
        closed_at: closure.closed_at,
        clients: clients
            .into_iter()
            .map(|line| ClientLineResponse {
                id: line.row.id,
                client: ClientRefResponse {
                    id: line.row.client_id,
                    name: line.client_name,
                },
                total_hours: line.row.total_hours,
                gross_amount: line.row.gross_amount,
                tax_amount: line.row.tax_amount,
                net_amount: line.row.net_amount,
            })
            .collect(),
        expenses: expenses.into_iter().map(expense_line_response).collect(),
        totals: TotalsResponse {
            total_hours: totals.total_hours,
            gross_amount: totals.gross_amount,
            tax_amount: totals.tax_amount,
            net_amount: totals.net_amount,
            total_expenses: totals.total_expenses,
            final_amount: totals.final_amount,
        },
        has_pending_tasks: flags.has_pending_tasks,
        pending_tasks_count: flags.pending_tasks_count,
        has_tasks_without_hours: flags.has_tasks_without_hours,
        tasks_without_hours_count: flags.tasks_without_hours_count,
    }
}

/// Maps repository errors to HTTP responses with structured bodies.
fn error_response(err: ClosureError) -> Response {
    let (status, code, message) = match &err {
        ClosureError::InvalidMonth(_) => (
            StatusCode::BAD_REQUEST,
            "invalid_month",
            "Month must be between 1 and 12".to_string(),
        ),
        ClosureError::InvalidYear(_) => (
            StatusCode::BAD_REQUEST,
            "invalid_year",
            "Year is out of range".to_string(),
        ),
        ClosureError::NonPositiveHourlyRate => (
            StatusCode::BAD_REQUEST,
            "invalid_hourly_rate",
            "Hourly rate must be positive".to_string(),
        ),
        ClosureError::TaxPercentageOutOfRange => (
            StatusCode::BAD_REQUEST,
            "invalid_tax_percentage",
            "Tax percentage must be between 0 and 100".to_string(),
        ),
        ClosureError::NegativeExpenseAmount => (
            StatusCode::BAD_REQUEST,
            "invalid_expense_amount",
            "Expense amount cannot be negative".to_string(),
        ),
        ClosureError::EmptyExpenseName => (
            StatusCode::BAD_REQUEST,
            "invalid_expense_name",
            "Expense name cannot be empty".to_string(),
        ),
        ClosureError::DuplicateClosure { month, year } => (
            StatusCode::CONFLICT,
            "duplicate_closure",
            format!("A closure already exists for {month}/{year}"),
        ),
        ClosureError::DuplicateExpense(_) => (
            StatusCode::CONFLICT,
            "duplicate_expense",
            "Expense is already attached to this closure".to_string(),
        ),
        ClosureError::ClosureClosed => (
            StatusCode::CONFLICT,
            "closure_closed",
            "Closure is closed and cannot be modified".to_string(),
        ),
        ClosureError::AlreadyOpen => (
            StatusCode::CONFLICT,
            "closure_already_open",
            "Closure is already open".to_string(),
        ),
        ClosureError::CloseBlocked {
            pending_tasks,
            tasks_without_hours,
        } => {
            return (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({
                    "error": "closure_blocked",
                    "message": "Period has unresolved tasks",
                    "pending_tasks_count": pending_tasks,
                    "tasks_without_hours_count": tasks_without_hours
                })),
            )
                .into_response();
        }
        ClosureError::ExpenseNotFound(_) => (
            StatusCode::NOT_FOUND,
            "expense_not_found",
            "Expense not found".to_string(),
        ),
        ClosureError::NotFound(_) => (
            StatusCode::NOT_FOUND,
            "not_found",
            "Closure not found".to_string(),
        ),
        ClosureError::ExpenseLineNotFound(_) => (
            StatusCode::NOT_FOUND,
            "expense_line_not_found",
            "Expense line not found".to_string(),
        ),
        ClosureError::Database(_) => {
            error!(error = %err, "Database error in closure operation");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "internal_error",
                    "message": "An error occurred"
                })),
            )
                .into_response();
        }
    };

    (status, Json(json!({ "error": code, "message": message }))).into_response()
}

fn not_found_response() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": "not_found",
            "message": "Closure not found"
        })),
    )
        .into_response()
}

/// POST `/closures` - Create a closure for a billing period.
async fn create_closure(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<CreateClosureRequest>,
) -> impl IntoResponse {
    let repo = ClosureRepository::new((*state.db).clone());

    let input = CreateClosureInput {
        user_id: auth.user_id(),
        month: payload.month,
        year: payload.year,
        tax_percentage: payload.tax_percentage,
        hourly_rate: payload.hourly_rate,
        notes: payload.notes,
        expense_selections: payload.expenses,
    };

    match repo.create(input).await {
        Ok(detail) => {
            info!(
                user_id = %auth.user_id(),
                closure_id = %detail.closure.id,
                month = detail.closure.month,
                year = detail.closure.year,
                "Monthly closure created"
            );
            (StatusCode::CREATED, Json(closure_response(detail))).into_response()
        }
        Err(e) => error_response(e),
    }
}

/// GET `/closures` - List closures for table views.
async fn list_closures(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<ListClosuresQuery>,
) -> impl IntoResponse {
    let status = match query.status.as_deref() {
        None => None,
        Some(s) => match string_to_status(s) {
            Some(status) => Some(status),
            None => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(json!({
                        "error": "invalid_status",
                        "message": "Status must be one of: open, closed"
                    })),
                )
                    .into_response();
            }
        },
    };

    let repo = ClosureRepository::new((*state.db).clone());
    let filter = ClosureFilter {
        year: query.year,
        status,
    };

    match repo.list(auth.user_id(), filter).await {
        Ok(closures) => {
            let response: Vec<ClosureSummaryResponse> =
                closures.into_iter().map(summary_response).collect();
            (StatusCode::OK, Json(json!({ "closures": response }))).into_response()
        }
        Err(e) => error_response(e),
    }
}

/// GET `/closures/{id}` - Read a closure with snapshot rows and totals.
async fn get_closure(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    let repo = ClosureRepository::new((*state.db).clone());

    match repo.find_with_totals(auth.user_id(), id).await {
        Ok(Some(detail)) => (StatusCode::OK, Json(closure_response(detail))).into_response(),
        Ok(None) => not_found_response(),
        Err(e) => error_response(e),
    }
}

/// PATCH `/closures/{id}` - Update an open closure's metadata.
async fn update_closure(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateClosureRequest>,
) -> impl IntoResponse {
    let repo = ClosureRepository::new((*state.db).clone());

    let input = UpdateClosureInput {
        tax_percentage: payload.tax_percentage,
        hourly_rate: payload.hourly_rate,
        notes: payload.notes,
    };

    match repo.update_metadata(auth.user_id(), id, input).await {
        Ok(closure) => (StatusCode::OK, Json(summary_response(closure))).into_response(),
        Err(e) => error_response(e),
    }
}

/// POST `/closures/{id}/close` - Close an open closure.
async fn close_closure(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    let repo = ClosureRepository::new((*state.db).clone());

    match repo.close(auth.user_id(), id).await {
        Ok(closure) => {
            info!(
                user_id = %auth.user_id(),
                closure_id = %closure.id,
                "Monthly closure closed"
            );
            (StatusCode::OK, Json(summary_response(closure))).into_response()
        }
        Err(e) => error_response(e),
    }
}

/// POST `/closures/{id}/reopen` - Reopen a closed closure.
async fn reopen_closure(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    let repo = ClosureRepository::new((*state.db).clone());

    match repo.reopen(auth.user_id(), id).await {
        Ok(closure) => {
            info!(
                user_id = %auth.user_id(),
                closure_id = %closure.id,
                "Monthly closure reopened"
            );
            (StatusCode::OK, Json(summary_response(closure))).into_response()
        }
        Err(e) => error_response(e),
    }
}

/// DELETE `/closures/{id}` - Delete a closure and its snapshot rows.
async fn delete_closure(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    let repo = ClosureRepository::new((*state.db).clone());

    match repo.delete(auth.user_id(), id).await {
        Ok(()) => {
            info!(
                user_id = %auth.user_id(),
                closure_id = %id,
                "Monthly closure deleted"
            );
            StatusCode::NO_CONTENT.into_response()
        }
        Err(e) => error_response(e),
    }
}

/// POST `/closures/{id}/expenses` - Attach an expense line.
async fn add_expense(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(selection): Json<ExpenseSelection>,
) -> impl IntoResponse {
    let repo = ClosureRepository::new((*state.db).clone());

    match repo.add_expense(auth.user_id(), id, selection).await {
        Ok(line) => (StatusCode::CREATED, Json(expense_line_response(line))).into_response(),
        Err(e) => error_response(e),
    }
}

/// PATCH `/closures/{id}/expenses/{line_id}` - Update an expense line.
async fn update_expense(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((id, line_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<UpdateExpenseRequest>,
) -> impl IntoResponse {
    let repo = ClosureRepository::new((*state.db).clone());

    let input = UpdateExpenseInput {
        amount: payload.amount,
        name: payload.name,
        description: payload.description,
    };

    match repo.update_expense(auth.user_id(), id, line_id, input).await {
        Ok(line) => (StatusCode::OK, Json(expense_line_response(line))).into_response(),
        Err(e) => error_response(e),
    }
}

/// DELETE `/closures/{id}/expenses/{line_id}` - Remove an expense line.
async fn remove_expense(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((id, line_id)): Path<(Uuid, Uuid)>,
) -> impl IntoResponse {
    let repo = ClosureRepository::new((*state.db).clone());

    match repo.remove_expense(auth.user_id(), id, line_id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(e),
    }
}
