//! Period aggregation.
//!
//! Turns the raw task records of one billing period into per-client billing
//! subtotals plus the period-wide flags the close gate consumes.

use std::collections::BTreeMap;

use rust_decimal::Decimal;

use super::amounts::bill;
use super::types::{ClientSubtotal, PeriodBreakdown, PeriodFlags, TaskRecord, TaskStatus};

/// Aggregates a period's tasks into per-client subtotals and flags.
///
/// Tasks are grouped by client and their hours summed; clients whose period
/// tasks sum to zero hours are omitted from the subtotals (they still surface
/// through `tasks_without_hours_count`). Output is ordered by client ID so
/// identical input always yields identical output.
///
/// An empty task list produces an empty breakdown, not an error; the caller
/// decides whether an empty closure is permitted.
#[must_use]
pub fn aggregate_period(
    tasks: &[TaskRecord],
    hourly_rate: Decimal,
    tax_percentage: Decimal,
) -> PeriodBreakdown {
    let mut hours_by_client: BTreeMap<uuid::Uuid, Decimal> = BTreeMap::new();
    let mut flags = PeriodFlags::default();

    for task in tasks {
        if task.status == TaskStatus::Pending {
            flags.pending_tasks_count += 1;
        }
        if task.hours_spent.is_zero() {
            flags.tasks_without_hours_count += 1;
        }

        *hours_by_client.entry(task.client_id).or_default() += task.hours_spent;
    }

    flags.has_pending_tasks = flags.pending_tasks_count > 0;
    flags.has_tasks_without_hours = flags.tasks_without_hours_count > 0;

    let clients = hours_by_client
        .into_iter()
        .filter(|(_, total_hours)| !total_hours.is_zero())
        .map(|(client_id, total_hours)| {
            let billed = bill(total_hours, hourly_rate, tax_percentage);
            ClientSubtotal {
                client_id,
                total_hours,
                gross_amount: billed.gross,
                tax_amount: billed.tax,
                net_amount: billed.net,
            }
        })
        .collect();

    PeriodBreakdown { clients, flags }
}
