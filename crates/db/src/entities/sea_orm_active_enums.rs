//! Active enums shared by the entities.
//!
//! String-backed so the schema stays portable across Postgres and SQLite.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Status of a task.
#[derive(Debug, Clone, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Work is not finished yet.
    #[sea_orm(string_value = "pending")]
    Pending,
    /// Work is done.
    #[sea_orm(string_value = "completed")]
    Completed,
}

/// Status of a monthly closure.
#[derive(Debug, Clone, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
pub enum ClosureStatus {
    /// Snapshot rows may still be mutated.
    #[sea_orm(string_value = "open")]
    Open,
    /// The financial record is frozen.
    #[sea_orm(string_value = "closed")]
    Closed,
}
