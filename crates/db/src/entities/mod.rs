//! `SeaORM` entity definitions.

pub mod clients;
pub mod expenses;
pub mod monthly_closure_clients;
pub mod monthly_closure_expenses;
pub mod monthly_closures;
pub mod sea_orm_active_enums;
pub mod tasks;
