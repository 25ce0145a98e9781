pub mod audit;
pub mod code;
pub mod reward;
pub mod stamp;
pub mod system_config;
pub mod user;

use sea_orm::{DbErr, SqlErr};

/// True when `err` is a UNIQUE constraint failure. The loyalty invariants
/// (one stamp per code, one redemption per reward, one ACTIVE code per
/// customer) are all backed by unique indexes, so this is how a lost race
/// surfaces from the database.
pub(crate) fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}
