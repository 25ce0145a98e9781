pub mod prelude;

pub mod audit_logs;
pub mod customer_codes;
pub mod redemptions;
pub mod rewards;
pub mod sea_orm_active_enums;
pub mod stamps;
pub mod system_config;
pub mod users;
