pub use super::audit_logs::Entity as AuditLogs;
pub use super::customer_codes::Entity as CustomerCodes;
pub use super::redemptions::Entity as Redemptions;
pub use super::rewards::Entity as Rewards;
pub use super::stamps::Entity as Stamps;
pub use super::system_config::Entity as SystemConfig;
pub use super::users::Entity as Users;
