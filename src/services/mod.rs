pub mod audit;
pub use audit::{AuditSink, StoreAuditSink};

pub mod auth_service;
pub mod auth_service_impl;
pub use auth_service::{AuthError, AuthService, LoginResult, Registration, UserInfo};
pub use auth_service_impl::SeaOrmAuthService;

pub mod loyalty_service;
pub mod loyalty_service_impl;
pub use loyalty_service::{
    CodeValidation, Dashboard, IssuedCode, LoyaltyError, LoyaltyService, LoyaltySettings,
    RedemptionRecord, RewardRecord, RewardRedeemed, StampAdded, StampRecord,
};
pub use loyalty_service_impl::{CodeSource, SeaOrmLoyaltyService};
