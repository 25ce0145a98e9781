//! `SeaORM` implementation of the `AuthService` trait.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;
use uuid::Uuid;

use crate::clock::Clock;
use crate::config::SecurityConfig;
use crate::db::{NewUser, Store};
use crate::domain::events::{AuditAction, AuditEvent};
use crate::domain::{Actor, RequestMeta, UserRole};
use crate::services::audit::AuditSink;
use crate::services::auth_service::{AuthError, AuthService, LoginResult, Registration, UserInfo};

const MIN_PHONE_LEN: usize = 10;
const MIN_PASSWORD_LEN: usize = 6;
const MIN_NAME_LEN: usize = 2;

pub struct SeaOrmAuthService {
    store: Store,
    security: SecurityConfig,
    clock: Arc<dyn Clock>,
    audit: Arc<dyn AuditSink>,
}

impl SeaOrmAuthService {
    #[must_use]
    pub fn new(
        store: Store,
        security: SecurityConfig,
        clock: Arc<dyn Clock>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            store,
            security,
            clock,
            audit,
        }
    }

    fn check_new_password(password: &str) -> Result<(), AuthError> {
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::Validation(format!(
                "Password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        Ok(())
    }

    async fn create(
        &self,
        registration: Registration,
        role: UserRole,
    ) -> Result<LoginResult, AuthError> {
        let phone = registration.phone.trim().to_string();
        let name = registration.name.trim().to_string();

        if phone.chars().count() < MIN_PHONE_LEN {
            return Err(AuthError::Validation(format!(
                "Phone number must be at least {MIN_PHONE_LEN} characters"
            )));
        }

        Self::check_new_password(&registration.password)?;

        if name.chars().count() < MIN_NAME_LEN {
            return Err(AuthError::Validation(format!(
                "Name must be at least {MIN_NAME_LEN} characters"
            )));
        }

        if self.store.get_user_by_phone(&phone).await?.is_some() {
            return Err(AuthError::PhoneTaken);
        }

        let user = self
            .store
            .create_user(
                NewUser {
                    phone,
                    password: registration.password,
                    name: Some(name),
                    role,
                },
                &self.security,
                self.clock.now(),
            )
            .await?;

        info!(user_id = %user.id, role = %user.role, "User created");

        let token = user.api_key.clone();
        Ok(LoginResult {
            user: UserInfo::from(user),
            token,
        })
    }
}

#[async_trait]
impl AuthService for SeaOrmAuthService {
    async fn register(
        &self,
        registration: Registration,
        meta: RequestMeta,
    ) -> Result<LoginResult, AuthError> {
        let result = self.create(registration, UserRole::Customer).await?;

        self.audit
            .record(AuditEvent::new(
                result.user.id,
                AuditAction::UserRegistered {
                    phone: result.user.phone.clone(),
                },
                meta,
            ))
            .await;

        Ok(result)
    }

    async fn login(
        &self,
        phone: &str,
        password: &str,
        meta: RequestMeta,
    ) -> Result<LoginResult, AuthError> {
        let user = self
            .store
            .verify_user_password(phone.trim(), password)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !user.is_active {
            return Err(AuthError::AccountDisabled);
        }

        let now = self.clock.now();
        self.store.record_user_login(user.id, now).await?;

        self.audit
            .record(AuditEvent::new(
                user.id,
                AuditAction::UserLogin {
                    phone: user.phone.clone(),
                },
                meta,
            ))
            .await;

        info!(user_id = %user.id, "User logged in");

        let token = user.api_key.clone();
        let mut info = UserInfo::from(user);
        info.last_login_at = Some(now);

        Ok(LoginResult { user: info, token })
    }

    async fn create_user(
        &self,
        registration: Registration,
        role: UserRole,
    ) -> Result<LoginResult, AuthError> {
        self.create(registration, role).await
    }

    async fn authenticate(&self, token: &str) -> Result<Option<Actor>, AuthError> {
        let Some(user) = self.store.get_user_by_api_key(token).await? else {
            return Ok(None);
        };

        if !user.is_active {
            return Err(AuthError::AccountDisabled);
        }

        Ok(Some(Actor::new(user.id, user.role)))
    }

    async fn get_user_info(&self, user_id: Uuid) -> Result<UserInfo, AuthError> {
        self.store
            .get_user(user_id)
            .await?
            .map(UserInfo::from)
            .ok_or(AuthError::UserNotFound)
    }

    async fn change_password(
        &self,
        user_id: Uuid,
        current_password: &str,
        new_password: &str,
        meta: RequestMeta,
    ) -> Result<(), AuthError> {
        Self::check_new_password(new_password)?;
        if current_password == new_password {
            return Err(AuthError::Validation(
                "New password must be different from current password".to_string(),
            ));
        }

        let user = self
            .store
            .get_user(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        self.store
            .verify_user_password(&user.phone, current_password)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        self.store
            .update_user_password(user.id, new_password, &self.security, self.clock.now())
            .await?;

        self.audit
            .record(AuditEvent::new(
                user.id,
                AuditAction::PasswordChanged { phone: user.phone },
                meta,
            ))
            .await;

        info!(user_id = %user_id, "Password changed");
        Ok(())
    }

    async fn regenerate_api_key(
        &self,
        user_id: Uuid,
        meta: RequestMeta,
    ) -> Result<String, AuthError> {
        let user = self
            .store
            .get_user(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        let api_key = self
            .store
            .regenerate_user_api_key(user.id, self.clock.now())
            .await?;

        self.audit
            .record(AuditEvent::new(
                user.id,
                AuditAction::ApiKeyRegenerated { phone: user.phone },
                meta,
            ))
            .await;

        info!(user_id = %user_id, "API key regenerated");
        Ok(api_key)
    }

    async fn reset_credentials(
        &self,
        phone: &str,
        new_password: Option<String>,
    ) -> Result<LoginResult, AuthError> {
        if let Some(password) = &new_password {
            Self::check_new_password(password)?;
        }

        let user = self
            .store
            .get_user_by_phone(phone.trim())
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if let Some(password) = new_password {
            self.store
                .update_user_password(user.id, &password, &self.security, self.clock.now())
                .await?;
            self.audit
                .record(AuditEvent::new(
                    user.id,
                    AuditAction::PasswordChanged {
                        phone: user.phone.clone(),
                    },
                    RequestMeta::default(),
                ))
                .await;
        }

        let token = self
            .regenerate_api_key(user.id, RequestMeta::default())
            .await?;

        Ok(LoginResult {
            user: UserInfo::from(user),
            token,
        })
    }
}
