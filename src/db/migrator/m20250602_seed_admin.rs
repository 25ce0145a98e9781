use crate::db::repositories::user::generate_api_key;
use crate::entities::sea_orm_active_enums::UserRole;
use crate::entities::users;
use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::{ColumnTrait, EntityTrait, QueryFilter, Set};

#[derive(DeriveMigrationName)]
pub struct Migration;

/// Phone number of the bootstrap administrator.
pub const DEFAULT_ADMIN_PHONE: &str = "0000000000";

const BOOTSTRAP_PASSWORD_LEN: usize = 20;

fn hash_bootstrap_password(password: &str) -> Result<String, DbErr> {
    use argon2::{
        Argon2,
        password_hash::{PasswordHasher, SaltString, rand_core::OsRng},
    };

    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| DbErr::Migration(format!("Failed to hash bootstrap password: {e}")))
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        let existing = users::Entity::find()
            .filter(users::Column::Phone.eq(DEFAULT_ADMIN_PHONE))
            .one(db)
            .await?;
        if existing.is_some() {
            return Ok(());
        }

        // Credentials are random per database and only ever shown in this log line.
        let password: String = generate_api_key()
            .chars()
            .take(BOOTSTRAP_PASSWORD_LEN)
            .collect();
        let api_key = generate_api_key();

        let now = chrono::Utc::now();
        let admin = users::ActiveModel {
            id: Set(uuid::Uuid::new_v4()),
            phone: Set(DEFAULT_ADMIN_PHONE.to_string()),
            password_hash: Set(hash_bootstrap_password(&password)?),
            name: Set(Some("Administrator".to_string())),
            role: Set(UserRole::Admin),
            is_active: Set(true),
            api_key: Set(api_key.clone()),
            created_at: Set(now),
            updated_at: Set(now),
            last_login_at: Set(None),
        };
        users::Entity::insert(admin).exec(db).await?;

        tracing::warn!(
            phone = DEFAULT_ADMIN_PHONE,
            password = %password,
            api_key = %api_key,
            "Seeded bootstrap administrator. Rotate with `kinton user reset --phone {}`",
            DEFAULT_ADMIN_PHONE
        );

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        users::Entity::delete_many()
            .filter(users::Column::Phone.eq(DEFAULT_ADMIN_PHONE))
            .filter(users::Column::Role.eq(UserRole::Admin))
            .exec(db)
            .await?;

        Ok(())
    }
}
