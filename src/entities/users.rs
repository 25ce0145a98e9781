use sea_orm::entity::prelude::*;

use super::sea_orm_active_enums::UserRole;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(unique)]
    pub phone: String,

    /// Argon2id password hash
    pub password_hash: String,

    pub name: Option<String>,

    pub role: UserRole,

    pub is_active: bool,

    /// Bearer token (64-char hex string)
    #[sea_orm(unique)]
    pub api_key: String,

    pub created_at: DateTimeUtc,

    pub updated_at: DateTimeUtc,

    pub last_login_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::customer_codes::Entity")]
    CustomerCodes,
    #[sea_orm(has_many = "super::rewards::Entity")]
    Rewards,
}

impl Related<super::customer_codes::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CustomerCodes.def()
    }
}

impl Related<super::rewards::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Rewards.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
