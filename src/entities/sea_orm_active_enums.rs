use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
pub enum UserRole {
    #[sea_orm(string_value = "CUSTOMER")]
    #[serde(rename = "CUSTOMER")]
    Customer,
    #[sea_orm(string_value = "MANAGER")]
    #[serde(rename = "MANAGER")]
    Manager,
    #[sea_orm(string_value = "ADMIN")]
    #[serde(rename = "ADMIN")]
    Admin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
pub enum CodeStatus {
    #[sea_orm(string_value = "ACTIVE")]
    #[serde(rename = "ACTIVE")]
    Active,
    #[sea_orm(string_value = "EXPIRED")]
    #[serde(rename = "EXPIRED")]
    Expired,
    #[sea_orm(string_value = "USED")]
    #[serde(rename = "USED")]
    Used,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
pub enum StampStatus {
    #[sea_orm(string_value = "ACTIVE")]
    #[serde(rename = "ACTIVE")]
    Active,
    #[sea_orm(string_value = "REDEEMED")]
    #[serde(rename = "REDEEMED")]
    Redeemed,
    #[sea_orm(string_value = "EXPIRED")]
    #[serde(rename = "EXPIRED")]
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
pub enum RewardType {
    #[sea_orm(string_value = "GYOZA_FREE")]
    #[serde(rename = "GYOZA_FREE")]
    GyozaFree,
    #[sea_orm(string_value = "DISCOUNT_10")]
    #[serde(rename = "DISCOUNT_10")]
    Discount10,
    #[sea_orm(string_value = "DISCOUNT_15")]
    #[serde(rename = "DISCOUNT_15")]
    Discount15,
    #[sea_orm(string_value = "SPECIAL_ITEM")]
    #[serde(rename = "SPECIAL_ITEM")]
    SpecialItem,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
pub enum RewardStatus {
    #[sea_orm(string_value = "AVAILABLE")]
    #[serde(rename = "AVAILABLE")]
    Available,
    #[sea_orm(string_value = "REDEEMED")]
    #[serde(rename = "REDEEMED")]
    Redeemed,
    #[sea_orm(string_value = "EXPIRED")]
    #[serde(rename = "EXPIRED")]
    Expired,
}
