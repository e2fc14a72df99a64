use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::DiscountType;

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct FlashDealProductInput {
    pub product_id: Uuid,
    pub discount_type: DiscountType,
    #[schema(value_type = String)]
    pub discount_amount: Decimal,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateFlashDealRequest {
    pub campaign_name: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub products: Vec<FlashDealProductInput>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FlashDealProductDto {
    pub product_id: Uuid,
    pub discount_type: DiscountType,
    #[schema(value_type = String)]
    pub discount_amount: Decimal,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FlashDealDto {
    pub id: Uuid,
    pub campaign_name: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub status: String,
    pub products: Vec<FlashDealProductDto>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FlashDealList {
    pub items: Vec<FlashDealDto>,
}
