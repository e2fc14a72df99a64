use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::{Coupon, DiscountType};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateCouponRequest {
    pub code: String,
    #[schema(value_type = String)]
    pub min_buy: Decimal,
    pub discount_type: DiscountType,
    #[schema(value_type = String)]
    pub discount_amount: Decimal,
    pub discount_start_date: DateTime<Utc>,
    pub discount_end_date: DateTime<Utc>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateCouponRequest {
    #[schema(value_type = Option<String>)]
    pub min_buy: Option<Decimal>,
    pub discount_type: Option<DiscountType>,
    #[schema(value_type = Option<String>)]
    pub discount_amount: Option<Decimal>,
    pub discount_start_date: Option<DateTime<Utc>>,
    pub discount_end_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CouponList {
    pub items: Vec<Coupon>,
}
