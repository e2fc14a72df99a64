use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ProductType {
    Single,
    Variant,
}

impl ProductType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductType::Single => "single",
            ProductType::Variant => "variant",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "single" => Some(ProductType::Single),
            "variant" => Some(ProductType::Variant),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    Fixed,
    Percent,
}

impl DiscountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscountType::Fixed => "fixed",
            DiscountType::Percent => "percent",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "fixed" => Some(DiscountType::Fixed),
            "percent" => Some(DiscountType::Percent),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub parent_id: Option<Uuid>,
    pub status: String,
    pub popular: bool,
    pub show_in_home: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Brand {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Product {
    pub id: Uuid,
    pub sku: String,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub category_id: Uuid,
    pub brand_id: Option<Uuid>,
    pub product_type: ProductType,
    pub status: String,
    pub popular: bool,
    pub created_at: DateTime<Utc>,
}

/// One price record: the single record of a SINGLE product, or one
/// variant's record of a VARIANT product. Campaign discount fields are
/// only honored while `now` falls inside the inclusive window.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PriceRecord {
    #[schema(value_type = String)]
    pub price: Decimal,
    #[schema(value_type = Option<String>)]
    pub special_price: Option<Decimal>,
    pub special_price_type: Option<DiscountType>,
    pub quantity: i32,
    pub in_stock: bool,
    pub discount_start_date: Option<DateTime<Utc>>,
    pub discount_end_date: Option<DateTime<Utc>>,
    pub discount_type: Option<DiscountType>,
    #[schema(value_type = Option<String>)]
    pub discount_amount: Option<Decimal>,
}

/// A sellable variant of a VARIANT product. `attribute_values` is the
/// identity (attribute id -> value id); `label` is display-only.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Variant {
    pub id: Uuid,
    pub sku: String,
    pub label: String,
    pub is_default: bool,
    #[schema(value_type = Object)]
    pub attribute_values: BTreeMap<Uuid, Uuid>,
    pub price: PriceRecord,
    pub created_at: DateTime<Utc>,
}

/// Everything price resolution needs to know about one product.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ProductPricing {
    pub product_id: Uuid,
    pub product_type: ProductType,
    /// Present for SINGLE products only.
    pub base: Option<PriceRecord>,
    /// Present for VARIANT products only, in creation order.
    pub variants: Vec<Variant>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Coupon {
    pub id: Uuid,
    pub code: String,
    #[schema(value_type = String)]
    pub min_buy: Decimal,
    pub discount_type: DiscountType,
    #[schema(value_type = String)]
    pub discount_amount: Decimal,
    pub discount_start_date: DateTime<Utc>,
    pub discount_end_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Order {
    pub id: Uuid,
    pub code: String,
    pub user_id: Option<Uuid>,
    #[schema(value_type = String)]
    pub subtotal: Decimal,
    #[schema(value_type = String)]
    pub discount: Decimal,
    #[schema(value_type = String)]
    pub total: Decimal,
    pub coupon_code: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    #[schema(value_type = String)]
    pub price: Decimal,
    pub attributes: String,
    pub created_at: DateTime<Utc>,
}
