use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{DiscountType, Product, ProductPricing, ProductType};

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct PriceInput {
    #[schema(value_type = String)]
    pub price: Decimal,
    #[schema(value_type = Option<String>)]
    pub special_price: Option<Decimal>,
    pub special_price_type: Option<DiscountType>,
    pub quantity: i32,
    pub in_stock: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct VariantInput {
    pub sku: String,
    /// Display label; derived from attribute values if omitted.
    pub label: Option<String>,
    pub is_default: bool,
    #[schema(value_type = Object)]
    pub attribute_values: BTreeMap<Uuid, Uuid>,
    pub price: PriceInput,
}

/// Which attribute values a product advertises for faceted filtering.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ProductAttributeInput {
    pub attribute_id: Uuid,
    pub attribute_value_ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateProductRequest {
    pub sku: String,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub category_id: Uuid,
    pub brand_id: Option<Uuid>,
    pub product_type: ProductType,
    pub status: Option<String>,
    pub popular: Option<bool>,
    pub attributes: Option<Vec<ProductAttributeInput>>,
    /// Required for SINGLE products.
    pub price: Option<PriceInput>,
    /// Required for VARIANT products; replaces all variants on update.
    pub variants: Option<Vec<VariantInput>>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub category_id: Option<Uuid>,
    pub brand_id: Option<Uuid>,
    pub status: Option<String>,
    pub popular: Option<bool>,
    pub attributes: Option<Vec<ProductAttributeInput>>,
    pub price: Option<PriceInput>,
    /// Full replacement: old variants are deleted, these are inserted.
    pub variants: Option<Vec<VariantInput>>,
}

/// Listing row with the price already resolved at read time.
#[derive(Debug, Serialize, ToSchema)]
pub struct ProductSummary {
    pub id: Uuid,
    pub sku: String,
    pub name: String,
    pub slug: String,
    pub product_type: ProductType,
    #[schema(value_type = String)]
    pub effective_price: Decimal,
    pub in_stock: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProductList {
    pub items: Vec<ProductSummary>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProductDetail {
    pub product: Product,
    pub pricing: ProductPricing,
    /// Effective price of the default selection at request time.
    #[schema(value_type = String)]
    pub effective_price: Decimal,
}
