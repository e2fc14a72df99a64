use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::Expr;
use sea_orm::sea_query::extension::postgres::PgExpr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    catalog::{pricing, variants},
    dto::products::{
        CreateProductRequest, PriceInput, ProductDetail, ProductList, ProductSummary,
        UpdateProductRequest, VariantInput,
    },
    entity::{
        attribute_values::{Column as AttrValueCol, Entity as AttributeValues},
        price_records::{
            ActiveModel as PriceActive, Column as PriceCol, Entity as PriceRecords,
            Model as PriceModel,
        },
        product_attribute_values::{
            ActiveModel as ProductAttrActive, Column as ProductAttrCol,
            Entity as ProductAttributeValues,
        },
        product_variants::{
            ActiveModel as VariantActive, Column as VariantCol, Entity as ProductVariants,
            Model as VariantModel,
        },
        products::{ActiveModel, Column, Entity as Products, Model as ProductModel},
        variant_attribute_values::{
            ActiveModel as VariantAttrActive, Column as VariantAttrCol,
            Entity as VariantAttributeValues,
        },
    },
    error::{AppError, AppResult, conflict_on_unique},
    middleware::auth::{AuthUser, ensure_admin},
    models::{DiscountType, PriceRecord, Product, ProductPricing, ProductType, Variant},
    response::{ApiResponse, Meta},
    routes::params::{ProductQuery, SortOrder},
    state::AppState,
};

pub fn product_from_entity(model: ProductModel) -> AppResult<Product> {
    let product_type = ProductType::parse(&model.product_type).ok_or_else(|| {
        AppError::Internal(anyhow::anyhow!(
            "product {} has unknown product_type {:?}",
            model.id,
            model.product_type
        ))
    })?;
    Ok(Product {
        id: model.id,
        sku: model.sku,
        name: model.name,
        slug: model.slug,
        description: model.description,
        category_id: model.category_id,
        brand_id: model.brand_id,
        product_type,
        status: model.status,
        popular: model.popular,
        created_at: model.created_at.with_timezone(&Utc),
    })
}

fn price_record_from_entity(model: &PriceModel) -> PriceRecord {
    PriceRecord {
        price: model.price,
        special_price: model.special_price,
        special_price_type: model
            .special_price_type
            .as_deref()
            .and_then(DiscountType::parse),
        quantity: model.quantity,
        in_stock: model.in_stock,
        discount_start_date: model.discount_start_date.map(|dt| dt.with_timezone(&Utc)),
        discount_end_date: model.discount_end_date.map(|dt| dt.with_timezone(&Utc)),
        discount_type: model.discount_type.as_deref().and_then(DiscountType::parse),
        discount_amount: model.discount_amount,
    }
}

/// Load everything price resolution needs for a batch of products:
/// price records, variants and variant attribute sets, in three queries.
pub async fn load_pricing_map<C: ConnectionTrait>(
    conn: &C,
    products: &[(Uuid, ProductType)],
) -> AppResult<HashMap<Uuid, ProductPricing>> {
    let ids: Vec<Uuid> = products.iter().map(|(id, _)| *id).collect();

    let price_rows = PriceRecords::find()
        .filter(PriceCol::ProductId.is_in(ids.clone()))
        .all(conn)
        .await?;

    let variant_rows: Vec<VariantModel> = ProductVariants::find()
        .filter(VariantCol::ProductId.is_in(ids.clone()))
        .order_by_asc(VariantCol::CreatedAt)
        .all(conn)
        .await?;

    let variant_ids: Vec<Uuid> = variant_rows.iter().map(|v| v.id).collect();
    let attr_rows = if variant_ids.is_empty() {
        Vec::new()
    } else {
        VariantAttributeValues::find()
            .filter(VariantAttrCol::VariantId.is_in(variant_ids))
            .all(conn)
            .await?
    };

    let mut attrs_by_variant: HashMap<Uuid, BTreeMap<Uuid, Uuid>> = HashMap::new();
    for row in attr_rows {
        attrs_by_variant
            .entry(row.variant_id)
            .or_default()
            .insert(row.attribute_id, row.attribute_value_id);
    }

    let mut price_by_variant: HashMap<Uuid, PriceRecord> = HashMap::new();
    let mut base_by_product: HashMap<Uuid, PriceRecord> = HashMap::new();
    for row in &price_rows {
        match row.variant_id {
            Some(variant_id) => {
                price_by_variant.insert(variant_id, price_record_from_entity(row));
            }
            None => {
                base_by_product.insert(row.product_id, price_record_from_entity(row));
            }
        }
    }

    let mut variants_by_product: HashMap<Uuid, Vec<Variant>> = HashMap::new();
    for row in variant_rows {
        let Some(price) = price_by_variant.remove(&row.id) else {
            tracing::warn!(variant_id = %row.id, "variant without a price record, skipping");
            continue;
        };
        variants_by_product
            .entry(row.product_id)
            .or_default()
            .push(Variant {
                id: row.id,
                sku: row.sku,
                label: row.label,
                is_default: row.is_default,
                attribute_values: attrs_by_variant.remove(&row.id).unwrap_or_default(),
                price,
                created_at: row.created_at.with_timezone(&Utc),
            });
    }

    let mut map = HashMap::new();
    for (id, product_type) in products {
        map.insert(
            *id,
            ProductPricing {
                product_id: *id,
                product_type: *product_type,
                base: base_by_product.remove(id),
                variants: variants_by_product.remove(id).unwrap_or_default(),
            },
        );
    }
    Ok(map)
}

pub async fn load_pricing<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
    product_type: ProductType,
) -> AppResult<ProductPricing> {
    let mut map = load_pricing_map(conn, &[(product_id, product_type)]).await?;
    map.remove(&product_id)
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("pricing for {product_id} not loaded")))
}

fn validate_price_input(input: &PriceInput) -> AppResult<()> {
    if input.price < rust_decimal::Decimal::ZERO {
        return Err(AppError::BadRequest("price must not be negative".into()));
    }
    if let (Some(special), Some(special_type)) = (input.special_price, input.special_price_type) {
        pricing::validate_discount(special_type, special)?;
    }
    Ok(())
}

fn validate_payload_shape(
    product_type: ProductType,
    price: Option<&PriceInput>,
    variants: Option<&Vec<VariantInput>>,
) -> AppResult<()> {
    match product_type {
        ProductType::Single => {
            let price = price
                .ok_or_else(|| AppError::BadRequest("single product requires a price".into()))?;
            validate_price_input(price)?;
        }
        ProductType::Variant => {
            let variants = variants.filter(|v| !v.is_empty()).ok_or_else(|| {
                AppError::BadRequest("variant product requires at least one variant".into())
            })?;
            let defaults = variants.iter().filter(|v| v.is_default).count();
            if defaults != 1 {
                return Err(AppError::BadRequest(
                    "exactly one variant must be flagged default".into(),
                ));
            }
            for variant in variants {
                if variant.attribute_values.is_empty() {
                    return Err(AppError::BadRequest(
                        "each variant needs at least one attribute value".into(),
                    ));
                }
                validate_price_input(&variant.price)?;
            }
        }
    }
    Ok(())
}

fn price_active(product_id: Uuid, variant_id: Option<Uuid>, input: &PriceInput) -> PriceActive {
    PriceActive {
        id: Set(Uuid::new_v4()),
        product_id: Set(product_id),
        variant_id: Set(variant_id),
        price: Set(input.price),
        special_price: Set(input.special_price),
        special_price_type: Set(input.special_price_type.map(|t| t.as_str().to_string())),
        quantity: Set(input.quantity),
        in_stock: Set(input.in_stock.unwrap_or(true)),
        discount_start_date: Set(None),
        discount_end_date: Set(None),
        discount_type: Set(None),
        discount_amount: Set(None),
        created_at: NotSet,
    }
}

/// Derive the cosmetic label ("Red - XL") from the variant's attribute
/// values when the caller did not provide one.
async fn derive_labels<C: ConnectionTrait>(
    conn: &C,
    inputs: &[VariantInput],
) -> AppResult<Vec<String>> {
    let value_ids: Vec<Uuid> = inputs
        .iter()
        .flat_map(|v| v.attribute_values.values().copied())
        .collect();
    let names: HashMap<Uuid, String> = AttributeValues::find()
        .filter(AttrValueCol::Id.is_in(value_ids))
        .all(conn)
        .await?
        .into_iter()
        .map(|row| (row.id, row.value))
        .collect();

    Ok(inputs
        .iter()
        .map(|input| match &input.label {
            Some(label) => label.clone(),
            None => input
                .attribute_values
                .values()
                .filter_map(|id| names.get(id).cloned())
                .collect::<Vec<_>>()
                .join(" - "),
        })
        .collect())
}

async fn insert_variants<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
    inputs: &[VariantInput],
) -> AppResult<()> {
    let labels = derive_labels(conn, inputs).await?;
    for (input, label) in inputs.iter().zip(labels) {
        let variant_id = Uuid::new_v4();
        VariantActive {
            id: Set(variant_id),
            product_id: Set(product_id),
            sku: Set(input.sku.clone()),
            label: Set(label),
            is_default: Set(input.is_default),
            created_at: NotSet,
        }
        .insert(conn)
        .await
        .map_err(conflict_on_unique)?;

        for (attribute_id, value_id) in &input.attribute_values {
            VariantAttrActive {
                id: Set(Uuid::new_v4()),
                variant_id: Set(variant_id),
                attribute_id: Set(*attribute_id),
                attribute_value_id: Set(*value_id),
            }
            .insert(conn)
            .await?;
        }

        price_active(product_id, Some(variant_id), &input.price)
            .insert(conn)
            .await?;
    }
    Ok(())
}

async fn replace_product_attributes<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
    attributes: &[crate::dto::products::ProductAttributeInput],
) -> AppResult<()> {
    ProductAttributeValues::delete_many()
        .filter(ProductAttrCol::ProductId.eq(product_id))
        .exec(conn)
        .await?;
    for attr in attributes {
        for value_id in &attr.attribute_value_ids {
            ProductAttrActive {
                id: Set(Uuid::new_v4()),
                product_id: Set(product_id),
                attribute_id: Set(attr.attribute_id),
                attribute_value_id: Set(*value_id),
            }
            .insert(conn)
            .await?;
        }
    }
    Ok(())
}

pub async fn create_product(
    state: &AppState,
    user: &AuthUser,
    payload: CreateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;
    validate_payload_shape(
        payload.product_type,
        payload.price.as_ref(),
        payload.variants.as_ref(),
    )?;

    let id = Uuid::new_v4();
    let txn = state.orm.begin().await?;

    let product = ActiveModel {
        id: Set(id),
        sku: Set(payload.sku),
        name: Set(payload.name),
        slug: Set(payload.slug),
        description: Set(payload.description),
        category_id: Set(payload.category_id),
        brand_id: Set(payload.brand_id),
        product_type: Set(payload.product_type.as_str().to_string()),
        status: Set(payload.status.unwrap_or_else(|| "active".to_string())),
        popular: Set(payload.popular.unwrap_or(false)),
        deleted_flg: Set(false),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&txn)
    .await
    .map_err(conflict_on_unique)?;

    if let Some(attributes) = &payload.attributes {
        replace_product_attributes(&txn, id, attributes).await?;
    }

    match payload.product_type {
        ProductType::Single => {
            // Shape validation guarantees the price is present.
            if let Some(price) = &payload.price {
                price_active(id, None, price).insert(&txn).await?;
            }
        }
        ProductType::Variant => {
            if let Some(variants) = &payload.variants {
                insert_variants(&txn, id, variants).await?;
            }
        }
    }

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "product_create",
        Some("products"),
        Some(serde_json::json!({ "product_id": product.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Product created",
        product_from_entity(product)?,
        Some(Meta::empty()),
    ))
}

pub async fn update_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;

    let existing = Products::find_by_id(id)
        .filter(Column::DeletedFlg.eq(false))
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let product_type = ProductType::parse(&existing.product_type).ok_or_else(|| {
        AppError::Internal(anyhow::anyhow!("product {id} has unknown product_type"))
    })?;

    if payload.price.is_some() || payload.variants.is_some() {
        validate_payload_shape(product_type, payload.price.as_ref(), payload.variants.as_ref())?;
    }

    // One transaction: readers never observe the product between
    // variant delete and re-insert.
    let txn = state.orm.begin().await?;

    let mut active: ActiveModel = existing.into();
    if let Some(name) = payload.name {
        active.name = Set(name);
    }
    if let Some(slug) = payload.slug {
        active.slug = Set(slug);
    }
    if let Some(description) = payload.description {
        active.description = Set(Some(description));
    }
    if let Some(category_id) = payload.category_id {
        active.category_id = Set(category_id);
    }
    if payload.brand_id.is_some() {
        active.brand_id = Set(payload.brand_id);
    }
    if let Some(status) = payload.status {
        active.status = Set(status);
    }
    if let Some(popular) = payload.popular {
        active.popular = Set(popular);
    }
    active.updated_at = Set(Utc::now().into());
    let product = active.update(&txn).await.map_err(conflict_on_unique)?;

    if let Some(attributes) = &payload.attributes {
        replace_product_attributes(&txn, id, attributes).await?;
    }

    match product_type {
        ProductType::Single => {
            if let Some(price) = &payload.price {
                PriceRecords::delete_many()
                    .filter(PriceCol::ProductId.eq(id))
                    .exec(&txn)
                    .await?;
                price_active(id, None, price).insert(&txn).await?;
            }
        }
        ProductType::Variant => {
            if let Some(variants) = &payload.variants {
                // Full replacement, never a patch: price records and
                // attribute links go with the variants via FK cascade.
                ProductVariants::delete_many()
                    .filter(VariantCol::ProductId.eq(id))
                    .exec(&txn)
                    .await?;
                insert_variants(&txn, id, variants).await?;
            }
        }
    }

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "product_update",
        Some("products"),
        Some(serde_json::json!({ "product_id": id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Updated",
        product_from_entity(product)?,
        Some(Meta::empty()),
    ))
}

pub async fn delete_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(user)?;

    let existing = Products::find_by_id(id)
        .filter(Column::DeletedFlg.eq(false))
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let mut active: ActiveModel = existing.into();
    active.deleted_flg = Set(true);
    active.updated_at = Set(Utc::now().into());
    active.update(&state.orm).await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "product_delete",
        Some("products"),
        Some(serde_json::json!({ "product_id": id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

/// Build listing rows with prices resolved at `now`.
pub fn summarize(
    products: Vec<ProductModel>,
    pricing_map: &HashMap<Uuid, ProductPricing>,
    now: DateTime<Utc>,
) -> Vec<ProductSummary> {
    products
        .into_iter()
        .filter_map(|model| {
            let product = product_from_entity(model).ok()?;
            let pricing_info = pricing_map.get(&product.id)?;
            let record = variants::resolve_price(pricing_info, None).ok()?;
            Some(ProductSummary {
                id: product.id,
                sku: product.sku,
                name: product.name,
                slug: product.slug,
                product_type: product.product_type,
                effective_price: pricing::effective_price(record, now),
                in_stock: record.in_stock,
                created_at: product.created_at,
            })
        })
        .collect()
}

pub async fn list_products(
    state: &AppState,
    query: ProductQuery,
) -> AppResult<ApiResponse<ProductList>> {
    let (page, limit, offset) = query.pagination().normalize();
    let mut condition = Condition::all().add(Column::DeletedFlg.eq(false));

    if let Some(search) = query.q.as_ref().filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", search);
        condition = condition.add(
            Condition::any()
                .add(Expr::col(Column::Name).ilike(pattern.clone()))
                .add(Expr::col(Column::Sku).ilike(pattern)),
        );
    }
    if let Some(category_id) = query.category_id {
        condition = condition.add(Column::CategoryId.eq(category_id));
    }
    if let Some(brand_id) = query.brand_id {
        condition = condition.add(Column::BrandId.eq(brand_id));
    }
    if let Some(status) = query.status.as_ref().filter(|s| !s.is_empty()) {
        condition = condition.add(Column::Status.eq(status.clone()));
    }
    if let Some(popular) = query.popular {
        condition = condition.add(Column::Popular.eq(popular));
    }

    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);
    let mut finder = Products::find().filter(condition);
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(Column::CreatedAt),
        SortOrder::Desc => finder.order_by_desc(Column::CreatedAt),
    };

    let total = finder.clone().count(&state.orm).await? as i64;
    let rows = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?;

    let keys: Vec<(Uuid, ProductType)> = rows
        .iter()
        .filter_map(|m| ProductType::parse(&m.product_type).map(|t| (m.id, t)))
        .collect();
    let pricing_map = load_pricing_map(&state.orm, &keys).await?;

    let items = summarize(rows, &pricing_map, Utc::now());
    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Products",
        ProductList { items },
        Some(meta),
    ))
}

pub async fn get_product(state: &AppState, slug: &str) -> AppResult<ApiResponse<ProductDetail>> {
    let model = Products::find()
        .filter(
            Condition::all()
                .add(Column::Slug.eq(slug))
                .add(Column::DeletedFlg.eq(false))
                .add(Column::Status.eq("active")),
        )
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let product = product_from_entity(model)?;
    let pricing_info = load_pricing(&state.orm, product.id, product.product_type).await?;
    let record = variants::resolve_price(&pricing_info, None)?;
    let effective_price = pricing::effective_price(record, Utc::now());

    Ok(ApiResponse::success(
        "Product",
        ProductDetail {
            product,
            pricing: pricing_info,
            effective_price,
        },
        None,
    ))
}
