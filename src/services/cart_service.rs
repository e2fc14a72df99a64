use std::collections::HashMap;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::sea_query::LockType;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    catalog::{coupon as coupon_rules, pricing, variants},
    db::DbPool,
    dto::cart::{
        AddToCartRequest, ApplyCouponRequest, CartItemDto, CartResponse, UpdateCartItemRequest,
    },
    entity::{
        cart_items::{Column as ItemCol, Entity as CartItems, Model as CartItemModel},
        carts::{ActiveModel as CartActive, Column as CartCol, Entity as Carts, Model as CartModel},
        coupon_usages::{Column as UsageCol, Entity as CouponUsages},
        coupons::{Column as CouponCol, Entity as Coupons},
        products::{Column as ProductCol, Entity as Products, Model as ProductModel},
    },
    error::{AppError, AppResult},
    middleware::auth::ShopperIdentity,
    models::{Coupon, ProductType},
    response::ApiResponse,
    services::product_service,
    state::AppState,
};

/// Fetch-or-create the one cart for this identity. The partial unique
/// indexes make the insert race-safe: two concurrent first requests
/// both land on the same row.
pub async fn ensure_cart(pool: &DbPool, identity: &ShopperIdentity) -> AppResult<Uuid> {
    let id = match identity {
        ShopperIdentity::User(user_id) => {
            sqlx::query_scalar(
                r#"
                INSERT INTO carts (id, user_id)
                VALUES ($1, $2)
                ON CONFLICT (user_id) WHERE user_id IS NOT NULL
                DO UPDATE SET updated_at = now()
                RETURNING id
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(user_id)
            .fetch_one(pool)
            .await?
        }
        ShopperIdentity::Session(session_id) => {
            sqlx::query_scalar(
                r#"
                INSERT INTO carts (id, session_id)
                VALUES ($1, $2)
                ON CONFLICT (session_id) WHERE session_id IS NOT NULL
                DO UPDATE SET updated_at = now()
                RETURNING id
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(session_id)
            .fetch_one(pool)
            .await?
        }
    };
    Ok(id)
}

pub async fn find_cart<C: ConnectionTrait>(
    conn: &C,
    identity: &ShopperIdentity,
) -> AppResult<Option<CartModel>> {
    let condition = match identity {
        ShopperIdentity::User(user_id) => Condition::all().add(CartCol::UserId.eq(*user_id)),
        ShopperIdentity::Session(session_id) => {
            Condition::all().add(CartCol::SessionId.eq(session_id.clone()))
        }
    };
    Ok(Carts::find().filter(condition).one(conn).await?)
}

/// Resolved cart lines plus the subtotal. Lines whose product has gone
/// missing or soft-deleted since they were added are skipped, not
/// failed on.
pub async fn resolve_lines<C: ConnectionTrait>(
    conn: &C,
    cart_id: Uuid,
) -> AppResult<(Vec<CartItemDto>, Decimal)> {
    let items: Vec<CartItemModel> = CartItems::find()
        .filter(ItemCol::CartId.eq(cart_id))
        .order_by_asc(ItemCol::CreatedAt)
        .all(conn)
        .await?;

    let product_ids: Vec<Uuid> = items.iter().map(|i| i.product_id).collect();
    let products: HashMap<Uuid, ProductModel> = Products::find()
        .filter(ProductCol::Id.is_in(product_ids))
        .filter(ProductCol::DeletedFlg.eq(false))
        .all(conn)
        .await?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();

    let keys: Vec<(Uuid, ProductType)> = products
        .values()
        .filter_map(|p| ProductType::parse(&p.product_type).map(|t| (p.id, t)))
        .collect();
    let pricing_map = product_service::load_pricing_map(conn, &keys).await?;

    let now = Utc::now();
    let mut lines = Vec::with_capacity(items.len());
    let mut subtotal = Decimal::ZERO;
    for item in items {
        let Some(product) = products.get(&item.product_id) else {
            tracing::warn!(item_id = %item.id, product_id = %item.product_id,
                "cart line references a missing product, skipping");
            continue;
        };
        let Some(info) = pricing_map.get(&item.product_id) else {
            continue;
        };
        let selection = variants::parse_selection(&item.attributes)?;
        let selection = (!selection.is_empty()).then_some(selection);
        let record = variants::resolve_price(info, selection.as_ref())?;
        let unit_price = pricing::effective_price(record, now);
        let line_total = unit_price * Decimal::from(item.quantity);
        subtotal += line_total;
        lines.push(CartItemDto {
            id: item.id,
            product_id: item.product_id,
            product_name: product.name.clone(),
            product_slug: product.slug.clone(),
            quantity: item.quantity,
            attributes: item.attributes,
            unit_price,
            line_total,
            in_stock: record.in_stock,
        });
    }
    Ok((lines, subtotal))
}

async fn coupon_by_code<C: ConnectionTrait>(conn: &C, code: &str) -> AppResult<Option<Coupon>> {
    let row = Coupons::find()
        .filter(CouponCol::Code.eq(code))
        .one(conn)
        .await?;
    row.map(crate::services::coupon_service::coupon_from_entity)
        .transpose()
}

pub async fn coupon_already_used<C: ConnectionTrait>(
    conn: &C,
    coupon_id: Uuid,
    identity: &ShopperIdentity,
) -> AppResult<bool> {
    // Anonymous sessions have no durable identity to pin a usage to.
    let Some(user_id) = identity.user_id() else {
        return Ok(false);
    };
    let existing = CouponUsages::find()
        .filter(UsageCol::CouponId.eq(coupon_id))
        .filter(UsageCol::UserId.eq(user_id))
        .one(conn)
        .await?;
    Ok(existing.is_some())
}

/// Assemble the response for a cart. A coupon stored on the cart is
/// re-validated against today's resolved subtotal; if it no longer
/// holds the view shows no discount while the stored code stays put for
/// checkout to reject properly.
async fn build_response(
    state: &AppState,
    cart: CartModel,
    identity: &ShopperIdentity,
) -> AppResult<CartResponse> {
    let (items, subtotal) = resolve_lines(&state.orm, cart.id).await?;

    let (discount, coupon_applied) = match (&cart.coupon_code, cart.coupon_applied) {
        (Some(code), true) => {
            let coupon = coupon_by_code(&state.orm, code).await?;
            let already_used = match &coupon {
                Some(c) => coupon_already_used(&state.orm, c.id, identity).await?,
                None => false,
            };
            match coupon_rules::validate(coupon.as_ref(), already_used, subtotal, Utc::now()) {
                Ok(discount) => (discount, true),
                Err(rejection) => {
                    tracing::debug!(code = %code, reason = rejection.code(),
                        "stored coupon no longer valid for cart view");
                    (Decimal::ZERO, false)
                }
            }
        }
        _ => (Decimal::ZERO, false),
    };

    Ok(CartResponse {
        id: cart.id,
        items,
        subtotal,
        discount,
        coupon_code: cart.coupon_code,
        coupon_applied,
        total: subtotal - discount,
    })
}

pub async fn get_cart(
    state: &AppState,
    identity: &ShopperIdentity,
) -> AppResult<ApiResponse<CartResponse>> {
    ensure_cart(&state.pool, identity).await?;
    let cart = find_cart(&state.orm, identity)
        .await?
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("cart vanished after ensure")))?;
    let response = build_response(state, cart, identity).await?;
    Ok(ApiResponse::success("Cart", response, None))
}

/// Validate the product and pin the line identity before any row is
/// written: resolving up front rejects selections that cannot be
/// priced, and SINGLE products always key on the empty selection,
/// whatever the client sent.
async fn resolve_line_identity(
    state: &AppState,
    product_id: Uuid,
    selection: Option<&variants::Selection>,
) -> AppResult<String> {
    let product = Products::find_by_id(product_id)
        .filter(ProductCol::DeletedFlg.eq(false))
        .filter(ProductCol::Status.eq("active"))
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    let product_type = ProductType::parse(&product.product_type).ok_or_else(|| {
        AppError::Internal(anyhow::anyhow!("product {} has unknown product_type", product.id))
    })?;

    let info = product_service::load_pricing(&state.orm, product.id, product_type).await?;
    variants::resolve_price(&info, selection)?;

    Ok(match product_type {
        ProductType::Single => String::new(),
        ProductType::Variant => variants::normalize_selection(selection),
    })
}

pub async fn add_item(
    state: &AppState,
    identity: &ShopperIdentity,
    payload: AddToCartRequest,
) -> AppResult<ApiResponse<CartResponse>> {
    if payload.quantity < 1 {
        return Err(AppError::BadRequest("quantity must be at least 1".into()));
    }

    let attributes =
        resolve_line_identity(state, payload.product_id, payload.attributes.as_ref()).await?;
    let cart_id = ensure_cart(&state.pool, identity).await?;

    // One statement, no read-modify-write: concurrent adds of the same
    // line accumulate instead of clobbering.
    sqlx::query(
        r#"
        INSERT INTO cart_items (id, cart_id, product_id, quantity, attributes)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (cart_id, product_id, attributes)
        DO UPDATE SET quantity = cart_items.quantity + EXCLUDED.quantity
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(cart_id)
    .bind(payload.product_id)
    .bind(payload.quantity)
    .bind(&attributes)
    .execute(&state.pool)
    .await?;

    let cart = find_cart(&state.orm, identity)
        .await?
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("cart vanished after ensure")))?;
    let response = build_response(state, cart, identity).await?;
    Ok(ApiResponse::success("Added to cart", response, None))
}

pub async fn update_item(
    state: &AppState,
    identity: &ShopperIdentity,
    payload: UpdateCartItemRequest,
) -> AppResult<ApiResponse<CartResponse>> {
    if payload.quantity < 1 {
        return Err(AppError::BadRequest("quantity must be at least 1".into()));
    }

    let attributes =
        resolve_line_identity(state, payload.product_id, payload.attributes.as_ref()).await?;
    let cart_id = ensure_cart(&state.pool, identity).await?;

    // Absolute set, not additive: a missing line is created at the
    // requested quantity, an existing one is overwritten.
    sqlx::query(
        r#"
        INSERT INTO cart_items (id, cart_id, product_id, quantity, attributes)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (cart_id, product_id, attributes)
        DO UPDATE SET quantity = EXCLUDED.quantity
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(cart_id)
    .bind(payload.product_id)
    .bind(payload.quantity)
    .bind(&attributes)
    .execute(&state.pool)
    .await?;

    let cart = find_cart(&state.orm, identity)
        .await?
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("cart vanished after ensure")))?;
    let response = build_response(state, cart, identity).await?;
    Ok(ApiResponse::success("Cart updated", response, None))
}

pub async fn remove_item(
    state: &AppState,
    identity: &ShopperIdentity,
    item_id: Uuid,
) -> AppResult<ApiResponse<CartResponse>> {
    let cart = find_cart(&state.orm, identity)
        .await?
        .ok_or(AppError::NotFound)?;

    let deleted = CartItems::delete_many()
        .filter(ItemCol::Id.eq(item_id))
        .filter(ItemCol::CartId.eq(cart.id))
        .exec(&state.orm)
        .await?;
    if deleted.rows_affected == 0 {
        return Err(AppError::NotFound);
    }

    let response = build_response(state, cart, identity).await?;
    Ok(ApiResponse::success("Removed from cart", response, None))
}

pub async fn apply_coupon(
    state: &AppState,
    identity: &ShopperIdentity,
    payload: ApplyCouponRequest,
) -> AppResult<ApiResponse<CartResponse>> {
    // Validation and the cart write commit together; the row lock keeps
    // a concurrent usage insert from slipping between the read and the
    // update.
    let txn = state.orm.begin().await?;

    let cart = find_cart(&txn, identity).await?.ok_or(AppError::NotFound)?;

    let (_, subtotal) = resolve_lines(&txn, cart.id).await?;
    if subtotal.is_zero() {
        return Err(AppError::BadRequest("cart is empty".into()));
    }

    let coupon = Coupons::find()
        .filter(CouponCol::Code.eq(payload.coupon_code.clone()))
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .map(crate::services::coupon_service::coupon_from_entity)
        .transpose()?;
    let already_used = match &coupon {
        Some(c) => coupon_already_used(&txn, c.id, identity).await?,
        None => false,
    };
    let discount = coupon_rules::validate(coupon.as_ref(), already_used, subtotal, Utc::now())
        .map_err(AppError::from)?;

    // Applying a coupon replaces whatever was applied before.
    let mut active: CartActive = cart.into();
    active.discount = Set(discount);
    active.coupon_code = Set(Some(payload.coupon_code));
    active.coupon_applied = Set(true);
    active.updated_at = Set(Utc::now().into());
    let cart = active.update(&txn).await?;
    txn.commit().await?;

    let response = build_response(state, cart, identity).await?;
    Ok(ApiResponse::success("Coupon applied", response, None))
}

pub async fn remove_coupon(
    state: &AppState,
    identity: &ShopperIdentity,
) -> AppResult<ApiResponse<CartResponse>> {
    let cart = find_cart(&state.orm, identity)
        .await?
        .ok_or(AppError::NotFound)?;

    let mut active: CartActive = cart.into();
    active.discount = Set(Decimal::ZERO);
    active.coupon_code = Set(None);
    active.coupon_applied = Set(false);
    active.updated_at = Set(Utc::now().into());
    let cart = active.update(&state.orm).await?;

    let response = build_response(state, cart, identity).await?;
    Ok(ApiResponse::success("Coupon removed", response, None))
}
