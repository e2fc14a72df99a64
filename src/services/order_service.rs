use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::LockType;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    catalog::coupon as coupon_rules,
    dto::orders::{CheckoutRequest, OrderList, OrderWithItems},
    entity::{
        carts::{Column as CartCol, Entity as Carts},
        coupon_usages::ActiveModel as UsageActive,
        coupons::{Column as CouponCol, Entity as Coupons},
        order_items::{
            ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems,
            Model as OrderItemModel,
        },
        orders::{
            ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel,
        },
    },
    error::{AppError, AppResult, conflict_on_unique},
    middleware::auth::ShopperIdentity,
    models::{Order, OrderItem},
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, SortOrder},
    services::{cart_service, coupon_service},
    state::AppState,
};

fn order_from_entity(model: OrderModel) -> Order {
    Order {
        id: model.id,
        code: model.code,
        user_id: model.user_id,
        subtotal: model.subtotal,
        discount: model.discount,
        total: model.total,
        coupon_code: model.coupon_code,
        status: model.status,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

fn order_item_from_entity(model: OrderItemModel) -> OrderItem {
    OrderItem {
        id: model.id,
        order_id: model.order_id,
        product_id: model.product_id,
        quantity: model.quantity,
        price: model.price,
        attributes: model.attributes,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

fn build_order_code(order_id: Uuid) -> String {
    let date = Utc::now().format("%Y%m%d");
    let suffix = order_id.to_string();
    let short = &suffix[..8];
    format!("ORD-{}-{}", date, short)
}

fn identity_condition(identity: &ShopperIdentity) -> Condition {
    match identity {
        ShopperIdentity::User(user_id) => Condition::all().add(OrderCol::UserId.eq(*user_id)),
        ShopperIdentity::Session(session_id) => {
            Condition::all().add(OrderCol::SessionId.eq(session_id.clone()))
        }
    }
}

/// Turn the cart into an order. Everything happens in one transaction
/// with the cart row locked: line prices are resolved fresh, the coupon
/// is re-validated against that subtotal, the usage is recorded, and
/// the cart goes away. A coupon that fails re-validation rejects the
/// checkout instead of silently pricing without it.
pub async fn checkout(
    state: &AppState,
    identity: &ShopperIdentity,
    payload: CheckoutRequest,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let txn = state.orm.begin().await?;

    let cart_condition = match identity {
        ShopperIdentity::User(user_id) => Condition::all().add(CartCol::UserId.eq(*user_id)),
        ShopperIdentity::Session(session_id) => {
            Condition::all().add(CartCol::SessionId.eq(session_id.clone()))
        }
    };
    let cart = Carts::find()
        .filter(cart_condition)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::BadRequest("Cart is empty".into()))?;

    let (lines, subtotal) = cart_service::resolve_lines(&txn, cart.id).await?;
    if lines.is_empty() {
        return Err(AppError::BadRequest("Cart is empty".into()));
    }

    let mut discount = Decimal::ZERO;
    let mut coupon_id = None;
    if let (Some(code), true) = (&cart.coupon_code, cart.coupon_applied) {
        let coupon = Coupons::find()
            .filter(CouponCol::Code.eq(code.clone()))
            .lock(LockType::Update)
            .one(&txn)
            .await?
            .map(coupon_service::coupon_from_entity)
            .transpose()?;
        let already_used = match &coupon {
            Some(c) => cart_service::coupon_already_used(&txn, c.id, identity).await?,
            None => false,
        };
        discount = coupon_rules::validate(coupon.as_ref(), already_used, subtotal, Utc::now())
            .map_err(AppError::from)?;
        coupon_id = coupon.map(|c| c.id);
    }

    let order_id = Uuid::new_v4();
    let order = OrderActive {
        id: Set(order_id),
        code: Set(build_order_code(order_id)),
        user_id: Set(identity.user_id()),
        session_id: Set(match identity {
            ShopperIdentity::User(_) => None,
            ShopperIdentity::Session(session_id) => Some(session_id.clone()),
        }),
        subtotal: Set(subtotal),
        discount: Set(discount),
        total: Set(subtotal - discount),
        coupon_code: Set(cart.coupon_code.clone().filter(|_| cart.coupon_applied)),
        status: Set("pending".into()),
        created_at: NotSet,
    }
    .insert(&txn)
    .await?;

    let mut order_items: Vec<OrderItem> = Vec::with_capacity(lines.len());
    for line in &lines {
        let item = OrderItemActive {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            product_id: Set(line.product_id),
            quantity: Set(line.quantity),
            price: Set(line.unit_price),
            attributes: Set(line.attributes.clone()),
            created_at: NotSet,
        }
        .insert(&txn)
        .await?;
        order_items.push(order_item_from_entity(item));
    }

    // Usage is recorded only here, at completion. The unique constraint
    // backstops a concurrent double-spend of the same coupon.
    if let (Some(coupon_id), Some(user_id)) = (coupon_id, identity.user_id()) {
        if discount > Decimal::ZERO {
            UsageActive {
                id: Set(Uuid::new_v4()),
                coupon_id: Set(coupon_id),
                user_id: Set(user_id),
                created_at: NotSet,
            }
            .insert(&txn)
            .await
            .map_err(|err| match conflict_on_unique(err) {
                AppError::Conflict => coupon_rules::CouponRejection::AlreadyUsed.into(),
                other => other,
            })?;
        }
    }

    // Cart items cascade with the cart row; the next request starts a
    // fresh cart.
    Carts::delete_by_id(cart.id).exec(&txn).await?;

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        identity.user_id(),
        "checkout",
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.id, "note": payload.note })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Checkout success",
        OrderWithItems {
            order: order_from_entity(order),
            items: order_items,
        },
        Some(Meta::empty()),
    ))
}

pub async fn get_order(
    state: &AppState,
    identity: &ShopperIdentity,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let order = Orders::find()
        .filter(identity_condition(identity).add(OrderCol::Id.eq(id)))
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order.id))
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_item_from_entity)
        .collect();

    Ok(ApiResponse::success(
        "OK",
        OrderWithItems {
            order: order_from_entity(order),
            items,
        },
        Some(Meta::empty()),
    ))
}

pub async fn list_orders(
    state: &AppState,
    identity: &ShopperIdentity,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, limit, offset) = query.pagination().normalize();
    let mut condition = identity_condition(identity);
    if let Some(status) = query.status.as_ref().filter(|s| !s.is_empty()) {
        condition = condition.add(OrderCol::Status.eq(status.clone()));
    }

    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);
    let mut finder = Orders::find().filter(condition);
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(OrderCol::CreatedAt),
        SortOrder::Desc => finder.order_by_desc(OrderCol::CreatedAt),
    };

    let total = finder.clone().count(&state.orm).await? as i64;
    let orders = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_from_entity)
        .collect();

    Ok(ApiResponse::success(
        "Ok",
        OrderList { items: orders },
        Some(Meta::new(page, limit, total)),
    ))
}
