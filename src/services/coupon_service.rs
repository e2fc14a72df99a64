use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, ModelTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    catalog::pricing,
    dto::coupons::{CouponList, CreateCouponRequest, UpdateCouponRequest},
    entity::coupons::{ActiveModel, Column, Entity as Coupons, Model as CouponModel},
    error::{AppError, AppResult, conflict_on_unique},
    middleware::auth::{AuthUser, ensure_admin},
    models::{Coupon, DiscountType},
    response::{ApiResponse, Meta},
    routes::params::ListQuery,
    state::AppState,
};

pub fn coupon_from_entity(model: CouponModel) -> AppResult<Coupon> {
    let discount_type = DiscountType::parse(&model.discount_type).ok_or_else(|| {
        AppError::Internal(anyhow::anyhow!(
            "coupon {} has unknown discount_type {:?}",
            model.id,
            model.discount_type
        ))
    })?;
    Ok(Coupon {
        id: model.id,
        code: model.code,
        min_buy: model.min_buy,
        discount_type,
        discount_amount: model.discount_amount,
        discount_start_date: model.discount_start_date.with_timezone(&Utc),
        discount_end_date: model.discount_end_date.with_timezone(&Utc),
    })
}

pub async fn create_coupon(
    state: &AppState,
    user: &AuthUser,
    payload: CreateCouponRequest,
) -> AppResult<ApiResponse<Coupon>> {
    ensure_admin(user)?;
    pricing::validate_discount(payload.discount_type, payload.discount_amount)?;
    if payload.discount_end_date < payload.discount_start_date {
        return Err(AppError::BadRequest(
            "discount window ends before it starts".into(),
        ));
    }

    let coupon = ActiveModel {
        id: Set(Uuid::new_v4()),
        code: Set(payload.code),
        min_buy: Set(payload.min_buy),
        discount_type: Set(payload.discount_type.as_str().to_string()),
        discount_amount: Set(payload.discount_amount),
        discount_start_date: Set(payload.discount_start_date.into()),
        discount_end_date: Set(payload.discount_end_date.into()),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await
    .map_err(conflict_on_unique)?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "coupon_create",
        Some("coupons"),
        Some(serde_json::json!({ "coupon_id": coupon.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Coupon created",
        coupon_from_entity(coupon)?,
        Some(Meta::empty()),
    ))
}

pub async fn update_coupon(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateCouponRequest,
) -> AppResult<ApiResponse<Coupon>> {
    ensure_admin(user)?;

    let existing = Coupons::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    let current = coupon_from_entity(existing.clone())?;

    let discount_type = payload.discount_type.unwrap_or(current.discount_type);
    let discount_amount = payload.discount_amount.unwrap_or(current.discount_amount);
    pricing::validate_discount(discount_type, discount_amount)?;

    let start = payload
        .discount_start_date
        .unwrap_or(current.discount_start_date);
    let end = payload
        .discount_end_date
        .unwrap_or(current.discount_end_date);
    if end < start {
        return Err(AppError::BadRequest(
            "discount window ends before it starts".into(),
        ));
    }

    let mut active: ActiveModel = existing.into();
    if let Some(min_buy) = payload.min_buy {
        active.min_buy = Set(min_buy);
    }
    active.discount_type = Set(discount_type.as_str().to_string());
    active.discount_amount = Set(discount_amount);
    active.discount_start_date = Set(start.into());
    active.discount_end_date = Set(end.into());
    let coupon = active.update(&state.orm).await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "coupon_update",
        Some("coupons"),
        Some(serde_json::json!({ "coupon_id": id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Updated",
        coupon_from_entity(coupon)?,
        Some(Meta::empty()),
    ))
}

pub async fn delete_coupon(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(user)?;

    let existing = Coupons::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    existing.delete(&state.orm).await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "coupon_delete",
        Some("coupons"),
        Some(serde_json::json!({ "coupon_id": id })),
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

pub async fn list_coupons(
    state: &AppState,
    user: &AuthUser,
    query: ListQuery,
) -> AppResult<ApiResponse<CouponList>> {
    ensure_admin(user)?;
    let (page, limit, offset) = query.pagination().normalize();

    let mut finder = Coupons::find().order_by_desc(Column::CreatedAt);
    if let Some(search) = query.q.as_ref().filter(|s| !s.is_empty()) {
        finder = finder.filter(Column::Code.contains(search.clone()));
    }

    let total = finder.clone().count(&state.orm).await? as i64;
    let rows = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?;

    let items = rows
        .into_iter()
        .map(coupon_from_entity)
        .collect::<AppResult<Vec<_>>>()?;
    Ok(ApiResponse::success(
        "Coupons",
        CouponList { items },
        Some(Meta::new(page, limit, total)),
    ))
}
