use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::Expr;
use sea_orm::sea_query::extension::postgres::PgExpr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::brands::{BrandList, CreateBrandRequest, UpdateBrandRequest},
    entity::brands::{ActiveModel, Column, Entity as Brands, Model as BrandModel},
    error::{AppError, AppResult, conflict_on_unique},
    middleware::auth::{AuthUser, ensure_admin},
    models::Brand,
    response::{ApiResponse, Meta},
    routes::params::ListQuery,
    state::AppState,
};

pub fn brand_from_entity(model: BrandModel) -> Brand {
    Brand {
        id: model.id,
        name: model.name,
        slug: model.slug,
        status: model.status,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

pub async fn create_brand(
    state: &AppState,
    user: &AuthUser,
    payload: CreateBrandRequest,
) -> AppResult<ApiResponse<Brand>> {
    ensure_admin(user)?;

    let brand = ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(payload.name),
        slug: Set(payload.slug),
        status: Set(payload.status.unwrap_or_else(|| "active".to_string())),
        deleted_flg: Set(false),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await
    .map_err(conflict_on_unique)?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "brand_create",
        Some("brands"),
        Some(serde_json::json!({ "brand_id": brand.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Brand created",
        brand_from_entity(brand),
        Some(Meta::empty()),
    ))
}

pub async fn update_brand(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateBrandRequest,
) -> AppResult<ApiResponse<Brand>> {
    ensure_admin(user)?;

    let existing = Brands::find_by_id(id)
        .filter(Column::DeletedFlg.eq(false))
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let mut active: ActiveModel = existing.into();
    if let Some(name) = payload.name {
        active.name = Set(name);
    }
    if let Some(slug) = payload.slug {
        active.slug = Set(slug);
    }
    if let Some(status) = payload.status {
        active.status = Set(status);
    }
    let brand = active.update(&state.orm).await.map_err(conflict_on_unique)?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "brand_update",
        Some("brands"),
        Some(serde_json::json!({ "brand_id": id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Updated",
        brand_from_entity(brand),
        Some(Meta::empty()),
    ))
}

pub async fn delete_brand(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(user)?;

    let existing = Brands::find_by_id(id)
        .filter(Column::DeletedFlg.eq(false))
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let mut active: ActiveModel = existing.into();
    active.deleted_flg = Set(true);
    active.update(&state.orm).await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "brand_delete",
        Some("brands"),
        Some(serde_json::json!({ "brand_id": id })),
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

pub async fn list_brands(state: &AppState, query: ListQuery) -> AppResult<ApiResponse<BrandList>> {
    let (page, limit, offset) = query.pagination().normalize();
    let mut condition = Condition::all().add(Column::DeletedFlg.eq(false));
    if let Some(search) = query.q.as_ref().filter(|s| !s.is_empty()) {
        condition = condition.add(Expr::col(Column::Name).ilike(format!("%{}%", search)));
    }

    let finder = Brands::find()
        .filter(condition)
        .order_by_desc(Column::CreatedAt);
    let total = finder.clone().count(&state.orm).await? as i64;
    let rows = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?;

    Ok(ApiResponse::success(
        "Brands",
        BrandList {
            items: rows.into_iter().map(brand_from_entity).collect(),
        },
        Some(Meta::new(page, limit, total)),
    ))
}
