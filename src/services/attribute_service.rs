use std::collections::HashMap;

use sea_orm::ActiveValue::NotSet;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, ModelTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::attributes::{AttributeList, AttributeValueDto, AttributeWithValues, CreateAttributeRequest},
    entity::{
        attribute_values::{
            ActiveModel as ValueActive, Column as ValueCol, Entity as AttributeValues,
        },
        attributes::{ActiveModel, Column, Entity as Attributes},
    },
    error::{AppError, AppResult, conflict_on_unique},
    middleware::auth::{AuthUser, ensure_admin},
    response::{ApiResponse, Meta},
    state::AppState,
};

pub async fn create_attribute(
    state: &AppState,
    user: &AuthUser,
    payload: CreateAttributeRequest,
) -> AppResult<ApiResponse<AttributeWithValues>> {
    ensure_admin(user)?;
    if payload.values.is_empty() {
        return Err(AppError::BadRequest(
            "an attribute needs at least one value".into(),
        ));
    }

    let txn = state.orm.begin().await?;

    let attribute_id = Uuid::new_v4();
    let attribute = ActiveModel {
        id: Set(attribute_id),
        name: Set(payload.name),
        slug: Set(payload.slug),
        created_at: NotSet,
    }
    .insert(&txn)
    .await
    .map_err(conflict_on_unique)?;

    let mut values = Vec::with_capacity(payload.values.len());
    for value in payload.values {
        let row = ValueActive {
            id: Set(Uuid::new_v4()),
            attribute_id: Set(attribute_id),
            value: Set(value),
            created_at: NotSet,
        }
        .insert(&txn)
        .await
        .map_err(conflict_on_unique)?;
        values.push(AttributeValueDto {
            id: row.id,
            value: row.value,
        });
    }

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "attribute_create",
        Some("attributes"),
        Some(serde_json::json!({ "attribute_id": attribute_id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Attribute created",
        AttributeWithValues {
            id: attribute.id,
            name: attribute.name,
            slug: attribute.slug,
            values,
        },
        Some(Meta::empty()),
    ))
}

pub async fn delete_attribute(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(user)?;

    let existing = Attributes::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    existing.delete(&state.orm).await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "attribute_delete",
        Some("attributes"),
        Some(serde_json::json!({ "attribute_id": id })),
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

pub async fn list_attributes(state: &AppState) -> AppResult<ApiResponse<AttributeList>> {
    let attributes = Attributes::find()
        .order_by_asc(Column::Name)
        .all(&state.orm)
        .await?;
    let ids: Vec<Uuid> = attributes.iter().map(|a| a.id).collect();
    let values = AttributeValues::find()
        .filter(ValueCol::AttributeId.is_in(ids))
        .order_by_asc(ValueCol::CreatedAt)
        .all(&state.orm)
        .await?;

    let mut by_attribute: HashMap<Uuid, Vec<AttributeValueDto>> = HashMap::new();
    for value in values {
        by_attribute
            .entry(value.attribute_id)
            .or_default()
            .push(AttributeValueDto {
                id: value.id,
                value: value.value,
            });
    }

    let items = attributes
        .into_iter()
        .map(|attr| AttributeWithValues {
            id: attr.id,
            name: attr.name,
            slug: attr.slug,
            values: by_attribute.remove(&attr.id).unwrap_or_default(),
        })
        .collect();

    Ok(ApiResponse::success(
        "Attributes",
        AttributeList { items },
        None,
    ))
}
