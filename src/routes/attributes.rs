use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{delete, get},
};
use uuid::Uuid;

use crate::{
    dto::attributes::{AttributeList, AttributeWithValues, CreateAttributeRequest},
    error::AppResult,
    middleware::auth::AuthUser,
    response::ApiResponse,
    services::attribute_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_attributes).post(create_attribute))
        .route("/{id}", delete(delete_attribute))
}

#[utoipa::path(
    get,
    path = "/api/attributes",
    responses(
        (status = 200, description = "Attributes with their values", body = ApiResponse<AttributeList>)
    ),
    tag = "Attributes"
)]
pub async fn list_attributes(
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<AttributeList>>> {
    Ok(Json(attribute_service::list_attributes(&state).await?))
}

#[utoipa::path(
    post,
    path = "/api/attributes",
    request_body = CreateAttributeRequest,
    responses(
        (status = 200, description = "Attribute created with its values", body = ApiResponse<AttributeWithValues>),
        (status = 409, description = "Duplicate slug"),
    ),
    security(("bearer_auth" = [])),
    tag = "Attributes"
)]
pub async fn create_attribute(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateAttributeRequest>,
) -> AppResult<Json<ApiResponse<AttributeWithValues>>> {
    Ok(Json(
        attribute_service::create_attribute(&state, &user, payload).await?,
    ))
}

#[utoipa::path(
    delete,
    path = "/api/attributes/{id}",
    params(("id" = Uuid, Path, description = "Attribute ID")),
    responses(
        (status = 200, description = "Deleted", body = ApiResponse<serde_json::Value>),
        (status = 404, description = "Attribute not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Attributes"
)]
pub async fn delete_attribute(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    Ok(Json(
        attribute_service::delete_attribute(&state, &user, id).await?,
    ))
}
