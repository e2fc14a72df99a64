use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{delete, get},
};
use uuid::Uuid;

use crate::{
    dto::flash_deals::{CreateFlashDealRequest, FlashDealDto, FlashDealList},
    error::AppResult,
    middleware::auth::AuthUser,
    response::ApiResponse,
    services::flash_deal_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_flash_deals).post(create_flash_deal))
        .route("/{id}", delete(delete_flash_deal))
}

#[utoipa::path(
    get,
    path = "/api/flash-deals",
    responses(
        (status = 200, description = "List campaigns with their products", body = ApiResponse<FlashDealList>)
    ),
    security(("bearer_auth" = [])),
    tag = "Flash deals"
)]
pub async fn list_flash_deals(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<FlashDealList>>> {
    Ok(Json(
        flash_deal_service::list_flash_deals(&state, &user).await?,
    ))
}

#[utoipa::path(
    post,
    path = "/api/flash-deals",
    request_body = CreateFlashDealRequest,
    responses(
        (status = 200, description = "Campaign created and stamped onto product prices", body = ApiResponse<FlashDealDto>),
        (status = 400, description = "Bad window, discounts or products"),
    ),
    security(("bearer_auth" = [])),
    tag = "Flash deals"
)]
pub async fn create_flash_deal(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateFlashDealRequest>,
) -> AppResult<Json<ApiResponse<FlashDealDto>>> {
    Ok(Json(
        flash_deal_service::create_flash_deal(&state, &user, payload).await?,
    ))
}

#[utoipa::path(
    delete,
    path = "/api/flash-deals/{id}",
    params(("id" = Uuid, Path, description = "Flash deal ID")),
    responses(
        (status = 200, description = "Campaign deleted, discounts cleared", body = ApiResponse<serde_json::Value>),
        (status = 404, description = "Flash deal not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Flash deals"
)]
pub async fn delete_flash_deal(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    Ok(Json(
        flash_deal_service::delete_flash_deal(&state, &user, id).await?,
    ))
}
