use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{delete, get, post},
};
use uuid::Uuid;

use crate::{
    dto::cart::{AddToCartRequest, ApplyCouponRequest, CartResponse, UpdateCartItemRequest},
    error::AppResult,
    middleware::auth::ShopperIdentity,
    response::ApiResponse,
    services::cart_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_cart))
        .route("/items", post(add_item).put(update_item))
        .route("/items/{id}", delete(remove_item))
        .route("/coupon", post(apply_coupon).delete(remove_coupon))
}

#[utoipa::path(
    get,
    path = "/api/cart",
    responses(
        (status = 200, description = "The cart with prices resolved now", body = ApiResponse<CartResponse>)
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn get_cart(
    State(state): State<AppState>,
    identity: ShopperIdentity,
) -> AppResult<Json<ApiResponse<CartResponse>>> {
    Ok(Json(cart_service::get_cart(&state, &identity).await?))
}

#[utoipa::path(
    post,
    path = "/api/cart/items",
    request_body = AddToCartRequest,
    responses(
        (status = 200, description = "Line added; same selection accumulates quantity", body = ApiResponse<CartResponse>),
        (status = 400, description = "Bad quantity or unknown product"),
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn add_item(
    State(state): State<AppState>,
    identity: ShopperIdentity,
    Json(payload): Json<AddToCartRequest>,
) -> AppResult<Json<ApiResponse<CartResponse>>> {
    Ok(Json(cart_service::add_item(&state, &identity, payload).await?))
}

#[utoipa::path(
    put,
    path = "/api/cart/items",
    request_body = UpdateCartItemRequest,
    responses(
        (status = 200, description = "Quantity set", body = ApiResponse<CartResponse>),
        (status = 404, description = "No such line in the cart"),
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn update_item(
    State(state): State<AppState>,
    identity: ShopperIdentity,
    Json(payload): Json<UpdateCartItemRequest>,
) -> AppResult<Json<ApiResponse<CartResponse>>> {
    Ok(Json(
        cart_service::update_item(&state, &identity, payload).await?,
    ))
}

#[utoipa::path(
    delete,
    path = "/api/cart/items/{id}",
    params(("id" = Uuid, Path, description = "Cart item ID")),
    responses(
        (status = 200, description = "Removed", body = ApiResponse<CartResponse>),
        (status = 404, description = "No such line in the cart"),
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn remove_item(
    State(state): State<AppState>,
    identity: ShopperIdentity,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<CartResponse>>> {
    Ok(Json(cart_service::remove_item(&state, &identity, id).await?))
}

#[utoipa::path(
    post,
    path = "/api/cart/coupon",
    request_body = ApplyCouponRequest,
    responses(
        (status = 200, description = "Coupon applied", body = ApiResponse<CartResponse>),
        (status = 422, description = "Coupon rejected with a reason code"),
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn apply_coupon(
    State(state): State<AppState>,
    identity: ShopperIdentity,
    Json(payload): Json<ApplyCouponRequest>,
) -> AppResult<Json<ApiResponse<CartResponse>>> {
    Ok(Json(
        cart_service::apply_coupon(&state, &identity, payload).await?,
    ))
}

#[utoipa::path(
    delete,
    path = "/api/cart/coupon",
    responses(
        (status = 200, description = "Coupon removed", body = ApiResponse<CartResponse>),
        (status = 404, description = "No cart for this identity"),
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn remove_coupon(
    State(state): State<AppState>,
    identity: ShopperIdentity,
) -> AppResult<Json<ApiResponse<CartResponse>>> {
    Ok(Json(cart_service::remove_coupon(&state, &identity).await?))
}
