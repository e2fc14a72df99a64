use axum::Router;

use crate::state::AppState;

pub mod attributes;
pub mod brands;
pub mod cart;
pub mod categories;
pub mod coupons;
pub mod doc;
pub mod flash_deals;
pub mod health;
pub mod orders;
pub mod params;
pub mod products;

// Build the API router without binding state; it is provided at the top level.
pub fn create_api_router() -> Router<AppState> {
    Router::new()
        .nest("/categories", categories::router())
        .nest("/brands", brands::router())
        .nest("/attributes", attributes::router())
        .nest("/products", products::router())
        .nest("/cart", cart::router())
        .nest("/coupons", coupons::router())
        .nest("/flash-deals", flash_deals::router())
        .nest("/orders", orders::router())
}
