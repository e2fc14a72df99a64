use std::collections::BTreeMap;

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use sea_orm::{ConnectionTrait, Statement};
use tokio::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use axum_storefront_api::{
    db::{create_orm_conn, create_pool},
    dto::{
        attributes::CreateAttributeRequest,
        cart::{AddToCartRequest, ApplyCouponRequest, UpdateCartItemRequest},
        categories::{CreateCategoryRequest, UpdateCategoryRequest},
        coupons::CreateCouponRequest,
        orders::CheckoutRequest,
        products::{CreateProductRequest, PriceInput, VariantInput},
    },
    error::AppError,
    middleware::auth::{AuthUser, ShopperIdentity},
    models::{Category, DiscountType, ProductType},
    routes::params::CategoryProductsQuery,
    services::{
        attribute_service, cart_service, category_service, coupon_service, order_service,
        product_service,
    },
    state::AppState,
};

// Both tests truncate the schema, so they take a turn on the database.
static DB_LOCK: Mutex<()> = Mutex::const_new(());

// Full storefront flow: seed a catalog, accumulate cart lines per
// attribute selection, apply a coupon, check out, and verify the
// coupon cannot be spent twice.
#[tokio::test]
async fn cart_accumulation_coupon_and_checkout_flow() -> anyhow::Result<()> {
    let Some((state, _guard)) = setup().await? else {
        return Ok(());
    };

    let admin = AuthUser {
        user_id: Uuid::new_v4(),
        role: "admin".into(),
    };
    let shopper = ShopperIdentity::User(Uuid::new_v4());

    // Catalog: one category, a Color attribute, one variant product and
    // one single product with a special price.
    let category = create_category(&state, &admin, "Shirts", "shirts", None).await?;

    let color = attribute_service::create_attribute(
        &state,
        &admin,
        CreateAttributeRequest {
            name: "Color".into(),
            slug: "color".into(),
            values: vec!["Red".into(), "Blue".into()],
        },
    )
    .await?
    .data
    .unwrap();
    let red = color.values[0].id;
    let blue = color.values[1].id;

    let red_selection: BTreeMap<Uuid, Uuid> = [(color.id, red)].into_iter().collect();
    let blue_selection: BTreeMap<Uuid, Uuid> = [(color.id, blue)].into_iter().collect();

    let shirt = product_service::create_product(
        &state,
        &admin,
        CreateProductRequest {
            sku: "SHIRT".into(),
            name: "Shirt".into(),
            slug: "shirt".into(),
            description: None,
            category_id: category.id,
            brand_id: None,
            product_type: ProductType::Variant,
            status: None,
            popular: None,
            attributes: None,
            price: None,
            variants: Some(vec![
                VariantInput {
                    sku: "SHIRT-RED".into(),
                    label: None,
                    is_default: true,
                    attribute_values: red_selection.clone(),
                    price: price_input(100),
                },
                VariantInput {
                    sku: "SHIRT-BLUE".into(),
                    label: None,
                    is_default: false,
                    attribute_values: blue_selection.clone(),
                    price: price_input(120),
                },
            ]),
        },
    )
    .await?
    .data
    .unwrap();

    let mut mug_price = price_input(50);
    mug_price.special_price = Some(Decimal::from(10));
    mug_price.special_price_type = Some(DiscountType::Fixed);
    let mug = product_service::create_product(
        &state,
        &admin,
        CreateProductRequest {
            sku: "MUG".into(),
            name: "Mug".into(),
            slug: "mug".into(),
            description: None,
            category_id: category.id,
            brand_id: None,
            product_type: ProductType::Single,
            status: None,
            popular: None,
            attributes: None,
            price: Some(mug_price),
            variants: None,
        },
    )
    .await?
    .data
    .unwrap();

    // Same selection accumulates; a different selection is its own line.
    cart_service::add_item(
        &state,
        &shopper,
        AddToCartRequest {
            product_id: shirt.id,
            quantity: 2,
            attributes: Some(red_selection.clone()),
        },
    )
    .await?;
    cart_service::add_item(
        &state,
        &shopper,
        AddToCartRequest {
            product_id: shirt.id,
            quantity: 3,
            attributes: Some(red_selection.clone()),
        },
    )
    .await?;
    cart_service::add_item(
        &state,
        &shopper,
        AddToCartRequest {
            product_id: shirt.id,
            quantity: 1,
            attributes: Some(blue_selection.clone()),
        },
    )
    .await?;
    let cart = cart_service::add_item(
        &state,
        &shopper,
        AddToCartRequest {
            product_id: mug.id,
            quantity: 1,
            attributes: None,
        },
    )
    .await?
    .data
    .unwrap();

    assert_eq!(cart.items.len(), 3);
    let red_line = cart
        .items
        .iter()
        .find(|i| i.quantity == 5)
        .expect("red line accumulated to 5");
    assert_eq!(red_line.unit_price, Decimal::from(100));
    let mug_line = cart
        .items
        .iter()
        .find(|i| i.product_id == mug.id)
        .expect("mug line");
    // 50 base with a 10 fixed special price.
    assert_eq!(mug_line.unit_price, Decimal::from(40));
    assert_eq!(cart.subtotal, Decimal::from(660));

    // Setting a quantity is absolute, not additive.
    let cart = cart_service::update_item(
        &state,
        &shopper,
        UpdateCartItemRequest {
            product_id: shirt.id,
            quantity: 4,
            attributes: Some(blue_selection.clone()),
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(cart.subtotal, Decimal::from(500 + 480 + 40));

    // Back to one blue shirt for the coupon math below.
    cart_service::update_item(
        &state,
        &shopper,
        UpdateCartItemRequest {
            product_id: shirt.id,
            quantity: 1,
            attributes: Some(blue_selection.clone()),
        },
    )
    .await?;

    let now = Utc::now();
    coupon_service::create_coupon(
        &state,
        &admin,
        CreateCouponRequest {
            code: "SAVE50".into(),
            min_buy: Decimal::from(100),
            discount_type: DiscountType::Fixed,
            discount_amount: Decimal::from(50),
            discount_start_date: now - Duration::days(1),
            discount_end_date: now + Duration::days(1),
        },
    )
    .await?;

    let cart = cart_service::apply_coupon(
        &state,
        &shopper,
        ApplyCouponRequest {
            coupon_code: "SAVE50".into(),
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(cart.discount, Decimal::from(50));
    assert_eq!(cart.total, Decimal::from(610));

    // Applying another code replaces the active one, no error.
    coupon_service::create_coupon(
        &state,
        &admin,
        CreateCouponRequest {
            code: "SAVE20".into(),
            min_buy: Decimal::from(100),
            discount_type: DiscountType::Fixed,
            discount_amount: Decimal::from(20),
            discount_start_date: now - Duration::days(1),
            discount_end_date: now + Duration::days(1),
        },
    )
    .await?;
    let cart = cart_service::apply_coupon(
        &state,
        &shopper,
        ApplyCouponRequest {
            coupon_code: "SAVE20".into(),
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(cart.coupon_code.as_deref(), Some("SAVE20"));
    assert_eq!(cart.discount, Decimal::from(20));
    assert_eq!(cart.total, Decimal::from(640));

    // Removal resets the cart to its undiscounted state.
    let cart = cart_service::remove_coupon(&state, &shopper).await?.data.unwrap();
    assert!(cart.coupon_code.is_none());
    assert!(!cart.coupon_applied);
    assert_eq!(cart.discount, Decimal::ZERO);
    assert_eq!(cart.total, Decimal::from(660));

    // And the first code can come back afterwards.
    let cart = cart_service::apply_coupon(
        &state,
        &shopper,
        ApplyCouponRequest {
            coupon_code: "SAVE50".into(),
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(cart.discount, Decimal::from(50));
    assert_eq!(cart.total, Decimal::from(610));

    let checkout = order_service::checkout(&state, &shopper, CheckoutRequest { note: None })
        .await?
        .data
        .unwrap();
    assert_eq!(checkout.order.subtotal, Decimal::from(660));
    assert_eq!(checkout.order.discount, Decimal::from(50));
    assert_eq!(checkout.order.total, Decimal::from(610));
    assert_eq!(checkout.items.len(), 3);
    assert!(checkout.order.code.starts_with("ORD-"));

    // Checkout consumed the cart.
    let cart = cart_service::get_cart(&state, &shopper).await?.data.unwrap();
    assert!(cart.items.is_empty());

    // The usage was recorded, so the same user cannot apply it again.
    cart_service::add_item(
        &state,
        &shopper,
        AddToCartRequest {
            product_id: mug.id,
            quantity: 5,
            attributes: None,
        },
    )
    .await?;
    let rejected = cart_service::apply_coupon(
        &state,
        &shopper,
        ApplyCouponRequest {
            coupon_code: "SAVE50".into(),
        },
    )
    .await;
    match rejected {
        Err(AppError::State(code)) => assert_eq!(code, "ALREADY_USED"),
        other => panic!("expected ALREADY_USED rejection, got {other:?}"),
    }

    // The rejected apply rolled back; nothing stuck to the cart.
    let cart = cart_service::get_cart(&state, &shopper).await?.data.unwrap();
    assert!(!cart.coupon_applied);
    assert_eq!(cart.discount, Decimal::ZERO);

    // A fresh anonymous session is free to use it.
    let session = ShopperIdentity::Session("sess-123".into());
    cart_service::add_item(
        &state,
        &session,
        AddToCartRequest {
            product_id: mug.id,
            quantity: 5,
            attributes: None,
        },
    )
    .await?;
    let cart = cart_service::apply_coupon(
        &state,
        &session,
        ApplyCouponRequest {
            coupon_code: "SAVE50".into(),
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(cart.discount, Decimal::from(50));

    // Setting a quantity on an empty identity creates the cart and the
    // line at that quantity.
    let newcomer = ShopperIdentity::Session("sess-456".into());
    let cart = cart_service::update_item(
        &state,
        &newcomer,
        UpdateCartItemRequest {
            product_id: mug.id,
            quantity: 3,
            attributes: None,
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(cart.items.len(), 1);
    assert_eq!(cart.items[0].quantity, 3);
    assert_eq!(cart.subtotal, Decimal::from(120));

    Ok(())
}

// Subtree aggregation and the admin views over a three-level tree.
#[tokio::test]
async fn category_subtree_aggregation_and_admin_views() -> anyhow::Result<()> {
    let Some((state, _guard)) = setup().await? else {
        return Ok(());
    };

    let admin = AuthUser {
        user_id: Uuid::new_v4(),
        role: "admin".into(),
    };

    let electronics = create_category(&state, &admin, "Electronics", "electronics", None).await?;
    let computers =
        create_category(&state, &admin, "Computers", "computers", Some(electronics.id)).await?;
    let laptops = create_category(&state, &admin, "Laptops", "laptops", Some(computers.id)).await?;

    seed_product(&state, &admin, "TV", "tv", electronics.id).await?;
    seed_product(&state, &admin, "Ultrabook", "ultrabook", laptops.id).await?;

    // The root listing sees products from the whole subtree.
    let listing =
        category_service::category_products(&state, "electronics", default_query()).await?;
    assert_eq!(listing.meta.unwrap().total, Some(2));

    // Depth markers in the admin dropdown.
    let options = category_service::category_options(&state, &admin)
        .await?
        .data
        .unwrap();
    let laptops_option = options
        .items
        .iter()
        .find(|o| o.id == laptops.id)
        .expect("laptops option");
    assert_eq!(laptops_option.name, "|--- |--- Laptops");
    assert_eq!(laptops_option.depth, 2);

    // A category cannot move under its own subtree.
    let cycle = category_service::update_category(
        &state,
        &admin,
        electronics.id,
        UpdateCategoryRequest {
            name: None,
            slug: None,
            parent_id: Some(laptops.id),
            status: None,
            popular: None,
            show_in_home: None,
        },
    )
    .await;
    assert!(matches!(cycle, Err(AppError::BadRequest(_))));

    // Soft-deleting the middle node hides its whole branch from
    // aggregation while the root keeps its own products.
    category_service::delete_category(&state, &admin, computers.id).await?;
    let listing =
        category_service::category_products(&state, "electronics", default_query()).await?;
    assert_eq!(listing.meta.unwrap().total, Some(1));

    // The deleted branch is gone from the storefront tree as well.
    let tree = category_service::category_tree(&state).await?.data.unwrap();
    let root = tree
        .items
        .iter()
        .find(|n| n.id == electronics.id)
        .expect("root in tree");
    assert!(root.children.is_empty());

    Ok(())
}

fn price_input(amount: i64) -> PriceInput {
    PriceInput {
        price: Decimal::from(amount),
        special_price: None,
        special_price_type: None,
        quantity: 10,
        in_stock: Some(true),
    }
}

fn default_query() -> CategoryProductsQuery {
    CategoryProductsQuery::default()
}

async fn create_category(
    state: &AppState,
    admin: &AuthUser,
    name: &str,
    slug: &str,
    parent_id: Option<Uuid>,
) -> anyhow::Result<Category> {
    let category = category_service::create_category(
        state,
        admin,
        CreateCategoryRequest {
            name: name.into(),
            slug: slug.into(),
            parent_id,
            status: None,
            popular: None,
            show_in_home: None,
        },
    )
    .await?
    .data
    .unwrap();
    Ok(category)
}

async fn seed_product(
    state: &AppState,
    admin: &AuthUser,
    name: &str,
    slug: &str,
    category_id: Uuid,
) -> anyhow::Result<()> {
    product_service::create_product(
        state,
        admin,
        CreateProductRequest {
            sku: slug.to_uppercase(),
            name: name.into(),
            slug: slug.into(),
            description: None,
            category_id,
            brand_id: None,
            product_type: ProductType::Single,
            status: None,
            popular: None,
            attributes: None,
            price: Some(price_input(100)),
            variants: None,
        },
    )
    .await?;
    Ok(())
}

/// None when no database is configured; otherwise a clean schema and
/// the lock that keeps the two tests from interleaving.
async fn setup() -> anyhow::Result<Option<(AppState, MutexGuard<'static, ()>)>> {
    let database_url =
        match std::env::var("TEST_DATABASE_URL").or_else(|_| std::env::var("DATABASE_URL")) {
            Ok(url) => url,
            Err(_) => {
                eprintln!(
                    "Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration flow tests."
                );
                return Ok(None);
            }
        };

    let guard = DB_LOCK.lock().await;

    let pool = create_pool(&database_url).await?;
    let orm = create_orm_conn(&database_url).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    // Clean tables between runs
    let backend = orm.get_database_backend();
    orm.execute(Statement::from_string(
        backend,
        "TRUNCATE TABLE order_items, orders, coupon_usages, coupons, cart_items, carts, \
         flash_deal_products, flash_deals, variant_attribute_values, product_variants, \
         price_records, product_attribute_values, products, attribute_values, attributes, \
         brands, categories, audit_logs RESTART IDENTITY CASCADE",
    ))
    .await?;

    Ok(Some((AppState::new(pool, orm), guard)))
}
