use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    catalog::tree::CategoryOption,
    dto::{
        attributes::{AttributeList, AttributeValueDto, AttributeWithValues},
        brands::BrandList,
        cart::{CartItemDto, CartResponse},
        categories::{CategoryList, CategoryOptionList, CategoryTree, CategoryTreeNode},
        coupons::CouponList,
        flash_deals::{FlashDealDto, FlashDealList, FlashDealProductDto},
        orders::{OrderList, OrderWithItems},
        products::{ProductDetail, ProductList, ProductSummary},
    },
    models::{
        Brand, Category, Coupon, DiscountType, Order, OrderItem, PriceRecord, Product,
        ProductPricing, ProductType, Variant,
    },
    response::{ApiResponse, ErrorDetail, Meta},
    routes::{
        attributes, brands, cart, categories, coupons, flash_deals, health, orders, params,
        products,
    },
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        categories::list_categories,
        categories::create_category,
        categories::update_category,
        categories::delete_category,
        categories::category_tree,
        categories::category_options,
        brands::list_brands,
        brands::create_brand,
        brands::update_brand,
        brands::delete_brand,
        attributes::list_attributes,
        attributes::create_attribute,
        attributes::delete_attribute,
        products::list_products,
        products::create_product,
        products::get_product,
        products::update_product,
        products::delete_product,
        products::category_products,
        cart::get_cart,
        cart::add_item,
        cart::update_item,
        cart::remove_item,
        cart::apply_coupon,
        cart::remove_coupon,
        coupons::list_coupons,
        coupons::create_coupon,
        coupons::update_coupon,
        coupons::delete_coupon,
        flash_deals::list_flash_deals,
        flash_deals::create_flash_deal,
        flash_deals::delete_flash_deal,
        orders::checkout,
        orders::list_orders,
        orders::get_order
    ),
    components(
        schemas(
            Category,
            Brand,
            Product,
            ProductType,
            DiscountType,
            PriceRecord,
            Variant,
            ProductPricing,
            Coupon,
            Order,
            OrderItem,
            CategoryList,
            CategoryTree,
            CategoryTreeNode,
            CategoryOption,
            CategoryOptionList,
            BrandList,
            AttributeList,
            AttributeWithValues,
            AttributeValueDto,
            ProductList,
            ProductSummary,
            ProductDetail,
            CartResponse,
            CartItemDto,
            CouponList,
            FlashDealList,
            FlashDealDto,
            FlashDealProductDto,
            OrderList,
            OrderWithItems,
            params::Pagination,
            params::ProductQuery,
            params::OrderListQuery,
            Meta,
            ApiResponse<health::HealthData>,
            ApiResponse<Category>,
            ApiResponse<CategoryList>,
            ApiResponse<CategoryTree>,
            ApiResponse<CategoryOptionList>,
            ApiResponse<Brand>,
            ApiResponse<BrandList>,
            ApiResponse<AttributeWithValues>,
            ApiResponse<AttributeList>,
            ApiResponse<Product>,
            ApiResponse<ProductList>,
            ApiResponse<ProductDetail>,
            ApiResponse<CartResponse>,
            ApiResponse<Coupon>,
            ApiResponse<CouponList>,
            ApiResponse<FlashDealDto>,
            ApiResponse<FlashDealList>,
            ApiResponse<OrderWithItems>,
            ApiResponse<OrderList>,
            ApiResponse<serde_json::Value>,
            ApiResponse<ErrorDetail>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Categories", description = "Category tree endpoints"),
        (name = "Brands", description = "Brand endpoints"),
        (name = "Attributes", description = "Attribute endpoints"),
        (name = "Products", description = "Product and pricing endpoints"),
        (name = "Cart", description = "Cart endpoints"),
        (name = "Coupons", description = "Coupon administration"),
        (name = "Flash deals", description = "Campaign administration"),
        (name = "Orders", description = "Order endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
