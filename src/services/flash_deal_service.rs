use std::collections::HashMap;

use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    catalog::pricing,
    dto::flash_deals::{
        CreateFlashDealRequest, FlashDealDto, FlashDealList, FlashDealProductDto,
    },
    entity::{
        flash_deal_products::{
            ActiveModel as DealProductActive, Column as DealProductCol,
            Entity as FlashDealProducts,
        },
        flash_deals::{ActiveModel, Column, Entity as FlashDeals, Model as FlashDealModel},
        price_records::{Column as PriceCol, Entity as PriceRecords},
        products::{Column as ProductCol, Entity as Products},
    },
    error::{AppError, AppResult, conflict_on_unique},
    middleware::auth::{AuthUser, ensure_admin},
    models::DiscountType,
    response::{ApiResponse, Meta},
    state::AppState,
};

fn deal_dto(model: FlashDealModel, products: Vec<FlashDealProductDto>) -> FlashDealDto {
    FlashDealDto {
        id: model.id,
        campaign_name: model.campaign_name,
        start_date: model.start_date.with_timezone(&Utc),
        end_date: model.end_date.with_timezone(&Utc),
        status: model.status,
        products,
    }
}

/// Create a campaign and stamp its window and discount onto every price
/// record of each listed product. One transaction: a campaign is never
/// half-stamped.
pub async fn create_flash_deal(
    state: &AppState,
    user: &AuthUser,
    payload: CreateFlashDealRequest,
) -> AppResult<ApiResponse<FlashDealDto>> {
    ensure_admin(user)?;

    if payload.end_date < payload.start_date {
        return Err(AppError::BadRequest(
            "campaign window ends before it starts".into(),
        ));
    }
    if payload.products.is_empty() {
        return Err(AppError::BadRequest(
            "a flash deal needs at least one product".into(),
        ));
    }
    for product in &payload.products {
        pricing::validate_discount(product.discount_type, product.discount_amount)?;
    }

    let product_ids: Vec<Uuid> = payload.products.iter().map(|p| p.product_id).collect();
    let found = Products::find()
        .filter(ProductCol::Id.is_in(product_ids.clone()))
        .filter(ProductCol::DeletedFlg.eq(false))
        .all(&state.orm)
        .await?;
    if found.len() != product_ids.len() {
        return Err(AppError::BadRequest(
            "flash deal references unknown products".into(),
        ));
    }

    let txn = state.orm.begin().await?;

    let deal_id = Uuid::new_v4();
    let deal = ActiveModel {
        id: Set(deal_id),
        campaign_name: Set(payload.campaign_name),
        start_date: Set(payload.start_date.into()),
        end_date: Set(payload.end_date.into()),
        status: Set("active".to_string()),
        created_at: NotSet,
    }
    .insert(&txn)
    .await
    .map_err(conflict_on_unique)?;

    let mut dtos = Vec::with_capacity(payload.products.len());
    for product in &payload.products {
        DealProductActive {
            id: Set(Uuid::new_v4()),
            flash_deal_id: Set(deal_id),
            product_id: Set(product.product_id),
            discount_type: Set(product.discount_type.as_str().to_string()),
            discount_amount: Set(product.discount_amount),
        }
        .insert(&txn)
        .await?;

        PriceRecords::update_many()
            .col_expr(PriceCol::DiscountStartDate, Expr::value(deal.start_date))
            .col_expr(PriceCol::DiscountEndDate, Expr::value(deal.end_date))
            .col_expr(
                PriceCol::DiscountType,
                Expr::value(product.discount_type.as_str()),
            )
            .col_expr(PriceCol::DiscountAmount, Expr::value(product.discount_amount))
            .filter(PriceCol::ProductId.eq(product.product_id))
            .exec(&txn)
            .await?;

        dtos.push(FlashDealProductDto {
            product_id: product.product_id,
            discount_type: product.discount_type,
            discount_amount: product.discount_amount,
        });
    }

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "flash_deal_create",
        Some("flash_deals"),
        Some(serde_json::json!({ "flash_deal_id": deal_id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Flash deal created",
        deal_dto(deal, dtos),
        Some(Meta::empty()),
    ))
}

/// Delete a campaign and clear the stamped discount off its products'
/// price records.
pub async fn delete_flash_deal(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(user)?;

    let deal = FlashDeals::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    let deal_products = FlashDealProducts::find()
        .filter(DealProductCol::FlashDealId.eq(deal.id))
        .all(&state.orm)
        .await?;

    let txn = state.orm.begin().await?;

    for deal_product in &deal_products {
        PriceRecords::update_many()
            .col_expr(
                PriceCol::DiscountStartDate,
                Expr::value(None::<chrono::DateTime<chrono::FixedOffset>>),
            )
            .col_expr(
                PriceCol::DiscountEndDate,
                Expr::value(None::<chrono::DateTime<chrono::FixedOffset>>),
            )
            .col_expr(PriceCol::DiscountType, Expr::value(None::<String>))
            .col_expr(
                PriceCol::DiscountAmount,
                Expr::value(None::<rust_decimal::Decimal>),
            )
            .filter(PriceCol::ProductId.eq(deal_product.product_id))
            .exec(&txn)
            .await?;
    }

    FlashDeals::delete_by_id(deal.id).exec(&txn).await?;
    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "flash_deal_delete",
        Some("flash_deals"),
        Some(serde_json::json!({ "flash_deal_id": id })),
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

pub async fn list_flash_deals(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<FlashDealList>> {
    ensure_admin(user)?;

    let deals = FlashDeals::find()
        .order_by_desc(Column::CreatedAt)
        .all(&state.orm)
        .await?;
    let deal_ids: Vec<Uuid> = deals.iter().map(|d| d.id).collect();
    let deal_products = FlashDealProducts::find()
        .filter(DealProductCol::FlashDealId.is_in(deal_ids))
        .all(&state.orm)
        .await?;

    let mut by_deal: HashMap<Uuid, Vec<FlashDealProductDto>> = HashMap::new();
    for row in deal_products {
        let Some(discount_type) = DiscountType::parse(&row.discount_type) else {
            tracing::warn!(flash_deal_id = %row.flash_deal_id,
                "flash deal product has unknown discount_type, skipping");
            continue;
        };
        by_deal.entry(row.flash_deal_id).or_default().push(FlashDealProductDto {
            product_id: row.product_id,
            discount_type,
            discount_amount: row.discount_amount,
        });
    }

    let items = deals
        .into_iter()
        .map(|deal| {
            let products = by_deal.remove(&deal.id).unwrap_or_default();
            deal_dto(deal, products)
        })
        .collect();

    Ok(ApiResponse::success(
        "Flash deals",
        FlashDealList { items },
        None,
    ))
}
