use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::Expr;
use sea_orm::sea_query::extension::postgres::PgExpr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};
use std::collections::HashMap;
use uuid::Uuid;

use crate::{
    audit::log_audit,
    catalog::tree::{self, CategoryNode},
    dto::categories::{
        CategoryList, CategoryOptionList, CategoryTree, CategoryTreeNode, CreateCategoryRequest,
        UpdateCategoryRequest,
    },
    dto::products::ProductList,
    entity::categories::{ActiveModel, Column, Entity as Categories, Model as CategoryModel},
    error::{AppError, AppResult, conflict_on_unique},
    middleware::auth::{AuthUser, ensure_admin},
    models::{Category, ProductType},
    response::{ApiResponse, Meta},
    routes::params::{CategoryProductsQuery, ListQuery},
    services::product_service,
    state::AppState,
};

pub fn category_from_entity(model: CategoryModel) -> Category {
    Category {
        id: model.id,
        name: model.name,
        slug: model.slug,
        parent_id: model.parent_id,
        status: model.status,
        popular: model.popular,
        show_in_home: model.show_in_home,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

fn node_from_entity(model: &CategoryModel) -> CategoryNode {
    CategoryNode {
        id: model.id,
        parent_id: model.parent_id,
        name: model.name.clone(),
        slug: model.slug.clone(),
        active: model.status == "active",
        deleted: model.deleted_flg,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

/// One fetch of the whole table; traversal happens in memory so a deep
/// tree costs one round trip instead of one per level.
pub async fn load_nodes<C: ConnectionTrait>(conn: &C) -> AppResult<Vec<CategoryNode>> {
    let rows = Categories::find().all(conn).await?;
    Ok(rows.iter().map(node_from_entity).collect())
}

pub async fn create_category(
    state: &AppState,
    user: &AuthUser,
    payload: CreateCategoryRequest,
) -> AppResult<ApiResponse<Category>> {
    ensure_admin(user)?;

    if let Some(parent_id) = payload.parent_id {
        let parent = Categories::find_by_id(parent_id)
            .filter(Column::DeletedFlg.eq(false))
            .one(&state.orm)
            .await?;
        if parent.is_none() {
            return Err(AppError::BadRequest("parent category not found".into()));
        }
    }

    let category = ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(payload.name),
        slug: Set(payload.slug),
        parent_id: Set(payload.parent_id),
        status: Set(payload.status.unwrap_or_else(|| "active".to_string())),
        popular: Set(payload.popular.unwrap_or(false)),
        show_in_home: Set(payload.show_in_home.unwrap_or(false)),
        deleted_flg: Set(false),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await
    .map_err(conflict_on_unique)?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "category_create",
        Some("categories"),
        Some(serde_json::json!({ "category_id": category.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Category created",
        category_from_entity(category),
        Some(Meta::empty()),
    ))
}

pub async fn update_category(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateCategoryRequest,
) -> AppResult<ApiResponse<Category>> {
    ensure_admin(user)?;

    let existing = Categories::find_by_id(id)
        .filter(Column::DeletedFlg.eq(false))
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    if let Some(parent_id) = payload.parent_id {
        if parent_id == id {
            return Err(AppError::BadRequest(
                "a category cannot be its own parent".into(),
            ));
        }
        let parent = Categories::find_by_id(parent_id)
            .filter(Column::DeletedFlg.eq(false))
            .one(&state.orm)
            .await?;
        if parent.is_none() {
            return Err(AppError::BadRequest("parent category not found".into()));
        }
        // Reparenting under one's own subtree would create a cycle.
        let nodes = load_nodes(&state.orm).await?;
        if tree::descendant_ids(&nodes, id)?.contains(&parent_id) {
            return Err(AppError::BadRequest(
                "cannot move a category under its own subtree".into(),
            ));
        }
    }

    let mut active: ActiveModel = existing.into();
    if let Some(name) = payload.name {
        active.name = Set(name);
    }
    if let Some(slug) = payload.slug {
        active.slug = Set(slug);
    }
    if payload.parent_id.is_some() {
        active.parent_id = Set(payload.parent_id);
    }
    if let Some(status) = payload.status {
        active.status = Set(status);
    }
    if let Some(popular) = payload.popular {
        active.popular = Set(popular);
    }
    if let Some(show_in_home) = payload.show_in_home {
        active.show_in_home = Set(show_in_home);
    }
    active.updated_at = Set(Utc::now().into());
    let category = active.update(&state.orm).await.map_err(conflict_on_unique)?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "category_update",
        Some("categories"),
        Some(serde_json::json!({ "category_id": id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Updated",
        category_from_entity(category),
        Some(Meta::empty()),
    ))
}

pub async fn delete_category(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(user)?;

    let existing = Categories::find_by_id(id)
        .filter(Column::DeletedFlg.eq(false))
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let mut active: ActiveModel = existing.into();
    active.deleted_flg = Set(true);
    active.updated_at = Set(Utc::now().into());
    active.update(&state.orm).await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "category_delete",
        Some("categories"),
        Some(serde_json::json!({ "category_id": id })),
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

pub async fn list_categories(
    state: &AppState,
    query: ListQuery,
) -> AppResult<ApiResponse<CategoryList>> {
    let (page, limit, offset) = query.pagination().normalize();
    let mut condition = Condition::all().add(Column::DeletedFlg.eq(false));
    if let Some(search) = query.q.as_ref().filter(|s| !s.is_empty()) {
        condition = condition.add(Expr::col(Column::Name).ilike(format!("%{}%", search)));
    }

    let finder = Categories::find()
        .filter(condition)
        .order_by_desc(Column::CreatedAt);
    let total = finder.clone().count(&state.orm).await? as i64;
    let rows = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?;

    Ok(ApiResponse::success(
        "Categories",
        CategoryList {
            items: rows.into_iter().map(category_from_entity).collect(),
        },
        Some(Meta::new(page, limit, total)),
    ))
}

/// A worklist pass records visit order and child ids per parent, then a
/// reverse pass assembles the nested nodes bottom-up. No recursion, so
/// tree depth is bounded by the explicit cap rather than the call stack.
fn build_tree(nodes: &[CategoryNode]) -> AppResult<Vec<CategoryTreeNode>> {
    let mut children: HashMap<Option<Uuid>, Vec<&CategoryNode>> = HashMap::new();
    for node in nodes.iter().filter(|n| n.active && !n.deleted) {
        children.entry(node.parent_id).or_default().push(node);
    }
    for siblings in children.values_mut() {
        siblings.sort_by(|a, b| a.created_at.cmp(&b.created_at));
    }

    let roots = children.remove(&None).unwrap_or_default();
    let mut order: Vec<&CategoryNode> = Vec::new();
    let mut kid_ids: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
    let mut worklist: Vec<(&CategoryNode, usize)> = roots.iter().map(|n| (*n, 0)).collect();
    while let Some((node, depth)) = worklist.pop() {
        if depth >= tree::MAX_TREE_DEPTH {
            return Err(AppError::Internal(anyhow::anyhow!(
                "category tree deeper than {} levels, possible parent cycle",
                tree::MAX_TREE_DEPTH
            )));
        }
        order.push(node);
        let kids = children.remove(&Some(node.id)).unwrap_or_default();
        kid_ids.insert(node.id, kids.iter().map(|k| k.id).collect());
        worklist.extend(kids.into_iter().map(|k| (k, depth + 1)));
    }

    // Reverse visit order guarantees every child is built before its
    // parent.
    let mut built: HashMap<Uuid, CategoryTreeNode> = HashMap::new();
    for node in order.into_iter().rev() {
        let nested = kid_ids
            .remove(&node.id)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|id| built.remove(&id))
            .collect();
        built.insert(
            node.id,
            CategoryTreeNode {
                id: node.id,
                name: node.name.clone(),
                slug: node.slug.clone(),
                children: nested,
            },
        );
    }

    Ok(roots
        .into_iter()
        .filter_map(|n| built.remove(&n.id))
        .collect())
}

/// Storefront navigation: visible categories nested under their parents.
pub async fn category_tree(state: &AppState) -> AppResult<ApiResponse<CategoryTree>> {
    let nodes = load_nodes(&state.orm).await?;
    let items = build_tree(&nodes)?;
    Ok(ApiResponse::success("Category tree", CategoryTree { items }, None))
}

/// Admin dropdown listing, names prefixed with depth markers.
pub async fn category_options(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<CategoryOptionList>> {
    ensure_admin(user)?;
    let nodes = load_nodes(&state.orm).await?;
    let items = tree::render_indented(&nodes)?;
    Ok(ApiResponse::success(
        "Category options",
        CategoryOptionList { items },
        None,
    ))
}

/// Products under a category and its whole visible subtree, with
/// optional brand and attribute-value facets.
pub async fn category_products(
    state: &AppState,
    slug: &str,
    query: CategoryProductsQuery,
) -> AppResult<ApiResponse<ProductList>> {
    let root = Categories::find()
        .filter(
            Condition::all()
                .add(Column::Slug.eq(slug))
                .add(Column::DeletedFlg.eq(false))
                .add(Column::Status.eq("active")),
        )
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let nodes = load_nodes(&state.orm).await?;
    let category_ids: Vec<Uuid> = tree::resolve_subtree(&nodes, root.id)?.into_iter().collect();

    let (page, limit, offset) = query.pagination().normalize();
    let attribute_value_ids = query.attribute_value_ids()?;

    let total: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM products p
        WHERE p.category_id = ANY($1)
          AND p.deleted_flg = FALSE
          AND p.status = 'active'
          AND ($2::uuid IS NULL OR p.brand_id = $2)
          AND ($3::uuid[] IS NULL OR EXISTS (
              SELECT 1 FROM product_attribute_values pav
              WHERE pav.product_id = p.id
                AND pav.attribute_value_id = ANY($3)))
        "#,
    )
    .bind(&category_ids)
    .bind(query.brand_id)
    .bind(&attribute_value_ids)
    .fetch_one(&state.pool)
    .await?;

    let ids: Vec<Uuid> = sqlx::query_scalar(
        r#"
        SELECT p.id FROM products p
        WHERE p.category_id = ANY($1)
          AND p.deleted_flg = FALSE
          AND p.status = 'active'
          AND ($2::uuid IS NULL OR p.brand_id = $2)
          AND ($3::uuid[] IS NULL OR EXISTS (
              SELECT 1 FROM product_attribute_values pav
              WHERE pav.product_id = p.id
                AND pav.attribute_value_id = ANY($3)))
        ORDER BY p.created_at DESC
        LIMIT $4 OFFSET $5
        "#,
    )
    .bind(&category_ids)
    .bind(query.brand_id)
    .bind(&attribute_value_ids)
    .bind(limit)
    .bind(offset)
    .fetch_all(&state.pool)
    .await?;

    let mut rows = crate::entity::Products::find()
        .filter(crate::entity::products::Column::Id.is_in(ids.clone()))
        .all(&state.orm)
        .await?;
    // The id fetch carries the ordering; restore it after the ORM load.
    let order: HashMap<Uuid, usize> = ids.iter().enumerate().map(|(i, id)| (*id, i)).collect();
    rows.sort_by_key(|m| order.get(&m.id).copied().unwrap_or(usize::MAX));

    let keys: Vec<(Uuid, ProductType)> = rows
        .iter()
        .filter_map(|m| ProductType::parse(&m.product_type).map(|t| (m.id, t)))
        .collect();
    let pricing_map = product_service::load_pricing_map(&state.orm, &keys).await?;
    let items = product_service::summarize(rows, &pricing_map, Utc::now());

    Ok(ApiResponse::success(
        "Products",
        ProductList { items },
        Some(Meta::new(page, limit, total)),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn node(name: &str, parent_id: Option<Uuid>, minute: i64) -> CategoryNode {
        CategoryNode {
            id: Uuid::new_v4(),
            parent_id,
            name: name.to_string(),
            slug: name.to_lowercase(),
            active: true,
            deleted: false,
            created_at: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
                + Duration::minutes(minute),
        }
    }

    #[test]
    fn nests_children_oldest_first() {
        let root = node("Clothing", None, 0);
        let newer = node("Shoes", Some(root.id), 2);
        let older = node("Shirts", Some(root.id), 1);
        let leaf = node("Sneakers", Some(newer.id), 3);

        let items = build_tree(&[root, newer, older, leaf]).unwrap();
        assert_eq!(items.len(), 1);
        let kids = &items[0].children;
        assert_eq!(kids[0].name, "Shirts");
        assert_eq!(kids[1].name, "Shoes");
        assert_eq!(kids[1].children[0].name, "Sneakers");
    }

    #[test]
    fn hidden_branch_is_dropped() {
        let root = node("Clothing", None, 0);
        let mut hidden = node("Archive", Some(root.id), 1);
        hidden.active = false;
        let orphaned = node("Old Shirts", Some(hidden.id), 2);

        let items = build_tree(&[root, hidden, orphaned]).unwrap();
        assert_eq!(items.len(), 1);
        assert!(items[0].children.is_empty());
    }

    #[test]
    fn deep_chain_is_reported() {
        let mut nodes = vec![node("N0", None, 0)];
        for i in 1..=tree::MAX_TREE_DEPTH {
            let parent = nodes[i - 1].id;
            nodes.push(node(&format!("N{i}"), Some(parent), i as i64));
        }
        assert!(build_tree(&nodes).is_err());
    }
}
