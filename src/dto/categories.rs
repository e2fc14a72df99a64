use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{catalog::tree::CategoryOption, models::Category};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateCategoryRequest {
    pub name: String,
    pub slug: String,
    pub parent_id: Option<Uuid>,
    pub status: Option<String>,
    pub popular: Option<bool>,
    pub show_in_home: Option<bool>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateCategoryRequest {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub parent_id: Option<Uuid>,
    pub status: Option<String>,
    pub popular: Option<bool>,
    pub show_in_home: Option<bool>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CategoryList {
    pub items: Vec<Category>,
}

/// Storefront navigation tree: a category with its visible children.
#[derive(Debug, Serialize, ToSchema)]
pub struct CategoryTreeNode {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub children: Vec<CategoryTreeNode>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CategoryTree {
    pub items: Vec<CategoryTreeNode>,
}

/// Flattened, depth-prefixed listing for admin dropdowns.
#[derive(Debug, Serialize, ToSchema)]
pub struct CategoryOptionList {
    pub items: Vec<CategoryOption>,
}
