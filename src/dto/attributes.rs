use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateAttributeRequest {
    pub name: String,
    pub slug: String,
    pub values: Vec<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AttributeValueDto {
    pub id: Uuid,
    pub value: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AttributeWithValues {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub values: Vec<AttributeValueDto>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AttributeList {
    pub items: Vec<AttributeWithValues>,
}
