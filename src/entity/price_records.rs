use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "price_records")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: Uuid,
    pub product_id: Uuid,
    /// NULL for the single record of a SINGLE product.
    pub variant_id: Option<Uuid>,
    pub price: Decimal,
    pub special_price: Option<Decimal>,
    pub special_price_type: Option<String>,
    pub quantity: i32,
    pub in_stock: bool,
    pub discount_start_date: Option<DateTimeWithTimeZone>,
    pub discount_end_date: Option<DateTimeWithTimeZone>,
    pub discount_type: Option<String>,
    pub discount_amount: Option<Decimal>,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::products::Entity",
        from = "Column::ProductId",
        to = "super::products::Column::Id"
    )]
    Product,
    #[sea_orm(
        belongs_to = "super::product_variants::Entity",
        from = "Column::VariantId",
        to = "super::product_variants::Column::Id"
    )]
    Variant,
}

impl Related<super::products::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
