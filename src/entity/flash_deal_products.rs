use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "flash_deal_products")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: Uuid,
    pub flash_deal_id: Uuid,
    pub product_id: Uuid,
    pub discount_type: String,
    pub discount_amount: Decimal,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::flash_deals::Entity",
        from = "Column::FlashDealId",
        to = "super::flash_deals::Column::Id"
    )]
    FlashDeal,
    #[sea_orm(
        belongs_to = "super::products::Entity",
        from = "Column::ProductId",
        to = "super::products::Column::Id"
    )]
    Product,
}

impl Related<super::flash_deals::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::FlashDeal.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
