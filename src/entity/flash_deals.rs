use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "flash_deals")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: Uuid,
    pub campaign_name: String,
    pub start_date: DateTimeWithTimeZone,
    pub end_date: DateTimeWithTimeZone,
    pub status: String,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::flash_deal_products::Entity")]
    FlashDealProducts,
}

impl Related<super::flash_deal_products::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::FlashDealProducts.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
