use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250101_000001_create_stores_table::Migration),
            Box::new(m20250101_000002_create_priced_items_table::Migration),
            Box::new(m20250101_000003_create_pricing_configs_table::Migration),
            Box::new(m20250101_000004_create_price_changes_table::Migration),
            Box::new(m20250101_000005_create_pricing_runs_table::Migration),
            Box::new(m20250101_000006_create_sale_records_table::Migration),
        ]
    }
}

// Migration implementations

mod m20250101_000001_create_stores_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000001_create_stores_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // Create stores table aligned with entities::store Model
            manager
                .create_table(
                    Table::create()
                        .table(Stores::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Stores::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Stores::Name).string().not_null())
                        .col(
                            ColumnDef::new(Stores::StorefrontDomain)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Stores::StorefrontAccessToken)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Stores::AutoPricingEnabled)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(ColumnDef::new(Stores::SweepLockedBy).uuid().null())
                        .col(
                            ColumnDef::new(Stores::SweepLockExpiresAt)
                                .timestamp()
                                .null(),
                        )
                        .col(ColumnDef::new(Stores::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(Stores::UpdatedAt).timestamp().null())
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Stores::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Stores {
        Table,
        Id,
        Name,
        StorefrontDomain,
        StorefrontAccessToken,
        AutoPricingEnabled,
        SweepLockedBy,
        SweepLockExpiresAt,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20250101_000002_create_priced_items_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000002_create_priced_items_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // Create priced_items table aligned with entities::priced_item Model
            manager
                .create_table(
                    Table::create()
                        .table(PricedItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PricedItems::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(PricedItems::StoreId).uuid().not_null())
                        .col(ColumnDef::new(PricedItems::GroupId).uuid().null())
                        .col(ColumnDef::new(PricedItems::ExternalId).string().not_null())
                        .col(ColumnDef::new(PricedItems::Name).string().not_null())
                        .col(
                            ColumnDef::new(PricedItems::StartingPrice)
                                .decimal()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PricedItems::CurrentPrice)
                                .decimal()
                                .not_null(),
                        )
                        .col(ColumnDef::new(PricedItems::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(PricedItems::UpdatedAt).timestamp().null())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_priced_items_store_id")
                                .from(PricedItems::Table, PricedItems::StoreId)
                                .to(Stores::Table, Stores::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_priced_items_store_id")
                        .table(PricedItems::Table)
                        .col(PricedItems::StoreId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_priced_items_group_id")
                        .table(PricedItems::Table)
                        .col(PricedItems::GroupId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_priced_items_external_id")
                        .table(PricedItems::Table)
                        .col(PricedItems::ExternalId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(PricedItems::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum PricedItems {
        Table,
        Id,
        StoreId,
        GroupId,
        ExternalId,
        Name,
        StartingPrice,
        CurrentPrice,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum Stores {
        Table,
        Id,
    }
}

mod m20250101_000003_create_pricing_configs_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000003_create_pricing_configs_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // Create pricing_configs table aligned with entities::pricing_config Model
            manager
                .create_table(
                    Table::create()
                        .table(PricingConfigs::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PricingConfigs::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(PricingConfigs::ItemId).uuid().not_null())
                        .col(
                            ColumnDef::new(PricingConfigs::AutoPricingEnabled)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(PricingConfigs::CurrentState)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PricingConfigs::IncrementPercentage)
                                .decimal()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PricingConfigs::PeriodHours)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PricingConfigs::RevenueDropThresholdPercent)
                                .decimal()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PricingConfigs::WaitHoursAfterRevert)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PricingConfigs::MaxIncreasePercentage)
                                .decimal()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PricingConfigs::LastPriceChangeAt)
                                .timestamp()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(PricingConfigs::NextEligibleChangeAt)
                                .timestamp()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(PricingConfigs::RevertWaitUntil)
                                .timestamp()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(PricingConfigs::PreAutomationPrice)
                                .decimal()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(PricingConfigs::LastAutomationPrice)
                                .decimal()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(PricingConfigs::IsFirstIncrease)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(PricingConfigs::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .col(ColumnDef::new(PricingConfigs::UpdatedAt).timestamp().null())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_pricing_configs_item_id")
                                .from(PricingConfigs::Table, PricingConfigs::ItemId)
                                .to(PricedItems::Table, PricedItems::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            // One config row per item
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_pricing_configs_item_id")
                        .table(PricingConfigs::Table)
                        .col(PricingConfigs::ItemId)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_pricing_configs_enabled")
                        .table(PricingConfigs::Table)
                        .col(PricingConfigs::AutoPricingEnabled)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(PricingConfigs::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum PricingConfigs {
        Table,
        Id,
        ItemId,
        AutoPricingEnabled,
        CurrentState,
        IncrementPercentage,
        PeriodHours,
        RevenueDropThresholdPercent,
        WaitHoursAfterRevert,
        MaxIncreasePercentage,
        LastPriceChangeAt,
        NextEligibleChangeAt,
        RevertWaitUntil,
        PreAutomationPrice,
        LastAutomationPrice,
        IsFirstIncrease,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum PricedItems {
        Table,
        Id,
    }
}

mod m20250101_000004_create_price_changes_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000004_create_price_changes_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // Create price_changes table aligned with entities::price_change Model.
            // Rows are append-only; there is no update path.
            manager
                .create_table(
                    Table::create()
                        .table(PriceChanges::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PriceChanges::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(PriceChanges::ItemId).uuid().not_null())
                        .col(ColumnDef::new(PriceChanges::OldPrice).decimal().not_null())
                        .col(ColumnDef::new(PriceChanges::NewPrice).decimal().not_null())
                        .col(ColumnDef::new(PriceChanges::Action).string().not_null())
                        .col(ColumnDef::new(PriceChanges::Reason).string().not_null())
                        .col(
                            ColumnDef::new(PriceChanges::CurrentPeriodRevenue)
                                .decimal()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(PriceChanges::PreviousPeriodRevenue)
                                .decimal()
                                .null(),
                        )
                        .col(ColumnDef::new(PriceChanges::ChangePercent).decimal().null())
                        .col(
                            ColumnDef::new(PriceChanges::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_price_changes_item_id")
                                .from(PriceChanges::Table, PriceChanges::ItemId)
                                .to(PricedItems::Table, PricedItems::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_price_changes_item_id")
                        .table(PriceChanges::Table)
                        .col(PriceChanges::ItemId)
                        .to_owned(),
                )
                .await?;

            // The revert target search reads the latest increase per item
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_price_changes_item_action")
                        .table(PriceChanges::Table)
                        .col(PriceChanges::ItemId)
                        .col(PriceChanges::Action)
                        .col(PriceChanges::CreatedAt)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(PriceChanges::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum PriceChanges {
        Table,
        Id,
        ItemId,
        OldPrice,
        NewPrice,
        Action,
        Reason,
        CurrentPeriodRevenue,
        PreviousPeriodRevenue,
        ChangePercent,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum PricedItems {
        Table,
        Id,
    }
}

mod m20250101_000005_create_pricing_runs_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000005_create_pricing_runs_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // Create pricing_runs table aligned with entities::pricing_run Model
            manager
                .create_table(
                    Table::create()
                        .table(PricingRuns::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PricingRuns::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(PricingRuns::StoreId).uuid().not_null())
                        .col(
                            ColumnDef::new(PricingRuns::ItemsProcessed)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(PricingRuns::ItemsIncreased)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(PricingRuns::ItemsReverted)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(PricingRuns::ItemsWaiting)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(PricingRuns::ItemsSkipped)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(PricingRuns::Errors).json().not_null())
                        .col(ColumnDef::new(PricingRuns::Note).string().null())
                        .col(
                            ColumnDef::new(PricingRuns::StartedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PricingRuns::DurationMs)
                                .big_integer()
                                .not_null()
                                .default(0),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_pricing_runs_store_id")
                                .from(PricingRuns::Table, PricingRuns::StoreId)
                                .to(Stores::Table, Stores::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_pricing_runs_store_id")
                        .table(PricingRuns::Table)
                        .col(PricingRuns::StoreId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_pricing_runs_started_at")
                        .table(PricingRuns::Table)
                        .col(PricingRuns::StartedAt)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(PricingRuns::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum PricingRuns {
        Table,
        Id,
        StoreId,
        ItemsProcessed,
        ItemsIncreased,
        ItemsReverted,
        ItemsWaiting,
        ItemsSkipped,
        Errors,
        Note,
        StartedAt,
        DurationMs,
    }

    #[derive(DeriveIden)]
    enum Stores {
        Table,
        Id,
    }
}

mod m20250101_000006_create_sale_records_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000006_create_sale_records_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // Create sale_records table aligned with entities::sale_record Model
            manager
                .create_table(
                    Table::create()
                        .table(SaleRecords::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(SaleRecords::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(SaleRecords::StoreId).uuid().not_null())
                        .col(ColumnDef::new(SaleRecords::ItemId).uuid().not_null())
                        .col(ColumnDef::new(SaleRecords::Quantity).integer().not_null())
                        .col(ColumnDef::new(SaleRecords::Total).decimal().not_null())
                        .col(
                            ColumnDef::new(SaleRecords::OccurredAt)
                                .timestamp()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_sale_records_item_id")
                                .from(SaleRecords::Table, SaleRecords::ItemId)
                                .to(PricedItems::Table, PricedItems::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_sale_records_item_id")
                        .table(SaleRecords::Table)
                        .col(SaleRecords::ItemId)
                        .to_owned(),
                )
                .await?;

            // Revenue windows scan by item and time
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_sale_records_item_occurred")
                        .table(SaleRecords::Table)
                        .col(SaleRecords::ItemId)
                        .col(SaleRecords::OccurredAt)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(SaleRecords::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum SaleRecords {
        Table,
        Id,
        StoreId,
        ItemId,
        Quantity,
        Total,
        OccurredAt,
    }

    #[derive(DeriveIden)]
    enum PricedItems {
        Table,
        Id,
    }
}
