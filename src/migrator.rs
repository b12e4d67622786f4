use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240115_000001_create_contracts_table::Migration),
            Box::new(m20240115_000002_create_contract_items_table::Migration),
            Box::new(m20240115_000003_create_periods_table::Migration),
            Box::new(m20240115_000004_create_orders_table::Migration),
            Box::new(m20240115_000005_create_injections_table::Migration),
            Box::new(m20240918_000006_add_reporting_indexes::Migration),
        ]
    }
}

// Migration implementations

mod m20240115_000001_create_contracts_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240115_000001_create_contracts_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // Create contracts table aligned with entities::contract Model
            manager
                .create_table(
                    Table::create()
                        .table(Contracts::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Contracts::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Contracts::Code).string().not_null())
                        .col(ColumnDef::new(Contracts::Name).string().not_null())
                        .col(ColumnDef::new(Contracts::TenderReference).string().null())
                        .col(ColumnDef::new(Contracts::LegalReference).string().null())
                        .col(ColumnDef::new(Contracts::Supplier).string().not_null())
                        .col(ColumnDef::new(Contracts::UnitPrice).decimal().null())
                        .col(ColumnDef::new(Contracts::StartDate).date().null())
                        .col(ColumnDef::new(Contracts::Currency).string().null())
                        .col(ColumnDef::new(Contracts::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(Contracts::UpdatedAt).timestamp().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_contracts_supplier")
                        .table(Contracts::Table)
                        .col(Contracts::Supplier)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Contracts::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Contracts {
        Table,
        Id,
        Code,
        Name,
        TenderReference,
        LegalReference,
        Supplier,
        UnitPrice,
        StartDate,
        Currency,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240115_000002_create_contract_items_table {

    use super::m20240115_000001_create_contracts_table::Contracts;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240115_000002_create_contract_items_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(ContractItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ContractItems::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ContractItems::ContractId).uuid().not_null())
                        .col(ColumnDef::new(ContractItems::Code).string().not_null())
                        .col(ColumnDef::new(ContractItems::Name).string().not_null())
                        .col(ColumnDef::new(ContractItems::Currency).string().null())
                        .col(ColumnDef::new(ContractItems::UnitPrice).decimal().null())
                        .col(
                            ColumnDef::new(ContractItems::Position)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(ContractItems::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_contract_items_contract_id")
                                .from(ContractItems::Table, ContractItems::ContractId)
                                .to(Contracts::Table, Contracts::Id)
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
                        .name("idx_contract_items_contract_id")
                        .table(ContractItems::Table)
                        .col(ContractItems::ContractId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ContractItems::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum ContractItems {
        Table,
        Id,
        ContractId,
        Code,
        Name,
        Currency,
        UnitPrice,
        Position,
        CreatedAt,
    }
}

mod m20240115_000003_create_periods_table {

    use super::m20240115_000001_create_contracts_table::Contracts;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240115_000003_create_periods_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Periods::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Periods::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Periods::ContractId).uuid().not_null())
                        .col(ColumnDef::new(Periods::Name).string().not_null())
                        .col(ColumnDef::new(Periods::StartDate).date().not_null())
                        .col(ColumnDef::new(Periods::EndDate).date().not_null())
                        .col(
                            ColumnDef::new(Periods::AllocatedBudget)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Periods::InitialBudget).decimal().null())
                        .col(
                            ColumnDef::new(Periods::Status)
                                .string()
                                .not_null()
                                .default("pending"),
                        )
                        .col(ColumnDef::new(Periods::Currency).string().null())
                        .col(ColumnDef::new(Periods::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(Periods::UpdatedAt).timestamp().null())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_periods_contract_id")
                                .from(Periods::Table, Periods::ContractId)
                                .to(Contracts::Table, Contracts::Id)
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
                        .name("idx_periods_contract_id")
                        .table(Periods::Table)
                        .col(Periods::ContractId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_periods_status")
                        .table(Periods::Table)
                        .col(Periods::Status)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Periods::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Periods {
        Table,
        Id,
        ContractId,
        Name,
        StartDate,
        EndDate,
        AllocatedBudget,
        InitialBudget,
        Status,
        Currency,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240115_000004_create_orders_table {

    use super::m20240115_000002_create_contract_items_table::ContractItems;
    use super::m20240115_000003_create_periods_table::Periods;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240115_000004_create_orders_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Orders::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Orders::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Orders::PeriodId).uuid().not_null())
                        .col(ColumnDef::new(Orders::ItemId).uuid().null())
                        .col(ColumnDef::new(Orders::OrderDate).date().not_null())
                        .col(
                            ColumnDef::new(Orders::Amount)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Orders::Quantity).decimal().null())
                        .col(ColumnDef::new(Orders::SapReference).string().null())
                        .col(ColumnDef::new(Orders::SicopReference).string().null())
                        .col(ColumnDef::new(Orders::Pur).string().null())
                        .col(ColumnDef::new(Orders::ReservationNumber).string().null())
                        .col(ColumnDef::new(Orders::ProductCode).string().null())
                        .col(ColumnDef::new(Orders::ProductName).string().null())
                        .col(ColumnDef::new(Orders::Description).string().null())
                        .col(ColumnDef::new(Orders::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(Orders::UpdatedAt).timestamp().null())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_orders_period_id")
                                .from(Orders::Table, Orders::PeriodId)
                                .to(Periods::Table, Periods::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_orders_item_id")
                                .from(Orders::Table, Orders::ItemId)
                                .to(ContractItems::Table, ContractItems::Id)
                                .on_delete(ForeignKeyAction::SetNull)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_period_id")
                        .table(Orders::Table)
                        .col(Orders::PeriodId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_order_date")
                        .table(Orders::Table)
                        .col(Orders::OrderDate)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Orders::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Orders {
        Table,
        Id,
        PeriodId,
        ItemId,
        OrderDate,
        Amount,
        Quantity,
        SapReference,
        SicopReference,
        Pur,
        ReservationNumber,
        ProductCode,
        ProductName,
        Description,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240115_000005_create_injections_table {

    use super::m20240115_000003_create_periods_table::Periods;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240115_000005_create_injections_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Injections::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Injections::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Injections::PeriodId).uuid().not_null())
                        .col(
                            ColumnDef::new(Injections::Amount)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Injections::InjectionDate).date().not_null())
                        .col(ColumnDef::new(Injections::ReferenceNumber).string().null())
                        .col(ColumnDef::new(Injections::Description).string().null())
                        .col(ColumnDef::new(Injections::DocumentName).string().null())
                        .col(ColumnDef::new(Injections::DocumentData).text().null())
                        .col(ColumnDef::new(Injections::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(Injections::UpdatedAt).timestamp().null())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_injections_period_id")
                                .from(Injections::Table, Injections::PeriodId)
                                .to(Periods::Table, Periods::Id)
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
                        .name("idx_injections_period_id")
                        .table(Injections::Table)
                        .col(Injections::PeriodId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Injections::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Injections {
        Table,
        Id,
        PeriodId,
        Amount,
        InjectionDate,
        ReferenceNumber,
        Description,
        DocumentName,
        DocumentData,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240918_000006_add_reporting_indexes {

    use super::m20240115_000001_create_contracts_table::Contracts;
    use super::m20240115_000003_create_periods_table::Periods;
    use super::m20240115_000004_create_orders_table::Orders;
    use super::m20240115_000005_create_injections_table::Injections;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240918_000006_add_reporting_indexes"
        }
    }

    // Dashboard and statistics scan by contract code, period end date and
    // injection date; these keep those reads off full table scans.
    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_contracts_code")
                        .table(Contracts::Table)
                        .col(Contracts::Code)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_periods_end_date")
                        .table(Periods::Table)
                        .col(Periods::EndDate)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_item_id")
                        .table(Orders::Table)
                        .col(Orders::ItemId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_injections_injection_date")
                        .table(Injections::Table)
                        .col(Injections::InjectionDate)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_index(Index::drop().name("idx_contracts_code").to_owned())
                .await?;
            manager
                .drop_index(Index::drop().name("idx_periods_end_date").to_owned())
                .await?;
            manager
                .drop_index(Index::drop().name("idx_orders_item_id").to_owned())
                .await?;
            manager
                .drop_index(
                    Index::drop()
                        .name("idx_injections_injection_date")
                        .to_owned(),
                )
                .await
        }
    }
}
