use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Create orders table
        manager
            .create_table(
                Table::create()
                    .table(Orders::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Orders::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Orders::OrderNumber).string().not_null().unique_key())
                    .col(ColumnDef::new(Orders::StyleNumber).string().not_null())
                    .col(ColumnDef::new(Orders::CustomerName).string().null())
                    .col(ColumnDef::new(Orders::OrderStartDate).timestamp_with_time_zone().null())
                    .col(ColumnDef::new(Orders::OrderFinishDate).timestamp_with_time_zone().null())
                    .col(ColumnDef::new(Orders::Note).string().null())
                    .col(ColumnDef::new(Orders::CreatedAt).timestamp_with_time_zone().not_null())
                    .col(ColumnDef::new(Orders::UpdatedAt).timestamp_with_time_zone().not_null())
                    .to_owned(),
            )
            .await?;

        // Create order_items table
        manager
            .create_table(
                Table::create()
                    .table(OrderItems::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(OrderItems::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(OrderItems::OrderId).integer().not_null())
                    .col(ColumnDef::new(OrderItems::Color).string().not_null())
                    .col(ColumnDef::new(OrderItems::Size).string().not_null())
                    .col(ColumnDef::new(OrderItems::Quantity).integer().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_order_items_order_id")
                            .from(OrderItems::Table, OrderItems::OrderId)
                            .to(Orders::Table, Orders::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Create plans table
        manager
            .create_table(
                Table::create()
                    .table(Plans::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Plans::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Plans::PlanName).string().not_null())
                    .col(ColumnDef::new(Plans::OrderId).integer().not_null())
                    .col(ColumnDef::new(Plans::Note).string().null())
                    .col(ColumnDef::new(Plans::PlannedPublishDate).timestamp_with_time_zone().null())
                    .col(ColumnDef::new(Plans::PlannedFinishDate).timestamp_with_time_zone().null())
                    .col(ColumnDef::new(Plans::Status).string().not_null().default("pending"))
                    .col(ColumnDef::new(Plans::PublishedAt).timestamp_with_time_zone().null())
                    .col(ColumnDef::new(Plans::FinishedAt).timestamp_with_time_zone().null())
                    .col(ColumnDef::new(Plans::FrozenAt).timestamp_with_time_zone().null())
                    .col(ColumnDef::new(Plans::CreatedAt).timestamp_with_time_zone().not_null())
                    .col(ColumnDef::new(Plans::UpdatedAt).timestamp_with_time_zone().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_plans_order_id")
                            .from(Plans::Table, Plans::OrderId)
                            .to(Orders::Table, Orders::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Create layouts table
        manager
            .create_table(
                Table::create()
                    .table(Layouts::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Layouts::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Layouts::PlanId).integer().not_null())
                    .col(ColumnDef::new(Layouts::LayoutName).string().not_null())
                    .col(ColumnDef::new(Layouts::Note).string().null())
                    .col(ColumnDef::new(Layouts::CreatedAt).timestamp_with_time_zone().not_null())
                    .col(ColumnDef::new(Layouts::UpdatedAt).timestamp_with_time_zone().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_layouts_plan_id")
                            .from(Layouts::Table, Layouts::PlanId)
                            .to(Plans::Table, Plans::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Create layout_size_ratios table
        manager
            .create_table(
                Table::create()
                    .table(LayoutSizeRatios::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(LayoutSizeRatios::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(LayoutSizeRatios::LayoutId).integer().not_null())
                    .col(ColumnDef::new(LayoutSizeRatios::Size).string().not_null())
                    .col(ColumnDef::new(LayoutSizeRatios::Ratio).integer().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_layout_size_ratios_layout_id")
                            .from(LayoutSizeRatios::Table, LayoutSizeRatios::LayoutId)
                            .to(Layouts::Table, Layouts::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_layout_size_ratios_layout_size")
                    .table(LayoutSizeRatios::Table)
                    .col(LayoutSizeRatios::LayoutId)
                    .col(LayoutSizeRatios::Size)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Create tasks table
        manager
            .create_table(
                Table::create()
                    .table(Tasks::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Tasks::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Tasks::LayoutId).integer().not_null())
                    .col(ColumnDef::new(Tasks::Color).string().not_null())
                    .col(ColumnDef::new(Tasks::PlannedLayers).integer().not_null())
                    .col(ColumnDef::new(Tasks::CompletedLayers).integer().not_null().default(0))
                    .col(ColumnDef::new(Tasks::Status).string().not_null().default("pending"))
                    .col(ColumnDef::new(Tasks::CreatedAt).timestamp_with_time_zone().not_null())
                    .col(ColumnDef::new(Tasks::UpdatedAt).timestamp_with_time_zone().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_tasks_layout_id")
                            .from(Tasks::Table, Tasks::LayoutId)
                            .to(Layouts::Table, Layouts::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Create production_logs table
        manager
            .create_table(
                Table::create()
                    .table(ProductionLogs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ProductionLogs::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ProductionLogs::TaskId).integer().not_null())
                    .col(ColumnDef::new(ProductionLogs::WorkerId).integer().null())
                    .col(ColumnDef::new(ProductionLogs::WorkerName).string().null())
                    .col(ColumnDef::new(ProductionLogs::LayersCompleted).integer().not_null())
                    .col(ColumnDef::new(ProductionLogs::LogTime).timestamp_with_time_zone().not_null())
                    .col(ColumnDef::new(ProductionLogs::Note).string().null())
                    .col(ColumnDef::new(ProductionLogs::Voided).boolean().not_null().default(false))
                    .col(ColumnDef::new(ProductionLogs::VoidReason).string().null())
                    .col(ColumnDef::new(ProductionLogs::VoidedBy).integer().null())
                    .col(ColumnDef::new(ProductionLogs::VoidedAt).timestamp_with_time_zone().null())
                    .col(ColumnDef::new(ProductionLogs::VoidedByName).string().null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_production_logs_task_id")
                            .from(ProductionLogs::Table, ProductionLogs::TaskId)
                            .to(Tasks::Table, Tasks::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_production_logs_worker_id")
                            .from(ProductionLogs::Table, ProductionLogs::WorkerId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_production_logs_voided_by")
                            .from(ProductionLogs::Table, ProductionLogs::VoidedBy)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_production_logs_task_id")
                    .table(ProductionLogs::Table)
                    .col(ProductionLogs::TaskId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_production_logs_voided_by")
                    .table(ProductionLogs::Table)
                    .col(ProductionLogs::VoidedBy)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ProductionLogs::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Tasks::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(LayoutSizeRatios::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Layouts::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Plans::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(OrderItems::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Orders::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum Orders {
    Table,
    Id,
    OrderNumber,
    StyleNumber,
    CustomerName,
    OrderStartDate,
    OrderFinishDate,
    Note,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum OrderItems {
    Table,
    Id,
    OrderId,
    Color,
    Size,
    Quantity,
}

#[derive(DeriveIden)]
enum Plans {
    Table,
    Id,
    PlanName,
    OrderId,
    Note,
    PlannedPublishDate,
    PlannedFinishDate,
    Status,
    PublishedAt,
    FinishedAt,
    FrozenAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Layouts {
    Table,
    Id,
    PlanId,
    LayoutName,
    Note,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum LayoutSizeRatios {
    Table,
    Id,
    LayoutId,
    Size,
    Ratio,
}

#[derive(DeriveIden)]
enum Tasks {
    Table,
    Id,
    LayoutId,
    Color,
    PlannedLayers,
    CompletedLayers,
    Status,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum ProductionLogs {
    Table,
    Id,
    TaskId,
    WorkerId,
    WorkerName,
    LayersCompleted,
    LogTime,
    Note,
    Voided,
    VoidReason,
    VoidedBy,
    VoidedAt,
    VoidedByName,
}

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
}
