use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(StreamPlatform::Table)
                    .if_not_exists()
                    .col(pk_auto(StreamPlatform::Id))
                    .col(string_len(StreamPlatform::Name, 30))
                    .col(string_len(StreamPlatform::About, 150))
                    .col(string_len(StreamPlatform::Website, 100))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(WatchList::Table)
                    .if_not_exists()
                    .col(pk_auto(WatchList::Id))
                    .col(integer(WatchList::PlatformId))
                    .col(string_len(WatchList::Title, 50))
                    .col(string_len(WatchList::Storyline, 200))
                    .col(boolean(WatchList::Active).default(true))
                    .col(double(WatchList::AvgRating).default(0.0))
                    .col(integer(WatchList::NumberRating).default(0))
                    .col(big_integer(WatchList::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_watch_list_platform")
                            .from(WatchList::Table, WatchList::PlatformId)
                            .to(StreamPlatform::Table, StreamPlatform::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_watch_list_platform")
                    .table(WatchList::Table)
                    .col(WatchList::PlatformId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Review::Table)
                    .if_not_exists()
                    .col(pk_auto(Review::Id))
                    .col(integer(Review::UserId))
                    .col(integer(Review::TitleId))
                    .col(integer(Review::Rating))
                    .col(string_len_null(Review::Description, 200))
                    .col(boolean(Review::Active).default(true))
                    .col(big_integer(Review::CreatedAt))
                    .col(big_integer(Review::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_review_user")
                            .from(Review::Table, Review::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_review_watch_list")
                            .from(Review::Table, Review::TitleId)
                            .to(WatchList::Table, WatchList::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_review_user_title_unique")
                    .table(Review::Table)
                    .col(Review::UserId)
                    .col(Review::TitleId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_review_title")
                    .table(Review::Table)
                    .col(Review::TitleId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(Review::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(WatchList::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(StreamPlatform::Table).to_owned()).await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum StreamPlatform {
    Table,
    Id,
    Name,
    About,
    Website,
}

#[derive(DeriveIden)]
enum WatchList {
    Table,
    Id,
    PlatformId,
    Title,
    Storyline,
    Active,
    AvgRating,
    NumberRating,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Review {
    Table,
    Id,
    UserId,
    TitleId,
    Rating,
    Description,
    Active,
    CreatedAt,
    UpdatedAt,
}
