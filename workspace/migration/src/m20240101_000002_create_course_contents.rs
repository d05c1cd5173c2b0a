use sea_orm_migration::{prelude::*, schema::*};

use crate::m20240101_000001_create_users_and_courses::{CourseMembers, Courses};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Create course_contents table
        manager
            .create_table(
                Table::create()
                    .table(CourseContents::Table)
                    .if_not_exists()
                    .col(pk_auto(CourseContents::Id))
                    .col(string_len(CourseContents::Name, 200))
                    .col(text(CourseContents::Description).default("-"))
                    .col(string_len_null(CourseContents::VideoUrl, 200))
                    .col(string_null(CourseContents::FileAttachment))
                    .col(integer(CourseContents::CourseId))
                    .col(integer_null(CourseContents::ParentId))
                    .col(date_time(CourseContents::CreatedAt))
                    .col(date_time(CourseContents::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_course_content_course")
                            .from(CourseContents::Table, CourseContents::CourseId)
                            .to(Courses::Table, Courses::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_course_content_parent")
                            .from(CourseContents::Table, CourseContents::ParentId)
                            .to(CourseContents::Table, CourseContents::Id)
                            .on_delete(ForeignKeyAction::Restrict)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Create comments table
        manager
            .create_table(
                Table::create()
                    .table(Comments::Table)
                    .if_not_exists()
                    .col(pk_auto(Comments::Id))
                    .col(integer(Comments::ContentId))
                    .col(integer(Comments::MemberId))
                    .col(text(Comments::Comment))
                    .col(date_time(Comments::CreatedAt))
                    .col(date_time(Comments::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_comment_content")
                            .from(Comments::Table, Comments::ContentId)
                            .to(CourseContents::Table, CourseContents::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_comment_member")
                            .from(Comments::Table, Comments::MemberId)
                            .to(CourseMembers::Table, CourseMembers::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Create completions table
        manager
            .create_table(
                Table::create()
                    .table(Completions::Table)
                    .if_not_exists()
                    .col(pk_auto(Completions::Id))
                    .col(integer(Completions::MemberId))
                    .col(integer(Completions::ContentId))
                    .col(date_time(Completions::LastUpdate))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_completion_member")
                            .from(Completions::Table, Completions::MemberId)
                            .to(CourseMembers::Table, CourseMembers::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_completion_content")
                            .from(Completions::Table, Completions::ContentId)
                            .to(CourseContents::Table, CourseContents::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // One completion per member and content
        manager
            .create_index(
                Index::create()
                    .name("idx_completions_member_content")
                    .table(Completions::Table)
                    .col(Completions::MemberId)
                    .col(Completions::ContentId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Completions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Comments::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(CourseContents::Table).to_owned())
            .await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum CourseContents {
    Table,
    Id,
    Name,
    Description,
    VideoUrl,
    FileAttachment,
    CourseId,
    ParentId,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Comments {
    Table,
    Id,
    ContentId,
    MemberId,
    Comment,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Completions {
    Table,
    Id,
    MemberId,
    ContentId,
    LastUpdate,
}
