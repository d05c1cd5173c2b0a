use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Create users table
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(pk_auto(Users::Id))
                    .col(string_len(Users::Username, 150).unique_key())
                    .col(string(Users::PasswordHash))
                    .col(string_len(Users::FirstName, 150).default(""))
                    .col(string_len(Users::LastName, 150).default(""))
                    .col(string(Users::Email).default(""))
                    .col(boolean(Users::IsStaff).default(false))
                    .col(boolean(Users::IsSuperuser).default(false))
                    .col(boolean(Users::IsActive).default(true))
                    .col(date_time(Users::DateJoined))
                    .to_owned(),
            )
            .await?;

        // Create courses table; a teacher cannot be removed while teaching
        manager
            .create_table(
                Table::create()
                    .table(Courses::Table)
                    .if_not_exists()
                    .col(pk_auto(Courses::Id))
                    .col(integer(Courses::TeacherId))
                    .col(string_len(Courses::Name, 100))
                    .col(text(Courses::Description).default("-"))
                    .col(big_integer(Courses::Price).default(10000))
                    .col(string_null(Courses::Image))
                    .col(date_time(Courses::CreatedAt))
                    .col(date_time(Courses::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_course_teacher")
                            .from(Courses::Table, Courses::TeacherId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Restrict)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Create course_members table
        manager
            .create_table(
                Table::create()
                    .table(CourseMembers::Table)
                    .if_not_exists()
                    .col(pk_auto(CourseMembers::Id))
                    .col(integer(CourseMembers::CourseId))
                    .col(integer(CourseMembers::UserId))
                    .col(string_len(CourseMembers::Roles, 3).default("std"))
                    .col(date_time(CourseMembers::CreatedAt))
                    .col(date_time(CourseMembers::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_course_member_course")
                            .from(CourseMembers::Table, CourseMembers::CourseId)
                            .to(Courses::Table, Courses::Id)
                            .on_delete(ForeignKeyAction::Restrict)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_course_member_user")
                            .from(CourseMembers::Table, CourseMembers::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Restrict)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Lookups by (course, user) back every enrollment check
        manager
            .create_index(
                Index::create()
                    .name("idx_course_members_course_user")
                    .table(CourseMembers::Table)
                    .col(CourseMembers::CourseId)
                    .col(CourseMembers::UserId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(CourseMembers::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Courses::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
pub(crate) enum Users {
    Table,
    Id,
    Username,
    PasswordHash,
    FirstName,
    LastName,
    Email,
    IsStaff,
    IsSuperuser,
    IsActive,
    DateJoined,
}

#[derive(DeriveIden)]
pub(crate) enum Courses {
    Table,
    Id,
    TeacherId,
    Name,
    Description,
    Price,
    Image,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
pub(crate) enum CourseMembers {
    Table,
    Id,
    CourseId,
    UserId,
    Roles,
    CreatedAt,
    UpdatedAt,
}
