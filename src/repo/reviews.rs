use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    IntoActiveModel, ModelTrait, PaginatorTrait, QueryFilter, QueryOrder, Set, SqlErr,
};

use super::{Paged, Paging, fetch_page, now_sec};
use crate::{
    entities::{review, title, user},
    error::{AppError, AppResult},
    models::{ReviewFilter, ReviewInput},
};

pub type ReviewWithUser = (review::Model, Option<user::Model>);

#[derive(Clone)]
pub struct ReviewRepo {
    db: DatabaseConnection,
}

impl ReviewRepo {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn list_for_title(
        &self,
        title_id: i32,
        filter: &ReviewFilter,
        paging: Paging,
    ) -> AppResult<Paged<ReviewWithUser>> {
        if title::Entity::find_by_id(title_id).one(&self.db).await?.is_none() {
            return Err(AppError::not_found("Title"));
        }

        let mut select = review::Entity::find()
            .find_also_related(user::Entity)
            .filter(review::Column::TitleId.eq(title_id))
            .order_by_asc(review::Column::Id);
        if let Some(username) = &filter.username {
            select = select.filter(user::Column::Username.eq(username.as_str()));
        }
        if let Some(active) = filter.active {
            select = select.filter(review::Column::Active.eq(active));
        }

        fetch_page(select.paginate(&self.db, paging.size), paging).await
    }

    pub async fn list_by_username(&self, username: &str) -> AppResult<Vec<ReviewWithUser>> {
        let rows = review::Entity::find()
            .find_also_related(user::Entity)
            .filter(user::Column::Username.eq(username))
            .order_by_asc(review::Column::Id)
            .all(&self.db)
            .await?;
        Ok(rows)
    }

    pub async fn get(&self, id: i32) -> AppResult<ReviewWithUser> {
        review::Entity::find_by_id(id)
            .find_also_related(user::Entity)
            .one(&self.db)
            .await?
            .ok_or_else(|| AppError::not_found("Review"))
    }

    /// Only rating, description and the active flag change; the reviewer and
    /// the title are fixed, and the title's aggregates are not recomputed.
    pub async fn update(
        &self,
        existing: review::Model,
        input: ReviewInput,
    ) -> AppResult<review::Model> {
        let mut active = existing.into_active_model();
        active.rating = Set(input.rating);
        active.description = Set(input.description);
        active.active = Set(input.active);
        active.updated_at = Set(now_sec());
        Ok(active.update(&self.db).await?)
    }

    pub async fn delete(&self, existing: review::Model) -> AppResult<()> {
        existing.delete(&self.db).await?;
        Ok(())
    }

    pub async fn exists_by_user_and_title<C: ConnectionTrait>(
        conn: &C,
        user_id: i32,
        title_id: i32,
    ) -> AppResult<bool> {
        let count = review::Entity::find()
            .filter(review::Column::UserId.eq(user_id))
            .filter(review::Column::TitleId.eq(title_id))
            .count(conn)
            .await?;
        Ok(count > 0)
    }

    pub async fn insert<C: ConnectionTrait>(
        conn: &C,
        user_id: i32,
        title_id: i32,
        input: ReviewInput,
    ) -> AppResult<review::Model> {
        let now = now_sec();
        let inserted = review::ActiveModel {
            id: Default::default(),
            user_id: Set(user_id),
            title_id: Set(title_id),
            rating: Set(input.rating),
            description: Set(input.description),
            active: Set(input.active),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(conn)
        .await;

        inserted.map_err(|err| match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => AppError::DuplicateReview,
            _ => AppError::from(err),
        })
    }
}
