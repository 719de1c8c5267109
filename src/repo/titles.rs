use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    IntoActiveModel, ModelTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
    sea_query::{Expr, Func, LikeExpr, SimpleExpr},
};

use super::{Paged, Paging, fetch_page, now_sec};
use crate::{
    entities::{platform, title},
    error::{AppError, AppResult},
    models::TitleInput,
};

#[derive(Clone)]
pub struct TitleRepo {
    db: DatabaseConnection,
}

impl TitleRepo {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Each whitespace-separated term must equal the title (ignoring case) or
    /// appear in the platform name.
    pub async fn list(
        &self,
        search: Option<&str>,
        paging: Paging,
    ) -> AppResult<Paged<(title::Model, Option<platform::Model>)>> {
        let mut cond = Condition::all();
        for term in search.unwrap_or_default().split_whitespace() {
            let lowered = Func::lower(Expr::col((title::Entity, title::Column::Title)));
            let exact_title = Expr::expr(lowered).eq(term.to_lowercase());
            let in_platform = platform::Column::Name.like(substring(term));
            cond = cond.add(Condition::any().add(exact_title).add(in_platform));
        }

        let select = title::Entity::find()
            .find_also_related(platform::Entity)
            .filter(cond)
            .order_by_asc(title::Column::Id);

        fetch_page(select.paginate(&self.db, paging.size), paging).await
    }

    pub async fn get(&self, id: i32) -> AppResult<(title::Model, Option<platform::Model>)> {
        title::Entity::find_by_id(id)
            .find_also_related(platform::Entity)
            .one(&self.db)
            .await?
            .ok_or_else(|| AppError::not_found("Title"))
    }

    pub async fn create(&self, input: TitleInput) -> AppResult<(title::Model, platform::Model)> {
        let owner = self.platform(input.platform).await?;
        let model = title::ActiveModel {
            id: Default::default(),
            platform_id: Set(owner.id),
            title: Set(input.title.trim().to_string()),
            storyline: Set(input.storyline),
            active: Set(input.active),
            avg_rating: Set(0.0),
            number_rating: Set(0),
            created_at: Set(now_sec()),
        }
        .insert(&self.db)
        .await?;
        Ok((model, owner))
    }

    /// Rating aggregates are left untouched.
    pub async fn update(
        &self,
        id: i32,
        input: TitleInput,
    ) -> AppResult<(title::Model, platform::Model)> {
        let (existing, _) = self.get(id).await?;
        let owner = self.platform(input.platform).await?;

        let mut active = existing.into_active_model();
        active.platform_id = Set(owner.id);
        active.title = Set(input.title.trim().to_string());
        active.storyline = Set(input.storyline);
        active.active = Set(input.active);
        Ok((active.update(&self.db).await?, owner))
    }

    pub async fn delete(&self, id: i32) -> AppResult<()> {
        let (existing, _) = self.get(id).await?;
        existing.delete(&self.db).await?;
        Ok(())
    }

    /// Folds one rating into the title's aggregates in a single statement:
    /// the first rating is taken as-is, later ones are blended as
    /// `(avg + rating) / 2`. Returns false when the title does not exist.
    pub async fn record_rating<C: ConnectionTrait>(
        conn: &C,
        id: i32,
        rating: i32,
    ) -> AppResult<bool> {
        let rating = f64::from(rating);
        let blended: SimpleExpr = Expr::case(Expr::col(title::Column::NumberRating).eq(0), rating)
            .finally(Expr::col(title::Column::AvgRating).add(rating).div(2.0))
            .into();

        let res = title::Entity::update_many()
            .col_expr(title::Column::AvgRating, blended)
            .col_expr(title::Column::NumberRating, Expr::col(title::Column::NumberRating).add(1))
            .filter(title::Column::Id.eq(id))
            .exec(conn)
            .await?;
        Ok(res.rows_affected == 1)
    }

    async fn platform(&self, id: i32) -> AppResult<platform::Model> {
        platform::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| AppError::validation(format!("invalid platform {id}: does not exist")))
    }
}

const ESCAPE: char = '!';

/// `LIKE` pattern matching `term` literally anywhere in the column.
fn substring(term: &str) -> LikeExpr {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | ESCAPE) {
            pattern.push(ESCAPE);
        }
        pattern.push(c);
    }
    pattern.push('%');
    LikeExpr::new(pattern).escape(ESCAPE)
}
