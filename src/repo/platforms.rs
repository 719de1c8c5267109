use sea_orm::{
    ActiveModelTrait, DatabaseConnection, EntityTrait, IntoActiveModel, ModelTrait, QueryOrder, Set,
};

use crate::{
    entities::{platform, title},
    error::{AppError, AppResult},
    models::PlatformInput,
};

#[derive(Clone)]
pub struct PlatformRepo {
    db: DatabaseConnection,
}

impl PlatformRepo {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn list(&self) -> AppResult<Vec<(platform::Model, Vec<title::Model>)>> {
        let rows = platform::Entity::find()
            .order_by_asc(platform::Column::Id)
            .find_with_related(title::Entity)
            .all(&self.db)
            .await?;
        Ok(rows)
    }

    pub async fn get(&self, id: i32) -> AppResult<(platform::Model, Vec<title::Model>)> {
        let found = self.find(id).await?;
        let titles = found
            .find_related(title::Entity)
            .order_by_asc(title::Column::Id)
            .all(&self.db)
            .await?;
        Ok((found, titles))
    }

    pub async fn create(&self, input: PlatformInput) -> AppResult<platform::Model> {
        let model = platform::ActiveModel {
            id: Default::default(),
            name: Set(input.name.trim().to_string()),
            about: Set(input.about),
            website: Set(input.website.trim().to_string()),
        }
        .insert(&self.db)
        .await?;
        Ok(model)
    }

    pub async fn update(&self, id: i32, input: PlatformInput) -> AppResult<platform::Model> {
        let mut active = self.find(id).await?.into_active_model();
        active.name = Set(input.name.trim().to_string());
        active.about = Set(input.about);
        active.website = Set(input.website.trim().to_string());
        Ok(active.update(&self.db).await?)
    }

    /// Titles on the platform and their reviews go with it.
    pub async fn delete(&self, id: i32) -> AppResult<()> {
        let found = self.find(id).await?;
        found.delete(&self.db).await?;
        Ok(())
    }

    async fn find(&self, id: i32) -> AppResult<platform::Model> {
        platform::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| AppError::not_found("Platform"))
    }
}
