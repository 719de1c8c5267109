use sea_orm::{DatabaseConnection, TransactionTrait};
use tracing::{info, warn};

use crate::{
    auth::Identity,
    entities::review,
    error::{AppError, AppResult},
    models::ReviewInput,
    repo::{ReviewRepo, TitleRepo},
};

/// Creates reviews and keeps each title's running rating in step with them.
#[derive(Clone)]
pub struct RatingAggregator {
    db: DatabaseConnection,
}

impl RatingAggregator {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Inserts the review and folds its rating into the title in one
    /// transaction. A second review by the same user for the same title is
    /// rejected and leaves the title untouched.
    pub async fn create_review(
        &self,
        title_id: i32,
        reviewer: &Identity,
        input: ReviewInput,
    ) -> AppResult<review::Model> {
        input.validate()?;
        let rating = input.rating;

        let txn = self.db.begin().await?;

        // Write first so the transaction holds the write lock before it reads.
        if !TitleRepo::record_rating(&txn, title_id, rating).await? {
            return Err(AppError::not_found("Title"));
        }

        if ReviewRepo::exists_by_user_and_title(&txn, reviewer.user_id, title_id).await? {
            warn!(user_id = reviewer.user_id, title_id, "duplicate review rejected");
            return Err(AppError::DuplicateReview);
        }

        let created = ReviewRepo::insert(&txn, reviewer.user_id, title_id, input).await?;
        txn.commit().await?;

        info!(
            review_id = created.id,
            title_id,
            user_id = reviewer.user_id,
            rating,
            "review created"
        );
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use futures::future::join_all;
    use sea_orm::EntityTrait;

    use super::*;
    use crate::{
        auth::AuthService,
        db,
        entities::{review, title, user},
        models::{PlatformInput, TitleInput},
        repo::PlatformRepo,
    };

    struct Fixture {
        db: DatabaseConnection,
        aggregator: RatingAggregator,
        auth: AuthService,
        title_id: i32,
    }

    async fn fixture() -> Fixture {
        let db = db::connect_and_migrate("sqlite::memory:").await.unwrap();
        let platform = PlatformRepo::new(db.clone())
            .create(PlatformInput {
                name: "Netflix".into(),
                about: "Streaming".into(),
                website: "https://netflix.com".into(),
            })
            .await
            .unwrap();
        let (title, _) = TitleRepo::new(db.clone())
            .create(TitleInput {
                platform: platform.id,
                title: "Dark".into(),
                storyline: "Time travel".into(),
                active: true,
            })
            .await
            .unwrap();

        Fixture {
            aggregator: RatingAggregator::new(db.clone()),
            auth: AuthService::new(db.clone()),
            db,
            title_id: title.id,
        }
    }

    async fn reviewer(auth: &AuthService, name: &str) -> Identity {
        let (account, _) = auth.create_user(name, "Secret@123", false).await.unwrap();
        Identity { user_id: account.id, username: account.username, is_admin: false }
    }

    fn input(rating: i32) -> ReviewInput {
        ReviewInput { rating, description: Some("ok".into()), active: true }
    }

    async fn aggregates(f: &Fixture) -> (f64, i32) {
        let t = title::Entity::find_by_id(f.title_id).one(&f.db).await.unwrap().unwrap();
        (t.avg_rating, t.number_rating)
    }

    #[tokio::test]
    async fn first_rating_is_taken_then_blended() {
        let f = fixture().await;
        let a = reviewer(&f.auth, "alice").await;
        let b = reviewer(&f.auth, "bob").await;
        let c = reviewer(&f.auth, "carol").await;

        f.aggregator.create_review(f.title_id, &a, input(5)).await.unwrap();
        assert_eq!(aggregates(&f).await, (5.0, 1));

        f.aggregator.create_review(f.title_id, &b, input(3)).await.unwrap();
        assert_eq!(aggregates(&f).await, (4.0, 2));

        // (4 + 1) / 2, not the arithmetic mean of 5, 3 and 1
        f.aggregator.create_review(f.title_id, &c, input(1)).await.unwrap();
        assert_eq!(aggregates(&f).await, (2.5, 3));
    }

    #[tokio::test]
    async fn duplicate_review_is_rejected_without_touching_aggregates() {
        let f = fixture().await;
        let a = reviewer(&f.auth, "alice").await;

        f.aggregator.create_review(f.title_id, &a, input(4)).await.unwrap();
        let err = f.aggregator.create_review(f.title_id, &a, input(2)).await.unwrap_err();
        assert!(matches!(err, AppError::DuplicateReview));
        assert_eq!(aggregates(&f).await, (4.0, 1));
    }

    #[tokio::test]
    async fn invalid_rating_and_missing_title_fail_cleanly() {
        let f = fixture().await;
        let a = reviewer(&f.auth, "alice").await;

        let err = f.aggregator.create_review(f.title_id, &a, input(6)).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = f.aggregator.create_review(9_999, &a, input(3)).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        assert_eq!(aggregates(&f).await, (0.0, 0));
    }

    #[tokio::test]
    async fn concurrent_reviews_are_all_counted() {
        let f = fixture().await;
        let mut reviewers = Vec::new();
        for name in ["u1", "u2", "u3", "u4"] {
            reviewers.push(reviewer(&f.auth, name).await);
        }

        let results = join_all(
            reviewers.iter().map(|r| f.aggregator.create_review(f.title_id, r, input(4))),
        )
        .await;

        assert!(results.iter().all(Result::is_ok));
        assert_eq!(aggregates(&f).await, (4.0, 4));
    }

    #[tokio::test]
    async fn deleting_a_reviewer_removes_their_reviews() {
        let f = fixture().await;
        let a = reviewer(&f.auth, "alice").await;
        let b = reviewer(&f.auth, "bob").await;
        let gone = f.aggregator.create_review(f.title_id, &a, input(5)).await.unwrap();
        let kept = f.aggregator.create_review(f.title_id, &b, input(3)).await.unwrap();

        user::Entity::delete_by_id(a.user_id).exec(&f.db).await.unwrap();

        assert!(review::Entity::find_by_id(gone.id).one(&f.db).await.unwrap().is_none());
        assert!(review::Entity::find_by_id(kept.id).one(&f.db).await.unwrap().is_some());
    }
}
