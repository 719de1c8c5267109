use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    ModelTrait, QueryFilter, Set, TransactionTrait,
};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    entities::{auth_token, user},
    error::{AppError, AppResult},
    models::RegisterRequest,
    repo::now_sec,
};

/// Authenticated user as seen by the access policy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    pub user_id: i32,
    pub username: String,
    pub is_admin: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Caller {
    Anonymous,
    User(Identity),
}

impl Caller {
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            Caller::Anonymous => None,
            Caller::User(identity) => Some(identity),
        }
    }

    pub fn require_identity(&self) -> AppResult<&Identity> {
        self.identity()
            .ok_or(AppError::Unauthenticated("authentication credentials were not provided"))
    }
}

/// Extracts the key from `Token <key>` or `Bearer <key>`.
pub fn token_from_header(value: &str) -> Option<&str> {
    let (scheme, key) = value.trim().split_once(' ')?;
    let key = key.trim();
    let known = scheme.eq_ignore_ascii_case("token") || scheme.eq_ignore_ascii_case("bearer");
    (known && !key.is_empty() && !key.contains(' ')).then_some(key)
}

#[derive(Clone)]
pub struct AuthService {
    db: DatabaseConnection,
}

impl AuthService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn register(&self, req: RegisterRequest) -> AppResult<(user::Model, String)> {
        let username = req.username.trim();
        let email = req.email.trim();

        if username.is_empty() || req.password.is_empty() {
            return Err(AppError::validation("username and password are required"));
        }
        if username.chars().count() > 150 {
            return Err(AppError::validation("username must be at most 150 characters"));
        }
        if req.password != req.password2 {
            return Err(AppError::validation("passwords must match"));
        }

        let txn = self.db.begin().await?;

        let taken = user::Entity::find()
            .filter(user::Column::Username.eq(username))
            .one(&txn)
            .await?;
        if taken.is_some() {
            return Err(AppError::validation("a user with that username already exists"));
        }

        if !email.is_empty() {
            let email_taken =
                user::Entity::find().filter(user::Column::Email.eq(email)).one(&txn).await?;
            if email_taken.is_some() {
                return Err(AppError::validation("email already exists"));
            }
        }

        let (account, token) = create_user(&txn, username, email, &req.password, false).await?;
        txn.commit().await?;

        info!(user_id = account.id, username = %account.username, "user registered");
        Ok((account, token))
    }

    pub async fn login(&self, username: &str, password: &str) -> AppResult<String> {
        let invalid = || AppError::validation("unable to log in with provided credentials");

        let account = user::Entity::find()
            .filter(user::Column::Username.eq(username.trim()))
            .one(&self.db)
            .await?
            .ok_or_else(invalid)?;

        if !verify_password(password, &account.password_hash) {
            debug!(username = %account.username, "login rejected");
            return Err(invalid());
        }

        let existing = account.find_related(auth_token::Entity).one(&self.db).await?;
        let key = match existing {
            Some(token) => token.key,
            None => issue_token(&self.db, account.id).await?,
        };

        info!(user_id = account.id, "token issued");
        Ok(key)
    }

    pub async fn logout(&self, identity: &Identity) -> AppResult<()> {
        auth_token::Entity::delete_many()
            .filter(auth_token::Column::UserId.eq(identity.user_id))
            .exec(&self.db)
            .await?;
        info!(user_id = identity.user_id, "token revoked");
        Ok(())
    }

    pub async fn resolve(&self, key: &str) -> AppResult<Identity> {
        let found = auth_token::Entity::find_by_id(key.to_string())
            .find_also_related(user::Entity)
            .one(&self.db)
            .await?;

        match found {
            Some((_, Some(account))) => Ok(Identity {
                user_id: account.id,
                username: account.username,
                is_admin: account.is_admin,
            }),
            _ => Err(AppError::Unauthenticated("invalid token")),
        }
    }

    /// Creates the configured admin account, or promotes an existing account
    /// of that name. An existing password is left unchanged.
    pub async fn ensure_admin(&self, username: &str, password: &str) -> AppResult<()> {
        let existing = user::Entity::find()
            .filter(user::Column::Username.eq(username))
            .one(&self.db)
            .await?;
        match existing {
            Some(account) if account.is_admin => {
                debug!(username, "admin account already present");
                return Ok(());
            }
            Some(account) => {
                let user_id = account.id;
                let mut active: user::ActiveModel = account.into();
                active.is_admin = Set(true);
                active.update(&self.db).await?;
                warn!(user_id, username, "existing account promoted to admin");
                return Ok(());
            }
            None => {}
        }

        let (account, _) = self.create_user(username, password, true).await?;
        info!(user_id = account.id, username, "admin account created");
        Ok(())
    }

    pub async fn create_user(
        &self,
        username: &str,
        password: &str,
        is_admin: bool,
    ) -> AppResult<(user::Model, String)> {
        let txn = self.db.begin().await?;
        let created = create_user(&txn, username, "", password, is_admin).await?;
        txn.commit().await?;
        Ok(created)
    }
}

async fn create_user<C: ConnectionTrait>(
    conn: &C,
    username: &str,
    email: &str,
    password: &str,
    is_admin: bool,
) -> AppResult<(user::Model, String)> {
    let account = user::ActiveModel {
        id: Default::default(),
        username: Set(username.to_string()),
        email: Set(email.to_string()),
        password_hash: Set(hash_password(password, &Uuid::new_v4().simple().to_string())),
        is_admin: Set(is_admin),
        created_at: Set(now_sec()),
    }
    .insert(conn)
    .await?;

    let key = issue_token(conn, account.id).await?;
    Ok((account, key))
}

async fn issue_token<C: ConnectionTrait>(conn: &C, user_id: i32) -> AppResult<String> {
    let key = Uuid::new_v4().simple().to_string();
    auth_token::ActiveModel {
        key: Set(key.clone()),
        user_id: Set(user_id),
        created_at: Set(now_sec()),
    }
    .insert(conn)
    .await?;
    Ok(key)
}

fn hash_password(password: &str, salt: &str) -> String {
    let digest = Sha256::new().chain_update(salt).chain_update(password).finalize();
    format!("{salt}${}", hex::encode(digest))
}

fn verify_password(password: &str, stored: &str) -> bool {
    match stored.split_once('$') {
        Some((salt, _)) => hash_password(password, salt) == stored,
        None => false,
    }
}
