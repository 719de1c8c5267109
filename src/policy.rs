use tracing::debug;

use crate::{
    auth::Caller,
    error::{AppError, AppResult},
};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Action {
    Read,
    Write,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Resource {
    Platform,
    Title,
    Review { owner_id: i32 },
}

/// Reads are public. Platforms and titles are written by admins only; a
/// review is written by its owner or an admin.
pub fn authorize(caller: &Caller, resource: Resource, action: Action) -> AppResult<()> {
    if action == Action::Read {
        return Ok(());
    }

    let identity = caller.require_identity()?;
    let allowed = match resource {
        Resource::Platform | Resource::Title => identity.is_admin,
        Resource::Review { owner_id } => identity.is_admin || identity.user_id == owner_id,
    };

    if allowed {
        Ok(())
    } else {
        debug!(user_id = identity.user_id, ?resource, "write denied");
        Err(AppError::Forbidden)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Identity;

    fn user(id: i32, is_admin: bool) -> Caller {
        Caller::User(Identity { user_id: id, username: format!("user{id}"), is_admin })
    }

    #[test]
    fn anyone_can_read() {
        for caller in [Caller::Anonymous, user(1, false), user(2, true)] {
            for resource in [Resource::Platform, Resource::Title, Resource::Review { owner_id: 9 }]
            {
                assert!(authorize(&caller, resource, Action::Read).is_ok());
            }
        }
    }

    #[test]
    fn catalog_writes_need_admin() {
        for resource in [Resource::Platform, Resource::Title] {
            assert!(matches!(
                authorize(&user(1, false), resource, Action::Write),
                Err(AppError::Forbidden)
            ));
            assert!(authorize(&user(1, true), resource, Action::Write).is_ok());
        }
    }

    #[test]
    fn review_writes_need_owner_or_admin() {
        let review = Resource::Review { owner_id: 7 };
        assert!(authorize(&user(7, false), review, Action::Write).is_ok());
        assert!(authorize(&user(1, true), review, Action::Write).is_ok());
        assert!(matches!(
            authorize(&user(8, false), review, Action::Write),
            Err(AppError::Forbidden)
        ));
    }

    #[test]
    fn anonymous_writes_are_unauthenticated() {
        for resource in [Resource::Platform, Resource::Title, Resource::Review { owner_id: 1 }] {
            assert!(matches!(
                authorize(&Caller::Anonymous, resource, Action::Write),
                Err(AppError::Unauthenticated(_))
            ));
        }
    }
}
