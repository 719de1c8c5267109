use std::{
    num::NonZeroU32,
    sync::atomic::{AtomicU64, Ordering},
};

use governor::{
    Quota, RateLimiter,
    clock::{Clock, DefaultClock},
    middleware::NoOpMiddleware,
    state::keyed::DefaultKeyedStateStore,
};
use tracing::{debug, info};

use crate::{
    auth::Caller,
    config::{Rate, ThrottleRates},
    error::{AppError, AppResult},
};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Bucket {
    Anon,
    User,
    ReviewCreate,
    ReviewList,
    ReviewDetail,
}

impl Bucket {
    const ALL: [Bucket; 5] = [
        Bucket::Anon,
        Bucket::User,
        Bucket::ReviewCreate,
        Bucket::ReviewList,
        Bucket::ReviewDetail,
    ];
}

/// Throttle scope of an endpoint.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Endpoint {
    Catalog,
    ReviewList,
    ReviewCreate,
    ReviewDetail,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CallerClass {
    Anonymous,
    Authenticated,
}

impl From<&Caller> for CallerClass {
    fn from(caller: &Caller) -> Self {
        match caller {
            Caller::Anonymous => CallerClass::Anonymous,
            Caller::User(_) => CallerClass::Authenticated,
        }
    }
}

/// Buckets consulted for a request. Every listed bucket must admit it.
pub fn buckets(endpoint: Endpoint, class: CallerClass) -> &'static [Bucket] {
    use Bucket::*;

    match (endpoint, class) {
        (Endpoint::Catalog, CallerClass::Anonymous) => &[Anon, User],
        (Endpoint::Catalog, CallerClass::Authenticated) => &[User],
        (Endpoint::ReviewList, CallerClass::Anonymous) => &[Anon, ReviewList],
        (Endpoint::ReviewList, CallerClass::Authenticated) => &[ReviewList],
        (Endpoint::ReviewCreate, _) => &[ReviewCreate],
        (Endpoint::ReviewDetail, _) => &[ReviewDetail],
    }
}

/// Checks between sweeps of idle keys out of the limiter stores.
const PRUNE_EVERY: u64 = 1024;

type KeyedLimiter<C> =
    RateLimiter<String, DefaultKeyedStateStore<String>, C, NoOpMiddleware<<C as Clock>::Instant>>;

pub struct Throttle<C: Clock + Clone = DefaultClock> {
    clock: C,
    checks: AtomicU64,
    anon: KeyedLimiter<C>,
    user: KeyedLimiter<C>,
    review_create: KeyedLimiter<C>,
    review_list: KeyedLimiter<C>,
    review_detail: KeyedLimiter<C>,
}

impl Throttle {
    pub fn new(rates: &ThrottleRates) -> Self {
        Self::with_clock(rates, DefaultClock::default())
    }
}

impl<C: Clock + Clone> Throttle<C> {
    pub fn with_clock(rates: &ThrottleRates, clock: C) -> Self {
        let limiter = |rate: Rate| {
            RateLimiter::new(quota(rate), DefaultKeyedStateStore::default(), clock.clone())
        };

        Self {
            anon: limiter(rates.anon),
            user: limiter(rates.user),
            review_create: limiter(rates.review_create),
            review_list: limiter(rates.review_list),
            review_detail: limiter(rates.review_detail),
            clock,
            checks: AtomicU64::new(0),
        }
    }

    /// `client` identifies anonymous callers; authenticated callers are keyed
    /// by user id.
    pub fn check(&self, endpoint: Endpoint, caller: &Caller, client: &str) -> AppResult<()> {
        if self.checks.fetch_add(1, Ordering::Relaxed) % PRUNE_EVERY == PRUNE_EVERY - 1 {
            self.prune();
        }

        let key = match caller {
            Caller::User(identity) => format!("user:{}", identity.user_id),
            Caller::Anonymous => format!("ip:{client}"),
        };

        for &bucket in buckets(endpoint, caller.into()) {
            if let Err(not_until) = self.limiter(bucket).check_key(&key) {
                let retry_after = not_until.wait_time_from(self.clock.now());
                info!(?bucket, ?endpoint, key = %key, ?retry_after, "request throttled");
                return Err(AppError::RateLimited { retry_after });
            }
        }
        Ok(())
    }

    /// Drops keys whose allowance has fully replenished.
    pub fn prune(&self) {
        for bucket in Bucket::ALL {
            let limiter = self.limiter(bucket);
            limiter.retain_recent();
            limiter.shrink_to_fit();
        }
        debug!(tracked = self.tracked_keys(), "throttle state pruned");
    }

    pub fn tracked_keys(&self) -> usize {
        Bucket::ALL.into_iter().map(|bucket| self.limiter(bucket).len()).sum()
    }

    fn limiter(&self, bucket: Bucket) -> &KeyedLimiter<C> {
        match bucket {
            Bucket::Anon => &self.anon,
            Bucket::User => &self.user,
            Bucket::ReviewCreate => &self.review_create,
            Bucket::ReviewList => &self.review_list,
            Bucket::ReviewDetail => &self.review_detail,
        }
    }
}

/// Burst of `count`, one cell back every `period / count`.
fn quota(rate: Rate) -> Quota {
    let burst = NonZeroU32::new(rate.count).unwrap_or(NonZeroU32::MIN);
    Quota::with_period(rate.period / burst.get())
        .map(|q| q.allow_burst(burst))
        .unwrap_or_else(|| Quota::per_second(burst))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use governor::clock::FakeRelativeClock;

    use super::*;
    use crate::auth::Identity;

    fn rates(review_create: u32) -> ThrottleRates {
        let minute = Duration::from_secs(60);
        ThrottleRates {
            anon: Rate::new(3, minute),
            user: Rate::new(5, minute),
            review_create: Rate::new(review_create, minute),
            review_list: Rate::new(2, minute),
            review_detail: Rate::new(2, minute),
        }
    }

    fn user(id: i32) -> Caller {
        Caller::User(Identity { user_id: id, username: format!("u{id}"), is_admin: false })
    }

    #[test]
    fn anonymous_catalog_traffic_hits_both_buckets() {
        assert_eq!(
            buckets(Endpoint::Catalog, CallerClass::Anonymous),
            &[Bucket::Anon, Bucket::User]
        );
        assert_eq!(buckets(Endpoint::Catalog, CallerClass::Authenticated), &[Bucket::User]);
        assert_eq!(
            buckets(Endpoint::ReviewList, CallerClass::Anonymous),
            &[Bucket::Anon, Bucket::ReviewList]
        );
        assert_eq!(
            buckets(Endpoint::ReviewCreate, CallerClass::Authenticated),
            &[Bucket::ReviewCreate]
        );
        assert_eq!(
            buckets(Endpoint::ReviewDetail, CallerClass::Anonymous),
            &[Bucket::ReviewDetail]
        );
    }

    #[test]
    fn stricter_anonymous_bucket_governs() {
        let throttle = Throttle::with_clock(&rates(1), FakeRelativeClock::default());
        for _ in 0..3 {
            throttle.check(Endpoint::Catalog, &Caller::Anonymous, "10.0.0.1").unwrap();
        }
        assert!(matches!(
            throttle.check(Endpoint::Catalog, &Caller::Anonymous, "10.0.0.1"),
            Err(AppError::RateLimited { .. })
        ));
        // another address has its own allowance
        throttle.check(Endpoint::Catalog, &Caller::Anonymous, "10.0.0.2").unwrap();
    }

    #[test]
    fn review_creation_recovers_after_window() {
        let clock = FakeRelativeClock::default();
        let throttle = Throttle::with_clock(&rates(2), clock.clone());
        let caller = user(1);

        throttle.check(Endpoint::ReviewCreate, &caller, "x").unwrap();
        throttle.check(Endpoint::ReviewCreate, &caller, "x").unwrap();

        let Err(AppError::RateLimited { retry_after }) =
            throttle.check(Endpoint::ReviewCreate, &caller, "x")
        else {
            panic!("third review creation should be throttled");
        };
        assert!(retry_after > Duration::ZERO);
        assert!(retry_after <= Duration::from_secs(60));

        clock.advance(Duration::from_secs(60));
        throttle.check(Endpoint::ReviewCreate, &caller, "x").unwrap();
        throttle.check(Endpoint::ReviewCreate, &caller, "x").unwrap();
    }

    #[test]
    fn scopes_do_not_starve_each_other() {
        let throttle = Throttle::with_clock(&rates(1), FakeRelativeClock::default());
        let caller = user(4);

        throttle.check(Endpoint::ReviewCreate, &caller, "x").unwrap();
        assert!(throttle.check(Endpoint::ReviewCreate, &caller, "x").is_err());

        throttle.check(Endpoint::ReviewList, &caller, "x").unwrap();
        throttle.check(Endpoint::ReviewDetail, &caller, "x").unwrap();
        throttle.check(Endpoint::Catalog, &caller, "x").unwrap();

        // other users keep their own review-create allowance
        throttle.check(Endpoint::ReviewCreate, &user(5), "x").unwrap();
    }

    #[test]
    fn idle_keys_are_pruned_after_their_window() {
        let clock = FakeRelativeClock::default();
        let throttle = Throttle::with_clock(&rates(2), clock.clone());

        for n in 0..20 {
            let client = format!("10.0.1.{n}");
            throttle.check(Endpoint::Catalog, &Caller::Anonymous, &client).unwrap();
        }
        throttle.check(Endpoint::ReviewCreate, &user(9), "x").unwrap();
        assert_eq!(throttle.tracked_keys(), 41);

        // still inside the window: nothing is evicted
        throttle.prune();
        assert_eq!(throttle.tracked_keys(), 41);

        clock.advance(Duration::from_secs(120));
        throttle.prune();
        assert_eq!(throttle.tracked_keys(), 0);
    }

    #[test]
    fn rotating_clients_do_not_accumulate() {
        let clock = FakeRelativeClock::default();
        let throttle = Throttle::with_clock(&rates(2), clock.clone());

        for n in 0..PRUNE_EVERY - 1 {
            let client = format!("rotating-{n}");
            throttle.check(Endpoint::ReviewDetail, &Caller::Anonymous, &client).unwrap();
        }
        assert_eq!(throttle.tracked_keys(), (PRUNE_EVERY - 1) as usize);

        // the next check sweeps before recording its own key
        clock.advance(Duration::from_secs(120));
        throttle.check(Endpoint::ReviewDetail, &Caller::Anonymous, "fresh").unwrap();
        assert_eq!(throttle.tracked_keys(), 1);
    }
}
