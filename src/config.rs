use std::{net::SocketAddr, str::FromStr, time::Duration};

use anyhow::{Context, bail};

#[derive(Clone, Debug)]
pub struct Config {
    pub addr: SocketAddr,
    pub database_url: String,
    pub page_size: u64,
    pub max_page_size: u64,
    pub rates: ThrottleRates,
    pub admin: Option<AdminSeed>,
}

#[derive(Clone, Debug)]
pub struct AdminSeed {
    pub username: String,
    pub password: String,
}

/// Allowance for each throttle bucket.
#[derive(Clone, Copy, Debug)]
pub struct ThrottleRates {
    pub anon: Rate,
    pub user: Rate,
    pub review_create: Rate,
    pub review_list: Rate,
    pub review_detail: Rate,
}

impl Default for ThrottleRates {
    fn default() -> Self {
        Self {
            anon: Rate::new(100, Duration::from_secs(86_400)),
            user: Rate::new(1000, Duration::from_secs(86_400)),
            review_create: Rate::new(5, Duration::from_secs(86_400)),
            review_list: Rate::new(100, Duration::from_secs(86_400)),
            review_detail: Rate::new(50, Duration::from_secs(86_400)),
        }
    }
}

/// `count` requests per `period`, written as `10/minute`, `5/d` and so on.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Rate {
    pub count: u32,
    pub period: Duration,
}

impl Rate {
    pub const fn new(count: u32, period: Duration) -> Self {
        Self { count, period }
    }
}

impl FromStr for Rate {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        let (count, period) = s.split_once('/').context("rate must look like <count>/<period>")?;
        let count: u32 = count.trim().parse().context("rate count")?;
        if count == 0 {
            bail!("rate count must be positive");
        }

        let secs = match period.trim().chars().next() {
            Some('s') => 1,
            Some('m') => 60,
            Some('h') => 3_600,
            Some('d') => 86_400,
            _ => bail!("unknown rate period {period:?}"),
        };

        Ok(Self::new(count, Duration::from_secs(secs)))
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port: u16 =
            std::env::var("PORT").unwrap_or_else(|_| "3000".to_string()).parse().context("PORT")?;

        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://watchmate.db?mode=rwc".to_string());

        let page_size: u64 =
            std::env::var("PAGE_SIZE").ok().and_then(|s| s.parse().ok()).unwrap_or(10);

        let max_page_size: u64 =
            std::env::var("MAX_PAGE_SIZE").ok().and_then(|s| s.parse().ok()).unwrap_or(100);

        let defaults = ThrottleRates::default();
        let rates = ThrottleRates {
            anon: rate_var("THROTTLE_ANON", defaults.anon)?,
            user: rate_var("THROTTLE_USER", defaults.user)?,
            review_create: rate_var("THROTTLE_REVIEW_CREATE", defaults.review_create)?,
            review_list: rate_var("THROTTLE_REVIEW_LIST", defaults.review_list)?,
            review_detail: rate_var("THROTTLE_REVIEW_DETAIL", defaults.review_detail)?,
        };

        let admin = match (std::env::var("ADMIN_USERNAME"), std::env::var("ADMIN_PASSWORD")) {
            (Ok(username), Ok(password)) if !username.trim().is_empty() => {
                Some(AdminSeed { username: username.trim().to_string(), password })
            },
            _ => None,
        };

        Ok(Self {
            addr: format!("{host}:{port}").parse().context("HOST/PORT")?,
            database_url,
            page_size: page_size.max(1),
            max_page_size: max_page_size.max(page_size.max(1)),
            rates,
            admin,
        })
    }
}

fn rate_var(name: &str, default: Rate) -> anyhow::Result<Rate> {
    match std::env::var(name) {
        Ok(raw) => raw.parse().with_context(|| format!("{name}={raw}")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rate_periods() {
        assert_eq!("5/day".parse::<Rate>().unwrap(), Rate::new(5, Duration::from_secs(86_400)));
        assert_eq!("10/m".parse::<Rate>().unwrap(), Rate::new(10, Duration::from_secs(60)));
        assert_eq!("1/hour".parse::<Rate>().unwrap(), Rate::new(1, Duration::from_secs(3_600)));
        assert_eq!(" 3 / second".parse::<Rate>().unwrap(), Rate::new(3, Duration::from_secs(1)));
    }

    #[test]
    fn rejects_malformed_rates() {
        assert!("5".parse::<Rate>().is_err());
        assert!("0/day".parse::<Rate>().is_err());
        assert!("x/day".parse::<Rate>().is_err());
        assert!("5/week".parse::<Rate>().is_err());
    }
}
