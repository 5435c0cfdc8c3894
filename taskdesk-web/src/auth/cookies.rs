//! Session cookie

use crate::config::Environment;
use axum_extra::extract::cookie::{Cookie, SameSite};
use std::time::Duration;

pub const SESSION_COOKIE: &str = "token";

/// Attributes shared by the session cookie and its removal
#[derive(Debug, Clone, Copy)]
pub struct CookiePolicy {
    pub secure: bool,
    pub same_site: SameSite,
    pub max_age: Duration,
}

impl CookiePolicy {
    /// Cross-site and HTTPS-only in production, lax elsewhere
    pub fn for_environment(environment: Environment, max_age: Duration) -> Self {
        let production = environment.is_production();
        Self {
            secure: production,
            same_site: if production {
                SameSite::None
            } else {
                SameSite::Lax
            },
            max_age,
        }
    }

    pub fn session(&self, token: String) -> Cookie<'static> {
        Cookie::build((SESSION_COOKIE, token))
            .http_only(true)
            .secure(self.secure)
            .same_site(self.same_site)
            .path("/")
            .max_age(time::Duration::seconds(self.max_age.as_secs() as i64))
            .build()
    }

    /// A cookie that makes the browser drop the session
    pub fn removal(&self) -> Cookie<'static> {
        Cookie::build((SESSION_COOKIE, ""))
            .http_only(true)
            .secure(self.secure)
            .same_site(self.same_site)
            .path("/")
            .max_age(time::Duration::ZERO)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_development_cookie() {
        let policy =
            CookiePolicy::for_environment(Environment::Development, Duration::from_secs(86400));
        let cookie = policy.session("abc".to_string());

        assert_eq!(cookie.name(), "token");
        assert_eq!(cookie.value(), "abc");
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(false));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.max_age(), Some(time::Duration::seconds(86400)));
    }

    #[test]
    fn test_production_cookie_is_cross_site() {
        let policy =
            CookiePolicy::for_environment(Environment::Production, Duration::from_secs(60));
        let cookie = policy.session("abc".to_string());
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::None));

        let removal = policy.removal();
        assert_eq!(removal.value(), "");
        assert_eq!(removal.max_age(), Some(time::Duration::ZERO));
    }
}
