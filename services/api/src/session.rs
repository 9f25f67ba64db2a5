//! Session cookie handling

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

/// Session cookie settings
#[derive(Debug, Clone)]
pub struct SessionCookieConfig {
    /// Cookie name (default: `jwt`)
    pub name: String,
    /// Only send the cookie over HTTPS
    pub secure: bool,
}

/// Attaches, reads and clears the session cookie
#[derive(Debug, Clone)]
pub struct SessionCookies {
    config: SessionCookieConfig,
}

impl SessionCookies {
    pub fn new(config: SessionCookieConfig) -> Self {
        Self { config }
    }

    /// Session token carried by the request, if any
    pub fn token(&self, jar: &CookieJar) -> Option<String> {
        jar.get(&self.config.name)
            .map(|cookie| cookie.value().to_string())
            .filter(|token| !token.is_empty())
    }

    /// Set the session cookie for `lifetime_secs`
    pub fn attach(&self, jar: CookieJar, token: String, lifetime_secs: u64) -> CookieJar {
        let max_age = time::Duration::seconds(i64::try_from(lifetime_secs).unwrap_or(i64::MAX));
        let cookie = Cookie::build((self.config.name.clone(), token))
            .http_only(true)
            .secure(self.config.secure)
            .same_site(SameSite::Strict)
            .path("/")
            .max_age(max_age)
            .build();

        jar.add(cookie)
    }

    /// Expire the session cookie, whether or not the request carried one
    pub fn revoke(&self, jar: CookieJar) -> CookieJar {
        let cookie = Cookie::build((self.config.name.clone(), String::new()))
            .http_only(true)
            .secure(self.config.secure)
            .same_site(SameSite::Strict)
            .path("/")
            .max_age(time::Duration::ZERO)
            .build();

        jar.add(cookie)
    }
}
