//! Per-request state the drivers and the facade read from

use std::collections::HashMap;

use crate::auth::driver::Principal;
use crate::auth::token::extract_bearer_token;

/// Headers of the current request plus the principal middleware already resolved
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Header names are stored lowercased
    headers: HashMap<String, String>,
    principal: Option<Principal>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a context from raw header pairs
    pub fn from_headers<I, K, V>(headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let headers = headers
            .into_iter()
            .map(|(k, v)| (k.as_ref().to_ascii_lowercase(), v.into()))
            .collect();

        Self {
            headers,
            principal: None,
        }
    }

    /// Shorthand for a context carrying `Authorization: Bearer <token>`
    pub fn with_bearer(token: &str) -> Self {
        Self::new().with_header("authorization", format!("Bearer {}", token))
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_principal(mut self, principal: Principal) -> Self {
        self.principal = Some(principal);
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Principal attached by upstream middleware, if any
    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    /// Bearer token from the Authorization header, then X-Auth-Token
    pub fn bearer_token(&self) -> Option<String> {
        if let Some(token) = self.header("authorization").and_then(extract_bearer_token) {
            log::debug!("Token extracted from Authorization header");
            return Some(token);
        }

        if let Some(token) = self.header("x-auth-token") {
            let token = token.trim();
            if !token.is_empty() {
                log::debug!("Token extracted from X-Auth-Token header");
                return Some(token.to_string());
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_token_priority() {
        let ctx = RequestContext::from_headers([
            ("Authorization", "Bearer from-auth"),
            ("X-Auth-Token", "from-custom"),
        ]);
        assert_eq!(ctx.bearer_token(), Some("from-auth".to_string()));

        let ctx = RequestContext::new().with_header("X-Auth-Token", "from-custom");
        assert_eq!(ctx.bearer_token(), Some("from-custom".to_string()));

        let ctx = RequestContext::new().with_header("Authorization", "Basic abc");
        assert_eq!(ctx.bearer_token(), None);
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let ctx = RequestContext::new().with_header("User-Agent", "curl/8");
        assert_eq!(ctx.header("user-agent"), Some("curl/8"));
        assert_eq!(ctx.header("USER-AGENT"), Some("curl/8"));
    }
}
