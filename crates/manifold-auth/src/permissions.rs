//! # Route-permission table
//!
//! Each row maps `(method, path pattern)` to an access rule. Patterns use
//! `:param` segments. Lookup tries an exact path match first, then the
//! matching pattern with the most literal segments. Routes absent from the
//! table default to admin-only.

use manifold_core::GatewayError;

use crate::principal::{AuthRole, Principal};

/// Access rule for one route.
#[derive(Clone, Debug, PartialEq)]
pub struct RouteRule {
    /// Roles allowed through (checked only for authenticated callers).
    pub roles: Vec<AuthRole>,
    /// Anyone may call, authenticated or not.
    pub allow_anonymous: bool,
    /// A verified credential is required.
    pub require_auth: bool,
}

impl RouteRule {
    /// Public route: no credential needed.
    pub fn public() -> Self {
        Self { roles: vec![], allow_anonymous: true, require_auth: false }
    }

    /// Admin-only route.
    pub fn admin() -> Self {
        Self { roles: vec![AuthRole::Admin], allow_anonymous: false, require_auth: true }
    }

    /// Any authenticated caller.
    pub fn authenticated() -> Self {
        Self { roles: vec![], allow_anonymous: false, require_auth: true }
    }
}

struct Row {
    method: &'static str,
    pattern: &'static str,
    rule: RouteRule,
}

/// The gateway's route-permission table.
pub struct RouteTable {
    rows: Vec<Row>,
}

impl Default for RouteTable {
    fn default() -> Self {
        let rows = vec![
            // Public surface.
            row("GET", "/health", RouteRule::public()),
            row("GET", "/v1/models", RouteRule::public()),
            // Chat is anonymous-allowed; admission control rate-limits it.
            row("POST", "/v1/chat/completions", RouteRule::public()),
            // Auth endpoints must be reachable to log in.
            row("POST", "/internal/auth/login", RouteRule::public()),
            row("POST", "/internal/auth/logout", RouteRule::public()),
            row("GET", "/internal/auth/me", RouteRule::authenticated()),
            row("GET", "/internal/auth/status", RouteRule::public()),
            row("POST", "/internal/auth/change-password", RouteRule::admin()),
            // Gateway-key management.
            row("GET", "/internal/gateway-keys", RouteRule::admin()),
            row("POST", "/internal/gateway-keys", RouteRule::admin()),
            row("GET", "/internal/gateway-keys/stats", RouteRule::admin()),
            row("GET", "/internal/gateway-keys/:id", RouteRule::admin()),
            row("PUT", "/internal/gateway-keys/:id", RouteRule::admin()),
            row("PATCH", "/internal/gateway-keys/:id", RouteRule::admin()),
            row("DELETE", "/internal/gateway-keys/:id", RouteRule::admin()),
            row("POST", "/internal/gateway-keys/:id/enable", RouteRule::admin()),
            row("POST", "/internal/gateway-keys/:id/disable", RouteRule::admin()),
            row("POST", "/internal/gateway-keys/:id/regenerate", RouteRule::admin()),
            // Provider key management.
            row("GET", "/internal/providers", RouteRule::admin()),
            row("POST", "/internal/providers", RouteRule::admin()),
            row("POST", "/internal/providers/:provider/key", RouteRule::admin()),
            row("DELETE", "/internal/providers/:provider/key", RouteRule::admin()),
            // Stats.
            row("GET", "/internal/stats", RouteRule::admin()),
        ];
        Self { rows }
    }
}

fn row(method: &'static str, pattern: &'static str, rule: RouteRule) -> Row {
    Row { method, pattern, rule }
}

/// Whether `pattern` matches `path` segment-wise (`:x` matches anything).
fn pattern_matches(pattern: &str, path: &str) -> bool {
    let mut p_segments = pattern.trim_matches('/').split('/');
    let mut segments = path.trim_matches('/').split('/');
    loop {
        match (p_segments.next(), segments.next()) {
            (None, None) => return true,
            (Some(p), Some(s)) if p.starts_with(':') || p == s => {}
            _ => return false,
        }
    }
}

/// Number of literal (non-`:param`) segments, used to rank matches.
fn literal_segments(pattern: &str) -> usize {
    pattern
        .trim_matches('/')
        .split('/')
        .filter(|s| !s.starts_with(':'))
        .count()
}

impl RouteTable {
    /// Look up the rule for a request. Exact path match wins; otherwise the
    /// matching pattern with the most literal segments; otherwise
    /// admin-only.
    pub fn lookup(&self, method: &str, path: &str) -> RouteRule {
        if let Some(exact) = self
            .rows
            .iter()
            .find(|r| r.method == method && !r.pattern.contains(':') && r.pattern == path)
        {
            return exact.rule.clone();
        }

        self.rows
            .iter()
            .filter(|r| r.method == method && pattern_matches(r.pattern, path))
            .max_by_key(|r| literal_segments(r.pattern))
            .map_or_else(RouteRule::admin, |r| r.rule.clone())
    }

    /// Enforce the rule for a principal.
    ///
    /// Unauthenticated caller on an authenticated route → 401;
    /// authenticated caller with the wrong role → 403.
    pub fn check(
        &self,
        principal: &Principal,
        method: &str,
        path: &str,
    ) -> Result<(), GatewayError> {
        let rule = self.lookup(method, path);

        if rule.allow_anonymous {
            return Ok(());
        }

        if rule.require_auth && !principal.authenticated {
            return Err(GatewayError::authentication("authentication required"));
        }

        if !rule.roles.is_empty() && !rule.roles.contains(&principal.role) {
            return Err(GatewayError::permission_denied("insufficient role"));
        }

        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::principal::{AuthMode, Principal};

    fn admin() -> Principal {
        Principal {
            role: AuthRole::Admin,
            mode: AuthMode::None,
            authenticated: true,
            provider_api_key: None,
            target_provider: None,
            gateway_key: None,
            session_id: None,
        }
    }

    fn gateway_caller() -> Principal {
        Principal {
            role: AuthRole::Anonymous,
            mode: AuthMode::Gateway,
            authenticated: true,
            provider_api_key: None,
            target_provider: None,
            gateway_key: None,
            session_id: None,
        }
    }

    // ── Matching ─────────────────────────────────────────────────────────

    #[test]
    fn pattern_matching() {
        assert!(pattern_matches("/internal/gateway-keys/:id", "/internal/gateway-keys/k1"));
        assert!(pattern_matches(
            "/internal/gateway-keys/:id/enable",
            "/internal/gateway-keys/k1/enable"
        ));
        assert!(!pattern_matches("/internal/gateway-keys/:id", "/internal/gateway-keys"));
        assert!(!pattern_matches("/internal/gateway-keys/:id", "/internal/gateway-keys/k1/x"));
    }

    #[test]
    fn exact_beats_pattern() {
        // `/internal/gateway-keys/stats` matches both the exact row and the
        // `/:id` pattern; exact must win (they happen to share a rule, so
        // verify via lookup on a distinguishable path instead).
        let table = RouteTable::default();
        let rule = table.lookup("GET", "/internal/gateway-keys/stats");
        assert_eq!(rule, RouteRule::admin());
    }

    #[test]
    fn longest_pattern_wins() {
        let table = RouteTable::default();
        // `/internal/gateway-keys/k1/enable` matches only the enable row.
        let rule = table.lookup("POST", "/internal/gateway-keys/k1/enable");
        assert_eq!(rule, RouteRule::admin());
    }

    #[test]
    fn unmatched_route_defaults_to_admin() {
        let table = RouteTable::default();
        let rule = table.lookup("GET", "/internal/secret-surface");
        assert_eq!(rule, RouteRule::admin());
        let rule = table.lookup("DELETE", "/v1/models");
        assert_eq!(rule, RouteRule::admin());
    }

    // ── Enforcement ──────────────────────────────────────────────────────

    #[test]
    fn public_routes_allow_anonymous() {
        let table = RouteTable::default();
        let anon = Principal::anonymous();
        assert!(table.check(&anon, "GET", "/health").is_ok());
        assert!(table.check(&anon, "GET", "/v1/models").is_ok());
        assert!(table.check(&anon, "POST", "/v1/chat/completions").is_ok());
        assert!(table.check(&anon, "POST", "/internal/auth/login").is_ok());
    }

    #[test]
    fn admin_route_unauthenticated_is_401() {
        let table = RouteTable::default();
        let err = table
            .check(&Principal::anonymous(), "GET", "/internal/gateway-keys")
            .unwrap_err();
        assert_eq!(err.http_status(), 401);
    }

    #[test]
    fn admin_route_wrong_role_is_403() {
        let table = RouteTable::default();
        let err = table
            .check(&gateway_caller(), "GET", "/internal/gateway-keys")
            .unwrap_err();
        assert_eq!(err.http_status(), 403);
    }

    #[test]
    fn admin_route_admin_ok() {
        let table = RouteTable::default();
        assert!(table.check(&admin(), "GET", "/internal/gateway-keys").is_ok());
        assert!(table.check(&admin(), "POST", "/internal/gateway-keys/k1/disable").is_ok());
        assert!(table.check(&admin(), "POST", "/internal/auth/change-password").is_ok());
    }

    #[test]
    fn me_requires_any_authentication() {
        let table = RouteTable::default();
        assert!(table.check(&Principal::anonymous(), "GET", "/internal/auth/me").is_err());
        assert!(table.check(&gateway_caller(), "GET", "/internal/auth/me").is_ok());
        assert!(table.check(&admin(), "GET", "/internal/auth/me").is_ok());
    }

    #[test]
    fn provider_key_routes_admin_only() {
        let table = RouteTable::default();
        let err = table
            .check(&gateway_caller(), "POST", "/internal/providers/openai/key")
            .unwrap_err();
        assert_eq!(err.http_status(), 403);
        assert!(table.check(&admin(), "POST", "/internal/providers/openai/key").is_ok());
    }
}
