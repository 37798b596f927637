//! Route table and path rewriting.

use medgate_core::RouteConfig;

/// Ordered list of routes. The first matching prefix wins.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<RouteConfig>,
}

impl RouteTable {
    /// Create a table from configured routes, keeping their order.
    #[must_use]
    pub const fn new(routes: Vec<RouteConfig>) -> Self {
        Self { routes }
    }

    /// Find the route for a request path.
    ///
    /// A prefix matches the path itself and anything below it on a segment
    /// boundary: `/auth` matches `/auth` and `/auth/login`, not `/authz`.
    #[must_use]
    pub fn match_path(&self, path: &str) -> Option<&RouteConfig> {
        self.routes
            .iter()
            .find(|route| prefix_matches(&route.path_prefix, path))
    }

    /// Configured routes, in match order.
    #[must_use]
    pub fn routes(&self) -> &[RouteConfig] {
        &self.routes
    }

    /// Number of routes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Whether the table has no routes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

fn prefix_matches(prefix: &str, path: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        return true;
    }

    path.strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

/// Drop the first `count` segments of `path`.
///
/// `strip_segments("/auth/login", 1)` is `"/login"`; stripping every
/// segment yields `"/"`.
#[must_use]
pub fn strip_segments(path: &str, count: usize) -> String {
    let mut rest = path.trim_start_matches('/');
    for _ in 0..count {
        match rest.find('/') {
            Some(idx) => rest = &rest[idx + 1..],
            None => {
                rest = "";
                break;
            }
        }
    }
    format!("/{rest}")
}

/// Build the upstream URL for a matched route.
#[must_use]
pub(crate) fn upstream_url(route: &RouteConfig, path: &str, query: Option<&str>) -> String {
    let base = route.upstream.trim_end_matches('/');
    let path = strip_segments(path, route.strip_prefix);
    match query {
        Some(q) if !q.is_empty() => format!("{base}{path}?{q}"),
        _ => format!("{base}{path}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn route(id: &str, prefix: &str, strip: usize, jwt: bool) -> RouteConfig {
        RouteConfig {
            id: id.to_string(),
            path_prefix: prefix.to_string(),
            upstream: "http://127.0.0.1:4000/".to_string(),
            strip_prefix: strip,
            jwt_validation: jwt,
        }
    }

    #[test]
    fn test_match_path() {
        let table = RouteTable::new(vec![
            route("auth", "/auth", 1, false),
            route("patients", "/api/patients", 1, true),
        ]);

        assert_eq!(table.match_path("/auth").unwrap().id, "auth");
        assert_eq!(table.match_path("/auth/login").unwrap().id, "auth");
        assert_eq!(table.match_path("/api/patients/7").unwrap().id, "patients");
        assert!(table.match_path("/authz").is_none());
        assert!(table.match_path("/api").is_none());
        assert!(table.match_path("/").is_none());
    }

    #[test]
    fn test_first_match_wins() {
        let table = RouteTable::new(vec![
            route("specific", "/api/patients", 0, true),
            route("catch-all", "/", 0, false),
        ]);

        assert_eq!(table.match_path("/api/patients").unwrap().id, "specific");
        assert_eq!(table.match_path("/other").unwrap().id, "catch-all");
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_strip_segments() {
        assert_eq!(strip_segments("/auth/login", 1), "/login");
        assert_eq!(strip_segments("/auth", 1), "/");
        assert_eq!(strip_segments("/api/patients/7", 1), "/patients/7");
        assert_eq!(strip_segments("/api/patients/7", 0), "/api/patients/7");
        assert_eq!(strip_segments("/a/b", 5), "/");
        assert_eq!(strip_segments("/auth/login/", 1), "/login/");
    }

    #[test]
    fn test_upstream_url() {
        let r = route("patients", "/api/patients", 1, true);
        assert_eq!(
            upstream_url(&r, "/api/patients/7", Some("full=true")),
            "http://127.0.0.1:4000/patients/7?full=true"
        );
        assert_eq!(
            upstream_url(&r, "/api/patients", None),
            "http://127.0.0.1:4000/patients"
        );
    }
}
