//! Mapping a call path built from segments onto a registered route pattern.

use axum::http::Method;

#[derive(Clone, Debug, PartialEq)]
pub struct RouteSpec {
    pub pattern: String,
    pub method: Method,
}

impl RouteSpec {
    pub fn new(method: Method, pattern: &str) -> Self {
        RouteSpec {
            pattern: pattern.to_string(),
            method,
        }
    }

    pub fn statics(&self) -> Vec<&str> {
        segments(&self.pattern).filter(|s| !s.starts_with(':')).collect()
    }

    pub fn params(&self) -> Vec<&str> {
        segments(&self.pattern).filter_map(|s| s.strip_prefix(':')).collect()
    }

    /// The pattern with every `:param` segment removed.
    pub fn skeleton(&self) -> String {
        join(&self.statics())
    }
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

fn join(parts: &[&str]) -> String {
    format!("/{}", parts.join("/"))
}

/// Resolve `candidate` against `routes`. Exact pattern first, then equal
/// static skeletons, then routes sharing the first and last static segment.
/// Several survivors are ranked by how many of their params appear in
/// `arg_keys`, then by an exact param count, then by static specificity.
pub fn resolve<'a>(routes: &'a [RouteSpec], candidate: &str, arg_keys: &[&str]) -> Option<&'a RouteSpec> {
    let candidate = join(&segments(candidate).collect::<Vec<_>>());
    if let Some(exact) = routes.iter().find(|r| r.pattern == candidate) {
        return Some(exact);
    }

    let mut pool: Vec<&RouteSpec> = routes.iter().filter(|r| r.skeleton() == candidate).collect();
    if pool.len() == 1 {
        return pool.pop();
    }
    if pool.is_empty() {
        let wanted: Vec<&str> = segments(&candidate).collect();
        let (Some(first), Some(last)) = (wanted.first(), wanted.last()) else {
            return None;
        };
        pool = routes
            .iter()
            .filter(|r| {
                let statics = r.statics();
                statics.first() == Some(first) && statics.last() == Some(last)
            })
            .collect();
    }

    pool.into_iter().max_by_key(|r| {
        let params = r.params();
        let supplied = params.iter().filter(|p| arg_keys.contains(p)).count();
        (supplied, params.len() == supplied, r.statics().len())
    })
}
