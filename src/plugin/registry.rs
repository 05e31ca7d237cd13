//! Active plugin list and the route table compiled from it. Every change
//! produces a new immutable [`RouteTable`]; requests hold the snapshot they started with.

use crate::endpoint::{Endpoint, HookSet};
use crate::plugin::{OnRequestFn, OnResponseFn, Plugin};
use axum::http::Method;
use std::collections::HashMap;
use std::sync::Arc;

pub enum RouteMatch {
    Found(Arc<Endpoint>, HashMap<String, String>),
    MethodNotAllowed,
    NotFound,
}

#[derive(Default)]
pub struct RouteTable {
    endpoints: Vec<Arc<Endpoint>>,
    hooks: HookSet,
    on_request: Vec<(String, OnRequestFn)>,
    on_response: Vec<(String, OnResponseFn)>,
}

fn static_segments(path: &str) -> usize {
    path.split('/').filter(|s| !s.is_empty() && !s.starts_with(':')).count()
}

impl RouteTable {
    /// Built-ins first, then each plugin in order. A later endpoint with the same
    /// method and path replaces the earlier one.
    pub fn build(base: &[Endpoint], global: &HookSet, plugins: &[Plugin]) -> Self {
        let mut endpoints: Vec<Arc<Endpoint>> = base.iter().cloned().map(Arc::new).collect();
        for plugin in plugins {
            for endpoint in &plugin.endpoints {
                if let Some(existing) = endpoints
                    .iter_mut()
                    .find(|e| e.method == endpoint.method && e.path == endpoint.path)
                {
                    tracing::warn!(
                        plugin = %plugin.id,
                        method = %endpoint.method,
                        path = %endpoint.path,
                        "plugin endpoint replaces an existing endpoint"
                    );
                    *existing = Arc::new(endpoint.clone());
                } else {
                    endpoints.push(Arc::new(endpoint.clone()));
                }
            }
        }

        let mut hooks = HookSet::default();
        hooks
            .before
            .extend(plugins.iter().flat_map(|p| p.middlewares.iter().map(|m| m.hook.clone())));
        hooks.before.extend(global.before.iter().cloned());
        hooks.before.extend(plugins.iter().flat_map(|p| p.hooks.before.iter().cloned()));
        hooks.after.extend(global.after.iter().cloned());
        hooks.after.extend(plugins.iter().flat_map(|p| p.hooks.after.iter().cloned()));

        RouteTable {
            endpoints,
            hooks,
            on_request: plugins
                .iter()
                .filter_map(|p| p.on_request.clone().map(|f| (p.id.clone(), f)))
                .collect(),
            on_response: plugins
                .iter()
                .filter_map(|p| p.on_response.clone().map(|f| (p.id.clone(), f)))
                .collect(),
        }
    }

    /// Resolve a request. When several patterns match, the most static one wins.
    pub fn find(&self, method: &Method, path: &str) -> RouteMatch {
        let mut path_matched = false;
        let mut best: Option<(usize, &Arc<Endpoint>, HashMap<String, String>)> = None;
        for endpoint in &self.endpoints {
            let Some(params) = endpoint.match_path(path) else { continue };
            path_matched = true;
            if endpoint.method != *method {
                continue;
            }
            let score = static_segments(&endpoint.path);
            if best.as_ref().map(|(s, _, _)| score > *s).unwrap_or(true) {
                best = Some((score, endpoint, params));
            }
        }
        match best {
            Some((_, endpoint, params)) => RouteMatch::Found(endpoint.clone(), params),
            None if path_matched => RouteMatch::MethodNotAllowed,
            None => RouteMatch::NotFound,
        }
    }

    /// Find by exact method and pattern.
    pub fn endpoint(&self, method: &Method, pattern: &str) -> Option<Arc<Endpoint>> {
        self.endpoints
            .iter()
            .find(|e| e.method == *method && e.path == pattern)
            .cloned()
    }

    /// `(method, pattern)` for every registered endpoint.
    pub fn routes(&self) -> Vec<(Method, String)> {
        self.endpoints.iter().map(|e| (e.method.clone(), e.path.clone())).collect()
    }

    pub fn hooks(&self) -> &HookSet {
        &self.hooks
    }

    pub fn on_request(&self) -> &[(String, OnRequestFn)] {
        &self.on_request
    }

    pub fn on_response(&self) -> &[(String, OnResponseFn)] {
        &self.on_response
    }
}

pub struct PluginRegistry {
    base: Vec<Endpoint>,
    global: HookSet,
    plugins: Vec<Plugin>,
    table: Arc<RouteTable>,
}

impl PluginRegistry {
    pub fn new(base: Vec<Endpoint>, global: HookSet, plugins: Vec<Plugin>) -> Self {
        let table = Arc::new(RouteTable::build(&base, &global, &plugins));
        PluginRegistry {
            base,
            global,
            plugins,
            table,
        }
    }

    pub fn snapshot(&self) -> Arc<RouteTable> {
        self.table.clone()
    }

    pub fn plugins(&self) -> &[Plugin] {
        &self.plugins
    }

    pub fn get(&self, id: &str) -> Option<&Plugin> {
        self.plugins.iter().find(|p| p.id == id)
    }

    fn rebuild(&mut self) -> Arc<RouteTable> {
        self.table = Arc::new(RouteTable::build(&self.base, &self.global, &self.plugins));
        self.table.clone()
    }

    /// Register a plugin. A plugin with the same id is replaced in place.
    pub fn add(&mut self, plugin: Plugin) -> Arc<RouteTable> {
        match self.plugins.iter_mut().find(|p| p.id == plugin.id) {
            Some(existing) => {
                tracing::warn!(plugin = %plugin.id, "plugin already registered, replacing it");
                *existing = plugin;
            }
            None => self.plugins.push(plugin),
        }
        self.rebuild()
    }

    /// Unregister by id, returning the removed plugin with the new table.
    pub fn remove(&mut self, id: &str) -> Option<(Plugin, Arc<RouteTable>)> {
        let index = self.plugins.iter().position(|p| p.id == id)?;
        let plugin = self.plugins.remove(index);
        Some((plugin, self.rebuild()))
    }
}
