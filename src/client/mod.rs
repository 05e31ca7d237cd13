//! Client that mirrors the server's routes: `client.path("user").seg("create").call(args)`
//! resolves to `POST /user/create` from the route map alone.

pub mod atom;
pub mod proxy;
pub mod resolve;
pub mod transport;

pub use atom::{Atom, AtomListener};
pub use proxy::{prepare, split_args, CallArgs, PreparedRequest};
pub use resolve::{resolve, RouteSpec};
pub use transport::{HttpTransport, RouterTransport, Transport, TransportResponse};

use crate::case::to_kebab_case;
use crate::error::ClientError;
use crate::marketing::Marketing;
use axum::http::Method;
use serde_json::Value;
use std::sync::Arc;

#[derive(Clone)]
pub struct Client {
    routes: Vec<RouteSpec>,
    transport: Arc<dyn Transport>,
    atoms: Vec<AtomListener>,
}

impl Client {
    pub fn new(transport: impl Transport + 'static) -> Self {
        Client {
            routes: Vec::new(),
            transport: Arc::new(transport),
            atoms: Vec::new(),
        }
    }

    /// In-process client for a running instance, with its current routes.
    pub fn for_instance(marketing: &Arc<Marketing>) -> Self {
        let transport = RouterTransport::new(marketing.router(), &marketing.context().base_path);
        Client::new(transport).routes(marketing.routes())
    }

    /// Register known `(method, pattern)` pairs.
    pub fn routes(mut self, routes: impl IntoIterator<Item = (Method, String)>) -> Self {
        self.routes
            .extend(routes.into_iter().map(|(method, pattern)| RouteSpec::new(method, &pattern)));
        self
    }

    pub fn atom_listener(mut self, listener: AtomListener) -> Self {
        self.atoms.push(listener);
        self
    }

    pub fn known_routes(&self) -> &[RouteSpec] {
        &self.routes
    }

    /// Start a call path. Segments given in camelCase are sent as kebab-case.
    pub fn path(&self, segment: &str) -> PathProxy<'_> {
        PathProxy {
            client: self,
            segments: vec![to_kebab_case(segment)],
        }
    }

    /// A caller for one registered pattern, if the client knows it.
    pub fn route(&self, pattern: &str) -> Option<RouteCall<'_>> {
        let spec = self.routes.iter().find(|r| r.pattern == pattern)?;
        Some(RouteCall { client: self, spec })
    }

    /// Resolve `path` against the route map and send it.
    pub async fn call(&self, path: &str, args: Value) -> Result<Value, ClientError> {
        let keys = arg_keys(&args);
        let keys: Vec<&str> = keys.iter().map(String::as_str).collect();
        let route = resolve(&self.routes, path, &keys);
        self.send(route, path, args).await
    }

    async fn send(&self, route: Option<&RouteSpec>, candidate: &str, args: Value) -> Result<Value, ClientError> {
        let request = prepare(route, candidate, args)?;
        let target = request.path.split('?').next().unwrap_or_default().to_string();
        tracing::debug!(method = %request.method, path = %request.path, "client call");
        let res = self.transport.send(request).await?;
        if !res.status.is_success() {
            return Err(ClientError::Status {
                status: res.status,
                body: res.body,
            });
        }
        for listener in self.atoms.iter().filter(|l| l.matches(&target)) {
            listener.notify();
        }
        Ok(res.body)
    }
}

/// Top-level argument keys plus the keys of an explicit `params` object.
fn arg_keys(args: &Value) -> Vec<String> {
    let Some(obj) = args.as_object() else {
        return Vec::new();
    };
    let mut keys: Vec<String> = obj.keys().cloned().collect();
    if let Some(Value::Object(params)) = obj.get("params") {
        keys.extend(params.keys().cloned());
    }
    keys
}

pub struct PathProxy<'a> {
    client: &'a Client,
    segments: Vec<String>,
}

impl<'a> PathProxy<'a> {
    pub fn seg(mut self, segment: &str) -> Self {
        self.segments.push(to_kebab_case(segment));
        self
    }

    pub fn candidate(&self) -> String {
        format!("/{}", self.segments.join("/"))
    }

    pub async fn call(self, args: Value) -> Result<Value, ClientError> {
        self.client.call(&self.candidate(), args).await
    }
}

pub struct RouteCall<'a> {
    client: &'a Client,
    spec: &'a RouteSpec,
}

impl<'a> RouteCall<'a> {
    pub fn method(&self) -> &Method {
        &self.spec.method
    }

    pub async fn call(&self, args: Value) -> Result<Value, ClientError> {
        self.client.send(Some(self.spec), &self.spec.pattern, args).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::transport::TransportResponse;
    use async_trait::async_trait;
    use axum::http::{HeaderMap, StatusCode};
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default, Clone)]
    struct Recorder {
        seen: Arc<Mutex<Vec<(Method, String, Option<Value>)>>>,
    }

    #[async_trait]
    impl Transport for Recorder {
        async fn send(&self, request: PreparedRequest) -> Result<TransportResponse, ClientError> {
            self.seen
                .lock()
                .unwrap()
                .push((request.method, request.path, request.body));
            Ok(TransportResponse {
                status: StatusCode::OK,
                headers: HeaderMap::new(),
                body: json!({"ok": true}),
            })
        }
    }

    #[tokio::test]
    async fn camel_case_segments_become_kebab_paths() {
        let recorder = Recorder::default();
        let client = Client::new(recorder.clone()).routes([(Method::GET, "/send-verification/:token".to_string())]);
        client
            .path("sendVerification")
            .call(json!({"token": "t1"}))
            .await
            .unwrap();
        let seen = recorder.seen.lock().unwrap();
        assert_eq!(seen[0].0, Method::GET);
        assert_eq!(seen[0].1, "/send-verification/t1");
        assert!(seen[0].2.is_none());
    }

    #[tokio::test]
    async fn route_call_uses_registered_method() {
        let recorder = Recorder::default();
        let client = Client::new(recorder.clone()).routes([(Method::PUT, "/notification/read/:id".to_string())]);
        let call = client.route("/notification/read/:id").unwrap();
        assert_eq!(call.method(), &Method::PUT);
        call.call(json!({"id": "n1"})).await.unwrap();
        assert_eq!(recorder.seen.lock().unwrap()[0].1, "/notification/read/n1");
    }
}
