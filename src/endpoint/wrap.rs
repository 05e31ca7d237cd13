//! The per-call pipeline: before hooks, validation, handler, after hooks.

use crate::endpoint::{Endpoint, EndpointContext, Hook, HookOutcome, Reply};
use crate::error::{ApiError, MarketingError, Result};
use crate::response::{append_headers, json_response};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Response;
use serde_json::Value;

#[derive(Clone, Copy, Debug, Default)]
pub struct CallOptions {
    /// Always produce a `Response`, error responses included.
    pub as_response: bool,
    /// Produce the body together with the collected response headers.
    pub return_headers: bool,
}

#[derive(Debug)]
pub enum EndpointOutput {
    Response(Response),
    WithHeaders {
        status: StatusCode,
        headers: HeaderMap,
        response: Value,
    },
    Value(Value),
}

impl EndpointOutput {
    /// The JSON body, unless the output is a raw response.
    pub fn into_value(self) -> Option<Value> {
        match self {
            EndpointOutput::Response(_) => None,
            EndpointOutput::WithHeaders { response, .. } | EndpointOutput::Value(response) => Some(response),
        }
    }
}

/// Hooks that apply to a call, in run order.
#[derive(Clone, Default)]
pub struct HookSet {
    pub before: Vec<Hook>,
    pub after: Vec<Hook>,
}

struct Outcome {
    status: StatusCode,
    headers: HeaderMap,
    body: Value,
    error: Option<ApiError>,
}

impl Outcome {
    fn reply(reply: Reply) -> Self {
        Outcome {
            status: reply.status,
            headers: reply.headers,
            body: reply.body,
            error: None,
        }
    }

    fn error(e: ApiError) -> Self {
        Outcome {
            status: e.status,
            headers: e.headers.clone(),
            body: e.body(),
            error: Some(e),
        }
    }
}

async fn invoke(endpoint: &Endpoint, ctx: &mut EndpointContext) -> Result<Reply> {
    if let Some(schema) = &endpoint.query {
        schema.coerce(&mut ctx.query);
        schema.validate(&ctx.query)?;
    }
    if let Some(schema) = &endpoint.body {
        schema.validate(&ctx.body_record()?)?;
    }
    (endpoint.handler())(ctx.clone()).await
}

fn finish(outcome: Outcome, opts: CallOptions) -> Result<EndpointOutput> {
    if opts.as_response {
        return Ok(EndpointOutput::Response(json_response(outcome.status, &outcome.headers, &outcome.body)));
    }
    if let Some(mut err) = outcome.error {
        err.headers = outcome.headers;
        return Err(err.into());
    }
    if opts.return_headers {
        return Ok(EndpointOutput::WithHeaders {
            status: outcome.status,
            headers: outcome.headers,
            response: outcome.body,
        });
    }
    Ok(EndpointOutput::Value(outcome.body))
}

/// Run one endpoint call. API errors raised by the handler become an error
/// response that after hooks can still see and replace; any other error, and
/// any hook error, aborts the call.
pub async fn run_endpoint(
    endpoint: &Endpoint,
    mut ctx: EndpointContext,
    hooks: &HookSet,
    opts: CallOptions,
) -> Result<EndpointOutput> {
    for hook in &hooks.before {
        if !hook.matches(&ctx) {
            continue;
        }
        match hook.run(ctx.clone()).await? {
            HookOutcome::Respond(reply) => {
                let mut headers = ctx.response_headers.clone();
                append_headers(&mut headers, &reply.headers);
                return finish(Outcome::reply(Reply { headers, ..reply }), opts);
            }
            HookOutcome::Continue(patch) => ctx.apply(patch),
        }
    }

    let mut outcome = match invoke(endpoint, &mut ctx).await {
        Ok(reply) => Outcome::reply(reply),
        Err(MarketingError::Api(e)) => Outcome::error(e),
        Err(e) => return Err(e),
    };

    ctx.returned = Some(outcome.body.clone());
    ctx.response_headers = outcome.headers.clone();
    for hook in &hooks.after {
        if !hook.matches(&ctx) {
            continue;
        }
        match hook.run(ctx.clone()).await? {
            HookOutcome::Respond(reply) => {
                outcome.status = reply.status;
                outcome.error = None;
                outcome.body = reply.body;
                append_headers(&mut outcome.headers, &reply.headers);
                ctx.returned = Some(outcome.body.clone());
            }
            HookOutcome::Continue(patch) => append_headers(&mut outcome.headers, &patch.headers),
        }
        ctx.response_headers = outcome.headers.clone();
    }
    finish(outcome, opts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MarketingOptions;
    use crate::context::MarketingContext;
    use crate::endpoint::ContextPatch;
    use crate::schema::core_schema;
    use crate::validation::{FieldRule, InputSchema};
    use axum::http::{header, HeaderValue, Method};
    use serde_json::json;
    use std::sync::Arc;

    fn ctx() -> EndpointContext {
        let opts = MarketingOptions::marketing();
        let validated = crate::config::ValidatedOptions {
            secret: "s".repeat(32),
            base_path: "/api/marketing".into(),
        };
        let context = Arc::new(MarketingContext::new(&opts, validated, core_schema()));
        EndpointContext::new(context, Method::POST, "/echo", "/echo")
    }

    fn echo() -> Endpoint {
        Endpoint::post("/echo", |ctx| async move { Ok(Reply::json(ctx.body.clone())) })
    }

    #[tokio::test]
    async fn before_hook_patches_body_last_writer_wins() {
        let hooks = HookSet {
            before: vec![
                Hook::always(|_| async { Ok(HookOutcome::Continue(ContextPatch::new().body_field("tag", "first"))) }),
                Hook::always(|_| async { Ok(HookOutcome::Continue(ContextPatch::new().body_field("tag", "second"))) }),
            ],
            after: vec![],
        };
        let mut c = ctx();
        c.body = json!({"tag": "original", "keep": [1, 2]});
        let out = run_endpoint(&echo(), c, &hooks, CallOptions::default()).await.unwrap();
        assert_eq!(out.into_value().unwrap(), json!({"tag": "second", "keep": [1, 2]}));
    }

    #[tokio::test]
    async fn before_hook_can_short_circuit() {
        let hooks = HookSet {
            before: vec![Hook::always(|_| async { Ok(HookOutcome::respond(json!({"cached": true}))) })],
            after: vec![Hook::always(|_| async { Err(MarketingError::internal("after hooks must not run")) })],
        };
        let out = run_endpoint(&echo(), ctx(), &hooks, CallOptions::default()).await.unwrap();
        assert_eq!(out.into_value().unwrap(), json!({"cached": true}));
    }

    #[tokio::test]
    async fn after_hook_sees_returned_and_appends_cookies() {
        let hooks = HookSet {
            before: vec![],
            after: vec![
                Hook::always(|ctx| async move {
                    assert!(ctx.returned.is_some());
                    Ok(HookOutcome::Continue(
                        ContextPatch::new().header(header::SET_COOKIE, HeaderValue::from_static("a=1")),
                    ))
                }),
                Hook::always(|_| async {
                    Ok(HookOutcome::Continue(
                        ContextPatch::new().header(header::SET_COOKIE, HeaderValue::from_static("b=2")),
                    ))
                }),
            ],
        };
        let opts = CallOptions {
            return_headers: true,
            ..Default::default()
        };
        match run_endpoint(&echo(), ctx(), &hooks, opts).await.unwrap() {
            EndpointOutput::WithHeaders { headers, .. } => {
                assert_eq!(headers.get_all(header::SET_COOKIE).iter().count(), 2);
            }
            other => panic!("unexpected output {:?}", other),
        }
    }

    #[tokio::test]
    async fn after_hook_replaces_body_and_sets_cookie_together() {
        let hooks = HookSet {
            before: vec![],
            after: vec![
                Hook::always(|_| async {
                    Ok(HookOutcome::Continue(
                        ContextPatch::new().header(header::SET_COOKIE, HeaderValue::from_static("a=1")),
                    ))
                }),
                Hook::always(|_| async {
                    Ok(HookOutcome::Respond(
                        Reply::json(json!({"session": "new"}))
                            .status(StatusCode::CREATED)
                            .header(header::SET_COOKIE, HeaderValue::from_static("session=abc")),
                    ))
                }),
            ],
        };
        let opts = CallOptions {
            return_headers: true,
            ..Default::default()
        };
        match run_endpoint(&echo(), ctx(), &hooks, opts).await.unwrap() {
            EndpointOutput::WithHeaders {
                status,
                headers,
                response,
            } => {
                assert_eq!(status, StatusCode::CREATED);
                assert_eq!(response, json!({"session": "new"}));
                let cookies: Vec<_> = headers.get_all(header::SET_COOKIE).iter().collect();
                assert_eq!(cookies, vec!["a=1", "session=abc"]);
            }
            other => panic!("unexpected output {:?}", other),
        }
    }

    #[tokio::test]
    async fn api_errors_are_thrown_unless_as_response() {
        let failing = Endpoint::post("/echo", |_| async { Err(ApiError::not_found("User not found").into()) });
        let err = run_endpoint(&failing, ctx(), &HookSet::default(), CallOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.as_api().map(|e| e.status), Some(StatusCode::NOT_FOUND));

        let opts = CallOptions {
            as_response: true,
            ..Default::default()
        };
        let res = match run_endpoint(&failing, ctx(), &HookSet::default(), opts).await.unwrap() {
            EndpointOutput::Response(res) => res,
            other => panic!("unexpected output {:?}", other),
        };
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body, json!({"error": {"code": "NOT_FOUND", "message": "User not found"}}));
    }

    #[tokio::test]
    async fn invalid_body_is_a_validation_error() {
        let endpoint = echo().body(InputSchema::new().field("email", FieldRule::string().required()));
        let err = run_endpoint(&endpoint, ctx(), &HookSet::default(), CallOptions::default())
            .await
            .unwrap_err();
        let api = err.as_api().unwrap();
        assert_eq!(api.code, "VALIDATION_ERROR");
    }
}
