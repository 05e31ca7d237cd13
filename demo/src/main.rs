//! Demo server: the marketing API with the notifications plugin.
//!
//! Run from repo root: `cargo run -p marketing-demo`
//! Uses Postgres when `DATABASE_URL` is set (run `better-marketing migrate` first),
//! the in-memory store otherwise.

use better_marketing::{
    plugins::notifications, Hook, HookOutcome, Marketing, MarketingOptions, MemoryStore, PostgresStore, Store,
};
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("better_marketing=info,marketing_demo=info")),
        )
        .init();

    let store: Arc<dyn Store> = match std::env::var("DATABASE_URL") {
        Ok(url) => Arc::new(PostgresStore::connect(&url).await?),
        Err(_) => Arc::new(MemoryStore::new()),
    };
    let origin = std::env::var("DEMO_ORIGIN").unwrap_or_else(|_| "http://localhost:3001".into());

    let options = MarketingOptions::marketing()
        .database(store)
        .trusted_origin(origin)
        .plugin(notifications::plugin())
        .after_hook(Hook::always(|ctx| async move {
            tracing::debug!(method = %ctx.method, route = %ctx.route, "handled");
            Ok(HookOutcome::proceed())
        }));
    let marketing = Marketing::init(options).await?;

    let app = marketing.router();
    let addr = std::env::var("DEMO_ADDR").unwrap_or_else(|_| "127.0.0.1:3000".into());
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(
        "Marketing demo listening on http://{}{}",
        listener.local_addr()?,
        marketing.context().base_path
    );
    axum::serve(listener, app).await?;
    Ok(())
}
