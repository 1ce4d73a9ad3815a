use crate::config::Environment;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is unset. Engine events log at INFO with
/// structured fields; sqlx statement logging stays quiet outside prod too.
fn default_filter(env: &Environment) -> &'static str {
    match env {
        Environment::Dev => "tenderworks_backend=debug,tower_http=debug,sqlx=warn,info",
        Environment::Staging => "tenderworks_backend=debug,tower_http=info,sqlx=warn,info",
        Environment::Prod => "tenderworks_backend=info,tower_http=info,warn",
    }
}

pub fn init_logging(env: &Environment) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(env).into());

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_file(env.is_dev())
        .with_line_number(env.is_dev());

    if env.is_prod() {
        // One flat JSON object per event so tender_id / actor_id are top-level keys
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer.json().flatten_event(true).with_current_span(true))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer.pretty())
            .init();
    }

    tracing::info!(env = ?env, "Logging initialized");
}
