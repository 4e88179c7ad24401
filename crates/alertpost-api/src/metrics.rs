use std::fmt::Write;

use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;

use crate::state::AppState;

pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    let mut out = String::with_capacity(512);
    let endpoints = state.service.registry().len().await;
    let stats = state.service.stats();

    // Writing to a String cannot fail.
    let _ = writeln!(out, "# TYPE alertpost_endpoints gauge");
    let _ = writeln!(out, "# HELP alertpost_endpoints Number of configured endpoints");
    let _ = writeln!(out, "alertpost_endpoints {}", endpoints);

    let _ = writeln!(out, "# TYPE alertpost_deliveries counter");
    let _ = writeln!(
        out,
        "# HELP alertpost_deliveries Alert deliveries by outcome"
    );
    let _ = writeln!(out, "alertpost_deliveries_total{{outcome=\"sent\"}} {}", stats.sent());
    let _ = writeln!(out, "alertpost_deliveries_total{{outcome=\"failed\"}} {}", stats.failed());

    let _ = writeln!(out, "# EOF");

    (
        [(
            header::CONTENT_TYPE,
            "application/openmetrics-text; version=1.0.0; charset=utf-8",
        )],
        out,
    )
}
