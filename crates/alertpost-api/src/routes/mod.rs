mod alerts;
mod endpoints;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

pub use alerts::{AcceptedResponse, PostAlertRequest};
pub use endpoints::UpdateResponse;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/endpoints",
            get(endpoints::list_endpoints)
                .put(endpoints::replace_endpoints)
                .patch(endpoints::merge_endpoints),
        )
        .route("/endpoints/{name}", get(endpoints::get_endpoint))
        .route("/alerts", post(alerts::post_alert))
        .route("/test", get(alerts::test_options).post(alerts::run_test))
}
