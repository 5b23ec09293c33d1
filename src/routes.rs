use std::sync::Arc;

use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderValue, Method};
use axum::routing::{get, post, put};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

fn cors(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %o, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_credentials(true)
}

pub fn router(state: Arc<AppState>) -> Router {
    let cors = cors(&state.config.cors_origins);

    Router::new()
        .route("/health", get(handlers::health::health))
        // Auth
        .route("/api/auth/signup", post(handlers::auth::signup))
        .route("/api/auth/verify-signup", post(handlers::auth::verify_signup))
        .route("/api/auth/login", post(handlers::auth::login))
        .route("/api/auth/verify-login", post(handlers::auth::verify_login))
        .route("/api/auth/check-admin", get(handlers::auth::check_admin))
        .route(
            "/api/users/me",
            get(handlers::users::me).put(handlers::users::update_me),
        )
        // Customer bookings
        .route("/api/bookings", post(handlers::bookings::create_booking))
        .route("/api/bookings/my-bookings", get(handlers::bookings::my_bookings))
        .route("/api/bookings/:booking_id", get(handlers::bookings::get_booking))
        .route("/api/bookings/:booking_id/quotes", get(handlers::bookings::quotes))
        .route(
            "/api/bookings/:booking_id/cancel",
            post(handlers::bookings::cancel_booking),
        )
        .route(
            "/api/bookings/requests/:request_id/confirm",
            post(handlers::bookings::confirm_quote),
        )
        .route(
            "/api/bookings/requests/:request_id/reject",
            post(handlers::bookings::reject_quote),
        )
        // Business responses
        .route(
            "/api/business/booking-requests/:request_id/accept",
            post(handlers::business::accept_request),
        )
        .route(
            "/api/business/booking-requests/:request_id/decline",
            post(handlers::business::decline_request),
        )
        .route("/api/business/accept/:request_id", get(handlers::business::accept_link))
        .route("/api/business/decline/:request_id", get(handlers::business::decline_link))
        // Admin
        .route("/api/admin/stats", get(handlers::admin::stats))
        .route(
            "/api/admin/businesses",
            get(handlers::admin::list_businesses).post(handlers::admin::create_business),
        )
        .route(
            "/api/admin/businesses/:id",
            get(handlers::admin::get_business)
                .put(handlers::admin::update_business)
                .delete(handlers::admin::delete_business),
        )
        .route("/api/admin/users", get(handlers::admin::list_users))
        .route(
            "/api/admin/users/:id",
            get(handlers::admin::get_user)
                .put(handlers::admin::update_user)
                .delete(handlers::admin::delete_user),
        )
        .route("/api/admin/bookings", get(handlers::admin::list_bookings))
        .route("/api/admin/bookings/:id", get(handlers::admin::get_booking))
        .route(
            "/api/admin/bookings/:id/status",
            put(handlers::admin::update_booking_status),
        )
        .route(
            "/api/admin/booking-requests",
            get(handlers::admin::list_booking_requests),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
