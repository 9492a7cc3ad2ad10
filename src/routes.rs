use axum::error_handling::HandleErrorLayer;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{get, post};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::middleware::{
    authenticate, handle_panic, request_span, require_authentication, secure_headers,
    vary_on_cookie,
};
use crate::state::AppState;
use crate::{csrf, handlers, session};

pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route(
            "/snippet/create",
            get(handlers::snippet_create).post(handlers::snippet_create_post),
        )
        .route("/user/logout", post(handlers::user_logout_post))
        .route_layer(from_fn(require_authentication));

    let pages = Router::new()
        .route("/", get(handlers::home))
        .route("/snippet/view/:id", get(handlers::snippet_view))
        .route(
            "/user/signup",
            get(handlers::user_signup).post(handlers::user_signup_post),
        )
        .route(
            "/user/login",
            get(handlers::user_login).post(handlers::user_login_post),
        )
        .merge(protected)
        .route_layer(from_fn_with_state(state.clone(), authenticate))
        .route_layer(from_fn_with_state(state.clone(), csrf::verify))
        .fallback(handlers::not_found)
        .with_state(state.clone());

    // One session manager in front of every page so its cache of loaded
    // sessions is shared.
    let pages = ServiceBuilder::new()
        .layer(from_fn(vary_on_cookie))
        .layer(HandleErrorLayer::new(session::handle_error))
        .layer(session::layer(state.sessions.clone(), &state.config))
        .service(pages);

    let app = Router::new()
        .route("/ping", get(handlers::ping))
        .nest_service("/static", ServeDir::new(&state.config.static_dir))
        .fallback_service(pages);

    with_standard_layers(app).with_state(state)
}

/// Layers shared by every route, static files included.
fn with_standard_layers(router: Router<AppState>) -> Router<AppState> {
    router
        .layer(from_fn(secure_headers))
        .layer(TraceLayer::new_for_http().make_span_with(request_span))
        .layer(CatchPanicLayer::custom(handle_panic))
}
