use crate::handlers::{
    auth::{sign_in, token_refresh},
    comments::{create_comment, delete_comment, list_comments, update_comment},
    completions::complete_content,
    contents::{
        create_content, delete_content, get_course_content, import_contents, list_all_contents,
        list_course_contents, update_content,
    },
    courses::{create_course, delete_course, get_course, list_courses, list_public_courses, update_course},
    dashboard::{dashboard, home, stats},
    demo::{calc_path, calc_post, hello, hello_post},
    health::health_check,
    members::{enroll, exit_course, list_members, my_courses},
    users::{create_user, delete_user, get_user, get_users, register, update_user},
};
use crate::schemas::{ApiDoc, AppState};
use crate::throttle;
use axum::{
    Router, middleware,
    routing::{get, post, put},
};
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Routes under `/api/v1`, grouped by the throttles that guard them.
fn api_routes(state: &AppState) -> Router<AppState> {
    let demo = Router::new()
        .route("/hello", get(hello).post(hello_post))
        .route("/calc/:value1/:operator/:value2", get(calc_path))
        .route("/calc", post(calc_post))
        .route_layer(middleware::from_fn_with_state(state.clone(), throttle::simple));

    let open = Router::new()
        .route("/auth/sign-in", post(sign_in))
        .route("/auth/token-refresh", post(token_refresh))
        .route("/register", post(register))
        .route_layer(middleware::from_fn_with_state(state.clone(), throttle::no_reads));

    let public = Router::new().route("/courses-public", get(list_public_courses));

    let authenticated = Router::new()
        .route("/users", get(get_users).post(create_user))
        .route("/users/:user_id", get(get_user).put(update_user).delete(delete_user))
        .route("/courses", get(list_courses).post(create_course))
        .route("/courses/:course_id", get(get_course).put(update_course).delete(delete_course))
        .route("/members", get(list_members))
        .route("/mycourses", get(my_courses))
        .route("/contents", get(list_all_contents))
        .route("/courses/:course_id/contents", get(list_course_contents).post(create_content))
        .route(
            "/courses/:course_id/contents/:content_id",
            get(get_course_content).put(update_content).delete(delete_content),
        )
        .route("/home", get(home))
        .route("/dashboard", get(dashboard))
        .route("/stats", get(stats))
        .route_layer(middleware::from_fn_with_state(state.clone(), throttle::daily));

    let writes = Router::new()
        .route("/courses/:course_id/enroll", post(enroll))
        .route("/courses/:course_id/exit", post(exit_course))
        .route("/comments", get(list_comments).post(create_comment))
        .route("/comments/:comment_id", put(update_comment).delete(delete_comment))
        .route("/contents/:content_id/complete", post(complete_content))
        .route("/courses/:course_id/contents/import", post(import_contents))
        .route_layer(middleware::from_fn_with_state(state.clone(), throttle::strict_post))
        .route_layer(middleware::from_fn_with_state(state.clone(), throttle::daily));

    Router::new()
        .merge(demo)
        .merge(open)
        .merge(public)
        .merge(authenticated)
        .merge(writes)
        .layer(middleware::from_fn_with_state(state.clone(), throttle::global))
}

/// Create application router with all routes and middleware
pub fn create_router(state: AppState) -> Router {
    let router = Router::new()
        // Health check
        .route("/health", get(health_check))
        .nest("/api/v1", api_routes(&state))
        // Swagger UI
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // The Prometheus recorder is process-global, so test builds that create many routers skip it
    #[cfg(not(test))]
    let router = {
        let (prometheus_layer, metric_handle) = axum_prometheus::PrometheusMetricLayer::pair();
        router
            .route("/metrics", get(|| async move { metric_handle.render() }))
            .layer(prometheus_layer)
    };

    router
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(TimeoutLayer::new(state.request_timeout))
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
