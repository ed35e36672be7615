//! Serve the sync and grading engines over HTTP.
#![allow(clippy::module_name_repetitions)]
use crate::config::Config;
use crate::server::api::routes;
use crate::server::api::state::{App as AppState, Production};
use crate::server::tracing::GradesyncRootSpanBuilder;
use crate::submissions::store::SubmissionStore;
use crate::utils::{git::VersionControl, issues::IssueTracker};
use actix_web::dev::{ServiceRequest, ServiceResponse};
use actix_web::{web, App, Error, HttpServer};

use std::io;

use actix_http::body::MessageBody;
use actix_service::ServiceFactory;
use tracing_actix_web::TracingLogger;

/// Address the API binds to. Grading runs on a trusted machine.
const BIND: &str = "127.0.0.1";

/// Serve the HTTP API on `port` until interrupted.
///
/// The engines use blocking clients, so they are built and dropped outside
/// the async runtime.
///
/// # Errors
/// Errors if the engines cannot be built or the server fails to bind or run.
pub fn serve(config: &Config, port: u16) -> io::Result<()> {
    let state = web::Data::new(Production::from_config(config)?);
    tracing::info!(
        "Running grading server for organization '{}' on http://{BIND}:{port}.",
        config.org
    );

    let server_state = state.clone();
    let result = actix_web::rt::System::new().block_on(async move {
        HttpServer::new(move || init_app(server_state.clone()))
            .bind((BIND, port))?
            .run()
            .await
    });
    drop(state);
    result
}

/// Initialize the application and all possible routing at start-up time.
///
/// # Arguments
/// * `state` - The application state
pub fn init_app<V, T, S>(
    state: web::Data<AppState<V, T, S>>,
) -> App<
    impl ServiceFactory<
        ServiceRequest,
        Response = ServiceResponse<impl MessageBody>,
        Config = (),
        InitError = (),
        Error = Error,
    >,
>
where
    V: VersionControl + 'static,
    T: IssueTracker + 'static,
    S: SubmissionStore + 'static,
{
    App::new()
        .wrap(TracingLogger::<GradesyncRootSpanBuilder>::new())
        .app_data(state)
        .configure(routes::configure::<V, T, S>)
}
