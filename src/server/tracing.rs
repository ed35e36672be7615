//! Request spans for the HTTP API

use std::time::{Duration, Instant};

use actix_web::{
    dev::{ServiceRequest, ServiceResponse},
    HttpMessage as _,
};
use tracing_actix_web::{DefaultRootSpanBuilder, RootSpanBuilder};

/// Requests taking longer are logged at warn level. Syncing a whole class is
/// expected to take a while.
const SLOW_REQUEST: Duration = Duration::from_secs(60);

/// [`DefaultRootSpanBuilder`] that also records how long each request took.
pub struct GradesyncRootSpanBuilder;

/// When the request arrived, kept in the request extensions.
#[derive(Clone, Copy)]
struct Received(Instant);

impl RootSpanBuilder for GradesyncRootSpanBuilder {
    fn on_request_start(request: &ServiceRequest) -> tracing::Span {
        request.extensions_mut().insert(Received(Instant::now()));
        tracing_actix_web::root_span!(request, elapsed_ms = tracing::field::Empty)
    }

    fn on_request_end<B: actix_web::body::MessageBody>(
        span: tracing::Span,
        outcome: &Result<ServiceResponse<B>, actix_web::Error>,
    ) {
        if let Ok(response) = outcome.as_ref() {
            let received = response.request().extensions().get::<Received>().copied();
            if let Some(Received(at)) = received {
                let elapsed = at.elapsed();
                span.record("elapsed_ms", elapsed.as_millis());
                if elapsed > SLOW_REQUEST {
                    tracing::warn!(
                        path = response.request().path(),
                        elapsed_ms = elapsed.as_millis(),
                        "Slow grading request"
                    );
                }
            }
        }
        DefaultRootSpanBuilder::on_request_end(span, outcome);
    }
}
