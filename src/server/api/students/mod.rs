//! Handler for looking up a student's stored records.
use actix_web::{web, HttpResponse, Responder};

use crate::submissions::store::SubmissionStore;
use crate::utils::{git::VersionControl, issues::IssueTracker};

use super::state::App as AppState;

/// Every stored task record of a student, 404 if there are none.
#[tracing::instrument(skip(data))]
pub async fn student<V, T, S>(
    data: web::Data<AppState<V, T, S>>,
    handle: web::Path<String>,
) -> impl Responder
where
    V: VersionControl + 'static,
    T: IssueTracker + 'static,
    S: SubmissionStore + 'static,
{
    let handle = handle.into_inner();
    match data.store().student(&handle) {
        Ok(tasks) if tasks.is_empty() => {
            HttpResponse::NotFound().body(format!("Student '{handle}' not found in records."))
        }
        Ok(tasks) => HttpResponse::Ok().json(tasks),
        Err(err) => {
            tracing::error!("Error reading records of {handle}: {err}");
            HttpResponse::InternalServerError().body(err.to_string())
        }
    }
}
