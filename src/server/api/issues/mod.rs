//! Handlers for grading issues.
use actix_web::{web, HttpResponse, Responder};

use crate::submissions::store::SubmissionStore;
use crate::utils::{git::VersionControl, issues::IssueTracker};

use super::state::App as AppState;

/// Module that maps the HTTP web request body to structs.
pub mod request;

/// Refresh the stored grading summary of one user's task.
#[tracing::instrument(skip(data, body))]
pub async fn fetch_issues<V, T, S>(
    data: web::Data<AppState<V, T, S>>,
    body: web::Json<request::FetchIssues>,
) -> impl Responder
where
    V: VersionControl + 'static,
    T: IssueTracker + 'static,
    S: SubmissionStore + 'static,
{
    let request::FetchIssues { user, task_id } = body.into_inner();
    let task = match task_id.number() {
        Ok(task) => task,
        Err(err) => return HttpResponse::BadRequest().body(err),
    };
    let state = data.clone();
    match web::block(move || state.grading.refresh(&user, task)).await {
        Ok(result) => HttpResponse::Ok().json(result),
        Err(err) => {
            tracing::error!("Issue worker failed: {err}");
            HttpResponse::InternalServerError().body(err.to_string())
        }
    }
}

/// Open an issue on one user's task repository.
#[tracing::instrument(skip(data, body))]
pub async fn create_issue<V, T, S>(
    data: web::Data<AppState<V, T, S>>,
    body: web::Json<request::CreateIssue>,
) -> impl Responder
where
    V: VersionControl + 'static,
    T: IssueTracker + 'static,
    S: SubmissionStore + 'static,
{
    let request::CreateIssue {
        user,
        task_id,
        title,
        body,
    } = body.into_inner();
    let task = match task_id.number() {
        Ok(task) => task,
        Err(err) => return HttpResponse::BadRequest().body(err),
    };
    let state = data.clone();
    match web::block(move || state.grading.create_issue(&user, task, &title, &body)).await {
        Ok(outcome) => HttpResponse::Ok().json(outcome),
        Err(err) => {
            tracing::error!("Issue worker failed: {err}");
            HttpResponse::InternalServerError().body(err.to_string())
        }
    }
}
