//! Handlers for syncing student repositories.
use actix_web::{web, HttpResponse, Responder};

use crate::submissions::store::SubmissionStore;
use crate::utils::{git::VersionControl, issues::IssueTracker};

use self::response::BatchReport;

use super::state::App as AppState;

/// Module that maps the HTTP web request body to structs.
pub mod request;

/// Module that maps the HTTP web response to structs.
pub mod response;

/// Sync every listed user's repository for one task.
#[tracing::instrument(skip(data, body))]
pub async fn clone_repos<V, T, S>(
    data: web::Data<AppState<V, T, S>>,
    body: web::Json<request::CloneRepos>,
) -> impl Responder
where
    V: VersionControl + 'static,
    T: IssueTracker + 'static,
    S: SubmissionStore + 'static,
{
    let request::CloneRepos {
        task_id,
        users,
        jobs,
    } = body.into_inner();
    let task = match task_id.number() {
        Ok(task) => task,
        Err(err) => return HttpResponse::BadRequest().body(err),
    };
    if let Some(user) = response::reserved_handle(&users) {
        return HttpResponse::BadRequest()
            .body(format!("user handle '{user}' clashes with a response key"));
    }
    tracing::info!("Received request to clone repositories for task: {task}");
    let jobs = jobs.unwrap_or(data.jobs);
    let state = data.clone();
    match web::block(move || state.sync.sync_many(&users, task, jobs)).await {
        Ok(results) => HttpResponse::Ok().json(BatchReport::from_sync(results)),
        Err(err) => {
            tracing::error!("Sync worker failed: {err}");
            HttpResponse::InternalServerError().body(err.to_string())
        }
    }
}

/// Sync a single user's repository.
#[tracing::instrument(skip(data, body))]
pub async fn update_repo<V, T, S>(
    data: web::Data<AppState<V, T, S>>,
    body: web::Json<request::UpdateRepo>,
) -> impl Responder
where
    V: VersionControl + 'static,
    T: IssueTracker + 'static,
    S: SubmissionStore + 'static,
{
    let request::UpdateRepo { user, task_id } = body.into_inner();
    let task = match task_id.number() {
        Ok(task) => task,
        Err(err) => return HttpResponse::BadRequest().body(err),
    };
    tracing::info!("Received request to pull repository changes for {user} task: {task}");
    let state = data.clone();
    match web::block(move || state.sync.sync(&user, task)).await {
        Ok(result) => HttpResponse::Ok().json(result),
        Err(err) => {
            tracing::error!("Sync worker failed: {err}");
            HttpResponse::InternalServerError().body(err.to_string())
        }
    }
}
