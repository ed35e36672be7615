//! A central place to register App routes.
use actix_web::web;

use crate::submissions::store::SubmissionStore;
use crate::utils::{git::VersionControl, issues::IssueTracker};

use super::{issues, repos, students};

/// Central place to register all the App routing.
pub fn configure<V, T, S>(cfg: &mut web::ServiceConfig)
where
    V: VersionControl + 'static,
    T: IssueTracker + 'static,
    S: SubmissionStore + 'static,
{
    cfg.service(web::resource("/clone-repos").route(web::post().to(repos::clone_repos::<V, T, S>)))
        .service(
            web::resource("/update-repos").route(web::post().to(repos::update_repo::<V, T, S>)),
        )
        .service(
            web::resource("/fetch-issues").route(web::post().to(issues::fetch_issues::<V, T, S>)),
        )
        .service(
            web::resource("/create-issue").route(web::post().to(issues::create_issue::<V, T, S>)),
        )
        .service(
            web::resource("/students/{handle}").route(web::get().to(students::student::<V, T, S>)),
        );
}
