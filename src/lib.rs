//! # Gradesync
//!
//! Gradesync keeps track of student programming assignments that are handed
//! in as one git repository per student and task, and of the grading verdicts
//! teaching assistants record as issues on those repositories.
//!
//! The core is two engines sharing one submission store:
//!
//! * [`submissions::sync::SyncEngine`] clones or fast-forwards a repository and
//!   records its head as the initial hand-in (`clone`) or the latest
//!   resubmission (`pull`).
//! * [`submissions::grading::GradeEngine`] reduces the repository's issues to
//!   the grader's latest `Pass`, `Komplettera` and `Fail` issue.

// Lint policy: everything pedantic is a warning during development and only
// denied in CI. Individual restriction lints that fight the codebase's style
// are allowed below.
#![warn(
    clippy::all,
    missing_docs,
    clippy::pedantic,
    clippy::nursery,
    clippy::cargo
)]
#![allow(
    clippy::blanket_clippy_restriction_lints,
    reason = "Restriction lints are opted into wholesale and pruned below"
)]
#![warn(clippy::restriction)]
#![allow(clippy::implicit_return, reason = "This is idiomatic Rust")]
#![allow(
    clippy::multiple_crate_versions,
    reason = "actix, reqwest and git2 pull in overlapping transitive deps"
)]
#![allow(
    clippy::std_instead_of_alloc,
    clippy::std_instead_of_core,
    reason = "We're not interested in becoming no-std compatible"
)]
#![allow(
    clippy::mod_module_files,
    reason = "Nested modules live in `mod.rs` files"
)]
#![allow(
    clippy::missing_inline_in_public_items,
    reason = "Inlining is left to the compiler; the hot paths are network and disk bound"
)]
#![allow(
    clippy::exhaustive_structs,
    clippy::exhaustive_enums,
    reason = "`#[non_exhaustive]` matters for types consumed by other crates, this is an application"
)]
#![allow(
    clippy::question_mark_used,
    reason = "We rely on propagating errors with question mark extensively"
)]
#![allow(
    clippy::semicolon_outside_block,
    reason = "Opt in to have semicolon in the outside block across codebase"
)]
#![allow(
    clippy::single_call_fn,
    reason = "We tend to break up long functions into smaller ones, so this lint is not useful"
)]
#![allow(
    clippy::arithmetic_side_effects,
    reason = "Arithmetic is limited to counters and indices"
)]
#![allow(
    clippy::arbitrary_source_item_ordering,
    reason = "Items are ordered by reading flow, not alphabetically"
)]

pub mod config;
pub mod error;
pub mod server;
pub mod submissions;
pub mod utils;
