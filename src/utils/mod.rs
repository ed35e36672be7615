//! Collaborators of the engines and shared helpers.
pub mod batch;
pub mod cli;
pub mod git;
pub mod issues;
pub mod paths;
