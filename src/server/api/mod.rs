//! This module contains the API endpoints for the server.
pub mod issues;
pub mod repos;
pub mod routes;
pub mod state;
pub mod students;
