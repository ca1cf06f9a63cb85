//! Clinic administration backend: registration, appointment scheduling,
//! prescriptions, messaging and feedback behind a JSON API.

pub mod authorization;
pub mod backend;
pub mod config;
pub mod consts;
pub mod db;
pub mod email;
pub mod models;
pub mod services;
pub mod utils;
