//! eduportal - University education portal backend
//!
//! Accounts with three roles, cookie sessions, password reset by email, and
//! the catalogue of programs, accreditations, publications, mobility
//! programs and applications, served as a JSON API.

pub mod api;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
