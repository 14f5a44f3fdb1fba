//! Strength coaching backend: admin management of programs, exercises, users
//! and subscriptions, plus the end-user program builder, coach chat and the
//! payment webhook.

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod services;
