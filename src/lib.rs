#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod address;
pub(crate) mod api;
pub mod app;
pub mod clients;
pub mod config;
pub mod domain;
pub mod error;
pub mod observability;
pub mod pipeline;
pub mod scheduler;
pub mod transform;
pub mod util;

#[cfg(test)]
pub(crate) mod testing;
