//! Core: Application, ApiHost, UnitOfWork.

pub mod app;

pub use app::{ApiHost, Application, UnitOfWork};
