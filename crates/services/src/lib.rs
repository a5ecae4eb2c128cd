#![forbid(unsafe_code)]

pub mod error;
mod plan_locks;
pub mod plan_service;

pub use koach_core::Clock;

pub use error::PlanServiceError;
pub use plan_service::{CreatePlan, LogSession, PlanOverview, PlanService, SessionLogged};
