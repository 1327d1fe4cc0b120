//! Checkers, schedulers, and the operator controller: the layer that turns
//! cached cluster state into candidate operators and drives them to
//! completion.

pub mod checkers;
pub mod controller;
pub mod error;
pub mod schedulers;
pub mod view;

pub use controller::OperatorController;
pub use error::{Error, Result};
pub use schedulers::{Scheduler, SchedulerRegistry};
pub use view::ClusterView;
