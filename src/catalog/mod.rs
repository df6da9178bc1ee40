//! Schema and baselines for LITP deployments

mod baselines;
mod schema;

pub use baselines::{BASELINES, baseline};
pub use schema::schema;
