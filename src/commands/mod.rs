pub mod baselines;
pub mod run;
pub mod scan;
pub mod topics;
