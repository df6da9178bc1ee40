//! # Hardening
//!
//! Audit and remediate the security configuration of a remote host.
//!
//! ## Core Concepts
//!
//! - **Schema**: sections of typed topics, declared once per process
//! - **Baseline**: expected values for every schema topic, possibly derived
//!   from another baseline
//! - **Description**: a baseline composed against the schema for one host,
//!   holding the execution state of every topic
//! - **Hardener**: checks, hardens and reports one topic
//! - **Engine**: drives every hardener through check, harden and reverify
//!
//! ## Example
//!
//! ```ignore
//! use hardening::{
//!     Baseline, Engine, HardenResult, Hardener, HardenerRegistry, NoProgress,
//!     Schema, SectionSchema, SectionValues, TopicContext, TopicKey, Value,
//!     ValueType, done, found,
//! };
//!
//! let schema = Schema::new().section(
//!     SectionSchema::new("login_control", "Login control")
//!         .topic("idle_timeout", ValueType::Integer, "Idle session timeout"),
//! );
//!
//! let baseline = Baseline::new("node")
//!     .section("login_control", SectionValues::new().set("idle_timeout", 300));
//!
//! struct IdleTimeout;
//!
//! impl Hardener for IdleTimeout {
//!     fn key(&self) -> TopicKey {
//!         TopicKey::new("login_control", "idle_timeout")
//!     }
//!
//!     fn check(&self, ctx: &mut TopicContext<'_>) -> HardenResult<Option<Value>> {
//!         let out = ctx.shell.run("echo $TMOUT")?;
//!         Ok(hardening::Outcome::Implemented(out.trim().parse::<i64>().ok().map(Value::from)))
//!     }
//!
//!     fn harden(&self, ctx: &mut TopicContext<'_>) -> HardenResult<String> {
//!         let line = format!("TMOUT={}", ctx.expected);
//!         ctx.shell.insert_line_in_file("/etc/profile.d/os-security.sh", &line)?;
//!         done(format!("Added {line}"))
//!     }
//! }
//!
//! let mut registry = HardenerRegistry::new();
//! registry.register(IdleTimeout)?;
//!
//! let description = baseline.compose(&schema, "10.0.0.5")?;
//! let run = Engine::new(&registry).run(description, &mut transport, &mut NoProgress)?;
//! if let Some(failure) = run.failure {
//!     eprintln!("{failure}");
//! }
//! ```
//!
//! ## Provider Traits
//!
//! - [`Transport`]: runs commands on the remote host
//! - [`ProgressCallback`]: receives progress updates
//!
//! The crate has no dependency on a particular SSH client or UI.

pub mod context;
pub mod description;
pub mod engine;
pub mod error;
pub mod hardener;
pub mod poll;
pub mod section;
pub mod topic;
pub mod value;

// Re-export main types at crate root
pub use context::{
    CommandOutput, NoProgress, ProgressCallback, Shell, TopicContext, Transport, clean_output,
    quote,
};
pub use description::{Baseline, Classification, Description};
pub use engine::{CHECKED_ONLY_REPORT, CompletedRun, Engine, EngineOptions};
pub use error::{
    CommandError, EngineError, HardenError, RunFailure, SchemaError, SectionError, TypeMismatch,
    Violation,
};
pub use hardener::{
    BoxedHardener, HardenResult, Hardener, HardenerRegistry, Outcome, done, found,
    not_implemented, not_implemented_because,
};
pub use poll::{PollConfig, wait_until};
pub use section::{Schema, Section, SectionSchema, SectionValues, compose_section};
pub use topic::{CommandRecord, Expected, Phase, Topic, TopicKey, TopicSpec, TopicStatus};
pub use value::{Value, ValueType};
