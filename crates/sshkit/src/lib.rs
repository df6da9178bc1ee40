//! # sshkit
//!
//! Run commands on remote hosts through the system OpenSSH client.
//!
//! This crate provides:
//! - Multiplexed sessions over a control master socket
//! - Password (via `sshpass`), key file and agent authentication
//! - Jump hosts, with or without their own password
//! - Privilege escalation through `sudo -S`
//! - Reconnect and retry on dropped connections
//!
//! ## Example
//!
//! ```no_run
//! use sshkit::{Auth, Session, SshConfig};
//!
//! let config = SshConfig::new("10.0.0.5")
//!     .with_user("litp-admin")
//!     .with_auth(Auth::Password("secret".into()))
//!     .with_become_password("root-secret");
//!
//! let mut session = Session::new(config);
//! session.connect().expect("connect failed");
//! let out = session.run("sestatus").expect("run failed");
//! println!("{} (exit {})", out.combined(), out.status);
//! ```

#![warn(clippy::all)]

pub mod error;
pub mod retry;
pub mod session;
pub mod types;

pub use error::{Error, ErrorCategory, Result};
pub use retry::{LogCallback, NoCallback, RetryCallback, with_retry};
pub use session::{Session, shell_quote};
pub use types::{Auth, JumpHost, RemoteOutput, RetryConfig, SshConfig};
