//! Hardeners for the LITP baselines
//!
//! One module per schema section. Each module registers its hardeners with
//! [`registry`], keyed by `section.topic`.

mod file_system;
mod firewall;
pub mod litp;
mod login_control;
mod os_configuration;
mod os_installation;
pub mod parsers;
mod password_encryption;
mod routing;
mod securing_services;
mod system_access_control;
mod time_sync;
mod virtual_machine;

use hardening::{HardenError, HardenerRegistry, SchemaError, TopicContext, Value};

/// Every hardener this binary knows about
pub fn registry() -> Result<HardenerRegistry, SchemaError> {
    let mut registry = HardenerRegistry::new();
    os_installation::register(&mut registry)?;
    os_configuration::register(&mut registry)?;
    file_system::register(&mut registry)?;
    system_access_control::register(&mut registry)?;
    login_control::register(&mut registry)?;
    routing::register(&mut registry)?;
    firewall::register(&mut registry)?;
    securing_services::register(&mut registry)?;
    time_sync::register(&mut registry)?;
    password_encryption::register(&mut registry)?;
    virtual_machine::register(&mut registry)?;
    Ok(registry)
}

fn type_error(ctx: &TopicContext<'_>, wanted: &str) -> HardenError {
    HardenError::stop(format!(
        "{} expects a {wanted} value, got {}",
        ctx.key, ctx.expected
    ))
}

fn expected_bool(ctx: &TopicContext<'_>) -> Result<bool, HardenError> {
    ctx.expected.as_bool().ok_or_else(|| type_error(ctx, "boolean"))
}

fn expected_int(ctx: &TopicContext<'_>) -> Result<i64, HardenError> {
    ctx.expected.as_int().ok_or_else(|| type_error(ctx, "integer"))
}

fn expected_items(ctx: &TopicContext<'_>) -> Result<Vec<Value>, HardenError> {
    ctx.expected
        .as_items()
        .map(<[Value]>::to_vec)
        .ok_or_else(|| type_error(ctx, "list"))
}

/// `{title: value}`, the shape of most reports
fn titled(title: &str, value: impl Into<Value>) -> Value {
    Value::map([(title, value.into())])
}

#[cfg(test)]
pub(crate) mod testing {
    use hardening::{CommandOutput, PollConfig, Shell, TopicContext, TopicKey, Transport, Value};
    use std::collections::{BTreeMap, HashMap, VecDeque};
    use std::time::Duration;

    /// Transport answering commands from a script
    ///
    /// Replies for the same command are consumed in order, the last one
    /// repeats. Unknown commands succeed with empty output.
    #[derive(Default)]
    pub struct FakeHost {
        replies: HashMap<String, VecDeque<CommandOutput>>,
        pub issued: Vec<String>,
    }

    impl FakeHost {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn on(mut self, command: &str, status: i32, output: &str) -> Self {
            self.replies
                .entry(command.to_string())
                .or_default()
                .push_back(CommandOutput::new(status, output));
            self
        }

        pub fn ran(&self, command: &str) -> bool {
            self.issued.iter().any(|c| c == command)
        }

        pub fn ran_matching(&self, fragment: &str) -> bool {
            self.issued.iter().any(|c| c.contains(fragment))
        }
    }

    impl Transport for FakeHost {
        fn host(&self) -> &str {
            "fake-host"
        }

        fn connect(&mut self) -> anyhow::Result<()> {
            Ok(())
        }

        fn run(&mut self, command: &str) -> anyhow::Result<CommandOutput> {
            self.issued.push(command.to_string());
            let Some(queue) = self.replies.get_mut(command) else {
                return Ok(CommandOutput::new(0, ""));
            };
            let reply = if queue.len() > 1 {
                queue.pop_front()
            } else {
                queue.front().cloned()
            };
            Ok(reply.unwrap_or_else(|| CommandOutput::new(0, "")))
        }

        fn close(&mut self) {}
    }

    /// Settings shared by tests that need none
    pub fn no_settings() -> BTreeMap<String, String> {
        BTreeMap::new()
    }

    pub fn context<'a>(
        host: &'a mut FakeHost,
        key: &str,
        expected: impl Into<Value>,
        settings: &'a BTreeMap<String, String>,
    ) -> TopicContext<'a> {
        TopicContext {
            key: TopicKey::parse(key).expect("valid topic key"),
            expected: expected.into(),
            settings,
            shell: Shell::new(host),
            poll: PollConfig::new(Duration::from_millis(1), Duration::from_millis(5)),
        }
    }
}
