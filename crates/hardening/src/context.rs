//! Transport, shell and progress seams
//!
//! These traits keep the engine independent of how commands reach the host
//! and how progress is shown.

use crate::description::Description;
use crate::error::{CommandError, HardenError};
use crate::poll::PollConfig;
use crate::topic::{CommandRecord, Phase, Topic, TopicKey};
use crate::value::Value;
use std::collections::BTreeMap;

const PASSWORD_EXPIRY_WARNING: &str = "Warning: your password will expire in ";
const PASSWORD_PROMPT: &str = "Password: ";

/// Result of one remote command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub status: i32,
    /// Combined stdout and stderr
    pub output: String,
}

impl CommandOutput {
    pub fn new(status: i32, output: impl Into<String>) -> Self {
        Self {
            status,
            output: output.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.status == 0
    }
}

/// Runs shell commands on one remote host
///
/// The engine owns the transport for a whole run: `connect` before the first
/// topic, `close` on every exit path.
pub trait Transport: Send {
    /// Host this transport talks to
    fn host(&self) -> &str;

    fn connect(&mut self) -> anyhow::Result<()>;

    /// Run a command and return its status and combined output
    ///
    /// A non-zero exit is not an error at this level.
    fn run(&mut self, command: &str) -> anyhow::Result<CommandOutput>;

    fn close(&mut self);
}

/// Per-topic command runner that records every command it issues
pub struct Shell<'a> {
    transport: &'a mut dyn Transport,
    phase: Phase,
    records: Vec<CommandRecord>,
}

impl<'a> Shell<'a> {
    pub fn new(transport: &'a mut dyn Transport) -> Self {
        Self {
            transport,
            phase: Phase::PreHarden,
            records: Vec::new(),
        }
    }

    pub fn host(&self) -> &str {
        self.transport.host()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub(crate) fn set_phase(&mut self, phase: Phase) {
        self.phase = phase;
    }

    /// Commands issued so far, in order
    pub fn records(&self) -> &[CommandRecord] {
        &self.records
    }

    pub(crate) fn take_records(&mut self) -> Vec<CommandRecord> {
        std::mem::take(&mut self.records)
    }

    /// Run a command that must exit with status 0, returning its output
    pub fn run(&mut self, command: &str) -> Result<String, CommandError> {
        Ok(self.run_allowing(command, &[])?.output)
    }

    /// Run a command, accepting status 0 and any status in `accepted`
    pub fn run_allowing(
        &mut self,
        command: &str,
        accepted: &[i32],
    ) -> Result<CommandOutput, CommandError> {
        self.checked(command, command, accepted)
    }

    /// Run a command whose text must not be logged or recorded
    ///
    /// `shown` stands in for the command in logs, history and errors.
    pub fn run_redacted(&mut self, command: &str, shown: &str) -> Result<String, CommandError> {
        Ok(self.checked(command, shown, &[])?.output)
    }

    fn checked(
        &mut self,
        command: &str,
        shown: &str,
        accepted: &[i32],
    ) -> Result<CommandOutput, CommandError> {
        let output = self.exec(command, shown)?;
        if output.success() || accepted.contains(&output.status) {
            Ok(output)
        } else {
            Err(CommandError::Failed {
                command: shown.to_string(),
                status: output.status,
                output: output.output,
            })
        }
    }

    /// Run a command and return only its exit status
    pub fn status(&mut self, command: &str) -> Result<i32, CommandError> {
        Ok(self.exec(command, command)?.status)
    }

    pub fn read_file(&mut self, path: &str) -> Result<String, CommandError> {
        self.run(&format!("cat {}", quote(path)))
    }

    /// Whether a line matching `pattern` (extended regex) exists in `path`
    pub fn file_contains(&mut self, path: &str, pattern: &str) -> Result<bool, CommandError> {
        let status = self.run_allowing(
            &format!("grep -Eq {} {}", quote(pattern), quote(path)),
            &[1],
        )?;
        Ok(status.success())
    }

    /// Append `line` to `path`, creating the file if needed
    pub fn insert_line_in_file(&mut self, path: &str, line: &str) -> Result<String, CommandError> {
        self.run(&format!("echo {} >> {}", quote(line), quote(path)))
    }

    /// Insert `line` after every line matching `pattern` (extended regex)
    pub fn insert_line_after(
        &mut self,
        path: &str,
        pattern: &str,
        line: &str,
    ) -> Result<String, CommandError> {
        self.run(&format!(
            "sed -ri {} {}",
            quote(&format!("/{}/a {line}", sed_escape(pattern))),
            quote(path)
        ))
    }

    /// Replace every line matching `pattern` in `path` with `line`
    pub fn replace_line_in_file(
        &mut self,
        path: &str,
        pattern: &str,
        line: &str,
    ) -> Result<String, CommandError> {
        self.run(&format!(
            "sed -ri {} {}",
            quote(&format!("/{}/c\\{line}", sed_escape(pattern))),
            quote(path)
        ))
    }

    /// Delete every line matching `pattern` from `path`
    pub fn remove_line_from_file(&mut self, path: &str, pattern: &str) -> Result<String, CommandError> {
        self.run(&format!(
            "sed -ri {} {}",
            quote(&format!("/{}/d", sed_escape(pattern))),
            quote(path)
        ))
    }

    fn exec(&mut self, command: &str, shown: &str) -> Result<CommandOutput, CommandError> {
        log::debug!("[{}] {shown}", self.transport.host());
        let raw = self
            .transport
            .run(command)
            .map_err(|err| CommandError::Transport {
                command: shown.to_string(),
                message: format!("{err:#}"),
            })?;
        let output = CommandOutput::new(raw.status, clean_output(&raw.output));
        self.records.push(CommandRecord {
            phase: self.phase,
            command: shown.to_string(),
            status: output.status,
            output: output.output.clone(),
        });
        Ok(output)
    }
}

/// Drop password expiry warnings and a leading sudo password prompt
pub fn clean_output(raw: &str) -> String {
    let kept: Vec<&str> = raw
        .lines()
        .filter(|line| !line.starts_with(PASSWORD_EXPIRY_WARNING))
        .collect();
    let joined = kept.join("\n");
    joined
        .strip_prefix(PASSWORD_PROMPT)
        .map(str::to_string)
        .unwrap_or(joined)
}

/// Quote a string for a POSIX shell
pub fn quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

fn sed_escape(s: &str) -> String {
    s.replace('/', r"\/")
}

/// Everything a hardener sees while processing one topic
pub struct TopicContext<'a> {
    pub key: TopicKey,
    pub expected: Value,
    pub settings: &'a BTreeMap<String, String>,
    pub shell: Shell<'a>,
    pub poll: PollConfig,
}

impl TopicContext<'_> {
    pub fn setting(&self, key: &str) -> Option<&str> {
        self.settings.get(key).map(String::as_str)
    }

    /// A description setting that must be present and non-empty
    pub fn require_setting(&self, key: &str) -> Result<&str, HardenError> {
        match self.setting(key) {
            Some(value) if !value.is_empty() => Ok(value),
            _ => Err(HardenError::stop(format!(
                "Setting '{key}' is required for {}",
                self.key
            ))),
        }
    }
}

/// Progress callback for a run
pub trait ProgressCallback: Send {
    /// Called once after connecting, before the first topic
    fn on_run_start(&mut self, description: &Description, topics: usize);

    /// Called before a topic with a bound hardener is processed
    fn on_topic_start(&mut self, key: &TopicKey, description: &str);

    /// Called when a topic reaches its terminal state
    fn on_topic_complete(&mut self, key: &TopicKey, topic: &Topic);

    fn on_run_complete(&mut self, description: &Description);
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_run_start(&mut self, _description: &Description, _topics: usize) {}
    fn on_topic_start(&mut self, _key: &TopicKey, _description: &str) {}
    fn on_topic_complete(&mut self, _key: &TopicKey, _topic: &Topic) {}
    fn on_run_complete(&mut self, _description: &Description) {}
}


#[cfg(test)]
mod tests {
    use super::testing::ScriptedTransport;
    use super::*;

    #[test]
    fn test_clean_output() {
        let raw = "Warning: your password will expire in 3 days\nenforcing";
        assert_eq!(clean_output(raw), "enforcing");
        assert_eq!(clean_output("Password: enabled"), "enabled");
        assert_eq!(clean_output("a\nb"), "a\nb");
    }

    #[test]
    fn test_quote() {
        assert_eq!(quote("plain"), "'plain'");
        assert_eq!(quote("it's"), r"'it'\''s'");
    }

    #[test]
    fn test_shell_records_phase_and_status() {
        let mut transport = ScriptedTransport::default()
            .reply("getenforce", 0, "Enforcing")
            .reply("setenforce 1", 1, "denied");
        let mut shell = Shell::new(&mut transport);

        assert_eq!(shell.run("getenforce").unwrap(), "Enforcing");
        shell.set_phase(Phase::Harden);
        let err = shell.run("setenforce 1").unwrap_err();
        assert_eq!(
            err,
            CommandError::Failed {
                command: "setenforce 1".into(),
                status: 1,
                output: "denied".into(),
            }
        );

        let records = shell.take_records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].phase, Phase::PreHarden);
        assert_eq!(records[1].phase, Phase::Harden);
        assert_eq!(records[1].status, 1);
        assert!(shell.records().is_empty());
    }

    #[test]
    fn test_run_allowing_accepts_listed_status() {
        let mut transport = ScriptedTransport::default().reply("rpm -q telnet", 1, "not installed");
        let mut shell = Shell::new(&mut transport);
        let out = shell.run_allowing("rpm -q telnet", &[1]).unwrap();
        assert_eq!(out.status, 1);
    }

    #[test]
    fn test_run_redacted_hides_command() {
        let mut transport = ScriptedTransport::default()
            .reply("printf 'secret' | crypt", 0, "$1$hash")
            .reply("printf 'secret' | fail", 2, "boom");
        let mut shell = Shell::new(&mut transport);
        assert_eq!(
            shell.run_redacted("printf 'secret' | crypt", "crypt").unwrap(),
            "$1$hash"
        );
        let err = shell
            .run_redacted("printf 'secret' | fail", "fail")
            .unwrap_err();
        assert!(!err.to_string().contains("secret"));
        assert!(shell.records().iter().all(|r| !r.command.contains("secret")));
    }

    #[test]
    fn test_file_helpers_build_sed_commands() {
        let mut transport = ScriptedTransport::default();
        {
            let mut shell = Shell::new(&mut transport);
            shell
                .replace_line_in_file("/etc/ssh/sshd_config", "^PermitRootLogin", "PermitRootLogin no")
                .unwrap();
            shell
                .remove_line_from_file("/etc/issue", "^Authorized")
                .unwrap();
            shell
                .insert_line_after("/boot/grub/grub.conf", "^timeout=[0-9]+", "password --md5 x")
                .unwrap();
        }
        assert_eq!(
            transport.issued,
            [
                "sed -ri '/^PermitRootLogin/c\\PermitRootLogin no' '/etc/ssh/sshd_config'",
                "sed -ri '/^Authorized/d' '/etc/issue'",
                "sed -ri '/^timeout=[0-9]+/a password --md5 x' '/boot/grub/grub.conf'",
            ]
        );
    }
}
