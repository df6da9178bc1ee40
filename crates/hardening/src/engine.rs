//! Check, harden and reverify every topic of a description
//!
//! Topics are processed one at a time in schema order. Each topic with a
//! bound hardener goes through:
//!
//! 1. Skip if the baseline leaves it undefined
//! 2. `check` (or `report` when check is not implemented)
//! 3. Compare with the expected value, stop if equal
//! 4. `harden`
//! 5. `check` again and compare
//!
//! Errors stay with the topic they happened in. Only a failed connection
//! aborts the run.

use crate::context::{ProgressCallback, Shell, TopicContext, Transport};
use crate::description::Description;
use crate::error::{EngineError, HardenError, RunFailure};
use crate::hardener::{Hardener, HardenerRegistry, Outcome};
use crate::poll::PollConfig;
use crate::topic::{CommandRecord, Phase, Topic, TopicKey, TopicStatus};
use crate::value::Value;
use std::time::Instant;

/// Report stored on topics that already had the expected value
pub const CHECKED_ONLY_REPORT: &str = "Checked only, no hardening needed.";

const OUTPUT_SEPARATOR: &str = "\n\n---------------------------------------\n\n";

/// Options for [`Engine::run`]
#[derive(Debug, Clone, Default)]
pub struct EngineOptions {
    /// Restrict the run, and the final classification, to one topic
    pub only: Option<TopicKey>,
    pub poll: PollConfig,
}

/// A finished run: the filled-in description and the aggregate failure, if any
#[derive(Debug, Clone)]
pub struct CompletedRun {
    pub description: Description,
    pub failure: Option<RunFailure>,
}

impl CompletedRun {
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }
}

/// Drives hardeners over a description
pub struct Engine<'r> {
    registry: &'r HardenerRegistry,
    options: EngineOptions,
}

/// Closes the transport on every exit path, panics included
struct SessionGuard<'a> {
    transport: &'a mut dyn Transport,
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        log::debug!("Closing session to {}", self.transport.host());
        self.transport.close();
    }
}

impl<'r> Engine<'r> {
    pub fn new(registry: &'r HardenerRegistry) -> Self {
        Self::with_options(registry, EngineOptions::default())
    }

    pub fn with_options(registry: &'r HardenerRegistry, options: EngineOptions) -> Self {
        Self { registry, options }
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Run every topic of `description` against the host behind `transport`
    pub fn run(
        &self,
        mut description: Description,
        transport: &mut dyn Transport,
        progress: &mut dyn ProgressCallback,
    ) -> Result<CompletedRun, EngineError> {
        let only = self.options.only.as_ref();
        if let Some(key) = only
            && description.topic(key).is_none()
        {
            return Err(EngineError::UnknownTopic(key.clone()));
        }
        for key in self.registry.keys() {
            if description.topic(key).is_none() {
                log::warn!("Hardener registered for unknown topic {key}, it will not run");
            }
        }

        log::info!("Connecting to {}", transport.host());
        transport.connect().map_err(|err| EngineError::Connect {
            host: transport.host().to_string(),
            message: format!("{err:#}"),
        })?;
        let guard = SessionGuard { transport };

        let started = Instant::now();
        progress.on_run_start(&description, description.topic_count(only));
        let settings = description.settings.clone();

        for si in 0..description.sections.len() {
            for ti in 0..description.sections[si].topics.len() {
                let section = &mut description.sections[si];
                let key = TopicKey::new(section.name.as_str(), section.topics[ti].name.as_str());
                if only.is_some_and(|o| *o != key) {
                    continue;
                }
                let Some(hardener) = self.registry.get(&key) else {
                    log::debug!("No hardener for {key}");
                    continue;
                };

                let topic = &mut section.topics[ti];
                progress.on_topic_start(&key, &topic.description());
                topic.hardener_implemented = true;

                let Some(expected) = topic.expected.value().cloned() else {
                    log::info!("{key}: undefined in this baseline, ignored");
                    topic.status = TopicStatus::Ignored;
                    progress.on_topic_complete(&key, topic);
                    description.ignored_topics.push(key);
                    continue;
                };

                let mut ctx = TopicContext {
                    key: key.clone(),
                    expected,
                    settings: &settings,
                    shell: Shell::new(&mut *guard.transport),
                    poll: self.options.poll,
                };
                process_topic(hardener, topic, &mut ctx);
                topic.outputs.extend(ctx.shell.take_records());

                log::info!("{key}: {}", topic.status.label());
                progress.on_topic_complete(&key, topic);
            }
        }

        drop(guard);
        description.duration = Some(started.elapsed());
        progress.on_run_complete(&description);

        let failure = description.check_failed_topics(only).err();
        if let Some(failure) = &failure {
            log::warn!("{}: {failure}", description.host);
        }
        Ok(CompletedRun {
            description,
            failure,
        })
    }
}

fn process_topic(hardener: &dyn Hardener, topic: &mut Topic, ctx: &mut TopicContext<'_>) {
    let expected = ctx.expected.clone();

    ctx.shell.set_phase(Phase::PreHarden);
    let retrieved = match hardener.check(ctx) {
        Ok(Outcome::Implemented(value)) => value,
        Ok(Outcome::NotImplemented(_)) => return report_only(hardener, topic, ctx),
        Err(err) => return record_error(topic, err, ctx),
    };
    topic.retrieved.clone_from(&retrieved);

    let Some(retrieved) = retrieved else {
        log::warn!("{}: check could not determine a value", ctx.key);
        topic.status = TopicStatus::Indeterminate;
        return;
    };
    if retrieved == expected {
        topic.report = Some(Value::from(CHECKED_ONLY_REPORT));
        topic.status = TopicStatus::CheckedOnly;
        return;
    }

    log::info!(
        "{}: expected {expected}, found {retrieved}, hardening",
        ctx.key
    );
    ctx.shell.set_phase(Phase::Harden);
    let report = match hardener.harden(ctx) {
        Ok(Outcome::Implemented(report)) => report,
        Ok(Outcome::NotImplemented(reason)) => {
            topic.harden_case_not_implemented = Some(reason.unwrap_or_else(|| {
                format!("Harden case not implemented: expected {expected}, found {retrieved}")
            }));
            topic.status = TopicStatus::HardenNotImplemented;
            return;
        }
        Err(err) => return record_error(topic, err, ctx),
    };
    if report.trim().is_empty() {
        log::warn!("{}: harden returned an empty report", ctx.key);
        topic.status = TopicStatus::Indeterminate;
        return;
    }
    topic.report = Some(Value::Str(report));

    ctx.shell.set_phase(Phase::PostHarden);
    match hardener.check(ctx) {
        Ok(Outcome::Implemented(Some(value))) => {
            if value == expected {
                topic.checked_and_hardened = true;
                topic.status = TopicStatus::CheckedAndHardened;
            } else {
                topic.error = Some(format!(
                    "Check failed after harden process: expected {expected} != {value}"
                ));
                topic.status = TopicStatus::HardenFailed;
            }
            topic.retrieved = Some(value);
        }
        Ok(Outcome::Implemented(None)) => {
            log::warn!("{}: check after harden could not determine a value", ctx.key);
            topic.retrieved = None;
            topic.error = Some(format!(
                "Check failed after harden process: expected {expected} != None"
            ));
            topic.status = TopicStatus::HardenFailed;
        }
        Ok(Outcome::NotImplemented(_)) => {
            topic.retrieved = None;
            topic.error = Some(format!(
                "Check failed after harden process: expected {expected}, check not implemented"
            ));
            topic.status = TopicStatus::HardenFailed;
        }
        Err(err) => record_error(topic, err, ctx),
    }
}

fn report_only(hardener: &dyn Hardener, topic: &mut Topic, ctx: &mut TopicContext<'_>) {
    topic.just_report = true;
    match hardener.report(ctx) {
        Ok(Outcome::Implemented(report)) => {
            topic.report = Some(report);
            topic.status = TopicStatus::JustReport;
        }
        Ok(Outcome::NotImplemented(_)) => {
            topic.just_report = false;
            topic.status = TopicStatus::CheckIncomplete;
        }
        Err(err) => record_error(topic, err, ctx),
    }
}

fn record_error(topic: &mut Topic, err: HardenError, ctx: &TopicContext<'_>) {
    match err {
        HardenError::Stop(message) => {
            log::warn!("{}: {message}", ctx.key);
            topic.error = Some(message);
            topic.status = TopicStatus::HardenFailed;
        }
        other => {
            log::error!("{}: {other}", ctx.key);
            let detail = match &other {
                HardenError::Other(err) => format!("{err:?}"),
                _ => other.to_string(),
            };
            topic.unhandled_error = Some(format!(
                "ERROR:\n\n{detail}\n\nOUTPUTS:\n\n{}",
                format_outputs(ctx.shell.records())
            ));
            topic.status = TopicStatus::ErrorUnhandled;
        }
    }
}

fn format_outputs(records: &[CommandRecord]) -> String {
    records
        .iter()
        .map(|r| format!("{}\nSTATUS: {}\n{}", r.command, r.status, r.output))
        .collect::<Vec<_>>()
        .join(OUTPUT_SEPARATOR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::NoProgress;
    use crate::context::testing::ScriptedTransport;
    use crate::description::Baseline;
    use crate::hardener::{HardenResult, done, found, not_implemented};
    use crate::section::{Schema, SectionSchema, SectionValues};
    use crate::value::ValueType;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    fn schema() -> Schema {
        Schema::new()
            .section(
                SectionSchema::new("os_installation", "OS installation")
                    .topic(
                        "selinux_enforced",
                        ValueType::Boolean,
                        "Ensure that SELinux is <|not> in enforcing mode.",
                    )
                    .topic("packages", ValueType::List, "Installed packages"),
            )
            .section(
                SectionSchema::new("securing_services", "Securing services")
                    .topic("max_logins", ValueType::Integer, "Maximum concurrent logins")
                    .topic("ftp_installed", ValueType::Boolean, "FTP <is|is not> installed"),
            )
    }

    fn description() -> Description {
        Baseline::new("node")
            .section(
                "os_installation",
                SectionValues::new()
                    .set("selinux_enforced", true)
                    .set("packages", Value::empty_list()),
            )
            .section(
                "securing_services",
                SectionValues::new()
                    .set("max_logins", 10)
                    .undefined("ftp_installed"),
            )
            .compose(&schema(), "test-host")
            .unwrap()
    }

    fn key(section: &str, topic: &str) -> TopicKey {
        TopicKey::new(section, topic)
    }

    struct SelinuxEnforced;

    impl Hardener for SelinuxEnforced {
        fn key(&self) -> TopicKey {
            key("os_installation", "selinux_enforced")
        }

        fn check(&self, ctx: &mut TopicContext<'_>) -> HardenResult<Option<Value>> {
            let out = ctx.shell.run("getenforce")?;
            found(out.trim() == "Enforcing")
        }

        fn harden(&self, ctx: &mut TopicContext<'_>) -> HardenResult<String> {
            ctx.shell.run("setenforce 1")?;
            done("SELinux set to enforcing mode".to_string())
        }
    }

    struct MaxLogins;

    impl Hardener for MaxLogins {
        fn key(&self) -> TopicKey {
            key("securing_services", "max_logins")
        }

        fn check(&self, ctx: &mut TopicContext<'_>) -> HardenResult<Option<Value>> {
            let out = ctx.shell.run("grep maxlogins /etc/security/limits.conf")?;
            let value = out
                .split_whitespace()
                .last()
                .and_then(|v| v.parse::<i64>().ok());
            Ok(Outcome::Implemented(value.map(Value::from)))
        }

        fn harden(&self, ctx: &mut TopicContext<'_>) -> HardenResult<String> {
            let line = format!("* hard maxlogins {}", ctx.expected);
            ctx.shell
                .insert_line_in_file("/etc/security/limits.conf", &line)?;
            done(format!("Added '{line}'"))
        }
    }

    enum Step {
        Found(Value),
        Undetermined,
        NotImplemented,
        Stop(&'static str),
        Fail(&'static str),
    }

    enum HardenStep {
        Report(&'static str),
        Stop(&'static str),
        Fail(&'static str),
    }

    /// Hardener replaying canned check results
    struct Canned {
        key: TopicKey,
        checks: Mutex<VecDeque<Step>>,
        harden: Option<HardenStep>,
        report: Option<Value>,
    }

    impl Canned {
        fn new(key: TopicKey, checks: Vec<Step>) -> Self {
            Self {
                key,
                checks: Mutex::new(checks.into()),
                harden: None,
                report: None,
            }
        }

        fn harden(self, report: &'static str) -> Self {
            self.harden_with(HardenStep::Report(report))
        }

        fn harden_with(mut self, step: HardenStep) -> Self {
            self.harden = Some(step);
            self
        }

        fn report(mut self, report: Value) -> Self {
            self.report = Some(report);
            self
        }
    }

    impl Hardener for Canned {
        fn key(&self) -> TopicKey {
            self.key.clone()
        }

        fn check(&self, ctx: &mut TopicContext<'_>) -> HardenResult<Option<Value>> {
            ctx.shell.run(&format!("check {}", self.key))?;
            let step = self.checks.lock().unwrap().pop_front();
            match step {
                Some(Step::Found(value)) => found(value),
                Some(Step::Undetermined) => Ok(Outcome::Implemented(None)),
                Some(Step::Stop(msg)) => Err(HardenError::stop(msg)),
                Some(Step::Fail(msg)) => Err(anyhow::anyhow!(msg).into()),
                Some(Step::NotImplemented) | None => not_implemented(),
            }
        }

        fn harden(&self, ctx: &mut TopicContext<'_>) -> HardenResult<String> {
            ctx.shell.run(&format!("harden {}", self.key))?;
            match self.harden {
                Some(HardenStep::Report(report)) => done(report.to_string()),
                Some(HardenStep::Stop(msg)) => Err(HardenError::stop(msg)),
                Some(HardenStep::Fail(msg)) => Err(anyhow::anyhow!(msg).into()),
                None => not_implemented(),
            }
        }

        fn report(&self, _ctx: &mut TopicContext<'_>) -> HardenResult<Value> {
            match &self.report {
                Some(report) => done(report.clone()),
                None => not_implemented(),
            }
        }
    }

    fn registry(hardeners: Vec<Box<dyn Hardener>>) -> HardenerRegistry {
        let mut registry = HardenerRegistry::new();
        for hardener in hardeners {
            registry.register_boxed(hardener).unwrap();
        }
        registry
    }

    fn run_only(
        registry: &HardenerRegistry,
        only: TopicKey,
        transport: &mut ScriptedTransport,
    ) -> CompletedRun {
        let engine = Engine::with_options(
            registry,
            EngineOptions {
                only: Some(only),
                ..EngineOptions::default()
            },
        );
        engine
            .run(description(), transport, &mut NoProgress)
            .unwrap()
    }

    #[test]
    fn test_checked_only() {
        let registry = registry(vec![Box::new(SelinuxEnforced)]);
        let mut transport = ScriptedTransport::default().reply("getenforce", 0, "Enforcing");
        let k = key("os_installation", "selinux_enforced");
        let run = run_only(&registry, k.clone(), &mut transport);

        let topic = run.description.topic(&k).unwrap();
        assert_eq!(topic.status, TopicStatus::CheckedOnly);
        assert_eq!(topic.report, Some(Value::from(CHECKED_ONLY_REPORT)));
        assert_eq!(topic.retrieved, Some(Value::from(true)));
        assert_eq!(transport.issued, ["getenforce"]);
        assert!(run.is_success());
    }

    #[test]
    fn test_selinux_enforced_is_hardened_and_reverified() {
        let registry = registry(vec![Box::new(SelinuxEnforced)]);
        let mut transport = ScriptedTransport::default()
            .reply("getenforce", 0, "Permissive")
            .reply("setenforce 1", 0, "")
            .reply("getenforce", 0, "Enforcing");
        let k = key("os_installation", "selinux_enforced");
        let run = run_only(&registry, k.clone(), &mut transport);

        let topic = run.description.topic(&k).unwrap();
        assert_eq!(topic.status, TopicStatus::CheckedAndHardened);
        assert!(topic.checked_and_hardened);
        assert_eq!(
            topic.report,
            Some(Value::from("SELinux set to enforcing mode"))
        );
        let phases: Vec<_> = topic.outputs.iter().map(|r| r.phase).collect();
        assert_eq!(
            phases,
            [Phase::PreHarden, Phase::Harden, Phase::PostHarden]
        );
        assert_eq!(topic.outputs[0].output, "Permissive");
        assert_eq!(topic.outputs[2].output, "Enforcing");
        assert!(run.is_success());
    }

    #[test]
    fn test_second_run_on_hardened_host_checks_only() {
        let registry = registry(vec![Box::new(SelinuxEnforced)]);
        let k = key("os_installation", "selinux_enforced");

        let mut first = ScriptedTransport::default()
            .reply("getenforce", 0, "Permissive")
            .reply("setenforce 1", 0, "")
            .reply("getenforce", 0, "Enforcing");
        let run = run_only(&registry, k.clone(), &mut first);
        assert_eq!(
            run.description.topic(&k).unwrap().status,
            TopicStatus::CheckedAndHardened
        );

        let mut second = ScriptedTransport::default().reply("getenforce", 0, "Enforcing");
        let run = run_only(&registry, k.clone(), &mut second);
        assert_eq!(
            run.description.topic(&k).unwrap().status,
            TopicStatus::CheckedOnly
        );
        assert!(!second.issued.iter().any(|c| c.starts_with("setenforce")));
    }

    #[test]
    fn test_max_logins_failed_reverification() {
        let registry = registry(vec![Box::new(MaxLogins)]);
        let mut transport = ScriptedTransport::default()
            .reply("grep maxlogins /etc/security/limits.conf", 0, "* hard maxlogins 5")
            .reply("grep maxlogins /etc/security/limits.conf", 0, "* hard maxlogins 5");
        let k = key("securing_services", "max_logins");
        let run = run_only(&registry, k.clone(), &mut transport);

        let topic = run.description.topic(&k).unwrap();
        assert_eq!(topic.status, TopicStatus::HardenFailed);
        assert_eq!(
            topic.error.as_deref(),
            Some("Check failed after harden process: expected 10 != 5")
        );
        assert_eq!(
            transport.issued[1],
            "echo '* hard maxlogins 10' >> '/etc/security/limits.conf'"
        );
        let failure = run.failure.unwrap();
        assert_eq!(failure.failed, [k]);
    }

    #[test]
    fn test_aggregate_failed_and_incomplete() {
        let registry = registry(vec![
            Box::new(Canned::new(
                key("os_installation", "selinux_enforced"),
                vec![Step::Stop("SELinux status could not be read")],
            )),
            Box::new(Canned::new(
                key("os_installation", "packages"),
                vec![Step::NotImplemented],
            )),
            Box::new(Canned::new(
                key("securing_services", "max_logins"),
                vec![Step::Found(Value::from(10))],
            )),
        ]);
        let mut transport = ScriptedTransport::default();
        let run = Engine::new(&registry)
            .run(description(), &mut transport, &mut NoProgress)
            .unwrap();

        let failure = run.failure.unwrap();
        assert_eq!(failure.counts(), (1, 1, 0));
        assert_eq!(failure.failed, [key("os_installation", "selinux_enforced")]);
        assert_eq!(failure.incomplete, [key("os_installation", "packages")]);

        let desc = &run.description;
        let selinux = desc.topic(&key("os_installation", "selinux_enforced")).unwrap();
        assert_eq!(selinux.error.as_deref(), Some("SELinux status could not be read"));
        assert_eq!(
            desc.topic(&key("os_installation", "packages")).unwrap().status,
            TopicStatus::CheckIncomplete
        );
        assert_eq!(
            desc.topic(&key("securing_services", "max_logins")).unwrap().status,
            TopicStatus::CheckedOnly
        );
    }

    #[test]
    fn test_undefined_topic_is_ignored() {
        let registry = registry(vec![Box::new(Canned::new(
            key("securing_services", "ftp_installed"),
            vec![Step::Found(Value::from(false))],
        ))]);
        let mut transport = ScriptedTransport::default();
        let k = key("securing_services", "ftp_installed");
        let run = run_only(&registry, k.clone(), &mut transport);

        let topic = run.description.topic(&k).unwrap();
        assert_eq!(topic.status, TopicStatus::Ignored);
        assert!(topic.hardener_implemented);
        assert_eq!(run.description.ignored_topics, [k]);
        assert!(transport.issued.is_empty());
        assert!(run.is_success());
    }

    #[test]
    fn test_just_report() {
        let registry = registry(vec![Box::new(
            Canned::new(key("os_installation", "packages"), vec![Step::NotImplemented])
                .report(Value::list(["bash", "openssh"])),
        )]);
        let mut transport = ScriptedTransport::default();
        let k = key("os_installation", "packages");
        let run = run_only(&registry, k.clone(), &mut transport);

        let topic = run.description.topic(&k).unwrap();
        assert_eq!(topic.status, TopicStatus::JustReport);
        assert!(topic.just_report);
        assert!(run.is_success());
    }

    #[test]
    fn test_unhandled_error_keeps_outputs() {
        let registry = registry(vec![Box::new(Canned::new(
            key("securing_services", "max_logins"),
            vec![Step::Fail("limits.conf is not parseable")],
        ))]);
        let mut transport =
            ScriptedTransport::default().reply("check securing_services.max_logins", 0, "garbage");
        let k = key("securing_services", "max_logins");
        let run = run_only(&registry, k.clone(), &mut transport);

        let topic = run.description.topic(&k).unwrap();
        assert_eq!(topic.status, TopicStatus::ErrorUnhandled);
        let unhandled = topic.unhandled_error.as_deref().unwrap();
        assert!(unhandled.contains("limits.conf is not parseable"));
        assert!(unhandled.contains("check securing_services.max_logins\nSTATUS: 0\ngarbage"));
        assert_eq!(run.failure.unwrap().failed, [k]);
    }

    #[test]
    fn test_command_failure_is_unhandled() {
        let registry = registry(vec![Box::new(SelinuxEnforced)]);
        let mut transport =
            ScriptedTransport::default().reply("getenforce", 127, "getenforce: not found");
        let k = key("os_installation", "selinux_enforced");
        let run = run_only(&registry, k.clone(), &mut transport);

        let topic = run.description.topic(&k).unwrap();
        assert_eq!(topic.status, TopicStatus::ErrorUnhandled);
        assert!(
            topic
                .unhandled_error
                .as_deref()
                .unwrap()
                .contains("cmd: getenforce, status code: 127")
        );
    }

    #[test]
    fn test_harden_not_implemented() {
        let registry = registry(vec![Box::new(Canned::new(
            key("securing_services", "max_logins"),
            vec![Step::Found(Value::from(5))],
        ))]);
        let mut transport = ScriptedTransport::default();
        let k = key("securing_services", "max_logins");
        let run = run_only(&registry, k.clone(), &mut transport);

        let topic = run.description.topic(&k).unwrap();
        assert_eq!(topic.status, TopicStatus::HardenNotImplemented);
        assert_eq!(
            topic.harden_case_not_implemented.as_deref(),
            Some("Harden case not implemented: expected 10, found 5")
        );
        assert_eq!(run.failure.unwrap().incomplete, [k]);
    }

    #[test]
    fn test_empty_harden_report_is_indeterminate() {
        let registry = registry(vec![Box::new(
            Canned::new(
                key("securing_services", "max_logins"),
                vec![Step::Found(Value::from(5)), Step::Found(Value::from(10))],
            )
            .harden("  "),
        )]);
        let mut transport = ScriptedTransport::default();
        let k = key("securing_services", "max_logins");
        let run = run_only(&registry, k.clone(), &mut transport);

        let topic = run.description.topic(&k).unwrap();
        assert_eq!(topic.status, TopicStatus::Indeterminate);
        assert_eq!(run.failure.unwrap().incomplete, [k]);
    }

    #[test]
    fn test_undetermined_recheck_fails_harden() {
        let registry = registry(vec![Box::new(
            Canned::new(
                key("securing_services", "max_logins"),
                vec![Step::Found(Value::from(5)), Step::Undetermined],
            )
            .harden("set maxlogins"),
        )]);
        let mut transport = ScriptedTransport::default();
        let k = key("securing_services", "max_logins");
        let run = run_only(&registry, k.clone(), &mut transport);

        let topic = run.description.topic(&k).unwrap();
        assert_eq!(topic.status, TopicStatus::HardenFailed);
        assert_eq!(topic.retrieved, None);
        assert!(!topic.checked_and_hardened);
        assert_eq!(
            topic.error.as_deref(),
            Some("Check failed after harden process: expected 10 != None")
        );
        assert_eq!(run.failure.unwrap().failed, [k]);
    }

    #[test]
    fn test_recheck_not_implemented_fails_harden() {
        let registry = registry(vec![Box::new(
            Canned::new(
                key("securing_services", "max_logins"),
                vec![Step::Found(Value::from(5)), Step::NotImplemented],
            )
            .harden("set maxlogins"),
        )]);
        let mut transport = ScriptedTransport::default();
        let k = key("securing_services", "max_logins");
        let run = run_only(&registry, k.clone(), &mut transport);

        let topic = run.description.topic(&k).unwrap();
        assert_eq!(topic.status, TopicStatus::HardenFailed);
        assert!(!topic.checked_and_hardened);
        assert!(
            topic
                .error
                .as_deref()
                .unwrap()
                .contains("check not implemented")
        );
        let failure = run.failure.unwrap();
        assert_eq!(failure.failed, [k]);
        assert!(failure.incomplete.is_empty());
    }

    #[test]
    fn test_harden_stop_fails_topic() {
        let registry = registry(vec![Box::new(
            Canned::new(
                key("securing_services", "max_logins"),
                vec![Step::Found(Value::from(5))],
            )
            .harden_with(HardenStep::Stop("limits.conf is read-only")),
        )]);
        let mut transport = ScriptedTransport::default();
        let k = key("securing_services", "max_logins");
        let run = run_only(&registry, k.clone(), &mut transport);

        let topic = run.description.topic(&k).unwrap();
        assert_eq!(topic.status, TopicStatus::HardenFailed);
        assert_eq!(topic.error.as_deref(), Some("limits.conf is read-only"));
        assert!(topic.unhandled_error.is_none());
        assert!(topic.report.is_none());
        assert_eq!(run.failure.unwrap().failed, [k]);
    }

    #[test]
    fn test_harden_unexpected_error_keeps_check_history() {
        let registry = registry(vec![Box::new(
            Canned::new(
                key("securing_services", "max_logins"),
                vec![Step::Found(Value::from(5))],
            )
            .harden_with(HardenStep::Fail("sed exploded")),
        )]);
        let mut transport = ScriptedTransport::default()
            .reply("check securing_services.max_logins", 0, "maxlogins 5")
            .reply("harden securing_services.max_logins", 0, "partial");
        let k = key("securing_services", "max_logins");
        let run = run_only(&registry, k.clone(), &mut transport);

        let topic = run.description.topic(&k).unwrap();
        assert_eq!(topic.status, TopicStatus::ErrorUnhandled);
        assert!(topic.error.is_none());
        let unhandled = topic.unhandled_error.as_deref().unwrap();
        assert!(unhandled.contains("sed exploded"));
        assert!(unhandled.contains("check securing_services.max_logins\nSTATUS: 0\nmaxlogins 5"));
        assert!(unhandled.contains("harden securing_services.max_logins\nSTATUS: 0\npartial"));
        assert_eq!(run.failure.unwrap().failed, [k]);
    }

    #[test]
    fn test_missing_hardeners_are_reported() {
        let registry = registry(vec![Box::new(SelinuxEnforced)]);
        let mut transport = ScriptedTransport::default().reply("getenforce", 0, "Enforcing");
        let run = Engine::new(&registry)
            .run(description(), &mut transport, &mut NoProgress)
            .unwrap();

        let failure = run.failure.unwrap();
        assert_eq!(
            failure.hardener_missing,
            [
                key("os_installation", "packages"),
                key("securing_services", "max_logins")
            ]
        );
        assert!(failure.failed.is_empty());
    }

    #[test]
    fn test_session_is_closed_after_run() {
        let registry = registry(vec![Box::new(SelinuxEnforced)]);
        let mut transport = ScriptedTransport::default();
        Engine::new(&registry)
            .run(description(), &mut transport, &mut NoProgress)
            .unwrap();
        assert_eq!(transport.closed, 1);
        assert!(!transport.connected);
    }

    #[test]
    fn test_connect_failure_aborts_run() {
        let registry = registry(vec![Box::new(SelinuxEnforced)]);
        let mut transport = ScriptedTransport {
            fail_connect: true,
            ..ScriptedTransport::default()
        };
        let err = Engine::new(&registry)
            .run(description(), &mut transport, &mut NoProgress)
            .unwrap_err();
        assert!(matches!(err, EngineError::Connect { ref host, .. } if host == "test-host"));
        assert!(transport.issued.is_empty());
    }

    #[test]
    fn test_unknown_selector_is_rejected() {
        let registry = HardenerRegistry::new();
        let engine = Engine::with_options(
            &registry,
            EngineOptions {
                only: Some(key("login_control", "idle_timeout")),
                ..EngineOptions::default()
            },
        );
        let mut transport = ScriptedTransport::default();
        let err = engine
            .run(description(), &mut transport, &mut NoProgress)
            .unwrap_err();
        assert!(matches!(err, EngineError::UnknownTopic(_)));
        assert_eq!(transport.closed, 0);
    }
}
