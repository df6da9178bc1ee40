//! Run reports
//!
//! Text and HTML reports share one layout, built against the [`Markup`]
//! trait. JSON reports serialize the description directly.

mod html;
mod json;
mod text;

use crate::cli::ReportFormat;
use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use hardening::{Description, Phase, RunFailure, Section, Topic, TopicStatus, Value};
use std::fs;
use std::path::{Path, PathBuf};

const FILE_TIMESTAMP: &str = "%Y-%m-%dT%H-%M-%S";
const SHOWN_TIMESTAMP: &str = "%Y-%m-%d %H:%M";
const INDEX_ANCHOR: &str = "__index";

/// Severity of a highlighted message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alert {
    Error,
    Warning,
}

/// Output primitives of a report format
///
/// Methods taking `text` escape it. Methods taking `content` expect markup
/// produced by this same implementation.
pub trait Markup {
    fn escape(&self, text: &str) -> String;
    fn heading(&self, level: u8, anchor: &str, text: &str) -> String;
    fn link(&self, anchor: &str, text: &str) -> String;
    fn field(&self, key: &str, text: &str) -> String;
    fn strong(&self, text: &str) -> String;
    fn block(&self, content: &str) -> String;
    fn list(&self, items: &[String]) -> String;
    fn pre(&self, text: &str) -> String;
    fn alert(&self, alert: Alert, text: &str) -> String;
    fn status(&self, status: TopicStatus) -> String;
    fn rule(&self) -> String;
    fn document(&self, title: &str, body: &str) -> String;
}

/// Render a report in the given format
pub fn render(
    format: ReportFormat,
    description: &Description,
    failure: Option<&RunFailure>,
    generated_at: DateTime<Local>,
) -> Result<String> {
    match format {
        ReportFormat::Text => Ok(build(&text::Text, description, failure, generated_at)),
        ReportFormat::Html => Ok(build(&html::Html, description, failure, generated_at)),
        ReportFormat::Json => json::render(description, failure, generated_at),
    }
}

/// `report_for_<baseline>_description_<host>_<timestamp>.<ext>`
pub fn default_file_name(
    description: &Description,
    format: ReportFormat,
    generated_at: DateTime<Local>,
) -> String {
    format!(
        "report_for_{}_description_{}_{}.{}",
        description.name,
        description.host,
        generated_at.format(FILE_TIMESTAMP),
        format.extension()
    )
}

/// Resolve where a host's report goes
///
/// An explicit path is used as is for a single host. With several hosts the
/// host name is appended to its stem so reports do not overwrite each other.
pub fn report_path(
    explicit: Option<&Path>,
    dir: Option<&Path>,
    description: &Description,
    format: ReportFormat,
    several_hosts: bool,
    generated_at: DateTime<Local>,
) -> PathBuf {
    match explicit {
        Some(path) if !several_hosts => path.to_path_buf(),
        Some(path) => {
            let stem = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "report".to_string());
            let ext = path
                .extension()
                .map(|e| e.to_string_lossy().into_owned())
                .unwrap_or_else(|| format.extension().to_string());
            path.with_file_name(format!("{stem}_{}.{ext}", description.host))
        }
        None => {
            let name = default_file_name(description, format, generated_at);
            dir.map_or_else(|| PathBuf::from(&name), |d| d.join(&name))
        }
    }
}

/// Write a report file, creating its directory if needed
pub fn write(path: &Path, content: impl AsRef<[u8]>) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("Could not create {}", parent.display()))?;
    }
    fs::write(path, content).with_context(|| format!("Could not write {}", path.display()))
}

// ============================================================================
// Layout
// ============================================================================

fn build(
    m: &dyn Markup,
    description: &Description,
    failure: Option<&RunFailure>,
    generated_at: DateTime<Local>,
) -> String {
    let mut lines = Vec::new();

    if let Some(failure) = failure {
        lines.push(m.alert(Alert::Error, &format!("FAILED: {failure}")));
        if !failure.incomplete.is_empty() {
            lines.push(m.alert(Alert::Warning, "Hardening incomplete"));
        }
    }
    lines.push(m.field("Baseline description used", &description.name));
    lines.push(m.field("Host", &description.host));
    lines.push(m.field(
        "Executed at",
        &generated_at.format(SHOWN_TIMESTAMP).to_string(),
    ));
    if let Some(duration) = description.duration {
        lines.push(m.field("Duration", &format!("{:.1}s", duration.as_secs_f64())));
    }

    lines.push(m.heading(1, INDEX_ANCHOR, "INDEX"));
    let mut index = Vec::new();
    for section in reported_sections(description) {
        let entries: Vec<String> = section
            .topics
            .iter()
            .map(|topic| {
                format!(
                    "{} {}",
                    m.status(topic.status),
                    m.link(&anchor(&section.name, &topic.name), &index_title(topic))
                )
            })
            .collect();
        index.push(format!(
            "{}\n{}",
            m.link(&section.name, &section.title),
            m.list(&entries)
        ));
    }
    lines.push(m.list(&index));
    lines.push(m.rule());

    if !description.ignored_topics.is_empty() {
        lines.push(m.heading(2, "__ignored", "IGNORED TOPICS"));
        let ignored: Vec<String> = description
            .ignored_topics
            .iter()
            .map(|key| m.escape(&key.to_string()))
            .collect();
        lines.push(m.list(&ignored));
        lines.push(m.rule());
    }

    for section in reported_sections(description) {
        lines.push(m.heading(1, &section.name, &section.title));
        lines.push(m.block(&m.escape(&section.doc)));
        for topic in &section.topics {
            lines.extend(topic_lines(m, &section.name, topic));
        }
    }

    let title = format!("Hardening Report for {}", description.host);
    m.document(&title, &lines.join("\n"))
}

/// Sections with at least one defined topic
fn reported_sections(description: &Description) -> impl Iterator<Item = &Section> {
    description
        .sections
        .iter()
        .filter(|s| s.topics.iter().any(Topic::is_defined))
}

fn topic_lines(m: &dyn Markup, section: &str, topic: &Topic) -> Vec<String> {
    let mut lines = vec![
        m.heading(2, &anchor(section, &topic.name), &title_case(&topic.name)),
        m.block(&m.escape(&topic.description())),
        m.field("Status", topic.status.label()),
    ];

    if !topic.just_report {
        if let Some(expected) = topic.expected.value() {
            lines.push(m.field("Expected", &expected.to_string()));
            match &topic.retrieved {
                Some(retrieved) if retrieved != expected => {
                    lines.push(m.field("Retrieved", &retrieved.to_string()));
                }
                None if topic.status.is_terminal() && topic.status != TopicStatus::Ignored => {
                    lines.push(m.field("Retrieved", "undetermined"));
                }
                _ => {}
            }
        }
    }

    if let Some(report) = topic.report.as_ref().filter(|r| !r.is_empty()) {
        lines.push(m.heading(3, "", "Summary results"));
        if topic.just_report {
            lines.push(m.block(&m.strong("This topic is just a report.")));
        } else if topic.checked_and_hardened {
            lines.push(m.block(&m.strong("It was checked and hardened.")));
        }
        lines.push(value(m, report));
    }

    for phase in [Phase::PreHarden, Phase::Harden, Phase::PostHarden] {
        let records: Vec<_> = topic.outputs_for(phase).collect();
        if records.is_empty() {
            continue;
        }
        lines.push(m.block(&m.escape(&format!(
            "Commands executed during the {} process:",
            phase.label().to_lowercase()
        ))));
        for record in records {
            lines.push(m.block(&m.escape(&format!("$ {}", record.command))));
            lines.push(m.pre(&format!(
                "STATUS CODE: {}\n{}\n\n{}",
                record.status,
                "-".repeat(80),
                record.output
            )));
        }
    }

    if let Some(error) = &topic.error {
        lines.push(m.alert(Alert::Error, &format!("Hardening failed: {error}")));
    }
    if let Some(error) = &topic.unhandled_error {
        lines.push(m.alert(Alert::Error, "Unexpected error"));
        lines.push(m.pre(error));
    }
    if let Some(reason) = &topic.harden_case_not_implemented {
        lines.push(m.alert(Alert::Warning, reason));
    }
    if topic.status == TopicStatus::CheckIncomplete {
        lines.push(m.alert(Alert::Warning, "Check is not implemented for this topic"));
    } else if topic.status == TopicStatus::Indeterminate {
        lines.push(m.alert(Alert::Warning, "The value could not be determined"));
    } else if topic.is_defined() && !topic.hardener_implemented {
        lines.push(m.alert(Alert::Warning, "No hardener is implemented for this topic"));
    }
    lines.push(m.link(INDEX_ANCHOR, "^ index"));
    lines
}

/// Render a report value: collections as nested lists, scalars inline
fn value(m: &dyn Markup, value: &Value) -> String {
    match value {
        Value::List(items) => {
            let items: Vec<String> = items.iter().map(|item| entry(m, None, item)).collect();
            m.list(&items)
        }
        Value::Map(entries) => {
            let items: Vec<String> = entries
                .iter()
                .map(|(key, item)| entry(m, Some(key.as_str()), item))
                .collect();
            m.list(&items)
        }
        Value::Str(s) if s.contains('\n') => m.pre(s),
        scalar => m.block(&m.escape(&plain(scalar))),
    }
}

fn entry(m: &dyn Markup, key: Option<&str>, item: &Value) -> String {
    let prefix = key.map(|k| m.strong(&format!("{k}:"))).unwrap_or_default();
    match item {
        Value::List(_) | Value::Map(_) => format!("{prefix}\n{}", value(m, item)),
        Value::Str(s) if s.contains('\n') => format!("{prefix}\n{}", m.pre(s)),
        scalar if prefix.is_empty() => m.escape(&plain(scalar)),
        scalar => format!("{prefix} {}", m.escape(&plain(scalar))),
    }
}

/// A scalar without the quotes `Display` puts around strings
fn plain(value: &Value) -> String {
    match value {
        Value::Str(s) => s.clone(),
        other => other.to_string(),
    }
}

fn index_title(topic: &Topic) -> String {
    match topic.expected.value() {
        Some(expected) if !topic.just_report => {
            format!("{}: {expected}", title_case(&topic.name))
        }
        _ => title_case(&topic.name),
    }
}

fn anchor(section: &str, topic: &str) -> String {
    format!("{section}.{topic}")
}

fn title_case(name: &str) -> String {
    name.split('_')
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_uppercase().chain(chars).collect()
            })
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::TimeZone;
    use hardening::{
        Baseline, CommandRecord, Schema, SectionSchema, SectionValues, TopicKey, ValueType,
    };
    use std::time::Duration;

    pub(crate) fn generated_at() -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 3, 14, 9, 26, 53).unwrap()
    }

    /// A finished run with one hardened, one failed, one reported and one
    /// ignored topic
    pub(crate) fn finished_run() -> (Description, RunFailure) {
        let schema = Schema::new().section(
            SectionSchema::new("login_control", "Password and login control.")
                .topic("idle_timeout", ValueType::Integer, "Session idle timeout.")
                .topic("password_age", ValueType::Integer, "Password age <tag>.")
                .topic("banner", ValueType::List, "Report of <b>banners</b>.")
                .topic("root_login", ValueType::Boolean, "Root login <|not> allowed."),
        );
        let mut description = Baseline::new("node")
            .section(
                "login_control",
                SectionValues::new()
                    .set("idle_timeout", 300)
                    .set("password_age", 60)
                    .set("banner", Value::empty_list())
                    .undefined("root_login"),
            )
            .compose(&schema, "10.0.0.5")
            .unwrap();
        description.duration = Some(Duration::from_millis(4500));

        let section = &mut description.sections[0];
        let idle = &mut section.topics[0];
        idle.hardener_implemented = true;
        idle.retrieved = Some(Value::Int(300));
        idle.report = Some(Value::from("TMOUT changed from 0 to 300"));
        idle.checked_and_hardened = true;
        idle.status = TopicStatus::CheckedAndHardened;
        idle.outputs = vec![
            CommandRecord {
                phase: Phase::PreHarden,
                command: "cat /etc/profile.d/os-security.sh".into(),
                status: 0,
                output: "TMOUT=0".into(),
            },
            CommandRecord {
                phase: Phase::Harden,
                command: "sed -i 's/TMOUT=0/TMOUT=300/g' f".into(),
                status: 0,
                output: String::new(),
            },
        ];

        let age = &mut section.topics[1];
        age.hardener_implemented = true;
        age.retrieved = Some(Value::Int(99999));
        age.error = Some("Check failed after harden process: expected 60 != 99999".into());
        age.status = TopicStatus::HardenFailed;

        let banner = &mut section.topics[2];
        banner.hardener_implemented = true;
        banner.just_report = true;
        banner.report = Some(Value::map([(
            "Banners",
            Value::list(["<welcome>", "authorised use only"]),
        )]));
        banner.status = TopicStatus::JustReport;

        section.topics[3].hardener_implemented = true;
        section.topics[3].status = TopicStatus::Ignored;
        description
            .ignored_topics
            .push(TopicKey::new("login_control", "root_login"));

        let failure = description.check_failed_topics(None).unwrap_err();
        (description, failure)
    }

    #[test]
    fn test_default_file_name() {
        let (description, _) = finished_run();
        assert_eq!(
            default_file_name(&description, ReportFormat::Html, generated_at()),
            "report_for_node_description_10.0.0.5_2026-03-14T09-26-53.html"
        );
    }

    #[test]
    fn test_report_path_for_several_hosts() {
        let (description, _) = finished_run();
        let explicit = Path::new("/tmp/out/run.html");
        assert_eq!(
            report_path(Some(explicit), None, &description, ReportFormat::Html, false, generated_at()),
            PathBuf::from("/tmp/out/run.html")
        );
        assert_eq!(
            report_path(Some(explicit), None, &description, ReportFormat::Html, true, generated_at()),
            PathBuf::from("/tmp/out/run_10.0.0.5.html")
        );
        let dir = Path::new("/reports");
        assert_eq!(
            report_path(None, Some(dir), &description, ReportFormat::Text, true, generated_at()),
            PathBuf::from("/reports/report_for_node_description_10.0.0.5_2026-03-14T09-26-53.txt")
        );
    }

    #[test]
    fn test_write_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports").join("r.txt");
        write(&path, "content").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "content");
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("idle_timeout"), "Idle Timeout");
        assert_eq!(title_case("x"), "X");
    }

    #[test]
    fn test_plain_scalar() {
        assert_eq!(plain(&Value::from("a b")), "a b");
        assert_eq!(plain(&Value::tuple([5, 900])), "(5, 900)");
    }
}
