use super::{Alert, Markup};
use hardening::TopicStatus;

/// Plain text reports
pub struct Text;

impl Markup for Text {
    fn escape(&self, text: &str) -> String {
        text.to_string()
    }

    fn heading(&self, level: u8, _anchor: &str, text: &str) -> String {
        let marks = "#".repeat(4usize.saturating_sub(level.into()).max(1));
        format!("\n{marks} {text}\n")
    }

    fn link(&self, _anchor: &str, text: &str) -> String {
        text.to_string()
    }

    fn field(&self, key: &str, text: &str) -> String {
        format!("{key}: {text}")
    }

    fn strong(&self, text: &str) -> String {
        format!("*{text}*")
    }

    fn block(&self, content: &str) -> String {
        content.to_string()
    }

    fn list(&self, items: &[String]) -> String {
        items
            .iter()
            .map(|item| {
                let mut lines = item.lines();
                let first = lines.next().unwrap_or_default();
                let mut out = format!(" - {first}");
                for line in lines {
                    out.push_str("\n   ");
                    out.push_str(line);
                }
                out
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn pre(&self, text: &str) -> String {
        text.to_string()
    }

    fn alert(&self, alert: Alert, text: &str) -> String {
        match alert {
            Alert::Error => format!("!!! {text} !!!"),
            Alert::Warning => format!("! {text} !"),
        }
    }

    fn status(&self, status: TopicStatus) -> String {
        format!("[{}]", status.label())
    }

    fn rule(&self) -> String {
        "#".repeat(80)
    }

    fn document(&self, title: &str, body: &str) -> String {
        format!("{title}\n{}\n{body}\n", "=".repeat(title.chars().count()))
    }
}
