use super::{Alert, Markup};
use hardening::TopicStatus;

const STYLE: &str = r"
body { font-family: Helvetica, Arial, sans-serif; margin: 2em; color: #222; }
h1 { border-bottom: 1px solid #ccc; padding-bottom: .2em; }
a.anchor { color: inherit; text-decoration: none; }
pre { background: #f5f5f5; padding: .6em; overflow-x: auto; max-height: 30em; }
.error { background: #fdecea; color: #a12622; padding: .6em; margin: .6em 0; font-weight: bold; }
.warning { background: #fff4e5; color: #8a5300; padding: .6em; margin: .6em 0; }
.banner { font-size: 1.4em; text-align: center; }
.status { font-family: monospace; padding: 0 .3em; }
.ok { color: #1e7b34; }
.failed { color: #a12622; }
.incomplete { color: #b36b00; }
.ignored { color: #888; }
";

/// Self-contained HTML reports
pub struct Html;

impl Markup for Html {
    fn escape(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        for c in text.chars() {
            match c {
                '&' => out.push_str("&amp;"),
                '<' => out.push_str("&lt;"),
                '>' => out.push_str("&gt;"),
                '"' => out.push_str("&quot;"),
                '\'' => out.push_str("&#39;"),
                c => out.push(c),
            }
        }
        out
    }

    fn heading(&self, level: u8, anchor: &str, text: &str) -> String {
        let level = level.clamp(1, 6);
        if anchor.is_empty() {
            format!("<h{level}>{}</h{level}>", self.escape(text))
        } else {
            format!(
                "<h{level} id=\"{}\"><a class=\"anchor\" href=\"#{0}\">{}</a></h{level}>",
                self.escape(anchor),
                self.escape(text)
            )
        }
    }

    fn link(&self, anchor: &str, text: &str) -> String {
        format!(
            "<a href=\"#{}\">{}</a>",
            self.escape(anchor),
            self.escape(text)
        )
    }

    fn field(&self, key: &str, text: &str) -> String {
        format!(
            "<div><strong>{}:</strong> <span>{}</span></div>",
            self.escape(key),
            self.escape(text)
        )
    }

    fn strong(&self, text: &str) -> String {
        format!("<strong>{}</strong>", self.escape(text))
    }

    fn block(&self, content: &str) -> String {
        format!("<div>{content}</div>")
    }

    fn list(&self, items: &[String]) -> String {
        let items: String = items.iter().map(|i| format!("<li>{i}</li>")).collect();
        format!("<ul>{items}</ul>")
    }

    fn pre(&self, text: &str) -> String {
        format!("<pre>{}</pre>", self.escape(text))
    }

    fn alert(&self, alert: Alert, text: &str) -> String {
        let class = match alert {
            Alert::Error if text.starts_with("FAILED") => "error banner",
            Alert::Error => "error",
            Alert::Warning => "warning",
        };
        format!("<div class=\"{class}\">{}</div>", self.escape(text))
    }

    fn status(&self, status: TopicStatus) -> String {
        let class = match status {
            s if s.is_success() => "ok",
            TopicStatus::Ignored | TopicStatus::Pending => "ignored",
            TopicStatus::CheckIncomplete | TopicStatus::Indeterminate => "incomplete",
            _ => "failed",
        };
        format!(
            "<span class=\"status {class}\">[{}]</span>",
            self.escape(status.label())
        )
    }

    fn rule(&self) -> String {
        "<hr>".to_string()
    }

    fn document(&self, title: &str, body: &str) -> String {
        let title = self.escape(title);
        format!(
            "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{title}</title>\n<style>{STYLE}</style>\n</head>\n<body>\n<h1>{title}</h1>\n{body}\n</body>\n</html>\n"
        )
    }
}
