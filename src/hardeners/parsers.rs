//! Parsers for the output of remote commands

use anyhow::{Context, Result, bail};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

static IPV4: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9]+(?:\.[0-9]+){3}").expect("valid ipv4 regex"));

static SERVICE_RUNNING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([\w\-.]+)\s+.*is running\.\.\.$").expect("valid running regex")
});

static SERVICE_STOPPED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([\w\-.]+)\s+.*is stopped$").expect("valid stopped regex"));

static CRONTAB_USER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^__([\w\-.]+)$").expect("valid user regex"));

static NO_CRONTAB: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^no\scrontab\sfor\s[\w\-.]+").expect("valid crontab regex"));

static PLAN_COUNTS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"Tasks:\s+(\d+)\s+\|\s+Initial:\s+(\d+)\s+\|\s+Running:\s+(\d+)\s+\|\s+Success:\s+(\d+)\s+\|\s+Failed:\s+(\d+)\s+\|\s+Stopped:\s+(\d+)",
    )
    .expect("valid plan summary regex")
});

const INHERITED_MARKER: &str = "[*]";
const PROPERTIES_HEADER_SUFFIX: &str = " (inherited properties are marked with asterisk)";

/// `key: value` lines, e.g. the output of `sestatus` or `chage -l`
pub fn properties(output: &str) -> BTreeMap<String, String> {
    output
        .lines()
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect()
}

/// Address of the peer `ntpq -p` marks as selected (`*`)
pub fn ntp_peer(output: &str) -> Option<String> {
    output
        .lines()
        .find(|line| line.starts_with('*'))
        .and_then(|line| IPV4.find(line))
        .map(|m| m.as_str().to_string())
}

/// Login names of regular users in an `/etc/passwd` listing
pub fn real_users(passwd: &str) -> Vec<String> {
    passwd
        .lines()
        .filter_map(|line| {
            let fields: Vec<&str> = line.split(':').collect();
            if fields.len() != 7 {
                return None;
            }
            let uid: u32 = fields[2].parse().ok()?;
            (uid > 499 && fields[0] != "nfsnobody").then(|| fields[0].to_string())
        })
        .collect()
}

/// First column as key, remaining columns appended to its list
pub fn key_values(output: &str) -> BTreeMap<String, Vec<String>> {
    let mut data: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for line in output.lines() {
        let mut columns = line.split_whitespace();
        let Some(key) = columns.next() else {
            continue;
        };
        data.entry(key.to_string())
            .or_default()
            .extend(columns.map(str::to_string));
    }
    data
}

/// Sum the second column per first column, largest first
///
/// Used for `ps -eo fname,%mem` where a process name appears once per pid.
pub fn summed_columns(output: &str) -> Result<Vec<(String, f64)>> {
    let mut sums: BTreeMap<String, f64> = BTreeMap::new();
    for line in output.lines() {
        let mut columns = line.split_whitespace();
        let (Some(key), Some(value)) = (columns.next(), columns.next()) else {
            continue;
        };
        let value: f64 = value
            .parse()
            .with_context(|| format!("invalid number '{value}' for {key}"))?;
        *sums.entry(key.to_string()).or_default() += value;
    }
    let mut sorted: Vec<_> = sums.into_iter().collect();
    sorted.sort_by(|a, b| b.1.total_cmp(&a.1));
    Ok(sorted)
}

/// `service --status-all`: service name to running
pub fn service_statuses(output: &str) -> BTreeMap<String, bool> {
    let mut data = BTreeMap::new();
    for line in output.lines() {
        if let Some(caps) = SERVICE_RUNNING.captures(line) {
            data.insert(caps[1].to_string(), true);
        } else if let Some(caps) = SERVICE_STOPPED.captures(line) {
            data.insert(caps[1].to_string(), false);
        }
    }
    data
}

/// An `ip:port` pair as printed by netstat
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    pub ip: String,
    pub port: String,
}

impl Address {
    fn parse(address: &str) -> Self {
        match address.rsplit_once(':') {
            Some((ip, port)) => Self {
                ip: ip.to_string(),
                port: port.to_string(),
            },
            None => Self {
                ip: String::new(),
                port: address.to_string(),
            },
        }
    }
}

/// One listening socket from `netstat -tulpn`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Socket {
    pub proto: String,
    pub recv_q: String,
    pub send_q: String,
    pub local: Address,
    pub foreign: Address,
    /// UDP sockets have none
    pub state: Option<String>,
    pub pid: String,
}

/// `netstat -tulpn`: sockets grouped by program name
///
/// Sockets without a known owner (`-`) are grouped under the empty name.
pub fn netstat(output: &str) -> Result<BTreeMap<String, Vec<Socket>>> {
    let mut data: BTreeMap<String, Vec<Socket>> = BTreeMap::new();
    let mut header_seen = false;
    for line in output.lines() {
        let cells: Vec<&str> = line.split_whitespace().collect();
        if !header_seen {
            header_seen = cells.first() == Some(&"Proto");
            continue;
        }
        if cells.len() < 6 {
            continue;
        }
        let (state, owner) = if cells.len() >= 7 {
            (Some(cells[5].to_string()), cells[6..].join(" "))
        } else {
            (None, cells[5].to_string())
        };
        let (pid, name) = match owner.split_once('/') {
            Some((pid, name)) => (pid.to_string(), name.to_string()),
            None if owner == "-" => (String::new(), String::new()),
            None => bail!("unexpected netstat program column: {owner}"),
        };
        data.entry(name).or_default().push(Socket {
            proto: cells[0].to_string(),
            recv_q: cells[1].to_string(),
            send_q: cells[2].to_string(),
            local: Address::parse(cells[3]),
            foreign: Address::parse(cells[4]),
            state,
            pid,
        });
    }
    Ok(data)
}

/// Jobs per user from a loop printing `__<user>` before `crontab -u <user> -l`
pub fn crontab_per_user(output: &str) -> BTreeMap<String, Vec<String>> {
    let mut data: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut user: Option<String> = None;
    for line in output.lines().filter(|l| !l.trim().is_empty()) {
        if let Some(caps) = CRONTAB_USER.captures(line) {
            user = Some(caps[1].to_string());
            continue;
        }
        if NO_CRONTAB.is_match(line) {
            continue;
        }
        if let Some(user) = &user {
            data.entry(user.clone()).or_default().push(line.to_string());
        }
    }
    data
}

/// A property of a LITP model item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    pub value: String,
    /// Marked `[*]`: inherited from the source item
    pub inherited: bool,
}

/// A LITP model item as printed by `litp show -p <path>`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelItem {
    pub vpath: String,
    /// Top level fields such as `type` and `state`
    pub fields: BTreeMap<String, String>,
    pub properties: BTreeMap<String, Property>,
    /// Child paths relative to `vpath`, with their leading `/`
    pub children: Vec<String>,
}

impl ModelItem {
    pub fn item_type(&self) -> Option<&str> {
        self.fields.get("type").map(String::as_str)
    }

    pub fn state(&self) -> Option<&str> {
        self.fields.get("state").map(String::as_str)
    }

    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(|p| p.value.as_str())
    }

    /// Child names without the leading `/`
    pub fn child_names(&self) -> impl Iterator<Item = &str> {
        self.children.iter().map(|c| c.trim_matches('/'))
    }
}

enum Block {
    Fields,
    Properties,
    Children,
    Ignored,
}

/// Parse one `litp show -p` item
pub fn model_item(output: &str) -> Result<ModelItem> {
    let mut lines = output.lines().filter(|l| !l.trim().is_empty());
    let Some(vpath) = lines.next() else {
        bail!("empty LITP model item");
    };
    let mut item = ModelItem {
        vpath: vpath.trim().to_string(),
        ..Default::default()
    };

    let mut block = Block::Fields;
    for line in lines {
        if matches!(block, Block::Children) {
            item.children.push(line.trim().to_string());
            continue;
        }
        let Some((key, value)) = line.split_once(':') else {
            bail!("unexpected line in LITP model item {}: {line}", item.vpath);
        };
        let key = key.trim().trim_end_matches(PROPERTIES_HEADER_SUFFIX);
        let value = value.trim();
        if value.is_empty() {
            block = match key {
                "children" => Block::Children,
                "properties" => Block::Properties,
                _ => Block::Ignored,
            };
            continue;
        }
        match block {
            Block::Fields => {
                item.fields.insert(key.to_string(), value.to_string());
            }
            Block::Properties => {
                let property = match value.split_once(INHERITED_MARKER) {
                    Some((v, _)) => Property {
                        value: v.trim().to_string(),
                        inherited: true,
                    },
                    None => Property {
                        value: value.to_string(),
                        inherited: false,
                    },
                };
                item.properties.insert(key.to_string(), property);
            }
            Block::Children | Block::Ignored => {}
        }
    }
    Ok(item)
}

/// Parse `litp show -r -p` output: items separated by blank lines
pub fn model_items(output: &str) -> Result<Vec<ModelItem>> {
    output
        .split("\n\n")
        .filter(|block| !block.trim().is_empty())
        .map(model_item)
        .collect()
}

/// Task counters from the plan summary
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlanCounts {
    pub tasks: u32,
    pub initial: u32,
    pub running: u32,
    pub success: u32,
    pub failed: u32,
    pub stopped: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanPhase {
    pub number: String,
    pub status: String,
    pub vpath: String,
    pub description: String,
}

/// A LITP plan as printed by `litp show_plan`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub status: String,
    pub counts: PlanCounts,
    pub phases: Vec<PlanPhase>,
}

impl Plan {
    /// No task can run anymore
    pub fn is_finished(&self) -> bool {
        matches!(
            self.status.to_lowercase().as_str(),
            "successful" | "success" | "failed" | "stopped"
        )
    }

    pub fn is_running(&self) -> bool {
        self.status.eq_ignore_ascii_case("running")
    }

    pub fn is_failed(&self) -> bool {
        self.status.eq_ignore_ascii_case("failed")
    }
}

/// Parse `litp show_plan`
pub fn plan(output: &str) -> Result<Plan> {
    let blocks: Vec<&str> = output.trim().split("\n\n").collect();

    let phases = blocks
        .iter()
        .filter(|b| b.trim().starts_with("Phase "))
        .map(|b| plan_phase(b))
        .collect::<Result<Vec<_>>>()?;

    let summary = blocks
        .iter()
        .find(|b| b.trim().starts_with("Tasks: "))
        .context("LITP plan output has no summary")?;
    let lines: Vec<&str> = summary.lines().filter(|l| !l.trim().is_empty()).collect();
    let caps = PLAN_COUNTS
        .captures(lines[0])
        .with_context(|| format!("unexpected LITP plan summary: {}", lines[0]))?;
    let count = |i: usize| caps[i].parse::<u32>().unwrap_or_default();
    let counts = PlanCounts {
        tasks: count(1),
        initial: count(2),
        running: count(3),
        success: count(4),
        failed: count(5),
        stopped: count(6),
    };
    let status = lines
        .last()
        .and_then(|l| l.split("Plan Status:").last())
        .unwrap_or_default()
        .trim()
        .to_string();

    Ok(Plan {
        status,
        counts,
        phases,
    })
}

fn plan_phase(block: &str) -> Result<PlanPhase> {
    let lines: Vec<&str> = block.trim().lines().collect();
    if lines.len() < 4 {
        bail!("truncated LITP plan phase: {block}");
    }
    let task: Vec<&str> = lines[3].split_whitespace().collect();
    Ok(PlanPhase {
        number: lines[0]
            .split_whitespace()
            .last()
            .unwrap_or_default()
            .to_string(),
        status: task.first().copied().unwrap_or_default().to_string(),
        vpath: task.last().copied().unwrap_or_default().to_string(),
        description: lines[4..]
            .iter()
            .map(|l| l.trim())
            .collect::<Vec<_>>()
            .join(" "),
    })
}
