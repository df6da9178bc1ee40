//! OS configuration - report-only inventory of processes, services and files

use hardening::{
    HardenResult, Hardener, HardenerRegistry, SchemaError, TopicContext, TopicKey, Value, done,
    found,
};
use std::collections::BTreeMap;

use super::parsers::{self, Socket};
use super::titled;

const SECTION: &str = "os_configuration";

/// `find` exits non-zero when it cannot descend into some directories
const FIND_ACCEPTED: &[i32] = &[1, 256];
const PROC_NOISE: &str = "/bin/find: `/proc";

pub fn register(registry: &mut HardenerRegistry) -> Result<(), SchemaError> {
    registry.register(Processes)?;
    registry.register(RunningServices)?;
    registry.register(KnownServices)?;
    registry.register(ServicesPorts)?;
    registry.register(XWindowsUsed)?;
    registry.register(SystemCronJobs)?;
    registry.register(CronJobsPerUser)?;
    registry.register(PermissionFiles {
        topic: "suid_files",
        mode: "4000",
        title: "SUID files",
    })?;
    registry.register(PermissionFiles {
        topic: "sgid_files",
        mode: "2000",
        title: "SGID files",
    })?;
    Ok(())
}

struct Processes;

impl Hardener for Processes {
    fn key(&self) -> TopicKey {
        TopicKey::new(SECTION, "processes")
    }

    /// Memory share per process name, largest first
    fn report(&self, ctx: &mut TopicContext<'_>) -> HardenResult<Value> {
        let out = ctx.shell.run("/bin/ps -eo fname,%mem --sort -rss")?;
        let body: Vec<&str> = out.trim().lines().skip(1).collect();
        let usage = parsers::summed_columns(&body.join("\n"))?;
        done(titled(
            "Memory per process",
            Value::list(
                usage
                    .into_iter()
                    .map(|(name, mem)| Value::tuple([name, format!("{mem:.1}")])),
            ),
        ))
    }
}

struct RunningServices;

impl Hardener for RunningServices {
    fn key(&self) -> TopicKey {
        TopicKey::new(SECTION, "running_services")
    }

    fn report(&self, ctx: &mut TopicContext<'_>) -> HardenResult<Value> {
        let out = ctx.shell.run("/sbin/service --status-all")?;
        let statuses = parsers::service_statuses(&out);
        let (running, stopped): (Vec<_>, Vec<_>) =
            statuses.into_iter().partition(|(_, running)| *running);
        done(Value::map([
            (
                "Running Services",
                Value::list(running.into_iter().map(|(name, _)| name)),
            ),
            (
                "Stopped Services",
                Value::list(stopped.into_iter().map(|(name, _)| name)),
            ),
        ]))
    }
}

struct KnownServices;

impl Hardener for KnownServices {
    fn key(&self) -> TopicKey {
        TopicKey::new(SECTION, "known_services")
    }

    /// Runlevel table, plus the xinetd table when chkconfig prints one
    fn report(&self, ctx: &mut TopicContext<'_>) -> HardenResult<Value> {
        let out = ctx.shell.run("/sbin/chkconfig --list")?;
        let mut tables = BTreeMap::new();
        let (services, xinetd) = match out.split_once("\n\n") {
            Some((first, second)) => (first, Some(second)),
            None => (out.as_str(), None),
        };
        tables.insert("Services".to_string(), Value::from(parsers::key_values(services)));

        if let Some((title, body)) = xinetd
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .and_then(|s| s.split_once('\n'))
        {
            tables.insert(
                title.trim().trim_end_matches(':').to_string(),
                Value::from(parsers::key_values(body)),
            );
        }
        done(Value::Map(tables))
    }
}

fn socket_value(socket: &Socket) -> Value {
    Value::map([
        ("proto", socket.proto.clone()),
        ("local", format!("{}:{}", socket.local.ip, socket.local.port)),
        ("foreign", format!("{}:{}", socket.foreign.ip, socket.foreign.port)),
        ("state", socket.state.clone().unwrap_or_default()),
        ("pid", socket.pid.clone()),
    ])
}

struct ServicesPorts;

impl Hardener for ServicesPorts {
    fn key(&self) -> TopicKey {
        TopicKey::new(SECTION, "services_ports")
    }

    fn report(&self, ctx: &mut TopicContext<'_>) -> HardenResult<Value> {
        let out = ctx.shell.run("/bin/netstat -tulpn")?;
        let programs = parsers::netstat(out.trim())?;
        done(Value::map(programs.iter().map(|(name, sockets)| {
            let name = if name.is_empty() { "unknown" } else { name.as_str() };
            (name, Value::list(sockets.iter().map(socket_value)))
        })))
    }
}

struct XWindowsUsed;

impl Hardener for XWindowsUsed {
    fn key(&self) -> TopicKey {
        TopicKey::new(SECTION, "x_windows_used")
    }

    fn check(&self, ctx: &mut TopicContext<'_>) -> HardenResult<Option<Value>> {
        found(ctx.shell.status("/sbin/pidof X")? == 0)
    }
}

struct SystemCronJobs;

impl Hardener for SystemCronJobs {
    fn key(&self) -> TopicKey {
        TopicKey::new(SECTION, "system_cron_jobs")
    }

    fn report(&self, ctx: &mut TopicContext<'_>) -> HardenResult<Value> {
        let out = ctx.shell.run("/bin/ls /etc/cron.*/*")?;
        done(titled("Cron jobs list", Value::list(out.split_whitespace())))
    }
}

struct CronJobsPerUser;

impl Hardener for CronJobsPerUser {
    fn key(&self) -> TopicKey {
        TopicKey::new(SECTION, "cron_jobs_per_user")
    }

    fn report(&self, ctx: &mut TopicContext<'_>) -> HardenResult<Value> {
        let out = ctx.shell.run_allowing(
            "for user in $(cut -f1 -d: /etc/passwd); do echo __$user; crontab -u $user -l; done",
            &[1, 256],
        )?;
        let jobs = parsers::crontab_per_user(&out.output);
        let value = if jobs.is_empty() {
            Value::from("no jobs per user.")
        } else {
            Value::from(jobs)
        };
        done(titled("Cron jobs per user", value))
    }
}

/// Files carrying a special permission bit
struct PermissionFiles {
    topic: &'static str,
    mode: &'static str,
    title: &'static str,
}

impl Hardener for PermissionFiles {
    fn key(&self) -> TopicKey {
        TopicKey::new(SECTION, self.topic)
    }

    fn report(&self, ctx: &mut TopicContext<'_>) -> HardenResult<Value> {
        let out = ctx
            .shell
            .run_allowing(&format!("/bin/find / -perm -{}", self.mode), FIND_ACCEPTED)?;
        let mut files: Vec<&str> = out
            .output
            .lines()
            .filter(|line| !line.starts_with(PROC_NOISE) && !line.trim().is_empty())
            .collect();
        files.sort_unstable();
        files.dedup();
        done(titled(self.title, Value::list(files)))
    }
}
