//! Securing services - login limits, insecure packages and restricted ports

use hardening::{
    HardenError, HardenResult, Hardener, HardenerRegistry, SchemaError, TopicContext, TopicKey,
    Value, done, found, not_implemented_because,
};
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;

use super::{expected_bool, expected_int, expected_items, parsers};

const SECTION: &str = "securing_services";
const LIMITS_CONF: &str = "/etc/security/limits.conf";

static MAX_LOGINS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*\*\s+-\s+maxlogins\s+(\d+)").expect("valid maxlogins regex")
});

pub fn register(registry: &mut HardenerRegistry) -> Result<(), SchemaError> {
    registry.register(MaxLogins)?;
    registry.register(PackageInstalled {
        topic: "telnet_client_installed",
        package: "telnet",
    })?;
    registry.register(PackageInstalled {
        topic: "telnet_server_installed",
        package: "telnet-server",
    })?;
    registry.register(PackageInstalled {
        topic: "ftp_installed",
        package: "vsftpd",
    })?;
    registry.register(PortsNotInUse)?;
    Ok(())
}

struct MaxLogins;

impl Hardener for MaxLogins {
    fn key(&self) -> TopicKey {
        TopicKey::new(SECTION, "max_logins")
    }

    /// 0 when no limit applies to every user
    fn check(&self, ctx: &mut TopicContext<'_>) -> HardenResult<Option<Value>> {
        let out = ctx.shell.run(&format!("/bin/cat {LIMITS_CONF}"))?;
        let current = out
            .lines()
            .find_map(|line| MAX_LOGINS.captures(line))
            .and_then(|caps| caps[1].parse::<i64>().ok())
            .unwrap_or(0);
        found(current)
    }

    fn harden(&self, ctx: &mut TopicContext<'_>) -> HardenResult<String> {
        let max_logins = expected_int(ctx)?;
        let mut report = Vec::new();

        let previous = ctx
            .shell
            .run_allowing(&format!("/bin/grep -i maxlogins {LIMITS_CONF}"), &[1])?;
        let active = previous
            .output
            .lines()
            .any(|line| !line.trim_start().starts_with('#') && !line.trim().is_empty());
        if previous.status == 1 || !active {
            report.push("No previous settings found.".to_string());
        } else {
            ctx.shell
                .remove_line_from_file(LIMITS_CONF, "^[^#]*[Mm][Aa][Xx][Ll][Oo][Gg][Ii][Nn][Ss]")?;
            report.push("Removed previous maxlogins settings.".to_string());
        }

        ctx.shell.insert_line_in_file(
            LIMITS_CONF,
            &format!("*         -           maxlogins       {max_logins}"),
        )?;
        report.push(format!(
            "File {LIMITS_CONF} updated with maxlogins set to {max_logins}."
        ));
        done(report.join("\n"))
    }
}

/// An RPM package that should (not) be installed
struct PackageInstalled {
    topic: &'static str,
    package: &'static str,
}

impl PackageInstalled {
    fn installed(&self, ctx: &mut TopicContext<'_>) -> Result<bool, HardenError> {
        let out = ctx
            .shell
            .run_allowing(&format!("/bin/rpm -q {}", self.package), &[1])?;
        Ok(out.success())
    }
}

impl Hardener for PackageInstalled {
    fn key(&self) -> TopicKey {
        TopicKey::new(SECTION, self.topic)
    }

    fn check(&self, ctx: &mut TopicContext<'_>) -> HardenResult<Option<Value>> {
        found(self.installed(ctx)?)
    }

    fn harden(&self, ctx: &mut TopicContext<'_>) -> HardenResult<String> {
        if expected_bool(ctx)? {
            return not_implemented_because(format!(
                "Installing {} is not supported",
                self.package
            ));
        }
        if !self.installed(ctx)? {
            return done(format!("Package {} is not installed on system.", self.package));
        }
        ctx.shell
            .run(&format!("/usr/bin/yum -y remove {}", self.package))
            .map_err(|err| {
                HardenError::stop(format!("Failed to remove the package {}: {err}", self.package))
            })?;
        done(format!("Package {} has been removed from system.", self.package))
    }
}

struct PortsNotInUse;

impl PortsNotInUse {
    fn ports_in_use(ctx: &mut TopicContext<'_>) -> Result<BTreeSet<i64>, HardenError> {
        let out = ctx.shell.run("/bin/netstat -tulpn")?;
        Ok(parsers::netstat(out.trim())?
            .values()
            .flatten()
            .filter_map(|socket| socket.local.port.parse().ok())
            .collect())
    }

    fn restricted(ctx: &TopicContext<'_>) -> Result<Vec<i64>, HardenError> {
        expected_items(ctx)?
            .iter()
            .map(|port| {
                port.as_int().ok_or_else(|| {
                    HardenError::stop(format!("{} expects port numbers, got {port}", ctx.key))
                })
            })
            .collect()
    }
}

impl Hardener for PortsNotInUse {
    fn key(&self) -> TopicKey {
        TopicKey::new(SECTION, "ports_not_in_use")
    }

    /// The restricted ports that are free. Equal to the expected list
    /// when none is in use.
    fn check(&self, ctx: &mut TopicContext<'_>) -> HardenResult<Option<Value>> {
        let restricted = Self::restricted(ctx)?;
        let in_use = Self::ports_in_use(ctx)?;
        found(Value::list(
            restricted.into_iter().filter(|port| !in_use.contains(port)),
        ))
    }

    fn harden(&self, ctx: &mut TopicContext<'_>) -> HardenResult<String> {
        let restricted = Self::restricted(ctx)?;
        let in_use = Self::ports_in_use(ctx)?;
        let mut killed = Vec::new();
        for port in restricted.into_iter().filter(|port| in_use.contains(port)) {
            ctx.shell
                .run(&format!("kill $(lsof -t -i:{port})"))
                .map_err(|err| {
                    HardenError::stop(format!("Failed to kill the process on port {port}: {err}"))
                })?;
            killed.push(port.to_string());
        }
        done(format!(
            "Processes using the following ports were killed: {}",
            killed.join(", ")
        ))
    }
}
