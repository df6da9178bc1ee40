//! Routing configuration - source routing, forwarding and redirects

use hardening::{
    HardenError, HardenResult, Hardener, HardenerRegistry, SchemaError, TopicContext, TopicKey,
    Value, done, found,
};
use std::collections::BTreeMap;

use super::expected_bool;

const SYSCTL_PARAMS: [&str; 8] = [
    "net.ipv4.conf.all.accept_source_route",
    "net.ipv4.conf.all.forwarding",
    "net.ipv6.conf.all.forwarding",
    "net.ipv4.conf.all.mc_forwarding",
    "net.ipv4.conf.all.accept_redirects",
    "net.ipv6.conf.all.accept_redirects",
    "net.ipv4.conf.all.secure_redirects",
    "net.ipv4.conf.all.send_redirects",
];

pub fn register(registry: &mut HardenerRegistry) -> Result<(), SchemaError> {
    registry.register(SourceRoutingDisabled)
}

/// `name = value` lines of `sysctl -a`, restricted to the routing parameters
fn routing_values(output: &str) -> BTreeMap<&str, &str> {
    output
        .lines()
        .filter_map(|line| line.split_once(" = "))
        .map(|(name, value)| (name.trim(), value.trim()))
        .filter(|(name, _)| SYSCTL_PARAMS.contains(name))
        .collect()
}

fn state_name(value: u8) -> &'static str {
    if value == 0 { "disabled" } else { "enabled" }
}

struct SourceRoutingDisabled;

impl Hardener for SourceRoutingDisabled {
    fn key(&self) -> TopicKey {
        TopicKey::new("routing_configuration", "source_routing_disabled")
    }

    /// True when every routing parameter present on the host is 0
    fn check(&self, ctx: &mut TopicContext<'_>) -> HardenResult<Option<Value>> {
        let out = ctx.shell.run("/sbin/sysctl -a")?;
        let values = routing_values(&out);
        if values.is_empty() {
            return done(None);
        }
        found(values.values().all(|v| *v == "0"))
    }

    fn harden(&self, ctx: &mut TopicContext<'_>) -> HardenResult<String> {
        let value = u8::from(!expected_bool(ctx)?);
        let mut report = Vec::new();
        let mut failed = Vec::new();
        for param in SYSCTL_PARAMS {
            if ctx.shell.status(&format!("/sbin/sysctl -w {param}={value}"))? == 0 {
                report.push(format!("{param}: {}", state_name(value)));
                continue;
            }
            // A failed write still counts when the value is already right
            let current = ctx.shell.run_allowing(&format!("/sbin/sysctl -n {param}"), &[255])?;
            if current.success() && current.output.trim() == value.to_string() {
                report.push(format!("{param}: {}", state_name(value)));
            } else {
                failed.push(param);
            }
        }
        if !failed.is_empty() {
            return Err(HardenError::stop(format!(
                "The following sysctl parameters should be {}: {}",
                state_name(value),
                failed.join(", ")
            )));
        }
        done(report.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardeners::testing::{FakeHost, context, no_settings};
    use hardening::Outcome;

    const SYSCTL: &str = "kernel.panic = 0\n\
                          net.ipv4.conf.all.forwarding = 0\n\
                          net.ipv4.conf.all.mc_forwarding = 0\n\
                          net.ipv4.conf.all.accept_redirects = 1\n\
                          net.ipv4.conf.default.accept_redirects = 1\n\
                          net.ipv4.conf.all.accept_source_route = 0\n";

    fn check(output: &str) -> Option<Value> {
        let mut host = FakeHost::new().on("/sbin/sysctl -a", 0, output);
        let settings = no_settings();
        let mut ctx = context(&mut host, "routing_configuration.source_routing_disabled", true, &settings);
        match SourceRoutingDisabled.check(&mut ctx).unwrap() {
            Outcome::Implemented(value) => value,
            Outcome::NotImplemented(_) => panic!("check should be implemented"),
        }
    }

    #[test]
    fn test_routing_values_only_keeps_known_params() {
        let values = routing_values(SYSCTL);
        assert_eq!(values.len(), 4);
        assert_eq!(values["net.ipv4.conf.all.accept_redirects"], "1");
        assert!(!values.contains_key("net.ipv4.conf.default.accept_redirects"));
    }

    #[test]
    fn test_check() {
        assert_eq!(check(SYSCTL), Some(Value::Bool(false)));
        let disabled = SYSCTL.replace("all.accept_redirects = 1", "all.accept_redirects = 0");
        assert_eq!(check(&disabled), Some(Value::Bool(true)));
        assert_eq!(check("kernel.panic = 0"), None);
    }

    #[test]
    fn test_harden_writes_every_param() {
        let mut host = FakeHost::new();
        let settings = no_settings();
        let mut ctx = context(&mut host, "routing_configuration.source_routing_disabled", true, &settings);
        let Outcome::Implemented(report) = SourceRoutingDisabled.harden(&mut ctx).unwrap() else {
            panic!("harden should be implemented");
        };
        drop(ctx);
        assert_eq!(report.lines().count(), SYSCTL_PARAMS.len());
        assert!(host.ran("/sbin/sysctl -w net.ipv6.conf.all.forwarding=0"));
    }

    #[test]
    fn test_harden_tolerates_failed_write_with_right_value() {
        let mut host = FakeHost::new()
            .on("/sbin/sysctl -w net.ipv4.conf.all.mc_forwarding=0", 255, "permission denied")
            .on("/sbin/sysctl -n net.ipv4.conf.all.mc_forwarding", 0, "0");
        let settings = no_settings();
        let mut ctx = context(&mut host, "routing_configuration.source_routing_disabled", true, &settings);
        assert!(SourceRoutingDisabled.harden(&mut ctx).is_ok());
    }

    #[test]
    fn test_harden_stops_on_wrong_value() {
        let mut host = FakeHost::new()
            .on("/sbin/sysctl -w net.ipv4.conf.all.send_redirects=0", 255, "permission denied")
            .on("/sbin/sysctl -n net.ipv4.conf.all.send_redirects", 0, "1");
        let settings = no_settings();
        let mut ctx = context(&mut host, "routing_configuration.source_routing_disabled", true, &settings);
        let Err(HardenError::Stop(message)) = SourceRoutingDisabled.harden(&mut ctx) else {
            panic!("harden should stop");
        };
        assert!(message.ends_with("net.ipv4.conf.all.send_redirects"));
    }
}
