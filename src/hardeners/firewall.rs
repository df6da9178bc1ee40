//! Firewall configuration - the LITP firewall plugin and its rules

use hardening::{
    HardenError, HardenResult, Hardener, HardenerRegistry, SchemaError, TopicContext, TopicKey,
    Value, done, found, not_implemented_because,
};

use super::expected_bool;
use super::litp::Litp;

const SECTION: &str = "firewall_configuration";
const PLUGIN_PACKAGE: &str = "ERIClitplinuxfirewall";
const ICMP_RULE: &str = "/ms/configs/fw_config_init/rules/fw_icmp";
const FIREWALL_RULE: &str = "firewall-rule";
const TFTP_RULE_NAME: &str = "\"015 tftp\"";
const TFTP_PORT: &str = "69";

pub fn register(registry: &mut HardenerRegistry) -> Result<(), SchemaError> {
    registry.register(PluginInstalled)?;
    registry.register(PluginEnabled)?;
    registry.register(TftpPortDisabled)?;
    Ok(())
}

fn plugin_installed(ctx: &mut TopicContext<'_>) -> Result<bool, HardenError> {
    let out = ctx.shell.run_allowing("rpm -qa | grep firewall", &[1])?;
    Ok(out
        .output
        .lines()
        .any(|line| line.starts_with(PLUGIN_PACKAGE)))
}

struct PluginInstalled;

impl Hardener for PluginInstalled {
    fn key(&self) -> TopicKey {
        TopicKey::new(SECTION, "plugin_installed")
    }

    fn check(&self, ctx: &mut TopicContext<'_>) -> HardenResult<Option<Value>> {
        found(plugin_installed(ctx)?)
    }
}

struct PluginEnabled;

impl Hardener for PluginEnabled {
    fn key(&self) -> TopicKey {
        TopicKey::new(SECTION, "plugin_enabled")
    }

    /// Enabled means the plugin's default ICMP rule is applied on the MS
    fn check(&self, ctx: &mut TopicContext<'_>) -> HardenResult<Option<Value>> {
        if !plugin_installed(ctx)? {
            return found(false);
        }
        let rule = Litp::new(ctx).model_item(ICMP_RULE)?;
        found(rule.state() == Some("Applied"))
    }
}

struct TftpPortDisabled;

/// Whether an applied tftp rule exists below `path`
fn tftp_rule_applied(litp: &mut Litp<'_, '_>, path: &str) -> Result<bool, HardenError> {
    Ok(litp.items_by_type(path, FIREWALL_RULE)?.iter().any(|rule| {
        rule.property("name").is_some_and(|name| name.contains("tftp"))
            && rule.state() == Some("Applied")
    }))
}

/// Collection holding the firewall rules below `path`
fn rules_collection(litp: &mut Litp<'_, '_>, path: &str) -> Result<String, HardenError> {
    let rules = litp.items_by_type(path, FIREWALL_RULE)?;
    rules
        .first()
        .and_then(|rule| rule.vpath.rsplit_once('/'))
        .map(|(collection, _)| collection.to_string())
        .ok_or_else(|| HardenError::stop(format!("No firewall rules found below {path}")))
}

impl Hardener for TftpPortDisabled {
    fn key(&self) -> TopicKey {
        TopicKey::new(SECTION, "tftp_port_disabled")
    }

    /// Disabled on both the MS and the cluster nodes
    fn check(&self, ctx: &mut TopicContext<'_>) -> HardenResult<Option<Value>> {
        let mut litp = Litp::new(ctx);
        let cluster = tftp_rule_applied(&mut litp, "/deployments")?;
        let ms = tftp_rule_applied(&mut litp, "/ms")?;
        found(cluster && ms)
    }

    fn harden(&self, ctx: &mut TopicContext<'_>) -> HardenResult<String> {
        if !expected_bool(ctx)? {
            return not_implemented_because("Enabling the tftp port is not supported");
        }
        let mut litp = Litp::new(ctx);
        if let Some(plan) = litp.plan()?
            && plan.is_running()
        {
            return Err(HardenError::stop(format!(
                "Configure tftp firewall plan cannot execute as a plan already exists in status: {}",
                plan.status
            )));
        }

        let ms_rules = rules_collection(&mut litp, "/ms")?;
        let cluster_rules = rules_collection(&mut litp, "/deployments")?;
        let mut created = Vec::new();
        for (path, rules) in [("/ms", &ms_rules), ("/deployments", &cluster_rules)] {
            if tftp_rule_applied(&mut litp, path)? {
                continue;
            }
            litp.create_item(
                FIREWALL_RULE,
                &format!("{rules}/fw_tftp"),
                &[("name", TFTP_RULE_NAME), ("dport", TFTP_PORT)],
            )?;
            created.push(path);
        }
        if created.is_empty() {
            return done("tftp firewall rules are already applied.".to_string());
        }
        litp.apply_plan("Configure tftp firewall")?;
        done(format!("tftp port disabled below {}.", created.join(" and ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardeners::testing::{FakeHost, context, no_settings};
    use hardening::Outcome;

    const MS_RULES: &str = "/ms/configs/fw_config_init/rules/fw_icmp\n    \
                            type: firewall-rule\n    \
                            state: Applied\n    \
                            properties:\n        \
                            name: 100 icmp\n";

    const CLUSTER_RULES: &str = "/deployments/d1/clusters/c1/configs/fw_config/rules/fw_nfs\n    \
                                 type: firewall-rule\n    \
                                 state: Applied\n    \
                                 properties:\n        \
                                 name: 011 nfs\n\n\
                                 /deployments/d1/clusters/c1/configs/fw_config/rules/fw_tftp\n    \
                                 type: firewall-rule\n    \
                                 state: Applied\n    \
                                 properties:\n        \
                                 name: 015 tftp\n";

    const PLAN_DONE: &str =
        "Tasks: 2 | Initial: 0 | Running: 0 | Success: 2 | Failed: 0 | Stopped: 0\nPlan Status: Successful\n";

    fn firewall_host() -> FakeHost {
        FakeHost::new()
            .on("/usr/bin/litp show -r -p /ms", 0, MS_RULES)
            .on("/usr/bin/litp show -r -p /deployments", 0, CLUSTER_RULES)
    }

    #[test]
    fn test_plugin_installed() {
        let mut host = FakeHost::new().on(
            "rpm -qa | grep firewall",
            0,
            "ERIClitplinuxfirewall_CXP9031105-1.2.3.noarch\n",
        );
        let settings = no_settings();
        let mut ctx = context(&mut host, "firewall_configuration.plugin_installed", true, &settings);
        assert_eq!(
            PluginInstalled.check(&mut ctx).unwrap(),
            Outcome::Implemented(Some(Value::Bool(true)))
        );
    }

    #[test]
    fn test_plugin_enabled_requires_installation() {
        let mut host = FakeHost::new().on("rpm -qa | grep firewall", 1, "");
        let settings = no_settings();
        let mut ctx = context(&mut host, "firewall_configuration.plugin_enabled", true, &settings);
        assert_eq!(
            PluginEnabled.check(&mut ctx).unwrap(),
            Outcome::Implemented(Some(Value::Bool(false)))
        );
        drop(ctx);
        assert!(!host.ran_matching("litp show"));
    }

    #[test]
    fn test_plugin_enabled_reads_icmp_rule() {
        let mut host = FakeHost::new()
            .on("rpm -qa | grep firewall", 0, "ERIClitplinuxfirewall_CXP9031105-1.2.3.noarch")
            .on(&format!("/usr/bin/litp show -p {ICMP_RULE}"), 0, MS_RULES);
        let settings = no_settings();
        let mut ctx = context(&mut host, "firewall_configuration.plugin_enabled", true, &settings);
        assert_eq!(
            PluginEnabled.check(&mut ctx).unwrap(),
            Outcome::Implemented(Some(Value::Bool(true)))
        );
    }

    #[test]
    fn test_tftp_check_needs_both_rules() {
        let mut host = firewall_host();
        let settings = no_settings();
        let mut ctx = context(&mut host, "firewall_configuration.tftp_port_disabled", true, &settings);
        assert_eq!(
            TftpPortDisabled.check(&mut ctx).unwrap(),
            Outcome::Implemented(Some(Value::Bool(false)))
        );
    }

    #[test]
    fn test_tftp_harden_creates_missing_ms_rule() {
        let mut host = firewall_host().on("/usr/bin/litp show_plan", 0, PLAN_DONE);
        let settings = no_settings();
        let mut ctx = context(&mut host, "firewall_configuration.tftp_port_disabled", true, &settings);
        assert_eq!(
            TftpPortDisabled.harden(&mut ctx).unwrap(),
            Outcome::Implemented("tftp port disabled below /ms.".to_string())
        );
        drop(ctx);
        assert!(host.ran(
            "/usr/bin/litp create -t firewall-rule -p /ms/configs/fw_config_init/rules/fw_tftp -o name=\"015 tftp\" dport=69"
        ));
        assert!(!host.ran_matching("-p /deployments/d1/clusters/c1/configs/fw_config/rules/fw_tftp -o"));
        assert!(host.ran("/usr/bin/litp run_plan"));
    }

    #[test]
    fn test_tftp_harden_refuses_running_plan() {
        let mut host = firewall_host().on(
            "/usr/bin/litp show_plan",
            0,
            "Tasks: 2 | Initial: 1 | Running: 1 | Success: 0 | Failed: 0 | Stopped: 0\nPlan Status: Running\n",
        );
        let settings = no_settings();
        let mut ctx = context(&mut host, "firewall_configuration.tftp_port_disabled", true, &settings);
        assert!(matches!(
            TftpPortDisabled.harden(&mut ctx),
            Err(HardenError::Stop(_))
        ));
    }

    #[test]
    fn test_tftp_enable_is_not_implemented() {
        let mut host = FakeHost::new();
        let settings = no_settings();
        let mut ctx = context(&mut host, "firewall_configuration.tftp_port_disabled", false, &settings);
        assert!(!TftpPortDisabled.harden(&mut ctx).unwrap().is_implemented());
    }
}
