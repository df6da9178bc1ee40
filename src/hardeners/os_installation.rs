//! OS installation - packages and SELinux

use hardening::{
    HardenError, HardenResult, Hardener, HardenerRegistry, SchemaError, TopicContext, TopicKey,
    Value, done, found, not_implemented_because,
};
use std::collections::{BTreeMap, BTreeSet};

use super::litp::Litp;
use super::{expected_bool, expected_items, parsers, titled};

const SECTION: &str = "os_installation";

pub fn register(registry: &mut HardenerRegistry) -> Result<(), SchemaError> {
    registry.register(Packages)?;
    registry.register(UnwantedPackages)?;
    registry.register(SelinuxEnabled)?;
    registry.register(SelinuxEnforced)?;
    Ok(())
}

fn selinux_properties(ctx: &mut TopicContext<'_>) -> Result<BTreeMap<String, String>, HardenError> {
    let out = ctx.shell.run("/usr/sbin/sestatus")?;
    Ok(parsers::properties(&out))
}

struct Packages;

impl Hardener for Packages {
    fn key(&self) -> TopicKey {
        TopicKey::new(SECTION, "packages")
    }

    fn report(&self, ctx: &mut TopicContext<'_>) -> HardenResult<Value> {
        let out = ctx.shell.run("/bin/rpm -qa")?;
        done(titled("Installed Packages", Value::list(out.lines())))
    }
}

/// Applications and runtimes deployed as LITP cluster services
struct UnwantedPackages;

/// `(collection path, item names)` for every service's applications and runtimes
fn cluster_services(ctx: &mut TopicContext<'_>) -> Result<Vec<(String, Vec<String>)>, HardenError> {
    let mut litp = Litp::new(ctx);
    let mut collections = Vec::new();
    for cluster in litp.clusters()? {
        let services = litp.model_item(&format!("{}/services", cluster.vpath))?;
        for service in services.child_names() {
            for kind in ["applications", "runtimes"] {
                let path = format!("{}/services/{service}/{kind}", cluster.vpath);
                let item = litp.model_item(&path)?;
                let names = item.child_names().map(str::to_string).collect();
                collections.push((path, names));
            }
        }
    }
    Ok(collections)
}

fn unwanted_names(ctx: &TopicContext<'_>) -> Result<Vec<String>, HardenError> {
    Ok(expected_items(ctx)?
        .iter()
        .filter_map(|v| v.as_str().map(str::to_string))
        .collect())
}

impl Hardener for UnwantedPackages {
    fn key(&self) -> TopicKey {
        TopicKey::new(SECTION, "unwanted_packages")
    }

    /// The unwanted names that are not deployed. Equal to the expected
    /// list when none of them is.
    fn check(&self, ctx: &mut TopicContext<'_>) -> HardenResult<Option<Value>> {
        let unwanted = unwanted_names(ctx)?;
        let deployed: BTreeSet<String> = cluster_services(ctx)?
            .into_iter()
            .flat_map(|(_, names)| names)
            .collect();
        found(Value::list(
            unwanted.into_iter().filter(|name| !deployed.contains(name)),
        ))
    }

    fn harden(&self, ctx: &mut TopicContext<'_>) -> HardenResult<String> {
        let unwanted = unwanted_names(ctx)?;
        let mut removed = Vec::new();
        let mut service_paths = BTreeSet::new();
        for (path, names) in cluster_services(ctx)? {
            for name in names.into_iter().filter(|n| unwanted.contains(n)) {
                if let Some((service_path, _)) = path.rsplit_once('/') {
                    service_paths.insert(service_path.to_string());
                }
                removed.push(name);
            }
        }
        if service_paths.is_empty() {
            return Err(HardenError::stop(
                "None of the unwanted packages is deployed as a cluster service",
            ));
        }

        let mut litp = Litp::new(ctx);
        for path in &service_paths {
            litp.remove_item(path)?;
        }
        litp.apply_plan("Unwanted packages removal")?;
        done(format!(
            "The following services/packages were removed successfully: {}",
            removed.join(", ")
        ))
    }
}

struct SelinuxEnabled;

impl Hardener for SelinuxEnabled {
    fn key(&self) -> TopicKey {
        TopicKey::new(SECTION, "selinux_enabled")
    }

    fn check(&self, ctx: &mut TopicContext<'_>) -> HardenResult<Option<Value>> {
        let status = selinux_properties(ctx)?;
        found(status.get("SELinux status").is_some_and(|s| s == "enabled"))
    }

    fn harden(&self, ctx: &mut TopicContext<'_>) -> HardenResult<String> {
        if expected_bool(ctx)? {
            not_implemented_because("Enabling SELinux requires a reboot")
        } else {
            not_implemented_because("Disabling SELinux requires a reboot")
        }
    }
}

struct SelinuxEnforced;

impl Hardener for SelinuxEnforced {
    fn key(&self) -> TopicKey {
        TopicKey::new(SECTION, "selinux_enforced")
    }

    fn check(&self, ctx: &mut TopicContext<'_>) -> HardenResult<Option<Value>> {
        let status = selinux_properties(ctx)?;
        found(status.get("Current mode").is_some_and(|m| m == "enforcing"))
    }

    fn harden(&self, ctx: &mut TopicContext<'_>) -> HardenResult<String> {
        if expected_bool(ctx)? {
            ctx.shell.run("echo 1 >/selinux/enforce")?;
            done("SELinux has been enforced.".to_string())
        } else {
            ctx.shell.run("echo 0 >/selinux/enforce")?;
            done("SELinux enforcement has been removed.".to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardeners::testing::{FakeHost, context, no_settings};
    use hardening::Outcome;

    const SESTATUS: &str = "SELinux status:                 enabled\n\
                            SELinuxfs mount:                /selinux\n\
                            Current mode:                   permissive\n";

    fn litp_host() -> FakeHost {
        FakeHost::new()
            .on(
                "/usr/bin/litp show -p /deployments/d1/clusters",
                0,
                "/deployments/d1/clusters\n    type: collection-of-cluster\n    children:\n        /c1\n",
            )
            .on(
                "/usr/bin/litp show -p /deployments/d1/clusters/c1",
                0,
                "/deployments/d1/clusters/c1\n    type: vcs-cluster\n    state: Applied\n",
            )
            .on(
                "/usr/bin/litp show -p /deployments/d1/clusters/c1/services",
                0,
                "/deployments/d1/clusters/c1/services\n    type: collection-of-clustered-service\n    children:\n        /httpd_svc\n",
            )
            .on(
                "/usr/bin/litp show -p /deployments/d1/clusters/c1/services/httpd_svc/applications",
                0,
                "/deployments/d1/clusters/c1/services/httpd_svc/applications\n    type: ref-collection-of-service-base\n    children:\n        /httpd\n",
            )
            .on(
                "/usr/bin/litp show -p /deployments/d1/clusters/c1/services/httpd_svc/runtimes",
                0,
                "/deployments/d1/clusters/c1/services/httpd_svc/runtimes\n    type: collection-of-lsb-runtime\n",
            )
    }

    #[test]
    fn test_packages_report() {
        let mut host = FakeHost::new().on("/bin/rpm -qa", 0, "bash-4.1\nopenssh-5.3\n");
        let settings = no_settings();
        let mut ctx = context(&mut host, "os_installation.packages", Value::empty_list(), &settings);
        let report = Packages.report(&mut ctx).unwrap();
        assert_eq!(
            report,
            Outcome::Implemented(titled("Installed Packages", Value::list(["bash-4.1", "openssh-5.3"])))
        );
    }

    #[test]
    fn test_selinux_checks() {
        let mut host = FakeHost::new().on("/usr/sbin/sestatus", 0, SESTATUS);
        let settings = no_settings();
        let mut ctx = context(&mut host, "os_installation.selinux_enabled", true, &settings);
        assert_eq!(
            SelinuxEnabled.check(&mut ctx).unwrap(),
            Outcome::Implemented(Some(Value::Bool(true)))
        );
        assert_eq!(
            SelinuxEnforced.check(&mut ctx).unwrap(),
            Outcome::Implemented(Some(Value::Bool(false)))
        );
    }

    #[test]
    fn test_selinux_enabled_cannot_be_hardened() {
        let mut host = FakeHost::new();
        let settings = no_settings();
        let mut ctx = context(&mut host, "os_installation.selinux_enabled", true, &settings);
        assert!(!SelinuxEnabled.harden(&mut ctx).unwrap().is_implemented());
    }

    #[test]
    fn test_selinux_enforced_harden() {
        let mut host = FakeHost::new();
        let settings = no_settings();
        let mut ctx = context(&mut host, "os_installation.selinux_enforced", true, &settings);
        SelinuxEnforced.harden(&mut ctx).unwrap();
        drop(ctx);
        assert!(host.ran("echo 1 >/selinux/enforce"));
    }

    #[test]
    fn test_unwanted_packages_check_lists_absent_names() {
        let mut host = litp_host();
        let settings = no_settings();
        let mut ctx = context(
            &mut host,
            "os_installation.unwanted_packages",
            Value::list(["httpd", "cups"]),
            &settings,
        );
        assert_eq!(
            UnwantedPackages.check(&mut ctx).unwrap(),
            Outcome::Implemented(Some(Value::list(["cups"])))
        );
    }

    #[test]
    fn test_unwanted_packages_harden_removes_service() {
        let mut host = litp_host().on(
            "/usr/bin/litp show_plan",
            0,
            "Tasks: 1 | Initial: 0 | Running: 0 | Success: 1 | Failed: 0 | Stopped: 0\nPlan Status: Successful\n",
        );
        let settings = no_settings();
        let mut ctx = context(
            &mut host,
            "os_installation.unwanted_packages",
            Value::list(["httpd"]),
            &settings,
        );
        let Outcome::Implemented(report) = UnwantedPackages.harden(&mut ctx).unwrap() else {
            panic!("harden should be implemented");
        };
        drop(ctx);
        assert!(report.ends_with("httpd"));
        assert!(host.ran("/usr/bin/litp remove -p /deployments/d1/clusters/c1/services/httpd_svc"));
        assert!(host.ran("/usr/bin/litp create_plan"));
        assert!(host.ran("/usr/bin/litp run_plan"));
    }

    #[test]
    fn test_unwanted_packages_harden_stops_when_nothing_deployed() {
        let mut host = litp_host();
        let settings = no_settings();
        let mut ctx = context(
            &mut host,
            "os_installation.unwanted_packages",
            Value::list(["cups"]),
            &settings,
        );
        assert!(matches!(
            UnwantedPackages.harden(&mut ctx),
            Err(HardenError::Stop(_))
        ));
    }
}
