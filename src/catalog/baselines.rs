//! LITP baselines
//!
//! `common` holds the values shared by every deployment role. The role
//! baselines derive from it and override what differs.

use hardening::{Baseline, SchemaError, SectionValues, Value};

/// Baseline names, in the order they are listed
pub const BASELINES: [&str; 4] = ["common", "node", "MS", "KVM"];

const LITP_PREFIX: &str = "litp.";

/// Look up a baseline by name
///
/// Names are case-insensitive and may carry a `litp.` prefix.
pub fn baseline(name: &str) -> Result<Baseline, SchemaError> {
    let lowered = name.to_lowercase();
    let short = lowered.strip_prefix(LITP_PREFIX).unwrap_or(&lowered);
    match short {
        "common" => Ok(common()),
        "node" => Ok(node()),
        "ms" => Ok(ms()),
        "kvm" => Ok(kvm()),
        _ => Err(SchemaError::UnknownBaseline(name.to_string())),
    }
}

fn common() -> Baseline {
    Baseline::new("common")
        .setting("ntp_server", "")
        .setting("grub_password", "passw0rd")
        .section(
            "os_installation",
            SectionValues::new()
                .set("packages", Value::empty_list())
                .undefined("unwanted_packages")
                .set("selinux_enabled", true)
                .set("selinux_enforced", true),
        )
        .section(
            "os_configuration",
            SectionValues::new()
                .set("processes", Value::empty_list())
                .set("running_services", Value::empty_list())
                .set("known_services", Value::empty_list())
                .set("services_ports", Value::empty_map())
                .set("x_windows_used", false)
                .set("system_cron_jobs", Value::empty_list())
                .set("cron_jobs_per_user", Value::empty_map())
                .set("suid_files", Value::empty_list())
                .set("sgid_files", Value::empty_list()),
        )
        .section(
            "file_system",
            SectionValues::new().set("auto_mount_enabled", false),
        )
        .section(
            "system_access_control",
            SectionValues::new()
                // deny after 5 failures, unlock after 6h
                .set("account_locking", Value::tuple([5, 21600]))
                .set("login_banner_present", true),
        )
        .section(
            "login_control",
            SectionValues::new()
                .set("password_age", 60)
                .set("idle_timeout", 300),
        )
        .section(
            "routing_configuration",
            SectionValues::new().set("source_routing_disabled", true),
        )
        .section(
            "firewall_configuration",
            SectionValues::new()
                .undefined("plugin_installed")
                .undefined("plugin_enabled")
                .undefined("tftp_port_disabled"),
        )
        .section(
            "securing_services",
            SectionValues::new()
                .set("telnet_client_installed", false)
                .set("telnet_server_installed", false)
                .set("ftp_installed", false)
                .set("ports_not_in_use", Value::list([21, 23]))
                .set("max_logins", 10),
        )
        .section(
            "time_synchronisation",
            SectionValues::new().undefined("ntp_sync_enabled"),
        )
        .section(
            "password_encryption",
            SectionValues::new().set("grub_password_encrypted", true),
        )
        .section(
            "virtual_machine_hardening",
            SectionValues::new().undefined("root_ssh_access"),
        )
}

/// Managed nodes synchronise with the MS
fn node() -> Baseline {
    common()
        .derive("node")
        .setting("ntp_server", "10.44.86.212")
        .section(
            "time_synchronisation",
            SectionValues::new().set("ntp_sync_enabled", true),
        )
}

/// The management server carries the firewall plugin
fn ms() -> Baseline {
    common().derive("MS").section(
        "firewall_configuration",
        SectionValues::new()
            .set("plugin_installed", true)
            .set("tftp_port_disabled", true),
    )
}

fn kvm() -> Baseline {
    common().derive("KVM").section(
        "virtual_machine_hardening",
        SectionValues::new().set("root_ssh_access", false),
    )
}
