//! The LITP hardening schema
//!
//! Section and topic order is the execution order.

use hardening::{Schema, SectionSchema, ValueType};
use std::sync::LazyLock;

static SCHEMA: LazyLock<Schema> = LazyLock::new(build);

/// The schema every baseline composes against
pub fn schema() -> &'static Schema {
    &SCHEMA
}

fn build() -> Schema {
    use ValueType::{Boolean, Integer, List, Mapping, Tuple};

    Schema::new()
        .section(
            SectionSchema::new(
                "os_installation",
                "Node hardening steps for the Operating System installation.",
            )
            .topic(
                "packages",
                List,
                "Only the necessary OS components are installed (@core --nobase + list of specified RPMs).",
            )
            .topic(
                "unwanted_packages",
                List,
                "List of unwanted packages on the LITP cluster level.",
            )
            .topic("selinux_enabled", Boolean, "Ensure that SELinux is <enabled|disabled>.")
            .topic(
                "selinux_enforced",
                Boolean,
                "Ensure that SELinux is <|not> in enforcing mode.",
            ),
        )
        .section(
            SectionSchema::new(
                "os_configuration",
                "Node hardening steps for the Operating System configuration.",
            )
            .topic("processes", List, "Ensure that only relevant processes are running.")
            .topic(
                "running_services",
                List,
                "Ensure that only relevant services are running.",
            )
            .topic("known_services", List, "Report of known services.")
            .topic("services_ports", Mapping, "Report of services and associated ports.")
            .topic("x_windows_used", Boolean, "Ensure that X-Windows is <|not> in use.")
            .topic("system_cron_jobs", List, "Report a list of cron jobs in the system.")
            .topic("cron_jobs_per_user", Mapping, "Report a list of cron jobs per user.")
            .topic(
                "suid_files",
                List,
                "Ensure that no additional SUID files have been added.",
            )
            .topic(
                "sgid_files",
                List,
                "Ensure that no additional SGID files have been added.",
            ),
        )
        .section(
            SectionSchema::new("file_system", "Node hardening steps for File Systems.").topic(
                "auto_mount_enabled",
                Boolean,
                "Ensure that NFS auto mount is <|not> used.",
            ),
        )
        .section(
            SectionSchema::new(
                "system_access_control",
                "Node hardening steps for System access control, authentication and authorisation.",
            )
            .topic(
                "account_locking",
                Tuple,
                "Ensure that accounts are locked after a certain number of failed login attempts.",
            )
            .topic("login_banner_present", Boolean, "Ensure a login banner is <|not> present."),
        )
        .section(
            SectionSchema::new("login_control", "Node hardening steps for Password and login control.")
                .topic("password_age", Integer, "Ensure the password age for users.")
                .topic(
                    "idle_timeout",
                    Integer,
                    "Ensure inactive login session times out after a given number of sec.",
                ),
        )
        .section(
            SectionSchema::new(
                "routing_configuration",
                "Node hardening steps for Routing configuration.",
            )
            .topic(
                "source_routing_disabled",
                Boolean,
                "Ensure that source routing is <disabled|enabled>.",
            ),
        )
        .section(
            SectionSchema::new(
                "firewall_configuration",
                "Node hardening steps for Host-based firewall configuration.",
            )
            .topic(
                "plugin_installed",
                Boolean,
                "Ensure that the firewall plugin is <|not> installed.",
            )
            .topic("plugin_enabled", Boolean, "Ensure that the firewall is <enabled|disabled>.")
            .topic(
                "tftp_port_disabled",
                Boolean,
                "Ensure tftp port <closed|open> on MS and nodes.",
            ),
        )
        .section(
            SectionSchema::new("securing_services", "Node hardening steps for Securing services.")
                .topic(
                    "telnet_client_installed",
                    Boolean,
                    "Ensure that telnet client is <|not> installed.",
                )
                .topic(
                    "telnet_server_installed",
                    Boolean,
                    "Ensure that telnet server is <|not> installed.",
                )
                .topic("ftp_installed", Boolean, "Ensure that ftp is <|not> installed.")
                .topic("ports_not_in_use", List, "Ensure ports not opened.")
                .topic(
                    "max_logins",
                    Integer,
                    "Ensure the max number of login shells per users.",
                ),
        )
        .section(
            SectionSchema::new(
                "time_synchronisation",
                "Node hardening steps for Time synchronisation.",
            )
            .topic("ntp_sync_enabled", Boolean, "Ensure that ntp sync is <enabled|disabled>."),
        )
        .section(
            SectionSchema::new(
                "password_encryption",
                "Node hardening steps for Password Encryption.",
            )
            .topic(
                "grub_password_encrypted",
                Boolean,
                "Ensure that password is <|not> encrypted.",
            ),
        )
        .section(
            SectionSchema::new(
                "virtual_machine_hardening",
                "Node hardening steps for Virtual Machine Hardening on the Peer Servers.",
            )
            .topic(
                "root_ssh_access",
                Boolean,
                "Ensure that root SSH access is <|not> permitted.",
            ),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use hardening::TopicKey;

    #[test]
    fn test_schema_sections_in_order() {
        let names: Vec<&str> = schema().sections().iter().map(|s| s.name()).collect();
        assert_eq!(names.len(), 11);
        assert_eq!(names.first(), Some(&"os_installation"));
        assert_eq!(names.last(), Some(&"virtual_machine_hardening"));
    }

    #[test]
    fn test_schema_topic_types() {
        let schema = schema();
        let locking = schema
            .topic(&TopicKey::new("system_access_control", "account_locking"))
            .unwrap();
        assert_eq!(locking.value_type, ValueType::Tuple);
        let ports = schema
            .topic(&TopicKey::new("securing_services", "ports_not_in_use"))
            .unwrap();
        assert_eq!(ports.value_type, ValueType::List);
        assert_eq!(schema.keys().count(), 30);
    }
}
