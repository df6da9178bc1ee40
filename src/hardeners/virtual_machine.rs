//! Virtual machine hardening - root SSH login

use hardening::{
    HardenResult, Hardener, HardenerRegistry, SchemaError, TopicContext, TopicKey, Value, done,
    found,
};

use super::expected_bool;

const SSHD_CONFIG: &str = "/etc/ssh/sshd_config";
const PERMIT_ROOT_LOGIN: &str = "grep '^PermitRootLogin' /etc/ssh/sshd_config || echo 'Not Found'";
const NOT_FOUND: &str = "Not Found";
const RESTART_SSHD: &str = "nohup /sbin/service sshd restart";

pub fn register(registry: &mut HardenerRegistry) -> Result<(), SchemaError> {
    registry.register(RootSshAccess)
}

struct RootSshAccess;

impl Hardener for RootSshAccess {
    fn key(&self) -> TopicKey {
        TopicKey::new("virtual_machine_hardening", "root_ssh_access")
    }

    fn check(&self, ctx: &mut TopicContext<'_>) -> HardenResult<Option<Value>> {
        let out = ctx.shell.run(PERMIT_ROOT_LOGIN)?;
        found(out.contains("yes"))
    }

    fn harden(&self, ctx: &mut TopicContext<'_>) -> HardenResult<String> {
        let permit = if expected_bool(ctx)? { "yes" } else { "no" };
        let line = format!("PermitRootLogin {permit}");
        let out = ctx.shell.run(PERMIT_ROOT_LOGIN)?;

        let report = if out.contains(NOT_FOUND) {
            ctx.shell.insert_line_in_file(SSHD_CONFIG, &line)?;
            format!("Permit root login - Set to {permit}")
        } else if out.lines().any(|l| l.trim() == line) {
            return done("Permit root login - No changes required".to_string());
        } else {
            ctx.shell
                .replace_line_in_file(SSHD_CONFIG, "^PermitRootLogin", &line)?;
            format!("Permit root login - Changed to {permit}")
        };
        ctx.shell.run(RESTART_SSHD)?;
        done(report)
    }
}
