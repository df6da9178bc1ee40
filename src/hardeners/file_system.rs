//! File system - automounter

use hardening::{
    HardenError, HardenResult, Hardener, HardenerRegistry, SchemaError, TopicContext, TopicKey,
    Value, done, found,
};

use super::expected_bool;

pub fn register(registry: &mut HardenerRegistry) -> Result<(), SchemaError> {
    registry.register(AutoMountEnabled)
}

struct AutoMountEnabled;

impl Hardener for AutoMountEnabled {
    fn key(&self) -> TopicKey {
        TopicKey::new("file_system", "auto_mount_enabled")
    }

    fn check(&self, ctx: &mut TopicContext<'_>) -> HardenResult<Option<Value>> {
        found(ctx.shell.status("/sbin/service autofs status")? == 0)
    }

    /// Status 1 from the init script means the service is unknown
    fn harden(&self, ctx: &mut TopicContext<'_>) -> HardenResult<String> {
        if expected_bool(ctx)? {
            let out = ctx.shell.run_allowing("/sbin/service autofs start", &[1])?;
            if out.status == 1 {
                return Err(HardenError::stop(
                    "Service autofs is not recognized and cannot be started",
                ));
            }
            done("Service autofs started.".to_string())
        } else {
            let out = ctx.shell.run_allowing("/sbin/service autofs stop", &[1])?;
            if out.status == 1 {
                return done("Service autofs not recognized, so it is not used.".to_string());
            }
            done("Service autofs stopped.".to_string())
        }
    }
}
