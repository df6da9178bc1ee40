//! Password encryption - the GRUB boot password

use hardening::{
    HardenError, HardenResult, Hardener, HardenerRegistry, SchemaError, TopicContext, TopicKey,
    Value, done, found, quote,
};

use super::expected_bool;

const GRUB_CONF: &str = "/boot/grub/grub.conf";
const TIMEOUT_LINE: &str = "^timeout=[0-9]+";
const PASSWORD_LINE: &str = "password --md5 ";

pub fn register(registry: &mut HardenerRegistry) -> Result<(), SchemaError> {
    registry.register(GrubPasswordEncrypted)
}

struct GrubPasswordEncrypted;

impl Hardener for GrubPasswordEncrypted {
    fn key(&self) -> TopicKey {
        TopicKey::new("password_encryption", "grub_password_encrypted")
    }

    fn check(&self, ctx: &mut TopicContext<'_>) -> HardenResult<Option<Value>> {
        let conf = ctx.shell.read_file(GRUB_CONF)?;
        found(
            conf.lines()
                .any(|line| line.trim().starts_with(PASSWORD_LINE)),
        )
    }

    /// The plain password is piped to grub-md5-crypt and never recorded
    fn harden(&self, ctx: &mut TopicContext<'_>) -> HardenResult<String> {
        if !expected_bool(ctx)? {
            ctx.shell
                .remove_line_from_file(GRUB_CONF, "^\\s*password --md5 ")?;
            return done(format!(
                "Grub password was encrypted, but removed from the {GRUB_CONF} file afterwards."
            ));
        }

        let password = ctx.require_setting("grub_password")?.to_string();
        let out = ctx.shell.run_redacted(
            &format!(
                "printf '%s\\n%s\\n' {0} {0} | /sbin/grub-md5-crypt",
                quote(&password)
            ),
            "/sbin/grub-md5-crypt",
        )?;
        let Some(hash) = out.lines().map(str::trim).rfind(|l| !l.is_empty()) else {
            return Err(HardenError::stop("grub-md5-crypt returned no hash"));
        };
        ctx.shell
            .insert_line_after(GRUB_CONF, TIMEOUT_LINE, &format!("{PASSWORD_LINE}{hash}"))?;
        done("Grub password encrypted.".to_string())
    }
}
