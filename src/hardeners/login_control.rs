//! Login control - password aging and idle session timeout

use hardening::{
    HardenError, HardenResult, Hardener, HardenerRegistry, SchemaError, TopicContext, TopicKey,
    Value, done, found,
};
use regex::Regex;
use std::sync::LazyLock;

use super::{expected_int, parsers};

const SECTION: &str = "login_control";

const MAX_AGE_FIELD: &str = "Maximum number of days between password change";
const PROFILE_SCRIPT: &str = "/etc/profile.d/os-security.sh";
const NO_FILE: &str = "No File";

static TMOUT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"TMOUT=(\d+)").expect("valid TMOUT regex"));

pub fn register(registry: &mut HardenerRegistry) -> Result<(), SchemaError> {
    registry.register(PasswordAge)?;
    registry.register(IdleTimeout)?;
    Ok(())
}

struct PasswordAge;

impl PasswordAge {
    /// Regular users plus root whose maximum password age differs from `expected`
    fn users_to_change(ctx: &mut TopicContext<'_>, expected: i64) -> Result<Vec<(String, i64)>, HardenError> {
        let passwd = ctx.shell.run("cat /etc/passwd")?;
        let mut users = parsers::real_users(&passwd);
        users.push("root".to_string());

        let mut differing = Vec::new();
        for user in users {
            let out = ctx.shell.run(&format!("chage -l {user}"))?;
            let fields = parsers::properties(&out);
            let Some(max_age) = fields.get(MAX_AGE_FIELD) else {
                return Err(HardenError::stop(format!(
                    "chage did not report the maximum password age of {user}"
                )));
            };
            let max_age: i64 = max_age.parse().map_err(|_| {
                HardenError::stop(format!("Invalid maximum password age for {user}: {max_age}"))
            })?;
            if max_age != expected {
                differing.push((user, max_age));
            }
        }
        Ok(differing)
    }
}

impl Hardener for PasswordAge {
    fn key(&self) -> TopicKey {
        TopicKey::new(SECTION, "password_age")
    }

    /// The expected age when every user complies, otherwise the
    /// `(user, age)` pairs that do not
    fn check(&self, ctx: &mut TopicContext<'_>) -> HardenResult<Option<Value>> {
        let expected = expected_int(ctx)?;
        let differing = Self::users_to_change(ctx, expected)?;
        if differing.is_empty() {
            return found(expected);
        }
        found(Value::list(
            differing
                .into_iter()
                .map(|(user, age)| Value::tuple([Value::from(user), Value::from(age)])),
        ))
    }

    /// Also resets the last change date so accounts do not expire at once
    fn harden(&self, ctx: &mut TopicContext<'_>) -> HardenResult<String> {
        let expected = expected_int(ctx)?;
        let mut changed = Vec::new();
        for (user, _) in Self::users_to_change(ctx, expected)? {
            ctx.shell
                .run(&format!("chage -d $(date +%Y-%m-%d) -M {expected} {user}"))?;
            changed.push(user);
        }
        done(format!("Changed users: {}.", changed.join(", ")))
    }
}

struct IdleTimeout;

impl IdleTimeout {
    fn profile_script(ctx: &mut TopicContext<'_>) -> Result<String, HardenError> {
        Ok(ctx
            .shell
            .run(&format!("cat {PROFILE_SCRIPT} || echo '{NO_FILE}'"))?)
    }

    fn current(script: &str) -> Option<i64> {
        TMOUT.captures(script).and_then(|caps| caps[1].parse().ok())
    }
}

impl Hardener for IdleTimeout {
    fn key(&self) -> TopicKey {
        TopicKey::new(SECTION, "idle_timeout")
    }

    /// 0 when no timeout is configured
    fn check(&self, ctx: &mut TopicContext<'_>) -> HardenResult<Option<Value>> {
        let script = Self::profile_script(ctx)?;
        found(Self::current(&script).unwrap_or(0))
    }

    fn harden(&self, ctx: &mut TopicContext<'_>) -> HardenResult<String> {
        let expected = expected_int(ctx)?;
        let script = Self::profile_script(ctx)?;
        match Self::current(&script) {
            Some(current) => {
                ctx.shell.run(&format!(
                    "sed -i.bkp 's/TMOUT={current}/TMOUT={expected}/g' {PROFILE_SCRIPT}"
                ))?;
                done(format!(
                    "File {PROFILE_SCRIPT} updated with idle timeout: {expected}"
                ))
            }
            None if script.contains(NO_FILE) => {
                ctx.shell
                    .insert_line_in_file(PROFILE_SCRIPT, &format!("readonly TMOUT={expected}"))?;
                ctx.shell.run(&format!("chmod +x {PROFILE_SCRIPT}"))?;
                done(format!(
                    "File {PROFILE_SCRIPT} created with idle timeout: {expected}"
                ))
            }
            None => Err(HardenError::stop(format!(
                "Can't update file {PROFILE_SCRIPT} with idle timeout {expected}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardeners::testing::{FakeHost, context, no_settings};
    use hardening::Outcome;

    const PASSWD: &str = "root:x:0:0:root:/root:/bin/bash\n\
                          daemon:x:2:2:daemon:/sbin:/sbin/nologin\n\
                          litp-admin:x:500:500::/home/litp-admin:/bin/bash\n";

    fn chage(max: i64) -> String {
        format!(
            "Last password change\t\t\t\t\t: Jan 01, 2015\n\
             Password expires\t\t\t\t\t: never\n\
             {MAX_AGE_FIELD}\t\t: {max}\n"
        )
    }

    fn aging_host(admin_age: i64, root_age: i64) -> FakeHost {
        FakeHost::new()
            .on("cat /etc/passwd", 0, PASSWD)
            .on("chage -l litp-admin", 0, &chage(admin_age))
            .on("chage -l root", 0, &chage(root_age))
    }

    #[test]
    fn test_password_age_check_compliant() {
        let mut host = aging_host(60, 60);
        let settings = no_settings();
        let mut ctx = context(&mut host, "login_control.password_age", 60, &settings);
        assert_eq!(
            PasswordAge.check(&mut ctx).unwrap(),
            Outcome::Implemented(Some(Value::Int(60)))
        );
    }

    #[test]
    fn test_password_age_check_lists_offenders() {
        let mut host = aging_host(99999, 60);
        let settings = no_settings();
        let mut ctx = context(&mut host, "login_control.password_age", 60, &settings);
        assert_eq!(
            PasswordAge.check(&mut ctx).unwrap(),
            Outcome::Implemented(Some(Value::list([Value::tuple([
                Value::from("litp-admin"),
                Value::from(99999)
            ])])))
        );
    }

    #[test]
    fn test_password_age_harden() {
        let mut host = aging_host(99999, 99999);
        let settings = no_settings();
        let mut ctx = context(&mut host, "login_control.password_age", 60, &settings);
        assert_eq!(
            PasswordAge.harden(&mut ctx).unwrap(),
            Outcome::Implemented("Changed users: litp-admin, root.".to_string())
        );
        drop(ctx);
        assert!(host.ran("chage -d $(date +%Y-%m-%d) -M 60 root"));
    }

    #[test]
    fn test_idle_timeout_check() {
        let cmd = format!("cat {PROFILE_SCRIPT} || echo '{NO_FILE}'");
        let mut host = FakeHost::new().on(&cmd, 0, "readonly TMOUT=900\n");
        let settings = no_settings();
        let mut ctx = context(&mut host, "login_control.idle_timeout", 300, &settings);
        assert_eq!(
            IdleTimeout.check(&mut ctx).unwrap(),
            Outcome::Implemented(Some(Value::Int(900)))
        );
        IdleTimeout.harden(&mut ctx).unwrap();
        drop(ctx);
        assert!(host.ran_matching("sed -i.bkp 's/TMOUT=900/TMOUT=300/g'"));
    }

    #[test]
    fn test_idle_timeout_creates_missing_script() {
        let cmd = format!("cat {PROFILE_SCRIPT} || echo '{NO_FILE}'");
        let mut host = FakeHost::new().on(&cmd, 0, "cat: /etc/profile.d/os-security.sh: No such file or directory\nNo File");
        let settings = no_settings();
        let mut ctx = context(&mut host, "login_control.idle_timeout", 300, &settings);
        assert_eq!(
            IdleTimeout.check(&mut ctx).unwrap(),
            Outcome::Implemented(Some(Value::Int(0)))
        );
        IdleTimeout.harden(&mut ctx).unwrap();
        drop(ctx);
        assert!(host.ran("echo 'readonly TMOUT=300' >> '/etc/profile.d/os-security.sh'"));
        assert!(host.ran("chmod +x /etc/profile.d/os-security.sh"));
    }

    #[test]
    fn test_idle_timeout_unparsable_script_stops() {
        let cmd = format!("cat {PROFILE_SCRIPT} || echo '{NO_FILE}'");
        let mut host = FakeHost::new().on(&cmd, 0, "export HISTSIZE=1000");
        let settings = no_settings();
        let mut ctx = context(&mut host, "login_control.idle_timeout", 300, &settings);
        assert!(matches!(
            IdleTimeout.harden(&mut ctx),
            Err(HardenError::Stop(_))
        ));
    }
}
