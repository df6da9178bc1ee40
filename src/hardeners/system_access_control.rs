//! System access control - account locking and login banner

use hardening::{
    HardenError, HardenResult, Hardener, HardenerRegistry, SchemaError, TopicContext, TopicKey,
    Value, done, found, quote,
};
use regex::Regex;
use std::sync::LazyLock;

use super::{expected_bool, expected_items};

const SECTION: &str = "system_access_control";

const PAM_FILES: [&str; 2] = ["/etc/pam.d/system-auth", "/etc/pam.d/password-auth"];

static FAILLOCK_PREAUTH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*auth\s+required\s+pam_faillock\.so\s+preauth\s+silent\s+audit\s+deny=(\d+)\s+unlock_time=(\d+)\s*",
    )
    .expect("valid preauth regex")
});

static FAILLOCK_AUTHFAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*auth\s+\[default=die\]\s+pam_faillock\.so\s+authfail\s+audit\s+deny=(\d+)\s+unlock_time=(\d+)\s*",
    )
    .expect("valid authfail regex")
});

static PAM_UNIX_AUTH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"auth\s+sufficient\s+pam_unix\.so").expect("valid pam_unix regex"));

const BANNER_FILE: &str = "/etc/issue";
const BANNER_PHRASE: &str = "This system is for authorised use only. By using this system you consent to monitoring and data collection.";

pub fn register(registry: &mut HardenerRegistry) -> Result<(), SchemaError> {
    registry.register(AccountLocking)?;
    registry.register(LoginBannerPresent)?;
    Ok(())
}

/// pam_faillock `deny` and `unlock_time`
type Locking = (i64, i64);

fn captured(re: &Regex, line: &str) -> Option<Locking> {
    let caps = re.captures(line)?;
    Some((caps[1].parse().ok()?, caps[2].parse().ok()?))
}

/// Locking configured in `content`, when both faillock lines agree
fn parse_locking(content: &str) -> Option<Locking> {
    let preauth = content.lines().find_map(|l| captured(&FAILLOCK_PREAUTH, l))?;
    let authfail = content.lines().find_map(|l| captured(&FAILLOCK_AUTHFAIL, l))?;
    (preauth == authfail).then_some(preauth)
}

/// `content` with the faillock lines placed around the single pam_unix auth line
fn with_faillock(content: &str, (deny, unlock): Locking) -> Option<Vec<String>> {
    let preauth = format!(
        "auth        required      pam_faillock.so preauth silent audit deny={deny} unlock_time={unlock}"
    );
    let authfail = format!(
        "auth        [default=die] pam_faillock.so authfail audit deny={deny} unlock_time={unlock}"
    );
    let mut updated = Vec::new();
    let mut anchors = 0;
    for line in content.lines() {
        if FAILLOCK_PREAUTH.is_match(line) || FAILLOCK_AUTHFAIL.is_match(line) {
            continue;
        }
        if PAM_UNIX_AUTH.is_match(line) {
            updated.push(preauth.clone());
            updated.push(line.to_string());
            updated.push(authfail.clone());
            anchors += 1;
            continue;
        }
        updated.push(line.to_string());
    }
    (anchors == 1).then_some(updated)
}

fn expected_locking(ctx: &TopicContext<'_>) -> Result<Locking, HardenError> {
    let items = expected_items(ctx)?;
    match items.as_slice() {
        [deny, unlock] => match (deny.as_int(), unlock.as_int()) {
            (Some(deny), Some(unlock)) => Ok((deny, unlock)),
            _ => Err(HardenError::stop(format!(
                "{} expects (deny, unlock_time) integers, got {}",
                ctx.key, ctx.expected
            ))),
        },
        _ => Err(HardenError::stop(format!(
            "{} expects a (deny, unlock_time) pair, got {}",
            ctx.key, ctx.expected
        ))),
    }
}

struct AccountLocking;

impl AccountLocking {
    fn current(ctx: &mut TopicContext<'_>, pam_file: &str) -> Result<Option<Locking>, HardenError> {
        Ok(parse_locking(&ctx.shell.read_file(pam_file)?))
    }
}

impl Hardener for AccountLocking {
    fn key(&self) -> TopicKey {
        TopicKey::new(SECTION, "account_locking")
    }

    /// An empty tuple when neither file configures faillock, no value when
    /// the files disagree
    fn check(&self, ctx: &mut TopicContext<'_>) -> HardenResult<Option<Value>> {
        let mut seen = Vec::new();
        for pam_file in PAM_FILES {
            seen.push(Self::current(ctx, pam_file)?);
        }
        if seen.windows(2).any(|pair| pair[0] != pair[1]) {
            return done(None);
        }
        match seen.first().copied().flatten() {
            Some((deny, unlock)) => found(Value::tuple([deny, unlock])),
            None => found(Value::tuple(Vec::<Value>::new())),
        }
    }

    fn harden(&self, ctx: &mut TopicContext<'_>) -> HardenResult<String> {
        let expected = expected_locking(ctx)?;
        let mut report = Vec::new();
        for pam_file in PAM_FILES {
            let content = ctx.shell.read_file(pam_file)?;
            if parse_locking(&content) == Some(expected) {
                report.push(format!(
                    "File {pam_file} already updated with pam_faillock account locking configuration"
                ));
                continue;
            }
            let Some(lines) = with_faillock(&content, expected) else {
                return Err(HardenError::stop(format!(
                    "Can't update {pam_file} with pam_faillock configuration changes"
                )));
            };

            ctx.shell.run(&format!("cp {pam_file} {pam_file}.bkp"))?;
            let quoted: Vec<String> = lines.iter().map(|l| quote(l)).collect();
            ctx.shell.run(&format!(
                "printf '%s\\n' {} > {pam_file}.new",
                quoted.join(" ")
            ))?;
            ctx.shell.run(&format!("mv {pam_file}.new {pam_file}"))?;
            report.push(format!(
                "File {pam_file} updated with pam_faillock account locking configuration"
            ));
        }
        done(report.join("\n"))
    }
}

struct LoginBannerPresent;

impl Hardener for LoginBannerPresent {
    fn key(&self) -> TopicKey {
        TopicKey::new(SECTION, "login_banner_present")
    }

    fn check(&self, ctx: &mut TopicContext<'_>) -> HardenResult<Option<Value>> {
        let out = ctx.shell.read_file(BANNER_FILE)?;
        found(out.contains(BANNER_PHRASE))
    }

    fn harden(&self, ctx: &mut TopicContext<'_>) -> HardenResult<String> {
        let present = expected_bool(ctx)?;
        ctx.shell.run(&format!(": > {BANNER_FILE}"))?;
        if !present {
            return done(format!(
                "A login banner should not be present, cleared the file {BANNER_FILE}."
            ));
        }
        let banner = format!(
            "###########  WARNING  ############\n\n{BANNER_PHRASE}\n\n##################################"
        );
        ctx.shell.insert_line_in_file(BANNER_FILE, &banner)?;
        done(format!(
            "Cleared the {BANNER_FILE} file and added the new banner."
        ))
    }
}
