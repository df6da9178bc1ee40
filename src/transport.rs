//! SSH transport for the hardening engine

use crate::cli::RunArgs;
use crate::config::{SshSettings, expand_path};
use anyhow::Result;
use hardening::{CommandOutput, Transport};
use sshkit::{Auth, JumpHost, RetryConfig, Session, SshConfig};
use std::time::Duration;

/// Runs engine commands over an sshkit session
pub struct SshTransport {
    session: Session,
}

impl SshTransport {
    pub fn new(config: SshConfig) -> Self {
        Self {
            session: Session::new(config),
        }
    }
}

impl Transport for SshTransport {
    fn host(&self) -> &str {
        self.session.host()
    }

    fn connect(&mut self) -> Result<()> {
        Ok(self.session.connect()?)
    }

    fn run(&mut self, command: &str) -> Result<CommandOutput> {
        let out = self.session.run(command)?;
        Ok(CommandOutput::new(out.status, out.combined()))
    }

    fn close(&mut self) {
        self.session.close();
    }
}

/// Build the connection settings for one host
///
/// Command-line options take precedence over the `[ssh]` config section.
pub fn ssh_config(host: &str, args: &RunArgs, settings: &SshSettings) -> SshConfig {
    let mut config = SshConfig::new(host).with_retry(RetryConfig::fixed(
        settings.retry_attempts.max(1),
        Duration::from_secs(settings.retry_interval_secs),
    ));
    config.connect_timeout = Duration::from_secs(settings.connect_timeout_secs);

    if let Some(port) = args.port.or(settings.port) {
        config = config.with_port(port);
    }
    if let Some(user) = args.user.as_ref().or(settings.user.as_ref()) {
        config = config.with_user(user);
    }

    let identity = args
        .identity
        .clone()
        .or_else(|| settings.identity_file.as_deref().map(expand_path));
    config = match (&args.password, identity) {
        (Some(password), _) => config.with_auth(Auth::Password(password.clone())),
        (None, Some(path)) => config.with_auth(Auth::KeyFile(path)),
        (None, None) => config,
    };

    if let Some(password) = &args.become_password {
        config = config.with_become_password(password);
    }
    if let Some(via) = &args.via_host {
        let mut jump = JumpHost::new(via);
        jump.user.clone_from(&args.via_user);
        jump.password.clone_from(&args.via_password);
        if let Some(port) = args.via_port {
            jump.port = port;
        }
        config = config.with_jump(jump);
    }
    if let Some(dir) = &settings.control_dir {
        config = config.with_control_dir(expand_path(dir));
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Command};
    use clap::Parser;
    use std::path::PathBuf;

    fn run_args(extra: &[&str]) -> RunArgs {
        let mut argv = vec!["bastion", "run", "-b", "node", "-H", "10.0.0.5"];
        argv.extend_from_slice(extra);
        match Cli::parse_from(argv).command {
            Command::Run(args) => args,
            _ => panic!("expected the run command"),
        }
    }

    #[test]
    fn test_defaults_from_settings() {
        let settings = SshSettings {
            user: Some("litp-admin".into()),
            port: Some(2222),
            identity_file: Some("/keys/id_rsa".into()),
            ..SshSettings::default()
        };
        let config = ssh_config("10.0.0.5", &run_args(&[]), &settings);
        assert_eq!(config.destination(), "litp-admin@10.0.0.5");
        assert_eq!(config.port, 2222);
        assert_eq!(config.auth, Auth::KeyFile(PathBuf::from("/keys/id_rsa")));
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.base_delay, Duration::from_secs(10));
        assert!(config.jump.is_none());
    }

    #[test]
    fn test_flags_override_settings() {
        let settings = SshSettings {
            user: Some("litp-admin".into()),
            identity_file: Some("/keys/id_rsa".into()),
            ..SshSettings::default()
        };
        let args = run_args(&["-u", "root", "-p", "secret", "--port", "2022"]);
        let config = ssh_config("10.0.0.5", &args, &settings);
        assert_eq!(config.destination(), "root@10.0.0.5");
        assert_eq!(config.port, 2022);
        assert_eq!(config.auth, Auth::Password("secret".into()));
    }

    #[test]
    fn test_jump_host_and_become() {
        let args = run_args(&[
            "--via-host",
            "gateway",
            "--via-user",
            "jump",
            "--via-port",
            "2200",
            "--become-password",
            "root-pw",
        ]);
        let config = ssh_config("10.0.0.5", &args, &SshSettings::default());
        let jump = config.jump.as_ref().unwrap();
        assert_eq!(jump.destination(), "jump@gateway");
        assert_eq!(jump.port, 2200);
        assert!(jump.password.is_none());
        assert_eq!(config.become_password.as_deref(), Some("root-pw"));
        assert_eq!(config.auth, Auth::Agent);
    }
}
