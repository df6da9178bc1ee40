//! Remote session backed by the system `ssh` client.
//!
//! The first connection starts a control master (`ControlMaster=auto`,
//! `ControlPersist=yes`). Later commands reuse its socket, so each command
//! costs one multiplexed channel instead of a full handshake. `close` asks
//! the master to exit.

use crate::error::{Error, Result};
use crate::retry::{LogCallback, with_retry};
use crate::types::{Auth, RemoteOutput, SshConfig};
use std::fs;
use std::io::{ErrorKind, Write};
use std::process::{Command, Stdio};

/// Environment variable carrying the jump host password to its ProxyCommand
pub const VIA_PASSWORD_ENV: &str = "SSHKIT_VIA_PASSWORD";

/// Prompt sudo prints before reading the password from stdin
pub const SUDO_PROMPT: &str = "Password: ";

/// An ssh session to one host.
///
/// Dropping the session closes the control master.
pub struct Session {
    config: SshConfig,
    connected: bool,
}

impl Session {
    /// Create a session. Nothing is started until [`Session::connect`].
    pub fn new(config: SshConfig) -> Self {
        Self {
            config,
            connected: false,
        }
    }

    pub fn config(&self) -> &SshConfig {
        &self.config
    }

    pub fn host(&self) -> &str {
        &self.config.host
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Start the control master, retrying transient failures.
    pub fn connect(&mut self) -> Result<()> {
        if self.connected {
            return Ok(());
        }
        fs::create_dir_all(&self.config.control_dir)?;
        let retry = self.config.retry.clone();
        with_retry(&retry, Some(&LogCallback), || self.open())?;
        log::info!("Connected to {}", self.config.destination());
        Ok(())
    }

    /// Run a command and wait for it.
    ///
    /// A non-zero remote exit status is returned in the output, not as an
    /// error. Dropped connections are reopened and the command retried.
    pub fn run(&mut self, command: &str) -> Result<RemoteOutput> {
        let retry = self.config.retry.clone();
        with_retry(&retry, Some(&LogCallback), || self.run_once(command))
    }

    /// Stop the control master. Safe to call more than once.
    pub fn close(&mut self) {
        if !self.connected {
            return;
        }
        self.connected = false;
        let result = Command::new("ssh")
            .args(["-O", "exit", "-o"])
            .arg(self.control_path_option())
            .arg("-p")
            .arg(self.config.port.to_string())
            .arg(self.config.destination())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
        match result {
            Ok(_) => log::debug!("Closed control master for {}", self.config.host),
            Err(e) => log::debug!("Failed to stop control master for {}: {e}", self.config.host),
        }
    }

    fn open(&mut self) -> Result<()> {
        let out = self.ssh(&["-T"], "true", None)?;
        if !out.success() {
            return Err(Error::from_ssh_output(&self.config.host, &out.stderr).unwrap_or_else(
                || Error::Connect {
                    host: self.config.host.clone(),
                    message: out.combined().trim().to_string(),
                },
            ));
        }
        self.connected = true;
        Ok(())
    }

    fn run_once(&mut self, command: &str) -> Result<RemoteOutput> {
        if !self.connected {
            self.open()?;
        }
        log::debug!("[{}] {command}", self.config.host);

        let remote = self.remote_command(command);
        let (tty, stdin) = match &self.config.become_password {
            Some(password) => ("-tt", Some(format!("{password}\n"))),
            None => ("-T", None),
        };
        let out = self.ssh(&[tty], &remote, stdin.as_deref())?;

        if out.status == 255
            && let Some(err) = Error::from_ssh_output(&self.config.host, &out.combined())
        {
            if err.is_retryable() {
                self.close();
            }
            return Err(err);
        }
        Ok(out)
    }

    /// The command as sent to the host, wrapped in sudo when configured.
    pub(crate) fn remote_command(&self, command: &str) -> String {
        if self.config.become_password.is_some() {
            format!(
                "sudo -S -p {} sh -c {}",
                shell_quote(SUDO_PROMPT),
                shell_quote(command)
            )
        } else {
            command.to_string()
        }
    }

    fn control_path_option(&self) -> String {
        format!(
            "ControlPath={}",
            self.config.control_dir.join("%C").display()
        )
    }

    /// Options shared by every invocation, destination excluded.
    pub(crate) fn base_args(&self) -> Vec<String> {
        let config = &self.config;
        let mut args: Vec<String> = vec![
            "-o".into(),
            "ControlMaster=auto".into(),
            "-o".into(),
            self.control_path_option(),
            "-o".into(),
            "ControlPersist=yes".into(),
            "-o".into(),
            format!("ConnectTimeout={}", config.connect_timeout.as_secs()),
            "-o".into(),
            "ServerAliveInterval=15".into(),
            "-o".into(),
            "ServerAliveCountMax=3".into(),
            "-o".into(),
            "StrictHostKeyChecking=accept-new".into(),
            "-p".into(),
            config.port.to_string(),
        ];

        match &config.auth {
            Auth::Agent => args.extend(["-o".into(), "BatchMode=yes".into()]),
            Auth::KeyFile(path) => args.extend([
                "-i".into(),
                path.display().to_string(),
                "-o".into(),
                "IdentitiesOnly=yes".into(),
                "-o".into(),
                "BatchMode=yes".into(),
            ]),
            Auth::Password(_) => args.extend([
                "-o".into(),
                "PubkeyAuthentication=no".into(),
                "-o".into(),
                "PreferredAuthentications=password,keyboard-interactive".into(),
            ]),
        }

        if let Some(jump) = &config.jump {
            if jump.password.is_some() {
                args.push("-o".into());
                args.push(format!(
                    "ProxyCommand=SSHPASS=\"${VIA_PASSWORD_ENV}\" sshpass -e ssh -W %h:%p \
                     -p {} -o StrictHostKeyChecking=accept-new {}",
                    jump.port,
                    jump.destination()
                ));
            } else {
                args.push("-J".into());
                args.push(format!("{}:{}", jump.destination(), jump.port));
            }
        }

        args
    }

    fn ssh(&self, extra: &[&str], remote: &str, stdin: Option<&str>) -> Result<RemoteOutput> {
        let (program, mut cmd) = match &self.config.auth {
            Auth::Password(password) => {
                let mut cmd = Command::new("sshpass");
                cmd.arg("-e").arg("ssh").env("SSHPASS", password);
                ("sshpass", cmd)
            }
            _ => ("ssh", Command::new("ssh")),
        };
        if let Some(password) = self.config.jump.as_ref().and_then(|j| j.password.as_ref()) {
            cmd.env(VIA_PASSWORD_ENV, password);
        }
        cmd.args(self.base_args())
            .args(extra)
            .arg(self.config.destination())
            .arg(remote)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                Error::ClientNotFound(program)
            } else {
                Error::Io(e)
            }
        })?;
        if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
            pipe.write_all(input.as_bytes())?;
        }
        let output = child.wait_with_output()?;

        Ok(RemoteOutput {
            status: output.status.code().unwrap_or(-1),
            stdout: normalize(&String::from_utf8_lossy(&output.stdout)),
            stderr: normalize(&String::from_utf8_lossy(&output.stderr)),
        })
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}

/// Quote a string for a POSIX shell.
pub fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

fn normalize(s: &str) -> String {
    s.replace("\r\n", "\n")
}
