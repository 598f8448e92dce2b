//! Process configuration derived from the command line and environment.

use anyhow::{anyhow, Result};
use dbadmin_rest::ClientConfig;
use std::path::PathBuf;
use std::time::Duration;

use crate::Cli;

pub const PASSWORD_ENV: &str = "DBADMIN_PASSWORD";

/// How commands reach the executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    Interactive,
    /// Lines from a file, or stdin for `-`.
    Script(PathBuf),
    /// Trailing words of the command line, run once.
    Single(Vec<String>),
}

#[derive(Debug, Clone)]
pub struct ShellConfig {
    pub client: ClientConfig,
    pub mode: Mode,
    pub continue_on_error: bool,
}

impl ShellConfig {
    pub fn from_cli(cli: Cli, password: String) -> Self {
        let mode = match (cli.script, cli.command.is_empty()) {
            (Some(path), _) => Mode::Script(path),
            (None, false) => Mode::Single(cli.command),
            (None, true) => Mode::Interactive,
        };
        let mut client = ClientConfig::new(cli.host, cli.user, password);
        client.port = cli.port;
        client.timeout = Duration::from_secs(cli.timeout_secs);
        client.verify_tls = cli.verify_tls;
        client.base_url = cli.base_url;

        Self {
            client,
            mode,
            continue_on_error: cli.continue_on_error,
        }
    }
}

/// `DBADMIN_PASSWORD` wins; otherwise prompt on the terminal.
pub fn read_password(
    user: &str,
    env: impl Fn(&str) -> Option<String>,
    prompt: impl FnOnce(&str) -> std::io::Result<String>,
) -> Result<String> {
    if let Some(password) = env(PASSWORD_ENV) {
        return Ok(password);
    }
    prompt(&format!("Password for {user}: ")).map_err(|e| anyhow!("failed to read password: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("dbadmin").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn defaults_to_interactive_on_localhost() {
        let config = ShellConfig::from_cli(parse(&["-u", "admin"]), "pw".into());
        assert_eq!(config.mode, Mode::Interactive);
        assert_eq!(config.client.host, "localhost");
        assert_eq!(config.client.port, 9443);
        assert!(!config.client.verify_tls);
        assert_eq!(
            config.client.api_root().unwrap().as_str(),
            "https://localhost:9443/v1/"
        );
    }

    #[test]
    fn trailing_words_make_a_single_command() {
        let config = ShellConfig::from_cli(
            parse(&["-H", "c1", "-p", "8443", "-u", "a", "change", "cache", "memory", "2"]),
            "pw".into(),
        );
        assert_eq!(
            config.mode,
            Mode::Single(vec!["change".into(), "cache".into(), "memory".into(), "2".into()])
        );
        assert_eq!(config.client.host, "c1");
        assert_eq!(config.client.port, 8443);
    }

    #[test]
    fn script_takes_precedence() {
        let config = ShellConfig::from_cli(
            parse(&["-u", "a", "--script", "-", "--continue-on-error"]),
            "pw".into(),
        );
        assert_eq!(config.mode, Mode::Script(PathBuf::from("-")));
        assert!(config.continue_on_error);
    }

    #[test]
    fn user_is_required() {
        assert!(Cli::try_parse_from(["dbadmin"]).is_err());
    }

    #[test]
    fn password_from_env_skips_prompt() {
        let password = read_password(
            "admin",
            |key| (key == PASSWORD_ENV).then(|| "from-env".to_string()),
            |_| panic!("prompted"),
        )
        .unwrap();
        assert_eq!(password, "from-env");

        let prompted = read_password("admin", |_| None, |p| {
            assert!(p.contains("admin"));
            Ok("typed".into())
        })
        .unwrap();
        assert_eq!(prompted, "typed");
    }
}
