//! End-to-end deploy: CLI check/install, login, link, function deploy,
//! secrets.

use crate::error::CoreError;
use crate::models::{DeployConfig, SecretSet};
use crate::provision::{set_all, ProvisionOptions, ProvisionReport};
use crate::runner::{CommandRunner, Invocation};
use crate::supabase::SupabaseCli;
use serde::Serialize;
use std::fmt;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeployStep {
    CheckCli,
    InstallCli,
    Login,
    Link,
    DeployFunction,
    Secrets,
}

impl fmt::Display for DeployStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DeployStep::CheckCli => "Checking Supabase CLI",
            DeployStep::InstallCli => "Installing Supabase CLI",
            DeployStep::Login => "Logging in to Supabase",
            DeployStep::Link => "Linking to project",
            DeployStep::DeployFunction => "Deploying edge function",
            DeployStep::Secrets => "Setting environment variables",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DeployOptions {
    pub skip_login: bool,
    /// `npm install -g supabase` when the CLI is missing. This only puts
    /// `supabase` on PATH; a custom `cli` program is re-probed as configured.
    pub install_cli: bool,
    pub provision: ProvisionOptions,
}

/// Versions of the tools the deploy may need
#[derive(Debug, Clone, Default, Serialize)]
pub struct ToolVersions {
    pub supabase: Option<String>,
    pub node: Option<String>,
    pub npm: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeployOutcome {
    pub cli_version: String,
    pub provision: ProvisionReport,
    pub api_base_url: String,
}

pub struct Deployer<'a> {
    cli: SupabaseCli<'a>,
    config: &'a DeployConfig,
    observer: Option<&'a (dyn Fn(DeployStep) + Sync)>,
}

impl<'a> Deployer<'a> {
    pub fn new(runner: &'a dyn CommandRunner, config: &'a DeployConfig) -> Self {
        Self {
            cli: SupabaseCli::new(runner, config.cli.clone()),
            config,
            observer: None,
        }
    }

    /// Called when each step starts
    pub fn with_observer(mut self, observer: &'a (dyn Fn(DeployStep) + Sync)) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn cli(&self) -> &SupabaseCli<'a> {
        &self.cli
    }

    fn step(&self, step: DeployStep) {
        info!(step = ?step, "{}", step);
        if let Some(observer) = self.observer {
            observer(step);
        }
    }

    pub async fn tool_versions(&self) -> ToolVersions {
        let runner = self.cli.runner();
        ToolVersions {
            supabase: runner.probe(self.cli.program()).await,
            node: runner.probe("node").await,
            npm: runner.probe("npm").await,
        }
    }

    /// CLI version, installing the `supabase` npm package first if allowed.
    ///
    /// The re-probe after install uses the configured program, so a custom
    /// path that npm does not write to still ends in `CliNotFound`.
    pub async fn ensure_cli(&self, install: bool) -> Result<String, CoreError> {
        self.step(DeployStep::CheckCli);
        match self.cli.ensure_available().await {
            Ok(version) => return Ok(version),
            Err(e) if !install => return Err(e),
            Err(_) => warn!(program = %self.cli.program(), "Supabase CLI not found, installing"),
        }

        self.step(DeployStep::InstallCli);
        let runner = self.cli.runner();
        for tool in ["node", "npm"] {
            if runner.probe(tool).await.is_none() {
                return Err(CoreError::CliNotFound {
                    program: tool.to_string(),
                });
            }
        }

        let install_cmd = Invocation::new("npm").args(["install", "-g", "supabase"]);
        let output = runner.run(&install_cmd).await?;
        if !output.success() {
            return Err(CoreError::CommandFailed {
                command: install_cmd.to_string(),
                code: output.code,
                stderr: output.stderr,
            });
        }

        self.cli.ensure_available().await
    }

    /// Run the whole pipeline with already-resolved secrets.
    ///
    /// Login/link/deploy failures abort before any secret is set.
    pub async fn run(
        &self,
        secrets: &SecretSet,
        options: DeployOptions,
    ) -> Result<DeployOutcome, CoreError> {
        let cli_version = self.ensure_cli(options.install_cli).await?;

        if options.skip_login {
            info!("Skipping login");
        } else {
            self.step(DeployStep::Login);
            self.cli.login().await?;
        }

        self.step(DeployStep::Link);
        self.cli.link(&self.config.project_ref).await?;

        self.step(DeployStep::DeployFunction);
        self.cli.deploy_function(&self.config.function_name).await?;

        self.step(DeployStep::Secrets);
        let provision = set_all(&self.cli, secrets, options.provision).await;

        Ok(DeployOutcome {
            cli_version,
            provision,
            api_base_url: self.config.api_base_url(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::RecordingRunner;
    use parking_lot::Mutex;
    use std::path::Path;

    fn config() -> DeployConfig {
        DeployConfig::defaults(Path::new(".")).unwrap()
    }

    #[tokio::test]
    async fn test_ensure_cli_installs_when_allowed() {
        // The recording runner cannot "install" anything, so a missing
        // supabase stays missing after npm succeeds.
        let runner = RecordingRunner::new().without_program("supabase");
        let config = config();
        let deployer = Deployer::new(&runner, &config);

        let err = deployer.ensure_cli(true).await.unwrap_err();
        assert!(matches!(err, CoreError::CliNotFound { .. }));

        let shown: Vec<_> = runner.calls().iter().map(|c| c.to_string()).collect();
        assert_eq!(
            shown,
            vec!["node --version", "npm --version", "npm install -g supabase"]
        );
    }

    #[tokio::test]
    async fn test_install_uses_npm_package_not_custom_path() {
        let runner = RecordingRunner::new().without_program("/opt/supabase-beta/bin/supabase");
        let mut config = config();
        config.cli = "/opt/supabase-beta/bin/supabase".to_string();
        let deployer = Deployer::new(&runner, &config);

        let err = deployer.ensure_cli(true).await.unwrap_err();
        assert!(
            matches!(err, CoreError::CliNotFound { program } if program == "/opt/supabase-beta/bin/supabase")
        );
        assert!(runner
            .calls()
            .iter()
            .any(|c| c.to_string() == "npm install -g supabase"));
    }

    #[tokio::test]
    async fn test_ensure_cli_needs_npm_to_install() {
        let runner = RecordingRunner::new()
            .without_program("supabase")
            .without_program("npm");
        let config = config();
        let deployer = Deployer::new(&runner, &config);

        let err = deployer.ensure_cli(true).await.unwrap_err();
        assert!(matches!(err, CoreError::CliNotFound { program } if program == "npm"));
        assert!(!runner.calls().iter().any(|c| c.starts_with(&["install"])));
    }

    #[tokio::test]
    async fn test_ensure_cli_without_install_does_nothing_else() {
        let runner = RecordingRunner::new().without_program("supabase");
        let config = config();
        let deployer = Deployer::new(&runner, &config);

        let err = deployer.ensure_cli(false).await.unwrap_err();
        assert!(matches!(err, CoreError::CliNotFound { program } if program == "supabase"));
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_failed_npm_install() {
        let runner = RecordingRunner::new()
            .without_program("supabase")
            .failing_on("npm install", 243);
        let config = config();
        let deployer = Deployer::new(&runner, &config);

        let err = deployer.ensure_cli(true).await.unwrap_err();
        assert_eq!(err.exit_code(), 243);
    }

    #[tokio::test]
    async fn test_observer_sees_steps() {
        let runner = RecordingRunner::new();
        let config = config();
        let seen = Mutex::new(Vec::new());
        let observer = |step: DeployStep| seen.lock().push(step);
        let deployer = Deployer::new(&runner, &config).with_observer(&observer);

        deployer.ensure_cli(false).await.unwrap();
        assert_eq!(*seen.lock(), vec![DeployStep::CheckCli]);
    }

    #[tokio::test]
    async fn test_tool_versions() {
        let runner = RecordingRunner::new().without_program("node");
        let config = config();
        let versions = Deployer::new(&runner, &config).tool_versions().await;

        assert_eq!(versions.supabase.as_deref(), Some("dry-run"));
        assert!(versions.node.is_none());
        assert_eq!(versions.npm.as_deref(), Some("dry-run"));
    }
}
