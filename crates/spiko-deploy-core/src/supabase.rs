//! Typed wrapper around the Supabase CLI

use crate::error::CoreError;
use crate::models::{ProjectRef, SecretKey, SecretValue};
use crate::runner::{CommandOutput, CommandRunner, Invocation};
use tracing::{debug, info};

pub struct SupabaseCli<'a> {
    runner: &'a dyn CommandRunner,
    program: String,
}

impl<'a> SupabaseCli<'a> {
    pub fn new(runner: &'a dyn CommandRunner, program: impl Into<String>) -> Self {
        Self {
            runner,
            program: program.into(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn runner(&self) -> &'a dyn CommandRunner {
        self.runner
    }

    /// Version string of the CLI, or `CliNotFound`
    pub async fn ensure_available(&self) -> Result<String, CoreError> {
        match self.runner.probe(&self.program).await {
            Some(version) => {
                debug!(program = %self.program, %version, "Supabase CLI found");
                Ok(version)
            }
            None => Err(CoreError::CliNotFound {
                program: self.program.clone(),
            }),
        }
    }

    pub fn login_invocation(&self) -> Invocation {
        Invocation::new(&self.program).arg("login").interactive()
    }

    pub fn link_invocation(&self, project_ref: &ProjectRef) -> Invocation {
        Invocation::new(&self.program).args(["link", "--project-ref", project_ref.as_str()])
    }

    pub fn deploy_invocation(&self, function_name: &str) -> Invocation {
        Invocation::new(&self.program).args(["functions", "deploy", function_name])
    }

    pub fn set_secret_invocation(&self, key: SecretKey, value: &SecretValue) -> Invocation {
        Invocation::new(&self.program)
            .args(["secrets", "set"])
            .secret_assignment(key.as_str(), value.expose())
    }

    /// Suggested to the operator after provisioning; never run by the tool
    pub fn list_secrets_invocation(&self) -> Invocation {
        Invocation::new(&self.program).args(["secrets", "list"])
    }

    /// Opens a browser for authentication
    pub async fn login(&self) -> Result<(), CoreError> {
        info!("Logging in to Supabase");
        self.run_checked(&self.login_invocation()).await.map(|_| ())
    }

    pub async fn link(&self, project_ref: &ProjectRef) -> Result<(), CoreError> {
        info!(project_ref = %project_ref, "Linking project");
        self.run_checked(&self.link_invocation(project_ref))
            .await
            .map(|_| ())
    }

    pub async fn deploy_function(&self, function_name: &str) -> Result<(), CoreError> {
        info!(function = function_name, "Deploying edge function");
        self.run_checked(&self.deploy_invocation(function_name))
            .await
            .map(|_| ())
    }

    /// Raw output; the caller decides what a failure means
    pub async fn set_secret(
        &self,
        key: SecretKey,
        value: &SecretValue,
    ) -> Result<CommandOutput, CoreError> {
        self.runner
            .run(&self.set_secret_invocation(key, value))
            .await
    }

    async fn run_checked(&self, invocation: &Invocation) -> Result<CommandOutput, CoreError> {
        let output = self.runner.run(invocation).await?;
        if output.success() {
            Ok(output)
        } else {
            Err(CoreError::CommandFailed {
                command: invocation.to_string(),
                code: output.code,
                stderr: output.stderr,
            })
        }
    }
}
