//! Push the resolved secrets to the project's secret store

use crate::error::CoreError;
use crate::models::{SecretKey, SecretSet};
use crate::supabase::SupabaseCli;
use serde::Serialize;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, Default)]
pub struct ProvisionOptions {
    /// Attempt every key even after a failure
    pub keep_going: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SecretOutcome {
    Set,
    Failed { code: Option<i32>, message: String },
    /// Not attempted because an earlier key failed
    Skipped,
}

#[derive(Debug, Clone, Serialize)]
pub struct SecretResult {
    pub key: SecretKey,
    #[serde(flatten)]
    pub outcome: SecretOutcome,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ProvisionReport {
    pub results: Vec<SecretResult>,
    /// Exit code of the last command executed (0 when nothing failed last)
    pub exit_code: i32,
}

impl ProvisionReport {
    pub fn is_success(&self) -> bool {
        self.results
            .iter()
            .all(|r| r.outcome == SecretOutcome::Set)
    }

    pub fn set_count(&self) -> usize {
        self.count(|o| matches!(o, SecretOutcome::Set))
    }

    pub fn failed_count(&self) -> usize {
        self.count(|o| matches!(o, SecretOutcome::Failed { .. }))
    }

    pub fn skipped_count(&self) -> usize {
        self.count(|o| matches!(o, SecretOutcome::Skipped))
    }

    fn count(&self, pred: impl Fn(&SecretOutcome) -> bool) -> usize {
        self.results.iter().filter(|r| pred(&r.outcome)).count()
    }
}

/// Check the CLI is installed, then set every secret.
///
/// A missing CLI aborts before any secret is touched.
pub async fn provision_secrets(
    cli: &SupabaseCli<'_>,
    secrets: &SecretSet,
    options: ProvisionOptions,
) -> Result<ProvisionReport, CoreError> {
    cli.ensure_available().await?;
    Ok(set_all(cli, secrets, options).await)
}

/// Set every secret in order without the availability check.
///
/// Sequential, no retries, no rollback.
pub async fn set_all(
    cli: &SupabaseCli<'_>,
    secrets: &SecretSet,
    options: ProvisionOptions,
) -> ProvisionReport {
    let mut report = ProvisionReport::default();
    let mut stopped = false;

    for secret in secrets.iter() {
        if stopped {
            report.results.push(SecretResult {
                key: secret.key,
                outcome: SecretOutcome::Skipped,
            });
            continue;
        }

        let outcome = match cli.set_secret(secret.key, &secret.value).await {
            Ok(output) if output.success() => {
                info!(key = %secret.key, "Secret set");
                report.exit_code = 0;
                SecretOutcome::Set
            }
            Ok(output) => {
                warn!(key = %secret.key, code = ?output.code, "Failed to set secret");
                report.exit_code = output.exit_code();
                let stderr = output.stderr.trim();
                SecretOutcome::Failed {
                    code: output.code,
                    message: if stderr.is_empty() {
                        "secrets set exited non-zero".to_string()
                    } else {
                        stderr.to_string()
                    },
                }
            }
            Err(e) => {
                warn!(key = %secret.key, error = %e, "Failed to run secrets set");
                report.exit_code = e.exit_code();
                SecretOutcome::Failed {
                    code: None,
                    message: e.to_string(),
                }
            }
        };

        if matches!(outcome, SecretOutcome::Failed { .. }) && !options.keep_going {
            stopped = true;
        }

        report.results.push(SecretResult {
            key: secret.key,
            outcome,
        });
    }

    report
}
