//! Terminal and JSON rendering for spiko-deploy subcommands

use comfy_table::{Cell, Color, ContentArrangement, Row, Table};
use serde::Serialize;
use spiko_deploy_core::deploy::ToolVersions;
use spiko_deploy_core::models::{Route, SecretSet};
use spiko_deploy_core::provision::{ProvisionReport, SecretOutcome};
use spiko_deploy_core::runner::Invocation;

// ============================================================================
// Table Helpers
// ============================================================================

fn new_table(headers: &[&str], no_color: bool) -> Table {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);

    if no_color {
        table.set_header(headers.to_vec());
    } else {
        table.set_header(
            headers
                .iter()
                .map(|h| Cell::new(h).fg(Color::Cyan))
                .collect::<Vec<_>>(),
        );
    }
    table
}

fn status_cell(text: &str, color: Color, no_color: bool) -> Cell {
    if no_color {
        Cell::new(text)
    } else {
        Cell::new(text).fg(color)
    }
}

// ============================================================================
// Secrets
// ============================================================================

#[derive(Serialize)]
struct SecretRow {
    key: &'static str,
    value: String,
    source: String,
    description: &'static str,
}

/// Resolved secrets with their sources; credentials are masked
pub fn format_secret_table(secrets: &SecretSet, json: bool, no_color: bool) -> String {
    let rows: Vec<SecretRow> = secrets
        .iter()
        .map(|s| SecretRow {
            key: s.key.as_str(),
            value: s.display_value(),
            source: s.source.to_string(),
            description: s.key.description(),
        })
        .collect();

    if json {
        return serde_json::to_string_pretty(&rows).unwrap_or_else(|_| "[]".to_string());
    }

    let mut table = new_table(&["Secret", "Value", "Source", "Purpose"], no_color);
    for row in &rows {
        table.add_row(Row::from(vec![
            row.key,
            &row.value,
            &row.source,
            row.description,
        ]));
    }
    table.to_string()
}

// ============================================================================
// Routes
// ============================================================================

#[derive(Serialize)]
struct RouteRow<'a> {
    #[serde(flatten)]
    route: &'a Route,
    url: String,
}

pub fn format_route_table(
    routes: &[Route],
    function_base_url: &str,
    json: bool,
    no_color: bool,
) -> String {
    if json {
        let rows: Vec<RouteRow> = routes
            .iter()
            .map(|route| RouteRow {
                route,
                url: route.url(function_base_url),
            })
            .collect();
        return serde_json::to_string_pretty(&rows).unwrap_or_else(|_| "[]".to_string());
    }

    let mut table = new_table(&["Method", "Path", "Auth", "Summary", "URL"], no_color);
    for route in routes {
        let method = route.method.to_string();
        let auth = if route.requires_auth { "bearer" } else { "-" };
        let url = route.url(function_base_url);
        table.add_row(Row::from(vec![
            method.as_str(),
            route.path,
            auth,
            route.summary,
            &url,
        ]));
    }
    table.to_string()
}

// ============================================================================
// Provisioning
// ============================================================================

pub fn format_provision_report(report: &ProvisionReport, json: bool, no_color: bool) -> String {
    if json {
        return serde_json::to_string_pretty(report).unwrap_or_else(|_| "{}".to_string());
    }

    let mut table = new_table(&["Secret", "Status", "Detail"], no_color);
    for result in &report.results {
        let (status, detail) = match &result.outcome {
            SecretOutcome::Set => (status_cell("set", Color::Green, no_color), String::new()),
            SecretOutcome::Failed { code, message } => {
                let code = code.map_or_else(|| "signal".to_string(), |c| c.to_string());
                (
                    status_cell("failed", Color::Red, no_color),
                    format!("[{}] {}", code, first_line(message)),
                )
            }
            SecretOutcome::Skipped => (
                status_cell("skipped", Color::Yellow, no_color),
                "not attempted".to_string(),
            ),
        };
        table.add_row(Row::from(vec![
            Cell::new(result.key.as_str()),
            status,
            Cell::new(detail),
        ]));
    }

    format!(
        "{}\n{} set, {} failed, {} skipped",
        table,
        report.set_count(),
        report.failed_count(),
        report.skipped_count()
    )
}

// ============================================================================
// Tools
// ============================================================================

pub fn format_tool_versions(versions: &ToolVersions, program: &str, no_color: bool) -> String {
    let mut table = new_table(&["Tool", "Version"], no_color);
    let tools = [
        (program, &versions.supabase),
        ("node", &versions.node),
        ("npm", &versions.npm),
    ];
    for (tool, version) in tools {
        let cell = match version {
            Some(v) => Cell::new(first_line(v)),
            None => status_cell("not found", Color::Red, no_color),
        };
        table.add_row(Row::from(vec![Cell::new(tool), cell]));
    }
    table.to_string()
}

/// Commands a dry run would have executed, secrets redacted
pub fn format_invocations(calls: &[Invocation]) -> String {
    calls
        .iter()
        .map(|c| format!("  $ {}", c))
        .collect::<Vec<_>>()
        .join("\n")
}

fn first_line(s: &str) -> &str {
    s.lines().next().unwrap_or("").trim()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use spiko_deploy_core::models::{DeployConfig, SecretKey, ROUTES};
    use spiko_deploy_core::provision::SecretResult;
    use spiko_deploy_core::SecretResolver;
    use std::path::Path;

    fn secrets() -> SecretSet {
        let config = DeployConfig::defaults(Path::new(".")).unwrap();
        SecretResolver::new(&config)
            .with_process_env(vec![
                (
                    "OPENROUTER_API_KEY".to_string(),
                    "sk-or-v1-abcdefghijklmnop".to_string(),
                ),
                (
                    "TELEGRAM_BOT_TOKEN".to_string(),
                    "123456:ABCdefGHIjkl".to_string(),
                ),
            ])
            .resolve()
            .unwrap()
    }

    #[test]
    fn test_secret_table_masks_credentials() {
        let output = format_secret_table(&secrets(), false, true);
        assert!(output.contains("OPENROUTER_API_KEY"));
        assert!(!output.contains("sk-or-v1-abcdefghijklmnop"));
        assert!(!output.contains("123456:ABCdefGHIjkl"));
        // Non-credentials are shown as-is
        assert!(output.contains("https://qxaflkmpeavucazxqzmu.supabase.co"));
    }

    #[test]
    fn test_secret_table_json() {
        let output = format_secret_table(&secrets(), true, false);
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        let rows = value.as_array().unwrap();
        assert_eq!(rows.len(), 5);
        assert_eq!(rows[0]["key"], "OPENROUTER_API_KEY");
        assert_eq!(rows[0]["source"], "environment");
        assert!(!output.contains("sk-or-v1-abcdefghijklmnop"));
    }

    #[test]
    fn test_route_table() {
        let base = "https://qxaflkmpeavucazxqzmu.supabase.co/functions/v1/spiko-api";
        let output = format_route_table(ROUTES, base, false, true);
        assert!(output.contains("/api/login"));
        assert!(output.contains("bearer"));

        let json = format_route_table(ROUTES, base, true, true);
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value.as_array().unwrap().len(), ROUTES.len());
        assert_eq!(value[0]["method"], "POST");
        assert_eq!(value[0]["url"], format!("{}/api/login", base));
    }

    #[test]
    fn test_provision_report_summary() {
        let report = ProvisionReport {
            results: vec![
                SecretResult {
                    key: SecretKey::OpenRouterApiKey,
                    outcome: SecretOutcome::Set,
                },
                SecretResult {
                    key: SecretKey::ProjectUrl,
                    outcome: SecretOutcome::Failed {
                        code: Some(1),
                        message: "unauthorized\nmore".to_string(),
                    },
                },
                SecretResult {
                    key: SecretKey::TelegramBotToken,
                    outcome: SecretOutcome::Skipped,
                },
            ],
            exit_code: 1,
        };

        let output = format_provision_report(&report, false, true);
        assert!(output.contains("[1] unauthorized"));
        assert!(!output.contains("more"));
        assert!(output.ends_with("1 set, 1 failed, 1 skipped"));

        let json = format_provision_report(&report, true, true);
        assert!(json.contains("\"exit_code\": 1"));
    }

    #[test]
    fn test_tool_versions_missing() {
        let versions = ToolVersions {
            supabase: Some("2.20.5".to_string()),
            node: None,
            npm: Some("10.8.2".to_string()),
        };
        let output = format_tool_versions(&versions, "supabase", true);
        assert!(output.contains("2.20.5"));
        assert!(output.contains("not found"));
    }

    #[test]
    fn test_format_invocations_redacted() {
        let calls = vec![Invocation::new("supabase")
            .args(["secrets", "set"])
            .secret_assignment("OPENROUTER_API_KEY", "sk-or-v1-x")];
        assert_eq!(
            format_invocations(&calls),
            "  $ supabase secrets set OPENROUTER_API_KEY=<masked>"
        );
    }
}
