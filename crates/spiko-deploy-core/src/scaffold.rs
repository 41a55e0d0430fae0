//! Local Supabase config and operator guide generation
//!
//! Writes `supabase/config.toml` and `SUPABASE_DEPLOYMENT.md`. The edge
//! function source itself is never generated.

use crate::error::CoreError;
use crate::models::{DeployConfig, SecretKey, ROUTES};
use chrono::{DateTime, Utc};
use std::fmt::{self, Write as _};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const SUPABASE_CONFIG_PATH: &str = "supabase/config.toml";
pub const GUIDE_PATH: &str = "SUPABASE_DEPLOYMENT.md";

/// Tables the backend keeps in the project database
pub const TABLES: [(&str, &str); 3] = [
    ("users", "User authentication and profiles"),
    ("session_usage", "Session tracking"),
    ("feedback_summary", "AI feedback storage"),
];

#[derive(Debug, Clone)]
pub struct ScaffoldOptions {
    pub root: PathBuf,
    /// Overwrite files that already exist
    pub force: bool,
}

#[derive(Debug, Default)]
pub struct ScaffoldReport {
    pub written: Vec<PathBuf>,
    /// Existing files left untouched
    pub skipped: Vec<PathBuf>,
}

/// Generate both files under `options.root`
pub async fn scaffold(
    config: &DeployConfig,
    options: &ScaffoldOptions,
    generated_at: DateTime<Utc>,
) -> Result<ScaffoldReport, CoreError> {
    let mut report = ScaffoldReport::default();

    let files = [
        (
            options.root.join(SUPABASE_CONFIG_PATH),
            render_supabase_config(),
        ),
        (
            options.root.join(GUIDE_PATH),
            render_deployment_guide(config, generated_at),
        ),
    ];

    for (path, content) in files {
        if !options.force && file_exists(&path).await? {
            warn!(?path, "File exists, skipping (use --force to overwrite)");
            report.skipped.push(path);
            continue;
        }
        write_file(&path, &content).await?;
        info!(?path, "Wrote file");
        report.written.push(path);
    }

    Ok(report)
}

async fn file_exists(path: &Path) -> Result<bool, CoreError> {
    tokio::fs::try_exists(path)
        .await
        .map_err(|e| CoreError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })
}

async fn write_file(path: &Path, content: &str) -> Result<(), CoreError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| CoreError::FileWrite {
                path: parent.to_path_buf(),
                source: e,
            })?;
    }
    tokio::fs::write(path, content)
        .await
        .map_err(|e| CoreError::FileWrite {
            path: path.to_path_buf(),
            source: e,
        })
}

/// Local development stack config for `supabase start`
pub fn render_supabase_config() -> String {
    r#"[api]
enabled = true
port = 54321
schemas = ["public", "graphql_public"]
extra_search_path = ["public", "extensions"]
max_rows = 1000

[auth]
enabled = true
site_url = "http://localhost:3000"
additional_redirect_urls = ["https://your-domain.com"]
jwt_expiry = 3600
enable_signup = true

[auth.email]
enable_signup = true
double_confirm_changes = true
enable_confirmations = false

[db]
port = 54322

[studio]
enabled = true
port = 54323

[inbucket]
enabled = true
port = 54324

[storage]
enabled = true
file_size_limit = "50MiB"

[edge_functions]
enabled = true

[analytics]
enabled = false
"#
    .to_string()
}

/// Markdown guide for operators. Lists secret names, never values.
pub fn render_deployment_guide(config: &DeployConfig, generated_at: DateTime<Utc>) -> String {
    let mut out = String::new();
    // fmt::Write for String only fails if a Display impl does
    match write_deployment_guide(&mut out, config, generated_at) {
        Ok(()) => out,
        Err(_) => String::new(),
    }
}

fn write_deployment_guide(
    out: &mut String,
    config: &DeployConfig,
    generated_at: DateTime<Utc>,
) -> fmt::Result {
    let cli = &config.cli;
    let project_ref = config.project_ref.as_str();
    let project_url = config.project_url();
    let function_base = config.function_base_url();

    writeln!(out, "# Spiko Backend Deployment to Supabase")?;
    writeln!(out)?;
    writeln!(
        out,
        "_Generated by spiko-deploy on {}._",
        generated_at.format("%Y-%m-%d")
    )?;
    writeln!(out)?;
    writeln!(out, "## Project Information")?;
    writeln!(out, "- **Project ID**: {}", project_ref)?;
    writeln!(out, "- **Project URL**: {}", project_url)?;
    writeln!(out, "- **Function**: {}", config.function_name)?;
    writeln!(out, "- **Database**: PostgreSQL (Supabase)")?;
    writeln!(out)?;

    writeln!(out, "## Deployment Steps")?;
    writeln!(out)?;
    let steps: [(&str, String); 4] = [
        ("Install Supabase CLI", "npm install -g supabase".to_string()),
        ("Login to Supabase", format!("{} login", cli)),
        (
            "Link to your project",
            format!("{} link --project-ref {}", cli, project_ref),
        ),
        (
            "Deploy Edge Functions",
            format!("{} functions deploy {}", cli, config.function_name),
        ),
    ];
    for (i, (title, command)) in steps.iter().enumerate() {
        writeln!(out, "### {}. {}", i + 1, title)?;
        writeln!(out, "```bash\n{}\n```", command)?;
        writeln!(out)?;
    }

    writeln!(out, "### 5. Set Environment Variables")?;
    writeln!(
        out,
        "Values are read from the environment or the env file; run `spiko-deploy provision`, or by hand:"
    )?;
    writeln!(out, "```bash")?;
    for key in SecretKey::ALL {
        let placeholder = match key {
            SecretKey::ProjectUrl => project_url.clone(),
            _ => format!("<{}>", key.as_str().to_ascii_lowercase()),
        };
        writeln!(out, "{} secrets set {}={}", cli, key, placeholder)?;
    }
    writeln!(out, "```")?;
    writeln!(out)?;
    writeln!(out, "| Secret | Purpose |")?;
    writeln!(out, "|--------|---------|")?;
    for key in SecretKey::ALL {
        writeln!(out, "| `{}` | {} |", key, key.description())?;
    }
    writeln!(out)?;
    writeln!(out, "Verify with `{} secrets list`.", cli)?;
    writeln!(out)?;

    writeln!(out, "### 6. Update Frontend Configuration")?;
    writeln!(out, "```javascript")?;
    writeln!(out, "const API_BASE_URL = '{}';", function_base)?;
    writeln!(out, "```")?;
    writeln!(out)?;

    writeln!(out, "## Database Schema")?;
    writeln!(out, "The backend uses these tables:")?;
    for (name, purpose) in TABLES {
        writeln!(out, "- `{}` - {}", name, purpose)?;
    }
    writeln!(out)?;

    writeln!(out, "## API Endpoints")?;
    writeln!(out, "All routes are served under `{}`:", function_base)?;
    for route in ROUTES {
        let auth = if route.requires_auth { " (bearer token)" } else { "" };
        writeln!(
            out,
            "- `{} {}` - {}{}",
            route.method,
            route.url(&function_base),
            route.summary,
            auth
        )?;
    }

    Ok(())
}
