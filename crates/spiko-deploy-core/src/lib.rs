//! spiko-deploy-core - Core library for spiko-deploy
//!
//! Config loading, secret resolution, and a typed driver for the Supabase
//! CLI used to deploy the Spiko edge function and provision its secrets.

pub mod deploy;
pub mod error;
pub mod models;
pub mod parsers;
pub mod provision;
pub mod resolver;
pub mod runner;
pub mod scaffold;
pub mod supabase;

pub use deploy::{DeployOptions, DeployOutcome, DeployStep, Deployer, ToolVersions};
pub use error::{CoreError, LoadReport};
pub use provision::{provision_secrets, ProvisionOptions, ProvisionReport, SecretOutcome};
pub use resolver::SecretResolver;
pub use runner::{CommandRunner, Invocation, RecordingRunner, SystemRunner};
pub use supabase::SupabaseCli;
