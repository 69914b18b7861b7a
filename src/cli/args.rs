use crate::constants::{exit_codes, verbosity};
use crate::error::{Error, Result};
use clap::{error::ErrorKind, Args, CommandFactory, Parser, Subcommand};
use indexmap::IndexMap;
use log::LevelFilter;
use std::path::PathBuf;
use uuid::Uuid;

const HELP_TEMPLATE: &str = r#"{about-section}
{usage-heading} {usage}

{all-args}
{after-help}
"#;

/// Command line interface of maker.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Flags accepted by every command.
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Increase logging verbosity (`-v`, `-vv`, `-vvv`).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Expect and produce file names with the fixture suffix.
    #[arg(long, global = true)]
    pub fixture: bool,

    /// Write Go files without running the formatter.
    #[arg(long = "no-format", global = true)]
    pub no_format: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Print the namespaces declared by a template.
    Schema(SchemaArgs),
    /// Print every node of a project with its values as JSON.
    Tree(ProjectArgs),
    /// Create a node and write it to disk.
    Create(CreateArgs),
    /// Change values of a node and write them to disk.
    Set(SetArgs),
    /// Delete a node and its files.
    Delete(DeleteArgs),
}

#[derive(Args, Debug, Clone)]
pub struct SchemaArgs {
    /// Template directory.
    #[arg(value_name = "TEMPLATE")]
    pub template: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct ProjectArgs {
    /// Template directory.
    #[arg(value_name = "TEMPLATE")]
    pub template: PathBuf,

    /// Root directory of the generated project.
    #[arg(value_name = "PROJECT")]
    pub project: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct CreateArgs {
    #[command(flatten)]
    pub target: ProjectArgs,

    /// Parent node, as `namespace:name` steps separated by `/`. Empty for the root.
    #[arg(long, default_value = "")]
    pub at: String,

    /// Namespace of the new node.
    #[arg(short, long)]
    pub namespace: String,

    /// Field values as a JSON object.
    #[arg(long, default_value = "{}")]
    pub values: String,

    /// Identifier of the new node. Random when omitted.
    #[arg(long)]
    pub id: Option<Uuid>,
}

#[derive(Args, Debug, Clone)]
pub struct SetArgs {
    #[command(flatten)]
    pub target: ProjectArgs,

    /// Node to edit, as `namespace:name` steps separated by `/`.
    #[arg(long, default_value = "")]
    pub at: String,

    /// Field values as a JSON object.
    #[arg(long)]
    pub values: String,
}

#[derive(Args, Debug, Clone)]
pub struct DeleteArgs {
    #[command(flatten)]
    pub target: ProjectArgs,

    /// Node to delete, as `namespace:name` steps separated by `/`.
    #[arg(long)]
    pub at: String,
}

/// One step of a node selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorStep {
    pub namespace: String,
    pub name: String,
}

/// Parses `service:billing/entity:invoice` into its steps.
pub fn parse_selector(selector: &str) -> Result<Vec<SelectorStep>> {
    if selector.trim().is_empty() {
        return Ok(Vec::new());
    }
    selector
        .split('/')
        .map(|step| {
            let (namespace, name) = step.split_once(':').ok_or_else(|| {
                Error::Other(anyhow::anyhow!("Selector step '{step}' is not 'namespace:name'"))
            })?;
            Ok(SelectorStep { namespace: namespace.trim().to_string(), name: name.trim().to_string() })
        })
        .collect()
}

/// Parses a JSON object of field values. Strings are taken as they are,
/// `false` and `null` become empty, anything else its JSON text.
pub fn parse_values(json: &str) -> Result<IndexMap<String, String>> {
    let raw: IndexMap<String, serde_json::Value> = serde_json::from_str(json)?;
    Ok(raw
        .into_iter()
        .map(|(key, value)| {
            let value = match value {
                serde_json::Value::String(s) => s,
                serde_json::Value::Null | serde_json::Value::Bool(false) => String::new(),
                other => other.to_string(),
            };
            (key, value)
        })
        .collect())
}

/// Parse command line arguments, printing help when a required one is missing.
pub fn parse_cli() -> Cli {
    Cli::try_parse().unwrap_or_else(|e| {
        if e.kind() == ErrorKind::MissingRequiredArgument {
            let mut command = Cli::command().help_template(HELP_TEMPLATE);
            if let Err(print_err) = command.print_help() {
                eprintln!("Failed to display help information: {print_err}");
            } else {
                println!();
            }
            std::process::exit(exit_codes::FAILURE);
        } else {
            e.exit();
        }
    })
}

/// Map `-v` counts to the appropriate log level.
pub fn get_log_level_from_verbose(verbose_count: u8) -> LevelFilter {
    match verbose_count {
        verbosity::OFF => LevelFilter::Error,
        verbosity::INFO => LevelFilter::Info,
        verbosity::DEBUG => LevelFilter::Debug,
        verbosity::TRACE.. => LevelFilter::Trace,
    }
}
