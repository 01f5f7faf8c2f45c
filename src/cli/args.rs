// ABOUTME: Command line argument definitions and parsing using Clap
// ABOUTME: Defines the filter-builder CLI structure and its validate/render subcommands

use clap::{Parser, Subcommand, ValueEnum};
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "filter-builder")]
#[command(about = "Validate and render template-driven pipeline builders")]
#[command(version)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(short, long, global = true, help = "Path to configuration file")]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, help = "Disable colored output")]
    pub no_color: bool,
}

/// What the rendered document is decoded into
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BuildKind {
    /// Any YAML value
    Value,
    /// An HTTP request (method, url, headers, body)
    Request,
    /// An HTTP response (statusCode, headers, body)
    Response,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Validate and compile a builder spec
    Validate {
        #[arg(help = "Path to builder spec YAML file")]
        spec: PathBuf,
    },

    /// Build against a pipeline context and print the result
    Render {
        #[arg(help = "Path to builder spec YAML file")]
        spec: PathBuf,

        #[arg(long, help = "Path to pipeline context YAML file")]
        context: Option<PathBuf>,

        #[arg(long, value_enum, default_value = "value", help = "Decode target")]
        kind: BuildKind,

        #[arg(
            short = 'V',
            long = "var",
            help = "Extra shared data entries (key=value)"
        )]
        vars: Vec<String>,
    },
}

impl Args {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Parse variables from key=value format
    pub fn parse_variables(vars: &[String]) -> anyhow::Result<BTreeMap<String, String>> {
        let mut variables = BTreeMap::new();

        for var in vars {
            if let Some((key, value)) = var.split_once('=') {
                variables.insert(key.to_string(), value.to_string());
            } else {
                return Err(anyhow::anyhow!(
                    "Invalid variable format '{}'. Expected 'key=value'",
                    var
                ));
            }
        }

        Ok(variables)
    }
}
