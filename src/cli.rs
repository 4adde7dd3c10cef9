// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines all subcommands and their arguments.

use clap::{Parser, Subcommand, ValueEnum};
use deckhand::output::OutputMode;
use deckhand::types::{PreviewId, TargetId};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "deckhand")]
#[command(about = "Build, deploy and route containers with zero-downtime cutover")]
#[command(version)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Minimal output for CI
    #[arg(short, long, global = true, conflicts_with = "json")]
    pub quiet: bool,

    /// JSON lines output for scripting
    #[arg(long, global = true)]
    pub json: bool,

    /// Configuration file (default: discovered from the working directory)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn output_mode(&self) -> OutputMode {
        if self.json {
            OutputMode::Json
        } else if self.quiet {
            OutputMode::Quiet
        } else {
            OutputMode::Normal
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new deckhand.yml configuration file
    Init {
        /// Name of the first target in the template
        #[arg(short, long)]
        target: Option<String>,

        /// Overwrite an existing configuration file
        #[arg(short, long)]
        force: bool,
    },

    /// Queue a build of a target and run it
    Deploy {
        target: TargetId,

        /// Pull request id of a preview deployment
        #[arg(long)]
        preview: Option<PreviewId>,

        /// Stream the build log while waiting
        #[arg(short, long)]
        follow: bool,
    },

    /// Run the work queue until interrupted
    Run {
        /// Take over the queue lock even if another runner holds it
        #[arg(long)]
        force: bool,
    },

    /// Show build records
    Status { target: Option<TargetId> },

    /// Print the log of a build
    Logs {
        build: String,

        /// Keep printing new lines until the build finishes
        #[arg(short, long)]
        follow: bool,
    },

    /// Cancel a queued or running build
    Cancel { build: String },

    /// Remove preview deployments of a target
    Teardown {
        target: TargetId,

        /// Pull request id of the preview to remove
        #[arg(long, required_unless_present = "all_previews", conflicts_with = "all_previews")]
        preview: Option<PreviewId>,

        /// Remove every preview of the target
        #[arg(long)]
        all_previews: bool,
    },

    /// Manage HTTPS for a target's domain
    Ssl {
        target: TargetId,

        #[arg(value_enum)]
        action: SslAction,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SslAction {
    /// Redirect plain HTTP to HTTPS
    Force,
    /// Stop redirecting plain HTTP
    Unforce,
    /// Issue a certificate now
    Generate,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn teardown_requires_preview_or_all() {
        assert!(Cli::try_parse_from(["deckhand", "teardown", "site"]).is_err());
        assert!(Cli::try_parse_from(["deckhand", "teardown", "site", "--preview", "42"]).is_ok());
        assert!(Cli::try_parse_from(["deckhand", "teardown", "site", "--all-previews"]).is_ok());
    }

    #[test]
    fn deploy_validates_target_id() {
        assert!(Cli::try_parse_from(["deckhand", "deploy", "Not_Valid"]).is_err());
        let cli = Cli::try_parse_from(["deckhand", "--json", "deploy", "site", "--preview", "7"])
            .unwrap();
        assert_eq!(cli.output_mode(), OutputMode::Json);
        match cli.command {
            Commands::Deploy {
                target, preview, ..
            } => {
                assert_eq!(target.as_str(), "site");
                assert_eq!(preview, Some(PreviewId::new(7)));
            }
            _ => panic!("expected deploy"),
        }
    }
}
