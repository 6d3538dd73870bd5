//! vaultkit - automation CLI for a bilingual interview-question vault.

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use vaultkit::config::{self, Config};
use vaultkit::llm::LlmReviewer;
use vaultkit::report;
use vaultkit::review::ReviewOptions;
use vaultkit::taxonomy::TaxonomyLoader;
use vaultkit::vault::{collect_targets, NoteIndex};
use vaultkit::workflow::{self, BatchContext};

#[derive(Parser, Debug)]
#[command(
    name = "vaultkit",
    about = "Validate, fix, and review bilingual interview notes",
    version
)]
struct Args {
    /// Path to the vault root (defaults to current directory)
    #[arg(long, default_value = ".")]
    vault: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run all validators and report issues
    Validate {
        /// Glob patterns relative to the vault root (default: every note)
        patterns: Vec<String>,
    },
    /// Apply deterministic fixes to fixable issues
    Fix {
        patterns: Vec<String>,

        /// Report what would change without writing
        #[arg(long)]
        dry_run: bool,

        /// Skip .md.bak backups
        #[arg(long)]
        no_backup: bool,
    },
    /// Run the full review pipeline (validators, fixers, LLM escalation)
    Review {
        patterns: Vec<String>,

        #[arg(long)]
        dry_run: bool,

        #[arg(long)]
        no_backup: bool,

        /// Concurrent review calls
        #[arg(long)]
        workers: Option<usize>,

        /// Iteration cap per note
        #[arg(long)]
        max_iterations: Option<usize>,

        /// OpenRouter model slug
        #[arg(long)]
        model: Option<String>,

        /// Run a technical-accuracy pass before validation
        #[arg(long)]
        technical_review: bool,
    },
    /// Check candidate note files for duplicate questions
    CheckDuplicates {
        /// Candidate markdown files
        candidates: Vec<PathBuf>,
    },
    /// Store the OpenRouter API key in the system keychain
    Setup,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    if let Command::Setup = args.command {
        config::setup_api_key_interactive().map_err(|e| anyhow!("{}", e))?;
        return Ok(());
    }

    let vault_root = args.vault.canonicalize()?;
    let taxonomy = TaxonomyLoader::new(&vault_root).load()?;
    let index = NoteIndex::build(&vault_root);
    let ctx = BatchContext {
        vault_root: &vault_root,
        taxonomy: &taxonomy,
        index: &index,
    };

    let code = match args.command {
        Command::Validate { patterns } => {
            let targets = collect_targets(&vault_root, &patterns)?;
            let outcomes = workflow::validate_batch(&ctx, &targets);
            report::print_validation_report(&vault_root, &outcomes)
        }
        Command::Fix {
            patterns,
            dry_run,
            no_backup,
        } => {
            let config = Config::load();
            let backup = config.backup && !no_backup;
            let targets = collect_targets(&vault_root, &patterns)?;
            let outcomes = workflow::fix_batch(&ctx, &targets, dry_run, backup);
            report::print_fix_report(&vault_root, &outcomes, dry_run)
        }
        Command::Review {
            patterns,
            dry_run,
            no_backup,
            workers,
            max_iterations,
            model,
            technical_review,
        } => {
            let mut config = Config::load();
            let api_key = config
                .get_api_key()
                .ok_or_else(|| anyhow!("No API key configured. Run 'vaultkit setup' first."))?;
            let model = model.unwrap_or_else(|| config.model.clone());
            let workers = workers.unwrap_or(config.workers);
            let backup = config.backup && !no_backup;

            let reviewer = LlmReviewer::new(api_key, model)?;
            let options = ReviewOptions {
                max_iterations: max_iterations
                    .unwrap_or(ReviewOptions::default().max_iterations),
                dry_run,
                backup,
                technical_review,
            };
            let targets = collect_targets(&vault_root, &patterns)?;
            let results =
                workflow::review_batch(&ctx, &targets, &reviewer, options, workers).await;
            report::print_review_report(&vault_root, &results)
        }
        Command::CheckDuplicates { candidates } => {
            let dup_report = workflow::check_duplicates(&ctx, &candidates);
            report::print_duplicate_report(&dup_report)
        }
        Command::Setup => unreachable!("handled above"),
    };

    std::process::exit(code);
}
