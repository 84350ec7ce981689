use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use similar::{ChangeTag, TextDiff};
use std::env;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use tree_patcher::config::{apply_transforms, load_from_path, ApplicationError, TransformResult};
use tree_patcher::{
    find_file_matches, FileFilter, FileSelector, FsProject, GrammarRegistry, PathExpression,
};

#[derive(Parser)]
#[command(name = "tree-patcher")]
#[command(about = "Query and patch source files through their syntax trees", long_about = None)]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug); RUST_LOG applies otherwise
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print every node matching a path expression
    Query {
        /// Grammar used to parse the selected files
        #[arg(short, long)]
        grammar: String,

        /// Only files with this extension
        #[arg(long, conflicts_with = "prefix")]
        ext: Option<String>,

        /// Only files under this workspace-relative directory
        #[arg(long)]
        prefix: Option<String>,

        /// Path to workspace root (defaults to the current directory)
        #[arg(short, long)]
        workspace: Option<PathBuf>,

        /// Path expression, e.g. "//package_declaration/scoped_identifier"
        expr: String,
    },

    /// Apply the transforms of a config file to a workspace
    Apply {
        /// Transform config (TOML)
        #[arg(short, long)]
        config: PathBuf,

        /// Path to workspace root (defaults to the current directory)
        #[arg(short, long)]
        workspace: Option<PathBuf>,

        /// Dry run - show what would be changed without modifying files
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Show unified diff of changes
        #[arg(short, long)]
        diff: bool,
    },

    /// List the available grammars
    Grammars,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Query {
            grammar,
            ext,
            prefix,
            workspace,
            expr,
        } => cmd_query(&grammar, ext, prefix, workspace, &expr),

        Commands::Apply {
            config,
            workspace,
            dry_run,
            diff,
        } => cmd_apply(&config, workspace, dry_run, diff),

        Commands::Grammars => cmd_grammars(),
    }
}

fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("tree_patcher=info"),
        _ => EnvFilter::new("tree_patcher=debug"),
    };
    // a subscriber may already be installed when embedded
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Resolve workspace path
///
/// Priority order:
/// 1. Explicit --workspace flag
/// 2. TREE_PATCHER_WORKSPACE environment variable
/// 3. Current directory
fn resolve_workspace(cli_workspace: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = cli_workspace {
        return path
            .canonicalize()
            .with_context(|| format!("workspace not found: {}", path.display()));
    }

    if let Ok(env_path) = env::var("TREE_PATCHER_WORKSPACE") {
        let path = PathBuf::from(&env_path);
        if path.exists() {
            return Ok(path.canonicalize()?);
        }
        eprintln!(
            "{}",
            format!("Warning: TREE_PATCHER_WORKSPACE is set but path doesn't exist: {env_path}")
                .yellow()
        );
    }

    Ok(env::current_dir()?)
}

fn cmd_query(
    grammar: &str,
    ext: Option<String>,
    prefix: Option<String>,
    workspace: Option<PathBuf>,
    expr: &str,
) -> Result<()> {
    let workspace = resolve_workspace(workspace)?;
    let project = FsProject::open(&workspace)?;
    let registry = GrammarRegistry::with_builtins();

    let filter = match (ext, prefix) {
        (Some(ext), _) => FileFilter::Extension(ext),
        (None, Some(prefix)) => FileFilter::Prefix(prefix),
        (None, None) => FileFilter::All,
    };
    let selector = FileSelector::new(grammar).with_filter(filter);
    let expr = PathExpression::parse(expr)?;

    let groups = find_file_matches(&project, &registry, &selector, &expr)?;
    if groups.is_empty() {
        eprintln!("{}", "No matches".yellow());
        std::process::exit(1);
    }

    for group in &groups {
        for node in group.nodes() {
            println!(
                "{}:{} {} = {}",
                group.file(),
                node.offset,
                node.name.cyan(),
                first_line(&node.value)
            );
        }
    }

    Ok(())
}

/// First line of a multi-line value, marked as truncated.
fn first_line(value: &str) -> String {
    match value.split_once('\n') {
        Some((line, _)) => format!("{} ...", line.trim_end()),
        None => value.to_string(),
    }
}

/// Helper: Show unified diff between original and modified content
fn display_diff(file: &Path, original: &str, modified: &str) {
    println!(
        "\n{}",
        format!("--- {} (original)", file.display()).dimmed()
    );
    println!("{}", format!("+++ {} (patched)", file.display()).dimmed());

    let diff = TextDiff::from_lines(original, modified);
    let mut unified = diff.unified_diff();
    unified.context_radius(3);
    for hunk in unified.iter_hunks() {
        println!("{}", hunk.header().to_string().cyan());
        for change in hunk.iter_changes() {
            let line = match change.tag() {
                ChangeTag::Delete => format!("-{change}").red(),
                ChangeTag::Insert => format!("+{change}").green(),
                ChangeTag::Equal => format!(" {change}").normal(),
            };
            print!("{line}");
            if change.missing_newline() {
                println!();
            }
        }
    }
}

fn cmd_apply(
    config_path: &Path,
    workspace: Option<PathBuf>,
    dry_run: bool,
    show_diff: bool,
) -> Result<()> {
    let workspace = resolve_workspace(workspace)?;
    let config = load_from_path(config_path)?;
    let registry = GrammarRegistry::with_builtins();
    let mut project = FsProject::open(&workspace)?.dry_run(dry_run);

    println!("Workspace: {}", workspace.display());
    if !config.meta.name.is_empty() {
        println!("Transforms: {}", config.meta.name);
    }
    if dry_run {
        println!("{}", "  [DRY RUN - no files will be written]".cyan());
    }
    println!();

    let mut total_applied = 0;
    let mut total_already_applied = 0;
    let mut total_no_matches = 0;
    let mut total_failed = 0;

    for (transform_id, result) in apply_transforms(&config, &mut project, &registry) {
        match result {
            Ok(TransformResult::Applied { files, edits }) => {
                let verb = if dry_run { "Would apply" } else { "Applied" };
                println!(
                    "{} {}: {} {} edit(s) to {} file(s)",
                    "✓".green(),
                    transform_id,
                    verb,
                    edits,
                    files
                );
                total_applied += 1;
            }
            Ok(TransformResult::AlreadyApplied { matches }) => {
                println!(
                    "{} {}: Already applied ({} match(es))",
                    "⊙".yellow(),
                    transform_id,
                    matches
                );
                total_already_applied += 1;
            }
            Ok(TransformResult::NoMatches) => {
                println!("{} {}: No matches", "⊘".cyan(), transform_id);
                total_no_matches += 1;
            }
            Ok(TransformResult::Failed { reason }) => {
                eprintln!("{} {}: Failed - {}", "✗".red(), transform_id, reason);
                total_failed += 1;
            }
            Err(e) => {
                eprintln!("{} {}: Error - {}", "✗".red(), transform_id, e);
                total_failed += 1;

                if let ApplicationError::NoMatch { .. } = &e {
                    eprintln!("  Possible causes:");
                    eprintln!("    - The matched construct was renamed or removed");
                    eprintln!("    - The file filter excludes the intended files");
                }
            }
        }
    }

    if show_diff {
        for (file, change) in project.changes() {
            if change.before != change.after {
                display_diff(file.path(), &change.before, &change.after);
            }
        }
    }

    println!();
    println!("{}", "Summary:".bold());
    println!("  {} applied", format!("{total_applied}").green());
    println!(
        "  {} already applied",
        format!("{total_already_applied}").yellow()
    );
    println!("  {} without matches", format!("{total_no_matches}").cyan());
    println!("  {} failed", format!("{total_failed}").red());

    if total_failed > 0 {
        std::process::exit(1);
    }

    Ok(())
}

fn cmd_grammars() -> Result<()> {
    let registry = GrammarRegistry::with_builtins();
    for id in registry.ids() {
        println!("{id}");
    }
    Ok(())
}
