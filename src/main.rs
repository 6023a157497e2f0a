//! tristore CLI - load, query and maintain a transactional RDF store

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use tristore::config::{self, RepositoryConfig};
use tristore::discover::discover_rdf_files;
use tristore::ui::{self, Icons};
use tristore::{Input, IsolationLevel, Iri, Pattern, RdfFormat, Repository, Resource, Value};

#[derive(Parser)]
#[command(name = "tristore")]
#[command(version)]
#[command(about = "Transactional RDF statement store with a synchronized full-text index")]
#[command(long_about = r#"
tristore keeps RDF statements in a primary store and mirrors every literal
into a full-text index, committing both together.

Example usage:
  tristore init
  tristore load data/beet.nt
  tristore load --dir data --context http://example.org/plants
  tristore search "sugar beet"
  tristore match --subject http://example.org/beet --json
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to the configuration file
    #[arg(short, long, global = true, default_value = "tristore.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a configuration file
    Init {
        /// Statement storage directory, or "memory"
        #[arg(long)]
        storage: Option<String>,

        /// Full-text index directory, or "memory"
        #[arg(long)]
        index: Option<String>,

        /// Do not maintain a full-text index
        #[arg(long, conflicts_with = "index")]
        no_index: bool,

        /// Default isolation level (none, read_committed, serializable)
        #[arg(long, default_value = "read_committed")]
        isolation: IsolationLevel,

        /// Overwrite an existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Load RDF documents in a single transaction
    Load {
        /// Files to load
        files: Vec<PathBuf>,

        /// Load every recognised RDF file below this directory
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// Exclude pattern for --dir (gitignore syntax, repeatable)
        #[arg(long)]
        exclude: Vec<String>,

        /// Format name (ntriples, nquads); detected when omitted
        #[arg(short, long)]
        format: Option<String>,

        /// Base IRI for relative references
        #[arg(short, long)]
        base: Option<String>,

        /// Add every statement to this context (repeatable)
        #[arg(long)]
        context: Vec<String>,
    },

    /// Count statements
    Count {
        /// Restrict to these contexts; "default" is the unnamed graph
        #[arg(long)]
        context: Vec<String>,
    },

    /// List statements matching a pattern
    Match {
        #[command(flatten)]
        pattern: PatternArgs,

        /// Maximum number of statements
        #[arg(short, long, default_value = "100")]
        limit: usize,

        /// Output JSON
        #[arg(long)]
        json: bool,
    },

    /// Full-text search over literals
    Search {
        /// Search query
        query: String,

        /// Maximum number of results
        #[arg(short, long, default_value = "10")]
        limit: usize,

        /// Output JSON
        #[arg(long)]
        json: bool,
    },

    /// Write statements as N-Quads
    Export {
        #[command(flatten)]
        pattern: PatternArgs,

        /// Output file (stdout when omitted)
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Check that the full-text index matches the store
    Verify,

    /// Rebuild the full-text index from the store
    Reindex,

    /// Show repository statistics
    Stats,
}

#[derive(clap::Args)]
struct PatternArgs {
    /// Subject IRI or blank node (_:id)
    #[arg(short, long)]
    subject: Option<String>,

    /// Predicate IRI
    #[arg(short, long)]
    predicate: Option<String>,

    /// Object in N-Triples syntax, or a bare IRI
    #[arg(short, long)]
    object: Option<String>,

    /// Context IRI; "default" is the unnamed graph (repeatable)
    #[arg(long)]
    context: Vec<String>,
}

impl PatternArgs {
    fn to_pattern(&self) -> anyhow::Result<Pattern> {
        let mut pattern = Pattern::any().contexts(parse_contexts(&self.context)?);
        if let Some(subject) = &self.subject {
            pattern = pattern.subject(parse_resource(subject)?);
        }
        if let Some(predicate) = &self.predicate {
            pattern = pattern.predicate(predicate.parse::<Iri>()?);
        }
        if let Some(object) = &self.object {
            pattern = pattern.object(parse_value(object)?);
        }
        Ok(pattern)
    }
}

fn parse_resource(text: &str) -> anyhow::Result<Resource> {
    if text.starts_with('<') || text.starts_with("_:") {
        return Ok(Resource::parse(text)?);
    }
    Ok(Resource::Iri(Iri::new(text)?))
}

fn parse_value(text: &str) -> anyhow::Result<Value> {
    if text.starts_with('<') || text.starts_with("_:") || text.starts_with('"') {
        return Ok(Value::parse(text)?);
    }
    Ok(Value::Iri(Iri::new(text)?))
}

fn parse_contexts(contexts: &[String]) -> anyhow::Result<Vec<Option<Resource>>> {
    contexts
        .iter()
        .map(|c| {
            if c == "default" {
                Ok(None)
            } else {
                parse_resource(c).map(Some)
            }
        })
        .collect()
}

fn open_repository(config_path: &Path) -> anyhow::Result<Repository> {
    let Some(config) = config::load_config(Some(config_path))? else {
        bail!(
            "No configuration at {}. Run `tristore init` first.",
            config_path.display()
        );
    };
    Repository::open(&config).with_context(|| format!("Failed to open repository from {}", config_path.display()))
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    match cli.command {
        Commands::Init { storage, index, no_index, isolation, force } => {
            let base = cli
                .config
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or(Path::new("."));
            let storage = storage.unwrap_or_else(|| config::default_storage_path_in(base).display().to_string());
            let mut repo_config = RepositoryConfig::new(storage).with_isolation(isolation);
            if !no_index {
                let index = index.unwrap_or_else(|| config::default_index_path_in(base).display().to_string());
                repo_config = repo_config.with_index(index);
            }
            repo_config.validate()?;

            config::write_config(&cli.config, &repo_config, force)?;
            ui::success(&format!("Wrote {}", cli.config.display()));
            ui::info("Storage", &repo_config.storage_directory);
            ui::info("Index", repo_config.index_directory.as_deref().unwrap_or("(none)"));
        }

        Commands::Load { files, dir, exclude, format, base, context } => {
            let format = match format.as_deref() {
                Some(name) => Some(
                    RdfFormat::from_name(name).with_context(|| format!("Unknown RDF format: {}", name))?,
                ),
                None => None,
            };
            let base = base.map(Iri::new).transpose()?;
            let contexts: Vec<Resource> = context.iter().map(|c| parse_resource(c)).collect::<anyhow::Result<_>>()?;

            let mut sources: Vec<(PathBuf, Option<RdfFormat>)> = files.into_iter().map(|f| (f, format)).collect();
            if let Some(dir) = &dir {
                let found = discover_rdf_files(dir, &exclude);
                if found.is_empty() {
                    ui::warn(&format!("No RDF files found under {}", dir.display()));
                }
                sources.extend(found.into_iter().map(|(path, detected)| (path, format.or(Some(detected)))));
            }
            if sources.is_empty() {
                bail!("Nothing to load: pass files or --dir");
            }

            let repo = open_repository(&cli.config)?;
            let mut conn = repo.connection()?;
            ui::header(&format!("Loading {} documents", sources.len()));

            conn.begin()?;
            let mut total = 0;
            for (path, format) in &sources {
                match conn.add(Input::file(path), base.as_ref(), *format, &contexts) {
                    Ok(count) => {
                        println!("{} {} {}", Icons::DOCUMENT, path.display(), ui::dim(&format!("({} statements)", count)));
                        total += count;
                    }
                    Err(e) => {
                        ui::error(&format!("{}: {}", path.display(), e));
                        // a fatal error has already rolled the transaction back
                        if conn.is_active() {
                            if let Err(undo) = conn.rollback() {
                                tracing::error!("Rollback after failed load also failed: {}", undo);
                            }
                        }
                        println!("{} Rolled back {} statements", Icons::ROLLBACK, total);
                        return Err(e).with_context(|| format!("Load aborted at {}; nothing was committed", path.display()));
                    }
                }
            }
            conn.commit()?;
            conn.close()?;

            println!("{} Committed {} statements", Icons::COMMIT, total);
            ui::summary_row("Repository size:", &repo.stats()?.statements.to_string());
            repo.shutdown()?;
        }

        Commands::Count { context } => {
            let repo = open_repository(&cli.config)?;
            let mut conn = repo.connection()?;
            let contexts = parse_contexts(&context)?;
            println!("{}", conn.size(&contexts)?);
            conn.close()?;
            repo.shutdown()?;
        }

        Commands::Match { pattern, limit, json } => {
            let repo = open_repository(&cli.config)?;
            let mut conn = repo.connection()?;
            let pattern = pattern.to_pattern()?;
            let mut result = conn.get_statements(&pattern)?;
            let total = result.remaining();
            let statements: Vec<_> = result.by_ref().take(limit).collect();
            result.close();

            if json {
                println!("{}", serde_json::to_string_pretty(&statements)?);
            } else if statements.is_empty() {
                ui::warn(&format!("No statements match {}", pattern));
            } else {
                for st in &statements {
                    ui::statement(st);
                }
                if total > statements.len() {
                    println!("{}", ui::muted(&format!("... {} more", total - statements.len())));
                }
            }
            conn.close()?;
            repo.shutdown()?;
        }

        Commands::Search { query, limit, json } => {
            let repo = open_repository(&cli.config)?;
            let conn = repo.connection()?;
            let hits = conn.search(&query, limit)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&hits)?);
            } else if hits.is_empty() {
                ui::warn(&format!("No literals match '{}'", query));
            } else {
                println!("{} Results for '{}':", Icons::SEARCH, query);
                for (i, hit) in hits.iter().enumerate() {
                    ui::search_hit(i + 1, hit);
                }
            }
            drop(conn);
            repo.shutdown()?;
        }

        Commands::Export { pattern, output } => {
            let repo = open_repository(&cli.config)?;
            let mut conn = repo.connection()?;
            let pattern = pattern.to_pattern()?;

            let written = match &output {
                Some(path) => {
                    config::ensure_dir(path)?;
                    let file = std::fs::File::create(path)
                        .with_context(|| format!("Failed to create {}", path.display()))?;
                    conn.export(&pattern, std::io::BufWriter::new(file))?
                }
                None => {
                    let stdout = std::io::stdout();
                    let mut lock = stdout.lock();
                    let written = conn.export(&pattern, &mut lock)?;
                    lock.flush()?;
                    written
                }
            };
            if let Some(path) = &output {
                ui::success(&format!("Exported {} statements to {}", written, path.display()));
            }
            conn.close()?;
            repo.shutdown()?;
        }

        Commands::Verify => {
            let repo = open_repository(&cli.config)?;
            let health = repo.verify_index()?;
            println!("{}", health);
            repo.shutdown()?;

            if !health.is_consistent() {
                for st in health.missing.iter().take(10) {
                    println!("  missing: {}", ui::muted(&st.to_string()));
                }
                for st in health.stale.iter().take(10) {
                    println!("  stale:   {}", ui::muted(&st.to_string()));
                }
                bail!("Full-text index is out of sync; run `tristore reindex`");
            }
            ui::success("Full-text index is consistent");
        }

        Commands::Reindex => {
            let repo = open_repository(&cli.config)?;
            println!("{} Rebuilding full-text index...", Icons::REINDEX);
            let report = repo.reindex()?;
            ui::success(&report.to_string());
            repo.shutdown()?;
        }

        Commands::Stats => {
            let repo = open_repository(&cli.config)?;
            let stats = repo.stats()?;
            let index = stats
                .index_entries
                .map(|n| n.to_string())
                .unwrap_or_else(|| "(no index)".to_string());

            println!("{} Repository", Icons::STATS);
            println!(
                "{}",
                ui::stats_table(&[
                    ("Statements", stats.statements.to_string()),
                    ("Contexts", stats.contexts.to_string()),
                    ("Epoch", stats.epoch.to_string()),
                    ("Index entries", index),
                ])
            );
            repo.shutdown()?;
        }
    }

    Ok(())
}
