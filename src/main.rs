mod config;
mod corpus;
mod db;
mod error;
mod export;
mod parser;
mod utils;

use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, Subcommand};

use parser::extract::dictionary::Dictionaries;
use parser::extract::EntityGraph;

#[derive(Parser)]
#[command(name = "textbook_structurer", about = "Structure a medical textbook corpus into entity tables")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Structure every .txt file of a directory and write the entity tables
    Run {
        /// Directory holding the corpus slices (nelson_part_1.txt, ...)
        input: PathBuf,
        /// SQLite output file (default: settings db_path)
        #[arg(long)]
        db: Option<PathBuf>,
        /// Also write one <kind>.jsonl per entity kind into this directory
        #[arg(long)]
        json_out: Option<PathBuf>,
        /// Reference dictionary JSON (default: built-in)
        #[arg(long)]
        dictionary: Option<PathBuf>,
        /// Only the first N files in corpus order
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Row counts per entity table
    Stats,
    /// Per-chapter overview table
    Overview {
        /// Filter by part label as printed (e.g. "XII")
        #[arg(short, long)]
        part: Option<String>,
        /// Max rows to display
        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let settings = config::Settings::load()?;

    let result = match cli.command {
        Commands::Run {
            input,
            db,
            json_out,
            dictionary,
            limit,
        } => {
            let mut files = corpus::discover(&input)?;
            if let Some(n) = limit {
                files.truncate(n);
            }
            let docs = corpus::load(&files)?;

            let dicts = match dictionary.or_else(|| settings.dictionary_path.clone()) {
                Some(path) => Dictionaries::load(&path)?,
                None => Dictionaries::builtin()?,
            };
            let extract = settings.extract();

            println!("Structuring {} files...", docs.len());
            let t_parse = Instant::now();
            let pb = progress_bar(docs.len())?;
            let graph = parser::process_corpus_with(&docs, &dicts, &extract, |doc| {
                pb.set_message(doc.name.clone());
                pb.inc(1);
            })?;
            pb.finish_and_clear();
            println!("Structured in {:.1}s", t_parse.elapsed().as_secs_f64());

            let db_path = db.unwrap_or_else(|| settings.db_path.clone());
            let conn = db::connect(&db_path)?;
            db::init_schema(&conn)?;
            db::save_graph(&conn, &graph, docs.len())?;
            println!("Saved to {}", db_path.display());

            if let Some(dir) = json_out.or_else(|| settings.json_dir.clone()) {
                let paths = export::write_jsonl_dir(&graph, &dir)?;
                println!("Wrote {} JSONL files to {}", paths.len(), dir.display());
            }

            print_summary(&graph);
            Ok(())
        }
        Commands::Stats => {
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let s = db::get_stats(&conn)?;
            println!("Runs:      {}", s.runs);
            println!("Last run:  {}", s.last_run.as_deref().unwrap_or("-"));
            for (table, count) in &s.tables {
                println!("{:<19} {}", format!("{}:", table), count);
            }
            Ok(())
        }
        Commands::Overview { part, limit } => {
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let rows = db::fetch_overview(&conn, part.as_deref(), limit)?;
            if rows.is_empty() {
                println!("No chapters found. Run 'run' first.");
                return Ok(());
            }

            println!(
                "{:>5} | {:<36} | {:<6} | {:>8} | {:>6} | {:>10} | {:>7}",
                "Ch", "Title", "Part", "Sections", "Blocks", "Conditions", "Dosages"
            );
            println!("{}", "-".repeat(96));
            for r in &rows {
                println!(
                    "{:>5} | {:<36} | {:<6} | {:>8} | {:>6} | {:>10} | {:>7}",
                    r.number,
                    truncate(&r.title, 36),
                    r.part,
                    r.sections,
                    r.blocks,
                    r.conditions,
                    r.dosages
                );
            }
            println!("\n{} chapters", rows.len());
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn progress_bar(len: usize) -> anyhow::Result<indicatif::ProgressBar> {
    use indicatif::{ProgressBar, ProgressStyle};

    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );
    Ok(pb)
}

fn print_summary(graph: &EntityGraph) {
    println!(
        "Saved {} volumes, {} parts, {} chapters, {} sections, {} subsections, {} blocks.",
        graph.volumes.len(),
        graph.parts.len(),
        graph.chapters.len(),
        graph.sections.len(),
        graph.subsections.len(),
        graph.content_blocks.len(),
    );
    let title_derived = graph.conditions.iter().filter(|c| c.title_derived).count();
    println!(
        "Extracted {} conditions ({} from titles), {} drugs, {} dosages.",
        graph.conditions.len(),
        title_derived,
        graph.drugs.len(),
        graph.dosages.len(),
    );
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
