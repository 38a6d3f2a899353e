use std::collections::BTreeMap;
use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

use docrag_core::config::{Config, Settings};
use docrag_core::source::DirectorySource;
use docrag_core::traits::Embedder;
use docrag_embed::get_default_embedder;
use docrag_index::{Indexer, SnapshotStore};
use docrag_retrieve::{RetrievalOutcome, Retriever};

const USAGE: &str = "Usage: docrag <index [docs_dir] | ask \"<question>\" [-k N] [--json] | status>";

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).try_init();
}

fn parse_args() -> (String, Vec<String>) {
    let mut args: Vec<String> = env::args().skip(1).collect();
    if args.is_empty() {
        eprintln!("{}", USAGE);
        std::process::exit(1);
    }
    let cmd = args.remove(0);
    (cmd, args)
}

fn snapshot_store(settings: &Settings) -> anyhow::Result<Arc<SnapshotStore>> {
    let embedder = get_default_embedder(&settings.embedding)?;
    Ok(Arc::new(SnapshotStore::new(&settings.paths.index_dir, embedder)))
}

async fn run_index(settings: &Settings, args: &[String]) -> anyhow::Result<()> {
    let docs_dir = args.first().map(PathBuf::from).unwrap_or_else(|| settings.paths.docs_dir.clone());
    println!("Indexing {} into {}", docs_dir.display(), settings.paths.index_dir.display());
    let indexer = Indexer::from_settings(settings, snapshot_store(settings)?)?.with_progress(true);
    let report = indexer.run(&DirectorySource::new(docs_dir)).await?;

    println!("Plan: {:?}", report.kind);
    println!(
        "Added {}, changed {}, deleted {}, unchanged {}",
        report.added.len(),
        report.changed.len(),
        report.deleted.len(),
        report.unchanged
    );
    for (filename, reason) in &report.failed {
        println!("Skipped {}: {}", filename, reason);
    }
    println!(
        "Embedded {} chunks; index holds {} chunks ({:.1}s)",
        report.embedded_chunks,
        report.total_chunks,
        report.elapsed.as_secs_f64()
    );
    Ok(())
}

async fn run_ask(settings: &Settings, args: &[String]) -> anyhow::Result<()> {
    let mut question = None;
    let mut k = settings.retrieval.top_k;
    let mut json = false;
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--json" => json = true,
            "-k" | "--top-k" => {
                k = args.get(i + 1).and_then(|v| v.parse().ok()).unwrap_or_else(|| {
                    eprintln!("Error: {} requires a number", args[i]);
                    std::process::exit(1)
                });
                i += 1;
            }
            other => question = Some(other.to_string()),
        }
        i += 1;
    }
    let Some(question) = question else {
        eprintln!("{}", USAGE);
        std::process::exit(1);
    };

    let store = snapshot_store(settings)?;
    store.load().await?;
    let retriever = Retriever::new(store, settings.retrieval.clone());
    let outcome = retriever.retrieve_k(&question, k).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }
    match outcome {
        RetrievalOutcome::NoMatch { message, .. } => println!("{}", message),
        RetrievalOutcome::Answer(answer) => {
            let title = answer.section_title.as_deref().unwrap_or("(untitled)");
            println!("{} :: {} (score {:.3})\n", answer.source_document, title, answer.score);
            println!("{}", answer.answer_text);
            if answer.candidates.len() > 1 {
                println!("\nOther sections:");
                for (rank, c) in answer.candidates.iter().enumerate().skip(1) {
                    let title = c.section_title.as_deref().unwrap_or("(untitled)");
                    println!("  {}. {} :: {} (score {:.3})", rank + 1, c.filename, title, c.score);
                }
            }
        }
    }
    Ok(())
}

async fn run_status(settings: &Settings) -> anyhow::Result<()> {
    let store = snapshot_store(settings)?;
    let cache = store.read_cache()?;
    let vectors = store.vector_count().await?;
    let cached = cache.total_chunks();

    println!("Index directory: {}", store.dir().display());
    println!("Embedder: {} (dim {})", store.embedder().embedder_id(), store.embedder().dim());
    if !cache.embedder_id.is_empty() && cache.embedder_id != store.embedder().embedder_id() {
        println!("Cache was built with {}; the next index run rebuilds everything", cache.embedder_id);
    }
    println!("Vectors: {}", vectors);
    println!("Cached chunks: {}", cached);
    println!("Consistent: {}", if vectors == cached { "yes" } else { "NO (next index run rebuilds)" });
    if vectors != cached {
        warn!(vectors, cached, "vector table and chunk cache disagree");
    }

    let mut per_doc: BTreeMap<&str, usize> = BTreeMap::new();
    for entry in &cache.entries {
        per_doc.insert(&entry.filename, entry.chunks.len());
    }
    println!("Documents: {}", per_doc.len());
    for (filename, chunks) in per_doc {
        println!("  {:>5}  {}", chunks, filename);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let config = Config::load().map_err(|e| {
        error!(error = %e, "failed to load config");
        e
    })?;
    let settings = config.settings()?;
    let (cmd, args) = parse_args();
    match cmd.as_str() {
        "index" => run_index(&settings, &args).await,
        "ask" => run_ask(&settings, &args).await,
        "status" => run_status(&settings).await,
        _ => {
            eprintln!("Unknown command: {}\n{}", cmd, USAGE);
            std::process::exit(1);
        }
    }
}
