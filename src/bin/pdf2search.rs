//! CLI binary for pdf2search.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `PipelineConfig` and prints results.

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use pdf2search::{
    extract_images_and_metadata, ingest, search, Embedder, HashEmbedder, PipelineConfig,
    SearchMode, TitanEmbedder,
};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "pdf2search",
    version,
    about = "Index PDF page images and captions into a vector search engine"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Log filter, e.g. "info" or "pdf2search=debug".
    #[arg(long, global = true, default_value = "info", env = "PDF2SEARCH_LOG")]
    log: String,
}

#[derive(Subcommand)]
enum Command {
    /// Extract page images, sub-images, and captions from a PDF.
    Extract {
        /// Path to the source PDF.
        pdf: PathBuf,

        /// Directory for the extracted PNGs and metadata.json.
        #[arg(long, default_value = "./images")]
        out_dir: PathBuf,

        /// Captioning model identifier, e.g. "gpt-4.1-nano".
        #[arg(long, env = "PDF2SEARCH_MODEL")]
        model: Option<String>,

        /// Captioning provider name (openai, anthropic, …); auto-detected if unset.
        #[arg(long, env = "PDF2SEARCH_PROVIDER")]
        provider: Option<String>,
    },

    /// Embed extracted captions and write documents into the search index.
    Ingest {
        /// Path to the metadata store written by `extract`.
        #[arg(long, default_value = "./images/metadata.json")]
        metadata: PathBuf,

        #[command(flatten)]
        index: IndexArgs,

        #[command(flatten)]
        embedding: EmbeddingArgs,

        /// Settling interval for a freshly created index, in seconds.
        #[arg(long, default_value_t = pdf2search::DEFAULT_SETTLE_SECS)]
        settle_secs: u64,
    },

    /// Query the index and print ranked captions.
    Search {
        /// Free-text query.
        query: String,

        /// "imagesearch" (cropped sub-images) or "contentsearch" (full pages).
        #[arg(long, default_value = "contentsearch")]
        mode: String,

        /// Maximum number of hits to return.
        #[arg(long, default_value_t = 5)]
        count: usize,

        /// Write each hit's image into this directory as hit_<rank>.png.
        #[arg(long)]
        save_dir: Option<PathBuf>,

        #[command(flatten)]
        index: IndexArgs,

        #[command(flatten)]
        embedding: EmbeddingArgs,
    },
}

#[derive(Args)]
struct IndexArgs {
    /// Search engine endpoint URL.
    #[arg(long, env = "OPENSEARCH_ENDPOINT")]
    endpoint: Option<String>,

    /// Search index name.
    #[arg(long, env = "OPENSEARCH_INDEX_NAME")]
    index_name: Option<String>,

    /// Basic-auth user for the search engine.
    #[arg(long, env = "OPENSEARCH_USER")]
    user: Option<String>,

    /// Basic-auth password for the search engine.
    #[arg(long, env = "OPENSEARCH_PASSWORD")]
    password: Option<String>,
}

#[derive(Args)]
struct EmbeddingArgs {
    /// Embedding endpoint URL; unset falls back to the offline hash embedder.
    #[arg(long, env = "EMBEDDING_ENDPOINT")]
    embed_endpoint: Option<String>,

    /// Bearer token for the embedding endpoint.
    #[arg(long, env = "EMBEDDING_API_KEY")]
    embed_api_key: Option<String>,
}

impl EmbeddingArgs {
    fn build(&self) -> Result<Box<dyn Embedder>> {
        match &self.embed_endpoint {
            Some(endpoint) => {
                let embedder =
                    TitanEmbedder::new(endpoint.clone(), self.embed_api_key.clone(), 60)
                        .context("building embedding client")?;
                Ok(Box::new(embedder))
            }
            None => {
                eprintln!(
                    "note: no --embed-endpoint; using the offline hash embedder \
                     (fine for smoke tests, not for production relevance)"
                );
                Ok(Box::new(HashEmbedder::default()))
            }
        }
    }
}

impl IndexArgs {
    fn apply(&self, mut builder: pdf2search::PipelineConfigBuilder) -> pdf2search::PipelineConfigBuilder {
        if let Some(ref e) = self.endpoint {
            builder = builder.endpoint(e.clone());
        }
        if let Some(ref i) = self.index_name {
            builder = builder.index_name(i.clone());
        }
        if let (Some(u), Some(p)) = (&self.user, &self.password) {
            builder = builder.basic_auth(u.clone(), p.clone());
        }
        builder
    }
}

fn spinner(prefix: &str) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    bar.set_prefix(prefix.to_string());
    bar.enable_steady_tick(Duration::from_millis(80));
    bar
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&cli.log).unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Extract {
            pdf,
            out_dir,
            model,
            provider,
        } => {
            let mut builder = PipelineConfig::builder();
            if let Some(m) = model {
                builder = builder.model(m);
            }
            if let Some(p) = provider {
                builder = builder.provider_name(p);
            }
            let config = builder.build()?;

            let bar = spinner("Extracting");
            bar.set_message(pdf.display().to_string());
            let report = extract_images_and_metadata(&pdf, &out_dir, &config).await?;
            bar.finish_and_clear();

            println!(
                "{} pages → {} records ({} skipped) in {}ms",
                report.pages, report.extracted, report.skipped, report.duration_ms
            );
            println!("metadata store: {}", report.store_path.display());
            for err in &report.errors {
                eprintln!("skipped: {err}");
            }
        }

        Command::Ingest {
            metadata,
            index,
            embedding,
            settle_secs,
        } => {
            let config = index
                .apply(PipelineConfig::builder().settle_secs(settle_secs))
                .build()?;
            let embedder = embedding.build()?;

            let bar = spinner("Ingesting");
            bar.set_message(metadata.display().to_string());
            let report = ingest(&config, embedder.as_ref(), &metadata).await?;
            bar.finish_and_clear();

            println!(
                "{}/{} documents indexed ({} skipped, {} without vector) in {}ms",
                report.indexed,
                report.total_records,
                report.skipped,
                report.missing_vector,
                report.duration_ms
            );
            for err in &report.errors {
                eprintln!("skipped: {err}");
            }
        }

        Command::Search {
            query,
            mode,
            count,
            save_dir,
            index,
            embedding,
        } => {
            let config = index.apply(PipelineConfig::builder()).build()?;
            let embedder = embedding.build()?;
            let mode: SearchMode = mode.parse()?;

            let hits = search(&config, embedder.as_ref(), &query, mode, count).await;
            if hits.is_empty() {
                println!("no hits");
                return Ok(());
            }

            if let Some(dir) = &save_dir {
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("creating {}", dir.display()))?;
            }

            for (rank, (image, content)) in
                hits.images.iter().zip(&hits.contents).enumerate()
            {
                println!("{}. {}", rank + 1, content);
                if let Some(dir) = &save_dir {
                    let path = dir.join(format!("hit_{}.png", rank + 1));
                    let bytes = BASE64
                        .decode(image)
                        .context("decoding hit image payload")?;
                    std::fs::write(&path, bytes)
                        .with_context(|| format!("writing {}", path.display()))?;
                    println!("   saved {}", path.display());
                }
            }
        }
    }

    Ok(())
}
