use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rwi_core::condenser::{query_term, Condensed};
use rwi_core::persist::{open_index_dir, IndexPaths};
use rwi_core::reference::virtual_age;
use rwi_core::{
    Base64Order, ByteOrder, DocRef, Flag, IndexConfig, IndexError, NormalizerConfig, PostingIndex,
    PostingList, RankingNormalizer, RankingProfile, SledStore, UrlHash, WordHash,
};
use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing_subscriber::{fmt, EnvFilter};
use url::Url;
use walkdir::WalkDir;

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

const DOCS_TREE: &str = "docs";

#[derive(Debug, Deserialize)]
struct InputDoc {
    id: String,
    title: String,
    body: String,
    url: Option<String>,
    /// RFC 3339 modification time.
    timestamp: Option<String>,
    language: Option<String>,
    #[serde(default)]
    links: Vec<String>,
}

/// What the `docs` tree keeps per document hash.
#[derive(Debug, Serialize, Deserialize)]
struct DocMeta {
    external_id: String,
    title: String,
    url: String,
}

#[derive(Parser)]
#[command(name = "rwi-indexer")]
#[command(about = "Build, query and inspect a reverse word index", long_about = None)]
struct Cli {
    /// Index directory
    #[arg(long, global = true, default_value = "./index")]
    index: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Condense JSON/JSONL documents and merge their words into the index
    Build {
        /// Input path (file or directory)
        #[arg(long)]
        input: PathBuf,
        /// Growth factor between partition bounds (new indexes only)
        #[arg(long, default_value_t = 4)]
        load_factor: usize,
        /// Number of partitions (new indexes only)
        #[arg(long, default_value_t = 8)]
        partitions: u8,
    },
    /// Rank the documents containing every query word
    Search {
        /// Query words
        #[arg(required = true)]
        words: Vec<String>,
        /// Ranking profile as name=value pairs
        #[arg(long, default_value = "")]
        profile: String,
        /// Preferred two-letter language code
        #[arg(long)]
        language: Option<String>,
        #[arg(long, default_value_t = 10)]
        top_k: usize,
        /// Candidate count above which the min/max pass is split
        #[arg(long, default_value_t = 600)]
        split_threshold: usize,
    },
    /// Walk the index as a ring starting at a word or word hash
    Ring {
        /// Start word, or a 12-symbol word hash
        #[arg(long)]
        from: String,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Word counts per partition
    Stats,
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();
    let paths = IndexPaths::new(&cli.index);

    match cli.command {
        Commands::Build { input, load_factor, partitions } => {
            let config = IndexConfig { load_factor, partitions };
            build_index(&paths, &input, config)
        }
        Commands::Search { words, profile, language, top_k, split_threshold } => {
            let mut profile: RankingProfile = profile.parse()?;
            if let Some(language) = language {
                profile.preferred_language = language;
            }
            search(&paths, &words, profile, NormalizerConfig { split_threshold }, top_k)
        }
        Commands::Ring { from, limit } => ring(&paths, &from, limit),
        Commands::Stats => stats(&paths),
    }
}

struct OpenIndex {
    index: PostingIndex<SledStore>,
    docs: sled::Tree,
    order: Base64Order,
}

fn open(paths: &IndexPaths, config: IndexConfig) -> Result<OpenIndex> {
    let (store, meta) = open_index_dir(paths, config)?;
    let docs = store.db().open_tree(DOCS_TREE)?;
    let order = Base64Order::enhanced(true);
    let index = PostingIndex::new(store, &order, meta.config);
    Ok(OpenIndex { index, docs, order })
}

fn build_index(paths: &IndexPaths, input: &Path, config: IndexConfig) -> Result<()> {
    let open = open(paths, config)?;

    let mut files: Vec<PathBuf> = Vec::new();
    if input.is_dir() {
        for entry in WalkDir::new(input).into_iter().filter_map(|e| e.ok()) {
            let p = entry.path();
            if p.is_file() {
                if let Some(ext) = p.extension().and_then(|s| s.to_str()) {
                    if matches!(ext, "json" | "jsonl") {
                        files.push(p.to_path_buf());
                    }
                }
            }
        }
    } else if input.is_file() {
        files.push(input.to_path_buf());
    }

    let mut batches: HashMap<WordHash, PostingList> = HashMap::new();
    let mut num_docs = 0usize;
    for file in files {
        for doc in read_docs(&file)? {
            ingest_doc(&open, doc, &mut batches)?;
            num_docs += 1;
        }
    }
    tracing::info!(num_docs, num_words = batches.len(), "condensed documents");

    let mut rejected = 0usize;
    for (word, batch) in &batches {
        match open.index.merge(word, batch) {
            Ok(_) => {}
            Err(err @ IndexError::CapacityExceeded { .. }) => {
                tracing::warn!(%word, %err, "posting list not merged");
                rejected += 1;
            }
            Err(err) => return Err(err.into()),
        }
    }
    open.index.flush()?;
    open.docs.flush()?;

    tracing::info!(root = %paths.root.display(), words = open.index.size()?, rejected, "index build complete");
    Ok(())
}

fn read_docs(file: &Path) -> Result<Vec<InputDoc>> {
    let f = File::open(file).with_context(|| format!("opening {}", file.display()))?;
    let reader = BufReader::new(f);
    let mut docs = Vec::new();
    if file.extension().and_then(|s| s.to_str()) == Some("jsonl") {
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() { continue; }
            docs.push(serde_json::from_str(&line)?);
        }
        return Ok(docs);
    }
    match serde_json::from_reader(reader)? {
        serde_json::Value::Array(arr) => {
            for v in arr {
                docs.push(serde_json::from_value(v)?);
            }
        }
        json @ serde_json::Value::Object(_) => docs.push(serde_json::from_value(json)?),
        _ => {}
    }
    Ok(docs)
}

/// Links resolving to the document's own host, and all others.
fn count_links(base: Option<&Url>, links: &[String]) -> (u32, u32) {
    let Some(base) = base else {
        return (0, links.len() as u32);
    };
    let local = links
        .iter()
        .filter_map(|l| base.join(l).ok())
        .filter(|u| u.host_str() == base.host_str())
        .count() as u32;
    (local, links.len() as u32 - local)
}

fn url_components(parsed: Option<&Url>, raw: &str) -> u32 {
    match parsed {
        Some(u) => {
            let segments = u.path_segments().map_or(0, |s| s.filter(|c| !c.is_empty()).count());
            let host_labels = u.host_str().map_or(0, |h| h.split('.').count());
            (segments + host_labels + u.query_pairs().count()) as u32
        }
        None => raw.split(|c: char| matches!(c, '/' | '.' | '?' | '&')).filter(|c| !c.is_empty()).count() as u32,
    }
}

fn ingest_doc(open: &OpenIndex, doc: InputDoc, batches: &mut HashMap<WordHash, PostingList>) -> Result<()> {
    let url = doc.url.unwrap_or_else(|| format!("doc://{}", doc.id));
    let url_hash = UrlHash::compose(&url);
    let condensed = Condensed::new(&doc.title, &doc.body);

    let modified = doc
        .timestamp
        .as_deref()
        .and_then(|ts| OffsetDateTime::parse(ts, &Rfc3339).ok())
        .unwrap_or_else(OffsetDateTime::now_utc);
    let parsed = Url::parse(&url).ok();
    let (local_links, other_links) = count_links(parsed.as_ref(), &doc.links);
    let components = url_components(parsed.as_ref(), &url);
    let lowered_url = url.to_lowercase();

    for term in condensed.words.keys() {
        let Some(mut entry) = condensed.reference(term, url_hash) else { continue };
        entry.url_length = url.len() as u32;
        entry.url_components = components;
        entry.virtual_age = virtual_age(modified);
        entry.local_links = local_links;
        entry.other_links = other_links;
        if let Some(language) = doc.language.as_deref() {
            entry.set_language(language);
        }
        if lowered_url.contains(term.as_str()) {
            entry.flags.insert(Flag::InUrl);
        }
        let word = WordHash::of_word(term);
        batches
            .entry(word)
            .or_insert_with(|| PostingList::new(word, &open.order))
            .insert(entry);
    }

    let meta = DocMeta { external_id: doc.id, title: doc.title, url };
    open.docs.insert(url_hash.as_bytes(), bincode::serialize(&meta)?)?;
    Ok(())
}

fn search(
    paths: &IndexPaths,
    words: &[String],
    profile: RankingProfile,
    config: NormalizerConfig,
    top_k: usize,
) -> Result<()> {
    let open = open(paths, IndexConfig::default())?;
    let terms: Vec<String> = words.iter().filter_map(|w| query_term(w)).collect();
    if terms.is_empty() {
        println!("no searchable words in query");
        return Ok(());
    }

    let mut lists = Vec::with_capacity(terms.len());
    for term in &terms {
        let word = WordHash::of_word(term);
        match open.index.get(&word)? {
            Some(list) => lists.push(list),
            None => {
                println!("no results");
                return Ok(());
            }
        }
    }
    let candidates: Vec<DocRef> = PostingList::join(&lists);
    tracing::debug!(terms = terms.len(), candidates = candidates.len(), "joined posting lists");

    let normalizer = RankingNormalizer::new(profile, &open.order).with_config(config);
    let ranked = normalizer.rank_all(candidates)?;
    if ranked.is_empty() {
        println!("no results");
        return Ok(());
    }
    for (rank, entry) in ranked.into_iter().take(top_k) {
        let meta: Option<DocMeta> = match open.docs.get(entry.metadata_hash.as_bytes())? {
            Some(bytes) => Some(bincode::deserialize(&bytes)?),
            None => None,
        };
        match meta {
            Some(meta) => println!("{rank:>20}  {}  {}  ({})", entry.metadata_hash, meta.title, meta.url),
            None => println!("{rank:>20}  {}", entry.metadata_hash),
        }
    }
    Ok(())
}

fn ring(paths: &IndexPaths, from: &str, limit: usize) -> Result<()> {
    let open = open(paths, IndexConfig::default())?;
    let start = from
        .parse::<WordHash>()
        .unwrap_or_else(|_| WordHash::of_word(&query_term(from).unwrap_or_else(|| from.to_string())));
    let ring_order = open.order.rotate(start.as_bytes());

    for item in open.index.iterate(&start, true)?.take(limit) {
        let (word, list) = item?;
        println!("{word}  {:>19}  {:>6}", ring_order.cardinal(word.as_bytes()), list.len());
    }
    Ok(())
}

fn stats(paths: &IndexPaths) -> Result<()> {
    let open = open(paths, IndexConfig::default())?;
    let config = open.index.config();
    println!("words: {}", open.index.size()?);
    for (partition, count) in open.index.partition_sizes()?.into_iter().enumerate() {
        println!("partition {partition:>2} (<= {:>8} entries): {count}", config.capacity(partition as u8));
    }
    println!("documents: {}", open.docs.len());
    println!("min memory: {} bytes", open.index.min_mem());
    Ok(())
}
