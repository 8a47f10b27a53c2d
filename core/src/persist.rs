use crate::config::IndexConfig;
use crate::store::SledStore;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::{create_dir_all, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

pub const META_VERSION: u32 = 1;

/// Description of an index directory, kept next to its partitions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaFile {
    pub version: u32,
    pub created_at: String,
    pub config: IndexConfig,
}

impl MetaFile {
    pub fn new(config: IndexConfig) -> Self {
        let created_at = time::OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_default();
        Self {
            version: META_VERSION,
            created_at,
            config,
        }
    }
}

pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    pub fn meta(&self) -> PathBuf { self.root.join("meta.json") }
    pub fn partitions(&self) -> PathBuf { self.root.join("partitions") }
}

pub fn save_meta(paths: &IndexPaths, meta: &MetaFile) -> Result<()> {
    create_dir_all(&paths.root)?;
    let mut f = File::create(paths.meta())?;
    let json = serde_json::to_string_pretty(meta)?;
    f.write_all(json.as_bytes())?;
    Ok(())
}

pub fn load_meta(paths: &IndexPaths) -> Result<MetaFile> {
    let mut f = File::open(paths.meta())?;
    let mut buf = String::new();
    f.read_to_string(&mut buf)?;
    let meta: MetaFile = serde_json::from_str(&buf)?;
    anyhow::ensure!(meta.version <= META_VERSION, "unsupported index version {}", meta.version);
    Ok(meta)
}

/// Opens the partition store of an index directory, creating the directory and
/// its meta file with `config` on first use. An existing index keeps the
/// configuration it was created with.
pub fn open_index_dir(paths: &IndexPaths, config: IndexConfig) -> Result<(SledStore, MetaFile)> {
    let meta = if paths.meta().exists() {
        load_meta(paths)?
    } else {
        let meta = MetaFile::new(config);
        save_meta(paths, &meta)?;
        meta
    };
    let store = SledStore::open(paths.partitions())
        .with_context(|| format!("opening partitions under {}", paths.root.display()))?;
    tracing::info!(root = %paths.root.display(), partitions = meta.config.partitions, "opened index directory");
    Ok((store, meta))
}
