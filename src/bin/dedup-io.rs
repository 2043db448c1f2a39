/*
 * Copyright 2019-2020 Wren Powell
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::filter::LevelFilter;

use dedup_store::config::ChunkStoreConfig;
use dedup_store::item::ItemManager;
use dedup_store::store::fs::{FsKvStore, FsObjectStore};

/// Ingest a file or directory into a deduplicating item store, reporting
/// logical and physical (deduplicated) size.
#[derive(Debug, Parser)]
struct Args {
    /// Chunk size to use for newly created items.
    #[arg(short = 'd', long = "chunk_size", default_value = "128000")]
    chunk_size: u64,

    /// File or directory to ingest.
    #[arg(short, long)]
    path: PathBuf,

    /// Directory the filesystem-backed store persists its namespaces under.
    #[arg(long, default_value = ".dedup-store")]
    store_path: PathBuf,

    /// Increase log verbosity. May be repeated.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn collect_files(path: &Path, out: &mut Vec<PathBuf>) {
    if path.is_dir() {
        let mut entries: Vec<PathBuf> = walkdir::WalkDir::new(path)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .collect();
        entries.sort();
        out.append(&mut entries);
    } else {
        out.push(path.to_path_buf());
    }
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    tracing_subscriber::fmt().with_max_level(level).init();
}

fn run(args: Args) -> dedup_store::Result<()> {
    let collection_name = args
        .path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "dedup-io".to_string());

    let objects = FsObjectStore::new(&args.store_path)?;
    let kv = FsKvStore::new(&args.store_path)?;
    let config = ChunkStoreConfig {
        default_chunk_size: args.chunk_size,
        ..ChunkStoreConfig::default()
    };
    let manager = ItemManager::new(objects, kv, config.fingerprint_engine()?, config.default_chunk_size);

    let mut files = Vec::new();
    collect_files(&args.path, &mut files);

    let mut total_logical = 0u64;
    let mut total_physical = 0u64;

    for file in &files {
        let contents = match std::fs::read(file) {
            Ok(contents) => contents,
            Err(error) => {
                tracing::error!(file = %file.display(), %error, "failed to read file");
                continue;
            }
        };

        let item_name = file.to_string_lossy().replace('/', "-");
        println!("Open file: {} | Size: {}", file.display(), contents.len());
        total_logical += contents.len() as u64;

        let mut item = match manager.get(&collection_name, &item_name) {
            Ok(item) => item,
            Err(dedup_store::Error::NotFound) => {
                manager.create(&collection_name, &item_name, Some(args.chunk_size), None)?
            }
            Err(error) => return Err(error),
        };
        manager.write(&mut item, &contents, 0)?;

        let physical_size = item.physical_size();
        println!("Physical Size: {}", physical_size);
        total_physical += physical_size;
    }

    println!("\nTotal Size: {} | Total Physical Size: {}", total_logical, total_physical);
    Ok(())
}

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(error) => {
            eprintln!("{}", error);
            return ExitCode::from(1);
        }
    };
    init_tracing(args.verbose);

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("Error: {}", error);
            ExitCode::FAILURE
        }
    }
}
