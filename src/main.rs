use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use indicatif::ProgressBar;

mod app;
mod cleaner;
mod cli;
mod config;
mod embeddings;
mod extract;
mod faces;
mod fingerprint;
mod indexer;
mod lock;
mod records;
mod search;
mod storage;
#[cfg(test)]
mod tests;
mod thumbs;

use app::AppContext;
use cli::{Args, Command, FaceArgs};
use extract::Extractor;
use indexer::{IndexInput, IndexOptions};
use records::IndexRecord;
use search::SearchParams;

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut ctx = AppContext::open()?;

    match args.command {
        Command::Index { paths } => cmd_index(&mut ctx, paths),
        Command::Search { query, top_k, json } => cmd_search(&mut ctx, &query, top_k, json),
        Command::Duplicates { json } => cmd_duplicates(&mut ctx, json),
        Command::LowInfo { json } => cmd_low_info(&mut ctx, json),
        Command::Face { action } => match action {
            FaceArgs::Tag { name, image } => cmd_face_tag(&mut ctx, &name, &image),
            FaceArgs::List {} => cmd_face_list(&ctx),
        },
    }
}

fn cmd_index(ctx: &mut AppContext, paths: Vec<PathBuf>) -> Result<()> {
    // One writer at a time; readers never lock.
    let _lock = lock::FileLock::try_acquire(ctx.base_path())
        .context("another snapscout process is writing the index")?;

    let paths: Vec<PathBuf> = paths
        .into_iter()
        .map(|path| std::fs::canonicalize(&path).unwrap_or(path))
        .collect();
    let input = if paths.len() == 1 && paths[0].is_dir() {
        IndexInput::Folder(paths[0].clone())
    } else {
        IndexInput::Files(paths)
    };

    let thumbs_dir = ctx.thumbs_dir();
    let thumbnail_max_dim = ctx.config.thumbnail_max_dim;
    let (extractor, store, storage) = ctx.indexing_parts()?;
    let opts = IndexOptions {
        thumbs_dir: &thumbs_dir,
        thumbnail_max_dim,
    };

    let spinner = ProgressBar::new_spinner();
    let summary = indexer::build_index(
        &input,
        store,
        extractor,
        storage,
        &opts,
        |message| {
            spinner.set_message(message.to_string());
            spinner.tick();
        },
        || spinner.finish_and_clear(),
    )?;

    println!(
        "Indexed {} files: {} new or changed, {} unchanged, {} failed, {} removed.",
        summary.total, summary.processed, summary.skipped, summary.failed, summary.pruned
    );
    Ok(())
}

fn cmd_search(ctx: &mut AppContext, query: &str, top_k: Option<usize>, json: bool) -> Result<()> {
    // Check readiness before paying for model initialization.
    if ctx.store().is_empty() {
        bail!(search::SearchError::IndexNotReady);
    }

    let params = SearchParams {
        top_k: top_k.unwrap_or(ctx.config.top_k),
        fuzzy_threshold: ctx.config.fuzzy_threshold,
        face_tolerance: ctx.config.face_tolerance,
    };
    let known_faces = ctx.known_faces();
    let (extractor, store, _) = ctx.indexing_parts()?;

    let hits = search::search(query, store, &known_faces, extractor, &params)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&hits).unwrap());
        return Ok(());
    }

    if hits.is_empty() {
        println!("No results for '{query}'.");
        return Ok(());
    }
    for (i, hit) in hits.iter().enumerate() {
        println!(
            "[{}] {} ({}, {})",
            i + 1,
            hit.record.file_path,
            hit.match_type,
            hit.score
        );
        let snippet = text_snippet(&hit.record.text);
        if !snippet.is_empty() {
            println!("    {snippet}");
        }
    }
    Ok(())
}

fn cmd_duplicates(ctx: &mut AppContext, json: bool) -> Result<()> {
    let near_threshold = ctx.config.near_dupe_threshold;
    let store = ctx.store();

    let spinner = ProgressBar::new_spinner();
    let report = cleaner::find_duplicates(store, near_threshold, |message| {
        spinner.set_message(message.to_string());
        spinner.tick();
    })?;
    spinner.finish_and_clear();

    if json {
        println!("{}", serde_json::to_string_pretty(&report).unwrap());
        return Ok(());
    }

    print_groups("exact duplicates", &report.exact);
    print_groups("near-duplicates", &report.near);
    println!("Nothing was deleted; this report only suggests files.");
    Ok(())
}

fn cmd_low_info(ctx: &mut AppContext, json: bool) -> Result<()> {
    let store = ctx.store();

    let flagged = cleaner::find_low_information(store, |message| log::info!("{message}"))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&flagged).unwrap());
        return Ok(());
    }

    if flagged.is_empty() {
        println!("No low-information images found.");
        return Ok(());
    }
    println!("Found {} low-information images:", flagged.len());
    for record in &flagged {
        println!("  - {}", record.file_path);
    }
    Ok(())
}

fn cmd_face_tag(ctx: &mut AppContext, name: &str, image_path: &PathBuf) -> Result<()> {
    let image = image::open(image_path)
        .with_context(|| format!("cannot open {}", image_path.display()))?;

    let extractor = ctx.extractor()?;
    let faces = extractor.detect_faces(&image)?;
    let Some(face) = faces.into_iter().next() else {
        bail!("no face detected in {}", image_path.display());
    };

    let mut known_faces = ctx.known_faces();
    known_faces.save_face(name, face.embedding, &ctx.storage)?;
    println!("Tagged '{}'.", name.trim().to_lowercase());
    Ok(())
}

fn cmd_face_list(ctx: &AppContext) -> Result<()> {
    let known_faces = ctx.known_faces();
    if known_faces.is_empty() {
        println!("No tagged faces.");
        return Ok(());
    }
    for name in known_faces.names() {
        println!("{name}");
    }
    Ok(())
}

fn print_groups(label: &str, groups: &[Vec<IndexRecord>]) {
    if groups.is_empty() {
        println!("No {label} found.");
        return;
    }
    println!("Found {} groups of {label}:", groups.len());
    for (i, group) in groups.iter().enumerate() {
        println!("  Group {}:", i + 1);
        for record in group {
            println!("    - {}", record.file_path);
        }
    }
}

/// First 100 characters of the record text with whitespace collapsed.
fn text_snippet(text: &str) -> String {
    let joined = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if joined.len() <= 100 {
        joined
    } else {
        let mut end = 100;
        while !joined.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &joined[..end])
    }
}
