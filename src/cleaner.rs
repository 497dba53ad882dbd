//! Duplicate detection and cleanup scans over the index.
//!
//! Both scans read the store and the filesystem; neither mutates
//! anything. Files that vanished since indexing are skipped, and a single
//! unreadable image never aborts a scan.

use std::collections::HashMap;
use std::path::Path;

use image::DynamicImage;
use serde::Serialize;

use crate::fingerprint::{content_hash, hamming_distance, perceptual_hash, ContentDigest};
use crate::records::{IndexRecord, IndexStore};

/// Fraction of pixels one color must cover for an image to count as
/// low-information.
const LOW_INFO_DOMINANCE: f64 = 0.98;
const LOW_INFO_SAMPLE_DIM: u32 = 100;

#[derive(Debug, Default, Serialize)]
pub struct DuplicateReport {
    /// Groups of byte-identical files.
    pub exact: Vec<Vec<IndexRecord>>,
    /// Groups of visually similar files. Grouping is greedy first-pass
    /// connectivity: similarity chains land in one group even when the
    /// chain's endpoints are not themselves within the threshold.
    pub near: Vec<Vec<IndexRecord>>,
}

#[derive(Debug, thiserror::Error)]
pub enum CleanerError {
    #[error("the index is empty; run `snapscout index` first")]
    IndexNotReady,
}

pub fn find_duplicates(
    store: &IndexStore,
    near_threshold: u32,
    mut on_status: impl FnMut(&str),
) -> Result<DuplicateReport, CleanerError> {
    if store.is_empty() {
        return Err(CleanerError::IndexNotReady);
    }

    on_status("Scanning for exact duplicates...");
    let exact = exact_groups(store);

    on_status("Scanning for near-duplicates (this may take a while)...");
    let near = near_groups(store, near_threshold);

    on_status("Duplicate scan complete.");
    Ok(DuplicateReport { exact, near })
}

fn exact_groups(store: &IndexStore) -> Vec<Vec<IndexRecord>> {
    let mut order: Vec<ContentDigest> = Vec::new();
    let mut by_digest: HashMap<ContentDigest, Vec<&IndexRecord>> = HashMap::new();

    for record in store.iter() {
        let path = Path::new(&record.file_path);
        if !path.exists() {
            continue;
        }
        let digest = match content_hash(path) {
            Ok(digest) => digest,
            Err(err) => {
                log::warn!("cannot hash {}: {err}", record.file_path);
                continue;
            }
        };
        let members = by_digest.entry(digest).or_insert_with(|| {
            order.push(digest);
            Vec::new()
        });
        members.push(record);
    }

    order
        .into_iter()
        .filter_map(|digest| {
            let members = &by_digest[&digest];
            (members.len() > 1).then(|| members.iter().map(|r| (*r).clone()).collect())
        })
        .collect()
}

fn near_groups(store: &IndexStore, threshold: u32) -> Vec<Vec<IndexRecord>> {
    let mut hashed: Vec<(&IndexRecord, Vec<u8>)> = Vec::new();
    for record in store.iter() {
        let path = Path::new(&record.file_path);
        if !path.exists() {
            continue;
        }
        match image::open(path) {
            Ok(image) => hashed.push((record, perceptual_hash(&image))),
            Err(err) => log::warn!("cannot open {}: {err}", record.file_path),
        }
    }

    let hashes: Vec<&[u8]> = hashed.iter().map(|(_, hash)| hash.as_slice()).collect();
    cluster_by_distance(&hashes, threshold)
        .into_iter()
        .map(|members| members.into_iter().map(|idx| hashed[idx].0.clone()).collect())
        .collect()
}

/// Greedy first-pass clustering. Each still-unclaimed seed collects every
/// unclaimed hash within `threshold` of any member gathered so far; groups
/// with at least two members claim their members. Not a transitive
/// partition: the result depends on iteration order.
fn cluster_by_distance(hashes: &[&[u8]], threshold: u32) -> Vec<Vec<usize>> {
    let mut groups = Vec::new();
    let mut claimed = vec![false; hashes.len()];

    for seed in 0..hashes.len() {
        if claimed[seed] {
            continue;
        }
        let mut members = vec![seed];
        for candidate in 0..hashes.len() {
            if candidate == seed || claimed[candidate] || members.contains(&candidate) {
                continue;
            }
            if members
                .iter()
                .any(|&m| hamming_distance(hashes[m], hashes[candidate]) <= threshold)
            {
                members.push(candidate);
            }
        }
        if members.len() > 1 {
            for &member in &members {
                claimed[member] = true;
            }
            groups.push(members);
        }
    }

    groups
}

/// Records whose image is almost entirely one color (supplemental cleanup
/// scan alongside duplicate detection).
pub fn find_low_information(
    store: &IndexStore,
    mut on_status: impl FnMut(&str),
) -> Result<Vec<IndexRecord>, CleanerError> {
    if store.is_empty() {
        return Err(CleanerError::IndexNotReady);
    }

    on_status("Scanning for low-information images...");
    let mut flagged = Vec::new();
    for record in store.iter() {
        let path = Path::new(&record.file_path);
        if !path.exists() {
            continue;
        }
        let image = match image::open(path) {
            Ok(image) => image,
            Err(err) => {
                log::warn!("cannot open {}: {err}", record.file_path);
                continue;
            }
        };
        if is_low_information(&image) {
            flagged.push(record.clone());
        }
    }

    on_status(&format!(
        "Low-information scan complete: {} flagged.",
        flagged.len()
    ));
    Ok(flagged)
}

fn is_low_information(image: &DynamicImage) -> bool {
    // Analyze a small sample; color dominance survives the downscale.
    let sample = image
        .thumbnail(LOW_INFO_SAMPLE_DIM, LOW_INFO_SAMPLE_DIM)
        .to_rgba8();
    let total = (sample.width() * sample.height()) as f64;
    if total == 0.0 {
        return false;
    }

    let mut counts: HashMap<[u8; 4], u32> = HashMap::new();
    for pixel in sample.pixels() {
        *counts.entry(pixel.0).or_insert(0) += 1;
    }
    let dominant = counts.values().copied().max().unwrap_or(0) as f64;

    dominant / total > LOW_INFO_DOMINANCE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cluster_chain_links_through_middle() {
        // a-b and b-c are within threshold, a-c is not; the chain still
        // forms one group
        let a = [0b0000_0000u8];
        let b = [0b0000_0011u8];
        let c = [0b0000_1111u8];
        let hashes: Vec<&[u8]> = vec![&a, &b, &c];

        let groups = cluster_by_distance(&hashes, 2);
        assert_eq!(groups, vec![vec![0, 1, 2]]);
    }

    #[test]
    fn test_cluster_isolates_far_hashes() {
        let a = [0x00u8];
        let b = [0x00u8];
        let c = [0xFFu8];
        let hashes: Vec<&[u8]> = vec![&a, &b, &c];

        let groups = cluster_by_distance(&hashes, 2);
        assert_eq!(groups, vec![vec![0, 1]]);
    }

    #[test]
    fn test_cluster_no_groups_of_one() {
        let a = [0x00u8];
        let b = [0xFFu8];
        let hashes: Vec<&[u8]> = vec![&a, &b];

        assert!(cluster_by_distance(&hashes, 2).is_empty());
    }

    #[test]
    fn test_low_information_solid() {
        let image = DynamicImage::ImageRgba8(image::RgbaImage::from_pixel(
            200,
            200,
            image::Rgba([255, 255, 255, 255]),
        ));
        assert!(is_low_information(&image));
    }

    #[test]
    fn test_low_information_rejects_varied_content() {
        let image = DynamicImage::ImageRgba8(image::RgbaImage::from_fn(200, 200, |x, y| {
            image::Rgba([(x % 256) as u8, (y % 256) as u8, 128, 255])
        }));
        assert!(!is_low_information(&image));
    }
}
