//! Content and perceptual fingerprints for duplicate detection.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use image::DynamicImage;
use image_hasher::{HashAlg, HasherConfig};
use sha2::{Digest, Sha256};

/// Chunk size for content hashing; keeps memory flat on large originals.
const CONTENT_CHUNK: usize = 8192;

pub type ContentDigest = [u8; 32];

/// SHA-256 over the file bytes. Identical bytes always produce the same
/// digest; an unreadable file propagates so callers can skip it.
pub fn content_hash(path: &Path) -> io::Result<ContentDigest> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut chunk = [0u8; CONTENT_CHUNK];
    loop {
        let n = file.read(&mut chunk)?;
        if n == 0 {
            break;
        }
        hasher.update(&chunk[..n]);
    }
    Ok(hasher.finalize().into())
}

/// 64-bit gradient hash of the image's visual structure. Robust to
/// recompression and mild resizing, sensitive to real content changes.
pub fn perceptual_hash(image: &DynamicImage) -> Vec<u8> {
    let hasher = HasherConfig::new()
        .hash_alg(HashAlg::Gradient)
        .hash_size(8, 8)
        .to_hasher();
    hasher.hash_image(image).as_bytes().to_vec()
}

/// Bit-level distance between two perceptual hashes of the same size.
pub fn hamming_distance(a: &[u8], b: &[u8]) -> u32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x ^ y).count_ones()).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient_image(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(image::RgbaImage::from_fn(width, height, |x, _| {
            let v = (x * 255 / width.max(1)) as u8;
            image::Rgba([v, v, v, 255])
        }))
    }

    fn solid_image(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(image::RgbaImage::from_pixel(
            width,
            height,
            image::Rgba([40, 90, 200, 255]),
        ))
    }

    #[test]
    fn test_content_hash_identical_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.bin");
        let b = dir.path().join("b.bin");
        std::fs::write(&a, b"same payload").unwrap();
        std::fs::write(&b, b"same payload").unwrap();

        assert_eq!(content_hash(&a).unwrap(), content_hash(&b).unwrap());
    }

    #[test]
    fn test_content_hash_differs() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.bin");
        let b = dir.path().join("b.bin");
        std::fs::write(&a, b"payload one").unwrap();
        std::fs::write(&b, b"payload two").unwrap();

        assert_ne!(content_hash(&a).unwrap(), content_hash(&b).unwrap());
    }

    #[test]
    fn test_content_hash_unreadable_propagates() {
        assert!(content_hash(Path::new("/no/such/file.bin")).is_err());
    }

    #[test]
    fn test_hamming_distance() {
        assert_eq!(hamming_distance(&[0x00], &[0x00]), 0);
        assert_eq!(hamming_distance(&[0x00], &[0x01]), 1);
        assert_eq!(hamming_distance(&[0xFF, 0x00], &[0x00, 0x00]), 8);
        assert_eq!(hamming_distance(&[0b1010], &[0b0101]), 4);
    }

    #[test]
    fn test_perceptual_hash_identical_images() {
        let a = gradient_image(64, 64);
        let b = gradient_image(64, 64);
        assert_eq!(hamming_distance(&perceptual_hash(&a), &perceptual_hash(&b)), 0);
    }

    #[test]
    fn test_perceptual_hash_resize_stable() {
        // the same picture at two sizes should stay well under the
        // near-duplicate threshold
        let large = gradient_image(256, 256);
        let small = gradient_image(64, 64);
        assert!(hamming_distance(&perceptual_hash(&large), &perceptual_hash(&small)) <= 10);
    }

    #[test]
    fn test_perceptual_hash_distinguishes_content() {
        let gradient = gradient_image(64, 64);
        let solid = solid_image(64, 64);
        assert!(hamming_distance(&perceptual_hash(&gradient), &perceptual_hash(&solid)) > 10);
    }
}
