// src/hashing/perceptual.rs

use anyhow::{Context, Result};
use image::imageops::FilterType;

/// Fixed-length bit string produced by average-luminance thresholding.
/// Bits are stored in raster order, 64 per word, least significant first.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageHash {
    words: Vec<u64>,
    len: usize,
}

impl ImageHash {
    pub fn from_bits<I: IntoIterator<Item = bool>>(bits: I) -> Self {
        let mut words = Vec::new();
        let mut len = 0;
        for bit in bits {
            if len % 64 == 0 {
                words.push(0);
            }
            if bit {
                words[len / 64] |= 1 << (len % 64);
            }
            len += 1;
        }
        Self { words, len }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn bit(&self, index: usize) -> bool {
        index < self.len && self.words[index / 64] & (1 << (index % 64)) != 0
    }

    pub fn count_ones(&self) -> u32 {
        self.words.iter().map(|w| w.count_ones()).sum()
    }

    /// Number of differing bits, or `None` when the lengths differ.
    pub fn hamming_distance(&self, other: &ImageHash) -> Option<u32> {
        if self.len != other.len {
            return None;
        }
        Some(
            self.words
                .iter()
                .zip(&other.words)
                .map(|(a, b)| (a ^ b).count_ones())
                .sum(),
        )
    }

    /// `1 - hamming / bit_length`. Hashes of different lengths score 0.
    pub fn similarity(&self, other: &ImageHash) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        match self.hamming_distance(other) {
            Some(distance) => 1.0 - distance as f64 / self.len as f64,
            None => 0.0,
        }
    }

    /// `'0'`/`'1'` rendering in raster order.
    pub fn to_bit_string(&self) -> String {
        (0..self.len).map(|i| if self.bit(i) { '1' } else { '0' }).collect()
    }
}

/// Average hash of an encoded image: resize to `hash_size`×`hash_size` with a
/// Lanczos filter, convert to grayscale, then emit one bit per pixel that is
/// 1 when the pixel is at or above the mean intensity.
pub fn average_hash(bytes: &[u8], hash_size: u32) -> Result<ImageHash> {
    if hash_size == 0 {
        anyhow::bail!("hash size must be at least 1");
    }
    let image = image::load_from_memory(bytes).context("Failed to decode image bytes")?;
    let gray = image
        .resize_exact(hash_size, hash_size, FilterType::Lanczos3)
        .to_luma8();

    let pixels = gray.as_raw();
    let mean = pixels.iter().map(|&p| p as f64).sum::<f64>() / pixels.len() as f64;
    Ok(ImageHash::from_bits(pixels.iter().map(|&p| p as f64 >= mean)))
}

#[cfg(test)]
pub(crate) mod test_images {
    use image::{ImageBuffer, ImageFormat, Luma};
    use std::io::Cursor;

    /// PNG with a dark left half and a bright right half (or the reverse).
    pub fn split_png(size: u32, bright_right: bool) -> Vec<u8> {
        let img = ImageBuffer::from_fn(size, size, |x, _| {
            let right = x >= size / 2;
            Luma([if right == bright_right { 255u8 } else { 0u8 }])
        });
        encode(img)
    }

    /// PNG with a dark top half and a bright bottom half.
    pub fn horizontal_split_png(size: u32) -> Vec<u8> {
        let img = ImageBuffer::from_fn(size, size, |_, y| Luma([if y >= size / 2 { 255u8 } else { 0u8 }]));
        encode(img)
    }

    fn encode(img: ImageBuffer<Luma<u8>, Vec<u8>>) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Png).unwrap();
        buf.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::test_images::{horizontal_split_png, split_png};
    use super::*;

    #[test]
    fn test_from_bits_round_trip() {
        let bits: Vec<bool> = (0..70).map(|i| i % 3 == 0).collect();
        let hash = ImageHash::from_bits(bits.clone());
        assert_eq!(hash.len(), 70);
        assert_eq!((0..70).map(|i| hash.bit(i)).collect::<Vec<_>>(), bits);
        assert_eq!(hash.count_ones(), 24);
        assert!(!hash.bit(70));
    }

    #[test]
    fn test_similarity_with_itself_is_one() {
        let hash = average_hash(&split_png(64, true), 8).unwrap();
        assert_eq!(hash.similarity(&hash), 1.0);
        assert_eq!(hash.hamming_distance(&hash), Some(0));
    }

    #[test]
    fn test_average_hash_thresholds_on_mean() {
        let hash = average_hash(&split_png(64, true), 8).unwrap();
        assert_eq!(hash.len(), 64);
        assert_eq!(hash.count_ones(), 32);
        // Raster order: each row starts dark and ends bright.
        assert!(!hash.bit(0));
        assert!(hash.bit(7));
        assert_eq!(&hash.to_bit_string()[..8], "00001111");
    }

    #[test]
    fn test_inverted_image_is_dissimilar() {
        let a = average_hash(&split_png(64, true), 8).unwrap();
        let b = average_hash(&split_png(64, false), 8).unwrap();
        assert_eq!(a.similarity(&b), 0.0);

        let c = average_hash(&horizontal_split_png(64), 8).unwrap();
        assert_eq!(a.similarity(&c), 0.5);
    }

    #[test]
    fn test_hash_size_controls_bit_length() {
        let hash = average_hash(&split_png(64, true), 16).unwrap();
        assert_eq!(hash.len(), 256);
        let small = average_hash(&split_png(64, true), 8).unwrap();
        assert_eq!(hash.similarity(&small), 0.0);
        assert_eq!(hash.hamming_distance(&small), None);
    }

    #[test]
    fn test_undecodable_bytes_fail() {
        assert!(average_hash(b"definitely not an image", 8).is_err());
    }
}
