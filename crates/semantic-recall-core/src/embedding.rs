//! Vector utilities: the persisted byte codec, L2 normalization, and
//! mask-aware mean pooling.
//!
//! Embeddings are stored as `4 × D` bytes of little-endian IEEE-754 `f32`.
//! A blob of any other length is a corrupt record.

use thiserror::Error;

/// A stored blob whose length does not match the declared dimension.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("embedding blob is {actual} bytes, expected {expected}")]
pub struct BlobLengthError {
    pub expected: usize,
    pub actual: usize,
}

/// Encode a float vector as a BLOB (little-endian f32 bytes).
///
/// # Example
///
/// ```rust
/// use semantic_recall_core::embedding::{vec_to_blob, blob_to_vec};
///
/// let v = vec![1.0f32, -2.5, 3.125];
/// let blob = vec_to_blob(&v);
/// assert_eq!(blob.len(), 12);
/// assert_eq!(blob_to_vec(&blob, 3).unwrap(), v);
/// ```
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into a float vector of exactly `dims` values.
pub fn blob_to_vec(blob: &[u8], dims: usize) -> Result<Vec<f32>, BlobLengthError> {
    let expected = dims * 4;
    if blob.len() != expected {
        return Err(BlobLengthError {
            expected,
            actual: blob.len(),
        });
    }
    Ok(blob
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

/// Euclidean norm.
pub fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Scale `v` to unit length. Zero vectors are returned unchanged.
pub fn normalize_l2(mut v: Vec<f32>) -> Vec<f32> {
    let norm = l2_norm(&v);
    if norm > 1e-9 {
        for x in &mut v {
            *x /= norm;
        }
    }
    v
}

/// Average token vectors over positions whose mask is non-zero.
///
/// `hidden` is a row-major `[seq_len, dims]` buffer. Padding rows (mask `0`)
/// contribute nothing. Returns a zero vector when every position is masked.
pub fn mean_pool(hidden: &[f32], mask: &[i64], dims: usize) -> Vec<f32> {
    let mut sum = vec![0f32; dims];
    let mut count = 0f32;
    for (row, &m) in hidden.chunks_exact(dims).zip(mask.iter()) {
        if m == 0 {
            continue;
        }
        for (acc, &v) in sum.iter_mut().zip(row) {
            *acc += v;
        }
        count += 1.0;
    }
    if count > 0.0 {
        for x in &mut sum {
            *x /= count;
        }
    }
    sum
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec_blob_roundtrip_is_bit_exact() {
        let vec = vec![1.0f32, -2.5, 3.125, 0.0, -0.001, f32::MIN_POSITIVE];
        let blob = vec_to_blob(&vec);
        assert_eq!(blob.len(), vec.len() * 4);
        let restored = blob_to_vec(&blob, vec.len()).unwrap();
        let a: Vec<u32> = vec.iter().map(|v| v.to_bits()).collect();
        let b: Vec<u32> = restored.iter().map(|v| v.to_bits()).collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_blob_is_little_endian() {
        assert_eq!(vec_to_blob(&[1.0]), vec![0x00, 0x00, 0x80, 0x3f]);
    }

    #[test]
    fn test_blob_wrong_length_is_rejected() {
        let blob = vec_to_blob(&[1.0, 2.0, 3.0]);
        assert_eq!(
            blob_to_vec(&blob, 4),
            Err(BlobLengthError {
                expected: 16,
                actual: 12
            })
        );
        assert!(blob_to_vec(&blob[..11], 3).is_err());
    }

    #[test]
    fn test_normalize_unit_length() {
        let v = normalize_l2(vec![3.0, 4.0]);
        assert!((l2_norm(&v) - 1.0).abs() < 1e-6);
        assert!((v[0] - 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_zero_vector_unchanged() {
        assert_eq!(normalize_l2(vec![0.0, 0.0]), vec![0.0, 0.0]);
    }

    #[test]
    fn test_mean_pool_skips_padding() {
        let hidden = vec![
            1.0, 2.0, //
            3.0, 4.0, //
            100.0, 100.0, // padding
        ];
        let pooled = mean_pool(&hidden, &[1, 1, 0], 2);
        assert_eq!(pooled, vec![2.0, 3.0]);
    }

    #[test]
    fn test_mean_pool_all_masked() {
        assert_eq!(mean_pool(&[1.0, 1.0], &[0], 2), vec![0.0, 0.0]);
    }
}
