//! Vector arithmetic for profile and content embeddings.
//!
//! Every normalization, projection and weighted update in the workspace goes
//! through this module. Sums are accumulated in `f64` so that a normalized
//! vector stays within `1e-6` of unit length even for high dimensions and
//! near-zero inputs.

use crate::Embedding;
use crate::error::{EmbeddingError, Result};

/// Tolerance used when checking that a vector is unit length.
pub const UNIT_TOLERANCE: f32 = 1e-6;

fn check_dimensions(a: &[f32], b: &[f32]) -> Result<()> {
    if a.len() != b.len() {
        return Err(EmbeddingError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }
    Ok(())
}

fn dot_f64(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| f64::from(*x) * f64::from(*y))
        .sum()
}

fn norm_f64(v: &[f32]) -> f64 {
    dot_f64(v, v).sqrt()
}

/// Compute the dot product between two embeddings.
pub fn dot(a: &[f32], b: &[f32]) -> Result<f32> {
    check_dimensions(a, b)?;
    Ok(dot_f64(a, b) as f32)
}

/// Euclidean norm of a vector.
pub fn norm(v: &[f32]) -> f32 {
    norm_f64(v) as f32
}

/// Whether `v` has unit length within `tolerance`.
pub fn is_unit(v: &[f32], tolerance: f32) -> bool {
    (norm_f64(v) - 1.0).abs() <= f64::from(tolerance)
}

/// Return `v / ||v||`.
///
/// A zero vector is returned unchanged so that the degenerate case is visible
/// to the caller instead of turning into NaNs.
pub fn normalize(v: &[f32]) -> Embedding {
    let magnitude = norm_f64(v);
    if magnitude == 0.0 || !magnitude.is_finite() {
        return v.to_vec();
    }
    v.iter()
        .map(|x| (f64::from(*x) / magnitude) as f32)
        .collect()
}

/// Normalize an embedding in place.
pub fn normalize_in_place(embedding: &mut Embedding) {
    let normalized = normalize(embedding);
    *embedding = normalized;
}

/// Component of `v` lying along `onto`: `(v·onto / onto·onto) * onto`.
///
/// Projecting onto the zero vector yields the zero vector.
pub fn project(v: &[f32], onto: &[f32]) -> Result<Embedding> {
    check_dimensions(v, onto)?;

    let denom = dot_f64(onto, onto);
    if denom == 0.0 {
        return Ok(vec![0.0; v.len()]);
    }

    let scale = dot_f64(v, onto) / denom;
    Ok(onto.iter().map(|x| (f64::from(*x) * scale) as f32).collect())
}

/// Component-wise `a - b`.
pub fn subtract(a: &[f32], b: &[f32]) -> Result<Embedding> {
    check_dimensions(a, b)?;
    Ok(a.iter().zip(b.iter()).map(|(x, y)| x - y).collect())
}

/// Return `normalize(base + weight * delta)`.
pub fn weighted_add(base: &[f32], delta: &[f32], weight: f32) -> Result<Embedding> {
    check_dimensions(base, delta)?;

    let combined: Vec<f32> = base
        .iter()
        .zip(delta.iter())
        .map(|(b, d)| (f64::from(*b) + f64::from(weight) * f64::from(*d)) as f32)
        .collect();

    Ok(normalize(&combined))
}

/// Compute the cosine similarity between two embeddings.
///
/// Returns a value between -1.0 and 1.0, where:
/// - 1.0 means identical vectors
/// - 0.0 means orthogonal vectors
/// - -1.0 means opposite vectors
///
/// A zero-magnitude input yields 0.0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
    check_dimensions(a, b)?;

    let magnitude_a = norm_f64(a);
    let magnitude_b = norm_f64(b);

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return Ok(0.0);
    }

    let cosine = dot_f64(a, b) / (magnitude_a * magnitude_b);
    Ok(cosine.clamp(-1.0, 1.0) as f32)
}

/// Angle in radians between two vectors.
pub fn angular_distance(a: &[f32], b: &[f32]) -> Result<f32> {
    Ok(cosine_similarity(a, b)?.acos())
}
