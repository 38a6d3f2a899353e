//! Exact inner-product index over L2-normalized vectors.
//!
//! Vectors live in one contiguous buffer; row `i` is the `i`-th vector ever
//! added since the last rebuild. There is no point deletion.

use docrag_core::error::{Error, Result};
use docrag_core::types::SearchHit;

#[derive(Debug, Clone, PartialEq)]
pub struct FlatIndex {
    dim: usize,
    data: Vec<f32>,
}

pub fn l2_normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

impl FlatIndex {
    pub fn new(dim: usize) -> Self {
        Self { dim, data: Vec::new() }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn len(&self) -> usize {
        if self.dim == 0 { 0 } else { self.data.len() / self.dim }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Append vectors at the end, normalizing each. Either all are added or none.
    pub fn add(&mut self, vectors: &[Vec<f32>]) -> Result<()> {
        if let Some(bad) = vectors.iter().find(|v| v.len() != self.dim) {
            return Err(Error::DimensionMismatch { expected: self.dim, actual: bad.len() });
        }
        self.data.reserve(vectors.len() * self.dim);
        for v in vectors {
            let start = self.data.len();
            self.data.extend_from_slice(v);
            l2_normalize(&mut self.data[start..]);
        }
        Ok(())
    }

    pub fn vector(&self, i: usize) -> Option<&[f32]> {
        let start = i.checked_mul(self.dim)?;
        self.data.get(start..start + self.dim)
    }

    pub fn iter(&self) -> impl Iterator<Item = &[f32]> {
        self.data.chunks_exact(self.dim.max(1))
    }

    /// Top-`k` rows by inner product with the normalized query, best first.
    /// Equal scores keep ascending row order.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        if query.len() != self.dim {
            return Err(Error::DimensionMismatch { expected: self.dim, actual: query.len() });
        }
        if k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }
        let mut q = query.to_vec();
        l2_normalize(&mut q);
        let mut hits: Vec<SearchHit> = self
            .iter()
            .enumerate()
            .map(|(index, row)| SearchHit { index, score: row.iter().zip(&q).map(|(a, b)| a * b).sum() })
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(k);
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_is_exact_cosine() {
        let mut idx = FlatIndex::new(2);
        idx.add(&[vec![1.0, 0.0], vec![0.0, 3.0], vec![1.0, 1.0]]).unwrap();
        let hits = idx.search(&[2.0, 0.0], 3).unwrap();
        assert_eq!(hits.iter().map(|h| h.index).collect::<Vec<_>>(), vec![0, 2, 1]);
        assert!((hits[0].score - 1.0).abs() < 1e-6);
        assert!((hits[1].score - std::f32::consts::FRAC_1_SQRT_2).abs() < 1e-6);
        assert!(hits[2].score.abs() < 1e-6);
    }

    #[test]
    fn wrong_dimension_adds_nothing() {
        let mut idx = FlatIndex::new(3);
        let err = idx.add(&[vec![1.0, 0.0, 0.0], vec![1.0]]).unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { expected: 3, actual: 1 }));
        assert_eq!(idx.len(), 0);
    }

    #[test]
    fn ties_keep_insertion_order_and_k_truncates() {
        let mut idx = FlatIndex::new(2);
        idx.add(&[vec![1.0, 0.0], vec![1.0, 0.0], vec![1.0, 0.0]]).unwrap();
        let hits = idx.search(&[1.0, 0.0], 2).unwrap();
        assert_eq!(hits.iter().map(|h| h.index).collect::<Vec<_>>(), vec![0, 1]);
    }

    #[test]
    fn empty_index_returns_no_hits() {
        let idx = FlatIndex::new(4);
        assert!(idx.search(&[0.0; 4], 5).unwrap().is_empty());
        assert!(idx.vector(0).is_none());
    }
}
