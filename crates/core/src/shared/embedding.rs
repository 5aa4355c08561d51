use serde::{Deserialize, Serialize};

/// A fixed-length facial feature vector.
///
/// Dimensionality is fixed per deployment (128 for dlib-style encodings,
/// 512 for the bundled recognition model) and must agree across every pair
/// of vectors that are compared. Scores are accumulated in f64 even though
/// components are stored as f32.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Embedding(Vec<f32>);

impl Embedding {
    pub fn new(components: Vec<f32>) -> Self {
        Self(components)
    }

    pub fn dimension(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn l2_norm(&self) -> f64 {
        self.0
            .iter()
            .map(|x| (*x as f64) * (*x as f64))
            .sum::<f64>()
            .sqrt()
    }

    /// Scales the vector to unit L2 norm. Zero vectors are left untouched;
    /// the cosine scorer rejects them explicitly rather than dividing here.
    pub fn l2_normalize(&mut self) {
        let norm = self.l2_norm();
        if norm > 0.0 {
            for x in self.0.iter_mut() {
                *x = (*x as f64 / norm) as f32;
            }
        }
    }
}

impl From<Vec<f32>> for Embedding {
    fn from(components: Vec<f32>) -> Self {
        Self::new(components)
    }
}
