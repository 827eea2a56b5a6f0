use super::{Reader, ensure_len};
use crate::error::{EncodeError, ParseError, ParseResult};

pub const MAX_EMBEDDING_LEN: usize = 1024;

/// Face feature vector. [COUNT:4][VALUE:4 * COUNT]
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Embedding {
    pub values: Vec<f32>,
}

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn l2_norm(&self) -> f32 {
        self.values.iter().map(|v| v * v).sum::<f32>().sqrt()
    }

    /// Unit length copy. A zero vector stays zero.
    pub fn normalized(&self) -> Self {
        let norm = self.l2_norm();
        if norm == 0.0 {
            return self.clone();
        }
        Self::new(self.values.iter().map(|v| v / norm).collect())
    }

    /// `None` when the lengths differ or either vector is zero.
    pub fn cosine_similarity(&self, other: &Self) -> Option<f32> {
        if self.len() != other.len() {
            return None;
        }
        let (a, b) = (self.l2_norm(), other.l2_norm());
        if a == 0.0 || b == 0.0 {
            return None;
        }
        let dot: f32 = self.values.iter().zip(&other.values).map(|(x, y)| x * y).sum();
        Some(dot / (a * b))
    }

    pub fn encode(&self) -> Result<Vec<u8>, EncodeError> {
        if self.values.len() > MAX_EMBEDDING_LEN {
            return Err(EncodeError::CountTooLarge {
                field: "embedding",
                count: self.values.len(),
                max:   MAX_EMBEDDING_LEN,
            });
        }

        let mut out = Vec::with_capacity(4 + self.values.len() * 4);
        out.extend_from_slice(&(self.values.len() as u32).to_le_bytes());
        for v in &self.values {
            out.extend_from_slice(&v.to_le_bytes());
        }
        Ok(out)
    }
}

impl TryFrom<&[u8]> for Embedding {
    type Error = ParseError;

    fn try_from(body: &[u8]) -> ParseResult<Self> {
        ensure_len(body, 4)?;

        let mut r = Reader::new(body);
        let count = r.u32()? as usize;
        if count > MAX_EMBEDDING_LEN {
            return Err(ParseError::CountTooLarge {
                field: "embedding",
                count,
                max: MAX_EMBEDDING_LEN,
            });
        }

        let data = r.bytes(count * 4)?;
        let values = data
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();

        Ok(Self { values })
    }
}
