//! Content fingerprinting — deterministic identification of artifacts and runs.
//!
//! Every field is written with an explicit length or presence prefix so that
//! adjacent fields can never alias (`"ab" + "c"` hashes differently from
//! `"a" + "bc"`). Floats are hashed by their bit pattern, which keeps the
//! hash stable across platforms and makes identity sensitive to any change
//! in a computed value.

use chrono::NaiveDate;

use crate::domain::ArtifactId;

/// Incremental BLAKE3 hasher over typed fields.
#[derive(Debug, Clone)]
pub struct ContentHasher {
    inner: blake3::Hasher,
}

impl ContentHasher {
    /// Start a hash for a given artifact kind. The kind is part of the hash,
    /// so a proposal and a critique with identical text never collide.
    pub fn new(kind: &str) -> Self {
        let mut hasher = Self {
            inner: blake3::Hasher::new(),
        };
        hasher.text(kind);
        hasher
    }

    pub fn text(&mut self, value: &str) -> &mut Self {
        self.inner.update(&(value.len() as u64).to_le_bytes());
        self.inner.update(value.as_bytes());
        self
    }

    pub fn number(&mut self, value: f64) -> &mut Self {
        self.inner.update(&value.to_bits().to_le_bytes());
        self
    }

    pub fn maybe_number(&mut self, value: Option<f64>) -> &mut Self {
        match value {
            Some(v) => {
                self.inner.update(&[1]);
                self.number(v)
            }
            None => {
                self.inner.update(&[0]);
                self
            }
        }
    }

    pub fn count(&mut self, value: u64) -> &mut Self {
        self.inner.update(&value.to_le_bytes());
        self
    }

    pub fn flag(&mut self, value: bool) -> &mut Self {
        self.inner.update(&[u8::from(value)]);
        self
    }

    pub fn date(&mut self, value: NaiveDate) -> &mut Self {
        self.text(&value.to_string())
    }

    pub fn id(&mut self, value: &ArtifactId) -> &mut Self {
        self.text(value.as_str())
    }

    /// Hash an ordered list of strings (length-prefixed as a whole).
    pub fn texts<S: AsRef<str>>(&mut self, values: &[S]) -> &mut Self {
        self.count(values.len() as u64);
        for v in values {
            self.text(v.as_ref());
        }
        self
    }

    pub fn finish_hex(&self) -> String {
        self.inner.finalize().to_hex().to_string()
    }

    pub fn finish(&self) -> ArtifactId {
        ArtifactId::from_hex(self.finish_hex())
    }
}
