//! File fingerprints
//!
//! A fingerprint is the canonical identifier a job's artifacts are stored and
//! looked up under. It is produced from an identifying string by a pluggable
//! [`FingerprintMapper`]; mappers are stateless and shared by every job
//! through the cloneable [`Mapper`] handle.

mod digest;
mod identity;

pub use digest::DigestMapper;
pub use identity::IdentityMapper;

use std::fmt;
use std::sync::Arc;

/// Maps an identifying string to its canonical fingerprint string
pub trait FingerprintMapper: Send + Sync + fmt::Debug {
    /// Stable mapper name, e.g. "none" or "sha256"
    fn name(&self) -> &str;

    fn map(&self, input: &str) -> String;
}

/// Shared handle to a mapper
#[derive(Clone)]
pub struct Mapper(Arc<dyn FingerprintMapper>);

impl Mapper {
    pub fn new(mapper: impl FingerprintMapper + 'static) -> Self {
        Self(Arc::new(mapper))
    }

    pub fn identity() -> Self {
        Self::new(IdentityMapper)
    }

    pub fn name(&self) -> &str {
        self.0.name()
    }

    pub fn compute(&self, input: &str) -> Fingerprint {
        Fingerprint {
            value: self.0.map(input),
            mapper: self.clone(),
        }
    }
}

impl fmt::Debug for Mapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Mapper").field(&self.name()).finish()
    }
}

impl PartialEq for Mapper {
    fn eq(&self, other: &Self) -> bool {
        self.name() == other.name()
    }
}

impl Eq for Mapper {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    value: String,
    mapper: Mapper,
}

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// Mapper that produced this fingerprint
    pub fn mapper(&self) -> &Mapper {
        &self.mapper
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_keeps_uuid_verbatim() {
        let fp = Mapper::identity().compute("8d6b5f5a-dc3b-4513-b504-e4de2d594751");
        assert_eq!(fp.as_str(), "8d6b5f5a-dc3b-4513-b504-e4de2d594751");
        assert_eq!(fp.mapper().name(), "none");
    }

    #[test]
    fn equality_considers_mapper() {
        let identity = Mapper::identity();
        let digest = Mapper::new(DigestMapper::default());

        assert_eq!(identity.compute("abc"), identity.compute("abc"));
        assert_ne!(identity.compute("abc"), digest.compute("abc"));
    }
}
