use chunkflow_common::checksum::compute_bytes_checksum;
use chunkflow_common::types::ChecksumAlgorithm;

use super::FingerprintMapper;

/// Hex digest of the input string
#[derive(Debug, Clone, Copy, Default)]
pub struct DigestMapper {
    algorithm: ChecksumAlgorithm,
}

impl DigestMapper {
    pub fn new(algorithm: ChecksumAlgorithm) -> Self {
        Self { algorithm }
    }
}

impl FingerprintMapper for DigestMapper {
    fn name(&self) -> &str {
        self.algorithm.as_str()
    }

    fn map(&self, input: &str) -> String {
        compute_bytes_checksum(input.as_bytes(), self.algorithm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_of_input() {
        let mapper = DigestMapper::default();
        assert_eq!(mapper.name(), "sha256");
        assert_eq!(
            mapper.map("hello world"),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }
}
