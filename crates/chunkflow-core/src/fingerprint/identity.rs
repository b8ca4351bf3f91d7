use super::FingerprintMapper;

/// Uses the input string verbatim as its own fingerprint.
///
/// Suitable when the caller already supplies a collision-resistant id (for
/// example a client-generated UUID) and content deduplication is not needed.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityMapper;

impl FingerprintMapper for IdentityMapper {
    fn name(&self) -> &str {
        "none"
    }

    fn map(&self, input: &str) -> String {
        input.to_string()
    }
}
