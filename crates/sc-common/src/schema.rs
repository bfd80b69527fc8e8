//! Schema versioning for machine-readable output.

/// Version of the JSON shapes emitted by `sc-core` (reports, errors, schemas).
///
/// Bump the major component whenever a field is removed or changes meaning.
pub const SCHEMA_VERSION: &str = "1.0.0";

/// Returns the major component of [`SCHEMA_VERSION`].
pub fn schema_major() -> u32 {
    SCHEMA_VERSION
        .split('.')
        .next()
        .and_then(|m| m.parse().ok())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_major() {
        assert_eq!(schema_major(), 1);
    }
}
