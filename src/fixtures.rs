#[cfg(test)]
pub mod test {
    use crate::types::StructuredDocument;

    /// A realistic env file: header block, grouped sections, quoted values.
    pub const SAMPLE_ENV: &str = "\
# Service configuration

APP_NAME=gigboard
# Primary database
DATABASE_URL=postgres://localhost:5432/gigboard
DATABASE_POOL_SIZE=10

# Login providers
OAUTH_CLIENT_ID=abc123
OAUTH_CLIENT_SECRET=\"s3cr3t value\"
ENABLE_SIGNUP=yes
";

    /// Three valid entries interleaved with two malformed lines.
    pub const MIXED_VALID_INVALID: &str = "\
A=1
this line has no equals sign
B=2
= value without key
C=3
";

    pub fn doc(pairs: &[(&str, &str)]) -> StructuredDocument {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn fixtures_are_well_formed() {
        assert!(SAMPLE_ENV.ends_with('\n'));
        assert_eq!(MIXED_VALID_INVALID.lines().count(), 5);
        assert_eq!(doc(&[("A", "1")]).len(), 1);
    }
}
