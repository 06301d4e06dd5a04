/// Controls how queue specs are loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoaderConfig {
    /// Maximum size of a queue spec file in bytes.
    pub max_spec_file_size: usize,
    /// Check the document against the embedded JSON Schema before semantic
    /// validation. Only takes effect with the `schema` feature.
    pub check_schema: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            max_spec_file_size: 256 * 1024,
            check_schema: true,
        }
    }
}
