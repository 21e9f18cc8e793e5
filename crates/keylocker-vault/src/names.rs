//! Deterministic blob names for one logical credential.
//!
//! The `.metadata` and `.chunk.<index>` suffixes are the stored format; other
//! implementations reading the same backend depend on them.

pub const METADATA_SUFFIX: &str = "metadata";
pub const CHUNK_SEGMENT: &str = "chunk";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobNames {
    /// Holds the whole encoded payload when it fits in one blob
    pub primary: String,
    pub metadata: String,
}

impl BlobNames {
    pub fn new(prefix: &str, name: &str) -> Self {
        let primary = if prefix.is_empty() {
            name.to_string()
        } else {
            format!("{prefix}.{name}")
        };
        let metadata = format!("{primary}.{METADATA_SUFFIX}");
        BlobNames { primary, metadata }
    }

    pub fn chunk(&self, index: usize) -> String {
        format!("{}.{CHUNK_SEGMENT}.{index}", self.primary)
    }
}
