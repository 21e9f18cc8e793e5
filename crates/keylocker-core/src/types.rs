use serde::{Deserialize, Serialize};

/// The logical payload a caller protects: an ordered JSON object.
///
/// Field order is preserved through serialization, so the canonical byte form
/// of a record is stable for a given insertion order.
pub type SecretRecord = serde_json::Map<String, serde_json::Value>;

/// Describes how an encoded payload was laid out across backend blobs.
///
/// `chunks == 0` means the payload lives in the single primary blob.
/// The JSON field names are part of the stored format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub chunks: u32,
    #[serde(rename = "totalLength")]
    pub total_length: u64,
}

impl ChunkMetadata {
    pub fn single(total_length: u64) -> Self {
        Self {
            chunks: 0,
            total_length,
        }
    }

    pub fn chunked(chunks: u32, total_length: u64) -> Self {
        Self {
            chunks,
            total_length,
        }
    }

    pub fn is_chunked(&self) -> bool {
        self.chunks > 0
    }

    pub fn to_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    pub fn from_bytes(data: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(data)
    }
}
