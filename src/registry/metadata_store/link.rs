use crate::registry::metadata_store::Error;
use crate::registry::oci::Digest;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct LinkMetadata {
    pub target: Digest,
}

impl LinkMetadata {
    pub fn from_bytes(s: &[u8]) -> Result<Self, Error> {
        // either a JSON link metadata document or the bare digest
        if let Ok(metadata) = serde_json::from_slice(s) {
            return Ok(metadata);
        }

        let target = std::str::from_utf8(s).map_err(|e| Error::InvalidData(e.to_string()))?;
        let target = Digest::try_from(target)?;
        Ok(LinkMetadata { target })
    }
}
