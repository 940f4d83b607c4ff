use crate::registry::oci::{Descriptor, Digest, Error};
use serde::{Deserialize, Serialize};

const OCI_INDEX_MEDIA_TYPE: &str = "application/vnd.oci.image.index.v1+json";
const DOCKER_MANIFEST_LIST_MEDIA_TYPE: &str =
    "application/vnd.docker.distribution.manifest.list.v2+json";

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct FsLayer {
    #[serde(rename = "blobSum")]
    pub blob_sum: Digest,
}

/// A manifest document as stored in the registry.
///
/// Decoding is tolerant: the same structure covers OCI image manifests and
/// indexes, Docker schema2 manifests and manifest lists, and legacy Docker
/// schema1 manifests.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    #[serde(default)]
    pub schema_version: i32,
    #[serde(default)]
    pub media_type: Option<String>,
    #[serde(default)]
    pub config: Option<Descriptor>,
    #[serde(default)]
    pub layers: Vec<Descriptor>,
    #[serde(default)]
    pub manifests: Vec<Descriptor>,
    #[serde(default)]
    pub fs_layers: Vec<FsLayer>,
}

impl Manifest {
    pub fn from_slice(s: &[u8]) -> Result<Self, Error> {
        Ok(serde_json::from_slice(s)?)
    }

    pub fn is_index(&self) -> bool {
        match self.media_type.as_deref() {
            Some(OCI_INDEX_MEDIA_TYPE | DOCKER_MANIFEST_LIST_MEDIA_TYPE) => true,
            _ => !self.manifests.is_empty(),
        }
    }

    /// Content references declared by this document, in document order.
    pub fn references(&self) -> Vec<Descriptor> {
        let mut references = Vec::new();

        for layer in &self.fs_layers {
            references.push(Descriptor {
                media_type: String::new(),
                digest: layer.blob_sum.clone(),
                size: 0,
            });
        }

        if let Some(config) = &self.config {
            references.push(config.clone());
        }

        references.extend(self.layers.iter().cloned());
        references.extend(self.manifests.iter().cloned());
        references
    }

    pub fn references_size(&self) -> u64 {
        self.references()
            .iter()
            .fold(0u64, |total, reference| total.saturating_add(reference.size))
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;

    const CONFIG: &str = "sha256:1111111111111111111111111111111111111111111111111111111111111111";
    const LAYER_A: &str = "sha256:2222222222222222222222222222222222222222222222222222222222222222";
    const LAYER_B: &str = "sha256:3333333333333333333333333333333333333333333333333333333333333333";

    #[test]
    fn test_image_manifest_references() {
        let body = format!(
            r#"{{
                "schemaVersion": 2,
                "mediaType": "application/vnd.oci.image.manifest.v1+json",
                "config": {{
                    "mediaType": "application/vnd.oci.image.config.v1+json",
                    "digest": "{CONFIG}",
                    "size": 100
                }},
                "layers": [
                    {{ "mediaType": "application/vnd.oci.image.layer.v1.tar+gzip", "digest": "{LAYER_A}", "size": 1000 }},
                    {{ "mediaType": "application/vnd.oci.image.layer.v1.tar+gzip", "digest": "{LAYER_B}", "size": 2000 }}
                ]
            }}"#
        );

        let manifest = Manifest::from_slice(body.as_bytes()).unwrap();
        assert!(!manifest.is_index());

        let digests: Vec<String> = manifest
            .references()
            .iter()
            .map(|r| r.digest.to_string())
            .collect();
        assert_eq!(digests, vec![CONFIG, LAYER_A, LAYER_B]);
        assert_eq!(manifest.references_size(), 3100);
    }

    #[test]
    fn test_manifest_list_references() {
        let body = format!(
            r#"{{
                "schemaVersion": 2,
                "mediaType": "application/vnd.docker.distribution.manifest.list.v2+json",
                "manifests": [
                    {{ "mediaType": "application/vnd.docker.distribution.manifest.v2+json", "digest": "{LAYER_A}", "size": 528 }},
                    {{ "mediaType": "application/vnd.docker.distribution.manifest.v2+json", "digest": "{LAYER_B}", "size": 529 }}
                ]
            }}"#
        );

        let manifest = Manifest::from_slice(body.as_bytes()).unwrap();
        assert!(manifest.is_index());
        assert_eq!(manifest.references().len(), 2);
        assert_eq!(manifest.references_size(), 1057);
    }

    #[test]
    fn test_schema1_references() {
        let body = format!(
            r#"{{
                "schemaVersion": 1,
                "name": "library/test",
                "tag": "latest",
                "fsLayers": [ {{ "blobSum": "{LAYER_A}" }}, {{ "blobSum": "{LAYER_B}" }} ],
                "history": []
            }}"#
        );

        let manifest = Manifest::from_slice(body.as_bytes()).unwrap();
        let references = manifest.references();
        assert_eq!(references.len(), 2);
        assert_eq!(references[0].digest.to_string(), LAYER_A);
        assert_eq!(manifest.references_size(), 0);
    }

    #[test]
    fn test_invalid_manifest() {
        assert!(Manifest::from_slice(b"not a manifest").is_err());
        assert!(Manifest::from_slice(br#"{"layers": [{"digest": "sha256:abc"}]}"#).is_err());
    }
}
