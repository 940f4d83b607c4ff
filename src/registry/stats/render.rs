use crate::registry::blob_store::BlobStoreHandle;
use crate::registry::metadata_store::MetadataStore;
use crate::registry::oci::{Digest, Namespace};
use crate::registry::stats::StatsReport;
use bytesize::ByteSize;
use std::sync::Arc;
use tracing::debug;

/// Human readable rendition of a report.
///
/// Sizes are looked up lazily and on a best-effort basis: a manifest that
/// cannot be fetched is listed without size, an orphan blob whose size is
/// unknown is listed as empty.
pub struct ReportRenderer {
    metadata_store: Arc<dyn MetadataStore>,
    blob_store: BlobStoreHandle,
}

impl ReportRenderer {
    pub fn new(metadata_store: Arc<dyn MetadataStore>, blob_store: BlobStoreHandle) -> Self {
        Self {
            metadata_store,
            blob_store,
        }
    }

    pub async fn render(&self, report: &StatsReport) -> String {
        let mut lines = vec!["repos:".to_string()];

        for (namespace, stats) in &report.repositories {
            lines.push(format!("  {namespace}:"));

            lines.push("    tags:".to_string());
            for (tag, digest) in &stats.tags {
                let line = match digest {
                    None => format!("      {namespace}:{tag}@missing"),
                    Some(digest) => {
                        let reference = format!("{namespace}:{tag}@{digest}");
                        self.manifest_line(namespace, digest, reference).await
                    }
                };
                lines.push(line);
            }

            lines.push("    untagged:".to_string());
            for digest in stats.untagged() {
                let reference = format!("{namespace}@{digest}");
                lines.push(self.manifest_line(namespace, digest, reference).await);
            }
        }

        lines.push("orphan:".to_string());
        for digest in &report.orphan_blobs {
            let size = match self.blob_store.get_blob_size(digest).await {
                Ok(size) => size,
                Err(e) => {
                    debug!("Unable to get size of orphan blob {digest}: {e}");
                    0
                }
            };
            lines.push(format!("  {digest}, size: {}", format_size(size)));
        }

        let mut output = lines.join("\n");
        output.push('\n');
        output
    }

    async fn manifest_line(
        &self,
        namespace: &Namespace,
        digest: &Digest,
        reference: String,
    ) -> String {
        match self.metadata_store.read_manifest(namespace, digest).await {
            Ok(manifest) => format!(
                "      {reference}, size: {}",
                format_size(manifest.references_size())
            ),
            Err(e) => {
                debug!("Unable to compute size of {reference}: {e}");
                format!("      {reference}")
            }
        }
    }
}

/// Binary units, one decimal place from 1 KiB up.
fn format_size(size: u64) -> String {
    ByteSize::b(size).display().iec().to_string()
}
