use crate::registry::oci::{Digest, Namespace};

const BLOBS_ROOT: &str = "v2/blobs";
const REPOS_ROOT: &str = "v2/repositories";

pub fn blobs_root_dir(algorithm: &str) -> String {
    format!("{BLOBS_ROOT}/{algorithm}")
}

pub fn blobs_prefix_dir(algorithm: &str, prefix: &str) -> String {
    format!("{BLOBS_ROOT}/{algorithm}/{prefix}")
}

pub fn repository_dir() -> &'static str {
    REPOS_ROOT
}

fn blob_dir(digest: &Digest) -> String {
    format!(
        "{BLOBS_ROOT}/{}/{}/{}",
        digest.algorithm(),
        digest.hash_prefix(),
        digest.hash()
    )
}

pub fn blob_path(digest: &Digest) -> String {
    format!("{}/data", blob_dir(digest))
}

pub fn manifest_revisions_link_root_dir(namespace: &Namespace, algorithm: &str) -> String {
    format!("{REPOS_ROOT}/{namespace}/_manifests/revisions/{algorithm}")
}

pub fn manifest_revision_link_path(namespace: &Namespace, digest: &Digest) -> String {
    format!(
        "{}/{}/link",
        manifest_revisions_link_root_dir(namespace, digest.algorithm()),
        digest.hash()
    )
}

pub fn manifest_tags_dir(namespace: &Namespace) -> String {
    format!("{REPOS_ROOT}/{namespace}/_manifests/tags")
}

pub fn manifest_tag_link_path(namespace: &Namespace, tag: &str) -> String {
    format!("{REPOS_ROOT}/{namespace}/_manifests/tags/{tag}/current/link")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blob_paths() {
        let digest = Digest::Sha256("1234567890abcdef".into());
        assert_eq!(
            blob_path(&digest),
            "v2/blobs/sha256/12/1234567890abcdef/data"
        );
        assert_eq!(blobs_root_dir("sha256"), "v2/blobs/sha256");
        assert_eq!(blobs_prefix_dir("sha256", "12"), "v2/blobs/sha256/12");
    }

    #[test]
    fn test_manifest_paths() {
        let namespace = Namespace::new("ns/app").unwrap();
        let digest = Digest::Sha256("digest123".into());

        assert_eq!(
            manifest_revisions_link_root_dir(&namespace, "sha256"),
            "v2/repositories/ns/app/_manifests/revisions/sha256"
        );
        assert_eq!(
            manifest_revision_link_path(&namespace, &digest),
            "v2/repositories/ns/app/_manifests/revisions/sha256/digest123/link"
        );
        assert_eq!(
            manifest_tags_dir(&namespace),
            "v2/repositories/ns/app/_manifests/tags"
        );
        assert_eq!(
            manifest_tag_link_path(&namespace, "v1.0"),
            "v2/repositories/ns/app/_manifests/tags/v1.0/current/link"
        );
    }
}
