pub mod blob_store;
pub mod data_store;
pub mod metadata_store;
pub mod oci;
mod pagination;
mod path_builder;
pub mod stats;
