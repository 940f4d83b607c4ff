mod descriptor;
mod digest;
mod error;
mod manifest;
mod namespace;

pub use descriptor::Descriptor;
pub use digest::Digest;
pub use error::Error;
pub use manifest::Manifest;
pub use namespace::Namespace;
