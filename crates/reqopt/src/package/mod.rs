//! Package, release and dependency types shared by the registry and optimizer

mod alias;
mod link;
mod release;

pub use alias::split_inline_alias;
pub use link::Link;
pub use release::{Package, PackageId, Release, ReleaseId};
