//! Composer requirement optimizer.
//!
//! Turns a list of install requests plus an optional snapshot of installed
//! packages into the smallest set of top-level requirements that installs the
//! same packages. Packages pulled in transitively by a requested package are
//! dropped; everything else installed is kept at its exact version.

pub mod closure;
pub mod error;
pub mod import;
pub mod optimizer;
pub mod package;
pub mod platform;
pub mod registry;

pub use closure::IgnoreSet;
pub use error::{OptimizeError, Result};
pub use import::{import_dump, import_sources, ImportSummary};
pub use optimizer::{OptimizeRequest, OptimizedRequirements, RequirementOptimizer};
pub use package::{Link, Package, PackageId, Release, ReleaseId};
pub use platform::{is_platform_package, ConditionalRule, PlatformFilter};
pub use registry::{MemoryRegistry, PackageRegistry, SqliteRegistry, WritableRegistry};
pub use reqopt_semver::Stability;
