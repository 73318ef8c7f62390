//! Repository backends.

pub mod ebuild;
pub mod fake;
pub mod installed;

pub use ebuild::{EbuildRepository, EbuildRepositoryParams};
pub use fake::{FakeInstalledRepository, FakeRepository};
pub use installed::{InstalledRepository, InstalledRepositoryParams};

use std::sync::Arc;

use crate::{
    index::PackageIndex,
    matcher::PackageMatcher,
    names::{QualifiedPackageName, SetName},
    package_id::PackageId,
    sets::PackageSet,
};

pub(crate) const EVERYTHING_SET: &str = "everything";

/// Every package name in `index`, as an unversioned set.
pub(crate) fn everything_set(index: &PackageIndex) -> PackageSet {
    PackageSet::new(
        SetName::builtin(EVERYTHING_SET),
        index
            .all_package_names()
            .map(PackageMatcher::for_name)
            .collect(),
    )
}

/// `(virtual, provider)` pairs from the `PROVIDE` metadata of `ids`.
pub(crate) fn provided_by<'a>(
    ids: impl Iterator<Item = &'a Arc<PackageId>>,
) -> Vec<(QualifiedPackageName, Arc<PackageId>)> {
    ids.flat_map(|id| {
        id.metadata_tokens("PROVIDE")
            .filter_map(|token| QualifiedPackageName::parse(token).ok())
            .map(|virtual_name| (virtual_name, Arc::clone(id)))
            .collect::<Vec<_>>()
    })
    .collect()
}
