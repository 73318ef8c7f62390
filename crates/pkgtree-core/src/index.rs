//! The category / package / version index every repository is built on.

use std::{
    collections::{btree_map, btree_set, BTreeMap, BTreeSet},
    sync::Arc,
};

use strum::IntoEnumIterator;

use crate::{
    names::{CategoryNamePart, PackageNamePart, QualifiedPackageName},
    package_id::{ActionKind, PackageId},
};

type PackageMap = BTreeMap<PackageNamePart, Vec<Arc<PackageId>>>;

/// Sorted, duplicate-free index of a repository's contents.
///
/// Categories and package names are kept in `BTreeMap`s; the ids of one
/// package are kept in a version-ascending `Vec` with no two ids of equal
/// version.
#[derive(Debug, Default)]
pub struct PackageIndex {
    categories: BTreeMap<CategoryNamePart, PackageMap>,
    categories_by_package: BTreeMap<PackageNamePart, BTreeSet<CategoryNamePart>>,
    action_counts: [usize; 6],
    id_count: usize,
}

pub type CategoryNames<'a> = btree_map::Keys<'a, CategoryNamePart, PackageMap>;

type PackageKeys<'a> = btree_map::Keys<'a, PackageNamePart, Vec<Arc<PackageId>>>;

pub type PackageIds<'a> = std::slice::Iter<'a, Arc<PackageId>>;

/// Categories holding a package of a given name.
pub struct CategoriesContaining<'a> {
    inner: Option<btree_set::Iter<'a, CategoryNamePart>>,
}

impl<'a> Iterator for CategoriesContaining<'a> {
    type Item = &'a CategoryNamePart;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.as_mut()?.next()
    }
}

/// Qualified names of the packages in one category.
pub struct PackageNames<'a> {
    category: Option<(&'a CategoryNamePart, PackageKeys<'a>)>,
}

impl Iterator for PackageNames<'_> {
    type Item = QualifiedPackageName;

    fn next(&mut self) -> Option<Self::Item> {
        let (category, packages) = self.category.as_mut()?;
        packages
            .next()
            .map(|package| QualifiedPackageName::new((*category).clone(), package.clone()))
    }
}

impl PackageIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a category. Returns false if it was already present.
    pub fn insert_category(&mut self, category: CategoryNamePart) -> bool {
        match self.categories.entry(category) {
            btree_map::Entry::Occupied(_) => false,
            btree_map::Entry::Vacant(entry) => {
                entry.insert(PackageMap::new());
                true
            }
        }
    }

    /// Adds a package with no versions, creating its category as needed.
    /// Returns false if it was already present.
    pub fn insert_package(&mut self, name: &QualifiedPackageName) -> bool {
        let packages = self.categories.entry(name.category.clone()).or_default();
        if packages.contains_key(&name.package) {
            return false;
        }
        packages.insert(name.package.clone(), Vec::new());
        self.categories_by_package
            .entry(name.package.clone())
            .or_default()
            .insert(name.category.clone());
        true
    }

    /// Adds an id at its sorted position.
    ///
    /// When an id of equal version already exists it is returned instead and
    /// the new one is dropped.
    pub fn insert_id(&mut self, id: PackageId) -> Arc<PackageId> {
        let name = id.name();
        self.categories_by_package
            .entry(name.package.clone())
            .or_default()
            .insert(name.category.clone());
        let ids = self
            .categories
            .entry(name.category.clone())
            .or_default()
            .entry(name.package.clone())
            .or_default();

        match ids.binary_search_by(|existing| existing.version().cmp(id.version())) {
            Ok(pos) => Arc::clone(&ids[pos]),
            Err(pos) => {
                for action in ActionKind::iter() {
                    if id.supports_action(action) {
                        self.action_counts[action as usize] += 1;
                    }
                }
                self.id_count += 1;
                let id = Arc::new(id);
                ids.insert(pos, Arc::clone(&id));
                id
            }
        }
    }

    pub fn has_category_named(&self, category: &str) -> bool {
        self.categories.contains_key(category)
    }

    pub fn has_package_named(&self, name: &QualifiedPackageName) -> bool {
        self.categories
            .get(&name.category)
            .is_some_and(|packages| packages.contains_key(&name.package))
    }

    pub fn category_names(&self) -> CategoryNames<'_> {
        self.categories.keys()
    }

    pub fn category_names_containing_package(&self, package: &str) -> CategoriesContaining<'_> {
        CategoriesContaining {
            inner: self.categories_by_package.get(package).map(BTreeSet::iter),
        }
    }

    pub fn package_names(&self, category: &str) -> PackageNames<'_> {
        PackageNames {
            category: self
                .categories
                .get_key_value(category)
                .map(|(category, packages)| (category, packages.keys())),
        }
    }

    pub fn package_ids(&self, name: &QualifiedPackageName) -> PackageIds<'_> {
        self.categories
            .get(&name.category)
            .and_then(|packages| packages.get(&name.package))
            .map(|ids| ids.iter())
            .unwrap_or_default()
    }

    pub fn some_ids_might_support_action(&self, action: ActionKind) -> bool {
        self.action_counts[action as usize] > 0
    }

    pub fn id_count(&self) -> usize {
        self.id_count
    }

    /// Every id, in category, package, version order.
    pub fn all_ids(&self) -> impl Iterator<Item = &Arc<PackageId>> + '_ {
        self.categories
            .values()
            .flat_map(|packages| packages.values())
            .flatten()
    }

    /// Every qualified package name, in order.
    pub fn all_package_names(&self) -> impl Iterator<Item = QualifiedPackageName> + '_ {
        self.categories.iter().flat_map(|(category, packages)| {
            packages
                .keys()
                .map(move |package| QualifiedPackageName::new(category.clone(), package.clone()))
        })
    }
}
