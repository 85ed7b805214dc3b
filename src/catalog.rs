//! Point-in-time index catalog and the cluster metadata that supplies it.
//!
//! A [`Catalog`] is immutable once built. Contexts fetch the current snapshot
//! from [`ClusterMetadata`] on every resolution, so two resolutions within
//! the same request may observe different snapshots.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use parking_lot::RwLock;
use uuid::Uuid;

/// Whether an index accepts reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexState {
    /// Index is open
    Open,
    /// Index is closed
    Closed,
}

/// Metadata of one concrete index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexMetadata {
    name: String,
    uuid: String,
    state: IndexState,
}

impl IndexMetadata {
    /// Index name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Unique identifier of the index.
    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    /// Open/closed state.
    pub fn state(&self) -> IndexState {
        self.state
    }

    /// Returns `true` if the index is open.
    pub fn is_open(&self) -> bool {
        self.state == IndexState::Open
    }
}

/// What a catalog name denotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AliasOrIndex<'a> {
    /// A concrete index
    Index(&'a IndexMetadata),
    /// An alias and the names of the indices it points to
    Alias(&'a BTreeSet<String>),
}

/// Immutable mapping from index and alias names to concrete indices.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    indices: BTreeMap<String, IndexMetadata>,
    aliases: BTreeMap<String, BTreeSet<String>>,
}

impl Catalog {
    /// Starts building a catalog.
    pub fn builder() -> CatalogBuilder {
        CatalogBuilder::default()
    }

    /// Looks up a concrete index.
    pub fn index(&self, name: &str) -> Option<&IndexMetadata> {
        self.indices.get(name)
    }

    /// Iterates over all concrete indices in name order.
    pub fn indices(&self) -> impl Iterator<Item = &IndexMetadata> {
        self.indices.values()
    }

    /// Iterates over all aliases and their member indices.
    pub fn aliases(&self) -> impl Iterator<Item = (&str, &BTreeSet<String>)> {
        self.aliases.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Resolves a name to the index or alias it denotes.
    ///
    /// Index names take precedence; the builder refuses to register an alias
    /// under an existing index name.
    pub fn lookup(&self, name: &str) -> Option<AliasOrIndex<'_>> {
        if let Some(index) = self.indices.get(name) {
            return Some(AliasOrIndex::Index(index));
        }
        self.aliases.get(name).map(AliasOrIndex::Alias)
    }

    /// Returns every known index and alias name.
    pub fn all_indices_and_aliases(&self) -> BTreeSet<String> {
        self.indices
            .keys()
            .chain(self.aliases.keys())
            .cloned()
            .collect()
    }

    /// Returns the uuids of the concrete indices `name` denotes.
    ///
    /// Empty if the name is unknown.
    pub fn index_uuids(&self, name: &str) -> BTreeSet<String> {
        match self.lookup(name) {
            Some(AliasOrIndex::Index(index)) => BTreeSet::from([index.uuid.clone()]),
            Some(AliasOrIndex::Alias(members)) => members
                .iter()
                .filter_map(|m| self.indices.get(m))
                .map(|index| index.uuid.clone())
                .collect(),
            None => BTreeSet::new(),
        }
    }

    /// Number of concrete indices.
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    /// Returns `true` if the catalog holds no index.
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Builder for [`Catalog`].
///
/// # Examples
///
/// ```
/// use request_scope::catalog::Catalog;
///
/// let catalog = Catalog::builder()
///     .index("logs-2023")
///     .index("logs-2024")
///     .closed_index("logs-2019")
///     .alias("logs", ["logs-2023", "logs-2024"])
///     .build();
///
/// assert_eq!(catalog.len(), 3);
/// assert_eq!(catalog.index_uuids("logs").len(), 2);
/// ```
#[derive(Debug, Default)]
pub struct CatalogBuilder {
    indices: BTreeMap<String, IndexMetadata>,
    aliases: BTreeMap<String, BTreeSet<String>>,
}

impl CatalogBuilder {
    /// Adds an open index with a generated uuid.
    pub fn index(self, name: impl Into<String>) -> Self {
        self.with_index(name, Uuid::new_v4().to_string(), IndexState::Open)
    }

    /// Adds a closed index with a generated uuid.
    pub fn closed_index(self, name: impl Into<String>) -> Self {
        self.with_index(name, Uuid::new_v4().to_string(), IndexState::Closed)
    }

    /// Adds an index with an explicit uuid and state.
    pub fn with_index(
        mut self,
        name: impl Into<String>,
        uuid: impl Into<String>,
        state: IndexState,
    ) -> Self {
        let name = name.into();
        self.indices.insert(
            name.clone(),
            IndexMetadata {
                name,
                uuid: uuid.into(),
                state,
            },
        );
        self
    }

    /// Adds (or extends) an alias pointing at the given indices.
    pub fn alias<I, S>(mut self, name: impl Into<String>, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases
            .entry(name.into())
            .or_default()
            .extend(members.into_iter().map(Into::into));
        self
    }

    /// Finishes the catalog.
    ///
    /// Alias members that are not known indices are dropped, as are aliases
    /// shadowed by an index of the same name or left without members.
    pub fn build(self) -> Catalog {
        let indices = self.indices;
        let aliases = self
            .aliases
            .into_iter()
            .filter(|(name, _)| !indices.contains_key(name))
            .map(|(name, members)| {
                let known = members
                    .into_iter()
                    .filter(|m| indices.contains_key(m))
                    .collect::<BTreeSet<_>>();
                (name, known)
            })
            .filter(|(_, members)| !members.is_empty())
            .collect();

        Catalog { indices, aliases }
    }
}

/// Source of cluster metadata.
///
/// Implementations are shared across all concurrently processed requests
/// and must synchronize internally. Contexts only ever read from them.
pub trait ClusterMetadata: Send + Sync {
    /// Returns the current catalog snapshot.
    fn snapshot(&self) -> Arc<Catalog>;

    /// Identifier of the current cluster state.
    fn cluster_uuid(&self) -> String;

    /// Identifier of the node processing requests.
    fn local_node_id(&self) -> String;
}

/// In-memory cluster metadata whose snapshot can be swapped at any time.
///
/// Useful for hosts that mirror metadata from elsewhere and for tests.
#[derive(Debug)]
pub struct StaticClusterMetadata {
    cluster_uuid: String,
    local_node_id: String,
    catalog: RwLock<Arc<Catalog>>,
}

impl StaticClusterMetadata {
    /// Creates metadata with generated cluster and node identifiers.
    pub fn new(catalog: Catalog) -> Self {
        Self::with_ids(
            Uuid::new_v4().simple().to_string(),
            Uuid::new_v4().simple().to_string(),
            catalog,
        )
    }

    /// Creates metadata with explicit identifiers.
    pub fn with_ids(
        cluster_uuid: impl Into<String>,
        local_node_id: impl Into<String>,
        catalog: Catalog,
    ) -> Self {
        Self {
            cluster_uuid: cluster_uuid.into(),
            local_node_id: local_node_id.into(),
            catalog: RwLock::new(Arc::new(catalog)),
        }
    }

    /// Publishes a new snapshot. Contexts pick it up on their next resolution.
    pub fn replace_snapshot(&self, catalog: Catalog) {
        *self.catalog.write() = Arc::new(catalog);
    }
}

impl ClusterMetadata for StaticClusterMetadata {
    fn snapshot(&self) -> Arc<Catalog> {
        self.catalog.read().clone()
    }

    fn cluster_uuid(&self) -> String {
        self.cluster_uuid.clone()
    }

    fn local_node_id(&self) -> String {
        self.local_node_id.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Catalog {
        Catalog::builder()
            .with_index("logs-2023", "u-2023", IndexState::Open)
            .with_index("logs-2024", "u-2024", IndexState::Open)
            .closed_index("archive")
            .alias("logs", ["logs-2023", "logs-2024", "ghost"])
            .alias("archive", ["logs-2023"])
            .alias("empty", ["ghost"])
            .build()
    }

    #[test]
    fn lookup_distinguishes_indices_and_aliases() {
        let catalog = sample();

        assert!(matches!(
            catalog.lookup("logs-2023"),
            Some(AliasOrIndex::Index(i)) if i.uuid() == "u-2023"
        ));
        assert!(matches!(catalog.lookup("logs"), Some(AliasOrIndex::Alias(_))));
        assert!(catalog.lookup("nope").is_none());
    }

    #[test]
    fn build_drops_unknown_alias_members() {
        let catalog = sample();
        let Some(AliasOrIndex::Alias(members)) = catalog.lookup("logs") else {
            panic!("logs should be an alias");
        };

        assert_eq!(members.len(), 2);
        assert!(!members.contains("ghost"));
    }

    #[test]
    fn build_drops_shadowed_and_empty_aliases() {
        let catalog = sample();

        assert!(matches!(catalog.lookup("archive"), Some(AliasOrIndex::Index(_))));
        assert!(catalog.lookup("empty").is_none());
    }

    #[test]
    fn all_indices_and_aliases_lists_both() {
        let names = sample().all_indices_and_aliases();

        assert_eq!(
            names.into_iter().collect::<Vec<_>>(),
            vec!["archive", "logs", "logs-2023", "logs-2024"]
        );
    }

    #[test]
    fn index_uuids_follow_aliases() {
        let catalog = sample();

        assert_eq!(
            catalog.index_uuids("logs"),
            BTreeSet::from(["u-2023".to_string(), "u-2024".to_string()])
        );
        assert_eq!(
            catalog.index_uuids("logs-2024"),
            BTreeSet::from(["u-2024".to_string()])
        );
        assert!(catalog.index_uuids("missing").is_empty());
    }

    #[test]
    fn replaced_snapshot_is_visible_to_new_readers() {
        let metadata = StaticClusterMetadata::with_ids("cluster-1", "node-1", sample());
        let before = metadata.snapshot();

        metadata.replace_snapshot(Catalog::builder().index("fresh").build());

        assert_eq!(before.len(), 3);
        assert_eq!(metadata.snapshot().len(), 1);
        assert_eq!(metadata.cluster_uuid(), "cluster-1");
        assert_eq!(metadata.local_node_id(), "node-1");
    }
}
