//! Typed construction of shared-elements snapshots.
//!
//! Each level of the tree only accepts the content that belongs there:
//! zones under the root, files (packages) under zones, declarations under
//! files or under other declarations, and expect/actual sides as leaves
//! under declarations. The handle types make any other nesting a compile
//! error.

use generational_arena::Index;
use tracing::{debug, instrument};

use crate::domain::arena::TreeArena;
use crate::domain::error::DomainResult;
use crate::domain::model::{ExpectOrActualModel, FileModel, NodeModel, SharedElementModel, ZoneModel};

/// The shared-elements tree.
pub type SharedTree = TreeArena<NodeModel>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZoneNode(Index);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackageNode(Index);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementNode(Index);

impl ZoneNode {
    pub fn index(self) -> Index {
        self.0
    }
}

impl PackageNode {
    pub fn index(self) -> Index {
        self.0
    }
}

impl ElementNode {
    pub fn index(self) -> Index {
        self.0
    }
}

/// Builds one snapshot of the shared-elements tree.
#[derive(Debug)]
pub struct SnapshotBuilder {
    tree: SharedTree,
}

impl SnapshotBuilder {
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            tree: TreeArena::new(NodeModel::root(project)),
        }
    }

    pub fn zone(&mut self, model: ZoneModel) -> DomainResult<ZoneNode> {
        let root = self.tree.root();
        self.tree.add_internal(root, model.into()).map(ZoneNode)
    }

    pub fn package(&mut self, zone: ZoneNode, model: FileModel) -> DomainResult<PackageNode> {
        self.tree.add_internal(zone.0, model.into()).map(PackageNode)
    }

    pub fn element(
        &mut self,
        package: PackageNode,
        model: SharedElementModel,
    ) -> DomainResult<ElementNode> {
        self.tree.add_internal(package.0, model.into()).map(ElementNode)
    }

    /// Declaration nested in the body of another declaration.
    pub fn nested_element(
        &mut self,
        parent: ElementNode,
        model: SharedElementModel,
    ) -> DomainResult<ElementNode> {
        self.tree.add_internal(parent.0, model.into()).map(ElementNode)
    }

    pub fn expect_or_actual(
        &mut self,
        element: ElementNode,
        model: ExpectOrActualModel,
    ) -> DomainResult<Index> {
        self.tree.add_leaf(element.0, model.into())
    }

    /// Finish the snapshot, dropping files without declarations and then
    /// zones without files.
    #[instrument(level = "debug", skip(self))]
    pub fn build(mut self) -> SharedTree {
        let root = self.tree.root();
        let zones: Vec<Index> = self.tree.children(root).to_vec();
        let mut dropped = 0;
        for zone in zones {
            let packages: Vec<Index> = self.tree.children(zone).to_vec();
            for package in packages {
                if self.tree.children(package).is_empty() {
                    self.tree.remove_child(zone, package);
                    dropped += self.tree.prune(package);
                }
            }
            if self.tree.children(zone).is_empty() {
                self.tree.remove_child(root, zone);
                dropped += self.tree.prune(zone);
            }
        }
        debug!(nodes = self.tree.node_count(), dropped, "snapshot built");
        self.tree
    }
}
