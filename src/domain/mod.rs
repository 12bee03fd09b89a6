//! Domain layer: tree model, diff engine and replay
//!
//! This layer is independent of external concerns (no I/O, no CLI, no config loading).

pub mod arena;
pub mod builder;
pub mod diff;
pub mod error;
pub mod model;
pub mod render;
pub mod replay;

pub use arena::{NodeKind, TreeArena, TreeNode};
pub use builder::{ElementNode, PackageNode, SharedTree, SnapshotBuilder, ZoneNode};
pub use diff::{diff, diff_trees, render_diff, sift, DiffNode, SiftResult, TreeMutation};
pub use error::{DomainError, DomainResult, InvalidOperation};
pub use generational_arena::Index;
pub use model::{
    DeclarationType, ExpectOrActualModel, FileModel, NodeModel, RootModel, SharedElementModel,
    SharedType, SourceLocation, ZoneModel,
};
pub use render::TreeRender;
pub use replay::{apply, apply_to_root, AppliedMutation, MutationKind, ReplayReport};
