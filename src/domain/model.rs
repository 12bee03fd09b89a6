//! Node content for the shared-elements tree.
//!
//! Every variant is a plain value: two snapshots agree on "the same node"
//! exactly when their contents compare equal.

use std::fmt;
use std::path::PathBuf;

/// Kind of an `expect` declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeclarationType {
    Annotation,
    Class,
    Interface,
    Object,
    Property,
    NamedFunction,
    Unresolved,
}

impl DeclarationType {
    /// Short keyword used when rendering the tree.
    pub fn keyword(self) -> &'static str {
        match self {
            DeclarationType::Annotation => "annotation",
            DeclarationType::Class => "class",
            DeclarationType::Interface => "interface",
            DeclarationType::Object => "object",
            DeclarationType::Property => "val",
            DeclarationType::NamedFunction => "fun",
            DeclarationType::Unresolved => "?",
        }
    }
}

/// Which side of an expect/actual pair a declaration is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SharedType {
    Expected,
    Actual,
}

/// Where a declaration was found.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceLocation {
    /// Path relative to the project root
    pub path: PathBuf,
    /// 1-based line number
    pub line: usize,
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.path.display(), self.line)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RootModel {
    pub project: String,
}

/// A multiplatform common module and everything that depends on it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ZoneModel {
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileModel {
    /// File name shown in the tree
    pub title: String,
    /// Path relative to the project root
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SharedElementModel {
    pub name: Option<String>,
    pub declaration: DeclarationType,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExpectOrActualModel {
    pub name: String,
    /// Source set (module) declaring this side, if known
    pub module: Option<String>,
    pub shared: SharedType,
    pub location: SourceLocation,
}

/// Content of one node of the shared-elements tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeModel {
    Root(RootModel),
    Zone(ZoneModel),
    File(FileModel),
    Element(SharedElementModel),
    ExpectOrActual(ExpectOrActualModel),
}

impl NodeModel {
    pub fn root(project: impl Into<String>) -> Self {
        NodeModel::Root(RootModel {
            project: project.into(),
        })
    }

    /// Text shown for the node in a tree view.
    pub fn label(&self) -> String {
        match self {
            NodeModel::Root(m) => m.project.clone(),
            NodeModel::Zone(m) => m.title.clone(),
            NodeModel::File(m) => m.title.clone(),
            NodeModel::Element(m) => m.name.clone().unwrap_or_else(|| "#error".to_string()),
            NodeModel::ExpectOrActual(m) => match (&m.module, m.shared) {
                (Some(module), _) => module.clone(),
                (None, SharedType::Expected) => "Common".to_string(),
                (None, SharedType::Actual) => "Actual".to_string(),
            },
        }
    }
}

impl fmt::Display for NodeModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeModel::Element(m) => write!(f, "{} {}", m.declaration.keyword(), self.label()),
            NodeModel::ExpectOrActual(m) => {
                let marker = match m.shared {
                    SharedType::Expected => "expect",
                    SharedType::Actual => "actual",
                };
                write!(f, "[{}] {} ({})", marker, self.label(), m.location)
            }
            _ => write!(f, "{}", self.label()),
        }
    }
}

impl From<ZoneModel> for NodeModel {
    fn from(m: ZoneModel) -> Self {
        NodeModel::Zone(m)
    }
}

impl From<FileModel> for NodeModel {
    fn from(m: FileModel) -> Self {
        NodeModel::File(m)
    }
}

impl From<SharedElementModel> for NodeModel {
    fn from(m: SharedElementModel) -> Self {
        NodeModel::Element(m)
    }
}

impl From<ExpectOrActualModel> for NodeModel {
    fn from(m: ExpectOrActualModel) -> Self {
        NodeModel::ExpectOrActual(m)
    }
}
