//! Text rendering of trees.

use std::fmt;

use generational_arena::Index;
use termtree::Tree;

use crate::domain::arena::TreeArena;

pub trait TreeRender {
    fn to_tree_string(&self) -> Tree<String>;
}

impl<M: fmt::Display> TreeRender for TreeArena<M> {
    fn to_tree_string(&self) -> Tree<String> {
        subtree(self, self.root())
    }
}

/// Render the subtree rooted at `node`.
pub fn subtree<M: fmt::Display>(arena: &TreeArena<M>, node: Index) -> Tree<String> {
    let label = arena
        .content(node)
        .map(ToString::to_string)
        .unwrap_or_else(|| "<missing>".to_string());
    let leaves: Vec<_> = arena
        .children(node)
        .iter()
        .map(|&child| subtree(arena, child))
        .collect();
    Tree::new(label).with_leaves(leaves)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_tree_when_rendering_then_lists_nodes_by_depth() {
        let mut tree = TreeArena::new("root");
        let root = tree.root();
        let a = tree.add_internal(root, "a").unwrap();
        tree.add_leaf(a, "b").unwrap();

        let rendered = tree.to_tree_string().to_string();

        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "root");
        assert!(lines[1].ends_with("a"));
        assert!(lines[2].ends_with("b"));
        assert!(lines[2].find('b') > lines[1].find('a'), "child is indented");
    }
}
