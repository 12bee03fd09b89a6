//! Shared fixtures for integration tests.
#![allow(dead_code)]

use std::iter::Peekable;
use std::path::PathBuf;
use std::str::Chars;

use sharetree::domain::{
    DeclarationType, ExpectOrActualModel, FileModel, Index, SharedElementModel, SharedTree,
    SharedType, SnapshotBuilder, SourceLocation, TreeArena, ZoneModel,
};

struct Shape {
    name: String,
    children: Vec<Shape>,
}

fn parse(chars: &mut Peekable<Chars<'_>>) -> Shape {
    let mut name = String::new();
    while let Some(&c) = chars.peek() {
        if matches!(c, '[' | ']' | ',') {
            break;
        }
        chars.next();
        if !c.is_whitespace() {
            name.push(c);
        }
    }
    let mut children = Vec::new();
    if chars.peek() == Some(&'[') {
        chars.next();
        loop {
            children.push(parse(chars));
            match chars.next() {
                Some(',') => continue,
                _ => break,
            }
        }
    }
    Shape { name, children }
}

fn attach(arena: &mut TreeArena<String>, parent: Index, children: &[Shape]) {
    for child in children {
        if child.children.is_empty() {
            arena.add_leaf(parent, child.name.clone()).unwrap();
        } else {
            let idx = arena.add_internal(parent, child.name.clone()).unwrap();
            attach(arena, idx, &child.children);
        }
    }
}

/// Build a tree from bracket notation, e.g. `1[1-1, 1-2[2-1], 1-3]`.
///
/// Nodes without brackets become leaves.
pub fn tree(notation: &str) -> TreeArena<String> {
    let shape = parse(&mut notation.chars().peekable());
    let mut arena = TreeArena::new(shape.name.clone());
    let root = arena.root();
    attach(&mut arena, root, &shape.children);
    arena
}

/// Bracket notation of a tree, the inverse of [`tree`].
pub fn notation(arena: &TreeArena<String>) -> String {
    fn walk(arena: &TreeArena<String>, node: Index, out: &mut String) {
        out.push_str(arena.content(node).map(String::as_str).unwrap_or("?"));
        let children = arena.children(node);
        if !children.is_empty() {
            out.push('[');
            for (i, &child) in children.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                walk(arena, child, out);
            }
            out.push(']');
        }
    }
    let mut out = String::new();
    walk(arena, arena.root(), &mut out);
    out
}

pub fn content(arena: &TreeArena<String>, idx: Index) -> &str {
    arena.content(idx).map(String::as_str).unwrap_or("<stale>")
}

pub fn write_file(root: &std::path::Path, relative: &str, text: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, text).unwrap();
}

fn side(module: Option<&str>, shared: SharedType, path: &str, line: usize) -> ExpectOrActualModel {
    ExpectOrActualModel {
        name: "Platform".into(),
        module: module.map(str::to_string),
        shared,
        location: SourceLocation {
            path: PathBuf::from(path),
            line,
        },
    }
}

/// Project `demo` with one expect class `Platform` and an actual per module.
pub fn shared_tree(actuals: &[&str]) -> SharedTree {
    let common = "shared/src/commonMain/kotlin/Platform.kt";
    let mut builder = SnapshotBuilder::new("demo");
    let zone = builder.zone(ZoneModel { title: "shared".into() }).unwrap();
    let file = builder
        .package(
            zone,
            FileModel {
                title: "Platform.kt".into(),
                path: PathBuf::from(common),
            },
        )
        .unwrap();
    let element = builder
        .element(
            file,
            SharedElementModel {
                name: Some("Platform".into()),
                declaration: DeclarationType::Class,
            },
        )
        .unwrap();
    builder
        .expect_or_actual(element, side(None, SharedType::Expected, common, 3))
        .unwrap();
    for module in actuals {
        let path = format!("shared/src/{module}/kotlin/Platform.kt");
        builder
            .expect_or_actual(element, side(Some(*module), SharedType::Actual, &path, 1))
            .unwrap();
    }
    builder.build()
}
