//! Tests for SnapshotBuilder

mod common;

use std::path::PathBuf;

use common::shared_tree;
use sharetree::domain::{
    diff_trees, render_diff, DeclarationType, ExpectOrActualModel, FileModel, NodeModel,
    SharedElementModel, SharedType, SnapshotBuilder, SourceLocation, TreeRender, ZoneModel,
};

fn element(name: Option<&str>, declaration: DeclarationType) -> SharedElementModel {
    SharedElementModel {
        name: name.map(str::to_string),
        declaration,
    }
}

fn expected(name: &str, line: usize) -> ExpectOrActualModel {
    ExpectOrActualModel {
        name: name.into(),
        module: None,
        shared: SharedType::Expected,
        location: SourceLocation {
            path: PathBuf::from("core/src/commonMain/kotlin/Io.kt"),
            line,
        },
    }
}

#[test]
fn given_nested_declarations_when_building_then_members_sit_under_their_container() {
    // Arrange
    let mut builder = SnapshotBuilder::new("demo");
    let zone = builder.zone(ZoneModel { title: "core".into() }).unwrap();
    let file = builder
        .package(
            zone,
            FileModel {
                title: "Io.kt".into(),
                path: PathBuf::from("core/src/commonMain/kotlin/Io.kt"),
            },
        )
        .unwrap();
    let reader = builder
        .element(file, element(Some("Reader"), DeclarationType::Interface))
        .unwrap();
    builder.expect_or_actual(reader, expected("Reader", 1)).unwrap();
    let read = builder
        .nested_element(reader, element(Some("read"), DeclarationType::NamedFunction))
        .unwrap();
    let side = builder.expect_or_actual(read, expected("read", 2)).unwrap();

    // Act
    let tree = builder.build();

    // Assert
    assert_eq!(tree.parent(read.index()), Some(reader.index()));
    assert_eq!(tree.parent(side), Some(read.index()));
    assert!(tree.is_leaf(side));
    assert!(!tree.allows_children(side));
    assert_eq!(tree.depth(), 6);
}

#[test]
fn given_declarations_when_rendering_then_lines_show_keyword_and_side() {
    let tree = shared_tree(&["jvmMain"]);

    let rendered = tree.to_tree_string().to_string();

    assert!(rendered.contains("class Platform"));
    assert!(rendered.contains("[expect] Common (shared/src/commonMain/kotlin/Platform.kt:3)"));
    assert!(rendered.contains("[actual] jvmMain (shared/src/jvmMain/kotlin/Platform.kt:1)"));
}

#[test]
fn given_unnamed_element_when_labelling_then_error_marker() {
    let model = NodeModel::from(element(None, DeclarationType::Unresolved));

    assert_eq!(model.label(), "#error");
    assert_eq!(model.to_string(), "? #error");
}

#[test]
fn given_moved_declaration_when_diffing_snapshots_then_side_replaced() {
    // Arrange
    let old = shared_tree(&["jvmMain"]);
    let mut builder = SnapshotBuilder::new("demo");
    let zone = builder.zone(ZoneModel { title: "shared".into() }).unwrap();
    let file = builder
        .package(
            zone,
            FileModel {
                title: "Platform.kt".into(),
                path: PathBuf::from("shared/src/commonMain/kotlin/Platform.kt"),
            },
        )
        .unwrap();
    let platform = builder
        .element(file, element(Some("Platform"), DeclarationType::Class))
        .unwrap();
    let mut common = expected("Platform", 5);
    common.location.path = PathBuf::from("shared/src/commonMain/kotlin/Platform.kt");
    builder.expect_or_actual(platform, common).unwrap();
    builder
        .expect_or_actual(
            platform,
            ExpectOrActualModel {
                name: "Platform".into(),
                module: Some("jvmMain".into()),
                shared: SharedType::Actual,
                location: SourceLocation {
                    path: PathBuf::from("shared/src/jvmMain/kotlin/Platform.kt"),
                    line: 1,
                },
            },
        )
        .unwrap();
    let new = builder.build();

    // Act
    let diff = diff_trees(&old, &new).expect("location changed");

    // Assert
    assert_eq!(diff.total_mutations(), 2);
    let rendered = render_diff(&diff, &old, &new).to_string();
    assert!(rendered.contains("- [expect] Common (shared/src/commonMain/kotlin/Platform.kt:3)"));
    assert!(rendered.contains("+ [expect] Common (shared/src/commonMain/kotlin/Platform.kt:5)"));
}
