//! Line-based scanner producing shared-elements snapshots from a source tree.
//!
//! A zone is any module directory with a `src/<common source set>` directory.
//! `expect` declarations are read from the common source set; matching
//! `actual` declarations come from the module's other source sets, members
//! matched through their enclosing declarations (`Platform.name`).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use itertools::Itertools;
use rayon::prelude::*;
use regex::{Captures, Regex};
use tracing::{debug, instrument, trace};
use walkdir::{DirEntry, WalkDir};

use crate::application::{ApplicationError, ApplicationResult, IoResultExt};
use crate::config::ScanConfig;
use crate::domain::{
    DeclarationType, ExpectOrActualModel, FileModel, SharedElementModel, SharedTree, SharedType,
    SnapshotBuilder, SourceLocation, ZoneModel,
};
use crate::infrastructure::traits::{FileSystem, SnapshotSource};

const DECLARATION: &str = r"^\s*(?P<mods>(?:[a-z]+\s+)*?)(?P<kw>class|interface|object|fun|val|var)\s+(?:<[^>]*>\s*)?(?:(?P<recv>[\w.<>?,]+)\.)?(?P<name>\w+)";

/// A declaration recognised in one source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedDeclaration {
    pub name: String,
    pub declaration: DeclarationType,
    pub side: Option<SharedType>,
    /// 1-based line number
    pub line: usize,
    /// Position of the enclosing declaration in the same list
    pub parent: Option<usize>,
}

#[derive(Debug)]
struct Zone {
    title: String,
    module_dir: PathBuf,
}

#[derive(Debug)]
struct ActualSide {
    module: String,
    location: SourceLocation,
}

/// Scans a multiplatform project directory.
pub struct SourceScanner {
    root: PathBuf,
    project: String,
    scan: ScanConfig,
    fs: Arc<dyn FileSystem>,
    declaration: Regex,
}

impl SourceScanner {
    pub fn new(
        root: impl Into<PathBuf>,
        project: impl Into<String>,
        scan: ScanConfig,
        fs: Arc<dyn FileSystem>,
    ) -> ApplicationResult<Self> {
        let declaration = Regex::new(DECLARATION).map_err(|e| ApplicationError::OperationFailed {
            context: "compile declaration pattern".into(),
            source: Box::new(e),
        })?;
        Ok(Self {
            root: root.into(),
            project: project.into(),
            scan,
            fs,
            declaration,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Scan the project and build a fresh snapshot.
    #[instrument(level = "debug", skip(self), fields(root = %self.root.display()))]
    pub fn scan(&self) -> ApplicationResult<SharedTree> {
        let problem = if !self.fs.exists(&self.root) {
            Some("does not exist")
        } else if !self.fs.is_dir(&self.root) {
            Some("not a directory")
        } else {
            None
        };
        if let Some(message) = problem {
            return Err(ApplicationError::Snapshot {
                path: self.root.clone(),
                message: message.into(),
            });
        }

        let mut builder = SnapshotBuilder::new(self.project.clone());
        for zone in self.discover_zones() {
            self.scan_zone(&mut builder, &zone)?;
        }
        Ok(builder.build())
    }

    fn scan_zone(&self, builder: &mut SnapshotBuilder, zone: &Zone) -> ApplicationResult<()> {
        let common_dir = zone.module_dir.join("src").join(&self.scan.common_source_set);
        let actuals = self.collect_actuals(&zone.module_dir)?;

        let files = self.source_files(&common_dir);
        let parsed: Vec<ApplicationResult<Vec<ParsedDeclaration>>> =
            files.par_iter().map(|path| self.parse_file(path)).collect();

        let zone_node = builder.zone(ZoneModel {
            title: zone.title.clone(),
        })?;
        for (path, declarations) in files.iter().zip(parsed) {
            let declarations = declarations?;
            let relative = self.relative(path);
            let title = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| relative.display().to_string());
            let package = builder.package(
                zone_node,
                FileModel {
                    title,
                    path: relative.clone(),
                },
            )?;

            let qualified = qualified_names(&declarations);
            let mut handles = Vec::with_capacity(declarations.len());
            for (decl, qualified) in declarations.iter().zip(&qualified) {
                let model = SharedElementModel {
                    name: Some(decl.name.clone()),
                    declaration: decl.declaration,
                };
                let parent = decl.parent.and_then(|p| handles.get(p).copied().flatten());
                let handle = match (decl.parent, parent) {
                    (None, _) if decl.side == Some(SharedType::Expected) => {
                        Some(builder.element(package, model)?)
                    }
                    (Some(_), Some(parent)) => Some(builder.nested_element(parent, model)?),
                    _ => None,
                };
                handles.push(handle);
                let Some(element) = handle else {
                    continue;
                };

                builder.expect_or_actual(
                    element,
                    ExpectOrActualModel {
                        name: decl.name.clone(),
                        module: None,
                        shared: SharedType::Expected,
                        location: SourceLocation {
                            path: relative.clone(),
                            line: decl.line,
                        },
                    },
                )?;
                for actual in actuals.get(qualified).into_iter().flatten() {
                    builder.expect_or_actual(
                        element,
                        ExpectOrActualModel {
                            name: decl.name.clone(),
                            module: Some(actual.module.clone()),
                            shared: SharedType::Actual,
                            location: actual.location.clone(),
                        },
                    )?;
                }
            }
        }
        Ok(())
    }

    /// Module directories holding a common source set, sorted by path.
    fn discover_zones(&self) -> Vec<Zone> {
        let zones: Vec<Zone> = WalkDir::new(&self.root)
            .into_iter()
            .filter_entry(|e| !self.is_ignored(e) && (e.depth() == 0 || e.file_name() != "src"))
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_dir())
            .map(|e| e.into_path())
            .filter(|dir| {
                self.fs
                    .is_dir(&dir.join("src").join(&self.scan.common_source_set))
            })
            .sorted()
            .map(|module_dir| Zone {
                title: self.zone_title(&module_dir),
                module_dir,
            })
            .collect();
        debug!("discover_zones: found {} zones", zones.len());
        zones
    }

    /// `actual` declarations of all platform source sets, by qualified name.
    fn collect_actuals(&self, module_dir: &Path) -> ApplicationResult<HashMap<String, Vec<ActualSide>>> {
        let source_sets: Vec<(String, PathBuf)> = WalkDir::new(module_dir.join("src"))
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_dir())
            .filter_map(|e| {
                let name = e.file_name().to_string_lossy().into_owned();
                let platform = name.ends_with(&self.scan.source_set_suffix)
                    && name != self.scan.common_source_set;
                platform.then(|| (name, e.into_path()))
            })
            .sorted()
            .collect();

        let mut actuals = Vec::new();
        for (module, dir) in source_sets {
            for path in self.source_files(&dir) {
                let relative = self.relative(&path);
                let declarations = self.parse_file(&path)?;
                let qualified = qualified_names(&declarations);
                actuals.extend(
                    declarations
                        .into_iter()
                        .zip(qualified)
                        .filter(|(d, _)| d.side == Some(SharedType::Actual))
                        .map(|(d, name)| {
                            (
                                name,
                                ActualSide {
                                    module: module.clone(),
                                    location: SourceLocation {
                                        path: relative.clone(),
                                        line: d.line,
                                    },
                                },
                            )
                        }),
                );
            }
        }
        Ok(actuals.into_iter().into_group_map())
    }

    /// Files with a configured extension below `dir`, sorted by path.
    fn source_files(&self, dir: &Path) -> Vec<PathBuf> {
        WalkDir::new(dir)
            .into_iter()
            .filter_entry(|e| !self.is_ignored(e))
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .map(|ext| self.scan.extensions.iter().any(|e| e == ext))
                    .unwrap_or(false)
            })
            .sorted()
            .collect()
    }

    fn parse_file(&self, path: &Path) -> ApplicationResult<Vec<ParsedDeclaration>> {
        let text = self
            .fs
            .read_to_string(path)
            .with_path_context("read source file", path)?;
        let declarations = parse_declarations(&self.declaration, &text);
        trace!("parse_file: {} -> {} declarations", path.display(), declarations.len());
        Ok(declarations)
    }

    fn is_ignored(&self, entry: &DirEntry) -> bool {
        entry.depth() > 0
            && entry.file_type().is_dir()
            && self
                .scan
                .ignore_dirs
                .iter()
                .any(|d| entry.file_name() == d.as_str())
    }

    /// Module path relative to the scan root, `/`-separated; `.` for the
    /// root itself. Independent of where the checkout lives.
    fn zone_title(&self, module_dir: &Path) -> String {
        let title = self
            .relative(module_dir)
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .join("/");
        if title.is_empty() {
            ".".to_string()
        } else {
            title
        }
    }

    fn relative(&self, path: &Path) -> PathBuf {
        pathdiff::diff_paths(path, &self.root).unwrap_or_else(|| path.to_path_buf())
    }
}

impl SnapshotSource for SourceScanner {
    fn snapshot(&self) -> ApplicationResult<SharedTree> {
        self.scan()
    }
}

/// Recognise `expect`/`actual` declarations and the members of their
/// containers in Kotlin-like source text.
///
/// Only top-level declarations carrying `expect` or `actual` are kept; inside
/// the body of a kept class, interface or object every direct member
/// declaration is kept as a nested entry with its own modifiers.
pub fn parse_declarations(pattern: &Regex, text: &str) -> Vec<ParsedDeclaration> {
    let mut declarations: Vec<ParsedDeclaration> = Vec::new();
    // (depth of the body, position of the container)
    let mut containers: Vec<(usize, usize)> = Vec::new();
    let mut depth = 0usize;

    for (number, raw) in text.lines().enumerate() {
        let line = strip_line_comment(raw);
        while containers.last().is_some_and(|&(body, _)| body > depth) {
            containers.pop();
        }

        let in_body = containers.last().filter(|&&(body, _)| body == depth).map(|&(_, pos)| pos);
        if depth == 0 || in_body.is_some() {
            if let Some(caps) = pattern.captures(line) {
                let side = side_of(&caps);
                if in_body.is_some() || side.is_some() {
                    let declaration = declaration_type(&caps);
                    let position = declarations.len();
                    declarations.push(ParsedDeclaration {
                        name: caps["name"].to_string(),
                        declaration,
                        side,
                        line: number + 1,
                        parent: in_body,
                    });
                    let container = matches!(
                        declaration,
                        DeclarationType::Class | DeclarationType::Interface | DeclarationType::Object
                    );
                    if container && line.contains('{') {
                        containers.push((depth + 1, position));
                    }
                }
            }
        }

        for c in line.chars() {
            match c {
                '{' => depth += 1,
                '}' => depth = depth.saturating_sub(1),
                _ => {}
            }
        }
    }
    declarations
}

/// `Outer.inner` names following the `parent` links; parents always
/// precede their members in the list.
fn qualified_names(declarations: &[ParsedDeclaration]) -> Vec<String> {
    let mut names: Vec<String> = Vec::with_capacity(declarations.len());
    for decl in declarations {
        let name = match decl.parent.and_then(|p| names.get(p)) {
            Some(outer) => format!("{}.{}", outer, decl.name),
            None => decl.name.clone(),
        };
        names.push(name);
    }
    names
}

fn strip_line_comment(line: &str) -> &str {
    line.find("//").map(|pos| &line[..pos]).unwrap_or(line)
}

fn side_of(caps: &Captures<'_>) -> Option<SharedType> {
    let mods = caps.name("mods").map(|m| m.as_str()).unwrap_or_default();
    mods.split_whitespace().find_map(|m| match m {
        "expect" => Some(SharedType::Expected),
        "actual" => Some(SharedType::Actual),
        _ => None,
    })
}

fn declaration_type(caps: &Captures<'_>) -> DeclarationType {
    let mods = caps.name("mods").map(|m| m.as_str()).unwrap_or_default();
    match &caps["kw"] {
        "class" if mods.split_whitespace().any(|m| m == "annotation") => DeclarationType::Annotation,
        "class" => DeclarationType::Class,
        "interface" => DeclarationType::Interface,
        "object" => DeclarationType::Object,
        "fun" => DeclarationType::NamedFunction,
        "val" | "var" => DeclarationType::Property,
        _ => DeclarationType::Unresolved,
    }
}
