//! Node-to-file layout planning.
//!
//! [`plan_file_layout`] is a pure function of the canonical graph and a
//! [`LayoutRequest`]; the same inputs always produce the same mapping. Paths
//! are `/`-separated strings so layouts compare equal across platforms.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use rpg_core::{canonicalize, FileAssignment, FileLayout, Node, NodeKind, RpgDocument, TestLayout};

use crate::error::PlanError;

/// Policy value that infers the convention per node.
pub const AUTO_POLICY: &str = "auto";

/// How a language spells file names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileCase {
    Snake,
    Kebab,
    Pascal,
}

impl FileCase {
    /// Converts a slug id (`a-b-c`) into this case.
    pub fn apply(self, slug: &str) -> String {
        let parts = slug.split(['-', '_']).filter(|p| !p.is_empty());
        match self {
            FileCase::Snake => parts.collect::<Vec<_>>().join("_"),
            FileCase::Kebab => parts.collect::<Vec<_>>().join("-"),
            FileCase::Pascal => parts
                .map(|p| {
                    let mut chars = p.chars();
                    match chars.next() {
                        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                        None => String::new(),
                    }
                })
                .collect(),
        }
    }
}

/// Default folder conventions for one language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LanguageConvention {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    pub source_root: &'static str,
    pub test_root: &'static str,
    pub extension: &'static str,
    pub case: FileCase,
    pub test_prefix: &'static str,
    pub test_suffix: &'static str,
}

impl LanguageConvention {
    fn file(&self, stem: &str) -> String {
        format!("{stem}.{}", self.extension)
    }

    fn test_file(&self, stem: &str) -> String {
        format!("{}{stem}{}.{}", self.test_prefix, self.test_suffix, self.extension)
    }
}

/// Known conventions. The first entry is the fallback when nothing else
/// identifies a node's language.
pub static CONVENTIONS: [LanguageConvention; 6] = [
    LanguageConvention {
        name: "python",
        aliases: &["py"],
        source_root: "src",
        test_root: "tests",
        extension: "py",
        case: FileCase::Snake,
        test_prefix: "test_",
        test_suffix: "",
    },
    LanguageConvention {
        name: "typescript",
        aliases: &["ts"],
        source_root: "src",
        test_root: "tests",
        extension: "ts",
        case: FileCase::Kebab,
        test_prefix: "",
        test_suffix: ".test",
    },
    LanguageConvention {
        name: "javascript",
        aliases: &["js", "node"],
        source_root: "src",
        test_root: "tests",
        extension: "js",
        case: FileCase::Kebab,
        test_prefix: "",
        test_suffix: ".test",
    },
    LanguageConvention {
        name: "rust",
        aliases: &["rs"],
        source_root: "src",
        test_root: "tests",
        extension: "rs",
        case: FileCase::Snake,
        test_prefix: "",
        test_suffix: "_test",
    },
    LanguageConvention {
        name: "go",
        aliases: &["golang"],
        source_root: "internal",
        test_root: "internal",
        extension: "go",
        case: FileCase::Snake,
        test_prefix: "",
        test_suffix: "_test",
    },
    LanguageConvention {
        name: "java",
        aliases: &["jvm"],
        source_root: "src/main/java",
        test_root: "src/test/java",
        extension: "java",
        case: FileCase::Pascal,
        test_prefix: "",
        test_suffix: "Test",
    },
];

/// Looks up a convention by name or alias, case-insensitively.
pub fn convention(language: &str) -> Option<&'static LanguageConvention> {
    let wanted = language.trim().to_ascii_lowercase();
    CONVENTIONS
        .iter()
        .find(|c| c.name == wanted || c.aliases.contains(&wanted.as_str()))
}

/// Folder a node kind lands in unless overridden.
pub fn default_folder(kind: NodeKind) -> &'static str {
    match kind {
        NodeKind::Framework => "framework",
        NodeKind::Module => "modules",
        NodeKind::Atom => "atoms",
        NodeKind::Adapter => "adapters",
        NodeKind::Infra => "infra",
        NodeKind::Test => "tests",
    }
}

/// Inputs of a layout plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutRequest {
    #[serde(default = "default_policy")]
    pub policy: String,
    /// Folder overrides keyed by node tag or kind name.
    #[serde(default)]
    pub role_to_folder: BTreeMap<String, String>,
    #[serde(default)]
    pub test_layout: TestLayout,
}

fn default_policy() -> String {
    AUTO_POLICY.to_string()
}

impl Default for LayoutRequest {
    fn default() -> Self {
        LayoutRequest {
            policy: default_policy(),
            role_to_folder: BTreeMap::new(),
            test_layout: TestLayout::default(),
        }
    }
}

/// Maps every node to its source file (and test file, for non-test nodes).
pub fn plan_file_layout(
    doc: &RpgDocument,
    request: &LayoutRequest,
) -> Result<FileLayout, PlanError> {
    let forced = if request.policy.eq_ignore_ascii_case(AUTO_POLICY) {
        None
    } else {
        Some(convention(&request.policy).ok_or_else(|| PlanError::UnknownPolicy {
            policy: request.policy.clone(),
            known: CONVENTIONS.iter().map(|c| c.name).collect::<Vec<_>>().join(", "),
        })?)
    };
    let runtime_default = doc.constraints.runtime.iter().find_map(|r| convention(r));

    let canon = canonicalize(doc);
    let mut taken: BTreeSet<String> = BTreeSet::new();
    let mut files = BTreeMap::new();
    for node in canon.nodes.values() {
        let conv = match forced {
            Some(conv) => conv,
            None => node
                .language
                .as_deref()
                .and_then(convention)
                .or(runtime_default)
                .unwrap_or(&CONVENTIONS[0]),
        };
        let folder = resolve_folder(node, &request.role_to_folder);
        let assignment = assign(node, conv, folder, request.test_layout, &mut taken);
        files.insert(node.id.clone(), assignment);
    }

    Ok(FileLayout {
        policy: request.policy.clone(),
        test_layout: request.test_layout,
        role_to_folder: request.role_to_folder.clone(),
        files,
    })
}

/// Deprecated name for [`plan_file_layout`].
#[deprecated(note = "use plan_file_layout")]
pub fn synthesize_file_layout(
    doc: &RpgDocument,
    request: &LayoutRequest,
) -> Result<FileLayout, PlanError> {
    plan_file_layout(doc, request)
}

/// Explicit override wins: first by tag (sorted order), then by kind name.
/// `None` means the kind's default folder.
fn resolve_folder<'a>(node: &Node, overrides: &'a BTreeMap<String, String>) -> Option<&'a str> {
    node.tags
        .iter()
        .find_map(|t| overrides.get(t))
        .or_else(|| overrides.get(node.kind.as_str()))
        .map(|f| f.trim_matches('/'))
}

fn join(parts: &[&str]) -> String {
    parts
        .iter()
        .filter(|p| !p.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("/")
}

fn assign(
    node: &Node,
    conv: &LanguageConvention,
    folder: Option<&str>,
    test_layout: TestLayout,
    taken: &mut BTreeSet<String>,
) -> FileAssignment {
    let base = conv.case.apply(&node.id);

    let mut attempt = 1;
    loop {
        let stem = if attempt == 1 {
            base.clone()
        } else {
            format!("{base}_{attempt}")
        };

        let (source, test) = if node.kind == NodeKind::Test {
            // Test nodes live in the test tree; only an explicit override
            // adds a folder level.
            (join(&[conv.test_root, folder.unwrap_or(""), &conv.file(&stem)]), None)
        } else {
            let folder = folder.unwrap_or(default_folder(node.kind));
            let source = join(&[conv.source_root, folder, &conv.file(&stem)]);
            let test_root = match test_layout {
                TestLayout::Dedicated => conv.test_root,
                TestLayout::CoLocated => conv.source_root,
            };
            let test = join(&[test_root, folder, &conv.test_file(&stem)]);
            (source, Some(test))
        };

        let clashes = taken.contains(&source) || test.as_ref().is_some_and(|t| taken.contains(t));
        if !clashes {
            taken.insert(source.clone());
            if let Some(test) = &test {
                taken.insert(test.clone());
            }
            return FileAssignment {
                language: conv.name.to_string(),
                source,
                test,
            };
        }
        attempt += 1;
    }
}
