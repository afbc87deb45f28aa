//! Category hierarchy built from the records' category column.
//!
//! Each record carries zero or more category paths separated by commas, each
//! path being `/`-separated segments (`"ropa/hombre/camisetas, calzado"`).
//! [`build_tree`] merges the paths of many records into one tree where every
//! distinct path appears exactly once.
//!
//! Empty segments produced by doubled delimiters (`"a//b"`) are kept as
//! nodes with an empty name. A path whose accumulated form is empty (a leading
//! `/`, or a blank entry) resolves to the root and adds nothing.

use std::collections::HashMap;

use serde::Serialize;

use crate::record::Record;

/// Name given to the synthetic root node.
pub const ROOT_NAME: &str = "root";

/// One segment position in the category hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryNode {
    /// Full slash-joined path from the root, inclusive. Empty for the root.
    pub path: String,
    /// Label of this segment.
    pub name: String,
    /// Children in first-insertion order.
    pub children: Vec<CategoryNode>,
}

impl CategoryNode {
    fn new(path: String, name: String) -> Self {
        Self {
            path,
            name,
            children: Vec::new(),
        }
    }

    /// An empty root node.
    pub fn root() -> Self {
        Self::new(String::new(), ROOT_NAME.to_string())
    }

    pub fn is_root(&self) -> bool {
        self.path.is_empty()
    }

    /// All paths below this node, in pre-order. The node's own path is not included.
    pub fn paths(&self) -> Vec<&str> {
        let mut out = Vec::new();
        let mut stack: Vec<&CategoryNode> = self.children.iter().rev().collect();
        while let Some(node) = stack.pop() {
            out.push(node.path.as_str());
            stack.extend(node.children.iter().rev());
        }
        out
    }

    /// Number of nodes below this one.
    pub fn node_count(&self) -> usize {
        self.children.iter().map(|c| 1 + c.node_count()).sum()
    }

    /// Find a descendant (or self) by exact path.
    pub fn find(&self, path: &str) -> Option<&CategoryNode> {
        if self.path == path {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(path))
    }
}

// ============================================================================
// Record Queries
// ============================================================================

/// The trimmed, comma-split category paths of a record.
///
/// Blank entries (`"a,,b"`, trailing commas) are skipped; an absent or empty
/// field yields no paths.
pub fn category_paths(record: &Record) -> Vec<&str> {
    match record.category() {
        Some(raw) => raw
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect(),
        None => Vec::new(),
    }
}

/// How a category path is compared against a record's paths.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MatchMode {
    /// Plain string prefix: `"ropa/h"` matches `"ropa/hombre"`.
    #[default]
    Prefix,
    /// Prefix that must end on a segment boundary: `"ropa/h"` does not match
    /// `"ropa/hombre"`, `"ropa"` matches `"ropa/hombre"` and `"ropa"`.
    Segment,
}

impl MatchMode {
    fn matches(self, path: &str, category_path: &str) -> bool {
        match self {
            Self::Prefix => path.starts_with(category_path),
            Self::Segment => {
                let wanted = category_path.trim_end_matches('/');
                if wanted.is_empty() {
                    return true;
                }
                match path.strip_prefix(wanted) {
                    Some(rest) => rest.is_empty() || rest.starts_with('/'),
                    None => false,
                }
            }
        }
    }
}

/// Whether any of the record's paths starts with `category_path`.
pub fn is_in_category(record: &Record, category_path: &str) -> bool {
    is_in_category_with(record, category_path, MatchMode::Prefix)
}

/// [`is_in_category`] with an explicit comparison mode.
pub fn is_in_category_with(record: &Record, category_path: &str, mode: MatchMode) -> bool {
    category_paths(record)
        .into_iter()
        .any(|p| mode.matches(p, category_path))
}

// ============================================================================
// Tree Construction
// ============================================================================

struct Slot {
    path: String,
    name: String,
    children: Vec<usize>,
}

/// Arena plus a path index scoped to a single build.
struct TreeBuilder {
    slots: Vec<Slot>,
    index: HashMap<String, usize>,
}

impl TreeBuilder {
    fn new() -> Self {
        let root = Slot {
            path: String::new(),
            name: ROOT_NAME.to_string(),
            children: Vec::new(),
        };
        Self {
            slots: vec![root],
            index: HashMap::from([(String::new(), 0)]),
        }
    }

    fn insert_path(&mut self, path: &str) {
        let mut current = 0;
        let mut accumulated = String::new();

        for segment in path.split('/') {
            if !accumulated.is_empty() {
                accumulated.push('/');
            }
            accumulated.push_str(segment);

            current = match self.index.get(&accumulated) {
                Some(&existing) => existing,
                None => {
                    let id = self.slots.len();
                    self.slots.push(Slot {
                        path: accumulated.clone(),
                        name: segment.to_string(),
                        children: Vec::new(),
                    });
                    self.slots[current].children.push(id);
                    self.index.insert(accumulated.clone(), id);
                    id
                }
            };
        }
    }

    fn finish(mut self) -> CategoryNode {
        Self::materialize(&mut self.slots, 0)
    }

    fn materialize(slots: &mut [Slot], id: usize) -> CategoryNode {
        let path = std::mem::take(&mut slots[id].path);
        let name = std::mem::take(&mut slots[id].name);
        let child_ids = std::mem::take(&mut slots[id].children);

        let mut node = CategoryNode::new(path, name);
        node.children = child_ids
            .into_iter()
            .map(|c| Self::materialize(slots, c))
            .collect();
        node
    }
}

/// Merge the category paths of `records` into one tree.
///
/// The returned root has name `"root"` and an empty path; its children are
/// the top-level categories. Sibling order follows first insertion, so it
/// depends on record order, but the set of paths does not.
pub fn build_tree<'a, I>(records: I) -> CategoryNode
where
    I: IntoIterator<Item = &'a Record>,
{
    let mut builder = TreeBuilder::new();
    for record in records {
        for path in category_paths(record) {
            builder.insert_path(path);
        }
    }
    builder.finish()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;

    fn rec(category: &str) -> Record {
        Record {
            desc_categoria_producto: Some(category.to_string()),
            ..Default::default()
        }
    }

    fn path_set(root: &CategoryNode) -> BTreeSet<String> {
        root.paths().into_iter().map(str::to_string).collect()
    }

    // --- category_paths ---

    #[test]
    fn test_category_paths_trims_and_splits() {
        let r = rec("ropa/hombre/camisetas,  calzado/zapatillas ");
        assert_eq!(
            category_paths(&r),
            vec!["ropa/hombre/camisetas", "calzado/zapatillas"]
        );
    }

    #[test]
    fn test_category_paths_absent_or_empty() {
        assert!(category_paths(&Record::default()).is_empty());
        assert!(category_paths(&rec("")).is_empty());
        assert!(category_paths(&rec(" , ")).is_empty());
    }

    // --- is_in_category ---

    #[test]
    fn test_is_in_category_prefix() {
        let r = rec("ropa/hombre/camisetas, calzado/zapatillas");
        assert!(is_in_category(&r, "ropa/hombre"));
        assert!(is_in_category(&r, "calzado"));
        assert!(!is_in_category(&r, "deporte"));
    }

    #[test]
    fn test_is_in_category_prefix_is_not_segment_aware() {
        let r = rec("ropa/hombre");
        assert!(is_in_category(&r, "ropa/h"));
        assert!(!is_in_category_with(&r, "ropa/h", MatchMode::Segment));
    }

    #[test]
    fn test_segment_mode_boundaries() {
        let r = rec("ropa/hombre/camisetas");
        assert!(is_in_category_with(&r, "ropa", MatchMode::Segment));
        assert!(is_in_category_with(&r, "ropa/hombre/", MatchMode::Segment));
        assert!(is_in_category_with(
            &r,
            "ropa/hombre/camisetas",
            MatchMode::Segment
        ));
        assert!(!is_in_category_with(&r, "ropa/hombre/cam", MatchMode::Segment));
    }

    #[test]
    fn test_is_in_category_without_paths() {
        assert!(!is_in_category(&Record::default(), ""));
        assert!(!is_in_category(&Record::default(), "ropa"));
    }

    // --- build_tree ---

    #[test]
    fn test_empty_input_yields_bare_root() {
        let root = build_tree(&[] as &[Record]);
        assert_eq!(root.name, "root");
        assert_eq!(root.path, "");
        assert!(root.children.is_empty());
        assert!(root.is_root());
    }

    #[test]
    fn test_builds_nested_structure() {
        let records = vec![
            rec("ropa/hombre/camisetas, calzado/zapatillas"),
            rec("ropa/mujer"),
            Record::default(),
        ];
        let root = build_tree(&records);

        let top: Vec<&str> = root.children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(top, vec!["ropa", "calzado"]);

        let ropa = root.find("ropa").unwrap();
        let kids: Vec<&str> = ropa.children.iter().map(|c| c.path.as_str()).collect();
        assert_eq!(kids, vec!["ropa/hombre", "ropa/mujer"]);

        let camisetas = root.find("ropa/hombre/camisetas").unwrap();
        assert_eq!(camisetas.name, "camisetas");
        assert!(camisetas.children.is_empty());
        assert_eq!(root.node_count(), 6);
    }

    #[test]
    fn test_duplicate_paths_create_one_node() {
        let records = vec![rec("ropa/hombre, ropa/hombre"), rec("ropa/hombre")];
        let root = build_tree(&records);
        assert_eq!(root.paths(), vec!["ropa", "ropa/hombre"]);

        let doubled: Vec<Record> = records.iter().chain(records.iter()).cloned().collect();
        assert_eq!(path_set(&build_tree(&doubled)), path_set(&root));
        assert_eq!(path_set(&build_tree(&records)), path_set(&root));
    }

    #[test]
    fn test_path_set_ignores_ordering() {
        let forward = vec![
            rec("ropa/hombre/camisetas, calzado/zapatillas"),
            rec("deporte/futbol, ropa/mujer"),
        ];
        let reversed = vec![
            rec("ropa/mujer, deporte/futbol"),
            rec("calzado/zapatillas, ropa/hombre/camisetas"),
        ];
        let a = build_tree(&forward);
        let b = build_tree(&reversed);

        assert_eq!(path_set(&a), path_set(&b));
        // Sibling order is insertion-dependent.
        assert_eq!(a.children[0].name, "ropa");
        assert_eq!(b.children[0].name, "ropa");
        assert_eq!(a.children[1].name, "calzado");
        assert_eq!(b.children[1].name, "deporte");
    }

    #[test]
    fn test_doubled_delimiter_keeps_empty_segment() {
        let root = build_tree(&[rec("a//b")]);
        assert_eq!(root.paths(), vec!["a", "a/", "a//b"]);
        assert_eq!(root.find("a/").unwrap().name, "");
    }

    #[test]
    fn test_leading_slash_resolves_through_root() {
        let root = build_tree(&[rec("/ropa")]);
        assert_eq!(root.paths(), vec!["ropa"]);
    }

    #[test]
    fn test_paths_are_unique() {
        let records = vec![rec("a/b/c, a/b, a"), rec("a/b/d, e")];
        let root = build_tree(&records);
        let paths = root.paths();
        let unique: BTreeSet<&str> = paths.iter().copied().collect();
        assert_eq!(paths.len(), unique.len());
    }

    #[test]
    fn test_serializes_nested_json() {
        let root = build_tree(&[rec("a/b")]);
        let json = serde_json::to_value(&root.children).unwrap();
        assert_eq!(
            json,
            serde_json::json!([
                {"path": "a", "name": "a", "children": [
                    {"path": "a/b", "name": "b", "children": []}
                ]}
            ])
        );
    }
}
