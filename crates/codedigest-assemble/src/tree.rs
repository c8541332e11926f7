//! Directory tree rendering.

use std::collections::BTreeMap;

#[derive(Debug, Default)]
struct TreeNode {
    is_file: bool,
    children: BTreeMap<String, TreeNode>,
}

impl TreeNode {
    fn is_dir(&self) -> bool {
        !self.is_file
    }

    /// The only child, when it is a directory.
    fn sole_directory_child(&self) -> Option<(&String, &TreeNode)> {
        if self.children.len() != 1 {
            return None;
        }
        self.children.iter().next().filter(|(_, child)| child.is_dir())
    }
}

/// Directory tree built from relative paths.
///
/// Rendering compacts straight runs of single-child directories into one
/// `a/b/c/` line.
#[derive(Debug, Default)]
pub struct DirectoryTree {
    root: TreeNode,
    files: usize,
}

impl DirectoryTree {
    /// Build from `/`-separated relative file paths.
    pub fn from_paths<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut tree = Self::default();
        for path in paths {
            tree.insert(path.as_ref());
        }
        tree
    }

    fn insert(&mut self, path: &str) {
        let mut node = &mut self.root;
        let mut components = path.split('/').filter(|c| !c.is_empty()).peekable();
        while let Some(component) = components.next() {
            node = node.children.entry(component.to_string()).or_default();
            if components.peek().is_none() && !node.is_file && node.children.is_empty() {
                node.is_file = true;
                self.files += 1;
            }
        }
    }

    /// Number of files in the tree.
    pub fn file_count(&self) -> usize {
        self.files
    }

    pub fn is_empty(&self) -> bool {
        self.root.children.is_empty()
    }

    /// Render with box-drawing guides under a `root_label/` line.
    pub fn render(&self, root_label: &str) -> String {
        let mut out = format!("{}/\n", root_label.trim_end_matches('/'));
        render_children(&self.root, "", &mut out);
        out
    }
}

fn render_children(node: &TreeNode, prefix: &str, out: &mut String) {
    let count = node.children.len();
    for (i, (name, child)) in node.children.iter().enumerate() {
        let last = i + 1 == count;
        let (branch, guide) = if last { ("└── ", "    ") } else { ("├── ", "│   ") };

        let mut label = name.clone();
        let mut current = child;
        while current.is_dir() {
            let Some((next_name, next)) = current.sole_directory_child() else {
                break;
            };
            label.push('/');
            label.push_str(next_name);
            current = next;
        }
        if current.is_dir() {
            label.push('/');
        }

        out.push_str(prefix);
        out.push_str(branch);
        out.push_str(&label);
        out.push('\n');

        if current.is_dir() {
            render_children(current, &format!("{prefix}{guide}"), out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_basic() {
        let tree = DirectoryTree::from_paths(["src/lib.rs", "src/main.rs", "README.md"]);
        assert_eq!(
            tree.render("repo"),
            "repo/\n├── README.md\n└── src/\n    ├── lib.rs\n    └── main.rs\n"
        );
        assert_eq!(tree.file_count(), 3);
    }

    #[test]
    fn test_single_child_runs_are_compacted() {
        let tree = DirectoryTree::from_paths([
            "crates/core/src/lib.rs",
            "crates/core/src/node.rs",
            "Cargo.toml",
        ]);
        assert_eq!(
            tree.render("ws"),
            "ws/\n├── Cargo.toml\n└── crates/core/src/\n    ├── lib.rs\n    └── node.rs\n"
        );
    }

    #[test]
    fn test_directory_with_single_file_is_not_compacted_into_file() {
        let tree = DirectoryTree::from_paths(["a/b/only.txt"]);
        assert_eq!(tree.render("r"), "r/\n└── a/b/\n    └── only.txt\n");
    }

    #[test]
    fn test_nested_guides() {
        let tree = DirectoryTree::from_paths(["a/x.rs", "a/y/z.rs", "b.rs"]);
        assert_eq!(
            tree.render("r"),
            "r/\n├── a/\n│   ├── x.rs\n│   └── y/\n│       └── z.rs\n└── b.rs\n"
        );
    }

    #[test]
    fn test_empty_tree() {
        let tree = DirectoryTree::from_paths(Vec::<String>::new());
        assert!(tree.is_empty());
        assert_eq!(tree.render("r/"), "r/\n");
    }
}
