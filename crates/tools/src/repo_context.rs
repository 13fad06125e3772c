//! Repository-context listing for the seed prompt.

use std::collections::BTreeSet;
use std::path::Path;
use walkdir::WalkDir;

use crate::search::is_ignored_dir;

/// Default number of files in a listing.
pub const DEFAULT_MAX_FILES: usize = 50;

/// Directories whose files are listed before anything else.
const PRIORITY_DIRS: &[&str] = &["src", "lib", "app", "components", "services", "utils", "api"];

const CODE_EXTENSIONS: &[&str] = &[
    "py", "js", "ts", "tsx", "jsx", "java", "cpp", "c", "go", "rs", "php",
];

fn is_code_file(path: &Path) -> bool {
    path.extension()
        .map(|e| CODE_EXTENSIONS.contains(&e.to_string_lossy().as_ref()))
        .unwrap_or(false)
}

fn code_files(root: &Path, start: &Path) -> impl Iterator<Item = String> {
    WalkDir::new(start)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            e.depth() == 0 || !e.file_type().is_dir() || !is_ignored_dir(&e.file_name().to_string_lossy())
        })
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file() && is_code_file(e.path()))
        .filter_map(move |e| {
            e.path().strip_prefix(root).ok().map(|rel| {
                rel.components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect::<Vec<_>>()
                    .join("/")
            })
        })
}

/// A newline-separated, sorted listing of up to `max_files` code files under
/// `root`. Files in the conventional source directories are picked first.
pub fn repository_listing(root: &Path, max_files: usize) -> String {
    let mut picked = BTreeSet::new();

    let priority = PRIORITY_DIRS
        .iter()
        .map(|d| root.join(d))
        .filter(|p| p.is_dir())
        .flat_map(|p| code_files(root, &p).collect::<Vec<_>>());

    for path in priority.chain(code_files(root, root)) {
        if picked.len() >= max_files {
            break;
        }
        picked.insert(path);
    }

    picked.into_iter().collect::<Vec<_>>().join("\n")
}
