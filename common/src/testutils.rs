use crate::copy;
use crate::memory::MemoryTree;
use crate::progress::Progress;
use crate::remote::Remote;

// /
// |- docs
//    |- report.txt
//    |- notes.txt
// |- backup
// |- proj
//    |- a.txt
//    |- b.txt
//    |- .secret
//    |- sub
//       |- c.txt
// |- x
//    |- 1.txt
// |- y
//    |- 2.txt
// |- forms
//    |- survey  (not copyable)
// |- single-file
pub fn setup_test_tree() -> std::sync::Arc<MemoryTree> {
    let tree = MemoryTree::new();
    for file in [
        "/docs/report.txt",
        "/docs/notes.txt",
        "/proj/a.txt",
        "/proj/b.txt",
        "/proj/.secret",
        "/proj/sub/c.txt",
        "/x/1.txt",
        "/y/2.txt",
        "/single-file",
    ] {
        tree.add_file(file).unwrap();
    }
    tree.mkdir("/backup").unwrap();
    tree.add_uncopyable("/forms/survey").unwrap();
    std::sync::Arc::new(tree)
}

pub fn remote(tree: &std::sync::Arc<MemoryTree>) -> Remote {
    Remote::new(
        tree.clone(),
        std::sync::Arc::new(throttle::RateLimiter::unlimited()),
    )
}

pub fn copier(tree: &std::sync::Arc<MemoryTree>, settings: copy::Settings) -> copy::Copier {
    copy::Copier::new(remote(tree), settings, std::sync::Arc::new(Progress::new()))
}

pub fn recursive(concurrency: copy::ConcurrencyMode) -> copy::Settings {
    copy::Settings {
        recursive: true,
        concurrency,
        ..Default::default()
    }
}

/// Names of the entries directly below `dir_path`, sorted.
pub fn child_names(tree: &MemoryTree, dir_path: &str) -> Vec<String> {
    let mut names: Vec<String> = tree
        .children(dir_path)
        .into_iter()
        .map(|entry| entry.name)
        .collect();
    names.sort();
    names
}
