use predicates::prelude::PredicateBooleanExt;

#[test]
fn check_rdcp_help() {
    let mut cmd = assert_cmd::Command::cargo_bin("rdcp").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicates::str::contains("--store"));
}

fn node(id: &str, name: &str, is_dir: bool, parent: &str) -> serde_json::Value {
    serde_json::json!({"id": id, "name": name, "is_dir": is_dir, "parent": parent})
}

// /
// |- docs
//    |- report.txt
// |- backup
// |- proj
//    |- a.txt
//    |- b.txt
//    |- .secret
// |- x
//    |- 1.txt
// |- single-file
fn setup_store() -> (tempfile::TempDir, std::path::PathBuf) {
    let tmp_dir = tempfile::tempdir().unwrap();
    let store = tmp_dir.path().join("drive.json");
    let snapshot = serde_json::json!({
        "nodes": [
            {"id": "root", "name": "", "is_dir": true, "parent": null},
            node("d1", "docs", true, "root"),
            node("f1", "report.txt", false, "d1"),
            node("d2", "backup", true, "root"),
            node("d3", "proj", true, "root"),
            node("f2", "a.txt", false, "d3"),
            node("f3", "b.txt", false, "d3"),
            node("f4", ".secret", false, "d3"),
            node("d4", "x", true, "root"),
            node("f5", "1.txt", false, "d4"),
            node("f6", "single-file", false, "root"),
        ]
    });
    std::fs::write(&store, serde_json::to_string_pretty(&snapshot).unwrap()).unwrap();
    (tmp_dir, store)
}

fn load_nodes(store: &std::path::Path) -> Vec<serde_json::Value> {
    let snapshot: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(store).unwrap()).unwrap();
    snapshot["nodes"].as_array().unwrap().clone()
}

/// Ids of the entries named `name` directly under `parent_id`.
fn find(nodes: &[serde_json::Value], parent_id: &str, name: &str) -> Vec<String> {
    nodes
        .iter()
        .filter(|node| node["parent"] == parent_id && node["name"] == name)
        .map(|node| node["id"].as_str().unwrap().to_string())
        .collect()
}

fn rdcp(store: &std::path::Path) -> assert_cmd::Command {
    let mut cmd = assert_cmd::Command::cargo_bin("rdcp").unwrap();
    cmd.args(["--store", store.to_str().unwrap(), "--ops-per-second", "0"]);
    cmd
}

#[test]
fn usage_error_without_destination() {
    let (_tmp_dir, store) = setup_store();
    rdcp(&store)
        .arg("/docs/report.txt")
        .assert()
        .failure()
        .stdout(predicates::str::contains("expecting <src> [src...] <dest>"));
}

#[test]
fn copy_file_into_store() {
    let (_tmp_dir, store) = setup_store();
    rdcp(&store)
        .args(["/docs/report.txt", "/backup/report.txt", "--summary"])
        .assert()
        .success()
        .stdout(predicates::str::contains("files copied: 1"));
    let nodes = load_nodes(&store);
    let copies = find(&nodes, "d2", "report.txt");
    assert_eq!(copies.len(), 1);
    assert_ne!(copies[0], "f1");
    assert_eq!(find(&nodes, "d1", "report.txt"), vec!["f1"]);
}

#[test]
fn copy_directory_recursively() {
    let (_tmp_dir, store) = setup_store();
    rdcp(&store)
        .args(["-r", "/proj", "/backup/proj"])
        .assert()
        .success();
    let nodes = load_nodes(&store);
    let proj = find(&nodes, "d2", "proj");
    assert_eq!(proj.len(), 1);
    assert_eq!(find(&nodes, &proj[0], "a.txt").len(), 1);
    assert_eq!(find(&nodes, &proj[0], "b.txt").len(), 1);
    assert!(find(&nodes, &proj[0], ".secret").is_empty());
}

#[test]
fn copy_hidden_entries_when_asked() {
    let (_tmp_dir, store) = setup_store();
    rdcp(&store)
        .args([
            "-r",
            "--hidden",
            "--hidden-pattern",
            "b.*",
            "--page-size",
            "1",
            "--concurrency",
            "sequential",
            "/proj",
            "/backup/proj",
        ])
        .assert()
        .success();
    let nodes = load_nodes(&store);
    let proj = find(&nodes, "d2", "proj");
    assert_eq!(find(&nodes, &proj[0], ".secret").len(), 1);
    assert!(find(&nodes, &proj[0], "b.txt").is_empty());
}

#[test]
fn directory_requires_recursive() {
    let (_tmp_dir, store) = setup_store();
    let before = std::fs::read_to_string(&store).unwrap();
    rdcp(&store)
        .args(["/proj", "/backup/proj"])
        .assert()
        .failure()
        .stdout(predicates::str::contains("copy: /proj is a directory"));
    assert_eq!(std::fs::read_to_string(&store).unwrap(), before);
}

#[test]
fn duplicate_fails_with_summary() {
    let (_tmp_dir, store) = setup_store();
    rdcp(&store)
        .args(["/docs/report.txt", "/backup/r.txt"])
        .assert()
        .success();
    rdcp(&store)
        .args(["/docs/report.txt", "/backup/r.txt", "--summary"])
        .assert()
        .failure()
        .stdout(
            predicates::str::contains("rdcp encountered errors")
                .and(predicates::str::contains("failures: 1")),
        );
    assert_eq!(find(&load_nodes(&store), "d2", "r.txt").len(), 1);
    rdcp(&store)
        .args(["--allow-duplicates", "/docs/report.txt", "/backup/r.txt"])
        .assert()
        .success();
    assert_eq!(find(&load_nodes(&store), "d2", "r.txt").len(), 2);
}

#[test]
fn ambiguous_destination_is_rejected() {
    let (_tmp_dir, store) = setup_store();
    let before = std::fs::read_to_string(&store).unwrap();
    rdcp(&store)
        .args(["-r", "--summary", "/proj", "/x", "/single-file"])
        .assert()
        .failure()
        .stdout(
            predicates::str::contains(
                "/single-file: is not a directory yet multiple paths are to be copied to it",
            )
            .and(predicates::str::contains("files copied").not()),
        );
    assert_eq!(std::fs::read_to_string(&store).unwrap(), before);
}

#[test]
fn missing_store_is_reported() {
    let tmp_dir = tempfile::tempdir().unwrap();
    rdcp(&tmp_dir.path().join("nope.json"))
        .args(["/a", "/b"])
        .assert()
        .failure()
        .stdout(predicates::str::contains("failed reading store"));
}

#[test]
fn zero_page_size_is_rejected() {
    let (_tmp_dir, store) = setup_store();
    rdcp(&store)
        .args(["--page-size", "0", "/docs/report.txt", "/backup"])
        .assert()
        .failure()
        .stdout(predicates::str::contains("page_size must be greater than 0"));
}
