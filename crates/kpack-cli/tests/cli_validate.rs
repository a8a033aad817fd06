//! End-to-end tests of the `kpack` binary: exit codes, output formats,
//! configuration handling, scaffolding and listing.

use std::path::Path;
use std::process::{Command, Output};

const PACK: &str = r#"
metadata:
  name: NAME
  version: 1.0.0
  description: Blog posts
  vendor: Example Inc
  domain: content
  compatibility: 2.0.0
connection:
  type: rest
  base_url: https://jsonplaceholder.typicode.com
tools:
  get_post:
    type: details
    description: Fetch one post
    endpoint: /posts/{post_id}
    method: GET
    parameters:
      - name: post_id
        type: integer
        required: true
        location: path
"#;

fn write_pack(root: &Path, rel: &str, yaml: &str) {
    let dir = root.join(rel);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("pack.yaml"), yaml).unwrap();
}

fn valid(name: &str) -> String {
    PACK.replace("NAME", name)
}

fn unbound(name: &str) -> String {
    valid(name).replace("- name: post_id", "- name: id")
}

fn kpack(cwd: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_kpack"))
        .args(args)
        .current_dir(cwd)
        .env_remove("KPACK_CONFIG")
        .env_remove("RUST_LOG")
        .output()
        .unwrap()
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn valid_pack_exits_zero() {
    let dir = tempfile::tempdir().unwrap();
    write_pack(dir.path(), "blog-api", &valid("blog-api"));

    let output = kpack(dir.path(), &["validate", "blog-api"]);
    assert_eq!(output.status.code(), Some(0), "{}", stdout(&output));
    assert!(stdout(&output).starts_with("blog-api (schema 2.0.0): VALID"));
}

#[test]
fn primary_file_path_is_accepted() {
    let dir = tempfile::tempdir().unwrap();
    write_pack(dir.path(), "blog-api", &valid("blog-api"));

    let output = kpack(dir.path(), &["validate", "blog-api/pack.yaml"]);
    assert_eq!(output.status.code(), Some(0), "{}", stdout(&output));
}

#[test]
fn invalid_pack_exits_one_with_json_report() {
    let dir = tempfile::tempdir().unwrap();
    write_pack(dir.path(), "blog-api", &unbound("blog-api"));

    let output = kpack(dir.path(), &["validate", "blog-api", "--format", "json"]);
    assert_eq!(output.status.code(), Some(1));

    let report: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(report["verdict"], "INVALID");
    assert_eq!(report["pack"], "blog-api");
    let codes: Vec<_> = report["issues"]
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["code"].as_str().unwrap().to_string())
        .collect();
    assert!(codes.contains(&"UnboundPlaceholder".to_string()), "{codes:?}");
}

#[test]
fn missing_pack_exits_two() {
    let dir = tempfile::tempdir().unwrap();
    let output = kpack(dir.path(), &["validate", "nowhere"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("required file not found"));
}

#[test]
fn strict_flag_fails_on_warnings() {
    let dir = tempfile::tempdir().unwrap();
    let yaml = valid("blog-api").replace("  domain: content", "  domain: Content Team");
    write_pack(dir.path(), "blog-api", &yaml);

    assert_eq!(kpack(dir.path(), &["validate", "blog-api"]).status.code(), Some(0));
    assert_eq!(
        kpack(dir.path(), &["validate", "blog-api", "--strict"]).status.code(),
        Some(1)
    );
}

#[test]
fn collection_exit_code_follows_worst_pack() {
    let dir = tempfile::tempdir().unwrap();
    write_pack(dir.path(), "packs/alpha", &valid("alpha"));
    write_pack(dir.path(), "packs/beta", &unbound("beta"));

    let output = kpack(dir.path(), &["validate", "packs", "--all", "--jobs", "2", "--format", "json"]);
    assert_eq!(output.status.code(), Some(1));
    let report: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(report["summary"]["total_packs"], 2);
    assert_eq!(report["summary"]["valid_packs"], 1);
    assert_eq!(report["packs"][0]["name"], "alpha");
}

#[cfg(unix)]
#[test]
fn pack_that_cannot_be_read_errors_the_collection() {
    let dir = tempfile::tempdir().unwrap();
    let outside = tempfile::tempdir().unwrap();
    std::fs::write(outside.path().join("x.yaml"), "tools: {}\n").unwrap();

    write_pack(dir.path(), "packs/alpha", &valid("alpha"));
    write_pack(dir.path(), "packs/beta", &unbound("beta"));
    let gamma = format!("{}structure:\n  tools: ./tools/\n", valid("gamma"));
    write_pack(dir.path(), "packs/gamma", &gamma);
    std::os::unix::fs::symlink(outside.path(), dir.path().join("packs/gamma/tools")).unwrap();

    let output = kpack(dir.path(), &["validate", "packs", "--all"]);
    assert_eq!(output.status.code(), Some(2));
    let text = stdout(&output);
    assert!(text.contains("[gamma] ERROR"), "{text}");
    assert!(text.contains("Packs: 1/3 valid, 1 invalid, 1 errored"), "{text}");
}

#[test]
fn config_file_sets_format_and_suppresses_codes() {
    let dir = tempfile::tempdir().unwrap();
    write_pack(dir.path(), "blog-api", &unbound("blog-api"));
    std::fs::write(
        dir.path().join("kpack.yaml"),
        "format: json\nignore: [UnboundPlaceholder]\n",
    )
    .unwrap();

    let output = kpack(dir.path(), &["validate", "blog-api"]);
    let report: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert!(report["issues"]
        .as_array()
        .unwrap()
        .iter()
        .all(|i| i["code"] != "UnboundPlaceholder"));

    // The flag overrides the file.
    let output = kpack(dir.path(), &["validate", "blog-api", "--format", "human"]);
    assert!(stdout(&output).starts_with("blog-api (schema 2.0.0)"));
}

#[test]
fn unreadable_config_exits_two() {
    let dir = tempfile::tempdir().unwrap();
    write_pack(dir.path(), "blog-api", &valid("blog-api"));
    std::fs::write(dir.path().join("bad.yaml"), "stritc: true\n").unwrap();

    let output = kpack(dir.path(), &["--config", "bad.yaml", "validate", "blog-api"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("invalid config"));
}

#[test]
fn schema_lists_versions() {
    let dir = tempfile::tempdir().unwrap();
    let output = kpack(dir.path(), &["schema", "--version", "1.0.0", "--format", "json"]);
    assert_eq!(output.status.code(), Some(0));
    let value: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(value["selected"], "1.0.0");
    assert_eq!(value["versions"], serde_json::json!(["1.0.0", "2.0.0"]));
}

#[test]
fn created_pack_is_valid_without_issues() {
    let dir = tempfile::tempdir().unwrap();
    let output = kpack(
        dir.path(),
        &["create", "cli_test_pack", "--output", "packs", "--domain", "testing", "--vendor", "CLI Test Co"],
    );
    assert_eq!(output.status.code(), Some(0), "{}", stdout(&output));
    assert!(stdout(&output).contains("cli_test_pack (schema 2.0.0): VALID"));
    assert!(dir.path().join("packs/cli_test_pack/pack.yaml").is_file());

    let output = kpack(dir.path(), &["validate", "packs/cli_test_pack", "--strict", "--format", "json"]);
    assert_eq!(output.status.code(), Some(0));
    let report: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(report["issues"], serde_json::json!([]));

    // A second create into the same place is refused.
    let output = kpack(dir.path(), &["create", "cli_test_pack", "--output", "packs"]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn create_refuses_connections_without_a_blueprint() {
    let dir = tempfile::tempdir().unwrap();
    let output = kpack(dir.path(), &["create", "box", "--connection", "ssh"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("no scaffold for ssh"));
    assert!(!dir.path().join("box").exists());
}

#[test]
fn list_indexes_created_and_hand_written_packs() {
    let dir = tempfile::tempdir().unwrap();
    let created = kpack(dir.path(), &["create", "orders", "--connection", "database", "--output", "packs"]);
    assert_eq!(created.status.code(), Some(0), "{}", stdout(&created));
    write_pack(dir.path(), "packs/blog-api", &valid("blog-api"));

    let output = kpack(dir.path(), &["list", "packs", "--format", "json"]);
    assert_eq!(output.status.code(), Some(0));
    let index: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(index["packs"][0]["path"], "blog-api");
    assert_eq!(index["packs"][1]["stats"]["connection"], "database");
    assert_eq!(index["packs"][1]["stats"]["guardrails"], true);
    assert_eq!(index["totals"]["packs"], 2);
    assert_eq!(index["totals"]["tools"], 3);
}
