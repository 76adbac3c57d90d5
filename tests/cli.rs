use std::path::PathBuf;

use assert_cmd::Command;

fn fixture() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/class_marks.csv")
}

fn gradegraph() -> Command {
    let mut cmd = Command::cargo_bin("gradegraph").expect("binary builds");
    cmd.env_remove("GRADEGRAPH_CONFIG");
    cmd
}

fn stdout_of(cmd: &mut Command) -> String {
    let output = cmd.output().expect("command runs");
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout).expect("utf-8 output")
}

#[test]
fn analyze_prints_rankings() {
    let out = stdout_of(gradegraph().arg("analyze").arg(fixture()).args(["--limit", "3"]));
    assert!(out.starts_with("10 students, 3 subjects"));
    assert!(out.contains("  1. Esha Kulkarni (5)"));
    assert!(!out.contains("  4. "), "limit of 3 not applied:\n{out}");
    assert!(out.contains("Students needing attention:"));
    assert!(out.contains("Jay Desai (10)"));
    assert!(out.contains("Subject difficulty (hardest first):"));
}

#[test]
fn analyze_json_is_deterministic() {
    let first = stdout_of(gradegraph().arg("analyze").arg(fixture()).arg("--json"));
    let second = stdout_of(gradegraph().arg("analyze").arg(fixture()).arg("--json"));
    assert_eq!(first, second);

    let value: serde_json::Value = serde_json::from_str(&first).unwrap();
    let at_risk = value["insights"]["at_risk"].as_array().unwrap();
    let names: Vec<&str> = at_risk.iter().map(|s| s["name"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["Chitra Nair", "Jay Desai", "Farhan Qureshi"]);
}

#[test]
fn report_writes_markdown_file() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("report.md");
    stdout_of(
        gradegraph()
            .arg("report")
            .arg(fixture())
            .arg("--out")
            .arg(&out),
    );
    let report = std::fs::read_to_string(&out).unwrap();
    assert!(report.contains("## Students Needing Attention"));
    assert!(report.contains("Chitra Nair"));
}

#[test]
fn student_profile_shows_incomplete_subject() {
    let out = stdout_of(gradegraph().arg("student").arg(fixture()).args(["--id", "3"]));
    assert!(out.starts_with("Chitra Nair (SR.No. 3)"));
    assert!(out.contains("Operating Systems: 23.0 / 135 (class average"));
    assert!(out.contains("[incomplete]"));
    assert!(out.contains("Support priority: High"));
}

#[test]
fn recommend_filters_by_student() {
    let out = stdout_of(gradegraph().arg("recommend").arg(fixture()).args(["--id", "6"]));
    assert!(!out.is_empty());
    assert!(out.lines().all(|line| line.starts_with("- Farhan Qureshi (6)")));
}

#[test]
fn config_overrides_thresholds() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("gradegraph.toml");
    std::fs::write(&config, "[tiers]\nlow = 60.0\nhigh = 90.0\n").unwrap();

    let out = stdout_of(
        gradegraph()
            .arg("--config")
            .arg(&config)
            .arg("analyze")
            .arg(fixture())
            .arg("--json"),
    );
    let value: serde_json::Value = serde_json::from_str(&out).unwrap();
    let bright = value["insights"]["tier_distribution"]
        .as_array()
        .unwrap()
        .iter()
        .find(|t| t["tier"] == "Bright")
        .unwrap();
    assert_eq!(bright["count"], 1);
}

#[test]
fn missing_anchor_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let sheet = dir.path().join("broken.csv");
    std::fs::write(&sheet, "Roll No,Name,Maths\n,,ISE\nTE01,Asha,20\n").unwrap();

    let output = gradegraph().arg("analyze").arg(&sheet).output().unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("schema error"), "stderr: {stderr}");
}

#[test]
fn config_command_prints_defaults() {
    let out = stdout_of(gradegraph().arg("config"));
    assert!(out.contains("[tiers]"));
    assert!(out.contains("low = 40.0"));
    assert!(out.contains("top_n = 10"));
}

#[test]
fn reads_sheet_from_stdin() {
    let sheet = std::fs::read_to_string(fixture()).unwrap();
    let out = stdout_of(gradegraph().args(["analyze", "-"]).write_stdin(sheet));
    assert!(out.starts_with("10 students, 3 subjects"));
}

#[test]
fn subject_lists_best_and_weakest() {
    let out = stdout_of(
        gradegraph()
            .arg("subject")
            .arg(fixture())
            .args(["--name", "operating systems"]),
    );
    assert!(out.starts_with("Operating Systems (9 students"), "{out}");
    let (top, bottom) = out.split_once("Need improvement:").unwrap();
    assert!(top.contains("  1. Esha Kulkarni (5) 121.0"));
    assert!(top.contains("  2. Asha Rao (1) 111.0"));
    assert!(bottom.contains("  1. Chitra Nair (3) 23.0"));
    assert!(bottom.contains("  2. Jay Desai (10) 34.0"));
    assert!(!out.contains("Dev Shah"));
}

#[test]
fn unknown_subject_is_reported() {
    let output = gradegraph()
        .arg("subject")
        .arg(fixture())
        .args(["--name", "Chemistry"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("no subject named `Chemistry`"));
}

#[test]
fn config_with_a_single_weight_keeps_the_rest() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("gradegraph.toml");
    std::fs::write(&config, "[scheme.weights]\nese = 2.0\n").unwrap();

    let out = stdout_of(gradegraph().arg("--config").arg(&config).arg("config"));
    assert!(out.contains("ese = 2.0"));
    assert!(out.contains("ise = 1.0"));
    assert!(out.contains("practical = 1.0"));
}
