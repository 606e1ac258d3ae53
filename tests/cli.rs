//! Integration tests for the `annotation-viewer` binary.

#![allow(deprecated)] // cargo_bin deprecation, replacement not yet stable

use assert_cmd::Command;
use image::{Rgba, RgbaImage};
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::{tempdir, TempDir};

fn viewer(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("annotation-viewer").expect("binary should be built");
    cmd.current_dir(dir)
        .env("ANNOTATION_VIEWER_REVISION_FILE", dir.join("revision.txt"))
        .env("ANNOTATION_VIEWER_OUT_DIR", dir.join("out"))
        .env_remove("ANNOTATION_VIEWER_REPOSITORY")
        .env_remove("RUST_LOG");
    cmd
}

fn stdout_json(output: &[u8]) -> Value {
    serde_json::from_slice(output).expect("stdout should be JSON")
}

fn write_pages(dir: &TempDir, count: usize) -> Vec<PathBuf> {
    (0..count)
        .map(|i| {
            let path = dir.path().join(format!("page-{}.png", i + 1));
            RgbaImage::from_pixel(100, 100, Rgba([255, 255, 255, 255]))
                .save(&path)
                .unwrap();
            path
        })
        .collect()
}

// ─── help ────────────────────────────────────────────────────────────────────

#[test]
fn help_lists_subcommands() {
    let dir = tempdir().unwrap();
    viewer(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("decode"))
        .stdout(predicate::str::contains("render"))
        .stdout(predicate::str::contains("click"))
        .stdout(predicate::str::contains("session"));
}

#[test]
fn commands_prints_json_rows() {
    let dir = tempdir().unwrap();
    let out = viewer(dir.path()).arg("commands").output().unwrap();
    assert!(out.status.success());
    let payload = stdout_json(&out.stdout);
    assert_eq!(payload["commands"].as_array().unwrap().len(), 5);
}

// ─── decode ──────────────────────────────────────────────────────────────────

#[test]
fn decode_shorthand_from_stdin() {
    let dir = tempdir().unwrap();
    let out = viewer(dir.path())
        .args(["decode", "-"])
        .write_stdin("1,10,20,30,40;2,5,5,15,15,blue,\"solid\"")
        .output()
        .unwrap();
    assert!(out.status.success());

    let boxes = stdout_json(&out.stdout);
    let boxes = boxes.as_array().unwrap();
    assert_eq!(boxes.len(), 2);
    assert_eq!(boxes[0]["page"], 1);
    assert_eq!(boxes[0]["color"], "red");
    assert_eq!(boxes[0]["border"], "dashed");
    assert_eq!(boxes[1]["color"], "blue");
    assert_eq!(boxes[1]["border"], "solid");
}

#[test]
fn decode_structured_input_is_verbatim() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("boxes.json");
    fs::write(&input, r#"[{"page":1,"x":0,"y":0,"width":1,"height":1}]"#).unwrap();

    let out = viewer(dir.path())
        .args(["decode", input.to_str().unwrap()])
        .output()
        .unwrap();
    assert!(out.status.success());
    assert_eq!(
        stdout_json(&out.stdout),
        serde_json::json!([{"page":1,"x":0,"y":0,"width":1,"height":1}])
    );
}

#[test]
fn decode_rejects_non_numeric_fields() {
    let dir = tempdir().unwrap();
    viewer(dir.path())
        .arg("decode")
        .write_stdin("1,a,20,30,40")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Invalid annotations format"))
        .stderr(predicate::str::contains("x is not a valid number"));
}

#[test]
fn decode_color_override_applies_to_every_box() {
    let dir = tempdir().unwrap();
    let out = viewer(dir.path())
        .args(["decode", "--color", "green", "--border", "solid"])
        .write_stdin("1,1,1,1,1,blue\n2,2,2,2,2")
        .output()
        .unwrap();
    let boxes = stdout_json(&out.stdout);
    for b in boxes.as_array().unwrap() {
        assert_eq!(b["color"], "green");
        assert_eq!(b["border"], "solid");
    }
}

#[test]
fn decode_empty_input_prints_empty_list() {
    let dir = tempdir().unwrap();
    let out = viewer(dir.path()).arg("decode").write_stdin("").output().unwrap();
    assert!(out.status.success());
    assert_eq!(stdout_json(&out.stdout), serde_json::json!([]));
}

// ─── render / click ──────────────────────────────────────────────────────────

#[test]
fn render_writes_png_and_sidecar() {
    let dir = tempdir().unwrap();
    let pages = write_pages(&dir, 2);
    let annotations = dir.path().join("boxes.txt");
    fs::write(&annotations, "1,10,10,20,20;2,5,5,10,10,blue,solid;4,1,1,1,1").unwrap();
    let output = dir.path().join("render").join("overlay.png");

    viewer(dir.path())
        .arg("render")
        .args(["--page", pages[0].to_str().unwrap()])
        .args(["--page", pages[1].to_str().unwrap()])
        .args(["--annotations", annotations.to_str().unwrap()])
        .args(["--out", output.to_str().unwrap()])
        .args(["--resolution-boost", "2", "--scroll-to", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("overlay.png"));

    let rendered = image::open(&output).unwrap();
    assert_eq!(rendered.width(), 200);
    assert_eq!(rendered.height(), 200 + 6 + 200);

    let meta: Value =
        serde_json::from_str(&fs::read_to_string(dir.path().join("render/overlay.json")).unwrap())
            .unwrap();
    assert_eq!(meta["annotations"].as_array().unwrap().len(), 2);
    assert_eq!(meta["skipped"], serde_json::json!([2]));
    assert_eq!(meta["source"], "shorthand");
    assert_eq!(meta["revision"], "unknown");
    assert_eq!(meta["scroll_offset"], 206 + 10);
}

#[test]
fn render_tolerates_far_off_canvas_boxes() {
    let dir = tempdir().unwrap();
    let pages = write_pages(&dir, 1);
    let document = dir.path().join("doc.pdf");
    fs::write(&document, b"%PDF-1.7\n").unwrap();
    let output = dir.path().join("far.png");

    viewer(dir.path())
        .arg("render")
        .args(["--page", pages[0].to_str().unwrap()])
        .args(["--annotations", "-", "--labels", "--outline-size", "3"])
        .args(["--document", document.to_str().unwrap()])
        .args(["--out", output.to_str().unwrap()])
        .write_stdin("1,-1e12,0,10,10;1,0,-1e12,10,10;1,nan,1,1,1")
        .assert()
        .success();

    let meta: Value =
        serde_json::from_str(&fs::read_to_string(dir.path().join("far.json")).unwrap()).unwrap();
    assert_eq!(meta["annotations"].as_array().unwrap().len(), 3);
    assert_eq!(meta["document"]["pdf"], true);
}

#[test]
fn render_rejects_out_of_range_options() {
    let dir = tempdir().unwrap();
    let pages = write_pages(&dir, 1);
    viewer(dir.path())
        .arg("render")
        .args(["--page", pages[0].to_str().unwrap()])
        .args(["--annotations", "-", "--outline-size", "9"])
        .write_stdin("1,1,1,1,1")
        .assert()
        .failure()
        .stderr(predicate::str::contains("annotation_outline_size"));
}

#[test]
fn click_reports_index_and_page() {
    let dir = tempdir().unwrap();
    let pages = write_pages(&dir, 2);
    let out = viewer(dir.path())
        .arg("click")
        .args(["--page", pages[0].to_str().unwrap()])
        .args(["--page", pages[1].to_str().unwrap()])
        .args(["--annotations", "-"])
        .args(["--x", "20", "--y", "120"])
        .write_stdin("1,10,10,20,20\n2,10,10,20,20")
        .output()
        .unwrap();
    assert!(out.status.success());
    assert_eq!(
        stdout_json(&out.stdout),
        serde_json::json!({"Index": 1, "Page": 2})
    );
}

#[test]
fn click_outside_boxes_fails() {
    let dir = tempdir().unwrap();
    let pages = write_pages(&dir, 1);
    viewer(dir.path())
        .arg("click")
        .args(["--page", pages[0].to_str().unwrap()])
        .args(["--annotations", "-", "--x", "90", "--y", "90"])
        .write_stdin("1,10,10,20,20")
        .assert()
        .failure()
        .stderr(predicate::str::contains("no annotation"));
}

// ─── session / info ──────────────────────────────────────────────────────────

#[test]
fn session_keeps_last_good_annotations() {
    let dir = tempdir().unwrap();
    let edits = [
        ("a.txt", "1,1,1,1,1;2,2,2,2,2"),
        ("b.txt", "1,oops,1,1,1"),
        ("c.txt", r#"[{"page": 3}]"#),
    ];
    for (name, body) in edits {
        fs::write(dir.path().join(name), body).unwrap();
    }

    let out = viewer(dir.path())
        .args(["session", "a.txt", "b.txt", "c.txt"])
        .output()
        .unwrap();
    assert!(out.status.success());

    let rows: Vec<Value> = String::from_utf8(out.stdout)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0]["status"], "applied");
    assert_eq!(rows[1]["status"], "kept");
    assert_eq!(rows[1]["annotations"], 2);
    assert!(rows[1]["notice"]["message"]
        .as_str()
        .unwrap()
        .starts_with("Invalid annotations format"));
    assert_eq!(rows[2]["source"], "structured");
    assert_eq!(rows[2]["annotations"], 1);
    assert!(rows[2]["notice"].is_null());
}

#[test]
fn info_reports_revision_and_fingerprint() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("revision.txt"), "abc123\n").unwrap();
    let document = dir.path().join("doc.pdf");
    fs::write(&document, b"").unwrap();

    let out = viewer(dir.path())
        .args(["info", "--document", document.to_str().unwrap()])
        .output()
        .unwrap();
    assert!(out.status.success());
    let payload = stdout_json(&out.stdout);
    assert_eq!(payload["revision"], "abc123");
    assert_eq!(
        payload["revision_link"],
        "https://github.com/lfoppiano/structure-vision/commit/abc123"
    );
    assert_eq!(
        payload["document"]["fingerprint"],
        "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
    );
    assert_eq!(payload["document"]["bytes"], 0);
}

#[test]
fn info_without_revision_file_is_unknown() {
    let dir = tempdir().unwrap();
    let out = viewer(dir.path()).arg("info").output().unwrap();
    let payload = stdout_json(&out.stdout);
    assert_eq!(payload["revision"], "unknown");
    assert!(payload["revision_link"].is_null());
}
