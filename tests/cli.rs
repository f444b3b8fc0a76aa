use assert_cmd::Command;
use image::{Rgb, RgbImage};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn combined_output(output: &std::process::Output) -> String {
    format!(
        "{}\n{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    )
}

fn write_png(path: &Path, width: u32, height: u32) {
    RgbImage::from_pixel(width, height, Rgb([200, 160, 40]))
        .save(path)
        .expect("write test image");
}

fn travel_site() -> TempDir {
    let root = tempfile::tempdir().expect("tempdir");
    let travel = root.path().join("travel");
    fs::create_dir_all(travel.join("avatar")).unwrap();
    fs::create_dir_all(travel.join("image")).unwrap();

    write_png(&travel.join("avatar").join("a1.png"), 64, 64);
    write_png(&travel.join("avatar").join("a2.png"), 2500, 1000);
    write_png(&travel.join("image").join("p2.png"), 300, 3840);
    fs::write(travel.join("image").join("corrupt.jpg"), b"\xff\xd8 not really").unwrap();

    fs::write(
        travel.join("index.json"),
        r#"[
  {"title": "Tainan", "avatar": "travel/avatar/a1.png", "image": ""},
  {"title": "Hualien", "avatar": "travel/avatar/a2.png", "image": "travel/image/p2.png"}
]"#,
    )
    .unwrap();

    root
}

fn webpify(root: &Path) -> Command {
    let mut cmd = Command::cargo_bin("webpify").expect("binary exists");
    cmd.arg("--root").arg(root).env_remove("RUST_LOG");
    cmd
}

#[test]
fn help_lists_flags() {
    let output = Command::cargo_bin("webpify")
        .unwrap()
        .arg("--help")
        .output()
        .expect("--help runs");

    assert!(output.status.success());
    let text = combined_output(&output);
    for flag in ["--root", "--config", "--max-dimension", "--quality", "--threads"] {
        assert!(text.contains(flag), "help text missing {flag}: {text}");
    }
}

#[test]
fn converts_site_and_rewrites_manifest() {
    let root = travel_site();
    let travel = root.path().join("travel");

    let output = webpify(root.path()).output().expect("run webpify");
    let text = combined_output(&output);
    assert!(output.status.success(), "webpify failed: {text}");

    assert_eq!(
        image::image_dimensions(travel.join("avatar-webp").join("a1.webp")).unwrap(),
        (64, 64)
    );
    assert_eq!(
        image::image_dimensions(travel.join("avatar-webp").join("a2.webp")).unwrap(),
        (1920, 768)
    );
    assert_eq!(
        image::image_dimensions(travel.join("image-webp").join("p2.webp")).unwrap(),
        (150, 1920)
    );
    assert!(!travel.join("image-webp").join("corrupt.webp").exists());
    assert!(text.contains("corrupt.jpg"), "missing failure log: {text}");

    let manifest = fs::read_to_string(travel.join("index.json")).unwrap();
    assert_eq!(
        manifest,
        r#"[
  {
    "title": "Tainan",
    "avatar": "travel/avatar-webp/a1.webp",
    "image": ""
  },
  {
    "title": "Hualien",
    "avatar": "travel/avatar-webp/a2.webp",
    "image": "travel/image-webp/p2.webp"
  }
]
"#
    );
}

#[test]
fn missing_source_dir_fails_without_writing() {
    let root = travel_site();
    let travel = root.path().join("travel");
    fs::remove_dir_all(travel.join("image")).unwrap();
    let before = fs::read_to_string(travel.join("index.json")).unwrap();

    let output = webpify(root.path()).output().expect("run webpify");

    assert!(!output.status.success());
    assert!(combined_output(&output).contains("image directory"));
    assert!(!travel.join("avatar-webp").exists());
    assert_eq!(fs::read_to_string(travel.join("index.json")).unwrap(), before);
}

#[test]
fn flags_override_config_file() {
    let root = travel_site();
    let travel = root.path().join("travel");
    fs::write(
        root.path().join(".webpify.json"),
        r#"{ "convert": { "max_dimension": 500 } }"#,
    )
    .unwrap();

    let output = webpify(root.path())
        .args(["--max-dimension", "1000", "--threads", "1"])
        .output()
        .expect("run webpify");
    assert!(output.status.success(), "{}", combined_output(&output));

    assert_eq!(
        image::image_dimensions(travel.join("avatar-webp").join("a2.webp")).unwrap(),
        (1000, 400)
    );
}

#[test]
fn config_file_sets_max_dimension() {
    let root = travel_site();
    let travel = root.path().join("travel");
    fs::write(
        root.path().join(".webpify.json"),
        r#"{ "convert": { "max_dimension": 500 } }"#,
    )
    .unwrap();

    let output = webpify(root.path()).output().expect("run webpify");
    assert!(output.status.success(), "{}", combined_output(&output));

    assert_eq!(
        image::image_dimensions(travel.join("avatar-webp").join("a2.webp")).unwrap(),
        (500, 200)
    );
}

#[test]
fn rejects_out_of_range_quality() {
    let root = travel_site();

    let output = webpify(root.path())
        .args(["--quality", "150"])
        .output()
        .expect("run webpify");

    assert!(!output.status.success());
    assert!(!root.path().join("travel").join("avatar-webp").exists());
}

#[test]
fn missing_explicit_config_fails_without_writing() {
    let root = travel_site();
    let travel = root.path().join("travel");
    let before = fs::read_to_string(travel.join("index.json")).unwrap();

    let output = webpify(root.path())
        .arg("--config")
        .arg(root.path().join("typo.json"))
        .output()
        .expect("run webpify");

    assert!(!output.status.success());
    assert!(combined_output(&output).contains("typo.json"));
    assert!(!travel.join("avatar-webp").exists());
    assert_eq!(fs::read_to_string(travel.join("index.json")).unwrap(), before);
}
