//! Integration tests for the ghostmark CLI
//!
//! Runs the built binary against temporary files. Commands that need `pdftoppm` or
//! `tesseract` are exercised through image inputs or left to the core crate's mocks.

use anyhow::Result;
use ghostmark::{BarcodeEngine, GhostmarkConfig, SubstitutionCipher};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::{tempdir, TempDir};

/// Test helper to get the CLI binary path
fn get_cli_path() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // Remove test binary name
    if path.ends_with("deps") {
        path.pop(); // Remove "deps" directory
    }
    path.push("ghostmark");
    #[cfg(windows)]
    path.set_extension("exe");
    path
}

fn setup_temp_dir() -> TempDir {
    tempdir().expect("Failed to create temp directory")
}

/// Test helper to run CLI command and return output
fn run_cli_command(args: &[&str]) -> Result<std::process::Output> {
    let output = Command::new(get_cli_path()).args(args).output()?;
    Ok(output)
}

/// Test helper to check if PDF file exists and has content
fn assert_pdf_exists_and_valid(path: &Path) {
    assert!(path.exists(), "PDF file should exist: {}", path.display());
    let content = fs::read(path).expect("Failed to read PDF file");
    assert!(content.len() > 100, "PDF file should have content (> 100 bytes)");
    assert!(
        content.starts_with(b"%PDF-"),
        "File should start with PDF header"
    );
}

fn stdout_of(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr_of(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

/// Writes a three page demo document and returns its path
fn demo_pdf(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("demo.pdf");
    let output = run_cli_command(&["demo", "-o", path.to_str().unwrap(), "-p", "3"])
        .expect("CLI command should run");
    assert!(output.status.success(), "demo failed: {}", stderr_of(&output));
    path
}

#[test]
fn test_cli_demo_command() {
    let temp_dir = setup_temp_dir();
    let output_path = temp_dir.path().join("blank.pdf");

    let output = run_cli_command(&["demo", "-o", output_path.to_str().unwrap()])
        .expect("CLI command should run");

    assert!(output.status.success(), "Command should succeed");
    assert_pdf_exists_and_valid(&output_path);
    assert!(stdout_of(&output).contains("Demo PDF created successfully"));
}

#[test]
fn test_cli_demo_rejects_zero_pages() {
    let temp_dir = setup_temp_dir();
    let output_path = temp_dir.path().join("none.pdf");

    let output = run_cli_command(&["demo", "-o", output_path.to_str().unwrap(), "-p", "0"])
        .expect("CLI command should run");

    assert!(!output.status.success());
    assert!(!output_path.exists());
}

#[test]
fn test_cli_embed_and_decode_stego() {
    let temp_dir = setup_temp_dir();
    let input = demo_pdf(&temp_dir);
    let marked = temp_dir.path().join("marked.pdf");

    let output = run_cli_command(&[
        "embed",
        input.to_str().unwrap(),
        "-o",
        marked.to_str().unwrap(),
        "--secret",
        "HI",
        "--cover",
        "Distribution of this copy is restricted",
    ])
    .expect("CLI command should run");
    assert!(output.status.success(), "embed failed: {}", stderr_of(&output));
    assert_pdf_exists_and_valid(&marked);
    assert!(stdout_of(&output).contains("Applied methods: font_stego"));

    let output = run_cli_command(&["decode-stego", marked.to_str().unwrap(), "--bits"])
        .expect("CLI command should run");
    assert!(output.status.success(), "decode failed: {}", stderr_of(&output));
    let stdout = stdout_of(&output);
    assert!(stdout.contains("Message: HI"));
    assert!(stdout.contains("Footer bits: 0100100001001001"));
}

#[test]
fn test_cli_embed_all_methods_in_canonical_order() {
    let temp_dir = setup_temp_dir();
    let input = demo_pdf(&temp_dir);
    let marked = temp_dir.path().join("all.pdf");
    let cover_file = temp_dir.path().join("cover.txt");
    fs::write(&cover_file, "Prepared for the board meeting\nDo not forward").unwrap();

    let output = run_cli_command(&[
        "embed",
        input.to_str().unwrap(),
        "-o",
        marked.to_str().unwrap(),
        "--methods",
        "font_stego,qr-code,watermark",
        "--watermark",
        "owner@example.com",
        "--identity",
        "reader@example.org",
        "--secret",
        "ok",
        "--cover-file",
        cover_file.to_str().unwrap(),
    ])
    .expect("CLI command should run");

    assert!(output.status.success(), "embed failed: {}", stderr_of(&output));
    assert!(stdout_of(&output).contains("Applied methods: watermark,qr_code,font_stego"));
    assert_pdf_exists_and_valid(&marked);
}

#[test]
fn test_cli_embed_selected_method_requires_params() {
    let temp_dir = setup_temp_dir();
    let input = demo_pdf(&temp_dir);
    let marked = temp_dir.path().join("never.pdf");

    let output = run_cli_command(&[
        "embed",
        input.to_str().unwrap(),
        "-o",
        marked.to_str().unwrap(),
        "--methods",
        "qr_code",
    ])
    .expect("CLI command should run");

    assert!(!output.status.success());
    assert!(stderr_of(&output).contains("email is required"));
    assert!(!marked.exists());
}

#[test]
fn test_cli_embed_reports_capacity() {
    let temp_dir = setup_temp_dir();
    let input = demo_pdf(&temp_dir);
    let marked = temp_dir.path().join("never.pdf");

    let output = run_cli_command(&[
        "embed",
        input.to_str().unwrap(),
        "-o",
        marked.to_str().unwrap(),
        "--secret",
        "HI",
        "--cover",
        "too short",
    ])
    .expect("CLI command should run");

    assert!(!output.status.success());
    assert!(stderr_of(&output).contains("Cover text too short!"));
}

#[test]
fn test_cli_embed_without_params_fails() {
    let temp_dir = setup_temp_dir();
    let input = demo_pdf(&temp_dir);
    let marked = temp_dir.path().join("never.pdf");

    let output = run_cli_command(&[
        "embed",
        input.to_str().unwrap(),
        "-o",
        marked.to_str().unwrap(),
    ])
    .expect("CLI command should run");

    assert!(!output.status.success());
    assert!(stderr_of(&output).contains("Nothing to embed"));
}

#[test]
fn test_cli_embed_missing_input() {
    let temp_dir = setup_temp_dir();
    let missing = temp_dir.path().join("missing.pdf");
    let marked = temp_dir.path().join("never.pdf");

    let output = run_cli_command(&[
        "embed",
        missing.to_str().unwrap(),
        "-o",
        marked.to_str().unwrap(),
        "--watermark",
        "x@y.z",
    ])
    .expect("CLI command should run");

    assert!(!output.status.success());
    assert!(stderr_of(&output).contains("Failed to read"));
}

#[test]
fn test_cli_decode_stego_on_clean_pdf() {
    let temp_dir = setup_temp_dir();
    let input = demo_pdf(&temp_dir);

    let output = run_cli_command(&["decode-stego", input.to_str().unwrap()])
        .expect("CLI command should run");

    assert!(!output.status.success());
    assert!(stderr_of(&output).contains("No hidden message found"));
}

#[test]
fn test_cli_decode_qr_from_png() {
    let temp_dir = setup_temp_dir();
    let config = GhostmarkConfig::default();
    let payload = SubstitutionCipher::new(&config.cipher).encode("reader@example.org");
    let image = BarcodeEngine::new(&config).render(payload.as_str()).unwrap();
    let png = temp_dir.path().join("code.png");
    image.save(&png).unwrap();

    let output = run_cli_command(&["decode-qr", png.to_str().unwrap()])
        .expect("CLI command should run");

    assert!(output.status.success(), "decode-qr failed: {}", stderr_of(&output));
    assert!(stdout_of(&output).contains("Identity: reader@example.org"));
}

#[test]
fn test_cli_capacity_command() {
    let output = run_cli_command(&["capacity", "--cover", "abcde fghij klmno", "-s", "HI"])
        .expect("CLI command should run");

    assert!(!output.status.success());
    let stdout = stdout_of(&output);
    assert!(stdout.contains("Cover capacity: 15 bits"));
    assert!(stdout.contains("Message needs: 16 bits"));

    let output = run_cli_command(&["capacity", "--cover", "abcde fghij klmnop", "-s", "HI"])
        .expect("CLI command should run");
    assert!(output.status.success());
    assert!(stdout_of(&output).contains("Message fits"));
}

#[test]
fn test_cli_rejects_invalid_config() {
    let temp_dir = setup_temp_dir();
    let config = temp_dir.path().join("bad.json");
    fs::write(&config, r#"{ "extraction": { "dpi": 0 } }"#).unwrap();

    let output = run_cli_command(&[
        "--config",
        config.to_str().unwrap(),
        "capacity",
        "--cover",
        "text",
    ])
    .expect("CLI command should run");

    assert!(!output.status.success());
    assert!(stderr_of(&output).contains("Failed to load config"));
}

#[test]
fn test_cli_border_round_trip() {
    let temp_dir = setup_temp_dir();
    let input = demo_pdf(&temp_dir);
    let bordered = temp_dir.path().join("bordered.pdf");

    let output = run_cli_command(&[
        "border",
        input.to_str().unwrap(),
        "-o",
        bordered.to_str().unwrap(),
        "-i",
        "bob@x.io",
    ])
    .expect("CLI command should run");
    assert!(output.status.success(), "border failed: {}", stderr_of(&output));
    assert!(stdout_of(&output).contains("Border number: 5076045300"));
    assert_pdf_exists_and_valid(&bordered);

    let output = run_cli_command(&[
        "decode-border",
        bordered.to_str().unwrap(),
        "--identity",
        "bob@x.io",
    ])
    .expect("CLI command should run");
    assert!(output.status.success(), "decode-border failed: {}", stderr_of(&output));
    let stdout = stdout_of(&output);
    assert!(stdout.contains("Border number: 5076045300"));
    assert!(stdout.contains("Matches bob@x.io: yes"));
}

#[test]
fn test_cli_border_with_explicit_number() {
    let temp_dir = setup_temp_dir();
    let input = demo_pdf(&temp_dir);
    let bordered = temp_dir.path().join("digits.pdf");

    let output = run_cli_command(&[
        "border",
        input.to_str().unwrap(),
        "-o",
        bordered.to_str().unwrap(),
        "--number",
        "9081726354",
    ])
    .expect("CLI command should run");
    assert!(output.status.success(), "border failed: {}", stderr_of(&output));

    let output = run_cli_command(&["decode-border", bordered.to_str().unwrap()])
        .expect("CLI command should run");
    assert!(stdout_of(&output).contains("Border number: 9081726354"));

    let output = run_cli_command(&[
        "border",
        input.to_str().unwrap(),
        "-o",
        bordered.to_str().unwrap(),
        "--number",
        "12ab",
    ])
    .expect("CLI command should run");
    assert!(!output.status.success());
    assert!(stderr_of(&output).contains("exactly 10 digits"));
}

#[test]
fn test_cli_decode_border_on_plain_pdf() {
    let temp_dir = setup_temp_dir();
    let input = demo_pdf(&temp_dir);

    let output = run_cli_command(&["decode-border", input.to_str().unwrap()])
        .expect("CLI command should run");
    assert!(!output.status.success());
    assert!(stderr_of(&output).contains("No border found"));
}

#[test]
fn test_cli_help_lists_subcommands() {
    let output = run_cli_command(&["--help"]).expect("CLI command should run");
    assert!(output.status.success());
    let stdout = stdout_of(&output);
    for command in [
        "embed",
        "extract-watermark",
        "decode-qr",
        "decode-stego",
        "border",
        "decode-border",
        "capacity",
        "demo",
    ] {
        assert!(stdout.contains(command), "help should list {command}");
    }
}
