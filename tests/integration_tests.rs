//! Integration tests for upscale-pipeline
//!
//! These tests drive the binary end to end against temporary project
//! directories, with the lanczos backend so no external tools are needed.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use image::{Rgba, RgbaImage};
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Helper to create an upscale-pipeline Command
fn pipeline() -> Command {
    cargo_bin_cmd!("upscale-pipeline")
}

/// Helper to create a temporary project directory
fn create_temp_project() -> TempDir {
    TempDir::new().unwrap()
}

/// Project configured for the built-in lanczos enhancer at 2x.
fn create_lanczos_project() -> TempDir {
    let dir = create_temp_project();
    fs::create_dir_all(dir.path().join(".pipeline")).unwrap();
    fs::write(
        dir.path().join(".pipeline/config.toml"),
        "[upscale]\nbackend = \"lanczos\"\nscale = 2\n",
    )
    .unwrap();
    dir
}

fn seed_state(dir: &TempDir, entries: &[(&str, &str)]) {
    let state: serde_json::Map<String, serde_json::Value> = entries
        .iter()
        .map(|(k, v)| (k.to_string(), serde_json::Value::String(v.to_string())))
        .collect();
    fs::create_dir_all(dir.path().join(".pipeline")).unwrap();
    fs::write(
        dir.path().join(".pipeline/state.json"),
        serde_json::to_string_pretty(&state).unwrap(),
    )
    .unwrap();
}

fn read_state(dir: &TempDir) -> serde_json::Map<String, serde_json::Value> {
    let content = fs::read_to_string(dir.path().join(".pipeline/state.json")).unwrap();
    serde_json::from_str(&content).unwrap()
}

fn write_png(path: &Path, img: &RgbaImage) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    img.save(path).unwrap();
}

fn seed_textures(dir: &TempDir) {
    let textures = dir.path().join("files/temp/20_convert/textures");
    let mut sprite = RgbaImage::from_pixel(4, 4, Rgba([255, 0, 255, 0]));
    sprite.put_pixel(1, 1, Rgba([180, 60, 20, 255]));
    sprite.put_pixel(2, 2, Rgba([180, 60, 20, 128]));
    write_png(&textures.join("0001.png"), &sprite);
    write_png(
        &textures.join("0002.png"),
        &RgbaImage::from_pixel(3, 2, Rgba([10, 20, 30, 255])),
    );
}

const CHAIN_UPSTREAM: [(&str, &str); 3] = [
    ("game_files", "completed"),
    ("extract", "completed"),
    ("convert", "completed"),
];

// =============================================================================
// Basic CLI Tests
// =============================================================================

mod cli_basics {
    use super::*;

    #[test]
    fn test_pipeline_help() {
        pipeline()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("run"));
    }

    #[test]
    fn test_pipeline_version() {
        pipeline().arg("--version").assert().success();
    }

    #[test]
    fn test_list_shows_all_phases_in_order() {
        pipeline()
            .arg("list")
            .assert()
            .success()
            .stdout(predicate::str::contains("alpha_upscale"))
            .stdout(predicate::str::contains("generate_mod"))
            .stdout(predicate::str::contains("11 phases"));
    }

    #[test]
    fn test_unknown_subcommand_fails() {
        pipeline().arg("sharpen").assert().failure();
    }
}

// =============================================================================
// Status and Reset Tests
// =============================================================================

mod status_and_reset {
    use super::*;

    #[test]
    fn test_status_without_state() {
        let dir = create_temp_project();

        pipeline()
            .current_dir(dir.path())
            .arg("status")
            .assert()
            .success()
            .stdout(predicate::str::contains("0 of 11 phases completed"))
            .stdout(predicate::str::contains("not_run"));
    }

    #[test]
    fn test_status_reports_recorded_statuses() {
        let dir = create_temp_project();
        seed_state(
            &dir,
            &[("premultiply", "completed"), ("verify", "failed: pink halo")],
        );

        pipeline()
            .current_dir(dir.path())
            .arg("status")
            .assert()
            .success()
            .stdout(predicate::str::contains("1 of 11 phases completed"))
            .stdout(predicate::str::contains("failed: pink halo"));
    }

    #[test]
    fn test_reset_single_phase() {
        let dir = create_temp_project();
        seed_state(&dir, &[("premultiply", "completed"), ("upscale", "completed")]);

        pipeline()
            .current_dir(dir.path())
            .args(["reset", "upscale", "--force"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Reset upscale"));

        let state = read_state(&dir);
        assert!(!state.contains_key("upscale"));
        assert_eq!(state["premultiply"], "completed");
    }

    #[test]
    fn test_reset_phase_without_status() {
        let dir = create_temp_project();
        seed_state(&dir, &[("premultiply", "completed")]);

        pipeline()
            .current_dir(dir.path())
            .args(["reset", "scrub", "--force"])
            .assert()
            .success()
            .stdout(predicate::str::contains("scrub had no recorded status"));
    }

    #[test]
    fn test_reset_all() {
        let dir = create_temp_project();
        seed_state(&dir, &[("premultiply", "completed"), ("upscale", "completed")]);

        pipeline()
            .current_dir(dir.path())
            .args(["reset", "--all", "--force"])
            .assert()
            .success();

        assert!(read_state(&dir).is_empty());
    }

    #[test]
    fn test_reset_unknown_phase_fails() {
        let dir = create_temp_project();

        pipeline()
            .current_dir(dir.path())
            .args(["reset", "sharpen", "--force"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid phase 'sharpen'"));
    }

    #[test]
    fn test_reset_requires_phases_or_all() {
        let dir = create_temp_project();

        pipeline()
            .current_dir(dir.path())
            .args(["reset", "--force"])
            .assert()
            .failure();
    }
}

// =============================================================================
// Configuration Tests
// =============================================================================

mod configuration {
    use super::*;

    #[test]
    fn test_config_show_defaults() {
        let dir = create_temp_project();

        pipeline()
            .current_dir(dir.path())
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("No config.toml found"))
            .stdout(predicate::str::contains("[upscale]"));
    }

    #[test]
    fn test_config_init_creates_toml() {
        let dir = create_temp_project();

        pipeline()
            .current_dir(dir.path())
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Created config.toml"));

        assert!(dir.path().join(".pipeline/config.toml").exists());

        pipeline()
            .current_dir(dir.path())
            .args(["config", "validate"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Configuration is valid"));
    }

    #[test]
    fn test_config_validate_no_config() {
        let dir = create_temp_project();

        pipeline()
            .current_dir(dir.path())
            .args(["config", "validate"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Configuration is valid"));
    }

    #[test]
    fn test_config_validate_rejects_unknown_key() {
        let dir = create_temp_project();
        fs::create_dir_all(dir.path().join(".pipeline")).unwrap();
        fs::write(
            dir.path().join(".pipeline/config.toml"),
            "[upscale]\nsharpness = 3\n",
        )
        .unwrap();

        pipeline()
            .current_dir(dir.path())
            .args(["config", "validate"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("sharpness"));
    }

    #[test]
    fn test_config_validate_rejects_zero_scale() {
        let dir = create_temp_project();
        fs::create_dir_all(dir.path().join(".pipeline")).unwrap();
        fs::write(
            dir.path().join(".pipeline/config.toml"),
            "[upscale]\nscale = 0\n",
        )
        .unwrap();

        pipeline()
            .current_dir(dir.path())
            .args(["config", "validate"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("upscale.scale"));
    }

    #[test]
    fn test_config_flag_overrides_location() {
        let dir = create_temp_project();
        let custom = dir.path().join("custom.toml");
        fs::write(&custom, "[upscale]\nbackend = \"lanczos\"\nscale = 2\n").unwrap();

        pipeline()
            .current_dir(dir.path())
            .arg("--config")
            .arg(&custom)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("backend = \"lanczos\""));
    }
}

// =============================================================================
// Run Tests
// =============================================================================

mod run {
    use super::*;

    #[test]
    fn test_run_rejects_unmet_dependencies() {
        let dir = create_lanczos_project();

        pipeline()
            .current_dir(dir.path())
            .args(["run", "recombine"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("upscale"))
            .stderr(predicate::str::contains("alpha_upscale"));

        let state =
            fs::read_to_string(dir.path().join(".pipeline/state.json")).unwrap_or_default();
        assert!(!state.contains("recombine"));
    }

    #[test]
    fn test_run_unknown_phase_fails() {
        let dir = create_lanczos_project();

        pipeline()
            .current_dir(dir.path())
            .args(["run", "sharpen"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("sharpen"));
    }

    #[test]
    fn test_dry_run_marks_every_phase() {
        let dir = create_lanczos_project();

        pipeline()
            .current_dir(dir.path())
            .args(["run", "--dry-run"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Dry run: 11 phase(s) marked completed"));

        let state = read_state(&dir);
        assert_eq!(state.len(), 11);
        assert!(state.values().all(|v| v == "completed"));
        assert!(dir.path().join("files/temp/workflow_summary.json").is_file());
        assert!(!dir.path().join("files/output/mod/manifest.json").exists());
    }

    #[test]
    fn test_full_alpha_chain() {
        let dir = create_lanczos_project();
        seed_state(&dir, &CHAIN_UPSTREAM);
        seed_textures(&dir);

        pipeline()
            .current_dir(dir.path())
            .arg("run")
            .assert()
            .success()
            .stdout(predicate::str::contains("8 phase(s) executed, 3 skipped"));

        let state = read_state(&dir);
        assert!(state.values().all(|v| v == "completed"));

        let scrubbed =
            image::open(dir.path().join("files/output/32_scrub/textures/0001.png")).unwrap();
        assert_eq!((scrubbed.width(), scrubbed.height()), (8, 8));
        assert!(
            dir.path()
                .join("files/output/mod/hightile/textures/0002.png")
                .is_file()
        );

        let summary: serde_json::Value = serde_json::from_str(
            &fs::read_to_string(dir.path().join("files/temp/workflow_summary.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(summary["phases"]["generate_mod"], "completed");
        assert_eq!(summary["outcomes"]["convert"], "skipped");
    }

    #[test]
    fn test_verify_failure_then_resume() {
        let dir = create_lanczos_project();
        let mut upstream = CHAIN_UPSTREAM.to_vec();
        upstream.extend([
            ("premultiply", "completed"),
            ("alpha_split", "completed"),
            ("alpha_upscale", "completed"),
            ("upscale", "completed"),
            ("recombine", "completed"),
        ]);
        seed_state(&dir, &upstream);
        let halo = dir.path().join("files/temp/31_reattach/textures/halo.png");
        write_png(&halo, &RgbaImage::from_pixel(2, 2, Rgba([255, 0, 255, 0])));

        pipeline()
            .current_dir(dir.path())
            .arg("run")
            .assert()
            .failure()
            .stderr(predicate::str::contains("Pink artifacts"));

        let state = read_state(&dir);
        assert!(state["verify"].as_str().unwrap().starts_with("failed: "));
        assert!(!state.contains_key("scrub"));

        write_png(&halo, &RgbaImage::from_pixel(2, 2, Rgba([0, 0, 0, 0])));

        pipeline()
            .current_dir(dir.path())
            .arg("run")
            .assert()
            .success()
            .stdout(predicate::str::contains("3 phase(s) executed, 8 skipped"));

        let state = read_state(&dir);
        assert_eq!(state["verify"], "completed");
        assert_eq!(state["generate_mod"], "completed");
    }

    #[test]
    fn test_completed_phase_is_skipped_unless_rerun() {
        let dir = create_lanczos_project();
        seed_state(&dir, &CHAIN_UPSTREAM);
        seed_textures(&dir);

        pipeline()
            .current_dir(dir.path())
            .args(["run", "premultiply"])
            .assert()
            .success()
            .stdout(predicate::str::contains("1 phase(s) executed, 0 skipped"));

        pipeline()
            .current_dir(dir.path())
            .args(["run", "premultiply"])
            .assert()
            .success()
            .stdout(predicate::str::contains("0 phase(s) executed, 1 skipped"));

        pipeline()
            .current_dir(dir.path())
            .args(["run", "premultiply", "--rerun"])
            .assert()
            .success()
            .stdout(predicate::str::contains("1 phase(s) executed, 0 skipped"));
    }
}
