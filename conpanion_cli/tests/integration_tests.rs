//! Integration tests for the conpanion binary.
//!
//! These tests verify end-to-end behavior including:
//! - Profile, goal and food diary commands
//! - Plan management and live workouts
//! - History listing and CSV export
//! - Inline error reporting

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Helper to create a test data directory
fn setup_test_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

/// CLI bound to a data dir and an isolated config dir, acting as `user`
fn cli_as(dir: &Path, user: &str) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("conpanion"));
    cmd.env("XDG_CONFIG_HOME", dir.join("config"))
        .env_remove("RUST_LOG")
        .arg("--data-dir")
        .arg(dir.join("data"))
        .arg("--user")
        .arg(user);
    cmd
}

fn cli(dir: &Path) -> Command {
    cli_as(dir, "u1")
}

fn stdout_of(cmd: &mut Command) -> String {
    let output = cmd.assert().success().get_output().stdout.clone();
    String::from_utf8(output).expect("stdout is UTF-8")
}

/// Value after "Id: " or "Selection: " in command output
fn extract_after(output: &str, label: &str) -> String {
    output
        .lines()
        .find_map(|line| line.trim().strip_prefix(label))
        .unwrap_or_else(|| panic!("no '{}' in output:\n{}", label, output))
        .trim()
        .to_string()
}

fn read_collection(dir: &Path, name: &str) -> serde_json::Map<String, serde_json::Value> {
    let contents = fs::read_to_string(dir.join("data").join(format!("{}.json", name)))
        .expect("collection file exists");
    serde_json::from_str(&contents).expect("collection is valid JSON")
}

fn create_push_plan(dir: &Path) -> String {
    let output = stdout_of(
        cli(dir)
            .args(["plan", "create", "Push"])
            .args(["--exercise", "Bench Press:2x8@60"])
            .args(["--exercise", "Dips:1x12"]),
    );
    extract_after(&output, "Id:")
}

#[test]
fn test_cli_help() {
    Command::new(assert_cmd::cargo::cargo_bin!("conpanion"))
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Fitness and nutrition companion"));
}

#[test]
fn test_seed_is_idempotent() {
    let temp_dir = setup_test_dir();
    let dir = temp_dir.path();

    cli(dir)
        .arg("seed")
        .assert()
        .success()
        .stdout(predicate::str::contains("Added 12 foods"));
    cli(dir)
        .arg("seed")
        .assert()
        .success()
        .stdout(predicate::str::contains("Added 0 foods"));

    cli(dir)
        .args(["food", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Chicken Breast"));
}

#[test]
fn test_profile_drives_goal_calories() {
    let temp_dir = setup_test_dir();
    let dir = temp_dir.path();

    cli(dir)
        .args(["profile", "set", "--age", "30", "--height", "180"])
        .args(["--gender", "male", "--activity", "moderate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("complete your profile"));

    cli(dir)
        .args(["profile", "weight", "80"])
        .assert()
        .success()
        .stdout(predicate::str::contains("3273 kcal/day"));

    cli(dir)
        .args(["goal", "set", "cut"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2442 kcal/day"));

    cli(dir)
        .args(["profile", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Maintenance: 2873 kcal/day"));
}

#[test]
fn test_invalid_profile_input_reported_inline() {
    let temp_dir = setup_test_dir();
    let dir = temp_dir.path();

    cli(dir)
        .args(["profile", "set", "--age", "thirty", "--height", "180"])
        .args(["--gender", "male", "--activity", "light"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid input"));
}

#[test]
fn test_food_diary_add_edit_remove() {
    let temp_dir = setup_test_dir();
    let dir = temp_dir.path();
    cli(dir).arg("seed").assert().success();

    let added = stdout_of(
        cli(dir)
            .args(["food", "add", "chicken breast", "--grams", "200"])
            .args(["--meal", "lunch", "--date", "2024-05-14"]),
    );
    assert!(added.contains("330 kcal"), "{}", added);
    let selection = extract_after(&added, "Selection:");

    let today = stdout_of(cli(dir).args(["food", "today", "--date", "2024-05-14"]));
    assert!(today.contains("Chicken Breast"));
    assert!(today.contains("Total:  330 kcal"));

    cli(dir)
        .args(["food", "edit", &selection, "--grams", "100", "--date", "2024-05-14"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Lunch"));

    cli(dir)
        .args(["food", "remove", &selection, "--date", "2024-05-14"])
        .assert()
        .success()
        .stdout(predicate::str::contains("165 kcal"));

    let today = stdout_of(cli(dir).args(["food", "today", "--date", "2024-05-14"]));
    assert!(today.contains("Total:  0 kcal"), "{}", today);

    let daily = read_collection(dir, "dailyMacros");
    assert_eq!(daily.len(), 1);
}

#[test]
fn test_remove_from_empty_day_fails() {
    let temp_dir = setup_test_dir();
    let dir = temp_dir.path();

    cli(dir)
        .args(["food", "remove", "nope", "--date", "2024-05-14"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Not found"));
}

#[test]
fn test_unknown_food_fails() {
    let temp_dir = setup_test_dir();
    let dir = temp_dir.path();
    cli(dir).arg("seed").assert().success();

    cli(dir)
        .args(["food", "add", "unicorn steak", "--grams", "100"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Not found: food 'unicorn steak'"));
}

#[test]
fn test_missing_user_is_unauthenticated() {
    let temp_dir = setup_test_dir();
    let dir = temp_dir.path();

    Command::new(assert_cmd::cargo::cargo_bin!("conpanion"))
        .env("XDG_CONFIG_HOME", dir.join("config"))
        .arg("--data-dir")
        .arg(dir.join("data"))
        .args(["goal", "show"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No authenticated user"));

    assert!(!dir.join("data").join("goals.json").exists());
}

#[test]
fn test_user_from_config_file() {
    let temp_dir = setup_test_dir();
    let dir = temp_dir.path();
    let config_dir = dir.join("config").join("conpanion");
    fs::create_dir_all(&config_dir).unwrap();
    fs::write(config_dir.join("config.toml"), "[user]\nid = \"from-config\"\n").unwrap();

    Command::new(assert_cmd::cargo::cargo_bin!("conpanion"))
        .env("XDG_CONFIG_HOME", dir.join("config"))
        .arg("--data-dir")
        .arg(dir.join("data"))
        .args(["goal", "show"])
        .assert()
        .success();

    let goals = read_collection(dir, "goals");
    assert!(goals.contains_key("from-config"));
}

#[test]
fn test_plan_create_list_show_delete() {
    let temp_dir = setup_test_dir();
    let dir = temp_dir.path();
    let id = create_push_plan(dir);

    cli(dir)
        .args(["plan", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2 exercises, 3 sets"));

    cli(dir)
        .args(["plan", "show", &id])
        .assert()
        .success()
        .stdout(predicate::str::contains("Set 2: 8 reps @ 60 kg"));

    // Other users cannot see the plan
    cli_as(dir, "u2")
        .args(["plan", "show", &id])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Not found"));

    cli(dir).args(["plan", "delete", &id]).assert().success();
    cli(dir)
        .args(["plan", "show", &id])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Not found"));
}

#[test]
fn test_bad_exercise_format_rejected() {
    let temp_dir = setup_test_dir();
    let dir = temp_dir.path();

    cli(dir)
        .args(["plan", "create", "Legs", "--exercise", "Squat"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("NAME:SETSxREPS"));
}

#[test]
fn test_auto_workout_saves_session() {
    let temp_dir = setup_test_dir();
    let dir = temp_dir.path();
    cli(dir).args(["profile", "weight", "80"]).assert().success();
    let id = create_push_plan(dir);

    cli(dir)
        .args(["workout", "start", &id, "--auto", "--rest", "5"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Workout saved: Push"))
        .stdout(predicate::str::contains("Sets:     3"));

    let sessions = read_collection(dir, "user_workout_sessions");
    assert_eq!(sessions.len(), 1);
    let record = sessions.values().next().unwrap();
    assert_eq!(record["Plan"], "Push");
    assert_eq!(record["User"], "u1");
    assert_eq!(record["Exercises"][0]["Sets"][0]["Reps"], "8");

    cli(dir)
        .arg("history")
        .assert()
        .success()
        .stdout(predicate::str::contains("Push"));
}

#[test]
fn test_interactive_workout() {
    let temp_dir = setup_test_dir();
    let dir = temp_dir.path();
    let id = create_push_plan(dir);

    cli(dir)
        .args(["workout", "start", &id, "--rest", "90"])
        .write_stdin("6 62.5\n8 60\ns\n+10\n-5\neight 60\n8 60\nf\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Bench Press set 1: 6 reps @ 62.5 kg"))
        .stdout(predicate::str::contains("Invalid state"))
        .stdout(predicate::str::contains("Invalid input"))
        .stdout(predicate::str::contains("Workout saved: Push"));

    // Performed values are written back into the plan
    cli(dir)
        .args(["plan", "show", &id])
        .assert()
        .success()
        .stdout(predicate::str::contains("Set 1: 6 reps @ 62.5 kg"));
}

#[test]
fn test_interactive_quit_saves_nothing() {
    let temp_dir = setup_test_dir();
    let dir = temp_dir.path();
    let id = create_push_plan(dir);

    cli(dir)
        .args(["workout", "start", &id])
        .write_stdin("8 60\nq\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Session abandoned"));

    assert!(!dir.join("data").join("user_workout_sessions.json").exists());
}

#[test]
fn test_workout_with_empty_plan_is_a_no_op() {
    let temp_dir = setup_test_dir();
    let dir = temp_dir.path();
    let output = stdout_of(cli(dir).args(["plan", "create", "Empty"]));
    let id = extract_after(&output, "Id:");

    cli(dir)
        .args(["workout", "start", &id, "--auto"])
        .assert()
        .success()
        .stdout(predicate::str::contains("has no sets"));
}

#[test]
fn test_history_export_csv() {
    let temp_dir = setup_test_dir();
    let dir = temp_dir.path();
    let id = create_push_plan(dir);
    cli(dir)
        .args(["workout", "start", &id, "--auto"])
        .assert()
        .success();

    let export = dir.join("export").join("sessions.csv");
    cli(dir)
        .arg("history")
        .arg("--export")
        .arg(&export)
        .assert()
        .success()
        .stdout(predicate::str::contains("Exported 3 sets"));

    let contents = fs::read_to_string(&export).unwrap();
    assert!(contents.starts_with("performed_at,plan,exercise,set_number"));
    assert_eq!(contents.lines().count(), 4);
    assert!(contents.contains("Dips"));
}

#[test]
fn test_progress_log_and_show() {
    let temp_dir = setup_test_dir();
    let dir = temp_dir.path();

    cli(dir)
        .args(["progress", "log", "81.5", "--photo", "https://example.com/p.jpg"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Recorded 81.5 kg"));

    cli(dir)
        .args(["progress", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("https://example.com/p.jpg"));

    cli(dir)
        .args(["profile", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("81.5 kg"));
}
