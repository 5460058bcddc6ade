use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use tempfile::tempdir;

fn pot_create() -> &'static str {
    env!("CARGO_BIN_EXE_pot-create")
}

fn polint() -> &'static str {
    env!("CARGO_BIN_EXE_polint")
}

fn run<P: AsRef<Path>>(bin: &str, cwd: P, args: &[&str]) -> Output {
    Command::new(bin)
        .current_dir(cwd)
        .args(args)
        .output()
        .expect("failed to run binary")
}

fn describe(output: &Output) -> String {
    format!(
        "status: {:?}\nstdout: {}\nstderr: {}",
        output.status.code(),
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    )
}

fn write_sources(root: &Path) {
    fs::write(root.join("a.py"), "import os\n\nprint(_('Hello'))\n").unwrap();
    fs::write(root.join("b.py"), "\n\n\n\n\n\n\n\n_('Hello')\n").unwrap();
}

#[test]
fn extract_merges_occurrences_into_one_entry() {
    let tmp = tempdir().unwrap();
    let project = tmp.path();
    write_sources(project);

    let output = run(pot_create(), project, &["-o", "out.pot", "a.py", "b.py"]);
    assert!(output.status.success(), "{}", describe(&output));

    let pot = fs::read_to_string(project.join("out.pot")).unwrap();
    assert!(pot.contains("#: a.py:3 b.py:9"), "{}", pot);
    assert_eq!(pot.matches("msgid \"Hello\"").count(), 1);
    assert!(pot.contains("Generated-By: msgscan"), "{}", pot);
}

#[test]
fn second_run_leaves_catalog_alone() {
    let tmp = tempdir().unwrap();
    let project = tmp.path();
    write_sources(project);

    let first = run(pot_create(), project, &["-o", "out.pot", "a.py", "b.py"]);
    assert!(first.status.success(), "{}", describe(&first));
    let written = fs::read_to_string(project.join("out.pot")).unwrap();

    let second = run(pot_create(), project, &["-o", "out.pot", "a.py", "b.py"]);
    assert!(second.status.success(), "{}", describe(&second));
    assert!(
        String::from_utf8_lossy(&second.stdout).contains("Catalog unchanged"),
        "{}",
        describe(&second)
    );
    assert_eq!(fs::read_to_string(project.join("out.pot")).unwrap(), written);
}

#[test]
fn no_location_option() {
    let tmp = tempdir().unwrap();
    let project = tmp.path();
    write_sources(project);

    let output = run(
        pot_create(),
        project,
        &["--no-location", "-o", "out.pot", "a.py", "b.py"],
    );
    assert!(output.status.success(), "{}", describe(&output));
    let pot = fs::read_to_string(project.join("out.pot")).unwrap();
    assert!(!pot.contains("#: "), "{}", pot);
    assert!(pot.contains("msgid \"Hello\""));
}

#[test]
fn header_options_end_up_in_catalog() {
    let tmp = tempdir().unwrap();
    let project = tmp.path();
    write_sources(project);

    let output = run(
        pot_create(),
        project,
        &[
            "--package-name",
            "Shop",
            "--package-version",
            "2.1",
            "--msgid-bugs-address",
            "bugs@example.com",
            "--copyright-holder",
            "Example Inc.",
            "-o",
            "out.pot",
            "a.py",
        ],
    );
    assert!(output.status.success(), "{}", describe(&output));
    let pot = fs::read_to_string(project.join("out.pot")).unwrap();
    assert!(pot.starts_with("# Translations template for Shop."), "{}", pot);
    assert!(pot.contains("Example Inc."), "{}", pot);
    assert!(pot.contains("Project-Id-Version: Shop 2.1"), "{}", pot);
    assert!(pot.contains("Report-Msgid-Bugs-To: bugs@example.com"), "{}", pot);
}

#[test]
fn config_file_adds_keywords() {
    let tmp = tempdir().unwrap();
    let project = tmp.path();
    fs::write(project.join("app.py"), "tr('Via config')\n").unwrap();
    fs::write(project.join("msgscan.json"), "{ keywords: ['tr'] }\n").unwrap();

    let output = run(pot_create(), project, &["-o", "out.pot", "app.py"]);
    assert!(output.status.success(), "{}", describe(&output));
    let pot = fs::read_to_string(project.join("out.pot")).unwrap();
    assert!(pot.contains("msgid \"Via config\""), "{}", pot);
}

#[test]
fn no_messages_exits_with_two() {
    let tmp = tempdir().unwrap();
    let project = tmp.path();
    fs::write(project.join("empty.py"), "print('plain')\n").unwrap();

    let output = run(pot_create(), project, &["-o", "out.pot", "empty.py"]);
    assert_eq!(output.status.code(), Some(2), "{}", describe(&output));
    assert!(String::from_utf8_lossy(&output.stderr).contains("No translatable strings found"));
    assert!(!project.join("out.pot").exists());
}

#[test]
fn no_inputs_exits_with_one() {
    let tmp = tempdir().unwrap();
    let output = run(pot_create(), tmp.path(), &["-o", "out.pot"]);
    assert_eq!(output.status.code(), Some(1), "{}", describe(&output));
    assert!(String::from_utf8_lossy(&output.stderr).contains("No files scanned"));
}

#[test]
fn missing_input_fails() {
    let tmp = tempdir().unwrap();
    let output = run(pot_create(), tmp.path(), &["-o", "out.pot", "missing.py"]);
    assert_eq!(output.status.code(), Some(1), "{}", describe(&output));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Can not find file missing.py"));
}

#[test]
fn parse_error_aborts_without_writing() {
    let tmp = tempdir().unwrap();
    let project = tmp.path();
    fs::write(project.join("broken.py"), "_('never closed'\n").unwrap();

    let output = run(pot_create(), project, &["-o", "out.pot", "broken.py"]);
    assert_eq!(output.status.code(), Some(1), "{}", describe(&output));
    assert!(!project.join("out.pot").exists());
}

#[test]
fn polint_reports_shared_translation() {
    let tmp = tempdir().unwrap();
    let project = tmp.path();
    fs::write(
        project.join("de.po"),
        "msgid \"\"\nmsgstr \"\"\n\"Content-Type: text/plain; charset=UTF-8\\n\"\n\n\
         msgid \"Open\"\nmsgstr \"Öffnen\"\n\n\
         msgid \"Open file\"\nmsgstr \"Öffnen\"\n",
    )
    .unwrap();

    let output = run(polint(), project, &["de.po"]);
    assert!(output.status.success(), "{}", describe(&output));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Translation:"), "{}", stdout);
    assert!(stdout.contains("Used for 2 canonical texts:"), "{}", stdout);
}
