use assert_cmd::Command;
use predicates::prelude::*;
use predicates::str::{contains, diff};

fn lc3() -> Command {
    Command::cargo_bin("lc3").unwrap()
}

#[test]
fn no_arguments_prints_usage() {
    lc3().assert().code(2).stderr(contains("Usage"));
}

#[test]
fn runs_hello_world() {
    lc3()
        .arg("tests/files/hello.obj")
        .assert()
        .success()
        .stdout(diff("Hello, world!\nHALT\n"))
        .stderr(contains("Halted"));
}

#[test]
fn quiet_suppresses_status() {
    lc3()
        .arg("--quiet")
        .arg("tests/files/hello.obj")
        .assert()
        .success()
        .stdout(diff("Hello, world!\nHALT\n"))
        .stderr(diff(""));
}

#[test]
fn reads_piped_input() {
    lc3()
        .arg("--quiet")
        .arg("tests/files/echo.obj")
        .write_stdin("ok")
        .assert()
        .success()
        .stdout(diff("okHALT\n"));
}

#[test]
fn missing_input_is_a_fault() {
    lc3()
        .arg("tests/files/echo.obj")
        .write_stdin("o")
        .assert()
        .code(1)
        .stdout(contains("o"))
        .stderr(contains("console"));
}

#[test]
fn later_images_overwrite_earlier_ones() {
    lc3()
        .arg("-q")
        .arg("tests/files/halt.obj")
        .arg("tests/files/print_a.obj")
        .assert()
        .success()
        .stdout(diff("AHALT\n"));

    lc3()
        .arg("-q")
        .arg("tests/files/print_a.obj")
        .arg("tests/files/halt.obj")
        .assert()
        .success()
        .stdout(diff("HALT\n"));
}

#[test]
fn missing_image_names_file() {
    lc3()
        .arg("tests/files/hello.obj")
        .arg("tests/files/missing.obj")
        .assert()
        .code(1)
        .stdout(diff(""))
        .stderr(contains("missing.obj"));
}

#[test]
fn unaligned_image_fails_before_running() {
    lc3()
        .arg("tests/files/odd.obj")
        .assert()
        .code(1)
        .stderr(contains("odd.obj"))
        .stderr(contains("Running").not());
}

#[test]
fn reserved_opcode_fails() {
    lc3()
        .arg("tests/files/reserved.obj")
        .assert()
        .code(1)
        .stderr(contains("reserved opcode"));
}

#[test]
fn traces_instructions() {
    lc3()
        .arg("--trace")
        .arg("tests/files/halt.obj")
        .assert()
        .success()
        .stderr(contains("x3000"))
        .stderr(contains("TRAP"));
}

#[test]
fn traces_from_environment() {
    lc3()
        .env("LC3_TRACE", "1")
        .arg("tests/files/halt.obj")
        .assert()
        .success()
        .stderr(contains("x3000"))
        .stderr(contains("TRAP"));

    lc3()
        .env("LC3_TRACE", "0")
        .arg("tests/files/halt.obj")
        .assert()
        .success()
        .stderr(contains("TRAP").not());
}

#[test]
fn polls_keyboard_from_piped_input() {
    lc3()
        .arg("-q")
        .arg("tests/files/keyboard.obj")
        .write_stdin("z")
        .assert()
        .success()
        .stdout(diff("zHALT\n"));
}
