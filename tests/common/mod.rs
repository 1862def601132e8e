use assert_cmd::{Command, cargo::cargo_bin_cmd};
use std::path::Path;
use std::process::Output;

pub const MANIFEST: &str = ".dirsum.toml";

pub fn dirsum_cmd(cwd: &Path) -> Command {
    let mut cmd = cargo_bin_cmd!("dirsum");
    cmd.arg("-C").arg(cwd);
    cmd
}

pub fn update(cwd: &Path) {
    dirsum_cmd(cwd).arg("update").assert().success();
}

// Each integration test file is compiled as its own crate, and not all of them
// look at status output.
#[allow(dead_code)]
pub fn status_output(cwd: &Path, args: &[&str]) -> Output {
    let mut cmd = dirsum_cmd(cwd);
    cmd.arg("status").args(args);
    cmd.output().expect("failed to run `dirsum status`")
}

#[allow(dead_code)]
pub fn stdout_lines(output: &Output) -> Vec<String> {
    std::str::from_utf8(&output.stdout)
        .expect("stdout should be UTF-8")
        .lines()
        .map(str::to_string)
        .collect()
}
