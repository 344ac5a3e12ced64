use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use golden_core::{TranspileOptions, compile_path, install_runtime};
use log::{LevelFilter, info, warn};

/// Translate a Go program into Odin with explicit memory management.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// A `.go` file, or a directory whose `main` package files are merged.
    input: PathBuf,

    /// Directory receiving `main.odin` and the `golden` runtime package.
    #[arg(default_value = "out")]
    output: PathBuf,

    #[arg(
        long,
        value_name = "PATH",
        help = "Path to the golden runtime sources (defaults to the bundled runtime)"
    )]
    runtime: Option<PathBuf>,

    #[arg(long, value_name = "N", help = "Worker threads started for goroutines")]
    workers: Option<usize>,

    #[arg(long, help = "Do not wrap main in the leak-checking allocator")]
    no_leak_check: bool,

    #[arg(short, long, action = clap::ArgAction::Count, help = "Raise log verbosity (-v, -vv)")]
    verbose: u8,

    #[arg(long, help = "Print the translation instead of writing files")]
    stdout: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    execute(cli)
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp(None)
        .init();
}

fn execute(cli: Cli) -> Result<()> {
    let defaults = TranspileOptions::default();
    let options = TranspileOptions {
        leak_check: !cli.no_leak_check,
        worker_threads: cli.workers.unwrap_or(defaults.worker_threads),
        runtime_root: cli.runtime.unwrap_or(defaults.runtime_root),
    };

    let artifact = compile_path(&cli.input, &options)
        .with_context(|| format!("failed to translate {}", cli.input.display()))?;

    if cli.stdout {
        print!("{}", artifact.odin);
        return Ok(());
    }

    let main_path = write_output(&cli.output, &artifact.odin)?;
    info!(
        "wrote {} from {} source file(s)",
        main_path.display(),
        artifact.sources.len()
    );

    // The translation is usable without the runtime copy, so a missing
    // runtime only warns.
    match install_runtime(&options.runtime_root, &cli.output) {
        Ok(written) => info!("installed {} runtime file(s)", written.len()),
        Err(err) => warn!("could not install the golden runtime: {err}"),
    }

    println!("Generated {}", main_path.display());
    Ok(())
}

fn write_output(dir: &Path, odin: &str) -> Result<PathBuf> {
    fs::create_dir_all(dir)
        .with_context(|| format!("failed to create directory {}", dir.display()))?;
    let path = dir.join("main.odin");
    fs::write(&path, odin)
        .with_context(|| format!("failed to write output file {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_cmd::Command;
    use predicates::prelude::*;
    use tempfile::tempdir;

    const PROGRAM: &str = "package main\n\nimport \"fmt\"\n\nfunc main() {\n\tfmt.Println(\"hi\")\n}\n";

    fn golden() -> Command {
        Command::cargo_bin("golden").expect("binary exists")
    }

    #[test]
    fn writes_main_and_runtime() {
        let dir = tempdir().expect("tempdir");
        let input = dir.path().join("main.go");
        fs::write(&input, PROGRAM).expect("write input");
        let out = dir.path().join("out");

        golden()
            .arg(&input)
            .arg(&out)
            .assert()
            .success()
            .stdout(predicate::str::contains("Generated"));

        let odin = fs::read_to_string(out.join("main.odin")).expect("read output");
        assert!(odin.starts_with("package main\n"));
        assert!(odin.contains("fmt.println(\"hi\")"));
        assert!(out.join("golden").join("golden.odin").is_file());
    }

    #[test]
    fn prints_to_stdout_without_leak_check() {
        let dir = tempdir().expect("tempdir");
        let input = dir.path().join("main.go");
        fs::write(&input, PROGRAM).expect("write input");

        golden()
            .arg(&input)
            .arg("--stdout")
            .arg("--no-leak-check")
            .assert()
            .success()
            .stdout(predicate::str::contains("main :: proc() {"))
            .stdout(predicate::str::contains("Tracking_Allocator").not());
    }

    #[test]
    fn merges_a_directory() {
        let dir = tempdir().expect("tempdir");
        fs::write(dir.path().join("main.go"), PROGRAM).expect("write main");
        fs::write(
            dir.path().join("util.go"),
            "package main\n\nfunc helper() int {\n\treturn 1\n}\n",
        )
        .expect("write util");

        golden()
            .arg(dir.path())
            .arg("--stdout")
            .assert()
            .success()
            .stdout(predicate::str::contains("helper :: proc() -> int {"));
    }

    #[test]
    fn missing_runtime_only_warns() {
        let dir = tempdir().expect("tempdir");
        let input = dir.path().join("main.go");
        fs::write(&input, PROGRAM).expect("write input");
        let out = dir.path().join("out");

        golden()
            .arg(&input)
            .arg(&out)
            .arg("--runtime")
            .arg(dir.path().join("missing"))
            .assert()
            .success()
            .stderr(predicate::str::contains("could not install the golden runtime"));

        assert!(out.join("main.odin").is_file());
    }

    #[test]
    fn reports_unreadable_input() {
        let dir = tempdir().expect("tempdir");
        golden()
            .arg(dir.path().join("missing.go"))
            .arg("--stdout")
            .assert()
            .failure()
            .stderr(predicate::str::contains("failed to translate"));
    }

    #[test]
    fn reports_parse_failures() {
        let dir = tempdir().expect("tempdir");
        let input = dir.path().join("main.go");
        fs::write(&input, "package main\n\nfunc main( {\n").expect("write input");

        golden()
            .arg(&input)
            .arg("--stdout")
            .assert()
            .failure()
            .stderr(predicate::str::contains("parse error"));
    }
}
