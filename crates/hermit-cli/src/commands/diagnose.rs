//! `hermit diagnose` — run a command and diagnose it if it fails.
//!
//! The command's stdout and stderr are mirrored to the terminal as they
//! arrive and collected into one log. On a non-zero exit the log goes to the
//! daemon for a streamed diagnosis, together with the contents of the last
//! source file referenced in the output when one can be located.

use crate::client::DaemonClient;
use crate::ui;
use console::style;
use regex::Regex;
use std::io::Write;
use std::path::Path;
use std::process::Stdio;
use std::sync::LazyLock;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;

/// Python-style traceback reference: `File "path/to/file.py"`.
static TRACEBACK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"File "([^"]+)""#).expect("static regex"));
/// Generic compiler/runtime reference: `path/to/file:12` or `C:\path:12`.
static PATH_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([a-zA-Z]:\\[^:]+|/[^:]+):\d+").expect("static regex"));

pub async fn run(daemon: &DaemonClient, command: &[String]) -> Result<(), String> {
    let Some((program, args)) = command.split_first() else {
        return Err("please provide a command to run".to_string());
    };

    println!(
        "{} {}\n",
        style("Running command:").dim(),
        command.join(" ")
    );

    let mut child = Command::new(program)
        .args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| format!("command not found '{program}': {e}"))?;

    let log = mirror_output(&mut child).await;
    let status = child
        .wait()
        .await
        .map_err(|e| format!("failed to wait on '{program}': {e}"))?;

    if status.success() {
        println!("Command finished successfully.");
        return Ok(());
    }

    let code = status.code().unwrap_or(-1);
    println!(
        "\n{} {}. {}",
        style("Command failed with exit code").dim(),
        style(code).red().bold(),
        style("Sending to hermit for diagnosis...").dim()
    );

    let (source_code, language) = source_context(&log);
    let (loading, completion) = ui::themed_phrases();
    let spinner = ui::moon_spinner(loading);
    let mut first = true;
    let mut render = |chunk: &str| {
        if first {
            spinner.finish_and_clear();
            ui::print_completion(completion);
            println!();
            first = false;
        }
        print!("{}", style(chunk).italic());
        let _ = std::io::stdout().flush();
    };
    let result = daemon
        .diagnose(&log, source_code.as_deref(), &language, &mut render)
        .await;
    spinner.finish_and_clear();
    result?;
    println!("\n");
    Ok(())
}

/// Mirror the child's stdout and stderr line by line, returning the merged
/// log. Lines are interleaved in arrival order.
async fn mirror_output(child: &mut tokio::process::Child) -> String {
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    if let Some(stdout) = child.stdout.take() {
        let tx = tx.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if tx.send(line).is_err() {
                    break;
                }
            }
        });
    }
    if let Some(stderr) = child.stderr.take() {
        let tx = tx.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if tx.send(line).is_err() {
                    break;
                }
            }
        });
    }
    drop(tx);

    let mut log = String::new();
    while let Some(line) = rx.recv().await {
        println!("{}", style(&line).red());
        log.push_str(&line);
        log.push('\n');
    }
    log
}

/// Find the last file path referenced in the log.
fn parse_error_filepath(log: &str) -> Option<String> {
    for re in [&*TRACEBACK_RE, &*PATH_LINE_RE] {
        if let Some(found) = re
            .captures_iter(log)
            .filter_map(|c| c.get(1))
            .last()
        {
            return Some(found.as_str().trim().to_string());
        }
    }
    None
}

/// Read the referenced source file, if one exists on disk. Returns the file
/// contents and a language tag derived from its extension ("shell" when no
/// file could be located).
fn source_context(log: &str) -> (Option<String>, String) {
    let Some(filepath) = parse_error_filepath(log) else {
        return (None, "shell".to_string());
    };
    let path = Path::new(&filepath);
    if !path.exists() {
        return (None, "shell".to_string());
    }
    println!(
        "{}",
        style(format!(
            "Found error in file: {filepath}. Reading for context..."
        ))
        .dim()
    );
    let language = path
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_else(|| "shell".to_string());
    match std::fs::read_to_string(path) {
        Ok(code) => (Some(code), language),
        Err(_) => (None, "shell".to_string()),
    }
}
