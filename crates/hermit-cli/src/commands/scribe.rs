//! `hermit scribe` — generate a commit message from staged changes.

use crate::client::DaemonClient;
use crate::ui;
use console::style;
use tokio::process::Command;

pub async fn run(daemon: &DaemonClient) -> Result<(), String> {
    let output = Command::new("git")
        .args(["diff", "--staged"])
        .output()
        .await
        .map_err(|e| format!("failed to run git: {e}"))?;
    if !output.status.success() {
        return Err(format!(
            "git diff failed:\n{}",
            String::from_utf8_lossy(&output.stderr)
        ));
    }

    let diff = String::from_utf8_lossy(&output.stdout).into_owned();
    if diff.trim().is_empty() {
        println!("{}", style("No staged changes found.").red().bold());
        return Ok(());
    }

    let (loading, completion) = ui::themed_phrases();
    let spinner = ui::moon_spinner(loading);
    let message = daemon.scribe(&diff).await;
    spinner.finish_and_clear();
    let message = message?;

    ui::print_completion(completion);
    let rule = "=".repeat(50);
    println!("\n{rule}");
    println!("{}", style("Suggested Commit Message:").dim());
    println!("{rule}\n");
    println!("{message}\n");
    Ok(())
}
