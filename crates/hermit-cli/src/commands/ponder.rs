//! `hermit ponder` — ask a one-off question and stream the answer.

use crate::client::DaemonClient;
use crate::ui;
use console::style;
use std::io::Write;

pub async fn run(daemon: &DaemonClient, prompt: &str) -> Result<(), String> {
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

    let result = daemon.ponder(prompt, &mut render).await;
    spinner.finish_and_clear();
    result?;
    println!("\n");
    Ok(())
}
