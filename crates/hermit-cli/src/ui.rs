//! Terminal presentation: the moon spinner and hermit's themed phrases.

use indicatif::{ProgressBar, ProgressStyle};
use rand::seq::SliceRandom;
use std::time::Duration;

/// Moon-phase spinner frames; the trailing full moon is the finished state.
const MOON_FRAMES: &[&str] = &["🌑", "🌒", "🌓", "🌔", "🌕", "🌖", "🌗", "🌘", "🌕"];

/// Matched loading/completion phrase pairs, in hermit's voice.
const PHRASE_PAIRS: &[(&str, &str)] = &[
    ("Pondering in solitude...", "A thought has emerged."),
    (
        "Consulting the ancient scrolls...",
        "The scrolls have revealed their secrets.",
    ),
    ("Brewing a thought...", "The brew is complete."),
    (
        "Stoking the embers of an idea...",
        "The embers glow with an answer.",
    ),
    ("Listening to the silence...", "Silence has spoken."),
    ("Carving a response...", "The carving is done."),
    ("Gazing into the abyss...", "The abyss has answered."),
    ("Translating runic code...", "The runes are clear."),
    (
        "Following a thread of logic...",
        "The thread has led to an answer.",
    ),
    (
        "Distilling a complex idea...",
        "The essence has been captured.",
    ),
];

/// Pick a matching loading/completion phrase pair.
pub fn themed_phrases() -> (&'static str, &'static str) {
    *PHRASE_PAIRS
        .choose(&mut rand::thread_rng())
        .unwrap_or(&PHRASE_PAIRS[0])
}

/// Spawn a ticking moon spinner with the given message.
pub fn moon_spinner(message: &str) -> ProgressBar {
    let style = ProgressStyle::default_spinner()
        .template("{spinner} {msg}")
        .expect("spinner template is a valid static string")
        .tick_strings(MOON_FRAMES);
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(style);
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner
}

/// Print a completion phrase under its full moon.
pub fn print_completion(phrase: &str) {
    println!("🌕 {}", console::style(phrase).dim());
}
