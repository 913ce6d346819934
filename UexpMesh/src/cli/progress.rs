//! Console output for the CLI's multi-stage commands

use std::path::Path;
use std::time::Duration;

use console::{Emoji, style};
use indicatif::{HumanDuration, ProgressBar, ProgressStyle};

const BAR_TEMPLATE: &str = "{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {wide_msg}";

/// A stage of an import or verification run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Load,
    Import,
    Save,
    Scan,
    Verify,
}

impl Stage {
    fn icon(self) -> Emoji<'static, 'static> {
        match self {
            Self::Load => Emoji("📦 ", "> "),
            Self::Import => Emoji("🦴 ", "> "),
            Self::Save => Emoji("💾 ", "> "),
            Self::Scan => Emoji("📂 ", "> "),
            Self::Verify => Emoji("🔁 ", "> "),
        }
    }
}

/// `[2/3] 🦴 Importing LODs...`
pub fn print_stage(current: usize, total: usize, stage: Stage, msg: &str) {
    println!("{} {}{msg}", style(format!("[{current}/{total}]")).bold().dim(), stage.icon());
}

/// `Done in 2s`, or `Done in 2s: 3 identical` when a summary is given.
pub fn print_done(elapsed: Duration, summary: Option<&str>) {
    let done = style(format!("Done in {}", HumanDuration(elapsed))).green();
    match summary {
        Some(summary) => println!("{done}: {summary}"),
        None => println!("{done}"),
    }
}

/// A bar counting containers, showing the one most recently started.
///
/// Falls back to indicatif's plain bar if the template is rejected.
#[must_use]
pub fn container_bar(total: u64) -> ProgressBar {
    let bar_style = ProgressStyle::default_bar()
        .template(BAR_TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ");
    let bar = ProgressBar::new(total);
    bar.set_style(bar_style);
    bar
}

/// Advance `bar` past `path`.
pub fn advance(bar: &ProgressBar, path: &Path) {
    if let Some(name) = path.file_stem() {
        bar.set_message(name.to_string_lossy().into_owned());
    }
    bar.inc(1);
}
