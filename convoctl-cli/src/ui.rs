//! Progress feedback for the convoctl CLI
//!
//! Spinners and summary lines go to stderr and are suppressed when:
//! - `--quiet` is passed
//! - `CONVOCTL_QUIET=1` is set
//! - stderr is not a TTY (piped output)

use std::io::IsTerminal;
use std::sync::OnceLock;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

static QUIET_MODE: OnceLock<bool> = OnceLock::new();

/// Call once at startup with the `--quiet` flag value.
pub fn init_quiet_mode(quiet_flag: bool) {
    let is_quiet = quiet_flag
        || std::env::var("CONVOCTL_QUIET").map(|v| v == "1").unwrap_or(false)
        || !std::io::stderr().is_terminal();

    QUIET_MODE.set(is_quiet).ok();
}

pub fn is_quiet() -> bool {
    *QUIET_MODE.get().unwrap_or(&false)
}

/// Print a one-line summary to stderr unless quiet.
pub fn note(msg: impl AsRef<str>) {
    if !is_quiet() {
        eprintln!("{}", msg.as_ref());
    }
}

fn spinner(msg: &str) -> Option<ProgressBar> {
    if is_quiet() {
        return None;
    }

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ")
            .template("{spinner:.cyan} {msg}")
            .expect("valid template"),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    Some(pb)
}

fn finish(pb: Option<ProgressBar>, msg: String) {
    if let Some(pb) = pb {
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{msg}")
                .expect("valid template"),
        );
        pb.finish_with_message(msg);
    }
}

/// Run `f` behind a spinner, finishing with a check mark or a cross.
pub fn with_spinner<T, E: std::fmt::Display>(
    msg: impl Into<String>,
    success_msg: impl FnOnce(&T) -> String,
    f: impl FnOnce() -> Result<T, E>,
) -> Result<T, E> {
    let msg = msg.into();
    let pb = spinner(&msg);

    match f() {
        Ok(result) => {
            finish(pb, format!("✓ {}", success_msg(&result)));
            Ok(result)
        }
        Err(e) => {
            finish(pb, format!("✗ {msg}: {e}"));
            Err(e)
        }
    }
}
