//! Status glyphs, unicode detection, and the default formatting pieces.
//!
//! Everything here is pure data; the render engine decides when and where
//! the glyphs appear.

use std::env;
use std::sync::OnceLock;

use crossterm::style::Stylize;

/// Whether the terminal is likely to render non-ASCII glyphs correctly.
///
/// Probes the environment once and caches the answer for the process.
pub fn unicode_supported() -> bool {
    static SUPPORTED: OnceLock<bool> = OnceLock::new();
    *SUPPORTED.get_or_init(probe_unicode)
}

fn probe_unicode() -> bool {
    if !cfg!(windows) {
        // The linux kernel console is the only mainstream non-unicode case.
        return !env::var("TERM").is_ok_and(|term| term == "linux");
    }
    env::var_os("WT_SESSION").is_some()
        || env::var_os("TERMINUS_SUBLIME").is_some()
        || env::var("ConEmuTask").is_ok_and(|v| v == "{cmd::Cmder}")
        || env::var("TERM_PROGRAM").is_ok_and(|v| v == "Terminus-Sublime" || v == "vscode")
        || env::var("TERM").is_ok_and(|v| v == "xterm-256color" || v == "alacritty")
        || env::var("TERMINAL_EMULATOR").is_ok_and(|v| v == "JetBrains-JediTerm")
}

fn pick(unicode: &'static str, fallback: &'static str) -> &'static str {
    if unicode_supported() { unicode } else { fallback }
}

/// Vertical bar drawn between task rows.
pub fn bar() -> &'static str {
    pick("│", "|")
}

/// Top-left corner used by the default header.
pub fn bar_start() -> &'static str {
    pick("┌", "T")
}

/// The full glyph set used to render task rows.
///
/// `pending` is a frame cycle advanced once per render tick; the terminal
/// statuses each get a single fixed glyph.
#[derive(Debug, Clone)]
pub struct StatusSymbols {
    pub pending: Vec<String>,
    pub success: String,
    pub error: String,
    pub cancelled: String,
}

impl Default for StatusSymbols {
    fn default() -> Self {
        let frames: &[&str] = if unicode_supported() {
            &["◒", "◐", "◓", "◑"]
        } else {
            &["•", "o", "O", "0"]
        };
        Self {
            pending: frames.iter().map(|f| f.magenta().to_string()).collect(),
            success: pick("◇", "o").green().to_string(),
            error: pick("■", "x").red().to_string(),
            cancelled: pick("▲", "x").yellow().to_string(),
        }
    }
}

impl StatusSymbols {
    /// Returns a copy with every populated override applied on top.
    pub fn merged(&self, overrides: &PartialStatusSymbols) -> Self {
        let mut symbols = self.clone();
        if let Some(pending) = &overrides.pending {
            symbols.pending = pending.clone();
        }
        if let Some(success) = &overrides.success {
            symbols.success = success.clone();
        }
        if let Some(error) = &overrides.error {
            symbols.error = error.clone();
        }
        if let Some(cancelled) = &overrides.cancelled {
            symbols.cancelled = cancelled.clone();
        }
        symbols
    }
}

/// Per-status glyph overrides; unset fields keep the defaults.
#[derive(Debug, Clone, Default)]
pub struct PartialStatusSymbols {
    pub pending: Option<Vec<String>>,
    pub success: Option<String>,
    pub error: Option<String>,
    pub cancelled: Option<String>,
}

/// A task-level glyph override, independent of the manager's symbol set.
#[derive(Debug, Clone)]
pub enum SymbolOverride {
    /// One glyph for every lifecycle state.
    Static(String),
    /// Per-status overrides merged over the manager's symbols.
    PerStatus(PartialStatusSymbols),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merged_keeps_unset_fields() {
        let defaults = StatusSymbols {
            pending: vec!["*".into()],
            success: "o".into(),
            error: "x".into(),
            cancelled: "-".into(),
        };
        let merged = defaults.merged(&PartialStatusSymbols {
            success: Some("#".into()),
            ..PartialStatusSymbols::default()
        });
        assert_eq!(merged.success, "#");
        assert_eq!(merged.error, "x");
        assert_eq!(merged.pending, vec!["*".to_string()]);
    }

    #[test]
    fn merged_replaces_pending_cycle() {
        let merged = StatusSymbols::default().merged(&PartialStatusSymbols {
            pending: Some(vec!["a".into(), "b".into()]),
            ..PartialStatusSymbols::default()
        });
        assert_eq!(merged.pending.len(), 2);
    }
}
