//! The render engine: composes the visible spinners into one text block and
//! repaints the terminal in place.
//!
//! Repainting erases exactly as many lines as the previous frame wrote and
//! rewrites the block from column zero. Naive reprinting floods scrollback
//! and full clears flicker, so the engine tracks the prior frame's line count
//! and, when a block is taller than the screen, writes only the trailing
//! window that fits.

use std::collections::BTreeMap;
use std::io::Write;

use crossterm::terminal::{Clear, ClearType};
use crossterm::{cursor, queue};

use crate::spinner::{Spinner, TaskStatus};
use crate::theme::{StatusSymbols, SymbolOverride};

pub(crate) type PrefixFn = dyn Fn(&str, &str, &str) -> String + Send + Sync;

/// Builds the full output block: optional header plus one prefixed row per
/// visible spinner, in ascending slot order.
///
/// Pending spinners advance their animation frame here, so animation speed is
/// coupled to the render tick rate.
pub(crate) fn compose(
    spinners: &mut BTreeMap<usize, Spinner>,
    symbols: &StatusSymbols,
    prefix: &PrefixFn,
    separator: &str,
    padding: &str,
    header: &str,
) -> String {
    let rows: Vec<String> = spinners
        .values_mut()
        .filter(|spinner| !spinner.hidden)
        .map(|spinner| {
            let symbol = resolve_symbol(spinner, symbols);
            format!("{}{}", prefix(separator, &symbol, padding), spinner.message)
        })
        .collect();
    format!("{header}{}", rows.join("\n"))
}

/// Resolves the glyph for one spinner: per-task static override first, then
/// per-task per-status overrides, then the manager's symbol set.
fn resolve_symbol(spinner: &mut Spinner, defaults: &StatusSymbols) -> String {
    let merged;
    let symbols = match &spinner.symbol {
        Some(SymbolOverride::Static(glyph)) => return glyph.clone(),
        Some(SymbolOverride::PerStatus(overrides)) => {
            merged = defaults.merged(overrides);
            &merged
        }
        None => defaults,
    };
    match spinner.status() {
        TaskStatus::Pending => {
            let frames = &symbols.pending;
            if frames.is_empty() {
                return String::new();
            }
            let glyph = frames[spinner.frame % frames.len()].clone();
            spinner.frame = (spinner.frame + 1) % frames.len();
            glyph
        }
        TaskStatus::Success => symbols.success.clone(),
        TaskStatus::Error => symbols.error.clone(),
        TaskStatus::Cancelled => symbols.cancelled.clone(),
    }
}

/// Erases the previous frame, repositions to column zero, and writes the new
/// block, clamped to the terminal's visible rows. Returns the new block's
/// line count for the next erase.
pub(crate) fn draw<W: Write>(
    stream: &mut W,
    output: &str,
    previous_lines: usize,
    rows: u16,
) -> std::io::Result<usize> {
    if previous_lines > 0 {
        erase_lines(stream, previous_lines)?;
    }
    queue!(stream, cursor::MoveToColumn(0))?;

    let lines: Vec<&str> = output.split('\n').collect();
    let count = lines.len();
    let rows = rows as usize;
    if rows == 0 || count <= rows {
        stream.write_all(output.as_bytes())?;
    } else {
        // Only the visible rows were cleared; writing more would duplicate
        // the uncleared content above.
        stream.write_all(lines[count - rows..].join("\n").as_bytes())?;
    }
    stream.flush()?;
    Ok(count)
}

fn erase_lines<W: Write>(stream: &mut W, count: usize) -> std::io::Result<()> {
    for i in 0..count {
        queue!(stream, Clear(ClearType::CurrentLine))?;
        if i + 1 < count {
            queue!(stream, cursor::MoveUp(1))?;
        }
    }
    queue!(stream, cursor::MoveToColumn(0))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spinner::TaskPayload;

    fn plain_symbols() -> StatusSymbols {
        StatusSymbols {
            pending: vec!["*".into(), "+".into()],
            success: "o".into(),
            error: "x".into(),
            cancelled: "-".into(),
        }
    }

    fn prefix() -> Box<PrefixFn> {
        Box::new(|separator, symbol, padding| format!("{separator}{symbol}{padding}"))
    }

    #[test]
    fn compose_orders_rows_by_slot() {
        let mut spinners = BTreeMap::new();
        spinners.insert(5, Spinner::new("five".into(), false, None));
        spinners.insert(1, Spinner::new("one".into(), false, None));
        spinners.insert(3, Spinner::new("three".into(), false, None));

        let out = compose(&mut spinners, &plain_symbols(), &*prefix(), "", " ", "");
        let one = out.find("one").unwrap();
        let three = out.find("three").unwrap();
        let five = out.find("five").unwrap();
        assert!(one < three && three < five);
    }

    #[test]
    fn compose_skips_hidden_rows() {
        let mut spinners = BTreeMap::new();
        spinners.insert(0, Spinner::new("shown".into(), false, None));
        spinners.insert(1, Spinner::new("ghost".into(), true, None));

        let out = compose(&mut spinners, &plain_symbols(), &*prefix(), "", " ", "");
        assert!(out.contains("shown"));
        assert!(!out.contains("ghost"));
    }

    #[test]
    fn pending_frame_advances_per_compose() {
        let mut spinners = BTreeMap::new();
        spinners.insert(0, Spinner::new("work".into(), false, None));

        let first = compose(&mut spinners, &plain_symbols(), &*prefix(), "", " ", "");
        let second = compose(&mut spinners, &plain_symbols(), &*prefix(), "", " ", "");
        assert!(first.starts_with('*'));
        assert!(second.starts_with('+'));
    }

    #[test]
    fn terminal_statuses_use_fixed_glyphs() {
        let mut spinners = BTreeMap::new();
        let mut spinner = Spinner::new("done".into(), false, None);
        spinner.transition(TaskStatus::Success, TaskPayload::None);
        spinners.insert(0, spinner);

        let out = compose(&mut spinners, &plain_symbols(), &*prefix(), "", " ", "");
        assert!(out.starts_with('o'));
    }

    #[test]
    fn static_override_wins_over_status() {
        let mut spinners = BTreeMap::new();
        let mut spinner = Spinner::new("done".into(), false, Some(SymbolOverride::Static("#".into())));
        spinner.transition(TaskStatus::Error, TaskPayload::None);
        spinners.insert(0, spinner);

        let out = compose(&mut spinners, &plain_symbols(), &*prefix(), "", " ", "");
        assert!(out.starts_with('#'));
    }

    #[test]
    fn draw_reports_stable_line_counts() {
        let mut buf = Vec::new();
        let block = "a\nb\nc";
        let first = draw(&mut buf, block, 0, 0).unwrap();
        assert_eq!(first, 3);
        let second = draw(&mut buf, block, first, 0).unwrap();
        assert_eq!(second, first);
    }

    #[test]
    fn draw_accepts_a_boxed_writer() {
        // The manager hands draw its boxed output stream.
        let mut stream: Box<dyn Write + Send> = Box::new(Vec::new());
        assert_eq!(draw(&mut stream, "a\nb", 0, 0).unwrap(), 2);
        assert_eq!(draw(&mut stream, "a\nb", 2, 0).unwrap(), 2);
    }

    #[test]
    fn draw_clamps_to_trailing_window() {
        let mut buf = Vec::new();
        let block = "l1\nl2\nl3\nl4\nl5";
        let count = draw(&mut buf, block, 0, 2).unwrap();
        assert_eq!(count, 5);
        let written = String::from_utf8_lossy(&buf);
        assert!(written.contains("l4\nl5"));
        assert!(!written.contains("l1"));
    }
}
