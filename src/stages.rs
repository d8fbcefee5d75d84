//! The three iXhash normalizers.
//!
//! Each stage checks that the body carries enough of the content it keys
//! on, then reduces the body to a canonical byte string. `None` means the
//! gate failed and the stage has no digest for this body.

use crate::charclass::{self, CharClass};
use crate::squeeze::{squeeze, squeeze_whitespace};

const FIRST_MIN_BLANKS: usize = 20;
const FIRST_MIN_NEWLINES: usize = 2;
const SECOND_MIN_MARKERS: usize = 3;
const THIRD_MIN_RUN: usize = 8;

/// Stage 1: the whitespace skeleton of the body.
///
/// Needs at least 20 spaces/tabs and 2 newlines. CRLF is folded to LF,
/// whitespace runs are squeezed, and every graphic byte is dropped, so the
/// result is only the layout that is left around the text.
pub fn first(msg: &[u8]) -> Option<Vec<u8>> {
    if !first_gate(msg) {
        return None;
    }

    let unfolded = crlf_to_lf(msg);
    let squeezed = squeeze_whitespace(&unfolded);
    Some(
        squeezed
            .into_iter()
            .filter(|&b| !CharClass::Graphic.contains_byte(b))
            .collect(),
    )
}

/// Stage 2: the punctuation skeleton of link-heavy bodies.
///
/// Needs at least three markers on one line. Runs of control bytes,
/// alphanumerics and `%&#;=` are deleted, underscores become spaces, and
/// repeated printable bytes are squeezed.
pub fn second(msg: &[u8]) -> Option<Vec<u8>> {
    if !second_gate(msg) {
        return None;
    }

    let stripped: Vec<u8> = msg
        .iter()
        .copied()
        .filter(|&b| !is_redundant(b))
        .map(|b| if b == b'_' { b' ' } else { b })
        .collect();
    Some(squeeze(&stripped, CharClass::Printable))
}

/// Stage 3: the body with all whitespace removed.
///
/// Needs a run of at least 8 non-space bytes. Control bytes, whitespace and
/// `=` are deleted, then repeated graphic bytes are squeezed.
pub fn third(msg: &[u8]) -> Option<Vec<u8>> {
    if !third_gate(msg) {
        return None;
    }

    let stripped: Vec<u8> = msg
        .iter()
        .copied()
        .filter(|&b| {
            !(charclass::is_ascii_control(b) || charclass::is_ascii_space(b) || b == b'=')
        })
        .collect();
    Some(squeeze(&stripped, CharClass::Graphic))
}

fn first_gate(msg: &[u8]) -> bool {
    let mut blanks = 0;
    let mut newlines = 0;
    for &b in msg {
        match b {
            b' ' | b'\t' => blanks += 1,
            b'\n' => newlines += 1,
            _ => {}
        }
    }
    if blanks < FIRST_MIN_BLANKS || newlines < FIRST_MIN_NEWLINES {
        log::debug!("first stage gate failed: {blanks} blanks, {newlines} newlines");
        return false;
    }
    true
}

/// Counts markers line by line; the markers must share a line because the
/// gap between two of them never spans a newline.
fn second_gate(msg: &[u8]) -> bool {
    let mut markers = 0;
    let mut i = 0;
    while i < msg.len() {
        match msg[i] {
            b'\n' => markers = 0,
            b'<' | b'>' | b'(' | b')' | b'|' | b'@' | b'*' | b'\'' | b'!' | b'?' | b',' => {
                markers += 1;
            }
            b':' if msg.get(i + 1) == Some(&b'/') => {
                markers += 1;
                i += 1;
            }
            _ => {}
        }
        if markers >= SECOND_MIN_MARKERS {
            return true;
        }
        i += 1;
    }
    log::debug!("second stage gate failed: fewer than {SECOND_MIN_MARKERS} markers on any line");
    false
}

fn third_gate(msg: &[u8]) -> bool {
    let mut run = 0;
    for &b in msg {
        if charclass::is_space(b) {
            run = 0;
            continue;
        }
        run += 1;
        if run >= THIRD_MIN_RUN {
            return true;
        }
    }
    log::debug!("third stage gate failed: no run of {THIRD_MIN_RUN} non-space bytes");
    false
}

fn is_redundant(b: u8) -> bool {
    charclass::is_ascii_control(b)
        || b.is_ascii_alphanumeric()
        || matches!(b, b'%' | b'&' | b'#' | b';' | b'=')
}

fn crlf_to_lf(msg: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(msg.len());
    let mut iter = msg.iter().copied().peekable();
    while let Some(b) = iter.next() {
        if b == b'\r' && iter.peek() == Some(&b'\n') {
            continue;
        }
        out.push(b);
    }
    out
}
