use crate::charclass::{self, CharClass};

/// Collapses runs of identical adjacent bytes that belong to `class`.
///
/// A byte is dropped only when it is a class member and equals the byte
/// right before it in the input. Bytes outside the class are always kept.
pub fn squeeze(input: &[u8], class: CharClass) -> Vec<u8> {
    squeeze_by(input, |b| class.contains_byte(b))
}

/// Like `tr -s '[:space:]'`: collapses runs of the same whitespace byte.
///
/// Mixed runs are not merged, so `" \t"` stays as it is.
pub fn squeeze_whitespace(input: &[u8]) -> Vec<u8> {
    squeeze_by(input, charclass::is_space)
}

fn squeeze_by(input: &[u8], member: impl Fn(u8) -> bool) -> Vec<u8> {
    let Some((&first, rest)) = input.split_first() else {
        return Vec::new();
    };

    let mut out = Vec::with_capacity(input.len());
    out.push(first);

    let mut prev = first;
    for &b in rest {
        if b != prev || !member(b) {
            out.push(b);
        }
        prev = b;
    }
    out
}
