//! Glob matching for channel patterns, Redis `PSUBSCRIBE` style.
//!
//! Supported syntax: `*` matches any run of characters (including none),
//! `?` matches exactly one character, and `\` makes the next character
//! literal. Everything else matches itself.

/// Returns `true` if `channel` matches the glob `pattern`.
pub fn matches(pattern: &str, channel: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let channel: Vec<char> = channel.chars().collect();

    let (mut p, mut c) = (0, 0);
    // Position of the last `*` seen and the channel index it was tried at.
    let mut backtrack: Option<(usize, usize)> = None;

    while c < channel.len() {
        match pattern.get(p).copied() {
            Some('*') => {
                backtrack = Some((p, c));
                p += 1;
                continue;
            }
            Some('?') => {
                p += 1;
                c += 1;
                continue;
            }
            Some('\\') if p + 1 < pattern.len() => {
                if pattern[p + 1] == channel[c] {
                    p += 2;
                    c += 1;
                    continue;
                }
            }
            Some(literal) => {
                if literal == channel[c] {
                    p += 1;
                    c += 1;
                    continue;
                }
            }
            None => {}
        }

        // Mismatch: let the last `*` swallow one more character.
        match backtrack {
            Some((star, at)) => {
                p = star + 1;
                c = at + 1;
                backtrack = Some((star, at + 1));
            }
            None => return false,
        }
    }

    pattern[p..].iter().all(|&ch| ch == '*')
}
