use std::borrow::Cow;
use std::fmt;

/// Which of `\A` and `\G` can match at the current position.
/// Both are context dependent so patterns get compiled once per variant.
#[derive(Copy, Clone, PartialEq, Hash, Eq)]
pub enum AnchorActive {
    /// Only \A is active
    A,
    /// Only \G is active
    G,
    /// Both \A and \G are active
    AG,
    /// Neither \A nor \G are active
    None,
}

impl AnchorActive {
    pub fn new(is_first_line: bool, anchor_position: Option<usize>, current_pos: usize) -> Self {
        let g_active = anchor_position == Some(current_pos);

        match (is_first_line, g_active) {
            (true, true) => AnchorActive::AG,
            (true, false) => AnchorActive::A,
            (false, true) => AnchorActive::G,
            (false, false) => AnchorActive::None,
        }
    }

    /// Inactive anchors are replaced with a character that won't be in the text
    pub fn replace_anchors<'a>(&self, pat: &'a str) -> Cow<'a, str> {
        let (allow_a, allow_g) = match self {
            AnchorActive::AG => return Cow::Borrowed(pat),
            AnchorActive::A => (true, false),
            AnchorActive::G => (false, true),
            AnchorActive::None => (false, false),
        };

        let inactive = |anchor: u8| match anchor {
            b'A' => !allow_a,
            b'G' => !allow_g,
            _ => false,
        };

        // Escaped pairs are skipped whole so `\\A` stays a backslash then `A`
        let bytes = pat.as_bytes();
        let mut out: Option<String> = None;
        let mut copied = 0;
        let mut i = 0;
        while i + 1 < bytes.len() {
            if bytes[i] != b'\\' {
                i += 1;
                continue;
            }
            if inactive(bytes[i + 1]) {
                let out = out.get_or_insert_with(|| String::with_capacity(pat.len() + 2));
                out.push_str(&pat[copied..i]);
                out.push('\u{FFFF}');
                copied = i + 2;
            }
            i += 2;
        }

        match out {
            Some(mut out) => {
                out.push_str(&pat[copied..]);
                Cow::Owned(out)
            }
            None => Cow::Borrowed(pat),
        }
    }
}

impl fmt::Debug for AnchorActive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AnchorActive::A => "allow_A=true, allow_G=false",
            AnchorActive::G => "allow_A=false, allow_G=true",
            AnchorActive::AG => "allow_A=true, allow_G=true",
            AnchorActive::None => "allow_A=false, allow_G=false",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_active_anchors() {
        assert_eq!(AnchorActive::new(true, Some(3), 3), AnchorActive::AG);
        assert_eq!(AnchorActive::new(true, Some(3), 4), AnchorActive::A);
        assert_eq!(AnchorActive::new(false, Some(0), 0), AnchorActive::G);
        assert_eq!(AnchorActive::new(false, None, 0), AnchorActive::None);
    }

    #[test]
    fn replaces_inactive_anchors() {
        assert_eq!(AnchorActive::AG.replace_anchors("\\A\\G"), "\\A\\G");
        assert_eq!(AnchorActive::A.replace_anchors("\\A\\G"), "\\A\u{FFFF}");
        assert_eq!(AnchorActive::G.replace_anchors("\\A\\G"), "\u{FFFF}\\G");
        assert_eq!(AnchorActive::None.replace_anchors("\\A\\G"), "\u{FFFF}\u{FFFF}");
        assert!(matches!(AnchorActive::None.replace_anchors("abc"), Cow::Borrowed(_)));
    }

    #[test]
    fn leaves_escaped_backslashes_alone() {
        assert_eq!(AnchorActive::None.replace_anchors("\\\\A"), "\\\\A");
        assert_eq!(AnchorActive::None.replace_anchors("\\\\\\G"), "\\\\\u{FFFF}");
        assert_eq!(AnchorActive::G.replace_anchors("x\\\\A\\Ay"), "x\\\\A\u{FFFF}y");
        assert!(matches!(
            AnchorActive::G.replace_anchors("\\\\A\\G"),
            Cow::Borrowed(_)
        ));
    }
}
