//! Logical offsets and line numbers, including the sentinel values that
//! stand in for the synthetic `BEGIN`/`RAISED`/`RETURN` pseudo-instructions.

use std::fmt;

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Offset(pub i32);

impl Offset {
    pub const BEGIN: Offset = Offset(-1);
    pub const RAISED: Offset = Offset(-2);
    pub const RETURN: Offset = Offset(-3);

    pub const fn real(off: i32) -> Self {
        Offset(off)
    }

    pub const fn is_sentinel(self) -> bool {
        self.0 < 0
    }
}

impl fmt::Display for Offset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Offset::BEGIN => write!(f, "BEGIN"),
            Offset::RAISED => write!(f, "RAISED"),
            Offset::RETURN => write!(f, "RETURN"),
            Offset(n) => write!(f, "{n}"),
        }
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Line(pub i32);

impl Line {
    pub const BEGIN: Line = Line(-1);
    pub const RAISED: Line = Line(-2);
    pub const RETURN: Line = Line(-3);

    pub const fn real(line: i32) -> Self {
        Line(line)
    }

    /// True for any line number a coverage line-map would actually key on.
    /// Per the data model invariant, attributed lines must be positive.
    pub const fn is_real(self) -> bool {
        self.0 > 0
    }
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Line::BEGIN => write!(f, "BEGIN"),
            Line::RAISED => write!(f, "RAISED"),
            Line::RETURN => write!(f, "RETURN"),
            Line(n) => write!(f, "{n}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn sentinels_never_collide_with_real_offsets() {
        assert!(Offset::BEGIN.is_sentinel());
        assert!(Offset::RAISED.is_sentinel());
        assert!(Offset::RETURN.is_sentinel());
        assert!(!Offset::real(0).is_sentinel());
        assert_ne!(Offset::BEGIN, Offset::RAISED);
        assert_ne!(Offset::RAISED, Offset::RETURN);
    }

    #[test]
    fn line_is_real_rejects_sentinels() {
        assert!(!Line::BEGIN.is_real());
        assert!(!Line::RAISED.is_real());
        assert!(!Line::RETURN.is_real());
        assert!(Line::real(1).is_real());
    }
}
