use std::fmt;
use std::str::FromStr;

/// Number of distinct position tags
pub const NUM_TAGS: usize = 4;

/// Position of a character inside a word
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Tag {
    /// Beginning of a multi-character word
    B = 0,
    /// Inside a multi-character word
    I = 1,
    /// End of a multi-character word
    E = 2,
    /// Single-character word
    S = 3,
}

impl Tag {
    /// All tags in id order
    pub const ALL: [Tag; NUM_TAGS] = [Tag::B, Tag::I, Tag::E, Tag::S];

    /// Tag attached to the start-of-sequence sentinel
    pub const START: Tag = Tag::S;

    /// Tag attached to the end-of-sequence sentinel
    pub const END: Tag = Tag::S;

    /// Dense id in `[0, NUM_TAGS)`
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Tag for a dense id
    #[inline]
    pub fn from_index(index: usize) -> Option<Tag> {
        Tag::ALL.get(index).copied()
    }

    pub fn as_char(self) -> char {
        match self {
            Tag::B => 'B',
            Tag::I => 'I',
            Tag::E => 'E',
            Tag::S => 'S',
        }
    }

    /// Whether a word ends at a character carrying this tag
    pub fn closes_word(self) -> bool {
        matches!(self, Tag::E | Tag::S)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

impl FromStr for Tag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "B" => Ok(Tag::B),
            "I" => Ok(Tag::I),
            "E" => Ok(Tag::E),
            "S" => Ok(Tag::S),
            _ => Err(format!("unknown tag {:?}, expected one of B, I, E, S", s)),
        }
    }
}
