use std::fmt::{self, Display, Formatter};

/// The location in the source code where a token was found.  This structure is used all over the
/// interpreter to keep track of where important things are found in the source code, and it is
/// used extensively in the error reporting.
///
/// Lines and columns are 1 based.  The start and end positions are byte offsets into the input,
/// shifted by any reference offset the tokenizer was created with.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CodeLocation {
    /// A tag for the source code the location refers to.  For example code evaluated from a string
    /// could use a tag of "\<input\>".
    source: String,

    /// The 1 based line number in the source code.
    line: usize,

    /// The 1 based column number in the source code.
    column: usize,

    /// Byte offset of the first character of the item.
    start_pos: usize,

    /// Byte offset just past the last character of the item.
    end_pos: usize,
}

impl Default for CodeLocation {
    fn default() -> Self {
        CodeLocation {
            source: String::new(),
            line: 1,
            column: 1,
            start_pos: 0,
            end_pos: 0,
        }
    }
}

/// Used in error reporting to show where in the source code an error originated.
impl Display for CodeLocation {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        if self.source.is_empty() {
            write!(f, "line {}, col {}", self.line, self.column)
        } else {
            write!(f, "{}:{}:{}", self.source, self.line, self.column)
        }
    }
}

impl CodeLocation {
    /// Create a new CodeLocation with all of the needed information.
    pub fn new(source: &str, line: usize, column: usize, start_pos: usize, end_pos: usize) -> Self {
        CodeLocation {
            source: source.to_owned(),
            line,
            column,
            start_pos,
            end_pos,
        }
    }

    /// Create a location that refers to the beginning of a named source.
    pub fn start_of(source: &str) -> Self {
        CodeLocation {
            source: source.to_owned(),
            ..CodeLocation::default()
        }
    }

    /// The tag for the source code this location refers to.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The 1 based line number in the source code.
    pub fn line(&self) -> usize {
        self.line
    }

    /// The 1 based column number in the source code.
    pub fn column(&self) -> usize {
        self.column
    }

    /// Byte offset of the first character of the item.
    pub fn start_pos(&self) -> usize {
        self.start_pos
    }

    /// Byte offset just past the last character of the item.
    pub fn end_pos(&self) -> usize {
        self.end_pos
    }
}

/// A cursor over decoded source text used by the tokenizer to extract tokens.  As characters are
/// consumed the line and column of the cursor are maintained, allowing the tokenizer to note where
/// every token begins.
///
/// A few tokenizer states decide they have gone one character too far, so unlike a plain forward
/// iterator the buffer also supports stepping backwards.
pub struct SourceBuffer {
    /// The decoded characters of the source text.
    chars: Vec<char>,

    /// The byte offset of each character, with one extra entry for the end of the input.
    offsets: Vec<usize>,

    /// Index of the current character in `chars`.
    pos: usize,

    /// The 1 based line the cursor is on.
    line: usize,

    /// The 1 based column the cursor is on.
    column: usize,
}

impl SourceBuffer {
    /// Create a new SourceBuffer for the given text.  The reference location supplies the starting
    /// line and column, which lets nested evaluations report positions relative to their enclosing
    /// source.
    pub fn new(source: &str, reference: &CodeLocation) -> Self {
        let mut chars = Vec::with_capacity(source.len());
        let mut offsets = Vec::with_capacity(source.len() + 1);

        for (offset, ch) in source.char_indices() {
            chars.push(ch);
            offsets.push(offset);
        }

        offsets.push(source.len());

        SourceBuffer {
            chars,
            offsets,
            pos: 0,
            line: reference.line(),
            column: reference.column(),
        }
    }

    /// Has the cursor consumed all of the input?
    pub fn is_exhausted(&self) -> bool {
        self.pos >= self.chars.len()
    }

    /// The character under the cursor, if any input remains.
    pub fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    /// Look at the character at an absolute index without moving the cursor.
    pub fn char_at(&self, index: usize) -> Option<char> {
        self.chars.get(index).copied()
    }

    /// Index of the current character.
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Byte offset of the current character within the original text.
    pub fn byte_pos(&self) -> usize {
        self.offsets[self.pos.min(self.chars.len())]
    }

    /// The 1 based line the cursor is on.
    pub fn line(&self) -> usize {
        self.line
    }

    /// The 1 based column the cursor is on.
    pub fn column(&self) -> usize {
        self.column
    }

    /// Consume `count` characters, updating the line and column as each one goes by.
    pub fn advance(&mut self, count: usize) {
        for _ in 0..count {
            if self.chars.get(self.pos) == Some(&'\n') {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }

            self.pos += 1;
        }
    }

    /// Step the cursor backwards by `count` characters.  It is an internal error to retreat past
    /// the beginning of the input.
    pub fn retreat(&mut self, count: usize) {
        for _ in 0..count {
            if self.pos == 0 {
                panic!("Retreated past the beginning of the source buffer.");
            }

            self.pos -= 1;

            if self.chars[self.pos] == '\n' {
                self.line -= 1;
                self.column = 1;
            } else {
                self.column -= 1;
            }
        }
    }
}
