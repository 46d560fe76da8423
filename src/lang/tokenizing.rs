use crate::{
    lang::source_buffer::{CodeLocation, SourceBuffer},
    runtime::error::{self, ErrorKind, ScriptError},
};
use std::fmt::{self, Debug, Display, Formatter};

/// The lexical category of a token.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum TokenType {
    /// A string literal, with any of the three quote characters, single or tripled.
    String,

    /// A `#` comment running to the end of the line.
    Comment,

    /// The `[` that opens an array literal.
    StartArray,

    /// The `]` that closes an array literal.
    EndArray,

    /// A `{name` module opener.  The captured name may be empty.
    StartModule,

    /// The `}` that closes a module section.
    EndModule,

    /// A `:` definition opener, carrying the definition's name.
    StartDef,

    /// The `;` that closes a definition.
    EndDef,

    /// A `@:` memoized definition opener, carrying the definition's name.
    StartMemo,

    /// Any other run of characters, to be resolved against the dictionaries.
    Word,

    /// A `.symbol` token with the leading dot stripped.
    DotSymbol,

    /// End of the source text.
    Eos,
}

/// A token is a single unit of the language as found in the source code.  The token carries its
/// lexeme and the location in the original source where it was found.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Token {
    token_type: TokenType,
    text: String,
    location: CodeLocation,
}

impl Token {
    /// Create a new token.
    pub fn new(token_type: TokenType, text: String, location: CodeLocation) -> Token {
        Token {
            token_type,
            text,
            location,
        }
    }

    /// The lexical category of the token.
    pub fn token_type(&self) -> TokenType {
        self.token_type
    }

    /// The token's lexeme.  For definition openers this is the definition name, for dot-symbols
    /// the text after the dot, and for strings the unquoted content.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Where in the source code the token was found.
    pub fn location(&self) -> &CodeLocation {
        &self.location
    }
}

/// Make sure that the tokens are nicely printable for debugging purposes.
impl Display for Token {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}

/// Include the location and category when debug printing a token.
impl Debug for Token {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}: {:?} {}", self.location, self.token_type, self.text)
    }
}

/// Decode the two HTML entities the language understands.  No other escape processing is performed
/// on source text.
fn unescape_source(source: &str) -> String {
    source.replace("&lt;", "<").replace("&gt;", ">")
}

/// A deterministic, single pass tokenizer over the source text.  Each call to `next_token` runs
/// the state machine from its START state and produces one token, ending with an `Eos` token once
/// the input is exhausted.
///
/// When `streaming` is set an unterminated string yields `None` (more input is needed) instead of
/// an error.
pub struct Tokenizer {
    /// Location the input is considered to begin at.  Nested evaluations use this to report
    /// positions relative to their enclosing source.
    reference: CodeLocation,

    /// Cursor over the unescaped input text.
    buffer: SourceBuffer,

    /// The lexeme of the token currently being gathered.
    token_text: String,

    /// Shifted byte offset of the start of the current token.
    token_start_pos: usize,

    /// Line the current token started on.
    token_line: usize,

    /// Column the current token started on.
    token_column: usize,

    /// Defer on unterminated strings instead of erroring out.
    streaming: bool,
}

impl Tokenizer {
    /// Create a tokenizer for the given input.  If no reference location is supplied the input is
    /// assumed to start at line 1, column 1 of an unnamed source.
    pub fn new(input: &str, reference: Option<CodeLocation>, streaming: bool) -> Tokenizer {
        let reference = reference.unwrap_or_default();
        let buffer = SourceBuffer::new(&unescape_source(input), &reference);

        Tokenizer {
            reference,
            buffer,
            token_text: String::new(),
            token_start_pos: 0,
            token_line: 0,
            token_column: 0,
            streaming,
        }
    }

    /// Produce the next token from the input.  Returns `Ok(None)` only in streaming mode, when
    /// the input ends inside a string literal and more text is needed to finish the token.
    pub fn next_token(&mut self) -> error::Result<Option<Token>> {
        self.token_text.clear();
        self.transition_from_start()
    }

    /// The location of the most recently gathered token.  Used by the interpreter to attach
    /// positions to errors that occur between tokens.
    pub fn token_location(&self) -> CodeLocation {
        CodeLocation::new(
            self.reference.source(),
            self.token_line,
            self.token_column,
            self.token_start_pos,
            self.token_start_pos + self.token_text.len(),
        )
    }

    /// Is the character part of the whitespace class?  Parentheses and commas count as whitespace
    /// in this language.
    fn is_whitespace(ch: char) -> bool {
        matches!(ch, ' ' | '\t' | '\n' | '\r' | '(' | ')' | ',')
    }

    /// Is the character one of the three string delimiters?
    fn is_quote(ch: char) -> bool {
        matches!(ch, '"' | '\'' | '^')
    }

    /// Do three identical quote characters begin at the given index?
    fn is_triple_quote_at(&self, index: usize) -> bool {
        match self.buffer.char_at(index) {
            Some(ch) if Self::is_quote(ch) => {
                self.buffer.char_at(index + 1) == Some(ch)
                    && self.buffer.char_at(index + 2) == Some(ch)
            }
            _ => false,
        }
    }

    /// Record the location of the character under the cursor as the start of the token being
    /// gathered.
    fn note_start_token(&mut self) {
        self.token_start_pos = self.buffer.byte_pos() + self.reference.start_pos();
        self.token_line = self.buffer.line();
        self.token_column = self.buffer.column();
    }

    /// Build a token from the gathered text and noted start location.
    fn make_token(&self, token_type: TokenType) -> Token {
        Token::new(token_type, self.token_text.clone(), self.token_location())
    }

    /// The START state.  Dispatches on the current character to the gathering state for the token
    /// it begins.
    fn transition_from_start(&mut self) -> error::Result<Option<Token>> {
        while let Some(ch) = self.buffer.peek() {
            self.note_start_token();
            self.buffer.advance(1);

            if Self::is_whitespace(ch) {
                continue;
            } else if ch == '#' {
                return Ok(Some(self.transition_from_comment()));
            } else if ch == ':' {
                return self.transition_from_start_definition(TokenType::StartDef).map(Some);
            } else if ch == '@' && self.buffer.peek() == Some(':') {
                // Skip over the ":" in "@:".
                self.buffer.advance(1);
                return self.transition_from_start_definition(TokenType::StartMemo).map(Some);
            } else if ch == ';' {
                self.token_text.push(ch);
                return Ok(Some(self.make_token(TokenType::EndDef)));
            } else if ch == '[' {
                self.token_text.push(ch);
                return Ok(Some(self.make_token(TokenType::StartArray)));
            } else if ch == ']' {
                self.token_text.push(ch);
                return Ok(Some(self.make_token(TokenType::EndArray)));
            } else if ch == '{' {
                return Ok(Some(self.transition_from_gather_module()));
            } else if ch == '}' {
                self.token_text.push(ch);
                return Ok(Some(self.make_token(TokenType::EndModule)));
            } else if self.is_triple_quote_at(self.buffer.pos() - 1) {
                // Skip over the 2nd and 3rd quote characters.
                self.buffer.advance(2);
                return self.transition_from_gather_triple_quote_string(ch);
            } else if Self::is_quote(ch) {
                return self.transition_from_gather_string(ch);
            } else if ch == '.' {
                self.buffer.retreat(1);
                return Ok(Some(self.transition_from_gather_dot_symbol()));
            } else {
                self.buffer.retreat(1);
                return Ok(Some(self.transition_from_gather_word()));
            }
        }

        self.note_start_token();
        Ok(Some(self.make_token(TokenType::Eos)))
    }

    /// Gather a comment.  Runs to the end of the line without consuming the newline itself.
    fn transition_from_comment(&mut self) -> Token {
        self.note_start_token();

        while let Some(ch) = self.buffer.peek() {
            self.token_text.push(ch);
            self.buffer.advance(1);

            if ch == '\n' {
                self.buffer.retreat(1);
                break;
            }
        }

        self.make_token(TokenType::Comment)
    }

    /// Skip the whitespace between a `:` or `@:` and the definition name, then gather the name.
    fn transition_from_start_definition(&mut self, token_type: TokenType) -> error::Result<Token> {
        while let Some(ch) = self.buffer.peek() {
            self.buffer.advance(1);

            if Self::is_whitespace(ch) {
                continue;
            } else if Self::is_quote(ch) {
                return Err(self.definition_name_error("Definition names can't have quotes in them"));
            } else {
                self.buffer.retreat(1);
                self.note_start_token();
                self.gather_definition_name()?;

                return Ok(self.make_token(token_type));
            }
        }

        Err(ScriptError::new(ErrorKind::Other(
            "Unexpected end of input while reading a definition name".to_string(),
        ))
        .with_location(self.token_location()))
    }

    /// Gather a definition name.  Names are terminated by whitespace and must not contain quote
    /// characters, brackets, or braces.
    fn gather_definition_name(&mut self) -> error::Result<()> {
        while let Some(ch) = self.buffer.peek() {
            self.buffer.advance(1);

            if Self::is_whitespace(ch) {
                break;
            }

            if Self::is_quote(ch) {
                return Err(self.definition_name_error("Definition names can't have quotes in them"));
            }

            if matches!(ch, '[' | ']' | '{' | '}') {
                return Err(self.definition_name_error(&format!(
                    "Definition names can't have '{}' in them",
                    ch
                )));
            }

            self.token_text.push(ch);
        }

        Ok(())
    }

    /// Build an invalid definition name error at the noted token start.
    fn definition_name_error(&self, message: &str) -> ScriptError {
        ScriptError::new(ErrorKind::InvalidDefinitionName(message.to_string()))
            .with_location(self.token_location())
    }

    /// Gather a module name after a `{`.  The name ends at whitespace or at the closing `}`,
    /// which is left unconsumed.  The name may be empty.
    fn transition_from_gather_module(&mut self) -> Token {
        self.note_start_token();

        while let Some(ch) = self.buffer.peek() {
            self.buffer.advance(1);

            if Self::is_whitespace(ch) {
                break;
            } else if ch == '}' {
                self.buffer.retreat(1);
                break;
            } else {
                self.token_text.push(ch);
            }
        }

        self.make_token(TokenType::StartModule)
    }

    /// Gather a triple-quoted string.  The closer is greedy: a run of three delimiters followed by
    /// yet another delimiter is treated as content, one character at a time, so strings may end in
    /// quote characters.
    fn transition_from_gather_triple_quote_string(
        &mut self,
        delimiter: char,
    ) -> error::Result<Option<Token>> {
        self.note_start_token();

        while let Some(ch) = self.buffer.peek() {
            if ch == delimiter && self.is_triple_quote_at(self.buffer.pos()) {
                if self.buffer.char_at(self.buffer.pos() + 3) == Some(delimiter) {
                    // Advance by one to catch overlapping closing sequences.
                    self.buffer.advance(1);
                    self.token_text.push(delimiter);
                    continue;
                }

                self.buffer.advance(3);
                return Ok(Some(self.make_token(TokenType::String)));
            }

            self.buffer.advance(1);
            self.token_text.push(ch);
        }

        if self.streaming {
            return Ok(None);
        }

        Err(ScriptError::new(ErrorKind::UnterminatedString).with_location(self.token_location()))
    }

    /// Gather a single-quoted string, terminated by the first occurrence of the opening
    /// delimiter.  There is no escape processing.
    fn transition_from_gather_string(&mut self, delimiter: char) -> error::Result<Option<Token>> {
        self.note_start_token();

        while let Some(ch) = self.buffer.peek() {
            self.buffer.advance(1);

            if ch == delimiter {
                return Ok(Some(self.make_token(TokenType::String)));
            }

            self.token_text.push(ch);
        }

        if self.streaming {
            return Ok(None);
        }

        Err(ScriptError::new(ErrorKind::UnterminatedString).with_location(self.token_location()))
    }

    /// Gather a word.  Words end at whitespace or at one of `;`, `{`, `}`, `#`, `[`, `]`.
    ///
    /// The one exception: a `[` seen after the word has already picked up a `T` is taken to start
    /// an RFC 9557 timezone suffix, and everything up to and including the next `]` becomes part
    /// of the word.  This keeps `2025-05-20T08:00:00[America/Los_Angeles]` a single token.
    fn transition_from_gather_word(&mut self) -> Token {
        self.note_start_token();

        while let Some(ch) = self.buffer.peek() {
            self.buffer.advance(1);

            if Self::is_whitespace(ch) {
                break;
            }

            if matches!(ch, ';' | '{' | '}' | '#') {
                self.buffer.retreat(1);
                break;
            }

            if ch == '[' {
                if self.token_text.contains('T') {
                    self.token_text.push(ch);

                    while let Some(tz_ch) = self.buffer.peek() {
                        self.buffer.advance(1);
                        self.token_text.push(tz_ch);

                        if tz_ch == ']' {
                            break;
                        }
                    }

                    break;
                }

                self.buffer.retreat(1);
                break;
            }

            if ch == ']' {
                self.buffer.retreat(1);
                break;
            }

            self.token_text.push(ch);
        }

        self.make_token(TokenType::Word)
    }

    /// Gather a dot-symbol.  The lexeme is the text after the dot; a lone `.` is produced as a
    /// word instead.
    fn transition_from_gather_dot_symbol(&mut self) -> Token {
        self.note_start_token();

        let mut full_text = String::new();

        while let Some(ch) = self.buffer.peek() {
            self.buffer.advance(1);

            if Self::is_whitespace(ch) {
                break;
            }

            if matches!(ch, ';' | '[' | ']' | '{' | '}' | '#') {
                self.buffer.retreat(1);
                break;
            }

            full_text.push(ch);
            self.token_text.push(ch);
        }

        // A dot with nothing after it is just a word.
        if full_text.chars().count() < 2 {
            return Token::new(TokenType::Word, full_text, self.token_location());
        }

        let symbol = full_text[1..].to_string();
        Token::new(TokenType::DotSymbol, symbol, self.token_location())
    }
}
