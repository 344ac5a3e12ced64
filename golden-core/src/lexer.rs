//! Lexer for the Go subset accepted by golden.
//!
//! The lexer recognizes keywords, literals and the full Go operator set,
//! and performs Go's automatic semicolon insertion so the parser only ever
//! sees explicit statement terminators.

use crate::error::CoreError;

/// Kind of a token produced by the lexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    // Special
    Eof,

    // Identifiers and literals
    Ident,
    IntLiteral,
    FloatLiteral,
    StringLiteral,
    CharLiteral,

    // Punctuation
    LParen,   // (
    RParen,   // )
    LBrace,   // {
    RBrace,   // }
    LBracket, // [
    RBracket, // ]
    Comma,    // ,
    Semi,     // ; (explicit or inserted)
    Colon,    // :
    Dot,      // .
    Ellipsis, // ...

    // Operators
    Plus,     // +
    Minus,    // -
    Star,     // *
    Slash,    // /
    Percent,  // %
    Amp,      // &
    Pipe,     // |
    Caret,    // ^
    Shl,      // <<
    Shr,      // >>
    AmpCaret, // &^
    LogAnd,   // &&
    LogOr,    // ||
    Arrow,    // <-
    Inc,      // ++
    Dec,      // --
    EqEq,     // ==
    NotEq,    // !=
    Less,     // <
    LessEq,   // <=
    Greater,  // >
    GreaterEq, // >=
    Not,      // !
    Assign,   // =
    Define,   // :=
    AddAssign,
    SubAssign,
    MulAssign,
    QuoAssign,
    RemAssign,
    AndAssign,
    OrAssign,
    XorAssign,
    ShlAssign,
    ShrAssign,
    AndNotAssign,

    // Keywords
    Break,
    Case,
    Chan,
    Const,
    Continue,
    Default,
    Defer,
    Else,
    Fallthrough,
    For,
    Func,
    Go,
    Goto,
    If,
    Import,
    Interface,
    Map,
    Package,
    Range,
    Return,
    Select,
    Struct,
    Switch,
    Type,
    Var,
}

impl TokenKind {
    /// Whether a newline directly after this token terminates the statement.
    fn ends_statement(self) -> bool {
        matches!(
            self,
            TokenKind::Ident
                | TokenKind::IntLiteral
                | TokenKind::FloatLiteral
                | TokenKind::StringLiteral
                | TokenKind::CharLiteral
                | TokenKind::Break
                | TokenKind::Continue
                | TokenKind::Fallthrough
                | TokenKind::Return
                | TokenKind::Inc
                | TokenKind::Dec
                | TokenKind::RParen
                | TokenKind::RBracket
                | TokenKind::RBrace
        )
    }
}

/// A single token with its kind and byte offsets into the source.
///
/// Literal tokens cover the whole literal, quotes included, so the
/// translator can re-emit them verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text_start: u32,
    pub text_end: u32,
}

impl Token {
    pub fn text<'src>(&self, source: &'src str) -> &'src str {
        &source[self.text_start as usize..self.text_end as usize]
    }
}

/// Lex a source string into tokens, ending with a single `Eof`.
pub fn lex(source: &str) -> Result<Vec<Token>, CoreError> {
    let mut lexer = Lexer {
        source,
        chars: source.as_bytes(),
        len: source.len(),
        index: 0,
        tokens: Vec::new(),
    };
    lexer.run()?;
    Ok(lexer.tokens)
}

struct Lexer<'src> {
    source: &'src str,
    chars: &'src [u8],
    len: usize,
    index: usize,
    tokens: Vec<Token>,
}

impl<'src> Lexer<'src> {
    fn run(&mut self) -> Result<(), CoreError> {
        while let Some(ch) = self.peek_char() {
            if ch == b'\n' {
                self.insert_semicolon();
                self.consume_char();
                continue;
            }
            if is_whitespace(ch) {
                self.consume_char();
                continue;
            }

            let start = self.index as u32;
            match ch {
                b'/' if self.peek_next() == Some(b'/') => {
                    while let Some(c) = self.peek_char() {
                        if c == b'\n' {
                            break;
                        }
                        self.consume_char();
                    }
                }
                b'/' if self.peek_next() == Some(b'*') => self.skip_block_comment(start)?,
                b'"' => self.lex_string(start)?,
                b'`' => self.lex_raw_string(start)?,
                b'\'' => self.lex_char(start)?,
                b'0'..=b'9' => self.lex_number(start),
                b'.' if self.peek_next().is_some_and(|c| c.is_ascii_digit()) => {
                    self.lex_number(start)
                }
                _ if is_ident_start(ch) => self.lex_ident_or_keyword(start),
                _ => self.lex_operator(start)?,
            }
        }

        self.insert_semicolon();
        self.push(TokenKind::Eof, self.len as u32);
        Ok(())
    }

    fn insert_semicolon(&mut self) {
        if self.tokens.last().is_some_and(|tok| tok.kind.ends_statement()) {
            let at = self.index as u32;
            self.tokens.push(Token {
                kind: TokenKind::Semi,
                text_start: at,
                text_end: at,
            });
        }
    }

    fn push(&mut self, kind: TokenKind, start: u32) {
        self.tokens.push(Token {
            kind,
            text_start: start,
            text_end: self.index as u32,
        });
    }

    fn error(&self, position: u32, message: &str) -> CoreError {
        CoreError::LexError {
            position: position as usize,
            message: message.to_string(),
        }
    }

    fn skip_block_comment(&mut self, start: u32) -> Result<(), CoreError> {
        self.consume_char(); // '/'
        self.consume_char(); // '*'
        let mut saw_newline = false;
        loop {
            match self.peek_char() {
                Some(b'*') if self.peek_next() == Some(b'/') => {
                    self.consume_char();
                    self.consume_char();
                    break;
                }
                Some(c) => {
                    saw_newline |= c == b'\n';
                    self.consume_char();
                }
                None => return Err(self.error(start, "unterminated block comment")),
            }
        }
        if saw_newline {
            self.insert_semicolon();
        }
        Ok(())
    }

    fn lex_string(&mut self, start: u32) -> Result<(), CoreError> {
        self.consume_char(); // opening quote
        while let Some(ch) = self.peek_char() {
            match ch {
                b'"' => {
                    self.consume_char();
                    self.push(TokenKind::StringLiteral, start);
                    return Ok(());
                }
                b'\\' => {
                    self.consume_char();
                    if self.peek_char().is_some() {
                        self.consume_char();
                    }
                }
                b'\n' => break,
                _ => self.consume_char(),
            }
        }
        Err(self.error(start, "unterminated string literal"))
    }

    fn lex_raw_string(&mut self, start: u32) -> Result<(), CoreError> {
        self.consume_char(); // opening backquote
        while let Some(ch) = self.peek_char() {
            self.consume_char();
            if ch == b'`' {
                self.push(TokenKind::StringLiteral, start);
                return Ok(());
            }
        }
        Err(self.error(start, "unterminated raw string literal"))
    }

    fn lex_char(&mut self, start: u32) -> Result<(), CoreError> {
        self.consume_char(); // opening quote
        while let Some(ch) = self.peek_char() {
            match ch {
                b'\'' => {
                    self.consume_char();
                    self.push(TokenKind::CharLiteral, start);
                    return Ok(());
                }
                b'\\' => {
                    self.consume_char();
                    if self.peek_char().is_some() {
                        self.consume_char();
                    }
                }
                b'\n' => break,
                _ => self.consume_char(),
            }
        }
        Err(self.error(start, "unterminated rune literal"))
    }

    fn lex_number(&mut self, start: u32) {
        let mut is_float = false;
        let radix_prefixed = self.peek_char() == Some(b'0')
            && matches!(
                self.peek_next(),
                Some(b'x' | b'X' | b'b' | b'B' | b'o' | b'O')
            );

        if radix_prefixed {
            self.consume_char();
            self.consume_char();
            while self
                .peek_char()
                .is_some_and(|c| c.is_ascii_hexdigit() || c == b'_')
            {
                self.consume_char();
            }
        } else {
            self.consume_digits();
            if self.peek_char() == Some(b'.') {
                is_float = true;
                self.consume_char();
                self.consume_digits();
            }
            if matches!(self.peek_char(), Some(b'e' | b'E')) {
                is_float = true;
                self.consume_char();
                if matches!(self.peek_char(), Some(b'+' | b'-')) {
                    self.consume_char();
                }
                self.consume_digits();
            }
        }

        let kind = if is_float {
            TokenKind::FloatLiteral
        } else {
            TokenKind::IntLiteral
        };
        self.push(kind, start);
    }

    fn consume_digits(&mut self) {
        while self
            .peek_char()
            .is_some_and(|c| c.is_ascii_digit() || c == b'_')
        {
            self.consume_char();
        }
    }

    fn lex_ident_or_keyword(&mut self, start: u32) {
        while self.peek_char().is_some_and(is_ident_continue) {
            self.consume_char();
        }

        let text = &self.source[start as usize..self.index];
        let kind = match text {
            "break" => TokenKind::Break,
            "case" => TokenKind::Case,
            "chan" => TokenKind::Chan,
            "const" => TokenKind::Const,
            "continue" => TokenKind::Continue,
            "default" => TokenKind::Default,
            "defer" => TokenKind::Defer,
            "else" => TokenKind::Else,
            "fallthrough" => TokenKind::Fallthrough,
            "for" => TokenKind::For,
            "func" => TokenKind::Func,
            "go" => TokenKind::Go,
            "goto" => TokenKind::Goto,
            "if" => TokenKind::If,
            "import" => TokenKind::Import,
            "interface" => TokenKind::Interface,
            "map" => TokenKind::Map,
            "package" => TokenKind::Package,
            "range" => TokenKind::Range,
            "return" => TokenKind::Return,
            "select" => TokenKind::Select,
            "struct" => TokenKind::Struct,
            "switch" => TokenKind::Switch,
            "type" => TokenKind::Type,
            "var" => TokenKind::Var,
            _ => TokenKind::Ident,
        };
        self.push(kind, start);
    }

    fn lex_operator(&mut self, start: u32) -> Result<(), CoreError> {
        // Longest match first.
        const OPERATORS: &[(&str, TokenKind)] = &[
            ("&^=", TokenKind::AndNotAssign),
            ("<<=", TokenKind::ShlAssign),
            (">>=", TokenKind::ShrAssign),
            ("...", TokenKind::Ellipsis),
            ("&^", TokenKind::AmpCaret),
            ("&&", TokenKind::LogAnd),
            ("||", TokenKind::LogOr),
            ("<-", TokenKind::Arrow),
            ("++", TokenKind::Inc),
            ("--", TokenKind::Dec),
            ("==", TokenKind::EqEq),
            ("!=", TokenKind::NotEq),
            ("<=", TokenKind::LessEq),
            (">=", TokenKind::GreaterEq),
            (":=", TokenKind::Define),
            ("+=", TokenKind::AddAssign),
            ("-=", TokenKind::SubAssign),
            ("*=", TokenKind::MulAssign),
            ("/=", TokenKind::QuoAssign),
            ("%=", TokenKind::RemAssign),
            ("&=", TokenKind::AndAssign),
            ("|=", TokenKind::OrAssign),
            ("^=", TokenKind::XorAssign),
            ("<<", TokenKind::Shl),
            (">>", TokenKind::Shr),
            ("(", TokenKind::LParen),
            (")", TokenKind::RParen),
            ("{", TokenKind::LBrace),
            ("}", TokenKind::RBrace),
            ("[", TokenKind::LBracket),
            ("]", TokenKind::RBracket),
            (",", TokenKind::Comma),
            (";", TokenKind::Semi),
            (":", TokenKind::Colon),
            (".", TokenKind::Dot),
            ("+", TokenKind::Plus),
            ("-", TokenKind::Minus),
            ("*", TokenKind::Star),
            ("/", TokenKind::Slash),
            ("%", TokenKind::Percent),
            ("&", TokenKind::Amp),
            ("|", TokenKind::Pipe),
            ("^", TokenKind::Caret),
            ("<", TokenKind::Less),
            (">", TokenKind::Greater),
            ("!", TokenKind::Not),
            ("=", TokenKind::Assign),
        ];

        let rest = &self.chars[self.index..];
        for (text, kind) in OPERATORS {
            if rest.starts_with(text.as_bytes()) {
                self.index += text.len();
                self.push(*kind, start);
                return Ok(());
            }
        }
        Err(self.error(start, "unexpected character"))
    }

    fn peek_char(&self) -> Option<u8> {
        self.chars.get(self.index).copied()
    }

    fn peek_next(&self) -> Option<u8> {
        self.chars.get(self.index + 1).copied()
    }

    fn consume_char(&mut self) {
        if self.index < self.len {
            self.index += 1;
        }
    }
}

fn is_whitespace(ch: u8) -> bool {
    matches!(ch, b' ' | b'\t' | b'\n' | b'\r')
}

fn is_ident_start(ch: u8) -> bool {
    ch.is_ascii_alphabetic() || ch == b'_' || ch >= 0x80
}

fn is_ident_continue(ch: u8) -> bool {
    is_ident_start(ch) || ch.is_ascii_digit()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        lex(source)
            .expect("lex")
            .into_iter()
            .map(|tok| tok.kind)
            .collect()
    }

    #[test]
    fn inserts_semicolons_at_line_ends() {
        use TokenKind::*;
        assert_eq!(
            kinds("x := 1\nreturn\n"),
            vec![Ident, Define, IntLiteral, Semi, Return, Semi, Eof]
        );
    }

    #[test]
    fn does_not_insert_after_operators_or_commas() {
        use TokenKind::*;
        assert_eq!(kinds("a +\nb,\n"), vec![Ident, Plus, Ident, Comma, Eof]);
    }

    #[test]
    fn lexes_channel_and_compound_operators() {
        use TokenKind::*;
        assert_eq!(
            kinds("ch <- v &^= 1"),
            vec![Ident, Arrow, Ident, AndNotAssign, IntLiteral, Semi, Eof]
        );
    }

    #[test]
    fn keeps_literal_text_with_quotes() {
        let source = r#"s := "a\"b" + `raw`"#;
        let tokens = lex(source).expect("lex");
        let texts: Vec<_> = tokens
            .iter()
            .filter(|t| t.kind == TokenKind::StringLiteral)
            .map(|t| t.text(source))
            .collect();
        assert_eq!(texts, vec![r#""a\"b""#, "`raw`"]);
    }

    #[test]
    fn distinguishes_int_and_float_literals() {
        use TokenKind::*;
        assert_eq!(
            kinds("0x1F 9.5 1e3 42"),
            vec![IntLiteral, FloatLiteral, FloatLiteral, IntLiteral, Semi, Eof]
        );
    }

    #[test]
    fn multiline_block_comment_terminates_statement() {
        use TokenKind::*;
        assert_eq!(kinds("x /* a\n b */ y"), vec![Ident, Semi, Ident, Semi, Eof]);
    }

    #[test]
    fn reports_unterminated_string() {
        let err = lex("\"abc").unwrap_err();
        assert!(matches!(err, CoreError::LexError { position: 0, .. }));
    }
}
