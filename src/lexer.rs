use crate::ast::{AstNode, Position};
use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenType {
    Ident,
    Number,
    String,
    Symbol,
    LParen,
    RParen,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub typ: TokenType,
    pub value: String,
    pub pos: Position,
}

impl Token {
    /// Words and symbol runs become label text; everything else is a value.
    pub fn is_word(&self) -> bool {
        matches!(self.typ, TokenType::Ident | TokenType::Symbol)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexerError {
    pub message: String,
    pub pos: Position,
}

impl Display for LexerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} (line {}, column {})",
            self.message, self.pos.line, self.pos.column
        )
    }
}

impl Error for LexerError {}

pub struct Lexer<'a> {
    chars: Vec<char>,
    index: usize,
    line: usize,
    column: usize,
    _source: &'a str,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            chars: source.chars().collect(),
            index: 0,
            line: 1,
            column: 1,
            _source: source,
        }
    }

    pub fn tokenize(&mut self) -> Result<Vec<Token>, LexerError> {
        let mut tokens: Vec<Token> = Vec::new();
        while !self.at_end() {
            let ch = self.peek();
            if is_ignorable_format_char(ch) || ch.is_whitespace() {
                self.advance();
                continue;
            }
            if ch == '"' {
                tokens.push(self.read_string()?);
                continue;
            }
            if ch.is_ascii_digit() {
                tokens.push(self.read_number(false));
                continue;
            }
            if ch == '-' && self.peek_at(1).is_ascii_digit() && self.sign_allowed(tokens.last()) {
                tokens.push(self.read_number(true));
                continue;
            }
            if ch.is_alphabetic() || ch == '_' {
                tokens.push(self.read_identifier());
                continue;
            }
            let pos = self.pos();
            match ch {
                '(' => {
                    self.advance();
                    tokens.push(Token {
                        typ: TokenType::LParen,
                        value: "(".to_string(),
                        pos,
                    });
                }
                ')' => {
                    self.advance();
                    tokens.push(Token {
                        typ: TokenType::RParen,
                        value: ")".to_string(),
                        pos,
                    });
                }
                _ => tokens.push(self.read_symbol()),
            }
        }
        Ok(tokens)
    }

    // `-5` is a literal only at the start, after `(` or after a symbol.
    fn sign_allowed(&self, previous: Option<&Token>) -> bool {
        match previous {
            None => true,
            Some(tok) => matches!(tok.typ, TokenType::LParen | TokenType::Symbol),
        }
    }

    fn read_identifier(&mut self) -> Token {
        let pos = self.pos();
        let mut text = String::new();
        text.push(self.advance());
        while !self.at_end() {
            let ch = self.peek();
            if ch.is_alphanumeric() || ch == '_' || ch == '?' {
                text.push(self.advance());
            } else {
                break;
            }
        }
        Token {
            typ: TokenType::Ident,
            value: text,
            pos,
        }
    }

    // Digits and dots are taken greedily; the expression parser rejects
    // malformed numerals such as `1.2.3`.
    fn read_number(&mut self, negative: bool) -> Token {
        let pos = self.pos();
        let mut text = String::new();
        if negative {
            text.push(self.advance());
        }
        while !self.at_end() {
            let ch = self.peek();
            if ch.is_ascii_digit() || ch == '.' {
                text.push(self.advance());
            } else {
                break;
            }
        }
        Token {
            typ: TokenType::Number,
            value: text,
            pos,
        }
    }

    fn read_symbol(&mut self) -> Token {
        let pos = self.pos();
        let mut text = String::new();
        text.push(self.advance());
        while !self.at_end() {
            let ch = self.peek();
            if !is_symbol_char(ch) || (ch == '-' && self.peek_at(1).is_ascii_digit()) {
                break;
            }
            text.push(self.advance());
        }
        Token {
            typ: TokenType::Symbol,
            value: text,
            pos,
        }
    }

    fn read_string(&mut self) -> Result<Token, LexerError> {
        let pos = self.pos();
        self.advance();
        let mut out = String::new();
        while !self.at_end() {
            let ch = self.advance();
            if ch == '"' {
                return Ok(Token {
                    typ: TokenType::String,
                    value: out,
                    pos,
                });
            }
            if ch == '\\' {
                if self.at_end() {
                    break;
                }
                let esc = self.advance();
                let mapped = match esc {
                    '"' => '"',
                    '\\' => '\\',
                    'n' => '\n',
                    'r' => '\r',
                    't' => '\t',
                    _ => esc,
                };
                out.push(mapped);
                continue;
            }
            out.push(ch);
        }
        Err(LexerError {
            message: "Unterminated string literal".to_string(),
            pos,
        })
    }

    fn at_end(&self) -> bool {
        self.index >= self.chars.len()
    }

    fn peek(&self) -> char {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> char {
        self.chars.get(self.index + offset).copied().unwrap_or('\0')
    }

    fn advance(&mut self) -> char {
        let ch = self.chars[self.index];
        self.index += 1;
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        ch
    }

    fn pos(&self) -> Position {
        Position::new(self.line, self.column)
    }
}

/// Tokenizes `source` and nests parenthesized groups into branches. The
/// returned node is always a branch holding the top-level items.
pub fn lex_tree(source: &str) -> Result<AstNode, LexerError> {
    let tokens = Lexer::new(source).tokenize()?;
    let mut stack: Vec<(Vec<AstNode>, Position)> = vec![(Vec::new(), Position::new(1, 1))];
    for token in tokens {
        match token.typ {
            TokenType::LParen => stack.push((Vec::new(), token.pos)),
            TokenType::RParen => {
                if stack.len() < 2 {
                    return Err(LexerError {
                        message: "Unmatched ')'".to_string(),
                        pos: token.pos,
                    });
                }
                if let Some((children, open)) = stack.pop() {
                    if let Some((parent, _)) = stack.last_mut() {
                        parent.push(AstNode::Branch {
                            children,
                            open: Some(open),
                        });
                    }
                }
            }
            _ => {
                if let Some((parent, _)) = stack.last_mut() {
                    parent.push(AstNode::leaf(token));
                }
            }
        }
    }
    if stack.len() > 1 {
        if let Some((_, open_pos)) = stack.pop() {
            return Err(LexerError {
                message: "Unclosed '('".to_string(),
                pos: open_pos,
            });
        }
    }
    Ok(AstNode::Branch {
        children: stack.pop().map(|(root, _)| root).unwrap_or_default(),
        open: None,
    })
}

fn is_symbol_char(ch: char) -> bool {
    !(ch.is_whitespace()
        || ch.is_alphanumeric()
        || ch == '_'
        || ch == '"'
        || ch == '('
        || ch == ')'
        || is_ignorable_format_char(ch))
}

fn is_ignorable_format_char(ch: char) -> bool {
    matches!(
        ch,
        '\u{feff}' // BOM / zero width no-break space
            | '\u{200b}' // zero width space
            | '\u{200c}' // zero width non-joiner
            | '\u{200d}' // zero width joiner
            | '\u{2060}' // word joiner
    )
}
