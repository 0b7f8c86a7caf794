/// Tokenizer for the strict-mode script subset.
///
/// Hand-rolled single-pass scanner: keywords, identifiers, decimal / hex /
/// exponent numbers, single- and double-quoted strings with the usual
/// escapes, line and block comments, and every operator the grammar needs.
/// Lines are tracked for SyntaxError messages.
use crate::errors::JsError;
use once_cell::sync::Lazy;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Keywords
    Var,
    Let,
    Const,
    Function,
    Return,
    If,
    Else,
    While,
    For,
    In,
    Of,
    New,
    Delete,
    TypeOf,
    Void,
    This,
    True,
    False,
    Null,
    Throw,
    Try,
    Catch,
    Finally,
    Break,
    Continue,

    // Literals
    Num(f64),
    Str(String),
    Ident(String),

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Assign,
    PlusAssign,
    MinusAssign,
    StarAssign,
    SlashAssign,
    PercentAssign,
    EqEq,
    NotEq,
    StrictEq,
    StrictNotEq,
    Less,
    LessEq,
    Greater,
    GreaterEq,
    AndAnd,
    OrOr,
    Not,
    BitAnd,
    BitOr,
    BitXor,
    BitNot,
    Shl,
    Shr,
    UShr,
    PlusPlus,
    MinusMinus,
    Arrow,
    Question,
    Colon,

    // Delimiters
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Semicolon,
    Dot,

    Eof,
}

static KEYWORDS: Lazy<HashMap<&'static str, Token>> = Lazy::new(|| {
    let mut m = HashMap::new();
    m.insert("var", Token::Var);
    m.insert("let", Token::Let);
    m.insert("const", Token::Const);
    m.insert("function", Token::Function);
    m.insert("return", Token::Return);
    m.insert("if", Token::If);
    m.insert("else", Token::Else);
    m.insert("while", Token::While);
    m.insert("for", Token::For);
    m.insert("in", Token::In);
    m.insert("of", Token::Of);
    m.insert("new", Token::New);
    m.insert("delete", Token::Delete);
    m.insert("typeof", Token::TypeOf);
    m.insert("void", Token::Void);
    m.insert("this", Token::This);
    m.insert("true", Token::True);
    m.insert("false", Token::False);
    m.insert("null", Token::Null);
    m.insert("throw", Token::Throw);
    m.insert("try", Token::Try);
    m.insert("catch", Token::Catch);
    m.insert("finally", Token::Finally);
    m.insert("break", Token::Break);
    m.insert("continue", Token::Continue);
    m
});

pub struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: u32,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Lexer {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<(Token, u32)>, JsError> {
        let mut out = Vec::new();
        loop {
            self.skip_trivia()?;
            let line = self.line;
            match self.next_token()? {
                Token::Eof => {
                    out.push((Token::Eof, line));
                    return Ok(out);
                }
                t => out.push((t, line)),
            }
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek2(&self) -> Option<char> {
        self.chars.get(self.pos + 1).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if let Some(ch) = c {
            self.pos += 1;
            if ch == '\n' {
                self.line += 1;
            }
        }
        c
    }

    fn err(&self, msg: impl Into<String>) -> JsError {
        JsError::Syntax(format!("{} (line {})", msg.into(), self.line))
    }

    fn skip_trivia(&mut self) -> Result<(), JsError> {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some('/') if self.peek2() == Some('/') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                Some('/') if self.peek2() == Some('*') => {
                    self.bump();
                    self.bump();
                    loop {
                        match self.bump() {
                            Some('*') if self.peek() == Some('/') => {
                                self.bump();
                                break;
                            }
                            Some(_) => {}
                            None => return Err(self.err("unterminated block comment")),
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn next_token(&mut self) -> Result<Token, JsError> {
        let Some(c) = self.peek() else {
            return Ok(Token::Eof);
        };

        if c.is_ascii_digit() || (c == '.' && self.peek2().map_or(false, |d| d.is_ascii_digit())) {
            return self.number();
        }
        if c == '"' || c == '\'' {
            return self.string(c);
        }
        if c.is_alphabetic() || c == '_' || c == '$' {
            return Ok(self.ident_or_keyword());
        }

        self.bump();
        let tok = match c {
            '+' => match self.peek() {
                Some('+') => {
                    self.bump();
                    Token::PlusPlus
                }
                Some('=') => {
                    self.bump();
                    Token::PlusAssign
                }
                _ => Token::Plus,
            },
            '-' => match self.peek() {
                Some('-') => {
                    self.bump();
                    Token::MinusMinus
                }
                Some('=') => {
                    self.bump();
                    Token::MinusAssign
                }
                _ => Token::Minus,
            },
            '*' => match self.peek() {
                Some('=') => {
                    self.bump();
                    Token::StarAssign
                }
                _ => Token::Star,
            },
            '/' => match self.peek() {
                Some('=') => {
                    self.bump();
                    Token::SlashAssign
                }
                _ => Token::Slash,
            },
            '%' => match self.peek() {
                Some('=') => {
                    self.bump();
                    Token::PercentAssign
                }
                _ => Token::Percent,
            },
            '=' => match self.peek() {
                Some('=') => {
                    self.bump();
                    if self.peek() == Some('=') {
                        self.bump();
                        Token::StrictEq
                    } else {
                        Token::EqEq
                    }
                }
                Some('>') => {
                    self.bump();
                    Token::Arrow
                }
                _ => Token::Assign,
            },
            '!' => match self.peek() {
                Some('=') => {
                    self.bump();
                    if self.peek() == Some('=') {
                        self.bump();
                        Token::StrictNotEq
                    } else {
                        Token::NotEq
                    }
                }
                _ => Token::Not,
            },
            '<' => match self.peek() {
                Some('=') => {
                    self.bump();
                    Token::LessEq
                }
                Some('<') => {
                    self.bump();
                    Token::Shl
                }
                _ => Token::Less,
            },
            '>' => match self.peek() {
                Some('=') => {
                    self.bump();
                    Token::GreaterEq
                }
                Some('>') => {
                    self.bump();
                    if self.peek() == Some('>') {
                        self.bump();
                        Token::UShr
                    } else {
                        Token::Shr
                    }
                }
                _ => Token::Greater,
            },
            '&' => match self.peek() {
                Some('&') => {
                    self.bump();
                    Token::AndAnd
                }
                _ => Token::BitAnd,
            },
            '|' => match self.peek() {
                Some('|') => {
                    self.bump();
                    Token::OrOr
                }
                _ => Token::BitOr,
            },
            '^' => Token::BitXor,
            '~' => Token::BitNot,
            '?' => Token::Question,
            ':' => Token::Colon,
            '(' => Token::LParen,
            ')' => Token::RParen,
            '{' => Token::LBrace,
            '}' => Token::RBrace,
            '[' => Token::LBracket,
            ']' => Token::RBracket,
            ',' => Token::Comma,
            ';' => Token::Semicolon,
            '.' => Token::Dot,
            other => return Err(self.err(format!("unexpected character '{}'", other))),
        };
        Ok(tok)
    }

    fn number(&mut self) -> Result<Token, JsError> {
        let start = self.pos;
        if self.peek() == Some('0') && matches!(self.peek2(), Some('x') | Some('X')) {
            self.bump();
            self.bump();
            let digits_start = self.pos;
            while self.peek().map_or(false, |c| c.is_ascii_hexdigit()) {
                self.bump();
            }
            if self.pos == digits_start {
                return Err(self.err("missing hexadecimal digits"));
            }
            let text: String = self.chars[digits_start..self.pos].iter().collect();
            let n = u64::from_str_radix(&text, 16)
                .map_err(|_| self.err(format!("invalid number '0x{}'", text)))?;
            return Ok(Token::Num(n as f64));
        }

        while self.peek().map_or(false, |c| c.is_ascii_digit()) {
            self.bump();
        }
        if self.peek() == Some('.') {
            self.bump();
            while self.peek().map_or(false, |c| c.is_ascii_digit()) {
                self.bump();
            }
        }
        if matches!(self.peek(), Some('e') | Some('E')) {
            self.bump();
            if matches!(self.peek(), Some('+') | Some('-')) {
                self.bump();
            }
            let exp_start = self.pos;
            while self.peek().map_or(false, |c| c.is_ascii_digit()) {
                self.bump();
            }
            if self.pos == exp_start {
                return Err(self.err("missing exponent digits"));
            }
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        text.parse::<f64>()
            .map(Token::Num)
            .map_err(|_| self.err(format!("invalid number '{}'", text)))
    }

    fn string(&mut self, quote: char) -> Result<Token, JsError> {
        self.bump();
        let mut s = String::new();
        loop {
            match self.bump() {
                None | Some('\n') => return Err(self.err("unterminated string literal")),
                Some(c) if c == quote => return Ok(Token::Str(s)),
                Some('\\') => match self.bump() {
                    Some('n') => s.push('\n'),
                    Some('t') => s.push('\t'),
                    Some('r') => s.push('\r'),
                    Some('b') => s.push('\u{8}'),
                    Some('f') => s.push('\u{c}'),
                    Some('v') => s.push('\u{b}'),
                    Some('0') => s.push('\0'),
                    Some('x') => {
                        let code = self.hex_digits(2)?;
                        s.push(char::from_u32(code).unwrap_or('\u{FFFD}'));
                    }
                    Some('u') => {
                        let code = self.hex_digits(4)?;
                        s.push(char::from_u32(code).unwrap_or('\u{FFFD}'));
                    }
                    Some('\n') => {}
                    Some(other) => s.push(other),
                    None => return Err(self.err("unterminated string literal")),
                },
                Some(c) => s.push(c),
            }
        }
    }

    fn hex_digits(&mut self, count: usize) -> Result<u32, JsError> {
        let mut code = 0u32;
        for _ in 0..count {
            let Some(c) = self.bump().and_then(|c| c.to_digit(16)) else {
                return Err(self.err("invalid escape sequence"));
            };
            code = code * 16 + c;
        }
        Ok(code)
    }

    fn ident_or_keyword(&mut self) -> Token {
        let start = self.pos;
        while self
            .peek()
            .map_or(false, |c| c.is_alphanumeric() || c == '_' || c == '$')
        {
            self.bump();
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        match KEYWORDS.get(text.as_str()) {
            Some(t) => t.clone(),
            None => Token::Ident(text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(src: &str) -> Vec<Token> {
        Lexer::new(src)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|(t, _)| t)
            .collect()
    }

    #[test]
    fn keywords_and_idents() {
        assert_eq!(
            toks("let x of"),
            vec![Token::Let, Token::Ident("x".into()), Token::Of, Token::Eof]
        );
    }

    #[test]
    fn numbers() {
        assert_eq!(toks("42"), vec![Token::Num(42.0), Token::Eof]);
        assert_eq!(toks("3.5e2"), vec![Token::Num(350.0), Token::Eof]);
        assert_eq!(toks("0xff"), vec![Token::Num(255.0), Token::Eof]);
    }

    #[test]
    fn strings_with_escapes() {
        assert_eq!(
            toks(r#"'a\nb' "A""#),
            vec![Token::Str("a\nb".into()), Token::Str("A".into()), Token::Eof]
        );
    }

    #[test]
    fn multi_char_operators() {
        assert_eq!(
            toks("=== !== => >>> <= ++"),
            vec![
                Token::StrictEq,
                Token::StrictNotEq,
                Token::Arrow,
                Token::UShr,
                Token::LessEq,
                Token::PlusPlus,
                Token::Eof
            ]
        );
    }

    #[test]
    fn comments_are_skipped() {
        assert_eq!(
            toks("1 // one\n/* two */ 2"),
            vec![Token::Num(1.0), Token::Num(2.0), Token::Eof]
        );
    }

    #[test]
    fn unterminated_string_is_syntax_error() {
        assert!(matches!(
            Lexer::new("'oops").tokenize(),
            Err(JsError::Syntax(_))
        ));
    }
}
