use std::fmt::{self, Display, Formatter};

use smol_str::SmolStr;

use crate::range::Position;

#[derive(Debug, Clone, PartialEq)]
pub enum TemplatePart {
    Text(String),
    /// Raw source of a `${...}` substitution and where it starts.
    Code(String, Position),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub position: Position,
    /// Whether a line terminator separates this token from the previous one.
    pub newline_before: bool,
}

impl Token {
    pub fn new(kind: TokenKind, position: Position) -> Self {
        Self {
            kind,
            position,
            newline_before: false,
        }
    }

    #[inline(always)]
    pub fn is_eof(&self) -> bool {
        matches!(self.kind, TokenKind::Eof)
    }
}

impl Display for Token {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // literals
    Number(f64),
    String(String),
    Template(Vec<TemplatePart>),
    Ident(SmolStr),

    // keywords
    Break,
    Case,
    Catch,
    Const,
    Continue,
    Default,
    Delete,
    Do,
    Else,
    False,
    Finally,
    For,
    Function,
    If,
    In,
    Let,
    New,
    Null,
    Return,
    Switch,
    This,
    Throw,
    True,
    Try,
    Typeof,
    Var,
    Void,
    While,

    // punctuators
    Arrow,
    Bang,
    Colon,
    Comma,
    Dot,
    Eq,
    EqEq,
    EqEqEq,
    Gt,
    GtEq,
    LBrace,
    LBracket,
    LParen,
    Lt,
    LtEq,
    Minus,
    MinusEq,
    MinusMinus,
    NotEq,
    NotEqEq,
    AndAnd,
    OrOr,
    Percent,
    PercentEq,
    Plus,
    PlusEq,
    PlusPlus,
    Question,
    QuestionQuestion,
    RBrace,
    RBracket,
    RParen,
    SemiColon,
    Slash,
    SlashEq,
    Star,
    StarEq,
    Eof,
}

impl TokenKind {
    pub fn keyword(name: &str) -> Option<TokenKind> {
        let kind = match name {
            "break" => TokenKind::Break,
            "case" => TokenKind::Case,
            "catch" => TokenKind::Catch,
            "const" => TokenKind::Const,
            "continue" => TokenKind::Continue,
            "default" => TokenKind::Default,
            "delete" => TokenKind::Delete,
            "do" => TokenKind::Do,
            "else" => TokenKind::Else,
            "false" => TokenKind::False,
            "finally" => TokenKind::Finally,
            "for" => TokenKind::For,
            "function" => TokenKind::Function,
            "if" => TokenKind::If,
            "in" => TokenKind::In,
            "let" => TokenKind::Let,
            "new" => TokenKind::New,
            "null" => TokenKind::Null,
            "return" => TokenKind::Return,
            "switch" => TokenKind::Switch,
            "this" => TokenKind::This,
            "throw" => TokenKind::Throw,
            "true" => TokenKind::True,
            "try" => TokenKind::Try,
            "typeof" => TokenKind::Typeof,
            "var" => TokenKind::Var,
            "void" => TokenKind::Void,
            "while" => TokenKind::While,
            _ => return None,
        };

        Some(kind)
    }

    /// Text of fixed-spelling tokens, longest punctuators first.
    pub fn text(&self) -> Option<&'static str> {
        let text = match self {
            TokenKind::Break => "break",
            TokenKind::Case => "case",
            TokenKind::Catch => "catch",
            TokenKind::Const => "const",
            TokenKind::Continue => "continue",
            TokenKind::Default => "default",
            TokenKind::Delete => "delete",
            TokenKind::Do => "do",
            TokenKind::Else => "else",
            TokenKind::False => "false",
            TokenKind::Finally => "finally",
            TokenKind::For => "for",
            TokenKind::Function => "function",
            TokenKind::If => "if",
            TokenKind::In => "in",
            TokenKind::Let => "let",
            TokenKind::New => "new",
            TokenKind::Null => "null",
            TokenKind::Return => "return",
            TokenKind::Switch => "switch",
            TokenKind::This => "this",
            TokenKind::Throw => "throw",
            TokenKind::True => "true",
            TokenKind::Try => "try",
            TokenKind::Typeof => "typeof",
            TokenKind::Var => "var",
            TokenKind::Void => "void",
            TokenKind::While => "while",
            TokenKind::Arrow => "=>",
            TokenKind::Bang => "!",
            TokenKind::Colon => ":",
            TokenKind::Comma => ",",
            TokenKind::Dot => ".",
            TokenKind::Eq => "=",
            TokenKind::EqEq => "==",
            TokenKind::EqEqEq => "===",
            TokenKind::Gt => ">",
            TokenKind::GtEq => ">=",
            TokenKind::LBrace => "{",
            TokenKind::LBracket => "[",
            TokenKind::LParen => "(",
            TokenKind::Lt => "<",
            TokenKind::LtEq => "<=",
            TokenKind::Minus => "-",
            TokenKind::MinusEq => "-=",
            TokenKind::MinusMinus => "--",
            TokenKind::NotEq => "!=",
            TokenKind::NotEqEq => "!==",
            TokenKind::AndAnd => "&&",
            TokenKind::OrOr => "||",
            TokenKind::Percent => "%",
            TokenKind::PercentEq => "%=",
            TokenKind::Plus => "+",
            TokenKind::PlusEq => "+=",
            TokenKind::PlusPlus => "++",
            TokenKind::Question => "?",
            TokenKind::QuestionQuestion => "??",
            TokenKind::RBrace => "}",
            TokenKind::RBracket => "]",
            TokenKind::RParen => ")",
            TokenKind::SemiColon => ";",
            TokenKind::Slash => "/",
            TokenKind::SlashEq => "/=",
            TokenKind::Star => "*",
            TokenKind::StarEq => "*=",
            TokenKind::Number(_)
            | TokenKind::String(_)
            | TokenKind::Template(_)
            | TokenKind::Ident(_)
            | TokenKind::Eof => return None,
        };

        Some(text)
    }
}

impl Display for TokenKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Number(n) => write!(f, "{}", n),
            TokenKind::String(s) => write!(f, "{:?}", s),
            TokenKind::Template(_) => write!(f, "template literal"),
            TokenKind::Ident(name) => write!(f, "{}", name),
            TokenKind::Eof => write!(f, "end of input"),
            kind => write!(f, "{}", kind.text().unwrap_or_default()),
        }
    }
}
