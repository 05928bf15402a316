use smol_str::SmolStr;

use crate::{Shared, range::Position};

pub type Ident = SmolStr;
pub type Program = Vec<Shared<Stmt>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclKind {
    Var,
    Let,
    Const,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SwitchCase {
    /// `None` for the `default` clause.
    pub test: Option<Expr>,
    pub body: Program,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    Declaration(DeclKind, Vec<(Ident, Option<Expr>)>),
    Function(Shared<FunctionDecl>),
    Expr(Expr),
    If(Expr, Shared<Stmt>, Option<Shared<Stmt>>),
    While(Expr, Shared<Stmt>),
    DoWhile(Shared<Stmt>, Expr),
    For {
        init: Option<Shared<Stmt>>,
        test: Option<Expr>,
        update: Option<Expr>,
        body: Shared<Stmt>,
    },
    ForIn {
        decl: Option<DeclKind>,
        name: Ident,
        iterable: Expr,
        body: Shared<Stmt>,
        /// `true` for `for...of`, `false` for `for...in`.
        values: bool,
    },
    Switch(Expr, Vec<SwitchCase>),
    Block(Program),
    Return(Option<Expr>),
    Break,
    Continue,
    Throw(Expr),
    Try {
        block: Program,
        param: Option<Ident>,
        handler: Option<Program>,
        finalizer: Option<Program>,
    },
    Empty,
}

impl Stmt {
    /// Whether the debugger is consulted before this statement runs.
    pub fn is_steppable(&self) -> bool {
        !matches!(
            self.kind,
            StmtKind::Block(_) | StmtKind::Function(_) | StmtKind::Empty
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FunctionBody {
    Block(Program),
    /// Concise arrow function body.
    Expr(Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    pub name: Option<Ident>,
    pub params: Vec<Ident>,
    pub body: FunctionBody,
    pub is_arrow: bool,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PropertyKey {
    Static(Ident),
    Computed(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub enum TemplateSegment {
    Text(String),
    Expr(Expr),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Negate,
    Plus,
    Typeof,
    Void,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    NotEq,
    StrictEq,
    StrictNotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    In,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
    Nullish,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl AssignOp {
    pub fn binary_op(&self) -> Option<BinaryOp> {
        match self {
            AssignOp::Assign => None,
            AssignOp::Add => Some(BinaryOp::Add),
            AssignOp::Sub => Some(BinaryOp::Sub),
            AssignOp::Mul => Some(BinaryOp::Mul),
            AssignOp::Div => Some(BinaryOp::Div),
            AssignOp::Rem => Some(BinaryOp::Rem),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub position: Position,
}

impl Expr {
    pub fn new(kind: ExprKind, position: Position) -> Self {
        Self { kind, position }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Number(f64),
    String(SmolStr),
    Template(Vec<TemplateSegment>),
    Bool(bool),
    Null,
    Ident(Ident),
    This,
    Array(Vec<Expr>),
    Object(Vec<(PropertyKey, Expr)>),
    Function(Shared<FunctionDecl>),
    Unary(UnaryOp, Box<Expr>),
    Update {
        increment: bool,
        prefix: bool,
        target: Box<Expr>,
    },
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Logical(LogicalOp, Box<Expr>, Box<Expr>),
    Assign(AssignOp, Box<Expr>, Box<Expr>),
    Conditional(Box<Expr>, Box<Expr>, Box<Expr>),
    Member(Box<Expr>, Ident),
    Index(Box<Expr>, Box<Expr>),
    Call(Box<Expr>, Vec<Expr>),
    New(Box<Expr>, Vec<Expr>),
}
