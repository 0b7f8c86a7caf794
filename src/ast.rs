/// Expression / statement tree produced by the parser.
///
/// Property keys and identifiers are interned to atoms at parse time;
/// function bodies are shared behind `Rc` so closures can reference them
/// from heap-resident function objects without duplicating the tree.
use crate::atom::Atom;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclKind {
    Var,
    Let,
    Const,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Lt,
    Le,
    Gt,
    Ge,
    EqEq,
    NotEq,
    StrictEq,
    StrictNotEq,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    UShr,
    In,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Plus,
    Not,
    BitNot,
    TypeOf,
    Void,
}

#[derive(Debug, Clone)]
pub struct FuncLit {
    pub name: Option<Atom>,
    pub params: Vec<Atom>,
    pub body: Rc<Vec<Stmt>>,
    pub is_arrow: bool,
}

#[derive(Debug, Clone)]
pub enum Expr {
    Num(f64),
    Str(String),
    Bool(bool),
    Null,
    This,
    Ident(Atom),
    ArrayLit(Vec<Expr>),
    ObjectLit(Vec<(Atom, Expr)>),
    Member {
        obj: Box<Expr>,
        prop: Atom,
    },
    Index {
        obj: Box<Expr>,
        index: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    New {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Assign {
        op: Option<BinOp>,
        target: Box<Expr>,
        value: Box<Expr>,
    },
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Logical {
        op: LogicalOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Update {
        inc: bool,
        prefix: bool,
        target: Box<Expr>,
    },
    Cond {
        cond: Box<Expr>,
        cons: Box<Expr>,
        alt: Box<Expr>,
    },
    Delete(Box<Expr>),
    Func(FuncLit),
}

#[derive(Debug, Clone)]
pub enum Stmt {
    Expr(Expr),
    Decl {
        kind: DeclKind,
        bindings: Vec<(Atom, Option<Expr>)>,
    },
    FuncDecl(FuncLit),
    If {
        cond: Expr,
        cons: Box<Stmt>,
        alt: Option<Box<Stmt>>,
    },
    While {
        cond: Expr,
        body: Box<Stmt>,
    },
    For {
        init: Option<Box<Stmt>>,
        cond: Option<Expr>,
        update: Option<Expr>,
        body: Box<Stmt>,
    },
    ForIn {
        kind: Option<DeclKind>,
        name: Atom,
        object: Expr,
        body: Box<Stmt>,
    },
    ForOf {
        kind: Option<DeclKind>,
        name: Atom,
        iterable: Expr,
        body: Box<Stmt>,
    },
    Return(Option<Expr>),
    Throw(Expr),
    Break,
    Continue,
    Try {
        block: Vec<Stmt>,
        param: Option<Atom>,
        handler: Option<Vec<Stmt>>,
        finalizer: Option<Vec<Stmt>>,
    },
    Block(Vec<Stmt>),
    Empty,
}
