// Recursive descent parser for the strict-mode script subset.
//
// Precedence climbing for expressions, one token of lookahead for
// statements, and a bounded token scan to tell parenthesized arrow
// parameter lists apart from grouping. Identifiers and property keys are
// interned during the parse so the evaluator never touches raw strings.
use crate::ast::{BinOp, DeclKind, Expr, FuncLit, LogicalOp, Stmt, UnaryOp};
use crate::atom::{Atom, AtomTable};
use crate::errors::JsError;
use crate::lexer::{Lexer, Token};
use crate::value::number_to_string;
use std::rc::Rc;

pub struct Parser<'a> {
    tokens: Vec<(Token, u32)>,
    pos: usize,
    atoms: &'a mut AtomTable,
}

impl<'a> Parser<'a> {
    pub fn new(source: &str, atoms: &'a mut AtomTable) -> Result<Self, JsError> {
        let tokens = Lexer::new(source).tokenize()?;
        Ok(Parser {
            tokens,
            pos: 0,
            atoms,
        })
    }

    pub fn parse(mut self) -> Result<Vec<Stmt>, JsError> {
        let mut stmts = Vec::new();
        while !self.check(&Token::Eof) {
            stmts.push(self.parse_stmt()?);
        }
        Ok(stmts)
    }

    // -----------------------------------------------------------------------
    // Token plumbing
    // -----------------------------------------------------------------------

    fn peek(&self) -> &Token {
        &self.tokens[self.pos].0
    }

    fn peek_nth(&self, n: usize) -> &Token {
        self.tokens
            .get(self.pos + n)
            .map(|(t, _)| t)
            .unwrap_or(&Token::Eof)
    }

    fn line(&self) -> u32 {
        self.tokens[self.pos].1
    }

    fn advance(&mut self) -> Token {
        let t = self.tokens[self.pos].0.clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        t
    }

    fn check(&self, t: &Token) -> bool {
        self.peek() == t
    }

    fn eat(&mut self, t: &Token) -> bool {
        if self.check(t) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, t: Token) -> Result<(), JsError> {
        if self.eat(&t) {
            Ok(())
        } else {
            Err(self.err(format!("expected {:?}, found {:?}", t, self.peek())))
        }
    }

    fn err(&self, msg: impl Into<String>) -> JsError {
        JsError::Syntax(format!("{} (line {})", msg.into(), self.line()))
    }

    fn ident(&mut self) -> Result<Atom, JsError> {
        match self.advance() {
            Token::Ident(name) => Ok(self.atoms.intern(&name)),
            other => Err(self.err(format!("expected identifier, found {:?}", other))),
        }
    }

    fn semi(&mut self) {
        while self.eat(&Token::Semicolon) {}
    }

    // -----------------------------------------------------------------------
    // Statements
    // -----------------------------------------------------------------------

    fn parse_stmt(&mut self) -> Result<Stmt, JsError> {
        match self.peek() {
            Token::Semicolon => {
                self.advance();
                Ok(Stmt::Empty)
            }
            Token::LBrace => {
                self.advance();
                let body = self.parse_block_body()?;
                Ok(Stmt::Block(body))
            }
            Token::Var | Token::Let | Token::Const => {
                let stmt = self.parse_decl()?;
                self.semi();
                Ok(stmt)
            }
            Token::Function => {
                self.advance();
                let name = self.ident()?;
                let func = self.parse_function_rest(Some(name))?;
                Ok(Stmt::FuncDecl(func))
            }
            Token::Return => {
                self.advance();
                let value = if matches!(self.peek(), Token::Semicolon | Token::RBrace | Token::Eof)
                {
                    None
                } else {
                    Some(self.parse_expr()?)
                };
                self.semi();
                Ok(Stmt::Return(value))
            }
            Token::Throw => {
                self.advance();
                let e = self.parse_expr()?;
                self.semi();
                Ok(Stmt::Throw(e))
            }
            Token::Break => {
                self.advance();
                self.semi();
                Ok(Stmt::Break)
            }
            Token::Continue => {
                self.advance();
                self.semi();
                Ok(Stmt::Continue)
            }
            Token::If => self.parse_if(),
            Token::While => {
                self.advance();
                self.expect(Token::LParen)?;
                let cond = self.parse_expr()?;
                self.expect(Token::RParen)?;
                let body = Box::new(self.parse_stmt()?);
                Ok(Stmt::While { cond, body })
            }
            Token::For => self.parse_for(),
            Token::Try => self.parse_try(),
            _ => {
                let e = self.parse_expr()?;
                self.semi();
                Ok(Stmt::Expr(e))
            }
        }
    }

    fn parse_block_body(&mut self) -> Result<Vec<Stmt>, JsError> {
        let mut body = Vec::new();
        while !self.check(&Token::RBrace) {
            if self.check(&Token::Eof) {
                return Err(self.err("unexpected end of input in block"));
            }
            body.push(self.parse_stmt()?);
        }
        self.expect(Token::RBrace)?;
        Ok(body)
    }

    fn decl_kind(&mut self) -> Option<DeclKind> {
        match self.peek() {
            Token::Var => {
                self.advance();
                Some(DeclKind::Var)
            }
            Token::Let => {
                self.advance();
                Some(DeclKind::Let)
            }
            Token::Const => {
                self.advance();
                Some(DeclKind::Const)
            }
            _ => None,
        }
    }

    fn parse_decl(&mut self) -> Result<Stmt, JsError> {
        let kind = self
            .decl_kind()
            .unwrap_or_else(|| unreachable!("caller checked declaration keyword"));
        let mut bindings = Vec::new();
        loop {
            let name = self.ident()?;
            let init = if self.eat(&Token::Assign) {
                Some(self.parse_assignment()?)
            } else {
                if kind == DeclKind::Const {
                    return Err(self.err("missing initializer in const declaration"));
                }
                None
            };
            bindings.push((name, init));
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        Ok(Stmt::Decl { kind, bindings })
    }

    fn parse_if(&mut self) -> Result<Stmt, JsError> {
        self.expect(Token::If)?;
        self.expect(Token::LParen)?;
        let cond = self.parse_expr()?;
        self.expect(Token::RParen)?;
        let cons = Box::new(self.parse_stmt()?);
        let alt = if self.eat(&Token::Else) {
            Some(Box::new(self.parse_stmt()?))
        } else {
            None
        };
        Ok(Stmt::If { cond, cons, alt })
    }

    fn parse_for(&mut self) -> Result<Stmt, JsError> {
        self.expect(Token::For)?;
        self.expect(Token::LParen)?;

        // for (;;) — empty init
        if self.eat(&Token::Semicolon) {
            return self.parse_for_classic(None);
        }

        if matches!(self.peek(), Token::Var | Token::Let | Token::Const) {
            let kind = self
                .decl_kind()
                .unwrap_or_else(|| unreachable!("checked declaration keyword"));
            let name = self.ident()?;
            match self.peek() {
                Token::In => {
                    self.advance();
                    return self.parse_for_each(Some(kind), name, true);
                }
                Token::Of => {
                    self.advance();
                    return self.parse_for_each(Some(kind), name, false);
                }
                _ => {
                    // continue as a classic for with a declaration init
                    let init = if self.eat(&Token::Assign) {
                        Some(self.parse_assignment()?)
                    } else {
                        None
                    };
                    let mut bindings = vec![(name, init)];
                    while self.eat(&Token::Comma) {
                        let n = self.ident()?;
                        let i = if self.eat(&Token::Assign) {
                            Some(self.parse_assignment()?)
                        } else {
                            None
                        };
                        bindings.push((n, i));
                    }
                    self.expect(Token::Semicolon)?;
                    return self.parse_for_classic(Some(Box::new(Stmt::Decl { kind, bindings })));
                }
            }
        }

        let first = self.parse_expr()?;
        match self.peek() {
            Token::In | Token::Of => {
                let is_in = self.check(&Token::In);
                self.advance();
                let Expr::Ident(name) = first else {
                    return Err(self.err("invalid for-in/of target"));
                };
                self.parse_for_each(None, name, is_in)
            }
            _ => {
                self.expect(Token::Semicolon)?;
                self.parse_for_classic(Some(Box::new(Stmt::Expr(first))))
            }
        }
    }

    fn parse_for_classic(&mut self, init: Option<Box<Stmt>>) -> Result<Stmt, JsError> {
        let cond = if self.check(&Token::Semicolon) {
            None
        } else {
            Some(self.parse_expr()?)
        };
        self.expect(Token::Semicolon)?;
        let update = if self.check(&Token::RParen) {
            None
        } else {
            Some(self.parse_expr()?)
        };
        self.expect(Token::RParen)?;
        let body = Box::new(self.parse_stmt()?);
        Ok(Stmt::For {
            init,
            cond,
            update,
            body,
        })
    }

    fn parse_for_each(
        &mut self,
        kind: Option<DeclKind>,
        name: Atom,
        is_in: bool,
    ) -> Result<Stmt, JsError> {
        let source = self.parse_expr()?;
        self.expect(Token::RParen)?;
        let body = Box::new(self.parse_stmt()?);
        Ok(if is_in {
            Stmt::ForIn {
                kind,
                name,
                object: source,
                body,
            }
        } else {
            Stmt::ForOf {
                kind,
                name,
                iterable: source,
                body,
            }
        })
    }

    fn parse_try(&mut self) -> Result<Stmt, JsError> {
        self.expect(Token::Try)?;
        self.expect(Token::LBrace)?;
        let block = self.parse_block_body()?;
        let mut param = None;
        let handler = if self.eat(&Token::Catch) {
            if self.eat(&Token::LParen) {
                param = Some(self.ident()?);
                self.expect(Token::RParen)?;
            }
            self.expect(Token::LBrace)?;
            Some(self.parse_block_body()?)
        } else {
            None
        };
        let finalizer = if self.eat(&Token::Finally) {
            self.expect(Token::LBrace)?;
            Some(self.parse_block_body()?)
        } else {
            None
        };
        if handler.is_none() && finalizer.is_none() {
            return Err(self.err("missing catch or finally after try"));
        }
        Ok(Stmt::Try {
            block,
            param,
            handler,
            finalizer,
        })
    }

    // -----------------------------------------------------------------------
    // Expressions
    // -----------------------------------------------------------------------

    fn parse_expr(&mut self) -> Result<Expr, JsError> {
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> Result<Expr, JsError> {
        // single-parameter arrow: `x => …`
        if matches!(self.peek(), Token::Ident(_)) && self.peek_nth(1) == &Token::Arrow {
            let param = self.ident()?;
            self.expect(Token::Arrow)?;
            return self.parse_arrow_body(vec![param]);
        }
        // parenthesized parameter list: `(a, b) => …`
        if self.check(&Token::LParen) && self.arrow_ahead() {
            self.advance();
            let mut params = Vec::new();
            if !self.check(&Token::RParen) {
                loop {
                    params.push(self.ident()?);
                    if !self.eat(&Token::Comma) {
                        break;
                    }
                }
            }
            self.expect(Token::RParen)?;
            self.expect(Token::Arrow)?;
            return self.parse_arrow_body(params);
        }

        let target = self.parse_conditional()?;
        let op = match self.peek() {
            Token::Assign => None,
            Token::PlusAssign => Some(BinOp::Add),
            Token::MinusAssign => Some(BinOp::Sub),
            Token::StarAssign => Some(BinOp::Mul),
            Token::SlashAssign => Some(BinOp::Div),
            Token::PercentAssign => Some(BinOp::Rem),
            _ => return Ok(target),
        };
        self.advance();
        if !matches!(target, Expr::Ident(_) | Expr::Member { .. } | Expr::Index { .. }) {
            return Err(self.err("invalid assignment target"));
        }
        let value = self.parse_assignment()?;
        Ok(Expr::Assign {
            op,
            target: Box::new(target),
            value: Box::new(value),
        })
    }

    /// From an `(`, scan to the matching `)` and report whether `=>`
    /// follows. Bounded by the token stream length.
    fn arrow_ahead(&self) -> bool {
        let mut depth = 0usize;
        let mut i = 0usize;
        loop {
            match self.peek_nth(i) {
                Token::LParen => depth += 1,
                Token::RParen => {
                    depth -= 1;
                    if depth == 0 {
                        return self.peek_nth(i + 1) == &Token::Arrow;
                    }
                }
                Token::Eof => return false,
                _ => {}
            }
            i += 1;
        }
    }

    fn parse_arrow_body(&mut self, params: Vec<Atom>) -> Result<Expr, JsError> {
        let body = if self.eat(&Token::LBrace) {
            self.parse_block_body()?
        } else {
            let e = self.parse_assignment()?;
            vec![Stmt::Return(Some(e))]
        };
        Ok(Expr::Func(FuncLit {
            name: None,
            params,
            body: Rc::new(body),
            is_arrow: true,
        }))
    }

    fn parse_conditional(&mut self) -> Result<Expr, JsError> {
        let cond = self.parse_logical_or()?;
        if self.eat(&Token::Question) {
            let cons = self.parse_assignment()?;
            self.expect(Token::Colon)?;
            let alt = self.parse_assignment()?;
            return Ok(Expr::Cond {
                cond: Box::new(cond),
                cons: Box::new(cons),
                alt: Box::new(alt),
            });
        }
        Ok(cond)
    }

    fn parse_logical_or(&mut self) -> Result<Expr, JsError> {
        let mut left = self.parse_logical_and()?;
        while self.eat(&Token::OrOr) {
            let right = self.parse_logical_and()?;
            left = Expr::Logical {
                op: LogicalOp::Or,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_logical_and(&mut self) -> Result<Expr, JsError> {
        let mut left = self.parse_bit_or()?;
        while self.eat(&Token::AndAnd) {
            let right = self.parse_bit_or()?;
            left = Expr::Logical {
                op: LogicalOp::And,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_bit_or(&mut self) -> Result<Expr, JsError> {
        let mut left = self.parse_bit_xor()?;
        while self.eat(&Token::BitOr) {
            let right = self.parse_bit_xor()?;
            left = binary(BinOp::BitOr, left, right);
        }
        Ok(left)
    }

    fn parse_bit_xor(&mut self) -> Result<Expr, JsError> {
        let mut left = self.parse_bit_and()?;
        while self.eat(&Token::BitXor) {
            let right = self.parse_bit_and()?;
            left = binary(BinOp::BitXor, left, right);
        }
        Ok(left)
    }

    fn parse_bit_and(&mut self) -> Result<Expr, JsError> {
        let mut left = self.parse_equality()?;
        while self.eat(&Token::BitAnd) {
            let right = self.parse_equality()?;
            left = binary(BinOp::BitAnd, left, right);
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<Expr, JsError> {
        let mut left = self.parse_relational()?;
        loop {
            let op = match self.peek() {
                Token::EqEq => BinOp::EqEq,
                Token::NotEq => BinOp::NotEq,
                Token::StrictEq => BinOp::StrictEq,
                Token::StrictNotEq => BinOp::StrictNotEq,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_relational()?;
            left = binary(op, left, right);
        }
    }

    fn parse_relational(&mut self) -> Result<Expr, JsError> {
        let mut left = self.parse_shift()?;
        loop {
            let op = match self.peek() {
                Token::Less => BinOp::Lt,
                Token::LessEq => BinOp::Le,
                Token::Greater => BinOp::Gt,
                Token::GreaterEq => BinOp::Ge,
                Token::In => BinOp::In,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_shift()?;
            left = binary(op, left, right);
        }
    }

    fn parse_shift(&mut self) -> Result<Expr, JsError> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.peek() {
                Token::Shl => BinOp::Shl,
                Token::Shr => BinOp::Shr,
                Token::UShr => BinOp::UShr,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_additive()?;
            left = binary(op, left, right);
        }
    }

    fn parse_additive(&mut self) -> Result<Expr, JsError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Token::Plus => BinOp::Add,
                Token::Minus => BinOp::Sub,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = binary(op, left, right);
        }
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, JsError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Token::Star => BinOp::Mul,
                Token::Slash => BinOp::Div,
                Token::Percent => BinOp::Rem,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_unary()?;
            left = binary(op, left, right);
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, JsError> {
        let op = match self.peek() {
            Token::Not => Some(UnaryOp::Not),
            Token::BitNot => Some(UnaryOp::BitNot),
            Token::Minus => Some(UnaryOp::Neg),
            Token::Plus => Some(UnaryOp::Plus),
            Token::TypeOf => Some(UnaryOp::TypeOf),
            Token::Void => Some(UnaryOp::Void),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let operand = self.parse_unary()?;
            return Ok(Expr::Unary {
                op,
                operand: Box::new(operand),
            });
        }
        if self.eat(&Token::Delete) {
            let operand = self.parse_unary()?;
            return Ok(Expr::Delete(Box::new(operand)));
        }
        if matches!(self.peek(), Token::PlusPlus | Token::MinusMinus) {
            let inc = self.check(&Token::PlusPlus);
            self.advance();
            let target = self.parse_unary()?;
            self.check_update_target(&target)?;
            return Ok(Expr::Update {
                inc,
                prefix: true,
                target: Box::new(target),
            });
        }
        self.parse_postfix()
    }

    fn check_update_target(&self, e: &Expr) -> Result<(), JsError> {
        if matches!(e, Expr::Ident(_) | Expr::Member { .. } | Expr::Index { .. }) {
            Ok(())
        } else {
            Err(self.err("invalid increment/decrement target"))
        }
    }

    fn parse_postfix(&mut self) -> Result<Expr, JsError> {
        let e = self.parse_call_member()?;
        if matches!(self.peek(), Token::PlusPlus | Token::MinusMinus) {
            let inc = self.check(&Token::PlusPlus);
            self.advance();
            self.check_update_target(&e)?;
            return Ok(Expr::Update {
                inc,
                prefix: false,
                target: Box::new(e),
            });
        }
        Ok(e)
    }

    fn parse_call_member(&mut self) -> Result<Expr, JsError> {
        let mut e = self.parse_primary()?;
        loop {
            match self.peek() {
                Token::Dot => {
                    self.advance();
                    let prop = self.member_name()?;
                    e = Expr::Member {
                        obj: Box::new(e),
                        prop,
                    };
                }
                Token::LBracket => {
                    self.advance();
                    let index = self.parse_expr()?;
                    self.expect(Token::RBracket)?;
                    e = Expr::Index {
                        obj: Box::new(e),
                        index: Box::new(index),
                    };
                }
                Token::LParen => {
                    let args = self.parse_args()?;
                    e = Expr::Call {
                        callee: Box::new(e),
                        args,
                    };
                }
                _ => return Ok(e),
            }
        }
    }

    /// Member names may be keywords (`x.of`, `x.delete`).
    fn member_name(&mut self) -> Result<Atom, JsError> {
        let name = match self.advance() {
            Token::Ident(name) => name,
            Token::Of => "of".into(),
            Token::In => "in".into(),
            Token::Delete => "delete".into(),
            Token::New => "new".into(),
            Token::TypeOf => "typeof".into(),
            Token::This => "this".into(),
            Token::Catch => "catch".into(),
            other => return Err(self.err(format!("expected property name, found {:?}", other))),
        };
        Ok(self.atoms.intern(&name))
    }

    fn parse_args(&mut self) -> Result<Vec<Expr>, JsError> {
        self.expect(Token::LParen)?;
        let mut args = Vec::new();
        if !self.check(&Token::RParen) {
            loop {
                args.push(self.parse_assignment()?);
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
        }
        self.expect(Token::RParen)?;
        Ok(args)
    }

    fn parse_primary(&mut self) -> Result<Expr, JsError> {
        match self.peek().clone() {
            Token::Num(n) => {
                self.advance();
                Ok(Expr::Num(n))
            }
            Token::Str(s) => {
                self.advance();
                Ok(Expr::Str(s))
            }
            Token::True => {
                self.advance();
                Ok(Expr::Bool(true))
            }
            Token::False => {
                self.advance();
                Ok(Expr::Bool(false))
            }
            Token::Null => {
                self.advance();
                Ok(Expr::Null)
            }
            Token::This => {
                self.advance();
                Ok(Expr::This)
            }
            Token::Ident(name) => {
                self.advance();
                Ok(Expr::Ident(self.atoms.intern(&name)))
            }
            Token::LParen => {
                self.advance();
                let e = self.parse_expr()?;
                self.expect(Token::RParen)?;
                Ok(e)
            }
            Token::LBracket => self.parse_array_literal(),
            Token::LBrace => self.parse_object_literal(),
            Token::Function => {
                self.advance();
                let name = if matches!(self.peek(), Token::Ident(_)) {
                    Some(self.ident()?)
                } else {
                    None
                };
                let func = self.parse_function_rest(name)?;
                Ok(Expr::Func(func))
            }
            Token::New => {
                self.advance();
                let mut callee = self.parse_primary()?;
                loop {
                    match self.peek() {
                        Token::Dot => {
                            self.advance();
                            let prop = self.member_name()?;
                            callee = Expr::Member {
                                obj: Box::new(callee),
                                prop,
                            };
                        }
                        Token::LBracket => {
                            self.advance();
                            let index = self.parse_expr()?;
                            self.expect(Token::RBracket)?;
                            callee = Expr::Index {
                                obj: Box::new(callee),
                                index: Box::new(index),
                            };
                        }
                        _ => break,
                    }
                }
                let args = if self.check(&Token::LParen) {
                    self.parse_args()?
                } else {
                    Vec::new()
                };
                Ok(Expr::New {
                    callee: Box::new(callee),
                    args,
                })
            }
            other => Err(self.err(format!("unexpected token {:?}", other))),
        }
    }

    fn parse_array_literal(&mut self) -> Result<Expr, JsError> {
        self.expect(Token::LBracket)?;
        let mut items = Vec::new();
        if !self.check(&Token::RBracket) {
            loop {
                // elisions would create holes, which the language forbids
                if self.check(&Token::Comma) {
                    return Err(self.err("array holes are not supported"));
                }
                items.push(self.parse_assignment()?);
                if !self.eat(&Token::Comma) {
                    break;
                }
                if self.check(&Token::RBracket) {
                    break;
                }
            }
        }
        self.expect(Token::RBracket)?;
        Ok(Expr::ArrayLit(items))
    }

    fn parse_object_literal(&mut self) -> Result<Expr, JsError> {
        self.expect(Token::LBrace)?;
        let mut props = Vec::new();
        if !self.check(&Token::RBrace) {
            loop {
                let key = match self.advance() {
                    Token::Ident(name) => self.atoms.intern(&name),
                    Token::Str(s) => self.atoms.intern(&s),
                    Token::Num(n) => self.atoms.intern(&number_to_string(n)),
                    other => {
                        return Err(self.err(format!("invalid property key {:?}", other)))
                    }
                };
                if self.eat(&Token::Colon) {
                    let value = self.parse_assignment()?;
                    props.push((key, value));
                } else {
                    // shorthand `{ x }`
                    props.push((key, Expr::Ident(key)));
                }
                if !self.eat(&Token::Comma) {
                    break;
                }
                if self.check(&Token::RBrace) {
                    break;
                }
            }
        }
        self.expect(Token::RBrace)?;
        Ok(Expr::ObjectLit(props))
    }

    fn parse_function_rest(&mut self, name: Option<Atom>) -> Result<FuncLit, JsError> {
        self.expect(Token::LParen)?;
        let mut params = Vec::new();
        if !self.check(&Token::RParen) {
            loop {
                params.push(self.ident()?);
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
        }
        self.expect(Token::RParen)?;
        self.expect(Token::LBrace)?;
        let body = self.parse_block_body()?;
        Ok(FuncLit {
            name,
            params,
            body: Rc::new(body),
            is_arrow: false,
        })
    }
}

fn binary(op: BinOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> Vec<Stmt> {
        let mut atoms = AtomTable::new();
        Parser::new(src, &mut atoms).unwrap().parse().unwrap()
    }

    fn parse_err(src: &str) -> JsError {
        let mut atoms = AtomTable::new();
        match Parser::new(src, &mut atoms) {
            Ok(p) => p.parse().unwrap_err(),
            Err(e) => e,
        }
    }

    #[test]
    fn expression_statement() {
        let stmts = parse("x + 1");
        assert!(matches!(&stmts[0], Stmt::Expr(Expr::Binary { op: BinOp::Add, .. })));
    }

    #[test]
    fn precedence_mul_over_add() {
        let stmts = parse("1 + 2 * 3");
        let Stmt::Expr(Expr::Binary { op: BinOp::Add, right, .. }) = &stmts[0] else {
            panic!("expected addition at the top");
        };
        assert!(matches!(**right, Expr::Binary { op: BinOp::Mul, .. }));
    }

    #[test]
    fn arrow_functions() {
        let stmts = parse("var f = x => x + 1; var g = (a, b) => { return a; };");
        assert!(matches!(&stmts[0], Stmt::Decl { .. }));
        let Stmt::Decl { bindings, .. } = &stmts[1] else {
            panic!("expected declaration");
        };
        let Some(Expr::Func(f)) = &bindings[0].1 else {
            panic!("expected arrow literal");
        };
        assert!(f.is_arrow);
        assert_eq!(f.params.len(), 2);
    }

    #[test]
    fn parenthesized_expression_is_not_arrow() {
        let stmts = parse("(1 + 2) * 3");
        assert!(matches!(&stmts[0], Stmt::Expr(Expr::Binary { op: BinOp::Mul, .. })));
    }

    #[test]
    fn object_and_array_literals() {
        let stmts = parse("var o = {a: 1, 'b': 2, c}; var l = [1, 2, 3];");
        let Stmt::Decl { bindings, .. } = &stmts[0] else {
            panic!()
        };
        let Some(Expr::ObjectLit(props)) = &bindings[0].1 else {
            panic!()
        };
        assert_eq!(props.len(), 3);
    }

    #[test]
    fn for_variants() {
        assert!(matches!(&parse("for (var i = 0; i < 3; i++) ;")[0], Stmt::For { .. }));
        assert!(matches!(&parse("for (var k in o) ;")[0], Stmt::ForIn { .. }));
        assert!(matches!(&parse("for (var v of a) ;")[0], Stmt::ForOf { .. }));
    }

    #[test]
    fn try_requires_catch_or_finally() {
        assert!(matches!(parse_err("try { }"), JsError::Syntax(_)));
        assert!(matches!(&parse("try { } catch (e) { }")[0], Stmt::Try { .. }));
    }

    #[test]
    fn array_holes_are_rejected() {
        assert!(matches!(parse_err("[1, , 2]"), JsError::Syntax(_)));
    }

    #[test]
    fn const_requires_initializer() {
        assert!(matches!(parse_err("const x;"), JsError::Syntax(_)));
    }

    #[test]
    fn new_expression_binds_member_chain() {
        let stmts = parse("new Compartment({globals: {x: 1}})");
        assert!(matches!(&stmts[0], Stmt::Expr(Expr::New { .. })));
    }
}
