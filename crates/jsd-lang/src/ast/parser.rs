use smol_str::SmolStr;

use crate::Shared;
use crate::lexer::{
    self,
    token::{TemplatePart, Token, TokenKind},
};
use crate::number::format_number;
use crate::range::Position;

use super::error::ParseError;
use super::node::{
    AssignOp, BinaryOp, DeclKind, Expr, ExprKind, FunctionBody, FunctionDecl, Ident, LogicalOp,
    Program, PropertyKey, Stmt, StmtKind, SwitchCase, TemplateSegment, UnaryOp,
};

pub struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    eof: Token,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [Token]) -> Self {
        let eof = tokens
            .last()
            .filter(|token| token.is_eof())
            .cloned()
            .unwrap_or_else(|| Token::new(TokenKind::Eof, Position::default()));

        Self {
            tokens,
            pos: 0,
            eof,
        }
    }

    pub fn parse(&mut self) -> Result<Program, ParseError> {
        let mut program = Vec::new();

        while !self.peek().is_eof() {
            program.push(self.parse_statement()?);
        }

        Ok(program)
    }

    fn peek(&self) -> &Token {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> &Token {
        self.tokens.get(self.pos + offset).unwrap_or(&self.eof)
    }

    fn next_token(&mut self) -> Token {
        let token = self.peek().clone();
        if !token.is_eof() {
            self.pos += 1;
        }
        token
    }

    #[inline(always)]
    fn check(&self, kind: &TokenKind) -> bool {
        &self.peek().kind == kind
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn unexpected(token: Token) -> ParseError {
        if token.is_eof() {
            ParseError::UnexpectedEof(token.position)
        } else {
            ParseError::UnexpectedToken(token)
        }
    }

    fn expect(&mut self, kind: &TokenKind) -> Result<Token, ParseError> {
        if self.check(kind) {
            Ok(self.next_token())
        } else {
            Err(Self::unexpected(self.peek().clone()))
        }
    }

    fn expect_ident(&mut self) -> Result<Ident, ParseError> {
        match self.next_token() {
            Token {
                kind: TokenKind::Ident(name),
                ..
            } => Ok(name),
            token => Err(Self::unexpected(token)),
        }
    }

    /// Statement terminator, inserted implicitly before `}`, end of input or a line break.
    fn consume_semicolon(&mut self) -> Result<(), ParseError> {
        if self.eat(&TokenKind::SemiColon) {
            return Ok(());
        }

        let token = self.peek();
        if matches!(token.kind, TokenKind::RBrace | TokenKind::Eof) || token.newline_before {
            Ok(())
        } else {
            Err(Self::unexpected(token.clone()))
        }
    }

    fn parse_statement(&mut self) -> Result<Shared<Stmt>, ParseError> {
        let position = self.peek().position;
        let kind = match &self.peek().kind {
            TokenKind::Var | TokenKind::Let | TokenKind::Const => {
                let declaration = self.parse_declaration()?;
                self.consume_semicolon()?;
                declaration
            }
            TokenKind::Function => {
                self.next_token();
                StmtKind::Function(self.parse_function(position, true)?)
            }
            TokenKind::If => self.parse_if()?,
            TokenKind::While => self.parse_while()?,
            TokenKind::Do => self.parse_do_while()?,
            TokenKind::For => self.parse_for()?,
            TokenKind::Switch => self.parse_switch()?,
            TokenKind::Try => self.parse_try()?,
            TokenKind::LBrace => StmtKind::Block(self.parse_block()?),
            TokenKind::SemiColon => {
                self.next_token();
                StmtKind::Empty
            }
            TokenKind::Return => {
                self.next_token();
                let token = self.peek();
                let value = if matches!(
                    token.kind,
                    TokenKind::SemiColon | TokenKind::RBrace | TokenKind::Eof
                ) || token.newline_before
                {
                    None
                } else {
                    Some(self.parse_expression()?)
                };
                self.consume_semicolon()?;
                StmtKind::Return(value)
            }
            TokenKind::Break => {
                self.next_token();
                self.consume_semicolon()?;
                StmtKind::Break
            }
            TokenKind::Continue => {
                self.next_token();
                self.consume_semicolon()?;
                StmtKind::Continue
            }
            TokenKind::Throw => {
                self.next_token();
                let value = self.parse_expression()?;
                self.consume_semicolon()?;
                StmtKind::Throw(value)
            }
            _ => {
                let expr = self.parse_expression()?;
                self.consume_semicolon()?;
                StmtKind::Expr(expr)
            }
        };

        Ok(Shared::new(Stmt { kind, position }))
    }

    fn parse_block(&mut self) -> Result<Program, ParseError> {
        self.expect(&TokenKind::LBrace)?;
        let mut body = Vec::new();

        while !self.check(&TokenKind::RBrace) {
            if self.peek().is_eof() {
                return Err(Self::unexpected(self.peek().clone()));
            }
            body.push(self.parse_statement()?);
        }

        self.expect(&TokenKind::RBrace)?;
        Ok(body)
    }

    fn parse_declaration(&mut self) -> Result<StmtKind, ParseError> {
        let token = self.next_token();
        let kind = match token.kind {
            TokenKind::Var => DeclKind::Var,
            TokenKind::Let => DeclKind::Let,
            TokenKind::Const => DeclKind::Const,
            _ => return Err(Self::unexpected(token)),
        };
        let mut declarators = Vec::new();

        loop {
            let position = self.peek().position;
            let name = self.expect_ident()?;
            let init = if self.eat(&TokenKind::Eq) {
                Some(self.parse_assignment()?)
            } else if kind == DeclKind::Const {
                return Err(ParseError::MissingInitializer(position));
            } else {
                None
            };

            declarators.push((name, init));

            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }

        Ok(StmtKind::Declaration(kind, declarators))
    }

    fn parse_if(&mut self) -> Result<StmtKind, ParseError> {
        self.expect(&TokenKind::If)?;
        let test = self.parse_paren_expression()?;
        let consequent = self.parse_statement()?;
        let alternate = if self.eat(&TokenKind::Else) {
            Some(self.parse_statement()?)
        } else {
            None
        };

        Ok(StmtKind::If(test, consequent, alternate))
    }

    fn parse_while(&mut self) -> Result<StmtKind, ParseError> {
        self.expect(&TokenKind::While)?;
        let test = self.parse_paren_expression()?;
        let body = self.parse_statement()?;

        Ok(StmtKind::While(test, body))
    }

    fn parse_do_while(&mut self) -> Result<StmtKind, ParseError> {
        self.expect(&TokenKind::Do)?;
        let body = self.parse_statement()?;
        self.expect(&TokenKind::While)?;
        let test = self.parse_paren_expression()?;
        self.eat(&TokenKind::SemiColon);

        Ok(StmtKind::DoWhile(body, test))
    }

    fn is_for_in_keyword(token: &Token) -> Option<bool> {
        match &token.kind {
            TokenKind::In => Some(false),
            TokenKind::Ident(name) if name == "of" => Some(true),
            _ => None,
        }
    }

    fn parse_for(&mut self) -> Result<StmtKind, ParseError> {
        self.expect(&TokenKind::For)?;
        self.expect(&TokenKind::LParen)?;

        let decl = match self.peek().kind {
            TokenKind::Var => Some(DeclKind::Var),
            TokenKind::Let => Some(DeclKind::Let),
            TokenKind::Const => Some(DeclKind::Const),
            _ => None,
        };
        let offset = usize::from(decl.is_some());

        let for_in = if matches!(self.peek_at(offset).kind, TokenKind::Ident(_)) {
            Self::is_for_in_keyword(self.peek_at(offset + 1))
        } else {
            None
        };

        if let Some(values) = for_in {
            if decl.is_some() {
                self.next_token();
            }
            let name = self.expect_ident()?;
            self.next_token();
            let iterable = self.parse_expression()?;
            self.expect(&TokenKind::RParen)?;
            let body = self.parse_statement()?;

            return Ok(StmtKind::ForIn {
                decl,
                name,
                iterable,
                body,
                values,
            });
        }

        let init = if self.check(&TokenKind::SemiColon) {
            None
        } else {
            let position = self.peek().position;
            let kind = if decl.is_some() {
                self.parse_declaration()?
            } else {
                StmtKind::Expr(self.parse_expression()?)
            };
            Some(Shared::new(Stmt { kind, position }))
        };
        self.expect(&TokenKind::SemiColon)?;

        let test = if self.check(&TokenKind::SemiColon) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect(&TokenKind::SemiColon)?;

        let update = if self.check(&TokenKind::RParen) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect(&TokenKind::RParen)?;

        let body = self.parse_statement()?;

        Ok(StmtKind::For {
            init,
            test,
            update,
            body,
        })
    }

    fn parse_switch(&mut self) -> Result<StmtKind, ParseError> {
        self.expect(&TokenKind::Switch)?;
        let discriminant = self.parse_paren_expression()?;
        self.expect(&TokenKind::LBrace)?;

        let mut cases = Vec::new();

        while !self.eat(&TokenKind::RBrace) {
            let test = match self.next_token() {
                Token {
                    kind: TokenKind::Case,
                    ..
                } => Some(self.parse_expression()?),
                Token {
                    kind: TokenKind::Default,
                    ..
                } => None,
                token => return Err(Self::unexpected(token)),
            };
            self.expect(&TokenKind::Colon)?;

            let mut body = Vec::new();
            while !matches!(
                self.peek().kind,
                TokenKind::Case | TokenKind::Default | TokenKind::RBrace | TokenKind::Eof
            ) {
                body.push(self.parse_statement()?);
            }

            cases.push(SwitchCase { test, body });
        }

        Ok(StmtKind::Switch(discriminant, cases))
    }

    fn parse_try(&mut self) -> Result<StmtKind, ParseError> {
        self.expect(&TokenKind::Try)?;
        let block = self.parse_block()?;

        let (param, handler) = if self.eat(&TokenKind::Catch) {
            let param = if self.eat(&TokenKind::LParen) {
                let name = self.expect_ident()?;
                self.expect(&TokenKind::RParen)?;
                Some(name)
            } else {
                None
            };
            (param, Some(self.parse_block()?))
        } else {
            (None, None)
        };

        let finalizer = if self.eat(&TokenKind::Finally) {
            Some(self.parse_block()?)
        } else {
            None
        };

        if handler.is_none() && finalizer.is_none() {
            return Err(Self::unexpected(self.peek().clone()));
        }

        Ok(StmtKind::Try {
            block,
            param,
            handler,
            finalizer,
        })
    }

    fn parse_paren_expression(&mut self) -> Result<Expr, ParseError> {
        self.expect(&TokenKind::LParen)?;
        let expr = self.parse_expression()?;
        self.expect(&TokenKind::RParen)?;
        Ok(expr)
    }

    pub(crate) fn parse_expression(&mut self) -> Result<Expr, ParseError> {
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> Result<Expr, ParseError> {
        let target = self.parse_conditional()?;
        let op = match self.peek().kind {
            TokenKind::Eq => AssignOp::Assign,
            TokenKind::PlusEq => AssignOp::Add,
            TokenKind::MinusEq => AssignOp::Sub,
            TokenKind::StarEq => AssignOp::Mul,
            TokenKind::SlashEq => AssignOp::Div,
            TokenKind::PercentEq => AssignOp::Rem,
            _ => return Ok(target),
        };

        Self::ensure_assignable(&target)?;
        self.next_token();
        let value = self.parse_assignment()?;
        let position = target.position;

        Ok(Expr::new(
            ExprKind::Assign(op, Box::new(target), Box::new(value)),
            position,
        ))
    }

    fn ensure_assignable(target: &Expr) -> Result<(), ParseError> {
        match target.kind {
            ExprKind::Ident(_) | ExprKind::Member(..) | ExprKind::Index(..) => Ok(()),
            _ => Err(ParseError::InvalidAssignmentTarget(target.position)),
        }
    }

    fn parse_conditional(&mut self) -> Result<Expr, ParseError> {
        let test = self.parse_binary_op(1)?;

        if !self.eat(&TokenKind::Question) {
            return Ok(test);
        }

        let consequent = self.parse_assignment()?;
        self.expect(&TokenKind::Colon)?;
        let alternate = self.parse_assignment()?;
        let position = test.position;

        Ok(Expr::new(
            ExprKind::Conditional(Box::new(test), Box::new(consequent), Box::new(alternate)),
            position,
        ))
    }

    fn binary_op_precedence(kind: &TokenKind) -> u8 {
        match kind {
            TokenKind::QuestionQuestion => 1,
            TokenKind::OrOr => 2,
            TokenKind::AndAnd => 3,
            TokenKind::EqEq | TokenKind::NotEq | TokenKind::EqEqEq | TokenKind::NotEqEq => 4,
            TokenKind::Lt | TokenKind::LtEq | TokenKind::Gt | TokenKind::GtEq | TokenKind::In => 5,
            TokenKind::Plus | TokenKind::Minus => 6,
            TokenKind::Star | TokenKind::Slash | TokenKind::Percent => 7,
            _ => 0,
        }
    }

    fn parse_binary_op(&mut self, min_prec: u8) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_unary()?;

        loop {
            let prec = Self::binary_op_precedence(&self.peek().kind);

            if prec == 0 || prec < min_prec {
                break;
            }

            let operator = self.next_token();
            let rhs = self.parse_binary_op(prec + 1)?;
            let position = lhs.position;
            let (lhs_box, rhs_box) = (Box::new(lhs), Box::new(rhs));

            let kind = match operator.kind {
                TokenKind::QuestionQuestion => ExprKind::Logical(LogicalOp::Nullish, lhs_box, rhs_box),
                TokenKind::OrOr => ExprKind::Logical(LogicalOp::Or, lhs_box, rhs_box),
                TokenKind::AndAnd => ExprKind::Logical(LogicalOp::And, lhs_box, rhs_box),
                TokenKind::EqEq => ExprKind::Binary(BinaryOp::Eq, lhs_box, rhs_box),
                TokenKind::NotEq => ExprKind::Binary(BinaryOp::NotEq, lhs_box, rhs_box),
                TokenKind::EqEqEq => ExprKind::Binary(BinaryOp::StrictEq, lhs_box, rhs_box),
                TokenKind::NotEqEq => ExprKind::Binary(BinaryOp::StrictNotEq, lhs_box, rhs_box),
                TokenKind::Lt => ExprKind::Binary(BinaryOp::Lt, lhs_box, rhs_box),
                TokenKind::LtEq => ExprKind::Binary(BinaryOp::LtEq, lhs_box, rhs_box),
                TokenKind::Gt => ExprKind::Binary(BinaryOp::Gt, lhs_box, rhs_box),
                TokenKind::GtEq => ExprKind::Binary(BinaryOp::GtEq, lhs_box, rhs_box),
                TokenKind::In => ExprKind::Binary(BinaryOp::In, lhs_box, rhs_box),
                TokenKind::Plus => ExprKind::Binary(BinaryOp::Add, lhs_box, rhs_box),
                TokenKind::Minus => ExprKind::Binary(BinaryOp::Sub, lhs_box, rhs_box),
                TokenKind::Star => ExprKind::Binary(BinaryOp::Mul, lhs_box, rhs_box),
                TokenKind::Slash => ExprKind::Binary(BinaryOp::Div, lhs_box, rhs_box),
                TokenKind::Percent => ExprKind::Binary(BinaryOp::Rem, lhs_box, rhs_box),
                _ => return Err(Self::unexpected(operator)),
            };

            lhs = Expr::new(kind, position);
        }

        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        let token = self.peek().clone();
        let op = match token.kind {
            TokenKind::Bang => UnaryOp::Not,
            TokenKind::Minus => UnaryOp::Negate,
            TokenKind::Plus => UnaryOp::Plus,
            TokenKind::Typeof => UnaryOp::Typeof,
            TokenKind::Void => UnaryOp::Void,
            TokenKind::Delete => UnaryOp::Delete,
            TokenKind::PlusPlus | TokenKind::MinusMinus => {
                self.next_token();
                let target = self.parse_unary()?;
                Self::ensure_assignable(&target)?;

                return Ok(Expr::new(
                    ExprKind::Update {
                        increment: token.kind == TokenKind::PlusPlus,
                        prefix: true,
                        target: Box::new(target),
                    },
                    token.position,
                ));
            }
            _ => return self.parse_postfix(),
        };

        self.next_token();
        let operand = self.parse_unary()?;

        Ok(Expr::new(
            ExprKind::Unary(op, Box::new(operand)),
            token.position,
        ))
    }

    fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let expr = self.parse_call_member()?;
        let token = self.peek();

        if matches!(token.kind, TokenKind::PlusPlus | TokenKind::MinusMinus) && !token.newline_before
        {
            let increment = token.kind == TokenKind::PlusPlus;
            Self::ensure_assignable(&expr)?;
            self.next_token();
            let position = expr.position;

            return Ok(Expr::new(
                ExprKind::Update {
                    increment,
                    prefix: false,
                    target: Box::new(expr),
                },
                position,
            ));
        }

        Ok(expr)
    }

    /// Property names after `.` may be reserved words such as `default` or `new`.
    fn property_name(token: &Token) -> Option<Ident> {
        match &token.kind {
            TokenKind::Ident(name) => Some(name.clone()),
            kind => kind
                .text()
                .filter(|text| text.starts_with(|c: char| c.is_ascii_alphabetic()))
                .map(SmolStr::new),
        }
    }

    fn parse_member_suffix(&mut self, expr: Expr) -> Result<Expr, ParseError> {
        let position = expr.position;

        match self.peek().kind {
            TokenKind::Dot => {
                self.next_token();
                let token = self.next_token();
                let name = Self::property_name(&token).ok_or_else(|| Self::unexpected(token))?;
                Ok(Expr::new(ExprKind::Member(Box::new(expr), name), position))
            }
            TokenKind::LBracket => {
                self.next_token();
                let index = self.parse_expression()?;
                self.expect(&TokenKind::RBracket)?;
                Ok(Expr::new(
                    ExprKind::Index(Box::new(expr), Box::new(index)),
                    position,
                ))
            }
            _ => Ok(expr),
        }
    }

    fn parse_call_member(&mut self) -> Result<Expr, ParseError> {
        let mut expr = if self.check(&TokenKind::New) {
            self.parse_new()?
        } else {
            self.parse_primary()?
        };

        loop {
            expr = match self.peek().kind {
                TokenKind::LParen => {
                    let args = self.parse_arguments()?;
                    let position = expr.position;
                    Expr::new(ExprKind::Call(Box::new(expr), args), position)
                }
                TokenKind::Dot | TokenKind::LBracket => self.parse_member_suffix(expr)?,
                _ => break,
            };
        }

        Ok(expr)
    }

    fn parse_new(&mut self) -> Result<Expr, ParseError> {
        let new_token = self.expect(&TokenKind::New)?;
        let mut callee = if self.check(&TokenKind::New) {
            self.parse_new()?
        } else {
            self.parse_primary()?
        };

        while matches!(self.peek().kind, TokenKind::Dot | TokenKind::LBracket) {
            callee = self.parse_member_suffix(callee)?;
        }

        let args = if self.check(&TokenKind::LParen) {
            self.parse_arguments()?
        } else {
            Vec::new()
        };

        Ok(Expr::new(
            ExprKind::New(Box::new(callee), args),
            new_token.position,
        ))
    }

    fn parse_arguments(&mut self) -> Result<Vec<Expr>, ParseError> {
        self.expect(&TokenKind::LParen)?;
        let mut args = Vec::new();

        while !self.eat(&TokenKind::RParen) {
            args.push(self.parse_assignment()?);

            if !self.eat(&TokenKind::Comma) {
                self.expect(&TokenKind::RParen)?;
                break;
            }
        }

        Ok(args)
    }

    fn parse_params(&mut self) -> Result<Vec<Ident>, ParseError> {
        self.expect(&TokenKind::LParen)?;
        let mut params = Vec::new();

        while !self.eat(&TokenKind::RParen) {
            params.push(self.expect_ident()?);

            if !self.eat(&TokenKind::Comma) {
                self.expect(&TokenKind::RParen)?;
                break;
            }
        }

        Ok(params)
    }

    fn parse_function(
        &mut self,
        position: Position,
        require_name: bool,
    ) -> Result<Shared<FunctionDecl>, ParseError> {
        let name = match self.peek().kind {
            TokenKind::Ident(_) => Some(self.expect_ident()?),
            _ if require_name => return Err(Self::unexpected(self.peek().clone())),
            _ => None,
        };
        let params = self.parse_params()?;
        let body = self.parse_block()?;

        Ok(Shared::new(FunctionDecl {
            name,
            params,
            body: FunctionBody::Block(body),
            is_arrow: false,
            position,
        }))
    }

    fn parse_arrow_body(
        &mut self,
        params: Vec<Ident>,
        position: Position,
    ) -> Result<Expr, ParseError> {
        self.expect(&TokenKind::Arrow)?;
        let body = if self.check(&TokenKind::LBrace) {
            FunctionBody::Block(self.parse_block()?)
        } else {
            FunctionBody::Expr(Box::new(self.parse_assignment()?))
        };

        Ok(Expr::new(
            ExprKind::Function(Shared::new(FunctionDecl {
                name: None,
                params,
                body,
                is_arrow: true,
                position,
            })),
            position,
        ))
    }

    /// Looks past the parenthesis opened just before the cursor for a following `=>`.
    fn is_arrow_params(&self) -> bool {
        let mut depth = 1usize;
        let mut offset = 0;

        loop {
            match self.peek_at(offset).kind {
                TokenKind::LParen | TokenKind::LBracket | TokenKind::LBrace => depth += 1,
                TokenKind::RParen | TokenKind::RBracket | TokenKind::RBrace => {
                    depth -= 1;
                    if depth == 0 {
                        return self.peek_at(offset + 1).kind == TokenKind::Arrow;
                    }
                }
                TokenKind::Eof => return false,
                _ => {}
            }
            offset += 1;
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let token = self.next_token();
        let position = token.position;

        let kind = match token.kind {
            TokenKind::Number(n) => ExprKind::Number(n),
            TokenKind::String(s) => ExprKind::String(SmolStr::new(s)),
            TokenKind::Template(parts) => ExprKind::Template(Self::parse_template(parts)?),
            TokenKind::True => ExprKind::Bool(true),
            TokenKind::False => ExprKind::Bool(false),
            TokenKind::Null => ExprKind::Null,
            TokenKind::This => ExprKind::This,
            TokenKind::Ident(name) => {
                if self.check(&TokenKind::Arrow) && !self.peek().newline_before {
                    return self.parse_arrow_body(vec![name], position);
                }
                ExprKind::Ident(name)
            }
            TokenKind::LParen => {
                if self.is_arrow_params() {
                    let mut params = Vec::new();
                    while !self.eat(&TokenKind::RParen) {
                        params.push(self.expect_ident()?);
                        if !self.eat(&TokenKind::Comma) {
                            self.expect(&TokenKind::RParen)?;
                            break;
                        }
                    }
                    return self.parse_arrow_body(params, position);
                }

                let expr = self.parse_expression()?;
                self.expect(&TokenKind::RParen)?;
                return Ok(expr);
            }
            TokenKind::LBracket => ExprKind::Array(self.parse_array_elements()?),
            TokenKind::LBrace => ExprKind::Object(self.parse_object_properties()?),
            TokenKind::Function => ExprKind::Function(self.parse_function(position, false)?),
            _ => return Err(Self::unexpected(token)),
        };

        Ok(Expr::new(kind, position))
    }

    fn parse_array_elements(&mut self) -> Result<Vec<Expr>, ParseError> {
        let mut elements = Vec::new();

        while !self.eat(&TokenKind::RBracket) {
            elements.push(self.parse_assignment()?);

            if !self.eat(&TokenKind::Comma) {
                self.expect(&TokenKind::RBracket)?;
                break;
            }
        }

        Ok(elements)
    }

    fn parse_object_properties(&mut self) -> Result<Vec<(PropertyKey, Expr)>, ParseError> {
        let mut properties = Vec::new();

        while !self.eat(&TokenKind::RBrace) {
            let token = self.next_token();
            let position = token.position;
            let key = match &token.kind {
                TokenKind::String(s) => PropertyKey::Static(SmolStr::new(s)),
                TokenKind::Number(n) => PropertyKey::Static(SmolStr::new(format_number(*n))),
                TokenKind::LBracket => {
                    let key = self.parse_assignment()?;
                    self.expect(&TokenKind::RBracket)?;
                    PropertyKey::Computed(key)
                }
                _ => PropertyKey::Static(
                    Self::property_name(&token).ok_or_else(|| Self::unexpected(token.clone()))?,
                ),
            };

            let value = if self.eat(&TokenKind::Colon) {
                self.parse_assignment()?
            } else if self.check(&TokenKind::LParen) {
                let name = match &key {
                    PropertyKey::Static(name) => Some(name.clone()),
                    PropertyKey::Computed(_) => None,
                };
                let params = self.parse_params()?;
                let body = self.parse_block()?;

                Expr::new(
                    ExprKind::Function(Shared::new(FunctionDecl {
                        name,
                        params,
                        body: FunctionBody::Block(body),
                        is_arrow: false,
                        position,
                    })),
                    position,
                )
            } else {
                match (&token.kind, &key) {
                    (TokenKind::Ident(_), PropertyKey::Static(name)) => {
                        Expr::new(ExprKind::Ident(name.clone()), position)
                    }
                    _ => return Err(Self::unexpected(self.peek().clone())),
                }
            };

            properties.push((key, value));

            if !self.eat(&TokenKind::Comma) {
                self.expect(&TokenKind::RBrace)?;
                break;
            }
        }

        Ok(properties)
    }

    fn parse_template(parts: Vec<TemplatePart>) -> Result<Vec<TemplateSegment>, ParseError> {
        parts
            .into_iter()
            .map(|part| match part {
                TemplatePart::Text(text) => Ok(TemplateSegment::Text(text)),
                TemplatePart::Code(code, origin) => {
                    let tokens = lexer::tokenize(&code)?
                        .into_iter()
                        .map(|mut token| {
                            if token.position.line == 1 {
                                token.position.column += origin.column - 1;
                            }
                            token.position.line += origin.line - 1;
                            token
                        })
                        .collect::<Vec<_>>();
                    let mut parser = Parser::new(&tokens);
                    let expr = parser.parse_expression()?;
                    parser.expect(&TokenKind::Eof)?;

                    Ok(TemplateSegment::Expr(expr))
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn parse(code: &str) -> Result<Program, ParseError> {
        let tokens = lexer::tokenize(code)?;
        Parser::new(&tokens).parse()
    }

    fn expr_of(code: &str) -> ExprKind {
        let program = parse(code).unwrap();
        match &program[0].kind {
            StmtKind::Expr(expr) => expr.kind.clone(),
            kind => panic!("expected expression statement, got {:?}", kind),
        }
    }

    #[test]
    fn test_parse_precedence() {
        let ExprKind::Binary(BinaryOp::Add, lhs, rhs) = expr_of("1 + 2 * 3") else {
            panic!("expected addition");
        };

        assert_eq!(lhs.kind, ExprKind::Number(1.0));
        assert!(matches!(rhs.kind, ExprKind::Binary(BinaryOp::Mul, _, _)));
    }

    #[test]
    fn test_parse_method_call() {
        let ExprKind::Call(callee, args) = expr_of("console.log(x, 'y');") else {
            panic!("expected call");
        };

        assert_eq!(args.len(), 2);
        assert!(matches!(callee.kind, ExprKind::Member(_, ref name) if name == "log"));
    }

    #[rstest]
    #[case::single_param("x => x + 1", 1)]
    #[case::parenthesized("(a, b) => { return a; }", 2)]
    #[case::no_params("() => 0", 0)]
    fn test_parse_arrow(#[case] code: &str, #[case] params: usize) {
        let ExprKind::Function(decl) = expr_of(code) else {
            panic!("expected function");
        };

        assert!(decl.is_arrow);
        assert_eq!(decl.params.len(), params);
    }

    #[test]
    fn test_parse_statement_positions() {
        let program = parse("var x = 1;\nconsole.log(x);\nx = 2;\n").unwrap();
        let positions = program
            .iter()
            .map(|stmt| stmt.position)
            .collect::<Vec<_>>();

        assert_eq!(
            positions,
            vec![Position::new(1, 1), Position::new(2, 1), Position::new(3, 1)]
        );
    }

    #[test]
    fn test_parse_asi() {
        let program = parse("let a = 1\nlet b = a\nreturn_value()").unwrap();
        assert_eq!(program.len(), 3);
    }

    #[rstest]
    #[case::for_of("for (const v of items) {}", true)]
    #[case::for_in("for (var k in obj) {}", false)]
    fn test_parse_for_in(#[case] code: &str, #[case] values: bool) {
        let program = parse(code).unwrap();

        assert!(matches!(
            &program[0].kind,
            StmtKind::ForIn { values: v, .. } if *v == values
        ));
    }

    #[test]
    fn test_parse_object_literal() {
        let ExprKind::Object(properties) = expr_of("({a: 1, 'b': 2, c, m() { return 1; }})")
        else {
            panic!("expected object");
        };

        let keys = properties
            .iter()
            .map(|(key, _)| match key {
                PropertyKey::Static(name) => name.to_string(),
                PropertyKey::Computed(_) => "[computed]".to_string(),
            })
            .collect::<Vec<_>>();
        assert_eq!(keys, vec!["a", "b", "c", "m"]);
    }

    #[test]
    fn test_parse_template_positions() {
        let ExprKind::Template(segments) = expr_of("`a ${b} c`") else {
            panic!("expected template");
        };

        assert!(matches!(
            &segments[1],
            TemplateSegment::Expr(Expr { kind: ExprKind::Ident(name), position }) if name == "b" && *position == Position::new(1, 6)
        ));
    }

    #[rstest]
    #[case::missing_paren("if (x { }", Position::new(1, 7))]
    #[case::unexpected_eof("function f() {", Position::new(1, 15))]
    #[case::invalid_target("1 = 2", Position::new(1, 1))]
    #[case::const_without_value("const x;", Position::new(1, 7))]
    #[case::missing_semicolon("a b", Position::new(1, 3))]
    fn test_parse_error(#[case] code: &str, #[case] position: Position) {
        assert_eq!(parse(code).unwrap_err().position(), position);
    }
}
