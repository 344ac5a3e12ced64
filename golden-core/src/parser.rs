//! Recursive-descent parser for the accepted Go subset.
//!
//! The grammar follows the Go specification closely enough that ordinary
//! programs written against the supported feature set parse unchanged.
//! Composite literals are disabled in control-clause headers (`if`, `for`,
//! `switch`) unless parenthesised, exactly as in Go.

use crate::ast::{
    AssignOp, BinaryOp, Block, CaseClause, Decl, Element, Else, Expr, Field, File, FuncDecl,
    FuncLit, IfStmt, ImportSpec, LitKind, Stmt, TypeExpr, TypeSpec, UnaryOp, ValueSpec,
};
use crate::error::CoreError;
use crate::lexer::{Token, TokenKind, lex};

pub fn parse_file(source: &str) -> Result<File, CoreError> {
    let tokens = lex(source)?;
    let mut parser = Parser {
        source,
        tokens,
        position: 0,
        expr_level: 0,
    };
    parser.file()
}

struct Parser<'src> {
    source: &'src str,
    tokens: Vec<Token>,
    position: usize,
    /// Negative inside control-clause headers, where `Name {` opens the
    /// statement body rather than a composite literal.
    expr_level: i32,
}

/// One entry of a parameter list before names are grouped with types.
enum ParamItem {
    Bare(String),
    Named(String, TypeExpr),
    Type(TypeExpr),
}

impl<'src> Parser<'src> {
    // -----------------------------------------------------------------
    // Token helpers
    // -----------------------------------------------------------------

    fn peek(&self) -> TokenKind {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> TokenKind {
        self.tokens
            .get(self.position + offset)
            .map_or(TokenKind::Eof, |tok| tok.kind)
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.peek() == kind
    }

    fn bump(&mut self) -> Token {
        let tok = self.tokens[self.position.min(self.tokens.len() - 1)];
        if self.position < self.tokens.len() - 1 {
            self.position += 1;
        }
        tok
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.at(kind) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn text(&self, tok: Token) -> &'src str {
        tok.text(self.source)
    }

    fn error(&self, message: impl Into<String>) -> CoreError {
        let position = self
            .tokens
            .get(self.position)
            .map_or(self.source.len(), |tok| tok.text_start as usize);
        CoreError::parse(position, message)
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<Token, CoreError> {
        if self.at(kind) {
            Ok(self.bump())
        } else {
            Err(self.error(format!("expected {what}, found {:?}", self.peek())))
        }
    }

    fn expect_ident(&mut self) -> Result<String, CoreError> {
        let tok = self.expect(TokenKind::Ident, "identifier")?;
        Ok(self.text(tok).to_string())
    }

    /// A statement or declaration terminator; `)` and `}` close it implicitly.
    fn expect_semi(&mut self) -> Result<(), CoreError> {
        match self.peek() {
            TokenKind::Semi => {
                self.bump();
                Ok(())
            }
            TokenKind::RParen | TokenKind::RBrace | TokenKind::Eof => Ok(()),
            other => Err(self.error(format!("expected ';' or newline, found {other:?}"))),
        }
    }

    fn skip_semis(&mut self) {
        while self.eat(TokenKind::Semi) {}
    }

    fn skip_balanced_braces(&mut self) -> Result<(), CoreError> {
        self.expect(TokenKind::LBrace, "'{'")?;
        let mut depth = 1usize;
        while depth > 0 {
            match self.bump().kind {
                TokenKind::LBrace => depth += 1,
                TokenKind::RBrace => depth -= 1,
                TokenKind::Eof => return Err(self.error("unterminated block")),
                _ => {}
            }
        }
        Ok(())
    }

    fn with_expr_level<T>(
        &mut self,
        level: i32,
        parse: impl FnOnce(&mut Self) -> Result<T, CoreError>,
    ) -> Result<T, CoreError> {
        let saved = self.expr_level;
        self.expr_level = level;
        let result = parse(self);
        self.expr_level = saved;
        result
    }

    // -----------------------------------------------------------------
    // Declarations
    // -----------------------------------------------------------------

    fn file(&mut self) -> Result<File, CoreError> {
        self.skip_semis();
        self.expect(TokenKind::Package, "package clause")?;
        let package = self.expect_ident()?;
        self.expect_semi()?;

        let mut decls = Vec::new();
        loop {
            self.skip_semis();
            let decl = match self.peek() {
                TokenKind::Eof => break,
                TokenKind::Import => {
                    self.bump();
                    Decl::Import(self.group(Self::import_spec)?)
                }
                TokenKind::Type => {
                    self.bump();
                    Decl::Type(self.group(Self::type_spec)?)
                }
                TokenKind::Var => {
                    self.bump();
                    Decl::Var(self.group(Self::value_spec)?)
                }
                TokenKind::Const => {
                    self.bump();
                    Decl::Const(self.group(Self::value_spec)?)
                }
                TokenKind::Func => Decl::Func(self.func_decl()?),
                other => return Err(self.error(format!("expected declaration, found {other:?}"))),
            };
            decls.push(decl);
            self.expect_semi()?;
        }

        Ok(File { package, decls })
    }

    /// `spec` or `( spec; spec; ... )`.
    fn group<T>(
        &mut self,
        mut spec: impl FnMut(&mut Self) -> Result<T, CoreError>,
    ) -> Result<Vec<T>, CoreError> {
        let mut specs = Vec::new();
        if self.eat(TokenKind::LParen) {
            loop {
                self.skip_semis();
                if self.eat(TokenKind::RParen) {
                    break;
                }
                specs.push(spec(self)?);
                self.expect_semi()?;
            }
        } else {
            specs.push(spec(self)?);
        }
        Ok(specs)
    }

    fn import_spec(&mut self) -> Result<ImportSpec, CoreError> {
        let alias = match self.peek() {
            TokenKind::Ident => Some(self.expect_ident()?),
            TokenKind::Dot => {
                self.bump();
                Some(".".to_string())
            }
            _ => None,
        };
        let tok = self.expect(TokenKind::StringLiteral, "import path")?;
        let path = self.text(tok).trim_matches(|c| c == '"' || c == '`');
        Ok(ImportSpec {
            alias,
            path: path.to_string(),
        })
    }

    fn type_spec(&mut self) -> Result<TypeSpec, CoreError> {
        let name = self.expect_ident()?;
        if self.at(TokenKind::LBracket) && self.peek_at(1) == TokenKind::Ident
            && self.peek_at(2) != TokenKind::RBracket
        {
            return Err(self.error("generic type declarations are not supported"));
        }
        let alias = self.eat(TokenKind::Assign);
        let ty = self.parse_type()?;
        Ok(TypeSpec { name, alias, ty })
    }

    fn value_spec(&mut self) -> Result<ValueSpec, CoreError> {
        let mut names = vec![self.expect_ident()?];
        while self.eat(TokenKind::Comma) {
            names.push(self.expect_ident()?);
        }
        let ty = match self.peek() {
            TokenKind::Assign | TokenKind::Semi | TokenKind::RParen | TokenKind::RBrace => None,
            _ => Some(self.parse_type()?),
        };
        let values = if self.eat(TokenKind::Assign) {
            self.expr_list()?
        } else {
            Vec::new()
        };
        Ok(ValueSpec { names, ty, values })
    }

    fn func_decl(&mut self) -> Result<FuncDecl, CoreError> {
        self.expect(TokenKind::Func, "'func'")?;
        let receiver = if self.at(TokenKind::LParen) {
            let mut fields = self.params()?;
            if fields.len() != 1 {
                return Err(self.error("method receiver must be a single parameter"));
            }
            fields.pop()
        } else {
            None
        };
        let name = self.expect_ident()?;
        if self.at(TokenKind::LBracket) {
            return Err(self.error("generic functions are not supported"));
        }
        let params = self.params()?;
        let results = self.results()?;
        let body = if self.at(TokenKind::LBrace) {
            Some(self.with_expr_level(0, Self::block)?)
        } else {
            None
        };
        Ok(FuncDecl {
            name,
            receiver,
            params,
            results,
            body,
        })
    }

    fn params(&mut self) -> Result<Vec<Field>, CoreError> {
        self.expect(TokenKind::LParen, "'('")?;
        let mut items = Vec::new();
        while !self.at(TokenKind::RParen) {
            items.push(self.param_item()?);
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RParen, "')'")?;
        self.group_params(items)
    }

    fn param_item(&mut self) -> Result<ParamItem, CoreError> {
        if self.at(TokenKind::Ident) {
            match self.peek_at(1) {
                TokenKind::Comma | TokenKind::RParen => {
                    return Ok(ParamItem::Bare(self.expect_ident()?));
                }
                TokenKind::Dot => return Ok(ParamItem::Type(self.param_type()?)),
                _ => {
                    let name = self.expect_ident()?;
                    return Ok(ParamItem::Named(name, self.param_type()?));
                }
            }
        }
        Ok(ParamItem::Type(self.param_type()?))
    }

    fn param_type(&mut self) -> Result<TypeExpr, CoreError> {
        if self.eat(TokenKind::Ellipsis) {
            return Ok(TypeExpr::Variadic(Box::new(self.parse_type()?)));
        }
        self.parse_type()
    }

    /// Go lets `a, b int` share a type; bare names are either names waiting
    /// for a type or, when no entry is named, types themselves.
    fn group_params(&self, items: Vec<ParamItem>) -> Result<Vec<Field>, CoreError> {
        let any_named = items
            .iter()
            .any(|item| matches!(item, ParamItem::Named(..)));

        let mut fields = Vec::new();
        if !any_named {
            for item in items {
                let ty = match item {
                    ParamItem::Bare(name) => TypeExpr::Name(name),
                    ParamItem::Type(ty) | ParamItem::Named(_, ty) => ty,
                };
                fields.push(Field {
                    names: Vec::new(),
                    ty,
                });
            }
            return Ok(fields);
        }

        let mut pending = Vec::new();
        for item in items {
            match item {
                ParamItem::Bare(name) => pending.push(name),
                ParamItem::Named(name, ty) => {
                    pending.push(name);
                    fields.push(Field {
                        names: std::mem::take(&mut pending),
                        ty,
                    });
                }
                ParamItem::Type(_) => {
                    return Err(self.error("mixed named and unnamed parameters"));
                }
            }
        }
        if !pending.is_empty() {
            return Err(self.error("missing parameter type"));
        }
        Ok(fields)
    }

    fn results(&mut self) -> Result<Vec<Field>, CoreError> {
        match self.peek() {
            TokenKind::LParen => self.params(),
            TokenKind::LBrace
            | TokenKind::Semi
            | TokenKind::RParen
            | TokenKind::RBrace
            | TokenKind::RBracket
            | TokenKind::Comma
            | TokenKind::StringLiteral
            | TokenKind::Eof => Ok(Vec::new()),
            _ => Ok(vec![Field {
                names: Vec::new(),
                ty: self.parse_type()?,
            }]),
        }
    }

    // -----------------------------------------------------------------
    // Types
    // -----------------------------------------------------------------

    fn parse_type(&mut self) -> Result<TypeExpr, CoreError> {
        match self.peek() {
            TokenKind::Ident => {
                let name = self.expect_ident()?;
                if self.eat(TokenKind::Dot) {
                    let member = self.expect_ident()?;
                    Ok(TypeExpr::Qualified {
                        package: name,
                        name: member,
                    })
                } else {
                    Ok(TypeExpr::Name(name))
                }
            }
            TokenKind::Star => {
                self.bump();
                Ok(TypeExpr::Pointer(Box::new(self.parse_type()?)))
            }
            TokenKind::LBracket => {
                self.bump();
                if self.eat(TokenKind::RBracket) {
                    return Ok(TypeExpr::Slice(Box::new(self.parse_type()?)));
                }
                let len = if self.eat(TokenKind::Ellipsis) {
                    Expr::ident("...")
                } else {
                    self.with_expr_level(1, Self::expr)?
                };
                self.expect(TokenKind::RBracket, "']'")?;
                Ok(TypeExpr::Array {
                    len: Box::new(len),
                    elem: Box::new(self.parse_type()?),
                })
            }
            TokenKind::Map => {
                self.bump();
                self.expect(TokenKind::LBracket, "'['")?;
                let key = self.parse_type()?;
                self.expect(TokenKind::RBracket, "']'")?;
                Ok(TypeExpr::Map {
                    key: Box::new(key),
                    value: Box::new(self.parse_type()?),
                })
            }
            TokenKind::Chan => {
                self.bump();
                self.eat(TokenKind::Arrow);
                Ok(TypeExpr::Chan(Box::new(self.parse_type()?)))
            }
            TokenKind::Arrow => {
                self.bump();
                self.expect(TokenKind::Chan, "'chan'")?;
                Ok(TypeExpr::Chan(Box::new(self.parse_type()?)))
            }
            TokenKind::Struct => self.struct_type(),
            TokenKind::Interface => {
                self.bump();
                self.skip_balanced_braces()?;
                Ok(TypeExpr::Interface)
            }
            TokenKind::Func => {
                self.bump();
                let params = self.params()?;
                let results = self.results()?;
                Ok(TypeExpr::Func { params, results })
            }
            TokenKind::LParen => {
                self.bump();
                let ty = self.parse_type()?;
                self.expect(TokenKind::RParen, "')'")?;
                Ok(ty)
            }
            other => Err(self.error(format!("expected type, found {other:?}"))),
        }
    }

    fn struct_type(&mut self) -> Result<TypeExpr, CoreError> {
        self.expect(TokenKind::Struct, "'struct'")?;
        self.expect(TokenKind::LBrace, "'{'")?;
        let mut fields = Vec::new();
        loop {
            self.skip_semis();
            if self.eat(TokenKind::RBrace) {
                break;
            }
            let embedded = match self.peek() {
                TokenKind::Star => true,
                TokenKind::Ident => matches!(
                    self.peek_at(1),
                    TokenKind::Semi | TokenKind::RBrace | TokenKind::StringLiteral | TokenKind::Dot
                ),
                _ => false,
            };
            let field = if embedded {
                Field {
                    names: Vec::new(),
                    ty: self.parse_type()?,
                }
            } else {
                let mut names = vec![self.expect_ident()?];
                while self.eat(TokenKind::Comma) {
                    names.push(self.expect_ident()?);
                }
                Field {
                    names,
                    ty: self.parse_type()?,
                }
            };
            // Field tags carry no meaning for the translation.
            self.eat(TokenKind::StringLiteral);
            fields.push(field);
            self.expect_semi()?;
        }
        Ok(TypeExpr::Struct(fields))
    }

    // -----------------------------------------------------------------
    // Statements
    // -----------------------------------------------------------------

    fn block(&mut self) -> Result<Block, CoreError> {
        self.expect(TokenKind::LBrace, "'{'")?;
        let stmts = self.stmt_list()?;
        self.expect(TokenKind::RBrace, "'}'")?;
        Ok(stmts)
    }

    fn stmt_list(&mut self) -> Result<Block, CoreError> {
        let mut stmts = Vec::new();
        loop {
            self.skip_semis();
            if matches!(
                self.peek(),
                TokenKind::RBrace | TokenKind::Case | TokenKind::Default | TokenKind::Eof
            ) {
                break;
            }
            stmts.push(self.stmt()?);
            if !matches!(
                self.peek(),
                TokenKind::RBrace | TokenKind::Case | TokenKind::Default
            ) {
                self.expect_semi()?;
            }
        }
        Ok(stmts)
    }

    fn stmt(&mut self) -> Result<Stmt, CoreError> {
        match self.peek() {
            TokenKind::Var => {
                self.bump();
                Ok(Stmt::Var(self.group(Self::value_spec)?))
            }
            TokenKind::Const => {
                self.bump();
                Ok(Stmt::Const(self.group(Self::value_spec)?))
            }
            TokenKind::Type => {
                self.bump();
                self.group(Self::type_spec)?;
                Ok(Stmt::Unsupported("local type declaration".to_string()))
            }
            TokenKind::Go => {
                self.bump();
                Ok(Stmt::Go(self.expr()?))
            }
            TokenKind::Defer => {
                self.bump();
                Ok(Stmt::Defer(self.expr()?))
            }
            TokenKind::Return => {
                self.bump();
                if matches!(self.peek(), TokenKind::Semi | TokenKind::RBrace) {
                    Ok(Stmt::Return(Vec::new()))
                } else {
                    Ok(Stmt::Return(self.expr_list()?))
                }
            }
            TokenKind::If => Ok(Stmt::If(self.if_stmt()?)),
            TokenKind::For => self.for_stmt(),
            TokenKind::Switch => self.switch_stmt(),
            TokenKind::Select => {
                self.bump();
                self.skip_balanced_braces()?;
                Ok(Stmt::Unsupported("select statement".to_string()))
            }
            TokenKind::Goto => {
                self.bump();
                self.expect_ident()?;
                Ok(Stmt::Unsupported("goto statement".to_string()))
            }
            TokenKind::Break | TokenKind::Continue => {
                let is_break = self.bump().kind == TokenKind::Break;
                if self.at(TokenKind::Ident) {
                    return Err(self.error("labeled break/continue is not supported"));
                }
                Ok(if is_break { Stmt::Break } else { Stmt::Continue })
            }
            TokenKind::Fallthrough => {
                self.bump();
                Ok(Stmt::Fallthrough)
            }
            TokenKind::LBrace => Ok(Stmt::Block(self.block()?)),
            TokenKind::Semi => Ok(Stmt::Empty),
            _ => self.simple_stmt(false),
        }
    }

    /// Expression, send, inc/dec, assignment or short declaration. With
    /// `range_ok`, `k, v := range x` yields a `Stmt::Range` with an empty body.
    fn simple_stmt(&mut self, range_ok: bool) -> Result<Stmt, CoreError> {
        if range_ok && self.eat(TokenKind::Range) {
            return Ok(Stmt::Range {
                key: None,
                value: None,
                define: false,
                collection: self.expr()?,
                body: Vec::new(),
            });
        }

        let mut lhs = self.expr_list()?;
        let op = match self.peek() {
            TokenKind::Define => {
                self.bump();
                if range_ok && self.eat(TokenKind::Range) {
                    return self.range_header(lhs, true);
                }
                let names = lhs
                    .into_iter()
                    .map(|expr| match expr {
                        Expr::Ident(name) => Ok(name),
                        _ => Err(self.error("non-name on left side of :=")),
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                let values = self.expr_list()?;
                return Ok(Stmt::ShortVarDecl { names, values });
            }
            TokenKind::Assign => AssignOp::Assign,
            TokenKind::AddAssign => AssignOp::Add,
            TokenKind::SubAssign => AssignOp::Sub,
            TokenKind::MulAssign => AssignOp::Mul,
            TokenKind::QuoAssign => AssignOp::Quo,
            TokenKind::RemAssign => AssignOp::Rem,
            TokenKind::AndAssign => AssignOp::And,
            TokenKind::OrAssign => AssignOp::Or,
            TokenKind::XorAssign => AssignOp::Xor,
            TokenKind::ShlAssign => AssignOp::Shl,
            TokenKind::ShrAssign => AssignOp::Shr,
            TokenKind::AndNotAssign => AssignOp::AndNot,
            TokenKind::Inc | TokenKind::Dec => {
                let increment = self.bump().kind == TokenKind::Inc;
                let target = self.single(lhs)?;
                return Ok(Stmt::IncDec { target, increment });
            }
            TokenKind::Arrow => {
                self.bump();
                let channel = self.single(lhs)?;
                let value = self.expr()?;
                return Ok(Stmt::Send { channel, value });
            }
            TokenKind::Colon => return Err(self.error("labeled statements are not supported")),
            _ => {
                if lhs.len() != 1 {
                    return Err(self.error("expected assignment after expression list"));
                }
                return Ok(Stmt::Expr(lhs.remove(0)));
            }
        };

        self.bump();
        if op == AssignOp::Assign && range_ok && self.eat(TokenKind::Range) {
            return self.range_header(lhs, false);
        }
        let rhs = self.expr_list()?;
        Ok(Stmt::Assign { lhs, op, rhs })
    }

    fn range_header(&mut self, lhs: Vec<Expr>, define: bool) -> Result<Stmt, CoreError> {
        let mut vars = lhs.into_iter();
        let key = vars.next();
        let value = vars.next();
        if vars.next().is_some() {
            return Err(self.error("range permits at most two iteration variables"));
        }
        Ok(Stmt::Range {
            key,
            value,
            define,
            collection: self.expr()?,
            body: Vec::new(),
        })
    }

    fn single(&self, mut exprs: Vec<Expr>) -> Result<Expr, CoreError> {
        if exprs.len() == 1 {
            Ok(exprs.remove(0))
        } else {
            Err(self.error("expected a single expression"))
        }
    }

    fn if_stmt(&mut self) -> Result<IfStmt, CoreError> {
        self.expect(TokenKind::If, "'if'")?;
        let (init, cond) = self.with_expr_level(-1, |p| {
            let first = p.simple_stmt(false)?;
            if p.eat(TokenKind::Semi) {
                let cond = p.expr()?;
                Ok((Some(Box::new(first)), cond))
            } else {
                Ok((None, p.stmt_as_expr(first)?))
            }
        })?;
        let then = self.block()?;
        let otherwise = if self.eat(TokenKind::Else) {
            if self.at(TokenKind::If) {
                Some(Box::new(Else::If(self.if_stmt()?)))
            } else {
                Some(Box::new(Else::Block(self.block()?)))
            }
        } else {
            None
        };
        Ok(IfStmt {
            init,
            cond,
            then,
            otherwise,
        })
    }

    fn stmt_as_expr(&self, stmt: Stmt) -> Result<Expr, CoreError> {
        match stmt {
            Stmt::Expr(expr) => Ok(expr),
            _ => Err(self.error("expected expression")),
        }
    }

    fn for_stmt(&mut self) -> Result<Stmt, CoreError> {
        self.expect(TokenKind::For, "'for'")?;
        let header = self.with_expr_level(-1, |p| {
            if p.at(TokenKind::LBrace) {
                return Ok((None, None, None, None));
            }
            let first = if p.at(TokenKind::Semi) {
                None
            } else {
                Some(p.simple_stmt(true)?)
            };
            if let Some(range @ Stmt::Range { .. }) = first {
                return Ok((None, None, None, Some(range)));
            }
            if p.eat(TokenKind::Semi) {
                let cond = if p.at(TokenKind::Semi) {
                    None
                } else {
                    Some(p.expr()?)
                };
                p.expect(TokenKind::Semi, "';'")?;
                let post = if p.at(TokenKind::LBrace) {
                    None
                } else {
                    Some(Box::new(p.simple_stmt(false)?))
                };
                return Ok((first.map(Box::new), cond, post, None));
            }
            match first {
                Some(stmt) => Ok((None, Some(p.stmt_as_expr(stmt)?), None, None)),
                None => Ok((None, None, None, None)),
            }
        })?;

        let body = self.block()?;
        let (init, cond, post, range) = header;
        if let Some(Stmt::Range {
            key,
            value,
            define,
            collection,
            ..
        }) = range
        {
            return Ok(Stmt::Range {
                key,
                value,
                define,
                collection,
                body,
            });
        }
        Ok(Stmt::For {
            init,
            cond,
            post,
            body,
        })
    }

    fn switch_stmt(&mut self) -> Result<Stmt, CoreError> {
        self.expect(TokenKind::Switch, "'switch'")?;
        let (init, tag) = self.with_expr_level(-1, |p| {
            if p.at(TokenKind::LBrace) {
                return Ok((None, None));
            }
            let first = p.simple_stmt(false)?;
            if p.eat(TokenKind::Semi) {
                let tag = if p.at(TokenKind::LBrace) {
                    None
                } else {
                    Some(p.simple_stmt(false)?)
                };
                Ok((Some(Box::new(first)), tag))
            } else {
                Ok((None, Some(first)))
            }
        })?;

        let tag = match tag {
            None => None,
            Some(Stmt::Expr(Expr::TypeAssert { ty: None, .. })) | Some(Stmt::ShortVarDecl { .. }) => {
                self.skip_balanced_braces()?;
                return Ok(Stmt::Unsupported("type switch".to_string()));
            }
            Some(stmt) => Some(self.stmt_as_expr(stmt)?),
        };

        self.expect(TokenKind::LBrace, "'{'")?;
        let mut clauses = Vec::new();
        loop {
            self.skip_semis();
            let values = match self.peek() {
                TokenKind::RBrace => break,
                TokenKind::Case => {
                    self.bump();
                    self.expr_list()?
                }
                TokenKind::Default => {
                    self.bump();
                    Vec::new()
                }
                other => return Err(self.error(format!("expected case clause, found {other:?}"))),
            };
            self.expect(TokenKind::Colon, "':'")?;
            let body = self.stmt_list()?;
            clauses.push(CaseClause { values, body });
        }
        self.expect(TokenKind::RBrace, "'}'")?;
        Ok(Stmt::Switch { init, tag, clauses })
    }

    // -----------------------------------------------------------------
    // Expressions
    // -----------------------------------------------------------------

    fn expr_list(&mut self) -> Result<Vec<Expr>, CoreError> {
        let mut exprs = vec![self.expr()?];
        while self.eat(TokenKind::Comma) {
            exprs.push(self.expr()?);
        }
        Ok(exprs)
    }

    fn expr(&mut self) -> Result<Expr, CoreError> {
        self.binary(1)
    }

    fn binary(&mut self, min_precedence: u8) -> Result<Expr, CoreError> {
        let mut lhs = self.unary()?;
        while let Some((precedence, op)) = binary_op(self.peek()) {
            if precedence < min_precedence {
                break;
            }
            self.bump();
            let rhs = self.binary(precedence + 1)?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr, CoreError> {
        let op = match self.peek() {
            TokenKind::Plus => UnaryOp::Plus,
            TokenKind::Minus => UnaryOp::Neg,
            TokenKind::Not => UnaryOp::Not,
            TokenKind::Caret => UnaryOp::BitNot,
            TokenKind::Amp => UnaryOp::Addr,
            TokenKind::Star => UnaryOp::Deref,
            TokenKind::Arrow if self.peek_at(1) != TokenKind::Chan => UnaryOp::Recv,
            _ => return self.primary(),
        };
        self.bump();
        let operand = self.unary()?;
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    fn primary(&mut self) -> Result<Expr, CoreError> {
        let mut expr = self.operand()?;
        loop {
            match self.peek() {
                TokenKind::Dot => {
                    self.bump();
                    if self.eat(TokenKind::LParen) {
                        let ty = if self.eat(TokenKind::Type) {
                            None
                        } else {
                            Some(self.parse_type()?)
                        };
                        self.expect(TokenKind::RParen, "')'")?;
                        expr = Expr::TypeAssert {
                            base: Box::new(expr),
                            ty,
                        };
                    } else {
                        let field = self.expect_ident()?;
                        expr = Expr::Selector {
                            base: Box::new(expr),
                            field,
                        };
                    }
                }
                TokenKind::LBracket => {
                    self.bump();
                    expr = self.with_expr_level(1, |p| p.index_or_slice(expr))?;
                    self.expect(TokenKind::RBracket, "']'")?;
                }
                TokenKind::LParen => {
                    self.bump();
                    let (args, spread) = self.with_expr_level(1, Self::call_args)?;
                    self.expect(TokenKind::RParen, "')'")?;
                    expr = Expr::Call {
                        func: Box::new(expr),
                        args,
                        spread,
                    };
                }
                TokenKind::LBrace if self.opens_composite(&expr) => {
                    let ty = literal_type(&expr);
                    expr = self.composite(ty)?;
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn opens_composite(&self, expr: &Expr) -> bool {
        match expr {
            Expr::Type(_) => true,
            Expr::Ident(_) | Expr::Selector { .. } => {
                self.expr_level >= 0 && expr.dotted_name().is_some()
            }
            _ => false,
        }
    }

    fn index_or_slice(&mut self, base: Expr) -> Result<Expr, CoreError> {
        let low = if self.at(TokenKind::Colon) {
            None
        } else {
            Some(Box::new(self.expr()?))
        };
        if self.eat(TokenKind::Colon) {
            let high = if self.at(TokenKind::RBracket) {
                None
            } else {
                Some(Box::new(self.expr()?))
            };
            return Ok(Expr::Slice {
                base: Box::new(base),
                low,
                high,
            });
        }
        match low {
            Some(index) => Ok(Expr::Index {
                base: Box::new(base),
                index,
            }),
            None => Err(self.error("expected index expression")),
        }
    }

    fn call_args(&mut self) -> Result<(Vec<Expr>, bool), CoreError> {
        let mut args = Vec::new();
        let mut spread = false;
        while !self.at(TokenKind::RParen) {
            args.push(self.expr()?);
            if self.eat(TokenKind::Ellipsis) {
                spread = true;
            }
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        Ok((args, spread))
    }

    fn operand(&mut self) -> Result<Expr, CoreError> {
        let kind = self.peek();
        let lit_kind = match kind {
            TokenKind::IntLiteral => Some(LitKind::Int),
            TokenKind::FloatLiteral => Some(LitKind::Float),
            TokenKind::StringLiteral => Some(LitKind::String),
            TokenKind::CharLiteral => Some(LitKind::Char),
            _ => None,
        };
        if let Some(kind) = lit_kind {
            let tok = self.bump();
            return Ok(Expr::Lit {
                kind,
                value: self.text(tok).to_string(),
            });
        }

        match kind {
            TokenKind::Ident => Ok(Expr::Ident(self.expect_ident()?)),
            TokenKind::LParen => {
                self.bump();
                let inner = self.with_expr_level(1, Self::expr)?;
                self.expect(TokenKind::RParen, "')'")?;
                Ok(Expr::Paren(Box::new(inner)))
            }
            TokenKind::Func => {
                self.bump();
                let params = self.params()?;
                let results = self.results()?;
                if self.at(TokenKind::LBrace) {
                    let body = self.with_expr_level(0, Self::block)?;
                    Ok(Expr::FuncLit(FuncLit {
                        params,
                        results,
                        body,
                    }))
                } else {
                    Ok(Expr::Type(TypeExpr::Func { params, results }))
                }
            }
            TokenKind::LBracket
            | TokenKind::Map
            | TokenKind::Chan
            | TokenKind::Struct
            | TokenKind::Interface => Ok(Expr::Type(self.parse_type()?)),
            other => Err(self.error(format!("expected expression, found {other:?}"))),
        }
    }

    fn composite(&mut self, ty: Option<TypeExpr>) -> Result<Expr, CoreError> {
        self.expect(TokenKind::LBrace, "'{'")?;
        let elements = self.with_expr_level(1, |p| {
            let mut elements = Vec::new();
            loop {
                p.skip_semis();
                if p.at(TokenKind::RBrace) {
                    break;
                }
                let first = p.element_value()?;
                let element = if p.eat(TokenKind::Colon) {
                    Element {
                        key: Some(first),
                        value: p.element_value()?,
                    }
                } else {
                    Element {
                        key: None,
                        value: first,
                    }
                };
                elements.push(element);
                if !p.eat(TokenKind::Comma) {
                    p.skip_semis();
                    break;
                }
            }
            Ok(elements)
        })?;
        self.expect(TokenKind::RBrace, "'}'")?;
        Ok(Expr::Composite { ty, elements })
    }

    /// An element value; a bare `{...}` is an untyped nested literal.
    fn element_value(&mut self) -> Result<Expr, CoreError> {
        if self.at(TokenKind::LBrace) {
            self.composite(None)
        } else {
            self.expr()
        }
    }
}

fn literal_type(expr: &Expr) -> Option<TypeExpr> {
    match expr {
        Expr::Type(ty) => Some(ty.clone()),
        Expr::Ident(name) => Some(TypeExpr::Name(name.clone())),
        Expr::Selector { base, field } => base.as_ident().map(|package| TypeExpr::Qualified {
            package: package.to_string(),
            name: field.clone(),
        }),
        _ => None,
    }
}

fn binary_op(kind: TokenKind) -> Option<(u8, BinaryOp)> {
    let entry = match kind {
        TokenKind::LogOr => (1, BinaryOp::LogOr),
        TokenKind::LogAnd => (2, BinaryOp::LogAnd),
        TokenKind::EqEq => (3, BinaryOp::Eq),
        TokenKind::NotEq => (3, BinaryOp::NotEq),
        TokenKind::Less => (3, BinaryOp::Less),
        TokenKind::LessEq => (3, BinaryOp::LessEq),
        TokenKind::Greater => (3, BinaryOp::Greater),
        TokenKind::GreaterEq => (3, BinaryOp::GreaterEq),
        TokenKind::Plus => (4, BinaryOp::Add),
        TokenKind::Minus => (4, BinaryOp::Sub),
        TokenKind::Pipe => (4, BinaryOp::Or),
        TokenKind::Caret => (4, BinaryOp::Xor),
        TokenKind::Star => (5, BinaryOp::Mul),
        TokenKind::Slash => (5, BinaryOp::Quo),
        TokenKind::Percent => (5, BinaryOp::Rem),
        TokenKind::Shl => (5, BinaryOp::Shl),
        TokenKind::Shr => (5, BinaryOp::Shr),
        TokenKind::Amp => (5, BinaryOp::And),
        TokenKind::AmpCaret => (5, BinaryOp::AndNot),
        _ => return None,
    };
    Some(entry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    fn parse_body(body: &str) -> Block {
        let source = format!("package main\nfunc main() {{\n{body}\n}}\n");
        let file = parse_file(&source).expect("parse");
        match file.decls.into_iter().next() {
            Some(Decl::Func(func)) => func.body.expect("body"),
            other => panic!("unexpected decl: {other:?}"),
        }
    }

    #[test]
    fn parses_package_imports_and_structs() {
        let file = parse_file(indoc! {r#"
            package main

            import (
                "fmt"
                g "github.com/acme/sync"
            )

            type User struct {
                Name   string `json:"name"`
                ID, Age int
                *Base
            }
        "#})
        .expect("parse");

        assert_eq!(file.package, "main");
        let Decl::Import(imports) = &file.decls[0] else {
            panic!("expected imports");
        };
        assert_eq!(imports[0].local_name(), "fmt");
        assert_eq!(imports[1].local_name(), "g");

        let Decl::Type(specs) = &file.decls[1] else {
            panic!("expected type decl");
        };
        let TypeExpr::Struct(fields) = &specs[0].ty else {
            panic!("expected struct");
        };
        assert_eq!(fields.len(), 3);
        assert_eq!(fields[1].names, vec!["ID".to_string(), "Age".to_string()]);
        assert!(fields[2].names.is_empty());
    }

    #[test]
    fn groups_parameter_names_with_types() {
        let file = parse_file("package main\nfunc clamp(val, min int, label string) (int, error) { return 0, nil }\n")
            .expect("parse");
        let Decl::Func(func) = &file.decls[0] else {
            panic!("expected func");
        };
        assert_eq!(func.params.len(), 2);
        assert_eq!(func.params[0].names, vec!["val".to_string(), "min".to_string()]);
        assert_eq!(func.results.len(), 2);
        assert!(func.results.iter().all(|field| field.names.is_empty()));
    }

    #[test]
    fn parses_pointer_receiver_methods() {
        let file = parse_file("package main\nfunc (c *Counter) Increment() { c.Value++ }\n")
            .expect("parse");
        let Decl::Func(func) = &file.decls[0] else {
            panic!("expected func");
        };
        let receiver = func.receiver.as_ref().expect("receiver");
        assert_eq!(receiver.names, vec!["c".to_string()]);
        assert!(matches!(receiver.ty, TypeExpr::Pointer(_)));
        assert!(matches!(
            func.body.as_deref(),
            Some([Stmt::IncDec { increment: true, .. }])
        ));
    }

    #[test]
    fn parses_address_of_composite_binding() {
        let body = parse_body("u := &User{Name: \"Hero\", Health: 100}");
        let Stmt::ShortVarDecl { names, values } = &body[0] else {
            panic!("expected short var decl");
        };
        assert_eq!(names, &vec!["u".to_string()]);
        let (ty, elements) = values[0].as_address_of_composite().expect("&T{}");
        assert_eq!(ty, &Some(TypeExpr::Name("User".into())));
        assert_eq!(elements.len(), 2);
        assert!(elements[0].key.is_some());
    }

    #[test]
    fn control_clause_does_not_open_composite_literal() {
        let body = parse_body("if p.Alive {\n fmt.Println(1)\n} else if x > 2 {\n} else {\n}");
        let Stmt::If(if_stmt) = &body[0] else {
            panic!("expected if");
        };
        assert!(matches!(if_stmt.cond, Expr::Selector { .. }));
        assert!(matches!(if_stmt.otherwise.as_deref(), Some(Else::If(_))));
    }

    #[test]
    fn parses_three_clause_and_range_loops() {
        let body = parse_body("for i := 0; i < 5; i++ {\n}\nfor _, n := range nums {\n total += n\n}\nfor {\n break\n}");
        assert!(matches!(
            &body[0],
            Stmt::For {
                init: Some(_),
                cond: Some(_),
                post: Some(_),
                ..
            }
        ));
        let Stmt::Range {
            key, value, define, body: range_body, ..
        } = &body[1]
        else {
            panic!("expected range");
        };
        assert_eq!(key.as_ref().and_then(Expr::as_ident), Some("_"));
        assert_eq!(value.as_ref().and_then(Expr::as_ident), Some("n"));
        assert!(*define);
        assert_eq!(range_body.len(), 1);
        assert!(matches!(
            &body[2],
            Stmt::For {
                init: None,
                cond: None,
                post: None,
                ..
            }
        ));
    }

    #[test]
    fn parses_goroutine_with_inline_function() {
        let body = parse_body("go func() {\n ch <- 42\n}()\nval := <-ch");
        let Stmt::Go(Expr::Call { func, args, .. }) = &body[0] else {
            panic!("expected go call");
        };
        assert!(args.is_empty());
        let Expr::FuncLit(lit) = func.as_ref() else {
            panic!("expected func literal");
        };
        assert!(matches!(lit.body[0], Stmt::Send { .. }));
        let Stmt::ShortVarDecl { values, .. } = &body[1] else {
            panic!("expected short var decl");
        };
        assert!(matches!(
            values[0],
            Expr::Unary {
                op: UnaryOp::Recv,
                ..
            }
        ));
    }

    #[test]
    fn parses_make_with_type_arguments() {
        let body = parse_body("nums := make([]int, 0)\nch := make(chan int)\nm := make(map[string]int)");
        for stmt in &body {
            let Stmt::ShortVarDecl { values, .. } = stmt else {
                panic!("expected short var decl");
            };
            let Expr::Call { args, .. } = &values[0] else {
                panic!("expected call");
            };
            assert!(matches!(args[0], Expr::Type(_)));
        }
    }

    #[test]
    fn respects_operator_precedence() {
        let body = parse_body("x := a + b*c == d");
        let Stmt::ShortVarDecl { values, .. } = &body[0] else {
            panic!("expected short var decl");
        };
        let Expr::Binary { op, lhs, .. } = &values[0] else {
            panic!("expected binary");
        };
        assert_eq!(*op, BinaryOp::Eq);
        assert!(matches!(
            lhs.as_ref(),
            Expr::Binary {
                op: BinaryOp::Add,
                ..
            }
        ));
    }

    #[test]
    fn parses_switch_and_marks_select_unsupported() {
        let body = parse_body("switch x {\ncase 1, 2:\n y()\ncase 3:\n fallthrough\ndefault:\n}\nselect {\n}");
        let Stmt::Switch { tag, clauses, .. } = &body[0] else {
            panic!("expected switch");
        };
        assert!(tag.is_some());
        assert_eq!(clauses.len(), 3);
        assert_eq!(clauses[0].values.len(), 2);
        assert!(clauses[2].values.is_empty());
        assert!(matches!(&body[1], Stmt::Unsupported(kind) if kind == "select statement"));
    }

    #[test]
    fn reports_missing_package_clause() {
        let err = parse_file("func main() {}").unwrap_err();
        assert!(matches!(err, CoreError::ParseError { position: 0, .. }));
    }

    #[test]
    fn reports_generic_functions() {
        let err = parse_file("package main\nfunc Map[T any](x T) T { return x }\n").unwrap_err();
        assert!(matches!(err, CoreError::ParseError { .. }));
    }
}
