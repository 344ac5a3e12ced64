//! Surface AST for the accepted Go subset.
//!
//! Every construct is a variant of a closed enum so that each translator
//! stage dispatches with an exhaustive `match`.

/// One translation unit. Several source files of the same package are
/// merged into a single `File` by concatenating their declarations.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct File {
    pub package: String,
    pub decls: Vec<Decl>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Decl {
    Import(Vec<ImportSpec>),
    Type(Vec<TypeSpec>),
    Var(Vec<ValueSpec>),
    Const(Vec<ValueSpec>),
    Func(FuncDecl),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSpec {
    pub alias: Option<String>,
    pub path: String,
}

impl ImportSpec {
    /// Name the package is referred to by: the alias, or the last path segment.
    pub fn local_name(&self) -> &str {
        match &self.alias {
            Some(alias) => alias,
            None => self.path.rsplit('/').next().unwrap_or(&self.path),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeSpec {
    pub name: String,
    /// `type A = B` rather than `type A B`.
    pub alias: bool,
    pub ty: TypeExpr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValueSpec {
    pub names: Vec<String>,
    pub ty: Option<TypeExpr>,
    pub values: Vec<Expr>,
}

/// A parameter, result, receiver or struct field group: `a, b int`.
/// `names` is empty for anonymous parameters and embedded fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub names: Vec<String>,
    pub ty: TypeExpr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FuncDecl {
    pub name: String,
    pub receiver: Option<Field>,
    pub params: Vec<Field>,
    pub results: Vec<Field>,
    pub body: Option<Block>,
}

impl FuncDecl {
    /// Type of the first declared result, if any.
    pub fn first_result(&self) -> Option<&TypeExpr> {
        self.results.first().map(|field| &field.ty)
    }
}

pub type Block = Vec<Stmt>;

#[derive(Debug, Clone, PartialEq)]
pub enum TypeExpr {
    Name(String),
    Qualified { package: String, name: String },
    Pointer(Box<TypeExpr>),
    Slice(Box<TypeExpr>),
    Array { len: Box<Expr>, elem: Box<TypeExpr> },
    Map { key: Box<TypeExpr>, value: Box<TypeExpr> },
    Chan(Box<TypeExpr>),
    Variadic(Box<TypeExpr>),
    Struct(Vec<Field>),
    Interface,
    Func { params: Vec<Field>, results: Vec<Field> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    Add,
    Sub,
    Mul,
    Quo,
    Rem,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    AndNot,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Expr(Expr),
    /// `a, b := x, y`
    ShortVarDecl { names: Vec<String>, values: Vec<Expr> },
    Assign { lhs: Vec<Expr>, op: AssignOp, rhs: Vec<Expr> },
    IncDec { target: Expr, increment: bool },
    Send { channel: Expr, value: Expr },
    Go(Expr),
    Defer(Expr),
    Return(Vec<Expr>),
    If(IfStmt),
    For {
        init: Option<Box<Stmt>>,
        cond: Option<Expr>,
        post: Option<Box<Stmt>>,
        body: Block,
    },
    Range {
        key: Option<Expr>,
        value: Option<Expr>,
        define: bool,
        collection: Expr,
        body: Block,
    },
    Switch {
        init: Option<Box<Stmt>>,
        tag: Option<Expr>,
        clauses: Vec<CaseClause>,
    },
    Block(Block),
    Var(Vec<ValueSpec>),
    Const(Vec<ValueSpec>),
    Break,
    Continue,
    Fallthrough,
    Empty,
    /// A construct the parser recognizes but golden does not translate.
    Unsupported(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct IfStmt {
    pub init: Option<Box<Stmt>>,
    pub cond: Expr,
    pub then: Block,
    pub otherwise: Option<Box<Else>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Else {
    If(IfStmt),
    Block(Block),
}

/// `case a, b:` clause; an empty `values` list is `default:`.
#[derive(Debug, Clone, PartialEq)]
pub struct CaseClause {
    pub values: Vec<Expr>,
    pub body: Block,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LitKind {
    Int,
    Float,
    String,
    Char,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Quo,
    Rem,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    AndNot,
    LogAnd,
    LogOr,
    Eq,
    NotEq,
    Less,
    LessEq,
    Greater,
    GreaterEq,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Plus,
    Neg,
    Not,
    BitNot,
    Addr,
    Deref,
    Recv,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub key: Option<Expr>,
    pub value: Expr,
}

impl Element {
    /// A bare identifier key naming a struct field rather than a map key
    /// or array index expression.
    pub fn field_name(&self, literal: Option<&TypeExpr>) -> Option<&str> {
        if matches!(
            literal,
            Some(TypeExpr::Map { .. } | TypeExpr::Slice(_) | TypeExpr::Array { .. })
        ) {
            return None;
        }
        self.key.as_ref()?.as_ident()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FuncLit {
    pub params: Vec<Field>,
    pub results: Vec<Field>,
    pub body: Block,
}

/// Reference to a goroutine capture, produced by task-closure lowering in
/// place of the original identifier node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureRef {
    /// Variable holding the capture record inside the wrapper.
    pub record: String,
    pub name: String,
    /// The record stores the variable's address rather than a copy.
    pub by_address: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Ident(String),
    Lit { kind: LitKind, value: String },
    Binary { op: BinaryOp, lhs: Box<Expr>, rhs: Box<Expr> },
    Unary { op: UnaryOp, operand: Box<Expr> },
    Paren(Box<Expr>),
    Selector { base: Box<Expr>, field: String },
    Index { base: Box<Expr>, index: Box<Expr> },
    Slice { base: Box<Expr>, low: Option<Box<Expr>>, high: Option<Box<Expr>> },
    Call { func: Box<Expr>, args: Vec<Expr>, spread: bool },
    Composite { ty: Option<TypeExpr>, elements: Vec<Element> },
    FuncLit(FuncLit),
    /// `x.(T)`; `ty` is `None` for the `x.(type)` switch guard.
    TypeAssert { base: Box<Expr>, ty: Option<TypeExpr> },
    /// A type in expression position (`make([]int, 0)`, `[]byte(s)`).
    Type(TypeExpr),
    Captured(CaptureRef),
}

impl Expr {
    pub fn ident(name: impl Into<String>) -> Self {
        Expr::Ident(name.into())
    }

    pub fn as_ident(&self) -> Option<&str> {
        match self {
            Expr::Ident(name) => Some(name),
            _ => None,
        }
    }

    /// `pkg.Name` / `x.Method` rendered as dotted text, if the expression
    /// is a chain of identifiers and selectors.
    pub fn dotted_name(&self) -> Option<String> {
        match self {
            Expr::Ident(name) => Some(name.clone()),
            Expr::Selector { base, field } => {
                base.dotted_name().map(|base| format!("{base}.{field}"))
            }
            _ => None,
        }
    }

    /// `&T{...}`: the composite literal behind an address-of, if any.
    pub fn as_address_of_composite(&self) -> Option<(&Option<TypeExpr>, &[Element])> {
        match self {
            Expr::Unary {
                op: UnaryOp::Addr,
                operand,
            } => match operand.as_ref() {
                Expr::Composite { ty, elements } => Some((ty, elements)),
                _ => None,
            },
            _ => None,
        }
    }

    /// Visit this expression and every sub-expression, outermost first.
    ///
    /// Function-literal bodies are visited too, so statement-level
    /// expressions inside them are reported.
    pub fn walk(&self, visit: &mut dyn FnMut(&Expr)) {
        visit(self);
        match self {
            Expr::Ident(_) | Expr::Lit { .. } | Expr::Type(_) | Expr::Captured(_) => {}
            Expr::Binary { lhs, rhs, .. } => {
                lhs.walk(visit);
                rhs.walk(visit);
            }
            Expr::Unary { operand, .. } => operand.walk(visit),
            Expr::Paren(inner) => inner.walk(visit),
            Expr::Selector { base, .. } => base.walk(visit),
            Expr::Index { base, index } => {
                base.walk(visit);
                index.walk(visit);
            }
            Expr::Slice { base, low, high } => {
                base.walk(visit);
                if let Some(low) = low {
                    low.walk(visit);
                }
                if let Some(high) = high {
                    high.walk(visit);
                }
            }
            Expr::Call { func, args, .. } => {
                func.walk(visit);
                for arg in args {
                    arg.walk(visit);
                }
            }
            Expr::Composite { ty, elements } => {
                for element in elements {
                    if let Some(key) = &element.key {
                        if element.field_name(ty.as_ref()).is_none() {
                            key.walk(visit);
                        }
                    }
                    element.value.walk(visit);
                }
            }
            Expr::FuncLit(lit) => {
                for stmt in &lit.body {
                    stmt.walk_exprs(visit);
                }
            }
            Expr::TypeAssert { base, .. } => base.walk(visit),
        }
    }

    /// Mutable counterpart of [`Expr::walk`]. The visitor sees a node
    /// before its children; children of a replaced node are the new ones.
    pub fn walk_mut(&mut self, visit: &mut dyn FnMut(&mut Expr)) {
        visit(self);
        match self {
            Expr::Ident(_) | Expr::Lit { .. } | Expr::Type(_) | Expr::Captured(_) => {}
            Expr::Binary { lhs, rhs, .. } => {
                lhs.walk_mut(visit);
                rhs.walk_mut(visit);
            }
            Expr::Unary { operand, .. } => operand.walk_mut(visit),
            Expr::Paren(inner) => inner.walk_mut(visit),
            Expr::Selector { base, .. } => base.walk_mut(visit),
            Expr::Index { base, index } => {
                base.walk_mut(visit);
                index.walk_mut(visit);
            }
            Expr::Slice { base, low, high } => {
                base.walk_mut(visit);
                if let Some(low) = low {
                    low.walk_mut(visit);
                }
                if let Some(high) = high {
                    high.walk_mut(visit);
                }
            }
            Expr::Call { func, args, .. } => {
                func.walk_mut(visit);
                for arg in args {
                    arg.walk_mut(visit);
                }
            }
            Expr::Composite { ty, elements } => {
                for element in elements {
                    let is_field = element.field_name(ty.as_ref()).is_some();
                    if let Some(key) = &mut element.key {
                        if !is_field {
                            key.walk_mut(visit);
                        }
                    }
                    element.value.walk_mut(visit);
                }
            }
            Expr::FuncLit(lit) => {
                for stmt in &mut lit.body {
                    stmt.walk_exprs_mut(visit);
                }
            }
            Expr::TypeAssert { base, .. } => base.walk_mut(visit),
        }
    }

    /// Whether the identifier `name` occurs anywhere in this expression.
    pub fn mentions(&self, name: &str) -> bool {
        let mut found = false;
        self.walk(&mut |expr| {
            if matches!(expr, Expr::Ident(n) if n == name) {
                found = true;
            }
        });
        found
    }
}

impl Stmt {
    /// Visit every expression reachable from this statement, including
    /// those in nested blocks.
    pub fn walk_exprs(&self, visit: &mut dyn FnMut(&Expr)) {
        match self {
            Stmt::Expr(expr) | Stmt::Go(expr) | Stmt::Defer(expr) => expr.walk(visit),
            Stmt::ShortVarDecl { values, .. } => values.iter().for_each(|e| e.walk(visit)),
            Stmt::Assign { lhs, rhs, .. } => {
                lhs.iter().chain(rhs).for_each(|e| e.walk(visit));
            }
            Stmt::IncDec { target, .. } => target.walk(visit),
            Stmt::Send { channel, value } => {
                channel.walk(visit);
                value.walk(visit);
            }
            Stmt::Return(results) => results.iter().for_each(|e| e.walk(visit)),
            Stmt::If(if_stmt) => if_stmt.walk_exprs(visit),
            Stmt::For {
                init,
                cond,
                post,
                body,
            } => {
                if let Some(init) = init {
                    init.walk_exprs(visit);
                }
                if let Some(cond) = cond {
                    cond.walk(visit);
                }
                if let Some(post) = post {
                    post.walk_exprs(visit);
                }
                body.iter().for_each(|s| s.walk_exprs(visit));
            }
            Stmt::Range {
                key,
                value,
                collection,
                body,
                ..
            } => {
                key.iter().chain(value).for_each(|e| e.walk(visit));
                collection.walk(visit);
                body.iter().for_each(|s| s.walk_exprs(visit));
            }
            Stmt::Switch { init, tag, clauses } => {
                if let Some(init) = init {
                    init.walk_exprs(visit);
                }
                if let Some(tag) = tag {
                    tag.walk(visit);
                }
                for clause in clauses {
                    clause.values.iter().for_each(|e| e.walk(visit));
                    clause.body.iter().for_each(|s| s.walk_exprs(visit));
                }
            }
            Stmt::Block(block) => block.iter().for_each(|s| s.walk_exprs(visit)),
            Stmt::Var(specs) | Stmt::Const(specs) => {
                specs
                    .iter()
                    .flat_map(|spec| &spec.values)
                    .for_each(|e| e.walk(visit));
            }
            Stmt::Break | Stmt::Continue | Stmt::Fallthrough | Stmt::Empty => {}
            Stmt::Unsupported(_) => {}
        }
    }
}

impl Stmt {
    /// Mutable counterpart of [`Stmt::walk_exprs`].
    pub fn walk_exprs_mut(&mut self, visit: &mut dyn FnMut(&mut Expr)) {
        match self {
            Stmt::Expr(expr) | Stmt::Go(expr) | Stmt::Defer(expr) => expr.walk_mut(visit),
            Stmt::ShortVarDecl { values, .. } => values.iter_mut().for_each(|e| e.walk_mut(visit)),
            Stmt::Assign { lhs, rhs, .. } => {
                lhs.iter_mut().chain(rhs).for_each(|e| e.walk_mut(visit));
            }
            Stmt::IncDec { target, .. } => target.walk_mut(visit),
            Stmt::Send { channel, value } => {
                channel.walk_mut(visit);
                value.walk_mut(visit);
            }
            Stmt::Return(results) => results.iter_mut().for_each(|e| e.walk_mut(visit)),
            Stmt::If(if_stmt) => if_stmt.walk_exprs_mut(visit),
            Stmt::For {
                init,
                cond,
                post,
                body,
            } => {
                if let Some(init) = init {
                    init.walk_exprs_mut(visit);
                }
                if let Some(cond) = cond {
                    cond.walk_mut(visit);
                }
                if let Some(post) = post {
                    post.walk_exprs_mut(visit);
                }
                body.iter_mut().for_each(|s| s.walk_exprs_mut(visit));
            }
            Stmt::Range {
                key,
                value,
                collection,
                body,
                ..
            } => {
                key.iter_mut().chain(value).for_each(|e| e.walk_mut(visit));
                collection.walk_mut(visit);
                body.iter_mut().for_each(|s| s.walk_exprs_mut(visit));
            }
            Stmt::Switch { init, tag, clauses } => {
                if let Some(init) = init {
                    init.walk_exprs_mut(visit);
                }
                if let Some(tag) = tag {
                    tag.walk_mut(visit);
                }
                for clause in clauses {
                    clause.values.iter_mut().for_each(|e| e.walk_mut(visit));
                    clause.body.iter_mut().for_each(|s| s.walk_exprs_mut(visit));
                }
            }
            Stmt::Block(block) => block.iter_mut().for_each(|s| s.walk_exprs_mut(visit)),
            Stmt::Var(specs) | Stmt::Const(specs) => {
                specs
                    .iter_mut()
                    .flat_map(|spec| &mut spec.values)
                    .for_each(|e| e.walk_mut(visit));
            }
            Stmt::Break | Stmt::Continue | Stmt::Fallthrough | Stmt::Empty => {}
            Stmt::Unsupported(_) => {}
        }
    }

    /// Statement blocks nested directly in this statement, including every
    /// branch of an `if`/`else if` chain. Function literals are not
    /// included.
    pub fn nested_blocks(&self) -> Vec<&[Stmt]> {
        match self {
            Stmt::For { body, .. } | Stmt::Range { body, .. } | Stmt::Block(body) => {
                vec![body.as_slice()]
            }
            Stmt::Switch { clauses, .. } => clauses.iter().map(|c| c.body.as_slice()).collect(),
            Stmt::If(if_stmt) => {
                let mut blocks = vec![if_stmt.then.as_slice()];
                let mut otherwise = if_stmt.otherwise.as_deref();
                while let Some(branch) = otherwise {
                    match branch {
                        Else::If(nested) => {
                            blocks.push(nested.then.as_slice());
                            otherwise = nested.otherwise.as_deref();
                        }
                        Else::Block(body) => {
                            blocks.push(body.as_slice());
                            otherwise = None;
                        }
                    }
                }
                blocks
            }
            _ => Vec::new(),
        }
    }
}

/// Visit every statement of `stmts` and of their nested blocks, without
/// entering function literals.
pub fn visit_stmts(stmts: &[Stmt], visit: &mut dyn FnMut(&Stmt)) {
    for stmt in stmts {
        visit(stmt);
        for block in stmt.nested_blocks() {
            visit_stmts(block, visit);
        }
    }
}

impl IfStmt {
    fn walk_exprs_mut(&mut self, visit: &mut dyn FnMut(&mut Expr)) {
        if let Some(init) = &mut self.init {
            init.walk_exprs_mut(visit);
        }
        self.cond.walk_mut(visit);
        self.then.iter_mut().for_each(|s| s.walk_exprs_mut(visit));
        match self.otherwise.as_deref_mut() {
            Some(Else::If(nested)) => nested.walk_exprs_mut(visit),
            Some(Else::Block(block)) => block.iter_mut().for_each(|s| s.walk_exprs_mut(visit)),
            None => {}
        }
    }

    fn walk_exprs(&self, visit: &mut dyn FnMut(&Expr)) {
        if let Some(init) = &self.init {
            init.walk_exprs(visit);
        }
        self.cond.walk(visit);
        self.then.iter().for_each(|s| s.walk_exprs(visit));
        match self.otherwise.as_deref() {
            Some(Else::If(nested)) => nested.walk_exprs(visit),
            Some(Else::Block(block)) => block.iter().for_each(|s| s.walk_exprs(visit)),
            None => {}
        }
    }
}
