//! Goroutine lowering.
//!
//! `go func(...) { ... }(args)` becomes a capture record type, a heap
//! allocated record filled at the launch site, a wrapper procedure that
//! unpacks the record and frees it on exit, and a `golden.spawn_raw` call.
//! Inside the wrapper every captured name reads through the record.

use std::collections::HashSet;
use std::mem;

use log::debug;

use crate::ast::{CaptureRef, Else, Expr, Field, FuncLit, IfStmt, Stmt, UnaryOp};
use crate::builtins;
use crate::escape::returned_names;
use crate::resolver::{AllocStrategy, Symbol};
use crate::types::{TargetType, map_type};

use super::{FunctionState, Translator, braced, indent};

/// Name the wrapper uses for its capture record.
const RECORD_VAR: &str = "ctx";

/// One field of a capture record.
#[derive(Debug, Clone)]
struct Capture {
    name: String,
    /// Symbol the field stands for inside the wrapper.
    symbol: Symbol,
    by_address: bool,
    /// Launch-site expression stored into the field.
    init: String,
}

impl Capture {
    fn field_type(&self) -> String {
        if self.by_address {
            format!("^{}", self.symbol.ty)
        } else {
            self.symbol.ty.to_string()
        }
    }
}

impl Translator<'_> {
    pub(super) fn go_stmt(&mut self, call: &Expr) -> Vec<String> {
        let Expr::Call { func, args, .. } = call else {
            return self.unsupported_stmt("go statement without a call");
        };
        let Expr::FuncLit(lit) = func.as_ref() else {
            return self.unsupported_stmt("go statement calling a named function");
        };
        let params: Vec<(String, TargetType)> = lit
            .params
            .iter()
            .flat_map(|field| {
                let ty = map_type(&field.ty);
                field.names.iter().map(move |name| (name.clone(), ty.clone()))
            })
            .collect();
        if params.len() != args.len() {
            return self.unsupported_stmt("go statement with mismatched arguments");
        }

        let id = self.ctx.next_task_id();
        let record = format!("_closure_ctx_{id}");
        let alloc = format!("_ctx_{id}");
        let wrapper = format!("_go_wrapper_{id}");

        let mut captures = Vec::new();
        for ((name, ty), arg) in params.into_iter().zip(args) {
            let (symbol, init) = if self.is_ref_counted(arg) {
                let ty = self.infer_type(arg).unwrap_or(ty);
                let init = format!("golden.arc_retain({})", self.expr(arg));
                (Symbol::local(&name, ty).with_strategy(AllocStrategy::RefCounted), init)
            } else {
                (Symbol::local(&name, ty), self.expr(arg))
            };
            captures.push(Capture {
                name,
                symbol,
                by_address: false,
                init,
            });
        }
        captures.extend(self.free_captures(lit));
        debug!(
            "goroutine {id}: captures {:?}",
            captures.iter().map(|c| c.name.as_str()).collect::<Vec<_>>()
        );

        let mut lines = vec![format!("{record} :: struct {{")];
        let mut fields = vec!["_allocator: mem.Allocator,".to_string()];
        fields.extend(
            captures
                .iter()
                .map(|capture| format!("{}: {},", capture.name, capture.field_type())),
        );
        lines.extend(indent(fields));
        lines.push("}".to_string());
        lines.push(format!("{alloc} := new({record})"));
        lines.push(format!("{alloc}._allocator = context.allocator"));
        for capture in &captures {
            lines.push(format!("{alloc}.{} = {}", capture.name, capture.init));
        }

        let mut wrapper_body = vec![
            format!("{RECORD_VAR} := cast(^{record})data"),
            format!("defer free({RECORD_VAR}, {RECORD_VAR}._allocator)"),
        ];
        for capture in captures.iter().filter(|c| c.symbol.is_ref_counted()) {
            wrapper_body.push(format!(
                "defer golden.arc_release(&{RECORD_VAR}.{})",
                capture.name
            ));
        }
        wrapper_body.extend(self.wrapper_body(lit, &captures));
        lines.extend(braced(format!("{wrapper} :: proc(data: rawptr)"), wrapper_body));
        lines.push(format!("golden.spawn_raw({wrapper}, {alloc})"));
        lines
    }

    /// Translate the literal's body with captured names rewritten to read
    /// through the record. The wrapper has no frame of its own.
    fn wrapper_body(&mut self, lit: &FuncLit, captures: &[Capture]) -> Vec<String> {
        let mut body = lit.body.clone();
        // Parameters are record fields too, so nothing starts out bound.
        walk_free_names(&mut body, Vec::new(), &mut |expr| {
            let Some(name) = reference_name(expr) else {
                return;
            };
            if let Some(capture) = captures.iter().find(|c| c.name == name) {
                *expr = Expr::Captured(CaptureRef {
                    record: RECORD_VAR.to_string(),
                    name: capture.name.clone(),
                    by_address: capture.by_address,
                });
            }
        });

        let saved = mem::replace(
            &mut self.func,
            FunctionState {
                returned: returned_names(&body),
                ..FunctionState::default()
            },
        );
        self.resolver.enter_scope();
        for capture in captures {
            self.resolver.define(capture.symbol.clone());
        }
        let lines = self.stmts(&body);
        self.resolver.exit_scope();
        self.func = saved;
        lines
    }

    /// Names the literal reads from enclosing function scopes, in order of
    /// first occurrence. A name only counts as local where a declaration
    /// of the literal is in scope. Predeclared names, packages and globals
    /// are not captures.
    fn free_captures(&mut self, lit: &FuncLit) -> Vec<Capture> {
        let mut seen = HashSet::new();
        let mut origins = Vec::new();
        let mut body = lit.body.clone();
        walk_free_names(&mut body, field_names(&lit.params), &mut |expr| {
            if let Some(name) = reference_name(expr) {
                if seen.insert(name.to_string()) {
                    origins.push(expr.clone());
                }
            }
        });

        let mut captures = Vec::new();
        for origin in origins {
            let Some(name) = reference_name(&origin).map(String::from) else {
                continue;
            };
            if builtins::is_predeclared(&name) || self.resolver.is_package(&name) {
                continue;
            }
            let Some(symbol) = self.resolver.lookup(&name).filter(|s| !s.is_global).cloned() else {
                continue;
            };
            let by_address = symbol.ty.is_sync_primitive();
            let init = if by_address {
                let address = Expr::Unary {
                    op: UnaryOp::Addr,
                    operand: Box::new(origin),
                };
                self.expr(&address)
            } else if symbol.is_ref_counted() {
                format!("golden.arc_retain({})", self.expr(&origin))
            } else {
                self.expr(&origin)
            };
            captures.push(Capture {
                name,
                symbol: Symbol {
                    is_global: false,
                    ..symbol
                },
                by_address,
                init,
            });
        }
        captures
    }

    /// A function literal used as a value. Literals that read local
    /// variables of the enclosing function have no Odin counterpart.
    pub(super) fn func_lit(&mut self, lit: &FuncLit) -> String {
        if !self.free_captures(lit).is_empty() {
            return self.unsupported_expr("function literal capturing local variables");
        }

        self.resolver.enter_scope();
        let mut params = Vec::new();
        for field in &lit.params {
            let ty = map_type(&field.ty);
            if field.names.is_empty() {
                params.push(format!("_: {ty}"));
            }
            for name in &field.names {
                params.push(format!("{name}: {ty}"));
                self.resolver.define(Symbol::local(name, ty.clone()));
            }
        }
        let results: Vec<String> = lit
            .results
            .iter()
            .flat_map(|field| {
                let ty = map_type(&field.ty).to_string();
                std::iter::repeat_n(ty, field.names.len().max(1))
            })
            .collect();
        let saved = mem::replace(
            &mut self.func,
            FunctionState {
                returned: returned_names(&lit.body),
                ..FunctionState::default()
            },
        );
        let body = self.stmts(&lit.body);
        self.func = saved;
        self.resolver.exit_scope();

        let head = format!("proc({}){}", params.join(", "), result_suffix(&results));
        braced(head, body).join("\n")
    }
}

/// ` -> T`, ` -> (T, U)` or nothing.
pub(super) fn result_suffix(results: &[String]) -> String {
    match results {
        [] => String::new(),
        [single] => format!(" -> {single}"),
        many => format!(" -> ({})", many.join(", ")),
    }
}

/// Name behind an identifier or an already rewritten capture.
fn reference_name(expr: &Expr) -> Option<&str> {
    match expr {
        Expr::Ident(name) => Some(name),
        Expr::Captured(capture) => Some(&capture.name),
        _ => None,
    }
}

fn field_names(fields: &[Field]) -> Vec<String> {
    fields.iter().flat_map(|f| f.names.iter().cloned()).collect()
}

/// Call `visit` on every identifier of `body` that no declaration in
/// scope at that point binds. `bound` seeds the outermost scope.
fn walk_free_names(body: &mut [Stmt], bound: Vec<String>, visit: &mut dyn FnMut(&mut Expr)) {
    let mut walker = FreeNames {
        scopes: vec![bound.into_iter().collect()],
        visit,
    };
    walker.stmts(body);
}

struct FreeNames<'v> {
    scopes: Vec<HashSet<String>>,
    visit: &'v mut dyn FnMut(&mut Expr),
}

impl FreeNames<'_> {
    fn is_bound(&self, name: &str) -> bool {
        self.scopes.iter().any(|scope| scope.contains(name))
    }

    fn declare(&mut self, name: &str) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string());
        }
    }

    fn scoped(&mut self, walk: impl FnOnce(&mut Self)) {
        self.scopes.push(HashSet::new());
        walk(self);
        self.scopes.pop();
    }

    fn stmts(&mut self, stmts: &mut [Stmt]) {
        for stmt in stmts {
            self.stmt(stmt);
        }
    }

    fn block(&mut self, body: &mut [Stmt]) {
        self.scoped(|this| this.stmts(body));
    }

    fn stmt(&mut self, stmt: &mut Stmt) {
        match stmt {
            Stmt::Expr(expr) | Stmt::Go(expr) | Stmt::Defer(expr) => self.expr(expr),
            Stmt::ShortVarDecl { names, values } => {
                values.iter_mut().for_each(|value| self.expr(value));
                for name in names.iter() {
                    self.declare(name);
                }
            }
            Stmt::Assign { lhs, rhs, .. } => {
                lhs.iter_mut().chain(rhs.iter_mut()).for_each(|e| self.expr(e));
            }
            Stmt::IncDec { target, .. } => self.expr(target),
            Stmt::Send { channel, value } => {
                self.expr(channel);
                self.expr(value);
            }
            Stmt::Return(results) => results.iter_mut().for_each(|e| self.expr(e)),
            Stmt::If(if_stmt) => self.if_stmt(if_stmt),
            Stmt::For {
                init,
                cond,
                post,
                body,
            } => self.scoped(|this| {
                if let Some(init) = init {
                    this.stmt(init);
                }
                if let Some(cond) = cond {
                    this.expr(cond);
                }
                if let Some(post) = post {
                    this.stmt(post);
                }
                this.block(body);
            }),
            Stmt::Range {
                key,
                value,
                define,
                collection,
                body,
            } => {
                self.expr(collection);
                let define = *define;
                self.scoped(|this| {
                    for var in key.iter_mut().chain(value.iter_mut()) {
                        match var {
                            Expr::Ident(name) if define => this.declare(name),
                            other => this.expr(other),
                        }
                    }
                    this.block(body);
                });
            }
            Stmt::Switch {
                init,
                tag,
                clauses,
            } => self.scoped(|this| {
                if let Some(init) = init {
                    this.stmt(init);
                }
                if let Some(tag) = tag {
                    this.expr(tag);
                }
                for clause in clauses {
                    clause.values.iter_mut().for_each(|v| this.expr(v));
                    this.block(&mut clause.body);
                }
            }),
            Stmt::Block(body) => self.block(body),
            Stmt::Var(specs) | Stmt::Const(specs) => {
                for spec in specs {
                    spec.values.iter_mut().for_each(|v| self.expr(v));
                    for name in &spec.names {
                        self.declare(name);
                    }
                }
            }
            Stmt::Break
            | Stmt::Continue
            | Stmt::Fallthrough
            | Stmt::Empty
            | Stmt::Unsupported(_) => {}
        }
    }

    fn if_stmt(&mut self, if_stmt: &mut IfStmt) {
        self.scoped(|this| {
            if let Some(init) = &mut if_stmt.init {
                this.stmt(init);
            }
            this.expr(&mut if_stmt.cond);
            this.block(&mut if_stmt.then);
            match if_stmt.otherwise.as_deref_mut() {
                Some(Else::If(nested)) => this.if_stmt(nested),
                Some(Else::Block(body)) => this.block(body),
                None => {}
            }
        });
    }

    fn expr(&mut self, expr: &mut Expr) {
        if let Some(name) = reference_name(expr) {
            if !self.is_bound(name) {
                (self.visit)(expr);
            }
            return;
        }
        match expr {
            Expr::Ident(_) | Expr::Captured(_) | Expr::Lit { .. } | Expr::Type(_) => {}
            Expr::Binary { lhs, rhs, .. } => {
                self.expr(lhs);
                self.expr(rhs);
            }
            Expr::Unary { operand: inner, .. }
            | Expr::Paren(inner)
            | Expr::Selector { base: inner, .. }
            | Expr::TypeAssert { base: inner, .. } => self.expr(inner),
            Expr::Index { base, index } => {
                self.expr(base);
                self.expr(index);
            }
            Expr::Slice { base, low, high } => {
                self.expr(base);
                if let Some(low) = low {
                    self.expr(low);
                }
                if let Some(high) = high {
                    self.expr(high);
                }
            }
            Expr::Call { func, args, .. } => {
                self.expr(func);
                args.iter_mut().for_each(|arg| self.expr(arg));
            }
            Expr::Composite { ty, elements } => {
                for element in elements.iter_mut() {
                    if element.field_name(ty.as_ref()).is_none() {
                        if let Some(key) = &mut element.key {
                            self.expr(key);
                        }
                    }
                    self.expr(&mut element.value);
                }
            }
            Expr::FuncLit(lit) => {
                let params = field_names(&lit.params);
                let results = field_names(&lit.results);
                self.scoped(|this| {
                    for name in params.iter().chain(&results) {
                        this.declare(name);
                    }
                    this.stmts(&mut lit.body);
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_file;
    use crate::ast::Decl;

    fn main_body(source: &str) -> Vec<Stmt> {
        let file = parse_file(source).expect("parse");
        file.decls
            .into_iter()
            .find_map(|decl| match decl {
                Decl::Func(func) if func.name == "main" => func.body,
                _ => None,
            })
            .expect("main body")
    }

    fn free_names(source: &str) -> Vec<String> {
        let mut body = main_body(source);
        let mut names = Vec::new();
        walk_free_names(&mut body, Vec::new(), &mut |expr| {
            if let Some(name) = reference_name(expr) {
                names.push(name.to_string());
            }
        });
        names
    }

    #[test]
    fn later_shadowing_does_not_hide_earlier_reads() {
        let names = free_names(
            "package main
            func main() {
                println(x)
                if ok {
                    x := 2
                    println(x)
                }
                println(x)
            }",
        );
        assert_eq!(names, vec!["println", "x", "ok", "println", "println", "x"]);
    }

    #[test]
    fn declarations_bind_only_inside_their_scope() {
        let names = free_names(
            "package main
            func main() {
                a := 1
                total := 0
                for i := 0; i < n; i++ {
                    total += a + i
                }
                for k, v := range xs {
                    total += k + v
                }
                g := func(p int) int { return p + q }
                total += g(1)
                t := T{Field: a}
                total += i
            }",
        );
        assert_eq!(names, vec!["n", "xs", "q", "i"]);
    }

    #[test]
    fn formats_result_suffixes() {
        assert_eq!(result_suffix(&[]), "");
        assert_eq!(result_suffix(&["int".to_string()]), " -> int");
        assert_eq!(
            result_suffix(&["int".to_string(), "golden.Error".to_string()]),
            " -> (int, golden.Error)"
        );
    }
}
