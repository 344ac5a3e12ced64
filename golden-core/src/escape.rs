//! Intraprocedural escape analysis for `name := &T{...}` bindings.
//!
//! Only bindings of exactly that shape at the top level of a function body
//! are candidates. A candidate escapes when it is returned, launched with a
//! goroutine, stored through a field or index, or assigned to a global.
//! A few more sites are treated as escapes because the translator cannot
//! prove they stay local: sending on a channel, aliasing through a plain
//! name or its address, appearing inside a composite literal or `append`
//! (control clauses included), and appearing in a deferred function literal.
//!
//! Values passed to ordinary calls are not followed. A helper that stores
//! or returns its argument will not make the caller's binding escape.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use log::debug;

use crate::ast::{Else, Expr, IfStmt, Stmt, TypeExpr, UnaryOp, visit_stmts};

/// Escape facts for one function body. Immutable once computed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EscapeSet {
    candidates: BTreeMap<String, Option<TypeExpr>>,
    escaped: BTreeSet<String>,
}

impl EscapeSet {
    pub fn escapes(&self, name: &str) -> bool {
        self.escaped.contains(name)
    }

    pub fn is_candidate(&self, name: &str) -> bool {
        self.candidates.contains_key(name)
    }

    /// Candidate that may live in the function's frame.
    pub fn is_local(&self, name: &str) -> bool {
        self.is_candidate(name) && !self.escapes(name)
    }

    /// Literal type a candidate was bound with.
    pub fn candidate_type(&self, name: &str) -> Option<&TypeExpr> {
        self.candidates.get(name).and_then(Option::as_ref)
    }

    pub fn escaped(&self) -> impl Iterator<Item = &str> {
        self.escaped.iter().map(String::as_str)
    }
}

pub fn analyze_func(body: &[Stmt], globals: &HashSet<String>) -> EscapeSet {
    let candidates = collect_candidates(body);
    let mut analysis = Analysis {
        candidates: &candidates,
        globals,
        escaped: BTreeSet::new(),
    };
    analysis.block(body);

    let escaped = analysis.escaped;
    debug!(
        "escape analysis: {} candidate(s), escaped: {:?}",
        candidates.len(),
        escaped
    );
    EscapeSet {
        candidates,
        escaped,
    }
}

/// Names returned directly (`return x`) anywhere in the body, including
/// nested blocks but not nested function literals.
pub fn returned_names(body: &[Stmt]) -> HashSet<String> {
    let mut names = HashSet::new();
    visit_stmts(body, &mut |stmt| {
        if let Stmt::Return(results) = stmt {
            names.extend(results.iter().filter_map(|e| e.as_ident().map(String::from)));
        }
    });
    names
}

fn collect_candidates(body: &[Stmt]) -> BTreeMap<String, Option<TypeExpr>> {
    body.iter()
        .filter_map(|stmt| match stmt {
            Stmt::ShortVarDecl { names, values } if names.len() == 1 && values.len() == 1 => {
                let (ty, _) = values[0].as_address_of_composite()?;
                Some((names[0].clone(), ty.clone()))
            }
            _ => None,
        })
        .collect()
}

struct Analysis<'a> {
    candidates: &'a BTreeMap<String, Option<TypeExpr>>,
    globals: &'a HashSet<String>,
    escaped: BTreeSet<String>,
}

impl Analysis<'_> {
    fn block(&mut self, stmts: &[Stmt]) {
        for stmt in stmts {
            self.stmt(stmt);
        }
    }

    /// Mark every candidate mentioned anywhere in `expr`.
    fn mark(&mut self, expr: &Expr) {
        let candidates = self.candidates;
        let escaped = &mut self.escaped;
        expr.walk(&mut |e| {
            if let Expr::Ident(name) = e {
                if candidates.contains_key(name) {
                    escaped.insert(name.clone());
                }
            }
        });
    }

    /// Mark candidates that are the value itself (`x`, `(x)`) or its
    /// address (`&x`), not a read through it like `x.Field` or `len(x)`.
    fn mark_alias(&mut self, expr: &Expr) {
        match expr {
            Expr::Ident(name) if self.candidates.contains_key(name) => {
                self.escaped.insert(name.clone());
            }
            Expr::Paren(inner)
            | Expr::Unary {
                op: UnaryOp::Addr,
                operand: inner,
            } => self.mark_alias(inner),
            _ => {}
        }
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Return(results) => results.iter().for_each(|e| self.mark(e)),
            Stmt::Go(call) => self.mark(call),
            Stmt::Defer(call) => {
                if let Expr::Call { func, .. } = call {
                    if matches!(func.as_ref(), Expr::FuncLit(_)) {
                        self.mark(call);
                    }
                }
                self.exprs(std::slice::from_ref(call));
            }
            Stmt::Send { value, .. } => self.mark(value),
            Stmt::Assign { lhs, rhs, .. } => {
                let stores = lhs.iter().any(|target| match target {
                    Expr::Selector { .. } | Expr::Index { .. } => true,
                    Expr::Unary { .. } => true,
                    Expr::Ident(name) => self.globals.contains(name),
                    _ => false,
                });
                if stores {
                    rhs.iter().for_each(|e| self.mark(e));
                } else {
                    rhs.iter().for_each(|e| self.mark_alias(e));
                }
                self.exprs(rhs);
            }
            Stmt::ShortVarDecl { values, .. } => {
                values.iter().for_each(|e| self.mark_alias(e));
                self.exprs(values);
            }
            Stmt::Var(specs) | Stmt::Const(specs) => {
                for spec in specs {
                    spec.values.iter().for_each(|e| self.mark_alias(e));
                    self.exprs(&spec.values);
                }
            }
            Stmt::Expr(expr) => self.exprs(std::slice::from_ref(expr)),
            Stmt::If(if_stmt) => self.if_stmt(if_stmt),
            Stmt::For {
                init,
                cond,
                post,
                body,
            } => {
                if let Some(init) = init {
                    self.stmt(init);
                }
                if let Some(cond) = cond {
                    self.exprs(std::slice::from_ref(cond));
                }
                if let Some(post) = post {
                    self.stmt(post);
                }
                self.block(body);
            }
            Stmt::Range {
                collection, body, ..
            } => {
                self.mark_alias(collection);
                self.exprs(std::slice::from_ref(collection));
                self.block(body);
            }
            Stmt::Switch {
                init,
                tag,
                clauses,
            } => {
                if let Some(init) = init {
                    self.stmt(init);
                }
                if let Some(tag) = tag {
                    self.exprs(std::slice::from_ref(tag));
                }
                for clause in clauses {
                    self.exprs(&clause.values);
                    self.block(&clause.body);
                }
            }
            Stmt::Block(body) => self.block(body),
            Stmt::IncDec { .. }
            | Stmt::Break
            | Stmt::Continue
            | Stmt::Fallthrough
            | Stmt::Empty
            | Stmt::Unsupported(_) => {}
        }
    }

    fn if_stmt(&mut self, if_stmt: &IfStmt) {
        if let Some(init) = &if_stmt.init {
            self.stmt(init);
        }
        self.exprs(std::slice::from_ref(&if_stmt.cond));
        self.block(&if_stmt.then);
        match if_stmt.otherwise.as_deref() {
            Some(Else::If(nested)) => self.if_stmt(nested),
            Some(Else::Block(body)) => self.block(body),
            None => {}
        }
    }

    /// Composite-literal elements and `append` arguments store the value
    /// somewhere the frame cannot track; a function literal may outlive
    /// the statement that builds it.
    fn exprs(&mut self, exprs: &[Expr]) {
        let mut stored = Vec::new();
        let mut closures = Vec::new();
        for expr in exprs {
            expr.walk(&mut |e| match e {
                Expr::Composite { elements, .. } => {
                    stored.extend(elements.iter().map(|element| element.value.clone()));
                }
                Expr::Call { func, args, .. } if func.as_ident() == Some("append") => {
                    stored.extend(args.iter().skip(1).cloned());
                }
                Expr::FuncLit(_) => closures.push(e.clone()),
                _ => {}
            });
        }
        for expr in &stored {
            self.mark_alias(expr);
        }
        for closure in &closures {
            self.mark(closure);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Decl;
    use crate::parser::parse_file;
    use indoc::indoc;

    fn analyze(body: &str) -> EscapeSet {
        analyze_with_globals(body, &[])
    }

    fn analyze_with_globals(body: &str, globals: &[&str]) -> EscapeSet {
        let source = format!("package main\nfunc f() {{\n{body}\n}}\n");
        let file = parse_file(&source).expect("parse");
        let Some(Decl::Func(func)) = file.decls.into_iter().next() else {
            panic!("expected a function");
        };
        let globals = globals.iter().map(|g| g.to_string()).collect();
        analyze_func(&func.body.unwrap_or_default(), &globals)
    }

    #[test]
    fn unreferenced_binding_stays_local() {
        let set = analyze(indoc! {"
            req := &Request{Size: 1024}
            fmt.Println(req.Size)
        "});
        assert!(set.is_candidate("req"));
        assert!(set.is_local("req"));
        assert_eq!(
            set.candidate_type("req"),
            Some(&TypeExpr::Name("Request".into()))
        );
    }

    #[test]
    fn returned_binding_escapes() {
        let set = analyze(indoc! {"
            u := &User{Name: name}
            return u
        "});
        assert!(set.escapes("u"));
    }

    #[test]
    fn goroutine_capture_escapes() {
        let set = analyze(indoc! {"
            u := &User{}
            go func() {
                fmt.Println(u.Name)
            }()
        "});
        assert!(set.escapes("u"));
    }

    #[test]
    fn field_store_escapes() {
        let set = analyze(indoc! {"
            u := &User{}
            team.Leader = u
        "});
        assert!(set.escapes("u"));
    }

    #[test]
    fn global_store_escapes() {
        let set = analyze_with_globals(
            indoc! {"
                u := &User{}
                current = u
            "},
            &["current"],
        );
        assert!(set.escapes("u"));
    }

    #[test]
    fn nested_sites_are_found() {
        let set = analyze(indoc! {"
            a := &User{}
            b := &User{}
            for i := 0; i < 3; i++ {
                if i > 1 {
                    return a
                }
            }
            switch {
            default:
                ch <- b
            }
        "});
        assert!(set.escapes("a"));
        assert!(set.escapes("b"));
    }

    #[test]
    fn hardening_sites_escape() {
        let set = analyze(indoc! {"
            a := &User{}
            b := &User{}
            c := &User{}
            d := &User{}
            alias := a
            team := Team{Members: b}
            users = append(users, c)
            defer func() {
                fmt.Println(d.Name)
            }()
        "});
        for name in ["a", "b", "c", "d"] {
            assert!(set.escapes(name), "{name} should escape");
        }
    }

    #[test]
    fn address_of_candidate_escapes() {
        let set = analyze_with_globals(
            indoc! {"
                u := &User{}
                p := &u
                keep = p
            "},
            &["keep"],
        );
        assert!(set.escapes("u"));
    }

    #[test]
    fn literals_in_control_clauses_escape() {
        let set = analyze_with_globals(
            indoc! {"
                u := &User{}
                v := &User{}
                w := &User{}
                for _, x := range []*User{u} {
                    keep = x
                }
                if check([]*User{v}) {
                }
                switch pick(Team{Leader: w}) {
                }
            "},
            &["keep"],
        );
        for name in ["u", "v", "w"] {
            assert!(set.escapes(name), "{name} should escape");
        }
    }

    #[test]
    fn field_reads_and_plain_calls_do_not_escape() {
        let set = analyze(indoc! {"
            u := &User{}
            name := u.Name
            u.Health = 10
            show(u)
            total := len(u.Items)
        "});
        assert!(set.is_local("u"));
    }

    #[test]
    fn nested_bindings_are_not_candidates() {
        let set = analyze(indoc! {"
            if ok {
                u := &User{}
                fmt.Println(u.Name)
            }
        "});
        assert!(!set.is_candidate("u"));
    }

    #[test]
    fn returned_names_ignores_function_literals() {
        let file = parse_file(indoc! {"
            package main
            func f() *User {
                get := func() *User {
                    return inner
                }
                if ok {
                    return outer
                }
                return nil
            }
        "})
        .expect("parse");
        let Some(Decl::Func(func)) = file.decls.into_iter().next() else {
            panic!("expected a function");
        };
        let names = returned_names(func.body.as_deref().unwrap_or_default());
        assert!(names.contains("outer"));
        assert!(names.contains("nil"));
        assert!(!names.contains("inner"));
    }
}
