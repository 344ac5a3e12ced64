use log::debug;

use crate::ast::{AssignOp, CaseClause, Element, Else, Expr, IfStmt, Stmt, TypeExpr, ValueSpec};
use crate::resolver::{AllocStrategy, Symbol};
use crate::types::{SyncPrimitive, TargetType, map_type};

use super::{Translator, braced, indent};

impl Translator<'_> {
    pub(super) fn stmts(&mut self, stmts: &[Stmt]) -> Vec<String> {
        let mut lines = Vec::new();
        for stmt in stmts {
            lines.extend(self.stmt(stmt));
        }
        lines
    }

    fn stmt(&mut self, stmt: &Stmt) -> Vec<String> {
        match stmt {
            Stmt::Expr(expr) => vec![self.expr(expr)],
            Stmt::ShortVarDecl { names, values } => self.short_var_decl(names, values),
            Stmt::Assign { lhs, op, rhs } => self.assign(lhs, *op, rhs),
            Stmt::IncDec { target, increment } => {
                let op = if *increment { "+=" } else { "-=" };
                vec![format!("{} {op} 1", self.expr(target))]
            }
            Stmt::Send { channel, value } => {
                let channel = self.expr(channel);
                let value = self.stored_value(value);
                vec![format!("golden.chan_send({channel}, {value})")]
            }
            Stmt::Go(call) => self.go_stmt(call),
            Stmt::Defer(call) => self.defer_stmt(call),
            Stmt::Return(results) => self.return_stmt(results),
            Stmt::If(if_stmt) => self.if_stmt(if_stmt),
            Stmt::For {
                init,
                cond,
                post,
                body,
            } => self.for_stmt(init.as_deref(), cond.as_ref(), post.as_deref(), body),
            Stmt::Range {
                key,
                value,
                define,
                collection,
                body,
            } => self.range_stmt(key.as_ref(), value.as_ref(), *define, collection, body),
            Stmt::Switch { init, tag, clauses } => {
                self.switch_stmt(init.as_deref(), tag.as_ref(), clauses)
            }
            Stmt::Block(body) => block(self.scoped_body(body)),
            Stmt::Var(specs) => self.var_specs(specs),
            Stmt::Const(specs) => self.const_specs(specs, false),
            Stmt::Break => vec!["break".to_string()],
            Stmt::Continue => vec!["continue".to_string()],
            Stmt::Fallthrough => vec!["fallthrough".to_string()],
            Stmt::Empty => Vec::new(),
            Stmt::Unsupported(what) => self.unsupported_stmt(what),
        }
    }

    fn short_var_decl(&mut self, names: &[String], values: &[Expr]) -> Vec<String> {
        if let ([name], [value]) = (names, values) {
            if name != "_" {
                if let Some(lines) = self.bind_single(name, value) {
                    return lines;
                }
            }
        }

        let multi_call = names.len() > 1 && values.len() == 1;
        let types: Vec<Option<TargetType>> = if multi_call {
            let results = match &values[0] {
                Expr::Call { func, args, .. } => self.call_results(func, args).unwrap_or_default(),
                Expr::Index { base, .. } => self
                    .infer_type(base)
                    .and_then(|ty| ty.element().cloned())
                    .map(|elem| vec![elem, TargetType::Primitive("b8")])
                    .unwrap_or_default(),
                _ => Vec::new(),
            };
            (0..names.len()).map(|i| results.get(i).cloned()).collect()
        } else {
            values.iter().map(|value| self.infer_type(value)).collect()
        };

        let mut fresh = Vec::new();
        for (name, ty) in names.iter().zip(types) {
            if name != "_" && self.resolver.lookup_local(name).is_none() {
                fresh.push((name.clone(), ty.unwrap_or(TargetType::RawPtr)));
            }
        }
        let declared = names.iter().filter(|n| *n != "_").count();
        for (name, ty) in &fresh {
            self.resolver.define(Symbol::local(name, ty.clone()));
        }

        let rhs: Vec<String> = values.iter().map(|value| self.expr(value)).collect();
        let lhs = names.join(", ");
        let rhs = rhs.join(", ");
        let mut lines = Vec::new();
        if fresh.len() == declared && !fresh.is_empty() {
            lines.push(format!("{lhs} := {rhs}"));
        } else {
            for (name, ty) in &fresh {
                lines.push(format!("{name}: {ty}"));
            }
            lines.push(format!("{lhs} = {rhs}"));
        }

        if multi_call {
            for (name, ty) in &fresh {
                if ty.is_error() && !self.func.returned.contains(name) {
                    lines.push(format!("defer golden.error_free({name})"));
                }
            }
        }
        lines
    }

    /// `name := value` forms that need cleanup or a chosen allocation
    /// strategy. `None` leaves the binding to the general path.
    fn bind_single(&mut self, name: &str, value: &Expr) -> Option<Vec<String>> {
        if let Some((ty, elements)) = value.as_address_of_composite() {
            return Some(self.bind_allocation(name, ty.as_ref(), elements));
        }
        if let Expr::Call { func, args, .. } = value {
            if func.as_ident() == Some("make") && self.resolver.lookup("make").is_none() {
                return Some(self.bind_make(name, args));
            }
            let ref_counted = self
                .call_results(func, args)
                .and_then(|results| results.into_iter().next())
                .filter(|ty| matches!(ty, TargetType::RefCounted(_)));
            if let Some(ty) = ref_counted {
                self.resolver
                    .define(Symbol::local(name, ty).with_strategy(AllocStrategy::RefCounted));
                let call = self.expr(value);
                let mut lines = vec![format!("{name} := {call}")];
                lines.extend(self.release_unless_returned(name));
                return Some(lines);
            }
        }
        if self.is_ref_counted(value) {
            let ty = self.infer_type(value).unwrap_or(TargetType::RawPtr);
            let source = self.expr(value);
            self.resolver
                .define(Symbol::local(name, ty).with_strategy(AllocStrategy::RefCounted));
            let mut lines = vec![format!("{name} := golden.arc_retain({source})")];
            lines.extend(self.release_unless_returned(name));
            return Some(lines);
        }
        None
    }

    /// `name := &T{...}`: a frame allocation when the binding is a local
    /// candidate at the function's top level, a ref-counted allocation
    /// otherwise.
    fn bind_allocation(
        &mut self,
        name: &str,
        ty: Option<&TypeExpr>,
        elements: &[Element],
    ) -> Vec<String> {
        let payload = ty.map(map_type).unwrap_or(TargetType::RawPtr);
        let in_frame = self.func.body_depth == Some(self.resolver.depth())
            && self.func.escapes.is_local(name);

        if in_frame {
            debug!("{name}: frame allocation");
            self.resolver.define(
                Symbol::local(name, TargetType::pointer_to(payload.clone()))
                    .with_strategy(AllocStrategy::Region),
            );
            self.func.needs_frame = true;
            let literal = self.composite(ty, elements);
            return vec![
                format!("{name} := golden.frame_new({payload}{{}}, &_frame)"),
                format!("golden.frame_init({name}, {literal})"),
            ];
        }

        if self.func.returned.contains(name) && !self.func.returns_ref_counted {
            debug!("{name}: plain heap allocation handed to the caller");
            self.resolver
                .define(Symbol::local(name, TargetType::pointer_to(payload)));
            let literal = self.composite(ty, elements);
            return vec![format!("{name} := new_clone({literal})")];
        }

        debug!("{name}: ref-counted allocation");
        self.resolver.define(
            Symbol::local(name, TargetType::ref_counted(payload))
                .with_strategy(AllocStrategy::RefCounted),
        );
        let literal = self.composite(ty, elements);
        let mut lines = vec![format!("{name} := golden.make_arc({literal})")];
        lines.extend(self.release_unless_returned(name));
        lines
    }

    fn bind_make(&mut self, name: &str, args: &[Expr]) -> Vec<String> {
        let ty = args
            .first()
            .and_then(|arg| match arg {
                Expr::Type(ty) => Some(map_type(ty)),
                _ => None,
            })
            .unwrap_or(TargetType::RawPtr);
        self.resolver.define(Symbol::local(name, ty.clone()));
        let value = self.make_call(args);
        let mut lines = vec![format!("{name} := {value}")];
        if self.func.returned.contains(name) {
            return lines;
        }
        match ty {
            TargetType::Channel(_) => lines.push(format!("defer golden.chan_destroy({name})")),
            TargetType::DynamicArray(_) | TargetType::Map { .. } => {
                lines.push(format!("defer delete({name})"));
            }
            _ => {}
        }
        lines
    }

    fn release_unless_returned(&self, name: &str) -> Option<String> {
        (!self.func.returned.contains(name)).then(|| format!("defer golden.arc_release(&{name})"))
    }

    fn assign(&mut self, lhs: &[Expr], op: AssignOp, rhs: &[Expr]) -> Vec<String> {
        if op != AssignOp::Assign {
            let target = lhs.first().map(|e| self.expr(e)).unwrap_or_default();
            let value = rhs.first().map(|e| self.expr(e)).unwrap_or_default();
            return vec![format!("{target} {}= {value}", assign_op(op))];
        }

        if let ([target], [value]) = (lhs, rhs) {
            if let Expr::Call { func, args, .. } = value {
                if func.as_ident() == Some("append")
                    && self.resolver.lookup("append").is_none()
                    && args.first() == Some(target)
                {
                    return vec![self.expr(value)];
                }
            }

            let strategy = self.symbol_of(target).map(|symbol| symbol.strategy);
            if let Some((ty, elements)) = value.as_address_of_composite() {
                let name = self.expr(target);
                match strategy {
                    Some(AllocStrategy::Region) => {
                        let payload = ty.as_ref().map(map_type).unwrap_or(TargetType::RawPtr);
                        let literal = self.composite(ty.as_ref(), elements);
                        return vec![
                            format!("{name} = golden.frame_new({payload}{{}}, &_frame)"),
                            format!("golden.frame_init({name}, {literal})"),
                        ];
                    }
                    Some(AllocStrategy::RefCounted) => {
                        let literal = self.composite(ty.as_ref(), elements);
                        return vec![
                            format!("golden.arc_release(&{name})"),
                            format!("{name} = golden.make_arc({literal})"),
                        ];
                    }
                    _ => {}
                }
            }

            if strategy == Some(AllocStrategy::RefCounted) && self.is_ref_counted(value) {
                let name = self.expr(target);
                let source = self.expr(value);
                return vec![
                    format!("golden.arc_release(&{name})"),
                    format!("{name} = golden.arc_retain({source})"),
                ];
            }

            let stores = match target {
                Expr::Selector { .. } | Expr::Index { .. } => true,
                Expr::Unary {
                    op: crate::ast::UnaryOp::Deref,
                    ..
                } => true,
                _ => self.symbol_of(target).is_some_and(|symbol| symbol.is_global),
            };
            let target = self.expr(target);
            let value = if stores {
                self.stored_value(value)
            } else {
                self.assigned_value(value)
            };
            return vec![format!("{target} = {value}")];
        }

        let targets: Vec<String> = lhs.iter().map(|e| self.expr(e)).collect();
        let values: Vec<String> = rhs.iter().map(|e| self.expr(e)).collect();
        vec![format!("{} = {}", targets.join(", "), values.join(", "))]
    }

    /// Right-hand side of a plain assignment: a bare `&T{...}` becomes a
    /// heap copy of the literal.
    fn assigned_value(&mut self, value: &Expr) -> String {
        match value.as_address_of_composite() {
            Some((ty, elements)) => format!("new_clone({})", self.composite(ty.as_ref(), elements)),
            None => self.expr(value),
        }
    }

    fn defer_stmt(&mut self, call: &Expr) -> Vec<String> {
        let Expr::Call { func, args, .. } = call else {
            return self.unsupported_stmt("defer of a non-call");
        };
        if let Expr::FuncLit(lit) = func.as_ref() {
            if !args.is_empty() || !lit.params.is_empty() {
                return self.unsupported_stmt("deferred function literal with arguments");
            }
            return braced("defer".to_string(), self.scoped_body(&lit.body));
        }
        vec![format!("defer {}", self.expr(call))]
    }

    fn return_stmt(&mut self, results: &[Expr]) -> Vec<String> {
        if results.is_empty() {
            return vec!["return".to_string()];
        }
        let mut values = vec![self.first_result(&results[0])];
        values.extend(results[1..].iter().map(|e| self.assigned_value(e)));
        vec![format!("return {}", values.join(", "))]
    }

    /// First result under the function's return shape. A ref-counted
    /// result wraps fresh literals and turns `nil` into the empty handle;
    /// a plain pointer result hands out the payload of a ref-counted name.
    fn first_result(&mut self, value: &Expr) -> String {
        if self.func.returns_ref_counted {
            if value.as_ident() == Some("nil") {
                return "{}".to_string();
            }
            if let Some((ty, elements)) = value.as_address_of_composite() {
                let literal = self.composite(ty.as_ref(), elements);
                return format!("golden.make_arc({literal})");
            }
            return self.expr(value);
        }
        if self.is_ref_counted(value) {
            return self.payload(value);
        }
        self.assigned_value(value)
    }

    fn if_stmt(&mut self, if_stmt: &IfStmt) -> Vec<String> {
        self.resolver.enter_scope();
        let init = match &if_stmt.init {
            Some(init) => self.stmt(init),
            None => Vec::new(),
        };
        let cond = self.expr(&if_stmt.cond);
        let inline_init = match init.as_slice() {
            [] => Some(String::new()),
            [single] if !single.contains('\n') => Some(format!("{single}; ")),
            _ => None,
        };

        let mut lines = vec![format!(
            "if {}{cond} {{",
            inline_init.as_deref().unwrap_or_default()
        )];
        let then = self.scoped_body(&if_stmt.then);
        lines.extend(indent(then));
        match if_stmt.otherwise.as_deref() {
            Some(Else::If(nested)) if nested.init.is_none() => {
                let mut chain = self.if_stmt(nested).into_iter();
                if let Some(head) = chain.next() {
                    lines.push(format!("}} else {head}"));
                }
                lines.extend(chain);
            }
            Some(Else::If(nested)) => {
                lines.push("} else {".to_string());
                let nested = self.if_stmt(nested);
                lines.extend(indent(nested));
                lines.push("}".to_string());
            }
            Some(Else::Block(body)) => {
                lines.push("} else {".to_string());
                let body = self.scoped_body(body);
                lines.extend(indent(body));
                lines.push("}".to_string());
            }
            None => lines.push("}".to_string()),
        }
        self.resolver.exit_scope();

        if inline_init.is_some() {
            return lines;
        }
        let mut wrapped = init;
        wrapped.extend(lines);
        block(wrapped)
    }

    fn for_stmt(
        &mut self,
        init: Option<&Stmt>,
        cond: Option<&Expr>,
        post: Option<&Stmt>,
        body: &[Stmt],
    ) -> Vec<String> {
        if init.is_none() && post.is_none() {
            let head = match cond {
                Some(cond) => format!("for {}", self.expr(cond)),
                None => "for".to_string(),
            };
            let body = self.scoped_body(body);
            return braced(head, body);
        }

        self.resolver.enter_scope();
        let init = init.map(|s| self.stmt(s)).unwrap_or_default();
        let cond = cond.map(|c| self.expr(c)).unwrap_or_default();
        let post = post.map(|s| self.stmt(s)).unwrap_or_default();
        let inner = block(self.scoped_body(body));
        self.resolver.exit_scope();

        let post = match post.as_slice() {
            [] => String::new(),
            [single] if !single.contains('\n') => single.clone(),
            _ => return self.unsupported_stmt("loop post statement spanning several lines"),
        };
        match init.as_slice() {
            [] => braced(head_of("", &cond, &post), inner),
            [single] if !single.contains('\n') => braced(head_of(single, &cond, &post), inner),
            _ => {
                let mut lines = init.clone();
                lines.extend(braced(head_of("", &cond, &post), inner));
                block(lines)
            }
        }
    }

    fn range_stmt(
        &mut self,
        key: Option<&Expr>,
        value: Option<&Expr>,
        define: bool,
        collection: &Expr,
        body: &[Stmt],
    ) -> Vec<String> {
        let collection_ty = self.infer_type(collection);
        if matches!(collection_ty, Some(TargetType::Channel(_))) {
            return self.unsupported_stmt("range over channel");
        }
        let coll = self.expr(collection);

        self.resolver.enter_scope();
        let mut prelude = Vec::new();
        let mut bind = |this: &mut Self, var: Option<&Expr>, temp: &str, ty: TargetType| -> String {
            match var {
                None => "_".to_string(),
                Some(Expr::Ident(name)) if name == "_" => "_".to_string(),
                Some(Expr::Ident(name)) if define => {
                    this.resolver.define(Symbol::local(name, ty));
                    name.clone()
                }
                Some(target) => {
                    let target = this.expr(target);
                    prelude.push(format!("{target} = {temp}"));
                    temp.to_string()
                }
            }
        };

        let int = TargetType::Primitive("int");
        let lines = match &collection_ty {
            Some(TargetType::Primitive(name)) if name.starts_with('i') || name.starts_with('u') => {
                let index = bind(self, key, "_index", int);
                let body = self.body_with_prelude(prelude, body);
                braced(format!("for {index} in 0..<{coll}"), body)
            }
            Some(TargetType::Map { key: key_ty, value: value_ty }) => {
                let k = bind(self, key, "_key", (**key_ty).clone());
                let v = bind(self, value, "_value", (**value_ty).clone());
                let head = if v == "_" {
                    format!("for {k} in {coll}")
                } else {
                    format!("for {k}, {v} in {coll}")
                };
                let body = self.body_with_prelude(prelude, body);
                braced(head, body)
            }
            other => {
                let elem = other
                    .as_ref()
                    .and_then(|ty| match ty {
                        TargetType::Primitive("string") => Some(TargetType::Primitive("rune")),
                        _ => ty.element().cloned(),
                    })
                    .unwrap_or(TargetType::RawPtr);
                let k = bind(self, key, "_index", int);
                let v = bind(self, value, "_value", elem);
                let head = if k == "_" {
                    format!("for {v} in {coll}")
                } else {
                    format!("for {v}, {k} in {coll}")
                };
                let body = self.body_with_prelude(prelude, body);
                braced(head, body)
            }
        };
        self.resolver.exit_scope();
        lines
    }

    fn body_with_prelude(&mut self, mut prelude: Vec<String>, body: &[Stmt]) -> Vec<String> {
        prelude.extend(self.scoped_body(body));
        prelude
    }

    fn switch_stmt(
        &mut self,
        init: Option<&Stmt>,
        tag: Option<&Expr>,
        clauses: &[CaseClause],
    ) -> Vec<String> {
        self.resolver.enter_scope();
        let init = init.map(|s| self.stmt(s)).unwrap_or_default();
        let tag = tag.map(|t| self.expr(t));
        let (prefix, wrap) = match init.as_slice() {
            [] => (String::new(), false),
            [single] if !single.contains('\n') => (format!("{single}; "), false),
            _ => (String::new(), true),
        };
        let head = match tag {
            Some(tag) => format!("switch {prefix}{tag}"),
            None => format!("switch {prefix}").trim_end().to_string(),
        };

        let mut cases = Vec::new();
        for clause in clauses {
            let values: Vec<String> = clause.values.iter().map(|v| self.expr(v)).collect();
            if values.is_empty() {
                cases.push("case:".to_string());
            } else {
                cases.push(format!("case {}:", values.join(", ")));
            }
            let body = self.scoped_body(&clause.body);
            cases.extend(indent(body));
        }
        self.resolver.exit_scope();

        let mut lines = vec![format!("{head} {{")];
        lines.extend(cases);
        lines.push("}".to_string());
        if !wrap {
            return lines;
        }
        let mut wrapped = init;
        wrapped.extend(lines);
        block(wrapped)
    }

    fn var_specs(&mut self, specs: &[ValueSpec]) -> Vec<String> {
        let mut lines = Vec::new();
        for spec in specs {
            let Some(ty) = &spec.ty else {
                lines.extend(self.short_var_decl(&spec.names, &spec.values));
                continue;
            };
            let target = map_type(ty);
            for name in &spec.names {
                self.resolver.define(Symbol::local(name, target.clone()));
            }
            if spec.values.is_empty() {
                for name in &spec.names {
                    lines.push(format!("{name}: {target}"));
                    if target == TargetType::Sync(SyncPrimitive::WaitGroup) {
                        lines.push(format!("golden.wg_init(&{name})"));
                    }
                }
            } else if spec.values.len() == spec.names.len() {
                for (name, value) in spec.names.iter().zip(&spec.values) {
                    let value = self.assigned_value(value);
                    lines.push(format!("{name}: {target} = {value}"));
                }
            } else {
                let values: Vec<String> = spec.values.iter().map(|v| self.expr(v)).collect();
                lines.push(format!(
                    "{}: {target} = {}",
                    spec.names.join(", "),
                    values.join(", ")
                ));
            }
        }
        lines
    }
}

/// `{`, the indented body, `}`.
fn block(body: Vec<String>) -> Vec<String> {
    let mut lines = vec!["{".to_string()];
    lines.extend(indent(body));
    lines.push("}".to_string());
    lines
}

fn head_of(init: &str, cond: &str, post: &str) -> String {
    format!("for {init}; {cond}; {post}").trim_end().to_string()
}

fn assign_op(op: AssignOp) -> &'static str {
    match op {
        AssignOp::Assign => "",
        AssignOp::Add => "+",
        AssignOp::Sub => "-",
        AssignOp::Mul => "*",
        AssignOp::Quo => "/",
        AssignOp::Rem => "%",
        AssignOp::And => "&",
        AssignOp::Or => "|",
        AssignOp::Xor => "~",
        AssignOp::Shl => "<<",
        AssignOp::Shr => ">>",
        AssignOp::AndNot => "&~",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loop_heads_drop_trailing_space() {
        assert_eq!(head_of("i := 0", "i < 3", "i += 1"), "for i := 0; i < 3; i += 1");
        assert_eq!(head_of("i := 0", "i < 3", ""), "for i := 0; i < 3;");
    }

    #[test]
    fn compound_operators_follow_odin_spelling() {
        assert_eq!(assign_op(AssignOp::Xor), "~");
        assert_eq!(assign_op(AssignOp::AndNot), "&~");
    }
}
