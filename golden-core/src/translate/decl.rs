use log::debug;

use crate::ast::{Decl, Expr, Field, FuncDecl, LitKind, TypeExpr, TypeSpec, ValueSpec};
use crate::escape;
use crate::resolver::Symbol;
use crate::types::{TargetType, map_type};

use super::closure::result_suffix;
use super::{FunctionState, PLACEHOLDER_TAG, Translator, braced};

/// Opening lines of `main` under leak checking: install Odin's tracking
/// allocator and report what is still live, or was freed wrongly, on exit.
const LEAK_CHECK_PROLOGUE: &[&str] = &[
    "track: mem.Tracking_Allocator",
    "mem.tracking_allocator_init(&track, context.allocator)",
    "context.allocator = mem.tracking_allocator(&track)",
    "defer mem.tracking_allocator_destroy(&track)",
    "defer {",
    "\tif len(track.allocation_map) > 0 {",
    "\t\tfmt.eprintf(\"\\n=== MEMORY LEAK DETECTED: %v allocations not freed ===\\n\", len(track.allocation_map))",
    "\t\tfor _, entry in track.allocation_map {",
    "\t\t\tfmt.eprintf(\"- %v bytes @ %v\\n\", entry.size, entry.location)",
    "\t\t}",
    "\t}",
    "\tif len(track.bad_free_array) > 0 {",
    "\t\tfmt.eprintf(\"\\n=== BAD FREES DETECTED: %v incorrect frees ===\\n\", len(track.bad_free_array))",
    "\t\tfor entry in track.bad_free_array {",
    "\t\t\tfmt.eprintf(\"- %p @ %v\\n\", entry.memory, entry.location)",
    "\t\t}",
    "\t}",
    "}",
    "",
];

impl Translator<'_> {
    /// One output block per declaration; imports produce none.
    pub fn decl(&mut self, decl: &Decl) -> Option<String> {
        let block = match decl {
            Decl::Import(_) => return None,
            Decl::Type(specs) => specs
                .iter()
                .map(|spec| self.type_spec(spec))
                .collect::<Vec<_>>()
                .join("\n\n"),
            Decl::Var(specs) => self.global_vars(specs).join("\n"),
            Decl::Const(specs) => self.const_specs(specs, true).join("\n"),
            Decl::Func(func) => self.func_decl(func),
        };
        Some(block)
    }

    fn type_spec(&mut self, spec: &TypeSpec) -> String {
        let name = &spec.name;
        if spec.alias {
            return format!("{name} :: {}", map_type(&spec.ty));
        }
        match &spec.ty {
            TypeExpr::Struct(fields) => struct_decl(name, fields),
            TypeExpr::Interface => {
                self.ctx.note_placeholder("interface type");
                format!("{name} :: rawptr /* {PLACEHOLDER_TAG} interface */")
            }
            other => format!("{name} :: distinct {}", map_type(other)),
        }
    }

    fn global_vars(&mut self, specs: &[ValueSpec]) -> Vec<String> {
        let mut lines = Vec::new();
        for spec in specs {
            if !spec.values.is_empty() && spec.values.len() != spec.names.len() {
                lines.extend(self.unsupported_stmt("multi-value package variable"));
                continue;
            }
            let ty = spec.ty.as_ref().map(map_type);
            for (index, name) in spec.names.iter().enumerate() {
                let value = spec.values.get(index).map(|value| self.expr(value));
                lines.push(match (&ty, value) {
                    (Some(ty), Some(value)) => format!("{name}: {ty} = {value}"),
                    (Some(ty), None) => format!("{name}: {ty}"),
                    (None, Some(value)) => format!("{name} := {value}"),
                    (None, None) => format!("{name}: int"),
                });
            }
        }
        lines
    }

    /// Constant group with `iota` substituted and omitted initializers
    /// repeated from the previous spec. Local groups also bind their names.
    pub(super) fn const_specs(&mut self, specs: &[ValueSpec], global: bool) -> Vec<String> {
        let mut lines = Vec::new();
        let mut previous: Option<(&Option<TypeExpr>, &[Expr])> = None;
        for (iota, spec) in specs.iter().enumerate() {
            let (ty, values) = if spec.values.is_empty() {
                match previous {
                    Some(previous) => previous,
                    None => {
                        lines.extend(self.unsupported_stmt("constant without a value"));
                        continue;
                    }
                }
            } else {
                (&spec.ty, spec.values.as_slice())
            };
            previous = Some((ty, values));

            for (name, value) in spec.names.iter().zip(values) {
                if name == "_" {
                    continue;
                }
                let value = substitute_iota(value, iota);
                let text = self.expr(&value);
                let target = match ty {
                    Some(ty) => Some(map_type(ty)),
                    None => self.infer_type(&value),
                };
                if !global {
                    let symbol_ty = target.clone().unwrap_or(TargetType::Primitive("int"));
                    self.resolver.define(Symbol::local(name, symbol_ty));
                }
                lines.push(match (ty, target) {
                    (Some(_), Some(target)) => format!("{name} : {target} : {text}"),
                    _ => format!("{name} :: {text}"),
                });
            }
        }
        lines
    }

    fn func_decl(&mut self, func: &FuncDecl) -> String {
        let (proc_name, key) = match &func.receiver {
            Some(receiver) => {
                let owner = map_type(&receiver.ty)
                    .struct_name()
                    .unwrap_or("Self")
                    .to_string();
                let name = format!("{owner}_{}", func.name);
                (name.clone(), name)
            }
            None => (func.name.clone(), func.name.clone()),
        };

        self.resolver.enter_scope();
        let mut params = Vec::new();
        if let Some(receiver) = &func.receiver {
            let name = receiver.names.first().map_or("self", String::as_str);
            params.push(self.param(name, &receiver.ty));
        }
        for field in &func.params {
            if field.names.is_empty() {
                params.push(format!("_: {}", map_type(&field.ty)));
            }
            for name in &field.names {
                params.push(self.param(name, &field.ty));
            }
        }

        let signature = self
            .ctx
            .signature(&key)
            .map(|s| s.results.clone())
            .unwrap_or_default();
        let results = if func.results.iter().any(|f| !f.names.is_empty()) {
            let mut named = Vec::new();
            let mut types = signature.iter();
            for field in &func.results {
                for name in &field.names {
                    let ty = types.next().cloned().unwrap_or_else(|| map_type(&field.ty));
                    named.push(format!("{name}: {ty}"));
                    self.resolver.define(Symbol::local(name, ty));
                }
            }
            format!(" -> ({})", named.join(", "))
        } else {
            let types: Vec<String> = signature.iter().map(ToString::to_string).collect();
            result_suffix(&types)
        };
        let head = format!("{proc_name} :: proc({}){results}", params.join(", "));

        let Some(body) = &func.body else {
            self.resolver.exit_scope();
            return format!("{head} ---");
        };

        let escapes = escape::analyze_func(body, self.ctx.globals());
        self.func = FunctionState {
            escapes,
            returned: escape::returned_names(body),
            body_depth: Some(self.resolver.depth()),
            needs_frame: false,
            returns_ref_counted: self
                .ctx
                .signature(&key)
                .is_some_and(|s| s.returns_ref_counted()),
        };
        let lines = self.stmts(body);
        let needs_frame = self.func.needs_frame;
        self.func = FunctionState::default();
        self.resolver.exit_scope();
        debug!("translated {proc_name} (frame: {needs_frame})");

        let mut prologue = Vec::new();
        if func.name == "main" && func.receiver.is_none() {
            if self.options.leak_check {
                prologue.extend(LEAK_CHECK_PROLOGUE.iter().map(|line| line.to_string()));
            }
            if self.ctx.uses_goroutines() {
                prologue.push(format!("golden.pool_start({})", self.options.worker_threads));
                prologue.push("defer golden.pool_stop()".to_string());
            }
        }
        if needs_frame {
            prologue.push("_frame := golden.frame_begin()".to_string());
            prologue.push("defer golden.frame_end(&_frame)".to_string());
        }
        prologue.extend(lines);
        braced(head, prologue).join("\n")
    }

    fn param(&mut self, name: &str, ty: &TypeExpr) -> String {
        let target = map_type(ty);
        let text = format!("{name}: {target}");
        if let TargetType::Variadic(elem) = target {
            self.resolver
                .define(Symbol::local(name, TargetType::DynamicArray(elem)));
        } else {
            self.resolver.define(Symbol::local(name, target));
        }
        text
    }
}

fn struct_decl(name: &str, fields: &[Field]) -> String {
    if fields.is_empty() {
        return format!("{name} :: struct {{}}");
    }
    let mut lines = Vec::new();
    for field in fields {
        let ty = map_type(&field.ty);
        if field.names.is_empty() {
            let embedded = match &ty {
                TargetType::Qualified { name, .. } => name.clone(),
                other => other.struct_name().unwrap_or("_").to_string(),
            };
            lines.push(format!("using {embedded}: {ty},"));
        }
        for field_name in &field.names {
            lines.push(format!("{field_name}: {ty},"));
        }
    }
    braced(format!("{name} :: struct"), lines).join("\n")
}

/// Replace every `iota` in a constant initializer with its index in the
/// group.
fn substitute_iota(value: &Expr, iota: usize) -> Expr {
    let mut value = value.clone();
    value.walk_mut(&mut |expr| {
        if matches!(expr, Expr::Ident(name) if name == "iota") {
            *expr = Expr::Lit {
                kind: LitKind::Int,
                value: iota.to_string(),
            };
        }
    });
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_iota_in_nested_positions() {
        let value = Expr::Binary {
            op: crate::ast::BinaryOp::Shl,
            lhs: Box::new(Expr::Lit {
                kind: LitKind::Int,
                value: "1".into(),
            }),
            rhs: Box::new(Expr::ident("iota")),
        };
        let substituted = substitute_iota(&value, 3);
        assert!(!substituted.mentions("iota"));
        assert!(matches!(
            substituted,
            Expr::Binary { rhs, .. } if *rhs == Expr::Lit { kind: LitKind::Int, value: "3".into() }
        ));
    }

    #[test]
    fn embeds_anonymous_struct_fields() {
        let fields = vec![
            Field {
                names: vec![],
                ty: TypeExpr::Name("Base".into()),
            },
            Field {
                names: vec!["X".into(), "Y".into()],
                ty: TypeExpr::Name("float64".into()),
            },
        ];
        assert_eq!(
            struct_decl("Point", &fields),
            "Point :: struct {\n\tusing Base: Base,\n\tX: f64,\n\tY: f64,\n}"
        );
    }
}
