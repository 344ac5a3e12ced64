//! Per-run compilation state and the census pass.
//!
//! A fresh `CompilationContext` is built for every run, so translating the
//! same unit twice yields identical output.

use std::collections::{HashMap, HashSet};

use log::{debug, warn};

use crate::ast::{Decl, Expr, Field, File, FuncDecl, Stmt, TypeExpr, visit_stmts};
use crate::escape;
use crate::resolver::{Resolver, Symbol};
use crate::types::{TargetType, literal_type, map_type};

/// What a function hands back in its first result.
#[derive(Debug, Clone, PartialEq)]
pub enum ReturnShape {
    Value(TargetType),
    /// A plain pointer to the payload type.
    Pointer(TargetType),
    /// A pointer that is produced by a ref-counted allocation; callers
    /// receive `golden.Arc(T)`.
    RefCounted(TargetType),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Signature {
    pub shape: Option<ReturnShape>,
    /// Every declared result, with a ref-counted first result already
    /// wrapped.
    pub results: Vec<TargetType>,
}

impl Signature {
    pub fn returns_ref_counted(&self) -> bool {
        matches!(self.shape, Some(ReturnShape::RefCounted(_)))
    }
}

#[derive(Debug, Default)]
pub struct CompilationContext {
    /// Keyed by function name, or `<Struct>_<Method>` for methods.
    signatures: HashMap<String, Signature>,
    /// `<Struct>_<Method>` → receiver is a pointer.
    pointer_receivers: HashMap<String, bool>,
    /// Method name → every struct that declares it.
    method_owners: HashMap<String, Vec<String>>,
    structs: HashMap<String, Vec<(String, TargetType)>>,
    named_types: HashSet<String>,
    globals: HashSet<String>,
    uses_goroutines: bool,
    next_task: usize,
    placeholders: usize,
}

impl CompilationContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pass one: register every type, global and function of the unit
    /// before any code is generated.
    pub fn census(&mut self, file: &File, resolver: &mut Resolver) {
        for decl in &file.decls {
            match decl {
                Decl::Type(specs) => {
                    for spec in specs {
                        self.named_types.insert(spec.name.clone());
                        if let TypeExpr::Struct(fields) = &spec.ty {
                            self.structs
                                .insert(spec.name.clone(), struct_fields(fields));
                        }
                        resolver.define(Symbol::global(&spec.name, TargetType::named(&spec.name)));
                    }
                }
                Decl::Var(specs) | Decl::Const(specs) => {
                    for spec in specs {
                        for (index, name) in spec.names.iter().enumerate() {
                            let ty = match &spec.ty {
                                Some(ty) => map_type(ty),
                                None => spec
                                    .values
                                    .get(index)
                                    .and_then(initializer_type)
                                    .unwrap_or(TargetType::Primitive("int")),
                            };
                            self.globals.insert(name.clone());
                            resolver.define(Symbol::global(name, ty));
                        }
                    }
                }
                Decl::Import(_) | Decl::Func(_) => {}
            }
        }

        for decl in &file.decls {
            if let Decl::Func(func) = decl {
                self.register_func(func, resolver);
            }
        }

        debug!(
            "census: {} signature(s), {} struct(s), {} global(s), goroutines: {}",
            self.signatures.len(),
            self.structs.len(),
            self.globals.len(),
            self.uses_goroutines
        );
    }

    fn register_func(&mut self, func: &FuncDecl, resolver: &mut Resolver) {
        let key = match &func.receiver {
            Some(receiver) => {
                let receiver_ty = map_type(&receiver.ty);
                let owner = receiver_ty.struct_name().unwrap_or("Self").to_string();
                let key = format!("{owner}_{}", func.name);
                self.pointer_receivers
                    .insert(key.clone(), receiver_ty.is_pointer());
                self.method_owners
                    .entry(func.name.clone())
                    .or_default()
                    .push(owner);
                key
            }
            None => {
                // Procedures carry no value type of their own.
                resolver.define(Symbol::global(&func.name, TargetType::RawPtr));
                func.name.clone()
            }
        };

        let body = func.body.as_deref().unwrap_or_default();
        if launches_tasks(body) {
            self.uses_goroutines = true;
        }

        let mut results: Vec<TargetType> = func
            .results
            .iter()
            .flat_map(|field| {
                let count = field.names.len().max(1);
                std::iter::repeat_n(map_type(&field.ty), count)
            })
            .collect();

        let shape = func.first_result().map(|first| match first {
            TypeExpr::Pointer(pointee) if self.returns_own_allocation(body, pointee) => {
                ReturnShape::RefCounted(map_type(pointee))
            }
            TypeExpr::Pointer(pointee) => ReturnShape::Pointer(map_type(pointee)),
            other => ReturnShape::Value(map_type(other)),
        });
        if let Some(ReturnShape::RefCounted(payload)) = &shape {
            results[0] = TargetType::ref_counted(payload.clone());
        }

        debug!("census: {key} returns {shape:?}");
        self.signatures.insert(key, Signature { shape, results });
    }

    /// Every non-nil first result is an allocation the function made
    /// itself: a bare `&T{...}`, or a name bound by one, where `T` is the
    /// pointee. Mixed returns keep the plain pointer shape.
    fn returns_own_allocation(&self, body: &[Stmt], pointee: &TypeExpr) -> bool {
        let escapes = escape::analyze_func(body, &self.globals);
        let mut own = 0;
        let mut foreign = 0;
        visit_stmts(body, &mut |stmt| {
            let Stmt::Return(results) = stmt else {
                return;
            };
            match results.first() {
                Some(Expr::Ident(name)) if name == "nil" => {}
                Some(Expr::Ident(name)) if escapes.candidate_type(name) == Some(pointee) => {
                    own += 1;
                }
                Some(value)
                    if value
                        .as_address_of_composite()
                        .is_some_and(|(ty, _)| ty.as_ref() == Some(pointee)) =>
                {
                    own += 1;
                }
                _ => foreign += 1,
            }
        });
        own > 0 && foreign == 0
    }

    pub fn signature(&self, name: &str) -> Option<&Signature> {
        self.signatures.get(name)
    }

    /// Receiver convention of `<Struct>_<Method>`, if the method is known.
    pub fn method_takes_pointer(&self, struct_name: &str, method: &str) -> Option<bool> {
        self.pointer_receivers
            .get(&format!("{struct_name}_{method}"))
            .copied()
    }

    /// The single struct declaring `method`, when the name is unambiguous.
    pub fn sole_method_owner(&self, method: &str) -> Option<&str> {
        match self.method_owners.get(method).map(Vec::as_slice) {
            Some([owner]) => Some(owner),
            _ => None,
        }
    }

    pub fn field_type(&self, struct_name: &str, field: &str) -> Option<&TargetType> {
        self.structs
            .get(struct_name)?
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, ty)| ty)
    }

    pub fn is_named_type(&self, name: &str) -> bool {
        self.named_types.contains(name)
    }

    pub fn globals(&self) -> &HashSet<String> {
        &self.globals
    }

    pub fn uses_goroutines(&self) -> bool {
        self.uses_goroutines
    }

    /// Number used to name the next goroutine's record and wrapper.
    pub fn next_task_id(&mut self) -> usize {
        let id = self.next_task;
        self.next_task += 1;
        id
    }

    pub fn note_placeholder(&mut self, what: &str) {
        self.placeholders += 1;
        warn!("unsupported construct left as placeholder: {what}");
    }

    pub fn placeholders(&self) -> usize {
        self.placeholders
    }
}

fn struct_fields(fields: &[Field]) -> Vec<(String, TargetType)> {
    let mut table = Vec::new();
    for field in fields {
        let ty = map_type(&field.ty);
        if field.names.is_empty() {
            // Embedded fields are reachable under their type's name.
            if let Some(name) = ty.struct_name().or(match &ty {
                TargetType::Qualified { name, .. } => Some(name.as_str()),
                _ => None,
            }) {
                table.push((name.to_string(), ty.clone()));
            }
        }
        for name in &field.names {
            table.push((name.clone(), ty.clone()));
        }
    }
    table
}

/// Type of a package-level initializer when no type is written.
fn initializer_type(expr: &Expr) -> Option<TargetType> {
    match expr {
        Expr::Lit { kind, .. } => Some(literal_type(*kind)),
        Expr::Ident(name) if name == "true" || name == "false" => {
            Some(TargetType::Primitive("b8"))
        }
        Expr::Composite { ty: Some(ty), .. } => Some(map_type(ty)),
        Expr::Unary { operand, .. } => initializer_type(operand),
        _ => None,
    }
}

/// Whether a body contains a `go` statement, including inside nested
/// blocks and function literals.
pub(crate) fn launches_tasks(body: &[Stmt]) -> bool {
    body.iter().any(|stmt| {
        if matches!(stmt, Stmt::Go(_)) || stmt.nested_blocks().into_iter().any(launches_tasks) {
            return true;
        }
        let mut found = false;
        stmt.walk_exprs(&mut |expr| {
            if let Expr::FuncLit(lit) = expr {
                found |= launches_tasks(&lit.body);
            }
        });
        found
    })
}
