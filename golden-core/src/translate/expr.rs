use std::borrow::Cow;

use crate::ast::{BinaryOp, CaptureRef, Element, Expr, TypeExpr, UnaryOp};
use crate::builtins;
use crate::resolver::Symbol;
use crate::types::{TargetType, literal_type, map_primitive, map_type};

use super::{Translator, indent};

/// Composite literals with more fields than this go one field per line.
const INLINE_FIELD_LIMIT: usize = 3;

impl Translator<'_> {
    pub(super) fn expr(&mut self, expr: &Expr) -> String {
        match expr {
            Expr::Ident(name) => name.clone(),
            Expr::Lit { value, .. } => value.clone(),
            Expr::Binary { op, lhs, rhs } => {
                let lhs = self.expr(lhs);
                let rhs = self.expr(rhs);
                format!("{lhs} {} {rhs}", binary_op(*op))
            }
            Expr::Unary { op, operand } => self.unary(*op, operand),
            Expr::Paren(inner) => format!("({})", self.expr(inner)),
            Expr::Selector { base, field } => self.selector(base, field),
            Expr::Index { base, index } => {
                let base = self.expr(base);
                let index = self.expr(index);
                format!("{base}[{index}]")
            }
            Expr::Slice { base, low, high } => {
                let base = self.expr(base);
                let low = low.as_deref().map(|e| self.expr(e)).unwrap_or_default();
                let high = high.as_deref().map(|e| self.expr(e)).unwrap_or_default();
                format!("{base}[{low}:{high}]")
            }
            Expr::Call { func, args, spread } => self.call(func, args, *spread),
            Expr::Composite { ty, elements } => self.composite(ty.as_ref(), elements),
            Expr::FuncLit(lit) => self.func_lit(lit),
            Expr::TypeAssert { base, ty: Some(ty) } => {
                format!("{}.({})", self.expr(base), map_type(ty))
            }
            Expr::TypeAssert { ty: None, .. } => self.unsupported_expr("type switch guard"),
            Expr::Type(ty) => map_type(ty).to_string(),
            Expr::Captured(capture) => {
                let field = capture_field(capture);
                if capture.by_address {
                    format!("{field}^")
                } else {
                    field
                }
            }
        }
    }

    fn unary(&mut self, op: UnaryOp, operand: &Expr) -> String {
        match op {
            UnaryOp::Addr => self.address_of(operand),
            UnaryOp::Deref => format!("{}^", self.payload(operand)),
            UnaryOp::Recv => format!("golden.chan_recv({})", self.expr(operand)),
            UnaryOp::Plus => format!("+{}", self.expr(operand)),
            UnaryOp::Neg => format!("-{}", self.expr(operand)),
            UnaryOp::Not => format!("!{}", self.expr(operand)),
            UnaryOp::BitNot => format!("~{}", self.expr(operand)),
        }
    }

    /// `&x`. A capture stored by address is already a pointer, so taking
    /// its address collapses to the record field.
    pub(super) fn address_of(&mut self, operand: &Expr) -> String {
        match operand {
            Expr::Captured(capture) if capture.by_address => capture_field(capture),
            _ => format!("&{}", self.expr(operand)),
        }
    }

    fn selector(&mut self, base: &Expr, field: &str) -> String {
        if let Some(package) = base.as_ident().filter(|name| self.resolver.is_package(name)) {
            if self.resolver.import_path(package) == Some("os") {
                return builtins::os_function(field);
            }
            return format!("{package}.{field}");
        }
        let payload = self.payload(base);
        format!("{payload}.{field}")
    }

    /// The value behind a name; a ref-counted wrapper yields its `.data`
    /// pointer.
    pub(super) fn payload(&mut self, expr: &Expr) -> String {
        let text = self.expr(expr);
        if self.is_ref_counted(expr) {
            format!("{text}.data")
        } else {
            text
        }
    }

    /// A value stored somewhere that outlives the current statement: a
    /// field, an element, a channel. Ref-counted values take a reference.
    pub(super) fn stored_value(&mut self, expr: &Expr) -> String {
        let text = self.expr(expr);
        if self.is_ref_counted(expr) {
            format!("golden.arc_retain({text}).data")
        } else {
            text
        }
    }

    pub(super) fn composite(&mut self, ty: Option<&TypeExpr>, elements: &[Element]) -> String {
        let type_name = ty.map(|ty| map_type(ty).to_string()).unwrap_or_default();
        let fields: Vec<String> = elements
            .iter()
            .map(|element| {
                let value = self.stored_value(&element.value);
                match (&element.key, element.field_name(ty)) {
                    (_, Some(field)) => format!("{field} = {value}"),
                    (Some(key), None) => format!("{} = {value}", self.expr(key)),
                    (None, None) => value,
                }
            })
            .collect();

        if fields.len() <= INLINE_FIELD_LIMIT && !fields.iter().any(|f| f.contains('\n')) {
            return format!("{type_name}{{{}}}", fields.join(", "));
        }
        let mut lines = vec![format!("{type_name}{{")];
        lines.extend(indent(
            fields.into_iter().map(|field| format!("{field},")).collect(),
        ));
        lines.push("}".to_string());
        lines.join("\n")
    }

    /// Symbol a plain name or capture refers to.
    pub(super) fn symbol_of(&self, expr: &Expr) -> Option<&Symbol> {
        match expr {
            Expr::Ident(name) => self.resolver.lookup(name),
            Expr::Captured(capture) => self.resolver.lookup(&capture.name),
            Expr::Paren(inner) => self.symbol_of(inner),
            _ => None,
        }
    }

    pub(super) fn is_ref_counted(&self, expr: &Expr) -> bool {
        self.symbol_of(expr).is_some_and(Symbol::is_ref_counted)
    }

    /// Best-effort static type of an expression, enough to pick method
    /// owners, capture field types and declaration types.
    pub(super) fn infer_type(&self, expr: &Expr) -> Option<TargetType> {
        match expr {
            Expr::Lit { kind, .. } => Some(literal_type(*kind)),
            Expr::Ident(name) if name == "true" || name == "false" => {
                Some(TargetType::Primitive("b8"))
            }
            Expr::Ident(name) if name == "nil" => None,
            Expr::Ident(_) | Expr::Captured(_) => self.symbol_of(expr).map(|s| s.ty.clone()),
            Expr::Paren(inner) => self.infer_type(inner),
            Expr::Composite { ty, .. } => ty.as_ref().map(map_type),
            Expr::Type(ty) => Some(map_type(ty)),
            Expr::TypeAssert { ty, .. } => ty.as_ref().map(map_type),
            Expr::FuncLit(_) => None,
            Expr::Unary { op, operand } => match op {
                UnaryOp::Addr => self.infer_type(operand).map(TargetType::pointer_to),
                UnaryOp::Deref => match self.infer_type(operand)? {
                    TargetType::Pointer(inner) | TargetType::RefCounted(inner) => Some(*inner),
                    _ => None,
                },
                UnaryOp::Recv => self.infer_type(operand)?.element().cloned(),
                UnaryOp::Not => Some(TargetType::Primitive("b8")),
                UnaryOp::Plus | UnaryOp::Neg | UnaryOp::BitNot => self.infer_type(operand),
            },
            Expr::Binary { op, lhs, rhs } => match op {
                BinaryOp::Eq
                | BinaryOp::NotEq
                | BinaryOp::Less
                | BinaryOp::LessEq
                | BinaryOp::Greater
                | BinaryOp::GreaterEq
                | BinaryOp::LogAnd
                | BinaryOp::LogOr => Some(TargetType::Primitive("b8")),
                _ => self.infer_type(lhs).or_else(|| self.infer_type(rhs)),
            },
            Expr::Selector { base, field } => {
                if base.as_ident().is_some_and(|name| self.resolver.is_package(name)) {
                    return None;
                }
                let owner = self.infer_type(base)?;
                self.ctx.field_type(owner.struct_name()?, field).cloned()
            }
            Expr::Index { base, .. } => self.infer_type(base)?.element().cloned(),
            Expr::Slice { base, .. } => self.infer_type(base),
            Expr::Call { func, args, .. } => self.call_type(func, args),
        }
    }

    fn call_type(&self, func: &Expr, args: &[Expr]) -> Option<TargetType> {
        self.call_results(func, args)?.into_iter().next()
    }

    /// Result types of a call, as far as they are known.
    pub(super) fn call_results(&self, func: &Expr, args: &[Expr]) -> Option<Vec<TargetType>> {
        match func {
            Expr::Type(ty) => Some(vec![map_type(ty)]),
            Expr::Ident(name) if self.resolver.lookup(name).is_none_or(|s| s.is_global) => {
                let single = match name.as_str() {
                    "len" | "cap" => TargetType::Primitive("int"),
                    "make" => map_type(&*type_argument(args.first()?)?),
                    "new" => TargetType::pointer_to(map_type(&*type_argument(args.first()?)?)),
                    "append" => return self.infer_type(args.first()?).map(|t| vec![t]),
                    _ => {
                        if let Some(primitive) = map_primitive(name) {
                            primitive
                        } else if self.ctx.is_named_type(name) {
                            TargetType::named(name)
                        } else {
                            return self.ctx.signature(name).map(|s| s.results.clone());
                        }
                    }
                };
                Some(vec![single])
            }
            Expr::Selector { base, field } => {
                if let Some(package) = base.as_ident().filter(|n| self.resolver.is_package(n)) {
                    let qualified = format!("{}.{field}", self.resolver.import_path(package)?);
                    return match qualified.as_str() {
                        "errors.New" | "fmt.Errorf" => Some(vec![TargetType::Error]),
                        "fmt.Sprintf" | "fmt.Sprint" | "fmt.Sprintln" => {
                            Some(vec![TargetType::Primitive("string")])
                        }
                        _ => None,
                    };
                }
                let owner = self
                    .infer_type(base)
                    .and_then(|ty| ty.struct_name().map(String::from))
                    .or_else(|| self.ctx.sole_method_owner(field).map(String::from))?;
                self.ctx
                    .signature(&format!("{owner}_{field}"))
                    .map(|s| s.results.clone())
            }
            _ => None,
        }
    }
}

fn capture_field(capture: &CaptureRef) -> String {
    format!("{}.{}", capture.record, capture.name)
}

/// The type written as the first argument of `make` or `new`.
fn type_argument(arg: &Expr) -> Option<Cow<'_, TypeExpr>> {
    match arg {
        Expr::Type(ty) => Some(Cow::Borrowed(ty)),
        Expr::Ident(name) => Some(Cow::Owned(TypeExpr::Name(name.clone()))),
        Expr::Selector { base, field } => Some(Cow::Owned(TypeExpr::Qualified {
            package: base.as_ident()?.to_string(),
            name: field.clone(),
        })),
        _ => None,
    }
}

pub(super) fn type_argument_text(arg: &Expr) -> Option<String> {
    type_argument(arg).map(|ty| map_type(&*ty).to_string())
}

fn binary_op(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Add => "+",
        BinaryOp::Sub => "-",
        BinaryOp::Mul => "*",
        BinaryOp::Quo => "/",
        BinaryOp::Rem => "%",
        BinaryOp::And => "&",
        BinaryOp::Or => "|",
        BinaryOp::Xor => "~",
        BinaryOp::Shl => "<<",
        BinaryOp::Shr => ">>",
        BinaryOp::AndNot => "&~",
        BinaryOp::LogAnd => "&&",
        BinaryOp::LogOr => "||",
        BinaryOp::Eq => "==",
        BinaryOp::NotEq => "!=",
        BinaryOp::Less => "<",
        BinaryOp::LessEq => "<=",
        BinaryOp::Greater => ">",
        BinaryOp::GreaterEq => ">=",
    }
}
