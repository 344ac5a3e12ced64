use crate::ast::Expr;
use crate::builtins::{self, BuiltinDescriptor, BuiltinKind};
use crate::resolver::Symbol;
use crate::types::{SyncPrimitive, TargetType, map_primitive, map_type};

use super::Translator;
use super::expr::type_argument_text;

impl Translator<'_> {
    pub(super) fn call(&mut self, func: &Expr, args: &[Expr], spread: bool) -> String {
        if let Some(builtin) = self.builtin_for(func) {
            return self.builtin_call(builtin, args, spread);
        }
        match func {
            Expr::Type(ty) => {
                let args = self.call_args(args, spread);
                return format!("{}({args})", map_type(ty));
            }
            Expr::Ident(name) if self.is_conversion(name) => {
                let target = map_primitive(name).map_or_else(|| name.clone(), |t| t.to_string());
                let args = self.call_args(args, spread);
                return format!("{target}({args})");
            }
            Expr::Selector { base, field } => {
                if let Some(package) = base.as_ident().filter(|n| self.resolver.is_package(n)) {
                    let package = package.to_string();
                    return self.package_call(&package, field, args, spread);
                }
                return self.method_call(base, field, args, spread);
            }
            Expr::FuncLit(_) => return self.unsupported_expr("immediately invoked function literal"),
            _ => {}
        }
        let callee = self.expr(func);
        let args = self.call_args(args, spread);
        format!("{callee}({args})")
    }

    /// Builtin or allowlisted library function named by `func`, unless a
    /// local declaration shadows it.
    fn builtin_for(&self, func: &Expr) -> Option<&'static BuiltinDescriptor> {
        match func {
            Expr::Ident(name) if self.resolver.lookup(name).is_none() => builtins::find_builtin(name),
            Expr::Selector { base, field } => {
                let package = base.as_ident().filter(|n| self.resolver.is_package(n))?;
                let path = self.resolver.import_path(package)?;
                builtins::find_builtin(&format!("{path}.{field}"))
            }
            _ => None,
        }
    }

    fn is_conversion(&self, name: &str) -> bool {
        match self.resolver.lookup(name) {
            Some(symbol) if !symbol.is_global => false,
            _ => map_primitive(name).is_some() || self.ctx.is_named_type(name),
        }
    }

    fn builtin_call(&mut self, builtin: &BuiltinDescriptor, args: &[Expr], spread: bool) -> String {
        match builtin.kind {
            BuiltinKind::Rename => {
                let args = self.call_args(args, spread);
                format!("{}({args})", builtin.target)
            }
            BuiltinKind::Append => {
                let Some((slice, rest)) = args.split_first() else {
                    return self.unsupported_expr("append without arguments");
                };
                let slice = self.expr(slice);
                let mut parts = vec![format!("&{slice}")];
                let rest_len = rest.len();
                for (index, arg) in rest.iter().enumerate() {
                    let value = self.stored_value(arg);
                    if spread && index + 1 == rest_len {
                        parts.push(format!("..{value}[:]"));
                    } else {
                        parts.push(value);
                    }
                }
                format!("append({})", parts.join(", "))
            }
            BuiltinKind::Make => self.make_call(args),
            BuiltinKind::ErrorFormat => {
                let args = self.call_args(args, spread);
                format!("golden.error_new({}({args}))", builtin.target)
            }
            BuiltinKind::DeleteKey => match args {
                [map, key] => {
                    let map = self.expr(map);
                    let key = self.expr(key);
                    format!("{}(&{map}, {key})", builtin.target)
                }
                _ => self.unsupported_expr("delete with unexpected arguments"),
            },
            BuiltinKind::New => match args.first().and_then(type_argument_text) {
                Some(ty) => format!("new({ty})"),
                None => self.unsupported_expr("new of a non-type"),
            },
        }
    }

    /// `make(T, ...)`: slices become dynamic arrays, channels come from
    /// the runtime.
    pub(super) fn make_call(&mut self, args: &[Expr]) -> String {
        let Some((first, rest)) = args.split_first() else {
            return self.unsupported_expr("make without arguments");
        };
        let Some(ty) = type_argument_text(first) else {
            return self.unsupported_expr("make of a non-type");
        };
        let rest: Vec<String> = rest.iter().map(|arg| self.expr(arg)).collect();
        let target = match first {
            Expr::Type(_) => self.infer_type(first),
            _ => None,
        };
        match target {
            Some(TargetType::Channel(elem)) => {
                let mut parts = vec![elem.to_string()];
                parts.extend(rest);
                format!("golden.chan_make({})", parts.join(", "))
            }
            Some(TargetType::Map { .. }) => format!("make({ty})"),
            _ => {
                let mut parts = vec![ty];
                parts.extend(rest);
                format!("make({})", parts.join(", "))
            }
        }
    }

    fn package_call(&mut self, package: &str, function: &str, args: &[Expr], spread: bool) -> String {
        let args = self.call_args(args, spread);
        if self.resolver.import_path(package) == Some("os") {
            return format!("{}({args})", builtins::os_function(function));
        }
        format!("{package}.{function}({args})")
    }

    fn method_call(&mut self, base: &Expr, method: &str, args: &[Expr], spread: bool) -> String {
        let receiver_ty = self.infer_type(base);
        let symbol = self.symbol_of(base).cloned();
        let holds_address = symbol.as_ref().is_some_and(Symbol::holds_address)
            || receiver_ty.as_ref().is_some_and(TargetType::is_pointer);
        let args = self.call_args(args, spread);

        if let Some(target) = sync_primitive(receiver_ty.as_ref())
            .and_then(|primitive| builtins::sync_method(primitive, method))
        {
            let receiver = if holds_address {
                self.expr(base)
            } else {
                self.address_of(base)
            };
            return join_call(target, receiver, args);
        }

        let owner = receiver_ty
            .as_ref()
            .and_then(|ty| ty.struct_name().map(String::from))
            .or_else(|| self.ctx.sole_method_owner(method).map(String::from));
        let Some(owner) = owner else {
            let text = self.expr(base);
            let owner = capitalize(&base.dotted_name().unwrap_or_else(|| text.clone()));
            return join_call(&format!("{owner}_{method}"), format!("&{text}"), args);
        };

        let value_method = self.ctx.method_takes_pointer(&owner, method) == Some(false);
        let ref_counted = symbol.as_ref().is_some_and(Symbol::is_ref_counted)
            || matches!(receiver_ty, Some(TargetType::RefCounted(_)));
        let text = self.expr(base);
        let receiver = match (ref_counted, holds_address, value_method) {
            (true, _, true) => format!("{text}.data^"),
            (true, _, false) => format!("{text}.data"),
            (false, true, true) => format!("{text}^"),
            (false, true, false) => text,
            (false, false, true) => text,
            (false, false, false) => self.address_of(base),
        };
        join_call(&format!("{owner}_{method}"), receiver, args)
    }

    /// Arguments of an ordinary call. Ref-counted values are passed as the
    /// payload pointer; the caller keeps ownership.
    pub(super) fn call_args(&mut self, args: &[Expr], spread: bool) -> String {
        let count = args.len();
        args.iter()
            .enumerate()
            .map(|(index, arg)| {
                let value = self.payload(arg);
                if spread && index + 1 == count {
                    format!("..{value}[:]")
                } else {
                    value
                }
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

fn sync_primitive(ty: Option<&TargetType>) -> Option<SyncPrimitive> {
    match ty? {
        TargetType::Sync(primitive) => Some(*primitive),
        TargetType::Pointer(inner) => sync_primitive(Some(inner)),
        _ => None,
    }
}

fn join_call(target: &str, receiver: String, args: String) -> String {
    if args.is_empty() {
        format!("{target}({receiver})")
    } else {
        format!("{target}({receiver}, {args})")
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capitalizes_receiver_text() {
        assert_eq!(capitalize("worker"), "Worker");
        assert_eq!(capitalize(""), "");
    }

    #[test]
    fn sees_through_pointers_to_sync_primitives() {
        let wg = TargetType::pointer_to(TargetType::Sync(SyncPrimitive::WaitGroup));
        assert_eq!(sync_primitive(Some(&wg)), Some(SyncPrimitive::WaitGroup));
        assert_eq!(sync_primitive(Some(&TargetType::named("User"))), None);
    }
}
