//! Syntax-directed translation from the Go AST to Odin source text.
//!
//! Statements translate to lists of lines relative to the enclosing block;
//! nested bodies are re-indented by one tab per level. A single entry may
//! span several physical lines (multi-line composite literals, lowered
//! goroutines), and indentation applies to each of them.
//!
//! The translator threads the allocation strategy chosen for every binding
//! into each later reference: field access through a ref-counted wrapper
//! goes via `.data`, method receivers are passed by value or address
//! according to the census, and goroutines read captures through their
//! record.

mod call;
mod closure;
mod decl;
mod expr;
mod stmt;

use std::collections::HashSet;

use crate::config::TranspileOptions;
use crate::context::CompilationContext;
use crate::escape::EscapeSet;
use crate::resolver::Resolver;

/// Marker prefix of every placeholder emitted for unsupported input.
pub const PLACEHOLDER_TAG: &str = "golden: unsupported";

/// Facts about the function whose body is being translated.
#[derive(Debug, Default)]
struct FunctionState {
    escapes: EscapeSet,
    /// Names the function returns directly; their allocations are handed
    /// to the caller instead of released on exit.
    returned: HashSet<String>,
    /// Resolver depth of the function's top-level scope. Goroutine
    /// wrappers use `None`: they have no frame.
    body_depth: Option<usize>,
    /// A frame allocation was emitted, so the prologue must open a frame.
    needs_frame: bool,
    /// The first result is handed out as `golden.Arc(T)`.
    returns_ref_counted: bool,
}

pub struct Translator<'a> {
    ctx: &'a mut CompilationContext,
    resolver: &'a mut Resolver,
    options: &'a TranspileOptions,
    func: FunctionState,
}

impl<'a> Translator<'a> {
    pub fn new(
        ctx: &'a mut CompilationContext,
        resolver: &'a mut Resolver,
        options: &'a TranspileOptions,
    ) -> Self {
        Translator {
            ctx,
            resolver,
            options,
            func: FunctionState::default(),
        }
    }

    /// Statement-position placeholder.
    fn unsupported_stmt(&mut self, what: &str) -> Vec<String> {
        self.ctx.note_placeholder(what);
        vec![format!("// {PLACEHOLDER_TAG} {what}")]
    }

    /// Expression-position placeholder.
    fn unsupported_expr(&mut self, what: &str) -> String {
        self.ctx.note_placeholder(what);
        format!("/* {PLACEHOLDER_TAG} {what} */")
    }

    /// Translate `body` in a fresh child scope.
    fn scoped_body(&mut self, body: &[crate::ast::Stmt]) -> Vec<String> {
        self.resolver.enter_scope();
        let lines = self.stmts(body);
        self.resolver.exit_scope();
        lines
    }
}

/// Prefix every physical line with one tab. Blank lines stay blank.
pub(crate) fn indent(lines: Vec<String>) -> Vec<String> {
    lines
        .iter()
        .flat_map(|line| line.split('\n'))
        .map(|line| {
            if line.is_empty() {
                String::new()
            } else {
                format!("\t{line}")
            }
        })
        .collect()
}

/// `head {`, the indented body, `}`.
pub(crate) fn braced(head: String, body: Vec<String>) -> Vec<String> {
    let mut lines = vec![format!("{head} {{")];
    lines.extend(indent(body));
    lines.push("}".to_string());
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indents_each_physical_line() {
        let lines = indent(vec!["a := T{\n\tX = 1,\n}".to_string(), String::new()]);
        assert_eq!(lines, vec!["\ta := T{", "\t\tX = 1,", "\t}", ""]);
    }

    #[test]
    fn braces_bodies() {
        let lines = braced("for".to_string(), vec!["x += 1".to_string()]);
        assert_eq!(lines, vec!["for {", "\tx += 1", "}"]);
    }
}
