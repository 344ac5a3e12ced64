//! Scoped symbol table.
//!
//! Scopes live in a flat arena and point at their parent by index. Only
//! the chain from the root to the current scope is ever live, so an exited
//! scope is always the last arena entry; its map is cleared and kept for
//! the next `enter_scope`.

use std::collections::{BTreeMap, HashMap};

use crate::ast::{Decl, File};
use crate::types::TargetType;

pub type ScopeId = usize;

/// How the value behind a name is allocated and released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AllocStrategy {
    /// Ordinary value; no heap participation.
    #[default]
    None,
    /// Heap allocation with a live-reference count (`golden.Arc`).
    RefCounted,
    /// Drawn from the function's frame pool and freed with it.
    Region,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    pub name: String,
    pub ty: TargetType,
    pub is_pointer: bool,
    pub escapes: bool,
    pub is_global: bool,
    pub strategy: AllocStrategy,
}

impl Symbol {
    pub fn local(name: impl Into<String>, ty: TargetType) -> Self {
        Symbol {
            name: name.into(),
            is_pointer: ty.is_pointer(),
            ty,
            escapes: false,
            is_global: false,
            strategy: AllocStrategy::None,
        }
    }

    pub fn global(name: impl Into<String>, ty: TargetType) -> Self {
        Symbol {
            is_global: true,
            ..Symbol::local(name, ty)
        }
    }

    pub fn with_strategy(mut self, strategy: AllocStrategy) -> Self {
        self.strategy = strategy;
        if strategy == AllocStrategy::RefCounted {
            self.escapes = true;
        }
        self
    }

    pub fn is_ref_counted(&self) -> bool {
        self.strategy == AllocStrategy::RefCounted
    }

    /// The name already evaluates to an address: a frame allocation or a
    /// plain pointer.
    pub fn holds_address(&self) -> bool {
        self.strategy == AllocStrategy::Region || self.is_pointer
    }
}

#[derive(Debug, Default)]
struct Scope {
    parent: Option<ScopeId>,
    symbols: HashMap<String, Symbol>,
}

#[derive(Debug)]
pub struct Resolver {
    scopes: Vec<Scope>,
    current: ScopeId,
    spare: Vec<HashMap<String, Symbol>>,
    /// Local package name → import path.
    imports: BTreeMap<String, String>,
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new()
    }
}

impl Resolver {
    pub fn new() -> Self {
        Resolver {
            scopes: vec![Scope::default()],
            current: 0,
            spare: Vec::new(),
            imports: BTreeMap::new(),
        }
    }

    pub fn current(&self) -> ScopeId {
        self.current
    }

    /// Number of scopes between the current one and the root.
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut scope = self.current;
        while let Some(parent) = self.scopes[scope].parent {
            depth += 1;
            scope = parent;
        }
        depth
    }

    pub fn enter_scope(&mut self) {
        let symbols = self.spare.pop().unwrap_or_default();
        self.scopes.push(Scope {
            parent: Some(self.current),
            symbols,
        });
        self.current = self.scopes.len() - 1;
    }

    /// Pop back to the parent scope; a no-op at the root.
    pub fn exit_scope(&mut self) {
        let Some(parent) = self.scopes[self.current].parent else {
            return;
        };
        if let Some(mut scope) = self.scopes.pop() {
            scope.symbols.clear();
            self.spare.push(scope.symbols);
        }
        self.current = parent;
    }

    /// Insert into the innermost scope, replacing any symbol of that name.
    pub fn define(&mut self, symbol: Symbol) {
        self.scopes[self.current]
            .symbols
            .insert(symbol.name.clone(), symbol);
    }

    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        let mut scope = Some(self.current);
        while let Some(id) = scope {
            if let Some(symbol) = self.scopes[id].symbols.get(name) {
                return Some(symbol);
            }
            scope = self.scopes[id].parent;
        }
        None
    }

    pub fn lookup_local(&self, name: &str) -> Option<&Symbol> {
        self.scopes[self.current].symbols.get(name)
    }

    /// Record every import of the unit. Scans declarations directly since
    /// merged units carry imports from several files.
    pub fn populate_imports(&mut self, file: &File) {
        for decl in &file.decls {
            if let Decl::Import(specs) = decl {
                for spec in specs {
                    self.imports
                        .insert(spec.local_name().to_string(), spec.path.clone());
                }
            }
        }
    }

    pub fn import_path(&self, local_name: &str) -> Option<&str> {
        self.imports.get(local_name).map(String::as_str)
    }

    /// Whether `name` refers to an imported package and is not shadowed
    /// by a variable.
    pub fn is_package(&self, name: &str) -> bool {
        self.imports.contains_key(name)
            && self.lookup(name).is_none_or(|symbol| symbol.is_global)
    }

    pub fn imports_path(&self, path: &str) -> bool {
        self.imports.values().any(|imported| imported == path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::ImportSpec;

    fn int(name: &str) -> Symbol {
        Symbol::local(name, TargetType::Primitive("int"))
    }

    #[test]
    fn inner_definitions_shadow_outer_ones() {
        let mut resolver = Resolver::new();
        resolver.define(int("x"));
        resolver.enter_scope();
        resolver.define(Symbol::local("x", TargetType::Primitive("string")));
        resolver.define(int("y"));

        assert_eq!(
            resolver.lookup("x").map(|s| &s.ty),
            Some(&TargetType::Primitive("string"))
        );

        resolver.exit_scope();
        assert_eq!(
            resolver.lookup("x").map(|s| &s.ty),
            Some(&TargetType::Primitive("int"))
        );
        assert!(resolver.lookup("y").is_none());
    }

    #[test]
    fn exit_at_root_is_a_no_op() {
        let mut resolver = Resolver::new();
        resolver.define(int("g"));
        resolver.exit_scope();
        resolver.exit_scope();
        assert_eq!(resolver.current(), 0);
        assert!(resolver.lookup("g").is_some());
    }

    #[test]
    fn recycled_scopes_start_empty() {
        let mut resolver = Resolver::new();
        resolver.enter_scope();
        resolver.define(int("tmp"));
        resolver.exit_scope();
        resolver.enter_scope();
        assert!(resolver.lookup_local("tmp").is_none());
        assert_eq!(resolver.depth(), 1);
    }

    #[test]
    fn define_only_touches_innermost_scope() {
        let mut resolver = Resolver::new();
        resolver.enter_scope();
        resolver.define(int("a"));
        resolver.enter_scope();
        assert!(resolver.lookup_local("a").is_none());
        resolver.define(int("a").with_strategy(AllocStrategy::RefCounted));
        assert!(resolver.lookup("a").is_some_and(Symbol::is_ref_counted));
        resolver.exit_scope();
        assert!(resolver.lookup("a").is_some_and(|s| !s.is_ref_counted()));
    }

    #[test]
    fn import_aliases_default_to_last_segment() {
        let file = File {
            package: "main".into(),
            decls: vec![Decl::Import(vec![
                ImportSpec {
                    alias: None,
                    path: "os".into(),
                },
                ImportSpec {
                    alias: Some("g".into()),
                    path: "github.com/acme/golden".into(),
                },
                ImportSpec {
                    alias: None,
                    path: "path/filepath".into(),
                },
            ])],
        };
        let mut resolver = Resolver::new();
        resolver.populate_imports(&file);

        assert_eq!(resolver.import_path("g"), Some("github.com/acme/golden"));
        assert_eq!(resolver.import_path("filepath"), Some("path/filepath"));
        assert!(resolver.imports_path("os"));
        assert!(resolver.is_package("os"));

        resolver.enter_scope();
        resolver.define(int("os"));
        assert!(!resolver.is_package("os"));
    }
}
