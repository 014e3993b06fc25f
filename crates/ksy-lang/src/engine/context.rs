// Four-scope resolution context over the nominal type arena
//
// Contexts are cheap copies; the `with_*` derivations return a fresh
// context sharing the arena and global table, so descending into a struct
// never mutates the caller's view.

use rustc_hash::FxHashMap;

use super::{TypeArena, TypeId};

/// Resolution scopes in increasing precedence. Ties silently favor the more
/// precedent scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Scope {
    /// Every type processed by any module load.
    Global,
    /// The module's top-level struct and its imports.
    Module,
    /// The struct currently being walked; misses retry one level up the
    /// nominal tree.
    Local,
    /// `_root`, `_parent`, `_io`, `_`.
    Intrinsic,
}

#[derive(Clone, Copy)]
pub struct Context<'a> {
    pub arena: &'a TypeArena,
    /// All root types registered by module loads, by name.
    pub global: &'a FxHashMap<String, TypeId>,
    /// Direct imports of the current module, by logical name.
    pub imports: &'a FxHashMap<String, TypeId>,
    pub module: Option<TypeId>,
    pub local: Option<TypeId>,
}

impl<'a> Context<'a> {
    pub fn new(
        arena: &'a TypeArena,
        global: &'a FxHashMap<String, TypeId>,
        imports: &'a FxHashMap<String, TypeId>,
    ) -> Self {
        Self {
            arena,
            global,
            imports,
            module: None,
            local: None,
        }
    }

    pub fn with_module_root(mut self, id: TypeId) -> Self {
        self.module = Some(id);
        self
    }

    pub fn with_local_root(mut self, id: TypeId) -> Self {
        self.local = Some(id);
        self
    }

    fn resolve_intrinsic(&self, name: &str) -> Option<TypeId> {
        match name {
            "_root" => self.module,
            "_parent" => self.local,
            "_io" => Some(self.arena.stream_type),
            _ => None,
        }
    }

    fn resolve_local(&self, name: &str) -> Option<TypeId> {
        let local = self.local?;
        if let Some(id) = self.arena.child(local, name) {
            return Some(id);
        }
        // Lazy one-level walk up the nominal tree on miss.
        let parent = self.arena.parent(local)?;
        self.arena.child(parent, name)
    }

    fn resolve_module(&self, name: &str) -> Option<TypeId> {
        if let Some(module) = self.module {
            if let Some(id) = self.arena.child(module, name) {
                return Some(id);
            }
        }
        self.imports.get(name).copied()
    }

    fn resolve_global(&self, name: &str) -> Option<TypeId> {
        self.global.get(name).copied()
    }

    /// Resolve a name to a nominal type, walking intrinsic, local, module,
    /// then global scope.
    pub fn resolve_type(&self, name: &str) -> Option<(TypeId, Scope)> {
        if let Some(id) = self.resolve_intrinsic(name) {
            return Some((id, Scope::Intrinsic));
        }
        if let Some(id) = self.resolve_local(name) {
            return Some((id, Scope::Local));
        }
        if let Some(id) = self.resolve_module(name) {
            return Some((id, Scope::Module));
        }
        if let Some(id) = self.resolve_global(name) {
            return Some((id, Scope::Global));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ksy::parse_schema;

    #[test]
    fn test_precedence_local_over_module_over_global() {
        // `sub` exists as a nested type of the walked struct and as a
        // global root; local must win.
        let root = parse_schema(
            "meta:\n  id: demo\ntypes:\n  sub:\n    seq:\n      - id: x\n        type: u1\n"
                .as_bytes(),
        )
        .unwrap();
        let other = parse_schema("meta:\n  id: sub\nseq:\n  - id: y\n    type: u1\n".as_bytes())
            .unwrap();

        let mut arena = TypeArena::new();
        let root_id = arena.build_struct(&root, None);
        let global_sub = arena.build_struct(&other, None);

        let mut global = FxHashMap::default();
        global.insert("demo".to_string(), root_id);
        global.insert("sub".to_string(), global_sub);
        let imports = FxHashMap::default();

        let ctx = Context::new(&arena, &global, &imports)
            .with_module_root(root_id)
            .with_local_root(root_id);

        let (resolved, scope) = ctx.resolve_type("sub").unwrap();
        assert_eq!(scope, Scope::Local);
        assert_ne!(resolved, global_sub);

        // Without a local/module root the global copy is found.
        let bare = Context::new(&arena, &global, &imports);
        let (resolved, scope) = bare.resolve_type("sub").unwrap();
        assert_eq!(scope, Scope::Global);
        assert_eq!(resolved, global_sub);
    }

    #[test]
    fn test_intrinsics_take_precedence() {
        let root = parse_schema(
            "meta:\n  id: demo\ntypes:\n  _io:\n    seq: []\n".as_bytes(),
        )
        .unwrap();
        let mut arena = TypeArena::new();
        let root_id = arena.build_struct(&root, None);
        let global = FxHashMap::default();
        let imports = FxHashMap::default();
        let ctx = Context::new(&arena, &global, &imports)
            .with_module_root(root_id)
            .with_local_root(root_id);
        let (id, scope) = ctx.resolve_type("_io").unwrap();
        assert_eq!(scope, Scope::Intrinsic);
        assert_eq!(id, arena.stream_type);
    }

    #[test]
    fn test_local_walks_one_level_up() {
        let root = parse_schema(
            "meta:\n  id: demo\ntypes:\n  outer:\n    types:\n      inner:\n        seq: []\n  sibling:\n    seq: []\n"
                .as_bytes(),
        )
        .unwrap();
        let mut arena = TypeArena::new();
        let root_id = arena.build_struct(&root, None);
        let outer = arena.child(root_id, "outer").unwrap();
        let inner = arena.child(outer, "inner").unwrap();
        let global = FxHashMap::default();
        let imports = FxHashMap::default();

        // From inner, `sibling` is two levels up: local scope misses it,
        // but module scope (the root) still finds it.
        let ctx = Context::new(&arena, &global, &imports)
            .with_module_root(root_id)
            .with_local_root(inner);
        let (_, scope) = ctx.resolve_type("sibling").unwrap();
        assert_eq!(scope, Scope::Module);

        // From inner, siblings of inner (children of outer) resolve
        // locally via the one-level walk.
        let (_, scope) = ctx.resolve_type("inner").unwrap();
        assert_eq!(scope, Scope::Local);
    }
}
