//! Generic file-wide identifier rename, driven by an old-name -> new-name
//! map. Shared by identifier alias removal (§4.2) and the Beautifier's
//! hex-identifier rename (§4.3); both ultimately want "every reference of
//! this name becomes that name" rather than anything scope-precise, which
//! is the simplification this crate takes everywhere `scope.rename` appears
//! in the spec (see DESIGN.md).
//!
//! Only identifier *reads* and *bindings* are touched — property-name
//! identifiers (`obj.name`, object literal keys) are a different AST kind
//! and are never affected by this pass.

use oxc_ast::ast::*;
use oxc_traverse::{Traverse, TraverseCtx};
use rustc_hash::FxHashMap;

use super::state::DeobfuscateState;

pub type Ctx<'a> = TraverseCtx<'a, DeobfuscateState>;

pub struct IdentifierRenamer {
    map: FxHashMap<String, String>,
}

impl IdentifierRenamer {
    pub fn new(map: FxHashMap<String, String>) -> Self {
        Self { map }
    }
}

impl<'a> Traverse<'a, DeobfuscateState> for IdentifierRenamer {
    fn exit_identifier_reference(&mut self, ident: &mut IdentifierReference<'a>, ctx: &mut Ctx<'a>) {
        if let Some(new_name) = self.map.get(ident.name.as_str()) {
            ident.name = ctx.ast.atom(new_name);
        }
    }

    fn exit_binding_identifier(&mut self, ident: &mut BindingIdentifier<'a>, ctx: &mut Ctx<'a>) {
        if let Some(new_name) = self.map.get(ident.name.as_str()) {
            ident.name = ctx.ast.atom(new_name);
        }
    }
}

#[cfg(test)]
mod tests {
    use rustc_hash::FxHashMap;

    use crate::deobfuscate::testing::run_pass;

    use super::IdentifierRenamer;

    #[test]
    fn renames_declaration_and_every_reference() {
        let mut map = FxHashMap::default();
        map.insert("_0x1".to_string(), "str".to_string());
        let out = run_pass("var _0x1 = 'hi'; f(_0x1); g(_0x1 + 1);", || IdentifierRenamer::new(map));
        assert!(!out.contains("_0x1"));
        assert_eq!(out.matches("str").count(), 3);
    }

    #[test]
    fn leaves_property_names_untouched() {
        let mut map = FxHashMap::default();
        map.insert("name".to_string(), "renamed".to_string());
        let out = run_pass("var obj = { name: 1 }; f(obj.name);", || IdentifierRenamer::new(map));
        assert!(out.contains("name"));
    }
}
