//! Stage 3 Beautifier (spec §4.3): renames every hex-pattern identifier
//! (`_0x[0-9a-f]+`, case-insensitive) using a hint inferred from its
//! declaration context, plus the two additional beautification rules for
//! object-property function values and `obj.name = "literal"` assignments.
//!
//! Collection and application are split the same way every other
//! collector/inliner pair in this crate is: `HexRenameCollector` only reads
//! the tree and grows the cache's name pool; `rename::IdentifierRenamer`
//! (already written for identifier alias removal) applies the resulting
//! map in a following pass.

use std::sync::OnceLock;

use oxc_ast::ast::*;
use oxc_traverse::{Traverse, TraverseCtx};
use regex::Regex;
use rustc_hash::FxHashMap;

use super::state::DeobfuscateState;

pub type Ctx<'a> = TraverseCtx<'a, DeobfuscateState>;

fn hex_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)^_0x[0-9a-f]+$").unwrap())
}

fn is_hex_identifier(name: &str) -> bool {
    hex_pattern().is_match(name)
}

/// Declaration-context hint table (spec §4.3). Returns `None` for shapes
/// the table doesn't cover, which counts as "leave this name alone" — a
/// hex identifier with an uninferable context is simply not renamed.
fn hint_for_init(init: &Expression<'_>) -> Option<String> {
    Some(match init {
        Expression::ArrayExpression(_) => "array".to_string(),
        Expression::BooleanLiteral(_) => "bool".to_string(),
        Expression::CallExpression(call) => match &call.callee {
            Expression::Identifier(callee) => callee.name.as_str().to_lowercase(),
            Expression::FunctionExpression(_) => "funcValue".to_string(),
            _ => return None,
        },
        Expression::FunctionExpression(_) => "func".to_string(),
        Expression::StaticMemberExpression(member) => member.property.name.as_str().to_string(),
        Expression::ComputedMemberExpression(member) => match &member.expression {
            Expression::StringLiteral(lit) => lit.value.as_str().to_string(),
            Expression::Identifier(ident) => ident.name.as_str().to_string(),
            _ => return None,
        },
        Expression::NewExpression(new_expr) => match &new_expr.callee {
            Expression::Identifier(callee) => callee.name.as_str().to_lowercase(),
            _ => return None,
        },
        Expression::NumericLiteral(_) => "num".to_string(),
        Expression::ObjectExpression(_) => "obj".to_string(),
        Expression::StringLiteral(_) => "str".to_string(),
        Expression::ThisExpression(_) => "self".to_string(),
        _ => return None,
    })
}

#[derive(Default)]
pub struct HexRenameCollector {
    renames: FxHashMap<String, String>,
}

impl HexRenameCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_renames(self) -> FxHashMap<String, String> {
        self.renames
    }

    fn propose(&mut self, old_name: &str, hint: &str, ctx: &mut Ctx<'_>) {
        if self.renames.contains_key(old_name) {
            return;
        }
        let new_name = ctx.state.generate_unique(hint);
        self.renames.insert(old_name.to_string(), new_name);
    }
}

impl<'a> Traverse<'a, DeobfuscateState> for HexRenameCollector {
    fn exit_variable_declarator(&mut self, declarator: &mut VariableDeclarator<'a>, ctx: &mut Ctx<'a>) {
        let BindingPattern::BindingIdentifier(ident) = &declarator.id else { return };
        let name = ident.name.as_str().to_string();
        if !is_hex_identifier(&name) {
            return;
        }
        let Some(init) = &declarator.init else { return };
        let Some(hint) = hint_for_init(init) else { return };
        self.propose(&name, &hint, ctx);
    }

    fn exit_function(&mut self, func: &mut Function<'a>, ctx: &mut Ctx<'a>) {
        if func.r#type == FunctionType::FunctionDeclaration {
            if let Some(id) = &func.id {
                let name = id.name.as_str().to_string();
                if is_hex_identifier(&name) {
                    self.propose(&name, "func", ctx);
                }
            }
        }
        for param in &func.params.items {
            if let BindingPattern::BindingIdentifier(ident) = &param.pattern {
                let name = ident.name.as_str().to_string();
                if is_hex_identifier(&name) {
                    self.propose(&name, "param", ctx);
                }
            }
        }
    }

    fn exit_catch_clause(&mut self, clause: &mut CatchClause<'a>, ctx: &mut Ctx<'a>) {
        let Some(param) = &clause.param else { return };
        let BindingPattern::BindingIdentifier(ident) = &param.pattern else { return };
        let name = ident.name.as_str().to_string();
        if is_hex_identifier(&name) {
            self.propose(&name, "error", ctx);
        }
    }

    fn exit_object_property(&mut self, prop: &mut ObjectProperty<'a>, ctx: &mut Ctx<'a>) {
        if prop.computed {
            return;
        }
        let key_name = match &prop.key {
            PropertyKey::StaticIdentifier(id) => id.name.as_str(),
            PropertyKey::StringLiteral(lit) => lit.value.as_str(),
            _ => return,
        };
        if key_name.starts_with('_') {
            return;
        }
        let Expression::Identifier(value_ident) = &prop.value else { return };
        let value_name = value_ident.name.as_str().to_string();
        if !value_name.starts_with('_') {
            return;
        }
        let key_name = key_name.to_string();
        self.propose(&value_name, &key_name, ctx);
    }

    fn exit_assignment_expression(&mut self, assign: &mut AssignmentExpression<'a>, ctx: &mut Ctx<'a>) {
        let AssignmentTarget::StaticMemberExpression(member) = &assign.left else { return };
        let Expression::Identifier(obj_ident) = &member.object else { return };
        let obj_name = obj_ident.name.as_str().to_string();
        let prop_name = member.property.name.as_str();

        let hint = if prop_name == "name" {
            match &assign.right {
                Expression::StringLiteral(lit) => Some(lit.value.as_str().to_string()),
                _ => None,
            }
        } else if prop_name == "define" {
            Some("lib".to_string())
        } else {
            None
        };
        let Some(hint) = hint else { return };
        self.propose(&obj_name, &hint, ctx);
    }
}
