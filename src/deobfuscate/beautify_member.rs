//! Member-access and object-property beautification (spec §4.2
//! "Member-access beautification (string literal)" / "Object-property key
//! beautification"). Both rewrite a string-literal key into identifier
//! syntax whenever the string is itself a valid identifier name.

use oxc_ast::ast::*;
use oxc_span::SPAN;
use oxc_traverse::{Traverse, TraverseCtx};

use super::state::DeobfuscateState;

pub type Ctx<'a> = TraverseCtx<'a, DeobfuscateState>;

/// A conservative ASCII identifier check. Obfuscator-produced property
/// names are always plain ASCII, so this does not need to chase full
/// Unicode `ID_Start`/`ID_Continue` tables.
fn is_identifier_name(s: &str) -> bool {
    let mut chars = s.chars();
    let Some(first) = chars.next() else { return false };
    if !(first.is_ascii_alphabetic() || first == '_' || first == '$') {
        return false;
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

/// Any object side the spec allows for the computed->static member rewrite.
fn eligible_object(expr: &Expression<'_>) -> bool {
    matches!(
        expr,
        Expression::Identifier(_)
            | Expression::StaticMemberExpression(_)
            | Expression::ComputedMemberExpression(_)
            | Expression::StringLiteral(_)
            | Expression::ThisExpression(_)
            | Expression::CallExpression(_)
            | Expression::NewExpression(_)
            | Expression::ArrayExpression(_)
            | Expression::ObjectExpression(_)
            | Expression::FunctionExpression(_)
            | Expression::BinaryExpression(_)
    )
}

pub struct MemberBeautifier;

impl MemberBeautifier {
    pub fn new() -> Self {
        Self
    }
}

impl Default for MemberBeautifier {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> Traverse<'a, DeobfuscateState> for MemberBeautifier {
    fn exit_expression(&mut self, expr: &mut Expression<'a>, ctx: &mut Ctx<'a>) {
        let Expression::ComputedMemberExpression(member) = expr else { return };
        let Expression::StringLiteral(key) = &member.expression else { return };
        let name = key.value.as_str();
        if !is_identifier_name(name) || !eligible_object(&member.object) {
            return;
        }

        let object = std::mem::replace(
            &mut member.object,
            Expression::NullLiteral(ctx.ast.alloc(NullLiteral { span: SPAN })),
        );
        let property = IdentifierName { span: SPAN, name: ctx.ast.atom(name) };
        *expr = Expression::StaticMemberExpression(ctx.ast.alloc(StaticMemberExpression {
            span: member.span,
            object,
            property,
            optional: member.optional,
        }));
    }

    fn exit_object_property(&mut self, prop: &mut ObjectProperty<'a>, ctx: &mut Ctx<'a>) {
        if prop.computed {
            return;
        }
        let PropertyKey::StringLiteral(key) = &prop.key else { return };
        let name = key.value.as_str();
        if !is_identifier_name(name) {
            return;
        }
        prop.key = PropertyKey::StaticIdentifier(ctx.ast.alloc(IdentifierName { span: SPAN, name: ctx.ast.atom(name) }));
    }
}

#[cfg(test)]
mod tests {
    use crate::deobfuscate::testing::run_pass;

    use super::MemberBeautifier;

    #[test]
    fn rewrites_computed_member_chain() {
        let out = run_pass("window['console']['log']('hi');", MemberBeautifier::new);
        assert!(out.contains("window.console.log"));
    }

    #[test]
    fn leaves_non_identifier_keys_computed() {
        let out = run_pass("obj['not-an-ident'];", MemberBeautifier::new);
        assert!(out.contains("obj[\"not-an-ident\"]") || out.contains("obj['not-an-ident']"));
    }

    #[test]
    fn rewrites_object_property_key() {
        let out = run_pass("var o = { 'name': 1 };", MemberBeautifier::new);
        assert!(out.contains("name: 1") || out.contains("name:1"));
    }
}
