//! Proxy-object detection/update and proxy-dispatch replacement
//! (spec §4.2 "Proxy-object detection and update" / "Proxy dispatch
//! replacement"). Two independent `Traverse` passes sharing the cache:
//! `ProxyCollector` builds `proxies`/`doubted` from object-expression and
//! assignment-expression shapes; `ProxyInliner` consumes them at member and
//! call sites.

use oxc_allocator::CloneIn;
use oxc_ast::ast::*;
use oxc_span::{GetSpan, SPAN};
use oxc_traverse::{Traverse, TraverseCtx};

use super::function_inline::inline_call;
use super::state::{DeobfuscateState, DoubtedProxy, Proxy, PropertyValue};
use super::support::{literal_expression, literal_value_of, return_shape_of};

pub type Ctx<'a> = TraverseCtx<'a, DeobfuscateState>;

fn string_literal_value(expr: &Expression<'_>) -> Option<String> {
    if let Expression::StringLiteral(lit) = expr {
        Some(lit.value.as_str().to_string())
    } else {
        None
    }
}

/// A property key valid for a proxy: a non-computed string literal or
/// identifier. The 5-character check is applied by callers since confirmed
/// vs. doubted proxies check it at different points.
fn property_key_text(prop: &ObjectProperty<'_>) -> Option<String> {
    if prop.computed {
        return None;
    }
    match &prop.key {
        PropertyKey::StaticIdentifier(id) => Some(id.name.as_str().to_string()),
        PropertyKey::StringLiteral(lit) => Some(lit.value.as_str().to_string()),
        _ => None,
    }
}

fn property_value(value: &Expression<'_>) -> Option<PropertyValue> {
    if let Some(lit) = literal_value_of(value) {
        return Some(PropertyValue::Literal(lit));
    }
    if let Expression::Identifier(ident) = value {
        return Some(PropertyValue::Identifier(ident.name.as_str().to_string()));
    }
    if let Expression::FunctionExpression(func) = value {
        return Some(match return_shape_of(func) {
            Some((params, shape)) => PropertyValue::Function { params, shape: Some(shape) },
            None => PropertyValue::Function { params: Vec::new(), shape: None },
        });
    }
    None
}

/// Builds `proxyPaths` / `doubtedProxyPathInfos` (spec §3, §4.2).
pub struct ProxyCollector;

impl ProxyCollector {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ProxyCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> Traverse<'a, DeobfuscateState> for ProxyCollector {
    // Hooked on the declaration rather than the declarator so `decl_span`
    // can record the whole statement's span (covering the `var`/`let`/
    // `const` keyword) — that's the granularity `cleanup.rs` deletes at.
    // Normalization (`normalize.rs`) has already split multi-declarator
    // statements by the time the Rewriter runs, so there is exactly one
    // declarator here.
    fn exit_variable_declaration(&mut self, decl: &mut VariableDeclaration<'a>, ctx: &mut Ctx<'a>) {
        if decl.declarations.len() != 1 {
            return;
        }
        let declarator = &decl.declarations[0];
        let Some(Expression::ObjectExpression(obj)) = &declarator.init else { return };
        let BindingPattern::BindingIdentifier(ident) = &declarator.id else { return };
        let name = ident.name.as_str().to_string();
        if ctx.state.is_known_name(&name) {
            return;
        }
        let decl_span = decl.span().start;

        if obj.properties.is_empty() {
            ctx.state.doubted.insert(
                name,
                DoubtedProxy {
                    decl_span,
                    first_key_len: 0,
                    properties: Vec::new(),
                    assignment_spans: Vec::new(),
                },
            );
            return;
        }

        let mut keys = Vec::with_capacity(obj.properties.len());
        for prop_kind in &obj.properties {
            let ObjectPropertyKind::ObjectProperty(prop) = prop_kind else { return };
            let Some(key) = property_key_text(prop) else { return };
            if key.len() != 5 {
                return;
            }
            keys.push((key, prop));
        }
        let len = keys[0].0.len();
        if keys.iter().any(|(k, _)| k.len() != len) {
            return;
        }

        let mut properties = Vec::with_capacity(keys.len());
        for (key, prop) in keys {
            let Some(value) = property_value(&prop.value) else { return };
            properties.push((key, value));
        }

        ctx.state.proxies.insert(name, Proxy { decl_span, properties });
    }

    fn exit_assignment_expression(&mut self, assign: &mut AssignmentExpression<'a>, ctx: &mut Ctx<'a>) {
        let AssignmentTarget::ComputedMemberExpression(member) = &assign.left else { return };
        let Expression::Identifier(obj_ident) = &member.object else { return };
        let obj_name = obj_ident.name.as_str().to_string();

        if !ctx.state.doubted.contains_key(&obj_name) {
            return;
        }
        let Some(key) = string_literal_value(&member.expression) else {
            ctx.state.doubted.remove(&obj_name);
            return;
        };

        let first_len = ctx.state.doubted.get(&obj_name).unwrap().first_key_len;
        let expected = if first_len == 0 { 5 } else { first_len };
        if key.len() != 5 || key.len() != expected {
            ctx.state.doubted.remove(&obj_name);
            return;
        }

        let Some(value) = property_value(&assign.right) else {
            ctx.state.doubted.remove(&obj_name);
            return;
        };

        let assign_span = assign.span().start;
        let doubted = ctx.state.doubted.get_mut(&obj_name).unwrap();
        doubted.first_key_len = key.len();
        doubted.properties.push((key, value));
        doubted.assignment_spans.push(assign_span);
    }
}

/// Consumes `proxyPaths` / `doubtedProxyPathInfos` at member and call sites
/// (spec §4.2 "Proxy dispatch replacement").
pub struct ProxyInliner;

impl ProxyInliner {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ProxyInliner {
    fn default() -> Self {
        Self::new()
    }
}

/// `obj.prop` or `obj["prop"]`, as (object name, property name), for any
/// member-shaped expression whose object is a plain identifier.
fn member_parts(expr: &Expression<'_>) -> Option<(String, String)> {
    match expr {
        Expression::StaticMemberExpression(m) => {
            let Expression::Identifier(o) = &m.object else { return None };
            Some((o.name.as_str().to_string(), m.property.name.as_str().to_string()))
        }
        Expression::ComputedMemberExpression(m) => {
            let Expression::Identifier(o) = &m.object else { return None };
            let key = string_literal_value(&m.expression)?;
            Some((o.name.as_str().to_string(), key))
        }
        _ => None,
    }
}

impl<'a> Traverse<'a, DeobfuscateState> for ProxyInliner {
    fn exit_expression(&mut self, expr: &mut Expression<'a>, ctx: &mut Ctx<'a>) {
        if let Expression::CallExpression(call) = expr {
            let Some((obj, prop)) = member_parts(&call.callee) else { return };
            if !ctx.state.is_valid_proxy(&obj) {
                return;
            }
            let Some(value) = ctx.state.lookup_property(&obj, &prop).cloned() else { return };
            match &value {
                PropertyValue::Literal(lit) => {
                    *expr = literal_expression(lit, ctx);
                }
                PropertyValue::Function { params, shape: Some(shape) } => {
                    let mut args = Vec::with_capacity(call.arguments.len());
                    for a in &call.arguments {
                        let Some(e) = a.as_expression() else { return };
                        args.push(e.clone_in(ctx.ast.allocator));
                    }
                    if let Some(replacement) = inline_call(shape, params, &args, ctx) {
                        *expr = replacement;
                    }
                }
                _ => {}
            }
            return;
        }

        let Some((obj, prop)) = member_parts(expr) else { return };
        if !ctx.state.is_valid_proxy(&obj) {
            return;
        }
        let Some(value) = ctx.state.lookup_property(&obj, &prop) else { return };
        match value {
            PropertyValue::Literal(lit) => {
                let lit = lit.clone();
                *expr = literal_expression(&lit, ctx);
            }
            PropertyValue::Identifier(name) => {
                let name = name.clone();
                *expr = Expression::Identifier(ctx.ast.alloc(IdentifierReference {
                    span: SPAN,
                    name: ctx.ast.atom(&name),
                    reference_id: Default::default(),
                }));
            }
            PropertyValue::Function { .. } => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::deobfuscate::testing::run_two_passes;

    use super::{ProxyCollector, ProxyInliner};

    #[test]
    fn collapses_confirmed_proxy_reads() {
        let out = run_two_passes(
            "var p = {aaaaa: 1, bbbbb: 2}; f(p.aaaaa, p['bbbbb']);",
            ProxyCollector::new,
            |_| ProxyInliner::new(),
        );
        assert!(out.contains("f(1, 2)") || out.contains("f(1,2)"));
    }

    #[test]
    fn collapses_doubted_proxy_after_assignment() {
        let out = run_two_passes(
            "var p = {}; p['aaaaa'] = 1; f(p.aaaaa);",
            ProxyCollector::new,
            |_| ProxyInliner::new(),
        );
        assert!(out.contains("f(1)"));
    }

    #[test]
    fn invalidates_doubted_proxy_on_wrong_length() {
        let out = run_two_passes(
            "var p = {}; p['aaaaa'] = 1; p['b'] = 2; f(p.aaaaa);",
            ProxyCollector::new,
            |_| ProxyInliner::new(),
        );
        assert!(out.contains("p.aaaaa"));
    }
}
