//! Shared helpers for the Rewriter stage (spec §4.2): converting between
//! literal expressions and the cache's lifetime-free `LiteralValue`, and
//! reading a function's single-return shape for proxy/call inlining.

use oxc_ast::ast::*;
use oxc_span::SPAN;
use oxc_syntax::number::NumberBase;
use oxc_syntax::operator::UnaryOperator;
use oxc_traverse::TraverseCtx;

use super::state::{DeobfuscateState, LiteralValue, ReturnShape};

pub type Ctx<'a> = TraverseCtx<'a, DeobfuscateState>;

pub fn literal_value_of(expr: &Expression<'_>) -> Option<LiteralValue> {
    match expr {
        Expression::StringLiteral(lit) => Some(LiteralValue::String(lit.value.as_str().to_string())),
        Expression::NumericLiteral(lit) => Some(LiteralValue::Number(lit.value)),
        Expression::BooleanLiteral(lit) => Some(LiteralValue::Boolean(lit.value)),
        Expression::NullLiteral(_) => Some(LiteralValue::Null),
        _ => None,
    }
}

/// Canonical decimal text for a folded numeric literal. The spec requires
/// any cached "raw" form (e.g. `0x7b`) to be refreshed to match the
/// decimal value rather than carried over from a source operand.
pub fn format_number(n: f64) -> String {
    if n.is_finite() && n == n.trunc() && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

pub fn literal_expression<'a>(value: &LiteralValue, ctx: &mut Ctx<'a>) -> Expression<'a> {
    match value {
        LiteralValue::String(s) => Expression::StringLiteral(ctx.ast.alloc(StringLiteral {
            span: SPAN,
            value: ctx.ast.atom(s),
            raw: None,
            lone_surrogates: false,
        })),
        LiteralValue::Number(n) => Expression::NumericLiteral(ctx.ast.alloc(NumericLiteral {
            span: SPAN,
            value: *n,
            raw: Some(ctx.ast.atom(&format_number(*n))),
            base: NumberBase::Decimal,
        })),
        LiteralValue::Boolean(b) => {
            Expression::BooleanLiteral(ctx.ast.alloc(BooleanLiteral { span: SPAN, value: *b }))
        }
        LiteralValue::Null => Expression::NullLiteral(ctx.ast.alloc(NullLiteral { span: SPAN })),
    }
}

/// A JS literal rendered as source text, for handing to the host scope.
pub fn literal_source(value: &LiteralValue) -> String {
    match value {
        LiteralValue::String(s) => format!("{s:?}"),
        LiteralValue::Number(n) => format_number(*n),
        LiteralValue::Boolean(b) => b.to_string(),
        LiteralValue::Null => "null".to_string(),
    }
}

/// A bare numeric literal, or a unary negation of one. Per the spec's own
/// "Open Questions" note this guard is asymmetric in the reference
/// (checked only in this shape, not e.g. double-negation) — preserved as
/// observed rather than generalized.
pub fn signed_numeric(expr: &Expression<'_>) -> Option<f64> {
    match expr {
        Expression::NumericLiteral(lit) => Some(lit.value),
        Expression::UnaryExpression(unary) if unary.operator == UnaryOperator::UnaryNegation => {
            if let Expression::NumericLiteral(lit) = &unary.argument {
                Some(-lit.value)
            } else {
                None
            }
        }
        _ => None,
    }
}

/// Read a function's return shape per the function-expression call
/// inlining table (spec §4.2): body is exactly a `return`, optionally
/// preceded by one irrelevant variable declaration. Returns the ordered
/// identifier-parameter names alongside the shape.
pub fn return_shape_of(func: &Function<'_>) -> Option<(Vec<String>, ReturnShape)> {
    let body = func.body.as_ref()?;

    let params: Vec<String> = func
        .params
        .items
        .iter()
        .filter_map(|p| {
            if let BindingPattern::BindingIdentifier(ident) = &p.pattern {
                Some(ident.name.as_str().to_string())
            } else {
                None
            }
        })
        .collect();
    if params.len() != func.params.items.len() {
        return None;
    }

    let ret = match body.statements.len() {
        1 => match &body.statements[0] {
            Statement::ReturnStatement(ret) => ret,
            _ => return None,
        },
        2 if matches!(body.statements[0], Statement::VariableDeclaration(_)) => {
            match &body.statements[1] {
                Statement::ReturnStatement(ret) => ret,
                _ => return None,
            }
        }
        _ => return None,
    };
    let argument = ret.argument.as_ref()?;

    if let Some(lit) = literal_value_of(argument) {
        return Some((params, ReturnShape::Literal(lit)));
    }

    if let Expression::Identifier(ident) = argument {
        let idx = params.iter().position(|p| p == ident.name.as_str())?;
        return Some((params, ReturnShape::ParamIdentity(idx)));
    }

    if let Expression::BinaryExpression(bin) = argument {
        if params.len() != 2 {
            return None;
        }
        let Expression::Identifier(l) = &bin.left else { return None };
        let Expression::Identifier(r) = &bin.right else { return None };
        if l.name.as_str() == params[0] && r.name.as_str() == params[1] {
            return Some((params, ReturnShape::BinaryOp(bin.operator)));
        }
        return None;
    }

    if let Expression::CallExpression(call) = argument {
        if let Expression::Identifier(callee) = &call.callee {
            let idx = params.iter().position(|p| p == callee.name.as_str())?;
            return Some((params, ReturnShape::ParamCall(idx)));
        }
        if let Expression::StaticMemberExpression(member) = &call.callee {
            if let Expression::Identifier(obj) = &member.object {
                return Some((
                    params,
                    ReturnShape::MemberCall {
                        obj: obj.name.as_str().to_string(),
                        method: member.property.name.as_str().to_string(),
                    },
                ));
            }
        }
        return None;
    }

    None
}
