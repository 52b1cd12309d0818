//! Function-expression call inlining (spec §4.2, the return-shape table)
//! and the "self-generated artifact fix": a call whose callee is a function
//! expression with a single-return body is always eligible for this
//! inlining, regardless of whether it arrived there from source or from an
//! earlier rewrite in this same pipeline run.
//!
//! The replacement logic (`inline_call`) is shared with `proxy.rs`, which
//! inlines the same shape when it's reached through a proxy property
//! rather than a direct IIFE.

use oxc_allocator::CloneIn;
use oxc_ast::ast::*;
use oxc_span::SPAN;
use oxc_traverse::{Traverse, TraverseCtx};

use super::state::{DeobfuscateState, ReturnShape};
use super::support::return_shape_of;

pub type Ctx<'a> = TraverseCtx<'a, DeobfuscateState>;

/// Build the replacement expression for a call to a function whose return
/// shape is `shape` (over `params`), given the call's actual argument
/// expressions. Returns `None` when the call doesn't have the right arity
/// for the shape, which counts as "leave the call alone" upstream.
pub fn inline_call<'a>(
    shape: &ReturnShape,
    params: &[String],
    args: &[Expression<'a>],
    ctx: &mut Ctx<'a>,
) -> Option<Expression<'a>> {
    if args.len() != params.len() {
        return None;
    }
    match shape {
        ReturnShape::BinaryOp(op) => {
            if args.len() != 2 {
                return None;
            }
            Some(Expression::BinaryExpression(ctx.ast.alloc(BinaryExpression {
                span: SPAN,
                left: args[0].clone_in(ctx.ast.allocator),
                operator: *op,
                right: args[1].clone_in(ctx.ast.allocator),
            })))
        }
        ReturnShape::ParamIdentity(idx) => args.get(*idx).map(|a| a.clone_in(ctx.ast.allocator)),
        ReturnShape::Literal(value) => Some(super::support::literal_expression(value, ctx)),
        ReturnShape::ParamCall(idx) => {
            let callee = args.get(*idx)?.clone_in(ctx.ast.allocator);
            let mut arguments = ctx.ast.vec_with_capacity(args.len().saturating_sub(1));
            for (i, a) in args.iter().enumerate() {
                if i != *idx {
                    arguments.push(Argument::from(a.clone_in(ctx.ast.allocator)));
                }
            }
            Some(Expression::CallExpression(ctx.ast.alloc(CallExpression {
                span: SPAN,
                callee,
                arguments,
                optional: false,
                type_arguments: None,
                pure: false,
            })))
        }
        ReturnShape::MemberCall { obj, method } => {
            let object = Expression::Identifier(ctx.ast.alloc(IdentifierReference {
                span: SPAN,
                name: ctx.ast.atom(obj),
                reference_id: Default::default(),
            }));
            let callee = Expression::StaticMemberExpression(ctx.ast.alloc(StaticMemberExpression {
                span: SPAN,
                object,
                property: IdentifierName { span: SPAN, name: ctx.ast.atom(method) },
                optional: false,
            }));
            let mut arguments = ctx.ast.vec_with_capacity(args.len());
            for a in args {
                arguments.push(Argument::from(a.clone_in(ctx.ast.allocator)));
            }
            Some(Expression::CallExpression(ctx.ast.alloc(CallExpression {
                span: SPAN,
                callee,
                arguments,
                optional: false,
                type_arguments: None,
                pure: false,
            })))
        }
    }
}

/// Collect a call's argument expressions; bails (returns `None`) if any
/// argument is a spread, matching the "leave alone on unexpected shape"
/// error-handling policy (spec §7).
fn call_arguments<'a>(call: &CallExpression<'a>, ctx: &mut Ctx<'a>) -> Option<Vec<Expression<'a>>> {
    let mut out = Vec::with_capacity(call.arguments.len());
    for arg in &call.arguments {
        out.push(arg.as_expression()?.clone_in(ctx.ast.allocator));
    }
    Some(out)
}

/// Stage 2 arm: a call whose callee is a function expression (an IIFE, or
/// one produced by an earlier rewrite) with a single-return body is
/// unconditionally eligible for inlining.
pub struct FunctionInliner;

impl FunctionInliner {
    pub fn new() -> Self {
        Self
    }
}

impl Default for FunctionInliner {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> Traverse<'a, DeobfuscateState> for FunctionInliner {
    fn exit_expression(&mut self, expr: &mut Expression<'a>, ctx: &mut Ctx<'a>) {
        let Expression::CallExpression(call) = expr else { return };
        let Expression::FunctionExpression(func) = &call.callee else { return };
        let Some((params, shape)) = return_shape_of(func) else { return };
        let Some(args) = call_arguments(call, ctx) else { return };
        if let Some(replacement) = inline_call(&shape, &params, &args, ctx) {
            *expr = replacement;
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::deobfuscate::testing::run_pass;

    use super::FunctionInliner;

    #[test]
    fn inlines_binary_op_iife() {
        let out = run_pass("var x = (function(a, b) { return a + b; })(1, 2);", FunctionInliner::new);
        assert!(out.contains("1 + 2") || out.contains("1+2"));
    }

    #[test]
    fn inlines_param_identity_iife() {
        let out = run_pass("var x = (function(a) { return a; })(42);", FunctionInliner::new);
        assert!(out.contains("42"));
        assert!(!out.contains("function"));
    }

    #[test]
    fn leaves_multi_statement_body_alone() {
        let source = "var x = (function(a) { var t = a; return t + 1; })(1);";
        let out = run_pass(source, FunctionInliner::new);
        assert!(out.contains("function"));
    }
}
