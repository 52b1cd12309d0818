//! Constant folding for binary and unary expressions (spec §4.2 "Constant
//! folding (binary expression)" / "Unary folding"). Binary folds go through
//! the host scope so the arithmetic/coercion rules match the obfuscated
//! program's own runtime exactly; unary folds are small enough to evaluate
//! directly against the cached `LiteralValue`.

use oxc_ast::ast::*;
use oxc_syntax::operator::{BinaryOperator, UnaryOperator};
use oxc_traverse::{Traverse, TraverseCtx};

use crate::sandbox::HostScope;

use super::state::{DeobfuscateState, LiteralValue};
use super::support::{literal_expression, literal_source, literal_value_of, signed_numeric};

pub type Ctx<'a> = TraverseCtx<'a, DeobfuscateState>;

fn is_foldable_pair_op(op: BinaryOperator) -> bool {
    matches!(
        op,
        BinaryOperator::Addition
            | BinaryOperator::Subtraction
            | BinaryOperator::Multiplication
            | BinaryOperator::Division
            | BinaryOperator::StrictEquality
            | BinaryOperator::StrictInequality
    )
}

fn is_numeric_only_op(op: BinaryOperator) -> bool {
    matches!(
        op,
        BinaryOperator::Addition
            | BinaryOperator::Subtraction
            | BinaryOperator::Multiplication
            | BinaryOperator::Division
    )
}

fn same_kind(a: &LiteralValue, b: &LiteralValue) -> bool {
    matches!(
        (a, b),
        (LiteralValue::String(_), LiteralValue::String(_))
            | (LiteralValue::Number(_), LiteralValue::Number(_))
            | (LiteralValue::Boolean(_), LiteralValue::Boolean(_))
            | (LiteralValue::Null, LiteralValue::Null)
    )
}

fn op_text(op: BinaryOperator) -> &'static str {
    match op {
        BinaryOperator::Addition => "+",
        BinaryOperator::Subtraction => "-",
        BinaryOperator::Multiplication => "*",
        BinaryOperator::Division => "/",
        BinaryOperator::StrictEquality => "===",
        BinaryOperator::StrictInequality => "!==",
        _ => unreachable!("guarded by is_foldable_pair_op"),
    }
}

/// Evaluate `a <op> b` in the host scope and coerce the result back to a
/// cache-level literal.
fn eval_binary(host: &mut HostScope, lhs: &str, op: BinaryOperator, rhs: &str) -> Option<LiteralValue> {
    let expr = format!("({lhs}) {} ({rhs})", op_text(op));
    match host.eval_expr(&expr) {
        Ok(value) => Some(LiteralValue::from(value)),
        Err(err) => {
            tracing::warn!(expr, error = %err, "constant-fold evaluation failed, leaving expression unchanged");
            None
        }
    }
}

/// A numeric operand for `+ - * /` folding, widened beyond `signed_numeric`
/// to also accept a bare boolean literal (JS coerces `true`/`false` to
/// `1`/`0` in arithmetic position, e.g. `2 + true === 3`). This only
/// affects the mixed-kind fallback below; same-kind boolean pairs already
/// fold through `eval_binary` via the `same_kind` arm.
fn arithmetic_operand(expr: &Expression<'_>) -> Option<f64> {
    if let Some(n) = signed_numeric(expr) {
        return Some(n);
    }
    match expr {
        Expression::BooleanLiteral(lit) => Some(if lit.value { 1.0 } else { 0.0 }),
        _ => None,
    }
}

fn fold_unary_not(arg: &Expression<'_>) -> Option<bool> {
    match arg {
        Expression::NumericLiteral(lit) => Some(lit.value == 0.0),
        Expression::StringLiteral(lit) => Some(lit.value.is_empty()),
        Expression::BooleanLiteral(lit) => Some(!lit.value),
        Expression::ArrayExpression(arr) if arr.elements.is_empty() => Some(false),
        Expression::ObjectExpression(obj) if obj.properties.is_empty() => Some(false),
        Expression::Identifier(ident) if ident.name.as_str() == "undefined" => Some(true),
        _ => None,
    }
}

/// Applies the Rewriter's constant-folding arms on exit of every binary and
/// unary expression node.
pub struct ConstantFolder<'h> {
    host: &'h mut HostScope,
}

impl<'h> ConstantFolder<'h> {
    pub fn new(host: &'h mut HostScope) -> Self {
        Self { host }
    }
}

impl<'h, 'a> Traverse<'a, DeobfuscateState> for ConstantFolder<'h> {
    fn exit_expression(&mut self, expr: &mut Expression<'a>, ctx: &mut Ctx<'a>) {
        match expr {
            Expression::BinaryExpression(bin) => {
                let op = bin.operator;
                if !is_foldable_pair_op(op) {
                    return;
                }

                let left_lit = literal_value_of(&bin.left);
                let right_lit = literal_value_of(&bin.right);
                let same_kind_pair = matches!((&left_lit, &right_lit), (Some(l), Some(r)) if same_kind(l, r));
                let folded = if same_kind_pair {
                    let l = left_lit.as_ref().expect("same_kind_pair implies Some");
                    let r = right_lit.as_ref().expect("same_kind_pair implies Some");
                    let lhs = literal_source(l);
                    let rhs = literal_source(r);
                    eval_binary(self.host, &lhs, op, &rhs)
                } else if is_numeric_only_op(op) {
                    match (arithmetic_operand(&bin.left), arithmetic_operand(&bin.right)) {
                        (Some(l), Some(r)) => {
                            eval_binary(self.host, &super::support::format_number(l), op, &super::support::format_number(r))
                        }
                        _ => None,
                    }
                } else {
                    None
                };

                if let Some(value) = folded {
                    *expr = literal_expression(&value, ctx);
                }
            }
            Expression::UnaryExpression(unary) => match unary.operator {
                UnaryOperator::LogicalNot => {
                    if let Some(result) = fold_unary_not(&unary.argument) {
                        *expr = literal_expression(&LiteralValue::Boolean(result), ctx);
                    }
                }
                UnaryOperator::UnaryPlus => {
                    if let Expression::NumericLiteral(lit) = &unary.argument {
                        *expr = literal_expression(&LiteralValue::Number(lit.value), ctx);
                    }
                }
                _ => {}
            },
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::deobfuscate::testing::run_pass;
    use crate::sandbox::HostScope;

    use super::ConstantFolder;

    #[test]
    fn folds_numeric_addition() {
        let mut host = HostScope::new();
        let out = run_pass("var x = 123 + 456;", || ConstantFolder::new(&mut host));
        assert!(out.contains("579"));
    }

    #[test]
    fn folds_negated_operand_subtraction() {
        let mut host = HostScope::new();
        let out = run_pass("var x = 10 - -5;", || ConstantFolder::new(&mut host));
        assert!(out.contains("15"));
    }

    #[test]
    fn folds_strict_equality_on_strings() {
        let mut host = HostScope::new();
        let out = run_pass("var x = 'a' === 'a';", || ConstantFolder::new(&mut host));
        assert!(out.contains("true"));
    }

    #[test]
    fn leaves_mismatched_kinds_alone() {
        let mut host = HostScope::new();
        let out = run_pass("var x = 'a' === 1;", || ConstantFolder::new(&mut host));
        assert!(out.contains("'a' === 1") || out.contains("\"a\" === 1"));
    }

    #[test]
    fn folds_unary_not_variants() {
        let mut host = HostScope::new();
        let out = run_pass("var x = !0; var y = !''; var z = !false;", || ConstantFolder::new(&mut host));
        assert_eq!(out.matches("true").count(), 3);
    }

    #[test]
    fn folds_numeric_and_boolean_mix() {
        let mut host = HostScope::new();
        let out = run_pass("var x = 2 + true;", || ConstantFolder::new(&mut host));
        assert!(out.contains('3'));
    }

    #[test]
    fn folds_unary_not_chain_through_mixed_kinds() {
        let mut host = HostScope::new();
        let out = run_pass("var x = !0 + !'' + !false;", || ConstantFolder::new(&mut host));
        assert!(out.contains('3'));
    }

    #[test]
    fn folds_unary_plus_numeric() {
        let mut host = HostScope::new();
        let out = run_pass("var x = +42;", || ConstantFolder::new(&mut host));
        assert!(out.contains("42"));
        assert!(!out.contains('+'));
    }
}
