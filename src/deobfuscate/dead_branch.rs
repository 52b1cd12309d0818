//! Dead-branch elimination (spec §4.2 "Conditional/if dead branch"): a
//! boolean-literal test on a conditional expression or `if` statement
//! collapses to the taken side. `else if` chains are preserved because the
//! alternate of an `if` is itself a `Statement::IfStatement` node we can
//! move up wholesale. Per spec, a taken branch that is itself a block is
//! replaced with "the branch's body" — its statements are spliced directly
//! into the enclosing statement list rather than kept wrapped in a
//! `BlockStatement`, so collapsing `if (true) { a(); }` doesn't introduce a
//! block scope the source never had. This requires rewriting at the
//! enclosing statement-list level (one `if` can expand to zero, one, or
//! several sibling statements), the same shape `normalize.rs` uses for
//! sequence/multi-declarator splitting.

use oxc_allocator::{CloneIn, Vec as ArenaVec};
use oxc_ast::ast::*;
use oxc_traverse::{Traverse, TraverseCtx};

use super::state::DeobfuscateState;

pub type Ctx<'a> = TraverseCtx<'a, DeobfuscateState>;

fn bool_test(expr: &Expression<'_>) -> Option<bool> {
    if let Expression::BooleanLiteral(lit) = expr {
        Some(lit.value)
    } else {
        None
    }
}

pub struct DeadBranchEliminator;

impl DeadBranchEliminator {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DeadBranchEliminator {
    fn default() -> Self {
        Self::new()
    }
}

/// Push `stmt` onto `out`, collapsing it first if it is an `if` with a
/// boolean-literal test: a block-shaped taken branch is spliced statement
/// by statement, a non-block taken branch (including an `else if` chain)
/// is pushed as the one replacement statement, and a false test with no
/// alternate drops the statement entirely.
fn collapse_dead_if<'a>(stmt: Statement<'a>, ctx: &mut Ctx<'a>, out: &mut ArenaVec<'a, Statement<'a>>) {
    let Statement::IfStatement(if_stmt) = &stmt else {
        out.push(stmt);
        return;
    };
    let Some(taken) = bool_test(&if_stmt.test) else {
        out.push(stmt);
        return;
    };
    let branch = if taken { Some(&if_stmt.consequent) } else { if_stmt.alternate.as_ref() };
    match branch {
        Some(Statement::BlockStatement(block)) => {
            for inner in &block.body {
                out.push(inner.clone_in(ctx.ast.allocator));
            }
        }
        Some(other) => out.push(other.clone_in(ctx.ast.allocator)),
        None => {}
    }
}

fn collapse_statements<'a>(stmts: &mut ArenaVec<'a, Statement<'a>>, ctx: &mut Ctx<'a>) {
    let original = std::mem::replace(stmts, ctx.ast.vec());
    let mut rebuilt = ctx.ast.vec_with_capacity(original.len());
    for stmt in original {
        collapse_dead_if(stmt, ctx, &mut rebuilt);
    }
    *stmts = rebuilt;
}

impl<'a> Traverse<'a, DeobfuscateState> for DeadBranchEliminator {
    fn exit_expression(&mut self, expr: &mut Expression<'a>, ctx: &mut Ctx<'a>) {
        let Expression::ConditionalExpression(cond) = expr else { return };
        let Some(taken) = bool_test(&cond.test) else { return };
        *expr = if taken {
            cond.consequent.clone_in(ctx.ast.allocator)
        } else {
            cond.alternate.clone_in(ctx.ast.allocator)
        };
    }

    fn exit_program(&mut self, program: &mut Program<'a>, ctx: &mut Ctx<'a>) {
        collapse_statements(&mut program.body, ctx);
    }

    fn exit_block_statement(&mut self, block: &mut BlockStatement<'a>, ctx: &mut Ctx<'a>) {
        collapse_statements(&mut block.body, ctx);
    }
}

#[cfg(test)]
mod tests {
    use crate::deobfuscate::testing::run_pass;

    use super::DeadBranchEliminator;

    #[test]
    fn takes_consequent_on_true() {
        let out = run_pass("if (true) { a(); } else { b(); }", DeadBranchEliminator::new);
        assert!(out.contains("a()"));
        assert!(!out.contains("b()"));
    }

    #[test]
    fn splices_block_body_without_wrapping_braces() {
        let out = run_pass("if (true) { a(); } d();", DeadBranchEliminator::new);
        assert!(!out.contains('{'));
        assert!(out.contains("a();"));
        assert!(out.contains("d();"));
    }

    #[test]
    fn splices_multi_statement_block_body_in_order() {
        let out = run_pass("if (true) { a(); b(); } c();", DeadBranchEliminator::new);
        let pos_a = out.find("a()").expect("a() present");
        let pos_b = out.find("b()").expect("b() present");
        let pos_c = out.find("c()").expect("c() present");
        assert!(pos_a < pos_b);
        assert!(pos_b < pos_c);
        assert!(!out.contains('{'));
    }

    #[test]
    fn takes_alternate_on_false() {
        let out = run_pass("if (false) { a(); } else { b(); }", DeadBranchEliminator::new);
        assert!(out.contains("b()"));
        assert!(!out.contains("a()"));
    }

    #[test]
    fn drops_statement_with_no_alternate_on_false() {
        let out = run_pass("if (false) { a(); } c();", DeadBranchEliminator::new);
        assert!(!out.contains("a()"));
        assert!(out.contains("c()"));
    }

    #[test]
    fn preserves_else_if_chain_when_taken() {
        let out = run_pass(
            "if (false) { a(); } else if (cond) { b(); } else { c(); }",
            DeadBranchEliminator::new,
        );
        assert!(out.contains("if"));
        assert!(out.contains("b()"));
        assert!(out.contains("c()"));
        assert!(!out.contains("a()"));
    }

    #[test]
    fn folds_conditional_expression() {
        let out = run_pass("var x = true ? 1 : 2;", DeadBranchEliminator::new);
        assert!(out.contains('1'));
        assert!(!out.contains('2'));
    }
}
