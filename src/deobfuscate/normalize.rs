//! Stage 1 pre-normalization (spec §4.1): sequence flattening and
//! multi-declarator splitting. Both rewrite one statement into several
//! sibling statements, so this runs over every statement list in the
//! program (the program body and every block body) rather than as a
//! single-node visitor arm.

use oxc_allocator::Vec as ArenaVec;
use oxc_ast::ast::*;
use oxc_span::GetSpan;
use oxc_traverse::{Traverse, TraverseCtx};

use super::state::DeobfuscateState;

pub type Ctx<'a> = TraverseCtx<'a, DeobfuscateState>;

pub struct Normalizer;

impl Normalizer {
    pub fn new() -> Self {
        Self
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> Traverse<'a, DeobfuscateState> for Normalizer {
    fn exit_program(&mut self, program: &mut Program<'a>, ctx: &mut Ctx<'a>) {
        normalize_statements(&mut program.body, ctx);
    }

    fn exit_block_statement(&mut self, block: &mut BlockStatement<'a>, ctx: &mut Ctx<'a>) {
        normalize_statements(&mut block.body, ctx);
    }
}

fn normalize_statements<'a>(stmts: &mut ArenaVec<'a, Statement<'a>>, ctx: &mut Ctx<'a>) {
    let original = std::mem::replace(stmts, ctx.ast.vec());
    let mut rebuilt = ctx.ast.vec_with_capacity(original.len());

    for stmt in original {
        match stmt {
            // A sequence expression that is the *whole* of an expression
            // statement becomes one expression statement per sub-expression.
            // Sequences nested anywhere else (e.g. inside a call argument)
            // are left untouched here.
            Statement::ExpressionStatement(expr_stmt)
                if matches!(expr_stmt.expression, Expression::SequenceExpression(_)) =>
            {
                let expr_stmt = expr_stmt.unbox();
                let Expression::SequenceExpression(seq) = expr_stmt.expression else {
                    unreachable!()
                };
                let seq = seq.unbox();
                for expr in seq.expressions {
                    let span = expr.span();
                    rebuilt.push(Statement::ExpressionStatement(
                        ctx.ast.alloc(ExpressionStatement { span, expression: expr }),
                    ));
                }
            }
            // `var a, b, c;` -> three sibling single-declarator statements,
            // so later passes can delete individual declarators by
            // statement removal.
            Statement::VariableDeclaration(decl) if decl.declarations.len() > 1 => {
                let decl = decl.unbox();
                let kind = decl.kind;
                let span = decl.span;
                for declarator in decl.declarations {
                    let mut single = ctx.ast.vec_with_capacity(1);
                    single.push(declarator);
                    rebuilt.push(Statement::VariableDeclaration(ctx.ast.alloc(
                        VariableDeclaration {
                            span,
                            kind,
                            declarations: single,
                            declare: false,
                        },
                    )));
                }
            }
            other => rebuilt.push(other),
        }
    }

    *stmts = rebuilt;
}

#[cfg(test)]
mod tests {
    use crate::deobfuscate::testing::run_pass;

    use super::Normalizer;

    #[test]
    fn splits_top_level_sequence_expression() {
        let out = run_pass("a(), b(), c();", Normalizer::new);
        assert!(out.contains("a();"));
        assert!(out.contains("b();"));
        assert!(out.contains("c();"));
    }

    #[test]
    fn leaves_non_top_level_sequence_alone() {
        let out = run_pass("f((a(), b()));", Normalizer::new);
        assert!(out.contains("a(), b()") || out.contains("a(),b()"));
    }

    #[test]
    fn splits_multi_declarator() {
        let out = run_pass("var a = 1, b = 2, c = 3;", Normalizer::new);
        assert!(out.contains("var a = 1;") || out.contains("var a=1;"));
        assert!(out.contains("var b = 2;") || out.contains("var b=2;"));
        assert!(out.contains("var c = 3;") || out.contains("var c=3;"));
    }
}
