//! Stage 4 Cleanup (spec §4.4): deletes every node recorded as dead by the
//! earlier stages — decoder definitions, their support/shuffler siblings,
//! confirmed proxy object declarations, and non-empty doubted-proxy
//! declarations plus their assignment origins. Deletion works at
//! statement-list granularity (the nearest enclosing declaration /
//! expression statement), matching every other statement-rewriting pass in
//! this crate.

use oxc_allocator::Vec as ArenaVec;
use oxc_ast::ast::*;
use oxc_span::GetSpan;
use oxc_traverse::{Traverse, TraverseCtx};
use rustc_hash::FxHashSet;

use super::state::DeobfuscateState;

pub type Ctx<'a> = TraverseCtx<'a, DeobfuscateState>;

/// The span of the node a statement should be matched against for
/// deletion: a variable declaration's own span (covers its single
/// declarator after normalization), a function declaration's span, or a
/// bare expression statement's span (covers the doubted-proxy assignment
/// origins, which are assignment-expression statements).
fn statement_identity_span(stmt: &Statement<'_>) -> Option<u32> {
    match stmt {
        Statement::VariableDeclaration(decl) => Some(decl.span.start),
        Statement::FunctionDeclaration(func) => Some(func.span.start),
        Statement::ExpressionStatement(expr_stmt) => Some(expr_stmt.span.start),
        _ => None,
    }
}

fn collect_dead_spans(state: &DeobfuscateState) -> FxHashSet<u32> {
    let mut dead = FxHashSet::default();
    for decoder in state.core.values() {
        dead.insert(decoder.decl_span);
    }
    for span in &state.core_ref_spans {
        dead.insert(*span);
    }
    for proxy in state.proxies.values() {
        dead.insert(proxy.decl_span);
    }
    for doubted in state.doubted.values() {
        if !doubted.properties.is_empty() {
            dead.insert(doubted.decl_span);
            for span in &doubted.assignment_spans {
                dead.insert(*span);
            }
        }
    }
    for span in &state.delete_spans {
        dead.insert(*span);
    }
    dead
}

/// Also matches assignment-expression statements by the span of the
/// *expression* rather than the statement, since `doubted.assignment_spans`
/// records `AssignmentExpression::span` (see `proxy.rs`).
fn statement_matches(stmt: &Statement<'_>, dead: &FxHashSet<u32>) -> bool {
    if let Some(span) = statement_identity_span(stmt) {
        if dead.contains(&span) {
            return true;
        }
    }
    if let Statement::ExpressionStatement(expr_stmt) = stmt {
        if let Expression::AssignmentExpression(assign) = &expr_stmt.expression {
            return dead.contains(&assign.span().start);
        }
    }
    false
}

fn prune_statements_matching<'a>(stmts: &mut ArenaVec<'a, Statement<'a>>, ctx: &mut Ctx<'a>, dead: &FxHashSet<u32>) {
    let original = std::mem::replace(stmts, ctx.ast.vec());
    let mut rebuilt = ctx.ast.vec_with_capacity(original.len());
    for stmt in original {
        if statement_matches(&stmt, dead) {
            continue;
        }
        rebuilt.push(stmt);
    }
    *stmts = rebuilt;
}

pub struct Cleanup {
    dead: FxHashSet<u32>,
}

impl Cleanup {
    pub fn for_state(state: &DeobfuscateState) -> Self {
        Self { dead: collect_dead_spans(state) }
    }
}

impl<'a> Traverse<'a, DeobfuscateState> for Cleanup {
    fn exit_program(&mut self, program: &mut Program<'a>, ctx: &mut Ctx<'a>) {
        prune_statements_matching(&mut program.body, ctx, &self.dead);
    }

    fn exit_block_statement(&mut self, block: &mut BlockStatement<'a>, ctx: &mut Ctx<'a>) {
        prune_statements_matching(&mut block.body, ctx, &self.dead);
    }
}
