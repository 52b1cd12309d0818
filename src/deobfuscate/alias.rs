//! Identifier alias removal and dead-variable pruning (spec §4.2). Both
//! arms reason about a declarator's bindings without a reusable long-lived
//! `Binding` handle, so each is backed by a small read-only
//! [`oxc_ast_visit::Visit`] sweep over the whole program: `AliasCollector`
//! notices `let x = y;` where `y` already names a decoder or proxy, and
//! `count_references`/`count_violations` answer the "zero references and
//! zero constant violations" test for dead-variable pruning.

use oxc_allocator::Vec as ArenaVec;
use oxc_ast::ast::*;
use oxc_ast_visit::Visit;
use oxc_traverse::{Traverse, TraverseCtx};
use rustc_hash::FxHashMap;

use super::state::DeobfuscateState;

pub type Ctx<'a> = TraverseCtx<'a, DeobfuscateState>;

/// Counts, for every identifier name appearing anywhere in the program: how
/// many times it is *read* (`IdentifierReference`) and how many times it is
/// the target of a plain assignment (a constant violation).
#[derive(Default)]
struct Occurrences {
    reads: FxHashMap<String, usize>,
    violations: FxHashMap<String, usize>,
}

impl<'a> Visit<'a> for Occurrences {
    fn visit_identifier_reference(&mut self, ident: &IdentifierReference<'a>) {
        *self.reads.entry(ident.name.as_str().to_string()).or_insert(0) += 1;
    }

    fn visit_assignment_expression(&mut self, expr: &AssignmentExpression<'a>) {
        if let AssignmentTarget::AssignmentTargetIdentifier(ident) = &expr.left {
            *self.violations.entry(ident.name.as_str().to_string()).or_insert(0) += 1;
        }
        self.visit_assignment_target(&expr.left);
        self.visit_expression(&expr.right);
    }

    fn visit_update_expression(&mut self, expr: &UpdateExpression<'a>) {
        if let SimpleAssignmentTarget::AssignmentTargetIdentifier(ident) = &expr.argument {
            *self.violations.entry(ident.name.as_str().to_string()).or_insert(0) += 1;
        }
    }
}

/// Collects `let x = y;` aliases to a known decoder/proxy name and removes
/// the declarator in the same pass. Renaming every other reference of `x`
/// to `y` is deferred to a following `rename::IdentifierRenamer` pass fed
/// with the map this struct accumulates (mirrors the collector/inliner
/// split used by `proxy.rs` and `decoder_invoke.rs`).
#[derive(Default)]
pub struct AliasCollector {
    aliases: FxHashMap<String, String>,
}

impl AliasCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_aliases(self) -> FxHashMap<String, String> {
        self.aliases
    }
}

fn single_alias_target(stmt: &Statement<'_>, ctx: &Ctx<'_>) -> Option<(String, String)> {
    let Statement::VariableDeclaration(decl) = stmt else { return None };
    if decl.declarations.len() != 1 {
        return None;
    }
    let declarator = &decl.declarations[0];
    let BindingPattern::BindingIdentifier(alias_ident) = &declarator.id else { return None };
    let Some(Expression::Identifier(target)) = &declarator.init else { return None };
    if !ctx.state.is_known_name(target.name.as_str()) {
        return None;
    }
    Some((alias_ident.name.as_str().to_string(), target.name.as_str().to_string()))
}

fn scan_for_aliases<'a>(stmts: &mut ArenaVec<'a, Statement<'a>>, ctx: &mut Ctx<'a>, aliases: &mut FxHashMap<String, String>) {
    let original = std::mem::replace(stmts, ctx.ast.vec());
    let mut rebuilt = ctx.ast.vec_with_capacity(original.len());
    for stmt in original {
        if let Some((alias, target)) = single_alias_target(&stmt, ctx) {
            aliases.insert(alias, target);
            continue;
        }
        rebuilt.push(stmt);
    }
    *stmts = rebuilt;
}

impl<'a> Traverse<'a, DeobfuscateState> for AliasCollector {
    fn exit_program(&mut self, program: &mut Program<'a>, ctx: &mut Ctx<'a>) {
        scan_for_aliases(&mut program.body, ctx, &mut self.aliases);
    }

    fn exit_block_statement(&mut self, block: &mut BlockStatement<'a>, ctx: &mut Ctx<'a>) {
        scan_for_aliases(&mut block.body, ctx, &mut self.aliases);
    }
}

/// Removes single-declarator `var`/`let`/`const` statements whose binding is
/// never read and never reassigned, skipping decoder/proxy names (those are
/// the Cleanup stage's responsibility, not this arm's).
pub struct DeadVariablePruner {
    occurrences: Occurrences,
}

impl DeadVariablePruner {
    pub fn for_program(program: &Program<'_>) -> Self {
        let mut occurrences = Occurrences::default();
        occurrences.visit_program(program);
        Self { occurrences }
    }
}

/// `(name, span.start, has_side_effecting_initializer)` for a single-
/// declarator `var`/`let`/`const` statement, or `None` for anything else.
fn declarator_info(stmt: &Statement<'_>) -> Option<(String, u32, bool)> {
    let Statement::VariableDeclaration(decl) = stmt else { return None };
    if decl.declarations.len() != 1 {
        return None;
    }
    let declarator = &decl.declarations[0];
    let BindingPattern::BindingIdentifier(ident) = &declarator.id else {
        return None;
    };
    let side_effecting = declarator.init.as_ref().is_some_and(has_side_effects);
    Some((ident.name.as_str().to_string(), decl.span.start, side_effecting))
}

/// Whether evaluating `expr` could do more than produce a value: a call,
/// `new`, `++`/`--`, or a plain assignment anywhere inside it. A dead
/// binding with such an initializer is never pruned, since discarding the
/// declarator would also discard that effect (spec §4.2's dead-variable
/// pruning arm assumes a pure initializer; the reference obfuscator's own
/// decoder-call initializers rely on this restriction to survive until
/// Cleanup explicitly deletes the decoder, not this pass).
fn has_side_effects(expr: &Expression<'_>) -> bool {
    #[derive(Default)]
    struct SideEffectScan {
        found: bool,
    }

    impl<'a> Visit<'a> for SideEffectScan {
        fn visit_call_expression(&mut self, _it: &CallExpression<'a>) {
            self.found = true;
        }

        fn visit_new_expression(&mut self, _it: &NewExpression<'a>) {
            self.found = true;
        }

        fn visit_update_expression(&mut self, _it: &UpdateExpression<'a>) {
            self.found = true;
        }

        fn visit_assignment_expression(&mut self, _it: &AssignmentExpression<'a>) {
            self.found = true;
        }
    }

    let mut scan = SideEffectScan::default();
    scan.visit_expression(expr);
    scan.found
}

fn prune_statements<'a>(stmts: &mut ArenaVec<'a, Statement<'a>>, ctx: &mut Ctx<'a>, occurrences: &Occurrences) {
    let is_dead = |name: &str| {
        occurrences.reads.get(name).copied().unwrap_or(0) == 0
            && occurrences.violations.get(name).copied().unwrap_or(0) == 0
    };
    let original = std::mem::replace(stmts, ctx.ast.vec());
    let mut rebuilt = ctx.ast.vec_with_capacity(original.len());
    for stmt in original {
        if let Some((name, span_start, side_effecting)) = declarator_info(&stmt) {
            let protected = ctx.state.is_known_name(&name) || ctx.state.protected_declarator_spans.contains(&span_start);
            if !protected && !side_effecting && is_dead(&name) {
                continue;
            }
        }
        rebuilt.push(stmt);
    }
    *stmts = rebuilt;
}

impl<'a> Traverse<'a, DeobfuscateState> for DeadVariablePruner {
    fn exit_program(&mut self, program: &mut Program<'a>, ctx: &mut Ctx<'a>) {
        prune_statements(&mut program.body, ctx, &self.occurrences);
    }

    fn exit_block_statement(&mut self, block: &mut BlockStatement<'a>, ctx: &mut Ctx<'a>) {
        prune_statements(&mut block.body, ctx, &self.occurrences);
    }
}

#[cfg(test)]
mod tests {
    use oxc_allocator::Allocator;
    use oxc_ast::ast::Statement;
    use oxc_codegen::Codegen;
    use oxc_parser::Parser;
    use oxc_semantic::SemanticBuilder;
    use oxc_span::SourceType;
    use oxc_traverse::{traverse_mut_with_ctx, ReusableTraverseCtx, TraverseCtx};
    use crate::deobfuscate::rename::IdentifierRenamer;
    use crate::deobfuscate::state::{CoreDecoder, DeobfuscateState};

    use super::{AliasCollector, DeadVariablePruner};

    #[test]
    fn removes_alias_and_renames_references() {
        let source = "var y = _0xdec(0); var x = _0xdec; f(x(1));";
        let allocator = Allocator::default();
        let mut program = Parser::new(&allocator, source, SourceType::mjs()).parse().program;

        let mut state = DeobfuscateState::new();
        state.core.insert(
            "_0xdec".to_string(),
            CoreDecoder { source: String::new(), decl_span: 0, is_proxy_wrapper: false },
        );

        let scoping = SemanticBuilder::new().build(&program).semantic.into_scoping();
        let mut ctx: TraverseCtx<'_, DeobfuscateState> = ReusableTraverseCtx::new(state, scoping, &allocator);
        let mut collector = AliasCollector::new();
        traverse_mut_with_ctx(&mut collector, &mut program, &mut ctx);
        let aliases = collector.into_aliases();
        assert_eq!(aliases.get("x").map(String::as_str), Some("_0xdec"));

        let mut renamer = IdentifierRenamer::new(aliases);
        traverse_mut_with_ctx(&mut renamer, &mut program, &mut ctx);

        let out = Codegen::new().build(&program).code;
        assert!(!out.contains("var x"));
        assert!(out.contains("_0xdec(1)"));
    }

    #[test]
    fn prunes_zero_reference_declarator() {
        let source = "var unused = 42; f();";
        let allocator = Allocator::default();
        let mut program = Parser::new(&allocator, source, SourceType::mjs()).parse().program;
        let pruner = DeadVariablePruner::for_program(&program);

        let scoping = SemanticBuilder::new().build(&program).semantic.into_scoping();
        let mut ctx: TraverseCtx<'_, DeobfuscateState> =
            ReusableTraverseCtx::new(DeobfuscateState::new(), scoping, &allocator);
        let mut pruner = pruner;
        traverse_mut_with_ctx(&mut pruner, &mut program, &mut ctx);

        let out = Codegen::new().build(&program).code;
        assert!(!out.contains("unused"));
        assert!(out.contains("f()"));
    }

    #[test]
    fn keeps_referenced_declarator() {
        let source = "var used = 1; f(used);";
        let allocator = Allocator::default();
        let mut program = Parser::new(&allocator, source, SourceType::mjs()).parse().program;
        let mut pruner = DeadVariablePruner::for_program(&program);

        let scoping = SemanticBuilder::new().build(&program).semantic.into_scoping();
        let mut ctx: TraverseCtx<'_, DeobfuscateState> =
            ReusableTraverseCtx::new(DeobfuscateState::new(), scoping, &allocator);
        traverse_mut_with_ctx(&mut pruner, &mut program, &mut ctx);

        let out = Codegen::new().build(&program).code;
        assert!(out.contains("var used"));
    }

    #[test]
    fn keeps_unreferenced_declarator_with_call_initializer() {
        let source = "function add(a, b) { return a + b; } var total = add(1, 2);";
        let allocator = Allocator::default();
        let mut program = Parser::new(&allocator, source, SourceType::mjs()).parse().program;
        let mut pruner = DeadVariablePruner::for_program(&program);

        let scoping = SemanticBuilder::new().build(&program).semantic.into_scoping();
        let mut ctx: TraverseCtx<'_, DeobfuscateState> =
            ReusableTraverseCtx::new(DeobfuscateState::new(), scoping, &allocator);
        traverse_mut_with_ctx(&mut pruner, &mut program, &mut ctx);

        let out = Codegen::new().build(&program).code;
        assert!(out.contains("var total"));
        assert!(out.contains("add(1, 2)"));
    }

    #[test]
    fn keeps_unreferenced_declarator_protected_by_decoder_span() {
        let source = "var x = \"hello\";";
        let allocator = Allocator::default();
        let mut program = Parser::new(&allocator, source, SourceType::mjs()).parse().program;
        let decl_span_start = {
            let Statement::VariableDeclaration(decl) = &program.body[0] else { panic!("expected a var decl") };
            decl.span.start
        };
        let mut state = DeobfuscateState::new();
        state.protected_declarator_spans.insert(decl_span_start);
        let pruner = DeadVariablePruner::for_program(&program);

        let scoping = SemanticBuilder::new().build(&program).semantic.into_scoping();
        let mut ctx: TraverseCtx<'_, DeobfuscateState> = ReusableTraverseCtx::new(state, scoping, &allocator);
        let mut pruner = pruner;
        traverse_mut_with_ctx(&mut pruner, &mut program, &mut ctx);

        let out = Codegen::new().build(&program).code;
        assert!(out.contains("\"hello\""));
    }

    #[test]
    fn keeps_declarator_with_constant_violation() {
        let source = "var x = 1; x = 2;";
        let allocator = Allocator::default();
        let mut program = Parser::new(&allocator, source, SourceType::mjs()).parse().program;
        let mut pruner = DeadVariablePruner::for_program(&program);

        let scoping = SemanticBuilder::new().build(&program).semantic.into_scoping();
        let mut ctx: TraverseCtx<'_, DeobfuscateState> =
            ReusableTraverseCtx::new(DeobfuscateState::new(), scoping, &allocator);
        traverse_mut_with_ctx(&mut pruner, &mut program, &mut ctx);

        let out = Codegen::new().build(&program).code;
        assert!(out.contains('x'));
    }
}
