//! AST-based deobfuscator for string-array / proxy-object /
//! control-flow-flattened JavaScript.
//!
//! [`optimize`] is the crate's one public entry point (spec §6): parse the
//! source, run the four pipeline stages over the shared AST, regenerate,
//! return the cleaned source. Everything else in [`deobfuscate`] is an
//! internal collaborator of that one function.
//!
//! The pipeline is described stage by stage in the `deobfuscate` submodules
//! (one module per Rewriter arm or closely related arm group); the ordering
//! decisions that glue them into the single traversal sequence below are
//! recorded in `DESIGN.md`.

pub mod deobfuscate;
pub mod error;
pub mod sandbox;

use oxc_allocator::Allocator;
use oxc_ast::ast::Program;
use oxc_ast_visit::Visit;
use oxc_codegen::Codegen;
use oxc_parser::Parser;
use oxc_semantic::SemanticBuilder;
use oxc_span::SourceType;
use oxc_traverse::{traverse_mut_with_ctx, ReusableTraverseCtx, Traverse, TraverseCtx};

use deobfuscate::alias::{AliasCollector, DeadVariablePruner};
use deobfuscate::beautify::HexRenameCollector;
use deobfuscate::beautify_member::MemberBeautifier;
use deobfuscate::cleanup::Cleanup;
use deobfuscate::constant_fold::ConstantFolder;
use deobfuscate::dead_branch::DeadBranchEliminator;
use deobfuscate::decoder_detect::DecoderDetector;
use deobfuscate::decoder_invoke::{DecoderInvoker, ProxyDecoderHarvester};
use deobfuscate::function_inline::FunctionInliner;
use deobfuscate::normalize::Normalizer;
use deobfuscate::proxy::{ProxyCollector, ProxyInliner};
use deobfuscate::rename::IdentifierRenamer;
use deobfuscate::state::DeobfuscateState;
use deobfuscate::unflatten::Unflattener;
use error::{OptimizeError, Result};
use sandbox::HostScope;

/// Every identifier binding and reference already present in the source,
/// seeded into the Analysis Cache's name pool before any rename runs so
/// `generateUniqueIdentifier` never hands out a name the obfuscated file
/// is already using.
#[derive(Default)]
struct NamePoolSeeder {
    names: Vec<String>,
}

impl<'a> Visit<'a> for NamePoolSeeder {
    fn visit_binding_identifier(&mut self, ident: &oxc_ast::ast::BindingIdentifier<'a>) {
        self.names.push(ident.name.as_str().to_string());
    }

    fn visit_identifier_reference(&mut self, ident: &oxc_ast::ast::IdentifierReference<'a>) {
        self.names.push(ident.name.as_str().to_string());
    }
}

/// Run one `Traverse` pass, rebuilding scoping first. Every pass in this
/// pipeline mutates statement lists (splitting, pruning, replacing nodes),
/// which can leave the previous pass's binding/reference ids stale; a
/// fresh `SemanticBuilder` pass between stages is the cheap way to keep
/// `TraverseCtx` consistent, the same tradeoff `deobfuscate::testing`'s
/// `run_two_passes` makes for pass-pair unit tests.
fn run_stage<'a, T>(
    program: &mut Program<'a>,
    allocator: &'a Allocator,
    state: DeobfuscateState,
    make: impl FnOnce() -> T,
) -> DeobfuscateState
where
    T: Traverse<'a, DeobfuscateState>,
{
    let scoping = SemanticBuilder::new().build(program).semantic.into_scoping();
    let mut ctx: TraverseCtx<'a, DeobfuscateState> = ReusableTraverseCtx::new(state, scoping, allocator);
    let mut pass = make();
    traverse_mut_with_ctx(&mut pass, program, &mut ctx);
    ctx.into_state()
}

/// Parse `source_text`, run the four deobfuscation stages, and regenerate
/// the cleaned source (spec §6, §2).
///
/// Only a parse failure is surfaced as an `Err`; every other failure mode
/// (a decoder that fails to side-load or evaluate, an AST shape a rewrite
/// arm doesn't recognize, a proxy lookup miss) is handled locally inside
/// the stages per the error taxonomy in spec §7 and never aborts the pass.
pub fn optimize(source_text: &str) -> Result<String> {
    let allocator = Allocator::default();
    let source_type = SourceType::mjs();
    let parser_return = Parser::new(&allocator, source_text, source_type).parse();
    if !parser_return.errors.is_empty() {
        let message = format!("{:?}", parser_return.errors.first().expect("errors non-empty"));
        return Err(OptimizeError::Parse(message));
    }
    let mut program = parser_return.program;

    let mut state = DeobfuscateState::new();
    state.original_source = source_text.to_string();
    let mut seeder = NamePoolSeeder::default();
    seeder.visit_program(&program);
    for name in seeder.names {
        state.record_name(&name);
    }

    let mut host = HostScope::new();

    // Stage 1: Decoder Detection. Pre-normalize first so later statement-
    // list scans (sibling search for support arrays/shufflers, per-
    // declarator deletion) see one declarator and one expression per
    // statement.
    state = run_stage(&mut program, &allocator, state, Normalizer::new);
    state = run_stage(&mut program, &allocator, state, || DecoderDetector::new(&mut host));

    // Stage 2: Rewriter.
    state = run_stage(&mut program, &allocator, state, || ConstantFolder::new(&mut host));
    state = run_stage(&mut program, &allocator, state, DeadBranchEliminator::new);
    state = run_stage(&mut program, &allocator, state, ProxyCollector::new);
    state = run_stage(&mut program, &allocator, state, ProxyInliner::new);
    state = run_stage(&mut program, &allocator, state, FunctionInliner::new);
    // Harvesting must run immediately before invocation: it registers
    // proxy-decoder wrapper names as host-callable and protects their own
    // body call from being collapsed by the invoker that follows.
    state = run_stage(&mut program, &allocator, state, || ProxyDecoderHarvester::new(&mut host));
    state = run_stage(&mut program, &allocator, state, || DecoderInvoker::new(&mut host));
    // A second folding pass catches expressions exposed by the literals
    // decoder invocation and proxy inlining just substituted in (e.g.
    // `"a" + _0xdec(1)` once the call becomes a string literal), without
    // looping to a fixed point.
    state = run_stage(&mut program, &allocator, state, || ConstantFolder::new(&mut host));
    state = run_stage(&mut program, &allocator, state, DeadBranchEliminator::new);

    let mut alias_collector = AliasCollector::new();
    state = {
        let scoping = SemanticBuilder::new().build(&program).semantic.into_scoping();
        let mut ctx: TraverseCtx<'_, DeobfuscateState> = ReusableTraverseCtx::new(state, scoping, &allocator);
        traverse_mut_with_ctx(&mut alias_collector, &mut program, &mut ctx);
        ctx.into_state()
    };
    let aliases = alias_collector.into_aliases();
    if !aliases.is_empty() {
        state = run_stage(&mut program, &allocator, state, || IdentifierRenamer::new(aliases));
    }

    let pruner = DeadVariablePruner::for_program(&program);
    state = run_stage(&mut program, &allocator, state, || pruner);
    state = run_stage(&mut program, &allocator, state, MemberBeautifier::new);
    state = run_stage(&mut program, &allocator, state, Unflattener::new);

    // Stage 3: Beautifier.
    let mut hex_collector = HexRenameCollector::new();
    state = {
        let scoping = SemanticBuilder::new().build(&program).semantic.into_scoping();
        let mut ctx: TraverseCtx<'_, DeobfuscateState> = ReusableTraverseCtx::new(state, scoping, &allocator);
        traverse_mut_with_ctx(&mut hex_collector, &mut program, &mut ctx);
        ctx.into_state()
    };
    let hex_renames = hex_collector.into_renames();
    if !hex_renames.is_empty() {
        state = run_stage(&mut program, &allocator, state, || IdentifierRenamer::new(hex_renames));
    }

    // Stage 4: Cleanup.
    let cleanup = Cleanup::for_state(&state);
    run_stage(&mut program, &allocator, state, || cleanup);

    Ok(Codegen::new().build(&program).code)
}

#[cfg(test)]
mod tests {
    use super::optimize;

    // Smoke test; the full scenario table (spec §8) lives in tests/scenarios.rs
    // as an integration test against the public API.
    #[test]
    fn optimize_is_total_on_well_formed_input() {
        assert!(optimize("var x = 1 + 2;").is_ok());
    }
}
