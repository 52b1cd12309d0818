//! Shared test harness for individual transform passes. Not part of the
//! public API; only compiled under `#[cfg(test)]`.

#![cfg(test)]

use oxc_allocator::Allocator;
use oxc_ast::ast::Program;
use oxc_codegen::Codegen;
use oxc_parser::Parser;
use oxc_semantic::SemanticBuilder;
use oxc_span::SourceType;
use oxc_traverse::{traverse_mut_with_ctx, ReusableTraverseCtx, Traverse, TraverseCtx};

use super::state::DeobfuscateState;

fn parse<'a>(allocator: &'a Allocator, source: &str) -> Program<'a> {
    Parser::new(allocator, source, SourceType::mjs()).parse().program
}

/// Parse `source`, run one pass built by `make`, and return the generated
/// output. `make` is given a mutable reference to the shared state so
/// tests can seed it before the pass runs.
pub fn run_pass<T>(source: &str, make: impl FnOnce() -> T) -> String
where
    T: for<'a> Traverse<'a, DeobfuscateState>,
{
    run_pass_with_state(source, DeobfuscateState::new(), make).0
}

pub fn run_pass_with_state<T>(
    source: &str,
    state: DeobfuscateState,
    make: impl FnOnce() -> T,
) -> (String, DeobfuscateState)
where
    T: for<'a> Traverse<'a, DeobfuscateState>,
{
    let allocator = Allocator::default();
    let mut program = parse(&allocator, source);

    let scoping = SemanticBuilder::new().build(&program).semantic.into_scoping();
    let mut ctx: TraverseCtx<'_, DeobfuscateState> =
        ReusableTraverseCtx::new(state, scoping, &allocator);

    let mut pass = make();
    traverse_mut_with_ctx(&mut pass, &mut program, &mut ctx);
    let state = ctx.into_state();

    (Codegen::new().build(&program).code, state)
}

/// Run two passes back to back (collector then inliner), rebuilding
/// scoping between them, the way every collect/inline pair in this crate
/// is wired together in `deobfuscate::mod`.
pub fn run_two_passes<T1, T2>(
    source: &str,
    make_first: impl FnOnce() -> T1,
    make_second: impl FnOnce(DeobfuscateState) -> T2,
) -> String
where
    T1: for<'a> Traverse<'a, DeobfuscateState>,
    T2: for<'a> Traverse<'a, DeobfuscateState>,
{
    run_two_passes_with_state(source, DeobfuscateState::new(), make_first, make_second).0
}

/// Same as [`run_two_passes`] but lets the caller seed the state the first
/// pass runs with (e.g. `original_source`, for decoder-detection tests) and
/// returns the final state alongside the generated output.
pub fn run_two_passes_with_state<T1, T2>(
    source: &str,
    initial_state: DeobfuscateState,
    make_first: impl FnOnce() -> T1,
    make_second: impl FnOnce(DeobfuscateState) -> T2,
) -> (String, DeobfuscateState)
where
    T1: for<'a> Traverse<'a, DeobfuscateState>,
    T2: for<'a> Traverse<'a, DeobfuscateState>,
{
    let allocator = Allocator::default();
    let mut program = parse(&allocator, source);

    let scoping = SemanticBuilder::new().build(&program).semantic.into_scoping();
    let mut ctx: TraverseCtx<'_, DeobfuscateState> =
        ReusableTraverseCtx::new(initial_state, scoping, &allocator);
    let mut first = make_first();
    traverse_mut_with_ctx(&mut first, &mut program, &mut ctx);
    let state = ctx.into_state();

    let scoping = SemanticBuilder::new().build(&program).semantic.into_scoping();
    let mut ctx: TraverseCtx<'_, DeobfuscateState> = ReusableTraverseCtx::new(state, scoping, &allocator);
    let mut second = make_second(DeobfuscateState::new());
    traverse_mut_with_ctx(&mut second, &mut program, &mut ctx);
    let state = ctx.into_state();

    (Codegen::new().build(&program).code, state)
}
