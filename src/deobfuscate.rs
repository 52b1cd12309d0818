//! The deobfuscation pipeline (spec §2–§4): four stages over one shared
//! AST, threading a single [`state::DeobfuscateState`] Analysis Cache
//! through each. [`crate::optimize`] is the only thing that wires these
//! modules into a full pipeline run; every module here is a single stage
//! or a closely related pair of Rewriter arms, independently unit-tested
//! against its own pass.

pub mod alias;
pub mod beautify;
pub mod beautify_member;
pub mod cleanup;
pub mod constant_fold;
pub mod dead_branch;
pub mod decoder_detect;
pub mod decoder_invoke;
pub mod function_inline;
pub mod normalize;
pub mod proxy;
pub mod rename;
pub mod state;
pub mod support;
#[cfg(test)]
pub mod testing;
pub mod unflatten;
