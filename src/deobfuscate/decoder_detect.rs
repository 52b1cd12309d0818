//! Stage 1 decoder detection (spec §4.1). Pre-normalization lives in
//! `normalize.rs`; this module implements the two detection fingerprints
//! and `addEncryptFunction`.
//!
//! Fingerprint 2 is specified as an upward ancestor search from the magic
//! alphabet literal to the nearest enclosing two-parameter function.
//! `oxc_traverse`'s enter/exit callbacks don't hand out a parent-path
//! handle the way that search wants, so this instead searches *down* from
//! every two-parameter function candidate for the literal — the same
//! candidate set fingerprint 1 already visits, just with a different
//! acceptance test. Net effect is the same function is flagged either way.

use oxc_allocator::Vec as ArenaVec;
use oxc_ast::ast::*;
use oxc_ast_visit::Visit;
use oxc_span::{GetSpan, Span};
use oxc_syntax::operator::AssignmentOperator;
use oxc_traverse::{Traverse, TraverseCtx};
use rustc_hash::FxHashSet;

use crate::sandbox::HostScope;

use super::state::{CoreDecoder, DeobfuscateState};

pub type Ctx<'a> = TraverseCtx<'a, DeobfuscateState>;

const ALPHABET: &str = "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789+/=";
const ALPHABET_INVERSE: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/=";

const ANTI_TAMPER_1: &str = "\x5cw+\x20*\x5c(\x5c)\x20*{\x5cw+\x20*";
const ANTI_TAMPER_2: &str = "[\x27|\x22].+[\x27|\x22];?\x20*}";

/// Stage 1 driver. Holds a borrow of the host scope so matched decoders can
/// be side-loaded as soon as `addEncryptFunction` assembles their source.
pub struct DecoderDetector<'h> {
    host: &'h mut HostScope,
    /// Names accepted by a fingerprint, populated bottom-up by the
    /// per-function arms below and consumed by the sibling scan once the
    /// enclosing statement list is known.
    candidates: FxHashSet<String>,
}

impl<'h> DecoderDetector<'h> {
    pub fn new(host: &'h mut HostScope) -> Self {
        Self {
            host,
            candidates: FxHashSet::default(),
        }
    }
}

/// True if every param is a plain identifier and there are exactly two of
/// them; returns the names in order.
fn two_identifier_params(params: &FormalParameters<'_>) -> Option<(String, String)> {
    if params.items.len() != 2 {
        return None;
    }
    let mut names = params.items.iter().filter_map(|p| {
        if let BindingPattern::BindingIdentifier(ident) = &p.pattern {
            Some(ident.name.as_str().to_string())
        } else {
            None
        }
    });
    let a = names.next()?;
    let b = names.next()?;
    Some((a, b))
}

/// Fingerprint 1: body is exactly `return (X = <expr>, X(<args>));` with
/// `X` a two-parameter function's own local assignment target.
fn matches_fingerprint1(func: &Function<'_>) -> bool {
    let Some((_, _)) = two_identifier_params(&func.params) else {
        return false;
    };
    let Some(body) = &func.body else { return false };
    if body.statements.len() != 1 {
        return false;
    }
    let Statement::ReturnStatement(ret) = &body.statements[0] else {
        return false;
    };
    let Some(Expression::SequenceExpression(seq)) = &ret.argument else {
        return false;
    };
    if seq.expressions.len() != 2 {
        return false;
    }
    let Expression::AssignmentExpression(assign) = &seq.expressions[0] else {
        return false;
    };
    if assign.operator != AssignmentOperator::Assign {
        return false;
    }
    let AssignmentTarget::AssignmentTargetIdentifier(left) = &assign.left else {
        return false;
    };
    let Expression::CallExpression(call) = &seq.expressions[1] else {
        return false;
    };
    let Expression::Identifier(callee) = &call.callee else {
        return false;
    };
    callee.name.as_str() == left.name.as_str()
}

/// Visitor used by fingerprint 2: does this function's body contain the
/// magic base64-alphabet literal (either case arrangement) anywhere?
struct AlphabetSeeker {
    found: bool,
}

impl<'a> Visit<'a> for AlphabetSeeker {
    fn visit_string_literal(&mut self, lit: &StringLiteral<'a>) {
        let value = lit.value.as_str();
        if value == ALPHABET || value == ALPHABET_INVERSE {
            self.found = true;
        }
    }
}

fn matches_fingerprint2(func: &Function<'_>) -> bool {
    if two_identifier_params(&func.params).is_none() {
        return false;
    }
    let Some(body) = &func.body else { return false };
    let mut seeker = AlphabetSeeker { found: false };
    seeker.visit_function_body(body);
    seeker.found
}

/// A statement is a "support array" if it's a single-declarator variable
/// declaration whose initializer is an array expression.
fn support_array_name(stmt: &Statement<'_>) -> Option<String> {
    let Statement::VariableDeclaration(decl) = stmt else {
        return None;
    };
    if decl.declarations.len() != 1 {
        return None;
    }
    let declarator = &decl.declarations[0];
    if !matches!(declarator.init, Some(Expression::ArrayExpression(_))) {
        return None;
    }
    if let BindingPattern::BindingIdentifier(ident) = &declarator.id {
        Some(ident.name.as_str().to_string())
    } else {
        None
    }
}

/// A statement is a "shuffler" if it's an expression statement calling an
/// immediately-invoked two-parameter function expression with two
/// arguments, the first being a plain identifier (normally the support
/// array's name).
fn is_shuffler(stmt: &Statement<'_>, support_name: &str) -> bool {
    let Statement::ExpressionStatement(expr_stmt) = stmt else {
        return false;
    };
    let Expression::CallExpression(call) = &expr_stmt.expression else {
        return false;
    };
    let Expression::FunctionExpression(func) = &call.callee else {
        return false;
    };
    if two_identifier_params(&func.params).is_none() {
        return false;
    }
    if call.arguments.len() != 2 {
        return false;
    }
    let Some(Expression::Identifier(first_arg)) = call.arguments[0].as_expression() else {
        return false;
    };
    first_arg.name.as_str() == support_name
}

/// Run `addEncryptFunction` for the decoder at `index` in `stmts`: look for
/// a support array among earlier siblings, then a shuffler among earlier
/// siblings (falling back to later ones), and if the support array was
/// found, side-load the concatenated source and record the decoder.
fn add_encrypt_function<'a>(
    name: &str,
    index: usize,
    stmts: &ArenaVec<'a, Statement<'a>>,
    ctx: &mut Ctx<'a>,
    host: &mut HostScope,
) {
    if ctx.state.core.contains_key(name) {
        return;
    }

    let mut support: Option<(usize, String)> = None;
    for i in (0..index).rev() {
        if let Some(array_name) = support_array_name(&stmts[i]) {
            support = Some((i, array_name));
            break;
        }
    }
    let Some((support_idx, support_name)) = support else {
        return;
    };

    let mut shuffler_idx = None;
    for i in (0..index).rev() {
        if i == support_idx {
            continue;
        }
        if is_shuffler(&stmts[i], &support_name) {
            shuffler_idx = Some(i);
            break;
        }
    }
    if shuffler_idx.is_none() {
        for i in (index + 1)..stmts.len() {
            if is_shuffler(&stmts[i], &support_name) {
                shuffler_idx = Some(i);
                break;
            }
        }
    }

    let decoder_span = stmts[index].span();
    let support_span = stmts[support_idx].span();

    let mut source = String::new();
    source.push_str(slice_span(&ctx.state.original_source, support_span));
    source.push('\n');
    if let Some(i) = shuffler_idx {
        source.push_str(slice_span(&ctx.state.original_source, stmts[i].span()));
        source.push('\n');
    }
    source.push_str(slice_span(&ctx.state.original_source, decoder_span));

    let source = source.replace(ANTI_TAMPER_1, "").replace(ANTI_TAMPER_2, ".");

    if host.inject(&source).is_err() {
        tracing::warn!(decoder = name, "decoder side-load failed, leaving in place");
        return;
    }

    ctx.state.core_ref_spans.insert(support_span.start);
    if let Some(i) = shuffler_idx {
        ctx.state.core_ref_spans.insert(stmts[i].span().start);
    }
    ctx.state.core.insert(
        name.to_string(),
        CoreDecoder {
            source,
            decl_span: decoder_span.start,
            is_proxy_wrapper: false,
        },
    );
    tracing::debug!(decoder = name, "decoder detected and side-loaded");
}

fn slice_span<'s>(source: &'s str, span: Span) -> &'s str {
    let start = span.start as usize;
    let end = span.end as usize;
    source.get(start..end).unwrap_or_default()
}

fn scan_statements<'a>(stmts: &ArenaVec<'a, Statement<'a>>, ctx: &mut Ctx<'a>, candidates: &FxHashSet<String>, host: &mut HostScope) {
    for (i, stmt) in stmts.iter().enumerate() {
        let name = match stmt {
            Statement::FunctionDeclaration(func) => func.id.as_ref().map(|id| id.name.as_str().to_string()),
            Statement::VariableDeclaration(decl) if decl.declarations.len() == 1 => {
                let declarator = &decl.declarations[0];
                if matches!(declarator.init, Some(Expression::FunctionExpression(_))) {
                    if let BindingPattern::BindingIdentifier(ident) = &declarator.id {
                        Some(ident.name.as_str().to_string())
                    } else {
                        None
                    }
                } else {
                    None
                }
            }
            _ => None,
        };
        let Some(name) = name else { continue };
        if !candidates.contains(&name) {
            continue;
        }
        add_encrypt_function(&name, i, stmts, ctx, host);
    }
}

impl<'h, 'a> Traverse<'a, DeobfuscateState> for DecoderDetector<'h> {
    fn enter_function(&mut self, func: &mut Function<'a>, _ctx: &mut Ctx<'a>) {
        if matches_fingerprint1(func) || matches_fingerprint2(func) {
            if let Some(id) = &func.id {
                self.candidates.insert(id.name.as_str().to_string());
            }
        }
    }

    fn enter_variable_declarator(&mut self, declarator: &mut VariableDeclarator<'a>, _ctx: &mut Ctx<'a>) {
        let Some(Expression::FunctionExpression(func)) = &declarator.init else {
            return;
        };
        if !matches_fingerprint1(func) && !matches_fingerprint2(func) {
            return;
        }
        if let BindingPattern::BindingIdentifier(ident) = &declarator.id {
            self.candidates.insert(ident.name.as_str().to_string());
        }
    }

    fn exit_program(&mut self, program: &mut Program<'a>, ctx: &mut Ctx<'a>) {
        scan_statements(&program.body, ctx, &self.candidates, &mut *self.host);
    }

    fn exit_block_statement(&mut self, block: &mut BlockStatement<'a>, ctx: &mut Ctx<'a>) {
        scan_statements(&block.body, ctx, &self.candidates, &mut *self.host);
    }
}

#[cfg(test)]
mod tests {
    use crate::deobfuscate::testing::run_pass_with_state;
    use crate::deobfuscate::state::DeobfuscateState;
    use crate::sandbox::HostScope;

    use super::DecoderDetector;

    #[test]
    fn detects_fingerprint1_decoder_with_support_array() {
        let source = r#"
            var _0xsup = ["hello", "world"];
            (function(arr, idx) { arr.push(idx); })(_0xsup, 0);
            function _0xdec(a, b) {
                return (_0xdec = function(a, b) { return _0xsup[a]; }, _0xdec(a, b));
            }
            var x = _0xdec(0);
        "#;
        let mut host = HostScope::new();
        let mut state = DeobfuscateState::new();
        state.original_source = source.to_string();
        let (_, state) = run_pass_with_state(source, state, || DecoderDetector::new(&mut host));
        assert!(state.core.contains_key("_0xdec"));
    }

    #[test]
    fn ignores_unrelated_two_param_functions() {
        let source = "function add(a, b) { return a + b; }";
        let mut host = HostScope::new();
        let mut state = DeobfuscateState::new();
        state.original_source = source.to_string();
        let (_, state) = run_pass_with_state(source, state, || DecoderDetector::new(&mut host));
        assert!(state.core.is_empty());
    }
}
