//! Decoder invocation and proxy-decoder harvesting (spec §4.1 tail, §4.2
//! "Decoder invocation" / "Proxy-decoder harvesting").
//!
//! Harvesting must run before invocation within the same Rewriter stage:
//! it registers proxy-decoder wrapper names as callable in the host scope
//! and protects their own `return coreFn(...)` call from being collapsed
//! by the invoker that runs right after it.

use oxc_ast::ast::*;
use oxc_span::{GetSpan, Span};
use oxc_traverse::{Traverse, TraverseCtx};

use crate::sandbox::HostScope;

use super::state::{CoreDecoder, DeobfuscateState};

pub type Ctx<'a> = TraverseCtx<'a, DeobfuscateState>;

fn slice_span<'s>(source: &'s str, span: Span) -> &'s str {
    source.get(span.start as usize..span.end as usize).unwrap_or_default()
}

/// `function wrapper(a, b) { return coreFn(a - K, b); }` (or the
/// single-declarator function-expression form) where `coreFn` is already a
/// known, host-callable decoder.
pub struct ProxyDecoderHarvester<'h> {
    host: &'h mut HostScope,
}

impl<'h> ProxyDecoderHarvester<'h> {
    pub fn new(host: &'h mut HostScope) -> Self {
        Self { host }
    }
}

fn wrapper_shape(func: &Function<'_>) -> Option<String> {
    let body = func.body.as_ref()?;
    if body.statements.len() != 1 {
        return None;
    }
    let Statement::ReturnStatement(ret) = &body.statements[0] else {
        return None;
    };
    let Some(Expression::CallExpression(call)) = &ret.argument else {
        return None;
    };
    let Expression::Identifier(callee) = &call.callee else {
        return None;
    };
    Some(callee.name.as_str().to_string())
}

fn harvest<'a>(name: &str, span: Span, func: &Function<'a>, ctx: &mut Ctx<'a>, host: &mut HostScope) {
    if ctx.state.core.contains_key(name) {
        return;
    }
    let Some(core_fn) = wrapper_shape(func) else { return };
    if !ctx.state.core.contains_key(&core_fn) {
        return;
    }

    let source = slice_span(&ctx.state.original_source, span).to_string();
    if host.inject(&source).is_err() {
        tracing::warn!(wrapper = name, "proxy-decoder wrapper side-load failed");
        return;
    }

    if let Statement::ReturnStatement(ret) = &func.body.as_ref().unwrap().statements[0] {
        if let Some(Expression::CallExpression(call)) = &ret.argument {
            ctx.state.protected_call_spans.insert(call.span().start);
        }
    }

    ctx.state.core.insert(
        name.to_string(),
        CoreDecoder { source, decl_span: span.start, is_proxy_wrapper: true },
    );
    tracing::debug!(wrapper = name, core = core_fn, "proxy-decoder wrapper harvested");
}

impl<'h, 'a> Traverse<'a, DeobfuscateState> for ProxyDecoderHarvester<'h> {
    fn exit_statement(&mut self, stmt: &mut Statement<'a>, ctx: &mut Ctx<'a>) {
        match stmt {
            Statement::FunctionDeclaration(func) => {
                if let Some(id) = &func.id {
                    let name = id.name.as_str().to_string();
                    harvest(&name, func.span, func, ctx, self.host);
                }
            }
            Statement::VariableDeclaration(decl) if decl.declarations.len() == 1 => {
                let declarator = &decl.declarations[0];
                if let Some(Expression::FunctionExpression(func)) = &declarator.init {
                    if let BindingPattern::BindingIdentifier(ident) = &declarator.id {
                        let name = ident.name.as_str().to_string();
                        let span = decl.span;
                        harvest(&name, span, func, ctx, self.host);
                    }
                }
            }
            _ => {}
        }
    }
}

/// A call whose callee is an identifier known in `core` and host-callable is
/// evaluated and replaced by its result literal, unless the call is
/// protected (it's the body of a just-harvested proxy wrapper).
pub struct DecoderInvoker<'h> {
    host: &'h mut HostScope,
}

impl<'h> DecoderInvoker<'h> {
    pub fn new(host: &'h mut HostScope) -> Self {
        Self { host }
    }
}

/// Render a call argument as JS source text for the host scope. Decoder
/// arguments are always literals or a negated literal in practice; anything
/// else is an evaluation error under spec §7's "unexpected shape" policy.
fn arg_source(expr: &Expression<'_>) -> Option<String> {
    use super::support::{literal_source, literal_value_of, signed_numeric};
    if let Some(lit) = literal_value_of(expr) {
        return Some(literal_source(&lit));
    }
    if let Expression::UnaryExpression(_) = expr {
        if let Some(n) = signed_numeric(expr) {
            return Some(super::support::format_number(n));
        }
    }
    None
}

impl<'h, 'a> Traverse<'a, DeobfuscateState> for DecoderInvoker<'h> {
    /// Runs before this pass's own `exit_expression` arm can collapse a
    /// decoder call into a literal, so it still sees the call shape:
    /// protect the declarator from later dead-variable pruning now, while
    /// the signal that this value came from a decoder is still visible.
    fn enter_variable_declaration(&mut self, decl: &mut VariableDeclaration<'a>, ctx: &mut Ctx<'a>) {
        if decl.declarations.len() != 1 {
            return;
        }
        let Some(Expression::CallExpression(call)) = &decl.declarations[0].init else {
            return;
        };
        let Expression::Identifier(callee) = &call.callee else { return };
        if !ctx.state.core.contains_key(callee.name.as_str()) {
            return;
        }
        if ctx.state.protected_call_spans.contains(&call.span().start) {
            return;
        }
        ctx.state.protected_declarator_spans.insert(decl.span.start);
    }

    fn exit_expression(&mut self, expr: &mut Expression<'a>, ctx: &mut Ctx<'a>) {
        let Expression::CallExpression(call) = expr else { return };
        let Expression::Identifier(callee) = &call.callee else { return };
        let name = callee.name.as_str();
        if !ctx.state.core.contains_key(name) {
            return;
        }
        if ctx.state.protected_call_spans.contains(&call.span().start) {
            return;
        }

        let mut arg_sources = Vec::with_capacity(call.arguments.len());
        for arg in &call.arguments {
            let Some(arg_expr) = arg.as_expression() else { return };
            let Some(text) = arg_source(arg_expr) else { return };
            arg_sources.push(text);
        }

        match self.host.call(name, &arg_sources) {
            Ok(value) => {
                let literal = super::state::LiteralValue::from(value);
                *expr = super::support::literal_expression(&literal, ctx);
            }
            Err(err) => {
                tracing::warn!(decoder = name, error = %err, "decoder call evaluation failed, leaving call unchanged");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::deobfuscate::decoder_detect::DecoderDetector;
    use crate::deobfuscate::state::{CoreDecoder, DeobfuscateState};
    use crate::deobfuscate::testing::{run_pass_with_state, run_two_passes_with_state};
    use crate::sandbox::HostScope;

    use super::DecoderInvoker;

    #[test]
    fn invokes_detected_decoder() {
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
        let (out, _) = run_two_passes_with_state(
            source,
            state,
            || DecoderDetector::new(&mut host),
            |_| DecoderInvoker::new(&mut host),
        );
        assert!(out.contains("\"hello\""));
    }

    #[test]
    fn protects_declarator_whose_call_was_a_known_decoder() {
        let source = "var x = _0xdec(0);";
        let mut host = HostScope::new();
        host.inject("function _0xdec(a) { return 'hello'; }").unwrap();
        let mut state = DeobfuscateState::new();
        state.core.insert(
            "_0xdec".to_string(),
            CoreDecoder { source: String::new(), decl_span: 0, is_proxy_wrapper: false },
        );
        let (_, state) = run_pass_with_state(source, state, || DecoderInvoker::new(&mut host));
        assert!(!state.protected_declarator_spans.is_empty());
    }
}
