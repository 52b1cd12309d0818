//! The host evaluation collaborator (spec §5, §6, §9).
//!
//! A `HostScope` wraps one [`boa_engine::Context`] per `optimize()` call. It
//! accepts decoder source for side effects (`inject`) and later evaluates a
//! call expression against names it previously injected (`call`). Boa's
//! default realm has no filesystem or network bindings, so injected decoder
//! code cannot reach outside its own context — that is the whole of the
//! sandboxing this crate relies on; it is not a hardened security boundary
//! and untrusted decoders should not be run against anything more sensitive
//! than string/number literals.
//!
//! One scope lives for the duration of one `optimize()` call and is then
//! dropped, so no name injected while deobfuscating one file can leak into
//! the next.

use boa_engine::{Context, JsValue, Source};

/// A primitive value recovered from the sandbox, ready to become an AST
/// literal node.
#[derive(Debug, Clone, PartialEq)]
pub enum HostValue {
    String(String),
    Number(f64),
    Boolean(bool),
}

pub struct HostScope {
    context: Context,
}

impl HostScope {
    pub fn new() -> Self {
        Self {
            context: Context::default(),
        }
    }

    /// Evaluate `source` for side effects (defining the decoder, its
    /// support array, its shuffler). Tolerates being called repeatedly with
    /// different decoders; redefining a `var`/`function` in the same realm
    /// is not an error.
    pub fn inject(&mut self, source: &str) -> Result<(), String> {
        self.context
            .eval(Source::from_bytes(source))
            .map(|_| ())
            .map_err(|err| err.to_string())
    }

    /// Call a previously injected function by name, passing source-text
    /// arguments (already-rendered JS literals), and coerce the result to a
    /// primitive.
    pub fn call(&mut self, callee: &str, arg_sources: &[String]) -> Result<HostValue, String> {
        let expr = format!("{callee}({})", arg_sources.join(", "));
        let value = self
            .context
            .eval(Source::from_bytes(expr.as_bytes()))
            .map_err(|err| err.to_string())?;
        Self::to_host_value(&value, &mut self.context)
    }

    /// Evaluate an arbitrary expression (used for constant folding, which
    /// hands the host scope two literals and an operator rather than a
    /// named call).
    pub fn eval_expr(&mut self, expr: &str) -> Result<HostValue, String> {
        let value = self
            .context
            .eval(Source::from_bytes(expr.as_bytes()))
            .map_err(|err| err.to_string())?;
        Self::to_host_value(&value, &mut self.context)
    }

    fn to_host_value(value: &JsValue, ctx: &mut Context) -> Result<HostValue, String> {
        match value {
            JsValue::String(s) => Ok(HostValue::String(s.to_std_string_escaped())),
            JsValue::Rational(n) => Ok(HostValue::Number(*n)),
            JsValue::Integer(n) => Ok(HostValue::Number(f64::from(*n))),
            JsValue::Boolean(b) => Ok(HostValue::Boolean(*b)),
            other => other
                .to_string(ctx)
                .map(|s| HostValue::String(s.to_std_string_escaped()))
                .map_err(|err| err.to_string()),
        }
    }
}

impl Default for HostScope {
    fn default() -> Self {
        Self::new()
    }
}
