//! The Analysis Cache (spec §3), realized as an owned, lifetime-free struct
//! so it can be threaded across stages the way `oxc_traverse`'s
//! `ReusableTraverseCtx` expects: extract it with `ctx.into_state()` after
//! one stage, hand it to `ReusableTraverseCtx::new` for the next.
//!
//! Every map is keyed by identifier name, matching the spec's own data
//! model. Nodes slated for deletion or rename are recorded by their
//! `Span::start` rather than by a long-lived path handle — oxc's AST lives
//! in a single arena for the whole `optimize()` call, so a `u32` offset is
//! a stable enough key for a later pass in the same call to recognize "this
//! is the node I flagged earlier."

use oxc_syntax::operator::BinaryOperator;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::sandbox::HostValue;

/// A primitive literal value, detached from the AST arena.
#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    String(String),
    Number(f64),
    Boolean(bool),
    Null,
}

impl From<HostValue> for LiteralValue {
    fn from(value: HostValue) -> Self {
        match value {
            HostValue::String(s) => LiteralValue::String(s),
            HostValue::Number(n) => LiteralValue::Number(n),
            HostValue::Boolean(b) => LiteralValue::Boolean(b),
        }
    }
}

/// What a function-expression's single `return` statement resolves to,
/// per the Function-expression call inlining table (spec §4.2).
#[derive(Debug, Clone)]
pub enum ReturnShape {
    /// `return a <op> b` with exactly two params, both used in order.
    BinaryOp(BinaryOperator),
    /// `return <paramIdent>` — replacement is the corresponding argument.
    ParamIdentity(usize),
    /// `return <literal>`.
    Literal(LiteralValue),
    /// `return <paramIdent>(...)` — replacement calls `args[paramIndex]`.
    ParamCall(usize),
    /// `return obj.m(...)` where `obj`/`m` are plain identifiers.
    MemberCall { obj: String, method: String },
}

/// What a proxy property's value is. One sum type answering "what do you
/// hold" for both `proxyPaths` and `doubtedProxyPathInfos` entries (Design
/// Notes, "Valid proxy polymorphism").
#[derive(Debug, Clone)]
pub enum PropertyValue {
    Literal(LiteralValue),
    Identifier(String),
    Function {
        params: Vec<String>,
        shape: Option<ReturnShape>,
    },
}

/// A confirmed proxy object: `proxyPaths` entries.
#[derive(Debug, Clone)]
pub struct Proxy {
    pub decl_span: u32,
    pub properties: Vec<(String, PropertyValue)>,
}

impl Proxy {
    pub fn get(&self, key: &str) -> Option<&PropertyValue> {
        self.properties.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }
}

/// A doubted proxy: `let p = {}` followed by per-property assignments.
#[derive(Debug, Clone)]
pub struct DoubtedProxy {
    pub decl_span: u32,
    pub first_key_len: usize,
    pub properties: Vec<(String, PropertyValue)>,
    pub assignment_spans: Vec<u32>,
}

impl DoubtedProxy {
    pub fn get(&self, key: &str) -> Option<&PropertyValue> {
        self.properties.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }
}

/// A detected decoder / core function: `corePaths` entries, plus the
/// concatenated source handed to the host scope.
#[derive(Debug, Clone)]
pub struct CoreDecoder {
    /// support-array + shuffler + decoder source, anti-tamper patched,
    /// ready for `HostScope::inject`.
    pub source: String,
    pub decl_span: u32,
    /// Set once a proxy-decoder wrapper (`return core(a - k, b)`) has been
    /// harvested for this name too.
    pub is_proxy_wrapper: bool,
}

#[derive(Default)]
pub struct DeobfuscateState {
    /// The original source text, kept so Stage 1 can recover a decoder's
    /// own source by slicing `Span`s rather than re-running codegen on an
    /// arena subtree.
    pub original_source: String,
    pub core: FxHashMap<String, CoreDecoder>,
    /// Support array declarations and shuffler IIFEs, identified by span,
    /// to be deleted at cleanup (invariant 3: every entry here has already
    /// been handed to the host scope).
    pub core_ref_spans: FxHashSet<u32>,
    pub proxies: FxHashMap<String, Proxy>,
    pub doubted: FxHashMap<String, DoubtedProxy>,
    /// Every name currently bound or referenced anywhere in the program;
    /// seeds `generate_unique`.
    pub name_pool: FxHashSet<String>,
    /// span.start -> new name, consulted by the identifier-mutation pass
    /// that realizes `scope.rename`.
    pub rename_map: FxHashMap<u32, String>,
    /// Nodes to delete at cleanup beyond `core`/`proxies`/`doubted`
    /// themselves (doubted-proxy assignment origins, mostly).
    pub delete_spans: FxHashSet<u32>,
    /// Call-expression spans that must not be collapsed by the decoder
    /// invocation arm even though their callee name is in `core` — the
    /// proxy-decoder harvesting arm populates this with the inner
    /// `coreFn(...)` call of a just-harvested wrapper body, which must
    /// survive so the wrapper itself stays callable in the host scope.
    pub protected_call_spans: FxHashSet<u32>,
    /// `VariableDeclaration.span.start` of declarators whose initializer
    /// was a call to a known decoder at the moment `DecoderInvoker` was
    /// about to collapse it to a literal. Dead-variable pruning must not
    /// discard these even once their initializer looks like a harmless
    /// literal, since that literal is the whole point of running the
    /// decoder (spec §8 scenario S7).
    pub protected_declarator_spans: FxHashSet<u32>,
}

impl DeobfuscateState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Invariant 1: a name lives in at most one of the three cache maps.
    pub fn is_known_name(&self, name: &str) -> bool {
        self.core.contains_key(name) || self.proxies.contains_key(name) || self.doubted.contains_key(name)
    }

    /// Invariant 2: a valid-for-lookup proxy is `proxyPaths` OR a
    /// non-invalidated `doubtedProxyPathInfos` entry; `proxyPaths` wins the
    /// fallback order.
    pub fn is_valid_proxy(&self, name: &str) -> bool {
        self.proxies.contains_key(name) || self.doubted.contains_key(name)
    }

    pub fn lookup_property(&self, obj: &str, key: &str) -> Option<&PropertyValue> {
        if let Some(p) = self.proxies.get(obj) {
            return p.get(key);
        }
        self.doubted.get(obj).and_then(|d| d.get(key))
    }

    /// `scope.generateUniqueIdentifier(hint)`. Conservative: unique across
    /// the whole file rather than only the current scope (see
    /// SPEC_FULL.md §4/§9 and DESIGN.md for why that's safe here).
    pub fn generate_unique(&mut self, hint: &str) -> String {
        let hint = if hint.is_empty() { "v" } else { hint };
        if !self.name_pool.contains(hint) {
            self.name_pool.insert(hint.to_string());
            return hint.to_string();
        }
        let mut n = 2usize;
        loop {
            let candidate = format!("{hint}_{n}");
            if !self.name_pool.contains(&candidate) {
                self.name_pool.insert(candidate.clone());
                return candidate;
            }
            n += 1;
        }
    }

    pub fn record_name(&mut self, name: &str) {
        self.name_pool.insert(name.to_string());
    }
}
