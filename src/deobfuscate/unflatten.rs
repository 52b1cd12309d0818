//! Control-flow unflattening (spec §4.2 "Control-flow unflattening (switch
//! statement)"). Recognizes the classic switch-dispatch loop:
//!
//! ```js
//! var _0xorder = 'pad-string'['split']('sep');
//! var _0xi = 0;
//! while (true) {
//!     switch (_0xorder[_0xi++]) {
//!         case '0': stmtA; continue;
//!         case '1': stmtB; continue;
//!     }
//!     break;
//! }
//! ```
//!
//! and replaces the whole `while` with the flat statement sequence the pad
//! (split by the separator) encodes, dropping the order array and counter
//! declarations from the same statement list.

use oxc_allocator::Vec as ArenaVec;
use oxc_ast::ast::*;
use oxc_syntax::operator::UpdateOperator;
use oxc_traverse::{Traverse, TraverseCtx};
use rustc_hash::{FxHashMap, FxHashSet};

use super::state::DeobfuscateState;

pub type Ctx<'a> = TraverseCtx<'a, DeobfuscateState>;

/// `var name = "pad"['split']("sep");` — the pad is the computed member
/// expression's object, the separator is the call's sole argument.
fn array_decl_shape(stmt: &Statement<'_>) -> Option<(String, String, String)> {
    let Statement::VariableDeclaration(decl) = stmt else { return None };
    if decl.declarations.len() != 1 {
        return None;
    }
    let declarator = &decl.declarations[0];
    let BindingPattern::BindingIdentifier(name) = &declarator.id else { return None };
    let Some(Expression::CallExpression(call)) = &declarator.init else { return None };
    let Expression::ComputedMemberExpression(member) = &call.callee else { return None };
    let Expression::StringLiteral(pad) = &member.object else { return None };
    let Expression::StringLiteral(method) = &member.expression else { return None };
    if method.value.as_str() != "split" {
        return None;
    }
    if call.arguments.len() != 1 {
        return None;
    }
    let Some(Expression::StringLiteral(sep)) = call.arguments[0].as_expression() else {
        return None;
    };
    Some((name.name.as_str().to_string(), pad.value.as_str().to_string(), sep.value.as_str().to_string()))
}

fn single_declarator_name(stmt: &Statement<'_>) -> Option<String> {
    let Statement::VariableDeclaration(decl) = stmt else { return None };
    if decl.declarations.len() != 1 {
        return None;
    }
    let BindingPattern::BindingIdentifier(ident) = &decl.declarations[0].id else {
        return None;
    };
    Some(ident.name.as_str().to_string())
}

/// `array[counter++]` — the discriminant shape the flattening loop requires.
fn discriminant_names(expr: &Expression<'_>) -> Option<(String, String)> {
    let Expression::ComputedMemberExpression(member) = expr else { return None };
    let Expression::Identifier(array_ident) = &member.object else { return None };
    let Expression::UpdateExpression(update) = &member.expression else { return None };
    if update.operator != UpdateOperator::Increment || update.prefix {
        return None;
    }
    let SimpleAssignmentTarget::AssignmentTargetIdentifier(counter_ident) = &update.argument else {
        return None;
    };
    Some((array_ident.name.as_str().to_string(), counter_ident.name.as_str().to_string()))
}

/// Strip bare `continue` statements from a dispatched case body (they all
/// targeted the loop this transform is removing).
fn strip_continue<'a>(body: ArenaVec<'a, Statement<'a>>, ctx: &mut Ctx<'a>) -> ArenaVec<'a, Statement<'a>> {
    let mut out = ctx.ast.vec_with_capacity(body.len());
    for stmt in body {
        if matches!(stmt, Statement::ContinueStatement(_)) {
            continue;
        }
        out.push(stmt);
    }
    out
}

/// If `while_stmt` matches the flattened-loop shape and `array_name` is
/// known (found in the enclosing statement list's order-array map), builds
/// the flat replacement sequence and the (array, counter) names to drop.
fn try_unflatten<'a>(
    while_stmt: &mut WhileStatement<'a>,
    arrays: &FxHashMap<String, (String, String)>,
    ctx: &mut Ctx<'a>,
) -> Option<(String, String, Vec<Statement<'a>>)> {
    let Statement::BlockStatement(block) = &mut while_stmt.body else { return None };
    if block.body.len() != 2 {
        return None;
    }
    if !matches!(&block.body[1], Statement::BreakStatement(b) if b.label.is_none()) {
        return None;
    }
    let Statement::SwitchStatement(switch) = &mut block.body[0] else { return None };
    let (array_name, counter_name) = discriminant_names(&switch.discriminant)?;
    let (pad, sep) = arrays.get(&array_name)?;

    let order: Vec<&str> = if sep.is_empty() { vec![pad.as_str()] } else { pad.split(sep.as_str()).collect() };

    let original_cases = std::mem::replace(&mut switch.cases, ctx.ast.vec());
    let mut bodies: FxHashMap<String, ArenaVec<'a, Statement<'a>>> = FxHashMap::default();
    for case in original_cases {
        let Some(Expression::StringLiteral(label)) = &case.test else { continue };
        bodies.insert(label.value.as_str().to_string(), case.consequent);
    }

    let mut flattened = Vec::new();
    for label in order {
        if let Some(body) = bodies.remove(label) {
            for stmt in strip_continue(body, ctx) {
                flattened.push(stmt);
            }
        }
    }

    Some((array_name, counter_name, flattened))
}

fn unflatten_statements<'a>(stmts: &mut ArenaVec<'a, Statement<'a>>, ctx: &mut Ctx<'a>) {
    let mut arrays = FxHashMap::default();
    for stmt in stmts.iter() {
        if let Some((name, pad, sep)) = array_decl_shape(stmt) {
            arrays.insert(name, (pad, sep));
        }
    }
    if arrays.is_empty() {
        return;
    }

    let original: Vec<Statement<'a>> = std::mem::replace(stmts, ctx.ast.vec()).into_iter().collect();
    let mut names_to_remove: FxHashSet<String> = FxHashSet::default();
    let mut flattened_at: FxHashMap<usize, Vec<Statement<'a>>> = FxHashMap::default();
    let mut owned = original;

    for (i, stmt) in owned.iter_mut().enumerate() {
        if let Statement::WhileStatement(while_stmt) = stmt {
            if let Some((array_name, counter_name, flat)) = try_unflatten(while_stmt, &arrays, ctx) {
                names_to_remove.insert(array_name);
                names_to_remove.insert(counter_name);
                flattened_at.insert(i, flat);
                tracing::debug!("unflattened switch-dispatch loop");
            }
        }
    }

    let mut rebuilt = ctx.ast.vec_with_capacity(owned.len());
    for (i, stmt) in owned.into_iter().enumerate() {
        if let Some(name) = single_declarator_name(&stmt) {
            if names_to_remove.contains(&name) {
                continue;
            }
        }
        if let Some(flat) = flattened_at.remove(&i) {
            for s in flat {
                rebuilt.push(s);
            }
            continue;
        }
        rebuilt.push(stmt);
    }
    *stmts = rebuilt;
}

pub struct Unflattener;

impl Unflattener {
    pub fn new() -> Self {
        Self
    }
}

impl Default for Unflattener {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> Traverse<'a, DeobfuscateState> for Unflattener {
    fn exit_program(&mut self, program: &mut Program<'a>, ctx: &mut Ctx<'a>) {
        unflatten_statements(&mut program.body, ctx);
    }

    fn exit_block_statement(&mut self, block: &mut BlockStatement<'a>, ctx: &mut Ctx<'a>) {
        unflatten_statements(&mut block.body, ctx);
    }
}
