//! Member emitters: compose `walker::walk` fragments with asserts,
//! pending-call plumbing, and error-reply construction into complete C
//! functions, one emitter family per AST member kind.

pub mod method;
pub mod property;
pub mod signal;

use crate::ast::Argument;
use crate::sigiter::SigIter;
use crate::typeinfo::{Function, StructDef, Variable};
use crate::walker::{walk, Direction, Env, NamingContext};

/// One emitted C function: its declaration/definition header plus body.
#[derive(Clone, Debug)]
pub struct EmittedFunction {
    pub func: Function,
    pub body: String,
    pub is_static: bool,
}

impl EmittedFunction {
    pub fn render(&self) -> String {
        format!("{}\n{} {{\n{}}}\n", if self.is_static { "static" } else { "" }, self.func.render_header(), self.body)
    }
}

/// Result of walking a whole argument list in one direction: the combined
/// code fragment, the per-argument `Variable`s the walker recorded, the
/// hoisted locals, and any struct definitions introduced along the way.
pub struct WalkedArgs {
    pub code: String,
    pub vars: Vec<Variable>,
    pub locals: Vec<Variable>,
    pub structs: Vec<StructDef>,
}

/// Demarshals each of `args` in order out of `iter_var`, threading the
/// "free everything demarshalled so far" discipline across arguments the
/// same way a struct's members do across `itemN`s: each argument's error
/// snippets are the final snippet prefixed with frees for every argument
/// already demarshalled.
pub fn demarshal_args(
    naming: &NamingContext,
    parent_var: &str,
    iter_var: &str,
    args: &[Argument],
    final_oom: &str,
    final_type_err: &str,
) -> WalkedArgs {
    let mut code = String::new();
    let mut vars = Vec::new();
    let mut locals = Vec::new();
    let mut structs = Vec::new();
    let mut free_so_far = String::new();

    for (idx, arg) in args.iter().enumerate() {
        let name = arg.symbol(idx);
        let sig = SigIter::new(&arg.type_signature).expect("AST carries only validated signatures");
        let oom = format!("{}{}", free_so_far, final_oom);
        let type_err = format!("{}{}", free_so_far, final_type_err);
        {
            let mut env = Env {
                parent_var: parent_var.to_owned(),
                iter_var: iter_var.to_owned(),
                name: name.clone(),
                oom_error_code: oom,
                type_error_code: type_err,
                naming: naming.clone(),
                outputs: &mut vars,
                locals: &mut locals,
                structs: &mut structs,
            };
            code += &walk(Direction::Demarshal, &sig, &mut env);
        }
        if !sig.is_fixed() {
            let free_fn = if matches!(sig.current_type(), crate::sigiter::TypeCode::Struct | crate::sigiter::TypeCode::DictEntry) {
                "nih_free"
            } else {
                "free"
            };
            free_so_far += &format!("{} ({});\n", free_fn, name);
        }
    }

    WalkedArgs { code, vars, locals, structs }
}

/// Marshals each of `args` into `iter_var`, symmetric to `demarshal_args`.
/// No cross-argument free threading is needed: the caller only ever
/// abandons still-open containers on failure, never frees caller-owned
/// input values.
pub fn marshal_args(
    naming: &NamingContext,
    iter_var: &str,
    args: &[Argument],
    oom_error_code: &str,
    type_error_code: &str,
) -> WalkedArgs {
    let mut code = String::new();
    let mut vars = Vec::new();
    let mut locals = Vec::new();
    let mut structs = Vec::new();

    for (idx, arg) in args.iter().enumerate() {
        let name = arg.symbol(idx);
        let sig = SigIter::new(&arg.type_signature).expect("AST carries only validated signatures");
        let mut env = Env {
            parent_var: "message".to_owned(),
            iter_var: iter_var.to_owned(),
            name,
            oom_error_code: oom_error_code.to_owned(),
            type_error_code: type_error_code.to_owned(),
            naming: naming.clone(),
            outputs: &mut vars,
            locals: &mut locals,
            structs: &mut structs,
        };
        code += &walk(Direction::Marshal, &sig, &mut env);
    }

    WalkedArgs { code, vars, locals, structs }
}
