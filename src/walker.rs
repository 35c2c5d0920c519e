//! The recursive marshal/demarshal signature walker — the hard, interesting
//! part of this generator. `walk()` dispatches on the current element of a
//! `SigIter` and emits C source text that reads from or writes to a D-Bus
//! message iterator, threading ownership of freshly allocated memory and
//! OOM/type-mismatch cleanup through every nesting level.

use crate::sigiter::{SigIter, TypeCode};
use crate::symbol::typedef_name;
use crate::typeinfo::{basic_c_type, dbus_type_const, StructDef, Variable};

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Direction {
    Marshal,
    Demarshal,
}

/// Path components used to name any struct types introduced while walking,
/// carried immutably through the recursion.
#[derive(Clone, Debug)]
pub struct NamingContext {
    pub prefix: String,
    pub interface_symbol: String,
    pub member_symbol: String,
}

impl NamingContext {
    fn struct_symbol(&self, symbol: &str) -> String {
        typedef_name(
            &self.prefix,
            Some(&self.interface_symbol),
            Some(&self.member_symbol),
            symbol,
            None,
        )
    }
}

/// Carried through every recursive call of `walk`; mutated in scope.
pub struct Env<'a> {
    /// Name of the native container newly allocated objects are logically
    /// parented to (ownership bookkeeping only; Rust's real ownership is
    /// expressed by the accumulator `Vec`s themselves).
    pub parent_var: String,
    /// Name of the message-iterator local at this nesting level.
    pub iter_var: String,
    /// Name of the native variable that will hold this element's value.
    pub name: String,
    /// Snippet to inline at every OOM failure point this level emits;
    /// already incorporates whatever cleanup the enclosing level needs.
    pub oom_error_code: String,
    /// Snippet to inline at every type-mismatch failure point.
    pub type_error_code: String,
    pub naming: NamingContext,
    pub outputs: &'a mut Vec<Variable>,
    pub locals: &'a mut Vec<Variable>,
    pub structs: &'a mut Vec<StructDef>,
}

impl<'a> Env<'a> {
    /// A child environment at the same `outputs`/`locals`/`structs`
    /// accumulators (they are hoisted to the outermost caller) but a new
    /// name/iterator/error-snippet scope.
    fn child(&mut self, iter_var: String, name: String, oom: String, type_err: String) -> Env<'_> {
        Env {
            parent_var: self.name.clone(),
            iter_var,
            name,
            oom_error_code: oom,
            type_error_code: type_err,
            naming: self.naming.clone(),
            outputs: self.outputs,
            locals: self.locals,
            structs: self.structs,
        }
    }
}

/// `walk(direction, iter, env) -> code_text`. Dispatches on `iter.current_type()`.
pub fn walk(direction: Direction, iter: &SigIter, env: &mut Env) -> String {
    let code = iter.current_type();
    if code.is_basic() {
        walk_basic(direction, code, env)
    } else {
        match code {
            TypeCode::Array => walk_array(direction, iter, env),
            TypeCode::Struct | TypeCode::DictEntry => walk_struct(direction, iter, env),
            _ => format!("/* unreachable: invalid signature element {:?} */\n", code),
        }
    }
}

fn type_check(env: &Env, code: TypeCode) -> String {
    format!(
        "if (dbus_message_iter_get_arg_type (&{iter}) != {ty}) {{\n\t{err}}}\n",
        iter = env.iter_var,
        ty = dbus_type_const(code),
        err = indent_block(&env.type_error_code),
    )
}

fn indent_block(s: &str) -> String {
    // Every line of a nested error snippet is indented one extra tab when
    // inlined inside an `if` body, matching the original's nested-brace style.
    s.lines()
        .map(|l| if l.is_empty() { String::new() } else { format!("\t{}\n", l) })
        .collect::<String>()
}

fn walk_basic(direction: Direction, code: TypeCode, env: &mut Env) -> String {
    match direction {
        Direction::Demarshal => demarshal_basic(code, env),
        Direction::Marshal => marshal_basic(code, env),
    }
}

fn demarshal_basic(code: TypeCode, env: &mut Env) -> String {
    let mut s = String::new();
    s += &type_check(env, code);

    if code.is_fixed() {
        let ty = basic_c_type(code, true);
        env.locals.push(Variable::new(ty, format!("{}_dbus", env.name)));
        s += &format!(
            "dbus_message_iter_get_basic (&{iter}, &{name}_dbus);\n",
            iter = env.iter_var,
            name = env.name
        );
        s += &format!("{} = {}_dbus;\n", env.name, env.name);
        env.outputs.push(Variable::new(ty, env.name.clone()));
    } else {
        // BASIC-VARIABLE: string, object_path, signature.
        env.locals.push(Variable::new("const char *", format!("{}_dbus", env.name)));
        s += &format!(
            "dbus_message_iter_get_basic (&{iter}, &{name}_dbus);\n",
            iter = env.iter_var,
            name = env.name
        );
        s += &format!(
            "{name} = strdup ({name}_dbus);\n\
             if ({name} == NULL) {{\n\t{oom}}}\n",
            name = env.name,
            oom = indent_block(&env.oom_error_code),
        );
        env.outputs.push(Variable::new(basic_c_type(code, true), env.name.clone()));
    }
    s += &format!("dbus_message_iter_next (&{});\n", env.iter_var);
    s
}

fn marshal_basic(code: TypeCode, env: &mut Env) -> String {
    let ty = basic_c_type(code, false);
    env.inputs_push(ty, env.name.clone());
    let mut s = String::new();
    s += &format!(
        "if (! dbus_message_iter_append_basic (&{iter}, {tyc}, &{name})) {{\n\t{oom}}}\n",
        iter = env.iter_var,
        tyc = dbus_type_const(code),
        name = env.name,
        oom = indent_block(&env.oom_error_code),
    );
    s
}

// Small helper so marshal_basic (which pushes to `outputs`, even though a
// marshal direction's accumulated variables are really its function's
// inputs — there's a single `outputs`-shaped accumulator and emitters
// reinterpret it per direction) stays readable.
impl<'a> Env<'a> {
    fn inputs_push(&mut self, ty: &str, name: String) {
        self.outputs.push(Variable::new(ty, name));
    }
}

fn walk_array(direction: Direction, iter: &SigIter, env: &mut Env) -> String {
    match direction {
        Direction::Demarshal => demarshal_array(iter, env),
        Direction::Marshal => marshal_array(iter, env),
    }
}

fn demarshal_array(iter: &SigIter, env: &mut Env) -> String {
    let element = iter.recurse().expect("array element signature");
    let fixed_element = element.is_fixed();
    let elem_sig = element.signature_string().to_owned();

    let mut s = String::new();
    s += &type_check(env, TypeCode::Array);

    let subiter = format!("{}_iter", env.iter_var);
    let elem_name = format!("{}_element", env.name);
    let size_name = if fixed_element {
        format!("{}_len", env.name)
    } else {
        format!("{}_size", env.name)
    };

    s += &format!(
        "{{\n\
         \tDBusMessageIter {subiter};\n\
         \tsize_t {size} = 0;\n\n\
         \t{name} = NULL;\n\n\
         \tdbus_message_iter_recurse (&{iter}, &{subiter});\n\n\
         \twhile (dbus_message_iter_get_arg_type (&{subiter}) != DBUS_TYPE_INVALID) {{\n",
        subiter = subiter,
        size = size_name,
        name = env.name,
        iter = env.iter_var,
    );

    // The element body frees the partially built array on any failure.
    let free_partial = format!("if ({name}) free ({name});\n", name = env.name);
    let elem_oom = format!("{}{}", free_partial, env.oom_error_code);
    let elem_type_err = format!("{}{}", free_partial, env.type_error_code);

    let mut elem_env = env.child(subiter.clone(), elem_name.clone(), elem_oom, elem_type_err);
    let elem_code = walk(Direction::Demarshal, &element, &mut elem_env);
    // elem_env shares env's outputs/locals/structs accumulators, so whatever
    // the element walk pushed is already visible to the caller; the array's
    // own output (below) is the one the enclosing scope actually binds to.

    for line in indent_lines(&elem_code, 2) {
        s += &line;
    }

    if fixed_element {
        s += &format!(
            "\n\t\tif ({size} == SIZE_MAX) {{\n\t\t\t{oom}}}\n\
             \t\t{{\n\
             \t\t\tvoid *new_{name} = realloc ({name}, sizeof (*{name}) * ({size} + 1));\n\
             \t\t\tif (new_{name} == NULL) {{\n\t\t\t\t{oom}}}\n\
             \t\t\t{name} = new_{name};\n\
             \t\t}}\n\
             \t\t{name}[{size}] = {elem};\n\
             \t\t{size}++;\n",
            size = size_name,
            oom = indent_block(&env.oom_error_code).replace('\n', "\n\t\t\t"),
            name = env.name,
            elem = elem_name,
        );
        env.locals.push(Variable::new("size_t", size_name.clone()));
        env.outputs.push(Variable::array_of(format!("{}*", basic_c_type(element.current_type(), true)), env.name.clone()));
        env.outputs.push(Variable::new("size_t", size_name));
    } else {
        s += &format!(
            "\n\t\t{{\n\
             \t\t\tvoid *new_{name} = realloc ({name}, sizeof (*{name}) * ({size} + 2));\n\
             \t\t\tif (new_{name} == NULL) {{\n\t\t\t\t{oom}}}\n\
             \t\t\t{name} = new_{name};\n\
             \t\t}}\n\
             \t\t{name}[{size}] = {elem};\n\
             \t\t{name}[{size} + 1] = NULL;\n\
             \t\t{size}++;\n",
            size = size_name,
            oom = indent_block(&env.oom_error_code).replace('\n', "\n\t\t\t"),
            name = env.name,
            elem = elem_name,
        );
        env.locals.push(Variable::new("size_t", size_name));
        env.outputs.push(Variable::array_of(to_pointer_elem(&element), env.name.clone()));
    }

    s += &format!(
        "\t\tdbus_message_iter_next (&{subiter});\n\
         \t}}\n\
         }}\n\
         dbus_message_iter_next (&{iter});\n",
        subiter = subiter,
        iter = env.iter_var,
    );

    let _ = elem_sig;
    s
}

fn to_pointer_elem(element: &SigIter) -> String {
    crate::typeinfo::to_pointer(basic_c_type(element.current_type(), true))
}

/// The owning C type spelling a demarshalled value of `sig` is stored as,
/// without emitting any code. Used wherever a type is needed before (or
/// independent of) actually walking the element — struct field
/// declarations and the item locals a struct marshaller reads member
/// values into, and by the emitters to declare function parameters without
/// re-walking a signature just to learn its type.
pub fn field_c_type(sig: &SigIter, naming: &NamingContext, symbol: &str) -> String {
    match sig.current_type() {
        TypeCode::Array => {
            let element = sig.recurse().expect("array element signature");
            if element.is_fixed() {
                format!("{} *", basic_c_type(element.current_type(), true))
            } else {
                crate::typeinfo::to_pointer(&field_c_type(&element, naming, symbol))
            }
        }
        TypeCode::Struct | TypeCode::DictEntry => {
            format!("{} *", naming.struct_symbol(symbol))
        }
        code => basic_c_type(code, true).to_owned(),
    }
}

fn marshal_array(iter: &SigIter, env: &mut Env) -> String {
    let element = iter.recurse().expect("array element signature");
    let fixed_element = element.is_fixed();
    let elem_sig = element.signature_string().to_owned();
    let elem_name = format!("{}_element", env.name);

    env.inputs_push(
        &if fixed_element {
            format!("const {} *", basic_c_type(element.current_type(), false))
        } else {
            format!("{} const *", basic_c_type(element.current_type(), false))
        },
        env.name.clone(),
    );

    let mut s = String::new();
    s += &format!(
        "{{\n\tDBusMessageIter {name}_iter;\n\n\
         \tif (! dbus_message_iter_open_container (&{iter}, DBUS_TYPE_ARRAY, \"{sig}\", &{name}_iter)) {{\n\t\t{oom}}}\n\n",
        name = env.name,
        iter = env.iter_var,
        sig = elem_sig,
        oom = indent_block(&env.oom_error_code).replace('\n', "\n\t\t"),
    );

    let loop_cond = if fixed_element {
        format!("size_t {name}_i;\n\tfor ({name}_i = 0; {name}_i < {name}_len; {name}_i++)", name = env.name)
    } else {
        format!("size_t {name}_i;\n\tfor ({name}_i = 0; {name}[{name}_i] != NULL; {name}_i++)", name = env.name)
    };
    s += &format!("\t{}\n\t{{\n\t\t{ty} {elem} = {name}[{name}_i];\n", loop_cond, ty = basic_c_type(element.current_type(), false), elem = elem_name, name = env.name);

    // Abandon the container (and any enclosing ones) on failure inside the loop.
    let abandon = format!(
        "dbus_message_iter_abandon_container (&{iter}, &{name}_iter);\n",
        iter = env.iter_var,
        name = env.name
    );
    let elem_oom = format!("{}{}", abandon, env.oom_error_code);
    let elem_type_err = format!("{}{}", abandon, env.type_error_code);
    let mut elem_env = env.child(format!("{}_iter", env.name), elem_name.clone(), elem_oom, elem_type_err);
    let elem_code = walk(Direction::Marshal, &element, &mut elem_env);
    for line in indent_lines(&elem_code, 2) {
        s += &line;
    }

    s += "\t}\n\n";
    s += &format!(
        "\tif (! dbus_message_iter_close_container (&{iter}, &{name}_iter)) {{\n\t\t{oom}}}\n}}\n",
        iter = env.iter_var,
        name = env.name,
        oom = indent_block(&env.oom_error_code).replace('\n', "\n\t\t"),
    );

    if fixed_element {
        // The caller already knows how many elements it has; this is an
        // input the generated function signature must accept, not a local
        // the generator invents.
        env.inputs_push("size_t", format!("{}_len", env.name));
    }
    s
}

fn walk_struct(direction: Direction, iter: &SigIter, env: &mut Env) -> String {
    match direction {
        Direction::Demarshal => demarshal_struct(iter, env),
        Direction::Marshal => marshal_struct(iter, env),
    }
}

fn struct_members(iter: &SigIter) -> Vec<SigIter> {
    let mut v = Vec::new();
    let mut cur = iter.recurse().expect("struct member signature");
    loop {
        let done_after = !cur.clone().next();
        v.push(cur.clone());
        if done_after {
            break;
        }
        cur.next();
    }
    v
}

fn demarshal_struct(iter: &SigIter, env: &mut Env) -> String {
    let is_dict_entry = iter.current_type() == TypeCode::DictEntry;
    let struct_name = env.naming.struct_symbol(&env.name);
    let mut s = String::new();
    s += &type_check(env, if is_dict_entry { TypeCode::DictEntry } else { TypeCode::Struct });

    let subiter = format!("{}_iter", env.iter_var);
    s += &format!(
        "{name} = nih_new ({parent}, {sname});\n\
         if ({name} == NULL) {{\n\t{oom}}}\n\n\
         dbus_message_iter_recurse (&{iter}, &{subiter});\n",
        name = env.name,
        parent = env.parent_var,
        sname = struct_name,
        iter = env.iter_var,
        oom = indent_block(&env.oom_error_code),
        subiter = subiter,
    );

    let free_partial = format!("nih_free ({});\n", env.name);
    let members = struct_members(iter);
    let mut member_vars: Vec<Variable> = Vec::new();
    for (idx, member_sig) in members.iter().enumerate() {
        let item_name = format!("item{}", idx);
        let oom = format!("{}{}", free_partial, env.oom_error_code);
        let type_err = format!("{}{}", free_partial, env.type_error_code);
        let mut member_env = env.child(subiter.clone(), item_name.clone(), oom, type_err);
        member_env.naming.member_symbol = format!("{}_{}", env.naming.member_symbol, env.name);
        let member_code = walk(Direction::Demarshal, member_sig, &mut member_env);
        for line in indent_lines(&member_code, 0) {
            s += &line;
        }
        s += &format!("{}->{item} = {item};\n", env.name, item = item_name);
        member_vars.push(Variable::new(field_c_type(member_sig, &env.naming, &item_name), item_name));
    }

    env.structs.push(StructDef {
        name: struct_name.clone(),
        members: member_vars,
    });

    s += &format!(
        "if (dbus_message_iter_get_arg_type (&{subiter}) != DBUS_TYPE_INVALID) {{\n\t{free}\t{err}}}\n\
         dbus_message_iter_next (&{iter});\n",
        subiter = subiter,
        free = indent_block(&free_partial),
        err = indent_block(&env.type_error_code),
        iter = env.iter_var,
    );

    env.outputs.push(Variable::new(format!("{} *", struct_name), env.name.clone()));
    s
}

fn marshal_struct(iter: &SigIter, env: &mut Env) -> String {
    let is_dict_entry = iter.current_type() == TypeCode::DictEntry;
    let struct_name = env.naming.struct_symbol(&env.name);
    env.inputs_push(&format!("const {} *", struct_name), env.name.clone());

    let container_type = if is_dict_entry { "DBUS_TYPE_DICT_ENTRY" } else { "DBUS_TYPE_STRUCT" };
    let subiter = format!("{}_iter", env.name);
    let mut s = format!(
        "{{\n\tDBusMessageIter {subiter};\n\n\
         \tif (! dbus_message_iter_open_container (&{iter}, {ctype}, NULL, &{subiter})) {{\n\t\t{oom}}}\n\n",
        subiter = subiter,
        iter = env.iter_var,
        ctype = container_type,
        oom = indent_block(&env.oom_error_code).replace('\n', "\n\t\t"),
    );

    let members = struct_members(iter);
    let mut member_vars: Vec<Variable> = Vec::new();
    let abandon = format!(
        "dbus_message_iter_abandon_container (&{iter}, &{subiter});\n",
        iter = env.iter_var,
        subiter = subiter
    );
    for (idx, member_sig) in members.iter().enumerate() {
        let item_name = format!("item{}", idx);
        let oom = format!("{}{}", abandon, env.oom_error_code);
        let type_err = format!("{}{}", abandon, env.type_error_code);
        let mut member_env = env.child(subiter.clone(), item_name.clone(), oom, type_err);
        let item_type = field_c_type(member_sig, &env.naming, &item_name);
        s += &format!("\t{{\n\t\t{} {} = {}->{};\n", item_type, item_name, env.name, item_name);
        let member_code = walk(Direction::Marshal, member_sig, &mut member_env);
        for line in indent_lines(&member_code, 2) {
            s += &line;
        }
        s += "\t}\n";
        member_vars.push(Variable::new(item_type, item_name));
    }

    s += &format!(
        "\n\tif (! dbus_message_iter_close_container (&{iter}, &{subiter})) {{\n\t\t{oom}}}\n}}\n",
        iter = env.iter_var,
        subiter = subiter,
        oom = indent_block(&env.oom_error_code).replace('\n', "\n\t\t"),
    );

    env.structs.push(StructDef {
        name: struct_name,
        members: member_vars,
    });

    s
}

fn indent_lines(s: &str, extra_tabs: usize) -> Vec<String> {
    let pad = "\t".repeat(extra_tabs);
    s.lines()
        .map(|l| if l.is_empty() { "\n".to_owned() } else { format!("{}{}\n", pad, l) })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env<'a>(
        outputs: &'a mut Vec<Variable>,
        locals: &'a mut Vec<Variable>,
        structs: &'a mut Vec<StructDef>,
    ) -> Env<'a> {
        Env {
            parent_var: "parent".into(),
            iter_var: "iter".into(),
            name: "value".into(),
            oom_error_code: "return NULL;\n".into(),
            type_error_code: "goto type_error;\n".into(),
            naming: NamingContext {
                prefix: "my".into(),
                interface_symbol: "com_example_foo".into(),
                member_symbol: "my_method".into(),
            },
            outputs,
            locals,
            structs,
        }
    }

    #[test]
    fn demarshal_byte_emits_type_check_and_advance() {
        let mut outputs = Vec::new();
        let mut locals = Vec::new();
        let mut structs = Vec::new();
        let iter = SigIter::new("y").unwrap();
        let mut e = env(&mut outputs, &mut locals, &mut structs);
        let code = walk(Direction::Demarshal, &iter, &mut e);
        assert!(code.contains("DBUS_TYPE_BYTE"));
        assert!(code.contains("dbus_message_iter_get_basic"));
        assert!(code.contains("dbus_message_iter_next (&iter);"));
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].name, "value");
        assert_eq!(outputs[0].type_spelling, "uint8_t");
    }

    #[test]
    fn demarshal_string_allocates_and_checks_oom() {
        let mut outputs = Vec::new();
        let mut locals = Vec::new();
        let mut structs = Vec::new();
        let iter = SigIter::new("s").unwrap();
        let mut e = env(&mut outputs, &mut locals, &mut structs);
        let code = walk(Direction::Demarshal, &iter, &mut e);
        assert!(code.contains("strdup"));
        assert!(code.contains("return NULL;"));
        assert!(locals.iter().any(|v| v.name == "value_dbus"));
    }

    #[test]
    fn demarshal_array_of_fixed_exports_length() {
        let mut outputs = Vec::new();
        let mut locals = Vec::new();
        let mut structs = Vec::new();
        let iter = SigIter::new("an").unwrap();
        let mut e = env(&mut outputs, &mut locals, &mut structs);
        let code = walk(Direction::Demarshal, &iter, &mut e);
        assert!(code.contains("realloc"));
        assert!(outputs.iter().any(|v| v.name == "value_len" && v.type_spelling == "size_t"));
        assert!(outputs.iter().any(|v| v.name == "value" && v.array));
    }

    #[test]
    fn demarshal_array_of_strings_is_null_terminated_no_length_output() {
        let mut outputs = Vec::new();
        let mut locals = Vec::new();
        let mut structs = Vec::new();
        let iter = SigIter::new("as").unwrap();
        let mut e = env(&mut outputs, &mut locals, &mut structs);
        let code = walk(Direction::Demarshal, &iter, &mut e);
        assert!(code.contains("NULL"));
        assert!(!outputs.iter().any(|v| v.name == "value_len"));
        assert!(outputs.iter().any(|v| v.name == "value"));
    }

    #[test]
    fn demarshal_struct_frees_partial_on_error_path() {
        let mut outputs = Vec::new();
        let mut locals = Vec::new();
        let mut structs = Vec::new();
        let iter = SigIter::new("(su)").unwrap();
        let mut e = env(&mut outputs, &mut locals, &mut structs);
        let code = walk(Direction::Demarshal, &iter, &mut e);
        assert!(code.contains("free (value)"));
        assert_eq!(structs.len(), 1);
        assert_eq!(structs[0].members.len(), 2);
    }
}
