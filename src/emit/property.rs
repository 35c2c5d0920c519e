//! Property emitters: object-side get/set handlers (wrapped by the
//! `org.freedesktop.DBus.Properties` `Get`/`Set` dispatch that `node.rs`
//! assembles) and proxy-side get/set async+sync pairs.
//!
//! A property's value travels inside a `DBUS_TYPE_VARIANT` container; the
//! variant open/close is the one piece of marshal/demarshal code this
//! module writes directly rather than delegating to `walker::walk`, since
//! the walker only knows fixed D-Bus signatures and a variant's inner type
//! is the property's own signature, decided here, not discovered by
//! recursing into `"v"`.
//!
//! Emits, per readable/writable property: an object-side getter/setter, and
//! proxy-side synchronous get/set wrappers around the `Properties`
//! interface.

use crate::ast::{Access, Property};
use crate::emit::EmittedFunction;
use crate::render::indent;
use crate::sigiter::SigIter;
use crate::symbol;
use crate::typeinfo::{Function, StructDef, Variable};
use crate::walker::{walk, Direction, Env, NamingContext};

pub struct PropertyEmission {
    pub get_function: Option<EmittedFunction>,
    pub set_function: Option<EmittedFunction>,
    pub proxy_get_sync_function: EmittedFunction,
    pub proxy_set_sync_function: EmittedFunction,
    pub structs: Vec<StructDef>,
}

pub fn emit(naming: &NamingContext, property: &Property) -> PropertyEmission {
    let mut structs = Vec::new();
    let get_function = if property.access.readable() {
        Some(object_get_function(naming, property, &mut structs))
    } else {
        None
    };
    let set_function = if property.access.writable() {
        Some(object_set_function(naming, property, &mut structs))
    } else {
        None
    };
    let proxy_get_sync_function = proxy_get_sync_function(naming, property, &mut structs);
    let proxy_set_sync_function = proxy_set_sync_function(naming, property, &mut structs);

    PropertyEmission { get_function, set_function, proxy_get_sync_function, proxy_set_sync_function, structs }
}

fn value_var(property: &Property) -> Variable {
    let sig = SigIter::new(&property.type_signature).expect("validated signature");
    let naming = NamingContext { prefix: String::new(), interface_symbol: String::new(), member_symbol: String::new() };
    Variable::new(crate::walker::field_c_type(&sig, &naming, "value"), "value")
}

/// `iface_get_property_name (object, message, iter)`: marshals the current
/// value into a variant sub-iterator inside `iter`.
fn object_get_function(naming: &NamingContext, property: &Property, structs: &mut Vec<StructDef>) -> EmittedFunction {
    let name = symbol::extern_name(&naming.prefix, Some(&naming.interface_symbol), Some("get"), &property.symbol(), None);
    let sig = SigIter::new(&property.type_signature).expect("validated signature");

    let mut f = Function::new("int", name);
    f.args.push(Variable::new("void *", "object"));
    f.args.push(Variable::new("DBusMessage *", "message"));
    f.args.push(Variable::new("DBusMessageIter *", "iter"));

    let mut env = Env {
        parent_var: "message".to_owned(),
        iter_var: "variter".to_owned(),
        name: "value".to_owned(),
        oom_error_code: "dbus_message_iter_abandon_container (iter, &variter);\nreturn -1;\n".to_owned(),
        type_error_code: "dbus_message_iter_abandon_container (iter, &variter);\nreturn -1;\n".to_owned(),
        naming: naming.clone(),
        outputs: &mut Vec::new(),
        locals: &mut Vec::new(),
        structs,
    };
    let marshal_code = walk(Direction::Marshal, &sig, &mut env);

    let body = format!(
        "\tDBusMessageIter variter;\n\
         \t{value_decl}\n\n\
         \tassert (object != NULL);\n\
         \tassert (message != NULL);\n\
         \tassert (iter != NULL);\n\n\
         \tif ({prefix}_get_{member} (object, message, &value) < 0)\n\t\treturn -1;\n\n\
         \tif (! dbus_message_iter_open_container (iter, DBUS_TYPE_VARIANT, \"{sig}\", &variter))\n\
         \t\tnih_return_no_memory_error (-1);\n\n\
         {marshal}\
         \tif (! dbus_message_iter_close_container (iter, &variter))\n\
         \t\tnih_return_no_memory_error (-1);\n\n\
         \treturn 0;\n",
        value_decl = value_var(property).declare(),
        prefix = naming.prefix,
        member = property.symbol(),
        sig = property.type_signature,
        marshal = indent(&marshal_code, 1),
    );

    EmittedFunction { func: f, body, is_static: false }
}

/// `iface_set_property_name (object, message, iter)`: demarshals the new
/// value out of the incoming variant sub-iterator and invokes the setter.
fn object_set_function(naming: &NamingContext, property: &Property, structs: &mut Vec<StructDef>) -> EmittedFunction {
    let name = symbol::extern_name(&naming.prefix, Some(&naming.interface_symbol), Some("set"), &property.symbol(), None);
    let sig = SigIter::new(&property.type_signature).expect("validated signature");

    let mut f = Function::new("int", name);
    f.args.push(Variable::new("void *", "object"));
    f.args.push(Variable::new("DBusMessage *", "message"));
    f.args.push(Variable::new("DBusMessageIter *", "iter"));

    let mut env = Env {
        parent_var: "message".to_owned(),
        iter_var: "variter".to_owned(),
        name: "value".to_owned(),
        oom_error_code: "return -1;\n".to_owned(),
        type_error_code: "nih_return_error (-1, NIH_DBUS_INVALID_ARGS, _(\"Invalid property value\"));\n".to_owned(),
        naming: naming.clone(),
        outputs: &mut Vec::new(),
        locals: &mut Vec::new(),
        structs,
    };
    let demarshal_code = walk(Direction::Demarshal, &sig, &mut env);

    let body = format!(
        "\tDBusMessageIter variter;\n\
         \t{value_decl}\n\n\
         \tassert (object != NULL);\n\
         \tassert (message != NULL);\n\
         \tassert (iter != NULL);\n\n\
         \tif (dbus_message_iter_get_arg_type (iter) != DBUS_TYPE_VARIANT)\n\
         \t\tnih_return_error (-1, NIH_DBUS_INVALID_ARGS, _(\"Invalid property value\"));\n\n\
         \tdbus_message_iter_recurse (iter, &variter);\n\n\
         {demarshal}\
         \tif ({prefix}_set_{member} (object, message, value) < 0)\n\t\treturn -1;\n\n\
         \treturn 0;\n",
        value_decl = value_var(property).declare(),
        prefix = naming.prefix,
        member = property.symbol(),
        demarshal = indent(&demarshal_code, 1),
    );

    EmittedFunction { func: f, body, is_static: false }
}

/// `iface_get_property_name_sync`: issues `Properties.Get` and blocks for
/// the reply, demarshalling the variant payload into `*value`.
fn proxy_get_sync_function(naming: &NamingContext, property: &Property, structs: &mut Vec<StructDef>) -> EmittedFunction {
    let name = symbol::extern_name(&naming.prefix, Some(&naming.interface_symbol), Some("get"), &property.symbol(), Some("sync"));
    let sig = SigIter::new(&property.type_signature).expect("validated signature");

    let mut f = Function::new("int", name);
    f.args.push(Variable::new("void *", "parent"));
    f.args.push(Variable::new("DBusConnection *", "connection"));
    f.args.push(Variable::new("const char *", "origin"));
    f.args.push(Variable::new("const char *", "path"));
    let output = value_var(property).to_pointer();
    f.args.push(Variable::new(output.type_spelling, format!("{}_output", output.name)));

    let mut env = Env {
        parent_var: "reply".to_owned(),
        iter_var: "variter".to_owned(),
        name: "value".to_owned(),
        oom_error_code: "return -1;\n".to_owned(),
        type_error_code: "nih_return_error (-1, NIH_DBUS_INVALID_ARGS, _(\"Invalid property value\"));\n".to_owned(),
        naming: naming.clone(),
        outputs: &mut Vec::new(),
        locals: &mut Vec::new(),
        structs,
    };
    let demarshal_code = walk(Direction::Demarshal, &sig, &mut env);

    let body = format!(
        "\tDBusMessage *method_call, *reply;\n\
         \tDBusMessageIter iter, variter;\n\
         \tDBusError error;\n\
         \t{value_decl}\n\n\
         \tassert (connection != NULL);\n\
         \tassert (origin != NULL);\n\
         \tassert (path != NULL);\n\
         \tassert (value_output != NULL);\n\n\
         \tmethod_call = dbus_message_new_method_call (origin, path, \"org.freedesktop.DBus.Properties\", \"Get\");\n\
         \tif (! method_call)\n\t\tnih_return_no_memory_error (-1);\n\n\
         \tdbus_message_iter_init_append (method_call, &iter);\n\
         \t{{\n\
         \t\tconst char *interface = \"{iface}\";\n\
         \t\tconst char *member = \"{member}\";\n\
         \t\tNIH_MUST (dbus_message_iter_append_basic (&iter, DBUS_TYPE_STRING, &interface));\n\
         \t\tNIH_MUST (dbus_message_iter_append_basic (&iter, DBUS_TYPE_STRING, &member));\n\
         \t}}\n\n\
         \tdbus_error_init (&error);\n\
         \treply = dbus_connection_send_with_reply_and_block (connection, method_call, -1, &error);\n\
         \tdbus_message_unref (method_call);\n\
         \tif (! reply) {{\n\
         \t\tnih_dbus_error_raise (error.name, error.message);\n\
         \t\tdbus_error_free (&error);\n\
         \t\treturn -1;\n\
         \t}}\n\n\
         \tdbus_message_iter_init (reply, &iter);\n\
         \tif (dbus_message_iter_get_arg_type (&iter) != DBUS_TYPE_VARIANT) {{\n\
         \t\tdbus_message_unref (reply);\n\
         \t\tnih_return_error (-1, NIH_DBUS_INVALID_ARGS, _(\"Invalid property value\"));\n\
         \t}}\n\
         \tdbus_message_iter_recurse (&iter, &variter);\n\n\
         {demarshal}\
         \t*value_output = value;\n\n\
         \tdbus_message_unref (reply);\n\n\
         \treturn 0;\n",
        value_decl = value_var(property).declare(),
        iface = naming.interface_symbol,
        member = property.name,
        demarshal = indent(&demarshal_code, 1),
    );

    EmittedFunction { func: f, body, is_static: false }
}

/// `iface_set_property_name_sync`: marshals `value` into a variant and
/// issues `Properties.Set`, blocking for the (empty) reply.
fn proxy_set_sync_function(naming: &NamingContext, property: &Property, structs: &mut Vec<StructDef>) -> EmittedFunction {
    let name = symbol::extern_name(&naming.prefix, Some(&naming.interface_symbol), Some("set"), &property.symbol(), Some("sync"));
    let sig = SigIter::new(&property.type_signature).expect("validated signature");

    let mut f = Function::new("int", name);
    f.args.push(Variable::new("DBusConnection *", "connection"));
    f.args.push(Variable::new("const char *", "origin"));
    f.args.push(Variable::new("const char *", "path"));
    f.args.push(value_var(property).to_const());

    let mut env = Env {
        parent_var: "method_call".to_owned(),
        iter_var: "variter".to_owned(),
        name: "value".to_owned(),
        oom_error_code: "dbus_message_unref (method_call);\nreturn -1;\n".to_owned(),
        type_error_code: "dbus_message_unref (method_call);\nreturn -1;\n".to_owned(),
        naming: naming.clone(),
        outputs: &mut Vec::new(),
        locals: &mut Vec::new(),
        structs,
    };
    let marshal_code = walk(Direction::Marshal, &sig, &mut env);

    let body = format!(
        "\tDBusMessage *method_call, *reply;\n\
         \tDBusMessageIter iter, variter;\n\
         \tDBusError error;\n\n\
         \tassert (connection != NULL);\n\
         \tassert (origin != NULL);\n\
         \tassert (path != NULL);\n\n\
         \tmethod_call = dbus_message_new_method_call (origin, path, \"org.freedesktop.DBus.Properties\", \"Set\");\n\
         \tif (! method_call)\n\t\tnih_return_no_memory_error (-1);\n\n\
         \tdbus_message_iter_init_append (method_call, &iter);\n\
         \t{{\n\
         \t\tconst char *interface = \"{iface}\";\n\
         \t\tconst char *member = \"{member}\";\n\
         \t\tNIH_MUST (dbus_message_iter_append_basic (&iter, DBUS_TYPE_STRING, &interface));\n\
         \t\tNIH_MUST (dbus_message_iter_append_basic (&iter, DBUS_TYPE_STRING, &member));\n\
         \t}}\n\n\
         \tif (! dbus_message_iter_open_container (&iter, DBUS_TYPE_VARIANT, \"{sig}\", &variter))\n\
         \t\tnih_return_no_memory_error (-1);\n\n\
         {marshal}\
         \tif (! dbus_message_iter_close_container (&iter, &variter))\n\
         \t\tnih_return_no_memory_error (-1);\n\n\
         \tdbus_error_init (&error);\n\
         \treply = dbus_connection_send_with_reply_and_block (connection, method_call, -1, &error);\n\
         \tdbus_message_unref (method_call);\n\
         \tif (! reply) {{\n\
         \t\tnih_dbus_error_raise (error.name, error.message);\n\
         \t\tdbus_error_free (&error);\n\
         \t\treturn -1;\n\
         \t}}\n\n\
         \tdbus_message_unref (reply);\n\n\
         \treturn 0;\n",
        iface = naming.interface_symbol,
        member = property.name,
        sig = property.type_signature,
        marshal = indent(&marshal_code, 1),
    );

    EmittedFunction { func: f, body, is_static: false }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn naming() -> NamingContext {
        NamingContext { prefix: "my".into(), interface_symbol: "com_example_foo".into(), member_symbol: "colour".into() }
    }

    #[test]
    fn readonly_property_has_no_set_function() {
        let p = Property::new("Colour", "s", Access::Read);
        let emission = emit(&naming(), &p);
        assert!(emission.get_function.is_some());
        assert!(emission.set_function.is_none());
    }

    #[test]
    fn writable_property_emits_set_function() {
        let p = Property::new("Colour", "s", Access::ReadWrite);
        let emission = emit(&naming(), &p);
        assert!(emission.set_function.is_some());
        assert!(emission.get_function.is_some());
    }

    #[test]
    fn proxy_get_sync_uses_properties_interface() {
        let p = Property::new("Colour", "s", Access::Read);
        let emission = emit(&naming(), &p);
        assert!(emission.proxy_get_sync_function.body.contains("org.freedesktop.DBus.Properties"));
    }
}
