//! Signal emitters: the object-side emit function (builds and sends a
//! signal message) and the proxy-side filter function (demarshals a
//! matched incoming signal and invokes the user's handler).

use crate::ast::Signal;
use crate::emit::{demarshal_args, marshal_args, EmittedFunction};
use crate::symbol;
use crate::typeinfo::{Function, StructDef, Variable};
use crate::walker::NamingContext;

pub struct SignalEmission {
    pub emit_function: EmittedFunction,
    pub filter_function: EmittedFunction,
    pub structs: Vec<StructDef>,
}

pub fn emit(naming: &NamingContext, signal: &Signal) -> SignalEmission {
    let mut structs = Vec::new();
    let emit_fn = emit_function(naming, signal);
    let filter_fn = filter_function(naming, signal, &mut structs);
    SignalEmission { emit_function: emit_fn, filter_function: filter_fn, structs }
}

fn emit_function(naming: &NamingContext, signal: &Signal) -> EmittedFunction {
    let name = symbol::extern_name(&naming.prefix, Some(&naming.interface_symbol), None, &signal.symbol(), Some("emit"));

    let marshalled = marshal_args(
        naming,
        "iter",
        &signal.arguments,
        "dbus_message_unref (signal);\nreturn -1;\n",
        "dbus_message_unref (signal);\nreturn -1;\n",
    );

    let mut f = Function::new("int", name);
    f.args.push(Variable::new("DBusConnection *", "connection"));
    f.args.push(Variable::new("const char *", "origin_path"));
    f.args.extend(marshalled.vars);

    let body = format!(
        "\tDBusMessage *signal;\n\tDBusMessageIter iter;\n\n\
         \tsignal = dbus_message_new_signal (origin_path, \"{iface}\", \"{member}\");\n\
         \tif (! signal)\n\t\tnih_return_no_memory_error (-1);\n\n\
         \tdbus_message_iter_init_append (signal, &iter);\n\n\
         {margs}\
         \tNIH_MUST (dbus_connection_send (connection, signal, NULL));\n\
         \tdbus_message_unref (signal);\n\n\
         \treturn 0;\n",
        iface = naming.interface_symbol,
        member = signal.name,
        margs = crate::render::indent(&marshalled.code, 1),
    );

    EmittedFunction { func: f, body, is_static: false }
}

fn filter_function(naming: &NamingContext, signal: &Signal, structs: &mut Vec<StructDef>) -> EmittedFunction {
    let name = symbol::extern_name(&naming.prefix, Some(&naming.interface_symbol), None, &signal.symbol(), Some("signal"));

    let demarshalled = demarshal_args(
        naming,
        "message",
        "iter",
        &signal.arguments,
        "return DBUS_HANDLER_RESULT_NEED_MEMORY;\n",
        "goto invalid_args;\n",
    );
    structs.extend(demarshalled.structs);

    let mut f = Function::new("DBusHandlerResult", name);
    f.args.push(Variable::new("DBusConnection *", "connection"));
    f.args.push(Variable::new("DBusMessage *", "message"));
    f.args.push(Variable::new("void *", "data"));

    let mut body = String::from("\tDBusMessageIter iter;\n\n");
    for var in demarshalled.vars.iter().chain(demarshalled.locals.iter()) {
        body += "\t";
        body += &var.declare();
        body += "\n";
    }
    body += "\n\tdbus_message_iter_init (message, &iter);\n\n";
    body += &demarshalled.code;
    body += "\n\tif (dbus_message_iter_get_arg_type (&iter) != DBUS_TYPE_INVALID)\n\t\tgoto invalid_args;\n\n";

    let handler = symbol::extern_name(&naming.prefix, Some(&naming.interface_symbol), None, &signal.symbol(), Some("handler"));
    let call_args = signal.arguments.iter().enumerate().map(|(i, a)| a.symbol(i)).collect::<Vec<_>>().join(", ");
    body += &format!("\tif (data != NULL)\n\t\t{handler} (data, {args});\n\n", handler = handler, args = call_args);
    body += "\treturn DBUS_HANDLER_RESULT_HANDLED;\n\n";
    body += "invalid_args:\n\treturn DBUS_HANDLER_RESULT_HANDLED;\n";

    EmittedFunction { func: f, body, is_static: false }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Argument, Direction as ArgDirection};

    fn naming() -> NamingContext {
        NamingContext {
            prefix: "my".into(),
            interface_symbol: "com_example_foo".into(),
            member_symbol: "ping".into(),
        }
    }

    #[test]
    fn emit_function_sends_signal() {
        let mut s = Signal::new("Ping");
        s.arguments.push(Argument::new("s", ArgDirection::Out));
        let emission = emit(&naming(), &s);
        assert!(emission.emit_function.body.contains("dbus_message_new_signal"));
    }

    #[test]
    fn filter_function_demarshals_and_calls_handler() {
        let mut s = Signal::new("Ping");
        s.arguments.push(Argument::new("u", ArgDirection::Out));
        let emission = emit(&naming(), &s);
        assert!(emission.filter_function.body.contains("my_com_example_foo_ping_handler"));
    }
}
