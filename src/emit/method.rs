//! Method emitters: object-side dispatch function, async reply function,
//! proxy call function, proxy notify function, proxy synchronous function.

use crate::ast::{Argument, Direction as ArgDirection, Method};
use crate::emit::{demarshal_args, marshal_args, EmittedFunction};
use crate::symbol;
use crate::typeinfo::{Function, StructDef, Variable};
use crate::walker::NamingContext;

fn in_args(method: &Method) -> Vec<Argument> {
    method.arguments.iter().filter(|a| a.direction == ArgDirection::In).cloned().collect()
}

fn out_args(method: &Method) -> Vec<Argument> {
    method.arguments.iter().filter(|a| a.direction == ArgDirection::Out).cloned().collect()
}

/// Everything a method's functions return besides the function text:
/// hoisted struct definitions (deduplicated by the node assembler) and the
/// handler typedefs this method needs.
pub struct MethodEmission {
    pub object_function: EmittedFunction,
    pub reply_function: Option<EmittedFunction>,
    pub proxy_function: EmittedFunction,
    pub proxy_notify_function: EmittedFunction,
    pub proxy_sync_function: EmittedFunction,
    pub handler_typedef: Function,
    pub reply_handler_typedef: Function,
    pub structs: Vec<StructDef>,
}

pub fn emit(naming: &NamingContext, method: &Method) -> MethodEmission {
    let mut structs = Vec::new();

    let object = object_function(naming, method, &mut structs);
    let reply = if method.r#async { Some(reply_function(naming, method, &mut structs)) } else { None };
    let proxy = proxy_function(naming, method);
    let notify = proxy_notify_function(naming, method, &mut structs);
    let sync = proxy_sync_function(naming, method, &mut structs);
    let handler_typedef = handler_typedef(naming, method);
    let reply_handler_typedef = reply_handler_typedef(naming, method);

    MethodEmission {
        object_function: object,
        reply_function: reply,
        proxy_function: proxy,
        proxy_notify_function: notify,
        proxy_sync_function: sync,
        handler_typedef,
        reply_handler_typedef,
        structs,
    }
}

/// Name of the method's object dispatch function: a statically-linked
/// helper wired into the interface's `NihDBusMethod[]` table, never called
/// by name from outside this translation unit.
fn dispatch_name(naming: &NamingContext, method: &Method) -> String {
    symbol::impl_name(&naming.prefix, &naming.interface_symbol, Some(&method.symbol()), Some("method"))
}

/// Name of the user-implemented handler the dispatch function calls:
/// genuinely external, so named with `extern_name` like the method's other
/// public entry points.
fn handler_name(naming: &NamingContext, method: &Method) -> String {
    symbol::extern_name(&naming.prefix, Some(&naming.interface_symbol), None, &method.symbol(), None)
}

/// Name of the proxy's pending-call notify function: internal, wired into
/// `dbus_pending_call_set_notify` by the proxy call function and never
/// called by name from outside this translation unit.
fn notify_name(naming: &NamingContext, method: &Method) -> String {
    symbol::impl_name(&naming.prefix, &naming.interface_symbol, Some(&method.symbol()), Some("notify"))
}

fn handler_typedef(naming: &NamingContext, method: &Method) -> Function {
    let name = symbol::typedef_name(&naming.prefix, Some(&naming.interface_symbol), None, &method.symbol(), Some("Handler"));
    let mut f = Function::new("int", name);
    f.args.push(Variable::new("void *", "object"));
    f.args.push(Variable::new("NihDBusMessage *", "message"));
    for (i, a) in in_args(method).iter().enumerate() {
        let sig = crate::sigiter::SigIter::new(&a.type_signature).expect("validated signature");
        f.args.push(Variable::new(crate::walker::field_c_type(&sig, naming, &a.symbol(i)), a.symbol(i)));
    }
    // Async handlers already have `message` (2nd param) to stash for a later
    // reply call, so no trailing parameter is added; sync handlers instead
    // get one output pointer per out-argument to fill in directly.
    if !method.r#async {
        for (i, a) in out_args(method).iter().enumerate() {
            let sig = crate::sigiter::SigIter::new(&a.type_signature).expect("validated signature");
            let ty = crate::typeinfo::to_pointer(&crate::walker::field_c_type(&sig, naming, &a.symbol(i)));
            f.args.push(Variable::new(ty, a.symbol(i)));
        }
    }
    f
}

/// Typedef for the function pointer a proxy's pending-data record carries
/// as `handler`: invoked by the notify function once the reply has been
/// demarshalled, with the out arguments passed by value.
fn reply_handler_typedef(naming: &NamingContext, method: &Method) -> Function {
    let name = symbol::typedef_name(&naming.prefix, Some(&naming.interface_symbol), None, &method.symbol(), Some("Reply"));
    let mut f = Function::new("void", name);
    f.args.push(Variable::new("void *", "data"));
    for (i, a) in out_args(method).iter().enumerate() {
        let sig = crate::sigiter::SigIter::new(&a.type_signature).expect("validated signature");
        f.args.push(Variable::new(crate::walker::field_c_type(&sig, naming, &a.symbol(i)), a.symbol(i)));
    }
    f
}

/// Common reply-construction tail used by both the object function (for a
/// synchronous method) and the stand-alone reply function (for an async
/// one): marshal the output arguments into a success reply, retrying the
/// whole construction on OOM since the handler's side effects already ran.
fn build_reply_tail(naming: &NamingContext, outputs: &[Argument]) -> String {
    let marshalled = marshal_args(
        naming,
        "iter",
        outputs,
        "dbus_message_unref (reply);\ncontinue;\n",
        "dbus_message_unref (reply);\nreturn -1;\n",
    );
    format!(
        "\tdo {{\n\
         \t\treply = dbus_message_new_method_return (message->message);\n\
         \t\tif (! reply)\n\t\t\tcontinue;\n\n\
         \t\tdbus_message_iter_init_append (reply, &iter);\n\n\
         {body}\
         \t\tbreak;\n\
         \t}} while (TRUE);\n\n\
         \tNIH_MUST (dbus_connection_send (message->connection, reply, NULL));\n\
         \tdbus_message_unref (reply);\n\n\
         \treturn 0;\n",
        body = indent(&marshalled.code, 2),
    )
}

fn indent(s: &str, level: usize) -> String {
    crate::render::indent(s, level)
}

fn object_function(naming: &NamingContext, method: &Method, structs: &mut Vec<StructDef>) -> EmittedFunction {
    let ins = in_args(method);
    let outs = out_args(method);
    let name = dispatch_name(naming, method);

    let mut f = Function::new("DBusHandlerResult", name);
    f.args.push(Variable::new("void *", "object"));
    f.args.push(Variable::new("NihDBusMessage *", "message"));

    let demarshalled = demarshal_args(
        naming,
        "message",
        "iter",
        &ins,
        "return DBUS_HANDLER_RESULT_NEED_MEMORY;\n",
        "nih_dbus_message_error (message,\n\tDBUS_ERROR_INVALID_ARGS,\n\t_(\"Invalid arguments to %s method\"), \"method\");\nreturn DBUS_HANDLER_RESULT_HANDLED;\n",
    );
    structs.extend(demarshalled.structs);

    let out_param_names: Vec<String> = outs.iter().enumerate().map(|(i, a)| a.symbol(i)).collect();
    let handler_args = ins
        .iter()
        .enumerate()
        .map(|(i, a)| a.symbol(i))
        .chain(if method.r#async {
            Vec::new()
        } else {
            out_param_names.iter().map(|n| format!("&{}", n)).collect()
        })
        .collect::<Vec<_>>()
        .join(", ");

    let mut body = String::new();
    body += "\tDBusMessageIter iter;\n\tDBusMessage *reply;\n\n";
    for var in demarshalled.vars.iter().chain(demarshalled.locals.iter()) {
        body += "\t";
        body += &var.declare();
        body += "\n";
    }
    if !method.r#async && !method.no_reply {
        for (i, a) in outs.iter().enumerate() {
            let sig = crate::sigiter::SigIter::new(&a.type_signature).expect("validated signature");
            body += "\t";
            body += &Variable::new(crate::walker::field_c_type(&sig, naming, &out_param_names[i]), out_param_names[i].clone()).declare();
            body += "\n";
        }
    }
    body += "\n\tdbus_message_iter_init (message->message, &iter);\n\n";
    body += &demarshalled.code;
    body += "\n\tif (dbus_message_iter_get_arg_type (&iter) != DBUS_TYPE_INVALID) {\n\t\tnih_dbus_message_error (message,\n\t\t\tDBUS_ERROR_INVALID_ARGS,\n\t\t\t_(\"Too many arguments to %s method\"), \"method\");\n\t\treturn DBUS_HANDLER_RESULT_HANDLED;\n\t}\n\n";
    body += &format!(
        "\tif ({handler} (object, message, {args}) < 0) {{\n\
         \t\tNihError *err = nih_error_get ();\n\n\
         \t\tif (err->number == ENOMEM) {{\n\t\t\tnih_free (err);\n\t\t\treturn DBUS_HANDLER_RESULT_NEED_MEMORY;\n\t\t}} else if (err->number == NIH_DBUS_ERROR) {{\n\
         \t\t\tNihDBusError *dbus_err = (NihDBusError *) err;\n\t\t\tNIH_MUST (dbus_connection_send (message->connection, dbus_message_new_error (message->message, dbus_err->name, err->message), NULL));\n\t\t\tnih_free (err);\n\t\t\treturn DBUS_HANDLER_RESULT_HANDLED;\n\
         \t\t}} else {{\n\t\t\tNIH_MUST (dbus_connection_send (message->connection, dbus_message_new_error (message->message, DBUS_ERROR_FAILED, err->message), NULL));\n\t\t\tnih_free (err);\n\t\t\treturn DBUS_HANDLER_RESULT_HANDLED;\n\t\t}}\n\t}}\n\n",
        handler = handler_name(naming, method),
        args = handler_args,
    );

    if method.no_reply {
        body += "\treturn DBUS_HANDLER_RESULT_HANDLED;\n";
    } else if method.r#async {
        body += "\treturn DBUS_HANDLER_RESULT_HANDLED;\n";
    } else {
        body += &build_reply_tail(naming, &outs);
    }

    EmittedFunction { func: f, body, is_static: true }
}

fn reply_function(naming: &NamingContext, method: &Method, _structs: &mut Vec<StructDef>) -> EmittedFunction {
    let outs = out_args(method);
    let name = symbol::extern_name(&naming.prefix, Some(&naming.interface_symbol), None, &method.symbol(), Some("reply"));
    let mut f = Function::new("int", name);
    f.args.push(Variable::new("NihDBusMessage *", "message"));
    for (i, a) in outs.iter().enumerate() {
        let sig = crate::sigiter::SigIter::new(&a.type_signature).expect("validated signature");
        f.args.push(Variable::new(crate::walker::field_c_type(&sig, naming, &a.symbol(i)), a.symbol(i)));
    }
    let body = format!(
        "\tDBusMessageIter iter;\n\tDBusMessage *reply;\n\n{}",
        build_reply_tail(naming, &outs)
    );
    EmittedFunction { func: f, body, is_static: false }
}

fn proxy_function(naming: &NamingContext, method: &Method) -> EmittedFunction {
    let ins = in_args(method);
    let name = symbol::extern_name(&naming.prefix, Some(&naming.interface_symbol), None, &method.symbol(), None);
    let reply_typedef = symbol::typedef_name(&naming.prefix, Some(&naming.interface_symbol), None, &method.symbol(), Some("Reply"));
    let notify = notify_name(naming, method);

    let marshalled = marshal_args(
        naming,
        "iter",
        &ins,
        "dbus_message_unref (method_call);\nreturn NULL;\n",
        "dbus_message_unref (method_call);\nreturn NULL;\n",
    );

    let mut f = Function::new("DBusPendingCall *", name);
    f.args.push(Variable::new("NihDBusProxy *", "proxy"));
    f.args.extend(marshalled.vars.clone());
    f.args.push(Variable::new(reply_typedef, "handler"));
    f.args.push(Variable::new("NihDBusErrorHandler", "error_handler"));
    f.args.push(Variable::new("void *", "data"));
    f.args.push(Variable::new("int", "timeout"));

    let body = format!(
        "\tDBusMessage *method_call;\n\tDBusMessageIter iter;\n\tDBusPendingCall *pending_call;\n\tNihDBusPendingData *pending_data;\n\n\
         \tmethod_call = dbus_message_new_method_call (proxy->name, proxy->path,\n\t\t\"{iface}\", \"{member}\");\n\
         \tif (! method_call)\n\t\treturn NULL;\n\n\
         \tdbus_message_iter_init_append (method_call, &iter);\n\n\
         {margs}\
         \tif (! error_handler) {{\n\
         \t\tdbus_message_set_no_reply (method_call, TRUE);\n\
         \t\tNIH_MUST (dbus_connection_send (proxy->connection, method_call, NULL));\n\
         \t\tdbus_message_unref (method_call);\n\
         \t\treturn (DBusPendingCall *) TRUE;\n\
         \t}}\n\n\
         \tpending_data = nih_dbus_pending_data_new (NULL, proxy->connection,\n\t\t(NihDBusReplyHandler) handler, error_handler, data);\n\
         \tif (! pending_data) {{\n\t\tdbus_message_unref (method_call);\n\t\treturn NULL;\n\t}}\n\n\
         \tif (! dbus_connection_send_with_reply (proxy->connection, method_call,\n\t\t\t&pending_call, timeout)) {{\n\t\tdbus_message_unref (method_call);\n\t\tnih_free (pending_data);\n\t\treturn NULL;\n\t}}\n\n\
         \tdbus_message_unref (method_call);\n\
         \tNIH_MUST (dbus_pending_call_set_notify (pending_call, (DBusPendingCallNotifyFunction) {notify}, pending_data, (DBusFreeFunction) nih_discard));\n\n\
         \treturn pending_call;\n",
        iface = naming.interface_symbol,
        member = method.name,
        margs = indent(&marshalled.code, 1),
        notify = notify,
    );

    EmittedFunction { func: f, body, is_static: false }
}

fn proxy_notify_function(naming: &NamingContext, method: &Method, structs: &mut Vec<StructDef>) -> EmittedFunction {
    let outs = out_args(method);
    let name = notify_name(naming, method);
    let reply_typedef = symbol::typedef_name(&naming.prefix, Some(&naming.interface_symbol), None, &method.symbol(), Some("Reply"));
    let mut f = Function::new("void", name);
    f.args.push(Variable::new("DBusPendingCall *", "pending_call"));
    f.args.push(Variable::new("NihDBusPendingData *", "pending_data"));

    let demarshalled = demarshal_args(
        naming,
        "message",
        "iter",
        &outs,
        "dbus_message_unref (reply);\ncontinue;\n",
        "dbus_message_unref (reply);\ngoto invalid_args;\n",
    );
    structs.extend(demarshalled.structs);

    let mut body = String::new();
    body += "\tDBusMessage *reply;\n\tDBusMessageIter iter;\n\n";
    for var in demarshalled.vars.iter().chain(demarshalled.locals.iter()) {
        body += "\t";
        body += &var.declare();
        body += "\n";
    }
    body += "\n\tNIH_ASSERT (dbus_pending_call_get_completed (pending_call));\n\n";
    body += "\treply = dbus_pending_call_steal_reply (pending_call);\n\n";
    body += "\tif (dbus_message_get_type (reply) == DBUS_MESSAGE_TYPE_ERROR) {\n\t\tif (pending_data->error_handler)\n\t\t\tpending_data->error_handler (pending_data->data, reply);\n\t\tdbus_message_unref (reply);\n\t\treturn;\n\t}\n\n";
    body += "\tdo {\n\t\tdbus_message_iter_init (reply, &iter);\n\n";
    body += &indent(&demarshalled.code, 2);
    body += "\t\tbreak;\n\tinvalid_args:\n\t\tif (pending_data->error_handler)\n\t\t\tpending_data->error_handler (pending_data->data, reply);\n\t\tdbus_message_unref (reply);\n\t\treturn;\n\t} while (TRUE);\n\n";
    body += "\tif (dbus_message_iter_get_arg_type (&iter) != DBUS_TYPE_INVALID)\n\t\tgoto invalid_args;\n\n";

    let call_args = outs.iter().enumerate().map(|(i, a)| a.symbol(i)).collect::<Vec<_>>().join(", ");
    body += &format!(
        "\tif (pending_data->handler)\n\t\t(({typedef}) pending_data->handler) (pending_data->data, {args});\n\n",
        typedef = reply_typedef,
        args = call_args,
    );
    body += "\tdbus_message_unref (reply);\n";

    EmittedFunction { func: f, body, is_static: true }
}

fn proxy_sync_function(naming: &NamingContext, method: &Method, structs: &mut Vec<StructDef>) -> EmittedFunction {
    let ins = in_args(method);
    let outs = out_args(method);
    let name = symbol::extern_name(&naming.prefix, Some(&naming.interface_symbol), None, &method.symbol(), Some("sync"));

    let marshalled = marshal_args(
        naming,
        "iter",
        &ins,
        "dbus_message_unref (method_call);\nreturn -1;\n",
        "dbus_message_unref (method_call);\nreturn -1;\n",
    );
    let demarshalled = demarshal_args(
        naming,
        "message",
        "iter",
        &outs,
        "dbus_message_unref (reply);\ncontinue;\n",
        "dbus_message_unref (reply);\nnih_return_error (-1, DBUS_ERROR_INVALID_ARGS, _(\"Invalid arguments to reply\"));\n",
    );
    structs.extend(demarshalled.structs);

    let mut f = Function::new("int", name);
    f.args.push(Variable::new("NihDBusProxy *", "proxy"));
    f.args.extend(marshalled.vars.clone());
    for var in &demarshalled.vars {
        let mut param = var.to_pointer();
        param.name = format!("{}_output", var.name);
        f.args.push(param);
    }

    let copy_outputs: String = demarshalled
        .vars
        .iter()
        .map(|v| format!("\t*{name}_output = {local};\n", name = v.name, local = v.name))
        .collect();

    let mut locals_block = String::from("\tDBusMessage *method_call, *reply;\n\tDBusMessageIter iter;\n\tDBusError error;\n");
    for var in demarshalled.vars.iter().chain(demarshalled.locals.iter()) {
        locals_block += "\t";
        locals_block += &var.declare();
        locals_block += "\n";
    }

    let body = format!(
        "{locals}\n\
         \tmethod_call = dbus_message_new_method_call (proxy->name, proxy->path,\n\t\t\"{iface}\", \"{member}\");\n\
         \tif (! method_call)\n\t\tnih_return_no_memory_error (-1);\n\n\
         \tdbus_message_iter_init_append (method_call, &iter);\n\n\
         {margs}\
         \tdbus_error_init (&error);\n\
         \treply = dbus_connection_send_with_reply_and_block (proxy->connection, method_call, -1, &error);\n\
         \tdbus_message_unref (method_call);\n\
         \tif (! reply) {{\n\t\tdbus_error_free (&error);\n\t\tnih_return_error (-1, DBUS_ERROR_FAILED, _(\"remote call failed\"));\n\t}}\n\n\
         \tdo {{\n\t\tdbus_message_iter_init (reply, &iter);\n\n\
         {dargs}\
         \t\tbreak;\n\t}} while (TRUE);\n\n\
         {copy}\
         \tdbus_message_unref (reply);\n\
         \treturn 0;\n",
        locals = locals_block,
        iface = naming.interface_symbol,
        member = method.name,
        margs = indent(&marshalled.code, 1),
        dargs = indent(&demarshalled.code, 2),
        copy = copy_outputs,
    );

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
            member_symbol: "frobnicate".into(),
        }
    }

    #[test]
    fn no_reply_method_object_function_returns_early() {
        let mut m = Method::new("Frobnicate");
        m.no_reply = true;
        let emission = emit(&naming(), &m);
        assert!(emission.object_function.body.contains("DBUS_HANDLER_RESULT_HANDLED"));
        assert!(emission.reply_function.is_none());
    }

    #[test]
    fn async_method_emits_reply_function() {
        let mut m = Method::new("Frobnicate");
        m.r#async = true;
        m.arguments.push(Argument::new("s", ArgDirection::Out));
        let emission = emit(&naming(), &m);
        assert!(emission.reply_function.is_some());
    }

    #[test]
    fn sync_method_object_function_builds_reply() {
        let mut m = Method::new("Frobnicate");
        m.arguments.push(Argument::new("u", ArgDirection::Out));
        let emission = emit(&naming(), &m);
        assert!(emission.object_function.body.contains("dbus_message_new_method_return"));
    }
}
