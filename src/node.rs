//! Assembles a parsed `ast::Node` into complete generated C output:
//! invokes the method/signal/property emitters per interface, collects
//! their functions, struct definitions and handler typedefs, deduplicates
//! structs by name, and renders the `NihDBusMethod`/`NihDBusSignal`/
//! `NihDBusProperty`/`NihDBusInterface` metadata arrays each interface
//! needs at runtime.

use crate::ast::Node;
use crate::emit::{method, property, signal};
use crate::render::join_blocks;
use crate::symbol;
use crate::typeinfo::StructDef;
use crate::walker::NamingContext;

/// Everything generated for one D-Bus `Node`, split the way the original
/// tool splits its `.c`/`.h` output: object-side handlers (static, wrapped
/// by the interface descriptor arrays) and proxy-side calling code (public
/// API), plus the struct/typedef declarations both sides share.
pub struct GeneratedNode {
    pub object_source: String,
    pub proxy_source: String,
    pub struct_decls: String,
    pub handler_typedefs: String,
}

pub fn generate(prefix: &str, node: &Node) -> GeneratedNode {
    let mut structs: Vec<StructDef> = Vec::new();
    let mut handler_typedefs = Vec::new();
    let mut object_blocks = Vec::new();
    let mut proxy_blocks = Vec::new();

    for interface in &node.interfaces {
        let iface_symbol = interface.symbol();

        for m in &interface.methods {
            let naming = NamingContext { prefix: prefix.to_owned(), interface_symbol: iface_symbol.clone(), member_symbol: m.symbol() };
            let emission = method::emit(&naming, m);
            push_struct_defs(&mut structs, emission.structs);
            handler_typedefs.push(emission.handler_typedef.declare());
            handler_typedefs.push(emission.reply_handler_typedef.declare());

            object_blocks.push(args_array(prefix, &iface_symbol, &m.symbol(), &m.arguments));
            object_blocks.push(emission.object_function.render());
            if let Some(reply) = &emission.reply_function {
                object_blocks.push(reply.render());
            }
            proxy_blocks.push(emission.proxy_function.render());
            proxy_blocks.push(emission.proxy_notify_function.render());
            proxy_blocks.push(emission.proxy_sync_function.render());
        }

        for s in &interface.signals {
            let naming = NamingContext { prefix: prefix.to_owned(), interface_symbol: iface_symbol.clone(), member_symbol: s.symbol() };
            let emission = signal::emit(&naming, s);
            push_struct_defs(&mut structs, emission.structs);
            object_blocks.push(args_array(prefix, &iface_symbol, &s.symbol(), &s.arguments));
            object_blocks.push(emission.emit_function.render());
            proxy_blocks.push(emission.filter_function.render());
        }

        for p in &interface.properties {
            let naming = NamingContext { prefix: prefix.to_owned(), interface_symbol: iface_symbol.clone(), member_symbol: p.symbol() };
            let emission = property::emit(&naming, p);
            push_struct_defs(&mut structs, emission.structs);
            if let Some(get_fn) = &emission.get_function {
                object_blocks.push(get_fn.render());
            }
            if let Some(set_fn) = &emission.set_function {
                object_blocks.push(set_fn.render());
            }
            proxy_blocks.push(emission.proxy_get_sync_function.render());
            proxy_blocks.push(emission.proxy_set_sync_function.render());
        }

        object_blocks.push(interface_descriptor_array(prefix, interface, true));
        proxy_blocks.push(interface_descriptor_array(prefix, interface, false));
    }

    let interfaces_name = symbol::extern_name(prefix, None, None, "interfaces", None);
    let names: Vec<String> = node.interfaces.iter().map(|i| format!("\t&{}_{}_interface,\n", prefix, i.symbol())).collect();
    object_blocks.push(format!(
        "const NihDBusInterface *{name}[] = {{\n{entries}\t NULL\n}};\n",
        name = interfaces_name,
        entries = names.concat(),
    ));

    GeneratedNode {
        object_source: join_blocks(object_blocks),
        proxy_source: join_blocks(proxy_blocks),
        struct_decls: join_blocks(structs.iter().map(|s| s.render())),
        handler_typedefs: handler_typedefs.join("\n"),
    }
}

/// Appends only structs whose name isn't already present: two members with
/// the same signature and naming path produce identical struct definitions,
/// and the original tool's own struct list is likewise deduplicated by name
/// before being emitted as a header.
fn push_struct_defs(out: &mut Vec<StructDef>, new: Vec<StructDef>) {
    for s in new {
        if !out.iter().any(|existing| existing.name == s.name) {
            out.push(s);
        }
    }
}

/// One `NihDBusInterface` descriptor: the interface's name plus its
/// methods/signals/properties arrays, each entry naming its handler (when
/// `object` is true) or leaving it null (proxy side only needs signal
/// filters wired up separately via `dbus_connection_add_filter`).
fn interface_descriptor_array(prefix: &str, interface: &crate::ast::Interface, object: bool) -> String {
    let iface_var = format!("{}_{}_interface", prefix, interface.symbol());
    let methods_var = format!("{}_{}_methods", prefix, interface.symbol());
    let signals_var = format!("{}_{}_signals", prefix, interface.symbol());
    let properties_var = format!("{}_{}_properties", prefix, interface.symbol());

    let mut out = String::new();

    out += &format!("const NihDBusMethod {}[] = {{\n", methods_var);
    for m in &interface.methods {
        let handler = if object {
            symbol::impl_name(prefix, &interface.symbol(), Some(&m.symbol()), Some("method"))
        } else {
            "NULL".to_owned()
        };
        out += &format!(
            "\t{{ \"{name}\", {args}, {handler} }},\n",
            name = m.name,
            args = args_array_ref(prefix, &interface.symbol(), &m.symbol(), &m.arguments),
            handler = handler,
        );
    }
    out += "\t{ NULL }\n};\n\n";

    out += &format!("const NihDBusSignal {}[] = {{\n", signals_var);
    for s in &interface.signals {
        out += &format!(
            "\t{{ \"{name}\", {args} }},\n",
            name = s.name,
            args = args_array_ref(prefix, &interface.symbol(), &s.symbol(), &s.arguments),
        );
    }
    out += "\t{ NULL }\n};\n\n";

    out += &format!("const NihDBusProperty {}[] = {{\n", properties_var);
    for p in &interface.properties {
        let getter = if object && p.access.readable() {
            format!("{}_{}_get_{}", prefix, interface.symbol(), p.symbol())
        } else {
            "NULL".to_owned()
        };
        let setter = if object && p.access.writable() {
            format!("{}_{}_set_{}", prefix, interface.symbol(), p.symbol())
        } else {
            "NULL".to_owned()
        };
        out += &format!(
            "\t{{ \"{name}\", \"{sig}\", {access}, {getter}, {setter} }},\n",
            name = p.name,
            sig = p.type_signature,
            access = access_const(p.access),
            getter = getter,
            setter = setter,
        );
    }
    out += "\t{ NULL }\n};\n\n";

    out += &format!(
        "const NihDBusInterface {iface_var} = {{\n\t\"{name}\", {methods_var}, {signals_var}, {properties_var}\n}};\n",
        iface_var = iface_var,
        name = interface.name,
        methods_var = methods_var,
        signals_var = signals_var,
        properties_var = properties_var,
    );

    out
}

fn access_const(access: crate::ast::Access) -> &'static str {
    match access {
        crate::ast::Access::Read => "NIH_DBUS_READ",
        crate::ast::Access::Write => "NIH_DBUS_WRITE",
        crate::ast::Access::ReadWrite => "NIH_DBUS_READWRITE",
    }
}

/// Name of a method/signal's `NihDBusArg[]` metadata array.
fn args_array_ref(prefix: &str, iface_symbol: &str, member_symbol: &str, _args: &[crate::ast::Argument]) -> String {
    format!("{}_{}_{}_args", prefix, iface_symbol, member_symbol)
}

/// Renders the `NihDBusArg[]` definition itself: one
/// `{ name, type_signature, direction }` entry per argument plus a final
/// all-NULL terminator, mirroring the original's per-member array.
fn args_array(prefix: &str, iface_symbol: &str, member_symbol: &str, args: &[crate::ast::Argument]) -> String {
    let name = format!("{}_{}_{}_args", prefix, iface_symbol, member_symbol);
    let mut out = format!("const NihDBusArg {}[] = {{\n", name);
    for (i, a) in args.iter().enumerate() {
        let dir = match a.direction {
            crate::ast::Direction::In => "NIH_DBUS_ARG_IN",
            crate::ast::Direction::Out => "NIH_DBUS_ARG_OUT",
        };
        out += &format!(
            "\t{{ \"{name}\", \"{sig}\", {dir} }},\n",
            name = a.symbol(i),
            sig = a.type_signature,
            dir = dir,
        );
    }
    out += "\t{ NULL }\n};\n";
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Access, Argument, Direction, Interface, Method, Node, Property, Signal};

    fn sample_node() -> Node {
        let mut iface = Interface::new("com.example.Foo");
        let mut m = Method::new("Frobnicate");
        m.arguments.push(Argument::new("s", Direction::In));
        m.arguments.push(Argument::new("u", Direction::Out));
        iface.methods.push(m);

        let mut s = Signal::new("Frobnicated");
        s.arguments.push(Argument::new("u", Direction::Out));
        iface.signals.push(s);

        iface.properties.push(Property::new("Colour", "s", Access::ReadWrite));

        Node { interfaces: vec![iface] }
    }

    #[test]
    fn generate_emits_both_sides() {
        let node = sample_node();
        let gen = generate("my", &node);
        assert!(gen.object_source.contains("my_com_example_foo_frobnicate"));
        assert!(gen.proxy_source.contains("my_com_example_foo_frobnicate_sync"));
    }

    #[test]
    fn interfaces_array_lists_each_interface() {
        let node = sample_node();
        let gen = generate("my", &node);
        assert!(gen.object_source.contains("my_interfaces[]"));
        assert!(gen.object_source.contains("&my_com_example_foo_interface"));
    }

    #[test]
    fn properties_array_respects_access() {
        let node = sample_node();
        let gen = generate("my", &node);
        assert!(gen.object_source.contains("NIH_DBUS_READWRITE"));
    }
}
