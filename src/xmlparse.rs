//! Parses a D-Bus introspection XML document into an `ast::Node`, driving
//! `xml-rs`'s pull parser as a state machine over `StartElement`/
//! `EndElement` events.
//!
//! Annotation handling (`Symbol=`, `org.freedesktop.DBus.Deprecated`,
//! `org.freedesktop.DBus.Method.NoReply`, `Async=`) and the `NoReply`/
//! `Async` precedence rule are applied here, at AST build time, while
//! assembling the tree from the same XML shape.

use std::io::Read;

use log::warn;
use xml::reader::XmlEvent;
use xml::EventReader;
use xml::attribute::OwnedAttribute;
use xml::common::Position;

use crate::ast::{Access, Argument, Direction, Interface, Method, Node, Property, Signal};
use crate::error::{GenError, Result};
use crate::symbol;

fn find_attr<'a>(attrs: &'a [OwnedAttribute], name: &str) -> Option<&'a str> {
    attrs.iter().find(|a| a.name.local_name == name).map(|a| a.value.as_str())
}

fn parse_bool(value: &str, line: u64, column: u64) -> Result<bool> {
    match value {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(GenError::Annotation {
            message: format!("invalid boolean annotation value {:?}", other),
            line,
            column,
        }),
    }
}

/// What an `<annotation>` element currently inside the element stack should
/// be applied to.
enum AnnotationTarget<'a> {
    Interface(&'a mut Interface),
    Method(&'a mut Method),
    Signal(&'a mut Signal),
    Property(&'a mut Property),
    None,
}

fn apply_annotation(target: AnnotationTarget, name: &str, value: &str, line: u64, column: u64) -> Result<()> {
    match target {
        AnnotationTarget::Interface(iface) => match name {
            "org.freedesktop.DBus.Deprecated" => iface.deprecated = parse_bool(value, line, column)?,
            "Symbol" => iface.symbol = Some(value.to_owned()),
            _ => {}
        },
        AnnotationTarget::Method(method) => match name {
            "org.freedesktop.DBus.Deprecated" => method.deprecated = parse_bool(value, line, column)?,
            "org.freedesktop.DBus.Method.NoReply" => method.no_reply = parse_bool(value, line, column)?,
            "Async" => method.r#async = parse_bool(value, line, column)?,
            "Symbol" => method.symbol = Some(value.to_owned()),
            _ => {}
        },
        AnnotationTarget::Signal(signal) => match name {
            "org.freedesktop.DBus.Deprecated" => signal.deprecated = parse_bool(value, line, column)?,
            "Symbol" => signal.symbol = Some(value.to_owned()),
            _ => {}
        },
        AnnotationTarget::Property(prop) => match name {
            "org.freedesktop.DBus.Deprecated" => prop.deprecated = parse_bool(value, line, column)?,
            "Symbol" => prop.symbol = Some(value.to_owned()),
            _ => {}
        },
        AnnotationTarget::None => {}
    }
    Ok(())
}

/// Parses a full `<node>` introspection document from `xmldata`.
pub fn parse_node(xmldata: impl Read) -> Result<Node> {
    let mut parser = EventReader::new(xmldata);

    let mut node = Node::default();
    let mut cur_interface: Option<Interface> = None;
    let mut cur_method: Option<Method> = None;
    let mut cur_signal: Option<Signal> = None;
    let mut cur_property: Option<Property> = None;

    loop {
        let event = parser.next()?;
        if let XmlEvent::EndDocument = event {
            break;
        }
        match event {
            XmlEvent::StartElement { ref name, ref attributes, .. } => match name.local_name.as_str() {
                "interface" => {
                    let n = find_attr(attributes, "name").unwrap_or_default();
                    cur_interface = Some(Interface::new(n));
                }
                "method" => {
                    let n = find_attr(attributes, "name").unwrap_or_default();
                    cur_method = Some(Method::new(n));
                }
                "signal" => {
                    let n = find_attr(attributes, "name").unwrap_or_default();
                    cur_signal = Some(Signal::new(n));
                }
                "property" => {
                    let n = find_attr(attributes, "name").unwrap_or_default();
                    let ty = find_attr(attributes, "type").unwrap_or_default();
                    let access = match find_attr(attributes, "access") {
                        Some("read") => Access::Read,
                        Some("write") => Access::Write,
                        _ => Access::ReadWrite,
                    };
                    cur_property = Some(Property::new(n, ty, access));
                }
                "arg" => {
                    let ty = find_attr(attributes, "type").unwrap_or_default().to_owned();
                    let name_attr = find_attr(attributes, "name").map(str::to_owned);
                    if let Some(method) = cur_method.as_mut() {
                        let direction = match find_attr(attributes, "direction") {
                            Some("out") => Direction::Out,
                            _ => Direction::In,
                        };
                        let mut a = Argument::new(ty, direction);
                        a.name = name_attr;
                        method.arguments.push(a);
                    } else if let Some(signal) = cur_signal.as_mut() {
                        let mut a = Argument::new(ty, Direction::Out);
                        a.name = name_attr;
                        signal.arguments.push(a);
                    }
                }
                "annotation" => {
                    let pos = parser.position();
                    let (line, column) = (pos.row, pos.column);
                    let aname = find_attr(attributes, "name").unwrap_or_default();
                    let avalue = find_attr(attributes, "value").unwrap_or_default();
                    let target = if let Some(p) = cur_property.as_mut() {
                        AnnotationTarget::Property(p)
                    } else if let Some(s) = cur_signal.as_mut() {
                        AnnotationTarget::Signal(s)
                    } else if let Some(m) = cur_method.as_mut() {
                        AnnotationTarget::Method(m)
                    } else if let Some(i) = cur_interface.as_mut() {
                        AnnotationTarget::Interface(i)
                    } else {
                        AnnotationTarget::None
                    };
                    apply_annotation(target, aname, avalue, line, column)?;
                }
                _ => {}
            },
            XmlEvent::EndElement { ref name } => match name.local_name.as_str() {
                "method" => {
                    if let (Some(mut method), Some(iface)) = (cur_method.take(), cur_interface.as_mut()) {
                        if method.normalize_annotations() {
                            warn!(
                                "method {:?} has output arguments; clearing NoReply",
                                method.name
                            );
                        }
                        iface.methods.push(method);
                    }
                }
                "signal" => {
                    if let (Some(signal), Some(iface)) = (cur_signal.take(), cur_interface.as_mut()) {
                        iface.signals.push(signal);
                    }
                }
                "property" => {
                    if let (Some(prop), Some(iface)) = (cur_property.take(), cur_interface.as_mut()) {
                        iface.properties.push(prop);
                    }
                }
                "interface" => {
                    if let Some(iface) = cur_interface.take() {
                        node.interfaces.push(iface);
                    }
                }
                _ => {}
            },
            _ => {}
        }
    }

    Ok(node)
}
