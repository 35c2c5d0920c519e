//! The generator's input tree: `Node`/`Interface`/`Method`/`Signal`/
//! `Property`/`Argument`, plus the annotation handling and validation rules
//! applied while the XML front-end (`xmlparse.rs`) builds it.
//!
//! Handles the `Symbol=`, `Deprecated`, `NoReply` and `Async` annotations,
//! including the precedence between the latter two.

use crate::error::{GenError, Result};
use crate::symbol;

#[derive(Clone, Debug, Default)]
pub struct Node {
    pub interfaces: Vec<Interface>,
}

#[derive(Clone, Debug)]
pub struct Interface {
    pub name: String,
    pub symbol: Option<String>,
    pub methods: Vec<Method>,
    pub signals: Vec<Signal>,
    pub properties: Vec<Property>,
    pub deprecated: bool,
}

impl Interface {
    pub fn new(name: impl Into<String>) -> Interface {
        Interface {
            name: name.into(),
            symbol: None,
            methods: Vec::new(),
            signals: Vec::new(),
            properties: Vec::new(),
            deprecated: false,
        }
    }

    /// The symbol this interface is addressed by in generated names: the
    /// explicit `Symbol=` annotation if given, else `name` mangled via
    /// `symbol::from_name` with dots folded to underscores.
    pub fn symbol(&self) -> String {
        self.symbol
            .clone()
            .unwrap_or_else(|| symbol::from_name(&self.name.replace('.', "_")))
    }
}

#[derive(Clone, Debug)]
pub struct Method {
    pub name: String,
    pub symbol: Option<String>,
    pub arguments: Vec<Argument>,
    pub r#async: bool,
    pub no_reply: bool,
    pub deprecated: bool,
}

impl Method {
    pub fn new(name: impl Into<String>) -> Method {
        Method {
            name: name.into(),
            symbol: None,
            arguments: Vec::new(),
            r#async: false,
            no_reply: false,
            deprecated: false,
        }
    }

    pub fn symbol(&self) -> String {
        self.symbol.clone().unwrap_or_else(|| symbol::from_name(&self.name))
    }

    pub fn has_output(&self) -> bool {
        self.arguments.iter().any(|a| a.direction == Direction::Out)
    }

    /// Resolves the `NoReply`/`Async` precedence: output arguments clear
    /// `NoReply` first, then a still-set `NoReply` clears `Async`. Returns
    /// `true` if `NoReply` was cleared this way (caller logs a warning).
    pub fn normalize_annotations(&mut self) -> bool {
        let mut cleared_no_reply = false;
        if self.has_output() && self.no_reply {
            self.no_reply = false;
            cleared_no_reply = true;
        }
        if self.no_reply {
            self.r#async = false;
        }
        cleared_no_reply
    }
}

#[derive(Clone, Debug)]
pub struct Signal {
    pub name: String,
    pub symbol: Option<String>,
    pub arguments: Vec<Argument>,
    pub deprecated: bool,
}

impl Signal {
    pub fn new(name: impl Into<String>) -> Signal {
        Signal {
            name: name.into(),
            symbol: None,
            arguments: Vec::new(),
            deprecated: false,
        }
    }

    pub fn symbol(&self) -> String {
        self.symbol.clone().unwrap_or_else(|| symbol::from_name(&self.name))
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Access {
    Read,
    Write,
    ReadWrite,
}

impl Access {
    pub fn readable(self) -> bool {
        matches!(self, Access::Read | Access::ReadWrite)
    }

    pub fn writable(self) -> bool {
        matches!(self, Access::Write | Access::ReadWrite)
    }
}

#[derive(Clone, Debug)]
pub struct Property {
    pub name: String,
    pub symbol: Option<String>,
    pub type_signature: String,
    pub access: Access,
    pub deprecated: bool,
}

impl Property {
    pub fn new(name: impl Into<String>, type_signature: impl Into<String>, access: Access) -> Property {
        Property {
            name: name.into(),
            symbol: None,
            type_signature: type_signature.into(),
            access,
            deprecated: false,
        }
    }

    pub fn symbol(&self) -> String {
        self.symbol.clone().unwrap_or_else(|| symbol::from_name(&self.name))
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Direction {
    In,
    Out,
}

#[derive(Clone, Debug)]
pub struct Argument {
    pub name: Option<String>,
    pub symbol: Option<String>,
    pub type_signature: String,
    pub direction: Direction,
}

impl Argument {
    pub fn new(type_signature: impl Into<String>, direction: Direction) -> Argument {
        Argument {
            name: None,
            symbol: None,
            type_signature: type_signature.into(),
            direction,
        }
    }

    pub fn symbol(&self, index: usize) -> String {
        if let Some(s) = &self.symbol {
            return s.clone();
        }
        match &self.name {
            Some(n) => symbol::from_name(n),
            None => format!("arg{}", index),
        }
    }
}

/// `1-255 chars, [A-Za-z_][A-Za-z0-9_]*`, the member-name rule spec places
/// on interface/method/signal/property/argument names (distinct from
/// `symbol::valid`, which also allows generated C identifiers of that
/// shape but is not length-bounded).
pub fn valid_member_name(name: &str) -> bool {
    if name.is_empty() || name.len() > 255 {
        return false;
    }
    symbol::valid(name)
}

/// `begins with '/'`, each `/`-delimited component is `[A-Za-z0-9_]+`, and
/// the root `/` is the only path allowed a trailing slash.
pub fn valid_object_path(path: &str) -> bool {
    if path == "/" {
        return true;
    }
    if !path.starts_with('/') || path.ends_with('/') {
        return false;
    }
    path[1..]
        .split('/')
        .all(|c| !c.is_empty() && c.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '_'))
}

pub fn require_valid_object_path(path: &str) -> Result<()> {
    if valid_object_path(path) {
        Ok(())
    } else {
        Err(GenError::InvalidObjectPath(path.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_reply_clears_before_async_and_output_clears_no_reply() {
        let mut m = Method::new("Frobnicate");
        m.no_reply = true;
        m.r#async = true;
        assert!(!m.normalize_annotations());
        assert!(!m.no_reply, "NoReply should clear Async, not itself, when there's no output");
        assert!(!m.r#async);

        let mut m2 = Method::new("Frobnicate");
        m2.no_reply = true;
        m2.arguments.push(Argument::new("s", Direction::Out));
        assert!(m2.normalize_annotations());
        assert!(!m2.no_reply);
    }

    #[test]
    fn async_survives_when_no_reply_absent() {
        let mut m = Method::new("Frobnicate");
        m.r#async = true;
        assert!(!m.normalize_annotations());
        assert!(m.r#async);
    }

    #[test]
    fn interface_symbol_falls_back_to_mangled_name() {
        let iface = Interface::new("com.example.Foo");
        assert_eq!(iface.symbol(), "com_example_foo");
    }

    #[test]
    fn object_path_validation() {
        assert!(valid_object_path("/"));
        assert!(valid_object_path("/com/example/Foo"));
        assert!(!valid_object_path("com/example/Foo"));
        assert!(!valid_object_path("/com/example/Foo/"));
        assert!(!valid_object_path("/com//Foo"));
        assert!(!valid_object_path("/com/exa-mple"));
    }

    #[test]
    fn member_name_validation() {
        assert!(valid_member_name("Frobnicate"));
        assert!(!valid_member_name(""));
        assert!(!valid_member_name("Has-Dash"));
        assert!(!valid_member_name(&"x".repeat(256)));
    }

    #[test]
    fn argument_symbol_falls_back_to_positional_name() {
        let a = Argument::new("s", Direction::In);
        assert_eq!(a.symbol(0), "arg0");
        let mut named = Argument::new("s", Direction::In);
        named.name = Some("UserName".into());
        assert_eq!(named.symbol(0), "user_name");
    }
}
