//! A cursor over a D-Bus type signature, e.g. `"a(sua{ss})"`.
//!
//! This is the input side of the walker (see `walker.rs`): it is the Rust
//! stand-in for libdbus's `DBusSignatureIter`, offering `current_type`,
//! `is_basic`, `is_fixed`, `recurse`, `next`, and `signature_string`.

use crate::error::{GenError, Result};

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum TypeCode {
    Byte,
    Boolean,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Double,
    UnixFd,
    String,
    ObjectPath,
    Signature,
    Array,
    Struct,
    DictEntry,
    /// One past the last element of a signature / container.
    Invalid,
}

impl TypeCode {
    fn from_char(c: char) -> Option<TypeCode> {
        use TypeCode::*;
        Some(match c {
            'y' => Byte,
            'b' => Boolean,
            'n' => Int16,
            'q' => UInt16,
            'i' => Int32,
            'u' => UInt32,
            'x' => Int64,
            't' => UInt64,
            'd' => Double,
            'h' => UnixFd,
            's' => String,
            'o' => ObjectPath,
            'g' => Signature,
            'a' => Array,
            '(' => Struct,
            '{' => DictEntry,
            _ => return None,
        })
    }

    pub fn is_basic(self) -> bool {
        self.is_fixed() || matches!(self, TypeCode::String | TypeCode::ObjectPath | TypeCode::Signature)
    }

    pub fn is_fixed(self) -> bool {
        use TypeCode::*;
        matches!(
            self,
            Byte | Boolean | Int16 | UInt16 | Int32 | UInt32 | Int64 | UInt64 | Double | UnixFd
        )
    }

    pub fn is_container(self) -> bool {
        matches!(self, TypeCode::Array | TypeCode::Struct | TypeCode::DictEntry)
    }
}

/// A single self-contained signature element (and everything that follows it
/// at the same level, since a full `DBusSignatureIter` walks a whole
/// signature left to right via repeated `next()`).
#[derive(Clone, Debug)]
pub struct SigIter {
    /// The full textual signature of *this* element (e.g. `"a(sua{ss})"` if
    /// positioned at the array, or `"s"` if positioned at a string). Used
    /// only to answer `signature_string()`; traversal uses `rest`.
    elem_sig: String,
    /// Remaining unconsumed signature at the current nesting level,
    /// including the current element.
    rest: String,
}

impl SigIter {
    /// Builds an iterator positioned at the start of `signature`.
    pub fn new(signature: &str) -> Result<SigIter> {
        validate_balanced(signature)?;
        Ok(SigIter {
            elem_sig: String::new(),
            rest: signature.to_owned(),
        }
        .with_elem_sig_recomputed())
    }

    fn with_elem_sig_recomputed(mut self) -> SigIter {
        self.elem_sig = self.current_element_signature();
        self
    }

    fn current_element_signature(&self) -> String {
        if self.rest.is_empty() {
            return String::new();
        }
        let bytes = self.rest.as_bytes();
        let mut depth = 0i32;
        let mut end = 0usize;
        for (i, &b) in bytes.iter().enumerate() {
            match b {
                b'(' | b'{' => depth += 1,
                b')' | b'}' => depth -= 1,
                _ => {}
            }
            end = i + 1;
            if depth == 0 {
                break;
            }
        }
        self.rest[..end].to_owned()
    }

    pub fn is_at_end(&self) -> bool {
        self.rest.is_empty()
    }

    pub fn current_type(&self) -> TypeCode {
        match self.rest.chars().next() {
            None => TypeCode::Invalid,
            Some(c) => TypeCode::from_char(c).unwrap_or(TypeCode::Invalid),
        }
    }

    pub fn is_basic(&self) -> bool {
        self.current_type().is_basic()
    }

    pub fn is_fixed(&self) -> bool {
        self.current_type().is_fixed()
    }

    /// Returns the canonical signature text of just the current element
    /// (e.g. `"a{ss}"` for the array element of `"ia{ss}s"`).
    pub fn signature_string(&self) -> &str {
        &self.elem_sig
    }

    /// Descends into the children of an ARRAY/STRUCT/DICT_ENTRY element,
    /// returning a sub-iterator over them.
    pub fn recurse(&self) -> Result<SigIter> {
        let inner = match self.current_type() {
            TypeCode::Array => &self.elem_sig[1..],
            TypeCode::Struct | TypeCode::DictEntry => {
                &self.elem_sig[1..self.elem_sig.len() - 1]
            }
            _ => return Err(GenError::Structure("recurse() on a non-container type".into())),
        };
        SigIter::new(inner)
    }

    /// Advances past the current element. Returns `true` if another element
    /// follows at this level.
    pub fn next(&mut self) -> bool {
        if self.rest.is_empty() {
            return false;
        }
        let consumed = self.elem_sig.len();
        self.rest = self.rest[consumed..].to_owned();
        self.elem_sig = self.current_element_signature();
        !self.rest.is_empty()
    }
}

fn validate_balanced(sig: &str) -> Result<()> {
    let mut depth = 0i32;
    for c in sig.chars() {
        match c {
            '(' | '{' => depth += 1,
            ')' | '}' => {
                depth -= 1;
                if depth < 0 {
                    return Err(GenError::UnbalancedSignature);
                }
            }
            'y' | 'b' | 'n' | 'q' | 'i' | 'u' | 'x' | 't' | 'd' | 'h' | 's' | 'o' | 'g' | 'v' | 'a' => {}
            other => return Err(GenError::UnknownSignatureChar(other)),
        }
    }
    if depth != 0 {
        return Err(GenError::UnbalancedSignature);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn walks_flat_signature() {
        let mut it = SigIter::new("su").unwrap();
        assert_eq!(it.current_type(), TypeCode::String);
        assert!(it.next());
        assert_eq!(it.current_type(), TypeCode::UInt32);
        assert!(!it.next());
        assert!(it.is_at_end());
    }

    #[test]
    fn array_recurse_yields_element() {
        let it = SigIter::new("as").unwrap();
        assert_eq!(it.current_type(), TypeCode::Array);
        let inner = it.recurse().unwrap();
        assert_eq!(inner.current_type(), TypeCode::String);
        assert!(inner.is_at_end() == false || inner.current_type() == TypeCode::String);
    }

    #[test]
    fn struct_recurse_yields_members() {
        let it = SigIter::new("(sua{ss})").unwrap();
        assert_eq!(it.current_type(), TypeCode::Struct);
        let mut inner = it.recurse().unwrap();
        assert_eq!(inner.current_type(), TypeCode::String);
        assert!(inner.next());
        assert_eq!(inner.current_type(), TypeCode::UInt32);
        assert!(inner.next());
        assert_eq!(inner.current_type(), TypeCode::Array);
        assert!(!inner.next());
    }

    #[test]
    fn signature_string_of_nested_array() {
        let it = SigIter::new("aas").unwrap();
        assert_eq!(it.signature_string(), "aas");
        let inner = it.recurse().unwrap();
        assert_eq!(inner.signature_string(), "as");
    }

    #[test]
    fn rejects_unbalanced() {
        assert!(SigIter::new("a{sv").is_err());
        assert!(SigIter::new("(s").is_err());
    }
}
