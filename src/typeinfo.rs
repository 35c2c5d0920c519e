//! Type registry: maps D-Bus basic type codes to native C type spellings,
//! and the `Variable`/`Function`/`StructDef` descriptors the walker and
//! emitters build up, plus the pure string-surgery operations on type
//! spellings (pointer/const/static/extern variants, and the declaration-
//! block alignment a column of `Variable`/`Function` signatures needs).

use crate::sigiter::TypeCode;

/// A native local/parameter: `{ type_spelling, name, array }`. `type_spelling`
/// encodes pointer levels and `const` textually, since the target is text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Variable {
    pub type_spelling: String,
    pub name: String,
    pub array: bool,
}

impl Variable {
    pub fn new(type_spelling: impl Into<String>, name: impl Into<String>) -> Variable {
        Variable {
            type_spelling: type_spelling.into(),
            name: name.into(),
            array: false,
        }
    }

    pub fn array_of(type_spelling: impl Into<String>, name: impl Into<String>) -> Variable {
        Variable {
            type_spelling: type_spelling.into(),
            name: name.into(),
            array: true,
        }
    }

    pub fn is_pointer(&self) -> bool {
        self.type_spelling.trim_end().ends_with('*')
    }

    pub fn to_pointer(&self) -> Variable {
        Variable {
            type_spelling: to_pointer(&self.type_spelling),
            ..self.clone()
        }
    }

    pub fn to_const(&self) -> Variable {
        Variable {
            type_spelling: to_const(&self.type_spelling),
            ..self.clone()
        }
    }

    /// Renders a single declaration line, e.g. `"char *       name"` or
    /// `"size_t       name_len"`, with the `*`/name left unpadded — use
    /// `var_layout` for an aligned block.
    pub fn declare(&self) -> String {
        format!(
            "{} {}{};",
            self.type_spelling,
            self.name,
            if self.array { "[]" } else { "" }
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Function {
    pub return_type: String,
    pub name: String,
    pub args: Vec<Variable>,
    pub attribs: Vec<String>,
}

impl Function {
    pub fn new(return_type: impl Into<String>, name: impl Into<String>) -> Function {
        Function {
            return_type: return_type.into(),
            name: name.into(),
            args: Vec::new(),
            attribs: Vec::new(),
        }
    }

    /// Renders `return_type\nname (args)` suitable either as a declaration
    /// (caller appends `;`) or a definition header (caller appends ` {`).
    pub fn render_header(&self) -> String {
        let args = if self.args.is_empty() {
            "void".to_owned()
        } else {
            self.args
                .iter()
                .map(|a| format!("{} {}{}", a.type_spelling, a.name, if a.array { "[]" } else { "" }))
                .collect::<Vec<_>>()
                .join(", ")
        };
        let mut s = format!("{}\n{} ({})", self.return_type, self.name, args);
        if !self.attribs.is_empty() {
            s += &format!("\n\t__attribute__ (({}))", self.attribs.join(", "));
        }
        s
    }

    pub fn declare(&self) -> String {
        format!("{};\n", self.render_header())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StructDef {
    pub name: String,
    pub members: Vec<Variable>,
}

impl StructDef {
    pub fn render(&self) -> String {
        let mut s = format!("typedef struct {} {{\n", self.name);
        for (line_vars,) in [(&self.members,)] {
            for line in var_layout(line_vars) {
                s += "\t";
                s += &line;
                s += "\n";
            }
        }
        s += &format!("}} {};\n", self.name);
        s
    }
}

/// C spelling of a basic D-Bus type code, for the given direction. `out`
/// selects the ownership-bearing (freshly-allocated) spelling for
/// variable-length basics (so a demarshalled string is `char *` even though
/// a marshalled-from input is `const char *`).
pub fn basic_c_type(code: TypeCode, out: bool) -> &'static str {
    use TypeCode::*;
    match code {
        Byte => "uint8_t",
        Boolean => "int",
        Int16 => "int16_t",
        UInt16 => "uint16_t",
        Int32 => "int32_t",
        UInt32 => "uint32_t",
        Int64 => "int64_t",
        UInt64 => "uint64_t",
        Double => "double",
        UnixFd => "int",
        String | ObjectPath | Signature => {
            if out {
                "char *"
            } else {
                "const char *"
            }
        }
        _ => unreachable!("basic_c_type called on a non-basic type code"),
    }
}

/// The libdbus `DBUS_TYPE_*` constant used in type-check code for `code`.
pub fn dbus_type_const(code: TypeCode) -> &'static str {
    use TypeCode::*;
    match code {
        Byte => "DBUS_TYPE_BYTE",
        Boolean => "DBUS_TYPE_BOOLEAN",
        Int16 => "DBUS_TYPE_INT16",
        UInt16 => "DBUS_TYPE_UINT16",
        Int32 => "DBUS_TYPE_INT32",
        UInt32 => "DBUS_TYPE_UINT32",
        Int64 => "DBUS_TYPE_INT64",
        UInt64 => "DBUS_TYPE_UINT64",
        Double => "DBUS_TYPE_DOUBLE",
        UnixFd => "DBUS_TYPE_UNIX_FD",
        String => "DBUS_TYPE_STRING",
        ObjectPath => "DBUS_TYPE_OBJECT_PATH",
        Signature => "DBUS_TYPE_SIGNATURE",
        Array => "DBUS_TYPE_ARRAY",
        Struct => "DBUS_TYPE_STRUCT",
        DictEntry => "DBUS_TYPE_DICT_ENTRY",
        Invalid => "DBUS_TYPE_INVALID",
    }
}

/// Adds a pointer level. A leading `const T *` becomes `T * const *` (the
/// first-level constness moves outward); a `T * const *` becomes
/// `T ** const *`; a plain non-pointer gains `" *"`.
pub fn to_pointer(t: &str) -> String {
    if t.starts_with("const ") && t.matches('*').count() == 1 && t.ends_with('*') {
        let inner = &t[6..t.len() - 1]; // strip "const " prefix and trailing "*"
        format!("{} * const *", inner.trim_end())
    } else if t.ends_with(" const *") {
        format!("{}* const *", &t[..t.len() - " const *".len()])
    } else if t.ends_with('*') {
        format!("{}*", t)
    } else {
        format!("{} *", t)
    }
}

/// Adds `const` at the first pointer level. Idempotent if already const
/// there.
pub fn to_const(t: &str) -> String {
    if !t.ends_with('*') {
        return t.to_owned();
    }
    let first_star = t.find('*').unwrap();
    let is_sole_pointer = t.matches('*').count() == 1;
    if is_sole_pointer {
        if t.starts_with("const ") {
            t.to_owned()
        } else {
            format!("const {}", t)
        }
    } else {
        if t.ends_with(" const *") {
            return t.to_owned();
        }
        let _ = first_star;
        format!("{} const *", &t[..t.len() - 1].trim_end())
    }
}

/// Idempotently prepends `static `.
pub fn to_static(t: &str) -> String {
    if t.starts_with("static ") {
        t.to_owned()
    } else {
        format!("static {}", t)
    }
}

/// Idempotently prepends `extern `.
pub fn to_extern(t: &str) -> String {
    if t.starts_with("extern ") {
        t.to_owned()
    } else {
        format!("extern {}", t)
    }
}

/// Aligns a declaration block by the widest type spelling, treating
/// pointers so the `*` is adjacent to the name, one declaration per line,
/// `[]` appended for array variables.
pub fn var_layout(vars: &[Variable]) -> Vec<String> {
    if vars.is_empty() {
        return Vec::new();
    }
    let widths: Vec<(String, bool)> = vars
        .iter()
        .map(|v| {
            let is_ptr = v.type_spelling.trim_end().ends_with('*');
            let base = if is_ptr {
                v.type_spelling.trim_end().trim_end_matches('*').trim_end().to_owned()
            } else {
                v.type_spelling.clone()
            };
            (base, is_ptr)
        })
        .collect();
    let width = widths.iter().map(|(b, _)| b.len()).max().unwrap_or(0);
    vars.iter()
        .zip(widths.iter())
        .map(|(v, (base, is_ptr))| {
            if *is_ptr {
                format!("{:<width$} *{}{};", base, v.name, if v.array { "[]" } else { "" }, width = width)
            } else {
                format!("{:<width$} {}{};", base, v.name, if v.array { "[]" } else { "" }, width = width)
            }
        })
        .collect()
}

/// Aligns a function declaration block by widest return type and widest
/// name; attributes (if any) render indented on the next line as a single
/// `__attribute__((...))` group.
pub fn func_layout(funcs: &[Function]) -> Vec<String> {
    let ret_width = funcs.iter().map(|f| f.return_type.len()).max().unwrap_or(0);
    let name_width = funcs.iter().map(|f| f.name.len()).max().unwrap_or(0);
    funcs
        .iter()
        .map(|f| {
            let args = if f.args.is_empty() {
                "void".to_owned()
            } else {
                f.args
                    .iter()
                    .map(|a| format!("{} {}", a.type_spelling, a.name))
                    .collect::<Vec<_>>()
                    .join(", ")
            };
            let mut s = format!(
                "{:<rw$} {:<nw$} ({});",
                f.return_type,
                f.name,
                args,
                rw = ret_width,
                nw = name_width
            );
            if !f.attribs.is_empty() {
                s += &format!("\n\t__attribute__ (({}))", f.attribs.join(", "));
            }
            s
        })
        .collect()
}

/// Emits an assertion for a pointer parameter `var`, given its neighbours in
/// an argument list:
/// - if `next` is a `size_t`: `assert((next == 0) || (var != NULL))`
/// - else if `var`'s type contains `size_t` and `prev` is a pointer:
///   `assert((*prev == NULL) || (var != NULL))`
/// - else: `assert(var != NULL)`.
/// Non-pointer variables produce no assertion (`None`).
pub fn strcat_assert(var: &Variable, prev: Option<&Variable>, next: Option<&Variable>) -> Option<String> {
    if !var.type_spelling.contains('*') {
        return None;
    }
    if let Some(next) = next {
        if next.type_spelling == "size_t" {
            return Some(format!(
                "assert ((({}) == 0) || ({} != NULL));\n",
                next.name, var.name
            ));
        }
    }
    if let Some(prev) = prev {
        if var.type_spelling.contains("size_t") && prev.type_spelling.contains('*') {
            return Some(format!(
                "assert ((*{} == NULL) || ({} != NULL));\n",
                prev.name, var.name
            ));
        }
    }
    Some(format!("assert ({} != NULL);\n", var.name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pointer_surgery_laws() {
        assert_eq!(to_pointer("const char *"), "char * const *");
        assert_eq!(to_pointer("char * const *"), "char ** const *");
        assert_eq!(to_pointer("char"), "char *");
        assert_eq!(to_pointer("char *"), "char **");
    }

    #[test]
    fn const_surgery_laws() {
        assert_eq!(to_const("char *"), "const char *");
        assert_eq!(to_const("const char *"), "const char *");
        assert_eq!(to_const("char **"), "char * const *");
        assert_eq!(to_const(&to_const("char **")), to_const("char **"));
    }

    #[test]
    fn static_extern_are_idempotent() {
        assert_eq!(to_static("char *foo"), "static char *foo");
        assert_eq!(to_static(&to_static("char *foo")), "static char *foo");
        assert_eq!(to_extern("char *foo"), "extern char *foo");
        assert_eq!(to_extern(&to_extern("char *foo")), "extern char *foo");
    }

    #[test]
    fn assert_placement_size_t_next() {
        let ptr = Variable::new("char **", "names");
        let size = Variable::new("size_t", "names_len");
        let a = strcat_assert(&ptr, None, Some(&size)).unwrap();
        assert_eq!(a, "assert (((names_len) == 0) || (names != NULL));\n");
    }

    #[test]
    fn assert_placement_size_t_prev() {
        let arr = Variable::new("char **", "names");
        let size_ptr = Variable::new("size_t *", "names_len");
        let a = strcat_assert(&size_ptr, Some(&arr), None).unwrap();
        assert_eq!(a, "assert ((*names == NULL) || (names_len != NULL));\n");
    }

    #[test]
    fn assert_placement_plain_pointer() {
        let v = Variable::new("char *", "name");
        assert_eq!(strcat_assert(&v, None, None).unwrap(), "assert (name != NULL);\n");
    }

    #[test]
    fn assert_placement_none_for_non_pointer() {
        let v = Variable::new("int32_t", "count");
        assert_eq!(strcat_assert(&v, None, None), None);
    }

    #[test]
    fn var_layout_aligns_pointer_star_to_name() {
        let vars = vec![Variable::new("char *", "name"), Variable::new("int32_t", "count")];
        let lines = var_layout(&vars);
        assert_eq!(lines[0], "char    *name;");
        assert_eq!(lines[1], "int32_t count;");
    }
}
