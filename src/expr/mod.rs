//! Expression and document value types.
//!
//! These are the value shapes the protocol embeds inside requests:
//!
//! - [`Scalar`] - a plain base value (null, strings, numbers, bool, bytes)
//! - [`Any`] - a scalar, a list of `Any`, or a document mapping keys to `Any`
//! - [`Expr`] - an expression tree over scalars: identifiers, variables,
//!   document paths, operator applications, function calls, placeholders
//! - [`DocPath`] - a sequence of steps identifying a field inside a document
//!
//! Upper layers can traverse values through the visitor traits
//! ([`ScalarVisitor`], [`AnyVisitor`], [`ExprVisitor`]) or match on the
//! enums directly; the message codecs in [`crate::msg`] consume the enums.

/// One step of a document path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathStep {
    /// `.name` - selects a named member of a document.
    Member(String),
    /// `.*` - selects all members of a document.
    MemberAsterisk,
    /// `[k]` - selects the k-th element of an array.
    ArrayIndex(u32),
    /// `[*]` - selects all elements of an array.
    ArrayIndexAsterisk,
    /// `**` - selects all descendants recursively.
    DoubleAsterisk,
}

impl PathStep {
    /// Wire value of this step kind.
    pub fn kind(&self) -> u32 {
        match self {
            PathStep::Member(_) => 1,
            PathStep::MemberAsterisk => 2,
            PathStep::ArrayIndex(_) => 3,
            PathStep::ArrayIndexAsterisk => 4,
            PathStep::DoubleAsterisk => 5,
        }
    }
}

/// A document path: an ordered sequence of steps.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocPath(pub Vec<PathStep>);

impl DocPath {
    /// Empty path.
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Append a member step.
    pub fn member(mut self, name: impl Into<String>) -> Self {
        self.0.push(PathStep::Member(name.into()));
        self
    }

    /// Append an array-index step.
    pub fn index(mut self, idx: u32) -> Self {
        self.0.push(PathStep::ArrayIndex(idx));
        self
    }

    /// Number of steps.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if the path has no steps.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A plain base value.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    /// SQL NULL.
    Null,
    /// String in the connection's default encoding.
    Str(String),
    /// String tagged with an explicit collation id.
    StrWithCharset { charset: u64, data: Vec<u8> },
    /// Signed integer.
    Sint(i64),
    /// Unsigned integer.
    Uint(u64),
    /// Single-precision float.
    Float(f32),
    /// Double-precision float.
    Double(f64),
    /// Boolean.
    Bool(bool),
    /// Raw bytes, not interpreted as text.
    Octets(Vec<u8>),
}

/// A scalar, a list, or a document.
#[derive(Debug, Clone, PartialEq)]
pub enum Any {
    Scalar(Scalar),
    List(Vec<Any>),
    Doc(Vec<(String, Any)>),
}

/// An expression over scalars.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Literal value.
    Literal(Scalar),
    /// Session variable reference (`@name`).
    Variable(String),
    /// Column/field identifier, optionally qualified and with a document
    /// path into the value.
    Ident {
        name: Option<String>,
        table: Option<String>,
        schema: Option<String>,
        path: DocPath,
    },
    /// Bare document path (`$.a.b[0]`).
    Path(DocPath),
    /// Operator applied to arguments (`name` is the operator symbol).
    Op { name: String, args: Vec<Expr> },
    /// Function call, optionally schema-qualified.
    Call {
        name: String,
        schema: Option<String>,
        args: Vec<Expr>,
    },
    /// Anonymous positional placeholder (`?`), numbered at encode time.
    Placeholder,
    /// Placeholder with an explicit wire position.
    PlaceholderPos(u32),
    /// Named placeholder (`:name`), resolved to a position at encode time.
    PlaceholderNamed(String),
    /// Array of expressions.
    Array(Vec<Expr>),
    /// Document with expression values.
    Object(Vec<(String, Expr)>),
}

/// Visitor over base scalar values.
pub trait ScalarVisitor {
    fn null(&mut self);
    fn str(&mut self, value: &str);
    fn str_with_charset(&mut self, charset: u64, data: &[u8]);
    fn sint(&mut self, value: i64);
    fn uint(&mut self, value: u64);
    fn float(&mut self, value: f32);
    fn double(&mut self, value: f64);
    fn boolean(&mut self, value: bool);
    fn octets(&mut self, data: &[u8]);
}

/// Visitor over [`Any`] values: scalars plus list/document structure.
///
/// Structure is reported with begin/end pairs; `doc_key` precedes the value
/// it labels.
pub trait AnyVisitor: ScalarVisitor {
    fn list_begin(&mut self, len: usize);
    fn list_end(&mut self);
    fn doc_begin(&mut self, len: usize);
    fn doc_key(&mut self, key: &str);
    fn doc_end(&mut self);
}

/// Visitor over [`Expr`] trees, extending [`AnyVisitor`] with the
/// expression-only node kinds.
pub trait ExprVisitor: AnyVisitor {
    fn variable(&mut self, name: &str);
    fn ident(&mut self, name: Option<&str>, table: Option<&str>, schema: Option<&str>, path: &DocPath);
    fn path(&mut self, path: &DocPath);
    fn op_begin(&mut self, name: &str, args: usize);
    fn op_end(&mut self);
    fn call_begin(&mut self, name: &str, schema: Option<&str>, args: usize);
    fn call_end(&mut self);
    fn placeholder(&mut self);
    fn placeholder_pos(&mut self, pos: u32);
    fn placeholder_named(&mut self, name: &str);
}

impl Scalar {
    /// Walk this scalar with a visitor.
    pub fn accept(&self, v: &mut (impl ScalarVisitor + ?Sized)) {
        match self {
            Scalar::Null => v.null(),
            Scalar::Str(s) => v.str(s),
            Scalar::StrWithCharset { charset, data } => v.str_with_charset(*charset, data),
            Scalar::Sint(n) => v.sint(*n),
            Scalar::Uint(n) => v.uint(*n),
            Scalar::Float(n) => v.float(*n),
            Scalar::Double(n) => v.double(*n),
            Scalar::Bool(b) => v.boolean(*b),
            Scalar::Octets(data) => v.octets(data),
        }
    }
}

impl Any {
    /// Walk this value with a visitor.
    pub fn accept(&self, v: &mut (impl AnyVisitor + ?Sized)) {
        match self {
            Any::Scalar(s) => s.accept(v),
            Any::List(items) => {
                v.list_begin(items.len());
                for item in items {
                    item.accept(v);
                }
                v.list_end();
            }
            Any::Doc(fields) => {
                v.doc_begin(fields.len());
                for (key, value) in fields {
                    v.doc_key(key);
                    value.accept(v);
                }
                v.doc_end();
            }
        }
    }
}

impl Expr {
    /// Walk this expression tree with a visitor.
    pub fn accept(&self, v: &mut (impl ExprVisitor + ?Sized)) {
        match self {
            Expr::Literal(s) => s.accept(v),
            Expr::Variable(name) => v.variable(name),
            Expr::Ident {
                name,
                table,
                schema,
                path,
            } => v.ident(name.as_deref(), table.as_deref(), schema.as_deref(), path),
            Expr::Path(path) => v.path(path),
            Expr::Op { name, args } => {
                v.op_begin(name, args.len());
                for arg in args {
                    arg.accept(v);
                }
                v.op_end();
            }
            Expr::Call { name, schema, args } => {
                v.call_begin(name, schema.as_deref(), args.len());
                for arg in args {
                    arg.accept(v);
                }
                v.call_end();
            }
            Expr::Placeholder => v.placeholder(),
            Expr::PlaceholderPos(pos) => v.placeholder_pos(*pos),
            Expr::PlaceholderNamed(name) => v.placeholder_named(name),
            Expr::Array(items) => {
                v.list_begin(items.len());
                for item in items {
                    item.accept(v);
                }
                v.list_end();
            }
            Expr::Object(fields) => {
                v.doc_begin(fields.len());
                for (key, value) in fields {
                    v.doc_key(key);
                    value.accept(v);
                }
                v.doc_end();
            }
        }
    }
}

impl Expr {
    /// Replace named and anonymous placeholders with explicit wire
    /// positions, recording the assignment in `map`.
    ///
    /// Callers binding arguments should resolve their expression trees
    /// first and order the argument list by the returned positions; the
    /// wire encoder numbers unresolved placeholders the same way but has
    /// no channel to report the mapping back.
    pub fn resolve_placeholders(&self, map: &mut PlaceholderMap) -> Expr {
        match self {
            Expr::Placeholder => Expr::PlaceholderPos(map.anonymous()),
            Expr::PlaceholderNamed(name) => Expr::PlaceholderPos(map.named(name)),
            Expr::PlaceholderPos(pos) => Expr::PlaceholderPos(*pos),
            Expr::Op { name, args } => Expr::Op {
                name: name.clone(),
                args: args.iter().map(|a| a.resolve_placeholders(map)).collect(),
            },
            Expr::Call { name, schema, args } => Expr::Call {
                name: name.clone(),
                schema: schema.clone(),
                args: args.iter().map(|a| a.resolve_placeholders(map)).collect(),
            },
            Expr::Array(items) => {
                Expr::Array(items.iter().map(|i| i.resolve_placeholders(map)).collect())
            }
            Expr::Object(fields) => Expr::Object(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.resolve_placeholders(map)))
                    .collect(),
            ),
            other => other.clone(),
        }
    }
}

/// Assigns wire positions to placeholders during expression encoding.
///
/// The wire knows only positional placeholders. Named and anonymous
/// placeholders are numbered in order of first appearance; repeating a
/// name reuses its position. The finished map tells the caller which
/// argument order the server expects.
#[derive(Debug, Default)]
pub struct PlaceholderMap {
    names: Vec<Option<String>>,
}

impl PlaceholderMap {
    /// Empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Position for an anonymous placeholder (always a fresh slot).
    pub fn anonymous(&mut self) -> u32 {
        self.names.push(None);
        (self.names.len() - 1) as u32
    }

    /// Position for a named placeholder, reusing an existing slot for a
    /// repeated name.
    pub fn named(&mut self, name: &str) -> u32 {
        if let Some(pos) = self
            .names
            .iter()
            .position(|n| n.as_deref() == Some(name))
        {
            return pos as u32;
        }
        self.names.push(Some(name.to_string()));
        (self.names.len() - 1) as u32
    }

    /// Number of distinct placeholder positions assigned.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// True if no placeholders were seen.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Name assigned to a position, if it was a named placeholder.
    pub fn name_at(&self, pos: u32) -> Option<&str> {
        self.names.get(pos as usize).and_then(|n| n.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder(Vec<String>);

    impl ScalarVisitor for Recorder {
        fn null(&mut self) {
            self.0.push("null".into());
        }
        fn str(&mut self, value: &str) {
            self.0.push(format!("str:{value}"));
        }
        fn str_with_charset(&mut self, charset: u64, _data: &[u8]) {
            self.0.push(format!("cstr:{charset}"));
        }
        fn sint(&mut self, value: i64) {
            self.0.push(format!("sint:{value}"));
        }
        fn uint(&mut self, value: u64) {
            self.0.push(format!("uint:{value}"));
        }
        fn float(&mut self, value: f32) {
            self.0.push(format!("float:{value}"));
        }
        fn double(&mut self, value: f64) {
            self.0.push(format!("double:{value}"));
        }
        fn boolean(&mut self, value: bool) {
            self.0.push(format!("bool:{value}"));
        }
        fn octets(&mut self, data: &[u8]) {
            self.0.push(format!("octets:{}", data.len()));
        }
    }

    impl AnyVisitor for Recorder {
        fn list_begin(&mut self, len: usize) {
            self.0.push(format!("list[{len}]"));
        }
        fn list_end(&mut self) {
            self.0.push("list_end".into());
        }
        fn doc_begin(&mut self, len: usize) {
            self.0.push(format!("doc[{len}]"));
        }
        fn doc_key(&mut self, key: &str) {
            self.0.push(format!("key:{key}"));
        }
        fn doc_end(&mut self) {
            self.0.push("doc_end".into());
        }
    }

    impl ExprVisitor for Recorder {
        fn variable(&mut self, name: &str) {
            self.0.push(format!("var:{name}"));
        }
        fn ident(
            &mut self,
            name: Option<&str>,
            _table: Option<&str>,
            _schema: Option<&str>,
            path: &DocPath,
        ) {
            self.0
                .push(format!("id:{}:{}", name.unwrap_or(""), path.len()));
        }
        fn path(&mut self, path: &DocPath) {
            self.0.push(format!("path:{}", path.len()));
        }
        fn op_begin(&mut self, name: &str, args: usize) {
            self.0.push(format!("op:{name}[{args}]"));
        }
        fn op_end(&mut self) {
            self.0.push("op_end".into());
        }
        fn call_begin(&mut self, name: &str, _schema: Option<&str>, args: usize) {
            self.0.push(format!("call:{name}[{args}]"));
        }
        fn call_end(&mut self) {
            self.0.push("call_end".into());
        }
        fn placeholder(&mut self) {
            self.0.push("ph".into());
        }
        fn placeholder_pos(&mut self, pos: u32) {
            self.0.push(format!("ph:{pos}"));
        }
        fn placeholder_named(&mut self, name: &str) {
            self.0.push(format!("ph:{name}"));
        }
    }

    #[test]
    fn test_any_walk_order() {
        let value = Any::Doc(vec![
            ("a".into(), Any::Scalar(Scalar::Sint(1))),
            (
                "b".into(),
                Any::List(vec![
                    Any::Scalar(Scalar::Bool(true)),
                    Any::Scalar(Scalar::Null),
                ]),
            ),
        ]);

        let mut rec = Recorder::default();
        value.accept(&mut rec);
        assert_eq!(
            rec.0,
            vec![
                "doc[2]", "key:a", "sint:1", "key:b", "list[2]", "bool:true", "null", "list_end",
                "doc_end"
            ]
        );
    }

    #[test]
    fn test_expr_walk_operator_application() {
        // age > :min
        let expr = Expr::Op {
            name: ">".into(),
            args: vec![
                Expr::Ident {
                    name: Some("age".into()),
                    table: None,
                    schema: None,
                    path: DocPath::new(),
                },
                Expr::PlaceholderNamed("min".into()),
            ],
        };

        let mut rec = Recorder::default();
        expr.accept(&mut rec);
        assert_eq!(rec.0, vec!["op:>[2]", "id:age:0", "ph:min", "op_end"]);
    }

    #[test]
    fn test_doc_path_builder() {
        let path = DocPath::new().member("address").member("city").index(0);
        assert_eq!(path.len(), 3);
        assert_eq!(path.0[0], PathStep::Member("address".into()));
        assert_eq!(path.0[2], PathStep::ArrayIndex(0));
        assert_eq!(path.0[2].kind(), 3);
    }

    #[test]
    fn test_path_step_kinds() {
        assert_eq!(PathStep::Member("x".into()).kind(), 1);
        assert_eq!(PathStep::MemberAsterisk.kind(), 2);
        assert_eq!(PathStep::ArrayIndex(1).kind(), 3);
        assert_eq!(PathStep::ArrayIndexAsterisk.kind(), 4);
        assert_eq!(PathStep::DoubleAsterisk.kind(), 5);
    }

    #[test]
    fn test_resolve_placeholders() {
        let expr = Expr::Op {
            name: "&&".into(),
            args: vec![
                Expr::Op {
                    name: "==".into(),
                    args: vec![
                        Expr::PlaceholderNamed("name".into()),
                        Expr::Placeholder,
                    ],
                },
                Expr::PlaceholderNamed("name".into()),
            ],
        };

        let mut map = PlaceholderMap::new();
        let resolved = expr.resolve_placeholders(&mut map);

        let expected = Expr::Op {
            name: "&&".into(),
            args: vec![
                Expr::Op {
                    name: "==".into(),
                    args: vec![Expr::PlaceholderPos(0), Expr::PlaceholderPos(1)],
                },
                Expr::PlaceholderPos(0),
            ],
        };
        assert_eq!(resolved, expected);
        assert_eq!(map.len(), 2);
        assert_eq!(map.name_at(0), Some("name"));
    }

    #[test]
    fn test_placeholder_map_positions() {
        let mut map = PlaceholderMap::new();
        assert_eq!(map.named("a"), 0);
        assert_eq!(map.anonymous(), 1);
        assert_eq!(map.named("b"), 2);
        // Repeated names reuse their slot; anonymous never does.
        assert_eq!(map.named("a"), 0);
        assert_eq!(map.anonymous(), 3);
        assert_eq!(map.len(), 4);
        assert_eq!(map.name_at(2), Some("b"));
        assert_eq!(map.name_at(1), None);
    }
}
