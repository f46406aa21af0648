//! CRUD payload structs and the expression wire codec.
//!
//! These are the client→server data-manipulation commands and the shared
//! building blocks they are assembled from. Expressions inside the
//! messages use [`crate::expr::Expr`]; each message threads one
//! [`PlaceholderMap`] through its expressions in encode order, so
//! unresolved placeholders are numbered by first appearance (resolve
//! trees with [`Expr::resolve_placeholders`] beforehand when the mapping
//! matters to the caller).

use crate::codec::{PayloadReader, PayloadWriter};
use crate::error::DecodeError;
use crate::expr::{DocPath, Expr, PathStep, PlaceholderMap, Scalar};

use super::PayloadCodec;

// Expr.Type wire values.
const EXPR_IDENT: u64 = 1;
const EXPR_LITERAL: u64 = 2;
const EXPR_VARIABLE: u64 = 3;
const EXPR_FUNC_CALL: u64 = 4;
const EXPR_OPERATOR: u64 = 5;
const EXPR_PLACEHOLDER: u64 = 6;
const EXPR_OBJECT: u64 = 7;
const EXPR_ARRAY: u64 = 8;

/// Collection or table a command operates on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collection {
    pub name: String,
    pub schema: Option<String>,
}

impl Collection {
    /// Unqualified collection name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schema: None,
        }
    }

    /// Schema-qualified collection name.
    pub fn qualified(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schema: Some(schema.into()),
        }
    }
}

impl PayloadCodec for Collection {
    fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        let mut r = PayloadReader::new(payload);
        let mut name = None;
        let mut schema = None;
        while let Some((field, wire)) = r.next_field()? {
            match field {
                1 => name = Some(r.string_value(1, wire)?.to_string()),
                2 => schema = Some(r.string_value(2, wire)?.to_string()),
                _ => r.skip(wire)?,
            }
        }
        Ok(Self {
            name: name.ok_or(DecodeError::MissingField(1))?,
            schema,
        })
    }

    fn encode_fields(&self, w: &mut PayloadWriter<'_>) {
        w.str(1, &self.name);
        if let Some(schema) = &self.schema {
            w.str(2, schema);
        }
    }
}

/// Data model a command addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataModel {
    Document,
    Table,
}

impl DataModel {
    pub fn from_wire(value: u64) -> Result<Self, DecodeError> {
        Ok(match value {
            1 => DataModel::Document,
            2 => DataModel::Table,
            _ => return Err(DecodeError::Enum(1)),
        })
    }

    pub fn to_wire(self) -> u64 {
        match self {
            DataModel::Document => 1,
            DataModel::Table => 2,
        }
    }
}

/// Row-count limit with optional offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limit {
    pub row_count: u64,
    pub offset: Option<u64>,
}

impl PayloadCodec for Limit {
    fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        let mut r = PayloadReader::new(payload);
        let mut row_count = None;
        let mut offset = None;
        while let Some((field, wire)) = r.next_field()? {
            match field {
                1 => row_count = Some(r.varint_value(1, wire)?),
                2 => offset = Some(r.varint_value(2, wire)?),
                _ => r.skip(wire)?,
            }
        }
        Ok(Self {
            row_count: row_count.ok_or(DecodeError::MissingField(1))?,
            offset,
        })
    }

    fn encode_fields(&self, w: &mut PayloadWriter<'_>) {
        w.uint(1, self.row_count);
        if let Some(offset) = self.offset {
            w.uint(2, offset);
        }
    }
}

/// Sort direction in an [`Order`] clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn from_wire(value: u64) -> Result<Self, DecodeError> {
        Ok(match value {
            1 => SortDirection::Asc,
            2 => SortDirection::Desc,
            _ => return Err(DecodeError::Enum(2)),
        })
    }

    pub fn to_wire(self) -> u64 {
        match self {
            SortDirection::Asc => 1,
            SortDirection::Desc => 2,
        }
    }
}

/// One sort key.
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub expr: Expr,
    pub direction: Option<SortDirection>,
}

fn encode_order(o: &Order, w: &mut PayloadWriter<'_>, ph: &mut PlaceholderMap) {
    w.nested(1, |e| encode_expr(&o.expr, e, ph));
    if let Some(direction) = o.direction {
        w.uint(2, direction.to_wire());
    }
}

fn decode_order(payload: &[u8]) -> Result<Order, DecodeError> {
    let mut r = PayloadReader::new(payload);
    let mut expr = None;
    let mut direction = None;
    while let Some((field, wire)) = r.next_field()? {
        match field {
            1 => expr = Some(decode_expr(r.bytes_value(1, wire)?)?),
            2 => direction = Some(SortDirection::from_wire(r.varint_value(2, wire)?)?),
            _ => r.skip(wire)?,
        }
    }
    Ok(Order {
        expr: expr.ok_or(DecodeError::MissingField(1))?,
        direction,
    })
}

/// One projected output expression with an optional alias.
#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    pub source: Expr,
    pub alias: Option<String>,
}

fn encode_projection(p: &Projection, w: &mut PayloadWriter<'_>, ph: &mut PlaceholderMap) {
    w.nested(1, |e| encode_expr(&p.source, e, ph));
    if let Some(alias) = &p.alias {
        w.str(2, alias);
    }
}

fn decode_projection(payload: &[u8]) -> Result<Projection, DecodeError> {
    let mut r = PayloadReader::new(payload);
    let mut source = None;
    let mut alias = None;
    while let Some((field, wire)) = r.next_field()? {
        match field {
            1 => source = Some(decode_expr(r.bytes_value(1, wire)?)?),
            2 => alias = Some(r.string_value(2, wire)?.to_string()),
            _ => r.skip(wire)?,
        }
    }
    Ok(Projection {
        source: source.ok_or(DecodeError::MissingField(1))?,
        alias,
    })
}

/// Insert target column.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Column {
    pub name: Option<String>,
    pub alias: Option<String>,
    pub path: DocPath,
}

impl Column {
    /// Plain named column.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            alias: None,
            path: DocPath::new(),
        }
    }
}

impl PayloadCodec for Column {
    fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        let mut r = PayloadReader::new(payload);
        let mut column = Column::default();
        while let Some((field, wire)) = r.next_field()? {
            match field {
                1 => column.name = Some(r.string_value(1, wire)?.to_string()),
                2 => column.alias = Some(r.string_value(2, wire)?.to_string()),
                3 => column
                    .path
                    .0
                    .push(decode_path_item(r.bytes_value(3, wire)?)?),
                _ => r.skip(wire)?,
            }
        }
        Ok(column)
    }

    fn encode_fields(&self, w: &mut PayloadWriter<'_>) {
        if let Some(name) = &self.name {
            w.str(1, name);
        }
        if let Some(alias) = &self.alias {
            w.str(2, alias);
        }
        for step in &self.path.0 {
            w.nested(3, |item| encode_path_item(step, item));
        }
    }
}

/// Identifier of a column (or document field) in update operations and
/// expressions: optional name/table/schema qualification plus a document
/// path into the value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ColumnIdentifier {
    pub name: Option<String>,
    pub table: Option<String>,
    pub schema: Option<String>,
    pub path: DocPath,
}

impl ColumnIdentifier {
    /// Identifier for a plain named column.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Identifier for a document path with no column qualification.
    pub fn path(path: DocPath) -> Self {
        Self {
            path,
            ..Self::default()
        }
    }
}

impl PayloadCodec for ColumnIdentifier {
    fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        let mut r = PayloadReader::new(payload);
        let mut id = ColumnIdentifier::default();
        while let Some((field, wire)) = r.next_field()? {
            match field {
                1 => id.path.0.push(decode_path_item(r.bytes_value(1, wire)?)?),
                2 => id.name = Some(r.string_value(2, wire)?.to_string()),
                3 => id.table = Some(r.string_value(3, wire)?.to_string()),
                4 => id.schema = Some(r.string_value(4, wire)?.to_string()),
                _ => r.skip(wire)?,
            }
        }
        Ok(id)
    }

    fn encode_fields(&self, w: &mut PayloadWriter<'_>) {
        for step in &self.path.0 {
            w.nested(1, |item| encode_path_item(step, item));
        }
        if let Some(name) = &self.name {
            w.str(2, name);
        }
        if let Some(table) = &self.table {
            w.str(3, table);
        }
        if let Some(schema) = &self.schema {
            w.str(4, schema);
        }
    }
}

/// `DocumentPathItem { type = 1, value = 2, index = 3 }`.
fn encode_path_item(step: &PathStep, w: &mut PayloadWriter<'_>) {
    w.uint(1, u64::from(step.kind()));
    match step {
        PathStep::Member(name) => w.str(2, name),
        PathStep::ArrayIndex(idx) => w.uint(3, u64::from(*idx)),
        _ => {}
    }
}

fn decode_path_item(payload: &[u8]) -> Result<PathStep, DecodeError> {
    let mut r = PayloadReader::new(payload);
    let mut kind = None;
    let mut value = None;
    let mut index = None;
    while let Some((field, wire)) = r.next_field()? {
        match field {
            1 => kind = Some(r.varint_value(1, wire)?),
            2 => value = Some(r.string_value(2, wire)?.to_string()),
            3 => index = Some(r.varint_value(3, wire)? as u32),
            _ => r.skip(wire)?,
        }
    }
    match kind.ok_or(DecodeError::MissingField(1))? {
        1 => value
            .map(PathStep::Member)
            .ok_or(DecodeError::MissingField(2)),
        2 => Ok(PathStep::MemberAsterisk),
        3 => index
            .map(PathStep::ArrayIndex)
            .ok_or(DecodeError::MissingField(3)),
        4 => Ok(PathStep::ArrayIndexAsterisk),
        5 => Ok(PathStep::DoubleAsterisk),
        _ => Err(DecodeError::Enum(1)),
    }
}

// ---------------------------------------------------------------------------
// Expression wire codec
// ---------------------------------------------------------------------------

/// Encode an expression tree, numbering unresolved placeholders through
/// `ph` in order of first appearance.
pub(crate) fn encode_expr(expr: &Expr, w: &mut PayloadWriter<'_>, ph: &mut PlaceholderMap) {
    match expr {
        Expr::Literal(scalar) => {
            w.uint(1, EXPR_LITERAL);
            w.nested(4, |s| scalar.encode_fields(s));
        }
        Expr::Variable(name) => {
            w.uint(1, EXPR_VARIABLE);
            w.str(3, name);
        }
        Expr::Ident {
            name,
            table,
            schema,
            path,
        } => {
            let id = ColumnIdentifier {
                name: name.clone(),
                table: table.clone(),
                schema: schema.clone(),
                path: path.clone(),
            };
            w.uint(1, EXPR_IDENT);
            w.nested(2, |i| id.encode_fields(i));
        }
        Expr::Path(path) => {
            w.uint(1, EXPR_IDENT);
            let id = ColumnIdentifier::path(path.clone());
            w.nested(2, |i| id.encode_fields(i));
        }
        Expr::Op { name, args } => {
            w.uint(1, EXPR_OPERATOR);
            w.nested(6, |op| {
                op.str(1, name);
                for arg in args {
                    op.nested(2, |a| encode_expr(arg, a, ph));
                }
            });
        }
        Expr::Call { name, schema, args } => {
            w.uint(1, EXPR_FUNC_CALL);
            w.nested(5, |call| {
                call.nested(1, |id| {
                    id.str(1, name);
                    if let Some(schema) = schema {
                        id.str(2, schema);
                    }
                });
                for arg in args {
                    call.nested(2, |a| encode_expr(arg, a, ph));
                }
            });
        }
        Expr::Placeholder => {
            w.uint(1, EXPR_PLACEHOLDER);
            w.uint(7, u64::from(ph.anonymous()));
        }
        Expr::PlaceholderNamed(name) => {
            w.uint(1, EXPR_PLACEHOLDER);
            w.uint(7, u64::from(ph.named(name)));
        }
        Expr::PlaceholderPos(pos) => {
            w.uint(1, EXPR_PLACEHOLDER);
            w.uint(7, u64::from(*pos));
        }
        Expr::Object(fields) => {
            w.uint(1, EXPR_OBJECT);
            w.nested(8, |obj| {
                for (key, value) in fields {
                    obj.nested(1, |fld| {
                        fld.str(1, key);
                        fld.nested(2, |v| encode_expr(value, v, ph));
                    });
                }
            });
        }
        Expr::Array(items) => {
            w.uint(1, EXPR_ARRAY);
            w.nested(9, |arr| {
                for item in items {
                    arr.nested(1, |v| encode_expr(item, v, ph));
                }
            });
        }
    }
}

/// Decode an expression tree. Placeholders come back positional.
pub(crate) fn decode_expr(payload: &[u8]) -> Result<Expr, DecodeError> {
    let mut r = PayloadReader::new(payload);
    let mut ty = None;
    let mut identifier = None;
    let mut variable = None;
    let mut literal = None;
    let mut function_call = None;
    let mut operator = None;
    let mut position = None;
    let mut object = None;
    let mut array = None;

    while let Some((field, wire)) = r.next_field()? {
        match field {
            1 => ty = Some(r.varint_value(1, wire)?),
            2 => identifier = Some(ColumnIdentifier::decode(r.bytes_value(2, wire)?)?),
            3 => variable = Some(r.string_value(3, wire)?.to_string()),
            4 => literal = Some(Scalar::decode(r.bytes_value(4, wire)?)?),
            5 => function_call = Some(decode_function_call(r.bytes_value(5, wire)?)?),
            6 => operator = Some(decode_operator(r.bytes_value(6, wire)?)?),
            7 => position = Some(r.varint_value(7, wire)? as u32),
            8 => object = Some(decode_expr_object(r.bytes_value(8, wire)?)?),
            9 => array = Some(decode_expr_array(r.bytes_value(9, wire)?)?),
            _ => r.skip(wire)?,
        }
    }

    match ty.ok_or(DecodeError::MissingField(1))? {
        EXPR_LITERAL => literal
            .map(Expr::Literal)
            .ok_or(DecodeError::MissingField(4)),
        EXPR_VARIABLE => variable
            .map(Expr::Variable)
            .ok_or(DecodeError::MissingField(3)),
        EXPR_IDENT => {
            let id = identifier.ok_or(DecodeError::MissingField(2))?;
            // A bare document path is an identifier with no qualification.
            if id.name.is_none() && id.table.is_none() && id.schema.is_none() {
                Ok(Expr::Path(id.path))
            } else {
                Ok(Expr::Ident {
                    name: id.name,
                    table: id.table,
                    schema: id.schema,
                    path: id.path,
                })
            }
        }
        EXPR_OPERATOR => {
            let (name, args) = operator.ok_or(DecodeError::MissingField(6))?;
            Ok(Expr::Op { name, args })
        }
        EXPR_FUNC_CALL => {
            let (name, schema, args) = function_call.ok_or(DecodeError::MissingField(5))?;
            Ok(Expr::Call { name, schema, args })
        }
        EXPR_PLACEHOLDER => position
            .map(Expr::PlaceholderPos)
            .ok_or(DecodeError::MissingField(7)),
        EXPR_OBJECT => object.map(Expr::Object).ok_or(DecodeError::MissingField(8)),
        EXPR_ARRAY => array.map(Expr::Array).ok_or(DecodeError::MissingField(9)),
        _ => Err(DecodeError::Enum(1)),
    }
}

/// `Operator { name = 1, param = 2 }`.
fn decode_operator(payload: &[u8]) -> Result<(String, Vec<Expr>), DecodeError> {
    let mut r = PayloadReader::new(payload);
    let mut name = None;
    let mut args = Vec::new();
    while let Some((field, wire)) = r.next_field()? {
        match field {
            1 => name = Some(r.string_value(1, wire)?.to_string()),
            2 => args.push(decode_expr(r.bytes_value(2, wire)?)?),
            _ => r.skip(wire)?,
        }
    }
    Ok((name.ok_or(DecodeError::MissingField(1))?, args))
}

/// `FunctionCall { name = 1 (Identifier), param = 2 }`.
fn decode_function_call(
    payload: &[u8],
) -> Result<(String, Option<String>, Vec<Expr>), DecodeError> {
    let mut r = PayloadReader::new(payload);
    let mut ident = None;
    let mut args = Vec::new();
    while let Some((field, wire)) = r.next_field()? {
        match field {
            1 => {
                let raw = r.bytes_value(1, wire)?;
                let mut ir = PayloadReader::new(raw);
                let mut name = None;
                let mut schema = None;
                while let Some((f, w)) = ir.next_field()? {
                    match f {
                        1 => name = Some(ir.string_value(1, w)?.to_string()),
                        2 => schema = Some(ir.string_value(2, w)?.to_string()),
                        _ => ir.skip(w)?,
                    }
                }
                ident = Some((name.ok_or(DecodeError::MissingField(1))?, schema));
            }
            2 => args.push(decode_expr(r.bytes_value(2, wire)?)?),
            _ => r.skip(wire)?,
        }
    }
    let (name, schema) = ident.ok_or(DecodeError::MissingField(1))?;
    Ok((name, schema, args))
}

/// Expression-valued `Object { fld = 1 { key = 1, value = 2 } }`.
fn decode_expr_object(payload: &[u8]) -> Result<Vec<(String, Expr)>, DecodeError> {
    let mut r = PayloadReader::new(payload);
    let mut fields = Vec::new();
    while let Some((field, wire)) = r.next_field()? {
        match field {
            1 => {
                let raw = r.bytes_value(1, wire)?;
                let mut fr = PayloadReader::new(raw);
                let mut key = None;
                let mut value = None;
                while let Some((f, w)) = fr.next_field()? {
                    match f {
                        1 => key = Some(fr.string_value(1, w)?.to_string()),
                        2 => value = Some(decode_expr(fr.bytes_value(2, w)?)?),
                        _ => fr.skip(w)?,
                    }
                }
                fields.push((
                    key.ok_or(DecodeError::MissingField(1))?,
                    value.ok_or(DecodeError::MissingField(2))?,
                ));
            }
            _ => r.skip(wire)?,
        }
    }
    Ok(fields)
}

/// Expression-valued `Array { value = 1 }`.
fn decode_expr_array(payload: &[u8]) -> Result<Vec<Expr>, DecodeError> {
    let mut r = PayloadReader::new(payload);
    let mut items = Vec::new();
    while let Some((field, wire)) = r.next_field()? {
        match field {
            1 => items.push(decode_expr(r.bytes_value(1, wire)?)?),
            _ => r.skip(wire)?,
        }
    }
    Ok(items)
}

// ---------------------------------------------------------------------------
// CRUD commands
// ---------------------------------------------------------------------------

/// Read rows/documents from a collection.
#[derive(Debug, Clone, PartialEq)]
pub struct CrudFind {
    pub collection: Collection,
    pub data_model: Option<DataModel>,
    pub projection: Vec<Projection>,
    pub criteria: Option<Expr>,
    pub limit: Option<Limit>,
    pub order: Vec<Order>,
    pub grouping: Vec<Expr>,
    pub grouping_criteria: Option<Expr>,
}

impl CrudFind {
    /// Find everything in a collection.
    pub fn all(collection: Collection) -> Self {
        Self {
            collection,
            data_model: None,
            projection: Vec::new(),
            criteria: None,
            limit: None,
            order: Vec::new(),
            grouping: Vec::new(),
            grouping_criteria: None,
        }
    }
}

impl PayloadCodec for CrudFind {
    fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        let mut r = PayloadReader::new(payload);
        let mut collection = None;
        let mut find = CrudFind::all(Collection::new(""));
        while let Some((field, wire)) = r.next_field()? {
            match field {
                2 => collection = Some(Collection::decode(r.bytes_value(2, wire)?)?),
                3 => find.data_model = Some(DataModel::from_wire(r.varint_value(3, wire)?)?),
                4 => find
                    .projection
                    .push(decode_projection(r.bytes_value(4, wire)?)?),
                5 => find.criteria = Some(decode_expr(r.bytes_value(5, wire)?)?),
                6 => find.limit = Some(Limit::decode(r.bytes_value(6, wire)?)?),
                7 => find.order.push(decode_order(r.bytes_value(7, wire)?)?),
                8 => find.grouping.push(decode_expr(r.bytes_value(8, wire)?)?),
                9 => find.grouping_criteria = Some(decode_expr(r.bytes_value(9, wire)?)?),
                _ => r.skip(wire)?,
            }
        }
        find.collection = collection.ok_or(DecodeError::MissingField(2))?;
        Ok(find)
    }

    fn encode_fields(&self, w: &mut PayloadWriter<'_>) {
        let mut ph = PlaceholderMap::new();
        w.nested(2, |c| self.collection.encode_fields(c));
        if let Some(model) = self.data_model {
            w.uint(3, model.to_wire());
        }
        for projection in &self.projection {
            w.nested(4, |p| encode_projection(projection, p, &mut ph));
        }
        if let Some(criteria) = &self.criteria {
            w.nested(5, |e| encode_expr(criteria, e, &mut ph));
        }
        if let Some(limit) = &self.limit {
            w.nested(6, |l| limit.encode_fields(l));
        }
        for order in &self.order {
            w.nested(7, |o| encode_order(order, o, &mut ph));
        }
        for grouping in &self.grouping {
            w.nested(8, |g| encode_expr(grouping, g, &mut ph));
        }
        if let Some(criteria) = &self.grouping_criteria {
            w.nested(9, |e| encode_expr(criteria, e, &mut ph));
        }
    }
}

/// One row of expression values for an insert.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TypedRow {
    pub fields: Vec<Expr>,
}

fn encode_typed_row(row: &TypedRow, w: &mut PayloadWriter<'_>, ph: &mut PlaceholderMap) {
    for field in &row.fields {
        w.nested(1, |f| encode_expr(field, f, ph));
    }
}

fn decode_typed_row(payload: &[u8]) -> Result<TypedRow, DecodeError> {
    let mut r = PayloadReader::new(payload);
    let mut fields = Vec::new();
    while let Some((field, wire)) = r.next_field()? {
        match field {
            1 => fields.push(decode_expr(r.bytes_value(1, wire)?)?),
            _ => r.skip(wire)?,
        }
    }
    Ok(TypedRow { fields })
}

/// Insert rows/documents into a collection.
#[derive(Debug, Clone, PartialEq)]
pub struct CrudInsert {
    pub collection: Collection,
    pub data_model: Option<DataModel>,
    pub projection: Vec<Column>,
    pub rows: Vec<TypedRow>,
}

impl PayloadCodec for CrudInsert {
    fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        let mut r = PayloadReader::new(payload);
        let mut collection = None;
        let mut data_model = None;
        let mut projection = Vec::new();
        let mut rows = Vec::new();
        while let Some((field, wire)) = r.next_field()? {
            match field {
                1 => collection = Some(Collection::decode(r.bytes_value(1, wire)?)?),
                2 => data_model = Some(DataModel::from_wire(r.varint_value(2, wire)?)?),
                3 => projection.push(Column::decode(r.bytes_value(3, wire)?)?),
                4 => rows.push(decode_typed_row(r.bytes_value(4, wire)?)?),
                _ => r.skip(wire)?,
            }
        }
        Ok(Self {
            collection: collection.ok_or(DecodeError::MissingField(1))?,
            data_model,
            projection,
            rows,
        })
    }

    fn encode_fields(&self, w: &mut PayloadWriter<'_>) {
        let mut ph = PlaceholderMap::new();
        w.nested(1, |c| self.collection.encode_fields(c));
        if let Some(model) = self.data_model {
            w.uint(2, model.to_wire());
        }
        for column in &self.projection {
            w.nested(3, |c| column.encode_fields(c));
        }
        for row in &self.rows {
            w.nested(4, |r| encode_typed_row(row, r, &mut ph));
        }
    }
}

/// Kind of change an [`UpdateOperation`] applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateType {
    Set,
    ItemRemove,
    ItemSet,
    ItemReplace,
    ItemMerge,
    ArrayInsert,
    ArrayAppend,
}

impl UpdateType {
    pub fn from_wire(value: u64) -> Result<Self, DecodeError> {
        Ok(match value {
            1 => UpdateType::Set,
            2 => UpdateType::ItemRemove,
            3 => UpdateType::ItemSet,
            4 => UpdateType::ItemReplace,
            5 => UpdateType::ItemMerge,
            6 => UpdateType::ArrayInsert,
            7 => UpdateType::ArrayAppend,
            _ => return Err(DecodeError::Enum(2)),
        })
    }

    pub fn to_wire(self) -> u64 {
        match self {
            UpdateType::Set => 1,
            UpdateType::ItemRemove => 2,
            UpdateType::ItemSet => 3,
            UpdateType::ItemReplace => 4,
            UpdateType::ItemMerge => 5,
            UpdateType::ArrayInsert => 6,
            UpdateType::ArrayAppend => 7,
        }
    }
}

/// One change inside an update command.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateOperation {
    pub source: ColumnIdentifier,
    pub operation: UpdateType,
    pub value: Option<Expr>,
}

fn encode_update_op(op: &UpdateOperation, w: &mut PayloadWriter<'_>, ph: &mut PlaceholderMap) {
    w.nested(1, |s| op.source.encode_fields(s));
    w.uint(2, op.operation.to_wire());
    if let Some(value) = &op.value {
        w.nested(3, |v| encode_expr(value, v, ph));
    }
}

fn decode_update_op(payload: &[u8]) -> Result<UpdateOperation, DecodeError> {
    let mut r = PayloadReader::new(payload);
    let mut source = None;
    let mut operation = None;
    let mut value = None;
    while let Some((field, wire)) = r.next_field()? {
        match field {
            1 => source = Some(ColumnIdentifier::decode(r.bytes_value(1, wire)?)?),
            2 => operation = Some(UpdateType::from_wire(r.varint_value(2, wire)?)?),
            3 => value = Some(decode_expr(r.bytes_value(3, wire)?)?),
            _ => r.skip(wire)?,
        }
    }
    Ok(UpdateOperation {
        source: source.ok_or(DecodeError::MissingField(1))?,
        operation: operation.ok_or(DecodeError::MissingField(2))?,
        value,
    })
}

/// Update rows/documents in a collection.
#[derive(Debug, Clone, PartialEq)]
pub struct CrudUpdate {
    pub collection: Collection,
    pub data_model: Option<DataModel>,
    pub criteria: Option<Expr>,
    pub limit: Option<Limit>,
    pub order: Vec<Order>,
    pub operations: Vec<UpdateOperation>,
}

impl PayloadCodec for CrudUpdate {
    fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        let mut r = PayloadReader::new(payload);
        let mut collection = None;
        let mut data_model = None;
        let mut criteria = None;
        let mut limit = None;
        let mut order = Vec::new();
        let mut operations = Vec::new();
        while let Some((field, wire)) = r.next_field()? {
            match field {
                2 => collection = Some(Collection::decode(r.bytes_value(2, wire)?)?),
                3 => data_model = Some(DataModel::from_wire(r.varint_value(3, wire)?)?),
                4 => criteria = Some(decode_expr(r.bytes_value(4, wire)?)?),
                5 => limit = Some(Limit::decode(r.bytes_value(5, wire)?)?),
                6 => order.push(decode_order(r.bytes_value(6, wire)?)?),
                7 => operations.push(decode_update_op(r.bytes_value(7, wire)?)?),
                _ => r.skip(wire)?,
            }
        }
        Ok(Self {
            collection: collection.ok_or(DecodeError::MissingField(2))?,
            data_model,
            criteria,
            limit,
            order,
            operations,
        })
    }

    fn encode_fields(&self, w: &mut PayloadWriter<'_>) {
        let mut ph = PlaceholderMap::new();
        w.nested(2, |c| self.collection.encode_fields(c));
        if let Some(model) = self.data_model {
            w.uint(3, model.to_wire());
        }
        if let Some(criteria) = &self.criteria {
            w.nested(4, |e| encode_expr(criteria, e, &mut ph));
        }
        if let Some(limit) = &self.limit {
            w.nested(5, |l| limit.encode_fields(l));
        }
        for order in &self.order {
            w.nested(6, |o| encode_order(order, o, &mut ph));
        }
        for op in &self.operations {
            w.nested(7, |o| encode_update_op(op, o, &mut ph));
        }
    }
}

/// Delete rows/documents from a collection.
#[derive(Debug, Clone, PartialEq)]
pub struct CrudDelete {
    pub collection: Collection,
    pub data_model: Option<DataModel>,
    pub criteria: Option<Expr>,
    pub limit: Option<Limit>,
    pub order: Vec<Order>,
}

impl CrudDelete {
    /// Delete everything in a collection.
    pub fn all(collection: Collection) -> Self {
        Self {
            collection,
            data_model: None,
            criteria: None,
            limit: None,
            order: Vec::new(),
        }
    }
}

impl PayloadCodec for CrudDelete {
    fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        let mut r = PayloadReader::new(payload);
        let mut collection = None;
        let mut delete = CrudDelete::all(Collection::new(""));
        while let Some((field, wire)) = r.next_field()? {
            match field {
                1 => collection = Some(Collection::decode(r.bytes_value(1, wire)?)?),
                2 => delete.data_model = Some(DataModel::from_wire(r.varint_value(2, wire)?)?),
                3 => delete.criteria = Some(decode_expr(r.bytes_value(3, wire)?)?),
                4 => delete.limit = Some(Limit::decode(r.bytes_value(4, wire)?)?),
                5 => delete.order.push(decode_order(r.bytes_value(5, wire)?)?),
                _ => r.skip(wire)?,
            }
        }
        delete.collection = collection.ok_or(DecodeError::MissingField(1))?;
        Ok(delete)
    }

    fn encode_fields(&self, w: &mut PayloadWriter<'_>) {
        let mut ph = PlaceholderMap::new();
        w.nested(1, |c| self.collection.encode_fields(c));
        if let Some(model) = self.data_model {
            w.uint(2, model.to_wire());
        }
        if let Some(criteria) = &self.criteria {
            w.nested(3, |e| encode_expr(criteria, e, &mut ph));
        }
        if let Some(limit) = &self.limit {
            w.nested(4, |l| limit.encode_fields(l));
        }
        for order in &self.order {
            w.nested(5, |o| encode_order(order, o, &mut ph));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    fn roundtrip<T: PayloadCodec + PartialEq + std::fmt::Debug>(value: &T) {
        let mut buf = BytesMut::new();
        value.encode_fields(&mut PayloadWriter::new(&mut buf));
        assert_eq!(&T::decode(&buf).unwrap(), value);
    }

    fn expr_roundtrip(expr: &Expr) {
        let mut buf = BytesMut::new();
        let mut ph = PlaceholderMap::new();
        encode_expr(expr, &mut PayloadWriter::new(&mut buf), &mut ph);
        assert_eq!(&decode_expr(&buf).unwrap(), expr);
    }

    #[test]
    fn test_expr_roundtrips() {
        expr_roundtrip(&Expr::Literal(Scalar::Sint(-5)));
        expr_roundtrip(&Expr::Variable("autocommit".into()));
        expr_roundtrip(&Expr::Ident {
            name: Some("age".into()),
            table: Some("users".into()),
            schema: Some("app".into()),
            path: DocPath::new(),
        });
        expr_roundtrip(&Expr::Path(DocPath::new().member("address").member("city")));
        expr_roundtrip(&Expr::PlaceholderPos(3));
        expr_roundtrip(&Expr::Op {
            name: ">".into(),
            args: vec![
                Expr::Ident {
                    name: Some("age".into()),
                    table: None,
                    schema: None,
                    path: DocPath::new(),
                },
                Expr::Literal(Scalar::Uint(18)),
            ],
        });
        expr_roundtrip(&Expr::Call {
            name: "concat".into(),
            schema: Some("app".into()),
            args: vec![
                Expr::Literal(Scalar::Str("a".into())),
                Expr::Literal(Scalar::Str("b".into())),
            ],
        });
        expr_roundtrip(&Expr::Array(vec![
            Expr::Literal(Scalar::Bool(true)),
            Expr::PlaceholderPos(0),
        ]));
        expr_roundtrip(&Expr::Object(vec![(
            "key".into(),
            Expr::Literal(Scalar::Null),
        )]));
    }

    #[test]
    fn test_named_placeholders_become_positions() {
        let expr = Expr::Op {
            name: "&&".into(),
            args: vec![
                Expr::PlaceholderNamed("a".into()),
                Expr::Placeholder,
                Expr::PlaceholderNamed("a".into()),
            ],
        };

        let mut buf = BytesMut::new();
        let mut ph = PlaceholderMap::new();
        encode_expr(&expr, &mut PayloadWriter::new(&mut buf), &mut ph);
        assert_eq!(ph.len(), 2);

        let decoded = decode_expr(&buf).unwrap();
        assert_eq!(
            decoded,
            Expr::Op {
                name: "&&".into(),
                args: vec![
                    Expr::PlaceholderPos(0),
                    Expr::PlaceholderPos(1),
                    Expr::PlaceholderPos(0),
                ],
            }
        );
    }

    #[test]
    fn test_column_identifier_roundtrip() {
        roundtrip(&ColumnIdentifier::named("id"));
        roundtrip(&ColumnIdentifier {
            name: Some("doc".into()),
            table: Some("t".into()),
            schema: Some("s".into()),
            path: DocPath::new().member("a").index(2),
        });
        roundtrip(&ColumnIdentifier::path(
            DocPath(vec![
                PathStep::Member("a".into()),
                PathStep::MemberAsterisk,
                PathStep::ArrayIndexAsterisk,
                PathStep::DoubleAsterisk,
            ]),
        ));
    }

    #[test]
    fn test_collection_and_limit_roundtrip() {
        roundtrip(&Collection::new("todo"));
        roundtrip(&Collection::qualified("app", "todo"));
        roundtrip(&Limit {
            row_count: 10,
            offset: None,
        });
        roundtrip(&Limit {
            row_count: 10,
            offset: Some(20),
        });
    }

    #[test]
    fn test_find_roundtrip() {
        roundtrip(&CrudFind::all(Collection::new("todo")));

        let find = CrudFind {
            collection: Collection::qualified("app", "users"),
            data_model: Some(DataModel::Table),
            projection: vec![Projection {
                source: Expr::Ident {
                    name: Some("name".into()),
                    table: None,
                    schema: None,
                    path: DocPath::new(),
                },
                alias: Some("n".into()),
            }],
            criteria: Some(Expr::Op {
                name: ">".into(),
                args: vec![
                    Expr::Ident {
                        name: Some("age".into()),
                        table: None,
                        schema: None,
                        path: DocPath::new(),
                    },
                    Expr::PlaceholderPos(0),
                ],
            }),
            limit: Some(Limit {
                row_count: 100,
                offset: Some(10),
            }),
            order: vec![Order {
                expr: Expr::Ident {
                    name: Some("age".into()),
                    table: None,
                    schema: None,
                    path: DocPath::new(),
                },
                direction: Some(SortDirection::Desc),
            }],
            grouping: vec![],
            grouping_criteria: None,
        };
        roundtrip(&find);
    }

    #[test]
    fn test_find_requires_collection() {
        assert_eq!(
            CrudFind::decode(&[]).unwrap_err(),
            DecodeError::MissingField(2)
        );
    }

    #[test]
    fn test_insert_roundtrip() {
        roundtrip(&CrudInsert {
            collection: Collection::new("users"),
            data_model: Some(DataModel::Table),
            projection: vec![Column::named("name"), Column::named("age")],
            rows: vec![
                TypedRow {
                    fields: vec![
                        Expr::Literal(Scalar::Str("ada".into())),
                        Expr::Literal(Scalar::Uint(36)),
                    ],
                },
                TypedRow {
                    fields: vec![
                        Expr::Literal(Scalar::Str("alan".into())),
                        Expr::Literal(Scalar::Uint(41)),
                    ],
                },
            ],
        });
    }

    #[test]
    fn test_update_roundtrip() {
        roundtrip(&CrudUpdate {
            collection: Collection::new("todo"),
            data_model: Some(DataModel::Document),
            criteria: Some(Expr::Op {
                name: "==".into(),
                args: vec![
                    Expr::Path(DocPath::new().member("done")),
                    Expr::Literal(Scalar::Bool(false)),
                ],
            }),
            limit: None,
            order: vec![],
            operations: vec![UpdateOperation {
                source: ColumnIdentifier::path(DocPath::new().member("done")),
                operation: UpdateType::ItemSet,
                value: Some(Expr::Literal(Scalar::Bool(true))),
            }],
        });
    }

    #[test]
    fn test_delete_roundtrip() {
        roundtrip(&CrudDelete::all(Collection::new("todo")));
        roundtrip(&CrudDelete {
            collection: Collection::new("todo"),
            data_model: None,
            criteria: Some(Expr::Op {
                name: "==".into(),
                args: vec![
                    Expr::Path(DocPath::new().member("_id")),
                    Expr::PlaceholderPos(0),
                ],
            }),
            limit: Some(Limit {
                row_count: 1,
                offset: None,
            }),
            order: vec![],
        });
    }

    #[test]
    fn test_update_type_wire_values() {
        for ty in [
            UpdateType::Set,
            UpdateType::ItemRemove,
            UpdateType::ItemSet,
            UpdateType::ItemReplace,
            UpdateType::ItemMerge,
            UpdateType::ArrayInsert,
            UpdateType::ArrayAppend,
        ] {
            assert_eq!(UpdateType::from_wire(ty.to_wire()).unwrap(), ty);
        }
        assert!(UpdateType::from_wire(0).is_err());
    }

    #[test]
    fn test_path_item_missing_member_name_rejected() {
        let mut buf = BytesMut::new();
        PayloadWriter::new(&mut buf).uint(1, 1); // MEMBER without value
        assert_eq!(
            decode_path_item(&buf).unwrap_err(),
            DecodeError::MissingField(2)
        );
    }
}
