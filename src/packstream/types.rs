//! PackStream value types.

use indexmap::IndexMap;

use super::structures::{
    Date, Duration, LocalDateTime, LocalTime, Node, OffsetDateTime, OffsetTime, Path, Point2D,
    Point3D, Relationship, UnboundRelationship, ZonedDateTime,
};

/// Map payload of a [`Value::Map`].
///
/// Insertion order is preserved so that encoding the same map twice
/// produces the same bytes.
pub type ValueMap = IndexMap<String, Value>;

/// A value that can cross the wire.
///
/// Scalars, containers and the generic [`Struct`] can be encoded and
/// decoded at every protocol version. The graph variants only ever arrive
/// from the server; the temporal and spatial variants require version 2
/// or later on both directions.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Null value
    Null,
    /// Boolean value
    Bool(bool),
    /// 64-bit signed integer
    Int(i64),
    /// 64-bit floating point
    Float(f64),
    /// UTF-8 string
    String(String),
    /// List of values
    List(Vec<Value>),
    /// Map of string keys to values, insertion-ordered
    Map(ValueMap),
    /// Generic tagged structure
    Struct(Struct),
    /// Graph node (decode-only)
    Node(Node),
    /// Graph relationship (decode-only)
    Relationship(Relationship),
    /// Relationship without endpoints, used inside paths (decode-only)
    UnboundRelationship(UnboundRelationship),
    /// Graph path (decode-only)
    Path(Path),
    /// Calendar date
    Date(Date),
    /// Time of day without timezone
    LocalTime(LocalTime),
    /// Time of day with a fixed zone offset
    Time(OffsetTime),
    /// Date and time without timezone
    LocalDateTime(LocalDateTime),
    /// Date and time with a fixed zone offset
    DateTime(OffsetDateTime),
    /// Date and time with a named timezone
    DateTimeZoned(ZonedDateTime),
    /// Temporal duration with independent month/day/second/nanosecond parts
    Duration(Duration),
    /// 2D spatial point
    Point2D(Point2D),
    /// 3D spatial point
    Point3D(Point3D),
}

/// A generic PackStream structure: a signature byte plus fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Struct {
    /// Signature byte identifying the structure kind
    pub signature: u8,
    /// Structure fields
    pub fields: Vec<Value>,
}

impl Struct {
    /// Create a new structure with the given signature and fields.
    pub fn new(signature: u8, fields: Vec<Value>) -> Self {
        Self { signature, fields }
    }

    /// Get the number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check if the structure has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Value {
    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Try to get as boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to get as integer.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Try to get as float. Integers widen losslessly enough for metadata use.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Try to get as string reference.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get as list reference.
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    /// Try to get as map reference.
    pub fn as_map(&self) -> Option<&ValueMap> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Try to get as generic structure reference.
    pub fn as_struct(&self) -> Option<&Struct> {
        match self {
            Value::Struct(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get as node reference.
    pub fn as_node(&self) -> Option<&Node> {
        match self {
            Value::Node(n) => Some(n),
            _ => None,
        }
    }

    /// Try to get as relationship reference.
    pub fn as_relationship(&self) -> Option<&Relationship> {
        match self {
            Value::Relationship(r) => Some(r),
            _ => None,
        }
    }

    /// Try to get as path reference.
    pub fn as_path(&self) -> Option<&Path> {
        match self {
            Value::Path(p) => Some(p),
            _ => None,
        }
    }

    /// Get the type name for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "Null",
            Value::Bool(_) => "Bool",
            Value::Int(_) => "Int",
            Value::Float(_) => "Float",
            Value::String(_) => "String",
            Value::List(_) => "List",
            Value::Map(_) => "Map",
            Value::Struct(_) => "Struct",
            Value::Node(_) => "Node",
            Value::Relationship(_) => "Relationship",
            Value::UnboundRelationship(_) => "UnboundRelationship",
            Value::Path(_) => "Path",
            Value::Date(_) => "Date",
            Value::LocalTime(_) => "LocalTime",
            Value::Time(_) => "Time",
            Value::LocalDateTime(_) => "LocalDateTime",
            Value::DateTime(_) => "DateTime",
            Value::DateTimeZoned(_) => "DateTimeZoned",
            Value::Duration(_) => "Duration",
            Value::Point2D(_) => "Point2D",
            Value::Point3D(_) => "Point3D",
        }
    }
}

// Conversions from host types

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::List(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(inner) => inner.into(),
            None => Value::Null,
        }
    }
}

impl From<ValueMap> for Value {
    fn from(v: ValueMap) -> Self {
        Value::Map(v)
    }
}

impl From<Struct> for Value {
    fn from(v: Struct) -> Self {
        Value::Struct(v)
    }
}

impl From<Duration> for Value {
    fn from(v: Duration) -> Self {
        Value::Duration(v)
    }
}

impl From<Date> for Value {
    fn from(v: Date) -> Self {
        Value::Date(v)
    }
}

impl From<Point2D> for Value {
    fn from(v: Point2D) -> Self {
        Value::Point2D(v)
    }
}

impl From<Point3D> for Value {
    fn from(v: Point3D) -> Self {
        Value::Point3D(v)
    }
}
