//! Typed graph, temporal and spatial structures.
//!
//! Each type mirrors one wire structure signature. The graph types only
//! ever arrive from the server; the temporal types convert to and from
//! `chrono` calendar types.

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

use super::types::{Value, ValueMap};
use super::DecodeError;

const NANOS_PER_SEC: i64 = 1_000_000_000;
const MICROS_PER_SEC: i64 = 1_000_000;

/// Days from 0001-01-01 (CE day 1) to the Unix epoch.
const EPOCH_DAYS_FROM_CE: i64 = 719_163;

/// A graph node: identity, labels and properties.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// Node id
    pub id: i64,
    /// Node labels
    pub labels: Vec<String>,
    /// Node properties
    pub properties: ValueMap,
}

impl Node {
    /// Create a new node.
    pub fn new(id: i64, labels: Vec<String>, properties: ValueMap) -> Self {
        Self {
            id,
            labels,
            properties,
        }
    }

    /// Check whether the node carries the given label.
    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }

    /// Get a property value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    pub(crate) fn from_fields(fields: Vec<Value>) -> Result<Self, DecodeError> {
        let mut it = fields.into_iter();
        match (it.next(), it.next(), it.next(), it.next()) {
            (Some(Value::Int(id)), Some(Value::List(labels)), Some(Value::Map(properties)), None) => {
                let labels = string_list(labels, "node label")?;
                Ok(Self {
                    id,
                    labels,
                    properties,
                })
            }
            _ => Err(DecodeError::InvalidStructure(
                "Node requires [id, labels, properties]".into(),
            )),
        }
    }
}

/// A graph relationship bound to its endpoint nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct Relationship {
    /// Relationship id
    pub id: i64,
    /// Start node id
    pub start_node_id: i64,
    /// End node id
    pub end_node_id: i64,
    /// Relationship type
    pub rel_type: String,
    /// Relationship properties
    pub properties: ValueMap,
}

impl Relationship {
    /// Create a new relationship.
    pub fn new(
        id: i64,
        start_node_id: i64,
        end_node_id: i64,
        rel_type: String,
        properties: ValueMap,
    ) -> Self {
        Self {
            id,
            start_node_id,
            end_node_id,
            rel_type,
            properties,
        }
    }

    /// Get a property value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    pub(crate) fn from_fields(fields: Vec<Value>) -> Result<Self, DecodeError> {
        let mut it = fields.into_iter();
        match (it.next(), it.next(), it.next(), it.next(), it.next(), it.next()) {
            (
                Some(Value::Int(id)),
                Some(Value::Int(start_node_id)),
                Some(Value::Int(end_node_id)),
                Some(Value::String(rel_type)),
                Some(Value::Map(properties)),
                None,
            ) => Ok(Self {
                id,
                start_node_id,
                end_node_id,
                rel_type,
                properties,
            }),
            _ => Err(DecodeError::InvalidStructure(
                "Relationship requires [id, start, end, type, properties]".into(),
            )),
        }
    }
}

/// A relationship without endpoint ids, used inside [`Path`] structures.
#[derive(Debug, Clone, PartialEq)]
pub struct UnboundRelationship {
    /// Relationship id
    pub id: i64,
    /// Relationship type
    pub rel_type: String,
    /// Relationship properties
    pub properties: ValueMap,
}

impl UnboundRelationship {
    /// Create a new unbound relationship.
    pub fn new(id: i64, rel_type: String, properties: ValueMap) -> Self {
        Self {
            id,
            rel_type,
            properties,
        }
    }

    pub(crate) fn from_fields(fields: Vec<Value>) -> Result<Self, DecodeError> {
        let mut it = fields.into_iter();
        match (it.next(), it.next(), it.next(), it.next()) {
            (
                Some(Value::Int(id)),
                Some(Value::String(rel_type)),
                Some(Value::Map(properties)),
                None,
            ) => Ok(Self {
                id,
                rel_type,
                properties,
            }),
            _ => Err(DecodeError::InvalidStructure(
                "UnboundRelationship requires [id, type, properties]".into(),
            )),
        }
    }
}

/// A graph path: alternating nodes and relationships plus the traversal
/// sequence describing how they connect.
#[derive(Debug, Clone, PartialEq)]
pub struct Path {
    /// Nodes appearing in the path
    pub nodes: Vec<Node>,
    /// Relationships appearing in the path
    pub relationships: Vec<UnboundRelationship>,
    /// Traversal sequence indices
    pub sequence: Vec<i64>,
}

impl Path {
    /// Path length in relationships.
    pub fn len(&self) -> usize {
        self.relationships.len()
    }

    /// Check if the path has no relationships.
    pub fn is_empty(&self) -> bool {
        self.relationships.is_empty()
    }

    /// First node of the path.
    pub fn start(&self) -> Option<&Node> {
        self.nodes.first()
    }

    /// Last node of the path.
    pub fn end(&self) -> Option<&Node> {
        self.nodes.last()
    }

    pub(crate) fn from_fields(fields: Vec<Value>) -> Result<Self, DecodeError> {
        let mut it = fields.into_iter();
        match (it.next(), it.next(), it.next(), it.next()) {
            (Some(Value::List(nodes)), Some(Value::List(rels)), Some(Value::List(seq)), None) => {
                let nodes = nodes
                    .into_iter()
                    .map(|v| match v {
                        Value::Node(n) => Ok(n),
                        other => Err(DecodeError::InvalidStructure(format!(
                            "Path nodes must be Node structures, got {}",
                            other.type_name()
                        ))),
                    })
                    .collect::<Result<_, _>>()?;
                let relationships = rels
                    .into_iter()
                    .map(|v| match v {
                        Value::UnboundRelationship(r) => Ok(r),
                        other => Err(DecodeError::InvalidStructure(format!(
                            "Path relationships must be UnboundRelationship structures, got {}",
                            other.type_name()
                        ))),
                    })
                    .collect::<Result<_, _>>()?;
                let sequence = seq
                    .into_iter()
                    .map(|v| match v {
                        Value::Int(i) => Ok(i),
                        other => Err(DecodeError::InvalidStructure(format!(
                            "Path sequence must be integers, got {}",
                            other.type_name()
                        ))),
                    })
                    .collect::<Result<_, _>>()?;
                Ok(Self {
                    nodes,
                    relationships,
                    sequence,
                })
            }
            _ => Err(DecodeError::InvalidStructure(
                "Path requires [nodes, relationships, sequence]".into(),
            )),
        }
    }
}

/// A calendar date as days since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Date {
    /// Days since 1970-01-01 (may be negative)
    pub days: i64,
}

impl Date {
    /// Create from a day count.
    pub fn new(days: i64) -> Self {
        Self { days }
    }

    /// Convert from a chrono date.
    pub fn from_naive(date: NaiveDate) -> Self {
        Self {
            days: i64::from(date.num_days_from_ce()) - EPOCH_DAYS_FROM_CE,
        }
    }

    /// Convert to a chrono date, if representable.
    pub fn to_naive(self) -> Option<NaiveDate> {
        let days_ce = i32::try_from(self.days + EPOCH_DAYS_FROM_CE).ok()?;
        NaiveDate::from_num_days_from_ce_opt(days_ce)
    }

    pub(crate) fn from_fields(fields: Vec<Value>) -> Result<Self, DecodeError> {
        let [days] = int_fields::<1>(fields, "Date requires [days]")?;
        Ok(Self { days })
    }
}

/// Time of day as nanoseconds since midnight, no timezone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalTime {
    /// Nanoseconds since midnight
    pub nanos_of_day: i64,
}

impl LocalTime {
    /// Create from a nanosecond-of-day count.
    pub fn new(nanos_of_day: i64) -> Self {
        Self { nanos_of_day }
    }

    /// Convert from a chrono time.
    pub fn from_naive(time: NaiveTime) -> Self {
        let nanos = i64::from(time.num_seconds_from_midnight()) * NANOS_PER_SEC
            + i64::from(time.nanosecond());
        Self {
            nanos_of_day: nanos,
        }
    }

    /// Convert to a chrono time, if in range.
    pub fn to_naive(self) -> Option<NaiveTime> {
        let secs = u32::try_from(self.nanos_of_day.div_euclid(NANOS_PER_SEC)).ok()?;
        let nanos = u32::try_from(self.nanos_of_day.rem_euclid(NANOS_PER_SEC)).ok()?;
        NaiveTime::from_num_seconds_from_midnight_opt(secs, nanos)
    }

    pub(crate) fn from_fields(fields: Vec<Value>) -> Result<Self, DecodeError> {
        let [nanos_of_day] = int_fields::<1>(fields, "LocalTime requires [nanos_of_day]")?;
        Ok(Self { nanos_of_day })
    }
}

/// Time of day with a fixed offset from UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OffsetTime {
    /// Nanoseconds since midnight in the offset timezone
    pub nanos_of_day: i64,
    /// Offset from UTC in seconds
    pub offset_seconds: i32,
}

impl OffsetTime {
    /// Create from a nanosecond-of-day count and offset.
    pub fn new(nanos_of_day: i64, offset_seconds: i32) -> Self {
        Self {
            nanos_of_day,
            offset_seconds,
        }
    }

    /// Convert from a chrono time plus an offset.
    pub fn from_naive(time: NaiveTime, offset_seconds: i32) -> Self {
        Self {
            nanos_of_day: LocalTime::from_naive(time).nanos_of_day,
            offset_seconds,
        }
    }

    /// Convert the time-of-day part to a chrono time, if in range.
    pub fn to_naive(self) -> Option<NaiveTime> {
        LocalTime::new(self.nanos_of_day).to_naive()
    }

    pub(crate) fn from_fields(fields: Vec<Value>) -> Result<Self, DecodeError> {
        let [nanos_of_day, offset] =
            int_fields::<2>(fields, "Time requires [nanos_of_day, offset_seconds]")?;
        Ok(Self {
            nanos_of_day,
            offset_seconds: offset_seconds(offset)?,
        })
    }
}

/// Date and time without timezone, split into seconds and nanoseconds
/// since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalDateTime {
    /// Seconds since the Unix epoch
    pub seconds: i64,
    /// Nanosecond adjustment, always in `[0, 1_000_000_000)`
    pub nanos: i64,
}

impl LocalDateTime {
    /// Create from a second and nanosecond count.
    pub fn new(seconds: i64, nanos: i64) -> Self {
        Self { seconds, nanos }
    }

    /// Create from epoch microseconds.
    ///
    /// Negative inputs floor-divide so that the nanosecond part stays
    /// non-negative.
    pub fn from_epoch_micros(micros: i64) -> Self {
        Self {
            seconds: micros.div_euclid(MICROS_PER_SEC),
            nanos: micros.rem_euclid(MICROS_PER_SEC) * 1_000,
        }
    }

    /// Convert from a chrono datetime.
    pub fn from_naive(datetime: NaiveDateTime) -> Self {
        let utc = datetime.and_utc();
        Self {
            seconds: utc.timestamp(),
            nanos: i64::from(utc.timestamp_subsec_nanos()),
        }
    }

    /// Convert to a chrono datetime, if in range.
    pub fn to_naive(self) -> Option<NaiveDateTime> {
        let nanos = u32::try_from(self.nanos).ok()?;
        Some(DateTime::from_timestamp(self.seconds, nanos)?.naive_utc())
    }

    pub(crate) fn from_fields(fields: Vec<Value>) -> Result<Self, DecodeError> {
        let [seconds, nanos] = int_fields::<2>(fields, "LocalDateTime requires [seconds, nanos]")?;
        Ok(Self { seconds, nanos })
    }
}

/// Date and time with a fixed offset from UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OffsetDateTime {
    /// Seconds since the Unix epoch
    pub seconds: i64,
    /// Nanosecond adjustment, always in `[0, 1_000_000_000)`
    pub nanos: i64,
    /// Offset from UTC in seconds
    pub offset_seconds: i32,
}

impl OffsetDateTime {
    /// Create from seconds, nanoseconds and offset.
    pub fn new(seconds: i64, nanos: i64, offset_seconds: i32) -> Self {
        Self {
            seconds,
            nanos,
            offset_seconds,
        }
    }

    /// Convert from a chrono datetime with fixed offset.
    pub fn from_chrono(datetime: &DateTime<FixedOffset>) -> Self {
        Self {
            seconds: datetime.timestamp(),
            nanos: i64::from(datetime.timestamp_subsec_nanos()),
            offset_seconds: datetime.offset().local_minus_utc(),
        }
    }

    /// Convert to a chrono datetime, if in range.
    pub fn to_chrono(self) -> Option<DateTime<FixedOffset>> {
        let offset = FixedOffset::east_opt(self.offset_seconds)?;
        let nanos = u32::try_from(self.nanos).ok()?;
        Some(DateTime::from_timestamp(self.seconds, nanos)?.with_timezone(&offset))
    }

    // Exactly three fields; the offset variant never shares the zone-id
    // layout.
    pub(crate) fn from_fields(fields: Vec<Value>) -> Result<Self, DecodeError> {
        let [seconds, nanos, offset] =
            int_fields::<3>(fields, "DateTime requires [seconds, nanos, offset_seconds]")?;
        Ok(Self {
            seconds,
            nanos,
            offset_seconds: offset_seconds(offset)?,
        })
    }
}

/// Date and time in a named timezone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZonedDateTime {
    /// Seconds since the Unix epoch
    pub seconds: i64,
    /// Nanosecond adjustment, always in `[0, 1_000_000_000)`
    pub nanos: i64,
    /// IANA timezone identifier, e.g. `Europe/Stockholm`
    pub zone_id: String,
}

impl ZonedDateTime {
    /// Create from seconds, nanoseconds and a zone id.
    pub fn new(seconds: i64, nanos: i64, zone_id: impl Into<String>) -> Self {
        Self {
            seconds,
            nanos,
            zone_id: zone_id.into(),
        }
    }

    pub(crate) fn from_fields(fields: Vec<Value>) -> Result<Self, DecodeError> {
        let mut it = fields.into_iter();
        match (it.next(), it.next(), it.next(), it.next()) {
            (Some(Value::Int(seconds)), Some(Value::Int(nanos)), Some(Value::String(zone_id)), None) => {
                Ok(Self {
                    seconds,
                    nanos,
                    zone_id,
                })
            }
            _ => Err(DecodeError::InvalidStructure(
                "DateTimeZoned requires [seconds, nanos, zone_id]".into(),
            )),
        }
    }
}

/// A temporal duration.
///
/// Months, days, seconds and nanoseconds are stored independently; a month
/// has no canonical second count, so no normalization happens across units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Duration {
    /// Months component
    pub months: i64,
    /// Days component
    pub days: i64,
    /// Seconds component
    pub seconds: i64,
    /// Nanoseconds component
    pub nanos: i64,
}

impl Duration {
    /// Create a new duration.
    pub fn new(months: i64, days: i64, seconds: i64, nanos: i64) -> Self {
        Self {
            months,
            days,
            seconds,
            nanos,
        }
    }

    pub(crate) fn from_fields(fields: Vec<Value>) -> Result<Self, DecodeError> {
        let [months, days, seconds, nanos] =
            int_fields::<4>(fields, "Duration requires [months, days, seconds, nanos]")?;
        Ok(Self {
            months,
            days,
            seconds,
            nanos,
        })
    }
}

/// A 2D spatial point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point2D {
    /// Spatial reference system identifier
    pub srid: i64,
    /// X coordinate (longitude for geographic SRIDs)
    pub x: f64,
    /// Y coordinate (latitude for geographic SRIDs)
    pub y: f64,
}

impl Point2D {
    /// Create a new 2D point.
    pub fn new(srid: i64, x: f64, y: f64) -> Self {
        Self { srid, x, y }
    }

    /// WGS84 point from longitude and latitude.
    pub fn wgs84(longitude: f64, latitude: f64) -> Self {
        Self::new(4326, longitude, latitude)
    }

    /// Cartesian point.
    pub fn cartesian(x: f64, y: f64) -> Self {
        Self::new(7203, x, y)
    }

    pub(crate) fn from_fields(fields: Vec<Value>) -> Result<Self, DecodeError> {
        let mut it = fields.into_iter();
        let msg = "Point2D requires [srid, x, y]";
        let srid = int_field(it.next(), msg)?;
        let x = float_field(it.next(), msg)?;
        let y = float_field(it.next(), msg)?;
        if it.next().is_some() {
            return Err(DecodeError::InvalidStructure(msg.into()));
        }
        Ok(Self { srid, x, y })
    }
}

/// A 3D spatial point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point3D {
    /// Spatial reference system identifier
    pub srid: i64,
    /// X coordinate
    pub x: f64,
    /// Y coordinate
    pub y: f64,
    /// Z coordinate
    pub z: f64,
}

impl Point3D {
    /// Create a new 3D point.
    pub fn new(srid: i64, x: f64, y: f64, z: f64) -> Self {
        Self { srid, x, y, z }
    }

    /// WGS84 point from longitude, latitude and height.
    pub fn wgs84(longitude: f64, latitude: f64, height: f64) -> Self {
        Self::new(4979, longitude, latitude, height)
    }

    /// Cartesian point.
    pub fn cartesian(x: f64, y: f64, z: f64) -> Self {
        Self::new(9157, x, y, z)
    }

    pub(crate) fn from_fields(fields: Vec<Value>) -> Result<Self, DecodeError> {
        let mut it = fields.into_iter();
        let msg = "Point3D requires [srid, x, y, z]";
        let srid = int_field(it.next(), msg)?;
        let x = float_field(it.next(), msg)?;
        let y = float_field(it.next(), msg)?;
        let z = float_field(it.next(), msg)?;
        if it.next().is_some() {
            return Err(DecodeError::InvalidStructure(msg.into()));
        }
        Ok(Self { srid, x, y, z })
    }
}

// Field extraction helpers shared by the from_fields constructors.

fn int_fields<const N: usize>(
    fields: Vec<Value>,
    msg: &'static str,
) -> Result<[i64; N], DecodeError> {
    if fields.len() != N {
        return Err(DecodeError::InvalidStructure(msg.into()));
    }
    let mut out = [0i64; N];
    for (slot, field) in out.iter_mut().zip(fields) {
        match field {
            Value::Int(i) => *slot = i,
            _ => return Err(DecodeError::InvalidStructure(msg.into())),
        }
    }
    Ok(out)
}

fn int_field(field: Option<Value>, msg: &'static str) -> Result<i64, DecodeError> {
    match field {
        Some(Value::Int(i)) => Ok(i),
        _ => Err(DecodeError::InvalidStructure(msg.into())),
    }
}

fn float_field(field: Option<Value>, msg: &'static str) -> Result<f64, DecodeError> {
    match field {
        Some(Value::Float(f)) => Ok(f),
        Some(Value::Int(i)) => Ok(i as f64),
        _ => Err(DecodeError::InvalidStructure(msg.into())),
    }
}

fn offset_seconds(value: i64) -> Result<i32, DecodeError> {
    i32::try_from(value).map_err(|_| {
        DecodeError::InvalidStructure(format!("timezone offset out of range: {}", value))
    })
}

fn string_list(values: Vec<Value>, what: &'static str) -> Result<Vec<String>, DecodeError> {
    values
        .into_iter()
        .map(|v| match v {
            Value::String(s) => Ok(s),
            other => Err(DecodeError::InvalidStructure(format!(
                "{} must be a string, got {}",
                what,
                other.type_name()
            ))),
        })
        .collect()
}
