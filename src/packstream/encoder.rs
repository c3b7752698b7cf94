//! PackStream encoder.

use bytes::{BufMut, BytesMut};

use crate::version::BoltVersion;

use super::marker::{self, sig};
use super::types::{Struct, Value, ValueMap};
use super::EncodeError;

/// PackStream encoder that writes values to a byte buffer.
///
/// The encoder always picks the narrowest wire form that can represent a
/// value, so the same value encodes to the same bytes every time.
pub struct PackStreamEncoder {
    buffer: BytesMut,
    version: BoltVersion,
}

impl PackStreamEncoder {
    /// Create a new encoder for the given protocol version.
    pub fn new(version: BoltVersion) -> Self {
        Self::with_capacity(version, 256)
    }

    /// Create a new encoder with the specified buffer capacity.
    pub fn with_capacity(version: BoltVersion, capacity: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(capacity),
            version,
        }
    }

    /// The protocol version this encoder targets.
    pub fn version(&self) -> BoltVersion {
        self.version
    }

    /// Get the current buffer length.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Clear the buffer.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Consume the encoder and return the bytes.
    pub fn into_bytes(self) -> BytesMut {
        self.buffer
    }

    /// Get the bytes as a slice.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Encode a value.
    pub fn encode(&mut self, value: &Value) -> Result<(), EncodeError> {
        match value {
            Value::Null => {
                self.encode_null();
                Ok(())
            }
            Value::Bool(b) => {
                self.encode_bool(*b);
                Ok(())
            }
            Value::Int(i) => {
                self.encode_int(*i);
                Ok(())
            }
            Value::Float(f) => {
                self.encode_float(*f);
                Ok(())
            }
            Value::String(s) => self.encode_string(s),
            Value::List(l) => self.encode_list(l),
            Value::Map(m) => self.encode_map(m),
            Value::Struct(s) => self.encode_struct(s),

            Value::Node(_) => Err(EncodeError::DecodeOnly("Node")),
            Value::Relationship(_) => Err(EncodeError::DecodeOnly("Relationship")),
            Value::UnboundRelationship(_) => Err(EncodeError::DecodeOnly("UnboundRelationship")),
            Value::Path(_) => Err(EncodeError::DecodeOnly("Path")),

            Value::Date(d) => {
                self.check_temporal("Date")?;
                self.encode_struct_header(1, sig::DATE)?;
                self.encode_int(d.days);
                Ok(())
            }
            Value::LocalTime(t) => {
                self.check_temporal("LocalTime")?;
                self.encode_struct_header(1, sig::LOCAL_TIME)?;
                self.encode_int(t.nanos_of_day);
                Ok(())
            }
            Value::Time(t) => {
                self.check_temporal("Time")?;
                self.encode_struct_header(2, sig::TIME)?;
                self.encode_int(t.nanos_of_day);
                self.encode_int(i64::from(t.offset_seconds));
                Ok(())
            }
            Value::LocalDateTime(dt) => {
                self.check_temporal("LocalDateTime")?;
                self.encode_struct_header(2, sig::LOCAL_DATE_TIME)?;
                self.encode_int(dt.seconds);
                self.encode_int(dt.nanos);
                Ok(())
            }
            Value::DateTime(dt) => {
                self.check_temporal("DateTime")?;
                self.encode_struct_header(3, sig::DATE_TIME)?;
                self.encode_int(dt.seconds);
                self.encode_int(dt.nanos);
                self.encode_int(i64::from(dt.offset_seconds));
                Ok(())
            }
            Value::DateTimeZoned(dt) => {
                self.check_temporal("DateTimeZoned")?;
                self.encode_struct_header(3, sig::DATE_TIME_ZONE_ID)?;
                self.encode_int(dt.seconds);
                self.encode_int(dt.nanos);
                self.encode_string(&dt.zone_id)?;
                Ok(())
            }
            Value::Duration(d) => {
                self.check_temporal("Duration")?;
                self.encode_struct_header(4, sig::DURATION)?;
                self.encode_int(d.months);
                self.encode_int(d.days);
                self.encode_int(d.seconds);
                self.encode_int(d.nanos);
                Ok(())
            }
            Value::Point2D(p) => {
                self.check_spatial("Point2D")?;
                self.encode_struct_header(3, sig::POINT_2D)?;
                self.encode_int(p.srid);
                self.encode_float(p.x);
                self.encode_float(p.y);
                Ok(())
            }
            Value::Point3D(p) => {
                self.check_spatial("Point3D")?;
                self.encode_struct_header(4, sig::POINT_3D)?;
                self.encode_int(p.srid);
                self.encode_float(p.x);
                self.encode_float(p.y);
                self.encode_float(p.z);
                Ok(())
            }
        }
    }

    /// Encode null.
    pub fn encode_null(&mut self) {
        self.buffer.put_u8(marker::NULL);
    }

    /// Encode a boolean.
    pub fn encode_bool(&mut self, value: bool) {
        self.buffer
            .put_u8(if value { marker::TRUE } else { marker::FALSE });
    }

    /// Encode an integer using the narrowest representation.
    pub fn encode_int(&mut self, value: i64) {
        if marker::fits_tiny_int(value) {
            self.buffer.put_u8(value as u8);
        } else if value >= i64::from(i8::MIN) && value <= i64::from(i8::MAX) {
            self.buffer.put_u8(marker::INT_8);
            self.buffer.put_i8(value as i8);
        } else if value >= i64::from(i16::MIN) && value <= i64::from(i16::MAX) {
            self.buffer.put_u8(marker::INT_16);
            self.buffer.put_i16(value as i16);
        } else if value >= i64::from(i32::MIN) && value <= i64::from(i32::MAX) {
            self.buffer.put_u8(marker::INT_32);
            self.buffer.put_i32(value as i32);
        } else {
            self.buffer.put_u8(marker::INT_64);
            self.buffer.put_i64(value);
        }
    }

    /// Encode a float (always 64-bit).
    pub fn encode_float(&mut self, value: f64) {
        self.buffer.put_u8(marker::FLOAT_64);
        self.buffer.put_f64(value);
    }

    /// Encode a string. The byte length, not the character count, decides
    /// the wire form.
    pub fn encode_string(&mut self, value: &str) -> Result<(), EncodeError> {
        let bytes = value.as_bytes();
        let len = bytes.len();

        if len > u32::MAX as usize {
            return Err(EncodeError::ValueTooLarge("string", len));
        }

        if len <= marker::TINY_STRING_MAX_LEN {
            self.buffer.put_u8(marker::TINY_STRING_BASE + len as u8);
        } else if len <= u8::MAX as usize {
            self.buffer.put_u8(marker::STRING_8);
            self.buffer.put_u8(len as u8);
        } else if len <= u16::MAX as usize {
            self.buffer.put_u8(marker::STRING_16);
            self.buffer.put_u16(len as u16);
        } else {
            self.buffer.put_u8(marker::STRING_32);
            self.buffer.put_u32(len as u32);
        }

        self.buffer.put_slice(bytes);
        Ok(())
    }

    /// Encode a list.
    pub fn encode_list(&mut self, values: &[Value]) -> Result<(), EncodeError> {
        let len = values.len();

        if len > u32::MAX as usize {
            return Err(EncodeError::ValueTooLarge("list", len));
        }

        if len <= marker::TINY_LIST_MAX_LEN {
            self.buffer.put_u8(marker::TINY_LIST_BASE + len as u8);
        } else if len <= u8::MAX as usize {
            self.buffer.put_u8(marker::LIST_8);
            self.buffer.put_u8(len as u8);
        } else if len <= u16::MAX as usize {
            self.buffer.put_u8(marker::LIST_16);
            self.buffer.put_u16(len as u16);
        } else {
            self.buffer.put_u8(marker::LIST_32);
            self.buffer.put_u32(len as u32);
        }

        for value in values {
            self.encode(value)?;
        }

        Ok(())
    }

    /// Encode a map. Entries are written in insertion order.
    pub fn encode_map(&mut self, map: &ValueMap) -> Result<(), EncodeError> {
        let len = map.len();

        if len > u32::MAX as usize {
            return Err(EncodeError::ValueTooLarge("map", len));
        }

        if len <= marker::TINY_MAP_MAX_LEN {
            self.buffer.put_u8(marker::TINY_MAP_BASE + len as u8);
        } else if len <= u8::MAX as usize {
            self.buffer.put_u8(marker::MAP_8);
            self.buffer.put_u8(len as u8);
        } else if len <= u16::MAX as usize {
            self.buffer.put_u8(marker::MAP_16);
            self.buffer.put_u16(len as u16);
        } else {
            self.buffer.put_u8(marker::MAP_32);
            self.buffer.put_u32(len as u32);
        }

        for (key, value) in map {
            self.encode_string(key)?;
            self.encode(value)?;
        }

        Ok(())
    }

    /// Encode a generic structure.
    pub fn encode_struct(&mut self, s: &Struct) -> Result<(), EncodeError> {
        self.encode_struct_header(s.fields.len(), s.signature)?;
        for field in &s.fields {
            self.encode(field)?;
        }
        Ok(())
    }

    /// Write a structure marker, field count and signature byte. The caller
    /// must follow up with exactly `field_count` encoded values.
    pub fn encode_struct_header(
        &mut self,
        field_count: usize,
        signature: u8,
    ) -> Result<(), EncodeError> {
        if field_count > u16::MAX as usize {
            return Err(EncodeError::ValueTooLarge("structure fields", field_count));
        }

        if field_count <= marker::TINY_STRUCT_MAX_FIELDS {
            self.buffer
                .put_u8(marker::TINY_STRUCT_BASE + field_count as u8);
        } else if field_count <= u8::MAX as usize {
            self.buffer.put_u8(marker::STRUCT_8);
            self.buffer.put_u8(field_count as u8);
        } else {
            self.buffer.put_u8(marker::STRUCT_16);
            self.buffer.put_u16(field_count as u16);
        }

        self.buffer.put_u8(signature);
        Ok(())
    }

    fn check_temporal(&self, kind: &'static str) -> Result<(), EncodeError> {
        if self.version.supports_temporal() {
            Ok(())
        } else {
            Err(EncodeError::VersionUnsupported {
                kind,
                version: self.version,
            })
        }
    }

    fn check_spatial(&self, kind: &'static str) -> Result<(), EncodeError> {
        if self.version.supports_spatial() {
            Ok(())
        } else {
            Err(EncodeError::VersionUnsupported {
                kind,
                version: self.version,
            })
        }
    }
}

/// Convenience function to encode a single value.
pub fn encode(value: &Value, version: BoltVersion) -> Result<BytesMut, EncodeError> {
    let mut encoder = PackStreamEncoder::new(version);
    encoder.encode(value)?;
    Ok(encoder.into_bytes())
}
