//! Declarative field schemas for packed records
//!
//! A [`Schema`] is an ordered list of typed fields. The same list drives
//! packing, unpacking and buffer sizing, so the three can never drift apart.
//! Nested composite values (two or more scalars stored together) are described
//! by a [`CompositeLayout`] whose member offsets come from `offset_of!`, and are
//! registered with the transport before use.

use super::buffer::CommBuffer;
use super::CommError;

/// Scalar kinds a transport knows how to pack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    /// 32-bit signed integer
    Int,
    /// 64-bit float
    Double,
}

impl ScalarKind {
    /// Packed size of one scalar in bytes
    pub const fn size(self) -> usize {
        match self {
            Self::Int => 4,
            Self::Double => 8,
        }
    }
}

/// A single packed scalar value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
    /// 32-bit signed integer
    Int(i32),
    /// 64-bit float
    Double(f64),
}

impl Scalar {
    /// Kind of this scalar
    pub const fn kind(self) -> ScalarKind {
        match self {
            Self::Int(_) => ScalarKind::Int,
            Self::Double(_) => ScalarKind::Double,
        }
    }

    /// Extract a float
    ///
    /// # Errors
    /// Returns [`CommError::InvalidField`] if the scalar is an integer
    pub fn as_double(self, field: &'static str) -> Result<f64, CommError> {
        match self {
            Self::Double(v) => Ok(v),
            Self::Int(_) => Err(CommError::InvalidField {
                field,
                reason: "expected a double, found an int".to_string(),
            }),
        }
    }
}

/// One member of a composite type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompositeMember {
    /// Member name
    pub name: &'static str,
    /// Scalar kind of the member
    pub kind: ScalarKind,
    /// Byte offset of the member from the start of one instance
    pub offset: usize,
}

/// Memory layout of a composite type, as registered with a transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompositeLayout {
    /// Type name used in diagnostics
    pub name: &'static str,
    /// Members in packing order
    pub members: &'static [CompositeMember],
    /// In-memory size of one instance, padding included
    pub extent: usize,
}

impl CompositeLayout {
    /// Sum of member sizes, ignoring in-memory padding
    pub fn member_bytes(&self) -> usize {
        self.members.iter().map(|m| m.kind.size()).sum()
    }

    /// Check that members are non-empty, ordered, non-overlapping and inside the extent
    ///
    /// # Errors
    /// Returns [`CommError::InvalidLayout`] describing the first violation
    pub fn validate(&self) -> Result<(), CommError> {
        let invalid = |reason: String| CommError::InvalidLayout {
            name: self.name,
            reason,
        };

        if self.members.is_empty() {
            return Err(invalid("no members".to_string()));
        }

        let mut end_of_previous = 0;
        for member in self.members {
            if member.offset < end_of_previous {
                return Err(invalid(format!(
                    "member '{}' at offset {} overlaps the previous member",
                    member.name, member.offset
                )));
            }
            end_of_previous = member.offset + member.kind.size();
            if end_of_previous > self.extent {
                return Err(invalid(format!(
                    "member '{}' ends at byte {} beyond the extent of {}",
                    member.name, end_of_previous, self.extent
                )));
            }
        }
        Ok(())
    }
}

/// A value whose members can be read and written through a [`CompositeLayout`]
pub trait CompositeValue {
    /// Layout describing this value
    fn layout(&self) -> &'static CompositeLayout;

    /// Read member `index` in layout order
    fn member(&self, index: usize) -> Scalar;

    /// Overwrite member `index` in layout order
    ///
    /// # Errors
    /// Returns [`CommError::InvalidField`] if the index or scalar kind is wrong
    fn set_member(&mut self, index: usize, value: Scalar) -> Result<(), CommError>;
}

/// Wire shape of a schema field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// One 32-bit integer
    Int,
    /// One double
    Double,
    /// A fixed-length run of doubles
    Doubles(usize),
    /// One instance of a registered composite type
    Composite(&'static CompositeLayout),
}

enum Accessor<T> {
    Int {
        get: fn(&T) -> i32,
        set: fn(&mut T, i32) -> Result<(), CommError>,
    },
    Index {
        get: fn(&T) -> usize,
        set: fn(&mut T, usize),
    },
    Double {
        get: fn(&T) -> f64,
        set: fn(&mut T, f64),
    },
    Doubles {
        len: usize,
        get: fn(&T) -> &[f64],
        get_mut: fn(&mut T) -> &mut [f64],
    },
    Composite {
        layout: &'static CompositeLayout,
        get: fn(&T) -> &dyn CompositeValue,
        get_mut: fn(&mut T) -> &mut dyn CompositeValue,
    },
}

/// One named, typed field of a record
pub struct FieldSpec<T> {
    name: &'static str,
    accessor: Accessor<T>,
}

impl<T> FieldSpec<T> {
    /// Integer field with a fallible decoder (enumerations, flags)
    pub fn int(
        name: &'static str,
        get: fn(&T) -> i32,
        set: fn(&mut T, i32) -> Result<(), CommError>,
    ) -> Self {
        Self {
            name,
            accessor: Accessor::Int { get, set },
        }
    }

    /// Non-negative index carried as a 32-bit integer
    pub fn index(name: &'static str, get: fn(&T) -> usize, set: fn(&mut T, usize)) -> Self {
        Self {
            name,
            accessor: Accessor::Index { get, set },
        }
    }

    /// Single double field
    pub fn double(name: &'static str, get: fn(&T) -> f64, set: fn(&mut T, f64)) -> Self {
        Self {
            name,
            accessor: Accessor::Double { get, set },
        }
    }

    /// Fixed-length double array (vectors, tensors)
    pub fn doubles(
        name: &'static str,
        len: usize,
        get: fn(&T) -> &[f64],
        get_mut: fn(&mut T) -> &mut [f64],
    ) -> Self {
        Self {
            name,
            accessor: Accessor::Doubles { len, get, get_mut },
        }
    }

    /// Nested composite value
    pub fn composite(
        name: &'static str,
        layout: &'static CompositeLayout,
        get: fn(&T) -> &dyn CompositeValue,
        get_mut: fn(&mut T) -> &mut dyn CompositeValue,
    ) -> Self {
        Self {
            name,
            accessor: Accessor::Composite {
                layout,
                get,
                get_mut,
            },
        }
    }

    /// Field name
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Wire shape of this field
    pub fn kind(&self) -> FieldKind {
        match &self.accessor {
            Accessor::Int { .. } | Accessor::Index { .. } => FieldKind::Int,
            Accessor::Double { .. } => FieldKind::Double,
            Accessor::Doubles { len, .. } => FieldKind::Doubles(*len),
            Accessor::Composite { layout, .. } => FieldKind::Composite(*layout),
        }
    }

    fn pack(&self, record: &T, buffer: &mut CommBuffer) -> Result<(), CommError> {
        match &self.accessor {
            Accessor::Int { get, .. } => buffer.pack_int(get(record)),
            Accessor::Index { get, .. } => {
                let value = get(record);
                let wire = i32::try_from(value).map_err(|_| CommError::InvalidField {
                    field: self.name,
                    reason: format!("index {value} exceeds the 32-bit wire range"),
                })?;
                buffer.pack_int(wire)
            }
            Accessor::Double { get, .. } => buffer.pack_double(get(record)),
            Accessor::Doubles { len, get, .. } => {
                let values = get(record);
                self.check_len(*len, values.len())?;
                buffer.pack_doubles(values)
            }
            Accessor::Composite { layout, get, .. } => buffer.pack_composite(layout, get(record)),
        }
    }

    fn unpack(&self, record: &mut T, buffer: &mut CommBuffer) -> Result<(), CommError> {
        match &self.accessor {
            Accessor::Int { set, .. } => set(record, buffer.unpack_int()?),
            Accessor::Index { set, .. } => {
                let wire = buffer.unpack_int()?;
                let value = usize::try_from(wire).map_err(|_| CommError::InvalidField {
                    field: self.name,
                    reason: format!("negative index {wire}"),
                })?;
                set(record, value);
                Ok(())
            }
            Accessor::Double { set, .. } => {
                set(record, buffer.unpack_double()?);
                Ok(())
            }
            Accessor::Doubles { len, get_mut, .. } => {
                let target = get_mut(record);
                self.check_len(*len, target.len())?;
                buffer.unpack_doubles(target)
            }
            Accessor::Composite {
                layout, get_mut, ..
            } => buffer.unpack_composite(layout, get_mut(record)),
        }
    }

    fn check_len(&self, expected: usize, actual: usize) -> Result<(), CommError> {
        if expected == actual {
            Ok(())
        } else {
            Err(CommError::InvalidField {
                field: self.name,
                reason: format!("declared {expected} doubles but the record holds {actual}"),
            })
        }
    }
}

/// Ordered list of fields describing one record type on the wire
pub struct Schema<T> {
    name: &'static str,
    fields: Vec<FieldSpec<T>>,
}

impl<T> Schema<T> {
    /// Build a schema from fields in wire order
    pub fn new(name: &'static str, fields: Vec<FieldSpec<T>>) -> Self {
        Self { name, fields }
    }

    /// Schema name used in diagnostics
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Fields in wire order
    pub fn fields(&self) -> &[FieldSpec<T>] {
        &self.fields
    }

    /// Number of integers and doubles one record carries outside composites
    pub fn scalar_counts(&self) -> (usize, usize) {
        self.fields
            .iter()
            .fold((0, 0), |(ints, doubles), field| match field.kind() {
                FieldKind::Int => (ints + 1, doubles),
                FieldKind::Double => (ints, doubles + 1),
                FieldKind::Doubles(n) => (ints, doubles + n),
                FieldKind::Composite(_) => (ints, doubles),
            })
    }

    /// Composite layouts used by the schema, one entry per composite field
    pub fn composite_layouts(&self) -> Vec<&'static CompositeLayout> {
        self.fields
            .iter()
            .filter_map(|field| match field.kind() {
                FieldKind::Composite(layout) => Some(layout),
                _ => None,
            })
            .collect()
    }

    /// Compact packed size of one record in bytes
    pub fn record_bytes(&self) -> usize {
        let (ints, doubles) = self.scalar_counts();
        let composites: usize = self
            .composite_layouts()
            .iter()
            .map(|layout| layout.member_bytes())
            .sum();
        ints * ScalarKind::Int.size() + doubles * ScalarKind::Double.size() + composites
    }

    /// Pack every field of `record` at the buffer cursor
    ///
    /// # Errors
    /// Returns [`CommError::BufferOverflow`] when the buffer is full, or
    /// [`CommError::InvalidField`] when a value cannot be carried on the wire
    pub fn pack(&self, record: &T, buffer: &mut CommBuffer) -> Result<(), CommError> {
        self.fields
            .iter()
            .try_for_each(|field| field.pack(record, buffer))
    }

    /// Unpack every field into `record` from the buffer cursor
    ///
    /// # Errors
    /// Returns [`CommError::BufferOverflow`] on a short buffer, or
    /// [`CommError::InvalidField`] when a value cannot be decoded
    pub fn unpack(&self, record: &mut T, buffer: &mut CommBuffer) -> Result<(), CommError> {
        self.fields
            .iter()
            .try_for_each(|field| field.unpack(record, buffer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::{offset_of, size_of};

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Pair {
        a: f64,
        b: f64,
    }

    static PAIR_LAYOUT: CompositeLayout = CompositeLayout {
        name: "pair",
        members: &[
            CompositeMember {
                name: "a",
                kind: ScalarKind::Double,
                offset: offset_of!(Pair, a),
            },
            CompositeMember {
                name: "b",
                kind: ScalarKind::Double,
                offset: offset_of!(Pair, b),
            },
        ],
        extent: size_of::<Pair>(),
    };

    impl CompositeValue for Pair {
        fn layout(&self) -> &'static CompositeLayout {
            &PAIR_LAYOUT
        }

        fn member(&self, index: usize) -> Scalar {
            if index == 0 {
                Scalar::Double(self.a)
            } else {
                Scalar::Double(self.b)
            }
        }

        fn set_member(&mut self, index: usize, value: Scalar) -> Result<(), CommError> {
            match index {
                0 => self.a = value.as_double("a")?,
                1 => self.b = value.as_double("b")?,
                _ => {
                    return Err(CommError::InvalidField {
                        field: "pair",
                        reason: format!("no member {index}"),
                    })
                }
            }
            Ok(())
        }
    }

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Record {
        id: usize,
        flag: i32,
        mass: f64,
        xyz: [f64; 3],
        pair: Pair,
    }

    type F = FieldSpec<Record>;

    fn record_schema() -> Schema<Record> {
        Schema::new(
            "record",
            vec![
                F::index("id", |r| r.id, |r, v| r.id = v),
                F::int(
                    "flag",
                    |r| r.flag,
                    |r, v| {
                        r.flag = v;
                        Ok(())
                    },
                ),
                F::double("mass", |r| r.mass, |r, v| r.mass = v),
                F::doubles("xyz", 3, |r| &r.xyz[..], |r| &mut r.xyz[..]),
                F::composite("pair", &PAIR_LAYOUT, |r| &r.pair, |r| &mut r.pair),
            ],
        )
    }

    #[test]
    fn test_scalar_counts_and_record_bytes() {
        let schema = record_schema();
        assert_eq!(schema.scalar_counts(), (2, 4));
        assert_eq!(schema.composite_layouts().len(), 1);
        assert_eq!(schema.record_bytes(), 2 * 4 + 4 * 8 + 16);
    }

    #[test]
    fn test_pack_then_unpack_restores_record() {
        let schema = record_schema();
        let original = Record {
            id: 17,
            flag: -3,
            mass: 2.5,
            xyz: [1.0, -2.0, 3.5],
            pair: Pair { a: 0.25, b: -8.0 },
        };

        let mut buffer = CommBuffer::allocate(schema.record_bytes()).unwrap();
        schema.pack(&original, &mut buffer).unwrap();
        assert_eq!(buffer.position(), schema.record_bytes());

        buffer.rewind();
        let mut restored = Record::default();
        schema.unpack(&mut restored, &mut buffer).unwrap();
        assert_eq!(restored, original);
    }

    #[test]
    fn test_negative_index_rejected_on_unpack() {
        let schema = Schema::new(
            "ids",
            vec![F::index("id", |r| r.id, |r, v| r.id = v)],
        );
        let mut buffer = CommBuffer::allocate(4).unwrap();
        buffer.pack_int(-1).unwrap();
        buffer.rewind();

        let mut record = Record::default();
        let err = schema.unpack(&mut record, &mut buffer).unwrap_err();
        assert!(matches!(err, CommError::InvalidField { field: "id", .. }));
    }

    #[test]
    fn test_layout_validation() {
        assert!(PAIR_LAYOUT.validate().is_ok());
        assert_eq!(PAIR_LAYOUT.member_bytes(), 16);

        static OVERLAPPING: CompositeLayout = CompositeLayout {
            name: "overlapping",
            members: &[
                CompositeMember {
                    name: "a",
                    kind: ScalarKind::Double,
                    offset: 0,
                },
                CompositeMember {
                    name: "b",
                    kind: ScalarKind::Double,
                    offset: 4,
                },
            ],
            extent: 16,
        };
        assert!(matches!(
            OVERLAPPING.validate(),
            Err(CommError::InvalidLayout { name: "overlapping", .. })
        ));

        static TOO_LONG: CompositeLayout = CompositeLayout {
            name: "too_long",
            members: &[CompositeMember {
                name: "a",
                kind: ScalarKind::Double,
                offset: 4,
            }],
            extent: 8,
        };
        assert!(TOO_LONG.validate().is_err());
    }
}
