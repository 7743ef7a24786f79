//! Flat byte buffer with an advancing pack/unpack cursor
//!
//! Scalars are written little-endian, back to back, with no padding. Composite
//! values are written member by member in layout order.

use super::schema::{CompositeLayout, CompositeValue, Scalar, ScalarKind};
use super::CommError;
use std::ops::Range;

/// Rank-local communication buffer for one synchronization call
#[derive(Debug)]
pub struct CommBuffer {
    bytes: Vec<u8>,
    position: usize,
}

impl CommBuffer {
    /// Allocate a zeroed buffer of exactly `capacity` bytes
    ///
    /// # Errors
    /// Returns [`CommError::AllocationFailed`] if the memory cannot be reserved
    pub fn allocate(capacity: usize) -> Result<Self, CommError> {
        let mut bytes = Vec::new();
        bytes
            .try_reserve_exact(capacity)
            .map_err(|_| CommError::AllocationFailed { bytes: capacity })?;
        bytes.resize(capacity, 0);
        Ok(Self { bytes, position: 0 })
    }

    /// Buffer size in bytes
    pub fn capacity(&self) -> usize {
        self.bytes.len()
    }

    /// Current cursor position
    pub fn position(&self) -> usize {
        self.position
    }

    /// Move the cursor back to the start
    pub fn rewind(&mut self) {
        self.position = 0;
    }

    /// Raw bytes, for transports
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Mutable raw bytes, for transports
    pub fn as_mut_bytes(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    fn claim(&mut self, requested: usize) -> Result<Range<usize>, CommError> {
        let start = self.position;
        let end = start
            .checked_add(requested)
            .filter(|&end| end <= self.bytes.len())
            .ok_or(CommError::BufferOverflow {
                capacity: self.bytes.len(),
                position: start,
                requested,
            })?;
        self.position = end;
        Ok(start..end)
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N], CommError> {
        let range = self.claim(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(&self.bytes[range]);
        Ok(out)
    }

    /// Pack one integer
    ///
    /// # Errors
    /// Returns [`CommError::BufferOverflow`] if the buffer is full
    pub fn pack_int(&mut self, value: i32) -> Result<(), CommError> {
        let range = self.claim(ScalarKind::Int.size())?;
        self.bytes[range].copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    /// Pack one double
    ///
    /// # Errors
    /// Returns [`CommError::BufferOverflow`] if the buffer is full
    pub fn pack_double(&mut self, value: f64) -> Result<(), CommError> {
        let range = self.claim(ScalarKind::Double.size())?;
        self.bytes[range].copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    /// Pack a run of doubles
    ///
    /// # Errors
    /// Returns [`CommError::BufferOverflow`] if the run does not fit
    pub fn pack_doubles(&mut self, values: &[f64]) -> Result<(), CommError> {
        let range = self.claim(values.len() * ScalarKind::Double.size())?;
        for (chunk, value) in self.bytes[range].chunks_exact_mut(8).zip(values) {
            chunk.copy_from_slice(&value.to_le_bytes());
        }
        Ok(())
    }

    /// Pack a scalar of either kind
    ///
    /// # Errors
    /// Returns [`CommError::BufferOverflow`] if the buffer is full
    pub fn pack_scalar(&mut self, value: Scalar) -> Result<(), CommError> {
        match value {
            Scalar::Int(v) => self.pack_int(v),
            Scalar::Double(v) => self.pack_double(v),
        }
    }

    /// Pack one composite instance member by member
    ///
    /// # Errors
    /// Returns [`CommError::InvalidField`] if a member's kind disagrees with the
    /// layout, or [`CommError::BufferOverflow`] if the buffer is full
    pub fn pack_composite(
        &mut self,
        layout: &CompositeLayout,
        value: &dyn CompositeValue,
    ) -> Result<(), CommError> {
        for (index, member) in layout.members.iter().enumerate() {
            let scalar = value.member(index);
            if scalar.kind() != member.kind {
                return Err(CommError::InvalidField {
                    field: member.name,
                    reason: format!(
                        "layout '{}' declares {:?} but the value holds {:?}",
                        layout.name,
                        member.kind,
                        scalar.kind()
                    ),
                });
            }
            self.pack_scalar(scalar)?;
        }
        Ok(())
    }

    /// Unpack one integer
    ///
    /// # Errors
    /// Returns [`CommError::BufferOverflow`] on a short buffer
    pub fn unpack_int(&mut self) -> Result<i32, CommError> {
        Ok(i32::from_le_bytes(self.take::<4>()?))
    }

    /// Unpack one double
    ///
    /// # Errors
    /// Returns [`CommError::BufferOverflow`] on a short buffer
    pub fn unpack_double(&mut self) -> Result<f64, CommError> {
        Ok(f64::from_le_bytes(self.take::<8>()?))
    }

    /// Unpack a run of doubles into `out`
    ///
    /// # Errors
    /// Returns [`CommError::BufferOverflow`] on a short buffer
    pub fn unpack_doubles(&mut self, out: &mut [f64]) -> Result<(), CommError> {
        let range = self.claim(out.len() * ScalarKind::Double.size())?;
        for (value, chunk) in out.iter_mut().zip(self.bytes[range].chunks_exact(8)) {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(chunk);
            *value = f64::from_le_bytes(raw);
        }
        Ok(())
    }

    /// Unpack a scalar of the given kind
    ///
    /// # Errors
    /// Returns [`CommError::BufferOverflow`] on a short buffer
    pub fn unpack_scalar(&mut self, kind: ScalarKind) -> Result<Scalar, CommError> {
        match kind {
            ScalarKind::Int => self.unpack_int().map(Scalar::Int),
            ScalarKind::Double => self.unpack_double().map(Scalar::Double),
        }
    }

    /// Unpack one composite instance into `target`
    ///
    /// # Errors
    /// Returns [`CommError::BufferOverflow`] on a short buffer, or whatever the
    /// target reports when a member cannot be assigned
    pub fn unpack_composite(
        &mut self,
        layout: &CompositeLayout,
        target: &mut dyn CompositeValue,
    ) -> Result<(), CommError> {
        for (index, member) in layout.members.iter().enumerate() {
            let scalar = self.unpack_scalar(member.kind)?;
            target.set_member(index, scalar)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalars_round_trip_in_order() {
        let mut buffer = CommBuffer::allocate(4 + 8 + 3 * 8).unwrap();
        buffer.pack_int(-42).unwrap();
        buffer.pack_double(1.5e15).unwrap();
        buffer.pack_doubles(&[1.0, 2.0, 3.0]).unwrap();
        assert_eq!(buffer.position(), buffer.capacity());

        buffer.rewind();
        assert_eq!(buffer.unpack_int().unwrap(), -42);
        assert_eq!(buffer.unpack_double().unwrap(), 1.5e15);
        let mut out = [0.0; 3];
        buffer.unpack_doubles(&mut out).unwrap();
        assert_eq!(out, [1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_overflow_is_an_error() {
        let mut buffer = CommBuffer::allocate(6).unwrap();
        buffer.pack_int(1).unwrap();
        let err = buffer.pack_double(2.0).unwrap_err();
        match err {
            CommError::BufferOverflow {
                capacity,
                position,
                requested,
            } => {
                assert_eq!(capacity, 6);
                assert_eq!(position, 4);
                assert_eq!(requested, 8);
            }
            other => panic!("unexpected error: {other}"),
        }
        // Failed pack leaves the cursor untouched
        assert_eq!(buffer.position(), 4);
    }

    #[test]
    fn test_short_buffer_on_unpack() {
        let mut buffer = CommBuffer::allocate(2).unwrap();
        assert!(matches!(
            buffer.unpack_int(),
            Err(CommError::BufferOverflow { .. })
        ));
    }

    #[test]
    fn test_zero_capacity_buffer() {
        let buffer = CommBuffer::allocate(0).unwrap();
        assert_eq!(buffer.capacity(), 0);
        assert!(buffer.as_bytes().is_empty());
    }
}
