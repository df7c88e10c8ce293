//! Sub-shape path identifiers
//!
//! A [`SubShapeId`] is a stack of bit fields that locates a leaf through
//! nested compounds. Each compound pushes its child index while descending
//! and pops it again when resolving materials or normals. The first field
//! pushed occupies the lowest bits, so it is also the first one popped.

/// Total number of bits available for a path
pub const MAX_SUB_SHAPE_ID_BITS: u32 = u32::BITS;

/// Packed path to a leaf shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SubShapeId {
    value: u32,
    len: u32,
}

impl SubShapeId {
    /// Path that addresses the shape itself
    pub const EMPTY: Self = Self { value: 0, len: 0 };

    /// Raw packed value
    pub const fn value(&self) -> u32 {
        self.value
    }

    /// Number of bits in use
    pub const fn len(&self) -> u32 {
        self.len
    }

    /// True when no fields are stored
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Pop the leading field of `bits` width
    ///
    /// Returns the field and the remaining path for the child.
    pub fn pop_id(&self, bits: u32) -> (u32, Self) {
        debug_assert!(bits <= MAX_SUB_SHAPE_ID_BITS);
        let mask = field_mask(bits);
        let field = self.value & mask;
        let remainder = Self {
            value: self.value.checked_shr(bits).unwrap_or(0),
            len: self.len.saturating_sub(bits),
        };
        (field, remainder)
    }
}

/// Builds a [`SubShapeId`] while descending into compounds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SubShapeIdCreator {
    id: SubShapeId,
}

impl SubShapeIdCreator {
    /// Creator for a root shape
    pub const fn new() -> Self {
        Self { id: SubShapeId::EMPTY }
    }

    /// Path built so far
    pub const fn id(&self) -> SubShapeId {
        self.id
    }

    /// Number of bits already used
    pub const fn num_bits_written(&self) -> u32 {
        self.id.len
    }

    /// Append a field of `bits` width holding `value`
    ///
    /// # Panics
    ///
    /// Panics when the field does not fit in the remaining path or `value`
    /// does not fit in `bits`. Paths are never truncated.
    pub fn push_id(&self, value: u32, bits: u32) -> Self {
        assert!(
            self.id.len + bits <= MAX_SUB_SHAPE_ID_BITS,
            "sub-shape path overflow: {} bits used, {} requested, {} available",
            self.id.len,
            bits,
            MAX_SUB_SHAPE_ID_BITS
        );
        assert!(value & !field_mask(bits) == 0, "value {value} does not fit in {bits} bits");

        let shifted = value.checked_shl(self.id.len).unwrap_or(0);
        Self {
            id: SubShapeId {
                value: self.id.value | shifted,
                len: self.id.len + bits,
            },
        }
    }
}

fn field_mask(bits: u32) -> u32 {
    if bits >= u32::BITS {
        u32::MAX
    } else {
        (1u32 << bits) - 1
    }
}
