//! Uniform ordering for std140-style alignment.
//!
//! Inputs are packed widest first: vec4, vec3, vec2, float. A vec3 takes 12
//! bytes but must start on a 16-byte boundary, so it is only stored unpadded
//! when a float fills the remaining 4 bytes. Floats are pulled forward to sit
//! behind vec3s for that purpose.

use core::cmp::Reverse;

use crate::material::GpuType;

/// A qualifying input as seen by the layout pass.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct UniformSlot {
    /// Position of the input in the caller's original list.
    pub index: usize,
    pub ty: GpuType,
}

impl UniformSlot {
    #[inline]
    pub const fn new(index: usize, ty: GpuType) -> Self {
        Self { index, ty }
    }
}

/// Reorders `slots` for packing.
///
/// 1) stable sort by descending component count
/// 2) walking the vec3 run left to right, every vec3 that is followed by
///    something other than a float gets the first unused float moved right
///    behind it; the walk stops at the end of the run, or at a vec3 that is
///    already followed by a float
///
/// The pairing is a single greedy pass; floats are never reconsidered once
/// placed. Generated shaders declare their uniform blocks in the resulting
/// order, so this must not change.
///
/// # Panics
/// Panics if any slot is wider than a vec4.
pub fn sort_for_alignment(slots: &mut [UniformSlot]) {
    for slot in slots.iter() {
        assert!(
            slot.ty.fits_ubo(),
            "{:?} (input {}) cannot be stored in a dynamic uniform buffer",
            slot.ty,
            slot.index
        );
    }

    slots.sort_by_key(|s| Reverse(s.ty.components()));

    // No vec3, nothing to align.
    let Some(mut cur) = slots.iter().position(|s| s.ty == GpuType::Vec3) else {
        return;
    };
    let mut next_float = slots.iter().position(|s| s.ty == GpuType::Float);

    while cur < slots.len() && slots[cur].ty == GpuType::Vec3 {
        let next = cur + 1;

        if next == slots.len() || slots[next].ty == GpuType::Float {
            break;
        }

        match next_float {
            Some(f) => {
                // Floats sit after every vec3/vec2, so `f > next`.
                slots[next..=f].rotate_right(1);
                next_float = slots
                    .get(f + 1)
                    .filter(|s| s.ty == GpuType::Float)
                    .map(|_| f + 1);
                cur = next + 1;
            }
            None => cur = next,
        }
    }
}

/// Type of `slots[i]` as laid out in the block.
///
/// A vec3 followed by anything but a float is widened to a vec4. A trailing
/// vec3 keeps its 12 bytes.
pub fn padded_type(slots: &[UniformSlot], i: usize) -> GpuType {
    let ty = slots[i].ty;
    match slots.get(i + 1) {
        Some(next) if ty == GpuType::Vec3 && next.ty != GpuType::Float => GpuType::Vec4,
        _ => ty,
    }
}
