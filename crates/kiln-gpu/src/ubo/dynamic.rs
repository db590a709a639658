//! Dynamic uniform buffers: built from material inputs, synced from their
//! live values, uploaded lazily on bind.

use crate::device::GpuContext;
use crate::material::{GpuType, Input};

use super::buffer::{Storage, UniformBuffer};
use super::item::ItemTable;
use super::sort::{UniformSlot, padded_type, sort_for_alignment};
use super::UboError;

/// CPU side of a dynamic buffer.
pub(super) struct DynamicBlock {
    /// Packed layout.
    pub(super) items: ItemTable,
    /// Staging block, `items.size()` bytes.
    pub(super) data: Vec<u8>,
    /// Packed position → index of the input in the build-time list.
    pub(super) lookup: Vec<usize>,
    /// n-th qualifying input (original order) → packed position.
    pub(super) packed_order: Vec<usize>,
    pub(super) initialized: bool,
    pub(super) dirty: bool,
}

impl DynamicBlock {
    fn new(items: ItemTable, lookup: Vec<usize>) -> Self {
        debug_assert_eq!(items.len(), lookup.len());

        let mut packed_order: Vec<usize> = (0..lookup.len()).collect();
        packed_order.sort_by_key(|&packed| lookup[packed]);

        Self {
            data: vec![0; items.size()],
            items,
            lookup,
            packed_order,
            initialized: false,
            dirty: true,
        }
    }
}

impl UniformBuffer {
    /// Builds a dynamic buffer from the unlinked uniforms among `inputs`.
    ///
    /// The qualifying inputs are reordered for alignment and their original
    /// indices written to `sorted_out`, which must be empty; generated shader
    /// code declares the block members in that order. On success the staging
    /// block is filled from the live values and uploaded.
    ///
    /// Returns `Ok(None)` when no input qualifies. On error, any handle that was
    /// created has been released and `sorted_out` is left untouched.
    ///
    /// # Panics
    /// Panics if a qualifying input is wider than a vec4 or lacks a live value.
    pub fn build_dynamic(
        ctx: &mut impl GpuContext,
        inputs: &[Input],
        sorted_out: &mut Vec<usize>,
    ) -> Result<Option<Self>, UboError> {
        assert!(sorted_out.is_empty(), "sorted_out must start empty");

        let mut slots: Vec<UniformSlot> = inputs
            .iter()
            .enumerate()
            .filter(|(_, input)| input.is_dynamic_uniform())
            .map(|(index, input)| UniformSlot::new(index, input.ty))
            .collect();

        // No point creating a UBO without a single uniform in it.
        if slots.is_empty() {
            return Ok(None);
        }

        let handle = ctx.create_buffer().ok_or(UboError::CreateFailed)?;

        sort_for_alignment(&mut slots);

        let mut items = ItemTable::with_capacity(slots.len());
        let mut lookup = Vec::with_capacity(slots.len());
        for (i, slot) in slots.iter().enumerate() {
            items.push(padded_type(&slots, i));
            lookup.push(slot.index);
        }

        let size = items.size();
        let max = ctx.limits().max_ubo_size;
        if size > max {
            ctx.delete_buffer(handle);
            return Err(UboError::TooLarge { size, max });
        }

        sorted_out.extend(slots.iter().map(|s| s.index));

        let mut ubo = Self {
            size,
            handle,
            bindpoint: None,
            storage: Storage::Dynamic(DynamicBlock::new(items, lookup)),
        };

        ubo.sync(inputs);
        ubo.upload(ctx);

        log::debug!(
            "dynamic UBO #{} created: {} uniforms, {size} bytes",
            handle.get(),
            slots.len()
        );

        Ok(Some(ubo))
    }

    /// Copies the live values of `inputs` into the staging block and marks
    /// the buffer dirty. Never touches the GPU.
    ///
    /// `inputs` is either the list the buffer was built from, or only its
    /// qualifying inputs, in the same relative order.
    ///
    /// # Panics
    /// Panics on a static buffer, or if `inputs` does not have the structure
    /// the buffer was built from: a different number of qualifying inputs, a
    /// type that does not fit its slot, or a missing live value.
    pub fn sync(&mut self, inputs: &[Input]) {
        let block = self.dynamic_mut("sync");

        let mut cursor = 0;
        for (index, input) in inputs.iter().enumerate() {
            if !input.is_dynamic_uniform() {
                continue;
            }

            assert!(
                cursor < block.packed_order.len(),
                "more dynamic uniforms than the UBO was built with ({})",
                block.packed_order.len()
            );
            let packed = block.packed_order[cursor];
            cursor += 1;

            let item = block.items[packed];
            assert!(
                fits_slot(input.ty, item.ty),
                "input {index} is {:?} but its UBO slot holds {:?}",
                input.ty,
                item.ty
            );
            let Some(value) = &input.value else {
                panic!("dynamic uniform {index} has no live value");
            };

            let components = value.get();
            let bytes: &[u8] = bytemuck::cast_slice(&components);
            block.data[item.range()].copy_from_slice(&bytes[..item.size]);

            log::trace!(
                "ubo sync: input {index} (built as {}) -> item {packed} @{} {:?}",
                block.lookup[packed],
                item.offset,
                &components[..item.size / 4]
            );
        }

        assert_eq!(
            cursor,
            block.packed_order.len(),
            "fewer dynamic uniforms than the UBO was built with"
        );

        block.dirty = true;
    }

    /// Uploads the staging block now, whatever the dirty flag says.
    ///
    /// The first upload allocates GPU storage; later ones overwrite it in place.
    ///
    /// # Panics
    /// Panics on a static buffer.
    pub fn upload(&mut self, ctx: &mut impl GpuContext) {
        let handle = self.handle;
        let block = self.dynamic_mut("upload");

        if block.initialized {
            ctx.buffer_sub_data(handle, 0, &block.data);
        } else {
            block.initialized = true;
            ctx.buffer_data(handle, &block.data);
        }

        block.dirty = false;
    }

    /// Marks a dynamic buffer for upload at the next [`bind`](Self::bind).
    ///
    /// # Panics
    /// Panics on a static buffer.
    pub fn tag_dirty(&mut self) {
        self.dynamic_mut("tag_dirty").dirty = true;
    }

    /// Packed layout; `None` for static buffers.
    pub fn items(&self) -> Option<&ItemTable> {
        self.dynamic().map(|b| &b.items)
    }

    /// For each packed item, the index of its input in the build-time list.
    pub fn lookup(&self) -> Option<&[usize]> {
        self.dynamic().map(|b| b.lookup.as_slice())
    }

    /// CPU staging block.
    pub fn staging(&self) -> Option<&[u8]> {
        self.dynamic().map(|b| b.data.as_slice())
    }

    fn dynamic(&self) -> Option<&DynamicBlock> {
        match &self.storage {
            Storage::Dynamic(block) => Some(block),
            Storage::Static => None,
        }
    }

    fn dynamic_mut(&mut self, op: &str) -> &mut DynamicBlock {
        match &mut self.storage {
            Storage::Dynamic(block) => block,
            Storage::Static => panic!("{op}() called on a static UBO"),
        }
    }
}

/// A vec3 may have been widened to a vec4 slot.
fn fits_slot(input: GpuType, slot: GpuType) -> bool {
    input == slot || (input == GpuType::Vec3 && slot == GpuType::Vec4)
}

#[cfg(test)]
mod tests {
    use bytemuck::{Pod, Zeroable};

    use super::*;
    use crate::material::{InputSource, LinkId, LiveValue};
    use crate::testing::{GpuCall, RecordingContext};
    use crate::ubo::UploadState;
    use crate::material::GpuType::*;

    fn uniform(ty: GpuType, seed: f32) -> Input {
        let v = [seed, seed + 1.0, seed + 2.0, seed + 3.0];
        Input::uniform(ty, LiveValue::new(&v[..ty.components()]))
    }

    fn build(ctx: &mut RecordingContext, inputs: &[Input]) -> (UniformBuffer, Vec<usize>) {
        let mut sorted = Vec::new();
        let ubo = UniformBuffer::build_dynamic(ctx, inputs, &mut sorted)
            .unwrap()
            .unwrap();
        (ubo, sorted)
    }

    fn f32_at(bytes: &[u8], offset: usize, n: usize) -> Vec<f32> {
        bytes[offset..offset + n * 4]
            .chunks_exact(4)
            .map(|c| f32::from_ne_bytes(c.try_into().unwrap()))
            .collect()
    }

    /// Checks items tile `[0, size)` and each input's value sits at its item.
    fn assert_layout_and_values(ubo: &UniformBuffer, inputs: &[Input]) {
        let items = ubo.items().unwrap();
        let lookup = ubo.lookup().unwrap();
        let staging = ubo.staging().unwrap();

        assert_eq!(items.iter().map(|i| i.size).sum::<usize>(), ubo.size());
        assert_eq!(lookup.len(), items.len());
        let mut end = 0;
        for item in items {
            assert_eq!(item.offset, end);
            end = item.range().end;
        }
        assert_eq!(end, ubo.size());

        for (packed, &index) in lookup.iter().enumerate() {
            let input = &inputs[index];
            let n = input.ty.components();
            let expected = input.value.as_ref().unwrap().get();
            assert_eq!(f32_at(staging, items[packed].offset, n), &expected[..n]);
        }
    }

    // ── build ─────────────────────────────────────────────────────────────

    #[test]
    fn vec3_paired_with_float() {
        let mut ctx = RecordingContext::new();
        let inputs = [uniform(Vec4, 0.0), uniform(Vec3, 10.0), uniform(Float, 20.0), uniform(Vec2, 30.0)];
        let (ubo, sorted) = build(&mut ctx, &inputs);

        let items = ubo.items().unwrap();
        let layout: Vec<_> = items.iter().map(|i| (i.ty, i.offset, i.size)).collect();
        assert_eq!(
            layout,
            [(Vec4, 0, 16), (Vec3, 16, 12), (Float, 28, 4), (Vec2, 32, 8)]
        );
        assert_eq!(ubo.size(), 40);
        assert_eq!(sorted, [0, 1, 2, 3]);
        assert_eq!(ubo.lookup().unwrap(), [0, 1, 2, 3]);
    }

    #[test]
    fn vec3_without_float_is_padded() {
        let mut ctx = RecordingContext::new();
        let inputs = [uniform(Vec2, 0.0), uniform(Vec3, 10.0)];
        let (ubo, sorted) = build(&mut ctx, &inputs);

        let items = ubo.items().unwrap();
        assert_eq!(items[0].ty, Vec4);
        assert_eq!(items[1].offset, 16);
        assert_eq!(ubo.size(), 24);
        assert_eq!(sorted, [1, 0]);
    }

    #[test]
    fn staging_matches_repr_c_block() {
        #[repr(C)]
        #[derive(Copy, Clone, Pod, Zeroable)]
        struct Block {
            color: [f32; 4],
            normal: [f32; 3],
            roughness: f32,
            uv_scale: [f32; 2],
        }

        let mut ctx = RecordingContext::new();
        let inputs = [
            Input::uniform(Vec2, LiveValue::new(&[2.0, 3.0])),
            Input::uniform(Float, LiveValue::new(&[0.5])),
            Input::uniform(Vec3, LiveValue::new(&[0.0, 1.0, 0.0])),
            Input::uniform(Vec4, LiveValue::new(&[1.0, 0.5, 0.25, 1.0])),
        ];
        let (ubo, sorted) = build(&mut ctx, &inputs);

        let expected = Block {
            color: [1.0, 0.5, 0.25, 1.0],
            normal: [0.0, 1.0, 0.0],
            roughness: 0.5,
            uv_scale: [2.0, 3.0],
        };
        assert_eq!(sorted, [3, 2, 1, 0]);
        assert_eq!(ubo.staging().unwrap(), bytemuck::bytes_of(&expected));
    }

    #[test]
    fn lookup_points_into_full_input_list() {
        let mut ctx = RecordingContext::new();
        let inputs = [
            Input::new(Vec4, InputSource::Builtin),
            uniform(Float, 1.0),
            Input::linked(Vec4, LinkId(3)),
            uniform(Vec4, 5.0),
            Input::new(Float, InputSource::Texture),
        ];
        let (ubo, sorted) = build(&mut ctx, &inputs);

        assert_eq!(sorted, [3, 1]);
        assert_eq!(ubo.lookup().unwrap(), [3, 1]);
        assert_layout_and_values(&ubo, &inputs);
    }

    #[test]
    fn no_qualifying_input_builds_nothing() {
        let mut ctx = RecordingContext::new();
        let inputs = [Input::linked(Vec3, LinkId(1)), Input::new(Float, InputSource::Constant)];
        let mut sorted = Vec::new();

        let ubo = UniformBuffer::build_dynamic(&mut ctx, &inputs, &mut sorted).unwrap();

        assert!(ubo.is_none());
        assert!(sorted.is_empty());
        assert!(ctx.calls.is_empty());
    }

    #[test]
    fn build_reports_missing_handle() {
        let mut ctx = RecordingContext::failing();
        let mut sorted = Vec::new();
        let err = UniformBuffer::build_dynamic(&mut ctx, &[uniform(Float, 0.0)], &mut sorted).err();
        assert_eq!(err, Some(UboError::CreateFailed));
    }

    #[test]
    fn build_too_large_releases_handle() {
        let mut ctx = RecordingContext::with_limits(32, 8);
        let inputs = [uniform(Vec4, 0.0), uniform(Vec4, 1.0), uniform(Float, 2.0)];
        let mut sorted = Vec::new();

        let err = UniformBuffer::build_dynamic(&mut ctx, &inputs, &mut sorted).err();

        assert_eq!(err, Some(UboError::TooLarge { size: 36, max: 32 }));
        assert_eq!(ctx.live_handles(), 0);
        assert_eq!(ctx.uploads(), 0);
        assert!(sorted.is_empty());
    }

    #[test]
    fn build_uploads_once_and_starts_clean() {
        let mut ctx = RecordingContext::new();
        let inputs = [uniform(Vec2, 4.0)];
        let (ubo, _) = build(&mut ctx, &inputs);

        assert_eq!(ubo.kind(), crate::ubo::BufferKind::Dynamic);
        assert_eq!(ubo.upload_state(), UploadState::Clean);
        assert_eq!(
            ctx.calls,
            [
                GpuCall::Create(ubo.handle()),
                GpuCall::Data {
                    handle: ubo.handle(),
                    bytes: bytemuck::cast_slice(&[4.0f32, 5.0]).to_vec(),
                },
            ]
        );
    }

    #[test]
    #[should_panic]
    fn build_rejects_stale_sorted_output() {
        let mut ctx = RecordingContext::new();
        let mut sorted = vec![7];
        let _ = UniformBuffer::build_dynamic(&mut ctx, &[uniform(Float, 0.0)], &mut sorted);
    }

    #[test]
    #[should_panic]
    fn build_rejects_matrix_uniforms() {
        let mut ctx = RecordingContext::new();
        let mut sorted = Vec::new();
        let inputs = [uniform(Vec4, 0.0), Input::uniform(Mat4, LiveValue::default())];
        let _ = UniformBuffer::build_dynamic(&mut ctx, &inputs, &mut sorted);
    }

    #[test]
    fn every_small_layout_tiles_the_block() {
        const TYPES: [GpuType; 4] = [Float, Vec2, Vec3, Vec4];

        for len in 1..=5u32 {
            for code in 0..4usize.pow(len) {
                let mut c = code;
                let inputs: Vec<Input> = (0..len)
                    .map(|i| {
                        let ty = TYPES[c % 4];
                        c /= 4;
                        uniform(ty, i as f32 * 10.0)
                    })
                    .collect();

                let mut ctx = RecordingContext::new();
                let (ubo, sorted) = build(&mut ctx, &inputs);

                let mut seen = sorted.clone();
                seen.sort_unstable();
                assert_eq!(seen, (0..len as usize).collect::<Vec<_>>());
                assert_layout_and_values(&ubo, &inputs);
            }
        }
    }

    // ── sync ──────────────────────────────────────────────────────────────

    #[test]
    fn sync_copies_new_values_and_marks_dirty() {
        let mut ctx = RecordingContext::new();
        let inputs = [uniform(Float, 0.0), uniform(Vec3, 1.0), uniform(Vec4, 2.0), uniform(Vec2, 3.0)];
        let (mut ubo, _) = build(&mut ctx, &inputs);

        inputs[0].value.as_ref().unwrap().set(&[-1.0]);
        inputs[1].value.as_ref().unwrap().set(&[7.0, 8.0, 9.0]);
        inputs[3].value.as_ref().unwrap().set(&[0.5, 0.5]);
        ctx.clear();

        ubo.sync(&inputs);

        assert_eq!(ubo.upload_state(), UploadState::Dirty);
        assert!(ctx.calls.is_empty());
        assert_layout_and_values(&ubo, &inputs);
    }

    #[test]
    fn sync_accepts_only_the_qualifying_subset() {
        let mut ctx = RecordingContext::new();
        let inputs = [
            Input::new(Vec4, InputSource::Attribute),
            uniform(Vec2, 0.0),
            Input::linked(Float, LinkId(9)),
            uniform(Vec4, 1.0),
        ];
        let (mut ubo, sorted) = build(&mut ctx, &inputs);

        let subset: Vec<Input> = [1, 3].iter().map(|&i| inputs[i].clone()).collect();
        subset[0].value.as_ref().unwrap().set(&[42.0, 43.0]);
        ubo.sync(&subset);

        assert_eq!(sorted, [3, 1]);
        let staging = ubo.staging().unwrap();
        assert_eq!(f32_at(staging, 16, 2), [42.0, 43.0]);
    }

    #[test]
    fn sync_can_run_on_another_thread() {
        let mut ctx = RecordingContext::new();
        let inputs = vec![uniform(Vec4, 0.0), uniform(Float, 1.0)];
        let (ubo, _) = build(&mut ctx, &inputs);

        let worker_inputs = inputs.clone();
        let ubo = std::thread::spawn(move || {
            let mut ubo = ubo;
            worker_inputs[1].value.as_ref().unwrap().set(&[99.0]);
            ubo.sync(&worker_inputs);
            ubo
        })
        .join()
        .unwrap();

        assert_eq!(ubo.upload_state(), UploadState::Dirty);
        assert_eq!(f32_at(ubo.staging().unwrap(), 16, 1), [99.0]);
    }

    #[test]
    #[should_panic]
    fn sync_rejects_missing_value() {
        let mut ctx = RecordingContext::new();
        let inputs = [uniform(Vec2, 0.0)];
        let (mut ubo, _) = build(&mut ctx, &inputs);

        let broken = [Input { value: None, ..inputs[0].clone() }];
        ubo.sync(&broken);
    }

    #[test]
    #[should_panic]
    fn sync_rejects_extra_uniforms() {
        let mut ctx = RecordingContext::new();
        let inputs = [uniform(Vec2, 0.0)];
        let (mut ubo, _) = build(&mut ctx, &inputs);
        ubo.sync(&[uniform(Vec2, 0.0), uniform(Vec2, 1.0)]);
    }

    #[test]
    #[should_panic]
    fn sync_rejects_changed_type() {
        let mut ctx = RecordingContext::new();
        let inputs = [uniform(Vec2, 0.0)];
        let (mut ubo, _) = build(&mut ctx, &inputs);
        ubo.sync(&[uniform(Vec4, 0.0)]);
    }

    #[test]
    #[should_panic]
    fn sync_on_static_buffer_panics() {
        let mut ctx = RecordingContext::new();
        let mut ubo = UniformBuffer::create_static(&mut ctx, 16, None).unwrap();
        ubo.sync(&[]);
    }

    // ── upload / bind ─────────────────────────────────────────────────────

    #[test]
    fn bind_uploads_only_when_dirty() {
        let mut ctx = RecordingContext::new();
        let inputs = [uniform(Vec4, 0.0)];
        let (mut ubo, _) = build(&mut ctx, &inputs);
        ctx.clear();

        ubo.bind(&mut ctx, 0);
        ubo.bind(&mut ctx, 0);
        assert_eq!(ctx.uploads(), 0);

        ubo.tag_dirty();
        assert_eq!(ubo.upload_state(), UploadState::Dirty);
        ubo.bind(&mut ctx, 1);
        ubo.bind(&mut ctx, 1);

        assert_eq!(ctx.uploads(), 1);
        assert_eq!(ubo.upload_state(), UploadState::Clean);
        assert_eq!(ubo.bindpoint(), Some(1));
    }

    #[test]
    fn later_uploads_are_partial() {
        let mut ctx = RecordingContext::new();
        let inputs = [uniform(Float, 0.0)];
        let (mut ubo, _) = build(&mut ctx, &inputs);
        ctx.clear();

        inputs[0].value.as_ref().unwrap().set(&[3.0]);
        ubo.sync(&inputs);
        ubo.bind(&mut ctx, 0);

        assert_eq!(
            ctx.calls,
            [
                GpuCall::SubData {
                    handle: ubo.handle(),
                    offset: 0,
                    bytes: 3.0f32.to_ne_bytes().to_vec(),
                },
                GpuCall::Bind { slot: 0, handle: ubo.handle() },
            ]
        );
    }

    #[test]
    fn dirty_bind_past_limit_does_not_upload() {
        let mut ctx = RecordingContext::with_limits(1024, 2);
        let inputs = [uniform(Vec2, 0.0)];
        let (mut ubo, _) = build(&mut ctx, &inputs);
        ubo.tag_dirty();
        ctx.clear();

        ubo.bind(&mut ctx, 2);

        assert!(ctx.calls.is_empty());
        assert_eq!(ubo.upload_state(), UploadState::Dirty);
        assert_eq!(ubo.bindpoint(), None);
    }

    #[test]
    #[should_panic]
    fn tag_dirty_on_static_buffer_panics() {
        let mut ctx = RecordingContext::new();
        let mut ubo = UniformBuffer::create_static(&mut ctx, 16, None).unwrap();
        ubo.tag_dirty();
    }

    #[test]
    #[should_panic]
    fn static_update_on_dynamic_buffer_panics() {
        let mut ctx = RecordingContext::new();
        let (mut ubo, _) = build(&mut ctx, &[uniform(Float, 0.0)]);
        ubo.update(&mut ctx, &[0; 4]);
    }

    // ── free ──────────────────────────────────────────────────────────────

    #[test]
    fn free_releases_dynamic_buffer() {
        let mut ctx = RecordingContext::new();
        let (mut ubo, _) = build(&mut ctx, &[uniform(Vec3, 0.0)]);
        ubo.bind(&mut ctx, 0);

        ubo.free(&mut ctx);

        assert_eq!(ctx.live_handles(), 0);
    }
}
