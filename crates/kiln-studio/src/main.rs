//! Headless walkthrough of the uniform buffer core.
//!
//! Builds a dynamic UBO for a small material, animates its values from a
//! worker thread and binds it once per simulated frame next to a static
//! per-frame block.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use kiln_gpu::device::{GpuContext, WgpuContext, WgpuInit};
use kiln_gpu::logging::{LoggingConfig, init_logging};
use kiln_gpu::material::{GpuType, Input, InputSource, LinkId, LiveValue};
use kiln_gpu::ubo::UniformBuffer;

const FRAMES: u32 = 8;
const FRAME_TIME: Duration = Duration::from_millis(16);

const GLOBALS_SLOT: u32 = 0;
const MATERIAL_SLOT: u32 = 1;

/// Per-frame block: time, frame index, two unused floats.
const GLOBALS_SIZE: usize = 16;

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());

    let mut ctx = pollster::block_on(WgpuContext::headless(WgpuInit::default()))
        .context("kiln-studio needs a wgpu adapter")?;

    let limits = ctx.limits();
    log::info!(
        "ubo limits: {} bytes, {} binding points",
        limits.max_ubo_size,
        limits.max_ubo_binds
    );

    let material = SampleMaterial::new();

    let mut order = Vec::new();
    let Some(mut material_ubo) = UniformBuffer::build_dynamic(&mut ctx, &material.inputs, &mut order)?
    else {
        log::info!("material has no dynamic uniforms; nothing to do");
        return Ok(());
    };
    log_layout(&material_ubo, &material.inputs);
    log::info!("uniform block member order: {order:?}");

    let mut globals = UniformBuffer::create_static(&mut ctx, GLOBALS_SIZE, None)?;

    // Value producer: animates the base color off the GPU thread.
    let running = Arc::new(AtomicBool::new(true));
    let worker = {
        let running = Arc::clone(&running);
        let base_color = material.base_color.clone();
        thread::spawn(move || {
            let start = Instant::now();
            while running.load(Ordering::Relaxed) {
                let t = start.elapsed().as_secs_f32();
                base_color.set(&[t.sin() * 0.5 + 0.5, 0.3, t.cos() * 0.5 + 0.5, 1.0]);
                thread::sleep(Duration::from_millis(4));
            }
        })
    };

    let start = Instant::now();
    for frame in 0..FRAMES {
        material_ubo.sync(&material.inputs);

        let time = start.elapsed().as_secs_f32();
        let block: [f32; 4] = [time, frame as f32, 0.0, 0.0];
        globals.update(&mut ctx, bytemuck::cast_slice(&block));

        globals.bind(&mut ctx, GLOBALS_SLOT);
        material_ubo.bind(&mut ctx, MATERIAL_SLOT);

        ctx.queue().submit(std::iter::empty());

        log::info!(
            "frame {frame}: {} bound uniform buffers, base color {:?}",
            ctx.bind_group_entries().len(),
            material.base_color.get()
        );

        thread::sleep(FRAME_TIME);
    }

    running.store(false, Ordering::Relaxed);
    if worker.join().is_err() {
        log::warn!("value worker panicked");
    }

    material_ubo.free(&mut ctx);
    globals.free(&mut ctx);

    Ok(())
}

/// A material with a mix of inputs, only some of which end up in the UBO.
struct SampleMaterial {
    inputs: Vec<Input>,
    base_color: LiveValue,
}

impl SampleMaterial {
    fn new() -> Self {
        let base_color = LiveValue::new(&[0.8, 0.3, 0.2, 1.0]);

        let inputs = vec![
            Input::uniform(GpuType::Float, LiveValue::new(&[0.4])), // roughness
            Input::new(GpuType::Mat4, InputSource::Builtin),        // model matrix
            Input::uniform(GpuType::Vec3, LiveValue::new(&[0.0, 0.0, 0.0])), // emission
            Input::uniform(GpuType::Vec2, LiveValue::new(&[1.0, 1.0])), // uv scale
            Input::linked(GpuType::Vec3, LinkId(12)),               // normal from a texture node
            Input::uniform(GpuType::Vec4, base_color.clone()),
            Input::uniform(GpuType::Float, LiveValue::new(&[0.0])), // metallic
        ];

        Self { inputs, base_color }
    }
}

fn log_layout(ubo: &UniformBuffer, inputs: &[Input]) {
    let (Some(items), Some(lookup)) = (ubo.items(), ubo.lookup()) else {
        return;
    };
    log::info!("dynamic UBO #{}: {} bytes", ubo.handle().get(), ubo.size());
    for (item, &index) in items.iter().zip(lookup) {
        log::info!(
            "  @{:>3} {:>2}B {:?} <- input {index} ({:?})",
            item.offset,
            item.size,
            item.ty,
            inputs[index].ty
        );
    }
}
