use anyhow::{Context, Result};
use spindle_renderer::{GpuCall, RecordingGpu, SceneRenderer, SceneSettings};

/// Simulated frame spacing, roughly 60 fps.
const FRAME_MS: u64 = 16;

#[derive(Debug, Default, PartialEq, Eq)]
pub struct Summary {
    pub frames: u64,
    pub calls: usize,
    pub draw_calls: usize,
    pub uniform_uploads: usize,
    pub live_handles: usize,
}

/// Runs the full host sequence against the recording backend: create, size,
/// `frames` draws, release.
pub fn run(settings: SceneSettings, width: u32, height: u32, frames: u64) -> Result<Summary> {
    let mut gpu = RecordingGpu::new();
    let mut renderer = SceneRenderer::new(settings);

    renderer
        .on_surface_created(&mut gpu)
        .context("surface creation failed")?;
    renderer
        .on_surface_changed(&mut gpu, width, height)
        .context("surface resize failed")?;

    for frame in 0..frames {
        let transform = renderer
            .on_draw_frame(&mut gpu, frame * FRAME_MS)
            .with_context(|| format!("frame {frame} failed"))?;
        log::trace!("frame {frame}: {:.2} deg", transform.angle_degrees);
    }

    let calls = gpu.calls();
    let summary = Summary {
        frames: renderer.frames_drawn(),
        calls: calls.len(),
        draw_calls: gpu.draw_call_count(),
        uniform_uploads: calls
            .iter()
            .filter(|call| matches!(call, GpuCall::UniformMatrix4 { .. }))
            .count(),
        live_handles: gpu.live_handles(),
    };

    renderer.release(&mut gpu);
    if gpu.live_handles() != 0 {
        log::warn!("{} GPU objects survived release", gpu.live_handles());
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_draws_per_frame() {
        let summary = run(SceneSettings::default(), 800, 480, 10).unwrap();

        assert_eq!(summary.frames, 10);
        assert_eq!(summary.draw_calls, 20);
        assert_eq!(summary.uniform_uploads, 20);
        assert_eq!(summary.live_handles, 7);
    }

    #[test]
    fn zero_frames_still_builds_scene() {
        let summary = run(SceneSettings::default(), 1, 1, 0).unwrap();
        assert_eq!(summary.draw_calls, 0);
        assert_eq!(summary.live_handles, 7);
    }
}
