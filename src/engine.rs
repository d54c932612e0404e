use std::time::Duration;

use crate::{demo::DemoState, frame_timer::FrameTimer, inspector, rendering::renderer::Renderer};

/// Simulation step for one frame, run between event polling and rendering.
pub fn update(
    state: &mut DemoState,
    renderer: &Renderer,
    ui: &imgui::Ui,
    timer: &FrameTimer,
    delta: Duration,
    show_inspector: bool,
) -> anyhow::Result<()> {
    state.update(delta);

    if show_inspector {
        inspector::draw(ui, &state.scene, timer.fps(), renderer.last_stats());
    }

    Ok(())
}
