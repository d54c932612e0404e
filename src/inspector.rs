use crate::rendering::FrameStats;
use crate::scene_graph::Scene;

/// Read-only debug panel: scene name, frame rate and every entity by name.
pub fn draw(ui: &imgui::Ui, scene: &Scene, fps: f32, stats: FrameStats) {
    ui.window("Inspector")
        .position([0.0, 0.0], imgui::Condition::FirstUseEver)
        .size([300.0, 400.0], imgui::Condition::FirstUseEver)
        .build(|| {
            ui.text(format!("Scene: {}", scene.name()));
            ui.text(format!("FPS: {:.1}", fps));
            ui.text(format!(
                "Meshes: {}  Draws: {}  Lights: {}",
                stats.meshes, stats.draw_calls, stats.lights
            ));
            ui.separator();

            if ui.collapsing_header(
                format!("Entities ({})", scene.len()),
                imgui::TreeNodeFlags::DEFAULT_OPEN,
            ) {
                for (entity, name) in scene.entity_names() {
                    let parent = scene
                        .transform(entity)
                        .and_then(|transform| transform.parent());

                    match parent {
                        Some(parent) => ui.text(format!("{name}  (child of {parent:?})")),
                        None => ui.text(name),
                    }
                }
            }
        });
}
