use crate::draw::FrameDraws;

/// Backend-agnostic interface. All renderers implement this trait.
///
/// A renderer consumes a finished draw list and produces output. It never
/// touches the scene: traversal happens once in [`FrameDraws::build`].
pub trait Renderer {
    /// The output type produced by this renderer.
    type Output;

    /// Render one frame from its draw list.
    fn render(&self, frame: &FrameDraws) -> Self::Output;
}

/// Text renderer for headless runs.
///
/// Produces a human-readable listing of the camera, the lights and every
/// draw command. Used by the CLI and by tests of the draw orchestration.
#[derive(Debug, Default)]
pub struct DebugTextRenderer;

impl DebugTextRenderer {
    pub fn new() -> Self {
        Self
    }
}

impl Renderer for DebugTextRenderer {
    type Output = String;

    fn render(&self, frame: &FrameDraws) -> String {
        let c = &frame.constants;
        let mut out = String::new();
        out.push_str(&format!(
            "=== Frame (draw calls={}, shadow casters={}) ===\n",
            frame.draw_call_count(),
            frame.shadow_casters.len()
        ));
        out.push_str(&format!(
            "Camera: eye=({:.2}, {:.2}, {:.2})\n",
            c.eye.x, c.eye.y, c.eye.z
        ));
        for (i, (pos, color)) in c.light_positions.iter().zip(&c.light_colors).enumerate() {
            out.push_str(&format!(
                "Light {i}: pos=({:.2}, {:.2}, {:.2}) color=({:.2}, {:.2}, {:.2}, {:.2})\n",
                pos.x, pos.y, pos.z, color.x, color.y, color.z, color.w
            ));
        }

        for cmd in &frame.commands {
            let p = cmd.world.w_axis;
            let material = match cmd.material {
                Some(m) => format!("tex={:016x}", m.diffuse.0),
                None => "untextured".to_string(),
            };
            out.push_str(&format!(
                "  [{}] {} pos=({:.2}, {:.2}, {:.2}) indices={}@{}{:+} instances={} {}{}\n",
                cmd.pass.as_str(),
                cmd.object,
                p.x,
                p.y,
                p.z,
                cmd.indices.count,
                cmd.indices.base_index,
                cmd.indices.base_vertex,
                cmd.instances,
                material,
                if cmd.has_normal_map { " normal-mapped" } else { "" }
            ));
        }

        for (name, palette) in &frame.bone_palettes {
            out.push_str(&format!("  bones[{name}]: {}\n", palette.len()));
        }

        out
    }
}
