//! ----------------------------------------------------------------------------
//! **Pass pipeline**: draw lists → GPU commands
//!
//! `render_scene` runs the opaque part of a scene in a fixed order
//!
//! ```text
//! [lights-only] → opaque → masked → masked+offset → models → decals → gap fill
//! ```
//!
//! and `render_translucent` finishes it after the portals are done. Each step
//! sets exactly the state it documents; the drawer restores the standard
//! state around them.
//! ----------------------------------------------------------------------------

use log::trace;

use crate::{
    config::{LightMethod, RenderConfig},
    engine::{
        Scene,
        builder::SceneFrame,
        drawlist::{DrawItem, DrawListKind, Primitive},
    },
    models::{ModelBank, ModelRenderer},
    renderer::{BlendFunc, DepthFunc, DrawCommand, Gpu, PipelineState, TextureMode},
    world::Viewpoint,
};

const DECAL_OFFSET: (f32, f32) = (-1.0, -128.0);
const GAP_FILL_OFFSET: (f32, f32) = (1.0, 128.0);

/// Everything a pass needs besides the lists themselves.
pub struct PassContext<'a, 's, G: Gpu> {
    pub gpu: &'a mut G,
    pub state: &'a mut PipelineState,
    pub config: &'a RenderConfig,
    pub models: &'a mut ModelBank,
    pub scene: &'a Scene<'s>,
    pub vp: &'a Viewpoint,
}

impl<G: Gpu> PassContext<'_, '_, G> {
    fn draw_items<'i>(&mut self, items: impl IntoIterator<Item = &'i DrawItem>) {
        for item in items {
            match item.prim {
                Primitive::Model { actor } => self.draw_model(actor),
                _ => self.gpu.draw(&*self.state, DrawCommand::Item(item.clone())),
            }
        }
    }

    fn draw_model(&mut self, actor_idx: usize) {
        let actor = &self.scene.actors[actor_idx];
        let mut r = ModelRenderer::new(
            &mut *self.gpu,
            &mut *self.state,
            self.config,
            self.scene.materials,
            self.vp.mirror,
        );
        if self.scene.level.has_dynamic_lights {
            r.set_light_index(actor_idx as i32);
        }
        r.render_model(&mut *self.models, actor, self.vp.tic_frac);
    }

    fn lights_only_enabled(&self) -> bool {
        self.config.light_method == LightMethod::Deferred
            && self.scene.level.has_dynamic_lights
            && !self.scene.fullbright
    }
}

/// Collect the dynamic lights touching every lit surface ahead of drawing.
fn draw_lights_only<G: Gpu>(ctx: &mut PassContext<G>, frame: &SceneFrame) {
    for kind in [
        DrawListKind::PlainFlats,
        DrawListKind::MaskedFlats,
        DrawListKind::TranslucentBorder,
        DrawListKind::Translucent,
    ] {
        for item in &frame.lists[kind] {
            ctx.gpu
                .draw(&*ctx.state, DrawCommand::LightsOnly(item.clone()));
        }
    }
}

/// Everything up to, but not including, the translucent geometry.
pub fn render_scene<G: Gpu>(ctx: &mut PassContext<G>, frame: &mut SceneFrame) {
    trace!("render_scene: {:?}", frame.lists.sizes());

    if ctx.config.sort_textures {
        for kind in [
            DrawListKind::PlainWalls,
            DrawListKind::PlainFlats,
            DrawListKind::MaskedWalls,
            DrawListKind::MaskedFlats,
            DrawListKind::MaskedWallsOffset,
        ] {
            frame.lists[kind].sort_by_material();
        }
    }

    if ctx.lights_only_enabled() {
        draw_lights_only(ctx, frame);
    }

    // 1 ─ opaque: alpha test always passes, no blending
    {
        let st = &mut *ctx.state;
        st.depth_func = DepthFunc::Less;
        st.depth_write = true;
        st.alpha_threshold = 0.0;
        st.blend = BlendFunc::Replace;
        st.polygon_offset = None;
        st.texturing = ctx.config.texture;
        st.brightmaps = true;
        st.fog = true;
    }
    ctx.draw_items(&frame.lists[DrawListKind::PlainWalls]);
    ctx.draw_items(&frame.lists[DrawListKind::PlainFlats]);

    // 2 ─ masked: cut-outs need the texture even when texturing is off
    ctx.state.alpha_threshold = ctx.config.mask_threshold;
    if !ctx.config.texture {
        ctx.state.texturing = true;
        ctx.state.texture_mode = TextureMode::Mask;
    }
    ctx.draw_items(&frame.lists[DrawListKind::MaskedWalls]);
    ctx.draw_items(&frame.lists[DrawListKind::MaskedFlats]);

    // 3 ─ masked with offset, only when there is something to draw
    if !frame.lists[DrawListKind::MaskedWallsOffset].is_empty() {
        ctx.state.polygon_offset = Some(DECAL_OFFSET);
        ctx.draw_items(&frame.lists[DrawListKind::MaskedWallsOffset]);
        ctx.state.polygon_offset = None;
    }

    // 4 ─ models and opaque sprites
    ctx.draw_items(&frame.lists[DrawListKind::Models]);

    ctx.state.blend = BlendFunc::AlphaBlend;

    // 5 ─ decals sit on their walls
    ctx.state.depth_func = DepthFunc::LessEqual;
    ctx.state.polygon_offset = Some(DECAL_OFFSET);
    ctx.state.depth_write = false;
    ctx.draw_items(&frame.decals);
    ctx.state.texture_mode = TextureMode::Modulate;
    ctx.state.depth_write = true;

    // 6 ─ flood untextured gaps, pushed back behind mid textures
    {
        let st = &mut *ctx.state;
        st.polygon_offset = Some(GAP_FILL_OFFSET);
        st.depth_write = false;
        st.fog = true;
        st.alpha_threshold = 0.0;
        st.blend = BlendFunc::Replace;
    }
    ctx.draw_items(&frame.gap_fill);

    let st = &mut *ctx.state;
    st.depth_write = true;
    st.polygon_offset = None;
    st.depth_func = DepthFunc::Less;
    st.blend = BlendFunc::AlphaBlend;
}

/// Translucent geometry: portal borders front to back with depth writes,
/// then everything else back to front without them.
pub fn render_translucent<G: Gpu>(ctx: &mut PassContext<G>, frame: &mut SceneFrame) {
    let eye = ctx.vp.pos;
    ctx.state.brightmaps = true;
    ctx.state.alpha_threshold = ctx.config.mask_sprite_threshold;
    ctx.state.blend = BlendFunc::AlphaBlend;

    // borders still write depth; only the sorted list below turns it off
    frame.lists[DrawListKind::TranslucentBorder].sort_front_to_back(eye);
    ctx.draw_items(&frame.lists[DrawListKind::TranslucentBorder]);

    ctx.state.depth_write = false;
    frame.lists[DrawListKind::Translucent].sort_back_to_front(eye);
    ctx.draw_items(&frame.lists[DrawListKind::Translucent]);

    ctx.state.brightmaps = false;
    ctx.state.alpha_threshold = 0.5;
    ctx.state.depth_write = true;
}

/*====================================================================*/
/*                                Tests                                */
/*====================================================================*/
