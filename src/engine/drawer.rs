//! ---------------------------------------------------------------------------
//! **Scene drawer**: the frame entry point
//!
//! ```text
//! render_viewpoint ─┬─ eye 0 ─ process_scene ─ draw_scene(MainView, 0)
//!                   │                              ├─ build + opaque passes
//!                   │                              ├─ end_frame ─ portal ─ draw_scene(Portal, 1) …
//!                   │                              └─ translucent
//!                   └─ eye 1 …
//! ```
//!
//! Owns the device, the pipeline state and the per-frame bookkeeping. Portal
//! recursion is plain call-stack recursion with the depth passed down.
//! ---------------------------------------------------------------------------

use std::io::{Cursor, Write};

use glam::{Mat4, Vec3};
use image::{ExtendedColorType, ImageEncoder, codecs::png::PngEncoder};
use log::{debug, info, trace};

use crate::{
    config::RenderConfig,
    engine::{
        Scene,
        builder::{SceneBuilder, SceneFrame},
        passes::{self, PassContext},
        portal::{FootprintPart, PortalEntry, ProcessedPortals, sub_viewpoint},
    },
    error::RenderError,
    models::{ModelBank, ModelRenderer},
    renderer::{
        ClearFlags, DepthFunc, DrawCommand, FootprintStep, Gpu, IntRect, PassType,
        PipelineState, StencilFunc, StencilOp, StencilState,
    },
    stereo::{StereoRig, ViewShift},
    world::{Actor, NO_MATERIAL, SKY_DOME, SectorId, Viewpoint},
};

/// Aspect handed to the save-picture render.
const SAVE_RATIO: f32 = 1.6;

/// Why a scene is drawn; decides the ambient-occlusion budget.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DrawMode {
    /// The player's own view on screen.
    MainView,
    /// Camera textures and save pictures.
    Offscreen,
    /// A nested view behind a portal.
    Portal,
}

pub struct SceneDrawer<G: Gpu> {
    gpu: G,
    state: PipelineState,
    config: RenderConfig,
    /// Stereo set-up from the config.
    stereo: StereoRig,
    /// The rig of the view being rendered; mono for offscreen views.
    active: StereoRig,
    models: ModelBank,
    builder: SceneBuilder,
    processed: ProcessedPortals,
    /// Nested views that may still get ambient occlusion.
    ssao_portals_available: u32,
    bounds: IntRect,
    ratio: f32,
    /// Horizontal fov (degrees) of the last rendered view.
    fov: f32,
}

impl<G: Gpu> SceneDrawer<G> {
    pub fn new(gpu: G, config: RenderConfig) -> Self {
        let stereo = StereoRig::new(&config.stereo);
        info!(
            "scene drawer: {:?} stereo, {} eye(s), portal depth {}",
            stereo.mode,
            stereo.eye_count(),
            config.max_portal_depth
        );
        Self {
            gpu,
            state: PipelineState::default(),
            config,
            active: stereo.clone(),
            stereo,
            models: ModelBank::default(),
            builder: SceneBuilder::default(),
            processed: ProcessedPortals::default(),
            ssao_portals_available: 0,
            bounds: IntRect::default(),
            ratio: 4.0 / 3.0,
            fov: 90.0,
        }
    }

    pub fn gpu(&self) -> &G {
        &self.gpu
    }

    pub fn gpu_mut(&mut self) -> &mut G {
        &mut self.gpu
    }

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub fn models_mut(&mut self) -> &mut ModelBank {
        &mut self.models
    }

    /// For the VR runtime to report the controller pose.
    pub fn stereo_mut(&mut self) -> &mut StereoRig {
        &mut self.stereo
    }

    /// Portals rendered so far in the current frame.
    pub fn processed_portals(&self) -> &ProcessedPortals {
        &self.processed
    }

    /*──────────────────────── frame entry ──────────────────────────*/

    /// Render `vp` into `bounds` once per eye and return the sector the
    /// view is in. `fov` is the horizontal field of view in degrees.
    ///
    /// Only a main view that goes to the screen uses the stereo set-up;
    /// everything else renders a single centred eye.
    #[allow(clippy::too_many_arguments)]
    pub fn render_viewpoint(
        &mut self,
        scene: &Scene,
        vp: &mut Viewpoint,
        bounds: IntRect,
        fov: f32,
        ratio: f32,
        fov_ratio: f32,
        main_view: bool,
        to_screen: bool,
    ) -> SectorId {
        self.active = if main_view && to_screen {
            self.stereo.clone()
        } else {
            StereoRig::mono()
        };
        self.bounds = bounds;
        self.ratio = ratio;
        self.fov = fov;
        let baseline = vp.pos;

        for eye_ix in 0..self.active.eye_count() {
            let eye = *self.active.eye(eye_ix);
            self.state.viewport = self.active.eye_viewport(bounds, eye_ix);
            self.set_3d_viewport(main_view);
            self.state.projection =
                eye.projection(fov, ratio, fov_ratio, self.active.screen_distance);

            let (hw_yaw, _, _) = vp.hw_angles();
            let shift = eye.view_shift(hw_yaw, self.active.units_per_meter);
            {
                let shifted = ViewShift::new(vp, shift);
                self.set_view_matrix(&shifted);
                self.process_scene(scene, &shifted, to_screen);
                if main_view && to_screen {
                    self.end_draw_scene(scene, &shifted);
                    self.draw_end_scene_2d(scene, &shifted);
                }
            }

            if !self.active.is_mono() {
                self.gpu.blit_to_eye(eye_ix);
            }
        }

        // back to the un-shifted interpolated position
        vp.pos = baseline;
        vp.sector
    }

    /// Fresh portal bookkeeping, then the top-level scene.
    pub fn process_scene(&mut self, scene: &Scene, vp: &Viewpoint, to_screen: bool) {
        self.processed.reset();
        let mode = if to_screen {
            DrawMode::MainView
        } else {
            DrawMode::Offscreen
        };
        self.draw_scene(scene, vp, mode, 0);
    }

    /// Build and draw one level of the scene, its portals included.
    /// `depth` is 0 for the top level.
    pub fn draw_scene(&mut self, scene: &Scene, vp: &Viewpoint, mode: DrawMode, depth: u32) {
        let apply_ssao = match mode {
            DrawMode::MainView => {
                self.ssao_portals_available = self.config.ssao_portals;
                true
            }
            DrawMode::Offscreen => {
                self.ssao_portals_available = 0;
                false
            }
            DrawMode::Portal if self.ssao_portals_available > 0 => {
                self.ssao_portals_available -= 1;
                true
            }
            DrawMode::Portal => false,
        };

        let mut frame = self.builder.build_scene(scene, vp, self.ratio);
        trace!(
            "draw_scene depth {depth}: {} subsectors, {} portals",
            frame.visible_subsectors,
            frame.portals.len()
        );
        passes::render_scene(&mut self.pass_context(scene, vp), &mut frame);

        if self.active.render_player_sprites_in_scene() {
            self.draw_player_sprites(scene, vp);
        }
        if apply_ssao && self.state.pass == PassType::GBuffer {
            self.gpu.ambient_occlude(&self.state);
        }

        self.end_frame(scene, vp, &frame, depth + 1);

        passes::render_translucent(&mut self.pass_context(scene, vp), &mut frame);
    }

    fn pass_context<'a, 's>(
        &'a mut self,
        scene: &'a Scene<'s>,
        vp: &'a Viewpoint,
    ) -> PassContext<'a, 's, G> {
        PassContext {
            gpu: &mut self.gpu,
            state: &mut self.state,
            config: &self.config,
            models: &mut self.models,
            scene,
            vp,
        }
    }

    /*──────────────────────── portals ──────────────────────────────*/

    /// Render every portal `frame` discovered, at recursion level `depth`.
    fn end_frame(&mut self, scene: &Scene, vp: &Viewpoint, frame: &SceneFrame, depth: u32) {
        for entry in frame.portals.entries() {
            if let Err(e) = self.render_portal(scene, vp, entry, depth) {
                debug!("portal {} skipped: {e}", entry.id);
            }
        }
    }

    /// Draw the view behind one portal into its stencil footprint.
    /// Already processed portals are left alone.
    fn render_portal(
        &mut self,
        scene: &Scene,
        vp: &Viewpoint,
        entry: &PortalEntry,
        depth: u32,
    ) -> Result<(), RenderError> {
        // the stencil reference is one byte
        let max = self.config.max_portal_depth.min(u8::MAX as u32);
        let level = self.state.stencil.reference;
        let inner = match level.checked_add(1) {
            Some(inner) if depth <= max => inner,
            _ => return Err(RenderError::PortalDepthExceeded { depth, max }),
        };
        if !self.processed.claim(entry.id) {
            return Ok(());
        }

        let saved_stencil = self.state.stencil;
        let saved_portal = self.state.portal;
        let (saved_view, saved_normal) = (self.state.view, self.state.normal_view);
        self.state.portal = Some(entry.id);

        // raise the stencil inside the footprint
        self.state.stencil = StencilState {
            enabled: true,
            func: StencilFunc::Equal,
            reference: level,
            pass_op: StencilOp::Incr,
        };
        self.state.color_write = false;
        self.state.texturing = false;
        self.state.depth_write = false;
        self.state.depth_func = DepthFunc::Less;
        self.draw_footprint(entry, FootprintStep::Mark);

        // push its depth to the far plane
        self.state.stencil.reference = inner;
        self.state.stencil.pass_op = StencilOp::Keep;
        self.state.depth_write = true;
        self.state.depth_func = DepthFunc::Always;
        self.draw_footprint(entry, FootprintStep::ClearDepth);

        self.state.texturing = true;
        self.state.depth_func = DepthFunc::Less;
        self.state.color_write = true;

        if entry.id == SKY_DOME {
            self.draw_sky_dome(scene, entry);
        } else {
            let sub = sub_viewpoint(scene.level, entry.id, vp);
            self.set_view_matrix(&sub);
            self.draw_scene(scene, &sub, DrawMode::Portal, depth);
            self.state.view = saved_view;
            self.state.normal_view = saved_normal;
        }

        // write the footprint's own depth and drop the stencil back
        self.state.color_write = false;
        self.state.texturing = false;
        self.state.depth_write = true;
        self.state.depth_func = DepthFunc::LessEqual;
        self.state.stencil = StencilState {
            enabled: true,
            func: StencilFunc::Equal,
            reference: inner,
            pass_op: StencilOp::Decr,
        };
        self.draw_footprint(entry, FootprintStep::Seal);

        self.state.stencil = saved_stencil;
        self.state.portal = saved_portal;
        self.state.restore_standard();
        Ok(())
    }

    /// The sky texture of the first plane in the footprint, drawn as a
    /// backdrop around the eye.
    fn draw_sky_dome(&mut self, scene: &Scene, entry: &PortalEntry) {
        let level = scene.level;
        let tex = entry
            .footprint
            .iter()
            .find_map(|part| match *part {
                FootprintPart::Plane { subsector, ceiling } => {
                    let sector = &level.sectors[level.subsectors[subsector as usize].sector as usize];
                    Some(if ceiling {
                        sector.ceil_tex
                    } else {
                        sector.floor_tex
                    })
                }
                FootprintPart::Seg(_) => None,
            })
            .unwrap_or(NO_MATERIAL);
        let material = scene.materials.resolve_id(tex);
        self.gpu.draw(&self.state, DrawCommand::SkyDome { material });
    }

    fn draw_footprint(&mut self, entry: &PortalEntry, step: FootprintStep) {
        self.gpu.draw(
            &self.state,
            DrawCommand::Footprint {
                portal: entry.id,
                step,
            },
        );
    }

    /*──────────────────────── view set-up ──────────────────────────*/

    /// Clear the current viewport and arm depth and stencil tests.
    pub fn set_3d_viewport(&mut self, main_view: bool) {
        self.state.pass = if main_view && self.config.ssao {
            PassType::GBuffer
        } else {
            PassType::Normal
        };
        self.state.scissor = Some(self.state.viewport);
        self.gpu.clear(&self.state, ClearFlags::all(), [0.0; 3]);
        self.state.depth_test = true;
        self.state.stencil = StencilState {
            enabled: true,
            func: StencilFunc::Always,
            reference: 0,
            pass_op: StencilOp::Replace,
        };
    }

    /// World → eye transform of `vp`, mirrored views included.
    pub fn set_view_matrix(&mut self, vp: &Viewpoint) {
        let (yaw, pitch, roll) = vp.hw_angles();
        let mult = if vp.mirror { -1.0 } else { 1.0 };
        let plane_mult = if vp.plane_mirror {
            -self.config.pixel_stretch
        } else {
            self.config.pixel_stretch
        };

        let rot = Mat4::from_axis_angle(Vec3::Z, roll.to_radians())
            * Mat4::from_axis_angle(Vec3::X, pitch.to_radians())
            * Mat4::from_axis_angle(Vec3::new(0.0, mult, 0.0), yaw.to_radians());
        self.state.normal_view = rot;
        self.state.view = rot
            * Mat4::from_translation(Vec3::new(
                vp.pos.x * mult,
                -vp.pos.z * plane_mult,
                -vp.pos.y,
            ))
            * Mat4::from_scale(Vec3::new(-mult, plane_mult, 1.0));
    }

    /*──────────────────────── HUD ──────────────────────────────────*/

    fn hud_model_available(&self, scene: &Scene) -> bool {
        scene
            .weapon
            .and_then(|w| w.model.as_ref())
            .is_some_and(|m| self.models.get(m.frame.model).is_some())
    }

    /// The player's weapon: the model when there is one, else the sprite.
    fn draw_player_sprites(&mut self, scene: &Scene, vp: &Viewpoint) {
        let Some(weapon) = scene.weapon else { return };
        let Some(player) = scene.camera(vp) else {
            return;
        };
        if weapon.model.is_some() {
            self.draw_hud_model(scene, vp, player);
        } else {
            self.gpu.draw(
                &self.state,
                DrawCommand::WeaponSprite {
                    material: weapon.sprite,
                },
            );
        }
    }

    fn draw_hud_model(&mut self, scene: &Scene, vp: &Viewpoint, player: &Actor) -> bool {
        let Some(weapon) = scene.weapon else {
            return false;
        };
        let mut r = ModelRenderer::new(
            &mut self.gpu,
            &mut self.state,
            &self.config,
            scene.materials,
            vp.mirror,
        );
        r.render_hud_model(&mut self.models, &self.active, player, weapon, vp.tic_frac)
    }

    /// Close the 3D part of a screen view.
    pub fn end_draw_scene(&mut self, scene: &Scene, vp: &Viewpoint) {
        self.state.fog = false;
        if self.hud_model_available(scene) && !self.active.render_player_sprites_in_scene() {
            // over everything already drawn
            self.gpu.clear(&self.state, ClearFlags::DEPTH, [0.0; 3]);
            if let Some(player) = scene.camera(vp) {
                self.draw_hud_model(scene, vp, player);
            }
        }
        self.state.stencil.enabled = false;
        self.state.viewport = self.bounds;
        self.state.restore_standard();
        self.state.scissor = None;
    }

    /// 2D overlay pass: the flat weapon sprite.
    pub fn draw_end_scene_2d(&mut self, scene: &Scene, vp: &Viewpoint) {
        let screen = self.state.viewport;
        self.state.projection =
            Mat4::orthographic_rh_gl(0.0, screen.w as f32, screen.h as f32, 0.0, -1.0, 1.0);
        self.state.view = Mat4::IDENTITY;
        self.state.normal_view = Mat4::IDENTITY;
        self.state.depth_test = false;

        if !self.hud_model_available(scene) && !self.active.render_player_sprites_in_scene() {
            self.draw_player_sprites(scene, vp);
        }

        self.state.restore_standard();
        self.state.scissor = None;
    }

    /*──────────────────────── save picture ─────────────────────────*/

    /// Read back `width`×`height` RGB pixels of the last render, bottom
    /// row first.
    pub fn capture_save_pixels(&mut self, width: u32, height: u32) -> Result<Vec<u8>, RenderError> {
        let bytes = (width as usize)
            .checked_mul(height as usize)
            .and_then(|n| n.checked_mul(3))
            .filter(|&n| n > 0)
            .ok_or(RenderError::InvalidCaptureSize { width, height })?;

        let mut pixels = Vec::new();
        pixels
            .try_reserve_exact(bytes)
            .map_err(|source| RenderError::Allocation { bytes, source })?;
        pixels.resize(bytes, 0);

        // the scene must be on the frame-buffer before we read it
        self.gpu.finish();
        self.gpu
            .read_pixels(IntRect::sized(width, height), &mut pixels);
        Ok(pixels)
    }

    /// Render what `player` sees at `width`×`height` and write it to `sink`
    /// as a PNG. Nothing reaches `sink` unless encoding succeeded.
    pub fn write_save_picture(
        &mut self,
        scene: &Scene,
        player: &Actor,
        sink: &mut impl Write,
        width: u32,
        height: u32,
    ) -> Result<(), RenderError> {
        if width == 0 || height == 0 {
            return Err(RenderError::InvalidCaptureSize { width, height });
        }
        // the device may still be reading buffers we are about to refill
        self.gpu.finish();

        let mut vp = Viewpoint::from_actor(scene.level, player, 1.0, self.fov.to_radians());
        let fov = self.fov;
        self.render_viewpoint(
            scene,
            &mut vp,
            IntRect::sized(width, height),
            fov,
            SAVE_RATIO,
            SAVE_RATIO,
            true,
            false,
        );
        self.state.stencil.enabled = false;

        let pixels = self.capture_save_pixels(width, height)?;
        let row = width as usize * 3;
        let mut top_down = Vec::new();
        top_down
            .try_reserve_exact(pixels.len())
            .map_err(|source| RenderError::Allocation {
                bytes: pixels.len(),
                source,
            })?;
        for line in pixels.chunks_exact(row).rev() {
            top_down.extend_from_slice(line);
        }

        let mut png = Cursor::new(Vec::new());
        PngEncoder::new(&mut png).write_image(&top_down, width, height, ExtendedColorType::Rgb8)?;
        sink.write_all(png.get_ref())?;
        info!(
            "save picture: {width}x{height}, {} bytes",
            png.get_ref().len()
        );
        Ok(())
    }
}

/*====================================================================*/
/*                                Tests                                */
/*====================================================================*/
