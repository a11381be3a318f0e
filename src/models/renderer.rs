//! Model draw adapter: places a model in the world or in front of the
//! viewer and drives [`PipelineState`] while its frames are drawn.

use glam::{Mat4, Vec3};

use crate::{
    config::RenderConfig,
    models::{Model, ModelBank, ModelFlags, ModelFrame, ModelVertexBuffer, SpriteModelFrame},
    renderer::{BoundMaterial, DepthFunc, DrawCommand, FrontFace, Gpu, PipelineState, VertexSource},
    stereo::StereoRig,
    world::{Actor, ActorModel, MaterialBank, MaterialId, RenderStyle},
};

/// Sprite y offset of a fully raised weapon.
pub const WEAPONTOP: f32 = 32.0;

/// The weapon the viewing player holds up.
#[derive(Clone, Debug, PartialEq)]
pub struct HudWeapon {
    /// Flat sprite drawn when there is no model.
    pub sprite: MaterialId,
    pub model: Option<ActorModel>,
    /// Bob offsets in sprite pixels.
    pub ofs_x: f32,
    pub ofs_y: f32,
}

#[inline]
fn rotate(m: &mut Mat4, deg: f32, axis: Vec3) {
    *m *= Mat4::from_axis_angle(axis, deg.to_radians());
}

#[inline]
fn translate(m: &mut Mat4, v: Vec3) {
    *m *= Mat4::from_translation(v);
}

#[inline]
fn scale(m: &mut Mat4, v: Vec3) {
    *m *= Mat4::from_scale(v);
}

/// Model scale in GL axis order: x, height, depth.
#[inline]
fn gl_scale(smf: &SpriteModelFrame) -> Vec3 {
    Vec3::new(smf.scale.x, smf.scale.z, smf.scale.y)
}

/// Offset divided by scale, so offsets stay in world units.
#[inline]
fn gl_offset(smf: &SpriteModelFrame) -> Vec3 {
    Vec3::new(smf.offset.x, smf.offset.z, smf.offset.y) / gl_scale(smf)
}

/// A negative scale product turns the winding over.
#[inline]
fn is_mirrored(smf: &SpriteModelFrame) -> bool {
    smf.scale.x * smf.scale.y * smf.scale.z < 0.0
}

pub struct ModelRenderer<'a, G: Gpu> {
    gpu: &'a mut G,
    state: &'a mut PipelineState,
    config: &'a RenderConfig,
    materials: &'a MaterialBank,
    /// An odd number of mirror portals lies between eye and scene.
    portal_mirrored: bool,
    /// Slot of the light list collected for the model being drawn.
    light_index: i32,
}

impl<'a, G: Gpu> ModelRenderer<'a, G> {
    pub fn new(
        gpu: &'a mut G,
        state: &'a mut PipelineState,
        config: &'a RenderConfig,
        materials: &'a MaterialBank,
        portal_mirrored: bool,
    ) -> Self {
        Self {
            gpu,
            state,
            config,
            materials,
            portal_mirrored,
            light_index: -1,
        }
    }

    pub fn set_light_index(&mut self, index: i32) {
        self.light_index = index;
    }

    pub fn state(&self) -> &PipelineState {
        &*self.state
    }

    /*──────────────────────── transforms ───────────────────────────*/

    /// Model space → world space for `actor`, in GL axis order. The flag
    /// says whether the transform mirrors the model.
    pub fn compute_world_transform(
        &self,
        actor: &Actor,
        smf: &SpriteModelFrame,
        tic_frac: f32,
    ) -> (Mat4, bool) {
        let pos = actor.interpolated_position(tic_frac);
        let yaw = actor.interpolated_yaw(tic_frac).to_degrees();
        let pitch = if smf.flags.contains(ModelFlags::INHERIT_ACTOR_PITCH) {
            actor.pitch.to_degrees()
        } else {
            0.0
        };
        let roll = if smf.flags.contains(ModelFlags::USE_ACTOR_ROLL) {
            actor.roll.to_degrees()
        } else {
            0.0
        };

        let mut m = Mat4::IDENTITY;
        translate(&mut m, Vec3::new(pos.x, pos.z, pos.y));
        rotate(&mut m, -yaw, Vec3::Y);
        rotate(&mut m, pitch, Vec3::Z);
        rotate(&mut m, -roll, Vec3::X);
        scale(&mut m, gl_scale(smf));
        translate(&mut m, gl_offset(smf));
        rotate(&mut m, -smf.angle_offset, Vec3::Y);
        rotate(&mut m, smf.pitch_offset, Vec3::Z);
        rotate(&mut m, -smf.roll_offset, Vec3::X);
        // undo the vertical pixel stretch the view applies
        scale(&mut m, Vec3::new(1.0, self.config.pixel_stretch.recip(), 1.0));
        (m, is_mirrored(smf))
    }

    /// Placement of the HUD weapon model.
    ///
    /// With more than one eye the weapon lives in world space (or wherever
    /// the VR runtime holds the controller); a single eye starts from the
    /// inverse view so the model sits in front of the camera.
    pub fn compute_hud_transform(
        &mut self,
        stereo: &StereoRig,
        player: &Actor,
        smf: &SpriteModelFrame,
        ofs_x: f32,
        ofs_y: f32,
        tic_frac: f32,
    ) -> (Mat4, bool) {
        let mut m = if stereo.eye_count() > 1 {
            self.state.alpha_threshold = self.config.mask_sprite_threshold;
            self.state.model = Some(Mat4::IDENTITY);
            self.state.normal_view = Mat4::IDENTITY;

            match stereo.weapon_transform() {
                Some(pose) => {
                    let mut m = pose;
                    scale(&mut m, Vec3::splat(0.01));
                    translate(
                        &mut m,
                        Vec3::new(
                            0.0,
                            5.0 + self.config.weapon_ofs_z,
                            30.0 + self.config.weapon_ofs_y,
                        ),
                    );
                    m
                }
                None => {
                    let pos = player.interpolated_position(tic_frac);
                    let yaw = player.interpolated_yaw(tic_frac).to_degrees();
                    let mut m = Mat4::IDENTITY;
                    translate(&mut m, Vec3::new(pos.x, pos.z + 40.0, pos.y));
                    rotate(&mut m, -yaw - 90.0, Vec3::Y);
                    m
                }
            }
        } else {
            self.state.view.inverse()
        };

        scale(&mut m, gl_scale(smf));
        translate(&mut m, gl_offset(smf));
        // weapon bob
        rotate(&mut m, ofs_x / 4.0, Vec3::Y);
        rotate(&mut m, (ofs_y - WEAPONTOP) / -4.0, Vec3::X);
        // model sources face +x
        rotate(&mut m, 90.0, Vec3::Y);
        rotate(&mut m, -smf.angle_offset, Vec3::Y);
        rotate(&mut m, smf.pitch_offset, Vec3::Z);
        rotate(&mut m, -smf.roll_offset, Vec3::X);
        if stereo.eye_count() > 1 {
            self.state.model = Some(m);
        }
        (m, is_mirrored(smf))
    }

    /*──────────────────────── begin / end ──────────────────────────*/

    fn culls(style: RenderStyle, smf: &SpriteModelFrame) -> bool {
        style != RenderStyle::Normal && !smf.flags.contains(ModelFlags::DONT_CULL_BACKFACES)
    }

    pub fn begin_draw(
        &mut self,
        style: RenderStyle,
        smf: &SpriteModelFrame,
        transform: Mat4,
        mirrored: bool,
    ) {
        self.state.depth_func = DepthFunc::LessEqual;
        self.state.texturing = true;
        // Translucent models cull back faces to hide their unsorted insides.
        if Self::culls(style, smf) {
            self.state.cull = true;
            self.state.front_face = if mirrored ^ self.portal_mirrored {
                FrontFace::Ccw
            } else {
                FrontFace::Cw
            };
        }
        self.state.model = Some(transform);
    }

    pub fn end_draw(&mut self, style: RenderStyle, smf: &SpriteModelFrame) {
        self.state.model = None;
        self.state.depth_func = DepthFunc::Less;
        if Self::culls(style, smf) {
            self.state.cull = false;
            self.state.front_face = FrontFace::Ccw;
        }
    }

    pub fn begin_draw_hud(&mut self, style: RenderStyle, transform: Mat4, mirrored: bool) {
        self.state.depth_func = DepthFunc::LessEqual;
        if style != RenderStyle::Normal {
            self.state.cull = true;
            self.state.front_face = if mirrored ^ self.portal_mirrored {
                FrontFace::Cw
            } else {
                FrontFace::Ccw
            };
        }
        self.state.model = Some(transform);
    }

    pub fn end_draw_hud(&mut self, style: RenderStyle) {
        self.state.model = None;
        self.state.depth_func = DepthFunc::Less;
        if style != RenderStyle::Normal {
            self.state.cull = false;
            self.state.front_face = FrontFace::Ccw;
        }
    }

    /*──────────────────────── per-frame binding ────────────────────*/

    pub fn set_vertex_buffer(&mut self, buffer: &ModelVertexBuffer) {
        buffer.bind(self.state);
    }

    /// Back to the level geometry stream.
    pub fn reset_vertex_buffer(&mut self) {
        self.state.vertex_source = VertexSource::Scene;
        self.state.layout = Default::default();
    }

    pub fn set_interpolation(&mut self, inter: f32) {
        self.state.interpolation = inter;
    }

    pub fn set_material(&mut self, skin: MaterialId, clamp_no_filter: bool, translation: u32) {
        self.state.material = Some(BoundMaterial {
            id: self.materials.resolve_id(skin),
            clamp_no_filter,
            translation,
        });
        self.state.light_index = if self.config.light_models {
            self.light_index
        } else {
            -1
        };
    }

    pub fn draw_arrays(&mut self, start: u32, count: u32) {
        self.gpu
            .draw(&*self.state, DrawCommand::Arrays { start, count });
    }

    pub fn draw_elements(&mut self, count: u32, byte_offset: usize) {
        self.gpu
            .draw(&*self.state, DrawCommand::Elements { count, byte_offset });
    }

    /*──────────────────────── whole models ─────────────────────────*/

    /// Bind, set up and draw one frame pair of `model`.
    fn render_frame(&mut self, model: &mut Model, smf: &SpriteModelFrame, anim: &ModelFrame, translation: u32) {
        model.ensure_buffer(self.gpu);
        let frame1 = model.frame_start(anim.frame1);
        let frame2 = model.frame_start(anim.frame2);
        let size = model.frame_size();
        let index_count = model.indices.len() as u32;

        let buffer = model.ensure_buffer(self.gpu);
        buffer.bind(self.state);
        self.set_interpolation(anim.inter);
        let translation = if smf.flags.contains(ModelFlags::IGNORE_TRANSLATION) {
            0
        } else {
            translation
        };
        self.set_material(smf.skin, false, translation);
        buffer.setup_frame(self.state, &*self.gpu, frame1, frame2, anim.inter, size);
        let indexed = buffer.has_index_buffer();

        if indexed {
            self.draw_elements(index_count, 0);
        } else {
            self.draw_arrays(0, size);
        }
        self.set_interpolation(0.0);
        self.reset_vertex_buffer();
    }

    /// Draw the model attached to `actor`. Unknown model ids are skipped.
    pub fn render_model(&mut self, bank: &mut ModelBank, actor: &Actor, tic_frac: f32) {
        let Some(am) = &actor.model else { return };
        let Some(model) = bank.get_mut(am.frame.model) else {
            return;
        };
        let (m, mirrored) = self.compute_world_transform(actor, &am.frame, tic_frac);
        self.begin_draw(actor.render_style, &am.frame, m, mirrored);
        self.render_frame(model, &am.frame, &am.anim, actor.translation);
        self.end_draw(actor.render_style, &am.frame);
    }

    /// Draw the player's weapon model. `false` if there was none to draw.
    pub fn render_hud_model(
        &mut self,
        bank: &mut ModelBank,
        stereo: &StereoRig,
        player: &Actor,
        weapon: &HudWeapon,
        tic_frac: f32,
    ) -> bool {
        let Some(am) = &weapon.model else {
            return false;
        };
        let Some(model) = bank.get_mut(am.frame.model) else {
            return false;
        };
        // the stereo placement overrides both for the weapon only
        let saved_normal = self.state.normal_view;
        let saved_threshold = self.state.alpha_threshold;
        let (m, mirrored) =
            self.compute_hud_transform(stereo, player, &am.frame, weapon.ofs_x, weapon.ofs_y, tic_frac);
        self.begin_draw_hud(player.render_style, m, mirrored);
        self.render_frame(model, &am.frame, &am.anim, player.translation);
        self.end_draw_hud(player.render_style);
        self.state.normal_view = saved_normal;
        self.state.alpha_threshold = saved_threshold;
        true
    }
}

/*====================================================================*/
/*                                Tests                                */
/*====================================================================*/
#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::StereoConfig,
        renderer::Recorder,
        stereo::StereoMode,
        world::fixtures,
    };

    fn smf(flags: ModelFlags) -> SpriteModelFrame {
        SpriteModelFrame {
            skin: fixtures::IMP,
            flags,
            ..SpriteModelFrame::default()
        }
    }

    #[test]
    fn culling_and_winding_truth_table() {
        let cfg = RenderConfig::default();
        let bank = fixtures::materials();
        let cases = [
            // style, dont_cull, mirrored, portal_mirrored → cull, front face
            (RenderStyle::Normal, false, false, false, false, None),
            (RenderStyle::Translucent, true, false, false, false, None),
            (RenderStyle::Translucent, false, false, false, true, Some(FrontFace::Cw)),
            (RenderStyle::Add, false, true, false, true, Some(FrontFace::Ccw)),
            (RenderStyle::Add, false, false, true, true, Some(FrontFace::Ccw)),
            (RenderStyle::Fuzzy, false, true, true, true, Some(FrontFace::Cw)),
        ];
        for (style, dont_cull, mirrored, portal, cull, face) in cases {
            let mut gpu = Recorder::default();
            let mut st = PipelineState::default();
            let flags = if dont_cull {
                ModelFlags::DONT_CULL_BACKFACES
            } else {
                ModelFlags::empty()
            };
            let frame = smf(flags);
            let mut r = ModelRenderer::new(&mut gpu, &mut st, &cfg, &bank, portal);
            r.begin_draw(style, &frame, Mat4::IDENTITY, mirrored);
            assert_eq!(r.state().cull, cull, "{style:?} {dont_cull} {mirrored} {portal}");
            assert_eq!(r.state().depth_func, DepthFunc::LessEqual);
            assert!(r.state().model.is_some());
            if let Some(face) = face {
                assert_eq!(r.state().front_face, face);
            }
            r.end_draw(style, &frame);
            assert!(!r.state().cull);
            assert_eq!(r.state().depth_func, DepthFunc::Less);
            assert_eq!(r.state().model, None);
        }
    }

    #[test]
    fn hud_winding_is_the_opposite_rule() {
        let cfg = RenderConfig::default();
        let bank = fixtures::materials();
        let mut gpu = Recorder::default();
        let mut st = PipelineState::default();
        let mut r = ModelRenderer::new(&mut gpu, &mut st, &cfg, &bank, false);
        r.begin_draw_hud(RenderStyle::Translucent, Mat4::IDENTITY, false);
        assert!(r.state().cull);
        assert_eq!(r.state().front_face, FrontFace::Ccw);
        r.end_draw_hud(RenderStyle::Translucent);
        assert!(!r.state().cull);

        r.begin_draw_hud(RenderStyle::Normal, Mat4::IDENTITY, true);
        assert!(!r.state().cull);
    }

    #[test]
    fn world_transform_places_model_at_actor() {
        let cfg = RenderConfig::default();
        let bank = fixtures::materials();
        let mut gpu = Recorder::default();
        let mut st = PipelineState::default();
        let r = ModelRenderer::new(&mut gpu, &mut st, &cfg, &bank, false);
        let actor = fixtures::imp(1, glam::vec2(100.0, 200.0));
        let (m, mirrored) = r.compute_world_transform(&actor, &smf(ModelFlags::empty()), 1.0);
        assert!(!mirrored);
        let origin = m.transform_point3(Vec3::ZERO);
        assert!((origin - Vec3::new(100.0, 0.0, 200.0)).length() < 1e-3);

        let flipped = SpriteModelFrame {
            scale: Vec3::new(-1.0, 1.0, 1.0),
            ..smf(ModelFlags::empty())
        };
        assert!(r.compute_world_transform(&actor, &flipped, 1.0).1);
    }

    #[test]
    fn stereo_hud_uses_vr_weapon_pose() {
        let cfg = RenderConfig::default();
        let bank = fixtures::materials();
        let mut gpu = Recorder::default();
        let mut st = PipelineState::default();
        st.alpha_threshold = 0.0;
        st.normal_view = Mat4::from_scale(Vec3::splat(3.0));
        let mut rig = StereoRig::new(&StereoConfig {
            mode: StereoMode::Vr,
            ..StereoConfig::default()
        });
        rig.weapon_pose = Some(Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0)));

        let player = fixtures::imp(1, glam::vec2(0.0, 0.0));
        let mut r = ModelRenderer::new(&mut gpu, &mut st, &cfg, &bank, false);
        let (m, _) =
            r.compute_hud_transform(&rig, &player, &smf(ModelFlags::empty()), 0.0, WEAPONTOP, 0.0);
        // pose * scale(0.01) * translate(0, 5, 30)
        let origin = m.transform_point3(Vec3::ZERO);
        assert!((origin - Vec3::new(1.0, 2.05, 3.3)).length() < 1e-4, "{origin:?}");
        assert_eq!(r.state().alpha_threshold, cfg.mask_sprite_threshold);
        assert_eq!(r.state().normal_view, Mat4::IDENTITY);
        assert_eq!(r.state().model, Some(m));
    }

    #[test]
    fn stereo_hud_model_restores_normal_view_and_threshold() {
        let cfg = RenderConfig::default();
        let bank = fixtures::materials();
        let mut models = ModelBank::default();
        let id = models.insert(Model::boxes("GUN", &[Vec3::ONE]));
        let weapon = HudWeapon {
            sprite: fixtures::IMP,
            model: Some(ActorModel {
                frame: SpriteModelFrame {
                    model: id,
                    ..smf(ModelFlags::empty())
                },
                anim: ModelFrame::default(),
            }),
            ofs_x: 0.0,
            ofs_y: WEAPONTOP,
        };
        let rig = StereoRig::new(&StereoConfig {
            mode: StereoMode::Vr,
            ..StereoConfig::default()
        });
        let normal = Mat4::from_scale(Vec3::splat(3.0));
        let mut gpu = Recorder::default();
        let mut st = PipelineState::default();
        st.normal_view = normal;
        st.alpha_threshold = 0.25;

        let player = fixtures::imp(1, glam::vec2(0.0, 0.0));
        let drawn = ModelRenderer::new(&mut gpu, &mut st, &cfg, &bank, false)
            .render_hud_model(&mut models, &rig, &player, &weapon, 0.0);
        assert!(drawn);

        let draw = gpu.draws().next().unwrap();
        assert_eq!(draw.state.normal_view, Mat4::IDENTITY);
        assert_eq!(draw.state.alpha_threshold, cfg.mask_sprite_threshold);
        assert_eq!(st.normal_view, normal);
        assert_eq!(st.alpha_threshold, 0.25);
        assert_eq!(st.model, None);
    }

    #[test]
    fn mono_hud_starts_from_inverse_view() {
        let cfg = RenderConfig::default();
        let bank = fixtures::materials();
        let mut gpu = Recorder::default();
        let mut st = PipelineState::default();
        st.view = Mat4::from_translation(Vec3::new(-10.0, 0.0, 0.0));
        let mut r = ModelRenderer::new(&mut gpu, &mut st, &cfg, &bank, false);
        let player = fixtures::imp(1, glam::vec2(0.0, 0.0));
        let (m, _) =
            r.compute_hud_transform(&StereoRig::mono(), &player, &smf(ModelFlags::empty()), 0.0, WEAPONTOP, 0.0);
        assert!((m.transform_point3(Vec3::ZERO) - Vec3::new(10.0, 0.0, 0.0)).length() < 1e-4);
        assert_eq!(r.state().model, None);
    }

    #[test]
    fn render_model_draws_indexed_frames() {
        let cfg = RenderConfig::default();
        let bank = fixtures::materials();
        let mut models = ModelBank::default();
        let id = models.insert(Model::boxes("CUBE", &[Vec3::ONE, Vec3::splat(2.0)]));
        let mut actor = fixtures::imp(1, glam::vec2(0.0, 0.0));
        actor.model = Some(ActorModel {
            frame: SpriteModelFrame {
                model: id,
                ..smf(ModelFlags::empty())
            },
            anim: ModelFrame {
                frame1: 0,
                frame2: 1,
                inter: 0.5,
            },
        });

        let mut gpu = Recorder::default();
        let mut st = PipelineState::default();
        ModelRenderer::new(&mut gpu, &mut st, &cfg, &bank, false).render_model(&mut models, &actor, 1.0);

        let draws: Vec<_> = gpu.draws().collect();
        assert_eq!(draws.len(), 1);
        assert_eq!(draws[0].cmd, DrawCommand::Elements { count: 36, byte_offset: 0 });
        assert_eq!(draws[0].state.interpolation, 0.5);
        assert_eq!(draws[0].state.layout.position2, 24 * 24);
        assert_eq!(draws[0].state.material.unwrap().id, fixtures::IMP);
        assert!(st.is_standard());
        assert_eq!(st.vertex_source, VertexSource::Scene);
    }

    #[test]
    fn legacy_device_draws_every_indexed_triangle() {
        let cfg = RenderConfig::default();
        let bank = fixtures::materials();
        let mut models = ModelBank::default();
        let id = models.insert(Model::boxes("CUBE", &[Vec3::ONE]));
        let mut actor = fixtures::imp(1, glam::vec2(0.0, 0.0));
        actor.model = Some(ActorModel {
            frame: SpriteModelFrame {
                model: id,
                ..smf(ModelFlags::empty())
            },
            anim: ModelFrame::default(),
        });

        let mut gpu = Recorder::legacy();
        let mut st = PipelineState::default();
        ModelRenderer::new(&mut gpu, &mut st, &cfg, &bank, false).render_model(&mut models, &actor, 1.0);

        let cmds: Vec<_> = gpu.draws().map(|d| d.cmd.clone()).collect();
        assert_eq!(cmds, [DrawCommand::Arrays { start: 0, count: 36 }]);
    }

    #[test]
    fn legacy_blend_runs_over_de_indexed_frames() {
        let cfg = RenderConfig::default();
        let bank = fixtures::materials();
        let mut models = ModelBank::default();
        let id = models.insert(Model::boxes("CUBE", &[Vec3::ONE, Vec3::splat(3.0)]));
        let mut actor = fixtures::imp(1, glam::vec2(0.0, 0.0));
        actor.model = Some(ActorModel {
            frame: SpriteModelFrame {
                model: id,
                ..smf(ModelFlags::empty())
            },
            anim: ModelFrame {
                frame1: 0,
                frame2: 1,
                inter: 0.5,
            },
        });

        let mut gpu = Recorder::legacy();
        let mut st = PipelineState::default();
        ModelRenderer::new(&mut gpu, &mut st, &cfg, &bank, false).render_model(&mut models, &actor, 1.0);

        let cmds: Vec<_> = gpu.draws().map(|d| d.cmd.clone()).collect();
        assert_eq!(cmds, [DrawCommand::Arrays { start: 0, count: 36 }]);
        let model = models.get(id).unwrap();
        let blended = model.buffer().unwrap().blended();
        assert_eq!(blended.len(), 36);
        // halfway between half-extents 0.5 and 1.5
        assert_eq!(blended[0].pos[0], 1.0);
    }

    #[test]
    fn light_index_follows_config() {
        let mut cfg = RenderConfig::default();
        let bank = fixtures::materials();
        let mut gpu = Recorder::default();
        let mut st = PipelineState::default();
        {
            let mut r = ModelRenderer::new(&mut gpu, &mut st, &cfg, &bank, false);
            r.set_light_index(4);
            r.set_material(9999, true, 0);
            assert_eq!(r.state().light_index, 4);
            assert_eq!(r.state().material.unwrap().id, 0);
        }
        cfg.light_models = false;
        let mut r = ModelRenderer::new(&mut gpu, &mut st, &cfg, &bank, false);
        r.set_light_index(4);
        r.set_material(fixtures::IMP, false, 0);
        assert_eq!(r.state().light_index, -1);
    }
}
