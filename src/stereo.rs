//! Stereo 3D: how many eyes a frame has, their projections and the
//! temporary positional shift of the viewpoint for each one.

use std::ops::{Deref, DerefMut};

use glam::{Mat4, Vec3, Vec4};
use serde::{Deserialize, Serialize};
use smallvec::{SmallVec, smallvec};

use crate::{config::StereoConfig, renderer::IntRect, world::Viewpoint};

pub const Z_NEAR: f32 = 5.0;
pub const Z_FAR: f32 = 65536.0;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StereoMode {
    #[default]
    Mono,
    SideBySide,
    TopBottom,
    Anaglyph,
    /// Head-mounted display; player sprites are drawn inside the scene.
    Vr,
}

/// One eye: a signed lateral offset in meters (negative = left).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EyePose {
    pub shift: f32,
}

impl EyePose {
    pub const CENTER: EyePose = EyePose { shift: 0.0 };

    /// Projection for this eye. `fov` is the horizontal field of view in
    /// degrees as the game sees it; `fov_ratio` maps it to the vertical one.
    pub fn projection(&self, fov: f32, ratio: f32, fov_ratio: f32, screen_distance: f32) -> Mat4 {
        if self.shift == 0.0 {
            return perspective(fov, ratio, fov_ratio);
        }
        // Asymmetric frustum: the eye looks at a shared screen plane.
        let frustum_shift = Z_NEAR * self.shift / screen_distance;
        let fh = Z_NEAR * (fov.to_radians() * 0.5).tan() / fov_ratio;
        let fw = fh * ratio;
        frustum(-fw - frustum_shift, fw - frustum_shift, -fh, fh, Z_NEAR, Z_FAR)
    }

    /// World-space offset of this eye for a view looking along the
    /// renderer yaw `hw_yaw` (degrees).
    pub fn view_shift(&self, hw_yaw: f32, units_per_meter: f32) -> Vec3 {
        if self.shift == 0.0 {
            return Vec3::ZERO;
        }
        let (s, c) = hw_yaw.to_radians().sin_cos();
        Vec3::new(
            -c * units_per_meter * self.shift,
            s * units_per_meter * self.shift,
            0.0,
        )
    }
}

/// Plain perspective used by the single-eye path.
pub fn perspective(fov: f32, ratio: f32, fov_ratio: f32) -> Mat4 {
    let fovy = 2.0 * ((fov.to_radians() * 0.5).tan() / fov_ratio).atan();
    Mat4::perspective_rh_gl(fovy, ratio, Z_NEAR, Z_FAR)
}

/// `glFrustum`.
fn frustum(l: f32, r: f32, b: f32, t: f32, n: f32, f: f32) -> Mat4 {
    Mat4::from_cols(
        Vec4::new(2.0 * n / (r - l), 0.0, 0.0, 0.0),
        Vec4::new(0.0, 2.0 * n / (t - b), 0.0, 0.0),
        Vec4::new(
            (r + l) / (r - l),
            (t + b) / (t - b),
            -(f + n) / (f - n),
            -1.0,
        ),
        Vec4::new(0.0, 0.0, -2.0 * f * n / (f - n), 0.0),
    )
}

/// The active stereo configuration for one frame.
#[derive(Clone, Debug)]
pub struct StereoRig {
    pub mode: StereoMode,
    eyes: SmallVec<[EyePose; 2]>,
    pub units_per_meter: f32,
    pub screen_distance: f32,
    /// Controller pose reported by a VR runtime, if one is attached.
    pub weapon_pose: Option<Mat4>,
}

impl StereoRig {
    pub fn new(cfg: &StereoConfig) -> Self {
        let half = cfg.eye_separation * 0.5;
        let eyes = match cfg.mode {
            StereoMode::Mono => smallvec![EyePose::CENTER],
            _ => smallvec![EyePose { shift: -half }, EyePose { shift: half }],
        };
        Self {
            mode: cfg.mode,
            eyes,
            units_per_meter: cfg.units_per_meter,
            screen_distance: cfg.screen_distance,
            weapon_pose: None,
        }
    }

    pub fn mono() -> Self {
        Self::new(&StereoConfig::default())
    }

    #[inline]
    pub fn eye_count(&self) -> usize {
        self.eyes.len()
    }

    #[inline]
    pub fn eye(&self, i: usize) -> &EyePose {
        &self.eyes[i]
    }

    #[inline]
    pub fn is_mono(&self) -> bool {
        self.mode == StereoMode::Mono
    }

    /// Weapon placement supplied by the mode; only VR has one.
    pub fn weapon_transform(&self) -> Option<Mat4> {
        match self.mode {
            StereoMode::Vr => self.weapon_pose,
            _ => None,
        }
    }

    pub fn render_player_sprites_in_scene(&self) -> bool {
        self.mode == StereoMode::Vr
    }

    /// Part of `bounds` that eye `eye` renders into.
    pub fn eye_viewport(&self, bounds: IntRect, eye: usize) -> IntRect {
        match self.mode {
            StereoMode::SideBySide => {
                let w = bounds.w / 2;
                IntRect {
                    x: bounds.x + (eye as u32 * w) as i32,
                    w,
                    ..bounds
                }
            }
            StereoMode::TopBottom => {
                let h = bounds.h / 2;
                // Left eye on top; GL rows grow upwards.
                IntRect {
                    y: bounds.y + ((1 - eye.min(1)) as u32 * h) as i32,
                    h,
                    ..bounds
                }
            }
            _ => bounds,
        }
    }
}

/// Scoped positional shift of a viewpoint. The original position comes
/// back when the guard drops.
pub struct ViewShift<'a> {
    vp: &'a mut Viewpoint,
    saved: Vec3,
}

impl<'a> ViewShift<'a> {
    pub fn new(vp: &'a mut Viewpoint, shift: Vec3) -> Self {
        let saved = vp.pos;
        vp.pos += shift;
        Self { vp, saved }
    }
}

impl Deref for ViewShift<'_> {
    type Target = Viewpoint;

    fn deref(&self) -> &Viewpoint {
        self.vp
    }
}

impl DerefMut for ViewShift<'_> {
    fn deref_mut(&mut self) -> &mut Viewpoint {
        self.vp
    }
}

impl Drop for ViewShift<'_> {
    fn drop(&mut self) {
        self.vp.pos = self.saved;
    }
}
