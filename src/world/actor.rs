use std::f32::consts::{PI, TAU};

use glam::Vec3;

use crate::{
    models::{ModelFrame, SpriteModelFrame},
    world::material::{MaterialId, NO_MATERIAL},
};

pub type ActorId = u32;

/// Legacy render styles that matter to the renderer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RenderStyle {
    #[default]
    Normal,
    Translucent,
    Add,
    Fuzzy,
    /// Not drawn at all.
    None,
}

/// Model attached to an actor for the current tic.
#[derive(Clone, Debug, PartialEq)]
pub struct ActorModel {
    pub frame: SpriteModelFrame,
    pub anim: ModelFrame,
}

/// Read-only snapshot of a game actor as the simulation left it.
///
/// The renderer never writes to actors; it only interpolates between
/// `prev_*` and current values.
#[derive(Clone, Debug, PartialEq)]
pub struct Actor {
    pub id: ActorId,
    pub pos: Vec3,
    pub prev_pos: Vec3,
    pub yaw: f32,
    pub prev_yaw: f32,
    pub pitch: f32,
    pub roll: f32,
    pub view_height: f32,
    pub height: f32,
    pub render_style: RenderStyle,
    pub alpha: f32,
    pub sprite: MaterialId,
    pub translation: u32,
    pub model: Option<ActorModel>,
}

impl Default for Actor {
    fn default() -> Self {
        Self {
            id: 0,
            pos: Vec3::ZERO,
            prev_pos: Vec3::ZERO,
            yaw: 0.0,
            prev_yaw: 0.0,
            pitch: 0.0,
            roll: 0.0,
            view_height: 41.0,
            height: 56.0,
            render_style: RenderStyle::Normal,
            alpha: 1.0,
            sprite: NO_MATERIAL,
            translation: 0,
            model: None,
        }
    }
}

impl Actor {
    #[inline]
    pub fn interpolated_position(&self, frac: f32) -> Vec3 {
        self.prev_pos.lerp(self.pos, frac)
    }

    /// Yaw interpolated along the shortest arc.
    pub fn interpolated_yaw(&self, frac: f32) -> f32 {
        let mut delta = (self.yaw - self.prev_yaw).rem_euclid(TAU);
        if delta > PI {
            delta -= TAU;
        }
        (self.prev_yaw + delta * frac).rem_euclid(TAU)
    }

    /// Needs blending: anything but an opaque normal style.
    #[inline]
    pub fn is_translucent(&self) -> bool {
        self.render_style != RenderStyle::Normal || self.alpha < 1.0
    }

    #[inline]
    pub fn is_visible(&self) -> bool {
        self.render_style != RenderStyle::None && self.alpha > 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yaw_interpolates_across_the_seam() {
        let a = Actor {
            prev_yaw: TAU - 0.1,
            yaw: 0.1,
            ..Actor::default()
        };
        let mid = a.interpolated_yaw(0.5);
        assert!(mid < 1e-4 || (TAU - mid) < 1e-4, "got {mid}");
    }

    #[test]
    fn style_decides_translucency() {
        let mut a = Actor::default();
        assert!(!a.is_translucent());
        a.render_style = RenderStyle::Add;
        assert!(a.is_translucent());
        a.render_style = RenderStyle::Normal;
        a.alpha = 0.5;
        assert!(a.is_translucent());
    }
}
