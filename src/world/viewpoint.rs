use glam::{Vec2, Vec3};

use crate::world::{
    actor::{Actor, ActorId},
    geometry::{Level, SectorId},
};

/// Eye of one rendered view in world space.
///
/// * `pos` is absolute: (x, y) = map units, z = eye altitude.
/// * Angles are radians; yaw 0 = east, counter-clockwise positive.
/// * Built once per eye per frame and not mutated while that eye renders,
///   apart from the scoped stereo shift.
#[derive(Clone, Debug, PartialEq)]
pub struct Viewpoint {
    pub pos: Vec3,
    pub yaw: f32,
    pub pitch: f32,
    pub roll: f32,
    /// Horizontal FoV.
    pub fov: f32,
    pub tic_frac: f32,
    /// Weak reference to the actor we look through; never mutated.
    pub camera: Option<ActorId>,
    pub sector: SectorId,
    /// An odd number of mirrors lies between the player and this view.
    pub mirror: bool,
    pub plane_mirror: bool,
    /// Set for portal sub-views: geometry on the viewer's side of this line
    /// belongs to the wrong space and is skipped.
    pub clip_line: Option<ClipLine>,
}

impl Viewpoint {
    pub fn new(pos: Vec3, yaw: f32, fov: f32) -> Self {
        Self {
            pos,
            yaw,
            pitch: 0.0,
            roll: 0.0,
            fov,
            tic_frac: 1.0,
            camera: None,
            sector: 0,
            mirror: false,
            plane_mirror: false,
            clip_line: None,
        }
    }

    /// Frame set-up from the camera actor: interpolated position at
    /// `tic_frac`, eye height and angles.
    pub fn from_actor(level: &Level, actor: &Actor, tic_frac: f32, fov: f32) -> Self {
        let pos = actor.interpolated_position(tic_frac) + Vec3::Z * actor.view_height;
        Self {
            pos,
            yaw: actor.interpolated_yaw(tic_frac),
            pitch: actor.pitch,
            roll: actor.roll,
            fov,
            tic_frac,
            camera: Some(actor.id),
            sector: level.sector_at(pos.truncate()),
            mirror: false,
            plane_mirror: false,
            clip_line: None,
        }
    }

    /// Angles in the renderer's axis convention, in degrees:
    /// (yaw, pitch, roll) with yaw measured as `270 - yaw`.
    pub fn hw_angles(&self) -> (f32, f32, f32) {
        (
            270.0 - self.yaw.to_degrees(),
            self.pitch.to_degrees(),
            self.roll.to_degrees(),
        )
    }
}

/// Portal line seen from a sub-view.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClipLine {
    pub a: Vec2,
    pub b: Vec2,
    viewer_side: bool,
}

impl ClipLine {
    pub fn new(a: Vec2, b: Vec2, viewer: Vec2) -> Self {
        let mut line = Self {
            a,
            b,
            viewer_side: false,
        };
        line.viewer_side = line.side(viewer) > 0.0;
        line
    }

    #[inline]
    fn side(&self, p: Vec2) -> f32 {
        (self.b - self.a).perp_dot(p - self.a)
    }

    /// True when `p` lies strictly on the viewer's side.
    #[inline]
    pub fn clips(&self, p: Vec2) -> bool {
        let s = self.side(p);
        if s.abs() < 1e-3 {
            return false;
        }
        (s > 0.0) == self.viewer_side
    }

    /// True when `p` lies strictly on the far side.
    #[inline]
    pub fn beyond(&self, p: Vec2) -> bool {
        let s = self.side(p);
        s.abs() >= 1e-3 && (s > 0.0) != self.viewer_side
    }
}

/*====================================================================*/
/*                                Tests                                */
/*====================================================================*/
