//! Hardware scene path: BSP walk, draw lists, passes and the drawer that
//! ties them to portals and stereo eyes.

use crate::{
    models::HudWeapon,
    world::{Actor, Level, MaterialBank, Viewpoint},
};

pub mod builder;
pub mod clipper;
pub mod drawer;
pub mod drawlist;
pub mod passes;
pub mod portal;

pub use builder::{SceneBuilder, SceneFrame};
pub use drawer::{DrawMode, SceneDrawer};
pub use drawlist::{DrawItem, DrawList, DrawListKind, DrawLists, Primitive, WallPart};
pub use portal::{PortalRegistry, ProcessedPortals};

/// The world as one frame sees it. Borrowed, never mutated by rendering.
#[derive(Clone, Copy)]
pub struct Scene<'a> {
    pub level: &'a Level,
    pub actors: &'a [Actor],
    pub materials: &'a MaterialBank,
    /// What the viewing player holds, if anything.
    pub weapon: Option<&'a HudWeapon>,
    /// Every surface at full brightness; no dynamic light pre-pass.
    pub fullbright: bool,
}

impl<'a> Scene<'a> {
    pub fn new(level: &'a Level, actors: &'a [Actor], materials: &'a MaterialBank) -> Self {
        Self {
            level,
            actors,
            materials,
            weapon: None,
            fullbright: false,
        }
    }

    pub fn with_weapon(mut self, weapon: &'a HudWeapon) -> Self {
        self.weapon = Some(weapon);
        self
    }

    /// The actor the view is attached to.
    pub fn camera(&self, vp: &Viewpoint) -> Option<&'a Actor> {
        let id = vp.camera?;
        self.actors.iter().find(|a| a.id == id)
    }
}
