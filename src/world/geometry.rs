use std::ops::Range;

use bitflags::bitflags;
use glam::{Vec2, Vec3};

use crate::world::material::MaterialId;

pub type SubsectorId = u16;
pub type LinedefId = u16;
pub type SegmentId = u16;
pub type VertexId = u16;
pub type SidedefId = u16;
pub type SectorId = u16;
pub type PortalId = u16;

/// Portal id of the plain sky backdrop; never an index into `Level::portals`.
pub const SKY_DOME: PortalId = PortalId::MAX;
pub type PolyobjId = u16;

/// Runtime snapshot of one map (immutable after load).
///
/// The renderer only reads it. Structural validity (every index in range,
/// every seg of a subsector owning a front sidedef) is a precondition.
#[derive(Debug, Default)]
pub struct Level {
    pub name: String,
    pub linedefs: Vec<Linedef>,
    pub sidedefs: Vec<Sidedef>,
    pub vertices: Vec<Vertex>,
    pub segs: Vec<Seg>,
    pub subsectors: Vec<Subsector>,
    pub nodes: Vec<Node>,
    pub sectors: Vec<Sector>,
    pub portals: Vec<PortalDef>,
    pub polyobjs: Vec<Polyobj>,
    /// Skybox shown by sky planes that have no portal of their own.
    pub default_skybox: Option<PortalId>,
    /// At least one dynamic light is active somewhere in the map.
    pub has_dynamic_lights: bool,
}

/*--------------------------- linedefs -------------------------------*/

bitflags! {
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct LinedefFlags: u16 {
        const IMPASSABLE      = 0x0001;
        const BLOCK_MONSTERS  = 0x0002;
        const TWO_SIDED       = 0x0004;
        const UPPER_UNPEGGED  = 0x0010;
        const LOWER_UNPEGGED  = 0x0020;
        const SECRET          = 0x0040;
        const BLOCK_SOUND     = 0x0080;
        const NOT_ON_MAP      = 0x0200;
        const ALREADY_ON_MAP  = 0x1000; // editor flag
    }
}

#[derive(Clone, Debug)]
pub struct Linedef {
    pub v1: VertexId,
    pub v2: VertexId,
    pub flags: LinedefFlags,
    /// 1.0 = opaque; anything lower sends the mid texture to the translucent list.
    pub alpha: f32,
    pub portal: Option<PortalId>,
    pub right_sidedef: Option<SidedefId>,
    pub left_sidedef: Option<SidedefId>,
}

/*--------------------------- sidedefs -------------------------------*/

#[derive(Clone, Debug)]
pub struct Sidedef {
    pub x_off: f32,
    pub y_off: f32,
    pub upper: MaterialId,
    pub lower: MaterialId,
    pub middle: MaterialId,
    pub sector: SectorId,
    pub decals: Vec<Decal>,
}

/// A decal glued to one side of a wall.
#[derive(Clone, Debug, PartialEq)]
pub struct Decal {
    pub material: MaterialId,
    /// Distance along the side from its first vertex.
    pub along: f32,
    pub z: f32,
    pub alpha: f32,
}

/*----------------------- simple primitives --------------------------*/

#[derive(Clone, Copy, Debug)]
pub struct Vertex {
    pub pos: Vec2,
}

#[derive(Clone, Debug)]
pub struct Seg {
    pub v1: VertexId,
    pub v2: VertexId,
    /// `None` for minisegs produced by the node builder.
    pub linedef: Option<LinedefId>,
    pub dir: u16,
    pub offset: f32,
    /// Subsector on the other side of this seg, if any.
    pub back_subsector: Option<SubsectorId>,
}

bitflags! {
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct SubsectorFlags: u8 {
        /// Open subsector used by deep-water / fake floor map hacks.
        const HACKED   = 0x01;
        /// Origin subsector of a polyobject, never rendered itself.
        const POLY_ORG = 0x02;
    }
}

#[derive(Clone, Debug)]
pub struct Subsector {
    pub seg_count: u16,
    pub first_seg: SegmentId,
    pub sector: SectorId,
    pub flags: SubsectorFlags,
}

#[derive(Clone, Debug)]
pub struct Aabb {
    pub min: Vec2,
    pub max: Vec2,
}

#[derive(Clone, Debug)]
pub struct Node {
    pub x: f32,
    pub y: f32,
    pub dx: f32,
    pub dy: f32,
    pub bbox: [Aabb; 2],
    pub child: [u16; 2],
}

#[derive(Clone, Debug)]
pub struct Sector {
    pub floor_h: f32,
    pub ceil_h: f32,
    pub floor_tex: MaterialId,
    pub ceil_tex: MaterialId,
    pub light: f32,
    pub floor_portal: Option<PortalId>,
    pub ceil_portal: Option<PortalId>,
}

/*---------------------------- portals -------------------------------*/

#[derive(Clone, Debug, PartialEq)]
pub enum PortalKind {
    /// The line itself reflects the scene.
    Mirror { line: LinedefId },
    /// Looking through `line` shows the space behind `target`.
    Linked { line: LinedefId, target: LinedefId },
    /// Sky planes show the world from a fixed origin.
    Skybox { origin: Vec3 },
    /// Floor/ceiling of stacked sectors, offset by `displacement`.
    SectorStack { displacement: Vec2 },
}

#[derive(Clone, Debug)]
pub struct PortalDef {
    pub kind: PortalKind,
}

/// A movable group of segs that is re-linked to its subsector every frame.
#[derive(Clone, Debug)]
pub struct Polyobj {
    pub segs: Vec<SegmentId>,
    pub center: Vec2,
}

/*--------------------------- lookups --------------------------------*/

impl Level {
    /// Seg index range owned by a subsector.
    #[inline]
    pub fn segs_of_subsector(&self, ss: SubsectorId) -> Range<SegmentId> {
        let ss = &self.subsectors[ss as usize];
        ss.first_seg..ss.first_seg + ss.seg_count
    }

    #[inline]
    pub fn seg_vertices(&self, seg: &Seg) -> (Vec2, Vec2) {
        (
            self.vertices[seg.v1 as usize].pos,
            self.vertices[seg.v2 as usize].pos,
        )
    }

    /// Front sidedef, back sector (if the line is two-sided) and the linedef.
    ///
    /// Panics on minisegs and dangling references: callers only pass segs
    /// that carry a linedef.
    pub fn seg_sides(&self, seg: &Seg) -> (&Sidedef, Option<&Sector>, &Linedef) {
        let ld = &self.linedefs[seg.linedef.expect("seg_sides on a miniseg") as usize];
        let (front_idx, back_idx) = if seg.dir == 0 {
            (ld.right_sidedef, ld.left_sidedef)
        } else {
            (ld.left_sidedef, ld.right_sidedef)
        };
        let front = &self.sidedefs[front_idx.expect("seg must have a front sidedef") as usize];
        let back = back_idx.map(|i| &self.sectors[self.sidedefs[i as usize].sector as usize]);
        (front, back, ld)
    }

    #[inline]
    pub fn linedef_vertices(&self, ld: LinedefId) -> (Vec2, Vec2) {
        let ld = &self.linedefs[ld as usize];
        (
            self.vertices[ld.v1 as usize].pos,
            self.vertices[ld.v2 as usize].pos,
        )
    }
}
