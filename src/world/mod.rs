mod actor;
mod bsp;
mod geometry;
mod material;
mod viewpoint;

#[cfg(test)]
pub(crate) mod fixtures;

pub use geometry::{
    Aabb, Decal, Level, Linedef, LinedefFlags, LinedefId, Node, PolyobjId, Polyobj, PortalDef,
    PortalId, PortalKind, Sector, SectorId, Seg, SegmentId, Sidedef, SidedefId, Subsector,
    SKY_DOME, SubsectorFlags, SubsectorId, Vertex, VertexId,
};

pub use bsp::{CHILD_MASK, SUBSECTOR_BIT};

pub use actor::{Actor, ActorId, ActorModel, RenderStyle};

pub use viewpoint::{ClipLine, Viewpoint};

pub use material::{Material, MaterialBank, MaterialError, MaterialId, NO_MATERIAL, Surface};
