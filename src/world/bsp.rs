use crate::world::geometry::{Aabb, Level, Node, SectorId, SubsectorId};
use glam::Vec2;

pub const CHILD_MASK: u16 = 0x7FFF;

pub const SUBSECTOR_BIT: u16 = 0x8000;

// ──────────────────────────────────────────────────────────────────────────
//                       Level – public helpers
// ──────────────────────────────────────────────────────────────────────────
impl Level {
    /// Child handle of the BSP root.
    ///
    /// Doom stores the root last (`nodes.len()-1`). A map without nodes is a
    /// single subsector, so the root is that leaf.
    #[inline(always)]
    pub fn bsp_root(&self) -> u16 {
        if self.nodes.is_empty() {
            SUBSECTOR_BIT
        } else {
            (self.nodes.len() - 1) as u16
        }
    }

    /// Walk the BSP and return the subsector id containing `p`.
    pub fn locate_subsector(&self, p: Vec2) -> SubsectorId {
        let mut idx = self.bsp_root();
        loop {
            if idx & SUBSECTOR_BIT != 0 {
                return idx & CHILD_MASK;
            }
            let node = &self.nodes[idx as usize];
            idx = node.child[node.point_side(p) as usize];
        }
    }

    /// Sector under `p`.
    #[inline]
    pub fn sector_at(&self, p: Vec2) -> SectorId {
        self.subsectors[self.locate_subsector(p) as usize].sector
    }
}

// ──────────────────────────────────────────────────────────────────────────
//                       Node geometry helpers
// ──────────────────────────────────────────────────────────────────────────
impl Node {
    /// 0 = *front* of splitter, 1 = *back*.
    #[inline(always)]
    pub fn point_side(&self, p: Vec2) -> i32 {
        let d = (p.x - self.x) * self.dy - (p.y - self.y) * self.dx;
        if d >= 0.0 { 0 } else { 1 }
    }
}

impl Aabb {
    #[inline]
    pub fn contains(&self, p: Vec2) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    /// Corners in counter-clockwise order starting at `min`.
    #[inline]
    pub fn corners(&self) -> [Vec2; 4] {
        [
            self.min,
            Vec2::new(self.max.x, self.min.y),
            self.max,
            Vec2::new(self.min.x, self.max.y),
        ]
    }
}
