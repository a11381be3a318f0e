//! Portals seen during one scene build and the views behind them.

use std::{collections::HashSet, f32::consts::PI};

use glam::{Vec2, Vec3};
use smallvec::SmallVec;

use crate::world::{
    ClipLine, Level, LinedefId, PortalId, PortalKind, SegmentId, SubsectorId, Viewpoint,
};

/// A piece of geometry covering part of a portal on screen.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FootprintPart {
    Seg(SegmentId),
    Plane {
        subsector: SubsectorId,
        ceiling: bool,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct PortalEntry {
    pub id: PortalId,
    pub footprint: SmallVec<[FootprintPart; 8]>,
}

/// Portals discovered by one scene build, in discovery order.
#[derive(Clone, Debug, Default)]
pub struct PortalRegistry {
    entries: Vec<PortalEntry>,
}

impl PortalRegistry {
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Add `part` to the footprint of `id`, creating the entry on first sight.
    pub fn register(&mut self, id: PortalId, part: FootprintPart) {
        match self.entries.iter_mut().find(|e| e.id == id) {
            Some(e) => {
                if !e.footprint.contains(&part) {
                    e.footprint.push(part);
                }
            }
            None => self.entries.push(PortalEntry {
                id,
                footprint: SmallVec::from_elem(part, 1),
            }),
        }
    }

    pub fn get(&self, id: PortalId) -> Option<&PortalEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn entries(&self) -> &[PortalEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Portals already rendered in the current frame.
#[derive(Debug, Default)]
pub struct ProcessedPortals {
    done: HashSet<PortalId>,
}

impl ProcessedPortals {
    pub fn reset(&mut self) {
        self.done.clear();
    }

    /// Claim `id` for rendering. `false` if it was already done this frame.
    pub fn claim(&mut self, id: PortalId) -> bool {
        self.done.insert(id)
    }

    pub fn contains(&self, id: PortalId) -> bool {
        self.done.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.done.len()
    }

    pub fn is_empty(&self) -> bool {
        self.done.is_empty()
    }
}

/// Viewpoint on the far side of portal `id`.
pub fn sub_viewpoint(level: &Level, id: PortalId, vp: &Viewpoint) -> Viewpoint {
    let mut out = vp.clone();
    match level.portals[id as usize].kind {
        PortalKind::Mirror { line } => {
            let (a, b) = level.linedef_vertices(line);
            let p = reflect(vp.pos.truncate(), a, b);
            let line_angle = (b - a).to_angle();
            out.pos = p.extend(vp.pos.z);
            out.yaw = (2.0 * line_angle - vp.yaw).rem_euclid(2.0 * PI);
            out.mirror = !vp.mirror;
            out.clip_line = Some(ClipLine::new(a, b, p));
        }
        PortalKind::Linked { line, target } => {
            let (p, rot) = through_line(level, line, target, vp.pos.truncate());
            out.pos = p.extend(vp.pos.z);
            out.yaw = (vp.yaw + rot).rem_euclid(2.0 * PI);
            let (c, d) = level.linedef_vertices(target);
            out.clip_line = Some(ClipLine::new(c, d, p));
        }
        PortalKind::Skybox { origin } => {
            out.pos = origin;
            out.clip_line = None;
        }
        PortalKind::SectorStack { displacement } => {
            out.pos = vp.pos + Vec3::new(displacement.x, displacement.y, 0.0);
            out.clip_line = None;
        }
    }
    out.sector = level.sector_at(out.pos.truncate());
    out
}

/// Mirror `p` across the infinite line through `a` and `b`.
fn reflect(p: Vec2, a: Vec2, b: Vec2) -> Vec2 {
    let dir = (b - a).normalize_or_zero();
    let rel = p - a;
    let along = dir * rel.dot(dir);
    a + along * 2.0 - rel
}

/// Carry `p` from the space in front of `line` to the space behind
/// `target`. Returns the new point and the rotation applied.
fn through_line(level: &Level, line: LinedefId, target: LinedefId, p: Vec2) -> (Vec2, f32) {
    let (a, b) = level.linedef_vertices(line);
    let (c, d) = level.linedef_vertices(target);
    // The exit line faces the opposite way, hence the extra half turn.
    let rot = (d - c).to_angle() - (b - a).to_angle() + PI;
    let rel = Vec2::from_angle(rot).rotate(p - (a + b) * 0.5);
    ((c + d) * 0.5 + rel, rot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::{PortalDef, fixtures};
    use glam::vec2;

    #[test]
    fn register_merges_footprints() {
        let mut reg = PortalRegistry::default();
        reg.register(3, FootprintPart::Seg(1));
        reg.register(3, FootprintPart::Seg(2));
        reg.register(3, FootprintPart::Seg(1));
        reg.register(0, FootprintPart::Seg(7));
        assert_eq!(reg.len(), 2);
        assert_eq!(reg.get(3).unwrap().footprint.len(), 2);
        assert_eq!(reg.entries()[1].id, 0);
    }

    #[test]
    fn each_portal_is_claimed_once() {
        let mut done = ProcessedPortals::default();
        assert!(done.claim(4));
        assert!(!done.claim(4));
        done.reset();
        assert!(done.claim(4));
    }

    #[test]
    fn mirror_reflects_position_and_yaw() {
        let mut lvl = fixtures::two_rooms();
        // room B's east wall at x = 256
        lvl.portals.push(PortalDef {
            kind: PortalKind::Mirror { line: 5 },
        });
        let vp = fixtures::viewpoint(&lvl, Vec3::new(200.0, 64.0, 41.0), 0.0);
        let sub = sub_viewpoint(&lvl, 0, &vp);
        assert!((sub.pos.truncate() - vec2(312.0, 64.0)).length() < 1e-3);
        // looking east → looking west
        assert!((sub.yaw - PI).abs() < 1e-4);
        assert!(sub.mirror);
        let clip = sub.clip_line.unwrap();
        assert!(clip.clips(vec2(300.0, 64.0)));
        assert!(!clip.clips(vec2(200.0, 64.0)));
    }

    #[test]
    fn linked_portal_keeps_relative_offset() {
        let mut lvl = fixtures::two_rooms();
        // Walking east into A's shared line pops out of B's east wall heading
        // west.
        lvl.portals.push(PortalDef {
            kind: PortalKind::Linked { line: 2, target: 5 },
        });
        let vp = fixtures::viewpoint(&lvl, Vec3::new(100.0, 64.0, 41.0), 0.0);
        let sub = sub_viewpoint(&lvl, 0, &vp);
        // 28 units in front of the entry line → 28 units behind the exit.
        assert!((sub.pos.truncate() - vec2(284.0, 64.0)).length() < 1e-3);
        assert!((sub.yaw - PI).abs() < 1e-4);
        assert!(!sub.mirror);
    }

    #[test]
    fn skybox_moves_to_origin() {
        let mut lvl = fixtures::two_rooms();
        lvl.portals.push(PortalDef {
            kind: PortalKind::Skybox {
                origin: Vec3::new(64.0, 64.0, 10.0),
            },
        });
        let vp = fixtures::viewpoint(&lvl, Vec3::new(200.0, 64.0, 41.0), 1.0);
        let sub = sub_viewpoint(&lvl, 0, &vp);
        assert_eq!(sub.pos, Vec3::new(64.0, 64.0, 10.0));
        assert_eq!(sub.sector, 0);
        assert_eq!(sub.yaw, 1.0);
    }
}
