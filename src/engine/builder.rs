//! ----------------------------------------------------------------------------
//! **Scene builder**: BSP walk → draw lists
//!
//! Responsible for
//! * finding visible subsectors **front-to-back** with the angular clipper
//! * sorting every visible wall part, flat, sprite and model into its draw
//!   list, and registering the portals it runs into
//! * the three corrective passes that need the finished visibility set:
//!   missing upper/lower textures, hacked subsectors and sector stacks
//!
//! It deliberately **does not** issue any GPU command; the pass pipeline
//! consumes what this produces.
//! ----------------------------------------------------------------------------

use glam::{Vec2, Vec3};
use log::trace;
use smallvec::SmallVec;

use crate::{
    engine::{
        Scene,
        clipper::{ANG180, Bam, Clipper, bam_from_degrees, bam_from_radians, point_to_bam},
        drawlist::{DrawItem, DrawListKind, DrawLists, Primitive, WallPart},
        portal::{FootprintPart, PortalRegistry},
    },
    world::{
        Aabb, CHILD_MASK, Level, LinedefFlags, Material, MaterialId, NO_MATERIAL, PolyobjId,
        PortalId, PortalKind, SKY_DOME, SUBSECTOR_BIT, Sector, SegmentId, SubsectorFlags,
        SubsectorId, Surface, Viewpoint,
    },
};

/// Everything one scene build produced. Owned by the recursion level that
/// asked for it.
#[derive(Debug, Default)]
pub struct SceneFrame {
    pub lists: DrawLists,
    pub decals: Vec<DrawItem>,
    /// Back-sector flats flooded into gaps nobody else covers.
    pub gap_fill: Vec<DrawItem>,
    pub portals: PortalRegistry,
    pub visible_subsectors: usize,
}

/// A two-sided line whose upper or lower part has no texture.
#[derive(Clone, Copy, Debug)]
struct MissingTexture {
    subsector: SubsectorId,
    back: Option<SubsectorId>,
    upper: bool,
    z: f32,
}

/// Half width of the clipping frustum for a horizontal `fov` and `pitch`
/// (both degrees) at aspect `ratio`.
///
/// `None` when the view is tilted so far that nothing can be clipped.
pub fn frustum_angle(fov: f32, pitch: f32, ratio: f32) -> Option<Bam> {
    let tilt = pitch.abs();
    // Above this pitch a 90° view sees all the way round.
    if tilt > 46.0 {
        return None;
    }
    // 48 is the multiplier of a 4:3 screen; wider screens get less.
    let aspect_mult = 64.0 / ratio;
    let half = 2.0 + (45.0 + tilt / 1.9) * fov * (48.0 / aspect_mult) / 90.0;
    if half >= 180.0 {
        return None;
    }
    Some(bam_from_degrees(half))
}

fn list_for_wall(mat: &Material, alpha: f32, polyobj: bool, border: bool) -> DrawListKind {
    if mat.surface == Surface::Translucent || alpha < 1.0 {
        return if border {
            DrawListKind::TranslucentBorder
        } else {
            DrawListKind::Translucent
        };
    }
    match mat.surface {
        Surface::Masked if polyobj => DrawListKind::MaskedWallsOffset,
        Surface::Masked => DrawListKind::MaskedWalls,
        _ => DrawListKind::PlainWalls,
    }
}

fn list_for_flat(mat: &Material) -> DrawListKind {
    match mat.surface {
        Surface::Opaque => DrawListKind::PlainFlats,
        Surface::Masked => DrawListKind::MaskedFlats,
        Surface::Translucent => DrawListKind::Translucent,
    }
}

#[derive(Default)]
pub struct SceneBuilder {
    clipper: Clipper,
    portals: PortalRegistry,
    lists: DrawLists,
    decals: Vec<DrawItem>,
    gap_fill: Vec<DrawItem>,

    /// Bumped once per build and once per corrective pass.
    valid_count: u32,
    frame_stamp: u32,
    ss_rendered: Vec<u32>,
    ss_visited: Vec<u32>,
    side_stamp: Vec<u32>,

    poly_links: Vec<SmallVec<[PolyobjId; 2]>>,
    things: Vec<SmallVec<[usize; 4]>>,
    missing: Vec<MissingTexture>,
    hacked: Vec<SubsectorId>,
    stacks: Vec<(PortalId, SubsectorId, bool)>,
    visible: usize,
}

/// Borrowed inputs of one build.
struct Ctx<'s, 'a> {
    scene: &'s Scene<'a>,
    vp: &'s Viewpoint,
    eye: Vec3,
}

impl SceneBuilder {
    pub fn clipper(&self) -> &Clipper {
        &self.clipper
    }

    /// Walk the level from `vp` and return the filled draw lists.
    pub fn build_scene(&mut self, scene: &Scene, vp: &Viewpoint, ratio: f32) -> SceneFrame {
        let level = scene.level;
        self.begin(level);

        // 1 ─ seed the clipper with everything outside the frustum
        let yaw = bam_from_radians(vp.yaw);
        if let Some(half) = frustum_angle(vp.fov.to_degrees(), vp.pitch.to_degrees(), ratio) {
            self.clipper
                .safe_add_clip_range(yaw.wrapping_add(half), yaw.wrapping_sub(half));
        }

        // 2 ─ reset portals, re-link polyobjects and bucket the actors
        self.portals.clear();
        self.link_polyobjs(level);
        self.link_things(scene, vp.tic_frac);

        // 3 ─ front-to-back traversal
        let ctx = Ctx {
            scene,
            vp,
            eye: vp.pos,
        };
        self.walk_bsp(&ctx, level.bsp_root());

        // 4 ─ order matters: each pass bumps the visitation counter
        self.handle_missing_textures(&ctx);
        self.handle_hacked_subsectors(&ctx);
        self.process_sector_stacks(&ctx);

        trace!(
            "build_scene: {} subsectors, {} items, {} portals",
            self.visible,
            self.lists.total(),
            self.portals.len()
        );

        SceneFrame {
            lists: std::mem::take(&mut self.lists),
            decals: std::mem::take(&mut self.decals),
            gap_fill: std::mem::take(&mut self.gap_fill),
            portals: std::mem::take(&mut self.portals),
            visible_subsectors: self.visible,
        }
    }

    fn begin(&mut self, level: &Level) {
        let n_ss = level.subsectors.len();
        if self.ss_rendered.len() != n_ss {
            self.ss_rendered = vec![0; n_ss];
            self.ss_visited = vec![0; n_ss];
            self.poly_links = vec![SmallVec::new(); n_ss];
            self.things = vec![SmallVec::new(); n_ss];
        }
        if self.side_stamp.len() != level.sidedefs.len() {
            self.side_stamp = vec![0; level.sidedefs.len()];
        }
        self.valid_count = self.valid_count.wrapping_add(1);
        self.frame_stamp = self.valid_count;

        self.clipper.clear();
        self.lists.clear();
        self.decals.clear();
        self.gap_fill.clear();
        self.missing.clear();
        self.hacked.clear();
        self.stacks.clear();
        self.visible = 0;
    }

    fn link_polyobjs(&mut self, level: &Level) {
        self.poly_links.iter_mut().for_each(SmallVec::clear);
        for (i, po) in level.polyobjs.iter().enumerate() {
            let ss = level.locate_subsector(po.center);
            self.poly_links[ss as usize].push(i as PolyobjId);
        }
    }

    fn link_things(&mut self, scene: &Scene, tic_frac: f32) {
        self.things.iter_mut().for_each(SmallVec::clear);
        for (i, actor) in scene.actors.iter().enumerate() {
            let p = actor.interpolated_position(tic_frac).truncate();
            let ss = scene.level.locate_subsector(p);
            self.things[ss as usize].push(i);
        }
    }

    /*──────────────────────── BSP traversal ────────────────────────*/

    fn walk_bsp(&mut self, ctx: &Ctx, child: u16) {
        // Leaf? ──────
        if child & SUBSECTOR_BIT != 0 {
            self.do_subsector(ctx, child & CHILD_MASK);
            return;
        }

        // Internal node ──────
        let node = &ctx.scene.level.nodes[child as usize];
        let front = node.point_side(ctx.eye.truncate()) as usize;
        let back = front ^ 1;

        // Near side first …
        self.walk_bsp(ctx, node.child[front]);

        // … far side only if its bounding box might be visible.
        if self.bbox_visible(&node.bbox[back], ctx.eye.truncate()) {
            self.walk_bsp(ctx, node.child[back]);
        }
    }

    /// Conservative check whether any open angle looks into `bbox`.
    fn bbox_visible(&self, bbox: &Aabb, eye: Vec2) -> bool {
        if bbox.contains(eye) {
            return true;
        }
        let centre = point_to_bam(eye, (bbox.min + bbox.max) * 0.5);
        let mut lo = i32::MAX;
        let mut hi = i32::MIN;
        for c in bbox.corners() {
            let rel = point_to_bam(eye, c).wrapping_sub(centre) as i32;
            lo = lo.min(rel);
            hi = hi.max(rel);
        }
        if (hi as i64 - lo as i64) >= ANG180 as i64 {
            return true;
        }
        self.clipper.safe_check_range(
            centre.wrapping_add(lo as u32),
            centre.wrapping_add(hi as u32),
        )
    }

    /*──────────────────────── Leaf processing ──────────────────────*/

    fn do_subsector(&mut self, ctx: &Ctx, ss_idx: SubsectorId) {
        let level = ctx.scene.level;
        let ss = &level.subsectors[ss_idx as usize];
        if ss.flags.contains(SubsectorFlags::POLY_ORG) {
            return;
        }
        self.ss_rendered[ss_idx as usize] = self.frame_stamp;
        self.visible += 1;
        if ss.flags.contains(SubsectorFlags::HACKED) {
            self.hacked.push(ss_idx);
        }

        let polys = self.poly_links[ss_idx as usize].clone();
        for po in polys {
            for &seg in &level.polyobjs[po as usize].segs {
                self.add_line(ctx, seg, ss_idx, true);
            }
        }
        for seg in level.segs_of_subsector(ss_idx) {
            self.add_line(ctx, seg, ss_idx, false);
        }

        let things = self.things[ss_idx as usize].clone();
        for actor in things {
            self.add_thing(ctx, actor);
        }

        if ss.seg_count >= 3 {
            let sector = &level.sectors[ss.sector as usize];
            self.add_flats(ctx, ss_idx, sector);
        }
    }

    fn add_line(&mut self, ctx: &Ctx, seg_idx: SegmentId, ss: SubsectorId, polyobj: bool) {
        let level = ctx.scene.level;
        let seg = &level.segs[seg_idx as usize];
        // Minisegs only split space; they have nothing to draw.
        if seg.linedef.is_none() {
            return;
        }
        let (v1, v2) = level.seg_vertices(seg);
        // Nothing of it reaches past the portal line.
        if let Some(clip) = &ctx.vp.clip_line {
            if !clip.beyond(v1) && !clip.beyond(v2) {
                return;
            }
        }

        let eye = ctx.eye.truncate();
        let a1 = point_to_bam(eye, v1);
        let a2 = point_to_bam(eye, v2);
        // Back side: the arc from v2 to v1 must run counter-clockwise.
        if a2.wrapping_sub(a1) < ANG180 {
            return;
        }
        if !self.clipper.safe_check_range(a2, a1) {
            return;
        }

        let (front_sd, back_sector, ld) = level.seg_sides(seg);
        let fs = &level.sectors[front_sd.sector as usize];
        let light = fs.light;
        let materials = ctx.scene.materials;
        let mid = (v1 + v2) * 0.5;
        let wall = |part, bottom: f32, top: f32, material: MaterialId, alpha: f32| DrawItem {
            prim: Primitive::Wall {
                seg: seg_idx,
                part,
                bottom,
                top,
            },
            material: materials.resolve_id(material),
            light,
            alpha,
            origin: mid.extend((bottom + top) * 0.5),
        };

        // Portal lines: the view behind replaces the wall.
        if let Some(portal) = ld.portal.filter(|_| seg.dir == 0) {
            self.portals.register(portal, FootprintPart::Seg(seg_idx));
            self.clipper.safe_add_clip_range(a2, a1);
            if front_sd.middle != NO_MATERIAL {
                let mat = materials.resolve(front_sd.middle);
                if mat.surface == Surface::Translucent || ld.alpha < 1.0 {
                    let item = wall(WallPart::Middle, fs.floor_h, fs.ceil_h, front_sd.middle, ld.alpha);
                    self.lists[DrawListKind::TranslucentBorder].push(item);
                }
            }
            return;
        }

        match back_sector.filter(|_| ld.flags.contains(LinedefFlags::TWO_SIDED)) {
            None => {
                let mat = materials.resolve(front_sd.middle);
                let kind = list_for_wall(mat, ld.alpha, polyobj, false);
                let item = wall(WallPart::Middle, fs.floor_h, fs.ceil_h, front_sd.middle, ld.alpha);
                self.lists[kind].push(item);
                self.clipper.safe_add_clip_range(a2, a1);
            }
            Some(bs) => {
                let back_ss = seg.back_subsector;
                if bs.ceil_h < fs.ceil_h {
                    let both_sky = materials.resolve(fs.ceil_tex).sky
                        && materials.resolve(bs.ceil_tex).sky;
                    if front_sd.upper != NO_MATERIAL {
                        let item = wall(WallPart::Upper, bs.ceil_h, fs.ceil_h, front_sd.upper, 1.0);
                        self.lists[DrawListKind::PlainWalls].push(item);
                    } else if !both_sky {
                        self.missing.push(MissingTexture {
                            subsector: ss,
                            back: back_ss,
                            upper: true,
                            z: fs.ceil_h,
                        });
                    }
                }
                if bs.floor_h > fs.floor_h {
                    if front_sd.lower != NO_MATERIAL {
                        let item = wall(WallPart::Lower, fs.floor_h, bs.floor_h, front_sd.lower, 1.0);
                        self.lists[DrawListKind::PlainWalls].push(item);
                    } else {
                        self.missing.push(MissingTexture {
                            subsector: ss,
                            back: back_ss,
                            upper: false,
                            z: fs.floor_h,
                        });
                    }
                }
                if front_sd.middle != NO_MATERIAL {
                    let mat = materials.resolve(front_sd.middle);
                    let kind = list_for_wall(mat, ld.alpha, polyobj, false);
                    let bottom = fs.floor_h.max(bs.floor_h);
                    let top = fs.ceil_h.min(bs.ceil_h);
                    self.lists[kind].push(wall(WallPart::Middle, bottom, top, front_sd.middle, ld.alpha));
                }
                let closed = bs.ceil_h <= bs.floor_h
                    || bs.ceil_h <= fs.floor_h
                    || bs.floor_h >= fs.ceil_h;
                if closed {
                    self.clipper.safe_add_clip_range(a2, a1);
                }
            }
        }

        self.add_decals(ctx, seg_idx, light);
    }

    /// Decals of the seg's front side, once per side per build.
    fn add_decals(&mut self, ctx: &Ctx, seg_idx: SegmentId, light: f32) {
        let level = ctx.scene.level;
        let seg = &level.segs[seg_idx as usize];
        let Some(ld_idx) = seg.linedef else { return };
        let ld = &level.linedefs[ld_idx as usize];
        let side_idx = if seg.dir == 0 {
            ld.right_sidedef
        } else {
            ld.left_sidedef
        };
        let Some(side_idx) = side_idx else { return };
        if self.side_stamp[side_idx as usize] == self.frame_stamp {
            return;
        }
        self.side_stamp[side_idx as usize] = self.frame_stamp;

        let (lv1, lv2) = level.linedef_vertices(ld_idx);
        let (start, dir) = if seg.dir == 0 {
            (lv1, (lv2 - lv1).normalize_or_zero())
        } else {
            (lv2, (lv1 - lv2).normalize_or_zero())
        };
        for (index, decal) in level.sidedefs[side_idx as usize].decals.iter().enumerate() {
            self.decals.push(DrawItem {
                prim: Primitive::Decal {
                    seg: seg_idx,
                    index,
                },
                material: ctx.scene.materials.resolve_id(decal.material),
                light,
                alpha: decal.alpha,
                origin: (start + dir * decal.along).extend(decal.z),
            });
        }
    }

    fn add_thing(&mut self, ctx: &Ctx, idx: usize) {
        let actor = &ctx.scene.actors[idx];
        if !actor.is_visible() {
            return;
        }
        // The camera only shows up in mirrors.
        if ctx.vp.camera == Some(actor.id) && !ctx.vp.mirror {
            return;
        }
        let pos = actor.interpolated_position(ctx.vp.tic_frac);
        if let Some(clip) = &ctx.vp.clip_line {
            if clip.clips(pos.truncate()) {
                return;
            }
        }
        let sector = ctx.scene.level.sector_at(pos.truncate());
        let light = ctx.scene.level.sectors[sector as usize].light;

        let (prim, material) = match &actor.model {
            Some(m) => (Primitive::Model { actor: idx }, m.frame.skin),
            None => (Primitive::Sprite { actor: idx }, actor.sprite),
        };
        let kind = if actor.is_translucent() {
            DrawListKind::Translucent
        } else {
            DrawListKind::Models
        };
        self.lists[kind].push(DrawItem {
            prim,
            material: ctx.scene.materials.resolve_id(material),
            light,
            alpha: actor.alpha,
            origin: pos + Vec3::Z * (actor.height * 0.5),
        });
    }

    fn add_flats(&mut self, ctx: &Ctx, ss: SubsectorId, sector: &Sector) {
        let level = ctx.scene.level;
        let centre = subsector_centre(level, ss);
        let planes = [
            (false, sector.floor_h, sector.floor_tex, sector.floor_portal, ctx.eye.z > sector.floor_h),
            (true, sector.ceil_h, sector.ceil_tex, sector.ceil_portal, ctx.eye.z < sector.ceil_h),
        ];
        for (ceiling, z, tex, portal, facing) in planes {
            if !facing {
                continue;
            }
            let mat = ctx.scene.materials.resolve(tex);
            // A sky plane without a portal of its own shows the level's
            // skybox, else the plain dome.
            let portal =
                portal.or_else(|| mat.sky.then(|| level.default_skybox.unwrap_or(SKY_DOME)));
            if let Some(p) = portal {
                self.portals.register(
                    p,
                    FootprintPart::Plane {
                        subsector: ss,
                        ceiling,
                    },
                );
                let stacked = level
                    .portals
                    .get(p as usize)
                    .is_some_and(|d| matches!(d.kind, PortalKind::SectorStack { .. }));
                if stacked {
                    self.stacks.push((p, ss, ceiling));
                }
                continue;
            }
            self.lists[list_for_flat(mat)].push(DrawItem {
                prim: Primitive::Flat {
                    subsector: ss,
                    ceiling,
                    z,
                },
                material: ctx.scene.materials.resolve_id(tex),
                light: sector.light,
                alpha: 1.0,
                origin: centre.extend(z),
            });
        }
    }

    /*──────────────────────── corrective passes ────────────────────*/

    /// Flood every untextured upper/lower gap with the back sector's flat,
    /// once per back subsector.
    fn handle_missing_textures(&mut self, ctx: &Ctx) {
        self.valid_count = self.valid_count.wrapping_add(1);
        let level = ctx.scene.level;
        let missing = std::mem::take(&mut self.missing);
        for m in &missing {
            let target = m.back.unwrap_or(m.subsector);
            if self.ss_visited[target as usize] == self.valid_count {
                continue;
            }
            self.ss_visited[target as usize] = self.valid_count;

            let sector = &level.sectors[level.subsectors[target as usize].sector as usize];
            let tex = if m.upper {
                sector.ceil_tex
            } else {
                sector.floor_tex
            };
            if ctx.scene.materials.resolve(tex).sky {
                continue;
            }
            self.gap_fill.push(DrawItem {
                prim: Primitive::Flat {
                    subsector: target,
                    ceiling: m.upper,
                    z: m.z,
                },
                material: ctx.scene.materials.resolve_id(tex),
                light: sector.light,
                alpha: 1.0,
                origin: subsector_centre(level, target).extend(m.z),
            });
        }
        self.missing = missing;
    }

    /// Open subsectors of deep-water hacks: neighbours of the same sector
    /// that the walk did not reach get the floor drawn at the hacked height.
    fn handle_hacked_subsectors(&mut self, ctx: &Ctx) {
        self.valid_count = self.valid_count.wrapping_add(1);
        let level = ctx.scene.level;
        let hacked = std::mem::take(&mut self.hacked);
        for &ss in &hacked {
            let sector_id = level.subsectors[ss as usize].sector;
            let sector = &level.sectors[sector_id as usize];
            for seg in level.segs_of_subsector(ss) {
                let Some(n) = level.segs[seg as usize].back_subsector else {
                    continue;
                };
                let ni = n as usize;
                if level.subsectors[ni].sector != sector_id
                    || self.ss_rendered[ni] == self.frame_stamp
                    || self.ss_visited[ni] == self.valid_count
                {
                    continue;
                }
                self.ss_visited[ni] = self.valid_count;
                self.gap_fill.push(DrawItem {
                    prim: Primitive::Flat {
                        subsector: n,
                        ceiling: false,
                        z: sector.floor_h,
                    },
                    material: ctx.scene.materials.resolve_id(sector.floor_tex),
                    light: sector.light,
                    alpha: 1.0,
                    origin: subsector_centre(level, n).extend(sector.floor_h),
                });
            }
        }
        self.hacked = hacked;
    }

    /// Grow each stacked-sector portal over every subsector of its sector
    /// that touches a visible part, so the portal covers the whole plane.
    fn process_sector_stacks(&mut self, ctx: &Ctx) {
        self.valid_count = self.valid_count.wrapping_add(1);
        let level = ctx.scene.level;
        let stacks = std::mem::take(&mut self.stacks);
        let mut todo: Vec<SubsectorId> = Vec::new();
        for &(portal, start, ceiling) in &stacks {
            let sector_id = level.subsectors[start as usize].sector;
            self.ss_visited[start as usize] = self.valid_count;
            todo.push(start);
            while let Some(ss) = todo.pop() {
                for seg in level.segs_of_subsector(ss) {
                    let Some(n) = level.segs[seg as usize].back_subsector else {
                        continue;
                    };
                    let ni = n as usize;
                    if level.subsectors[ni].sector != sector_id
                        || self.ss_visited[ni] == self.valid_count
                    {
                        continue;
                    }
                    self.ss_visited[ni] = self.valid_count;
                    if self.ss_rendered[ni] != self.frame_stamp {
                        self.portals.register(
                            portal,
                            FootprintPart::Plane {
                                subsector: n,
                                ceiling,
                            },
                        );
                    }
                    todo.push(n);
                }
            }
        }
        self.stacks = stacks;
    }
}

fn subsector_centre(level: &Level, ss: SubsectorId) -> Vec2 {
    let range = level.segs_of_subsector(ss);
    let n = range.len().max(1) as f32;
    let sum: Vec2 = range
        .map(|s| level.vertices[level.segs[s as usize].v1 as usize].pos)
        .sum();
    sum / n
}

/*====================================================================*/
/*                                Tests                                */
/*====================================================================*/
#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::{
        Actor, Decal, Level, MaterialBank, Polyobj, PortalDef, RenderStyle, Vertex, fixtures,
    };
    use glam::vec2;

    fn build(level: &Level, actors: &[Actor], bank: &MaterialBank, vp: &Viewpoint) -> SceneFrame {
        let scene = Scene::new(level, actors, bank);
        SceneBuilder::default().build_scene(&scene, vp, 4.0 / 3.0)
    }

    fn count(frame: &SceneFrame, kind: DrawListKind) -> usize {
        frame.lists[kind].len()
    }

    #[test]
    fn frustum_angle_matches_fov() {
        let a = frustum_angle(90.0, 0.0, 4.0 / 3.0).unwrap();
        assert!((crate::engine::clipper::bam_to_degrees(a) - 47.0).abs() < 1e-3);
        assert!(frustum_angle(90.0, 50.0, 4.0 / 3.0).is_none());
        assert!(frustum_angle(170.0, 45.0, 2.4).is_none());
    }

    #[test]
    fn single_wall_yields_one_plain_wall() {
        let lvl = fixtures::single_wall();
        let bank = fixtures::materials();
        let vp = fixtures::viewpoint(&lvl, Vec3::new(0.0, 0.0, 41.0), 0.0);
        let frame = build(&lvl, &[], &bank, &vp);

        assert_eq!(count(&frame, DrawListKind::PlainWalls), 1);
        assert_eq!(frame.lists.total(), 1);
        assert!(frame.portals.is_empty());
        assert!(frame.gap_fill.is_empty());
        assert!(frame.decals.is_empty());
    }

    #[test]
    fn wall_behind_the_viewer_is_culled() {
        let lvl = fixtures::single_wall();
        let bank = fixtures::materials();
        // Facing away from the wall: outside the frustum.
        let vp = fixtures::viewpoint(&lvl, Vec3::new(0.0, 0.0, 41.0), std::f32::consts::PI);
        assert_eq!(build(&lvl, &[], &bank, &vp).lists.total(), 0);

        // Standing behind it: back face.
        let vp = fixtures::viewpoint(&lvl, Vec3::new(200.0, 0.0, 41.0), std::f32::consts::PI);
        assert_eq!(build(&lvl, &[], &bank, &vp).lists.total(), 0);
    }

    #[test]
    fn two_rooms_walk_reaches_the_far_room() {
        let lvl = fixtures::two_rooms();
        let bank = fixtures::materials();
        let vp = fixtures::room_a_view(&lvl);
        let frame = build(&lvl, &[], &bank, &vp);

        assert_eq!(frame.visible_subsectors, 2);
        // floor + ceiling of both rooms
        assert_eq!(count(&frame, DrawListKind::PlainFlats), 4);
        // A: north + south, B: north + east + south (the shared line is open)
        assert_eq!(count(&frame, DrawListKind::PlainWalls), 5);
    }

    #[test]
    fn closed_door_blocks_the_far_room() {
        let mut lvl = fixtures::two_rooms();
        lvl.sectors[1].ceil_h = 0.0;
        let bank = fixtures::materials();
        let vp = fixtures::room_a_view(&lvl);
        let frame = build(&lvl, &[], &bank, &vp);
        // The door seg closes the arc; room B's node box is fully clipped.
        assert_eq!(frame.visible_subsectors, 1);
    }

    #[test]
    fn surfaces_pick_their_lists() {
        let mut lvl = fixtures::two_rooms();
        lvl.sidedefs[2].middle = fixtures::GRATE;
        lvl.sidedefs[6].middle = fixtures::GLASS;
        let bank = fixtures::materials();
        let vp = fixtures::room_a_view(&lvl);
        let frame = build(&lvl, &[], &bank, &vp);
        assert_eq!(count(&frame, DrawListKind::MaskedWalls), 1);
        assert_eq!(count(&frame, DrawListKind::Translucent), 1);
        assert_eq!(count(&frame, DrawListKind::PlainWalls), 4);
    }

    #[test]
    fn translucent_actors_and_own_camera() {
        let lvl = fixtures::two_rooms();
        let bank = fixtures::materials();
        let mut ghost = fixtures::imp(2, vec2(200.0, 64.0));
        ghost.render_style = RenderStyle::Translucent;
        ghost.alpha = 0.4;
        let actors = vec![
            fixtures::imp(1, vec2(96.0, 64.0)),
            ghost,
            fixtures::imp(3, vec2(32.0, 64.0)),
        ];
        let mut vp = fixtures::room_a_view(&lvl);
        vp.camera = Some(3);
        let frame = build(&lvl, &actors, &bank, &vp);
        assert_eq!(count(&frame, DrawListKind::Models), 1);
        assert_eq!(count(&frame, DrawListKind::Translucent), 1);

        vp.mirror = true;
        let frame = build(&lvl, &actors, &bank, &vp);
        assert_eq!(count(&frame, DrawListKind::Models), 2);
    }

    #[test]
    fn missing_upper_is_gap_filled_once() {
        let mut lvl = fixtures::two_rooms();
        lvl.sectors[1].ceil_h = 96.0;
        let bank = fixtures::materials();
        let vp = fixtures::room_a_view(&lvl);
        let frame = build(&lvl, &[], &bank, &vp);
        assert_eq!(frame.gap_fill.len(), 1);
        match frame.gap_fill[0].prim {
            Primitive::Flat { subsector, ceiling, z } => {
                assert_eq!(subsector, 1);
                assert!(ceiling);
                assert_eq!(z, 128.0);
            }
            ref other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn mirror_line_registers_a_portal() {
        let mut lvl = fixtures::two_rooms();
        lvl.portals.push(PortalDef {
            kind: PortalKind::Mirror { line: 5 },
        });
        lvl.linedefs[5].portal = Some(0);
        let bank = fixtures::materials();
        let vp = fixtures::room_a_view(&lvl);
        let frame = build(&lvl, &[], &bank, &vp);
        assert_eq!(frame.portals.len(), 1);
        assert_eq!(frame.portals.entries()[0].footprint[0], FootprintPart::Seg(6));
        assert_eq!(count(&frame, DrawListKind::PlainWalls), 4);
    }

    #[test]
    fn sector_stack_portal_covers_the_whole_sector() {
        let mut lvl = fixtures::two_rooms();
        lvl.portals.push(PortalDef {
            kind: PortalKind::SectorStack {
                displacement: vec2(0.0, 1024.0),
            },
        });
        // One sector spanning both rooms, only room A visible.
        lvl.sidedefs.iter_mut().for_each(|sd| sd.sector = 0);
        lvl.subsectors[1].sector = 0;
        lvl.sectors[0].floor_portal = Some(0);
        let bank = fixtures::materials();
        let vp = fixtures::viewpoint(&lvl, Vec3::new(32.0, 64.0, 41.0), std::f32::consts::PI);
        let frame = build(&lvl, &[], &bank, &vp);
        let entry = frame.portals.get(0).unwrap();
        assert!(entry.footprint.contains(&FootprintPart::Plane {
            subsector: 0,
            ceiling: false
        }));
        assert!(entry.footprint.contains(&FootprintPart::Plane {
            subsector: 1,
            ceiling: false
        }));
    }

    #[test]
    fn decals_are_collected_once_per_side() {
        let mut lvl = fixtures::two_rooms();
        lvl.sidedefs[6].decals.push(Decal {
            material: fixtures::SPLAT,
            along: 64.0,
            z: 32.0,
            alpha: 1.0,
        });
        let bank = fixtures::materials();
        let vp = fixtures::room_a_view(&lvl);
        let frame = build(&lvl, &[], &bank, &vp);
        assert_eq!(frame.decals.len(), 1);
        assert_eq!(frame.decals[0].origin, Vec3::new(256.0, 64.0, 32.0));
    }

    #[test]
    fn clip_line_hides_near_geometry() {
        let lvl = fixtures::two_rooms();
        let bank = fixtures::materials();
        let mut vp = fixtures::room_a_view(&lvl);
        let (a, b) = lvl.linedef_vertices(2);
        vp.clip_line = Some(crate::world::ClipLine::new(a, b, vp.pos.truncate()));
        let frame = build(&lvl, &[], &bank, &vp);
        // Only room B's three walls survive; A's walls lie on the viewer side.
        assert_eq!(count(&frame, DrawListKind::PlainWalls), 3);
    }

    #[test]
    fn sky_ceiling_registers_the_dome() {
        let mut lvl = fixtures::two_rooms();
        lvl.sectors[0].ceil_tex = fixtures::SKY;
        let bank = fixtures::materials();
        let vp = fixtures::room_a_view(&lvl);
        let frame = build(&lvl, &[], &bank, &vp);

        // both floors and room B's ceiling; the sky is not a flat
        assert_eq!(count(&frame, DrawListKind::PlainFlats), 3);
        assert_eq!(frame.portals.len(), 1);
        let entry = &frame.portals.entries()[0];
        assert_eq!(entry.id, SKY_DOME);
        assert_eq!(
            entry.footprint[0],
            FootprintPart::Plane {
                subsector: 0,
                ceiling: true
            }
        );

        lvl.portals.push(PortalDef {
            kind: PortalKind::Skybox {
                origin: Vec3::new(200.0, 64.0, 41.0),
            },
        });
        lvl.default_skybox = Some(0);
        let frame = build(&lvl, &[], &bank, &vp);
        assert_eq!(frame.portals.entries()[0].id, 0);
    }

    #[test]
    fn translucent_wall_on_a_portal_line_is_a_border() {
        let mut lvl = fixtures::two_rooms();
        lvl.portals.push(PortalDef {
            kind: PortalKind::Mirror { line: 5 },
        });
        lvl.linedefs[5].portal = Some(0);
        lvl.sidedefs[6].middle = fixtures::GLASS;
        let bank = fixtures::materials();
        let vp = fixtures::room_a_view(&lvl);
        let frame = build(&lvl, &[], &bank, &vp);
        assert_eq!(count(&frame, DrawListKind::TranslucentBorder), 1);
        assert_eq!(count(&frame, DrawListKind::Translucent), 0);
        assert_eq!(frame.portals.len(), 1);

        // an opaque texture faded by the line's alpha goes the same way
        lvl.sidedefs[6].middle = fixtures::WALL;
        lvl.linedefs[5].alpha = 0.5;
        let frame = build(&lvl, &[], &bank, &vp);
        assert_eq!(count(&frame, DrawListKind::TranslucentBorder), 1);

        // fully opaque: only the portal remains
        lvl.linedefs[5].alpha = 1.0;
        let frame = build(&lvl, &[], &bank, &vp);
        assert_eq!(count(&frame, DrawListKind::TranslucentBorder), 0);
    }

    #[test]
    fn polyobjects_follow_their_centre_every_build() {
        let mut lvl = fixtures::two_rooms();
        // door shut: room B is never walked
        lvl.sectors[1].ceil_h = 0.0;
        // a grate facing west, first in room B, then moved into room A
        lvl.vertices.extend([
            Vertex {
                pos: vec2(192.0, 96.0),
            },
            Vertex {
                pos: vec2(192.0, 32.0),
            },
            Vertex {
                pos: vec2(96.0, 96.0),
            },
            Vertex {
                pos: vec2(96.0, 32.0),
            },
        ]);
        let mut grate_side = lvl.sidedefs[0].clone();
        grate_side.middle = fixtures::GRATE;
        lvl.sidedefs.push(grate_side);
        let mut grate_line = lvl.linedefs[0].clone();
        (grate_line.v1, grate_line.v2, grate_line.right_sidedef) = (6, 7, Some(8));
        lvl.linedefs.push(grate_line);
        let mut grate_seg = lvl.segs[0].clone();
        (grate_seg.v1, grate_seg.v2, grate_seg.linedef) = (6, 7, Some(7));
        lvl.segs.push(grate_seg);
        lvl.polyobjs.push(Polyobj {
            segs: vec![8],
            center: vec2(192.0, 64.0),
        });

        let bank = fixtures::materials();
        let vp = fixtures::room_a_view(&lvl);
        let mut builder = SceneBuilder::default();
        let frame = builder.build_scene(&Scene::new(&lvl, &[], &bank), &vp, 4.0 / 3.0);
        assert_eq!(frame.visible_subsectors, 1);
        assert_eq!(count(&frame, DrawListKind::MaskedWallsOffset), 0);

        lvl.linedefs[7].v1 = 8;
        lvl.linedefs[7].v2 = 9;
        lvl.segs[8].v1 = 8;
        lvl.segs[8].v2 = 9;
        lvl.polyobjs[0].center = vec2(96.0, 64.0);
        let frame = builder.build_scene(&Scene::new(&lvl, &[], &bank), &vp, 4.0 / 3.0);
        assert_eq!(count(&frame, DrawListKind::MaskedWallsOffset), 1);
        assert_eq!(count(&frame, DrawListKind::MaskedWalls), 0);
    }

    #[test]
    fn hacked_subsector_floods_unreached_neighbours() {
        let mut lvl = fixtures::two_rooms();
        // one sector over both rooms
        lvl.sidedefs.iter_mut().for_each(|sd| sd.sector = 0);
        lvl.subsectors[1].sector = 0;
        lvl.subsectors[0].flags = SubsectorFlags::HACKED;
        let bank = fixtures::materials();

        // facing west: room B is never reached
        let vp = fixtures::viewpoint(&lvl, Vec3::new(32.0, 64.0, 41.0), std::f32::consts::PI);
        let frame = build(&lvl, &[], &bank, &vp);
        assert_eq!(frame.visible_subsectors, 1);
        assert_eq!(frame.gap_fill.len(), 1);
        assert_eq!(
            frame.gap_fill[0].prim,
            Primitive::Flat {
                subsector: 1,
                ceiling: false,
                z: 0.0
            }
        );
        assert_eq!(frame.gap_fill[0].material, fixtures::FLOOR);

        // facing east: room B is drawn normally, nothing to flood
        let vp = fixtures::room_a_view(&lvl);
        let frame = build(&lvl, &[], &bank, &vp);
        assert_eq!(frame.visible_subsectors, 2);
        assert!(frame.gap_fill.is_empty());
    }
}
