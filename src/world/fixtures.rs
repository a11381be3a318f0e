//! Tiny hand-built maps shared by the unit tests.

use glam::{Vec2, Vec3, vec2};

use crate::world::{
    Aabb, Actor, Linedef, LinedefFlags, Material, MaterialBank, MaterialId, NO_MATERIAL, Node,
    RenderStyle, Sector, Seg, Sidedef, Subsector, SubsectorFlags, Vertex, Viewpoint,
    geometry::Level,
    material::Surface,
};

pub const WALL: MaterialId = 1;
pub const FLOOR: MaterialId = 2;
pub const GRATE: MaterialId = 3;
pub const GLASS: MaterialId = 4;
pub const SKY: MaterialId = 5;
pub const SPLAT: MaterialId = 6;
pub const IMP: MaterialId = 7;

pub fn materials() -> MaterialBank {
    let mut bank = MaterialBank::default_with_placeholder();
    let mut add = |name: &str, surface: Surface, sky: bool| {
        bank.insert(
            name,
            Material {
                name: name.to_string(),
                surface,
                sky,
            },
        )
        .unwrap()
    };
    assert_eq!(add("WALL", Surface::Opaque, false), WALL);
    assert_eq!(add("FLOOR", Surface::Opaque, false), FLOOR);
    assert_eq!(add("GRATE", Surface::Masked, false), GRATE);
    assert_eq!(add("GLASS", Surface::Translucent, false), GLASS);
    assert_eq!(add("F_SKY1", Surface::Opaque, true), SKY);
    assert_eq!(add("SPLAT", Surface::Masked, false), SPLAT);
    assert_eq!(add("TROOA1", Surface::Masked, false), IMP);
    bank
}

fn side(sector: u16, tex: MaterialId) -> Sidedef {
    Sidedef {
        x_off: 0.0,
        y_off: 0.0,
        upper: tex,
        lower: tex,
        middle: tex,
        sector,
        decals: Vec::new(),
    }
}

fn line(v1: u16, v2: u16, right: u16, left: Option<u16>) -> Linedef {
    Linedef {
        v1,
        v2,
        flags: if left.is_some() {
            LinedefFlags::TWO_SIDED
        } else {
            LinedefFlags::IMPASSABLE
        },
        alpha: 1.0,
        portal: None,
        right_sidedef: Some(right),
        left_sidedef: left,
    }
}

fn seg(v1: u16, v2: u16, linedef: u16, dir: u16, back: Option<u16>) -> Seg {
    Seg {
        v1,
        v2,
        linedef: Some(linedef),
        dir,
        offset: 0.0,
        back_subsector: back,
    }
}

fn sector(floor_h: f32, ceil_h: f32) -> Sector {
    Sector {
        floor_h,
        ceil_h,
        floor_tex: FLOOR,
        ceil_tex: FLOOR,
        light: 1.0,
        floor_portal: None,
        ceil_portal: None,
    }
}

/// One subsector holding a single one-sided wall at x = 128 that faces the
/// origin. No nodes, and too few segs for any flat to be emitted.
pub fn single_wall() -> Level {
    Level {
        name: "WALL1".into(),
        vertices: vec![
            Vertex {
                pos: vec2(128.0, 64.0),
            },
            Vertex {
                pos: vec2(128.0, -64.0),
            },
        ],
        linedefs: vec![line(0, 1, 0, None)],
        sidedefs: vec![side(0, WALL)],
        segs: vec![seg(0, 1, 0, 0, None)],
        subsectors: vec![Subsector {
            seg_count: 1,
            first_seg: 0,
            sector: 0,
            flags: SubsectorFlags::empty(),
        }],
        sectors: vec![sector(0.0, 128.0)],
        ..Level::default()
    }
}

/// Two 128×128 rooms joined by an open two-sided line at x = 128.
///
/// * subsector/sector 0: room A, x ∈ [0,128]
/// * subsector/sector 1: room B, x ∈ [128,256]
/// * linedef 2 is the shared line (sidedef 2 faces A, sidedef 3 faces B)
/// * linedef 5 is room B's east wall
pub fn two_rooms() -> Level {
    let v = |x: f32, y: f32| Vertex { pos: vec2(x, y) };
    Level {
        name: "ROOMS".into(),
        vertices: vec![
            v(0.0, 0.0),
            v(128.0, 0.0),
            v(256.0, 0.0),
            v(256.0, 128.0),
            v(128.0, 128.0),
            v(0.0, 128.0),
        ],
        linedefs: vec![
            line(0, 5, 0, None),
            line(5, 4, 1, None),
            line(4, 1, 2, Some(3)),
            line(1, 0, 4, None),
            line(4, 3, 5, None),
            line(3, 2, 6, None),
            line(2, 1, 7, None),
        ],
        sidedefs: vec![
            side(0, WALL),
            side(0, WALL),
            side(0, NO_MATERIAL),
            side(1, NO_MATERIAL),
            side(0, WALL),
            side(1, WALL),
            side(1, WALL),
            side(1, WALL),
        ],
        segs: vec![
            seg(0, 5, 0, 0, None),
            seg(5, 4, 1, 0, None),
            seg(4, 1, 2, 0, Some(1)),
            seg(1, 0, 3, 0, None),
            seg(1, 4, 2, 1, Some(0)),
            seg(4, 3, 4, 0, None),
            seg(3, 2, 5, 0, None),
            seg(2, 1, 6, 0, None),
        ],
        subsectors: vec![
            Subsector {
                seg_count: 4,
                first_seg: 0,
                sector: 0,
                flags: SubsectorFlags::empty(),
            },
            Subsector {
                seg_count: 4,
                first_seg: 4,
                sector: 1,
                flags: SubsectorFlags::empty(),
            },
        ],
        nodes: vec![Node {
            x: 128.0,
            y: 0.0,
            dx: 0.0,
            dy: 128.0,
            bbox: [
                Aabb {
                    min: vec2(128.0, 0.0),
                    max: vec2(256.0, 128.0),
                },
                Aabb {
                    min: vec2(0.0, 0.0),
                    max: vec2(128.0, 128.0),
                },
            ],
            child: [0x8001, 0x8000],
        }],
        sectors: vec![sector(0.0, 128.0), sector(0.0, 128.0)],
        ..Level::default()
    }
}

/// Eye at `pos`, looking along `yaw`, 90° horizontal FOV.
pub fn viewpoint(level: &Level, pos: Vec3, yaw: f32) -> Viewpoint {
    let mut vp = Viewpoint::new(pos, yaw, 90_f32.to_radians());
    vp.sector = level.sector_at(pos.truncate());
    vp
}

/// Looking east from the middle of room A.
pub fn room_a_view(level: &Level) -> Viewpoint {
    viewpoint(level, Vec3::new(32.0, 64.0, 41.0), 0.0)
}

pub fn imp(id: u32, pos: Vec2) -> Actor {
    Actor {
        id,
        pos: pos.extend(0.0),
        prev_pos: pos.extend(0.0),
        sprite: IMP,
        render_style: RenderStyle::Normal,
        ..Actor::default()
    }
}
