//! One frame of a hand-built two-room map through the recording back-end.
//!
//! ```bash
//! cargo run --bin render_demo -- --mirror --save shot.png
//! ```

use std::{collections::BTreeMap, fs, path::PathBuf};

use clap::Parser;
use glam::{Vec3, vec2};

use hwscene::{
    RenderConfig, Scene, SceneDrawer,
    models::{HudWeapon, Model, ModelFrame, SpriteModelFrame},
    renderer::{DrawCommand, Event, IntRect, Recorder},
    world::{
        Aabb, Actor, ActorModel, Linedef, LinedefFlags, Level, Material, MaterialBank,
        MaterialId, NO_MATERIAL, Node, PortalDef, PortalKind, RenderStyle, Sector, Seg, Sidedef,
        Subsector, SubsectorFlags, Surface, Vertex, Viewpoint,
    },
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Opts {
    /// Renderer settings (TOML); defaults when absent
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[arg(long, default_value_t = 640)]
    width: u32,

    #[arg(long, default_value_t = 400)]
    height: u32,

    /// Turn the far wall into a mirror
    #[arg(long)]
    mirror: bool,

    /// Use a legacy device: no buffer objects, CPU keyframe blending
    #[arg(long)]
    legacy: bool,

    /// Also write a save picture here
    #[arg(long, value_name = "PNG")]
    save: Option<PathBuf>,
}

struct Textures {
    wall: MaterialId,
    floor: MaterialId,
    glass: MaterialId,
    skin: MaterialId,
    pistol: MaterialId,
}

fn materials() -> anyhow::Result<(MaterialBank, Textures)> {
    let mut bank = MaterialBank::default_with_placeholder();
    let mut add = |name: &str, surface: Surface| {
        bank.insert(
            name,
            Material {
                name: name.to_string(),
                surface,
                ..Material::default()
            },
        )
    };
    let tex = Textures {
        wall: add("STARTAN3", Surface::Opaque)?,
        floor: add("FLOOR4_8", Surface::Opaque)?,
        glass: add("GLASS1", Surface::Translucent)?,
        skin: add("CUBESKIN", Surface::Opaque)?,
        pistol: add("PISGA0", Surface::Masked)?,
    };
    Ok((bank, tex))
}

/// Rooms A (x 0..128) and B (x 128..256) sharing a glass pane at x = 128.
fn two_rooms(tex: &Textures, mirror: bool) -> Level {
    let v = |x: f32, y: f32| Vertex { pos: vec2(x, y) };
    let side = |sector, tex| Sidedef {
        x_off: 0.0,
        y_off: 0.0,
        upper: tex,
        lower: tex,
        middle: tex,
        sector,
        decals: Vec::new(),
    };
    let line = |v1, v2, right, left: Option<u16>| Linedef {
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
    };
    let seg = |v1, v2, linedef, dir, back| Seg {
        v1,
        v2,
        linedef: Some(linedef),
        dir,
        offset: 0.0,
        back_subsector: back,
    };
    let sector = || Sector {
        floor_h: 0.0,
        ceil_h: 128.0,
        floor_tex: tex.floor,
        ceil_tex: tex.floor,
        light: 1.0,
        floor_portal: None,
        ceil_portal: None,
    };
    let sub = |first_seg, sector| Subsector {
        seg_count: 4,
        first_seg,
        sector,
        flags: SubsectorFlags::empty(),
    };

    let mut level = Level {
        name: "DEMO".into(),
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
            side(0, tex.wall),
            side(0, tex.wall),
            Sidedef {
                middle: tex.glass,
                ..side(0, NO_MATERIAL)
            },
            side(1, NO_MATERIAL),
            side(0, tex.wall),
            side(1, tex.wall),
            side(1, tex.wall),
            side(1, tex.wall),
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
        subsectors: vec![sub(0, 0), sub(4, 1)],
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
        sectors: vec![sector(), sector()],
        ..Level::default()
    };
    if mirror {
        level.portals.push(PortalDef {
            kind: PortalKind::Mirror { line: 5 },
        });
        level.linedefs[5].portal = Some(0);
    }
    level
}

/// Draws grouped by command kind, plus the non-draw events.
fn stats(gpu: &Recorder) -> BTreeMap<&'static str, usize> {
    let mut out = BTreeMap::new();
    for e in &gpu.log {
        let key = match e {
            Event::Draw(r) => match r.cmd {
                DrawCommand::Item(_) => "item",
                DrawCommand::LightsOnly(_) => "lights-only",
                DrawCommand::Arrays { .. } => "arrays",
                DrawCommand::Elements { .. } => "elements",
                DrawCommand::Footprint { .. } => "portal footprint",
                DrawCommand::SkyDome { .. } => "sky dome",
                DrawCommand::WeaponSprite { .. } => "weapon sprite",
            },
            Event::Clear { .. } => "clear",
            Event::AmbientOcclusion => "ambient occlusion",
            Event::BlitToEye(_) => "eye blit",
            Event::Finish => "finish",
        };
        *out.entry(key).or_default() += 1;
    }
    out
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let opts = Opts::parse();

    let config = match &opts.config {
        Some(path) => RenderConfig::load(path)?,
        None => RenderConfig::default(),
    };
    let (bank, tex) = materials()?;
    let level = two_rooms(&tex, opts.mirror);

    let gpu = if opts.legacy {
        Recorder::legacy()
    } else {
        Recorder::default()
    };
    let mut drawer = SceneDrawer::new(gpu, config);
    let cube = drawer
        .models_mut()
        .insert(Model::boxes("CUBE", &[Vec3::splat(16.0), Vec3::splat(24.0)]));

    let player = Actor {
        id: 1,
        pos: Vec3::new(32.0, 64.0, 0.0),
        prev_pos: Vec3::new(30.0, 64.0, 0.0),
        ..Actor::default()
    };
    let cube_actor = Actor {
        id: 2,
        pos: Vec3::new(192.0, 64.0, 0.0),
        prev_pos: Vec3::new(192.0, 64.0, 0.0),
        render_style: RenderStyle::Normal,
        model: Some(ActorModel {
            frame: SpriteModelFrame {
                model: cube,
                skin: tex.skin,
                ..SpriteModelFrame::default()
            },
            anim: ModelFrame {
                frame1: 0,
                frame2: 1,
                inter: 0.5,
            },
        }),
        ..Actor::default()
    };
    let actors = [player, cube_actor];
    let weapon = HudWeapon {
        sprite: tex.pistol,
        model: None,
        ofs_x: 0.0,
        ofs_y: 32.0,
    };
    let scene = Scene::new(&level, &actors, &bank).with_weapon(&weapon);

    let mut vp = Viewpoint::from_actor(&level, &actors[0], 0.5, 90_f32.to_radians());
    let bounds = IntRect::sized(opts.width, opts.height);
    let sector = drawer.render_viewpoint(
        &scene,
        &mut vp,
        bounds,
        90.0,
        bounds.aspect(),
        1.2,
        true,
        true,
    );

    println!("level {}: view in sector {sector}", level.name);
    for (kind, n) in stats(drawer.gpu()) {
        println!("{kind:>20}: {n}");
    }
    println!(
        "{:>20}: {}",
        "portals rendered",
        drawer.processed_portals().len()
    );

    if let Some(path) = &opts.save {
        // nothing is written unless the whole picture encoded
        let mut png = Vec::new();
        drawer.write_save_picture(&scene, &actors[0], &mut png, opts.width, opts.height)?;
        fs::write(path, &png)?;
        println!("save picture written to {}", path.display());
    }
    Ok(())
}
