//! Keyframe models: geometry, per-state frame definitions and the adapter
//! that draws them through the pipeline state.

use bitflags::bitflags;
use glam::{Vec2, Vec3};

use crate::{renderer::Gpu, world::MaterialId};

pub mod renderer;
pub mod vertex_buffer;

pub use renderer::{HudWeapon, ModelRenderer, WEAPONTOP};
pub use vertex_buffer::{ModelVertex, ModelVertexBuffer, VertexStorage, pack_normal};

pub type ModelId = u16;

bitflags! {
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct ModelFlags: u16 {
        const INHERIT_ACTOR_PITCH = 0x0001;
        const USE_ACTOR_ROLL      = 0x0002;
        /// Translucent models normally cull back faces; this opts out.
        const DONT_CULL_BACKFACES = 0x0004;
        const IGNORE_TRANSLATION  = 0x0008;
    }
}

/// Which model an actor state shows and how it is placed.
#[derive(Clone, Debug, PartialEq)]
pub struct SpriteModelFrame {
    pub model: ModelId,
    pub skin: MaterialId,
    pub flags: ModelFlags,
    /// x, y (depth) and z (height) scale.
    pub scale: Vec3,
    pub offset: Vec3,
    /// Degrees.
    pub angle_offset: f32,
    pub pitch_offset: f32,
    pub roll_offset: f32,
}

impl Default for SpriteModelFrame {
    fn default() -> Self {
        Self {
            model: 0,
            skin: 0,
            flags: ModelFlags::empty(),
            scale: Vec3::ONE,
            offset: Vec3::ZERO,
            angle_offset: 0.0,
            pitch_offset: 0.0,
            roll_offset: 0.0,
        }
    }
}

/// Two keyframes and how far we are between them.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ModelFrame {
    pub frame1: u32,
    pub frame2: u32,
    /// 0 = frame1, 1 = frame2.
    pub inter: f32,
}

/// Geometry of one model: `frame_count` keyframes of
/// `vertices_per_frame` vertices, stored back to back.
#[derive(Debug)]
pub struct Model {
    pub name: String,
    pub frame_count: u32,
    pub vertices_per_frame: u32,
    pub vertices: Vec<ModelVertex>,
    /// Shared by all frames; empty for non-indexed models.
    pub indices: Vec<u32>,
    buffer: Option<ModelVertexBuffer>,
}

impl Model {
    pub fn new(
        name: impl Into<String>,
        vertices_per_frame: u32,
        vertices: Vec<ModelVertex>,
        indices: Vec<u32>,
    ) -> Self {
        let frame_count = vertices.len() as u32 / vertices_per_frame.max(1);
        Self {
            name: name.into(),
            frame_count,
            vertices_per_frame,
            vertices,
            indices,
            buffer: None,
        }
    }

    /// Axis-aligned box centred on the origin, one keyframe per entry of
    /// `sizes`.
    pub fn boxes(name: impl Into<String>, sizes: &[Vec3]) -> Self {
        const FACES: [(Vec3, Vec3, Vec3); 6] = [
            (Vec3::X, Vec3::Y, Vec3::Z),
            (Vec3::NEG_X, Vec3::NEG_Y, Vec3::Z),
            (Vec3::Y, Vec3::NEG_X, Vec3::Z),
            (Vec3::NEG_Y, Vec3::X, Vec3::Z),
            (Vec3::Z, Vec3::X, Vec3::Y),
            (Vec3::NEG_Z, Vec3::NEG_X, Vec3::Y),
        ];
        let corners = [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)];

        let mut vertices = Vec::with_capacity(sizes.len() * 24);
        for half in sizes.iter().map(|s| *s * 0.5) {
            for (n, u, v) in FACES {
                for (cu, cv) in corners {
                    let p = (n + u * cu + v * cv) * half;
                    let uv = Vec2::new((cu + 1.0) * 0.5, (cv + 1.0) * 0.5);
                    vertices.push(ModelVertex::new(p, uv, n));
                }
            }
        }
        let indices = (0..6u32)
            .flat_map(|f| [0, 1, 2, 2, 3, 0].map(|i| f * 4 + i))
            .collect();
        Self::new(name, 24, vertices, indices)
    }

    pub fn buffer(&self) -> Option<&ModelVertexBuffer> {
        self.buffer.as_ref()
    }

    /// The vertex buffer, built and filled on first use.
    ///
    /// Without an index buffer the keyframes are stored de-indexed: one
    /// vertex per index, so plain arrays draw the same triangles.
    pub fn ensure_buffer<G: Gpu>(&mut self, gpu: &mut G) -> &mut ModelVertexBuffer {
        let Self {
            buffer,
            vertices,
            indices,
            frame_count,
            vertices_per_frame,
            ..
        } = self;
        buffer.get_or_insert_with(|| {
            let mut buf = ModelVertexBuffer::new(gpu, !indices.is_empty(), *frame_count <= 1);
            if indices.is_empty() || buf.has_index_buffer() {
                buf.lock_vertices(vertices.len()).copy_from_slice(vertices);
                buf.unlock_vertices(gpu);
                let dst = buf.lock_indices(indices.len());
                if !dst.is_empty() {
                    dst.copy_from_slice(indices);
                }
                buf.unlock_indices(gpu);
            } else {
                let flat = de_index(vertices, indices, *vertices_per_frame as usize);
                buf.lock_vertices(flat.len()).copy_from_slice(&flat);
                buf.unlock_vertices(gpu);
            }
            buf
        })
    }

    /// Vertices drawn per keyframe with the current buffer.
    #[inline]
    pub fn frame_size(&self) -> u32 {
        match &self.buffer {
            Some(buf) if !self.indices.is_empty() && !buf.has_index_buffer() => {
                self.indices.len() as u32
            }
            _ => self.vertices_per_frame,
        }
    }

    /// First vertex of keyframe `frame`; out-of-range frames wrap.
    #[inline]
    pub fn frame_start(&self, frame: u32) -> u32 {
        (frame % self.frame_count.max(1)) * self.frame_size()
    }

    pub fn release<G: Gpu>(&mut self, gpu: &mut G) {
        if let Some(buf) = self.buffer.take() {
            buf.release(gpu);
        }
    }
}

/// Every keyframe expanded through `indices`. Indices past the frame are
/// clamped to its last vertex.
fn de_index(vertices: &[ModelVertex], indices: &[u32], per_frame: usize) -> Vec<ModelVertex> {
    let mut out = Vec::with_capacity(vertices.len() / per_frame.max(1) * indices.len());
    for frame in vertices.chunks_exact(per_frame.max(1)) {
        let last = frame.len() - 1;
        out.extend(indices.iter().map(|&i| frame[(i as usize).min(last)]));
    }
    out
}

/// All models of the running game, indexed by [`ModelId`].
#[derive(Debug, Default)]
pub struct ModelBank {
    models: Vec<Model>,
}

impl ModelBank {
    pub fn insert(&mut self, model: Model) -> ModelId {
        self.models.push(model);
        (self.models.len() - 1) as ModelId
    }

    pub fn get(&self, id: ModelId) -> Option<&Model> {
        self.models.get(id as usize)
    }

    pub fn get_mut(&mut self, id: ModelId) -> Option<&mut Model> {
        self.models.get_mut(id as usize)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Drop every device buffer, e.g. before the device goes away.
    pub fn release_all<G: Gpu>(&mut self, gpu: &mut G) {
        self.models.iter_mut().for_each(|m| m.release(gpu));
    }
}
