//! Keyframe vertex storage for models.
//!
//! A buffer holds every keyframe of one model back to back. Drawing a frame
//! pair only moves the attribute offsets; the vertex stage blends between
//! `position` and `position2`. Devices that cannot do that get the blend on
//! the CPU instead.

use std::mem::{offset_of, size_of};

use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};
use log::debug;

use crate::renderer::{
    BufferId, BufferKind, Gpu, PipelineState, VertexLayout, VertexSource,
};

/// One model vertex as the GPU reads it.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct ModelVertex {
    pub pos: [f32; 3],
    pub uv: [f32; 2],
    /// Signed `INT_2_10_10_10_REV`, see [`pack_normal`].
    pub packed_normal: u32,
}

impl ModelVertex {
    pub fn new(pos: Vec3, uv: Vec2, normal: Vec3) -> Self {
        Self {
            pos: pos.to_array(),
            uv: uv.to_array(),
            packed_normal: pack_normal(normal),
        }
    }
}

/// Quantise a unit normal to three signed 10-bit fields, x in the low bits.
/// The top two bits stay zero.
pub fn pack_normal(n: Vec3) -> u32 {
    let q = |v: f32| ((v.clamp(-1.0, 1.0) * 511.0).round() as i32 as u32) & 0x3FF;
    q(n.x) | (q(n.y) << 10) | (q(n.z) << 20)
}

const STRIDE: usize = size_of::<ModelVertex>();

/// Where the vertices live, decided once when the buffer is created.
#[derive(Debug)]
pub enum VertexStorage {
    Hardware {
        vbo: BufferId,
        ibo: Option<BufferId>,
        /// CPU copy of what was uploaded last.
        shadow: Vec<ModelVertex>,
        indices: Vec<u32>,
    },
    /// Client-side arrays for devices without buffer objects.
    Client { vertices: Vec<ModelVertex> },
}

#[derive(Debug)]
pub struct ModelVertexBuffer {
    storage: VertexStorage,
    single_frame: bool,
    /// CPU-blended frame for devices without vertex-stage interpolation.
    blended: Vec<ModelVertex>,
}

impl ModelVertexBuffer {
    /// `needs_index` asks for an index buffer; only honoured when the device
    /// has buffer objects. `single_frame` models never interpolate.
    pub fn new<G: Gpu>(gpu: &mut G, needs_index: bool, single_frame: bool) -> Self {
        let storage = match gpu.create_buffer(BufferKind::Vertex) {
            Some(vbo) => VertexStorage::Hardware {
                vbo,
                ibo: if needs_index {
                    gpu.create_buffer(BufferKind::Index)
                } else {
                    None
                },
                shadow: Vec::new(),
                indices: Vec::new(),
            },
            None => {
                debug!("model buffer: no buffer objects, using client arrays");
                VertexStorage::Client {
                    vertices: Vec::new(),
                }
            }
        };
        Self {
            storage,
            single_frame,
            blended: Vec::new(),
        }
    }

    pub fn storage(&self) -> &VertexStorage {
        &self.storage
    }

    #[inline]
    pub fn is_hardware(&self) -> bool {
        matches!(self.storage, VertexStorage::Hardware { .. })
    }

    pub fn has_index_buffer(&self) -> bool {
        matches!(self.storage, VertexStorage::Hardware { ibo: Some(_), .. })
    }

    /// Zeroed space for `count` vertices. Previous contents never survive a
    /// lock.
    pub fn lock_vertices(&mut self, count: usize) -> &mut [ModelVertex] {
        match &mut self.storage {
            VertexStorage::Hardware { shadow, .. } => {
                shadow.clear();
                shadow.resize(count, ModelVertex::zeroed());
                shadow
            }
            VertexStorage::Client { vertices } => {
                *vertices = vec![ModelVertex::zeroed(); count];
                vertices
            }
        }
    }

    pub fn unlock_vertices<G: Gpu>(&mut self, gpu: &mut G) {
        if let VertexStorage::Hardware { vbo, shadow, .. } = &self.storage {
            gpu.upload(*vbo, bytemuck::cast_slice(shadow));
        }
    }

    /// Space for `count` indices, or an empty slice when there is no index
    /// buffer.
    pub fn lock_indices(&mut self, count: usize) -> &mut [u32] {
        match &mut self.storage {
            VertexStorage::Hardware {
                ibo: Some(_),
                indices,
                ..
            } => {
                indices.clear();
                indices.resize(count, 0);
                indices
            }
            _ => Default::default(),
        }
    }

    pub fn unlock_indices<G: Gpu>(&mut self, gpu: &mut G) {
        if let VertexStorage::Hardware {
            ibo: Some(ibo),
            indices,
            ..
        } = &self.storage
        {
            gpu.upload(*ibo, bytemuck::cast_slice(indices));
        }
    }

    /// Make this buffer the vertex source, attributes at frame 0.
    pub fn bind(&self, state: &mut PipelineState) {
        state.vertex_source = match self.storage {
            VertexStorage::Hardware { vbo, .. } => VertexSource::Buffer(vbo),
            VertexStorage::Client { .. } => VertexSource::Client,
        };
        state.layout = frame_layout(0, 0);
    }

    /// Point the attributes at keyframes starting at vertex `frame1` and
    /// `frame2`, `size` vertices each, blended by `inter`.
    pub fn setup_frame<G: Gpu>(
        &mut self,
        state: &mut PipelineState,
        gpu: &G,
        frame1: u32,
        frame2: u32,
        inter: f32,
        size: u32,
    ) {
        if !gpu.supports_shader_interpolation() && !self.single_frame {
            self.blend_on_cpu(frame1 as usize, frame2 as usize, inter, size as usize);
            state.vertex_source = VertexSource::Client;
            state.layout = frame_layout(0, 0);
            state.interpolation = 0.0;
            return;
        }
        self.bind(state);
        state.layout = frame_layout(frame1 as usize, frame2 as usize);
        state.interpolation = inter;
    }

    /// Vertices handed to the device by the last CPU blend.
    pub fn blended(&self) -> &[ModelVertex] {
        &self.blended
    }

    fn blend_on_cpu(&mut self, frame1: usize, frame2: usize, inter: f32, size: usize) {
        let src = match &self.storage {
            VertexStorage::Hardware { shadow, .. } => shadow,
            VertexStorage::Client { vertices } => vertices,
        };
        let a = &src[frame1..frame1 + size];
        let b = &src[frame2..frame2 + size];
        self.blended.clear();
        self.blended.extend(a.iter().zip(b).map(|(a, b)| ModelVertex {
            pos: Vec3::from(a.pos).lerp(Vec3::from(b.pos), inter).to_array(),
            uv: a.uv,
            packed_normal: b.packed_normal,
        }));
    }

    /// Give the device buffers back.
    pub fn release<G: Gpu>(self, gpu: &mut G) {
        if let VertexStorage::Hardware { vbo, ibo, .. } = self.storage {
            gpu.delete_buffer(vbo);
            if let Some(ibo) = ibo {
                gpu.delete_buffer(ibo);
            }
        }
    }
}

fn frame_layout(frame1: usize, frame2: usize) -> VertexLayout {
    VertexLayout {
        stride: STRIDE,
        position: frame1 * STRIDE + offset_of!(ModelVertex, pos),
        texcoord: frame1 * STRIDE + offset_of!(ModelVertex, uv),
        position2: frame2 * STRIDE + offset_of!(ModelVertex, pos),
        normal: frame2 * STRIDE + offset_of!(ModelVertex, packed_normal),
    }
}

/*====================================================================*/
/*                                Tests                                */
/*====================================================================*/
#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::Recorder;

    fn fill(buf: &mut ModelVertexBuffer, gpu: &mut Recorder) {
        let v = buf.lock_vertices(4);
        for (i, v) in v.iter_mut().enumerate() {
            v.pos = [i as f32 * 10.0, 0.0, 0.0];
        }
        buf.unlock_vertices(gpu);
    }

    #[test]
    fn vertex_is_24_bytes() {
        assert_eq!(STRIDE, 24);
        assert_eq!(offset_of!(ModelVertex, uv), 12);
        assert_eq!(offset_of!(ModelVertex, packed_normal), 20);
    }

    #[test]
    fn normals_pack_into_10_bit_fields() {
        assert_eq!(pack_normal(Vec3::X), 511);
        assert_eq!(pack_normal(Vec3::NEG_X), 0x201);
        assert_eq!(pack_normal(Vec3::Z), 511 << 20);
        assert_eq!(pack_normal(Vec3::NEG_Y), 0x201 << 10);
    }

    #[test]
    fn hardware_lock_uploads_bytes() {
        let mut gpu = Recorder::default();
        let mut buf = ModelVertexBuffer::new(&mut gpu, true, false);
        assert!(buf.is_hardware());
        assert!(buf.has_index_buffer());
        fill(&mut buf, &mut gpu);

        let VertexStorage::Hardware { vbo, ibo, .. } = *buf.storage() else {
            unreachable!()
        };
        assert_eq!(gpu.buffer(vbo).unwrap().len(), 4 * STRIDE);

        buf.lock_indices(6).copy_from_slice(&[0, 1, 2, 2, 3, 0]);
        buf.unlock_indices(&mut gpu);
        assert_eq!(gpu.buffer(ibo.unwrap()).unwrap().len(), 24);

        buf.release(&mut gpu);
        assert_eq!(gpu.live_buffers(), 0);
    }

    #[test]
    fn client_fallback_has_no_indices() {
        let mut gpu = Recorder::legacy();
        let mut buf = ModelVertexBuffer::new(&mut gpu, true, false);
        assert!(!buf.is_hardware());
        assert!(!buf.has_index_buffer());
        assert!(buf.lock_indices(36).is_empty());
        buf.unlock_indices(&mut gpu);
        assert_eq!(gpu.live_buffers(), 0);
    }

    #[test]
    fn client_lock_zeroes_previous_contents() {
        let mut gpu = Recorder::legacy();
        let mut buf = ModelVertexBuffer::new(&mut gpu, false, true);
        fill(&mut buf, &mut gpu);
        let again = buf.lock_vertices(4);
        assert!(again.iter().all(|v| *v == ModelVertex::zeroed()));
        assert_eq!(buf.lock_vertices(7).len(), 7);
    }

    #[test]
    fn setup_frame_offsets_attributes() {
        let mut gpu = Recorder::default();
        let mut buf = ModelVertexBuffer::new(&mut gpu, false, false);
        fill(&mut buf, &mut gpu);
        let mut st = PipelineState::default();
        buf.setup_frame(&mut st, &gpu, 2, 3, 0.25, 1);

        assert!(matches!(st.vertex_source, VertexSource::Buffer(_)));
        assert_eq!(st.layout.position, 2 * STRIDE);
        assert_eq!(st.layout.texcoord, 2 * STRIDE + 12);
        assert_eq!(st.layout.position2, 3 * STRIDE);
        assert_eq!(st.layout.normal, 3 * STRIDE + 20);
        assert_eq!(st.interpolation, 0.25);
    }

    #[test]
    fn cpu_blend_without_shader_interpolation() {
        let mut gpu = Recorder::default().with_shader_interpolation(false);
        let mut buf = ModelVertexBuffer::new(&mut gpu, false, false);
        fill(&mut buf, &mut gpu);
        let mut st = PipelineState::default();
        // frames of two vertices: [0, 10] and [20, 30]
        buf.setup_frame(&mut st, &gpu, 0, 2, 0.5, 2);

        assert_eq!(st.vertex_source, VertexSource::Client);
        assert_eq!(st.interpolation, 0.0);
        assert_eq!(st.layout.position, 0);
        assert_eq!(st.layout.position2, 0);
        let xs: Vec<f32> = buf.blended().iter().map(|v| v.pos[0]).collect();
        assert_eq!(xs, vec![10.0, 20.0]);
    }

    #[test]
    fn single_frame_never_blends_on_cpu() {
        let mut gpu = Recorder::default().with_shader_interpolation(false);
        let mut buf = ModelVertexBuffer::new(&mut gpu, false, true);
        fill(&mut buf, &mut gpu);
        let mut st = PipelineState::default();
        buf.setup_frame(&mut st, &gpu, 0, 0, 0.0, 4);
        assert!(matches!(st.vertex_source, VertexSource::Buffer(_)));
        assert!(buf.blended().is_empty());
    }
}
