//! Explicit graphics pipeline state.
//!
//! Every pass takes `&mut PipelineState`, changes what it needs and hands
//! it back in the state the next pass documents. The [`Gpu`](super::Gpu)
//! receives a shared borrow with every command and applies it as a whole.

use glam::Mat4;

use crate::{
    renderer::{BufferId, IntRect},
    world::{MaterialId, PortalId},
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DepthFunc {
    #[default]
    Less,
    LessEqual,
    Always,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BlendFunc {
    /// src * 1 + dst * 0
    Replace,
    /// src * a + dst * (1 - a)
    #[default]
    AlphaBlend,
    Additive,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TextureMode {
    #[default]
    Modulate,
    /// Only the alpha channel of the texture is sampled.
    Mask,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FrontFace {
    #[default]
    Ccw,
    Cw,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PassType {
    #[default]
    Normal,
    /// Writes normals for ambient occlusion.
    GBuffer,
}

/// `glPolygonOffset(factor, units)` with the fill offset switch folded in:
/// `None` means disabled.
pub type PolygonOffset = Option<(f32, f32)>;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StencilOp {
    #[default]
    Keep,
    Replace,
    Incr,
    Decr,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StencilFunc {
    #[default]
    Always,
    Equal,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StencilState {
    pub enabled: bool,
    pub func: StencilFunc,
    pub reference: u8,
    pub pass_op: StencilOp,
}

/// Where vertex attributes are pulled from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum VertexSource {
    /// The shared level geometry stream.
    #[default]
    Scene,
    Buffer(BufferId),
    /// CPU-side arrays of the model buffer that was last set up.
    Client,
}

/// Byte offsets of the four model attributes inside the bound source.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct VertexLayout {
    pub stride: usize,
    pub position: usize,
    pub texcoord: usize,
    pub position2: usize,
    pub normal: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoundMaterial {
    pub id: MaterialId,
    pub clamp_no_filter: bool,
    pub translation: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PipelineState {
    pub viewport: IntRect,
    pub scissor: Option<IntRect>,
    pub depth_test: bool,
    pub depth_func: DepthFunc,
    pub depth_write: bool,
    pub color_write: bool,
    pub stencil: StencilState,
    /// Fragments with alpha below this are discarded.
    pub alpha_threshold: f32,
    pub blend: BlendFunc,
    pub texturing: bool,
    pub texture_mode: TextureMode,
    pub brightmaps: bool,
    pub fog: bool,
    pub polygon_offset: PolygonOffset,
    pub cull: bool,
    pub front_face: FrontFace,
    pub pass: PassType,

    pub projection: Mat4,
    pub view: Mat4,
    pub normal_view: Mat4,
    /// `Some` while a model transform is installed.
    pub model: Option<Mat4>,

    pub vertex_source: VertexSource,
    pub layout: VertexLayout,
    pub interpolation: f32,
    pub material: Option<BoundMaterial>,
    /// Index into the frame's dynamic light buffer, -1 for none.
    pub light_index: i32,
    /// Portal whose footprint is currently being stenciled.
    pub portal: Option<PortalId>,
}

impl Default for PipelineState {
    fn default() -> Self {
        Self {
            viewport: IntRect::default(),
            scissor: None,
            depth_test: true,
            depth_func: DepthFunc::Less,
            depth_write: true,
            color_write: true,
            stencil: StencilState::default(),
            alpha_threshold: 0.5,
            blend: BlendFunc::AlphaBlend,
            texturing: true,
            texture_mode: TextureMode::Modulate,
            brightmaps: false,
            fog: false,
            polygon_offset: None,
            cull: false,
            front_face: FrontFace::Ccw,
            pass: PassType::Normal,
            projection: Mat4::IDENTITY,
            view: Mat4::IDENTITY,
            normal_view: Mat4::IDENTITY,
            model: None,
            vertex_source: VertexSource::Scene,
            layout: VertexLayout::default(),
            interpolation: 0.0,
            material: None,
            light_index: -1,
            portal: None,
        }
    }
}

impl PipelineState {
    /// Back to the documented checkpoint: depth `Less` with writes, alpha
    /// blending, texturing on in modulate mode, no offset and no culling.
    /// Matrices, viewport and stencil are left alone.
    pub fn restore_standard(&mut self) {
        self.depth_func = DepthFunc::Less;
        self.depth_write = true;
        self.color_write = true;
        self.alpha_threshold = 0.5;
        self.blend = BlendFunc::AlphaBlend;
        self.texturing = true;
        self.texture_mode = TextureMode::Modulate;
        self.brightmaps = false;
        self.polygon_offset = None;
        self.cull = false;
        self.front_face = FrontFace::Ccw;
        self.model = None;
        self.interpolation = 0.0;
    }

    /// True when every field [`restore_standard`](Self::restore_standard)
    /// resets holds its standard value.
    pub fn is_standard(&self) -> bool {
        let mut standard = self.clone();
        standard.restore_standard();
        standard == *self
    }
}
