//! Graphics-API seam.
//!
//! *The scene code never talks to a driver directly.*
//! It mutates a [`PipelineState`] and hands [`DrawCommand`]s together with
//! that state to a type that implements [`Gpu`].
//!
//! * Plug an OpenGL, Vulkan or test back-end without touching scene logic.
//! * [`Recorder`] is the CPU back-end: it keeps every command with a
//!   snapshot of the state it was issued under.

use bitflags::bitflags;

use crate::{
    engine::DrawItem,
    world::{MaterialId, PortalId},
};

pub mod recording;
pub mod state;

pub use recording::{Event, Recorded, Recorder};
pub use state::{
    BlendFunc, BoundMaterial, DepthFunc, FrontFace, PassType, PipelineState, PolygonOffset,
    StencilFunc, StencilOp, StencilState, TextureMode, VertexLayout, VertexSource,
};

/// Handle of a driver-side buffer object.
pub type BufferId = u32;

/// Screen rectangle in pixels, origin at the lower-left corner.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IntRect {
    pub x: i32,
    pub y: i32,
    pub w: u32,
    pub h: u32,
}

impl IntRect {
    pub const fn sized(w: u32, h: u32) -> Self {
        Self { x: 0, y: 0, w, h }
    }

    #[inline]
    pub fn aspect(&self) -> f32 {
        self.w as f32 / self.h.max(1) as f32
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ClearFlags: u8 {
        const COLOR   = 0x01;
        const DEPTH   = 0x02;
        const STENCIL = 0x04;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferKind {
    Vertex,
    Index,
}

/// What a stencil draw of a portal footprint is for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FootprintStep {
    /// Raise the stencil value inside the footprint.
    Mark,
    /// Push the depth inside the footprint to the far plane.
    ClearDepth,
    /// Write the footprint's own depth and lower the stencil again.
    Seal,
}

/// One draw submission.
#[derive(Clone, Debug, PartialEq)]
pub enum DrawCommand {
    /// A scene primitive from a draw list.
    Item(DrawItem),
    /// Collect the dynamic lights touching an item without drawing it.
    LightsOnly(DrawItem),
    /// Non-indexed triangle list from the bound vertex source.
    Arrays { start: u32, count: u32 },
    /// Indexed triangle list; `byte_offset` into the bound index buffer.
    Elements { count: u32, byte_offset: usize },
    Footprint { portal: PortalId, step: FootprintStep },
    /// Sky backdrop behind everything else in the current stencil area.
    SkyDome { material: MaterialId },
    /// The flat 2D weapon sprite of the HUD.
    WeaponSprite { material: MaterialId },
}

/// The graphics device as the scene drawer sees it.
///
/// Assumed to always work: there is no failure path for draw submission.
pub trait Gpu {
    fn clear(&mut self, state: &PipelineState, flags: ClearFlags, color: [f32; 3]);

    fn draw(&mut self, state: &PipelineState, cmd: DrawCommand);

    /// `None` when the device cannot allocate buffer objects.
    fn create_buffer(&mut self, kind: BufferKind) -> Option<BufferId>;

    fn upload(&mut self, buffer: BufferId, bytes: &[u8]);

    fn delete_buffer(&mut self, buffer: BufferId);

    /// Block until every submitted command has executed.
    fn finish(&mut self);

    /// Copy RGB pixels of `rect` into `out`, bottom row first.
    fn read_pixels(&mut self, rect: IntRect, out: &mut [u8]);

    /// Vertex-stage keyframe blending is available.
    fn supports_shader_interpolation(&self) -> bool;

    fn ambient_occlude(&mut self, state: &PipelineState);

    /// Copy the finished scene into the texture of stereo eye `eye`.
    fn blit_to_eye(&mut self, eye: usize);
}
