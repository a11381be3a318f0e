//! ---------------------------------------------------------------------------
//! CPU back-end that records instead of rasterising
//!
//! * Keeps every submission together with a snapshot of the pipeline state
//!   it was issued under, so callers can assert on pass ordering.
//! * Owns a top-to-bottom RGB scratch frame-buffer (cleared, never drawn
//!   into) so pixel read-back has something real to copy.
//! * Buffer objects live in a `HashMap` of byte vectors.
//! ---------------------------------------------------------------------------

use std::collections::HashMap;

use log::trace;

use crate::renderer::{
    BufferId, BufferKind, ClearFlags, DrawCommand, Gpu, IntRect, PipelineState,
};

/// One draw submission with the state it saw.
#[derive(Clone, Debug, PartialEq)]
pub struct Recorded {
    pub cmd: DrawCommand,
    pub state: PipelineState,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    Clear { flags: ClearFlags, viewport: IntRect },
    Draw(Recorded),
    AmbientOcclusion,
    BlitToEye(usize),
    Finish,
}

pub struct Recorder {
    pub log: Vec<Event>,
    buffers: HashMap<BufferId, (BufferKind, Vec<u8>)>,
    next_buffer: BufferId,
    hardware_buffers: bool,
    shader_interpolation: bool,

    scratch: Vec<u8>,
    width: usize,
    height: usize,
}

impl Default for Recorder {
    fn default() -> Self {
        Self {
            log: Vec::new(),
            buffers: HashMap::new(),
            next_buffer: 1,
            hardware_buffers: true,
            shader_interpolation: true,
            scratch: Vec::new(),
            width: 0,
            height: 0,
        }
    }
}

impl Recorder {
    /// A device without buffer objects or vertex-stage interpolation.
    pub fn legacy() -> Self {
        Self {
            hardware_buffers: false,
            shader_interpolation: false,
            ..Self::default()
        }
    }

    pub fn with_shader_interpolation(mut self, on: bool) -> Self {
        self.shader_interpolation = on;
        self
    }

    pub fn reset(&mut self) {
        self.log.clear();
    }

    /// Every draw submission in issue order.
    pub fn draws(&self) -> impl Iterator<Item = &Recorded> {
        self.log.iter().filter_map(|e| match e {
            Event::Draw(r) => Some(r),
            _ => None,
        })
    }

    /// Bytes last uploaded into `buffer`.
    pub fn buffer(&self, buffer: BufferId) -> Option<&[u8]> {
        self.buffers.get(&buffer).map(|(_, b)| b.as_slice())
    }

    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    /// (Re)allocate the scratch frame-buffer; contents are black.
    pub fn resize(&mut self, w: usize, h: usize) {
        if w != self.width || h != self.height {
            self.width = w;
            self.height = h;
            self.scratch = vec![0; w * h * 3];
        }
    }

    /// Top-to-bottom RGB rows.
    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.scratch
    }

    fn fill(&mut self, rgb: [u8; 3]) {
        for px in self.scratch.chunks_exact_mut(3) {
            px.copy_from_slice(&rgb);
        }
    }
}

/*──────────────────────── Gpu trait impl ────────────────────────*/
impl Gpu for Recorder {
    fn clear(&mut self, state: &PipelineState, flags: ClearFlags, color: [f32; 3]) {
        let vp = state.viewport;
        self.resize(vp.w as usize, vp.h as usize);
        if flags.contains(ClearFlags::COLOR) {
            self.fill(color.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8));
        }
        self.log.push(Event::Clear {
            flags,
            viewport: vp,
        });
    }

    fn draw(&mut self, state: &PipelineState, cmd: DrawCommand) {
        self.log.push(Event::Draw(Recorded {
            cmd,
            state: state.clone(),
        }));
    }

    fn create_buffer(&mut self, kind: BufferKind) -> Option<BufferId> {
        if !self.hardware_buffers {
            return None;
        }
        let id = self.next_buffer;
        self.next_buffer += 1;
        self.buffers.insert(id, (kind, Vec::new()));
        Some(id)
    }

    fn upload(&mut self, buffer: BufferId, bytes: &[u8]) {
        if let Some((_, data)) = self.buffers.get_mut(&buffer) {
            data.clear();
            data.extend_from_slice(bytes);
        }
    }

    fn delete_buffer(&mut self, buffer: BufferId) {
        self.buffers.remove(&buffer);
    }

    fn finish(&mut self) {
        trace!("recorder: finish after {} events", self.log.len());
        self.log.push(Event::Finish);
    }

    fn read_pixels(&mut self, rect: IntRect, out: &mut [u8]) {
        let row = rect.w as usize * 3;
        let x0 = rect.x.max(0) as usize;
        let y0 = rect.y.max(0) as usize;
        // GL origin is the bottom row; our scratch is stored top first.
        for (i, dst) in out.chunks_exact_mut(row).enumerate() {
            let gl_y = y0 + i;
            if gl_y >= self.height || x0 + rect.w as usize > self.width {
                dst.fill(0);
                continue;
            }
            let mem_y = self.height - 1 - gl_y;
            let start = (mem_y * self.width + x0) * 3;
            dst.copy_from_slice(&self.scratch[start..start + row]);
        }
    }

    fn supports_shader_interpolation(&self) -> bool {
        self.shader_interpolation
    }

    fn ambient_occlude(&mut self, _state: &PipelineState) {
        self.log.push(Event::AmbientOcclusion);
    }

    fn blit_to_eye(&mut self, eye: usize) {
        self.log.push(Event::BlitToEye(eye));
    }
}

/*====================================================================*/
/*                                Tests                                */
/*====================================================================*/
