//! ----------------------------------------------------------------------------
//! **Angular clipper**
//!
//! Keeps the set of view angles that are already fully covered by solid
//! geometry, as sorted, coalesced, non-wrapping ranges of binary angles.
//!
//! * The BSP walk asks [`Clipper::safe_check_range`] before descending into a
//!   node or emitting a seg.
//! * Solid walls and portal lines close their arc with
//!   [`Clipper::safe_add_clip_range`].
//!
//! Arcs run counter-clockwise from `start` to `end`. The "safe" calls accept
//! arcs that wrap through angle 0 and split them in two.
//! ----------------------------------------------------------------------------

use std::f32::consts::TAU;

use glam::Vec2;

/// 32-bit binary angle: the full circle maps onto `u32`.
pub type Bam = u32;

pub const ANG45: Bam = 0x2000_0000;
pub const ANG90: Bam = 0x4000_0000;
pub const ANG180: Bam = 0x8000_0000;
pub const ANG270: Bam = 0xC000_0000;
pub const ANGLE_MAX: Bam = u32::MAX;

#[inline]
fn bam_from_turns(turns: f32) -> Bam {
    // rem_euclid can round up to exactly 1.0; the u32 cast wraps that to 0.
    (turns.rem_euclid(1.0) as f64 * 4_294_967_296.0) as u64 as Bam
}

#[inline]
pub fn bam_from_radians(r: f32) -> Bam {
    bam_from_turns(r / TAU)
}

#[inline]
pub fn bam_from_degrees(d: f32) -> Bam {
    bam_from_turns(d / 360.0)
}

#[inline]
pub fn bam_to_degrees(a: Bam) -> f32 {
    (a as f64 * 360.0 / 4_294_967_296.0) as f32
}

/// Direction from `from` to `to`.
#[inline]
pub fn point_to_bam(from: Vec2, to: Vec2) -> Bam {
    let d = to - from;
    bam_from_radians(d.y.atan2(d.x))
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ClipRange {
    pub first: Bam,
    pub last: Bam,
}

#[derive(Debug, Default)]
pub struct Clipper {
    ranges: Vec<ClipRange>,
}

impl Clipper {
    pub fn clear(&mut self) {
        self.ranges.clear();
    }

    pub fn ranges(&self) -> &[ClipRange] {
        &self.ranges
    }

    /// Everything is covered; nothing more can become visible.
    pub fn is_full(&self) -> bool {
        matches!(self.ranges.as_slice(), [ClipRange { first: 0, last: ANGLE_MAX }])
    }

    /// Add a non-wrapping range `first ..= last`.
    pub fn add_clip_range(&mut self, first: Bam, last: Bam) {
        debug_assert!(first <= last);
        let mut i = 0;
        // 1) skip all ranges that end *before* ours minus one
        while i < self.ranges.len() && self.ranges[i].last < first.saturating_sub(1) {
            i += 1;
        }

        // swallowed by an existing range
        if i < self.ranges.len() && first >= self.ranges[i].first && last <= self.ranges[i].last
        {
            return;
        }

        // 2) merge every overlapping or adjacent range
        let mut new_first = first;
        let mut new_last = last;
        while i < self.ranges.len() && self.ranges[i].first <= last.saturating_add(1) {
            new_first = new_first.min(self.ranges[i].first);
            new_last = new_last.max(self.ranges[i].last);
            self.ranges.remove(i);
        }

        // 3) insert the coalesced range in its sorted place
        self.ranges.insert(
            i,
            ClipRange {
                first: new_first,
                last: new_last,
            },
        );
    }

    /// Add the counter-clockwise arc `start → end`, wrapping through 0 if
    /// needed.
    pub fn safe_add_clip_range(&mut self, start: Bam, end: Bam) {
        if start > end {
            self.add_clip_range(start, ANGLE_MAX);
            self.add_clip_range(0, end);
        } else {
            self.add_clip_range(start, end);
        }
    }

    /// True if any angle of the non-wrapping range is still open.
    pub fn is_range_visible(&self, first: Bam, last: Bam) -> bool {
        // Ranges are coalesced, so full coverage means one range holds it all.
        !self
            .ranges
            .iter()
            .any(|r| r.first <= first && r.last >= last)
    }

    pub fn safe_check_range(&self, start: Bam, end: Bam) -> bool {
        if start > end {
            self.is_range_visible(start, ANGLE_MAX) || self.is_range_visible(0, end)
        } else {
            self.is_range_visible(start, end)
        }
    }
}

/*====================================================================*/
/*                                Tests                                */
/*====================================================================*/
