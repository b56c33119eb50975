//! System-memory staging for the GPU attribute buffer set.
//!
//! Five parallel byte arrays, one slot per sprite, in the exact byte
//! layout the shader consumes. The arrays are the source for both full
//! buffer creation and coalesced partial writes.

use half::f16;

use super::record::{AttributeSnapshot, HorizontalOrigin, VerticalOrigin};

/// Bytes per slot in the position array (3 × f32).
pub(crate) const POSITION_STRIDE: usize = 12;
/// Bytes per slot in the color array (4 × u8 RGBA).
pub(crate) const COLOR_STRIDE: usize = 4;
/// Bytes per slot in the origin array (1 packed byte).
pub(crate) const ORIGIN_STRIDE: usize = 1;
/// Bytes per slot in the pixel-offset array (2 × f16).
pub(crate) const PIXEL_OFFSET_STRIDE: usize = 4;
/// Bytes per slot in the texture-rect array (4 × f16).
pub(crate) const TEXTURE_RECT_STRIDE: usize = 8;

/// Quantize an RGBA color to 8 bits per channel.
pub(crate) fn pack_color(color: [f32; 4]) -> [u8; 4] {
    color.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8)
}

/// Pack the two origin enums into one byte: `horizontal | (vertical << 2)`.
pub(crate) fn pack_origin(
    horizontal: HorizontalOrigin,
    vertical: VerticalOrigin,
) -> u8 {
    (horizontal as u8) | ((vertical as u8) << 2)
}

fn pack_f16_pair(x: f32, y: f32) -> [u8; 4] {
    let [x0, x1] = f16::from_f32(x).to_le_bytes();
    let [y0, y1] = f16::from_f32(y).to_le_bytes();
    [x0, x1, y0, y1]
}

/// A maximal run of consecutive dirty buffer slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DirtyRun {
    /// First slot in the run.
    pub(crate) first: usize,
    /// Number of consecutive slots.
    pub(crate) len: usize,
}

/// Coalesce ascending slot offsets into maximal consecutive runs. A run
/// breaks whenever the next offset is not exactly one greater than the
/// previous.
pub(crate) fn coalesce_runs(
    offsets: impl IntoIterator<Item = usize>,
) -> Vec<DirtyRun> {
    let mut runs: Vec<DirtyRun> = Vec::new();
    for offset in offsets {
        match runs.last_mut() {
            Some(run) if offset == run.first + run.len => run.len += 1,
            _ => runs.push(DirtyRun {
                first: offset,
                len: 1,
            }),
        }
    }
    runs
}

const fn pad4(n: usize) -> usize {
    (n + 3) & !3
}

/// Byte range of `run` in an attribute array with the given per-slot
/// stride.
pub(crate) fn run_bytes(
    array: &[u8],
    stride: usize,
    run: DirtyRun,
) -> (u64, &[u8]) {
    let start = run.first * stride;
    let end = start + run.len * stride;
    (start as u64, &array[start..end])
}

/// CPU mirror of the five parallel attribute arrays.
///
/// The origin array is padded to a 4-byte multiple so partial uploads can
/// satisfy `wgpu::COPY_BUFFER_ALIGNMENT` by widening to the enclosing
/// aligned window.
#[derive(Debug, Default)]
pub(crate) struct AttributeArrays {
    positions: Vec<u8>,
    colors: Vec<u8>,
    origins: Vec<u8>,
    pixel_offsets: Vec<u8>,
    texture_rects: Vec<u8>,
    count: usize,
}

impl AttributeArrays {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Resize every array to `count` slots, zero-filling new slots.
    pub(crate) fn resize(&mut self, count: usize) {
        self.positions.resize(count * POSITION_STRIDE, 0);
        self.colors.resize(count * COLOR_STRIDE, 0);
        self.origins.resize(pad4(count * ORIGIN_STRIDE), 0);
        self.pixel_offsets.resize(count * PIXEL_OFFSET_STRIDE, 0);
        self.texture_rects.resize(count * TEXTURE_RECT_STRIDE, 0);
        self.count = count;
    }

    /// Number of slots.
    pub(crate) fn count(&self) -> usize {
        self.count
    }

    /// Pack one record's full attribute set into its slot.
    pub(crate) fn pack_slot(&mut self, slot: usize, snap: &AttributeSnapshot) {
        let p = slot * POSITION_STRIDE;
        for (i, c) in snap.position.to_array().iter().enumerate() {
            self.positions[p + 4 * i..p + 4 * (i + 1)]
                .copy_from_slice(&c.to_le_bytes());
        }

        let c = slot * COLOR_STRIDE;
        self.colors[c..c + COLOR_STRIDE]
            .copy_from_slice(&pack_color(snap.color));

        self.origins[slot] =
            pack_origin(snap.horizontal_origin, snap.vertical_origin);

        let o = slot * PIXEL_OFFSET_STRIDE;
        self.pixel_offsets[o..o + PIXEL_OFFSET_STRIDE].copy_from_slice(
            &pack_f16_pair(snap.pixel_offset.x, snap.pixel_offset.y),
        );

        let t = slot * TEXTURE_RECT_STRIDE;
        let rect = snap.texture_rect;
        self.texture_rects[t..t + 4].copy_from_slice(&pack_f16_pair(
            rect.lower_left.x,
            rect.lower_left.y,
        ));
        self.texture_rects[t + 4..t + 8].copy_from_slice(&pack_f16_pair(
            rect.upper_right.x,
            rect.upper_right.y,
        ));
    }

    pub(crate) fn positions(&self) -> &[u8] {
        &self.positions
    }

    pub(crate) fn colors(&self) -> &[u8] {
        &self.colors
    }

    pub(crate) fn origins(&self) -> &[u8] {
        &self.origins
    }

    pub(crate) fn pixel_offsets(&self) -> &[u8] {
        &self.pixel_offsets
    }

    pub(crate) fn texture_rects(&self) -> &[u8] {
        &self.texture_rects
    }

    /// Byte range of `run` in the origin array, widened to the enclosing
    /// 4-byte-aligned window (the array itself is padded, so the window
    /// never runs out of bounds).
    pub(crate) fn origin_window(&self, run: DirtyRun) -> (u64, &[u8]) {
        let start = (run.first * ORIGIN_STRIDE) & !3;
        let end = pad4((run.first + run.len) * ORIGIN_STRIDE);
        (start as u64, &self.origins[start..end])
    }
}

#[cfg(test)]
mod tests {
    use glam::{Vec2, Vec3};

    use super::*;
    use crate::scene::billboard::record::TextureRect;

    fn snapshot() -> AttributeSnapshot {
        AttributeSnapshot {
            position: Vec3::new(1.0, -2.0, 0.5),
            color: [1.0, 0.5, 0.0, 1.0],
            texture_rect: TextureRect::new(
                Vec2::new(0.25, 0.5),
                Vec2::new(0.75, 1.0),
            ),
            horizontal_origin: HorizontalOrigin::Right,
            vertical_origin: VerticalOrigin::Top,
            pixel_offset: Vec2::new(8.0, -4.0),
        }
    }

    #[test]
    fn color_quantization_rounds_and_clamps() {
        assert_eq!(pack_color([0.0, 1.0, 0.5, 1.0]), [0, 255, 128, 255]);
        assert_eq!(pack_color([-0.5, 1.5, 0.2, 0.0]), [0, 255, 51, 0]);
    }

    #[test]
    fn origin_byte_layout() {
        assert_eq!(
            pack_origin(HorizontalOrigin::Left, VerticalOrigin::Bottom),
            0
        );
        assert_eq!(
            pack_origin(HorizontalOrigin::Right, VerticalOrigin::Top),
            0b10_10
        );
        assert_eq!(
            pack_origin(HorizontalOrigin::Center, VerticalOrigin::Center),
            0b01_01
        );
    }

    #[test]
    fn f16_pair_matches_half_crate() {
        let bytes = pack_f16_pair(1.0, -2.0);
        assert_eq!(&bytes[0..2], &f16::from_f32(1.0).to_le_bytes());
        assert_eq!(&bytes[2..4], &f16::from_f32(-2.0).to_le_bytes());
    }

    #[test]
    fn coalesce_consecutive_offsets() {
        assert_eq!(
            coalesce_runs([1, 2, 4]),
            vec![
                DirtyRun { first: 1, len: 2 },
                DirtyRun { first: 4, len: 1 },
            ]
        );
        assert_eq!(
            coalesce_runs([0, 1, 2]),
            vec![DirtyRun { first: 0, len: 3 }]
        );
        assert_eq!(coalesce_runs(std::iter::empty::<usize>()), vec![]);
    }

    #[test]
    fn pack_slot_writes_wire_layout() {
        let mut arrays = AttributeArrays::new();
        arrays.resize(3);
        let snap = snapshot();
        arrays.pack_slot(1, &snap);

        let p = &arrays.positions()[POSITION_STRIDE..2 * POSITION_STRIDE];
        assert_eq!(&p[0..4], &1.0_f32.to_le_bytes());
        assert_eq!(&p[4..8], &(-2.0_f32).to_le_bytes());
        assert_eq!(&p[8..12], &0.5_f32.to_le_bytes());

        assert_eq!(
            &arrays.colors()[COLOR_STRIDE..2 * COLOR_STRIDE],
            &[255, 128, 0, 255]
        );
        assert_eq!(arrays.origins()[1], 0b10_10);

        let o =
            &arrays.pixel_offsets()[PIXEL_OFFSET_STRIDE..2 * PIXEL_OFFSET_STRIDE];
        assert_eq!(&o[0..2], &f16::from_f32(8.0).to_le_bytes());
        assert_eq!(&o[2..4], &f16::from_f32(-4.0).to_le_bytes());

        let t = &arrays.texture_rects()
            [TEXTURE_RECT_STRIDE..2 * TEXTURE_RECT_STRIDE];
        assert_eq!(&t[0..2], &f16::from_f32(0.25).to_le_bytes());
        assert_eq!(&t[2..4], &f16::from_f32(0.5).to_le_bytes());
        assert_eq!(&t[4..6], &f16::from_f32(0.75).to_le_bytes());
        assert_eq!(&t[6..8], &f16::from_f32(1.0).to_le_bytes());
    }

    #[test]
    fn origin_array_padded_for_alignment() {
        let mut arrays = AttributeArrays::new();
        arrays.resize(5);
        assert_eq!(arrays.origins().len(), 8);

        let (offset, bytes) = arrays.origin_window(DirtyRun { first: 4, len: 1 });
        assert_eq!(offset, 4);
        assert_eq!(bytes.len(), 4);

        let (offset, bytes) = arrays.origin_window(DirtyRun { first: 1, len: 2 });
        assert_eq!(offset, 0);
        assert_eq!(bytes.len(), 4);
    }

    #[test]
    fn run_bytes_spans_whole_run() {
        let mut arrays = AttributeArrays::new();
        arrays.resize(4);
        let (offset, bytes) = run_bytes(
            arrays.positions(),
            POSITION_STRIDE,
            DirtyRun { first: 1, len: 2 },
        );
        assert_eq!(offset, 12);
        assert_eq!(bytes.len(), 24);
    }
}
