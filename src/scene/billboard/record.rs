//! Billboard sprite records.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use glam::{Vec2, Vec3};

use super::list::CollectionCore;

/// Horizontal anchor of a billboard quad relative to its world position.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HorizontalOrigin {
    /// Quad extends rightward from the anchor point.
    Left = 0,
    /// Quad is centered on the anchor point.
    #[default]
    Center = 1,
    /// Quad extends leftward from the anchor point.
    Right = 2,
}

/// Vertical anchor of a billboard quad relative to its world position.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VerticalOrigin {
    /// Quad extends upward from the anchor point.
    Bottom = 0,
    /// Quad is centered on the anchor point.
    #[default]
    Center = 1,
    /// Quad extends downward from the anchor point.
    Top = 2,
}

/// Sub-region of the atlas texture, as lower-left and upper-right UV
/// corners (bottom-left-origin convention).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextureRect {
    /// Lower-left UV corner.
    pub lower_left: Vec2,
    /// Upper-right UV corner.
    pub upper_right: Vec2,
}

impl TextureRect {
    /// The whole atlas texture.
    pub const FULL: Self = Self {
        lower_left: Vec2::ZERO,
        upper_right: Vec2::ONE,
    };

    /// Rect from explicit corners.
    #[must_use]
    pub fn new(lower_left: Vec2, upper_right: Vec2) -> Self {
        Self {
            lower_left,
            upper_right,
        }
    }
}

impl Default for TextureRect {
    fn default() -> Self {
        Self::FULL
    }
}

/// Copy of a record's content fields taken at upload time.
#[derive(Debug, Clone, Copy)]
pub(crate) struct AttributeSnapshot {
    pub(crate) position: Vec3,
    pub(crate) color: [f32; 4],
    pub(crate) texture_rect: TextureRect,
    pub(crate) horizontal_origin: HorizontalOrigin,
    pub(crate) vertical_origin: VerticalOrigin,
    pub(crate) pixel_offset: Vec2,
}

#[derive(Debug)]
struct RecordState {
    position: Vec3,
    color: [f32; 4],
    texture_rect: TextureRect,
    horizontal_origin: HorizontalOrigin,
    vertical_origin: VerticalOrigin,
    pixel_offset: Vec2,
    // Bookkeeping below is written only by the owning collection.
    buffer_offset: usize,
    dirty: bool,
    owner: Option<Weak<RefCell<CollectionCore>>>,
}

/// One camera-facing sprite.
///
/// A `Billboard` is a cheap-to-clone handle with reference identity: two
/// clones refer to the same record, and equality compares identity, not
/// content. Records are created detached; adding one to a
/// [`super::BillboardCollection`] makes it live. Content mutations on a
/// live record enqueue it for a partial GPU update at the collection's
/// next render.
#[derive(Debug, Clone)]
pub struct Billboard {
    state: Rc<RefCell<RecordState>>,
}

impl Billboard {
    /// A detached billboard at `position` with default appearance: white,
    /// full texture rect, centered origin, no pixel offset.
    #[must_use]
    pub fn new(position: Vec3) -> Self {
        Self {
            state: Rc::new(RefCell::new(RecordState {
                position,
                color: [1.0; 4],
                texture_rect: TextureRect::FULL,
                horizontal_origin: HorizontalOrigin::Center,
                vertical_origin: VerticalOrigin::Center,
                pixel_offset: Vec2::ZERO,
                buffer_offset: 0,
                dirty: false,
                owner: None,
            })),
        }
    }

    /// World-space position.
    pub fn position(&self) -> Vec3 {
        self.state.borrow().position
    }

    /// Set the world-space position.
    pub fn set_position(&self, position: Vec3) {
        self.state.borrow_mut().position = position;
        self.mark_dirty();
    }

    /// RGBA color, each channel in `[0, 1]`.
    pub fn color(&self) -> [f32; 4] {
        self.state.borrow().color
    }

    /// Set the RGBA color. Channels are quantized to 8 bits on upload.
    pub fn set_color(&self, color: [f32; 4]) {
        self.state.borrow_mut().color = color;
        self.mark_dirty();
    }

    /// Atlas sub-region this sprite samples.
    pub fn texture_rect(&self) -> TextureRect {
        self.state.borrow().texture_rect
    }

    /// Set the atlas sub-region. The quad is sized to the sub-region's
    /// pixel dimensions.
    pub fn set_texture_rect(&self, texture_rect: TextureRect) {
        self.state.borrow_mut().texture_rect = texture_rect;
        self.mark_dirty();
    }

    /// Horizontal anchor alignment.
    pub fn horizontal_origin(&self) -> HorizontalOrigin {
        self.state.borrow().horizontal_origin
    }

    /// Set the horizontal anchor alignment.
    pub fn set_horizontal_origin(&self, origin: HorizontalOrigin) {
        self.state.borrow_mut().horizontal_origin = origin;
        self.mark_dirty();
    }

    /// Vertical anchor alignment.
    pub fn vertical_origin(&self) -> VerticalOrigin {
        self.state.borrow().vertical_origin
    }

    /// Set the vertical anchor alignment.
    pub fn set_vertical_origin(&self, origin: VerticalOrigin) {
        self.state.borrow_mut().vertical_origin = origin;
        self.mark_dirty();
    }

    /// Screen-space offset in pixels applied after projection (+y up).
    pub fn pixel_offset(&self) -> Vec2 {
        self.state.borrow().pixel_offset
    }

    /// Set the screen-space pixel offset. Stored as a half-precision pair
    /// on upload.
    pub fn set_pixel_offset(&self, pixel_offset: Vec2) {
        self.state.borrow_mut().pixel_offset = pixel_offset;
        self.mark_dirty();
    }

    /// Slot index into the owning collection's attribute buffers. Only
    /// meaningful while the record is live and the collection has
    /// reconciled.
    pub fn buffer_offset(&self) -> usize {
        self.state.borrow().buffer_offset
    }

    /// Whether GPU-resident content is stale relative to this record.
    pub fn is_dirty(&self) -> bool {
        self.state.borrow().dirty
    }

    /// Whether this record currently belongs to a collection.
    pub fn is_live(&self) -> bool {
        self.state.borrow().owner.is_some()
    }

    /// Flag the record stale and enqueue it in the owner's dirty set.
    /// No-op when detached or already enqueued.
    fn mark_dirty(&self) {
        let owner = {
            let mut state = self.state.borrow_mut();
            if state.dirty || state.owner.is_none() {
                None
            } else {
                state.dirty = true;
                state.owner.clone()
            }
        };
        if let Some(core) = owner.and_then(|weak| weak.upgrade()) {
            core.borrow_mut().dirty.push(self.clone());
        }
    }

    pub(crate) fn owner(&self) -> Option<Weak<RefCell<CollectionCore>>> {
        self.state.borrow().owner.clone()
    }

    pub(crate) fn set_owner(&self, owner: Weak<RefCell<CollectionCore>>) {
        self.state.borrow_mut().owner = Some(owner);
    }

    /// Clear dirty/offset/owner; the record may then join another
    /// collection.
    pub(crate) fn detach(&self) {
        let mut state = self.state.borrow_mut();
        state.dirty = false;
        state.owner = None;
        state.buffer_offset = 0;
    }

    /// Assign the record's slot during a full rewrite, clearing staleness.
    pub(crate) fn assign_slot(&self, buffer_offset: usize) {
        let mut state = self.state.borrow_mut();
        state.buffer_offset = buffer_offset;
        state.dirty = false;
    }

    pub(crate) fn clear_dirty(&self) {
        self.state.borrow_mut().dirty = false;
    }

    pub(crate) fn snapshot(&self) -> AttributeSnapshot {
        let state = self.state.borrow();
        AttributeSnapshot {
            position: state.position,
            color: state.color,
            texture_rect: state.texture_rect,
            horizontal_origin: state.horizontal_origin,
            vertical_origin: state.vertical_origin,
            pixel_offset: state.pixel_offset,
        }
    }
}

impl PartialEq for Billboard {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.state, &other.state)
    }
}

impl Eq for Billboard {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let b = Billboard::new(Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(b.position(), Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(b.color(), [1.0; 4]);
        assert_eq!(b.texture_rect(), TextureRect::FULL);
        assert_eq!(b.horizontal_origin(), HorizontalOrigin::Center);
        assert_eq!(b.vertical_origin(), VerticalOrigin::Center);
        assert_eq!(b.pixel_offset(), Vec2::ZERO);
        assert!(!b.is_dirty());
        assert!(!b.is_live());
    }

    #[test]
    fn clones_share_identity() {
        let a = Billboard::new(Vec3::ZERO);
        let b = a.clone();
        b.set_position(Vec3::X);
        assert_eq!(a.position(), Vec3::X);
        assert_eq!(a, b);
        assert_ne!(a, Billboard::new(Vec3::ZERO));
    }

    #[test]
    fn detached_mutation_does_not_mark_dirty() {
        let b = Billboard::new(Vec3::ZERO);
        b.set_color([0.5, 0.5, 0.5, 1.0]);
        b.set_pixel_offset(Vec2::new(4.0, -2.0));
        assert!(!b.is_dirty());
    }
}
