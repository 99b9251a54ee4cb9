//! Generation bookkeeping for texture sets.
//!
//! Both renderers keep one set of textures sized to the current frame. When
//! the frame size changes the whole set is replaced at once and the
//! generation counter moves forward, which invalidates every
//! [`TextureHandle`] taken from the old set.

use serde::Serialize;

use super::{AllocationError, RenderError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct TextureExtent {
    pub width: u32,
    pub height: u32,
}

impl TextureExtent {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn as_tuple(self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Reject empty extents and sides over `max_side`.
    pub fn validate(self, max_side: u32) -> Result<Self, AllocationError> {
        if self.width == 0 || self.height == 0 {
            return Err(AllocationError::ZeroSize {
                width: self.width,
                height: self.height,
            });
        }
        if self.width > max_side || self.height > max_side {
            return Err(AllocationError::TooLarge {
                width: self.width,
                height: self.height,
                max: max_side,
            });
        }
        Ok(self)
    }
}

impl From<(u32, u32)> for TextureExtent {
    fn from((width, height): (u32, u32)) -> Self {
        Self::new(width, height)
    }
}

/// Roles within a texture set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TextureSlot {
    Original,
    /// Horizontal blur target.
    Ping,
    /// Vertical blur target.
    Pong,
    Mask,
    Output,
}

impl TextureSlot {
    pub const ALL: [TextureSlot; 5] = [
        TextureSlot::Original,
        TextureSlot::Ping,
        TextureSlot::Pong,
        TextureSlot::Mask,
        TextureSlot::Output,
    ];
}

/// Reference to one texture of a specific allocation generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct TextureHandle {
    pub slot: TextureSlot,
    pub generation: u64,
    pub extent: TextureExtent,
}

/// Snapshot of a renderer's texture set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ResourceState {
    pub extent: Option<TextureExtent>,
    /// Incremented on every (re)allocation; `0` means nothing allocated yet.
    pub generation: u64,
}

impl ResourceState {
    pub fn handle(&self, slot: TextureSlot) -> Option<TextureHandle> {
        self.extent.map(|extent| TextureHandle {
            slot,
            generation: self.generation,
            extent,
        })
    }

    /// Fail with [`RenderError::StaleResources`] unless `handle` belongs to
    /// this allocation.
    pub fn validate(&self, handle: &TextureHandle) -> Result<(), RenderError> {
        if handle.generation == self.generation && Some(handle.extent) == self.extent {
            Ok(())
        } else {
            Err(RenderError::StaleResources {
                handle: *handle,
                current: self.generation,
            })
        }
    }
}

/// Decides when a texture set must be reallocated.
#[derive(Debug, Clone, Default)]
pub struct ResourceTracker {
    state: ResourceState,
}

impl ResourceTracker {
    pub fn state(&self) -> ResourceState {
        self.state
    }

    pub fn needs_allocation(&self, extent: TextureExtent) -> bool {
        self.state.extent != Some(extent)
    }

    /// Record a completed allocation and return its generation.
    pub fn record_allocation(&mut self, extent: TextureExtent) -> u64 {
        self.state.generation += 1;
        self.state.extent = Some(extent);
        self.state.generation
    }
}
