//! Placement geometry for drawing a frame inside its host surface
//!
//! Pure math used by the host's render callback: the swapchain hands out the
//! frame size, the host surface knows its own bounds, and the placement
//! policy decides where the frame lands. `Cover` and `Contain` scale while
//! preserving aspect ratio; the anchored variants keep the frame unscaled
//! and pin it per axis.

use glam::{UVec2, Vec2};

/// Placement policy for a frame inside its container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Scale to fill the container completely, cropping overflow
    Cover,
    /// Scale to fit entirely inside the container, letterboxing the rest
    Contain,
    /// Unscaled, centered on both axes
    Center,
    TopLeft,
    TopCenter,
    TopRight,
    CenterLeft,
    CenterRight,
    BottomLeft,
    BottomCenter,
    BottomRight,
}

impl Default for Placement {
    fn default() -> Self {
        Placement::Center
    }
}

/// Where and how large a frame is drawn, in container coordinates
///
/// Offsets may be negative (cropped placements extend past the container).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlacedRect {
    pub offset: Vec2,
    pub size: Vec2,
}

fn center(dst: f32, src: f32) -> f32 {
    (dst - src) / 2.0
}

fn end(dst: f32, src: f32) -> f32 {
    dst - src
}

fn placed(x: f32, y: f32, size: Vec2) -> PlacedRect {
    PlacedRect {
        offset: Vec2::new(x, y),
        size,
    }
}

fn cover(container: Vec2, content: Vec2) -> PlacedRect {
    let dst_ratio = container.x / container.y;
    let src_ratio = content.x / content.y;
    let size = if dst_ratio > src_ratio {
        Vec2::new(container.x, container.x / src_ratio)
    } else {
        Vec2::new(container.y * src_ratio, container.y)
    };
    placed(center(container.x, size.x), center(container.y, size.y), size)
}

fn contain(container: Vec2, content: Vec2) -> PlacedRect {
    let dst_ratio = container.x / container.y;
    let src_ratio = content.x / content.y;
    let size = if src_ratio <= dst_ratio {
        Vec2::new(container.y * src_ratio, container.y)
    } else {
        Vec2::new(container.x, container.x / src_ratio)
    };
    placed(center(container.x, size.x), center(container.y, size.y), size)
}

/// Compute where `content` lands inside `container` under `placement`
pub fn compute_placement(placement: Placement, container: Vec2, content: Vec2) -> PlacedRect {
    match placement {
        Placement::Cover => cover(container, content),
        Placement::Contain => contain(container, content),
        Placement::Center => placed(
            center(container.x, content.x),
            center(container.y, content.y),
            content,
        ),
        Placement::TopLeft => placed(0.0, 0.0, content),
        Placement::TopCenter => placed(center(container.x, content.x), 0.0, content),
        Placement::TopRight => placed(end(container.x, content.x), 0.0, content),
        Placement::CenterLeft => placed(0.0, center(container.y, content.y), content),
        Placement::CenterRight => placed(
            end(container.x, content.x),
            center(container.y, content.y),
            content,
        ),
        Placement::BottomLeft => placed(0.0, end(container.y, content.y), content),
        Placement::BottomCenter => placed(
            center(container.x, content.x),
            end(container.y, content.y),
            content,
        ),
        Placement::BottomRight => placed(
            end(container.x, content.x),
            end(container.y, content.y),
            content,
        ),
    }
}

/// Physical pixel size of a surface, from its logical size and scale factors
///
/// Rounds up so the backing textures never undershoot the surface; a
/// degenerate logical size still yields at least one pixel per axis.
pub fn physical_size(logical: Vec2, user_scale: f32, screen_scale: f32) -> UVec2 {
    let scaled = logical * user_scale * screen_scale;
    UVec2::new(
        (scaled.x.ceil() as u32).max(1),
        (scaled.y.ceil() as u32).max(1),
    )
}

#[cfg(test)]
#[path = "placement_tests.rs"]
mod tests;
