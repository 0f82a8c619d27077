//! The attribute bag carried by every node, and the change keys fired by
//! attribute setters.

use crate::transform::Transform;

/// Identifies which attribute a change notification refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Attr {
    /// Position x.
    X,
    /// Position y.
    Y,
    /// Scale factor x.
    ScaleX,
    /// Scale factor y.
    ScaleY,
    /// Rotation (radians).
    Rotation,
    /// Shear factor x.
    SkewX,
    /// Shear factor y.
    SkewY,
    /// Pivot offset x.
    OffsetX,
    /// Pivot offset y.
    OffsetY,
    /// Node opacity.
    Opacity,
    /// Visibility flag.
    Visible,
    /// Hit-testing participation flag.
    Listening,
    /// Diagnostic / lookup name.
    Name,
    /// Container clip region.
    Clip,
    /// Shape style (fill/stroke/shadow).
    Style,
    /// Shape draw callback.
    DrawFn,
}

impl Attr {
    /// Whether a change to this attribute moves the node in space, dirtying
    /// memoized absolute transforms below it.
    pub(crate) fn affects_transform(self) -> bool {
        matches!(
            self,
            Attr::X
                | Attr::Y
                | Attr::ScaleX
                | Attr::ScaleY
                | Attr::Rotation
                | Attr::SkewX
                | Attr::SkewY
                | Attr::OffsetX
                | Attr::OffsetY
        )
    }

    /// Whether a change to this attribute alters rendered output (and thus
    /// invalidates subtree caches and layer surfaces).
    pub(crate) fn affects_rendering(self) -> bool {
        !matches!(self, Attr::Name | Attr::Listening)
    }
}

/// Positional and behavioral attributes shared by every node kind.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeAttrs {
    /// Position x, relative to the parent.
    pub x: f64,
    /// Position y, relative to the parent.
    pub y: f64,
    /// Scale factor along x (default 1).
    pub scale_x: f64,
    /// Scale factor along y (default 1).
    pub scale_y: f64,
    /// Rotation in radians (default 0).
    pub rotation: f64,
    /// Shear factor along x (default 0).
    pub skew_x: f64,
    /// Shear factor along y (default 0).
    pub skew_y: f64,
    /// Pivot offset x: the point of the node's local space that lands at
    /// `(x, y)` and anchors rotation/scale.
    pub offset_x: f64,
    /// Pivot offset y.
    pub offset_y: f64,
    /// Opacity in 0..=1, multiplied down the tree.
    pub opacity: f64,
    /// Invisible nodes (and their subtrees) are skipped by both passes.
    pub visible: bool,
    /// Non-listening nodes (and their subtrees) are skipped by the hit pass.
    pub listening: bool,
    /// Optional name for lookup and ancestor matching; empty = unnamed.
    pub name: String,
}

impl Default for NodeAttrs {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            rotation: 0.0,
            skew_x: 0.0,
            skew_y: 0.0,
            offset_x: 0.0,
            offset_y: 0.0,
            opacity: 1.0,
            visible: true,
            listening: true,
            name: String::new(),
        }
    }
}

impl NodeAttrs {
    /// The node-local transform: translate, then rotate, then skew, then
    /// scale, then un-offset the pivot. Identity steps are skipped.
    pub fn local_transform(&self) -> Transform {
        let mut t = Transform::IDENTITY;
        if self.x != 0.0 || self.y != 0.0 {
            t.translate(self.x, self.y);
        }
        if self.rotation != 0.0 {
            t.rotate(self.rotation);
        }
        if self.skew_x != 0.0 || self.skew_y != 0.0 {
            t.skew(self.skew_x, self.skew_y);
        }
        if self.scale_x != 1.0 || self.scale_y != 1.0 {
            t.scale(self.scale_x, self.scale_y);
        }
        if self.offset_x != 0.0 || self.offset_y != 0.0 {
            t.translate(-self.offset_x, -self.offset_y);
        }
        t
    }

    /// Opacity clamped to 0..=1.
    pub fn clamped_opacity(&self) -> f64 {
        self.opacity.clamp(0.0, 1.0)
    }
}
