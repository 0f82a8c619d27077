//! Serializable scene definitions.
//!
//! A stage exports to a plain attribute tree ([`StageDef`]) that captures
//! node kinds, attributes, styles, and clips. The two host-owned pieces
//! static data cannot carry, draw callbacks and bitmap pattern fills, are
//! left out. Importing rebuilds the tree with those pieces absent; the host
//! re-attaches callbacks via [`Stage::set_draw_fn`] and pattern fills via
//! [`Stage::set_style`].

use crate::foundation::core::{BezPath, Rect, Rgba8};
use crate::foundation::error::{RibaltaError, RibaltaResult};
use crate::scene::attrs::NodeAttrs;
use crate::scene::node::{Clip, NodeId, NodeKind};
use crate::scene::shape::{
    Fill, FillRule, LinearGradient, RadialGradient, Shadow, ShapeStyle, Stroke,
};
use crate::stage::{Stage, StageOpts};
use serde::{Deserialize, Serialize};

/// A whole stage as plain data: viewport, pixel ratio, and the layer trees.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StageDef {
    /// Viewport width in logical units.
    pub width: u32,
    /// Viewport height in logical units.
    pub height: u32,
    /// Physical pixels per logical unit.
    #[serde(default = "default_pixel_ratio")]
    pub pixel_ratio: f64,
    /// Layer definitions in paint order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub layers: Vec<LayerDef>,
}

fn default_pixel_ratio() -> f64 {
    1.0
}

/// One layer and its subtree.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerDef {
    /// Attribute bag; defaults are omitted from the serialized form.
    #[serde(skip_serializing_if = "AttrsDef::is_default")]
    pub attrs: AttrsDef,
    /// Clip region applied to the layer's children.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clip: Option<ClipDef>,
    /// Children in paint order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeDef>,
}

/// A node below a layer: a group (with children) or a shape (with a style).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeDef {
    /// A container node.
    Group {
        /// Attribute bag; defaults are omitted.
        #[serde(default, skip_serializing_if = "AttrsDef::is_default")]
        attrs: AttrsDef,
        /// Clip region applied to the group's children.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        clip: Option<ClipDef>,
        /// Children in paint order.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        children: Vec<NodeDef>,
    },
    /// A leaf shape. Its draw callback is not part of the definition.
    Shape {
        /// Attribute bag; defaults are omitted.
        #[serde(default, skip_serializing_if = "AttrsDef::is_default")]
        attrs: AttrsDef,
        /// Fill/stroke/shadow style.
        #[serde(default, skip_serializing_if = "StyleDef::is_default")]
        style: StyleDef,
    },
}

/// The serializable mirror of a node's attribute bag. Every field carries
/// its runtime default, so untouched attributes vanish from the output.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttrsDef {
    /// Position x.
    #[serde(skip_serializing_if = "is_zero")]
    pub x: f64,
    /// Position y.
    #[serde(skip_serializing_if = "is_zero")]
    pub y: f64,
    /// Scale factor x.
    #[serde(skip_serializing_if = "is_one")]
    pub scale_x: f64,
    /// Scale factor y.
    #[serde(skip_serializing_if = "is_one")]
    pub scale_y: f64,
    /// Rotation in radians.
    #[serde(skip_serializing_if = "is_zero")]
    pub rotation: f64,
    /// Shear factor x.
    #[serde(skip_serializing_if = "is_zero")]
    pub skew_x: f64,
    /// Shear factor y.
    #[serde(skip_serializing_if = "is_zero")]
    pub skew_y: f64,
    /// Pivot offset x.
    #[serde(skip_serializing_if = "is_zero")]
    pub offset_x: f64,
    /// Pivot offset y.
    #[serde(skip_serializing_if = "is_zero")]
    pub offset_y: f64,
    /// Opacity in 0..=1.
    #[serde(skip_serializing_if = "is_one")]
    pub opacity: f64,
    /// Visibility flag.
    #[serde(skip_serializing_if = "is_true")]
    pub visible: bool,
    /// Hit-testing participation flag.
    #[serde(skip_serializing_if = "is_true")]
    pub listening: bool,
    /// Lookup name; empty = unnamed.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
}

impl Default for AttrsDef {
    fn default() -> Self {
        Self::from_attrs(&NodeAttrs::default())
    }
}

impl AttrsDef {
    fn is_default(&self) -> bool {
        *self == Self::default()
    }

    fn from_attrs(attrs: &NodeAttrs) -> Self {
        Self {
            x: attrs.x,
            y: attrs.y,
            scale_x: attrs.scale_x,
            scale_y: attrs.scale_y,
            rotation: attrs.rotation,
            skew_x: attrs.skew_x,
            skew_y: attrs.skew_y,
            offset_x: attrs.offset_x,
            offset_y: attrs.offset_y,
            opacity: attrs.opacity,
            visible: attrs.visible,
            listening: attrs.listening,
            name: attrs.name.clone(),
        }
    }

    fn to_attrs(&self) -> NodeAttrs {
        NodeAttrs {
            x: self.x,
            y: self.y,
            scale_x: self.scale_x,
            scale_y: self.scale_y,
            rotation: self.rotation,
            skew_x: self.skew_x,
            skew_y: self.skew_y,
            offset_x: self.offset_x,
            offset_y: self.offset_y,
            opacity: self.opacity,
            visible: self.visible,
            listening: self.listening,
            name: self.name.clone(),
        }
    }
}

fn is_zero(v: &f64) -> bool {
    *v == 0.0
}

fn is_one(v: &f64) -> bool {
    *v == 1.0
}

fn is_true(v: &bool) -> bool {
    *v
}

/// Serializable fill paints. Bitmap patterns have no definition form and are
/// dropped on export.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillDef {
    /// Flat color.
    Solid(Rgba8),
    /// Linear gradient.
    LinearGradient(LinearGradient),
    /// Radial gradient.
    RadialGradient(RadialGradient),
}

/// The serializable mirror of [`ShapeStyle`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleDef {
    /// Fill paint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fill: Option<FillDef>,
    /// Stroke.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stroke: Option<Stroke>,
    /// Drop shadow.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shadow: Option<Shadow>,
    /// Fill rule.
    #[serde(skip_serializing_if = "is_default_fill_rule")]
    pub fill_rule: FillRule,
    /// Buffered-draw opt-out.
    #[serde(skip_serializing_if = "is_true")]
    pub perfect_draw: bool,
}

fn is_default_fill_rule(rule: &FillRule) -> bool {
    *rule == FillRule::default()
}

impl Default for StyleDef {
    fn default() -> Self {
        Self::from_style(&ShapeStyle::default(), &mut 0)
    }
}

impl StyleDef {
    fn is_default(&self) -> bool {
        *self == Self::default()
    }

    fn from_style(style: &ShapeStyle, dropped_patterns: &mut usize) -> Self {
        let fill = match &style.fill {
            None => None,
            Some(Fill::Solid(color)) => Some(FillDef::Solid(*color)),
            Some(Fill::LinearGradient(g)) => Some(FillDef::LinearGradient(g.clone())),
            Some(Fill::RadialGradient(g)) => Some(FillDef::RadialGradient(g.clone())),
            Some(Fill::Pattern(_)) => {
                *dropped_patterns += 1;
                None
            }
        };
        Self {
            fill,
            stroke: style.stroke.clone(),
            shadow: style.shadow.clone(),
            fill_rule: style.fill_rule,
            perfect_draw: style.perfect_draw,
        }
    }

    fn to_style(&self) -> ShapeStyle {
        ShapeStyle {
            fill: self.fill.clone().map(|f| match f {
                FillDef::Solid(color) => Fill::Solid(color),
                FillDef::LinearGradient(g) => Fill::LinearGradient(g),
                FillDef::RadialGradient(g) => Fill::RadialGradient(g),
            }),
            stroke: self.stroke.clone(),
            shadow: self.shadow.clone(),
            fill_rule: self.fill_rule,
            perfect_draw: self.perfect_draw,
        }
    }
}

/// Serializable container clip region.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClipDef {
    /// Axis-aligned rectangle.
    Rect(Rect),
    /// Arbitrary path region.
    Path(BezPath),
}

impl ClipDef {
    fn from_clip(clip: &Clip) -> Self {
        match clip {
            Clip::Rect(r) => ClipDef::Rect(*r),
            Clip::Path(p) => ClipDef::Path(p.clone()),
        }
    }

    fn to_clip(&self) -> Clip {
        match self {
            ClipDef::Rect(r) => Clip::Rect(*r),
            ClipDef::Path(p) => Clip::Path(p.clone()),
        }
    }
}

#[derive(Default)]
struct Dropped {
    draw_fns: usize,
    patterns: usize,
}

impl Stage {
    /// Export the stage as a plain attribute tree.
    ///
    /// Draw callbacks and bitmap pattern fills stay behind (a warning
    /// reports how many); everything else round-trips.
    pub fn to_def(&self) -> StageDef {
        let mut dropped = Dropped::default();
        let layers = self
            .layers()
            .iter()
            .filter_map(|&l| self.layer_def(l, &mut dropped))
            .collect();
        if dropped.draw_fns > 0 {
            tracing::warn!(
                count = dropped.draw_fns,
                "draw callbacks are not serializable; re-attach with set_draw_fn after import"
            );
        }
        if dropped.patterns > 0 {
            tracing::warn!(
                count = dropped.patterns,
                "bitmap pattern fills are not serializable; re-attach with set_style after import"
            );
        }
        StageDef {
            width: self.width(),
            height: self.height(),
            pixel_ratio: self.pixel_ratio(),
            layers,
        }
    }

    /// Rebuild a stage from a definition. Restored shapes carry no draw
    /// callback and paint nothing until the host attaches one.
    pub fn from_def(def: &StageDef) -> RibaltaResult<Self> {
        let opts = StageOpts::new(def.width, def.height).with_pixel_ratio(def.pixel_ratio);
        let mut stage = Stage::new(opts)?;
        for layer_def in &def.layers {
            let layer = stage.new_layer()?;
            stage.set_attrs_bulk(layer, layer_def.attrs.to_attrs())?;
            if let Some(clip) = &layer_def.clip {
                stage.set_clip(layer, Some(clip.to_clip()))?;
            }
            for child in &layer_def.children {
                Self::restore_node(&mut stage, layer, child)?;
            }
        }
        Ok(stage)
    }

    /// Export as pretty-printed JSON.
    pub fn to_json(&self) -> RibaltaResult<String> {
        serde_json::to_string_pretty(&self.to_def()).map_err(|e| RibaltaError::serde(e.to_string()))
    }

    /// Rebuild a stage from [`to_json`](Self::to_json) output.
    pub fn from_json(json: &str) -> RibaltaResult<Self> {
        let def: StageDef =
            serde_json::from_str(json).map_err(|e| RibaltaError::serde(e.to_string()))?;
        Self::from_def(&def)
    }

    fn layer_def(&self, layer: NodeId, dropped: &mut Dropped) -> Option<LayerDef> {
        let node = self.arena().get(layer)?;
        Some(LayerDef {
            attrs: AttrsDef::from_attrs(&node.attrs),
            clip: node.clip().map(ClipDef::from_clip),
            children: node
                .children
                .iter()
                .filter_map(|&c| self.node_def(c, dropped))
                .collect(),
        })
    }

    fn node_def(&self, id: NodeId, dropped: &mut Dropped) -> Option<NodeDef> {
        let node = self.arena().get(id)?;
        Some(match &node.kind {
            NodeKind::Group(_) => NodeDef::Group {
                attrs: AttrsDef::from_attrs(&node.attrs),
                clip: node.clip().map(ClipDef::from_clip),
                children: node
                    .children
                    .iter()
                    .filter_map(|&c| self.node_def(c, dropped))
                    .collect(),
            },
            NodeKind::Shape(shape) => {
                if shape.draw.is_some() {
                    dropped.draw_fns += 1;
                }
                NodeDef::Shape {
                    attrs: AttrsDef::from_attrs(&node.attrs),
                    style: StyleDef::from_style(&shape.style, &mut dropped.patterns),
                }
            }
            // Layers never sit below another node.
            NodeKind::Layer(_) => return None,
        })
    }

    fn restore_node(stage: &mut Stage, parent: NodeId, def: &NodeDef) -> RibaltaResult<()> {
        match def {
            NodeDef::Group {
                attrs,
                clip,
                children,
            } => {
                let id = stage.new_group();
                stage.add(parent, id)?;
                stage.set_attrs_bulk(id, attrs.to_attrs())?;
                if let Some(c) = clip {
                    stage.set_clip(id, Some(c.to_clip()))?;
                }
                for child in children {
                    Self::restore_node(stage, id, child)?;
                }
            }
            NodeDef::Shape { attrs, style } => {
                let id = stage.new_shape_without_draw(style.to_style())?;
                stage.add(parent, id)?;
                stage.set_attrs_bulk(id, attrs.to_attrs())?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/scene/model.rs"]
mod tests;
