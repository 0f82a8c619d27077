//! Tree walking and rasterization for the scene and hit passes.
//!
//! The painter owns the rasterizer contexts, the scratch-pixmap pool, and the
//! blur machinery. It walks a layer subtree in paint order, pushing clips,
//! applying memoized absolute transforms, and invoking each shape's draw
//! callback through a [`DrawingContext`] in the mode for the pass. Offscreen
//! work (buffered draws, shadows) renders into pooled scratch pixmaps that
//! re-enter the main command stream as image paints.

use crate::foundation::core::Rgba8;
use crate::foundation::error::{RibaltaError, RibaltaResult};
use crate::render::blur::{blur_rgba8_premul_q16, gaussian_kernel_q16};
use crate::render::context::{DrawingContext, affine_to_cpu, bezpath_to_cpu};
use crate::render::pool::{SurfacePool, SurfacePoolOpts};
use crate::scene::node::{Clip, NodeData, NodeId, NodeKind};
use crate::scene::shape::{Shadow, ShapeData, ShapeStyle};
use crate::scene::tree::SceneArena;
use crate::transform::Transform;
use kurbo::Shape as _;
use std::collections::HashMap;
use std::sync::Arc;

/// Shadow blur kernels saturate beyond this many device pixels.
const MAX_SHADOW_RADIUS_PX: u32 = 100;

/// Which of the two surfaces a pass paints.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum PassKind {
    Scene,
    Hit,
}

/// Per-walk constants composed under every node's memos.
#[derive(Clone, Copy, Debug)]
pub(crate) struct WalkBase {
    /// Maps stage-absolute coordinates to destination pixels.
    pub(crate) transform: Transform,
    /// Per-axis scale factor of `transform`, for shadow device sizing.
    pub(crate) scale: (f64, f64),
    /// Factor applied to every node's absolute opacity. Layer passes use
    /// 1.0; cache captures use the inverse of the owner's absolute opacity,
    /// leaving the owner's opacity to apply at blit time.
    pub(crate) opacity: f64,
}

impl WalkBase {
    /// Uniform device scaling with no opacity adjustment.
    pub(crate) fn scaling(ratio: f64) -> Self {
        Self {
            transform: Transform::scaling(ratio, ratio),
            scale: (ratio, ratio),
            opacity: 1.0,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
struct BlurKernelKey {
    radius_px: u32,
    sigma_bits: u32,
}

/// Rasterization state shared by every layer of one stage.
pub(crate) struct Painter {
    ctx: Option<vello_cpu::RenderContext>,
    scratch_ctx: Option<vello_cpu::RenderContext>,
    pub(crate) pool: SurfacePool,
    blur_kernel_cache: HashMap<BlurKernelKey, Arc<Vec<u32>>>,
    blur_scratch_a: Vec<u8>,
    blur_scratch_b: Vec<u8>,
    /// Scratch pixmaps referenced by in-flight image paints. Reclaimed into
    /// the pool once the command stream holding them has been reset.
    pending_scratches: Vec<Arc<vello_cpu::Pixmap>>,
}

impl Painter {
    pub(crate) fn new(pool_opts: SurfacePoolOpts) -> Self {
        Self {
            ctx: None,
            scratch_ctx: None,
            pool: SurfacePool::new(pool_opts),
            blur_kernel_cache: HashMap::new(),
            blur_scratch_a: Vec::new(),
            blur_scratch_b: Vec::new(),
            pending_scratches: Vec::new(),
        }
    }

    /// Paint one subtree onto `dst`, clearing it first. `base.transform` is
    /// composed under every node's memoized absolute transform.
    pub(crate) fn paint_subtree(
        &mut self,
        arena: &SceneArena,
        root: NodeId,
        pass: PassKind,
        base: WalkBase,
        dst: &mut vello_cpu::Pixmap,
    ) -> RibaltaResult<()> {
        let (w, h) = (dst.width(), dst.height());
        dst.data_as_u8_slice_mut().fill(0);
        self.with_main_ctx(w, h, |this, ctx| {
            this.draw_node(arena, root, pass, &base, ctx)?;
            ctx.flush();
            ctx.render_to_pixmap(dst);
            Ok(())
        })?;
        self.reclaim_scratches();
        Ok(())
    }

    /// Paint just `id` in hit mode onto `dst`, with no siblings and no
    /// ancestor clips. Listening flags are ignored: this answers "does the
    /// geometry cover the point", not "does this shape take pointer events".
    pub(crate) fn paint_node_hit_isolated(
        &mut self,
        arena: &SceneArena,
        id: NodeId,
        base: Transform,
        dst: &mut vello_cpu::Pixmap,
    ) -> RibaltaResult<()> {
        let (w, h) = (dst.width(), dst.height());
        dst.data_as_u8_slice_mut().fill(0);
        self.with_main_ctx(w, h, |_, ctx| {
            let node = Self::node(arena, id)?;
            if node.attrs.visible {
                let abs = node.abs_transform.ok_or_else(|| {
                    RibaltaError::raster("absolute transform not resolved before paint")
                })?;
                let abs_opacity = node.abs_opacity.ok_or_else(|| {
                    RibaltaError::raster("absolute opacity not resolved before paint")
                })?;
                let mut device = base;
                device.multiply(&abs);
                if let Some(cache) = &node.cache {
                    Self::blit_cached(ctx, cache, PassKind::Hit, device, abs_opacity)?;
                } else if let NodeKind::Shape(shape) = &node.kind {
                    Self::draw_shape_hit(node, shape, device, ctx)?;
                }
            }
            ctx.flush();
            ctx.render_to_pixmap(dst);
            Ok(())
        })?;
        self.reclaim_scratches();
        Ok(())
    }

    fn with_main_ctx<R>(
        &mut self,
        width: u16,
        height: u16,
        f: impl FnOnce(&mut Self, &mut vello_cpu::RenderContext) -> RibaltaResult<R>,
    ) -> RibaltaResult<R> {
        let mut ctx = match self.ctx.take() {
            None => vello_cpu::RenderContext::new(width, height),
            Some(ctx) if ctx.width() == width && ctx.height() == height => ctx,
            Some(_) => vello_cpu::RenderContext::new(width, height),
        };
        ctx.reset();
        self.reclaim_scratches();
        let out = f(self, &mut ctx)?;
        self.ctx = Some(ctx);
        Ok(out)
    }

    fn with_scratch_ctx<R>(
        &mut self,
        width: u16,
        height: u16,
        f: impl FnOnce(&mut Self, &mut vello_cpu::RenderContext) -> RibaltaResult<R>,
    ) -> RibaltaResult<R> {
        let mut ctx = match self.scratch_ctx.take() {
            None => vello_cpu::RenderContext::new(width, height),
            Some(ctx) if ctx.width() == width && ctx.height() == height => ctx,
            Some(_) => vello_cpu::RenderContext::new(width, height),
        };
        ctx.reset();
        let out = f(self, &mut ctx)?;
        self.scratch_ctx = Some(ctx);
        Ok(out)
    }

    fn reclaim_scratches(&mut self) {
        let pending = std::mem::take(&mut self.pending_scratches);
        for arc in pending {
            match Arc::try_unwrap(arc) {
                Ok(pm) => self.pool.release(pm),
                Err(arc) => self.pending_scratches.push(arc),
            }
        }
    }

    pub(crate) fn pool_stats(&self) -> crate::render::pool::SurfacePoolStats {
        self.pool.stats()
    }

    fn node(arena: &SceneArena, id: NodeId) -> RibaltaResult<&NodeData> {
        arena
            .get(id)
            .ok_or_else(|| RibaltaError::raster("painter reached a dead node id"))
    }

    fn draw_node(
        &mut self,
        arena: &SceneArena,
        id: NodeId,
        pass: PassKind,
        base: &WalkBase,
        ctx: &mut vello_cpu::RenderContext,
    ) -> RibaltaResult<()> {
        let node = Self::node(arena, id)?;
        if !node.attrs.visible {
            return Ok(());
        }
        if pass == PassKind::Hit && !node.attrs.listening {
            return Ok(());
        }

        let abs = node
            .abs_transform
            .ok_or_else(|| RibaltaError::raster("absolute transform not resolved before paint"))?;
        let abs_opacity = node
            .abs_opacity
            .ok_or_else(|| RibaltaError::raster("absolute opacity not resolved before paint"))?;
        let abs_opacity = (abs_opacity * base.opacity).clamp(0.0, 1.0);
        let mut device = base.transform;
        device.multiply(&abs);

        if let Some(cache) = &node.cache {
            return Self::blit_cached(ctx, cache, pass, device, abs_opacity);
        }

        match &node.kind {
            NodeKind::Shape(shape) => match pass {
                PassKind::Scene => {
                    self.draw_shape_scene(node, shape, device, base.scale, abs_opacity, ctx)
                }
                PassKind::Hit => Self::draw_shape_hit(node, shape, device, ctx),
            },
            NodeKind::Group(_) | NodeKind::Layer(_) => {
                let clip = node.clip();
                if let Some(clip) = clip {
                    Self::push_clip(ctx, &device, clip);
                }
                for &child in &node.children {
                    self.draw_node(arena, child, pass, base, ctx)?;
                }
                if clip.is_some() {
                    ctx.pop_layer();
                }
                Ok(())
            }
        }
    }

    fn draw_shape_scene(
        &mut self,
        node: &NodeData,
        shape: &ShapeData,
        device: Transform,
        base_scale: (f64, f64),
        abs_opacity: f64,
        ctx: &mut vello_cpu::RenderContext,
    ) -> RibaltaResult<()> {
        let Some(draw_fn) = &shape.draw else {
            return Ok(());
        };
        let style = &shape.style;
        let has_shadow = style.has_shadow();
        let buffered = style.needs_buffer(abs_opacity);

        ctx.set_blend_mode(vello_cpu::peniko::BlendMode::default());

        if !has_shadow && !buffered {
            if abs_opacity < 1.0 {
                ctx.push_opacity_layer(abs_opacity as f32);
            }
            let mut dc = DrawingContext::new_scene(ctx, style, device);
            draw_fn(&mut dc);
            if abs_opacity < 1.0 {
                ctx.pop_layer();
            }
            return Ok(());
        }

        let (w, h) = (ctx.width(), ctx.height());
        let abs_scale = node
            .abs_scale
            .ok_or_else(|| RibaltaError::raster("absolute scale not resolved before paint"))?;
        let eff_scale = (abs_scale.0 * base_scale.0, abs_scale.1 * base_scale.1);

        let shadow_img = if has_shadow {
            let sh = style
                .shadow
                .as_ref()
                .ok_or_else(|| RibaltaError::raster("shadow vanished mid-draw"))?;
            Some(self.shadow_image(w, h, style, draw_fn, sh, device, eff_scale)?)
        } else {
            None
        };

        if buffered {
            // Fill and stroke at full opacity offscreen, then one blit at the
            // node's opacity. Blending fill and stroke directly would double-
            // blend the seam where they overlap.
            let content = self.render_offscreen(w, h, |sctx| {
                let mut dc = DrawingContext::new_scene(sctx, style, device);
                draw_fn(&mut dc);
                Ok(())
            })?;
            if abs_opacity < 1.0 {
                ctx.push_opacity_layer(abs_opacity as f32);
            }
            if let Some(sh) = &shadow_img {
                Self::blit_device_image(ctx, sh);
            }
            Self::blit_device_image(ctx, &content);
            if abs_opacity < 1.0 {
                ctx.pop_layer();
            }
        } else {
            if abs_opacity < 1.0 {
                ctx.push_opacity_layer(abs_opacity as f32);
            }
            if let Some(sh) = &shadow_img {
                Self::blit_device_image(ctx, sh);
            }
            let mut dc = DrawingContext::new_scene(ctx, style, device);
            draw_fn(&mut dc);
            if abs_opacity < 1.0 {
                ctx.pop_layer();
            }
        }
        Ok(())
    }

    fn draw_shape_hit(
        node: &NodeData,
        shape: &ShapeData,
        device: Transform,
        ctx: &mut vello_cpu::RenderContext,
    ) -> RibaltaResult<()> {
        let Some(draw_fn) = &shape.draw else {
            return Ok(());
        };
        let key = node
            .key
            .ok_or_else(|| RibaltaError::raster("shape has no color key"))?;
        ctx.set_blend_mode(vello_cpu::peniko::BlendMode::default());
        let mut dc = DrawingContext::new_hit(ctx, &shape.style, device, key);
        draw_fn(&mut dc);
        Ok(())
    }

    /// Render the shape's shadow: a flat-color silhouette of its geometry,
    /// offset and blurred in device pixels.
    #[allow(clippy::too_many_arguments)]
    fn shadow_image(
        &mut self,
        w: u16,
        h: u16,
        style: &ShapeStyle,
        draw_fn: &crate::scene::shape::DrawFn,
        shadow: &Shadow,
        device: Transform,
        eff_scale: (f64, f64),
    ) -> RibaltaResult<Arc<vello_cpu::Pixmap>> {
        // Offsets scale with the node's per-axis absolute scale; rotation
        // never applies to the offset vector itself.
        let mut shadow_tr =
            Transform::translation(shadow.offset.x * eff_scale.0, shadow.offset.y * eff_scale.1);
        shadow_tr.multiply(&device);

        let alpha = (f64::from(shadow.color.a) * shadow.opacity.clamp(0.0, 1.0)).round();
        let color = Rgba8 {
            r: shadow.color.r,
            g: shadow.color.g,
            b: shadow.color.b,
            a: alpha.clamp(0.0, 255.0) as u8,
        };

        let blur_local = if shadow.blur.is_finite() && shadow.blur >= 0.0 {
            shadow.blur
        } else {
            tracing::warn!(blur = shadow.blur, "ignoring non-finite or negative shadow blur");
            0.0
        };
        let blur_dev = (blur_local * eff_scale.0.abs().max(eff_scale.1.abs()))
            .min(f64::from(MAX_SHADOW_RADIUS_PX));
        let radius_px = blur_dev.ceil() as u32;
        let sigma = (blur_dev / 2.0) as f32;
        let kernel = self.kernel_for(radius_px, sigma)?;

        let mut pm = self.pool.borrow(w, h);
        pm.data_as_u8_slice_mut().fill(0);
        let include_stroke = shadow.for_stroke;
        self.with_scratch_ctx(w, h, |_, sctx| {
            let mut dc =
                DrawingContext::new_silhouette(sctx, style, shadow_tr, color, include_stroke);
            draw_fn(&mut dc);
            sctx.flush();
            sctx.render_to_pixmap(&mut pm);
            Ok(())
        })?;

        if kernel.len() > 1 {
            let n = pm.data_as_u8_slice().len();
            self.blur_scratch_a.resize(n, 0);
            self.blur_scratch_b.resize(n, 0);
            self.blur_scratch_b.copy_from_slice(pm.data_as_u8_slice());
            blur_rgba8_premul_q16(
                &self.blur_scratch_b,
                pm.data_as_u8_slice_mut(),
                &mut self.blur_scratch_a,
                u32::from(w),
                u32::from(h),
                &kernel,
            );
        }

        let arc = Arc::new(pm);
        self.pending_scratches.push(arc.clone());
        Ok(arc)
    }

    /// Record `f` into the scratch context and return the rendered pixmap,
    /// pooled and tracked for reclamation.
    fn render_offscreen(
        &mut self,
        w: u16,
        h: u16,
        f: impl FnOnce(&mut vello_cpu::RenderContext) -> RibaltaResult<()>,
    ) -> RibaltaResult<Arc<vello_cpu::Pixmap>> {
        let mut pm = self.pool.borrow(w, h);
        pm.data_as_u8_slice_mut().fill(0);
        self.with_scratch_ctx(w, h, |_, sctx| {
            f(sctx)?;
            sctx.flush();
            sctx.render_to_pixmap(&mut pm);
            Ok(())
        })?;
        let arc = Arc::new(pm);
        self.pending_scratches.push(arc.clone());
        Ok(arc)
    }

    fn kernel_for(&mut self, radius_px: u32, sigma: f32) -> RibaltaResult<Arc<Vec<u32>>> {
        let key = BlurKernelKey {
            radius_px,
            sigma_bits: sigma.to_bits(),
        };
        if let Some(k) = self.blur_kernel_cache.get(&key).cloned() {
            return Ok(k);
        }
        let k = Arc::new(gaussian_kernel_q16(radius_px, sigma)?);
        self.blur_kernel_cache.insert(key, k.clone());
        Ok(k)
    }

    /// Blit a device-sized pixmap 1:1 onto the current command stream.
    fn blit_device_image(ctx: &mut vello_cpu::RenderContext, pm: &Arc<vello_cpu::Pixmap>) {
        let (w, h) = (f64::from(pm.width()), f64::from(pm.height()));
        ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
        ctx.set_paint_transform(vello_cpu::kurbo::Affine::IDENTITY);
        ctx.set_paint(vello_cpu::Image {
            image: vello_cpu::ImageSource::Pixmap(pm.clone()),
            sampler: vello_cpu::peniko::ImageSampler::default(),
        });
        ctx.fill_rect(&vello_cpu::kurbo::Rect::new(0.0, 0.0, w, h));
    }

    /// Draw a cached subtree as an opaque leaf: one image blit per pass, the
    /// node's opacity applied to the whole bitmap.
    fn blit_cached(
        ctx: &mut vello_cpu::RenderContext,
        cache: &crate::stage::cache::SubtreeCache,
        pass: PassKind,
        device: Transform,
        abs_opacity: f64,
    ) -> RibaltaResult<()> {
        let pm = match pass {
            PassKind::Scene => &cache.scene,
            PassKind::Hit => &cache.hit,
        };
        let mut tr = device;
        tr.translate(cache.rect.x0, cache.rect.y0);
        tr.scale(1.0 / cache.scale.0, 1.0 / cache.scale.1);

        ctx.set_blend_mode(vello_cpu::peniko::BlendMode::default());
        ctx.set_transform(affine_to_cpu(tr.to_affine()));
        ctx.set_paint_transform(vello_cpu::kurbo::Affine::IDENTITY);
        ctx.set_paint(vello_cpu::Image {
            image: vello_cpu::ImageSource::Pixmap(pm.clone()),
            sampler: vello_cpu::peniko::ImageSampler::default(),
        });

        let apply_opacity = pass == PassKind::Scene && abs_opacity < 1.0;
        if apply_opacity {
            ctx.push_opacity_layer(abs_opacity as f32);
        }
        ctx.fill_rect(&vello_cpu::kurbo::Rect::new(
            0.0,
            0.0,
            f64::from(pm.width()),
            f64::from(pm.height()),
        ));
        if apply_opacity {
            ctx.pop_layer();
        }
        Ok(())
    }

    fn push_clip(ctx: &mut vello_cpu::RenderContext, device: &Transform, clip: &Clip) {
        ctx.set_transform(affine_to_cpu(device.to_affine()));
        let path = match clip {
            Clip::Rect(r) => r.to_path(0.1),
            Clip::Path(p) => p.clone(),
        };
        ctx.push_clip_layer(&bezpath_to_cpu(&path));
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/painter.rs"]
mod tests;
