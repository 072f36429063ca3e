use eframe::egui::Vec2;

use crate::config::ViewportConfig;

/// Scale and translation mapping graph space onto the canvas.
///
/// Screen coordinates here are relative to the canvas center:
/// `screen = translation + graph * scale`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewportTransform {
    pub scale: f32,
    pub translation: Vec2,
}

impl Default for ViewportTransform {
    fn default() -> Self {
        Self {
            scale: 1.0,
            translation: Vec2::ZERO,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Viewport {
    config: ViewportConfig,
    transform: ViewportTransform,
}

impl Viewport {
    pub fn new(config: ViewportConfig) -> Self {
        let mut viewport = Self {
            config,
            transform: ViewportTransform::default(),
        };
        viewport.reset();
        viewport
    }

    pub fn transform(&self) -> ViewportTransform {
        self.transform
    }

    pub fn scale(&self) -> f32 {
        self.transform.scale
    }

    pub fn to_screen(&self, graph: Vec2) -> Vec2 {
        self.transform.translation + graph * self.transform.scale
    }

    pub fn to_graph(&self, screen: Vec2) -> Vec2 {
        (screen - self.transform.translation) / self.transform.scale
    }

    fn clamp_scale(&self, scale: f32) -> f32 {
        scale.clamp(self.config.min_scale, self.config.max_scale)
    }

    /// Scales by `factor` keeping the graph point under `anchor` in place.
    /// Out-of-range results are clamped; invalid factors are ignored.
    pub fn zoom_by(&mut self, factor: f32, anchor: Vec2) {
        if !(factor.is_finite() && factor > 0.0 && finite(anchor)) {
            return;
        }

        let graph = self.to_graph(anchor);
        let scale = self.clamp_scale(self.transform.scale * factor);
        self.transform = ViewportTransform {
            scale,
            translation: anchor - graph * scale,
        };
    }

    pub fn pan_by(&mut self, delta: Vec2) {
        if finite(delta) {
            self.transform.translation += delta;
        }
    }

    pub fn reset(&mut self) {
        self.transform = ViewportTransform {
            scale: self.clamp_scale(1.0),
            translation: Vec2::ZERO,
        };
    }

    pub fn set_transform(&mut self, transform: ViewportTransform) {
        let scale = if transform.scale.is_finite() {
            self.clamp_scale(transform.scale)
        } else {
            self.transform.scale
        };
        let translation = if finite(transform.translation) {
            transform.translation
        } else {
            self.transform.translation
        };
        self.transform = ViewportTransform { scale, translation };
    }

    /// Moves the view so `graph` lands on the canvas center.
    pub fn center_on(&mut self, graph: Vec2) {
        if finite(graph) {
            self.transform.translation = -graph * self.transform.scale;
        }
    }
}

fn finite(value: Vec2) -> bool {
    value.x.is_finite() && value.y.is_finite()
}

#[cfg(test)]
mod tests {
    use eframe::egui::vec2;
    use proptest::prelude::*;

    use super::*;

    fn viewport() -> Viewport {
        Viewport::new(ViewportConfig::default())
    }

    #[test]
    fn identity_maps_graph_onto_screen() {
        let viewport = viewport();
        assert_eq!(viewport.to_screen(vec2(12.0, -4.0)), vec2(12.0, -4.0));
    }

    #[test]
    fn zoom_is_clamped_silently() {
        let mut viewport = viewport();
        viewport.zoom_by(100.0, Vec2::ZERO);
        assert_eq!(viewport.scale(), 3.0);
        viewport.zoom_by(0.0001, Vec2::ZERO);
        assert_eq!(viewport.scale(), 0.5);
    }

    #[test]
    fn invalid_zoom_factors_are_ignored() {
        let mut viewport = viewport();
        viewport.zoom_by(f32::NAN, Vec2::ZERO);
        viewport.zoom_by(-2.0, Vec2::ZERO);
        assert_eq!(viewport.transform(), ViewportTransform::default());
    }

    #[test]
    fn set_transform_clamps_scale_and_keeps_translation() {
        let mut viewport = viewport();
        viewport.set_transform(ViewportTransform {
            scale: 9.0,
            translation: vec2(30.0, 40.0),
        });
        assert_eq!(viewport.scale(), 3.0);
        assert_eq!(viewport.transform().translation, vec2(30.0, 40.0));
    }

    #[test]
    fn center_on_puts_point_at_canvas_center() {
        let mut viewport = viewport();
        viewport.zoom_by(2.0, vec2(50.0, 50.0));
        viewport.center_on(vec2(250.0, 180.0));
        assert!(viewport.to_screen(vec2(250.0, 180.0)).length() < 1e-3);
    }

    #[test]
    fn reset_restores_identity() {
        let mut viewport = viewport();
        viewport.pan_by(vec2(10.0, 10.0));
        viewport.zoom_by(1.3, vec2(5.0, 5.0));
        viewport.reset();
        assert_eq!(viewport.transform(), ViewportTransform::default());
    }

    proptest! {
        #[test]
        fn zoom_keeps_anchor_stationary(
            factor in 0.2f32..5.0,
            ax in -800.0f32..800.0,
            ay in -600.0f32..600.0,
            pan_x in -400.0f32..400.0,
            pan_y in -400.0f32..400.0,
        ) {
            let mut viewport = viewport();
            viewport.pan_by(vec2(pan_x, pan_y));
            let anchor = vec2(ax, ay);
            let before = viewport.to_graph(anchor);

            viewport.zoom_by(factor, anchor);

            let after = viewport.to_graph(anchor);
            prop_assert!((before - after).length() < 1e-2, "{before:?} vs {after:?}");
        }

        #[test]
        fn scale_stays_within_bounds(factors in prop::collection::vec(0.01f32..50.0, 1..40)) {
            let mut viewport = viewport();
            for factor in factors {
                viewport.zoom_by(factor, vec2(13.0, -7.0));
                prop_assert!(viewport.scale() >= 0.5 && viewport.scale() <= 3.0);
            }
        }
    }
}
