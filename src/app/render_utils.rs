use eframe::egui::{Color32, Painter, Pos2, Rect, Stroke, Vec2};

use crate::model::Category;

pub(super) const BACKGROUND: Color32 = Color32::from_rgb(24, 27, 33);
pub(super) const SELECTED: Color32 = Color32::from_rgb(245, 206, 93);
pub(super) const SEARCH_MATCH: Color32 = Color32::from_rgb(103, 196, 255);

pub(super) fn category_color(category: Category) -> Color32 {
    match category {
        Category::Socialization => Color32::from_rgb(0x4a, 0x90, 0xe2),
        Category::Externalization => Color32::from_rgb(0x7e, 0xd3, 0x21),
        Category::Combination => Color32::from_rgb(0xf5, 0xa6, 0x23),
        Category::Internalization => Color32::from_rgb(0xbd, 0x10, 0xe0),
    }
}

pub(super) fn blend_color(base: Color32, overlay: Color32, amount: f32) -> Color32 {
    let amount = amount.clamp(0.0, 1.0);
    let mix = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * amount).round() as u8;

    Color32::from_rgba_unmultiplied(
        mix(base.r(), overlay.r()),
        mix(base.g(), overlay.g()),
        mix(base.b(), overlay.b()),
        mix(base.a(), overlay.a()),
    )
}

/// Same hue with its alpha scaled by `opacity`.
pub(super) fn with_opacity(color: Color32, opacity: f32) -> Color32 {
    let [r, g, b, a] = color.to_srgba_unmultiplied();
    Color32::from_rgba_unmultiplied(r, g, b, (a as f32 * opacity.clamp(0.0, 1.0)).round() as u8)
}

/// Grid that scrolls and scales with the viewport.
pub(super) fn draw_background(painter: &Painter, rect: Rect, translation: Vec2, scale: f32) {
    painter.rect_filled(rect, 0.0, BACKGROUND);

    let step = (50.0 * scale).max(12.0);
    let origin = rect.center() + translation;
    let stroke = Stroke::new(1.0, Color32::from_rgba_unmultiplied(70, 78, 90, 60));

    let first_x = rect.left() + (origin.x - rect.left()).rem_euclid(step);
    for column in 0.. {
        let x = first_x + column as f32 * step;
        if x > rect.right() {
            break;
        }
        painter.line_segment([Pos2::new(x, rect.top()), Pos2::new(x, rect.bottom())], stroke);
    }

    let first_y = rect.top() + (origin.y - rect.top()).rem_euclid(step);
    for row in 0.. {
        let y = first_y + row as f32 * step;
        if y > rect.bottom() {
            break;
        }
        painter.line_segment([Pos2::new(rect.left(), y), Pos2::new(rect.right(), y)], stroke);
    }
}

pub(super) fn circle_visible(rect: Rect, center: Pos2, radius: f32) -> bool {
    rect.expand(radius).contains(center)
}

/// Conservative test: true when the segment may cross `rect`.
pub(super) fn segment_visible(rect: Rect, start: Pos2, end: Pos2, padding: f32) -> bool {
    let rect = rect.expand(padding);
    if rect.contains(start) || rect.contains(end) {
        return true;
    }

    // Liang-Barsky clip against the padded rect
    let delta = end - start;
    let mut enter = 0.0_f32;
    let mut exit = 1.0_f32;
    for (p, q) in [
        (-delta.x, start.x - rect.left()),
        (delta.x, rect.right() - start.x),
        (-delta.y, start.y - rect.top()),
        (delta.y, rect.bottom() - start.y),
    ] {
        if p == 0.0 {
            if q < 0.0 {
                return false;
            }
            continue;
        }
        let t = q / p;
        if p < 0.0 {
            enter = enter.max(t);
        } else {
            exit = exit.min(t);
        }
        if enter > exit {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use eframe::egui::pos2;

    use super::*;

    fn viewport() -> Rect {
        Rect::from_min_max(pos2(0.0, 0.0), pos2(100.0, 100.0))
    }

    #[test]
    fn category_colors_match_the_palette() {
        assert_eq!(
            category_color(Category::Combination),
            Color32::from_rgb(245, 166, 35)
        );
    }

    #[test]
    fn opacity_scales_alpha_only() {
        let faded = with_opacity(Color32::from_rgb(10, 20, 30), 0.2);
        assert_eq!(faded.to_srgba_unmultiplied(), [10, 20, 30, 51]);
    }

    #[test]
    fn crossing_segment_is_visible() {
        assert!(segment_visible(viewport(), pos2(-50.0, 50.0), pos2(150.0, 50.0), 0.0));
    }

    #[test]
    fn segment_beside_the_rect_is_culled() {
        assert!(!segment_visible(viewport(), pos2(-50.0, -10.0), pos2(150.0, -10.0), 2.0));
        assert!(!segment_visible(viewport(), pos2(120.0, -50.0), pos2(220.0, 50.0), 0.0));
    }

    #[test]
    fn circle_overlapping_the_edge_is_visible() {
        assert!(circle_visible(viewport(), pos2(-5.0, 50.0), 10.0));
        assert!(!circle_visible(viewport(), pos2(-20.0, 50.0), 10.0));
    }
}
