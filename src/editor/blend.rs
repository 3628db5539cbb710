use std::path::Path;

use anyhow::Context as _;

use crate::{
    foundation::error::{BoardError, BoardResult},
    model::{BlendMode, BoardDocument},
};

pub type PremulRgba8 = [u8; 4];

/// Blend `src` onto `dst` with the given mode after scaling `src` by `opacity`.
pub fn blend(mode: BlendMode, dst: PremulRgba8, src: PremulRgba8, opacity: f32) -> PremulRgba8 {
    let src = scale(src, opacity);
    if src[3] == 0 {
        return dst;
    }

    let sa = u16::from(src[3]);
    let da = u16::from(dst[3]);
    let inv_sa = 255 - sa;
    let inv_da = 255 - da;

    let mut out = [0u8; 4];
    out[3] = add_sat_u8(src[3], mul_div255(da, inv_sa));

    for i in 0..3 {
        let sc = u16::from(src[i]);
        let dc = u16::from(dst[i]);
        out[i] = match mode {
            BlendMode::Normal => add_sat_u8(src[i], mul_div255(dc, inv_sa)),
            BlendMode::Multiply => add_sat_u8(
                add_sat_u8(mul_div255(sc, inv_da), mul_div255(dc, inv_sa)),
                mul_div255(sc, dc),
            ),
            BlendMode::Screen => (sc + dc - u16::from(mul_div255(sc, dc))).min(255) as u8,
        };
    }
    out
}

fn scale(px: PremulRgba8, opacity: f32) -> PremulRgba8 {
    let opacity = opacity.clamp(0.0, 1.0);
    let op = ((opacity * 255.0).round() as i32).clamp(0, 255) as u16;
    [
        mul_div255(u16::from(px[0]), op),
        mul_div255(u16::from(px[1]), op),
        mul_div255(u16::from(px[2]), op),
        mul_div255(u16::from(px[3]), op),
    ]
}

pub fn premultiply(px: [u8; 4]) -> PremulRgba8 {
    let a = u16::from(px[3]);
    [
        mul_div255(u16::from(px[0]), a),
        mul_div255(u16::from(px[1]), a),
        mul_div255(u16::from(px[2]), a),
        px[3],
    ]
}

/// Premultiplied pixel over an opaque matte colour.
pub fn flatten_over_matte(px: PremulRgba8, matte: [u8; 3]) -> [u8; 3] {
    let inv = 255u16 - u16::from(px[3]);
    [
        add_sat_u8(px[0], mul_div255(u16::from(matte[0]), inv)),
        add_sat_u8(px[1], mul_div255(u16::from(matte[1]), inv)),
        add_sat_u8(px[2], mul_div255(u16::from(matte[2]), inv)),
    ]
}

/// Composite every visible, bound layer of `doc` bottom-up and flatten onto `matte`.
///
/// Layer images are placed at the canvas origin and clipped to the canvas; no resampling.
pub fn flatten_document(doc: &BoardDocument, matte: [u8; 3]) -> BoardResult<image::RgbImage> {
    doc.validate()?;
    let (w, h) = (doc.width, doc.height);
    let mut canvas = vec![[0u8; 4]; (w as usize) * (h as usize)];

    for group in &doc.groups {
        for layer in &group.layers {
            let Some(source) = layer.source.as_deref() else {
                continue;
            };
            if !layer.visible || layer.opacity <= 0.0 {
                continue;
            }
            let img = load_rgba(source)?;
            for y in 0..h.min(img.height()) {
                for x in 0..w.min(img.width()) {
                    let idx = (y as usize) * (w as usize) + (x as usize);
                    let src = premultiply(img.get_pixel(x, y).0);
                    canvas[idx] = blend(layer.blend, canvas[idx], src, layer.opacity);
                }
            }
        }
    }

    let mut out = image::RgbImage::new(w, h);
    for (i, px) in canvas.iter().enumerate() {
        let x = (i % (w as usize)) as u32;
        let y = (i / (w as usize)) as u32;
        out.put_pixel(x, y, image::Rgb(flatten_over_matte(*px, matte)));
    }
    Ok(out)
}

pub fn load_rgba(path: &Path) -> BoardResult<image::RgbaImage> {
    let img = image::open(path)
        .with_context(|| format!("decode layer image '{}'", path.display()))
        .map_err(|e| BoardError::editor_action(format!("{e:#}")))?;
    Ok(img.to_rgba8())
}

fn mul_div255(x: u16, y: u16) -> u8 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u8
}

fn add_sat_u8(a: u8, b: u8) -> u8 {
    a.saturating_add(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opacity_0_is_noop_for_every_mode() {
        let dst = [10, 20, 30, 255];
        let src = [200, 200, 200, 255];
        for mode in [BlendMode::Normal, BlendMode::Multiply, BlendMode::Screen] {
            assert_eq!(blend(mode, dst, src, 0.0), dst);
        }
    }

    #[test]
    fn normal_opaque_replaces_dst() {
        let dst = [0, 0, 0, 255];
        let src = [255, 0, 0, 255];
        assert_eq!(blend(BlendMode::Normal, dst, src, 1.0), src);
    }

    #[test]
    fn multiply_by_white_keeps_dst() {
        let dst = [100, 150, 200, 255];
        assert_eq!(blend(BlendMode::Multiply, dst, [255, 255, 255, 255], 1.0), dst);
    }

    #[test]
    fn multiply_by_black_darkens_to_black() {
        let dst = [100, 150, 200, 255];
        assert_eq!(
            blend(BlendMode::Multiply, dst, [0, 0, 0, 255], 1.0),
            [0, 0, 0, 255]
        );
    }

    #[test]
    fn screen_with_black_keeps_dst_and_with_white_is_white() {
        let dst = [100, 150, 200, 255];
        assert_eq!(blend(BlendMode::Screen, dst, [0, 0, 0, 255], 1.0), dst);
        assert_eq!(
            blend(BlendMode::Screen, dst, [255, 255, 255, 255], 1.0),
            [255, 255, 255, 255]
        );
    }

    #[test]
    fn transparent_pixel_flattens_to_matte() {
        assert_eq!(flatten_over_matte([0, 0, 0, 0], [255, 255, 255]), [255, 255, 255]);
        assert_eq!(flatten_over_matte([10, 20, 30, 255], [255, 255, 255]), [10, 20, 30]);
    }
}
