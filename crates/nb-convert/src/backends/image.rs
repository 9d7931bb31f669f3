//! Raster image conversion using the `image` crate.
//!
//! Decoding and encoding are CPU-bound, so the work runs on the blocking
//! pool. JPEG has no alpha channel: transparent pixels are composited onto
//! white before encoding.

use std::path::Path;

use ::image::{DynamicImage, ImageFormat, ImageReader, RgbImage};
use nb_core::{Error, Result};

use crate::converter::ConversionRequest;

/// Map a target extension to an encoder format.
pub fn output_format(target: &str) -> Result<ImageFormat> {
    match target {
        "png" => Ok(ImageFormat::Png),
        "jpg" | "jpeg" => Ok(ImageFormat::Jpeg),
        "webp" => Ok(ImageFormat::WebP),
        "bmp" => Ok(ImageFormat::Bmp),
        "tiff" => Ok(ImageFormat::Tiff),
        other => Err(Error::unsupported("image", other)),
    }
}

pub async fn convert(request: &ConversionRequest) -> Result<()> {
    let input = request.input.clone();
    let output = request.output.clone();
    let target = request.target_format.clone();

    tokio::task::spawn_blocking(move || convert_blocking(&input, &output, &target))
        .await
        .map_err(|e| Error::Internal(format!("image task panicked: {e}")))?
}

fn convert_blocking(input: &Path, output: &Path, target: &str) -> Result<()> {
    let format = output_format(target)?;

    let img = ImageReader::open(input)?
        .with_guessed_format()?
        .decode()
        .map_err(|e| Error::conversion("image", format!("decode failed: {e}")))?;

    let encoded = if format == ImageFormat::Jpeg {
        DynamicImage::ImageRgb8(flatten_onto_white(&img))
    } else {
        // Every supported encoder accepts RGBA8; palette and 16-bit inputs
        // are normalised here.
        DynamicImage::ImageRgba8(img.to_rgba8())
    };

    encoded
        .save_with_format(output, format)
        .map_err(|e| Error::conversion("image", format!("encode failed: {e}")))
}

/// Alpha-composite onto an opaque white background.
fn flatten_onto_white(img: &DynamicImage) -> RgbImage {
    let rgba = img.to_rgba8();
    let mut out = RgbImage::new(rgba.width(), rgba.height());
    for (x, y, px) in rgba.enumerate_pixels() {
        let alpha = u32::from(px[3]);
        let blend = |c: u8| ((u32::from(c) * alpha + 255 * (255 - alpha)) / 255) as u8;
        out.put_pixel(x, y, ::image::Rgb([blend(px[0]), blend(px[1]), blend(px[2])]));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use ::image::{Rgba, RgbaImage};

    fn write_png(path: &Path) {
        let mut img = RgbaImage::new(4, 4);
        for (x, _, px) in img.enumerate_pixels_mut() {
            *px = if x < 2 {
                Rgba([255, 0, 0, 255])
            } else {
                Rgba([0, 0, 0, 0])
            };
        }
        img.save_with_format(path, ImageFormat::Png).unwrap();
    }

    fn request(dir: &Path, input: &str, target: &str) -> ConversionRequest {
        ConversionRequest {
            input: dir.join(input),
            output: dir.join(format!("out.{target}")),
            source_extension: "png".into(),
            target_format: target.into(),
        }
    }

    #[tokio::test]
    async fn png_to_jpg_flattens_alpha() {
        let dir = tempfile::tempdir().unwrap();
        write_png(&dir.path().join("in.png"));
        let req = request(dir.path(), "in.png", "jpg");

        convert(&req).await.unwrap();

        let out = ::image::open(&req.output).unwrap().to_rgb8();
        let transparent = out.get_pixel(3, 0);
        assert!(transparent.0.iter().all(|c| *c > 240), "got {transparent:?}");
        let red = out.get_pixel(0, 0);
        assert!(red[0] > 200 && red[1] < 60);
    }

    #[tokio::test]
    async fn png_to_webp_and_bmp() {
        let dir = tempfile::tempdir().unwrap();
        write_png(&dir.path().join("in.png"));
        for target in ["webp", "bmp", "tiff"] {
            let req = request(dir.path(), "in.png", target);
            convert(&req).await.unwrap();
            let decoded = ::image::open(&req.output).unwrap();
            assert_eq!(decoded.width(), 4, "{target}");
        }
    }

    #[tokio::test]
    async fn garbage_input_is_conversion_failure() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("in.png"), b"definitely not a png").unwrap();
        let req = request(dir.path(), "in.png", "jpg");

        let err = convert(&req).await.unwrap_err();
        assert!(err.to_string().contains("image"), "unexpected error: {err}");
        assert!(!req.output.exists());
    }

    #[test]
    fn unknown_target_is_unsupported() {
        assert!(matches!(output_format("gif"), Err(Error::Unsupported { .. })));
        assert_eq!(output_format("jpeg").unwrap(), ImageFormat::Jpeg);
    }
}
