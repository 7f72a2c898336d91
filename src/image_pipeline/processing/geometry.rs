//! Orientation, crop and resize on the quantised image.

use image::{imageops, ImageBuffer, Pixel, Primitive, Rgb};
use tracing::debug;

use crate::image_pipeline::common::error::{ConversionError, Result};
use crate::image_pipeline::common::Orientation;
use crate::image_pipeline::processing::state::{PipelineState, Plane, Stage, StageContext};
use crate::image_pipeline::processing::types::PixelData;
use crate::image_pipeline::settings::{
    CropBox, FilterType, OrientationOverride, ProcessingOptions, ResizeMode,
};

pub(crate) type RgbImage<T> = ImageBuffer<Rgb<T>, Vec<T>>;

pub(super) fn geometry(state: &mut PipelineState, ctx: &StageContext<'_>) -> Result<()> {
    let pixels = state.take_output(Stage::Geometry)?;
    let orientation = match ctx.options.orientation {
        OrientationOverride::Auto => ctx.metadata.orientation,
        OrientationOverride::Fixed(o) => o,
    };
    debug!(
        "Geometry: orientation {:?}, crop {:?}, resize {:?}",
        orientation, ctx.options.crop, ctx.options.resize
    );

    let (width, height) = dimensions(state)?;
    let (width, height, pixels) = match pixels {
        PixelData::Eight(data) => {
            let out = transform(buffer(width, height, data)?, orientation, ctx.options)?;
            (out.width(), out.height(), PixelData::Eight(out.into_raw()))
        }
        PixelData::Sixteen(data) => {
            let out = transform(buffer(width, height, data)?, orientation, ctx.options)?;
            (out.width(), out.height(), PixelData::Sixteen(out.into_raw()))
        }
    };

    state.width = width as usize;
    state.height = height as usize;
    state.plane = Plane::Output(pixels);
    Ok(())
}

fn dimensions(state: &PipelineState) -> Result<(u32, u32)> {
    match (u32::try_from(state.width), u32::try_from(state.height)) {
        (Ok(w), Ok(h)) => Ok((w, h)),
        _ => Err(ConversionError::processing(
            Stage::Geometry,
            format!("{}x{} image is too large", state.width, state.height),
        )),
    }
}

fn buffer<T>(width: u32, height: u32, data: Vec<T>) -> Result<RgbImage<T>>
where
    T: Primitive,
    Rgb<T>: Pixel<Subpixel = T>,
{
    let len = data.len();
    ImageBuffer::from_raw(width, height, data).ok_or_else(|| {
        ConversionError::processing(
            Stage::Geometry,
            format!("{} samples do not fill a {}x{} RGB image", len, width, height),
        )
    })
}

fn transform<T>(
    image: RgbImage<T>,
    orientation: Orientation,
    options: &ProcessingOptions,
) -> Result<RgbImage<T>>
where
    T: Primitive + 'static,
    Rgb<T>: Pixel<Subpixel = T>,
{
    let mut image = apply_orientation(image, orientation);
    if let Some(crop) = options.crop {
        image = crop_to(&image, crop)?;
    }
    if let Some(mode) = options.resize {
        image = resize(image, mode, options.resize_filter);
    }
    Ok(image)
}

pub(crate) fn apply_orientation<T>(image: RgbImage<T>, orientation: Orientation) -> RgbImage<T>
where
    T: Primitive + 'static,
    Rgb<T>: Pixel<Subpixel = T>,
{
    match orientation {
        Orientation::Normal => image,
        Orientation::FlipHorizontal => imageops::flip_horizontal(&image),
        Orientation::Rotate180 => imageops::rotate180(&image),
        Orientation::FlipVertical => imageops::flip_vertical(&image),
        Orientation::Transpose => imageops::flip_horizontal(&imageops::rotate90(&image)),
        Orientation::Rotate90CW => imageops::rotate90(&image),
        Orientation::Transverse => imageops::flip_horizontal(&imageops::rotate270(&image)),
        Orientation::Rotate270CW => imageops::rotate270(&image),
    }
}

/// Intersect `crop` with the image bounds.
fn clamp_crop(crop: CropBox, width: u32, height: u32) -> Option<(u32, u32, u32, u32)> {
    if crop.x >= width || crop.y >= height {
        return None;
    }
    let right = crop.x.saturating_add(crop.width).min(width);
    let bottom = crop.y.saturating_add(crop.height).min(height);
    let (w, h) = (right - crop.x, bottom - crop.y);
    (w > 0 && h > 0).then_some((crop.x, crop.y, w, h))
}

fn crop_to<T>(image: &RgbImage<T>, crop: CropBox) -> Result<RgbImage<T>>
where
    T: Primitive + 'static,
    Rgb<T>: Pixel<Subpixel = T>,
{
    let (x, y, w, h) = clamp_crop(crop, image.width(), image.height()).ok_or_else(|| {
        ConversionError::processing(
            Stage::Geometry,
            format!(
                "crop {}x{}+{}+{} lies outside the {}x{} image",
                crop.width,
                crop.height,
                crop.x,
                crop.y,
                image.width(),
                image.height()
            ),
        )
    })?;
    Ok(imageops::crop_imm(image, x, y, w, h).to_image())
}

/// Dimensions that fit within `max_edge` on the longest side, never upscaling.
pub(crate) fn fit_dimensions(width: u32, height: u32, max_edge: u32) -> (u32, u32) {
    let longest = width.max(height);
    if longest <= max_edge {
        return (width, height);
    }
    let scale = max_edge as f64 / longest as f64;
    let scaled = |v: u32| ((v as f64 * scale).round() as u32).max(1);
    (scaled(width), scaled(height))
}

fn resize<T>(image: RgbImage<T>, mode: ResizeMode, filter: FilterType) -> RgbImage<T>
where
    T: Primitive + 'static,
    Rgb<T>: Pixel<Subpixel = T>,
{
    let (width, height) = match mode {
        ResizeMode::Exact { width, height } => (width, height),
        ResizeMode::Fit { max_edge } => fit_dimensions(image.width(), image.height(), max_edge),
    };
    if (width, height) == image.dimensions() {
        return image;
    }
    imageops::resize(&image, width, height, filter.to_image_filter())
}
