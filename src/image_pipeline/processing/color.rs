//! Colour matrices and the camera-to-output colour transform.

use tracing::debug;

use crate::image_pipeline::common::error::{ConversionError, Result};
use crate::image_pipeline::processing::state::{PipelineState, Stage, StageContext};
use crate::image_pipeline::settings::ColorSpace;

pub(crate) type Mat3 = [[f32; 3]; 3];

pub(crate) const IDENTITY: Mat3 = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];

/// Linear sRGB (D65) to CIE XYZ
pub(crate) const SRGB_TO_XYZ: Mat3 = [
    [0.4124564, 0.3575761, 0.1804375],
    [0.2126729, 0.7151522, 0.0721750],
    [0.0193339, 0.1191920, 0.9503041],
];

/// CIE XYZ (D65) to Adobe RGB (1998)
const XYZ_TO_ADOBE: Mat3 = [
    [2.0413690, -0.5649464, -0.3446944],
    [-0.9692660, 1.8760108, 0.0415560],
    [0.0134474, -0.1183897, 1.0154096],
];

/// CIE XYZ (D50) to ProPhoto RGB
const XYZ_D50_TO_PROPHOTO: Mat3 = [
    [1.3459433, -0.2556075, -0.0511118],
    [-0.5445989, 1.5081673, 0.0205351],
    [0.0, 0.0, 1.2118128],
];

/// Bradford chromatic adaptation from D65 to D50
const BRADFORD_D65_TO_D50: Mat3 = [
    [1.0478112, 0.0228866, -0.0501270],
    [0.0295424, 0.9904844, -0.0170491],
    [-0.0092345, 0.0150436, 0.7521316],
];

pub(crate) fn multiply(a: &Mat3, b: &Mat3) -> Mat3 {
    let mut out = [[0.0; 3]; 3];
    for (r, row) in out.iter_mut().enumerate() {
        for (c, cell) in row.iter_mut().enumerate() {
            *cell = (0..3).map(|k| a[r][k] * b[k][c]).sum();
        }
    }
    out
}

pub(crate) fn invert(m: &Mat3) -> Option<Mat3> {
    let det = m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
        - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
        + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0]);
    if !det.is_finite() || det.abs() < 1e-8 {
        return None;
    }
    let inv = 1.0 / det;
    Some([
        [
            (m[1][1] * m[2][2] - m[1][2] * m[2][1]) * inv,
            (m[0][2] * m[2][1] - m[0][1] * m[2][2]) * inv,
            (m[0][1] * m[1][2] - m[0][2] * m[1][1]) * inv,
        ],
        [
            (m[1][2] * m[2][0] - m[1][0] * m[2][2]) * inv,
            (m[0][0] * m[2][2] - m[0][2] * m[2][0]) * inv,
            (m[0][2] * m[1][0] - m[0][0] * m[1][2]) * inv,
        ],
        [
            (m[1][0] * m[2][1] - m[1][1] * m[2][0]) * inv,
            (m[0][1] * m[2][0] - m[0][0] * m[2][1]) * inv,
            (m[0][0] * m[1][1] - m[0][1] * m[1][0]) * inv,
        ],
    ])
}

#[inline]
pub(crate) fn apply(m: &Mat3, px: [f32; 3]) -> [f32; 3] {
    [
        m[0][0] * px[0] + m[0][1] * px[1] + m[0][2] * px[2],
        m[1][0] * px[0] + m[1][1] * px[1] + m[1][2] * px[2],
        m[2][0] * px[0] + m[2][1] * px[1] + m[2][2] * px[2],
    ]
}

/// sRGB primaries seen by the camera: `xyz_to_cam * SRGB_TO_XYZ`.
///
/// Row sums are the camera response to sRGB white, which is also where the
/// daylight multipliers come from.
pub(crate) fn camera_from_srgb(xyz_to_cam: &Mat3) -> Mat3 {
    multiply(xyz_to_cam, &SRGB_TO_XYZ)
}

/// Camera RGB (white balanced) to linear sRGB.
///
/// Rows of the camera matrix are normalised so white-balanced neutral maps to
/// neutral; an unknown matrix leaves camera RGB untouched.
pub(crate) fn camera_to_srgb(xyz_to_cam: Option<&Mat3>) -> Result<Mat3> {
    let Some(xyz_to_cam) = xyz_to_cam else {
        return Ok(IDENTITY);
    };
    let mut cam_rgb = camera_from_srgb(xyz_to_cam);
    for row in cam_rgb.iter_mut() {
        let sum: f32 = row.iter().sum();
        if !sum.is_finite() || sum.abs() < 1e-6 {
            return Err(ConversionError::processing(
                Stage::ColorTransform,
                "camera colour matrix has a zero row",
            ));
        }
        row.iter_mut().for_each(|v| *v /= sum);
    }
    invert(&cam_rgb).ok_or_else(|| {
        ConversionError::processing(Stage::ColorTransform, "camera colour matrix is singular")
    })
}

/// Linear sRGB to the requested output space; `None` for camera RGB output.
pub(crate) fn srgb_to_output(space: ColorSpace) -> Option<Mat3> {
    match space {
        ColorSpace::Raw => None,
        ColorSpace::Srgb => Some(IDENTITY),
        ColorSpace::Adobe => Some(multiply(&XYZ_TO_ADOBE, &SRGB_TO_XYZ)),
        ColorSpace::ProPhoto => Some(multiply(
            &XYZ_D50_TO_PROPHOTO,
            &multiply(&BRADFORD_D65_TO_D50, &SRGB_TO_XYZ),
        )),
        ColorSpace::Xyz => Some(SRGB_TO_XYZ),
    }
}

pub(super) fn color_transform(state: &mut PipelineState, ctx: &StageContext<'_>) -> Result<()> {
    let (rgb, _) = state.linear_mut(Stage::ColorTransform)?;
    let Some(output) = srgb_to_output(ctx.options.color_space) else {
        debug!("Raw colour space, keeping camera RGB");
        return Ok(());
    };
    let matrix = multiply(&output, &camera_to_srgb(ctx.metadata.xyz_to_cam.as_ref())?);
    debug!("Camera to {} matrix: {:?}", ctx.options.color_space.as_str(), matrix);

    for px in rgb.chunks_exact_mut(3) {
        let out = apply(&matrix, [px[0], px[1], px[2]]);
        px.copy_from_slice(&out);
    }
    Ok(())
}
