//! Supported camera table.
//!
//! A camera is convertible only if its make and model appear here. Each row
//! carries the sensor layout the strip reader needs for uncompressed payloads;
//! compressed payloads go through rawloader, which brings its own layout but
//! is still gated by this table.

use crate::image_pipeline::common::error::{ConversionError, Result};
use crate::image_pipeline::raw::types::{BayerPattern, CameraId, CfaPattern};

/// Colour filter layout as stored in the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorCfa {
    Bayer(BayerPattern),
    XTrans,
}

/// Masked (optical black) margins around the active area, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Border {
    pub top: u16,
    pub left: u16,
    pub bottom: u16,
    pub right: u16,
}

const NO_BORDER: Border = Border {
    top: 0,
    left: 0,
    bottom: 0,
    right: 0,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorLayout {
    /// Pattern at the top-left of the full sensor, border included
    pub cfa: SensorCfa,
    pub black_level: u16,
    pub white_level: u16,
    pub border: Border,
    /// XYZ to camera matrix scaled by 10000, row-major
    pub xyz_to_cam: [i16; 9],
}

impl SensorLayout {
    pub fn cfa_pattern(&self) -> CfaPattern {
        match self.cfa {
            SensorCfa::Bayer(pattern) => CfaPattern::Bayer(pattern),
            SensorCfa::XTrans => CfaPattern::Other("X-Trans".to_string()),
        }
    }

    pub fn xyz_to_cam_matrix(&self) -> [[f32; 3]; 3] {
        let m = &self.xyz_to_cam;
        let mut out = [[0.0; 3]; 3];
        for (i, row) in out.iter_mut().enumerate() {
            for (j, cell) in row.iter_mut().enumerate() {
                *cell = m[i * 3 + j] as f32 / 10_000.0;
            }
        }
        out
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CameraEntry {
    pub make: &'static str,
    pub model: &'static str,
    pub layout: SensorLayout,
}

impl CameraEntry {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.make, self.model)
    }
}

const fn bayer(
    pattern: BayerPattern,
    black_level: u16,
    white_level: u16,
    border: Border,
    xyz_to_cam: [i16; 9],
) -> SensorLayout {
    SensorLayout {
        cfa: SensorCfa::Bayer(pattern),
        black_level,
        white_level,
        border,
        xyz_to_cam,
    }
}

/// Sorted by make, then model.
pub const CAMERA_TABLE: &[CameraEntry] = &[
    CameraEntry {
        make: "Canon",
        model: "EOS 5D Mark IV",
        layout: bayer(
            BayerPattern::Rggb,
            512,
            16383,
            Border {
                top: 42,
                left: 136,
                bottom: 0,
                right: 0,
            },
            [6446, -366, -864, -4436, 12204, 2513, -952, 2496, 6348],
        ),
    },
    CameraEntry {
        make: "Canon",
        model: "EOS R5",
        layout: bayer(
            BayerPattern::Rggb,
            2048,
            16383,
            Border {
                top: 58,
                left: 156,
                bottom: 0,
                right: 0,
            },
            [9766, -2953, -1254, -4276, 12116, 2433, -437, 1336, 5131],
        ),
    },
    CameraEntry {
        make: "Fujifilm",
        model: "GFX 50S",
        layout: bayer(
            BayerPattern::Rggb,
            1024,
            16383,
            NO_BORDER,
            [11756, -4754, -874, -3056, 11045, 2305, -381, 1457, 6006],
        ),
    },
    CameraEntry {
        make: "Fujifilm",
        model: "X-T3",
        layout: SensorLayout {
            cfa: SensorCfa::XTrans,
            black_level: 1024,
            white_level: 16383,
            border: NO_BORDER,
            xyz_to_cam: [16393, -7740, -1436, -4172, 12212, 2158, -690, 1486, 5614],
        },
    },
    CameraEntry {
        make: "Leica",
        model: "M10",
        layout: bayer(
            BayerPattern::Rggb,
            0,
            16383,
            NO_BORDER,
            [8249, -2849, -620, -5415, 14756, 565, -957, 3074, 6517],
        ),
    },
    CameraEntry {
        make: "Nikon",
        model: "D850",
        layout: bayer(
            BayerPattern::Rggb,
            400,
            15520,
            NO_BORDER,
            [10405, -3755, -1270, -5461, 13787, 1793, -1040, 2015, 6785],
        ),
    },
    CameraEntry {
        make: "Nikon",
        model: "Z 6",
        layout: bayer(
            BayerPattern::Rggb,
            1008,
            15520,
            NO_BORDER,
            [8210, -2534, -683, -5355, 13338, 2212, -1143, 1929, 6464],
        ),
    },
    CameraEntry {
        make: "Olympus",
        model: "E-M1MarkII",
        layout: bayer(
            BayerPattern::Rggb,
            256,
            4095,
            NO_BORDER,
            [9383, -3170, -763, -2457, 10702, 2020, -384, 1236, 5552],
        ),
    },
    CameraEntry {
        make: "Panasonic",
        model: "DC-G9",
        layout: bayer(
            BayerPattern::Bggr,
            128,
            4095,
            NO_BORDER,
            [7685, -2375, -634, -3687, 11700, 2249, -748, 1546, 5111],
        ),
    },
    CameraEntry {
        make: "Pentax",
        model: "K-1",
        layout: bayer(
            BayerPattern::Bggr,
            64,
            16383,
            NO_BORDER,
            [8596, -2981, -639, -4202, 12046, 2431, -685, 1424, 6122],
        ),
    },
    CameraEntry {
        make: "Sony",
        model: "ILCE-6600",
        layout: bayer(
            BayerPattern::Rggb,
            512,
            16383,
            NO_BORDER,
            [5794, -2576, -688, -4605, 11808, 3030, -996, 1693, 6396],
        ),
    },
    CameraEntry {
        make: "Sony",
        model: "ILCE-7M3",
        layout: bayer(
            BayerPattern::Rggb,
            512,
            16383,
            NO_BORDER,
            [7374, -2389, -551, -5435, 13162, 2519, -1006, 1795, 6552],
        ),
    },
    CameraEntry {
        make: "Sony",
        model: "ILCE-7RM4",
        layout: bayer(
            BayerPattern::Rggb,
            512,
            16383,
            NO_BORDER,
            [7662, -2686, -660, -5240, 12965, 2530, -796, 1508, 6167],
        ),
    },
];

/// Case-insensitive lookup by normalised make and model.
pub fn lookup(camera: &CameraId) -> Option<&'static CameraEntry> {
    CAMERA_TABLE.iter().find(|entry| {
        entry.make.eq_ignore_ascii_case(&camera.make)
            && entry.model.eq_ignore_ascii_case(&camera.model)
    })
}

/// Table entry for `camera`, or `UnsupportedFormat` naming it.
pub fn require(camera: &CameraId) -> Result<&'static CameraEntry> {
    lookup(camera).ok_or_else(|| {
        ConversionError::UnsupportedFormat(format!("camera {} is not supported", camera))
    })
}

/// "Make Model" for every supported camera, sorted.
pub fn supported_cameras() -> Vec<String> {
    let mut names: Vec<String> = CAMERA_TABLE.iter().map(CameraEntry::display_name).collect();
    names.sort();
    names
}

pub fn camera_count() -> usize {
    CAMERA_TABLE.len()
}
