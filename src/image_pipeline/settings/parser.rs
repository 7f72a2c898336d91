//! Settings token parser.
//!
//! Tokens come in two shapes:
//!
//! - `key=value[,arg...]`, e.g. `wb=custom,2.1,1,1.4` or `outputBitDepth=16`.
//!   Keys match ASCII case-insensitively.
//! - dcraw-style flags that consume a fixed number of following tokens,
//!   e.g. `-r 2.1 1 1.4 1` or `-o 2`.
//!
//! Both shapes are driven from the [`KEYS`] and [`FLAGS`] tables. The parser
//! is a two-state machine: either it expects an option token, or it is
//! collecting the remaining arguments of a flag. Unknown tokens are rejected
//! and later occurrences of an option override earlier ones.

use tracing::debug;

use crate::image_pipeline::common::error::{ConversionError, Result};
use crate::image_pipeline::common::Orientation;
use crate::image_pipeline::settings::options::*;
use crate::image_pipeline::tiff::TiffCompression;

/// Version of the accepted vocabulary. Bumped whenever a row is added.
pub const SETTINGS_VERSION: u32 = 1;

const MAX_RESIZE_DIMENSION: u32 = 50_000;

/// Why an option's arguments were rejected, and which argument was at fault.
struct Rejection {
    arg: usize,
    reason: String,
}

impl Rejection {
    fn at(arg: usize, reason: impl Into<String>) -> Self {
        Self {
            arg,
            reason: reason.into(),
        }
    }
}

type Apply = fn(&mut ProcessingOptions, &[&str]) -> std::result::Result<(), Rejection>;

struct KeySpec {
    key: &'static str,
    apply: Apply,
}

struct FlagSpec {
    flag: &'static str,
    arity: usize,
    apply: Apply,
}

const KEYS: &[KeySpec] = &[
    KeySpec { key: "wb", apply: apply_white_balance },
    KeySpec { key: "outputBitDepth", apply: apply_bit_depth },
    KeySpec { key: "colorSpace", apply: apply_color_space },
    KeySpec { key: "highlights", apply: apply_highlights },
    KeySpec { key: "exposure", apply: apply_exposure },
    KeySpec { key: "brightness", apply: apply_brightness },
    KeySpec { key: "demosaic", apply: apply_demosaic },
    KeySpec { key: "gamma", apply: apply_gamma },
    KeySpec { key: "crop", apply: apply_crop },
    KeySpec { key: "resize", apply: apply_resize },
    KeySpec { key: "resizeFilter", apply: apply_resize_filter },
    KeySpec { key: "orientation", apply: apply_orientation },
    KeySpec { key: "compression", apply: apply_compression },
];

const FLAGS: &[FlagSpec] = &[
    FlagSpec { flag: "-w", arity: 0, apply: flag_camera_wb },
    FlagSpec { flag: "-a", arity: 0, apply: flag_auto_wb },
    FlagSpec { flag: "-r", arity: 4, apply: flag_custom_wb },
    FlagSpec { flag: "-6", arity: 0, apply: flag_sixteen_bit },
    FlagSpec { flag: "-o", arity: 1, apply: apply_color_space_code },
    FlagSpec { flag: "-H", arity: 1, apply: apply_highlight_code },
    FlagSpec { flag: "-b", arity: 1, apply: apply_brightness },
    FlagSpec { flag: "-h", arity: 0, apply: flag_half_size },
    FlagSpec { flag: "-t", arity: 1, apply: apply_flip_code },
    FlagSpec { flag: "-T", arity: 0, apply: flag_tiff_output },
];

enum ParseState<'t> {
    ExpectOption,
    ExpectArgs {
        spec: &'static FlagSpec,
        position: usize,
        args: Vec<&'t str>,
    },
}

/// Parse an ordered settings sequence into [`ProcessingOptions`].
///
/// An empty sequence yields `ProcessingOptions::default()`.
pub fn parse_settings<S: AsRef<str>>(tokens: &[S]) -> Result<ProcessingOptions> {
    let mut options = ProcessingOptions::default();
    let mut state = ParseState::ExpectOption;

    for (position, token) in tokens.iter().enumerate() {
        let token: &str = token.as_ref();
        state = match state {
            ParseState::ExpectOption => start_option(&mut options, position, token)?,
            ParseState::ExpectArgs {
                spec,
                position: flag_position,
                mut args,
            } => {
                args.push(token);
                if args.len() == spec.arity {
                    apply_flag(&mut options, spec, flag_position, &args)?;
                    ParseState::ExpectOption
                } else {
                    ParseState::ExpectArgs {
                        spec,
                        position: flag_position,
                        args,
                    }
                }
            }
        };
    }

    if let ParseState::ExpectArgs {
        spec,
        position,
        args,
    } = state
    {
        return Err(ConversionError::invalid_setting(
            position,
            spec.flag,
            format!(
                "expects {} argument(s) but the settings ended after {}",
                spec.arity,
                args.len()
            ),
        ));
    }

    debug!(count = tokens.len(), "Parsed settings: {:?}", options);
    Ok(options)
}

fn start_option<'t>(
    options: &mut ProcessingOptions,
    position: usize,
    token: &'t str,
) -> Result<ParseState<'t>> {
    if let Some((key, value)) = token.split_once('=') {
        let spec = KEYS
            .iter()
            .find(|spec| spec.key.eq_ignore_ascii_case(key.trim()))
            .ok_or_else(|| {
                ConversionError::invalid_setting(position, token, format!("unknown option {:?}", key))
            })?;
        let args: Vec<&str> = value.split(',').map(str::trim).collect();
        (spec.apply)(options, &args)
            .map_err(|rejection| ConversionError::invalid_setting(position, token, rejection.reason))?;
        return Ok(ParseState::ExpectOption);
    }

    let spec = FLAGS
        .iter()
        .find(|spec| spec.flag == token)
        .ok_or_else(|| ConversionError::invalid_setting(position, token, "unrecognized token"))?;

    if spec.arity == 0 {
        apply_flag(options, spec, position, &[])?;
        return Ok(ParseState::ExpectOption);
    }

    Ok(ParseState::ExpectArgs {
        spec,
        position,
        args: Vec::with_capacity(spec.arity),
    })
}

fn apply_flag(
    options: &mut ProcessingOptions,
    spec: &FlagSpec,
    position: usize,
    args: &[&str],
) -> Result<()> {
    (spec.apply)(options, args).map_err(|rejection| {
        let offending = args.get(rejection.arg).copied().unwrap_or(spec.flag);
        let offending_position = if args.is_empty() {
            position
        } else {
            position + 1 + rejection.arg
        };
        ConversionError::invalid_setting(offending_position, offending, rejection.reason)
    })
}

fn expect_count(args: &[&str], count: usize) -> std::result::Result<(), Rejection> {
    if args.iter().any(|a| a.is_empty()) {
        let index = args.iter().position(|a| a.is_empty()).unwrap_or(0);
        return Err(Rejection::at(index, "missing value"));
    }
    if args.len() != count {
        return Err(Rejection::at(
            args.len().min(count),
            format!("expected {} value(s), got {}", count, args.len()),
        ));
    }
    Ok(())
}

fn parse_number(args: &[&str], index: usize) -> std::result::Result<f32, Rejection> {
    let raw = args[index];
    let value: f32 = raw
        .parse()
        .map_err(|_| Rejection::at(index, format!("{:?} is not a number", raw)))?;
    if !value.is_finite() {
        return Err(Rejection::at(index, format!("{:?} is not finite", raw)));
    }
    Ok(value)
}

fn parse_integer(args: &[&str], index: usize) -> std::result::Result<u32, Rejection> {
    let raw = args[index];
    raw.parse()
        .map_err(|_| Rejection::at(index, format!("{:?} is not a non-negative integer", raw)))
}

fn parse_in_range(
    args: &[&str],
    index: usize,
    min: f32,
    max: f32,
    min_inclusive: bool,
) -> std::result::Result<f32, Rejection> {
    let value = parse_number(args, index)?;
    let above_min = if min_inclusive { value >= min } else { value > min };
    if !above_min || value > max {
        let open = if min_inclusive { '[' } else { '(' };
        return Err(Rejection::at(
            index,
            format!("{} is outside {}{}, {}]", value, open, min, max),
        ));
    }
    Ok(value)
}

/// Three multipliers (r, g, b) or four (r, g, b, g2); the greens are averaged.
fn custom_multipliers(args: &[&str], first: usize) -> std::result::Result<WhiteBalance, Rejection> {
    let count = args.len() - first;
    if count != 3 && count != 4 {
        return Err(Rejection::at(
            first,
            format!("custom white balance needs 3 or 4 multipliers, got {}", count),
        ));
    }
    let mut values = Vec::with_capacity(count);
    for index in first..args.len() {
        let value = parse_number(args, index)?;
        if value <= 0.0 {
            return Err(Rejection::at(
                index,
                format!("white balance multiplier {} must be positive", value),
            ));
        }
        values.push(value);
    }
    let green = if count == 4 {
        (values[1] + values[3]) / 2.0
    } else {
        values[1]
    };
    Ok(WhiteBalance::Custom([values[0], green, values[2]]))
}

fn flag_camera_wb(o: &mut ProcessingOptions, _: &[&str]) -> std::result::Result<(), Rejection> {
    o.white_balance = WhiteBalance::Camera;
    Ok(())
}

fn flag_auto_wb(o: &mut ProcessingOptions, _: &[&str]) -> std::result::Result<(), Rejection> {
    o.white_balance = WhiteBalance::Auto;
    Ok(())
}

fn flag_custom_wb(o: &mut ProcessingOptions, args: &[&str]) -> std::result::Result<(), Rejection> {
    o.white_balance = custom_multipliers(args, 0)?;
    Ok(())
}

fn flag_sixteen_bit(o: &mut ProcessingOptions, _: &[&str]) -> std::result::Result<(), Rejection> {
    o.output_bit_depth = BitDepth::Sixteen;
    Ok(())
}

fn flag_half_size(o: &mut ProcessingOptions, _: &[&str]) -> std::result::Result<(), Rejection> {
    o.demosaic = DemosaicAlgorithm::HalfSize;
    Ok(())
}

/// TIFF is the only full-conversion container, so `-T` is accepted as-is.
fn flag_tiff_output(_: &mut ProcessingOptions, _: &[&str]) -> std::result::Result<(), Rejection> {
    Ok(())
}

fn apply_white_balance(o: &mut ProcessingOptions, args: &[&str]) -> std::result::Result<(), Rejection> {
    let mode = args[0].to_ascii_lowercase();
    o.white_balance = match mode.as_str() {
        "camera" => {
            expect_count(args, 1)?;
            WhiteBalance::Camera
        }
        "auto" => {
            expect_count(args, 1)?;
            WhiteBalance::Auto
        }
        "daylight" => {
            expect_count(args, 1)?;
            WhiteBalance::Daylight
        }
        "custom" => custom_multipliers(args, 1)?,
        "" => return Err(Rejection::at(0, "missing value")),
        other => return Err(Rejection::at(0, format!("unknown white balance mode {:?}", other))),
    };
    Ok(())
}

fn apply_bit_depth(o: &mut ProcessingOptions, args: &[&str]) -> std::result::Result<(), Rejection> {
    expect_count(args, 1)?;
    o.output_bit_depth = match args[0] {
        "8" => BitDepth::Eight,
        "16" => BitDepth::Sixteen,
        other => return Err(Rejection::at(0, format!("bit depth must be 8 or 16, got {:?}", other))),
    };
    Ok(())
}

fn apply_color_space(o: &mut ProcessingOptions, args: &[&str]) -> std::result::Result<(), Rejection> {
    expect_count(args, 1)?;
    o.color_space = match args[0].to_ascii_lowercase().as_str() {
        "raw" => ColorSpace::Raw,
        "srgb" => ColorSpace::Srgb,
        "adobe" | "adobergb" => ColorSpace::Adobe,
        "prophoto" => ColorSpace::ProPhoto,
        "xyz" => ColorSpace::Xyz,
        other => return Err(Rejection::at(0, format!("unknown colour space {:?}", other))),
    };
    Ok(())
}

fn apply_color_space_code(o: &mut ProcessingOptions, args: &[&str]) -> std::result::Result<(), Rejection> {
    o.color_space = match parse_integer(args, 0)? {
        0 => ColorSpace::Raw,
        1 => ColorSpace::Srgb,
        2 => ColorSpace::Adobe,
        4 => ColorSpace::ProPhoto,
        5 => ColorSpace::Xyz,
        other => return Err(Rejection::at(0, format!("colour space code {} is not supported", other))),
    };
    Ok(())
}

fn reconstruct_level(args: &[&str], index: usize) -> std::result::Result<HighlightMode, Rejection> {
    let level = parse_integer(args, index)?;
    if !(MIN_RECONSTRUCT_LEVEL as u32..=MAX_RECONSTRUCT_LEVEL as u32).contains(&level) {
        return Err(Rejection::at(
            index,
            format!(
                "reconstruct level must be {}..={}, got {}",
                MIN_RECONSTRUCT_LEVEL, MAX_RECONSTRUCT_LEVEL, level
            ),
        ));
    }
    Ok(HighlightMode::Reconstruct { level: level as u8 })
}

fn apply_highlights(o: &mut ProcessingOptions, args: &[&str]) -> std::result::Result<(), Rejection> {
    o.highlights = match args[0].to_ascii_lowercase().as_str() {
        "clip" => {
            expect_count(args, 1)?;
            HighlightMode::Clip
        }
        "unclip" => {
            expect_count(args, 1)?;
            HighlightMode::Unclip
        }
        "blend" => {
            expect_count(args, 1)?;
            HighlightMode::Blend
        }
        "reconstruct" => match args.len() {
            1 => HighlightMode::Reconstruct { level: 5 },
            2 => reconstruct_level(args, 1)?,
            _ => return Err(Rejection::at(2, "reconstruct takes at most one level")),
        },
        "" => return Err(Rejection::at(0, "missing value")),
        other => return Err(Rejection::at(0, format!("unknown highlight mode {:?}", other))),
    };
    Ok(())
}

fn apply_highlight_code(o: &mut ProcessingOptions, args: &[&str]) -> std::result::Result<(), Rejection> {
    o.highlights = match parse_integer(args, 0)? {
        0 => HighlightMode::Clip,
        1 => HighlightMode::Unclip,
        2 => HighlightMode::Blend,
        _ => reconstruct_level(args, 0)?,
    };
    Ok(())
}

fn apply_exposure(o: &mut ProcessingOptions, args: &[&str]) -> std::result::Result<(), Rejection> {
    expect_count(args, 1)?;
    o.exposure_ev = parse_in_range(args, 0, -5.0, 5.0, true)?;
    Ok(())
}

fn apply_brightness(o: &mut ProcessingOptions, args: &[&str]) -> std::result::Result<(), Rejection> {
    expect_count(args, 1)?;
    o.brightness = parse_in_range(args, 0, 0.0, 16.0, false)?;
    Ok(())
}

fn apply_demosaic(o: &mut ProcessingOptions, args: &[&str]) -> std::result::Result<(), Rejection> {
    expect_count(args, 1)?;
    o.demosaic = match args[0].to_ascii_lowercase().as_str() {
        "nearest" => DemosaicAlgorithm::Nearest,
        "linear" | "bilinear" => DemosaicAlgorithm::Linear,
        "cubic" => DemosaicAlgorithm::Cubic,
        "half" => DemosaicAlgorithm::HalfSize,
        other => return Err(Rejection::at(0, format!("unknown demosaic algorithm {:?}", other))),
    };
    Ok(())
}

fn apply_gamma(o: &mut ProcessingOptions, args: &[&str]) -> std::result::Result<(), Rejection> {
    expect_count(args, 1)?;
    o.gamma = Some(match args[0].to_ascii_lowercase().as_str() {
        "srgb" => ToneCurve::Srgb,
        "bt709" => ToneCurve::Bt709,
        "linear" => ToneCurve::Linear,
        _ => ToneCurve::Power(parse_in_range(args, 0, 0.1, 5.0, true)?),
    });
    Ok(())
}

fn apply_crop(o: &mut ProcessingOptions, args: &[&str]) -> std::result::Result<(), Rejection> {
    expect_count(args, 4)?;
    let x = parse_integer(args, 0)?;
    let y = parse_integer(args, 1)?;
    let width = parse_integer(args, 2)?;
    let height = parse_integer(args, 3)?;
    if width == 0 {
        return Err(Rejection::at(2, "crop width must be positive"));
    }
    if height == 0 {
        return Err(Rejection::at(3, "crop height must be positive"));
    }
    o.crop = Some(CropBox {
        x,
        y,
        width,
        height,
    });
    Ok(())
}

fn resize_dimension(raw: &str, index: usize) -> std::result::Result<u32, Rejection> {
    let value: u32 = raw
        .parse()
        .map_err(|_| Rejection::at(index, format!("{:?} is not a positive integer", raw)))?;
    if value == 0 || value > MAX_RESIZE_DIMENSION {
        return Err(Rejection::at(
            index,
            format!("resize dimension must be 1..={}, got {}", MAX_RESIZE_DIMENSION, value),
        ));
    }
    Ok(value)
}

fn apply_resize(o: &mut ProcessingOptions, args: &[&str]) -> std::result::Result<(), Rejection> {
    expect_count(args, 1)?;
    let value = args[0].to_ascii_lowercase();
    o.resize = Some(match value.split_once('x') {
        Some((width, height)) => ResizeMode::Exact {
            width: resize_dimension(width, 0)?,
            height: resize_dimension(height, 0)?,
        },
        None => ResizeMode::Fit {
            max_edge: resize_dimension(&value, 0)?,
        },
    });
    Ok(())
}

fn apply_resize_filter(o: &mut ProcessingOptions, args: &[&str]) -> std::result::Result<(), Rejection> {
    expect_count(args, 1)?;
    o.resize_filter = match args[0].to_ascii_lowercase().as_str() {
        "nearest" => FilterType::Nearest,
        "bilinear" => FilterType::Bilinear,
        "lanczos3" => FilterType::Lanczos3,
        other => return Err(Rejection::at(0, format!("unknown resize filter {:?}", other))),
    };
    Ok(())
}

fn apply_orientation(o: &mut ProcessingOptions, args: &[&str]) -> std::result::Result<(), Rejection> {
    expect_count(args, 1)?;
    if args[0].eq_ignore_ascii_case("auto") {
        o.orientation = OrientationOverride::Auto;
        return Ok(());
    }
    let code = parse_integer(args, 0)?;
    let orientation = Orientation::from_exif(code)
        .ok_or_else(|| Rejection::at(0, format!("orientation must be auto or 1..=8, got {}", code)))?;
    o.orientation = OrientationOverride::Fixed(orientation);
    Ok(())
}

fn apply_flip_code(o: &mut ProcessingOptions, args: &[&str]) -> std::result::Result<(), Rejection> {
    let orientation = match parse_integer(args, 0)? {
        0 => Orientation::Normal,
        3 => Orientation::Rotate180,
        5 => Orientation::Rotate270CW,
        6 => Orientation::Rotate90CW,
        other => return Err(Rejection::at(0, format!("flip code must be 0, 3, 5 or 6, got {}", other))),
    };
    o.orientation = OrientationOverride::Fixed(orientation);
    Ok(())
}

fn apply_compression(o: &mut ProcessingOptions, args: &[&str]) -> std::result::Result<(), Rejection> {
    expect_count(args, 1)?;
    o.compression = match args[0].to_ascii_lowercase().as_str() {
        "none" => TiffCompression::None,
        "lzw" => TiffCompression::Lzw,
        "deflate" => TiffCompression::Deflate,
        other => return Err(Rejection::at(0, format!("unknown compression {:?}", other))),
    };
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(tokens: &[&str]) -> Result<ProcessingOptions> {
        parse_settings(tokens)
    }

    fn rejected_at(tokens: &[&str]) -> (usize, String) {
        match parse(tokens) {
            Err(ConversionError::InvalidSettings { position, token, .. }) => (position, token),
            other => panic!("expected InvalidSettings, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_sequence_yields_defaults() {
        let empty: [&str; 0] = [];
        assert_eq!(parse(&empty).unwrap(), ProcessingOptions::default());
    }

    #[test]
    fn test_documented_scenario_tokens() {
        let options = parse(&["outputBitDepth=16", "colorSpace=sRGB", "wb=camera"]).unwrap();
        assert_eq!(options.output_bit_depth, BitDepth::Sixteen);
        assert_eq!(options.color_space, ColorSpace::Srgb);
        assert_eq!(options.white_balance, WhiteBalance::Camera);
    }

    #[test]
    fn test_last_occurrence_wins() {
        let options = parse(&["wb=auto", "wb=camera"]).unwrap();
        assert_eq!(options.white_balance, WhiteBalance::Camera);

        let options = parse(&["-a", "exposure=1", "exposure=-0.5", "wb=daylight", "-a"]).unwrap();
        assert_eq!(options.white_balance, WhiteBalance::Auto);
        assert_eq!(options.exposure_ev, -0.5);
    }

    #[test]
    fn test_negative_custom_multiplier_rejected_at_position() {
        let (position, token) = rejected_at(&["wb=custom,-1,2,2"]);
        assert_eq!(position, 0);
        assert_eq!(token, "wb=custom,-1,2,2");

        let (position, token) = rejected_at(&["outputBitDepth=16", "wb=custom,-1,2,2"]);
        assert_eq!(position, 1);
        assert_eq!(token, "wb=custom,-1,2,2");
    }

    #[test]
    fn test_custom_white_balance_forms() {
        let options = parse(&["wb=custom,2.0,1.0,1.5"]).unwrap();
        assert_eq!(options.white_balance, WhiteBalance::Custom([2.0, 1.0, 1.5]));

        let options = parse(&["wb=custom,2,1,1.5,3"]).unwrap();
        assert_eq!(options.white_balance, WhiteBalance::Custom([2.0, 2.0, 1.5]));

        rejected_at(&["wb=custom,2,1"]);
        rejected_at(&["wb=custom,2,1,nan"]);
        rejected_at(&["wb=custom,2,inf,1"]);
        rejected_at(&["wb=custom,0,1,1"]);
        rejected_at(&["wb=camera,1"]);
    }

    #[test]
    fn test_flag_consumes_following_tokens() {
        let options = parse(&["-r", "2", "1", "1.5", "1", "-6", "-o", "2"]).unwrap();
        assert_eq!(options.white_balance, WhiteBalance::Custom([2.0, 1.0, 1.5]));
        assert_eq!(options.output_bit_depth, BitDepth::Sixteen);
        assert_eq!(options.color_space, ColorSpace::Adobe);
    }

    #[test]
    fn test_flag_argument_error_points_at_argument() {
        let (position, token) = rejected_at(&["-6", "-r", "2", "-1", "1", "1"]);
        assert_eq!(position, 3);
        assert_eq!(token, "-1");
    }

    #[test]
    fn test_flag_missing_arguments_points_at_flag() {
        let (position, token) = rejected_at(&["-w", "-H"]);
        assert_eq!(position, 1);
        assert_eq!(token, "-H");

        let (position, _) = rejected_at(&["-r", "1", "1"]);
        assert_eq!(position, 0);
    }

    #[test]
    fn test_unknown_tokens_fail_closed() {
        assert_eq!(rejected_at(&["wb=auto", "--fast"]).0, 1);
        assert_eq!(rejected_at(&["sharpen=3"]).0, 0);
        assert_eq!(rejected_at(&["srgb"]).0, 0);
        assert_eq!(rejected_at(&[""]).0, 0);
        assert_eq!(rejected_at(&["wb="]).0, 0);
    }

    #[test]
    fn test_keys_are_case_insensitive() {
        let options = parse(&["OUTPUTBITDEPTH=16", "ColorSpace=ProPhoto"]).unwrap();
        assert_eq!(options.output_bit_depth, BitDepth::Sixteen);
        assert_eq!(options.color_space, ColorSpace::ProPhoto);
    }

    #[test]
    fn test_range_validation() {
        rejected_at(&["outputBitDepth=12"]);
        rejected_at(&["exposure=5.5"]);
        rejected_at(&["exposure=-6"]);
        rejected_at(&["brightness=0"]);
        rejected_at(&["brightness=17"]);
        rejected_at(&["gamma=0.01"]);
        rejected_at(&["crop=0,0,0,10"]);
        rejected_at(&["resize=0"]);
        rejected_at(&["resize=100x0"]);
        rejected_at(&["highlights=reconstruct,2"]);
        rejected_at(&["-H", "10"]);
        rejected_at(&["-o", "3"]);
        rejected_at(&["-t", "4"]);
        rejected_at(&["orientation=9"]);
    }

    #[test]
    fn test_highlight_codes() {
        assert_eq!(parse(&["-H", "0"]).unwrap().highlights, HighlightMode::Clip);
        assert_eq!(parse(&["-H", "1"]).unwrap().highlights, HighlightMode::Unclip);
        assert_eq!(parse(&["-H", "2"]).unwrap().highlights, HighlightMode::Blend);
        assert_eq!(
            parse(&["-H", "7"]).unwrap().highlights,
            HighlightMode::Reconstruct { level: 7 }
        );
        assert_eq!(
            parse(&["highlights=reconstruct"]).unwrap().highlights,
            HighlightMode::Reconstruct { level: 5 }
        );
    }

    #[test]
    fn test_geometry_options() {
        let options = parse(&["crop=10,20,300,200", "resize=640x480", "resizeFilter=lanczos3", "-t", "6"]).unwrap();
        assert_eq!(
            options.crop,
            Some(CropBox { x: 10, y: 20, width: 300, height: 200 })
        );
        assert_eq!(options.resize, Some(ResizeMode::Exact { width: 640, height: 480 }));
        assert_eq!(options.resize_filter, FilterType::Lanczos3);
        assert_eq!(options.orientation, OrientationOverride::Fixed(Orientation::Rotate90CW));

        let options = parse(&["resize=1024", "orientation=auto"]).unwrap();
        assert_eq!(options.resize, Some(ResizeMode::Fit { max_edge: 1024 }));
        assert_eq!(options.orientation, OrientationOverride::Auto);
    }

    #[test]
    fn test_half_size_and_noop_flags() {
        let options = parse(&["-T", "-h"]).unwrap();
        assert_eq!(options.demosaic, DemosaicAlgorithm::HalfSize);
    }

    #[test]
    fn test_reserialize_round_trip() {
        let options = parse(&[
            "-r", "2.25", "1", "1.75", "1",
            "-6",
            "colorSpace=adobe",
            "highlights=reconstruct,4",
            "exposure=0.7",
            "brightness=1.3",
            "demosaic=cubic",
            "gamma=2.4",
            "crop=1,2,3,4",
            "resize=800",
            "compression=lzw",
        ])
        .unwrap();
        let again = parse_settings(&options.to_tokens()).unwrap();
        assert_eq!(again, options);
    }
}
