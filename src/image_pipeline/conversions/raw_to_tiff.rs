use std::io::Write;
use std::path::Path;

use tracing::{info, info_span, instrument};

use crate::image_pipeline::{
    common::{publish_atomically, ConversionError, PipelineTimings, Result, Timer},
    processing::{process_with_timings, FinishedImage},
    raw::{DecodeLimits, RawDecoder, RawImageReader, RawSource},
    settings::{parse_settings, ProcessingOptions},
    thumbnail::{extract_thumbnail, ThumbnailKind},
    tiff::{ConversionConfig, StandardTiffWriter, ThumbnailFormat, TiffCompression, TiffWriter},
};

pub struct RawToTiffPipeline<R: RawImageReader, W: TiffWriter> {
    reader: R,
    writer: W,
    config: ConversionConfig,
}

impl RawToTiffPipeline<RawDecoder, StandardTiffWriter> {
    pub fn new(config: ConversionConfig) -> Self {
        Self {
            reader: RawDecoder::new(DecodeLimits::from(&config)),
            writer: StandardTiffWriter,
            config,
        }
    }
}

impl Default for RawToTiffPipeline<RawDecoder, StandardTiffWriter> {
    fn default() -> Self {
        Self::new(ConversionConfig::default())
    }
}

impl<R: RawImageReader, W: TiffWriter> RawToTiffPipeline<R, W> {
    pub fn with_custom(reader: R, writer: W, config: ConversionConfig) -> Self {
        Self {
            reader,
            writer,
            config,
        }
    }

    /// Decode and process, recording each step.
    fn render(
        &self,
        source: &RawSource,
        options: &ProcessingOptions,
        timings: &mut PipelineTimings,
    ) -> Result<FinishedImage> {
        let raw_image = {
            let _span = info_span!("decode_raw").entered();
            let timer = Timer::start("decode_raw");
            let raw_image = self.reader.read_raw(source)?;
            timer.record(timings);
            raw_image
        };
        info!(
            width = raw_image.width,
            height = raw_image.height,
            camera = %raw_image.metadata.camera,
            "Decoded sensor data"
        );

        let (finished, stage_timings) = process_with_timings(raw_image, options)?;
        timings.extend(stage_timings);
        Ok(finished)
    }

    fn encode(
        &self,
        image: &FinishedImage,
        compression: TiffCompression,
        output: &mut dyn Write,
        timings: &mut PipelineTimings,
    ) -> Result<()> {
        let _span = info_span!("encode_tiff", compression = compression.as_str()).entered();
        let timer = Timer::start("encode_tiff");
        self.writer.write_tiff(image, output, compression, &self.config)?;
        timer.record(timings);
        Ok(())
    }

    /// Convert RAW bytes already in memory, writing the TIFF to `output`.
    #[instrument(skip_all, fields(input_size = input_data.len()))]
    pub fn convert(
        &self,
        input_data: &[u8],
        options: &ProcessingOptions,
        output: &mut dyn Write,
    ) -> Result<()> {
        info!("Starting RAW to TIFF conversion");
        let mut timings = PipelineTimings::new();
        let source = RawSource::from_bytes(input_data.to_vec());

        let image = self.render(&source, options, &mut timings)?;
        self.encode(&image, options.compression, output, &mut timings)?;

        info!(
            width = image.width,
            height = image.height,
            "Conversion complete in {:.3}ms",
            timings.total_duration().as_secs_f64() * 1000.0
        );
        Ok(())
    }

    pub fn convert_file<P, Q, S>(&self, input_path: P, output_path: Q, settings: &[S]) -> Result<()>
    where
        P: AsRef<Path>,
        Q: AsRef<Path>,
        S: AsRef<str>,
    {
        self.convert_file_with_timings(input_path, output_path, settings)
            .map(|_| ())
    }

    /// Full file conversion. Settings are validated before the input is
    /// touched; the destination only appears once the TIFF is complete.
    #[instrument(skip_all)]
    pub fn convert_file_with_timings<P, Q, S>(
        &self,
        input_path: P,
        output_path: Q,
        settings: &[S],
    ) -> Result<PipelineTimings>
    where
        P: AsRef<Path>,
        Q: AsRef<Path>,
        S: AsRef<str>,
    {
        let input_path = input_path.as_ref();
        let output_path = output_path.as_ref();
        let options = parse_settings(settings)?;

        info!(
            input = %input_path.display(),
            output = %output_path.display(),
            "Converting file"
        );

        let mut timings = PipelineTimings::new();
        let source = {
            let _span = info_span!("read_input_file").entered();
            let timer = Timer::start("read_input_file");
            let source = RawSource::open(input_path)?;
            timer.record(&mut timings);
            source
        };

        let image = self.render(&source, &options, &mut timings)?;
        drop(source);

        publish_atomically(output_path, |output| {
            self.encode(&image, options.compression, output, &mut timings)
        })?;

        info!(
            width = image.width,
            height = image.height,
            "Wrote {} in {:.3}ms",
            output_path.display(),
            timings.total_duration().as_secs_f64() * 1000.0
        );
        Ok(timings)
    }

    pub fn thumbnail_file<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        input_path: P,
        output_path: Q,
    ) -> Result<()> {
        self.thumbnail_file_as(input_path, output_path, self.config.thumbnail_format)
    }

    /// Write the largest embedded preview. `Native` copies a JPEG preview
    /// byte for byte; bitmap previews, and everything under `Tiff`, are
    /// decoded, oriented and written as 8-bit TIFF.
    #[instrument(skip(self, input_path, output_path))]
    pub fn thumbnail_file_as<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        input_path: P,
        output_path: Q,
        format: ThumbnailFormat,
    ) -> Result<()> {
        let input_path = input_path.as_ref();
        let output_path = output_path.as_ref();
        info!(
            input = %input_path.display(),
            output = %output_path.display(),
            "Extracting thumbnail"
        );

        let source = RawSource::open(input_path)?;
        let thumbnail = {
            let _span = info_span!("extract_thumbnail").entered();
            extract_thumbnail(&source)?
        };

        match (&thumbnail.kind, format) {
            (ThumbnailKind::Jpeg(jpeg), ThumbnailFormat::Native) => {
                publish_atomically(output_path, |output| {
                    output
                        .write_all(jpeg)
                        .map_err(|e| ConversionError::io("writing JPEG thumbnail", e))
                })?;
            }
            _ => {
                let image = thumbnail.decode()?;
                let mut timings = PipelineTimings::new();
                publish_atomically(output_path, |output| {
                    self.encode(&image, TiffCompression::None, output, &mut timings)
                })?;
            }
        }

        info!(
            width = thumbnail.width,
            height = thumbnail.height,
            "Thumbnail written to {}",
            output_path.display()
        );
        Ok(())
    }

    pub fn config(&self) -> &ConversionConfig {
        &self.config
    }

    /// Replace the configuration, including the reader's decode limits.
    pub fn set_config(&mut self, config: ConversionConfig) {
        self.reader.set_limits(DecodeLimits::from(&config));
        self.config = config;
    }
}
