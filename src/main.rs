use anyhow::{bail, Context};
use raw_converter_rs::image_pipeline::{
    camera_count, create_thumbnail, library_version, RawToTiffPipeline,
};
use raw_converter_rs::logger;

use tracing::info;

const USAGE: &str = "usage: raw_converter_rs INPUT OUTPUT [SETTING...]\n       raw_converter_rs thumb INPUT OUTPUT";

fn main() -> anyhow::Result<()> {
    logger::init();

    info!(
        "raw_converter_rs {} ({} supported cameras)",
        library_version(),
        camera_count()
    );

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.as_slice() {
        [command, input, output] if command == "thumb" => {
            create_thumbnail(input, output)
                .with_context(|| format!("extracting thumbnail from {}", input))?;
            info!("Thumbnail written to {}", output);
        }
        [input, output, settings @ ..] => {
            let timings = RawToTiffPipeline::default()
                .convert_file_with_timings(input, output, settings)
                .with_context(|| format!("converting {}", input))?;
            info!("Conversion successful: {}", output);
            timings.log_summary();
        }
        _ => bail!(USAGE),
    }

    Ok(())
}
