use crate::config::{Configuration, Dimensions};
use crate::constants::DEFAULT_QUALITY;
use crate::formats::TargetFormat;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "img-squeeze",
    about = "Batch image compression with local re-encoding or the Tinify API",
    long_about = "img-squeeze walks a directory tree and shrinks every JPEG, PNG, WebP, BMP, TIFF and GIF it finds. \
                  Images are re-encoded locally (optionally resized, optionally keeping EXIF metadata, optionally \
                  converted to lossless WebP) or sent to the Tinify compression API. \
                  One bad file never stops the batch; the summary lists every outcome.",
    version,
    after_help = "EXAMPLES:\n  \
    img-squeeze ./images -q 85 --resize 1920x1080\n  \
    img-squeeze ./images -o ./compressed --preserve-exif\n  \
    img-squeeze ./images --format webp -o ./webp\n  \
    TINIFY_API_KEY=... img-squeeze ./images --remote"
)]
pub struct Args {
    #[arg(help = "Directory to process")]
    pub input: PathBuf,

    #[arg(
        short = 'o',
        long,
        help = "Output directory (default: in place)",
        long_help = "Write results into this directory, mirroring the input tree. \
                     Without it, files are rewritten in place (format conversion writes next to the source)."
    )]
    pub output: Option<PathBuf>,

    #[arg(
        short = 'q',
        long,
        default_value_t = DEFAULT_QUALITY,
        value_parser = clap::value_parser!(u8).range(1..=100),
        help = "Compression quality (1-100)",
        long_help = "Compression quality from 1 (lowest) to 100 (highest). \
                     For PNG: >=90 uses Zopfli, >=70 uses high compression, <70 uses standard compression."
    )]
    pub quality: u8,

    #[arg(
        short = 'r',
        long,
        value_name = "WIDTHxHEIGHT",
        help = "Maximum size, e.g. 800x600",
        long_help = "Shrink images so they fit within WIDTHxHEIGHT while preserving aspect ratio. \
                     Smaller images are never enlarged."
    )]
    pub resize: Option<Dimensions>,

    #[arg(short = 'e', long, help = "Keep EXIF metadata")]
    pub preserve_exif: bool,

    #[arg(
        short = 'f',
        long,
        default_value = "keep",
        help = "Output format (keep, webp)",
        long_help = "keep: re-encode in the source format. webp: convert everything to lossless WebP."
    )]
    pub format: TargetFormat,

    #[arg(
        long,
        help = "Compress with the Tinify API",
        long_help = "Send images to the Tinify (TinyPNG) API instead of re-encoding locally. \
                     Reads the API key from the TINIFY_API_KEY environment variable."
    )]
    pub remote: bool,

    #[arg(long, help = "Only process the top-level directory")]
    pub no_recursive: bool,

    #[arg(long, help = "Leave files alone when compression does not shrink them")]
    pub skip_larger: bool,

    #[arg(
        short = 'j',
        long,
        help = "Number of parallel threads (default: auto)",
        long_help = "Number of worker threads. Also caps concurrent Tinify requests. Use 1 for sequential processing."
    )]
    pub threads: Option<usize>,

    #[arg(long, conflicts_with = "verbose", help = "Only print errors and the summary")]
    pub quiet: bool,

    #[arg(short = 'v', long, help = "Print per-file details")]
    pub verbose: bool,
}

impl Args {
    /// Run configuration for these arguments. The credential is filled in
    /// separately, once, at startup.
    pub fn configuration(&self) -> Configuration {
        Configuration {
            quality: self.quality,
            resize: self.resize,
            preserve_exif: self.preserve_exif,
            use_remote_api: self.remote,
            target_format: self.format,
            api_credential: None,
            output_root: self.output.clone(),
            recursive: !self.no_recursive,
            threads: self.threads,
            skip_if_larger: self.skip_larger,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_arguments() {
        let args = Args::try_parse_from([
            "img-squeeze",
            "photos",
            "-q",
            "60",
            "--resize",
            "800x600",
            "--preserve-exif",
            "--format",
            "webp",
            "-o",
            "out",
            "-j",
            "2",
        ])
        .unwrap();

        let config = args.configuration();
        assert_eq!(config.quality, 60);
        assert_eq!(config.resize, Some(Dimensions::new(800, 600)));
        assert!(config.preserve_exif);
        assert_eq!(config.target_format, TargetFormat::LosslessWebP);
        assert_eq!(config.output_root, Some(PathBuf::from("out")));
        assert_eq!(config.threads, Some(2));
        assert!(config.recursive);
    }

    #[test]
    fn test_parse_defaults() {
        let config = Args::try_parse_from(["img-squeeze", "photos"])
            .unwrap()
            .configuration();
        assert_eq!(config.quality, 80);
        assert_eq!(config.target_format, TargetFormat::KeepOriginal);
        assert!(!config.use_remote_api);
        assert!(config.output_root.is_none());
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(Args::try_parse_from(["img-squeeze", "photos", "-q", "0"]).is_err());
        assert!(Args::try_parse_from(["img-squeeze", "photos", "--resize", "big"]).is_err());
        assert!(Args::try_parse_from(["img-squeeze", "photos", "--format", "avif"]).is_err());
    }
}
