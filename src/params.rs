use crate::formats::OutputFormat;
use crate::presets::CompressionPreset;

/// One universal pixel format for maximum playback compatibility.
pub const PIXEL_FORMAT: &str = "yuv420p";

/// Fixed audio bitrate, transparent quality across all codecs.
pub const AUDIO_BITRATE: &str = "192k";

/// Maps (format, preset) to the encoder argument list, in a fixed order:
/// codec args, speed args, pixel format, quality args, audio bitrate.
pub fn derive(format: OutputFormat, preset: CompressionPreset) -> Vec<String> {
    let mut args = codec_parameters(format);
    args.append(&mut speed_parameters(format));
    args.push(String::from("-pix_fmt"));
    args.push(String::from(PIXEL_FORMAT));
    args.append(&mut quality_parameters(format, preset));
    args.push(String::from("-b:a"));
    args.push(String::from(AUDIO_BITRATE));
    args
}

fn codec_parameters(format: OutputFormat) -> Vec<String> {
    match format {
        OutputFormat::Mp4 | OutputFormat::Mov | OutputFormat::Mkv => vec![
            String::from("-c:v"), String::from("libx264"),
            String::from("-c:a"), String::from("aac"),
        ],
        OutputFormat::Webm => vec![
            String::from("-c:v"), String::from("libvpx"),
            String::from("-c:a"), String::from("libvorbis"),
        ],
        OutputFormat::Avi => vec![
            String::from("-c:v"), String::from("mpeg4"),
            String::from("-c:a"), String::from("mp3"),
        ],
    }
}

fn speed_parameters(format: OutputFormat) -> Vec<String> {
    match format {
        OutputFormat::Mp4 | OutputFormat::Mov | OutputFormat::Mkv => vec![
            String::from("-preset"), String::from("ultrafast"),
        ],
        OutputFormat::Webm => vec![
            String::from("-deadline"), String::from("good"),
            String::from("-cpu-used"), String::from("5"),
        ],
        // mpeg4 has no speed/quality tradeoff knob
        OutputFormat::Avi => vec![],
    }
}

fn quality_parameters(format: OutputFormat, preset: CompressionPreset) -> Vec<String> {
    match format {
        OutputFormat::Avi => vec![
            String::from("-q:v"), avi_quality(preset).to_string(),
        ],
        // libvpx needs -b:v 0 to honor -crf as constant quality
        OutputFormat::Webm => vec![
            String::from("-crf"), webm_crf(preset).to_string(),
            String::from("-b:v"), String::from("0"),
        ],
        _ => vec![
            String::from("-crf"), crf(preset).to_string(),
        ],
    }
}

fn crf(preset: CompressionPreset) -> u8 {
    match preset {
        CompressionPreset::None => 18,
        CompressionPreset::Light => 28,
        CompressionPreset::Medium => 33,
        CompressionPreset::Heavy => 40,
    }
}

// libvpx uses a wider crf scale (4-63), needs higher values than x264
fn webm_crf(preset: CompressionPreset) -> u8 {
    match preset {
        CompressionPreset::None => 15,
        CompressionPreset::Light => 30,
        CompressionPreset::Medium => 40,
        CompressionPreset::Heavy => 50,
    }
}

// mpeg4 takes -q:v on its own small-integer scale, lower is better
fn avi_quality(preset: CompressionPreset) -> u8 {
    match preset {
        CompressionPreset::None => 2,
        CompressionPreset::Light => 8,
        CompressionPreset::Medium => 14,
        CompressionPreset::Heavy => 22,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::FORMATS;
    use crate::presets::PRESETS;

    fn count(args: &[String], flag: &str) -> usize {
        args.iter().filter(|a| a.as_str() == flag).count()
    }

    #[test]
    fn test_derive_is_deterministic() {
        for format in FORMATS {
            for preset in PRESETS {
                assert_eq!(derive(format, preset), derive(format, preset));
            }
        }
    }

    #[test]
    fn test_exactly_one_quality_directive_per_family() {
        for format in FORMATS {
            for preset in PRESETS {
                let args = derive(format, preset);
                assert!(!args.is_empty());
                match format {
                    OutputFormat::Avi => {
                        assert_eq!(count(&args, "-q:v"), 1, "{format} {preset}");
                        assert_eq!(count(&args, "-crf"), 0, "{format} {preset}");
                    },
                    _ => {
                        assert_eq!(count(&args, "-crf"), 1, "{format} {preset}");
                        assert_eq!(count(&args, "-q:v"), 0, "{format} {preset}");
                    },
                }
            }
        }
    }

    #[test]
    fn test_mp4_argument_order() {
        assert_eq!(
            derive(OutputFormat::Mp4, CompressionPreset::Medium),
            vec![
                "-c:v", "libx264", "-c:a", "aac",
                "-preset", "ultrafast",
                "-pix_fmt", "yuv420p",
                "-crf", "33",
                "-b:a", "192k",
            ],
        );
    }

    #[test]
    fn test_webm_uses_constant_quality_mode() {
        let args = derive(OutputFormat::Webm, CompressionPreset::Heavy);
        let crf_pos = args.iter().position(|a| a == "-crf").unwrap();
        assert_eq!(args[crf_pos + 1], "50");
        assert_eq!(args[crf_pos + 2], "-b:v");
        assert_eq!(args[crf_pos + 3], "0");
        assert_eq!(count(&args, "-deadline"), 1);
        assert_eq!(count(&args, "-cpu-used"), 1);
    }

    #[test]
    fn test_avi_has_no_speed_knob() {
        let args = derive(OutputFormat::Avi, CompressionPreset::None);
        assert_eq!(count(&args, "-preset"), 0);
        assert_eq!(count(&args, "-deadline"), 0);
        let q_pos = args.iter().position(|a| a == "-q:v").unwrap();
        assert_eq!(args[q_pos + 1], "2");
    }

    #[test]
    fn test_audio_bitrate_is_fixed() {
        for format in FORMATS {
            for preset in PRESETS {
                let args = derive(format, preset);
                let pos = args.iter().position(|a| a == "-b:a").unwrap();
                assert_eq!(args[pos + 1], AUDIO_BITRATE);
            }
        }
    }
}
