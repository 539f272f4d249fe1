use std::fmt::Display;

pub const FORMATS: [OutputFormat; 5] = [
    OutputFormat::Mp4,
    OutputFormat::Webm,
    OutputFormat::Mov,
    OutputFormat::Avi,
    OutputFormat::Mkv,
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OutputFormat {
    Mp4,
    Webm,
    Mov,
    Avi,
    Mkv,
}

impl OutputFormat {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "mp4" => Some(OutputFormat::Mp4),
            "webm" => Some(OutputFormat::Webm),
            "mov" => Some(OutputFormat::Mov),
            "avi" => Some(OutputFormat::Avi),
            "mkv" => Some(OutputFormat::Mkv),
            _ => None,
        }
    }

    /// Target format for a file processed in compress mode: keep the source
    /// container when it is one we can produce, otherwise fall back to mp4.
    pub fn from_filename(name: &str) -> Self {
        match name.rsplit_once('.') {
            Some((_, ext)) => OutputFormat::parse(ext).unwrap_or(OutputFormat::Mp4),
            None => OutputFormat::Mp4,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Mp4 => "mp4",
            OutputFormat::Webm => "webm",
            OutputFormat::Mov => "mov",
            OutputFormat::Avi => "avi",
            OutputFormat::Mkv => "mkv",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            OutputFormat::Mp4 => "video/mp4",
            OutputFormat::Webm => "video/webm",
            OutputFormat::Mov => "video/quicktime",
            OutputFormat::Avi => "video/x-msvideo",
            OutputFormat::Mkv => "video/x-matroska",
        }
    }
}

impl Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.extension())
    }
}
