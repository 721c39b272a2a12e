use std::fmt;
use std::path::PathBuf;

/// Default port of the phone camera streaming app.
pub const DEFAULT_STREAM_PORT: u16 = 4747;

/// Where frames come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameSource {
    File(PathBuf),
    Stream(String),
}

impl FrameSource {
    /// The string handed to the capture backend, which accepts both paths and URLs.
    pub fn location(&self) -> String {
        match self {
            FrameSource::File(path) => path.to_string_lossy().into_owned(),
            FrameSource::Stream(url) => url.clone(),
        }
    }
}

impl fmt::Display for FrameSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameSource::File(path) => write!(f, "file {}", path.display()),
            FrameSource::Stream(url) => write!(f, "stream {url}"),
        }
    }
}

/// Builds the HTTP video URL of a phone camera at `host:port`.
pub fn stream_url(host: &str, port: u16) -> String {
    format!("http://{host}:{port}/video")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_url_template() {
        assert_eq!(
            stream_url("192.168.1.20", DEFAULT_STREAM_PORT),
            "http://192.168.1.20:4747/video"
        );
    }

    #[test]
    fn test_location_passes_through() {
        let file = FrameSource::File(PathBuf::from("clips/walk.mp4"));
        assert_eq!(file.location(), "clips/walk.mp4");
        let stream = FrameSource::Stream("http://10.0.0.2:4747/video".to_string());
        assert_eq!(stream.location(), "http://10.0.0.2:4747/video");
    }
}
