//! Video fetcher: shells out to yt-dlp for metadata and a subtitle track,
//! then flattens the VTT cues into transcript text. The temp files are an
//! implementation detail of the tool invocation; callers only see "transcript
//! text or an error".

use std::path::Path;

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{json, Value};
use tokio::process::Command;
use tracing::{debug, warn};

use super::{FetchError, FetchedContent};

/// Subtitle languages tried in order, filtered to what the video declares.
const PREFERRED_SUBTITLE_LANGS: [&str; 9] = [
    "en", "en-US", "en-GB", "zh-Hans", "zh-CN", "zh-cn", "zh", "zh-TW", "zh-tw",
];

lazy_static! {
    static ref VIDEO_ID_PATTERNS: Vec<Regex> = vec![
        Regex::new(r"(?:youtube\.com/watch\?v=|youtu\.be/|youtube\.com/embed/)([^&\n?#]+)")
            .expect("valid regex"),
        Regex::new(r"youtube\.com/v/([^&\n?#]+)").expect("valid regex"),
        Regex::new(r"youtube\.com/shorts/([^&\n?#]+)").expect("valid regex"),
    ];
    static ref INLINE_TAG: Regex = Regex::new(r"<[^>]*>").expect("valid regex");
}

/// Resolves a video id from the known URL shapes (watch, short link, embed,
/// legacy `/v/`, shorts).
pub fn extract_video_id(url: &str) -> Option<String> {
    VIDEO_ID_PATTERNS
        .iter()
        .find_map(|pattern| pattern.captures(url))
        .map(|captures| captures[1].to_string())
}

#[derive(Debug, Clone, PartialEq)]
struct SubtitleTrack {
    /// `None` means a generic auto-caption attempt with no language pinned.
    lang: Option<String>,
    auto: bool,
}

/// Builds the ordered list of subtitle tracks to attempt: manually authored
/// tracks first, auto captions second, one generic attempt as last resort.
fn subtitle_candidates(info: &Value) -> Vec<SubtitleTrack> {
    let declared = |field: &str| -> Vec<String> {
        info.get(field)
            .and_then(Value::as_object)
            .map(|langs| langs.keys().cloned().collect())
            .unwrap_or_default()
    };
    let manual = declared("subtitles");
    let auto = declared("automatic_captions");

    let mut tracks: Vec<SubtitleTrack> = PREFERRED_SUBTITLE_LANGS
        .iter()
        .filter(|lang| manual.iter().any(|m| m == *lang))
        .map(|lang| SubtitleTrack {
            lang: Some(lang.to_string()),
            auto: false,
        })
        .collect();

    if tracks.is_empty() {
        tracks = PREFERRED_SUBTITLE_LANGS
            .iter()
            .filter(|lang| auto.iter().any(|a| a == *lang))
            .map(|lang| SubtitleTrack {
                lang: Some(lang.to_string()),
                auto: true,
            })
            .collect();
    }

    if tracks.is_empty() {
        tracks.push(SubtitleTrack {
            lang: None,
            auto: true,
        });
    }

    tracks
}

/// Flattens a VTT payload to its caption text: the header, cue timings,
/// metadata lines, and inline markup are dropped; text lines are kept in order.
pub fn parse_vtt(content: &str) -> Vec<String> {
    content
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            if line.is_empty()
                || line.starts_with("WEBVTT")
                || line.contains("-->")
                || line.starts_with("Kind:")
                || line.starts_with("Language:")
                || line.starts_with("NOTE")
            {
                return None;
            }
            let clean = INLINE_TAG.replace_all(line, "").trim().to_string();
            (!clean.is_empty()).then_some(clean)
        })
        .collect()
}

pub struct VideoFetcher {
    yt_dlp_path: String,
}

impl VideoFetcher {
    pub fn new(yt_dlp_path: String) -> Self {
        Self { yt_dlp_path }
    }

    pub async fn fetch(&self, url: &str) -> Result<FetchedContent, FetchError> {
        let video_id = extract_video_id(url)
            .ok_or_else(|| FetchError::UnrecognizedVideoUrl(url.to_string()))?;

        let info = self.probe(url).await?;
        let title = info
            .get("title")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("Video {video_id}"));

        let tracks = subtitle_candidates(&info);
        debug!("Subtitle tracks to try for {video_id}: {tracks:?}");

        let temp_dir = tempfile::tempdir()?;
        let mut captured: Option<(String, Option<String>)> = None;
        for track in &tracks {
            match self.capture_track(url, track, temp_dir.path()).await {
                Ok(Some(payload)) => {
                    captured = Some((payload, track.lang.clone()));
                    break;
                }
                Ok(None) => continue,
                Err(e) => {
                    warn!("Subtitle attempt {track:?} failed: {e}");
                    continue;
                }
            }
        }

        let (payload, track_lang) = captured.ok_or(FetchError::NoSubtitles)?;
        let lines = parse_vtt(&payload);
        if lines.is_empty() {
            return Err(FetchError::NoSubtitles);
        }
        let transcript = lines.join(" ");
        debug!("Transcript for {video_id}: {} chars", transcript.len());

        let thumbnail = info
            .get("thumbnail")
            .and_then(Value::as_str)
            .map(str::to_string);
        let metadata = json!({
            "duration": info.get("duration_string").and_then(Value::as_str),
            "thumbnail": thumbnail.clone(),
            "channel": info.get("uploader").and_then(Value::as_str),
            "transcriptLanguage": track_lang.as_deref().unwrap_or("auto"),
        });

        Ok(FetchedContent {
            title,
            body: transcript,
            cover_image: thumbnail,
            metadata: Some(metadata),
        })
    }

    /// `yt-dlp --dump-json --no-download`: metadata, declared subtitle
    /// languages, thumbnail, channel.
    async fn probe(&self, url: &str) -> Result<Value, FetchError> {
        let output = Command::new(&self.yt_dlp_path)
            .args(["--dump-json", "--no-download", url])
            .output()
            .await?;
        if !output.status.success() {
            return Err(FetchError::Tool(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        serde_json::from_slice(&output.stdout)
            .map_err(|e| FetchError::Tool(format!("unparseable video metadata: {e}")))
    }

    /// Downloads one subtitle track into `dir` and returns its text, or `None`
    /// when the tool exited cleanly without producing a file.
    async fn capture_track(
        &self,
        url: &str,
        track: &SubtitleTrack,
        dir: &Path,
    ) -> Result<Option<String>, FetchError> {
        let template = dir.join("track.%(ext)s");
        let mut cmd = Command::new(&self.yt_dlp_path);
        cmd.arg("--skip-download");
        cmd.arg(if track.auto {
            "--write-auto-subs"
        } else {
            "--write-subs"
        });
        if let Some(lang) = &track.lang {
            cmd.args(["--sub-langs", lang]);
        }
        cmd.arg("--output");
        cmd.arg(template.as_os_str());
        cmd.arg(url);

        let output = cmd.output().await?;
        if !output.status.success() {
            return Err(FetchError::Tool(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        for entry in std::fs::read_dir(dir)?.flatten() {
            if entry.file_name().to_string_lossy().starts_with("track") {
                let payload = std::fs::read_to_string(entry.path())?;
                let _ = std::fs::remove_file(entry.path());
                return Ok(Some(payload));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_video_id_watch_url() {
        assert_eq!(
            extract_video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ"),
            Some("dQw4w9WgXcQ".to_string())
        );
    }

    #[test]
    fn test_extract_video_id_short_link_and_shorts() {
        assert_eq!(
            extract_video_id("https://youtu.be/abc123XYZ_-"),
            Some("abc123XYZ_-".to_string())
        );
        assert_eq!(
            extract_video_id("https://www.youtube.com/shorts/xyz789"),
            Some("xyz789".to_string())
        );
    }

    #[test]
    fn test_extract_video_id_embed_and_legacy() {
        assert_eq!(
            extract_video_id("https://www.youtube.com/embed/qqqq1111?start=10"),
            Some("qqqq1111".to_string())
        );
        assert_eq!(
            extract_video_id("https://www.youtube.com/v/oldstyle42"),
            Some("oldstyle42".to_string())
        );
    }

    #[test]
    fn test_extract_video_id_rejects_non_video_urls() {
        assert_eq!(extract_video_id("https://example.com/watch?v=nope"), None);
        assert_eq!(extract_video_id("https://www.youtube.com/feed/library"), None);
    }

    #[test]
    fn test_parse_vtt_strips_cues_and_markup() {
        let vtt = "WEBVTT\nKind: captions\nLanguage: en\n\n\
                   00:00:00.000 --> 00:00:02.000\n\
                   Hello <c.colorCFCFCF>there</c>\n\n\
                   00:00:02.000 --> 00:00:04.000\n\
                   NOTE internal marker\n\
                   general <b>Kenobi</b>\n";
        assert_eq!(parse_vtt(vtt), vec!["Hello there", "general Kenobi"]);
    }

    #[test]
    fn test_subtitle_candidates_prefer_manual_tracks() {
        let info = serde_json::json!({
            "subtitles": { "en": [], "fr": [] },
            "automatic_captions": { "en": [], "zh-Hans": [] },
        });
        let tracks = subtitle_candidates(&info);
        assert_eq!(
            tracks,
            vec![SubtitleTrack {
                lang: Some("en".to_string()),
                auto: false
            }]
        );
    }

    #[test]
    fn test_subtitle_candidates_fall_back_to_auto() {
        let info = serde_json::json!({
            "subtitles": {},
            "automatic_captions": { "zh-Hans": [], "en": [] },
        });
        let tracks = subtitle_candidates(&info);
        assert_eq!(tracks.len(), 2);
        assert!(tracks.iter().all(|t| t.auto));
        assert_eq!(tracks[0].lang.as_deref(), Some("en"));
    }

    #[test]
    fn test_subtitle_candidates_generic_last_resort() {
        let info = serde_json::json!({ "subtitles": { "ko": [] } });
        let tracks = subtitle_candidates(&info);
        assert_eq!(
            tracks,
            vec![SubtitleTrack {
                lang: None,
                auto: true
            }]
        );
    }
}
