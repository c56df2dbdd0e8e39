use serde::Serialize;
use url::Url;

const VIDEO_PLATFORMS: [&str; 2] = ["youtube.com", "youtu.be"];
const VIDEO_EXTENSIONS: [&str; 4] = [".mp4", ".mov", ".avi", ".webm"];
const SOCIAL_DOMAINS: [&str; 5] = [
    "instagram.com",
    "tiktok.com",
    "facebook.com",
    "x.com",
    "twitter.com",
];
const IMAGE_EXTENSIONS: [&str; 5] = [".jpg", ".jpeg", ".png", ".webp", ".heic"];

/// Input categories, each with its own acquisition path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Youtube,
    VideoFile,
    ImageFile,
    Website,
}

impl SourceKind {
    /// Classify an input URL or path. Rules are tried in order and the first
    /// match wins; anything unrecognised (including empty input) is a website.
    pub fn classify(input: &str) -> SourceKind {
        let input = input.trim();
        if input.is_empty() {
            return SourceKind::Website;
        }

        let lower = input.to_lowercase();
        // Match on the host and path when the input parses as a URL so that a
        // query string cannot hide the extension
        let (host, path) = match Url::parse(&lower) {
            Ok(url) if url.has_host() => (
                url.host_str().unwrap_or_default().to_string(),
                url.path().to_string(),
            ),
            _ => (String::new(), lower.clone()),
        };
        let host_matches = |domain: &str| {
            if host.is_empty() {
                lower.contains(domain)
            } else {
                host == domain || host.ends_with(&format!(".{}", domain))
            }
        };

        if VIDEO_PLATFORMS.iter().any(|d| host_matches(d)) {
            SourceKind::Youtube
        } else if VIDEO_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
            || SOCIAL_DOMAINS.iter().any(|d| host_matches(d))
        {
            SourceKind::VideoFile
        } else if IMAGE_EXTENSIONS.iter().any(|ext| path.ends_with(ext)) {
            SourceKind::ImageFile
        } else {
            SourceKind::Website
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_youtube_links() {
        for url in [
            "https://www.youtube.com/watch?v=abc",
            "https://youtu.be/abc",
            "https://m.youtube.com/shorts/xyz",
        ] {
            assert_eq!(SourceKind::classify(url), SourceKind::Youtube, "{url}");
        }
    }

    #[test]
    fn test_video_files_and_social() {
        for url in [
            "https://cdn.example.com/clips/pasta.MP4",
            "https://cdn.example.com/clip.webm?token=1",
            "https://www.instagram.com/reel/abc/",
            "https://www.tiktok.com/@chef/video/1",
            "https://x.com/chef/status/1",
            "/home/me/Videos/ramen.mov",
        ] {
            assert_eq!(SourceKind::classify(url), SourceKind::VideoFile, "{url}");
        }
    }

    #[test]
    fn test_images() {
        for url in [
            "https://img.example.com/fridge.jpg",
            "https://img.example.com/dish.heic?w=200",
            "/tmp/upload.png",
        ] {
            assert_eq!(SourceKind::classify(url), SourceKind::ImageFile, "{url}");
        }
    }

    #[test]
    fn test_websites_and_empty() {
        assert_eq!(SourceKind::classify(""), SourceKind::Website);
        assert_eq!(SourceKind::classify("   "), SourceKind::Website);
        assert_eq!(
            SourceKind::classify("https://www.seriouseats.com/best-lasagna"),
            SourceKind::Website
        );
        // Host match, not substring match
        assert_eq!(
            SourceKind::classify("https://netflix.com/cooking-show"),
            SourceKind::Website
        );
    }

    #[test]
    fn test_first_rule_wins() {
        assert_eq!(
            SourceKind::classify("https://www.youtube.com/thumbnail.jpg"),
            SourceKind::Youtube
        );
        assert_eq!(
            SourceKind::classify("https://www.facebook.com/photo.jpg"),
            SourceKind::VideoFile
        );
    }
}
