//! Coarse user-agent classification for the CRM payload.
//!
//! The lead buyer only wants a rough browser/OS/device split, so this is a
//! substring check, not a full UA parser. Checks run in a fixed order and
//! the first match wins.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientInfo {
    pub browser: String,
    pub os: String,
    pub device: String,
}

/// Classifies a raw user-agent string.
pub fn classify_user_agent(ua: &str) -> ClientInfo {
    let browser = if ua.contains("Firefox") {
        "Firefox"
    } else if ua.contains("Chrome") {
        "Chrome"
    } else if ua.contains("Safari") {
        "Safari"
    } else if ua.contains("Edge") {
        "Edge"
    } else if ua.contains("MSIE") || ua.contains("Trident/") {
        "Internet Explorer"
    } else {
        "Unknown"
    };

    let os = if ua.contains("Windows NT 10.0") {
        "Windows 10"
    } else if ua.contains("Mac OS X") {
        "macOS"
    } else if ua.contains("Android") {
        "Android"
    } else if ua.contains("like Mac") {
        "iOS"
    } else {
        "Unknown"
    };

    let lowered = ua.to_lowercase();
    let mobile = ["mobi", "android", "iphone", "ipad", "ipod"]
        .iter()
        .any(|marker| lowered.contains(marker));
    let device = if mobile { "Mobile" } else { "Desktop" };

    ClientInfo {
        browser: browser.to_string(),
        os: os.to_string(),
        device: device.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_desktop_chrome_on_windows() {
        let info = classify_user_agent(
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
             (KHTML, like Gecko) Chrome/120.0 Safari/537.36",
        );
        assert_eq!(info.browser, "Chrome");
        assert_eq!(info.os, "Windows 10");
        assert_eq!(info.device, "Desktop");
    }

    #[test]
    fn test_mobile_safari_on_ios() {
        let info = classify_user_agent(
            "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) \
             AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1",
        );
        assert_eq!(info.browser, "Safari");
        assert_eq!(info.os, "iOS");
        assert_eq!(info.device, "Mobile");
    }

    #[test]
    fn test_firefox_wins_over_later_markers() {
        let info = classify_user_agent(
            "Mozilla/5.0 (X11; Linux x86_64; rv:121.0) Gecko/20100101 Firefox/121.0",
        );
        assert_eq!(info.browser, "Firefox");
        assert_eq!(info.os, "Unknown");
    }

    #[test]
    fn test_empty_ua_is_unknown_desktop() {
        let info = classify_user_agent("");
        assert_eq!(info.browser, "Unknown");
        assert_eq!(info.os, "Unknown");
        assert_eq!(info.device, "Desktop");
    }
}
