//! Device classification from the user agent.

use regex::Regex;
use reqmon_types::DeviceType;
use std::sync::LazyLock;

/// Any of these tokens marks a handheld device.
const HANDHELD_PATTERN: &str = r"(?i)Mobile|Android|iPhone|iPad|iPod|BlackBerry|IEMobile|Opera Mini";

/// Within handheld agents, these tokens mark a tablet.
const TABLET_PATTERN: &str = r"(?i)iPad|Tablet|PlayBook";

static HANDHELD: LazyLock<Option<Regex>> = LazyLock::new(|| compile(HANDHELD_PATTERN));
static TABLET: LazyLock<Option<Regex>> = LazyLock::new(|| compile(TABLET_PATTERN));

fn compile(pattern: &str) -> Option<Regex> {
    Regex::new(pattern)
        .map_err(|e| tracing::warn!("invalid device pattern {:?}: {}", pattern, e))
        .ok()
}

fn matches(re: &Option<Regex>, user_agent: &str) -> bool {
    re.as_ref().is_some_and(|re| re.is_match(user_agent))
}

/// Classifies a user agent as desktop, mobile, or tablet.
pub fn classify_device(user_agent: &str) -> DeviceType {
    if !matches(&HANDHELD, user_agent) {
        return DeviceType::Desktop;
    }
    if matches(&TABLET, user_agent) {
        DeviceType::Tablet
    } else {
        DeviceType::Mobile
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ipad_is_tablet_despite_mobile_token() {
        let ua = "Mozilla/5.0 (iPad; CPU OS 17_2 like Mac OS X) AppleWebKit/605.1.15 \
                  (KHTML, like Gecko) Version/17.2 Mobile/15E148 Safari/604.1";
        assert_eq!(classify_device(ua), DeviceType::Tablet);
    }

    #[test]
    fn phones_are_mobile() {
        let iphone = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_2 like Mac OS X) Mobile/15E148";
        let android = "Mozilla/5.0 (Linux; Android 14; Pixel 8) Chrome/120.0 Mobile Safari/537.36";
        assert_eq!(classify_device(iphone), DeviceType::Mobile);
        assert_eq!(classify_device(android), DeviceType::Mobile);
    }

    #[test]
    fn desktop_is_the_default() {
        let ua = "Mozilla/5.0 (X11; Linux x86_64; rv:121.0) Gecko/20100101 Firefox/121.0";
        assert_eq!(classify_device(ua), DeviceType::Desktop);
        assert_eq!(classify_device(""), DeviceType::Desktop);
    }

    #[test]
    fn matching_is_case_insensitive() {
        assert_eq!(classify_device("some-IPAD-client"), DeviceType::Tablet);
        assert_eq!(classify_device("blackberry9700"), DeviceType::Mobile);
    }
}
