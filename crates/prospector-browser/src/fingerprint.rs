use rand::Rng;

/// Fingerprint configuration applied by the stealth engine variant.
#[derive(Debug, Clone)]
pub struct FingerprintConfig {
    /// User agent string presented to sites
    pub user_agent: String,
    /// Viewport width in CSS pixels
    pub viewport_width: u32,
    /// Viewport height in CSS pixels
    pub viewport_height: u32,
    /// Accept-Language header value
    pub accept_language: String,
}

impl FingerprintConfig {
    /// Generate a randomized fingerprint.
    ///
    /// Each session draws a fresh combination so repeated runs against the
    /// same directory don't present an identical profile.
    #[must_use]
    pub fn randomized() -> Self {
        let mut rng = rand::thread_rng();

        // Common desktop user agents
        let user_agents = [
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36",
            "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36",
            "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/125.0.0.0 Safari/537.36",
        ];

        // Common viewport sizes
        let viewports = [(1920, 1080), (1366, 768), (1536, 864), (1440, 900)];

        let ua_idx = rng.gen_range(0..user_agents.len());
        let vp_idx = rng.gen_range(0..viewports.len());
        let (width, height) = viewports[vp_idx];

        Self {
            user_agent: user_agents[ua_idx].to_string(),
            viewport_width: width,
            viewport_height: height,
            accept_language: "en-US,en;q=0.9".to_string(),
        }
    }

    /// A fixed fingerprint matching the requested window size, used by the
    /// standard engine variant.
    #[must_use]
    pub fn fixed(width: u32, height: u32) -> Self {
        Self {
            user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36".to_string(),
            viewport_width: width,
            viewport_height: height,
            accept_language: "en-US,en;q=0.9".to_string(),
        }
    }
}
