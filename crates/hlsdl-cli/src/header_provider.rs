//! Real `HeaderProvider`: the fixed header set §6 mandates on every request,
//! plus a `Referer` pinned to the playlist's own origin.

use hlsdl_core::traits::HeaderProvider;
use std::collections::HashMap;
use url::Url;

pub struct CurlHeaderProvider {
    referer: String,
}

impl CurlHeaderProvider {
    pub fn new(playlist_url: &Url) -> Self {
        let referer = format!(
            "{}://{}",
            playlist_url.scheme(),
            playlist_url.host_str().unwrap_or("")
        );
        CurlHeaderProvider { referer }
    }
}

impl HeaderProvider for CurlHeaderProvider {
    fn headers_for(&self, _url: &Url) -> HashMap<String, String> {
        let mut headers = HashMap::new();
        headers.insert(
            "User-Agent".to_string(),
            "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36"
                .to_string(),
        );
        headers.insert("Accept".to_string(), "*/*".to_string());
        headers.insert("Accept-Language".to_string(), "en-US,en;q=0.9".to_string());
        headers.insert("Accept-Encoding".to_string(), "identity".to_string());
        headers.insert("Connection".to_string(), "keep-alive".to_string());
        headers.insert("Referer".to_string(), self.referer.clone());
        headers.insert("Sec-Fetch-Dest".to_string(), "empty".to_string());
        headers.insert("Sec-Fetch-Mode".to_string(), "cors".to_string());
        headers.insert("Sec-Fetch-Site".to_string(), "cross-site".to_string());
        headers
    }
}
