//! External collaborator interfaces (§6, §9). The core owns no process-wide
//! mutable state; cookies/headers and the muxer are injected here instead of
//! living behind singletons.

use anyhow::Result;
use std::collections::HashMap;
use std::path::Path;
use url::Url;

/// Supplies the headers a request to `url` must carry (User-Agent, Accept,
/// Referer, cookies, ...). The core never invents these; it only asks.
pub trait HeaderProvider: Send + Sync {
    fn headers_for(&self, url: &Url) -> HashMap<String, String>;
}

/// Concatenates the ordered segment manifest into the final output file.
/// Opaque success/failure; progress during this phase is not observed by
/// the core (the Controller coarse-grains it as `Muxing`).
pub trait Muxer: Send + Sync {
    fn concatenate(&self, manifest_path: &Path, output_path: &Path) -> Result<()>;
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    pub struct StaticHeaderProvider(pub HashMap<String, String>);

    impl HeaderProvider for StaticHeaderProvider {
        fn headers_for(&self, _url: &Url) -> HashMap<String, String> {
            self.0.clone()
        }
    }

    /// A muxer that just concatenates the manifest's referenced files,
    /// standing in for an external ffmpeg invocation in tests.
    pub struct ConcatOnlyMuxer;

    impl Muxer for ConcatOnlyMuxer {
        fn concatenate(&self, manifest_path: &Path, output_path: &Path) -> Result<()> {
            let manifest = std::fs::read_to_string(manifest_path)?;
            let mut out = std::fs::File::create(output_path)?;
            for line in manifest.lines() {
                // `file '<path>'` — the conventional ffmpeg concat demuxer syntax (§6).
                let path = line
                    .trim()
                    .strip_prefix("file '")
                    .and_then(|s| s.strip_suffix('\''))
                    .ok_or_else(|| anyhow::anyhow!("malformed concat manifest line: {line}"))?;
                let mut segment = std::fs::File::open(path)?;
                std::io::copy(&mut segment, &mut out)?;
            }
            Ok(())
        }
    }
}
