use std::fs::File;
use std::io::{BufRead, Read};

use tracing::{debug, info};

use crate::foundation::error::{StreamError, StreamResult};

/// Staging cap used until the engine installs a geometry-derived limit.
const DEFAULT_STAGING_LIMIT: usize = 8 * 1024 * 1024;

/// Format a printf-style frame name pattern with an absolute frame number.
///
/// Supports the subset classic tools rely on: `%d`, `%Nd`, `%0Nd` and the
/// `%%` escape. A pattern without any directive is returned unchanged, which
/// makes every frame resolve to the same file.
pub fn format_pattern(pattern: &str, index: u64) -> String {
    let mut out = String::with_capacity(pattern.len() + 8);
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        if chars.peek() == Some(&'%') {
            chars.next();
            out.push('%');
            continue;
        }
        let zero_pad = chars.peek() == Some(&'0');
        if zero_pad {
            chars.next();
        }
        let mut width = 0usize;
        while let Some(d) = chars.peek().and_then(|c| c.to_digit(10)) {
            width = width * 10 + d as usize;
            chars.next();
        }
        if chars.peek() == Some(&'d') {
            chars.next();
            if zero_pad {
                out.push_str(&format!("{index:0width$}"));
            } else {
                out.push_str(&format!("{index:width$}"));
            }
        } else {
            // Not a recognized directive; emit the consumed text verbatim.
            out.push('%');
            if zero_pad {
                out.push('0');
            }
            if width > 0 {
                out.push_str(&width.to_string());
            }
        }
    }
    out
}

/// Outcome of one attempt to obtain compressed bytes for a frame index.
#[derive(Debug)]
pub enum FrameBytes<'a> {
    /// The resolved path equals the previous one; the previously decoded
    /// frame data is still valid and no bytes were read.
    Reused,
    /// Freshly read compressed bytes, valid until the next resolver call.
    Bytes(&'a [u8]),
    /// The source could not be resolved, opened, or read.
    Unavailable,
}

enum Feed {
    /// Numbered pattern; never exhausted, existence decided at read time.
    Pattern(String),
    /// Ordered newline-delimited path feed; EOF signals exhaustion.
    List(Box<dyn BufRead>),
}

/// Yields the next source image location and its compressed bytes.
///
/// Owns the raw-bytes staging buffer for the whole run and tracks the
/// previously resolved path so that a repeated filename (the two-field case)
/// skips the re-read entirely.
pub struct SourceResolver {
    feed: Feed,
    begin: u32,
    prev_path: Option<String>,
    /// First location, cached by the probe so frame production replays it.
    pending_first: Option<String>,
    staging: Vec<u8>,
    staging_limit: usize,
}

impl SourceResolver {
    pub fn from_pattern(pattern: impl Into<String>, begin: u32) -> Self {
        Self {
            feed: Feed::Pattern(pattern.into()),
            begin,
            prev_path: None,
            pending_first: None,
            staging: Vec::new(),
            staging_limit: DEFAULT_STAGING_LIMIT,
        }
    }

    pub fn from_list(reader: Box<dyn BufRead>) -> Self {
        Self {
            feed: Feed::List(reader),
            begin: 0,
            prev_path: None,
            pending_first: None,
            staging: Vec::new(),
            staging_limit: DEFAULT_STAGING_LIMIT,
        }
    }

    /// Cap the compressed-frame staging buffer. The engine derives this from
    /// the probed geometry; a frame exceeding it is a fatal decode error.
    pub fn set_staging_limit(&mut self, bytes: usize) {
        self.staging_limit = bytes;
    }

    /// Resolve the first source location without consuming it: the next
    /// [`next_frame`](Self::next_frame) call sees the same path.
    pub fn resolve_first(&mut self) -> StreamResult<String> {
        if let Some(path) = &self.pending_first {
            return Ok(path.clone());
        }
        let path = match &mut self.feed {
            Feed::Pattern(pattern) => format_pattern(pattern, u64::from(self.begin)),
            Feed::List(reader) => read_list_line(reader)?.ok_or_else(|| {
                StreamError::config("no source filenames supplied on the list feed")
            })?,
        };
        self.pending_first = Some(path.clone());
        Ok(path)
    }

    /// Resolve the location for `frame` and attempt to obtain its bytes.
    pub fn next_frame(&mut self, frame: u64) -> StreamResult<FrameBytes<'_>> {
        let path = if let Some(first) = self.pending_first.take() {
            Some(first)
        } else {
            match &mut self.feed {
                Feed::Pattern(pattern) => Some(format_pattern(pattern, frame)),
                Feed::List(reader) => read_list_line(reader)?,
            }
        };
        let Some(path) = path else {
            debug!("source list exhausted");
            return Ok(FrameBytes::Unavailable);
        };

        if self.prev_path.as_deref() == Some(path.as_str()) {
            debug!("'{path}' repeats the previous source, reusing decoded frame");
            return Ok(FrameBytes::Reused);
        }
        self.prev_path = Some(path.clone());

        let file = match File::open(&path) {
            Ok(f) => f,
            Err(e) => {
                info!("read from '{path}' failed: {e}");
                return Ok(FrameBytes::Unavailable);
            }
        };

        self.staging.clear();
        match file
            .take(self.staging_limit as u64 + 1)
            .read_to_end(&mut self.staging)
        {
            Ok(_) => {}
            Err(e) => {
                info!("read from '{path}' failed: {e}");
                return Ok(FrameBytes::Unavailable);
            }
        }
        if self.staging.len() > self.staging_limit {
            return Err(StreamError::decode(format!(
                "'{path}' exceeds the {} byte compressed-frame limit",
                self.staging_limit
            )));
        }
        debug!("read {} bytes from '{path}'", self.staging.len());
        Ok(FrameBytes::Bytes(&self.staging))
    }
}

/// Pull the next non-empty line from the list feed, trimming CR/LF.
fn read_list_line(reader: &mut Box<dyn BufRead>) -> StreamResult<Option<String>> {
    let mut line = String::new();
    loop {
        line.clear();
        let n = reader
            .read_line(&mut line)
            .map_err(|e| StreamError::config(format!("reading source list: {e}")))?;
        if n == 0 {
            return Ok(None);
        }
        let trimmed = line.trim_end_matches(['\r', '\n']);
        if !trimmed.is_empty() {
            return Ok(Some(trimmed.to_string()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::path::PathBuf;

    fn temp_root(tag: &str) -> PathBuf {
        let root = std::env::temp_dir().join(format!(
            "jpeg2y4m_resolver_{tag}_{}_{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        std::fs::create_dir_all(&root).unwrap();
        root
    }

    #[test]
    fn pattern_formatting_matches_printf_subset() {
        assert_eq!(format_pattern("img_%04d.jpg", 7), "img_0007.jpg");
        assert_eq!(format_pattern("img_%d.jpg", 123), "img_123.jpg");
        assert_eq!(format_pattern("%06d", 42), "000042");
        assert_eq!(format_pattern("a%%b_%02d", 3), "a%b_03");
        assert_eq!(format_pattern("still.jpg", 9), "still.jpg");
        assert_eq!(format_pattern("pad_%3d", 7), "pad_  7");
    }

    #[test]
    fn pattern_mode_reads_fresh_bytes_per_index() {
        let root = temp_root("pattern");
        std::fs::write(root.join("f_0000.bin"), b"first").unwrap();
        std::fs::write(root.join("f_0001.bin"), b"second").unwrap();

        let pattern = root.join("f_%04d.bin").to_string_lossy().into_owned();
        let mut resolver = SourceResolver::from_pattern(pattern, 0);

        assert!(matches!(resolver.next_frame(0).unwrap(), FrameBytes::Bytes(b) if b == b"first".as_slice()));
        assert!(matches!(resolver.next_frame(1).unwrap(), FrameBytes::Bytes(b) if b == b"second".as_slice()));
        // Pattern mode never exhausts; a missing index is merely unavailable.
        assert!(matches!(resolver.next_frame(2).unwrap(), FrameBytes::Unavailable));
    }

    #[test]
    fn constant_pattern_signals_reuse_after_first_read() {
        let root = temp_root("constant");
        std::fs::write(root.join("still.bin"), b"pixels").unwrap();

        let path = root.join("still.bin").to_string_lossy().into_owned();
        let mut resolver = SourceResolver::from_pattern(path, 0);

        assert!(matches!(resolver.next_frame(0).unwrap(), FrameBytes::Bytes(_)));
        assert!(matches!(resolver.next_frame(1).unwrap(), FrameBytes::Reused));
        assert!(matches!(resolver.next_frame(2).unwrap(), FrameBytes::Reused));
    }

    #[test]
    fn list_mode_exhausts_at_end_of_feed() {
        let root = temp_root("list");
        let a = root.join("a.bin");
        std::fs::write(&a, b"aa").unwrap();

        let feed = format!("{}\n", a.display());
        let mut resolver = SourceResolver::from_list(Box::new(Cursor::new(feed)));

        assert!(matches!(resolver.next_frame(0).unwrap(), FrameBytes::Bytes(b) if b == b"aa".as_slice()));
        assert!(matches!(resolver.next_frame(1).unwrap(), FrameBytes::Unavailable));
    }

    #[test]
    fn list_mode_repeated_path_is_reused_not_reread() {
        let root = temp_root("repeat");
        let a = root.join("field.bin");
        std::fs::write(&a, b"both fields").unwrap();

        let feed = format!("{}\n{}\n", a.display(), a.display());
        let mut resolver = SourceResolver::from_list(Box::new(Cursor::new(feed)));

        assert!(matches!(resolver.next_frame(0).unwrap(), FrameBytes::Bytes(_)));
        assert!(matches!(resolver.next_frame(1).unwrap(), FrameBytes::Reused));
    }

    #[test]
    fn resolve_first_is_replayed_for_the_first_frame() {
        let root = temp_root("first");
        let a = root.join("one.bin");
        std::fs::write(&a, b"1").unwrap();

        let feed = format!("{}\n", a.display());
        let mut resolver = SourceResolver::from_list(Box::new(Cursor::new(feed)));

        let first = resolver.resolve_first().unwrap();
        assert_eq!(first, a.to_string_lossy());
        // Probing must not consume the entry.
        assert!(matches!(resolver.next_frame(0).unwrap(), FrameBytes::Bytes(b) if b == b"1".as_slice()));
        assert!(matches!(resolver.next_frame(1).unwrap(), FrameBytes::Unavailable));
    }

    #[test]
    fn oversized_frame_is_a_fatal_error() {
        let root = temp_root("cap");
        let a = root.join("big.bin");
        std::fs::write(&a, vec![0u8; 128]).unwrap();

        let mut resolver =
            SourceResolver::from_pattern(a.to_string_lossy().into_owned(), 0);
        resolver.set_staging_limit(64);
        assert!(resolver.next_frame(0).is_err());
    }
}
