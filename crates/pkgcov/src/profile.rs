//! Coverage profile handling
//!
//! A profile is line oriented: the first line is `mode: <mode>`, every other
//! line is an opaque block record owned by the toolchain. Records are never
//! parsed here, only moved from per-package profiles into the combined one.

use crate::config::CoverageMode;
use crate::error::{CliError, CliResult};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Header and body of a per-package profile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProfileParts<'a> {
    /// First line, without its newline
    pub header: &'a [u8],
    /// Everything after the first newline
    pub body: &'a [u8],
}

/// Split raw profile bytes at the first line boundary.
///
/// Returns `None` when there is nothing after the header, which covers an
/// empty file, a header with no newline, and a header followed only by its
/// newline.
#[must_use]
pub fn split_header_body(raw: &[u8]) -> Option<ProfileParts<'_>> {
    let newline = raw.iter().position(|&b| b == b'\n')?;
    let (header, rest) = raw.split_at(newline);
    let body = &rest[1..];
    if body.is_empty() {
        return None;
    }
    Some(ProfileParts { header, body })
}

/// Number of record lines in a body
#[must_use]
pub fn body_line_count(body: &[u8]) -> usize {
    body.split(|&b| b == b'\n')
        .filter(|line| !line.is_empty())
        .count()
}

/// The run-wide merged profile: one header, then bodies in append order.
#[derive(Debug)]
pub struct CombinedProfile<W: Write = File> {
    writer: W,
    mode: CoverageMode,
    bodies: usize,
}

impl CombinedProfile<File> {
    /// Create (or truncate) the profile file at `path` and write its header.
    pub fn create(path: &Path, mode: CoverageMode) -> CliResult<Self> {
        let file = File::create(path).map_err(|e| {
            CliError::result_store(format!("cannot create {}: {e}", path.display()))
        })?;
        Self::from_writer(file, mode)
    }
}

impl<W: Write> CombinedProfile<W> {
    /// Wrap an arbitrary sink and write the mode header to it.
    pub fn from_writer(mut writer: W, mode: CoverageMode) -> CliResult<Self> {
        writer
            .write_all(mode.header().as_bytes())
            .map_err(|e| CliError::result_store(format!("cannot write profile header: {e}")))?;
        Ok(Self {
            writer,
            mode,
            bodies: 0,
        })
    }

    /// Append one package's body.
    ///
    /// The body is written as is; a missing final newline is supplied so the
    /// next body starts on its own line.
    pub fn append_body(&mut self, body: &[u8]) -> CliResult<()> {
        self.writer
            .write_all(body)
            .map_err(|e| CliError::result_store(format!("cannot append profile: {e}")))?;
        if body.last() != Some(&b'\n') {
            self.writer
                .write_all(b"\n")
                .map_err(|e| CliError::result_store(format!("cannot append profile: {e}")))?;
        }
        self.bodies += 1;
        Ok(())
    }

    /// Flush buffered data so the report tool sees every record.
    pub fn flush(&mut self) -> CliResult<()> {
        self.writer
            .flush()
            .map_err(|e| CliError::result_store(format!("cannot flush profile: {e}")))
    }

    /// Coverage mode written in the header
    #[must_use]
    pub const fn mode(&self) -> CoverageMode {
        self.mode
    }

    /// Number of bodies appended so far
    #[must_use]
    pub const fn bodies(&self) -> usize {
        self.bodies
    }

    /// Consume the profile and return the underlying writer
    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tempfile::TempDir;

    mod split_tests {
        use super::*;

        #[test]
        fn test_header_and_body() {
            let raw = b"mode: set\npkg/a.go:1.1,2.2 1 1\n";
            let parts = split_header_body(raw).unwrap();
            assert_eq!(parts.header, b"mode: set");
            assert_eq!(parts.body, b"pkg/a.go:1.1,2.2 1 1\n");
        }

        #[test]
        fn test_empty_file() {
            assert!(split_header_body(b"").is_none());
        }

        #[test]
        fn test_header_without_newline() {
            assert!(split_header_body(b"mode: set").is_none());
        }

        #[test]
        fn test_header_only() {
            assert!(split_header_body(b"mode: set\n").is_none());
        }

        #[test]
        fn test_only_first_line_is_header() {
            let raw = b"mode: count\nmode: count\nx.go:1.1,1.2 1 3\n";
            let parts = split_header_body(raw).unwrap();
            assert_eq!(parts.body, b"mode: count\nx.go:1.1,1.2 1 3\n");
        }

        #[test]
        fn test_body_line_count() {
            assert_eq!(body_line_count(b"a\nb\nc\n"), 3);
            assert_eq!(body_line_count(b"a\nb"), 2);
            assert_eq!(body_line_count(b""), 0);
        }
    }

    mod combined_profile_tests {
        use super::*;

        /// Sink that accepts `limit` bytes and then fails every write
        #[derive(Debug)]
        struct FailingWriter {
            written: Vec<u8>,
            limit: usize,
        }

        impl Write for FailingWriter {
            fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
                if self.written.len() + buf.len() > self.limit {
                    return Err(std::io::Error::new(
                        std::io::ErrorKind::PermissionDenied,
                        "read-only",
                    ));
                }
                self.written.extend_from_slice(buf);
                Ok(buf.len())
            }

            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        #[test]
        fn test_header_written_once() {
            let mut profile = CombinedProfile::from_writer(Vec::new(), CoverageMode::Set).unwrap();
            profile.append_body(b"a.go:1.1,2.2 1 1\n").unwrap();
            profile.append_body(b"b.go:1.1,2.2 1 0\n").unwrap();
            let out = String::from_utf8(profile.into_inner()).unwrap();
            assert_eq!(out.matches("mode:").count(), 1);
            assert_eq!(out, "mode: set\na.go:1.1,2.2 1 1\nb.go:1.1,2.2 1 0\n");
        }

        #[test]
        fn test_bodies_keep_append_order() {
            let mut profile =
                CombinedProfile::from_writer(Vec::new(), CoverageMode::Count).unwrap();
            for name in ["z", "a", "m", "a"] {
                profile
                    .append_body(format!("{name}.go:1.1,1.2 1 1\n").as_bytes())
                    .unwrap();
            }
            assert_eq!(profile.bodies(), 4);
            let out = String::from_utf8(profile.into_inner()).unwrap();
            let files: Vec<&str> = out.lines().skip(1).map(|l| &l[..1]).collect();
            assert_eq!(files, vec!["z", "a", "m", "a"]);
        }

        #[test]
        fn test_missing_trailing_newline_is_supplied() {
            let mut profile = CombinedProfile::from_writer(Vec::new(), CoverageMode::Set).unwrap();
            profile.append_body(b"a.go:1.1,2.2 1 1").unwrap();
            profile.append_body(b"b.go:1.1,2.2 1 1\n").unwrap();
            let out = String::from_utf8(profile.into_inner()).unwrap();
            assert_eq!(out.lines().count(), 3);
        }

        #[test]
        fn test_header_write_failure_is_result_store() {
            let writer = FailingWriter {
                written: Vec::new(),
                limit: 0,
            };
            let err = CombinedProfile::from_writer(writer, CoverageMode::Set).unwrap_err();
            assert!(matches!(err, CliError::ResultStore { .. }));
        }

        #[test]
        fn test_append_failure_is_result_store() {
            let writer = FailingWriter {
                written: Vec::new(),
                limit: "mode: set\n".len(),
            };
            let mut profile = CombinedProfile::from_writer(writer, CoverageMode::Set).unwrap();
            let err = profile.append_body(b"a.go:1.1,2.2 1 1\n").unwrap_err();
            assert!(matches!(err, CliError::ResultStore { .. }));
            assert_eq!(profile.bodies(), 0);
        }

        #[test]
        fn test_create_on_disk() {
            let temp = TempDir::new().unwrap();
            let path = temp.path().join("result.out");
            let mut profile = CombinedProfile::create(&path, CoverageMode::Atomic).unwrap();
            profile.append_body(b"a.go:1.1,2.2 1 1\n").unwrap();
            profile.flush().unwrap();
            assert_eq!(profile.mode(), CoverageMode::Atomic);
            let content = std::fs::read_to_string(&path).unwrap();
            assert_eq!(content, "mode: atomic\na.go:1.1,2.2 1 1\n");
        }

        #[test]
        fn test_create_in_missing_dir_fails() {
            let temp = TempDir::new().unwrap();
            let path = temp.path().join("missing").join("result.out");
            let err = CombinedProfile::create(&path, CoverageMode::Set).unwrap_err();
            assert!(matches!(err, CliError::ResultStore { .. }));
        }
    }

    proptest! {
        #[test]
        fn prop_concatenation_preserves_line_counts(
            bodies in proptest::collection::vec(
                proptest::collection::vec("[a-z]{1,8}\\.go:[0-9]\\.[0-9],[0-9]\\.[0-9] 1 [01]", 1..5),
                0..6,
            )
        ) {
            let mut profile = CombinedProfile::from_writer(Vec::new(), CoverageMode::Set).unwrap();
            let mut expected = 0;
            for lines in &bodies {
                let body = format!("{}\n", lines.join("\n"));
                expected += body_line_count(body.as_bytes());
                profile.append_body(body.as_bytes()).unwrap();
            }
            let out = profile.into_inner();
            let parts = split_header_body(&out);
            if expected == 0 {
                prop_assert!(parts.is_none());
            } else {
                let parts = parts.unwrap();
                prop_assert_eq!(parts.header, b"mode: set");
                prop_assert_eq!(body_line_count(parts.body), expected);
            }
        }

        #[test]
        fn prop_split_rejoins_to_input(header in "mode: [a-z]{3,6}", body in "[ -~]{1,40}\n") {
            let raw = format!("{header}\n{body}");
            let parts = split_header_body(raw.as_bytes()).unwrap();
            let mut rejoined = parts.header.to_vec();
            rejoined.push(b'\n');
            rejoined.extend_from_slice(parts.body);
            prop_assert_eq!(rejoined, raw.into_bytes());
        }
    }
}
