/// Source file and line extracted from a captured backtrace. Best-effort
/// diagnostic hints, not ground truth: the locator takes the first frame in
/// scan order that is not recognized as machinery, which assumes capture and
/// panic-propagation frames precede the real origin.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceLocation {
    pub file: String,
    pub line: u32,
}

/// Frame descriptors that are part of the recovery pipeline or the runtime
/// rather than application code. A frame whose descriptor contains any of
/// these is skipped.
const FRAME_SKIP: &[&str] = &[
    "reporting::recovery",
    "reporting::dispatch",
    "core::panicking",
    "std::panicking",
    "std::panic",
    "rust_begin_unwind",
    "std::backtrace",
    "backtrace::",
    "std::rt",
    "std::sys",
    "tokio::runtime",
    "futures_util::future",
    "__rust",
];

/// Path prefixes identifying standard-library, runtime, and toolchain
/// sources. Frames resolving into these are never application code.
const PATH_SKIP: &[&str] = &[
    "/rustc/",
    "library/std",
    "library/core",
    "library/alloc",
    ".cargo/registry",
    ".rustup/toolchains",
];

/// Scans backtrace text for the first frame that looks like application
/// code and returns its file name and line number.
///
/// Frames are expected as a descriptor line followed by an indented
/// `at path.rs:line:col` line, the format `std::backtrace::Backtrace`
/// renders. Frames whose descriptor or path matches the skip lists are
/// rejected; so are frames whose line number does not parse as a positive
/// integer. Returns `None` when no frame qualifies.
pub fn locate(trace: &str) -> Option<SourceLocation> {
    let lines: Vec<&str> = trace.lines().collect();

    for (i, line) in lines.iter().enumerate() {
        let Some(rest) = line.trim_start().strip_prefix("at ") else {
            continue;
        };
        let Some(marker) = rest.find(".rs:") else {
            continue;
        };
        if i == 0 {
            continue;
        }

        let descriptor = lines[i - 1];
        if FRAME_SKIP.iter().any(|skip| descriptor.contains(skip)) {
            continue;
        }

        let path = &rest[..marker + ".rs".len()];
        if !path_allowed(path) {
            continue;
        }

        // The tail is "line:col" or "line +offset"; keep the digits before
        // the first separator.
        let tail = &rest[marker + ".rs:".len()..];
        let digits = tail.split([':', ' ']).next().unwrap_or("");
        let Ok(line_number) = digits.parse::<u32>() else {
            continue;
        };
        if line_number == 0 {
            continue;
        }

        return Some(SourceLocation {
            file: file_name(path).to_string(),
            line: line_number,
        });
    }

    None
}

/// Whether a source path is outside the recognized stdlib/toolchain
/// prefixes. Also applied to the structured panic location captured by the
/// panic hook.
pub fn path_allowed(path: &str) -> bool {
    !PATH_SKIP.iter().any(|skip| path.contains(skip))
}

/// Final path segment of a source path.
pub fn file_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}
