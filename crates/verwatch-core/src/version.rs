use std::cmp::Ordering;

/// Compare a local version against a remote one.
///
/// Versions are split into their dot-separated main segments followed by the
/// pre-release suffix (everything after the first `-`, empty when absent).
/// Build metadata after `+` is dropped from the main part. The shorter
/// sequence is padded with `"0"` and segments are compared left to right:
/// numbers numerically, a number above any non-number, and everything else
/// as case-insensitive text.
///
/// Because the suffix is compared as text, a release without a suffix sorts
/// *below* the same release with one (`"" < "beta"`), and `"1.2"` sorts below
/// `"1.2.0"` because its empty suffix is padded against a numeric `"0"`.
#[must_use]
pub fn compare_versions(local: &str, remote: &str) -> Ordering {
    let local_segments = split_segments(local);
    let remote_segments = split_segments(remote);
    let len = local_segments.len().max(remote_segments.len());

    (0..len)
        .map(|index| {
            let local_part = local_segments.get(index).copied().unwrap_or("0");
            let remote_part = remote_segments.get(index).copied().unwrap_or("0");
            compare_segment(local_part, remote_part)
        })
        .find(|ordering| ordering.is_ne())
        .unwrap_or(Ordering::Equal)
}

/// Returns `true` when `latest` orders above `current` under
/// [`compare_versions`].
#[must_use]
pub fn is_newer_version(latest: &str, current: &str) -> bool {
    compare_versions(current, latest) == Ordering::Less
}

fn split_segments(version: &str) -> Vec<&str> {
    let main_end = version.find(['-', '+']).unwrap_or(version.len());
    let suffix = version.split_once('-').map_or("", |(_, suffix)| suffix);

    let mut segments: Vec<&str> = version[..main_end].split('.').collect();
    while segments.len() > 1 && segments.last().is_some_and(|segment| segment.is_empty()) {
        segments.pop();
    }
    segments.push(suffix);
    segments
}

fn compare_segment(local: &str, remote: &str) -> Ordering {
    match (is_numeric(local), is_numeric(remote)) {
        (true, true) => compare_numeric(local, remote),
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => local
            .chars()
            .flat_map(char::to_lowercase)
            .cmp(remote.chars().flat_map(char::to_lowercase)),
    }
}

fn is_numeric(segment: &str) -> bool {
    !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit())
}

// Digit strings of any length, so oversized segments never overflow.
fn compare_numeric(local: &str, remote: &str) -> Ordering {
    let local = local.trim_start_matches('0');
    let remote = remote.trim_start_matches('0');
    local.len().cmp(&remote.len()).then_with(|| local.cmp(remote))
}
