const FALLBACK_STEM: &str = "archive";

/// Deterministic on-disk name for an archive URL.
///
/// Takes the trailing path segment, drops any `.zip`, replaces `.` and `-`
/// with `_` and appends `.zip`: `.../zipball/refs/tags/v1.2-rc` becomes
/// `v1_2_rc.zip`.
pub fn archive_file_name(archive_url: &str) -> String {
    let without_query = archive_url
        .split(['?', '#'])
        .next()
        .unwrap_or(archive_url);
    let segment = without_query
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default();

    let stem: String = segment
        .replace(".zip", "")
        .chars()
        .map(|c| match c {
            '.' | '-' | '\\' | ':' => '_',
            other => other,
        })
        .collect();

    if stem.is_empty() {
        format!("{FALLBACK_STEM}.zip")
    } else {
        format!("{stem}.zip")
    }
}
