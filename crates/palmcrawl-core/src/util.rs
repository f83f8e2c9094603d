/// Parse a seed list: one url per line, blank lines and `#` comments ignored.
///
/// Lines that are not http(s) urls are dropped with a warning.
pub fn parse_seed_list(text: &str) -> Vec<String> {
    text.lines()
        .map(|line| line.split('#').next().unwrap_or_default().trim())
        .filter(|line| !line.is_empty())
        .filter_map(|line| match crate::domain::canonicalize(line) {
            Some(url) => Some(url),
            None => {
                tracing::warn!(line = %line, "Ignoring invalid seed");
                None
            }
        })
        .collect()
}
