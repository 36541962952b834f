use regex::Regex;
use std::sync::LazyLock;

static CUE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r" *\[[^\]]*\] *").expect("cue pattern is valid"));

/// Removes bracketed stage directions like `[short pause]` from a spoken response.
///
/// Each cue and the spaces around it collapse to one space, then the ends are trimmed.
pub fn strip_cues(spoken: &str) -> String {
    CUE.replace_all(spoken, " ").trim().to_string()
}
