//! Docker `--env-file` lines. Docker reads values verbatim, so nothing is quoted.

pub fn line(name: &str, value: &str) -> String {
    format!("{}={}", name, value)
}
