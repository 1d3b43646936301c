pub mod admission;
pub mod mock_test;
pub mod paper;
pub mod stats;

/// Returns the selected value of a gallery filter, treating the UI's `ALL`
/// sentinel and blank input as "no filter".
pub(crate) fn selected(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("ALL"))
}
