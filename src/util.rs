/// Rounds to the nearest integer with ties toward positive infinity.
///
/// `f64::round` sends ties away from zero, which disagrees on negative
/// halves (`-2.5` becomes `-3` there, `-2` here).
pub fn round_half_up(value: f64) -> f64 {
    (value + 0.5).floor()
}
