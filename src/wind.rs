//! compass text for a wind direction in degrees.
//!
//! sector bounds are not symmetric: E and SE are open on both ends, so
//! exactly 67.5 and 112.5 fall through to north.

const HALF_SECTOR: f64 = 22.5;

pub fn wind_direction_text(degrees: f64, language: &str) -> &'static str {
    // 0 and 360 both land in the north sector
    let degrees = if degrees > 360.0 { degrees.rem_euclid(360.0) } else { degrees };

    let closed = |centre: f64| centre - HALF_SECTOR <= degrees && degrees < centre + HALF_SECTOR;
    let open = |centre: f64| centre - HALF_SECTOR < degrees && degrees < centre + HALF_SECTOR;

    let (fi, en) = if closed(45.0) {
        ("koillisesta", "NE")
    } else if open(90.0) {
        ("idästä", "E")
    } else if open(135.0) {
        ("kaakosta", "SE")
    } else if closed(180.0) {
        ("etelästä", "S")
    } else if closed(225.0) {
        ("lounaasta", "SW")
    } else if closed(270.0) {
        ("lännestä", "W")
    } else if closed(315.0) {
        ("luoteesta", "NW")
    } else {
        ("pohjoisesta", "N")
    };

    if language == "fi" {
        fi
    } else {
        en
    }
}
