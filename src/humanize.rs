//! Human readable sizes in SI units, `82854982` is shown as `83 MB`

static SIZES: [&str; 7] = ["B", "kB", "MB", "GB", "TB", "PB", "EB"];

pub fn bytes(s: u64) -> String {
    if s < 10 {
        return format!("{} B", s);
    }
    let mut e = 0;
    let mut unit = 1u64;
    while e + 1 < SIZES.len() && s / unit >= 1000 {
        unit *= 1000;
        e += 1;
    }
    let val = (s as f64 / unit as f64 * 10.0 + 0.5).floor() / 10.0;
    if val < 10.0 {
        format!("{:.1} {}", val, SIZES[e])
    } else {
        format!("{:.0} {}", val, SIZES[e])
    }
}
