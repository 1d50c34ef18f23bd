/// One palette slot: class index and its RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaletteEntry {
    pub class: usize,
    pub rgb: [u8; 3],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    entries: Vec<PaletteEntry>,
}

impl Palette {
    /// Class 0 white (not hit), class 1 red (hit).
    pub fn binary() -> Self {
        Palette {
            entries: vec![
                PaletteEntry { class: 0, rgb: [255, 255, 255] },
                PaletteEntry { class: 1, rgb: [255, 0, 0] },
            ],
        }
    }

    /// `class_count` evenly spaced hues starting at red, full saturation and value.
    pub fn rainbow(class_count: usize) -> Self {
        let entries = (0..class_count)
            .map(|class| {
                let hue = class as f64 / class_count as f64;
                let (r, g, b) = hsv_to_rgb(hue, 1.0, 1.0);
                PaletteEntry {
                    class,
                    rgb: [to_channel(r), to_channel(g), to_channel(b)],
                }
            })
            .collect();
        Palette { entries }
    }

    pub fn iter(&self) -> impl Iterator<Item = &PaletteEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

fn to_channel(value: f64) -> u8 {
    (value * 255.0).round().clamp(0.0, 255.0) as u8
}

/// Hue in [0, 1); all components in [0, 1].
fn hsv_to_rgb(h: f64, s: f64, v: f64) -> (f64, f64, f64) {
    if s == 0.0 {
        return (v, v, v);
    }
    let sector = (h * 6.0).floor();
    let f = h * 6.0 - sector;
    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let t = v * (1.0 - s * (1.0 - f));
    match (sector as i64).rem_euclid(6) {
        0 => (v, t, p),
        1 => (q, v, p),
        2 => (p, v, t),
        3 => (p, q, v),
        4 => (t, p, v),
        _ => (v, p, q),
    }
}
