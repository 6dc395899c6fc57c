use std::collections::HashMap;

/// Advance widths of standard Helvetica in 1/1000 of the font size
struct FontMetrics {
    widths: HashMap<char, u16>,
    default_width: u16,
}

impl FontMetrics {
    fn new(default_width: u16) -> Self {
        Self {
            widths: HashMap::new(),
            default_width,
        }
    }

    fn with_widths(mut self, widths: &[(char, u16)]) -> Self {
        for &(ch, width) in widths {
            self.widths.insert(ch, width);
        }
        self
    }

    fn char_width(&self, ch: char) -> u16 {
        self.widths.get(&ch).copied().unwrap_or(self.default_width)
    }
}

lazy_static::lazy_static! {
    static ref HELVETICA: FontMetrics = FontMetrics::new(556).with_widths(&[
        (' ', 278), ('!', 278), ('"', 355), ('#', 556), ('$', 556), ('%', 889),
        ('&', 667), ('\'', 191), ('(', 333), (')', 333), ('*', 389), ('+', 584),
        (',', 278), ('-', 333), ('.', 278), ('/', 278), (':', 278), (';', 278),
        ('<', 584), ('=', 584), ('>', 584), ('?', 556), ('@', 1015), ('A', 667),
        ('B', 667), ('C', 722), ('D', 722), ('E', 667), ('F', 611), ('G', 778),
        ('H', 722), ('I', 278), ('J', 500), ('K', 667), ('L', 556), ('M', 833),
        ('N', 722), ('O', 778), ('P', 667), ('Q', 778), ('R', 722), ('S', 667),
        ('T', 611), ('U', 722), ('V', 667), ('W', 944), ('X', 667), ('Y', 667),
        ('Z', 611), ('[', 278), ('\\', 278), (']', 278), ('^', 469), ('_', 556),
        ('`', 333), ('c', 500), ('f', 278), ('i', 222), ('j', 222), ('k', 500),
        ('l', 222), ('m', 833), ('r', 333), ('s', 500), ('t', 278), ('v', 500),
        ('w', 722), ('x', 500), ('y', 500), ('z', 500), ('{', 334), ('|', 260),
        ('}', 334), ('~', 584),
    ]);
}

/// Advance of one Helvetica glyph at `font_size`
pub fn char_width(ch: char, font_size: f32) -> f32 {
    f32::from(HELVETICA.char_width(ch)) / 1000.0 * font_size
}

/// Advance of a Helvetica string at `font_size`
pub fn text_width(text: &str, font_size: f32) -> f32 {
    let units: u32 = text.chars().map(|ch| u32::from(HELVETICA.char_width(ch))).sum();
    units as f32 / 1000.0 * font_size
}
