#![forbid(unsafe_code)]
//! QR code encoding.
//!
//! Implements QR Code Model 2 (versions 1 to 40, all four error correction levels) for a single
//! text segment. The segment mode is picked from the content (numeric, alphanumeric or byte), the
//! smallest version that holds it at the requested level is chosen, and the mask with the lowest
//! penalty score is applied. The level is never raised behind the caller's back: a symbol is
//! always encoded at exactly the level it was asked for.

/// A QR Code symbol, a square grid of dark and light modules.
///
/// Instances are immutable once [`QrCode::encode_text`] returns.
///
/// # Example
///
/// ```rust
/// use qrport::qrcode::{QrCode, QrCodeEcc};
///
/// let qr = QrCode::encode_text("Hello, World!", QrCodeEcc::Low).unwrap();
/// assert_eq!(qr.version().value(), 1);
/// assert_eq!(qr.size(), 21);
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct QrCode {
    version: Version,
    size: i32,
    ecl: QrCodeEcc,
    mask: Mask,
    modules: Vec<bool>,
}

impl QrCode {
    /// Encodes a text string at the given error correction level.
    ///
    /// Returns [`DataTooLong`] when no version up to 40 can hold the text at `ecl`.
    pub fn encode_text(text: &str, ecl: QrCodeEcc) -> Result<Self, DataTooLong> {
        Self::encode_segment(&QrSegment::for_text(text), ecl)
    }

    /// Encodes one segment into the smallest symbol that fits at `ecl`.
    pub fn encode_segment(segment: &QrSegment, ecl: QrCodeEcc) -> Result<Self, DataTooLong> {
        let mut version = Version::MIN;
        let used_bits = loop {
            let capacity_bits = num_data_codewords(version, ecl) * 8;
            let used = segment.total_bits(version);
            match (used, version.next()) {
                (Some(n), _) if n <= capacity_bits => break n,
                (_, Some(next)) => version = next,
                (None, None) => return Err(DataTooLong::SegmentTooLong),
                (Some(n), None) => return Err(DataTooLong::DataOverCapacity(n, capacity_bits)),
            }
        };

        let capacity_bits = num_data_codewords(version, ecl) * 8;
        let mut bits = BitBuffer::default();
        bits.append_bits(segment.mode.mode_bits(), 4);
        bits.append_bits(segment.num_chars as u32, segment.mode.num_char_count_bits(version));
        bits.append_all(&segment.data);
        debug_assert_eq!(bits.len(), used_bits);

        // Terminator, then zero-pad to a byte boundary.
        let terminator = (capacity_bits - bits.len()).min(4);
        bits.append_bits(0, terminator as u8);
        let filler = bits.len().wrapping_neg() & 7;
        bits.append_bits(0, filler as u8);

        for &pad in [0xEC, 0x11].iter().cycle() {
            if bits.len() >= capacity_bits {
                break;
            }
            bits.append_bits(pad, 8);
        }

        let codewords = add_ecc_and_interleave(&bits.into_bytes(), version, ecl);
        Ok(Canvas::new(version).finish(&codewords, ecl))
    }

    /// Returns this QR Code's version, in the range [1, 40].
    pub fn version(&self) -> Version {
        self.version
    }

    /// Returns the width and height in modules, in the range [21, 177].
    pub fn size(&self) -> i32 {
        self.size
    }

    /// Returns the error correction level the symbol was encoded at.
    pub fn error_correction_level(&self) -> QrCodeEcc {
        self.ecl
    }

    /// Returns the mask pattern chosen for this symbol.
    pub fn mask(&self) -> Mask {
        self.mask
    }

    /// Returns `true` for a dark module. Coordinates outside the symbol are light.
    pub fn get_module(&self, x: i32, y: i32) -> bool {
        let range = 0..self.size;
        range.contains(&x) && range.contains(&y) && self.modules[(y * self.size + x) as usize]
    }
}

impl std::fmt::Debug for QrCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QrCode")
            .field("version", &self.version.value())
            .field("ecl", &self.ecl)
            .field("mask", &self.mask.value())
            .finish()
    }
}

/// Module grid under construction. Tracks which modules belong to function patterns so that
/// codeword placement and masking skip them.
struct Canvas {
    version: Version,
    size: i32,
    modules: Vec<bool>,
    is_function: Vec<bool>,
}

impl Canvas {
    fn new(version: Version) -> Self {
        let size = version.width();
        let cells = (size * size) as usize;
        let mut canvas = Self {
            version,
            size,
            modules: vec![false; cells],
            is_function: vec![false; cells],
        };
        canvas.draw_function_patterns();
        canvas
    }

    fn index(&self, x: i32, y: i32) -> usize {
        (y * self.size + x) as usize
    }

    fn get(&self, x: i32, y: i32) -> bool {
        self.modules[self.index(x, y)]
    }

    fn set_function(&mut self, x: i32, y: i32, dark: bool) {
        let i = self.index(x, y);
        self.modules[i] = dark;
        self.is_function[i] = true;
    }

    fn draw_function_patterns(&mut self) {
        let size = self.size;
        for i in 0..size {
            self.set_function(6, i, i % 2 == 0);
            self.set_function(i, 6, i % 2 == 0);
        }

        self.draw_finder(3, 3);
        self.draw_finder(size - 4, 3);
        self.draw_finder(3, size - 4);

        let positions = alignment_pattern_positions(self.version);
        let last = positions.len().saturating_sub(1);
        for (i, &cx) in positions.iter().enumerate() {
            for (j, &cy) in positions.iter().enumerate() {
                // The three corners are occupied by finder patterns.
                let corner = (i == 0 && j == 0) || (i == 0 && j == last) || (i == last && j == 0);
                if !corner {
                    self.draw_alignment(cx, cy);
                }
            }
        }

        // Reserve the format area; the real bits are drawn once the mask is known.
        self.draw_format_bits(QrCodeEcc::Low, Mask(0));
        self.draw_version();
    }

    fn draw_finder(&mut self, cx: i32, cy: i32) {
        for dy in -4..=4 {
            for dx in -4..=4 {
                let (x, y) = (cx + dx, cy + dy);
                if (0..self.size).contains(&x) && (0..self.size).contains(&y) {
                    let dist = i32::max(dx.abs(), dy.abs());
                    self.set_function(x, y, dist != 2 && dist != 4);
                }
            }
        }
    }

    fn draw_alignment(&mut self, cx: i32, cy: i32) {
        for dy in -2..=2 {
            for dx in -2..=2 {
                self.set_function(cx + dx, cy + dy, i32::max(dx.abs(), dy.abs()) != 1);
            }
        }
    }

    fn draw_format_bits(&mut self, ecl: QrCodeEcc, mask: Mask) {
        let data = u32::from((ecl.format_bits() << 3) | mask.value());
        let mut rem = data;
        for _ in 0..10 {
            rem = (rem << 1) ^ ((rem >> 9) * 0x537);
        }
        let bits = ((data << 10) | rem) ^ 0x5412;

        // First copy, around the top-left finder.
        for i in 0..=5 {
            self.set_function(8, i, get_bit(bits, i));
        }
        self.set_function(8, 7, get_bit(bits, 6));
        self.set_function(8, 8, get_bit(bits, 7));
        self.set_function(7, 8, get_bit(bits, 8));
        for i in 9..15 {
            self.set_function(14 - i, 8, get_bit(bits, i));
        }

        // Second copy, split between the other two finders.
        let size = self.size;
        for i in 0..8 {
            self.set_function(size - 1 - i, 8, get_bit(bits, i));
        }
        for i in 8..15 {
            self.set_function(8, size - 15 + i, get_bit(bits, i));
        }
        self.set_function(8, size - 8, true);
    }

    fn draw_version(&mut self) {
        let ver = u32::from(self.version.value());
        if ver < 7 {
            return;
        }
        let mut rem = ver;
        for _ in 0..12 {
            rem = (rem << 1) ^ ((rem >> 11) * 0x1F25);
        }
        let bits = (ver << 12) | rem;
        for i in 0..18 {
            let dark = get_bit(bits, i);
            let a = self.size - 11 + i % 3;
            let b = i / 3;
            self.set_function(a, b, dark);
            self.set_function(b, a, dark);
        }
    }

    /// Places the codewords in the two-column zig-zag from the bottom-right corner.
    fn draw_codewords(&mut self, codewords: &[u8]) {
        let total_bits = codewords.len() * 8;
        let mut i = 0usize;
        let mut right = self.size - 1;
        while right >= 1 {
            if right == 6 {
                right = 5;
            }
            let upward = ((right + 1) & 2) == 0;
            for vert in 0..self.size {
                let y = if upward { self.size - 1 - vert } else { vert };
                for x in [right, right - 1] {
                    let idx = self.index(x, y);
                    if !self.is_function[idx] && i < total_bits {
                        self.modules[idx] = get_bit(u32::from(codewords[i >> 3]), 7 - (i & 7) as i32);
                        i += 1;
                    }
                }
            }
            right -= 2;
        }
        debug_assert_eq!(i, total_bits);
    }

    fn apply_mask(&mut self, mask: Mask) {
        for y in 0..self.size {
            for x in 0..self.size {
                let idx = self.index(x, y);
                if !self.is_function[idx] && mask.inverts(x, y) {
                    self.modules[idx] = !self.modules[idx];
                }
            }
        }
    }

    fn finish(mut self, codewords: &[u8], ecl: QrCodeEcc) -> QrCode {
        self.draw_codewords(codewords);

        let mut best = (i32::MAX, Mask(0));
        for mask in Mask::ALL {
            self.apply_mask(mask);
            self.draw_format_bits(ecl, mask);
            let penalty = self.penalty_score();
            if penalty < best.0 {
                best = (penalty, mask);
            }
            // XOR again to undo.
            self.apply_mask(mask);
        }

        let mask = best.1;
        self.apply_mask(mask);
        self.draw_format_bits(ecl, mask);
        QrCode {
            version: self.version,
            size: self.size,
            ecl,
            mask,
            modules: self.modules,
        }
    }

    fn penalty_score(&self) -> i32 {
        let size = self.size;
        let mut result = 0;

        for y in 0..size {
            result += self.line_penalty((0..size).map(|x| self.get(x, y)));
        }
        for x in 0..size {
            result += self.line_penalty((0..size).map(|y| self.get(x, y)));
        }

        for y in 0..size - 1 {
            for x in 0..size - 1 {
                let color = self.get(x, y);
                if color == self.get(x + 1, y)
                    && color == self.get(x, y + 1)
                    && color == self.get(x + 1, y + 1)
                {
                    result += PENALTY_N2;
                }
            }
        }

        let dark = self.modules.iter().filter(|&&m| m).count() as i32;
        let total = size * size;
        let k = ((dark * 20 - total * 10).abs() + total - 1) / total - 1;
        result + k * PENALTY_N4
    }

    /// Scores same-colour runs and finder-like patterns along one row or column.
    fn line_penalty(&self, line: impl Iterator<Item = bool>) -> i32 {
        let mut score = 0;
        let mut run_color = false;
        let mut run_len = 0;
        let mut history = FinderPenalty::new(self.size);
        for color in line {
            if color == run_color {
                run_len += 1;
                if run_len == 5 {
                    score += PENALTY_N1;
                } else if run_len > 5 {
                    score += 1;
                }
            } else {
                history.add_history(run_len);
                if !run_color {
                    score += history.count_patterns() * PENALTY_N3;
                }
                run_color = color;
                run_len = 1;
            }
        }
        score + history.terminate_and_count(run_color, run_len) * PENALTY_N3
    }
}

fn alignment_pattern_positions(version: Version) -> Vec<i32> {
    let ver = i32::from(version.value());
    if ver == 1 {
        return Vec::new();
    }
    let num_align = ver / 7 + 2;
    let step = if ver == 32 {
        26
    } else {
        (ver * 4 + num_align * 2 + 1) / (num_align * 2 - 2) * 2
    };
    let size = version.width();
    let mut positions: Vec<i32> = (0..num_align - 1).map(|i| size - 7 - i * step).collect();
    positions.push(6);
    positions.reverse();
    positions
}

/// Splits the data codewords into blocks, appends each block's ECC and interleaves the result.
fn add_ecc_and_interleave(data: &[u8], version: Version, ecl: QrCodeEcc) -> Vec<u8> {
    debug_assert_eq!(data.len(), num_data_codewords(version, ecl));
    let num_blocks = table_get(&NUM_ERROR_CORRECTION_BLOCKS, version, ecl);
    let block_ecc_len = table_get(&ECC_CODEWORDS_PER_BLOCK, version, ecl);
    let raw_codewords = num_raw_data_modules(version) / 8;
    let num_short_blocks = num_blocks - raw_codewords % num_blocks;
    let short_block_len = raw_codewords / num_blocks;

    let rs = ReedSolomon::new(block_ecc_len);
    let mut blocks: Vec<Vec<u8>> = Vec::with_capacity(num_blocks);
    let mut rest = data;
    for i in 0..num_blocks {
        let data_len = short_block_len - block_ecc_len + usize::from(i >= num_short_blocks);
        let (block_data, tail) = rest.split_at(data_len);
        rest = tail;
        let mut block = block_data.to_vec();
        let ecc = rs.remainder(&block);
        // Short blocks get a placeholder so every block has the same length; it is skipped
        // when interleaving.
        if i < num_short_blocks {
            block.push(0);
        }
        block.extend_from_slice(&ecc);
        blocks.push(block);
    }

    let mut result = Vec::with_capacity(raw_codewords);
    for i in 0..=short_block_len {
        for (j, block) in blocks.iter().enumerate() {
            if i != short_block_len - block_ecc_len || j >= num_short_blocks {
                result.push(block[i]);
            }
        }
    }
    debug_assert_eq!(result.len(), raw_codewords);
    result
}

/// Number of data bits available in a symbol, excluding function patterns and format/version
/// information. Includes remainder bits, so it may not be a multiple of 8.
fn num_raw_data_modules(version: Version) -> usize {
    let ver = usize::from(version.value());
    let mut result = (16 * ver + 128) * ver + 64;
    if ver >= 2 {
        let num_align = ver / 7 + 2;
        result -= (25 * num_align - 10) * num_align - 55;
        if ver >= 7 {
            result -= 36;
        }
    }
    result
}

fn num_data_codewords(version: Version, ecl: QrCodeEcc) -> usize {
    num_raw_data_modules(version) / 8
        - table_get(&ECC_CODEWORDS_PER_BLOCK, version, ecl)
            * table_get(&NUM_ERROR_CORRECTION_BLOCKS, version, ecl)
}

fn table_get(table: &'static [[u8; 41]; 4], version: Version, ecl: QrCodeEcc) -> usize {
    usize::from(table[ecl.ordinal()][usize::from(version.value())])
}

/// Reed-Solomon ECC generator over GF(2^8/0x11D).
struct ReedSolomon {
    divisor: Vec<u8>,
}

impl ReedSolomon {
    fn new(degree: usize) -> Self {
        debug_assert!((1..=30).contains(&degree));
        // Product of (x - r^i) for i in 0..degree, with r = 0x02, highest coefficient dropped.
        let mut divisor = vec![0u8; degree];
        divisor[degree - 1] = 1;
        let mut root: u8 = 1;
        for _ in 0..degree {
            for j in 0..degree {
                divisor[j] = gf_multiply(divisor[j], root);
                if j + 1 < degree {
                    divisor[j] ^= divisor[j + 1];
                }
            }
            root = gf_multiply(root, 0x02);
        }
        Self { divisor }
    }

    fn remainder(&self, data: &[u8]) -> Vec<u8> {
        let mut result = vec![0u8; self.divisor.len()];
        for &b in data {
            let factor = b ^ result[0];
            result.remove(0);
            result.push(0);
            for (r, &d) in result.iter_mut().zip(&self.divisor) {
                *r ^= gf_multiply(d, factor);
            }
        }
        result
    }
}

fn gf_multiply(x: u8, y: u8) -> u8 {
    let mut z: u8 = 0;
    for i in (0..8).rev() {
        z = (z << 1) ^ ((z >> 7) * 0x1D);
        z ^= ((y >> i) & 1) * x;
    }
    z
}

struct FinderPenalty {
    size: i32,
    run_history: [i32; 7],
}

impl FinderPenalty {
    fn new(size: i32) -> Self {
        Self {
            size,
            run_history: [0; 7],
        }
    }

    fn add_history(&mut self, mut run_len: i32) {
        // The light border outside the symbol counts as part of the first run.
        if self.run_history[0] == 0 {
            run_len += self.size;
        }
        self.run_history.copy_within(0..6, 1);
        self.run_history[0] = run_len;
    }

    /// Counts 1:1:3:1:1 finder-like runs with a 4-module light margin on either side (0 to 2).
    fn count_patterns(&self) -> i32 {
        let rh = &self.run_history;
        let n = rh[1];
        let core = n > 0 && rh[2] == n && rh[3] == n * 3 && rh[4] == n && rh[5] == n;
        i32::from(core && rh[0] >= n * 4 && rh[6] >= n)
            + i32::from(core && rh[6] >= n * 4 && rh[0] >= n)
    }

    fn terminate_and_count(mut self, run_color: bool, mut run_len: i32) -> i32 {
        if run_color {
            self.add_history(run_len);
            run_len = 0;
        }
        run_len += self.size;
        self.add_history(run_len);
        self.count_patterns()
    }
}

const PENALTY_N1: i32 = 3;
const PENALTY_N2: i32 = 3;
const PENALTY_N3: i32 = 40;
const PENALTY_N4: i32 = 10;

// Index 0 is unused; versions start at 1.
static ECC_CODEWORDS_PER_BLOCK: [[u8; 41]; 4] = [
    [
        0, 7, 10, 15, 20, 26, 18, 20, 24, 30, 18, 20, 24, 26, 30, 22, 24, 28, 30, 28, 28, 28, 28, 30,
        30, 26, 28, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30,
    ], // Low
    [
        0, 10, 16, 26, 18, 24, 16, 18, 22, 22, 26, 30, 22, 22, 24, 24, 28, 28, 26, 26, 26, 26, 28, 28,
        28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28,
    ], // Medium
    [
        0, 13, 22, 18, 26, 18, 24, 18, 22, 20, 24, 28, 26, 24, 20, 30, 24, 28, 28, 26, 30, 28, 30, 30,
        30, 30, 28, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30,
    ], // Quartile
    [
        0, 17, 28, 22, 16, 22, 28, 26, 26, 24, 28, 24, 28, 22, 24, 24, 30, 28, 28, 26, 28, 30, 24, 30,
        30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30,
    ], // High
];

static NUM_ERROR_CORRECTION_BLOCKS: [[u8; 41]; 4] = [
    [
        0, 1, 1, 1, 1, 1, 2, 2, 2, 2, 4, 4, 4, 4, 4, 6, 6, 6, 6, 7, 8, 8, 9, 9, 10, 12, 12, 12, 13,
        14, 15, 16, 17, 18, 19, 19, 20, 21, 22, 24, 25,
    ], // Low
    [
        0, 1, 1, 1, 2, 2, 4, 4, 4, 5, 5, 5, 8, 9, 9, 10, 10, 11, 13, 14, 16, 17, 17, 18, 20, 21, 23,
        25, 26, 28, 29, 31, 33, 35, 37, 38, 40, 43, 45, 47, 49,
    ], // Medium
    [
        0, 1, 1, 2, 2, 4, 4, 6, 6, 8, 8, 8, 10, 12, 16, 12, 17, 16, 18, 21, 20, 23, 23, 25, 27, 29,
        34, 34, 35, 38, 40, 43, 45, 48, 51, 53, 56, 59, 62, 65, 68,
    ], // Quartile
    [
        0, 1, 1, 2, 4, 4, 4, 5, 6, 8, 8, 11, 11, 16, 16, 18, 16, 19, 21, 25, 25, 25, 34, 30, 32, 35,
        37, 40, 42, 45, 48, 51, 54, 57, 60, 63, 66, 70, 74, 77, 81,
    ], // High
];

/// Error correction level for a QR code.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub enum QrCodeEcc {
    /// Tolerates ~7% erroneous codewords.
    Low,
    /// Tolerates ~15% erroneous codewords.
    Medium,
    /// Tolerates ~25% erroneous codewords.
    Quartile,
    /// Tolerates ~30% erroneous codewords.
    High,
}

impl QrCodeEcc {
    fn ordinal(self) -> usize {
        use QrCodeEcc::*;
        match self {
            Low => 0,
            Medium => 1,
            Quartile => 2,
            High => 3,
        }
    }

    /// The 2-bit value written into the format information.
    fn format_bits(self) -> u8 {
        use QrCodeEcc::*;
        match self {
            Low => 1,
            Medium => 0,
            Quartile => 3,
            High => 2,
        }
    }
}

/// A run of content encoded in a single mode.
#[derive(Clone, Debug)]
pub struct QrSegment {
    mode: QrSegmentMode,
    num_chars: usize,
    data: Vec<bool>,
}

impl QrSegment {
    /// Picks the most compact mode that can represent `text`.
    pub fn for_text(text: &str) -> Self {
        Self::numeric(text)
            .or_else(|| Self::alphanumeric(text))
            .unwrap_or_else(|| Self::make_bytes(text.as_bytes()))
    }

    /// Creates a byte-mode segment.
    pub fn make_bytes(data: &[u8]) -> Self {
        let mut bits = BitBuffer::default();
        for &b in data {
            bits.append_bits(u32::from(b), 8);
        }
        Self::new(QrSegmentMode::Byte, data.len(), bits)
    }

    fn numeric(text: &str) -> Option<Self> {
        let digits: Vec<u32> = text.chars().map(|c| c.to_digit(10)).collect::<Option<_>>()?;
        let mut bits = BitBuffer::default();
        // Groups of three digits take 10 bits; a trailing pair 7, a trailing digit 4.
        for group in digits.chunks(3) {
            let value = group.iter().fold(0, |acc, d| acc * 10 + d);
            bits.append_bits(value, group.len() as u8 * 3 + 1);
        }
        Some(Self::new(QrSegmentMode::Numeric, digits.len(), bits))
    }

    fn alphanumeric(text: &str) -> Option<Self> {
        let values: Vec<u32> = text
            .chars()
            .map(|c| ALPHANUMERIC_CHARSET.find(c).map(|i| i as u32))
            .collect::<Option<_>>()?;
        let mut bits = BitBuffer::default();
        for pair in values.chunks(2) {
            match *pair {
                [a, b] => bits.append_bits(a * 45 + b, 11),
                [a] => bits.append_bits(a, 6),
                _ => {}
            }
        }
        Some(Self::new(QrSegmentMode::Alphanumeric, values.len(), bits))
    }

    fn new(mode: QrSegmentMode, num_chars: usize, bits: BitBuffer) -> Self {
        Self {
            mode,
            num_chars,
            data: bits.0,
        }
    }

    pub fn mode(&self) -> QrSegmentMode {
        self.mode
    }

    pub fn num_chars(&self) -> usize {
        self.num_chars
    }

    /// Header plus payload bits at `version`, or `None` when the character count does not fit
    /// the count field.
    fn total_bits(&self, version: Version) -> Option<usize> {
        let cc_bits = self.mode.num_char_count_bits(version);
        if self.num_chars >= 1usize << cc_bits {
            return None;
        }
        Some(4 + usize::from(cc_bits) + self.data.len())
    }

    pub fn is_numeric(text: &str) -> bool {
        text.chars().all(|c| c.is_ascii_digit())
    }

    pub fn is_alphanumeric(text: &str) -> bool {
        text.chars().all(|c| ALPHANUMERIC_CHARSET.contains(c))
    }
}

static ALPHANUMERIC_CHARSET: &str = "0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ $%*+-./:";

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum QrSegmentMode {
    Numeric,
    Alphanumeric,
    Byte,
}

impl QrSegmentMode {
    fn mode_bits(self) -> u32 {
        use QrSegmentMode::*;
        match self {
            Numeric => 0x1,
            Alphanumeric => 0x2,
            Byte => 0x4,
        }
    }

    fn num_char_count_bits(self, version: Version) -> u8 {
        use QrSegmentMode::*;
        let widths = match self {
            Numeric => [10, 12, 14],
            Alphanumeric => [9, 11, 13],
            Byte => [8, 16, 16],
        };
        widths[usize::from((version.value() + 7) / 17)]
    }
}

#[derive(Default)]
struct BitBuffer(Vec<bool>);

impl BitBuffer {
    fn len(&self) -> usize {
        self.0.len()
    }

    fn append_bits(&mut self, value: u32, len: u8) {
        debug_assert!(len <= 31 && (value >> len) == 0);
        self.0.extend((0..len).rev().map(|i| (value >> i) & 1 != 0));
    }

    fn append_all(&mut self, bits: &[bool]) {
        self.0.extend_from_slice(bits);
    }

    /// Packs the bits big-endian. The caller pads to a byte boundary first.
    fn into_bytes(self) -> Vec<u8> {
        debug_assert_eq!(self.0.len() % 8, 0);
        self.0
            .chunks(8)
            .map(|byte| byte.iter().fold(0u8, |acc, &bit| (acc << 1) | u8::from(bit)))
            .collect()
    }
}

/// Returned when the content does not fit any symbol at the requested level.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DataTooLong {
    /// The character count overflows the count field of every version.
    #[error("segment too long")]
    SegmentTooLong,
    /// Needed bits, capacity in bits of the largest symbol.
    #[error("data length = {0} bits, max capacity = {1} bits")]
    DataOverCapacity(usize, usize),
}

/// A QR code version (1–40).
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub struct Version(u8);

impl Version {
    /// The minimum version number supported in the QR Code Model 2 standard.
    pub const MIN: Version = Version(1);

    /// The maximum version number supported in the QR Code Model 2 standard.
    pub const MAX: Version = Version(40);

    /// Returns the version number, in the range [1, 40].
    pub const fn value(self) -> u8 {
        self.0
    }

    /// Side length of the symbol in modules.
    pub const fn width(self) -> i32 {
        self.0 as i32 * 4 + 17
    }

    fn next(self) -> Option<Version> {
        (self < Self::MAX).then(|| Version(self.0 + 1))
    }
}

/// A mask pattern (0–7).
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub struct Mask(u8);

impl Mask {
    const ALL: [Mask; 8] = [
        Mask(0),
        Mask(1),
        Mask(2),
        Mask(3),
        Mask(4),
        Mask(5),
        Mask(6),
        Mask(7),
    ];

    /// Returns the value, which is in the range [0, 7].
    pub const fn value(self) -> u8 {
        self.0
    }

    fn inverts(self, x: i32, y: i32) -> bool {
        match self.0 {
            0 => (x + y) % 2 == 0,
            1 => y % 2 == 0,
            2 => x % 3 == 0,
            3 => (x + y) % 3 == 0,
            4 => (x / 3 + y / 2) % 2 == 0,
            5 => (x * y) % 2 + (x * y) % 3 == 0,
            6 => ((x * y) % 2 + (x * y) % 3) % 2 == 0,
            _ => ((x + y) % 2 + (x * y) % 3) % 2 == 0,
        }
    }
}

fn get_bit(x: u32, i: i32) -> bool {
    ((x >> i) & 1) != 0
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Decodes a symbol with a standard reader, rendering 4 px per module with a quiet zone.
    fn read_back(qr: &QrCode) -> String {
        let scale = 4;
        let border = 4;
        let side = ((qr.size() + 2 * border) * scale) as usize;
        let mut img = rqrr::PreparedImage::prepare_from_greyscale(side, side, |x, y| {
            let mx = x as i32 / scale - border;
            let my = y as i32 / scale - border;
            if qr.get_module(mx, my) {
                0
            } else {
                255
            }
        });
        let grids = img.detect_grids();
        assert_eq!(grids.len(), 1, "expected exactly one symbol");
        let (_meta, content) = grids[0].decode().expect("symbol decodes");
        content
    }

    #[test]
    fn test_is_numeric() {
        assert!(QrSegment::is_numeric("1234567890"));
        assert!(!QrSegment::is_numeric("1234abc"));
    }

    #[test]
    fn test_is_alphanumeric() {
        assert!(QrSegment::is_alphanumeric("HELLO WORLD"));
        assert!(!QrSegment::is_alphanumeric("Hello World"));
    }

    #[test]
    fn segment_mode_follows_content() {
        assert_eq!(QrSegment::for_text("0123").mode(), QrSegmentMode::Numeric);
        assert_eq!(QrSegment::for_text("HTTP://X.IO/A").mode(), QrSegmentMode::Alphanumeric);
        assert_eq!(QrSegment::for_text("hello-world").mode(), QrSegmentMode::Byte);
        assert_eq!(QrSegment::for_text("héllo").num_chars(), 6);
    }

    #[test]
    fn smallest_version_is_chosen() {
        let qr = QrCode::encode_text("Hello, world!", QrCodeEcc::Low).unwrap();
        assert_eq!(qr.version(), Version::MIN);
        assert_eq!(qr.size(), 21);

        // Same payload, more ECC, bigger symbol.
        let text = "a".repeat(80);
        let low = QrCode::encode_text(&text, QrCodeEcc::Low).unwrap();
        let high = QrCode::encode_text(&text, QrCodeEcc::High).unwrap();
        assert!(low.version() < high.version());
    }

    #[test]
    fn level_is_not_boosted() {
        let qr = QrCode::encode_text("1", QrCodeEcc::Low).unwrap();
        assert_eq!(qr.error_correction_level(), QrCodeEcc::Low);
    }

    #[test]
    fn byte_capacity_at_low() {
        let fits = "a".repeat(2953);
        let qr = QrCode::encode_text(&fits, QrCodeEcc::Low).unwrap();
        assert_eq!(qr.version(), Version::MAX);
        assert_eq!(qr.size(), 177);

        let over = "a".repeat(2954);
        assert!(matches!(
            QrCode::encode_text(&over, QrCodeEcc::Low),
            Err(DataTooLong::DataOverCapacity(_, 23648))
        ));
    }

    #[test]
    fn high_level_has_less_capacity() {
        let text = "a".repeat(1500);
        assert!(QrCode::encode_text(&text, QrCodeEcc::Low).is_ok());
        assert!(QrCode::encode_text(&text, QrCodeEcc::High).is_err());
    }

    #[test]
    fn reed_solomon_remainder() {
        // "HELLO WORLD" at 1-M, from the ISO/IEC 18004 worked example.
        let data = [
            0x20, 0x5B, 0x0B, 0x78, 0xD1, 0x72, 0xDC, 0x4D, 0x43, 0x40, 0xEC, 0x11, 0xEC, 0x11,
            0xEC, 0x11,
        ];
        let ecc = ReedSolomon::new(10).remainder(&data);
        assert_eq!(ecc, vec![0xC4, 0x23, 0x27, 0x77, 0xEB, 0xD7, 0xE7, 0xE2, 0x5D, 0x17]);
    }

    #[test]
    fn round_trips_through_a_reader() {
        let cases = [
            ("hello-world", QrCodeEcc::Low),
            ("HELLO WORLD", QrCodeEcc::Quartile),
            ("3141592653589793238462643383279", QrCodeEcc::Medium),
            ("https://example.com/a?b=c&d=e", QrCodeEcc::High),
        ];
        for (text, ecl) in cases {
            let qr = QrCode::encode_text(text, ecl).unwrap();
            assert_eq!(read_back(&qr), text, "level {ecl:?}");
        }
    }

    #[test]
    fn round_trips_with_version_information() {
        // Large enough to need version >= 7, which carries the version blocks.
        let text = "The quick brown fox jumps over the lazy dog. ".repeat(4);
        let qr = QrCode::encode_text(&text, QrCodeEcc::Medium).unwrap();
        assert!(qr.version().value() >= 7);
        assert_eq!(read_back(&qr), text);
    }

    fn cycle(alphabet: &str, len: usize) -> String {
        alphabet.chars().cycle().take(len).collect()
    }

    #[test]
    fn round_trips_every_mode_and_level() {
        let alphabets = [
            ("0123456789", QrSegmentMode::Numeric),
            ("0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ $%*+-./:", QrSegmentMode::Alphanumeric),
            ("the quick brown fox, 42!", QrSegmentMode::Byte),
        ];
        let levels = [QrCodeEcc::Low, QrCodeEcc::Medium, QrCodeEcc::Quartile, QrCodeEcc::High];

        for (alphabet, mode) in alphabets {
            for len in [1, 10, 100, 500, 1000] {
                let text = cycle(alphabet, len);
                assert_eq!(QrSegment::for_text(&text).mode(), mode);
                for ecl in levels {
                    let qr = QrCode::encode_text(&text, ecl).unwrap();
                    assert_eq!(read_back(&qr), text, "{mode:?} x{len} at {ecl:?}");
                }
            }
        }
    }

    #[test]
    fn round_trips_at_full_capacity() {
        let bytes = cycle("abcdefghijklmnopqrstuvwxyz", 2953);
        let qr = QrCode::encode_text(&bytes, QrCodeEcc::Low).unwrap();
        assert_eq!(qr.version(), Version::MAX);
        assert_eq!(read_back(&qr), bytes);

        let digits = cycle("9876543210", 7089);
        let qr = QrCode::encode_text(&digits, QrCodeEcc::Low).unwrap();
        assert_eq!(qr.version(), Version::MAX);
        assert_eq!(read_back(&qr), digits);

        let alnum = cycle("QRPORT-40/", 1852);
        let qr = QrCode::encode_text(&alnum, QrCodeEcc::High).unwrap();
        assert_eq!(qr.version(), Version::MAX);
        assert_eq!(read_back(&qr), alnum);
    }
}
