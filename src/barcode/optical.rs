//! Scanline EAN-13/UPC-A decoder. Compiled only with the `optical`
//! feature; the rest of the crate treats image decoding as an opaque
//! capability that is either present or absent in a deployment.

use log::debug;

use crate::error::ScanError;

/// Left-hand (odd parity) digit patterns as module run widths. Right-hand
/// patterns share these widths with the colors inverted.
const L_WIDTHS: [[u8; 4]; 10] = [
    [3, 2, 1, 1],
    [2, 2, 2, 1],
    [2, 1, 2, 2],
    [1, 4, 1, 1],
    [1, 1, 3, 2],
    [1, 2, 3, 1],
    [1, 1, 1, 4],
    [1, 3, 1, 2],
    [1, 2, 1, 3],
    [3, 1, 1, 2],
];

/// Parity layout of the six left digits, indexed by the implied first
/// digit. `true` marks even (G) parity.
const PARITY: [[bool; 6]; 10] = [
    [false, false, false, false, false, false],
    [false, false, true, false, true, true],
    [false, false, true, true, false, true],
    [false, false, true, true, true, false],
    [false, true, false, false, true, true],
    [false, true, true, false, false, true],
    [false, true, true, true, false, false],
    [false, true, false, true, false, true],
    [false, true, false, true, true, false],
    [false, true, true, false, true, false],
];

/// Number of evenly spaced rows sampled from the image.
const SCAN_ROWS: u32 = 32;

/// Decode every EAN-13/UPC-A code visible in the image bytes. Returns the
/// distinct codes found, best row first; an empty list means the image was
/// readable but carried no recognizable barcode.
pub fn decode(image_bytes: &[u8]) -> Result<Vec<String>, ScanError> {
    let img = image::load_from_memory(image_bytes)
        .map_err(|e| ScanError::InvalidBarcodeFormat(format!("could not decode image: {}", e)))?;
    let gray = img.to_luma8();
    let (width, height) = gray.dimensions();

    let mut found = Vec::new();
    let step = (height / SCAN_ROWS).max(1);
    let mut y = step / 2;
    while y < height {
        let row: Vec<u8> = (0..width).map(|x| gray.get_pixel(x, y).0[0]).collect();
        if let Some(code) = decode_row(&row) {
            if !found.contains(&code) {
                debug!("optical decode hit at row {}: {}", y, code);
                found.push(code);
            }
        }
        let reversed: Vec<u8> = row.iter().rev().copied().collect();
        if let Some(code) = decode_row(&reversed) {
            if !found.contains(&code) {
                debug!("optical decode hit at mirrored row {}: {}", y, code);
                found.push(code);
            }
        }
        y += step;
    }
    Ok(found)
}

/// Try to read one EAN-13 from a single pixel row.
fn decode_row(row: &[u8]) -> Option<String> {
    let runs = binarize_runs(row)?;
    // 3 start guard + 24 left + 5 middle + 24 right + 3 end runs.
    if runs.len() < 59 {
        return None;
    }
    for start in 0..runs.len() - 58 {
        if !runs[start].0 {
            continue;
        }
        if let Some(code) = decode_at(&runs[start..start + 59]) {
            return Some(code);
        }
    }
    None
}

/// Run-length encode a row around its mid-threshold. `(dark, width)` per
/// run. Rows without usable contrast yield nothing.
fn binarize_runs(row: &[u8]) -> Option<Vec<(bool, usize)>> {
    let min = *row.iter().min()?;
    let max = *row.iter().max()?;
    if max.saturating_sub(min) < 32 {
        return None;
    }
    let threshold = min as u16 + (max as u16 - min as u16) / 2;
    let mut runs: Vec<(bool, usize)> = Vec::new();
    for &px in row {
        let dark = (px as u16) < threshold;
        match runs.last_mut() {
            Some((d, w)) if *d == dark => *w += 1,
            _ => runs.push((dark, 1)),
        }
    }
    Some(runs)
}

fn decode_at(runs: &[(bool, usize)]) -> Option<String> {
    // Start guard: three single-module runs, dark-light-dark.
    let module = guard_module(&runs[0..3])?;

    let mut digits = Vec::with_capacity(13);
    let mut parity = [false; 6];
    for i in 0..6 {
        let group = &runs[3 + i * 4..3 + i * 4 + 4];
        let (digit, even) = match_left(group)?;
        digits.push(digit);
        parity[i] = even;
    }

    // Middle guard: five single-module runs starting light.
    let mid = &runs[27..32];
    if mid[0].0 || !plausible_guard(mid, module) {
        return None;
    }

    for i in 0..6 {
        let group = &runs[32 + i * 4..32 + i * 4 + 4];
        if !group[0].0 {
            return None;
        }
        digits.push(match_widths(group)?);
    }

    let end = &runs[56..59];
    if !end[0].0 || !plausible_guard(end, module) {
        return None;
    }

    let first = PARITY.iter().position(|p| *p == parity)? as u8;
    let mut code = String::with_capacity(13);
    code.push((b'0' + first) as char);
    for d in digits {
        code.push((b'0' + d) as char);
    }
    if crate::barcode::validator::check_digit_valid(&code) {
        Some(code)
    } else {
        None
    }
}

/// Average module width of a guard whose runs are all close to one module.
fn guard_module(runs: &[(bool, usize)]) -> Option<f32> {
    let widths: Vec<usize> = runs.iter().map(|(_, w)| *w).collect();
    let min = *widths.iter().min()?;
    let max = *widths.iter().max()?;
    if max > min * 2 {
        return None;
    }
    Some(widths.iter().sum::<usize>() as f32 / widths.len() as f32)
}

fn plausible_guard(runs: &[(bool, usize)], module: f32) -> bool {
    runs.iter()
        .all(|(_, w)| (*w as f32) > module * 0.3 && (*w as f32) < module * 2.5)
}

/// Normalize a 4-run digit group to module counts summing to 7.
fn group_modules(group: &[(bool, usize)]) -> Option<[u8; 4]> {
    let total: usize = group.iter().map(|(_, w)| *w).sum();
    if total == 0 {
        return None;
    }
    let mut modules = [0u8; 4];
    let mut fractions = [0f32; 4];
    let mut sum = 0i32;
    for (i, (_, w)) in group.iter().enumerate() {
        let exact = *w as f32 * 7.0 / total as f32;
        let rounded = exact.round().clamp(1.0, 4.0);
        modules[i] = rounded as u8;
        fractions[i] = exact - rounded;
        sum += rounded as i32;
    }
    // Push the worst-rounded entry up or down until the group sums to 7.
    while sum != 7 {
        let adjust = if sum < 7 { 1i8 } else { -1i8 };
        let idx = (0..4).max_by(|&a, &b| {
            let fa = fractions[a] * adjust as f32;
            let fb = fractions[b] * adjust as f32;
            fa.partial_cmp(&fb).unwrap_or(std::cmp::Ordering::Equal)
        })?;
        let next = modules[idx] as i8 + adjust;
        if !(1..=4).contains(&next) {
            return None;
        }
        modules[idx] = next as u8;
        fractions[idx] -= adjust as f32;
        sum += adjust as i32;
    }
    Some(modules)
}

/// Match a left-half digit group against the L (odd) and G (even) tables.
/// Left digits always start with a light run.
fn match_left(group: &[(bool, usize)]) -> Option<(u8, bool)> {
    if group[0].0 {
        return None;
    }
    let modules = group_modules(group)?;
    for (digit, widths) in L_WIDTHS.iter().enumerate() {
        if modules == *widths {
            return Some((digit as u8, false));
        }
        let mut reversed = *widths;
        reversed.reverse();
        if modules == reversed {
            return Some((digit as u8, true));
        }
    }
    None
}

/// Match a right-half digit group; right patterns share the L widths.
fn match_widths(group: &[(bool, usize)]) -> Option<u8> {
    let modules = group_modules(group)?;
    L_WIDTHS
        .iter()
        .position(|widths| modules == *widths)
        .map(|d| d as u8)
}

#[cfg(test)]
pub(crate) fn synthesize_ideal_row(code: &str, unit: usize) -> Vec<u8> {
    let digits: Vec<u8> = code.bytes().map(|b| b - b'0').collect();
    assert_eq!(digits.len(), 13, "synthesize expects a full EAN-13");

    const L_BITS: [&str; 10] = [
        "0001101", "0011001", "0010011", "0111101", "0100011", "0110001", "0101111", "0111011",
        "0110111", "0001011",
    ];
    let g_bits = |d: usize| -> String { L_BITS[d].chars().rev().map(|c| if c == '0' { '1' } else { '0' }).collect() };
    let r_bits = |d: usize| -> String { L_BITS[d].chars().map(|c| if c == '0' { '1' } else { '0' }).collect() };

    let mut bits = String::new();
    bits.push_str("101");
    let parity = PARITY[digits[0] as usize];
    for i in 0..6 {
        let d = digits[1 + i] as usize;
        if parity[i] {
            bits.push_str(&g_bits(d));
        } else {
            bits.push_str(L_BITS[d]);
        }
    }
    bits.push_str("01010");
    for i in 0..6 {
        bits.push_str(&r_bits(digits[7 + i] as usize));
    }
    bits.push_str("101");

    let quiet = 10 * unit;
    let mut row = vec![255u8; quiet];
    for bit in bits.chars() {
        let px = if bit == '1' { 0u8 } else { 255u8 };
        row.extend(std::iter::repeat(px).take(unit));
    }
    row.extend(std::iter::repeat(255u8).take(quiet));
    row
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_synthetic_ean13_row() {
        let row = synthesize_ideal_row("5901234123457", 2);
        assert_eq!(decode_row(&row), Some("5901234123457".to_string()));
    }

    #[test]
    fn decodes_from_encoded_image() {
        let row = synthesize_ideal_row("7750243123457", 2);
        let width = row.len() as u32;
        let mut img = image::GrayImage::new(width, 40);
        for y in 0..40 {
            for (x, &px) in row.iter().enumerate() {
                img.put_pixel(x as u32, y, image::Luma([px]));
            }
        }
        let mut bytes = std::io::Cursor::new(Vec::new());
        image::DynamicImage::ImageLuma8(img)
            .write_to(&mut bytes, image::ImageOutputFormat::Png)
            .unwrap();
        let codes = decode(bytes.get_ref()).unwrap();
        assert_eq!(codes, vec!["7750243123457".to_string()]);
    }

    #[test]
    fn mirrored_rows_decode_through_the_reverse_pass() {
        let row = synthesize_ideal_row("5901234123457", 3);
        let mirrored: Vec<u8> = row.iter().rev().copied().collect();
        assert_eq!(decode_row(&mirrored), None);
        let back: Vec<u8> = mirrored.iter().rev().copied().collect();
        assert_eq!(decode_row(&back), Some("5901234123457".to_string()));
    }

    #[test]
    fn flat_rows_decode_to_nothing() {
        let row = vec![200u8; 600];
        assert_eq!(decode_row(&row), None);
    }

    #[test]
    fn corrupted_check_digit_is_rejected() {
        // Valid bar pattern for ...7, synthesized with the wrong final
        // digit's pattern, must not survive the checksum gate.
        let mut code_digits = String::from("590123412345");
        code_digits.push('9');
        let row = synthesize_ideal_row(&code_digits, 2);
        assert_eq!(decode_row(&row), None);
    }

    #[test]
    fn rejects_low_contrast_rows() {
        let row: Vec<u8> = (0..600).map(|i| 120 + (i % 8) as u8).collect();
        assert_eq!(binarize_runs(&row), None);
    }
}
