//! Fill color spaces
//!
//! Resolves the color space named by `cs` and turns `sc`/`scn` operands into
//! an RGB color. Spot colors (Separation, DeviceN) go through their tint
//! transform into the alternate space. Tint transforms that cannot be
//! evaluated give black, so re-drawn text stays visible.

use lopdf::{Dictionary, Document, Object};
use log::debug;

use super::resources::{as_number, as_numbers, resolve, resource_category, stream_bytes};
use crate::geometry::Color;

/// Nested color spaces deeper than this are not followed
const MAX_DEPTH: usize = 8;

/// A resolved fill color space
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ColorSpace {
    #[default]
    Gray,
    Rgb,
    Cmyk,
    /// CIE L*a*b* with its white point
    Lab { white: [f32; 3] },
    Indexed {
        base: Box<ColorSpace>,
        hival: u32,
        lookup: Vec<u8>,
    },
    /// Separation (one colorant) and DeviceN
    Spot {
        colorants: usize,
        alternate: Box<ColorSpace>,
        tint: Option<TintTransform>,
    },
    Pattern,
}

impl ColorSpace {
    /// Number of operands `sc` takes in this space
    pub fn components(&self) -> usize {
        match self {
            ColorSpace::Gray | ColorSpace::Indexed { .. } => 1,
            ColorSpace::Rgb | ColorSpace::Lab { .. } => 3,
            ColorSpace::Cmyk => 4,
            ColorSpace::Spot { colorants, .. } => *colorants,
            ColorSpace::Pattern => 0,
        }
    }

    /// Color set by `cs` before any `sc`
    pub fn initial_color(&self) -> Color {
        match self {
            ColorSpace::Spot { colorants, .. } => self.color(&vec![1.0; *colorants]),
            ColorSpace::Indexed { .. } => self.color(&[0.0]),
            ColorSpace::Lab { .. } => self.color(&[0.0, 0.0, 0.0]),
            _ => Color::BLACK,
        }
    }

    /// Convert `sc`/`scn` operands to RGB
    pub fn color(&self, values: &[f32]) -> Color {
        let value = |i: usize| values.get(i).copied().unwrap_or(0.0);
        match self {
            ColorSpace::Gray => Color::gray(value(0)),
            ColorSpace::Rgb => Color::rgb(value(0), value(1), value(2)),
            ColorSpace::Cmyk => Color::cmyk(value(0), value(1), value(2), value(3)),
            ColorSpace::Lab { white } => lab_to_rgb(*white, value(0), value(1), value(2)),
            ColorSpace::Indexed { base, hival, lookup } => {
                let index = (value(0).max(0.0) as u32).min(*hival) as usize;
                let n = base.components();
                match lookup.get(index * n..index * n + n) {
                    Some(entry) => {
                        let components: Vec<f32> = entry.iter().map(|&b| b as f32 / 255.0).collect();
                        base.color(&components)
                    }
                    None => Color::BLACK,
                }
            }
            ColorSpace::Spot { alternate, tint, .. } => {
                let mapped = tint
                    .as_ref()
                    .and_then(|t| t.evaluate(values))
                    .filter(|out| out.len() >= alternate.components());
                match mapped {
                    Some(out) => alternate.color(&out),
                    None => Color::BLACK,
                }
            }
            ColorSpace::Pattern => Color::BLACK,
        }
    }
}

/// Tint transform of a spot color space
#[derive(Debug, Clone, PartialEq)]
pub enum TintTransform {
    /// Type 2: `C0 + t^N × (C1 − C0)`
    Exponential {
        domain: [f32; 2],
        c0: Vec<f32>,
        c1: Vec<f32>,
        exponent: f32,
    },
    /// Type 0 with one input, linearly interpolated
    Sampled {
        domain: [f32; 2],
        range: Vec<f32>,
        outputs: usize,
        /// Samples normalized to 0..=1, `outputs` values per sample
        samples: Vec<f32>,
    },
}

impl TintTransform {
    fn evaluate(&self, inputs: &[f32]) -> Option<Vec<f32>> {
        let [input] = inputs else { return None };
        match self {
            TintTransform::Exponential { domain, c0, c1, exponent } => {
                let t = input.clamp(domain[0], domain[1]);
                let factor = t.powf(*exponent);
                Some(c0.iter().zip(c1).map(|(a, b)| a + factor * (b - a)).collect())
            }
            TintTransform::Sampled { domain, range, outputs, samples } => {
                let count = samples.len() / outputs;
                if count == 0 || range.len() < outputs * 2 {
                    return None;
                }
                let span = (domain[1] - domain[0]).max(f32::EPSILON);
                let position = (input.clamp(domain[0], domain[1]) - domain[0]) / span
                    * (count - 1) as f32;
                let lo = position.floor() as usize;
                let hi = (lo + 1).min(count - 1);
                let frac = position - lo as f32;
                Some(
                    (0..*outputs)
                        .map(|o| {
                            let a = samples[lo * outputs + o];
                            let b = samples[hi * outputs + o];
                            let v = a + frac * (b - a);
                            range[o * 2] + v * (range[o * 2 + 1] - range[o * 2])
                        })
                        .collect(),
                )
            }
        }
    }

    fn load(doc: &Document, obj: &Object) -> Option<Self> {
        let (dict, stream) = match resolve(doc, obj) {
            Object::Dictionary(dict) => (dict, None),
            Object::Stream(stream) => (&stream.dict, Some(stream)),
            _ => return None,
        };
        let numbers = |key: &[u8]| dict.get(key).map(|o| as_numbers(doc, o)).unwrap_or_default();
        let domain = match numbers(b"Domain")[..] {
            [lo, hi, ..] => [lo, hi],
            _ => [0.0, 1.0],
        };

        match dict.get(b"FunctionType").ok().and_then(|o| as_number(doc, o)) {
            Some(t) if t == 2.0 => {
                let c0 = Some(numbers(b"C0")).filter(|v| !v.is_empty()).unwrap_or_else(|| vec![0.0]);
                let c1 = Some(numbers(b"C1")).filter(|v| !v.is_empty()).unwrap_or_else(|| vec![1.0]);
                let exponent = dict.get(b"N").ok().and_then(|o| as_number(doc, o)).unwrap_or(1.0);
                Some(TintTransform::Exponential { domain, c0, c1, exponent })
            }
            Some(t) if t == 0.0 => {
                let stream = stream?;
                let size = numbers(b"Size");
                let bits = dict.get(b"BitsPerSample").ok().and_then(|o| as_number(doc, o))? as u32;
                let range = numbers(b"Range");
                let outputs = range.len() / 2;
                if size.len() != 1 || outputs == 0 || !matches!(bits, 8 | 16) {
                    return None;
                }
                let data = stream_bytes(stream).ok()?;
                let max = ((1u32 << bits) - 1) as f32;
                let samples: Vec<f32> = if bits == 8 {
                    data.iter().map(|&b| b as f32 / max).collect()
                } else {
                    data.chunks_exact(2)
                        .map(|c| u16::from_be_bytes([c[0], c[1]]) as f32 / max)
                        .collect()
                };
                let needed = size[0] as usize * outputs;
                if samples.len() < needed {
                    return None;
                }
                Some(TintTransform::Sampled {
                    domain,
                    range,
                    outputs,
                    samples: samples[..needed].to_vec(),
                })
            }
            other => {
                debug!("Tint transform type {:?} not supported", other);
                None
            }
        }
    }
}

/// Color space for a `cs` operand: a device name or a `/ColorSpace` resource
pub fn lookup_color_space(doc: &Document, resources: &Dictionary, name: &[u8]) -> ColorSpace {
    if let Some(space) = device_space(name) {
        return space;
    }
    resource_category(doc, resources, b"ColorSpace")
        .and_then(|spaces| spaces.get(name).ok())
        .and_then(|obj| load_space(doc, obj, 0))
        .unwrap_or_else(|| {
            debug!("Unknown color space /{}", String::from_utf8_lossy(name));
            ColorSpace::Gray
        })
}

fn device_space(name: &[u8]) -> Option<ColorSpace> {
    match name {
        b"DeviceGray" | b"G" | b"CalGray" => Some(ColorSpace::Gray),
        b"DeviceRGB" | b"RGB" | b"CalRGB" => Some(ColorSpace::Rgb),
        b"DeviceCMYK" | b"CMYK" => Some(ColorSpace::Cmyk),
        b"Pattern" => Some(ColorSpace::Pattern),
        _ => None,
    }
}

fn load_space(doc: &Document, obj: &Object, depth: usize) -> Option<ColorSpace> {
    if depth > MAX_DEPTH {
        return None;
    }
    let items = match resolve(doc, obj) {
        Object::Name(name) => return device_space(name),
        Object::Array(items) => items,
        _ => return None,
    };
    let Some(Object::Name(family)) = items.first().map(|o| resolve(doc, o)) else {
        return None;
    };

    match family.as_slice() {
        b"ICCBased" => {
            let dict = match resolve(doc, items.get(1)?) {
                Object::Stream(stream) => &stream.dict,
                Object::Dictionary(dict) => dict,
                _ => return None,
            };
            if let Some(alternate) = dict.get(b"Alternate").ok().and_then(|a| load_space(doc, a, depth + 1)) {
                return Some(alternate);
            }
            match dict.get(b"N").ok().and_then(|n| as_number(doc, n)) {
                Some(n) if n == 1.0 => Some(ColorSpace::Gray),
                Some(n) if n == 4.0 => Some(ColorSpace::Cmyk),
                _ => Some(ColorSpace::Rgb),
            }
        }
        b"Indexed" | b"I" => {
            let base = load_space(doc, items.get(1)?, depth + 1)?;
            let hival = as_number(doc, items.get(2)?)?.max(0.0) as u32;
            let lookup = match resolve(doc, items.get(3)?) {
                Object::String(bytes, _) => bytes.clone(),
                Object::Stream(stream) => stream_bytes(stream).ok()?,
                _ => return None,
            };
            Some(ColorSpace::Indexed { base: Box::new(base), hival, lookup })
        }
        b"Separation" | b"DeviceN" => {
            let colorants = match resolve(doc, items.get(1)?) {
                Object::Array(names) => names.len(),
                _ => 1,
            };
            let alternate = load_space(doc, items.get(2)?, depth + 1)?;
            let tint = items.get(3).and_then(|f| TintTransform::load(doc, f));
            Some(ColorSpace::Spot { colorants, alternate: Box::new(alternate), tint })
        }
        b"Lab" => {
            let white = items
                .get(1)
                .and_then(|d| match resolve(doc, d) {
                    Object::Dictionary(dict) => dict.get(b"WhitePoint").ok(),
                    _ => None,
                })
                .map(|w| as_numbers(doc, w))
                .and_then(|w| match w[..] {
                    [x, y, z] => Some([x, y, z]),
                    _ => None,
                })
                .unwrap_or([0.9505, 1.0, 1.089]);
            Some(ColorSpace::Lab { white })
        }
        b"Pattern" => Some(ColorSpace::Pattern),
        other => device_space(other),
    }
}

/// CIE L*a*b* to sRGB, without chromatic adaptation
fn lab_to_rgb(white: [f32; 3], l: f32, a: f32, b: f32) -> Color {
    let fy = (l + 16.0) / 116.0;
    let fx = fy + a / 500.0;
    let fz = fy - b / 200.0;
    let g = |f: f32| {
        if f > 6.0 / 29.0 {
            f * f * f
        } else {
            3.0 * (6.0 / 29.0f32).powi(2) * (f - 4.0 / 29.0)
        }
    };
    let (x, y, z) = (white[0] * g(fx), white[1] * g(fy), white[2] * g(fz));

    let linear = [
        3.2406 * x - 1.5372 * y - 0.4986 * z,
        -0.9689 * x + 1.8758 * y + 0.0415 * z,
        0.0557 * x - 0.2040 * y + 1.0570 * z,
    ];
    let gamma = |c: f32| {
        let c = c.clamp(0.0, 1.0);
        if c <= 0.003_130_8 {
            12.92 * c
        } else {
            1.055 * c.powf(1.0 / 2.4) - 0.055
        }
    };
    Color::rgb(gamma(linear[0]), gamma(linear[1]), gamma(linear[2]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{dictionary, Stream};

    fn resources_with(doc: &mut Document, name: &str, space: Object) -> Dictionary {
        let id = doc.add_object(space);
        dictionary! { "ColorSpace" => dictionary! { name => id } }
    }

    fn separation(alternate: &str, tint: Object) -> Object {
        Object::Array(vec![
            Object::Name(b"Separation".to_vec()),
            Object::Name(b"Black".to_vec()),
            Object::Name(alternate.as_bytes().to_vec()),
            tint,
        ])
    }

    #[test]
    fn test_device_names() {
        let doc = Document::with_version("1.5");
        let resources = Dictionary::new();
        assert_eq!(lookup_color_space(&doc, &resources, b"DeviceRGB"), ColorSpace::Rgb);
        assert_eq!(lookup_color_space(&doc, &resources, b"DeviceCMYK"), ColorSpace::Cmyk);
        assert_eq!(lookup_color_space(&doc, &resources, b"Missing"), ColorSpace::Gray);
    }

    #[test]
    fn test_separation_with_exponential_tint() {
        let mut doc = Document::with_version("1.5");
        let tint = Object::Dictionary(dictionary! {
            "FunctionType" => 2,
            "Domain" => vec![0.into(), 1.into()],
            "C0" => vec![0.into(), 0.into(), 0.into(), 0.into()],
            "C1" => vec![0.into(), 0.into(), 0.into(), 1.into()],
            "N" => 1,
        });
        let resources = resources_with(&mut doc, "CS0", separation("DeviceCMYK", tint));
        let space = lookup_color_space(&doc, &resources, b"CS0");
        assert_eq!(space.components(), 1);
        // Full tint of a black spot is black, not white
        assert_eq!(space.color(&[1.0]).to_srgb(), 0x000000);
        assert_eq!(space.initial_color().to_srgb(), 0x000000);
        assert_eq!(space.color(&[0.5]).to_srgb(), 0x808080);
        assert_eq!(space.color(&[0.0]).to_srgb(), 0xFFFFFF);
    }

    #[test]
    fn test_unsupported_tint_is_black() {
        let mut doc = Document::with_version("1.5");
        let calculator = Stream::new(
            dictionary! {
                "FunctionType" => 4,
                "Domain" => vec![0.into(), 1.into()],
                "Range" => vec![0.into(), 1.into(), 0.into(), 1.into(), 0.into(), 1.into()],
            },
            b"{ dup dup }".to_vec(),
        );
        let tint = Object::Reference(doc.add_object(calculator));
        let resources = resources_with(&mut doc, "CS0", separation("DeviceRGB", tint));
        let space = lookup_color_space(&doc, &resources, b"CS0");
        assert_eq!(space.color(&[1.0]).to_srgb(), 0x000000);
        assert_eq!(space.color(&[0.2]).to_srgb(), 0x000000);
    }

    #[test]
    fn test_sampled_tint() {
        let mut doc = Document::with_version("1.5");
        // Two samples: tint 0 -> white, tint 1 -> pure red
        let sampled = Stream::new(
            dictionary! {
                "FunctionType" => 0,
                "Domain" => vec![0.into(), 1.into()],
                "Range" => vec![0.into(), 1.into(), 0.into(), 1.into(), 0.into(), 1.into()],
                "Size" => vec![2.into()],
                "BitsPerSample" => 8,
            },
            vec![255, 255, 255, 255, 0, 0],
        );
        let tint = Object::Reference(doc.add_object(sampled));
        let resources = resources_with(&mut doc, "Red", separation("DeviceRGB", tint));
        let space = lookup_color_space(&doc, &resources, b"Red");
        assert_eq!(space.color(&[1.0]).to_srgb(), 0xFF0000);
        assert_eq!(space.color(&[0.0]).to_srgb(), 0xFFFFFF);
    }

    #[test]
    fn test_indexed() {
        let mut doc = Document::with_version("1.5");
        let indexed = Object::Array(vec![
            Object::Name(b"Indexed".to_vec()),
            Object::Name(b"DeviceRGB".to_vec()),
            Object::Integer(1),
            Object::String(vec![0, 0, 255, 0, 128, 0], lopdf::StringFormat::Hexadecimal),
        ]);
        let resources = resources_with(&mut doc, "Pal", indexed);
        let space = lookup_color_space(&doc, &resources, b"Pal");
        assert_eq!(space.color(&[0.0]).to_srgb(), 0x0000FF);
        assert_eq!(space.color(&[1.0]).to_srgb(), 0x008000);
        // Out of range indexes are clamped to hival
        assert_eq!(space.color(&[7.0]).to_srgb(), 0x008000);
    }

    #[test]
    fn test_icc_based_uses_component_count() {
        let mut doc = Document::with_version("1.5");
        let profile = doc.add_object(Stream::new(dictionary! { "N" => 4 }, Vec::new()));
        let icc = Object::Array(vec![Object::Name(b"ICCBased".to_vec()), Object::Reference(profile)]);
        let resources = resources_with(&mut doc, "ICC", icc);
        assert_eq!(lookup_color_space(&doc, &resources, b"ICC"), ColorSpace::Cmyk);
    }

    #[test]
    fn test_lab_extremes() {
        let white = ColorSpace::Lab { white: [0.9505, 1.0, 1.089] };
        assert_eq!(white.color(&[100.0, 0.0, 0.0]).to_srgb(), 0xFFFFFF);
        assert_eq!(white.color(&[0.0, 0.0, 0.0]).to_srgb(), 0x000000);
    }
}
