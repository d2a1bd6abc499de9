// test_utils.rs - Synthetic ABIF files and traces shared by the unit tests

use std::collections::HashMap;

use crate::abif::HEADER_SIZE;

struct PendingEntry {
    name: [u8; 4],
    number: i32,
    element_type: i16,
    element_size: i16,
    num_elements: i32,
    payload: Vec<u8>,
}

/// Builds a minimal but well-formed ABIF file: header, data blocks, then
/// the directory at the end.
pub struct AbifBuilder {
    version: u16,
    entries: Vec<PendingEntry>,
    offset_overrides: HashMap<usize, i32>,
}

fn tag_name(name: &str) -> [u8; 4] {
    let mut out = [b' '; 4];
    for (slot, byte) in out.iter_mut().zip(name.bytes()) {
        *slot = byte;
    }
    out
}

impl AbifBuilder {
    pub fn new() -> Self {
        Self {
            version: 101,
            entries: Vec::new(),
            offset_overrides: HashMap::new(),
        }
    }

    fn push(
        mut self,
        name: &str,
        number: i32,
        element_type: i16,
        element_size: i16,
        num_elements: i32,
        payload: Vec<u8>,
    ) -> Self {
        self.entries.push(PendingEntry {
            name: tag_name(name),
            number,
            element_type,
            element_size,
            num_elements,
            payload,
        });
        self
    }

    /// `DATA<number>` as 16-bit shorts (values clamped to i16)
    pub fn trace(self, number: i32, samples: &[i32]) -> Self {
        let payload = samples
            .iter()
            .flat_map(|&v| (v.clamp(i16::MIN as i32, i16::MAX as i32) as i16).to_be_bytes())
            .collect();
        self.push("DATA", number, 4, 2, samples.len() as i32, payload)
    }

    /// `DATA<number>` as 32-bit longs
    pub fn trace_i32(self, number: i32, samples: &[i32]) -> Self {
        let payload = samples.iter().flat_map(|v| v.to_be_bytes()).collect();
        self.push("DATA", number, 5, 4, samples.len() as i32, payload)
    }

    pub fn pstring(self, name: &str, number: i32, text: &str) -> Self {
        let mut payload = vec![text.len() as u8];
        payload.extend_from_slice(text.as_bytes());
        let len = payload.len() as i32;
        self.push(name, number, 18, 1, len, payload)
    }

    pub fn chars(self, name: &str, number: i32, text: &str) -> Self {
        let len = text.len() as i32;
        self.push(name, number, 2, 1, len, text.as_bytes().to_vec())
    }

    pub fn date(self, name: &str, number: i32, year: i16, month: u8, day: u8) -> Self {
        let mut payload = year.to_be_bytes().to_vec();
        payload.extend_from_slice(&[month, day]);
        self.push(name, number, 10, 4, 1, payload)
    }

    pub fn time(self, name: &str, number: i32, h: u8, m: u8, s: u8, hundredths: u8) -> Self {
        self.push(name, number, 11, 4, 1, vec![h, m, s, hundredths])
    }

    pub fn short(self, name: &str, number: i32, value: i16) -> Self {
        self.push(name, number, 4, 2, 1, value.to_be_bytes().to_vec())
    }

    /// Overwrite the data offset written for entry `index`
    pub fn corrupt_offset(&mut self, index: usize, offset: i32) {
        self.offset_overrides.insert(index, offset);
    }

    pub fn build(&self) -> Vec<u8> {
        let mut bytes = vec![0u8; HEADER_SIZE];
        bytes[0..4].copy_from_slice(b"ABIF");
        bytes[4..6].copy_from_slice(&self.version.to_be_bytes());

        let mut fields = Vec::with_capacity(self.entries.len());
        for entry in &self.entries {
            let data_field = if entry.payload.len() <= 4 {
                let mut inline = [0u8; 4];
                inline[..entry.payload.len()].copy_from_slice(&entry.payload);
                inline
            } else {
                let offset = bytes.len() as i32;
                bytes.extend_from_slice(&entry.payload);
                offset.to_be_bytes()
            };
            fields.push(data_field);
        }

        let dir_offset = bytes.len() as i32;
        for (index, (entry, data_field)) in self.entries.iter().zip(fields).enumerate() {
            bytes.extend_from_slice(&entry.name);
            bytes.extend_from_slice(&entry.number.to_be_bytes());
            bytes.extend_from_slice(&entry.element_type.to_be_bytes());
            bytes.extend_from_slice(&entry.element_size.to_be_bytes());
            bytes.extend_from_slice(&entry.num_elements.to_be_bytes());
            bytes.extend_from_slice(&(entry.payload.len() as i32).to_be_bytes());
            match self.offset_overrides.get(&index) {
                Some(offset) => bytes.extend_from_slice(&offset.to_be_bytes()),
                None => bytes.extend_from_slice(&data_field),
            }
            bytes.extend_from_slice(&0i32.to_be_bytes());
        }

        let count = self.entries.len() as i32;
        let mut root = Vec::with_capacity(28);
        root.extend_from_slice(b"tdir");
        root.extend_from_slice(&1i32.to_be_bytes());
        root.extend_from_slice(&1023i16.to_be_bytes());
        root.extend_from_slice(&28i16.to_be_bytes());
        root.extend_from_slice(&count.to_be_bytes());
        root.extend_from_slice(&(count * 28).to_be_bytes());
        root.extend_from_slice(&dir_offset.to_be_bytes());
        root.extend_from_slice(&0i32.to_be_bytes());
        bytes[6..34].copy_from_slice(&root);

        bytes
    }
}

/// Deterministic xorshift64* source with Box-Muller normals
pub struct Noise {
    state: u64,
}

impl Noise {
    pub fn new(seed: u64) -> Self {
        Self {
            state: seed.max(1),
        }
    }

    fn next_u64(&mut self) -> u64 {
        self.state ^= self.state >> 12;
        self.state ^= self.state << 25;
        self.state ^= self.state >> 27;
        self.state.wrapping_mul(0x2545_F491_4F6C_DD1D)
    }

    /// Uniform in (0, 1)
    pub fn uniform(&mut self) -> f64 {
        ((self.next_u64() >> 11) as f64 + 0.5) / (1u64 << 53) as f64
    }

    pub fn normal(&mut self) -> f64 {
        let u1 = self.uniform();
        let u2 = self.uniform();
        (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
    }
}

/// A gaussian peak: centre (scan), height above baseline, sigma (scans)
#[derive(Debug, Clone, Copy)]
pub struct GaussPeak {
    pub center: f64,
    pub height: f64,
    pub sigma: f64,
}

impl GaussPeak {
    pub fn new(center: f64, height: f64) -> Self {
        Self {
            center,
            height,
            sigma: 3.0,
        }
    }
}

/// Baseline plus gaussian noise plus the given peaks, rounded to integers
pub fn gaussian_trace(
    len: usize,
    peaks: &[GaussPeak],
    baseline: f64,
    noise_sd: f64,
    seed: u64,
) -> Vec<i32> {
    let mut noise = Noise::new(seed);
    (0..len)
        .map(|i| {
            let x = i as f64;
            let signal: f64 = peaks
                .iter()
                .map(|p| p.height * (-0.5 * ((x - p.center) / p.sigma).powi(2)).exp())
                .sum();
            (baseline + signal + noise_sd * noise.normal()).round() as i32
        })
        .collect()
}

/// Scan position of a fragment under `size = slope * scan + intercept`
pub fn scan_for_size(size_bp: f64, slope: f64, intercept: f64) -> f64 {
    (size_bp - intercept) / slope
}

/// Size-standard trace with one peak per ladder fragment
pub fn ladder_trace(len: usize, sizes: &[f64], slope: f64, intercept: f64, seed: u64) -> Vec<i32> {
    let peaks: Vec<GaussPeak> = sizes
        .iter()
        .map(|&s| GaussPeak::new(scan_for_size(s, slope, intercept), 1000.0))
        .collect();
    gaussian_trace(len, &peaks, 50.0, 3.0, seed)
}

/// Synthetic run: four analyte channels with peaks at the given sizes plus
/// a LIZ-500 size standard, mapped by `size = 0.1 * scan + 10`.
pub fn synthetic_run(sample: &str, analyte_sizes: &[(u8, f64, f64)]) -> Vec<u8> {
    const SLOPE: f64 = 0.1;
    const INTERCEPT: f64 = 10.0;
    const LEN: usize = 5200;

    let ladder = crate::data::SizeLadder::liz500();
    let mut builder = AbifBuilder::new()
        .pstring("SMPL", 1, sample)
        .pstring("DySN", 1, "G5")
        .date("RUND", 1, 2024, 3, 2);

    for channel in 1..=4u8 {
        let peaks: Vec<GaussPeak> = analyte_sizes
            .iter()
            .filter(|(ch, _, _)| *ch == channel)
            .map(|&(_, size, height)| GaussPeak::new(scan_for_size(size, SLOPE, INTERCEPT), height))
            .collect();
        let samples = gaussian_trace(LEN, &peaks, 50.0, 3.0, 17 + channel as u64);
        builder = builder.trace(channel as i32, &samples);
    }
    let std = ladder_trace(LEN, &ladder.sizes, SLOPE, INTERCEPT, 99);
    builder.trace(105, &std).build()
}
