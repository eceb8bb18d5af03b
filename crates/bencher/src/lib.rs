//! Response fixtures shared by the benchmarks.

/// A raw response captured as it arrives on the wire.
#[derive(Debug, Copy, Clone)]
pub struct ResponseFixture {
    name: &'static str,
    size: FixtureSize,
    raw: &'static [u8],
}

impl ResponseFixture {
    pub const fn new(name: &'static str, size: FixtureSize, raw: &'static [u8]) -> Self {
        Self { name, size, raw }
    }

    pub const fn small(name: &'static str, raw: &'static [u8]) -> Self {
        Self::new(name, FixtureSize::Small, raw)
    }

    pub const fn large(name: &'static str, raw: &'static [u8]) -> Self {
        Self::new(name, FixtureSize::Large, raw)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn size(&self) -> FixtureSize {
        self.size
    }

    pub fn raw(&self) -> &'static [u8] {
        self.raw
    }

    /// Bytes on the wire, for throughput reporting.
    pub fn len(&self) -> u64 {
        self.raw.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Offset of the first body byte, just past the blank line ending the head.
    pub fn body_offset(&self) -> usize {
        self.raw.windows(4).position(|window| window == b"\r\n\r\n").map_or(self.raw.len(), |index| index + 4)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FixtureSize {
    Small,
    Large,
}
