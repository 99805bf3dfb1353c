//! Chunked region reads with a reusable buffer
//!
//! Each chunk owns the candidate offsets `[0, owned)` relative to its base and
//! carries up to `overlap` extra bytes so a value starting near the end of the
//! owned span can still be tested in full. Consecutive chunks therefore never
//! test the same offset twice and never miss one.

use crate::core::types::Address;
use crate::memory::regions::RegionInfo;
use crate::process::ProcessMemory;
use std::ops::ControlFlow;
use tracing::debug;

/// One read from a region
#[derive(Debug)]
pub struct Chunk<'b> {
    pub base: Address,
    pub data: &'b [u8],
    /// Bytes of `data` whose offsets belong to this chunk
    pub owned: usize,
}

impl<'b> Chunk<'b> {
    /// Candidate offsets at `stride`, each with at least `min_len` readable bytes
    pub fn candidates(&self, stride: usize, min_len: usize) -> impl Iterator<Item = usize> + '_ {
        let data_len = self.data.len();
        (0..self.owned)
            .step_by(stride.max(1))
            .take_while(move |&offset| offset + min_len <= data_len)
    }

    pub fn window(&self, offset: usize) -> &'b [u8] {
        &self.data[offset..]
    }
}

/// Reads regions step by step into one buffer that is grown on demand
#[derive(Debug)]
pub struct ChunkReader {
    buffer: Vec<u8>,
    step: usize,
    overlap: usize,
}

impl ChunkReader {
    /// `step` is rounded down to a multiple of 8 so every element stride
    /// stays aligned to the region base across chunks.
    pub fn new(step: usize, overlap: usize) -> Self {
        ChunkReader {
            buffer: Vec::new(),
            step: (step & !7).max(8),
            overlap,
        }
    }

    pub fn step(&self) -> usize {
        self.step
    }

    /// Visits every chunk of `region` in ascending order.
    ///
    /// A short read shrinks the chunk to what arrived and the next read
    /// resumes right after it. A failed or empty read ends the region
    /// quietly. Returns the bytes of the region that were visited, or
    /// `Break` when `visit` breaks.
    pub fn for_each<P, F>(
        &mut self,
        process: &P,
        region: &RegionInfo,
        mut visit: F,
    ) -> ControlFlow<(), usize>
    where
        P: ProcessMemory + ?Sized,
        F: FnMut(Chunk<'_>) -> ControlFlow<()>,
    {
        let mut offset = 0usize;
        while offset < region.size {
            let remaining = region.size - offset;
            let want = remaining.min(self.step + self.overlap);
            if self.buffer.len() < want {
                self.buffer.resize(want, 0);
            }

            let base = region.base_address.add(offset);
            let read = match process.read(base, &mut self.buffer[..want]) {
                Ok(0) => {
                    debug!(address = %base, "Empty read, abandoning region");
                    break;
                }
                Ok(n) => n.min(want),
                Err(e) => {
                    debug!(address = %base, error = %e, "Chunk read failed, abandoning region");
                    break;
                }
            };

            let (owned, advance) = if read == want {
                let owned = self.step.min(remaining);
                (owned, owned)
            } else {
                let owned = self.short_owned(read);
                debug!(address = %base, read, wanted = want, owned, "Short chunk read");
                (owned, owned)
            };

            let chunk = Chunk {
                base,
                data: &self.buffer[..read],
                owned,
            };
            visit(chunk)?;
            offset += advance;
        }
        ControlFlow::Continue(offset.min(region.size))
    }

    /// Offsets a short read can own while every owned window stays complete.
    ///
    /// Kept a multiple of 8 so later chunks stay aligned to the region base;
    /// a read too short for that owns everything it got.
    fn short_owned(&self, read: usize) -> usize {
        match read.saturating_sub(self.overlap) & !7 {
            0 => read,
            owned => owned,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::MemoryResult;
    use crate::memory::regions::ProtectionFlags;
    use crate::process::SimulatedProcess;

    fn region_of(process: &SimulatedProcess, base: usize) -> RegionInfo {
        process.query_region(Address::new(base)).unwrap().unwrap()
    }

    #[test]
    fn test_candidates_respect_window() {
        let data = [0u8; 10];
        let chunk = Chunk {
            base: Address::new(0),
            data: &data,
            owned: 8,
        };
        let offsets: Vec<_> = chunk.candidates(4, 4).collect();
        assert_eq!(offsets, vec![0, 4]);
        let offsets: Vec<_> = chunk.candidates(1, 4).collect();
        assert_eq!(offsets, (0..7).collect::<Vec<_>>());
    }

    #[test]
    fn test_chunks_cover_region_once() {
        let process = SimulatedProcess::new(1);
        process.add_region(Address::new(0x10000), 0x3000, ProtectionFlags::read_write());
        let region = region_of(&process, 0x10000);

        let mut reader = ChunkReader::new(0x1000, 3);
        let mut owned_total = 0;
        let mut bases = Vec::new();
        let flow = reader.for_each(&process, &region, |chunk| {
            owned_total += chunk.owned;
            bases.push(chunk.base.as_usize());
            ControlFlow::Continue(())
        });
        assert_eq!(flow, ControlFlow::Continue(0x3000));
        assert_eq!(owned_total, 0x3000);
        assert_eq!(bases, vec![0x10000, 0x11000, 0x12000]);
    }

    #[test]
    fn test_overlap_reaches_into_next_chunk() {
        let process = SimulatedProcess::new(1);
        process.add_region(Address::new(0x10000), 0x2000, ProtectionFlags::read_write());
        process.poke(Address::new(0x10FFE), &[0xAA, 0xBB, 0xCC, 0xDD]).unwrap();
        let region = region_of(&process, 0x10000);

        let mut reader = ChunkReader::new(0x1000, 3);
        let mut seen = None;
        let _ = reader.for_each(&process, &region, |chunk| {
            if seen.is_none() {
                seen = Some(chunk.data[0xFFE..0x1002].to_vec());
            }
            ControlFlow::Break(())
        });
        assert_eq!(seen, Some(vec![0xAA, 0xBB, 0xCC, 0xDD]));
    }

    #[test]
    fn test_unreadable_region_ends_quietly() {
        let process = SimulatedProcess::new(1);
        process.add_region(Address::new(0x10000), 0x1000, ProtectionFlags::no_access());
        let region = region_of(&process, 0x10000);

        let mut reader = ChunkReader::new(0x1000, 0);
        let mut visited = 0;
        let flow = reader.for_each(&process, &region, |_| {
            visited += 1;
            ControlFlow::Continue(())
        });
        assert_eq!(flow, ControlFlow::Continue(0));
        assert_eq!(visited, 0);
    }

    /// Hands back at most `cap` bytes per read
    struct ShortReads {
        inner: SimulatedProcess,
        cap: usize,
    }

    impl ProcessMemory for ShortReads {
        fn pid(&self) -> u32 {
            self.inner.pid()
        }

        fn query_region(&self, address: Address) -> MemoryResult<Option<RegionInfo>> {
            self.inner.query_region(address)
        }

        fn read(&self, address: Address, buffer: &mut [u8]) -> MemoryResult<usize> {
            let len = buffer.len().min(self.cap);
            self.inner.read(address, &mut buffer[..len])
        }

        fn write(&self, address: Address, data: &[u8]) -> MemoryResult<usize> {
            self.inner.write(address, data)
        }

        fn protect(
            &self,
            address: Address,
            size: usize,
            protection: ProtectionFlags,
        ) -> MemoryResult<ProtectionFlags> {
            self.inner.protect(address, size, protection)
        }
    }

    #[test]
    fn test_short_reads_resume_where_they_stopped() {
        let inner = SimulatedProcess::new(1);
        inner.add_region(Address::new(0x10000), 0x2000, ProtectionFlags::read_write());
        inner.poke(Address::new(0x10900), &5i32.to_le_bytes()).unwrap();
        let region = region_of(&inner, 0x10000);
        let process = ShortReads { inner, cap: 0x800 };

        let mut reader = ChunkReader::new(0x1000, 7);
        let mut owned_total = 0;
        let mut found = Vec::new();
        let flow = reader.for_each(&process, &region, |chunk| {
            for offset in chunk.candidates(4, 4) {
                if chunk.window(offset)[..4] == 5i32.to_le_bytes() {
                    found.push(chunk.base.add(offset).as_usize());
                }
            }
            assert_eq!(chunk.base.as_usize() % 8, 0);
            owned_total += chunk.owned;
            ControlFlow::Continue(())
        });

        assert_eq!(flow, ControlFlow::Continue(0x2000));
        assert_eq!(owned_total, 0x2000);
        assert_eq!(found, vec![0x10900]);
    }

    #[test]
    fn test_short_read_keeps_straddling_value() {
        let inner = SimulatedProcess::new(1);
        inner.add_region(Address::new(0x10000), 0x1000, ProtectionFlags::read_write());
        // Starts two bytes before the first short read ends
        inner.poke(Address::new(0x107FE), &9i32.to_le_bytes()).unwrap();
        let region = region_of(&inner, 0x10000);
        let process = ShortReads { inner, cap: 0x800 };

        let mut reader = ChunkReader::new(0x1000, 7);
        let mut hits = 0;
        let _ = reader.for_each(&process, &region, |chunk| {
            hits += chunk
                .candidates(2, 4)
                .filter(|&o| chunk.window(o)[..4] == 9i32.to_le_bytes())
                .count();
            ControlFlow::Continue(())
        });
        assert_eq!(hits, 1);
    }
}
