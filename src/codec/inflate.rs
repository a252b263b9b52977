//! STORE passthrough and streaming raw-DEFLATE inflation.
//!
//! ZIP payloads use raw DEFLATE streams, not zlib or gzip wrapped, so
//! the decompressor runs without header detection.

use flate2::{Decompress, FlushDecompress, Status};

use crate::error::Result;

const OUTPUT_RESERVE: usize = 32 * 1024;

pub(crate) enum Inflater {
    Stored,
    Deflate(Box<Decompress>),
}

impl Inflater {
    pub fn new(compressed: bool) -> Self {
        if compressed {
            Inflater::Deflate(Box::new(Decompress::new(false)))
        } else {
            Inflater::Stored
        }
    }

    /// Decode the next compressed chunk. Output may be empty while the
    /// decompressor buffers a partial block.
    pub fn feed(&mut self, input: &[u8]) -> Result<Vec<u8>> {
        match self {
            Inflater::Stored => Ok(input.to_vec()),
            Inflater::Deflate(d) => inflate_chunk(d, input, false),
        }
    }

    /// Signal end of input and drain whatever remains buffered.
    pub fn finish(&mut self) -> Result<Vec<u8>> {
        match self {
            Inflater::Stored => Ok(Vec::new()),
            Inflater::Deflate(d) => inflate_chunk(d, &[], true),
        }
    }
}

fn inflate_chunk(d: &mut Decompress, mut input: &[u8], finish: bool) -> Result<Vec<u8>> {
    let flush = if finish {
        FlushDecompress::Finish
    } else {
        FlushDecompress::None
    };

    let mut out = Vec::with_capacity(input.len().saturating_mul(2).max(OUTPUT_RESERVE));
    let mut stalled = false;

    loop {
        if out.capacity() - out.len() < 1024 {
            out.reserve(OUTPUT_RESERVE);
        }

        let before_in = d.total_in();
        let before_out = d.total_out();
        let status = d.decompress_vec(input, &mut out, flush)?;
        let consumed = (d.total_in() - before_in) as usize;
        let progressed = consumed > 0 || d.total_out() > before_out;
        input = &input[consumed..];

        match status {
            Status::StreamEnd => break,
            Status::Ok | Status::BufError => {
                if input.is_empty() && !finish {
                    break;
                }
                // Two consecutive zero-progress rounds mean the stream
                // ended at an earlier chunk boundary or is truncated;
                // either way there is nothing more to produce.
                if !progressed {
                    if stalled {
                        break;
                    }
                    stalled = true;
                } else {
                    stalled = false;
                }
            }
        }
    }

    Ok(out)
}
