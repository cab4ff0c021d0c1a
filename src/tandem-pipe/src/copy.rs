use std::io::{self, Read, Write};

use crate::CHUNK_SIZE;

/// Moves everything from `reader` into `writer` through `buf` and
/// flushes `writer` at the end.
///
/// Every chunk is written with exactly the length of the preceding
/// read, which may be shorter than `buf`. Returns the number of bytes
/// moved, or the first error together with the count reached so far.
pub fn pump<R, W>(reader: &mut R, writer: &mut W, buf: &mut [u8]) -> Result<u64, (io::Error, u64)>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
{
    let mut total = 0;
    loop {
        let n = match reader.read(buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err((e, total)),
        };

        writer.write_all(&buf[..n]).map_err(|e| (e, total))?;
        total += n as u64;
    }

    writer.flush().map_err(|e| (e, total))?;
    Ok(total)
}

/// Copies all bytes from `source` to `sink` on the current thread.
///
/// Both streams are consumed and closed when this returns.
pub fn copy_sequential<R, W>(mut source: R, mut sink: W) -> io::Result<u64>
where
    R: Read,
    W: Write,
{
    let mut buf = vec![0; CHUNK_SIZE];
    let total = pump(&mut source, &mut sink, &mut buf).map_err(|(e, _)| e)?;

    log::debug!("Copied {total} bytes sequentially");
    Ok(total)
}
