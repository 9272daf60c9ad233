//! `Read + Seek` adapter

use super::ByteSource;
use crate::error::{Error, Result};
use std::fs::File;
use std::io::{BufReader, Cursor, ErrorKind, Read, Seek, SeekFrom};
use std::path::Path;

/// Byte source over any `Read + Seek` stream with a known length
pub struct ReadSeekSource<R: Read + Seek> {
    reader: R,
    pos: u64,
    size: u64,
    eof: bool,
    bad: bool,
}

impl<R: Read + Seek> ReadSeekSource<R> {
    /// Wrap a reader, measuring its length and rewinding it to the start
    pub fn new(mut reader: R) -> Result<Self> {
        let size = reader.seek(SeekFrom::End(0))?;
        reader.seek(SeekFrom::Start(0))?;
        Ok(ReadSeekSource {
            reader,
            pos: 0,
            size,
            eof: false,
            bad: false,
        })
    }

    /// Give back the wrapped reader
    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl ReadSeekSource<Cursor<Vec<u8>>> {
    /// Byte source over an in-memory buffer
    pub fn from_bytes(data: Vec<u8>) -> Self {
        let size = data.len() as u64;
        ReadSeekSource {
            reader: Cursor::new(data),
            pos: 0,
            size,
            eof: false,
            bad: false,
        }
    }
}

impl ReadSeekSource<BufReader<File>> {
    /// Open a file for reading
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Self::new(BufReader::new(file))
    }
}

impl<R: Read + Seek + Send> ByteSource for ReadSeekSource<R> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.reader.read(&mut buf[filled..]) {
                Ok(0) => {
                    self.eof = true;
                    break;
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.bad = true;
                    self.pos += filled as u64;
                    return Err(Error::Io(e));
                }
            }
        }
        self.pos += filled as u64;
        Ok(filled)
    }

    fn seek(&mut self, pos: u64) -> Result<()> {
        if pos > self.size {
            return Err(Error::EndOfStream);
        }
        match self.reader.seek(SeekFrom::Start(pos)) {
            Ok(p) => {
                self.pos = p;
                self.eof = false;
                Ok(())
            }
            Err(e) => {
                self.bad = true;
                Err(Error::Io(e))
            }
        }
    }

    fn tell(&self) -> u64 {
        self.pos
    }

    fn eof(&self) -> bool {
        self.eof
    }

    fn bad(&self) -> bool {
        self.bad
    }

    fn size(&self) -> Option<u64> {
        Some(self.size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_read_sets_eof() {
        let mut src = ReadSeekSource::from_bytes(vec![1, 2, 3, 4, 5]);
        let mut buf = [0u8; 8];
        assert_eq!(src.read(&mut buf).unwrap(), 5);
        assert!(src.eof());
        assert_eq!(src.tell(), 5);
        assert_eq!(&buf[..5], &[1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_seek_and_read_byte() {
        let mut src = ReadSeekSource::from_bytes(vec![10, 20, 30]);
        src.seek(2).unwrap();
        assert_eq!(src.read_byte().unwrap(), 30);
        assert!(src.read_byte().is_err());
        src.seek(0).unwrap();
        assert!(!src.eof());
        assert_eq!(src.read_byte().unwrap(), 10);
    }

    #[test]
    fn test_seek_past_end_fails() {
        let mut src = ReadSeekSource::from_bytes(vec![0; 4]);
        assert!(src.seek(4).is_ok());
        assert!(src.seek(5).is_err());
        assert_eq!(src.size(), Some(4));
    }

    #[test]
    fn test_file_source() {
        use std::io::Write;
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"FLV\x01\x05").unwrap();
        tmp.flush().unwrap();

        let mut src = ReadSeekSource::open(tmp.path()).unwrap();
        assert_eq!(src.size(), Some(5));
        let mut magic = [0u8; 3];
        assert_eq!(src.read(&mut magic).unwrap(), 3);
        assert_eq!(&magic, b"FLV");
    }
}
