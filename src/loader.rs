use std::fs::File;
use std::io::{self, BufReader, ErrorKind, Read};
use std::path::Path;

use log::{debug, warn};

use crate::error::LoadError;
use crate::memory::{Memory, MEMORY_MAX};

/// Placement of a loaded image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Image {
    /// First address written.
    pub origin: u16,
    /// Amount of words written from `origin`.
    pub len: usize,
}

/// Load a big-endian image (origin word, then program words) into memory.
///
/// Loading is not atomic: if reading fails part way, words already copied stay in memory.
/// Words which would land past the end of memory are dropped.
pub fn load_image<R: Read>(mem: &mut Memory, reader: R) -> Result<Image, LoadError> {
    let mut reader = BufReader::new(reader);

    let origin = match read_word(&mut reader).map_err(LoadError::Read)? {
        Word::Full(origin) => origin,
        Word::Partial | Word::End => return Err(LoadError::MissingOrigin),
    };

    let capacity = MEMORY_MAX - origin as usize;
    let mut len = 0;
    loop {
        let word = match read_word(&mut reader).map_err(LoadError::Read)? {
            Word::Full(word) => word,
            Word::Partial => {
                warn!("image has an odd number of bytes; ignoring the last byte");
                break;
            }
            Word::End => break,
        };
        if len == capacity {
            warn!("image does not fit in memory; truncated at 0xffff");
            break;
        }
        mem.write(origin.wrapping_add(len as u16), word);
        len += 1;
    }

    debug!("loaded {len} words at 0x{origin:04x}");
    Ok(Image { origin, len })
}

pub fn load_file(mem: &mut Memory, path: impl AsRef<Path>) -> Result<Image, LoadError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| LoadError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    load_image(mem, file)
}

enum Word {
    Full(u16),
    /// Stream ended halfway through a word.
    Partial,
    End,
}

fn read_word(reader: &mut impl Read) -> io::Result<Word> {
    let mut buf = [0u8; 2];
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(match filled {
        0 => Word::End,
        1 => Word::Partial,
        _ => Word::Full(u16::from_be_bytes(buf)),
    })
}
