use dcpu_core::Word;

/// Byte order of a program image on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Endian {
    #[default]
    Big,
    Little,
}

/// Packs an image's bytes into words, two bytes per word. A trailing odd
/// byte is silently dropped.
pub fn words_from_bytes(bytes: &[u8], endian: Endian) -> Vec<Word> {
    bytes
        .chunks_exact(2)
        .map(|pair| {
            let pair = [pair[0], pair[1]];
            match endian {
                Endian::Big => Word::from_be_bytes(pair),
                Endian::Little => Word::from_le_bytes(pair),
            }
        })
        .collect()
}
