//! Tag-length-value container format used by the eID card data files.
//!
//! Identity and address files on the card are sequences of
//! `tag || length || value` triples with single-byte tags and a base-128
//! length (most significant bit marks a continuation byte). Zero tags are
//! padding. Unknown tags must be skippable so that newer card generations
//! do not break older servers.

use std::collections::BTreeMap;

pub mod convert;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("stream ends in the middle of the length of tag {tag}")]
    TruncatedLength { tag: u8 },
    #[error("length of tag {tag} does not fit in 28 bits")]
    LengthOverflow { tag: u8 },
    #[error("tag {tag} declares {declared} bytes but only {remaining} remain")]
    Truncated {
        tag: u8,
        declared: usize,
        remaining: usize,
    },
    #[error("mandatory tag {tag} ({field}) not present")]
    MissingTag { tag: u8, field: &'static str },
    #[error("tag {tag} ({field}): {source}")]
    Convert {
        tag: u8,
        field: &'static str,
        #[source]
        source: convert::Error,
    },
}

/// A single tag-length-value triple, borrowing the value from the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entry<'a> {
    pub tag: u8,
    pub value: &'a [u8],
}

/// Iterator over the triples of a TLV stream.
pub struct Scanner<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Scanner<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }
}

impl<'a> Iterator for Scanner<'a> {
    type Item = Result<Entry<'a>, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let &tag = self.data.get(self.pos)?;
            self.pos += 1;
            if tag == 0 {
                // padding byte
                continue;
            }
            let mut length: usize = 0;
            let mut groups = 0;
            loop {
                let Some(&byte) = self.data.get(self.pos) else {
                    self.pos = self.data.len();
                    return Some(Err(Error::TruncatedLength { tag }));
                };
                self.pos += 1;
                length = (length << 7) | usize::from(byte & 0x7f);
                groups += 1;
                if byte & 0x80 == 0 {
                    break;
                }
                if groups == 4 {
                    self.pos = self.data.len();
                    return Some(Err(Error::LengthOverflow { tag }));
                }
            }
            let remaining = self.data.len() - self.pos;
            if length > remaining {
                self.pos = self.data.len();
                return Some(Err(Error::Truncated {
                    tag,
                    declared: length,
                    remaining,
                }));
            }
            let value = &self.data[self.pos..self.pos + length];
            self.pos += length;
            return Some(Ok(Entry { tag, value }));
        }
    }
}

/// Scan result keyed by tag.
///
/// A later occurrence of a tag shadows an earlier one; tags not referenced
/// by the record schema are simply never looked up.
pub struct TagMap<'a>(BTreeMap<u8, &'a [u8]>);

impl<'a> TagMap<'a> {
    pub fn parse(data: &'a [u8]) -> Result<Self, Error> {
        let mut map = BTreeMap::new();
        for entry in Scanner::new(data) {
            let Entry { tag, value } = entry?;
            map.insert(tag, value);
        }
        Ok(Self(map))
    }

    pub fn get(&self, tag: u8) -> Option<&'a [u8]> {
        self.0.get(&tag).copied()
    }

    pub fn contains(&self, tag: u8) -> bool {
        self.0.contains_key(&tag)
    }

    pub fn require(&self, tag: u8, field: &'static str) -> Result<&'a [u8], Error> {
        self.get(tag).ok_or(Error::MissingTag { tag, field })
    }

    /// Decode a mandatory tag through a converter.
    pub fn require_with<T>(
        &self,
        tag: u8,
        field: &'static str,
        converter: impl FnOnce(&'a [u8]) -> Result<T, convert::Error>,
    ) -> Result<T, Error> {
        let value = self.require(tag, field)?;
        converter(value).map_err(|source| Error::Convert { tag, field, source })
    }

    /// Decode an optional tag through a converter. An absent tag is `None`;
    /// a present tag that fails to convert is still an error.
    pub fn optional_with<T>(
        &self,
        tag: u8,
        field: &'static str,
        converter: impl FnOnce(&'a [u8]) -> Result<T, convert::Error>,
    ) -> Result<Option<T>, Error> {
        match self.get(tag) {
            None => Ok(None),
            Some(value) => converter(value)
                .map(Some)
                .map_err(|source| Error::Convert { tag, field, source }),
        }
    }
}

/// Encode triples into a TLV stream, mirroring [`Scanner`].
pub fn encode<'a>(entries: impl IntoIterator<Item = (u8, &'a [u8])>) -> Vec<u8> {
    let mut out = Vec::new();
    for (tag, value) in entries {
        out.push(tag);
        write_length(&mut out, value.len());
        out.extend_from_slice(value);
    }
    out
}

fn write_length(out: &mut Vec<u8>, length: usize) {
    let mut groups = [0u8; 10];
    let mut count = 0;
    let mut rest = length;
    loop {
        groups[count] = (rest & 0x7f) as u8;
        count += 1;
        rest >>= 7;
        if rest == 0 {
            break;
        }
    }
    for i in (1..count).rev() {
        out.push(groups[i] | 0x80);
    }
    out.push(groups[0]);
}
