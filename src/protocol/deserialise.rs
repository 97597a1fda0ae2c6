//! Deserialisation of DNS messages from the network.  See the `types`
//! module for details of the format.

use crate::protocol::types::*;

/// Sections claiming more records than this are rejected outright,
/// before anything is allocated for them.
pub const MAX_SECTION_COUNT: u16 = 256;

/// How many nested compression pointers a single name may chase.
pub const MAX_POINTER_DEPTH: usize = 10;

impl Message {
    pub fn from_octets(octets: &[u8]) -> Result<Self, ProtocolError> {
        Self::deserialise(&mut ConsumableBuffer::new(octets))
    }

    /// Deserialise a message.  A datagram which ends cleanly at a
    /// record boundary before the header counts are exhausted decodes
    /// to a partial message, with the counts left as transmitted (see
    /// `Message::is_partial`); running out mid-record is an error.
    pub fn deserialise(buffer: &mut ConsumableBuffer) -> Result<Self, ProtocolError> {
        let header = Header::deserialise(buffer)?;

        for count in [
            header.qdcount,
            header.ancount,
            header.nscount,
            header.arcount,
        ] {
            if count > MAX_SECTION_COUNT {
                return Err(ProtocolError::CountTooLarge);
            }
        }

        let mut questions = Vec::with_capacity(header.qdcount.into());
        let mut answers = Vec::with_capacity(header.ancount.into());
        let mut authority = Vec::with_capacity(header.nscount.into());
        let mut additional = Vec::with_capacity(header.arcount.into());

        'sections: {
            for _ in 0..header.qdcount {
                if buffer.is_exhausted() {
                    break 'sections;
                }
                questions.push(Question::deserialise(buffer)?);
            }
            for _ in 0..header.ancount {
                if buffer.is_exhausted() {
                    break 'sections;
                }
                answers.push(ResourceRecord::deserialise(buffer)?);
            }
            for _ in 0..header.nscount {
                if buffer.is_exhausted() {
                    break 'sections;
                }
                authority.push(ResourceRecord::deserialise(buffer)?);
            }
            for _ in 0..header.arcount {
                if buffer.is_exhausted() {
                    break 'sections;
                }
                additional.push(ResourceRecord::deserialise(buffer)?);
            }
        }

        Ok(Self {
            header,
            questions,
            answers,
            authority,
            additional,
        })
    }
}

impl Header {
    pub fn deserialise(buffer: &mut ConsumableBuffer) -> Result<Self, ProtocolError> {
        let id = buffer.next_u16().ok_or(ProtocolError::TooShort)?;
        let flags1 = buffer.next_u8().ok_or(ProtocolError::TooShort)?;
        let flags2 = buffer.next_u8().ok_or(ProtocolError::TooShort)?;
        let qdcount = buffer.next_u16().ok_or(ProtocolError::TooShort)?;
        let ancount = buffer.next_u16().ok_or(ProtocolError::TooShort)?;
        let nscount = buffer.next_u16().ok_or(ProtocolError::TooShort)?;
        let arcount = buffer.next_u16().ok_or(ProtocolError::TooShort)?;

        Ok(Self {
            id,
            is_response: flags1 & HEADER_MASK_QR != 0,
            opcode: Opcode::from((flags1 & HEADER_MASK_OPCODE) >> HEADER_OFFSET_OPCODE),
            is_authoritative: flags1 & HEADER_MASK_AA != 0,
            is_truncated: flags1 & HEADER_MASK_TC != 0,
            recursion_desired: flags1 & HEADER_MASK_RD != 0,
            recursion_available: flags2 & HEADER_MASK_RA != 0,
            rcode: Rcode::from(flags2 & HEADER_MASK_RCODE),
            qdcount,
            ancount,
            nscount,
            arcount,
        })
    }
}

impl Question {
    pub fn deserialise(buffer: &mut ConsumableBuffer) -> Result<Self, ProtocolError> {
        let name = DomainName::deserialise(buffer)?;
        let qtype = buffer.next_u16().ok_or(ProtocolError::Truncated)?.into();
        let qclass = buffer.next_u16().ok_or(ProtocolError::Truncated)?.into();

        Ok(Self {
            name,
            qtype,
            qclass,
        })
    }
}

impl ResourceRecord {
    pub fn deserialise(buffer: &mut ConsumableBuffer) -> Result<Self, ProtocolError> {
        let name = DomainName::deserialise(buffer)?;
        let rtype = buffer.next_u16().ok_or(ProtocolError::Truncated)?.into();
        let rclass = buffer.next_u16().ok_or(ProtocolError::Truncated)?.into();
        let ttl = buffer.next_u32().ok_or(ProtocolError::Truncated)?;
        let rdlength = buffer.next_u16().ok_or(ProtocolError::Truncated)?;

        // kept as read from the datagram: names inside the RDATA are
        // not expanded
        let rdata = buffer
            .take(rdlength as usize)
            .ok_or(ProtocolError::Truncated)?
            .to_vec();

        Ok(Self {
            name,
            rtype,
            rclass,
            ttl,
            rdata,
        })
    }
}

impl DomainName {
    pub fn deserialise(buffer: &mut ConsumableBuffer) -> Result<Self, ProtocolError> {
        Self::deserialise_nested(buffer, 0)
    }

    fn deserialise_nested(
        buffer: &mut ConsumableBuffer,
        depth: usize,
    ) -> Result<Self, ProtocolError> {
        if depth > MAX_POINTER_DEPTH {
            return Err(ProtocolError::MalformedName);
        }

        let mut octets = Vec::<u8>::with_capacity(MAX_NAME_OCTETS);
        let mut labels = Vec::<Vec<u8>>::with_capacity(5);
        let start = buffer.position;

        loop {
            let size = buffer.next_u8().ok_or(ProtocolError::Truncated)?;

            if size as usize <= MAX_LABEL_OCTETS {
                octets.push(size);

                if size == 0 {
                    labels.push(Vec::new());
                    break;
                }

                let mut label = Vec::with_capacity(size.into());
                if let Some(os) = buffer.take(size as usize) {
                    for o in os {
                        let lowered = o.to_ascii_lowercase();
                        octets.push(lowered);
                        label.push(lowered);
                    }
                } else {
                    return Err(ProtocolError::Truncated);
                }
                labels.push(label);

                if octets.len() > MAX_NAME_OCTETS {
                    return Err(ProtocolError::MalformedName);
                }
            } else if size >= 0b1100_0000 {
                // this requires re-parsing the pointed-to name - not
                // great but works for now
                let hi = size & 0b0011_1111;
                let lo = buffer.next_u8().ok_or(ProtocolError::Truncated)?;
                let ptr = usize::from(u16::from_be_bytes([hi, lo]));

                // a pointer must be to an earlier name (not merely a
                // different one: an earlier one - RFC 1035 section
                // 4.1.4), which also rules out cycles
                if ptr >= start {
                    return Err(ProtocolError::MalformedName);
                }

                let mut other =
                    DomainName::deserialise_nested(&mut buffer.at_offset(ptr), depth + 1)?;
                octets.append(&mut other.octets);
                labels.append(&mut other.labels);
                break;
            } else {
                // the 10 and 01 top-bit combinations are reserved
                return Err(ProtocolError::MalformedName);
            }
        }

        if octets.len() <= MAX_NAME_OCTETS {
            Ok(DomainName { octets, labels })
        } else {
            Err(ProtocolError::MalformedName)
        }
    }
}

/// A buffer which will be consumed by the parsing process.
pub struct ConsumableBuffer<'a> {
    octets: &'a [u8],
    position: usize,
}

impl<'a> ConsumableBuffer<'a> {
    pub fn new(octets: &'a [u8]) -> Self {
        Self {
            octets,
            position: 0,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.position >= self.octets.len()
    }

    pub fn next_u8(&mut self) -> Option<u8> {
        if self.octets.len() > self.position {
            let a = self.octets[self.position];
            self.position += 1;
            Some(a)
        } else {
            None
        }
    }

    pub fn next_u16(&mut self) -> Option<u16> {
        if self.octets.len() > self.position + 1 {
            let a = self.octets[self.position];
            let b = self.octets[self.position + 1];
            self.position += 2;
            Some(u16::from_be_bytes([a, b]))
        } else {
            None
        }
    }

    pub fn next_u32(&mut self) -> Option<u32> {
        if self.octets.len() > self.position + 3 {
            let a = self.octets[self.position];
            let b = self.octets[self.position + 1];
            let c = self.octets[self.position + 2];
            let d = self.octets[self.position + 3];
            self.position += 4;
            Some(u32::from_be_bytes([a, b, c, d]))
        } else {
            None
        }
    }

    pub fn take(&mut self, size: usize) -> Option<&'a [u8]> {
        if self.octets.len() >= self.position + size {
            let slice = &self.octets[self.position..self.position + size];
            self.position += size;
            Some(slice)
        } else {
            None
        }
    }

    pub fn at_offset(&self, position: usize) -> ConsumableBuffer<'a> {
        Self {
            octets: self.octets,
            position,
        }
    }
}
