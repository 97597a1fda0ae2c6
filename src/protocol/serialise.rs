//! Serialisation of DNS messages to the wire format.  See the `types`
//! module for details of the format.
//!
//! Names are always emitted uncompressed: this server never generates
//! compression pointers, it only resolves them on input.

use crate::protocol::types::*;

/// The fixed size of a serialised header.
const WIRE_HEADER_SIZE: usize = 12;

impl Message {
    /// Serialise the whole message.  The header counts are taken from
    /// the actual section lengths, not the stored count fields.
    ///
    /// # Errors
    ///
    /// If a section or an RDATA field is too long for its 16-bit
    /// length field (the `Message` type permits more states than the
    /// wire format does).
    pub fn to_octets(self) -> Result<Vec<u8>, ProtocolError> {
        let mut buffer = WritableBuffer::default();
        self.serialise(&mut buffer)?;
        Ok(buffer.octets)
    }

    pub fn serialise(self, buffer: &mut WritableBuffer) -> Result<(), ProtocolError> {
        let mut header = self.header;
        header.qdcount = usize_to_u16(self.questions.len())?;
        header.ancount = usize_to_u16(self.answers.len())?;
        header.nscount = usize_to_u16(self.authority.len())?;
        header.arcount = usize_to_u16(self.additional.len())?;
        header.serialise(buffer);

        for question in self.questions {
            question.serialise(buffer);
        }
        for rr in self.answers {
            rr.serialise(buffer)?;
        }
        for rr in self.authority {
            rr.serialise(buffer)?;
        }
        for rr in self.additional {
            rr.serialise(buffer)?;
        }

        Ok(())
    }

    /// Serialise at most `max_size` octets: questions and records are
    /// emitted whole, in section order, stopping before the first one
    /// which would not fit.  Dropping anything sets the TC flag, and
    /// the header counts always reflect what was actually emitted.
    ///
    /// # Errors
    ///
    /// As `to_octets`.
    pub fn to_octets_capped(self, max_size: usize) -> Result<Vec<u8>, ProtocolError> {
        let mut header = self.header;
        let mut body = WritableBuffer::default();
        let mut truncated = false;

        let mut qdcount = 0;
        for question in self.questions {
            let mark = body.octets.len();
            question.serialise(&mut body);
            if WIRE_HEADER_SIZE + body.octets.len() > max_size {
                body.octets.truncate(mark);
                truncated = true;
                break;
            }
            qdcount += 1;
        }

        let ancount = serialise_rrs_capped(self.answers, &mut body, max_size, &mut truncated)?;
        let nscount = serialise_rrs_capped(self.authority, &mut body, max_size, &mut truncated)?;
        let arcount = serialise_rrs_capped(self.additional, &mut body, max_size, &mut truncated)?;

        header.is_truncated = header.is_truncated || truncated;
        header.qdcount = usize_to_u16(qdcount)?;
        header.ancount = usize_to_u16(ancount)?;
        header.nscount = usize_to_u16(nscount)?;
        header.arcount = usize_to_u16(arcount)?;

        let mut buffer = WritableBuffer::default();
        header.serialise(&mut buffer);
        buffer.write_octets(body.octets);
        Ok(buffer.octets)
    }
}

/// Helper for `to_octets_capped`: emit records until one does not
/// fit, returning how many were written.
fn serialise_rrs_capped(
    rrs: Vec<ResourceRecord>,
    body: &mut WritableBuffer,
    max_size: usize,
    truncated: &mut bool,
) -> Result<usize, ProtocolError> {
    let mut count = 0;

    if *truncated {
        return Ok(count);
    }

    for rr in rrs {
        let mark = body.octets.len();
        rr.serialise(body)?;
        if WIRE_HEADER_SIZE + body.octets.len() > max_size {
            body.octets.truncate(mark);
            *truncated = true;
            break;
        }
        count += 1;
    }

    Ok(count)
}

impl Header {
    pub fn serialise(self, buffer: &mut WritableBuffer) {
        // octet 1
        let flag_qr = if self.is_response { HEADER_MASK_QR } else { 0 };
        let field_opcode = HEADER_MASK_OPCODE & (u8::from(self.opcode) << HEADER_OFFSET_OPCODE);
        let flag_aa = if self.is_authoritative {
            HEADER_MASK_AA
        } else {
            0
        };
        let flag_tc = if self.is_truncated { HEADER_MASK_TC } else { 0 };
        let flag_rd = if self.recursion_desired {
            HEADER_MASK_RD
        } else {
            0
        };
        // octet 2
        let flag_ra = if self.recursion_available {
            HEADER_MASK_RA
        } else {
            0
        };
        let field_rcode = HEADER_MASK_RCODE & u8::from(self.rcode);

        buffer.write_u16(self.id);
        buffer.write_u8(flag_qr | field_opcode | flag_aa | flag_tc | flag_rd);
        buffer.write_u8(flag_ra | field_rcode);
        buffer.write_u16(self.qdcount);
        buffer.write_u16(self.ancount);
        buffer.write_u16(self.nscount);
        buffer.write_u16(self.arcount);
    }
}

impl Question {
    pub fn serialise(self, buffer: &mut WritableBuffer) {
        self.name.serialise(buffer);
        self.qtype.serialise(buffer);
        self.qclass.serialise(buffer);
    }
}

impl ResourceRecord {
    /// # Errors
    ///
    /// If the RDATA is longer than its 16-bit length field allows.
    pub fn serialise(self, buffer: &mut WritableBuffer) -> Result<(), ProtocolError> {
        let rdlength = usize_to_u16(self.rdata.len())?;

        self.name.serialise(buffer);
        self.rtype.serialise(buffer);
        self.rclass.serialise(buffer);
        buffer.write_u32(self.ttl);
        buffer.write_u16(rdlength);
        buffer.write_octets(self.rdata);
        Ok(())
    }
}

impl DomainName {
    pub fn serialise(self, buffer: &mut WritableBuffer) {
        // the stored octets are already the uncompressed wire form
        buffer.write_octets(self.octets);
    }
}

impl QueryType {
    pub fn serialise(self, buffer: &mut WritableBuffer) {
        buffer.write_u16(self.into());
    }
}

impl QueryClass {
    pub fn serialise(self, buffer: &mut WritableBuffer) {
        buffer.write_u16(self.into());
    }
}

impl RecordType {
    pub fn serialise(self, buffer: &mut WritableBuffer) {
        buffer.write_u16(self.into());
    }
}

impl RecordClass {
    pub fn serialise(self, buffer: &mut WritableBuffer) {
        buffer.write_u16(self.into());
    }
}

fn usize_to_u16(value: usize) -> Result<u16, ProtocolError> {
    u16::try_from(value).map_err(|_| ProtocolError::CountTooLarge)
}

/// A buffer which can be written to, for serialisation purposes.
pub struct WritableBuffer {
    pub octets: Vec<u8>,
}

impl Default for WritableBuffer {
    fn default() -> Self {
        Self {
            octets: Vec::with_capacity(512),
        }
    }
}

impl WritableBuffer {
    pub fn write_u8(&mut self, octet: u8) {
        self.octets.push(octet);
    }

    pub fn write_u16(&mut self, value: u16) {
        for octet in value.to_be_bytes() {
            self.octets.push(octet);
        }
    }

    pub fn write_u32(&mut self, value: u32) {
        for octet in value.to_be_bytes() {
            self.octets.push(octet);
        }
    }

    pub fn write_octets(&mut self, octets: Vec<u8>) {
        for octet in octets {
            self.octets.push(octet);
        }
    }
}
