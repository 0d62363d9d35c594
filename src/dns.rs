//! DNS protocol implementation.
//!
//! This module provides the message codec: a section-ordered
//! [`MessageBuilder`] with optional name compression, and
//! [`parse_message`], which decodes a complete wire message into a header and
//! typed [`Record`]s.

use std::collections::HashMap;
use std::net::Ipv4Addr;

use log::debug;

use crate::errors::{DnsError, Result};
use crate::record::{Record, RecordClass, RecordData, RecordType, Soa};
use crate::utils::{name_labels, MAX_NAME_LEN};

/// Size of the fixed DNS header in bytes.
pub const HEADER_LEN: usize = 12;

/// Highest offset a compression pointer can reference.
const MAX_POINTER_OFFSET: usize = 0x3FFF;

/// Upper bound on compression pointers followed while reading one name.
const MAX_POINTER_HOPS: usize = 64;

/// DNS operation code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Opcode {
    #[default]
    Query,
    Update,
    Other(u8),
}

impl From<u8> for Opcode {
    fn from(value: u8) -> Self {
        match value & 0x0F {
            0 => Opcode::Query,
            5 => Opcode::Update,
            other => Opcode::Other(other),
        }
    }
}

impl From<Opcode> for u8 {
    fn from(value: Opcode) -> Self {
        match value {
            Opcode::Query => 0,
            Opcode::Update => 5,
            Opcode::Other(other) => other & 0x0F,
        }
    }
}

/// DNS response code.
///
/// Code 9 is reported as "not authorized: server not authoritative for
/// zone", the meaning this deployment gives to NOTAUTH.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rcode {
    #[default]
    NoError,
    FormErr,
    ServFail,
    NXDomain,
    NotImp,
    Refused,
    YXDomain,
    YXRRSet,
    NXRRSet,
    NotAuth,
    NotZone,
    Unknown(u8),
}

impl From<u8> for Rcode {
    fn from(value: u8) -> Self {
        match value & 0x0F {
            0 => Rcode::NoError,
            1 => Rcode::FormErr,
            2 => Rcode::ServFail,
            3 => Rcode::NXDomain,
            4 => Rcode::NotImp,
            5 => Rcode::Refused,
            6 => Rcode::YXDomain,
            7 => Rcode::YXRRSet,
            8 => Rcode::NXRRSet,
            9 => Rcode::NotAuth,
            10 => Rcode::NotZone,
            other => Rcode::Unknown(other),
        }
    }
}

impl From<Rcode> for u8 {
    fn from(value: Rcode) -> Self {
        match value {
            Rcode::NoError => 0,
            Rcode::FormErr => 1,
            Rcode::ServFail => 2,
            Rcode::NXDomain => 3,
            Rcode::NotImp => 4,
            Rcode::Refused => 5,
            Rcode::YXDomain => 6,
            Rcode::YXRRSet => 7,
            Rcode::NXRRSet => 8,
            Rcode::NotAuth => 9,
            Rcode::NotZone => 10,
            Rcode::Unknown(other) => other,
        }
    }
}

impl Rcode {
    /// Numeric value of the response code.
    pub fn code(self) -> u8 {
        u8::from(self)
    }

    /// Human readable meaning of the response code.
    pub fn description(&self) -> &'static str {
        match self {
            Rcode::NoError => "no error",
            Rcode::FormErr => "format error: the name server was unable to interpret the query",
            Rcode::ServFail => "server failure: the name server was unable to process this query due to a problem with the name server",
            Rcode::NXDomain => "name error: the domain name referenced in the query does not exist",
            Rcode::NotImp => "not implemented: the name server does not support the requested kind of query",
            Rcode::Refused => "refused: the name server refuses to perform the specified operation for policy reasons",
            Rcode::YXDomain => "yxdomain: a name exists that should not exist",
            Rcode::YXRRSet => "yxrrset: an RR set exists that should not exist",
            Rcode::NXRRSet => "nxrrset: an RR set that should exist does not exist",
            Rcode::NotAuth => "not authorized: server not authoritative for zone",
            Rcode::NotZone => "not zone: a name used in the update is not within the zone",
            Rcode::Unknown(_) => "unknown response code",
        }
    }
}

/// DNS message header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Header {
    pub id: u16,
    pub response: bool,
    pub opcode: Opcode,
    pub authoritative: bool,
    pub truncated: bool,
    pub recursion_desired: bool,
    pub recursion_available: bool,
    pub rcode: Rcode,
    pub qdcount: u16,
    pub ancount: u16,
    pub nscount: u16,
    pub arcount: u16,
}

impl Header {
    /// Pack the flag bits into the second 16-bit word of the header.
    pub fn flags(&self) -> u16 {
        let mut flags = (u8::from(self.opcode) as u16) << 11 | u8::from(self.rcode) as u16;
        if self.response {
            flags |= 0x8000;
        }
        if self.authoritative {
            flags |= 0x0400;
        }
        if self.truncated {
            flags |= 0x0200;
        }
        if self.recursion_desired {
            flags |= 0x0100;
        }
        if self.recursion_available {
            flags |= 0x0080;
        }
        flags
    }

    /// Serialize the header into its 12 byte wire form.
    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[0..2].copy_from_slice(&self.id.to_be_bytes());
        out[2..4].copy_from_slice(&self.flags().to_be_bytes());
        out[4..6].copy_from_slice(&self.qdcount.to_be_bytes());
        out[6..8].copy_from_slice(&self.ancount.to_be_bytes());
        out[8..10].copy_from_slice(&self.nscount.to_be_bytes());
        out[10..12].copy_from_slice(&self.arcount.to_be_bytes());
        out
    }

    /// Turn a non-zero response code into a `DnsError::Protocol`.
    pub fn check_rcode(&self) -> Result<()> {
        match self.rcode {
            Rcode::NoError => Ok(()),
            rcode => Err(DnsError::Protocol(rcode)),
        }
    }
}

/// A question (or, in an UPDATE message, zone) section entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    pub name: String,
    pub qtype: RecordType,
    pub qclass: RecordClass,
}

/// Message sections in the order they appear on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Section {
    Header,
    Questions,
    Answers,
    Authorities,
    Additionals,
}

/// Builds a DNS message section by section.
///
/// Sections can only be started in wire order. Section counts are tracked
/// as entries are written and patched into the header by [`to_bytes`] and
/// [`finish`], so they always match what was written.
///
/// [`to_bytes`]: MessageBuilder::to_bytes
/// [`finish`]: MessageBuilder::finish
#[derive(Debug, Clone)]
pub struct MessageBuilder {
    header: Header,
    buf: Vec<u8>,
    section: Section,
    counts: [u16; 4],
    compression: Option<HashMap<String, u16>>,
}

impl MessageBuilder {
    /// Create a builder for a message with the given header. The header's
    /// section counts are ignored.
    pub fn new(header: Header) -> Self {
        let mut buf = Vec::with_capacity(512);
        buf.resize(HEADER_LEN, 0);
        Self {
            header,
            buf,
            section: Section::Header,
            counts: [0; 4],
            compression: None,
        }
    }

    /// Compress names against suffixes already written to the message.
    pub fn enable_compression(&mut self) {
        self.compression.get_or_insert_with(HashMap::new);
    }

    /// The message ID this builder writes.
    pub fn id(&self) -> u16 {
        self.header.id
    }

    pub fn start_questions(&mut self) -> Result<()> {
        self.start(Section::Questions)
    }

    pub fn start_answers(&mut self) -> Result<()> {
        self.start(Section::Answers)
    }

    pub fn start_authorities(&mut self) -> Result<()> {
        self.start(Section::Authorities)
    }

    pub fn start_additionals(&mut self) -> Result<()> {
        self.start(Section::Additionals)
    }

    fn start(&mut self, section: Section) -> Result<()> {
        if section <= self.section {
            return Err(DnsError::Validation(format!(
                "cannot start {:?} section after {:?}",
                section, self.section
            )));
        }
        self.section = section;
        Ok(())
    }

    /// Append a question to the question section.
    pub fn question(&mut self, question: &Question) -> Result<()> {
        if self.section != Section::Questions {
            return Err(DnsError::Validation(format!(
                "question written in {:?} section",
                self.section
            )));
        }
        let mark = self.buf.len();
        let written = self.write_question(question);
        self.commit(mark, written)
    }

    /// Append a resource record to the current RR section.
    ///
    /// Typed record data must agree with `rtype`; opaque data is written
    /// verbatim for any type.
    pub fn resource(
        &mut self,
        name: &str,
        rtype: RecordType,
        class: RecordClass,
        ttl: u32,
        data: &RecordData,
    ) -> Result<()> {
        if self.section < Section::Answers {
            return Err(DnsError::Validation(format!(
                "resource record written in {:?} section",
                self.section
            )));
        }
        check_data_type(rtype, data)?;

        let mark = self.buf.len();
        let written = self.write_resource(name, rtype, class, ttl, data);
        self.commit(mark, written)
    }

    /// Append a [`Record`] to the current RR section.
    pub fn record(&mut self, record: &Record) -> Result<()> {
        self.resource(&record.name, record.rtype, record.class, record.ttl, &record.data)
    }

    /// The message built so far, with section counts filled in.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = self.buf.clone();
        out[..HEADER_LEN].copy_from_slice(&self.final_header().to_bytes());
        out
    }

    /// Finish building and return the complete message.
    pub fn finish(mut self) -> Vec<u8> {
        let header = self.final_header().to_bytes();
        self.buf[..HEADER_LEN].copy_from_slice(&header);
        self.buf
    }

    fn final_header(&self) -> Header {
        Header {
            qdcount: self.counts[0],
            ancount: self.counts[1],
            nscount: self.counts[2],
            arcount: self.counts[3],
            ..self.header.clone()
        }
    }

    /// Count a successfully written entry, or roll the buffer back.
    fn commit(&mut self, mark: usize, written: Result<()>) -> Result<()> {
        let result = written.and_then(|_| {
            let index = self.section as usize - 1;
            self.counts[index] = self.counts[index].checked_add(1).ok_or_else(|| {
                DnsError::Validation(format!("too many entries in {:?} section", self.section))
            })?;
            Ok(())
        });
        if result.is_err() {
            self.buf.truncate(mark);
            if let Some(map) = self.compression.as_mut() {
                map.retain(|_, offset| (*offset as usize) < mark);
            }
        }
        result
    }

    fn write_question(&mut self, question: &Question) -> Result<()> {
        self.write_name(&question.name)?;
        self.buf.extend_from_slice(&u16::from(question.qtype).to_be_bytes());
        self.buf.extend_from_slice(&u16::from(question.qclass).to_be_bytes());
        Ok(())
    }

    fn write_resource(
        &mut self,
        name: &str,
        rtype: RecordType,
        class: RecordClass,
        ttl: u32,
        data: &RecordData,
    ) -> Result<()> {
        self.write_name(name)?;
        self.buf.extend_from_slice(&u16::from(rtype).to_be_bytes());
        self.buf.extend_from_slice(&u16::from(class).to_be_bytes());
        self.buf.extend_from_slice(&ttl.to_be_bytes());

        // RDLENGTH is patched once RDATA is written
        let rdlength_at = self.buf.len();
        self.buf.extend_from_slice(&[0, 0]);
        self.write_rdata(data)?;

        let rdlength = self.buf.len() - rdlength_at - 2;
        let rdlength = u16::try_from(rdlength)
            .map_err(|_| DnsError::Validation(format!("RDATA of {} exceeds 65535 octets", name)))?;
        self.buf[rdlength_at..rdlength_at + 2].copy_from_slice(&rdlength.to_be_bytes());
        Ok(())
    }

    fn write_rdata(&mut self, data: &RecordData) -> Result<()> {
        match data {
            RecordData::A { address } => self.buf.extend_from_slice(&address.octets()),
            RecordData::Soa(soa) => {
                self.write_name(&soa.ns)?;
                self.write_name(&soa.mbox)?;
                for value in [soa.serial, soa.refresh, soa.retry, soa.expire, soa.min_ttl] {
                    self.buf.extend_from_slice(&value.to_be_bytes());
                }
            }
            RecordData::Ns { ns } => self.write_name(ns)?,
            RecordData::Ptr { ptr } => self.write_name(ptr)?,
            RecordData::Cname { target } => self.write_name(target)?,
            RecordData::Opaque { rdata } => self.buf.extend_from_slice(rdata),
        }
        Ok(())
    }

    fn write_name(&mut self, name: &str) -> Result<()> {
        let labels = name_labels(name)?;

        for i in 0..labels.len() {
            if let Some(map) = self.compression.as_mut() {
                let suffix = labels[i..].join(".");
                if let Some(&offset) = map.get(&suffix) {
                    self.buf.extend_from_slice(&(0xC000 | offset).to_be_bytes());
                    return Ok(());
                }
                let here = self.buf.len();
                if here <= MAX_POINTER_OFFSET {
                    map.insert(suffix, here as u16);
                }
            }
            self.buf.push(labels[i].len() as u8);
            self.buf.extend_from_slice(labels[i].as_bytes());
        }

        self.buf.push(0);
        Ok(())
    }
}

fn check_data_type(rtype: RecordType, data: &RecordData) -> Result<()> {
    let expected = match data {
        RecordData::A { .. } => RecordType::A,
        RecordData::Soa(_) => RecordType::SOA,
        RecordData::Ns { .. } => RecordType::NS,
        RecordData::Ptr { .. } => RecordType::PTR,
        RecordData::Cname { .. } => RecordType::CNAME,
        RecordData::Opaque { .. } => return Ok(()),
    };
    if rtype != expected {
        return Err(DnsError::Validation(format!(
            "record data for {} does not match record type {}",
            expected, rtype
        )));
    }
    Ok(())
}

/// A parsed DNS message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub header: Header,
    pub questions: Vec<Question>,
    pub answers: Vec<Record>,
    pub authorities: Vec<Record>,
    pub additionals: Vec<Record>,
}

/// Bounds-checked cursor over a complete DNS message.
struct WireReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> WireReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self.pos + len;
        let bytes = self
            .data
            .get(self.pos..end)
            .ok_or_else(|| DnsError::format_at(self.pos, format!("need {} more bytes", len)))?;
        self.pos = end;
        Ok(bytes)
    }

    fn read_u16(&mut self) -> Result<u16> {
        let b = self.read_bytes(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn read_u32(&mut self) -> Result<u32> {
        let b = self.read_bytes(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Read a possibly compressed domain name, returned fully qualified.
    fn read_name(&mut self) -> Result<String> {
        let mut labels: Vec<String> = Vec::new();
        let mut pos = self.pos;
        let mut resume_at = None;
        let mut hops = 0;
        let mut wire_len = 1;

        loop {
            let len = *self
                .data
                .get(pos)
                .ok_or_else(|| DnsError::format_at(pos, "truncated domain name"))?;

            match len & 0xC0 {
                0x00 if len == 0 => {
                    pos += 1;
                    break;
                }
                0x00 => {
                    let start = pos + 1;
                    let end = start + len as usize;
                    let label = self
                        .data
                        .get(start..end)
                        .ok_or_else(|| DnsError::format_at(start, "truncated label"))?;
                    wire_len += label.len() + 1;
                    if wire_len > MAX_NAME_LEN {
                        return Err(DnsError::format_at(pos, "domain name exceeds 255 octets"));
                    }
                    labels.push(decode_label(label, start)?);
                    pos = end;
                }
                0xC0 => {
                    let low = *self
                        .data
                        .get(pos + 1)
                        .ok_or_else(|| DnsError::format_at(pos, "truncated compression pointer"))?;
                    let target = ((len & 0x3F) as usize) << 8 | low as usize;
                    if target >= pos {
                        return Err(DnsError::format_at(pos, "compression pointer does not point backwards"));
                    }
                    hops += 1;
                    if hops > MAX_POINTER_HOPS {
                        return Err(DnsError::format_at(pos, "too many compression pointers"));
                    }
                    resume_at.get_or_insert(pos + 2);
                    pos = target;
                }
                _ => {
                    return Err(DnsError::format_at(pos, format!("reserved label type 0x{:02x}", len)));
                }
            }
        }

        self.pos = resume_at.unwrap_or(pos);

        if labels.is_empty() {
            Ok(".".to_string())
        } else {
            let mut name = labels.join(".");
            name.push('.');
            Ok(name)
        }
    }

    fn read_header(&mut self) -> Result<Header> {
        let id = self.read_u16()?;
        let flags = self.read_u16()?;
        Ok(Header {
            id,
            response: flags & 0x8000 != 0,
            opcode: Opcode::from(((flags >> 11) & 0x0F) as u8),
            authoritative: flags & 0x0400 != 0,
            truncated: flags & 0x0200 != 0,
            recursion_desired: flags & 0x0100 != 0,
            recursion_available: flags & 0x0080 != 0,
            rcode: Rcode::from((flags & 0x0F) as u8),
            qdcount: self.read_u16()?,
            ancount: self.read_u16()?,
            nscount: self.read_u16()?,
            arcount: self.read_u16()?,
        })
    }

    fn read_question(&mut self) -> Result<Question> {
        Ok(Question {
            name: self.read_name()?,
            qtype: RecordType::from(self.read_u16()?),
            qclass: RecordClass::from(self.read_u16()?),
        })
    }

    fn read_record(&mut self) -> Result<Record> {
        let name = self.read_name()?;
        let rtype = RecordType::from(self.read_u16()?);
        let class = RecordClass::from(self.read_u16()?);
        let ttl = self.read_u32()?;
        let rdlength = self.read_u16()? as usize;

        let start = self.pos;
        let end = start + rdlength;
        if end > self.data.len() {
            return Err(DnsError::format_at(
                start,
                format!("RDATA length {} of {} exceeds message", rdlength, name),
            ));
        }

        let data = match rtype {
            // RFC 2136 delete and prerequisite RRs carry no RDATA
            _ if rdlength == 0 => RecordData::empty(),
            RecordType::A => {
                if rdlength != 4 {
                    return Err(DnsError::format_at(start, format!("A record RDATA of {} bytes", rdlength)));
                }
                let b = self.read_bytes(4)?;
                RecordData::A {
                    address: Ipv4Addr::new(b[0], b[1], b[2], b[3]),
                }
            }
            RecordType::SOA => RecordData::Soa(Soa {
                ns: self.read_name()?,
                mbox: self.read_name()?,
                serial: self.read_u32()?,
                refresh: self.read_u32()?,
                retry: self.read_u32()?,
                expire: self.read_u32()?,
                min_ttl: self.read_u32()?,
            }),
            RecordType::NS => RecordData::Ns { ns: self.read_name()? },
            RecordType::PTR => RecordData::Ptr { ptr: self.read_name()? },
            RecordType::CNAME => RecordData::Cname {
                target: self.read_name()?,
            },
            _ => RecordData::Opaque {
                rdata: self.read_bytes(rdlength)?.to_vec(),
            },
        };

        if self.pos != end {
            return Err(DnsError::format_at(
                start,
                format!("{} RDATA does not match RDLENGTH {}", rtype, rdlength),
            ));
        }

        Ok(Record {
            name,
            rtype,
            class,
            ttl,
            data,
        })
    }

    fn read_records(&mut self, count: u16) -> Result<Vec<Record>> {
        (0..count).map(|_| self.read_record()).collect()
    }
}

/// Labels must be UTF-8 without an embedded `.`, so a decoded name joins
/// back into the same labels it was read from.
fn decode_label(label: &[u8], offset: usize) -> Result<String> {
    let text = std::str::from_utf8(label)
        .map_err(|_| DnsError::format_at(offset, "label is not valid UTF-8"))?;
    if text.contains('.') {
        return Err(DnsError::format_at(offset, "label contains a literal dot"));
    }
    Ok(text.to_string())
}

/// Parse only the header of a DNS message.
///
/// # Arguments
/// * `message` - The raw DNS message.
///
/// # Returns
/// A `Result` containing the decoded header or a `DnsError::Format`.
pub fn parse_header(message: &[u8]) -> Result<Header> {
    if message.len() < HEADER_LEN {
        return Err(DnsError::Format(format!(
            "message of {} bytes is shorter than the DNS header",
            message.len()
        )));
    }
    WireReader::new(message).read_header()
}

/// Parse a complete DNS message.
///
/// The header's section counts decide how many entries are read from each
/// section. Records of types without a decoder are kept with opaque data.
///
/// # Arguments
/// * `message` - The raw DNS message.
///
/// # Returns
/// A `Result` containing the parsed message or a `DnsError::Format` when the
/// message is truncated or malformed.
pub fn parse_message(message: &[u8]) -> Result<Message> {
    let header = parse_header(message)?;
    let mut reader = WireReader::new(message);
    reader.pos = HEADER_LEN;

    let questions = (0..header.qdcount)
        .map(|_| reader.read_question())
        .collect::<Result<Vec<_>>>()?;
    let answers = reader.read_records(header.ancount)?;
    let authorities = reader.read_records(header.nscount)?;
    let additionals = reader.read_records(header.arcount)?;

    if reader.remaining() > 0 {
        debug!("Ignoring {} trailing bytes after last record", reader.remaining());
    }

    Ok(Message {
        header,
        questions,
        answers,
        authorities,
        additionals,
    })
}
