//! Resource record types returned to callers.
//!
//! A [`Record`] is what a zone transfer yields for every answer RR and what
//! a dynamic update takes as input. Record data is a tagged union keyed by
//! RR type; types without a decoder keep their raw RDATA.

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::errors::DnsError;

/// DNS resource record type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordType {
    A,
    NS,
    CNAME,
    SOA,
    PTR,
    MX,
    TXT,
    AAAA,
    SRV,
    OPT,
    TSIG,
    AXFR,
    ALL,
    Unknown(u16),
}

impl From<u16> for RecordType {
    fn from(value: u16) -> Self {
        match value {
            1 => RecordType::A,
            2 => RecordType::NS,
            5 => RecordType::CNAME,
            6 => RecordType::SOA,
            12 => RecordType::PTR,
            15 => RecordType::MX,
            16 => RecordType::TXT,
            28 => RecordType::AAAA,
            33 => RecordType::SRV,
            41 => RecordType::OPT,
            250 => RecordType::TSIG,
            252 => RecordType::AXFR,
            255 => RecordType::ALL,
            other => RecordType::Unknown(other),
        }
    }
}

impl From<RecordType> for u16 {
    fn from(value: RecordType) -> Self {
        match value {
            RecordType::A => 1,
            RecordType::NS => 2,
            RecordType::CNAME => 5,
            RecordType::SOA => 6,
            RecordType::PTR => 12,
            RecordType::MX => 15,
            RecordType::TXT => 16,
            RecordType::AAAA => 28,
            RecordType::SRV => 33,
            RecordType::OPT => 41,
            RecordType::TSIG => 250,
            RecordType::AXFR => 252,
            RecordType::ALL => 255,
            RecordType::Unknown(other) => other,
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RecordType::A => "TypeA",
            RecordType::NS => "TypeNS",
            RecordType::CNAME => "TypeCNAME",
            RecordType::SOA => "TypeSOA",
            RecordType::PTR => "TypePTR",
            RecordType::MX => "TypeMX",
            RecordType::TXT => "TypeTXT",
            RecordType::AAAA => "TypeAAAA",
            RecordType::SRV => "TypeSRV",
            RecordType::OPT => "TypeOPT",
            RecordType::TSIG => "TypeTSIG",
            RecordType::AXFR => "TypeAXFR",
            RecordType::ALL => "TypeALL",
            RecordType::Unknown(code) => return write!(f, "{}", code),
        };
        f.write_str(name)
    }
}

/// Accepts both the `TypeA` form emitted by [`fmt::Display`] and the bare
/// mnemonic (`A`, `soa`), as well as a numeric type code.
impl FromStr for RecordType {
    type Err = DnsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mnemonic = s.strip_prefix("Type").unwrap_or(s);
        let rtype = match mnemonic.to_ascii_uppercase().as_str() {
            "A" => RecordType::A,
            "NS" => RecordType::NS,
            "CNAME" => RecordType::CNAME,
            "SOA" => RecordType::SOA,
            "PTR" => RecordType::PTR,
            "MX" => RecordType::MX,
            "TXT" => RecordType::TXT,
            "AAAA" => RecordType::AAAA,
            "SRV" => RecordType::SRV,
            "OPT" => RecordType::OPT,
            "TSIG" => RecordType::TSIG,
            "AXFR" => RecordType::AXFR,
            "ALL" | "ANY" => RecordType::ALL,
            other => other
                .parse::<u16>()
                .map(RecordType::from)
                .map_err(|_| DnsError::Validation(format!("unknown record type: {}", s)))?,
        };
        Ok(rtype)
    }
}

impl Serialize for RecordType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RecordType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// DNS class. Only INET and ANY are used by this client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordClass {
    Inet,
    Any,
    Unknown(u16),
}

impl From<u16> for RecordClass {
    fn from(value: u16) -> Self {
        match value {
            1 => RecordClass::Inet,
            255 => RecordClass::Any,
            other => RecordClass::Unknown(other),
        }
    }
}

impl From<RecordClass> for u16 {
    fn from(value: RecordClass) -> Self {
        match value {
            RecordClass::Inet => 1,
            RecordClass::Any => 255,
            RecordClass::Unknown(other) => other,
        }
    }
}

impl fmt::Display for RecordClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordClass::Inet => f.write_str("ClassINET"),
            RecordClass::Any => f.write_str("ClassANY"),
            RecordClass::Unknown(code) => write!(f, "{}", code),
        }
    }
}

impl FromStr for RecordClass {
    type Err = DnsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mnemonic = s.strip_prefix("Class").unwrap_or(s);
        match mnemonic.to_ascii_uppercase().as_str() {
            "INET" | "IN" => Ok(RecordClass::Inet),
            "ANY" => Ok(RecordClass::Any),
            other => other
                .parse::<u16>()
                .map(RecordClass::from)
                .map_err(|_| DnsError::Validation(format!("unknown record class: {}", s))),
        }
    }
}

impl Serialize for RecordClass {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RecordClass {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// SOA record data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Soa {
    /// Primary nameserver.
    pub ns: String,
    /// Mailbox of the person responsible for the zone.
    #[serde(rename = "mBox")]
    pub mbox: String,
    pub serial: u32,
    pub refresh: u32,
    pub retry: u32,
    pub expire: u32,
    #[serde(rename = "minTtl")]
    pub min_ttl: u32,
}

/// Typed record data.
///
/// Serialized without a tag, so each variant renders as the flat field map
/// callers expect (`{"address": ...}`, `{"ns": ...}`). Opaque data renders
/// as an empty map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordData {
    A {
        address: Ipv4Addr,
    },
    Soa(Soa),
    Ns {
        ns: String,
    },
    Ptr {
        ptr: String,
    },
    Cname {
        target: String,
    },
    Opaque {
        #[serde(skip)]
        rdata: Vec<u8>,
    },
}

impl RecordData {
    /// Data with no decoded fields.
    pub fn empty() -> Self {
        RecordData::Opaque { rdata: Vec::new() }
    }

    /// Whether this data carries no decoded fields.
    pub fn is_empty(&self) -> bool {
        matches!(self, RecordData::Opaque { .. })
    }
}

impl Default for RecordData {
    fn default() -> Self {
        RecordData::empty()
    }
}

/// A resource record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    #[serde(rename = "Name")]
    pub name: String,

    #[serde(rename = "Type")]
    pub rtype: RecordType,

    #[serde(rename = "Class", default = "default_class")]
    pub class: RecordClass,

    /// Time-to-live in seconds.
    #[serde(rename = "TTL", default)]
    pub ttl: u32,

    #[serde(rename = "Data", default)]
    pub data: RecordData,
}

fn default_class() -> RecordClass {
    RecordClass::Inet
}

impl Record {
    /// Build an A record in class INET.
    pub fn a(name: impl Into<String>, ttl: u32, address: Ipv4Addr) -> Self {
        Record {
            name: name.into(),
            rtype: RecordType::A,
            class: RecordClass::Inet,
            ttl,
            data: RecordData::A { address },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_names_parse_in_both_forms() {
        assert_eq!("TypeA".parse::<RecordType>().unwrap(), RecordType::A);
        assert_eq!("soa".parse::<RecordType>().unwrap(), RecordType::SOA);
        assert_eq!("99".parse::<RecordType>().unwrap(), RecordType::Unknown(99));
        assert_eq!("15".parse::<RecordType>().unwrap(), RecordType::MX);
        assert!("Bogus".parse::<RecordType>().is_err());
    }

    #[test]
    fn record_serializes_with_flat_data() {
        let record = Record::a("host.example.com.", 300, Ipv4Addr::new(10, 0, 0, 5));
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "Name": "host.example.com.",
                "Type": "TypeA",
                "Class": "ClassINET",
                "TTL": 300,
                "Data": { "address": "10.0.0.5" },
            })
        );
    }

    #[test]
    fn opaque_data_serializes_as_empty_map() {
        let record = Record {
            name: "example.com.".into(),
            rtype: RecordType::MX,
            class: RecordClass::Inet,
            ttl: 60,
            data: RecordData::Opaque { rdata: vec![0, 10, 0] },
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["Data"], serde_json::json!({}));
        assert_eq!(json["Type"], "TypeMX");
    }

    #[test]
    fn soa_uses_original_field_names() {
        let data = RecordData::Soa(Soa {
            ns: "ns1.example.com.".into(),
            mbox: "hostmaster.example.com.".into(),
            serial: 1,
            refresh: 10800,
            retry: 3600,
            expire: 604800,
            min_ttl: 86400,
        });
        let json = serde_json::to_value(&data).unwrap();
        assert_eq!(json["mBox"], "hostmaster.example.com.");
        assert_eq!(json["minTtl"], 86400);
    }

    #[test]
    fn record_deserializes_from_caller_input() {
        let record: Record = serde_json::from_str(
            r#"{"Name": "host.example.com.", "Type": "TypeA", "TTL": 300,
                "Data": {"address": "10.0.0.5"}}"#,
        )
        .unwrap();
        assert_eq!(record, Record::a("host.example.com.", 300, Ipv4Addr::new(10, 0, 0, 5)));
    }
}
