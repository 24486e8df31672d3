//! Record types, the generic content codec, and the transportable
//! request/response representation
//!
//! Records are stored through a single opaque content column. The payload is
//! a self-describing, field-tagged JSON document so that decoding never
//! depends on field order and new record types need no schema migration,
//! only a new variant here. Decoding dispatches on the stored type code and
//! rejects codes with no registered shape.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::net::{Ipv4Addr, Ipv6Addr};

use serde_derive::{Deserialize, Serialize};

use crate::dns::errors::{Result, ZoneError};

/// `QueryType` represents the requested record type of a query
///
/// The specific type Unknown takes an integer parameter in order to retain
/// the code of an unrecognized type. An integer can be converted to a
/// querytype using the `from_num` function, and back using `to_num`.
#[derive(PartialEq, Eq, Debug, Clone, Hash, Copy, Serialize, Deserialize)]
pub enum QueryType {
    Unknown(u16),
    A,     // 1
    Ns,    // 2
    Cname, // 5
    Soa,   // 6
    Ptr,   // 12
    Mx,    // 15
    Txt,   // 16
    Aaaa,  // 28
    Srv,   // 33
    Caa,   // 257
}

impl QueryType {
    pub fn to_num(&self) -> u16 {
        match *self {
            QueryType::Unknown(x) => x,
            QueryType::A => 1,
            QueryType::Ns => 2,
            QueryType::Cname => 5,
            QueryType::Soa => 6,
            QueryType::Ptr => 12,
            QueryType::Mx => 15,
            QueryType::Txt => 16,
            QueryType::Aaaa => 28,
            QueryType::Srv => 33,
            QueryType::Caa => 257,
        }
    }

    pub fn from_num(num: u16) -> QueryType {
        match num {
            1 => QueryType::A,
            2 => QueryType::Ns,
            5 => QueryType::Cname,
            6 => QueryType::Soa,
            12 => QueryType::Ptr,
            15 => QueryType::Mx,
            16 => QueryType::Txt,
            28 => QueryType::Aaaa,
            33 => QueryType::Srv,
            257 => QueryType::Caa,
            _ => QueryType::Unknown(num),
        }
    }
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            QueryType::Unknown(x) => write!(f, "TYPE{}", x),
            QueryType::A => write!(f, "A"),
            QueryType::Ns => write!(f, "NS"),
            QueryType::Cname => write!(f, "CNAME"),
            QueryType::Soa => write!(f, "SOA"),
            QueryType::Ptr => write!(f, "PTR"),
            QueryType::Mx => write!(f, "MX"),
            QueryType::Txt => write!(f, "TXT"),
            QueryType::Aaaa => write!(f, "AAAA"),
            QueryType::Srv => write!(f, "SRV"),
            QueryType::Caa => write!(f, "CAA"),
        }
    }
}

/// TTL wrapper that is ignored for equality and ordering, so record sets
/// compare by content rather than by remaining lifetime.
#[derive(Copy, Clone, Debug, Eq, Serialize, Deserialize)]
pub struct TransientTtl(pub u32);

impl PartialEq<TransientTtl> for TransientTtl {
    fn eq(&self, _: &TransientTtl) -> bool {
        true
    }
}

impl PartialOrd<TransientTtl> for TransientTtl {
    fn partial_cmp(&self, other: &TransientTtl) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TransientTtl {
    fn cmp(&self, _: &TransientTtl) -> Ordering {
        Ordering::Equal
    }
}

impl Hash for TransientTtl {
    fn hash<H>(&self, _: &mut H)
    where
        H: Hasher,
    {
        // purposely left empty
    }
}

/// `DnsRecord` is the primary representation of a DNS record
///
/// This enumeration is the closed set of record shapes the playground can
/// store. It is used both as the API type and, through the tagged serde
/// representation, as the stored content payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DnsRecord {
    A {
        domain: String,
        addr: Ipv4Addr,
        ttl: TransientTtl,
    }, // 1
    Ns {
        domain: String,
        host: String,
        ttl: TransientTtl,
    }, // 2
    Cname {
        domain: String,
        host: String,
        ttl: TransientTtl,
    }, // 5
    Soa {
        domain: String,
        m_name: String,
        r_name: String,
        serial: u32,
        refresh: u32,
        retry: u32,
        expire: u32,
        minimum: u32,
        ttl: TransientTtl,
    }, // 6
    Ptr {
        domain: String,
        host: String,
        ttl: TransientTtl,
    }, // 12
    Mx {
        domain: String,
        priority: u16,
        host: String,
        ttl: TransientTtl,
    }, // 15
    Txt {
        domain: String,
        data: String,
        ttl: TransientTtl,
    }, // 16
    Aaaa {
        domain: String,
        addr: Ipv6Addr,
        ttl: TransientTtl,
    }, // 28
    Srv {
        domain: String,
        priority: u16,
        weight: u16,
        port: u16,
        host: String,
        ttl: TransientTtl,
    }, // 33
    Caa {
        domain: String,
        flags: u8,
        tag: String,
        value: String,
        ttl: TransientTtl,
    }, // 257
}

impl DnsRecord {
    pub fn get_querytype(&self) -> QueryType {
        match *self {
            DnsRecord::A { .. } => QueryType::A,
            DnsRecord::Ns { .. } => QueryType::Ns,
            DnsRecord::Cname { .. } => QueryType::Cname,
            DnsRecord::Soa { .. } => QueryType::Soa,
            DnsRecord::Ptr { .. } => QueryType::Ptr,
            DnsRecord::Mx { .. } => QueryType::Mx,
            DnsRecord::Txt { .. } => QueryType::Txt,
            DnsRecord::Aaaa { .. } => QueryType::Aaaa,
            DnsRecord::Srv { .. } => QueryType::Srv,
            DnsRecord::Caa { .. } => QueryType::Caa,
        }
    }

    pub fn get_domain(&self) -> &str {
        match *self {
            DnsRecord::A { ref domain, .. }
            | DnsRecord::Ns { ref domain, .. }
            | DnsRecord::Cname { ref domain, .. }
            | DnsRecord::Soa { ref domain, .. }
            | DnsRecord::Ptr { ref domain, .. }
            | DnsRecord::Mx { ref domain, .. }
            | DnsRecord::Txt { ref domain, .. }
            | DnsRecord::Aaaa { ref domain, .. }
            | DnsRecord::Srv { ref domain, .. }
            | DnsRecord::Caa { ref domain, .. } => domain,
        }
    }

    pub fn get_ttl(&self) -> u32 {
        match *self {
            DnsRecord::A {
                ttl: TransientTtl(ttl),
                ..
            }
            | DnsRecord::Ns {
                ttl: TransientTtl(ttl),
                ..
            }
            | DnsRecord::Cname {
                ttl: TransientTtl(ttl),
                ..
            }
            | DnsRecord::Soa {
                ttl: TransientTtl(ttl),
                ..
            }
            | DnsRecord::Ptr {
                ttl: TransientTtl(ttl),
                ..
            }
            | DnsRecord::Mx {
                ttl: TransientTtl(ttl),
                ..
            }
            | DnsRecord::Txt {
                ttl: TransientTtl(ttl),
                ..
            }
            | DnsRecord::Aaaa {
                ttl: TransientTtl(ttl),
                ..
            }
            | DnsRecord::Srv {
                ttl: TransientTtl(ttl),
                ..
            }
            | DnsRecord::Caa {
                ttl: TransientTtl(ttl),
                ..
            } => ttl,
        }
    }

    /// Encode this record into the stored content payload.
    pub fn to_content(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode a stored content payload, dispatching on the stored type code.
    ///
    /// An unrecognized code fails before any parsing; a payload that parses
    /// to a different variant than the stored code indicates corrupt storage
    /// and is reported rather than silently accepted.
    pub fn from_content(rrtype: u16, content: &str) -> Result<DnsRecord> {
        let qtype = QueryType::from_num(rrtype);
        if let QueryType::Unknown(code) = qtype {
            return Err(ZoneError::UnsupportedType(code));
        }

        let record: DnsRecord = serde_json::from_str(content)?;
        if record.get_querytype() != qtype {
            return Err(ZoneError::TypeMismatch {
                stored: rrtype,
                decoded: record.get_querytype().to_num(),
            });
        }

        Ok(record)
    }
}

impl fmt::Display for DnsRecord {
    /// Zone-file presentation form, with tab-separated header fields:
    /// `example.com.\t3600\tIN\tMX\t10 mail.example.com.`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\t{}\tIN\t{}\t",
            self.get_domain(),
            self.get_ttl(),
            self.get_querytype()
        )?;

        match *self {
            DnsRecord::A { ref addr, .. } => write!(f, "{}", addr),
            DnsRecord::Ns { ref host, .. }
            | DnsRecord::Cname { ref host, .. }
            | DnsRecord::Ptr { ref host, .. } => write!(f, "{}", host),
            DnsRecord::Soa {
                ref m_name,
                ref r_name,
                serial,
                refresh,
                retry,
                expire,
                minimum,
                ..
            } => write!(
                f,
                "{} {} {} {} {} {} {}",
                m_name, r_name, serial, refresh, retry, expire, minimum
            ),
            DnsRecord::Mx {
                priority, ref host, ..
            } => write!(f, "{} {}", priority, host),
            DnsRecord::Txt { ref data, .. } => write!(f, "\"{}\"", data),
            DnsRecord::Aaaa { ref addr, .. } => write!(f, "{}", addr),
            DnsRecord::Srv {
                priority,
                weight,
                port,
                ref host,
                ..
            } => write!(f, "{} {} {} {}", priority, weight, port, host),
            DnsRecord::Caa {
                flags,
                ref tag,
                ref value,
                ..
            } => write!(f, "{} {} \"{}\"", flags, tag, value),
        }
    }
}

/// The result code for a DNS response
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ResultCode {
    #[default]
    NOERROR = 0,
    FORMERR = 1,
    SERVFAIL = 2,
    NXDOMAIN = 3,
    NOTIMP = 4,
    REFUSED = 5,
}

/// Header of a served request or response, as recorded in the request log
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsHeader {
    pub id: u16,
    pub response: bool,
    pub opcode: u8,
    pub rescode: ResultCode,
    pub authoritative_answer: bool,
    pub truncated_message: bool,
    pub recursion_desired: bool,
    pub recursion_available: bool,
}

/// A single question from a served query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsQuestion {
    pub name: String,
    pub qtype: QueryType,
}

impl DnsQuestion {
    pub fn new(name: String, qtype: QueryType) -> DnsQuestion {
        DnsQuestion { name, qtype }
    }
}

/// Transportable representation of a served query or response
///
/// This is what the request log persists and streams: enough structure to
/// replay what was asked and answered, fully serializable, with no wire
/// format attached.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsPacket {
    pub header: DnsHeader,
    pub questions: Vec<DnsQuestion>,
    pub answers: Vec<DnsRecord>,
    pub authorities: Vec<DnsRecord>,
    pub resources: Vec<DnsRecord>,
}

impl DnsPacket {
    pub fn new() -> DnsPacket {
        DnsPacket::default()
    }
}
