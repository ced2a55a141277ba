//! Reverse DNS for remote peers and proportional traffic attribution.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::LazyLock;

use trust_dns_resolver::Resolver;

use super::model::DomainUsage;
use super::rates::NetRate;
use crate::error::ResultOkLogExt;
use crate::procfs::socket::IpVersion;

/// Name used for peers whose address could not be decoded.
pub const UNRESOLVED: &str = "unresolved";

/// Reverse name lookup, abstracted so tests never touch the network.
pub trait ReverseLookup: Send {
    /// Returns the host name for `addr`, or `None` if there is none.
    fn lookup(&self, addr: IpAddr) -> Option<String>;
}

/// Resolves `PTR` records through the nameservers in `/etc/resolv.conf`.
///
/// Only real names are accepted; the numeric form is never returned as a name.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemLookup;

/// Built on first use and never dropped, since it owns its own runtime.
static SYSTEM_RESOLVER: LazyLock<Option<Resolver>> =
    LazyLock::new(|| Resolver::from_system_conf().ok_log());

impl ReverseLookup for SystemLookup {
    fn lookup(&self, addr: IpAddr) -> Option<String> {
        let resolver = SYSTEM_RESOLVER.as_ref()?;
        resolver
            .reverse_lookup(addr)
            .ok_log()?
            .into_iter()
            .find_map(|name| host_name(&name.to_utf8()))
    }
}

/// Strips the root label from a fully qualified name.
fn host_name(fqdn: &str) -> Option<String> {
    let name = fqdn.strip_suffix('.').unwrap_or(fqdn);
    (!name.is_empty()).then(|| name.to_string())
}

/// Caching reverse resolver.
///
/// Entries are never evicted; the cache grows with the number of distinct
/// peers seen over the process lifetime.
pub struct DomainResolver {
    lookup: Box<dyn ReverseLookup>,
    cache: HashMap<(IpVersion, IpAddr), String>,
}

impl std::fmt::Debug for DomainResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DomainResolver")
            .field("cached", &self.cache.len())
            .finish_non_exhaustive()
    }
}

impl DomainResolver {
    pub fn new(lookup: Box<dyn ReverseLookup>) -> Self {
        Self {
            lookup,
            cache: HashMap::new(),
        }
    }

    /// Name for a remote peer. Falls back to the literal address when the
    /// lookup fails, and to [`UNRESOLVED`] when there is no address.
    pub fn resolve(&mut self, version: IpVersion, addr: Option<IpAddr>) -> String {
        let Some(addr) = addr else {
            return UNRESOLVED.to_string();
        };
        if let Some(name) = self.cache.get(&(version, addr)) {
            return name.clone();
        }

        let name = self.lookup.lookup(addr).unwrap_or_else(|| {
            log::trace!("no reverse name for {addr}");
            addr.to_string()
        });
        self.cache.insert((version, addr), name.clone());
        name
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }
}

/// Groups connections by name and splits `rate` across them by connection share.
///
/// The per-domain rates are an estimate: every connection is assumed to carry
/// an equal share of the host's traffic.
pub fn attribute<I>(names: I, rate: NetRate) -> (u32, Vec<DomainUsage>)
where
    I: IntoIterator<Item = String>,
{
    let mut counts: HashMap<String, u32> = HashMap::new();
    let mut total = 0u32;
    for name in names {
        *counts.entry(name).or_default() += 1;
        total += 1;
    }
    if total == 0 {
        return (0, Vec::new());
    }

    let mut usage: Vec<DomainUsage> = counts
        .into_iter()
        .map(|(domain, connections)| {
            let share = f64::from(connections) / f64::from(total);
            DomainUsage {
                domain,
                receive_rate: rate.rx * share,
                transmit_rate: rate.tx * share,
                connections,
            }
        })
        .collect();
    usage.sort_by(DomainUsage::ranking);

    (total, usage)
}
