//! Immutable longest-prefix-match exception set.

use ipnet::IpNet;
use std::net::IpAddr;

/// Binary trie node keyed on address bits, MSB first.
#[derive(Default)]
struct Node {
    children: [Option<Box<Node>>; 2],
    /// End of an inserted prefix; everything below this node is covered.
    covered: bool,
}

impl Node {
    /// Insert the first `prefix_len` bits of `bits` (left-aligned to `width`).
    fn insert(&mut self, bits: u128, prefix_len: u8, width: u8) {
        let mut node = self;
        for i in 0..prefix_len {
            let bit = ((bits >> (width - 1 - i)) & 1) as usize;
            node = node.children[bit].get_or_insert_with(Box::default);
        }
        node.covered = true;
    }

    /// Walk the address bits until a covered node is hit or the trie runs out.
    fn lookup(&self, bits: u128, width: u8) -> bool {
        let mut node = self;
        if node.covered {
            // A /0 prefix covers the whole address family.
            return true;
        }
        for i in 0..width {
            let bit = ((bits >> (width - 1 - i)) & 1) as usize;
            match node.children[bit].as_deref() {
                Some(child) => {
                    if child.covered {
                        return true;
                    }
                    node = child;
                }
                None => return false,
            }
        }
        false
    }
}

/// ExceptionSet answers "does this address fall within any member CIDR range".
///
/// IPv4 and IPv6 prefixes live in separate tries; a lookup costs at most one
/// trie descent bounded by the address bit-length, independent of how many
/// ranges were inserted. The set is immutable once built: each refresh cycle
/// constructs a brand-new set rather than editing the published one.
///
/// # Examples
/// ```
/// use ipexempt::ExceptionSet;
///
/// let set = ExceptionSet::from_prefixes(vec![
///     "10.0.0.0/8".parse().unwrap(),
///     "2001:db8::/32".parse().unwrap(),
/// ]);
/// assert!(set.contains("10.1.2.3".parse().unwrap()));
/// assert!(!set.contains("8.8.8.8".parse().unwrap()));
/// ```
pub struct ExceptionSet {
    v4: Node,
    v6: Node,
    len: usize,
}

impl ExceptionSet {
    /// Build a set from a list of network prefixes.
    pub fn from_prefixes<I>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = IpNet>,
    {
        let mut set = Self {
            v4: Node::default(),
            v6: Node::default(),
            len: 0,
        };
        for net in prefixes {
            match net {
                IpNet::V4(n) => {
                    set.v4
                        .insert(u32::from(n.network()) as u128, n.prefix_len(), 32)
                }
                IpNet::V6(n) => set.v6.insert(u128::from(n.network()), n.prefix_len(), 128),
            }
            set.len += 1;
        }
        set
    }

    /// Check whether an address is covered by any member prefix.
    pub fn contains(&self, ip: IpAddr) -> bool {
        match ip {
            IpAddr::V4(v4) => self.v4.lookup(u32::from(v4) as u128, 32),
            IpAddr::V6(v6) => self.v6.lookup(u128::from(v6), 128),
        }
    }

    /// Number of prefixes inserted (duplicates are not collapsed).
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the set holds no prefixes.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}
