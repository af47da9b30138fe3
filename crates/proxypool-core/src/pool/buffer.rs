//! `PoolBuffer` — one of the two named A/B slots.

use proxypool_types::Proxy;

/// An ordered set of proxies; order is irrelevant to semantics and used
/// only for iteration determinism in tests (spec.md §3).
#[derive(Debug, Clone, Default)]
pub struct PoolBuffer {
    proxies: Vec<Proxy>,
}

impl PoolBuffer {
    pub fn new() -> Self {
        Self { proxies: Vec::new() }
    }

    pub fn from_proxies(proxies: Vec<Proxy>) -> Self {
        Self { proxies }
    }

    pub fn len(&self) -> usize {
        self.proxies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.proxies.is_empty()
    }

    pub fn clear(&mut self) {
        self.proxies.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &Proxy> {
        self.proxies.iter()
    }

    pub fn healthy(&self) -> Vec<usize> {
        self.proxies
            .iter()
            .enumerate()
            .filter(|(_, p)| p.is_healthy())
            .map(|(i, _)| i)
            .collect()
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Proxy> {
        self.proxies.get_mut(index)
    }

    pub fn get(&self, index: usize) -> Option<&Proxy> {
        self.proxies.get(index)
    }

    /// Remove every proxy matching `address`, returning the removed
    /// entries (0 or 1 in practice, but the operation is idempotent either
    /// way — a second call simply returns an empty `Vec`).
    pub fn remove_address(&mut self, address: &str) -> Vec<Proxy> {
        let (removed, kept): (Vec<Proxy>, Vec<Proxy>) =
            std::mem::take(&mut self.proxies).into_iter().partition(|p| p.address == address);
        self.proxies = kept;
        removed
    }

    pub fn addresses(&self) -> Vec<String> {
        self.proxies.iter().map(|p| p.address.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use proxypool_types::HealthState;

    use super::*;

    fn proxy(addr: &str) -> Proxy {
        Proxy::new(addr.to_string(), Utc::now())
    }

    #[test]
    fn new_buffer_is_empty() {
        let buf = PoolBuffer::new();
        assert!(buf.is_empty());
        assert_eq!(buf.len(), 0);
    }

    #[test]
    fn healthy_returns_indices_of_healthy_proxies_only() {
        let mut unhealthy = proxy("bad:1");
        unhealthy.state = HealthState::Failed;
        let buf = PoolBuffer::from_proxies(vec![proxy("good:1"), unhealthy, proxy("good:2")]);
        assert_eq!(buf.healthy(), vec![0, 2]);
    }

    #[test]
    fn remove_address_is_idempotent() {
        let mut buf = PoolBuffer::from_proxies(vec![proxy("a:1"), proxy("b:2")]);
        let removed = buf.remove_address("a:1");
        assert_eq!(removed.len(), 1);
        assert_eq!(buf.len(), 1);

        let removed_again = buf.remove_address("a:1");
        assert!(removed_again.is_empty());
        assert_eq!(buf.len(), 1);
    }

    #[test]
    fn addresses_reflects_current_membership() {
        let buf = PoolBuffer::from_proxies(vec![proxy("a:1"), proxy("b:2")]);
        assert_eq!(buf.addresses(), vec!["a:1".to_string(), "b:2".to_string()]);
    }

    #[test]
    fn clear_empties_the_buffer() {
        let mut buf = PoolBuffer::from_proxies(vec![proxy("a:1")]);
        buf.clear();
        assert!(buf.is_empty());
    }
}
